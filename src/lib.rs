//! Workload wrapper for the Kafka UI service.
//!
//! Drives a process supervisor through the [`infrastructure::Container`]
//! boundary: lifecycle, service layer, file access, command execution and a
//! retried readiness probe.

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;
