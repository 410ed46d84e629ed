//! Application layer: the workload controller
//!
//! This layer orchestrates domain logic and depends on the container boundary.

pub mod error;
pub mod retry;
pub mod services;
pub mod workload;

pub use error::{WorkloadError, WorkloadResult};
pub use retry::ProbeRetry;
pub use services::KafkaUiWorkload;
pub use workload::Workload;
