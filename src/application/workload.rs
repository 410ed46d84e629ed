//! Workload capability set
//!
//! Reconciliation logic drives a workload only through this trait, so a
//! different backend (another supervisor, a plain process manager) can be
//! substituted without touching callers.

use std::collections::BTreeMap;
use std::path::Path;

use crate::application::WorkloadResult;
use crate::domain::{Layer, WriteMode};

pub trait Workload: Send + Sync {
    /// Apply the service layer and (re)start the service.
    fn start(&self) -> WorkloadResult<()>;

    /// Halt the service; its layer stays in place.
    fn stop(&self) -> WorkloadResult<()>;

    fn restart(&self) -> WorkloadResult<()>;

    /// File content split on `\n`; empty when the file does not exist.
    fn read(&self, path: &Path) -> WorkloadResult<Vec<String>>;

    /// Write content owned by the service user and group.
    fn write(&self, content: &str, path: &Path, mode: WriteMode) -> WorkloadResult<()>;

    /// Run a command with stderr merged into stdout; returns the combined output.
    fn exec(
        &self,
        command: &[String],
        env: Option<&BTreeMap<String, String>>,
        working_dir: Option<&Path>,
    ) -> WorkloadResult<String>;

    /// Whether the service is registered and running.
    fn active(&self) -> WorkloadResult<bool>;

    /// Whether `host:port` accepts TCP connections.
    fn check_socket(&self, host: &str, port: u16) -> bool;

    /// Whether the container channel can be established.
    fn installed(&self) -> bool;

    fn container_can_connect(&self) -> bool;

    /// Declarative definition of the service.
    fn layer(&self) -> Layer;

    /// Merge `KEY=VALUE` entries into the environment file.
    fn set_environment(&self, env_vars: &[String]) -> WorkloadResult<()>;
}
