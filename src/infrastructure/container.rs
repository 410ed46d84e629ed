//! Process supervisor and filesystem API of a workload container
//!
//! This is the boundary the workload controller drives. Paths are
//! container-absolute; every call fails with
//! [`ContainerError::ConnectionUnavailable`] while the container cannot be reached.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::domain::{Layer, Ownership, ServiceInfo, WriteMode};
use crate::infrastructure::error::ContainerResult;

/// A command to execute inside the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecRequest {
    pub command: Vec<String>,
    pub environment: BTreeMap<String, String>,
    pub working_dir: Option<PathBuf>,
    /// Merge stderr into stdout; the error then carries an empty stderr.
    pub combine_stderr: bool,
}

impl ExecRequest {
    pub fn new<I, S>(command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: command.into_iter().map(Into::into).collect(),
            environment: BTreeMap::new(),
            working_dir: None,
            combine_stderr: true,
        }
    }
}

/// Supervisor + filesystem operations of one container.
pub trait Container: Send + Sync {
    /// Whether the container channel can currently be established.
    fn can_connect(&self) -> bool;

    /// Add a layer under `label`, combining with an existing one when `combine` is set.
    fn add_layer(&self, label: &str, layer: &Layer, combine: bool) -> ContainerResult<()>;

    /// Effective configuration of all layers.
    fn plan(&self) -> ContainerResult<Layer>;

    /// Start services that are not running.
    fn start(&self, services: &[&str]) -> ContainerResult<()>;

    /// Stop (if running) and start services.
    fn restart(&self, services: &[&str]) -> ContainerResult<()>;

    fn stop(&self, services: &[&str]) -> ContainerResult<()>;

    /// Services known to the plan; an empty filter returns all of them.
    fn get_services(&self, names: &[&str]) -> ContainerResult<BTreeMap<String, ServiceInfo>>;

    /// A single service; fails with `ServiceNotFound` when it is not in the plan.
    fn get_service(&self, name: &str) -> ContainerResult<ServiceInfo>;

    fn exists(&self, path: &Path) -> ContainerResult<bool>;

    fn read_text(&self, path: &Path) -> ContainerResult<String>;

    fn write_text(
        &self,
        path: &Path,
        content: &str,
        owner: &Ownership,
        mode: WriteMode,
    ) -> ContainerResult<()>;

    /// Run a command to completion and return its output.
    fn exec(&self, request: &ExecRequest) -> ContainerResult<String>;
}
