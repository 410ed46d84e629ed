//! In-memory container for tests and dry runs
//!
//! Files, layers and service states live in memory. Restarting a service
//! marks it active; tests can flip states, drop the connection and script
//! exec results. Every mutating call is recorded.

use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::domain::{Layer, Ownership, Plan, ServiceInfo, ServiceStatus, WriteMode};
use crate::infrastructure::container::{Container, ExecRequest};
use crate::infrastructure::error::{ContainerError, ContainerResult};

/// A file held by [`InMemoryContainer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryFile {
    pub content: String,
    pub owner: Option<Ownership>,
}

/// A recorded call against [`InMemoryContainer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerCall {
    AddLayer { label: String, combine: bool },
    Start(Vec<String>),
    Restart(Vec<String>),
    Stop(Vec<String>),
    Write { path: PathBuf, mode: WriteMode },
    Exec(ExecRequest),
}

/// Scripted result of the next exec call.
#[derive(Debug, Clone)]
enum ExecScript {
    Output(String),
    Failure {
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },
}

#[derive(Debug, Default)]
struct MemoryState {
    connected: bool,
    plan: Plan,
    statuses: BTreeMap<String, ServiceStatus>,
    files: BTreeMap<PathBuf, MemoryFile>,
    exec_script: VecDeque<ExecScript>,
    calls: Vec<ContainerCall>,
}

#[derive(Debug)]
pub struct InMemoryContainer {
    state: Mutex<MemoryState>,
}

impl Default for InMemoryContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryContainer {
    /// A connected, empty container.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState {
                connected: true,
                ..Default::default()
            }),
        }
    }

    /// A container whose channel is down.
    pub fn disconnected() -> Self {
        let container = Self::new();
        container.set_connected(false);
        container
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn connected(&self) -> ContainerResult<MutexGuard<'_, MemoryState>> {
        let state = self.lock();
        if state.connected {
            Ok(state)
        } else {
            Err(ContainerError::ConnectionUnavailable {
                endpoint: "memory".into(),
            })
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.lock().connected = connected;
    }

    /// Force the state the supervisor reports for a service.
    pub fn set_status(&self, service: &str, status: ServiceStatus) {
        self.lock().statuses.insert(service.to_string(), status);
    }

    /// Place a file without recording a write.
    pub fn put_file(&self, path: impl Into<PathBuf>, content: impl Into<String>) {
        self.lock().files.insert(
            path.into(),
            MemoryFile {
                content: content.into(),
                owner: None,
            },
        );
    }

    pub fn file(&self, path: impl AsRef<Path>) -> Option<MemoryFile> {
        self.lock().files.get(path.as_ref()).cloned()
    }

    /// Queue the output of the next successful exec.
    pub fn push_exec_output(&self, output: impl Into<String>) {
        self.lock()
            .exec_script
            .push_back(ExecScript::Output(output.into()));
    }

    /// Queue a failure for the next exec.
    pub fn push_exec_failure(
        &self,
        exit_code: Option<i32>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) {
        self.lock().exec_script.push_back(ExecScript::Failure {
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        });
    }

    pub fn calls(&self) -> Vec<ContainerCall> {
        self.lock().calls.clone()
    }

    /// Labels of the layers added so far, in order.
    pub fn layer_labels(&self) -> Vec<String> {
        self.lock()
            .plan
            .layers()
            .iter()
            .map(|l| l.label.clone())
            .collect()
    }
}

fn owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

fn ensure_defined(state: &MemoryState, names: &[&str]) -> ContainerResult<()> {
    let plan = state.plan.combined()?;
    match names.iter().find(|n| !plan.services.contains_key(**n)) {
        Some(missing) => Err(ContainerError::ServiceNotFound(missing.to_string())),
        None => Ok(()),
    }
}

impl Container for InMemoryContainer {
    fn can_connect(&self) -> bool {
        self.lock().connected
    }

    fn add_layer(&self, label: &str, layer: &Layer, combine: bool) -> ContainerResult<()> {
        let mut state = self.connected()?;
        state.plan.add_layer(label, layer, combine)?;
        state.calls.push(ContainerCall::AddLayer {
            label: label.to_string(),
            combine,
        });
        Ok(())
    }

    fn plan(&self) -> ContainerResult<Layer> {
        Ok(self.connected()?.plan.combined()?)
    }

    fn start(&self, services: &[&str]) -> ContainerResult<()> {
        let mut state = self.connected()?;
        ensure_defined(&state, services)?;
        for name in services {
            state.statuses.insert(name.to_string(), ServiceStatus::Active);
        }
        state.calls.push(ContainerCall::Start(owned(services)));
        Ok(())
    }

    fn restart(&self, services: &[&str]) -> ContainerResult<()> {
        let mut state = self.connected()?;
        ensure_defined(&state, services)?;
        for name in services {
            state.statuses.insert(name.to_string(), ServiceStatus::Active);
        }
        state.calls.push(ContainerCall::Restart(owned(services)));
        Ok(())
    }

    fn stop(&self, services: &[&str]) -> ContainerResult<()> {
        let mut state = self.connected()?;
        ensure_defined(&state, services)?;
        for name in services {
            state.statuses.insert(name.to_string(), ServiceStatus::Inactive);
        }
        state.calls.push(ContainerCall::Stop(owned(services)));
        Ok(())
    }

    fn get_services(&self, names: &[&str]) -> ContainerResult<BTreeMap<String, ServiceInfo>> {
        let state = self.connected()?;
        let plan = state.plan.combined()?;
        Ok(plan
            .services
            .iter()
            .filter(|(name, _)| names.is_empty() || names.contains(&name.as_str()))
            .map(|(name, spec)| {
                let info = ServiceInfo {
                    name: name.clone(),
                    startup: spec.startup.unwrap_or_default(),
                    current: state
                        .statuses
                        .get(name)
                        .copied()
                        .unwrap_or(ServiceStatus::Inactive),
                };
                (name.clone(), info)
            })
            .collect())
    }

    fn get_service(&self, name: &str) -> ContainerResult<ServiceInfo> {
        self.get_services(&[name])?
            .remove(name)
            .ok_or_else(|| ContainerError::ServiceNotFound(name.to_string()))
    }

    fn exists(&self, path: &Path) -> ContainerResult<bool> {
        Ok(self.connected()?.files.contains_key(path))
    }

    fn read_text(&self, path: &Path) -> ContainerResult<String> {
        self.connected()?
            .files
            .get(path)
            .map(|f| f.content.clone())
            .ok_or_else(|| {
                ContainerError::io(
                    format!("read {}", path.display()),
                    std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
                )
            })
    }

    fn write_text(
        &self,
        path: &Path,
        content: &str,
        owner: &Ownership,
        mode: WriteMode,
    ) -> ContainerResult<()> {
        let mut state = self.connected()?;
        let file = state
            .files
            .entry(path.to_path_buf())
            .or_insert_with(|| MemoryFile {
                content: String::new(),
                owner: None,
            });
        match mode {
            WriteMode::Overwrite => file.content = content.to_string(),
            WriteMode::Append => file.content.push_str(content),
        }
        file.owner = Some(owner.clone());
        state.calls.push(ContainerCall::Write {
            path: path.to_path_buf(),
            mode,
        });
        Ok(())
    }

    fn exec(&self, request: &ExecRequest) -> ContainerResult<String> {
        let mut state = self.connected()?;
        state.calls.push(ContainerCall::Exec(request.clone()));
        match state.exec_script.pop_front() {
            None => Ok(String::new()),
            Some(ExecScript::Output(output)) => Ok(output),
            Some(ExecScript::Failure {
                exit_code,
                stdout,
                stderr,
            }) => Err(ContainerError::Exec {
                exit_code,
                stdout,
                stderr,
            }),
        }
    }
}
