//! Non-containerized backend: a local process supervisor rooted at a directory
//!
//! Container paths are resolved under `root`. The plan and one pid file per
//! running service are kept under the state directory, so separate
//! invocations observe the same supervisor state. Service output is appended
//! to `<state>/logs/<service>.log`.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::process::Child;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use nix::sys::signal::{kill, killpg, Signal};
use nix::unistd::{geteuid, Group, Pid, User};
use tracing::{debug, info, instrument, warn};

use crate::domain::{
    DomainError, Layer, Ownership, Plan, ServiceInfo, ServiceSpec, ServiceStatus, WriteMode,
};
use crate::infrastructure::container::{Container, ExecRequest};
use crate::infrastructure::error::{ContainerError, ContainerResult};
use crate::infrastructure::traits::{
    CommandRunner, FileSystem, Invocation, RealCommandRunner, RealFileSystem,
};

/// Default state directory, as a container path.
pub const DEFAULT_STATE_DIR: &str = "/var/lib/kafka-ui-workload";

const PLAN_FILE: &str = "plan.yaml";
const STOP_POLL: Duration = Duration::from_millis(50);

/// Supervises services as child processes of the current host.
pub struct LocalContainer {
    root: PathBuf,
    state_dir: PathBuf,
    fs: Arc<dyn FileSystem>,
    cmd: Arc<dyn CommandRunner>,
    children: Mutex<BTreeMap<String, Child>>,
    stop_timeout: Duration,
    privileged: bool,
}

impl LocalContainer {
    /// Create a backend rooted at `root` with real filesystem and process access.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_deps(
            root,
            DEFAULT_STATE_DIR,
            Arc::new(RealFileSystem),
            Arc::new(RealCommandRunner),
        )
    }

    /// Create a backend with custom dependencies.
    pub fn with_deps(
        root: impl Into<PathBuf>,
        state_dir: impl AsRef<Path>,
        fs: Arc<dyn FileSystem>,
        cmd: Arc<dyn CommandRunner>,
    ) -> Self {
        let root = root.into();
        let state_dir = join_under(&root, state_dir.as_ref()).unwrap_or_else(|| root.join(".state"));
        Self {
            root,
            state_dir,
            fs,
            cmd,
            children: Mutex::new(BTreeMap::new()),
            stop_timeout: Duration::from_secs(10),
            privileged: geteuid().is_root(),
        }
    }

    /// Grace period between SIGTERM and SIGKILL when stopping a service.
    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Host path of the log file a service writes to.
    pub fn service_log(&self, name: &str) -> PathBuf {
        self.state_dir.join("logs").join(format!("{name}.log"))
    }

    fn pid_file(&self, name: &str) -> PathBuf {
        self.state_dir.join("services").join(format!("{name}.pid"))
    }

    fn ensure_connected(&self) -> ContainerResult<()> {
        if self.can_connect() {
            Ok(())
        } else {
            Err(ContainerError::ConnectionUnavailable {
                endpoint: self.root.display().to_string(),
            })
        }
    }

    fn resolve(&self, path: &Path) -> ContainerResult<PathBuf> {
        join_under(&self.root, path).ok_or_else(|| ContainerError::InvalidPath(path.to_path_buf()))
    }

    fn lock_children(&self) -> MutexGuard<'_, BTreeMap<String, Child>> {
        self.children.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn load_plan(&self) -> ContainerResult<Plan> {
        let path = self.state_dir.join(PLAN_FILE);
        if !self.fs.exists(&path) {
            return Ok(Plan::new());
        }
        let content = self
            .fs
            .read_to_string(&path)
            .map_err(|e| ContainerError::io(format!("read plan {}", path.display()), e))?;
        serde_yaml::from_str(&content).map_err(|e| {
            ContainerError::Layer(DomainError::LayerFormat {
                message: format!("{}: {e}", path.display()),
            })
        })
    }

    fn save_plan(&self, plan: &Plan) -> ContainerResult<()> {
        let path = self.state_dir.join(PLAN_FILE);
        let content = serde_yaml::to_string(plan).map_err(|e| {
            ContainerError::Layer(DomainError::LayerFormat {
                message: e.to_string(),
            })
        })?;
        self.fs
            .ensure_parent(&path)
            .and_then(|_| self.fs.write(&path, &content))
            .map_err(|e| ContainerError::io(format!("write plan {}", path.display()), e))
    }

    /// Numeric ids for a user/group pair; `None` when not running as root.
    fn identity(&self, user: Option<&str>, group: Option<&str>) -> ContainerResult<(Option<u32>, Option<u32>)> {
        if !self.privileged {
            debug!(?user, ?group, "not running as root, keeping current identity");
            return Ok((None, None));
        }

        let uid = match user {
            Some(name) => Some(
                User::from_name(name)
                    .map_err(|e| ContainerError::io(format!("lookup user {name}"), e.into()))?
                    .ok_or_else(|| ContainerError::UnknownIdentity {
                        kind: "user",
                        name: name.to_string(),
                    })?
                    .uid
                    .as_raw(),
            ),
            None => None,
        };
        let gid = match group {
            Some(name) => Some(
                Group::from_name(name)
                    .map_err(|e| ContainerError::io(format!("lookup group {name}"), e.into()))?
                    .ok_or_else(|| ContainerError::UnknownIdentity {
                        kind: "group",
                        name: name.to_string(),
                    })?
                    .gid
                    .as_raw(),
            ),
            None => None,
        };
        Ok((uid, gid))
    }

    fn read_pid(&self, name: &str) -> Option<Pid> {
        let content = self.fs.read_to_string(&self.pid_file(name)).ok()?;
        content.trim().parse::<i32>().ok().map(Pid::from_raw)
    }

    /// A pid is alive while it can be signalled and is not a zombie.
    ///
    /// A zombie may belong to another supervisor instance in this process
    /// that has not reaped it yet; it has exited all the same.
    fn pid_alive(&self, pid: Pid) -> bool {
        if kill(pid, None).is_err() {
            return false;
        }
        let stat = Path::new("/proc").join(pid.to_string()).join("stat");
        match self.fs.read_to_string(&stat) {
            Ok(content) => process_state(&content) != Some('Z'),
            Err(_) => true,
        }
    }

    fn status_of(&self, name: &str, children: &mut BTreeMap<String, Child>) -> ServiceStatus {
        if let Some(child) = children.get_mut(name) {
            return match child.try_wait() {
                Ok(None) => ServiceStatus::Active,
                Ok(Some(status)) if status.success() => ServiceStatus::Inactive,
                Ok(Some(_)) | Err(_) => ServiceStatus::Error,
            };
        }
        match self.read_pid(name) {
            Some(pid) if self.pid_alive(pid) => ServiceStatus::Active,
            _ => ServiceStatus::Inactive,
        }
    }

    fn start_service(
        &self,
        name: &str,
        spec: &ServiceSpec,
        children: &mut BTreeMap<String, Child>,
    ) -> ContainerResult<()> {
        let argv = spec.argv();
        if argv.is_empty() {
            return Err(DomainError::InvalidLayer {
                service: name.to_string(),
                message: "no command defined".into(),
            }
            .into());
        }

        let (uid, gid) = self.identity(spec.user.as_deref(), spec.group.as_deref())?;
        let invocation = Invocation {
            argv,
            env: spec.environment.clone(),
            cwd: Some(self.root.clone()),
            uid,
            gid,
        };

        let log = self.service_log(name);
        let pid_file = self.pid_file(name);
        self.fs
            .ensure_parent(&log)
            .and_then(|_| self.fs.ensure_parent(&pid_file))
            .map_err(|e| ContainerError::io("create supervisor state directories", e))?;

        let mut child = self
            .cmd
            .spawn(&invocation, Some(&log))
            .map_err(|e| ContainerError::io(format!("spawn service {name}"), e))?;
        if let Err(e) = self.fs.write(&pid_file, &child.id().to_string()) {
            warn!(service = name, pid = child.id(), "cannot record pid, killing service");
            let _ = killpg(Pid::from_raw(child.id() as i32), Signal::SIGKILL);
            let _ = child.wait();
            return Err(ContainerError::io(format!("write {}", pid_file.display()), e));
        }

        info!(service = name, pid = child.id(), "service started");
        children.insert(name.to_string(), child);
        Ok(())
    }

    fn stop_service(&self, name: &str, children: &mut BTreeMap<String, Child>) -> ContainerResult<()> {
        if let Some(mut child) = children.remove(name) {
            self.terminate_child(name, &mut child)?;
        } else if let Some(pid) = self.read_pid(name) {
            self.terminate_pid(name, pid);
        }

        let pid_file = self.pid_file(name);
        if self.fs.exists(&pid_file) {
            self.fs
                .remove_file(&pid_file)
                .map_err(|e| ContainerError::io(format!("remove {}", pid_file.display()), e))?;
        }
        Ok(())
    }

    fn terminate_child(&self, name: &str, child: &mut Child) -> ContainerResult<()> {
        let wait_err = |e| ContainerError::io(format!("wait for service {name}"), e);
        if child.try_wait().map_err(wait_err)?.is_some() {
            return Ok(());
        }

        let pid = Pid::from_raw(child.id() as i32);
        debug!(service = name, %pid, "sending SIGTERM");
        let _ = killpg(pid, Signal::SIGTERM);

        let deadline = Instant::now() + self.stop_timeout;
        while Instant::now() < deadline {
            if child.try_wait().map_err(wait_err)?.is_some() {
                info!(service = name, "service stopped");
                return Ok(());
            }
            std::thread::sleep(STOP_POLL);
        }

        warn!(service = name, %pid, "service did not exit after SIGTERM, killing");
        let _ = killpg(pid, Signal::SIGKILL);
        child.wait().map_err(wait_err)?;
        Ok(())
    }

    /// Stop a service started by another supervisor instance.
    fn terminate_pid(&self, name: &str, pid: Pid) {
        if !self.pid_alive(pid) {
            return;
        }

        debug!(service = name, %pid, "sending SIGTERM");
        let _ = killpg(pid, Signal::SIGTERM);

        let deadline = Instant::now() + self.stop_timeout;
        while Instant::now() < deadline {
            if !self.pid_alive(pid) {
                info!(service = name, "service stopped");
                return;
            }
            std::thread::sleep(STOP_POLL);
        }

        warn!(service = name, %pid, "service did not exit after SIGTERM, killing");
        let _ = killpg(pid, Signal::SIGKILL);
    }

    fn lookup<'a>(layer: &'a Layer, name: &str) -> ContainerResult<&'a ServiceSpec> {
        layer
            .services
            .get(name)
            .ok_or_else(|| ContainerError::ServiceNotFound(name.to_string()))
    }
}

impl Container for LocalContainer {
    fn can_connect(&self) -> bool {
        self.fs.is_dir(&self.root)
    }

    #[instrument(level = "debug", skip(self, layer))]
    fn add_layer(&self, label: &str, layer: &Layer, combine: bool) -> ContainerResult<()> {
        self.ensure_connected()?;
        let _children = self.lock_children();
        let mut plan = self.load_plan()?;
        plan.add_layer(label, layer, combine)?;
        self.save_plan(&plan)
    }

    fn plan(&self) -> ContainerResult<Layer> {
        self.ensure_connected()?;
        let _children = self.lock_children();
        Ok(self.load_plan()?.combined()?)
    }

    #[instrument(level = "debug", skip(self))]
    fn start(&self, services: &[&str]) -> ContainerResult<()> {
        self.ensure_connected()?;
        let mut children = self.lock_children();
        let plan = self.load_plan()?.combined()?;
        for name in services {
            let spec = Self::lookup(&plan, name)?;
            if self.status_of(name, &mut children) == ServiceStatus::Active {
                debug!(service = name, "already running");
                continue;
            }
            self.start_service(name, spec, &mut children)?;
        }
        Ok(())
    }

    #[instrument(level = "debug", skip(self))]
    fn restart(&self, services: &[&str]) -> ContainerResult<()> {
        self.ensure_connected()?;
        let mut children = self.lock_children();
        let plan = self.load_plan()?.combined()?;
        for name in services {
            let spec = Self::lookup(&plan, name)?;
            self.stop_service(name, &mut children)?;
            self.start_service(name, spec, &mut children)?;
        }
        Ok(())
    }

    #[instrument(level = "debug", skip(self))]
    fn stop(&self, services: &[&str]) -> ContainerResult<()> {
        self.ensure_connected()?;
        let mut children = self.lock_children();
        let plan = self.load_plan()?.combined()?;
        for name in services {
            Self::lookup(&plan, name)?;
            self.stop_service(name, &mut children)?;
        }
        Ok(())
    }

    fn get_services(&self, names: &[&str]) -> ContainerResult<BTreeMap<String, ServiceInfo>> {
        self.ensure_connected()?;
        let mut children = self.lock_children();
        let plan = self.load_plan()?.combined()?;

        let mut result = BTreeMap::new();
        for (name, spec) in &plan.services {
            if !names.is_empty() && !names.contains(&name.as_str()) {
                continue;
            }
            let current = self.status_of(name, &mut children);
            result.insert(
                name.clone(),
                ServiceInfo {
                    name: name.clone(),
                    startup: spec.startup.unwrap_or_default(),
                    current,
                },
            );
        }
        Ok(result)
    }

    fn get_service(&self, name: &str) -> ContainerResult<ServiceInfo> {
        self.get_services(&[name])?
            .remove(name)
            .ok_or_else(|| ContainerError::ServiceNotFound(name.to_string()))
    }

    fn exists(&self, path: &Path) -> ContainerResult<bool> {
        self.ensure_connected()?;
        Ok(self.fs.exists(&self.resolve(path)?))
    }

    fn read_text(&self, path: &Path) -> ContainerResult<String> {
        self.ensure_connected()?;
        let host_path = self.resolve(path)?;
        self.fs
            .read_to_string(&host_path)
            .map_err(|e| ContainerError::io(format!("read {}", path.display()), e))
    }

    #[instrument(level = "debug", skip(self, content))]
    fn write_text(
        &self,
        path: &Path,
        content: &str,
        owner: &Ownership,
        mode: WriteMode,
    ) -> ContainerResult<()> {
        self.ensure_connected()?;
        let host_path = self.resolve(path)?;
        let io_err = |e| ContainerError::io(format!("write {}", path.display()), e);

        self.fs.ensure_parent(&host_path).map_err(io_err)?;
        match mode {
            WriteMode::Overwrite => self.fs.write(&host_path, content),
            WriteMode::Append => self.fs.append(&host_path, content),
        }
        .map_err(io_err)?;

        let (uid, gid) = self.identity(Some(&owner.user), Some(&owner.group))?;
        if uid.is_some() || gid.is_some() {
            self.fs.chown(&host_path, uid, gid).map_err(io_err)?;
        }
        Ok(())
    }

    #[instrument(level = "debug", skip(self), fields(command = ?request.command))]
    fn exec(&self, request: &ExecRequest) -> ContainerResult<String> {
        self.ensure_connected()?;
        let cwd = match &request.working_dir {
            Some(dir) => self.resolve(dir)?,
            None => self.root.clone(),
        };
        let invocation = Invocation {
            argv: request.command.clone(),
            env: request.environment.clone(),
            cwd: Some(cwd),
            uid: None,
            gid: None,
        };

        if request.combine_stderr {
            let output = self.cmd.run_combined(&invocation).map_err(spawn_failure)?;
            if output.status.success() {
                return Ok(output.output);
            }
            return Err(ContainerError::Exec {
                exit_code: output.status.code(),
                stdout: output.output,
                stderr: String::new(),
            });
        }

        let output = self.cmd.run(&invocation).map_err(spawn_failure)?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if output.status.success() {
            Ok(stdout)
        } else {
            Err(ContainerError::Exec {
                exit_code: output.status.code(),
                stdout,
                stderr,
            })
        }
    }
}

/// A command that cannot be started is reported like a failed execution.
fn spawn_failure(e: std::io::Error) -> ContainerError {
    ContainerError::Exec {
        exit_code: None,
        stdout: String::new(),
        stderr: e.to_string(),
    }
}

/// State letter from `/proc/<pid>/stat`; the command name may contain `)`.
fn process_state(stat: &str) -> Option<char> {
    let (_, rest) = stat.rsplit_once(')')?;
    rest.trim_start().chars().next()
}

/// Join a container-absolute path under `root`; `None` if it climbs out.
fn join_under(root: &Path, path: &Path) -> Option<PathBuf> {
    let mut resolved = root.to_path_buf();
    for component in path.components() {
        match component {
            Component::RootDir | Component::CurDir => {}
            Component::Normal(part) => resolved.push(part),
            Component::ParentDir | Component::Prefix(_) => return None,
        }
    }
    Some(resolved)
}
