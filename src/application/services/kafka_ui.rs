//! Kafka UI workload controller
//!
//! Translates workload verbs into calls against a [`Container`] and builds
//! the service layer consumed by its supervisor. Holds no mutable state of
//! its own: everything lives in the container.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, error, info, Dispatch};

use crate::application::retry::ProbeRetry;
use crate::application::workload::Workload;
use crate::application::{WorkloadError, WorkloadResult};
use crate::config::Settings;
use crate::domain::{EnvMap, Layer, Override, ServiceInfo, ServiceSpec, Startup, WriteMode};
use crate::infrastructure::container::{Container, ExecRequest};
use crate::infrastructure::net::probe_tcp;
use crate::infrastructure::ContainerError;

const LAYER_SUMMARY: &str = "Kafka UI Layer";
const LAYER_DESCRIPTION: &str = "Supervisor config layer for Apache Kafka UI";
const SERVICE_SUMMARY: &str = "Kafka UI";

pub struct KafkaUiWorkload {
    container: Arc<dyn Container>,
    settings: Arc<Settings>,
    retry: ProbeRetry,
    log: Dispatch,
}

impl KafkaUiWorkload {
    /// Create a workload logging through the dispatcher current at construction.
    pub fn new(container: Arc<dyn Container>, settings: Arc<Settings>) -> Self {
        let retry = ProbeRetry::new(settings.probe.attempts, settings.probe.interval());
        let log = tracing::dispatcher::get_default(Dispatch::clone);
        Self {
            container,
            settings,
            retry,
            log,
        }
    }

    /// Replace the readiness retry policy.
    pub fn with_retry(mut self, retry: ProbeRetry) -> Self {
        self.retry = retry;
        self
    }

    /// Route this workload's logs to `log`.
    pub fn with_dispatch(mut self, log: Dispatch) -> Self {
        self.log = log;
        self
    }

    pub fn service(&self) -> &str {
        &self.settings.service.name
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Parse `KEY=VALUE` entries into an ordered map.
    pub fn map_env<I, S>(env: I) -> EnvMap
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        EnvMap::parse(env)
    }

    /// Supervisor view of the service, `None` while it is not in the plan.
    pub fn service_info(&self) -> WorkloadResult<Option<ServiceInfo>> {
        self.logged(|| {
            Ok(self
                .container
                .get_services(&[self.service()])?
                .remove(self.service()))
        })
    }

    fn logged<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.log, f)
    }

    fn probe_once(&self) -> WorkloadResult<bool> {
        if !self.installed() {
            debug!("container not reachable");
            return Ok(false);
        }

        if !self.container.get_services(&[self.service()])?.contains_key(self.service()) {
            debug!(service = self.service(), "service not registered");
            return Ok(false);
        }

        Ok(self.container.get_service(self.service())?.is_running())
    }
}

impl Workload for KafkaUiWorkload {
    fn start(&self) -> WorkloadResult<()> {
        self.logged(|| {
            let label = &self.settings.service.layer_label;
            self.container.add_layer(label, &self.layer(), true)?;
            self.container.restart(&[self.service()])?;
            info!(service = self.service(), layer = %label, "service layer applied and restarted");
            Ok(())
        })
    }

    fn stop(&self) -> WorkloadResult<()> {
        self.logged(|| {
            self.container.stop(&[self.service()])?;
            info!(service = self.service(), "service stopped");
            Ok(())
        })
    }

    fn restart(&self) -> WorkloadResult<()> {
        self.start()
    }

    fn read(&self, path: &Path) -> WorkloadResult<Vec<String>> {
        self.logged(|| {
            if !self.container.exists(path)? {
                debug!(path = %path.display(), "file absent, nothing to read");
                return Ok(Vec::new());
            }
            let content = self.container.read_text(path)?;
            Ok(content.split('\n').map(str::to_string).collect())
        })
    }

    fn write(&self, content: &str, path: &Path, mode: WriteMode) -> WorkloadResult<()> {
        self.logged(|| {
            let owner = self.settings.ownership();
            self.container.write_text(path, content, &owner, mode)?;
            debug!(path = %path.display(), ?mode, %owner, bytes = content.len(), "file written");
            Ok(())
        })
    }

    fn exec(
        &self,
        command: &[String],
        env: Option<&BTreeMap<String, String>>,
        working_dir: Option<&Path>,
    ) -> WorkloadResult<String> {
        self.logged(|| {
            let request = ExecRequest {
                command: command.to_vec(),
                environment: env.cloned().unwrap_or_default(),
                working_dir: working_dir.map(Path::to_path_buf),
                combine_stderr: true,
            };
            debug!(cmd = ?command, "exec");

            match self.container.exec(&request) {
                Ok(output) => Ok(output),
                Err(ContainerError::Exec {
                    exit_code,
                    stdout,
                    stderr,
                }) => {
                    error!("cmd failed - cmd={command:?}, stdout={stdout}, stderr={stderr}");
                    let err = WorkloadError::ExecutionFailed {
                        command: command.to_vec(),
                        exit_code,
                        stdout,
                        stderr,
                    };
                    error!("{err}");
                    Err(err)
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    fn active(&self) -> WorkloadResult<bool> {
        self.logged(|| self.retry.run(|| self.probe_once()))
    }

    fn check_socket(&self, host: &str, port: u16) -> bool {
        self.logged(|| probe_tcp(host, port, self.settings.probe.socket_timeout()))
    }

    fn installed(&self) -> bool {
        self.container.can_connect()
    }

    fn container_can_connect(&self) -> bool {
        self.container.can_connect()
    }

    fn layer(&self) -> Layer {
        let spec = ServiceSpec {
            override_strategy: Some(Override::Merge),
            summary: Some(SERVICE_SUMMARY.into()),
            command: Some(self.settings.jvm_command().command_line()),
            startup: Some(Startup::Enabled),
            user: Some(self.settings.service.user.clone()),
            group: Some(self.settings.service.group.clone()),
            environment: BTreeMap::new(),
        };

        Layer {
            summary: LAYER_SUMMARY.into(),
            description: LAYER_DESCRIPTION.into(),
            services: BTreeMap::from([(self.service().to_string(), spec)]),
        }
    }

    fn set_environment(&self, env_vars: &[String]) -> WorkloadResult<()> {
        let env_file = Path::new(&self.settings.paths.env_file);
        let current = Self::map_env(self.read(env_file)?);
        let updated = current.merged(Self::map_env(env_vars));
        self.logged(|| debug!(path = %env_file.display(), keys = updated.len(), "rewriting environment"));
        self.write(&updated.render(), env_file, WriteMode::Overwrite)
    }
}
