//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/kafka-ui-workload/kafka-ui-workload.toml`
//! 3. Explicit config file (`--config`)
//! 4. Environment variables: `KAFKA_UI_WORKLOAD__*` (`__` separates sections)

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, ConfigError, Environment, File, FileFormat};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::application::WorkloadError;
use crate::domain::{expand_env_vars, JvmCommand, Ownership};

const APP_NAME: &str = "kafka-ui-workload";
const ENV_PREFIX: &str = "KAFKA_UI_WORKLOAD";

/// Supervised service identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name inside the layer
    pub name: String,
    /// Label the layer is added under
    pub layer_label: String,
    /// User the service runs as and files are owned by
    pub user: String,
    pub group: String,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "kafka-ui".into(),
            layer_label: "kafka-ui".into(),
            user: "kafkaui".into(),
            group: "kafkaui".into(),
        }
    }
}

/// Container paths the workload reads and writes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathSettings {
    pub config_dir: String,
    pub env_file: String,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            config_dir: "/etc/kafka-ui".into(),
            env_file: "/etc/environment".into(),
        }
    }
}

/// JVM startup flags.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct JvmSettings {
    pub heap: String,
    pub gc: String,
    pub add_opens: Vec<String>,
    pub jar: String,
}

impl Default for JvmSettings {
    fn default() -> Self {
        Self {
            heap: "1G".into(),
            gc: "UseG1GC".into(),
            add_opens: vec!["java.rmi/javax.rmi.ssl=ALL-UNNAMED".into()],
            jar: "/opt/kafka-ui/libs/api-1.3.0.jar".into(),
        }
    }
}

/// Readiness probe and socket check tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProbeSettings {
    pub attempts: u32,
    pub interval_ms: u64,
    pub socket_timeout_ms: u64,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            attempts: 5,
            interval_ms: 1000,
            socket_timeout_ms: 2000,
        }
    }
}

impl ProbeSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn socket_timeout(&self) -> Duration {
        Duration::from_millis(self.socket_timeout_ms)
    }
}

/// Unified configuration for the workload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Host directory the container filesystem is rooted at
    pub container_root: PathBuf,
    /// Supervisor state directory, as a container path
    pub state_dir: String,
    pub service: ServiceSettings,
    pub paths: PathSettings,
    pub jvm: JvmSettings,
    pub probe: ProbeSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            container_root: PathBuf::from("/"),
            state_dir: crate::infrastructure::local::DEFAULT_STATE_DIR.into(),
            service: ServiceSettings::default(),
            paths: PathSettings::default(),
            jvm: JvmSettings::default(),
            probe: ProbeSettings::default(),
        }
    }
}

/// Get the XDG config directory.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join(format!("{APP_NAME}.toml")))
}

impl Settings {
    /// Owner applied to files the workload writes.
    pub fn ownership(&self) -> Ownership {
        Ownership::new(&self.service.user, &self.service.group)
    }

    /// Startup command built from the JVM and path settings.
    pub fn jvm_command(&self) -> JvmCommand {
        JvmCommand {
            config_dir: self.paths.config_dir.clone(),
            heap: self.jvm.heap.clone(),
            gc: self.jvm.gc.clone(),
            add_opens: self.jvm.add_opens.clone(),
            jar: self.jvm.jar.clone(),
        }
    }

    /// Expand shell variables and tilde in host path fields.
    ///
    /// Container paths are left untouched.
    fn expand_paths(&mut self) {
        let expanded = expand_env_vars(self.container_root.to_string_lossy().as_ref());
        self.container_root = PathBuf::from(expanded);
    }

    /// Reject values the workload cannot operate with.
    pub fn validate(&self) -> Result<(), WorkloadError> {
        if self.service.name.trim().is_empty() {
            return Err(config_message("service.name must not be empty"));
        }
        if self.service.layer_label.trim().is_empty() {
            return Err(config_message("service.layer_label must not be empty"));
        }
        if self.probe.attempts == 0 {
            return Err(config_message("probe.attempts must be at least 1"));
        }
        if self.probe.socket_timeout_ms == 0 {
            return Err(config_message("probe.socket_timeout_ms must be positive"));
        }
        if !self.paths.env_file.starts_with('/') || !self.paths.config_dir.starts_with('/') {
            return Err(config_message("paths must be absolute container paths"));
        }
        Ok(())
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `explicit` - Optional config file given on the command line (must exist)
    pub fn load(explicit: Option<&Path>) -> Result<Self, WorkloadError> {
        Self::load_from(global_config_path().as_deref(), explicit)
    }

    /// Load settings from an optional global file and an optional explicit file.
    pub fn load_from(global: Option<&Path>, explicit: Option<&Path>) -> Result<Self, WorkloadError> {
        // 1. Compiled defaults
        let defaults = Config::try_from(&Settings::default()).map_err(config_err)?;
        let mut builder = Config::builder().add_source(defaults);

        // 2. Global config, if present
        if let Some(path) = global {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(false));
        }

        // 3. Explicit config must exist
        if let Some(path) = explicit {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }

        // 4. Environment overrides
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("jvm.add_opens")
                .try_parsing(true),
        );

        let mut settings: Self = builder
            .build()
            .and_then(|config| config.try_deserialize())
            .map_err(config_err)?;

        settings.expand_paths();
        settings.validate()?;
        Ok(settings)
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, WorkloadError> {
        toml::to_string_pretty(self).map_err(|e| config_message(format!("serialize config: {e}")))
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# kafka-ui-workload configuration
#
# Locations (by precedence, lowest to highest):
#   Global:   ~/.config/kafka-ui-workload/kafka-ui-workload.toml
#   Explicit: --config <file>
#   Env:      KAFKA_UI_WORKLOAD__<SECTION>__<KEY>, e.g. KAFKA_UI_WORKLOAD__PROBE__ATTEMPTS=3

# Host directory the container filesystem is rooted at
# container_root = "/"

# Supervisor state (plan, pid files, service logs), as a container path
# state_dir = "/var/lib/kafka-ui-workload"

[service]
# name = "kafka-ui"
# layer_label = "kafka-ui"
# user = "kafkaui"
# group = "kafkaui"

[paths]
# config_dir = "/etc/kafka-ui"
# env_file = "/etc/environment"

[jvm]
# heap = "1G"
# gc = "UseG1GC"
# add_opens = ["java.rmi/javax.rmi.ssl=ALL-UNNAMED"]
# jar = "/opt/kafka-ui/libs/api-1.3.0.jar"

[probe]
# attempts = 5
# interval_ms = 1000
# socket_timeout_ms = 2000
"#
        .to_string()
    }
}

fn config_message(message: impl Into<String>) -> WorkloadError {
    WorkloadError::Config {
        message: message.into(),
    }
}

fn config_err(e: ConfigError) -> WorkloadError {
    config_message(e.to_string())
}
