//! Domain layer: entities and business logic
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod command;
pub mod entities;
pub mod env;
pub mod error;
pub mod layer;

pub use command::{JvmCommand, APPLICATION_CONFIG_FILE};
pub use entities::*;
pub use env::{parse_entry, EnvMap};
pub use error::DomainError;
pub use layer::{LabeledLayer, Layer, Override, Plan, ServiceSpec, Startup};

/// Expand `~`, `$VAR` and `${VAR}` in a host path string.
pub fn expand_env_vars(path: &str) -> String {
    shellexpand::full(path)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| path.to_string())
}
