//! Domain-level errors (no external dependencies)

use thiserror::Error;

/// Domain errors represent violations of layer and env-file rules.
/// These are independent of infrastructure concerns.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid layer: service {service:?}: {message}")]
    InvalidLayer { service: String, message: String },

    #[error("layer {0:?} already exists")]
    LayerConflict(String),

    #[error("layer format error: {message}")]
    LayerFormat { message: String },
}
