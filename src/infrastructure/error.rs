//! Errors raised at the container boundary

use std::path::PathBuf;

use thiserror::Error;

use crate::domain::DomainError;

/// Failures reported by a [`Container`](crate::infrastructure::container::Container) backend.
#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("cannot connect to container at {endpoint}")]
    ConnectionUnavailable { endpoint: String },

    #[error("service {0:?} is not defined in the plan")]
    ServiceNotFound(String),

    /// The command ran but exited abnormally, or could not be started.
    #[error("exec failed (exit code {exit_code:?})")]
    Exec {
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("{0}")]
    Layer(#[from] DomainError),

    #[error("path escapes the container root: {0}")]
    InvalidPath(PathBuf),

    #[error("unknown {kind}: {name}")]
    UnknownIdentity { kind: &'static str, name: String },

    #[error("I/O error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl ContainerError {
    /// Create an I/O error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

/// Result type for container backend operations.
pub type ContainerResult<T> = Result<T, ContainerError>;
