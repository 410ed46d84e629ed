//! Application-level errors (wraps domain and container errors)

use thiserror::Error;

use crate::domain::DomainError;
use crate::infrastructure::ContainerError;

/// Errors surfaced by workload operations.
#[derive(Error, Debug)]
pub enum WorkloadError {
    #[error("container unavailable: {0}")]
    ConnectionUnavailable(String),

    /// A command exited abnormally or the supervisor reported an execution fault.
    #[error("command {command:?} failed (exit code {exit_code:?})")]
    ExecutionFailed {
        command: Vec<String>,
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("service {0:?} not found")]
    ServiceNotFound(String),

    #[error("{0}")]
    Domain(#[from] DomainError),

    #[error("config error: {message}")]
    Config { message: String },

    #[error("operation failed: {context}")]
    OperationFailed {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl From<ContainerError> for WorkloadError {
    fn from(e: ContainerError) -> Self {
        match e {
            ContainerError::ConnectionUnavailable { endpoint } => Self::ConnectionUnavailable(endpoint),
            ContainerError::ServiceNotFound(name) => Self::ServiceNotFound(name),
            ContainerError::Layer(e) => Self::Domain(e),
            ContainerError::Exec {
                exit_code,
                stdout,
                stderr,
            } => Self::ExecutionFailed {
                command: Vec::new(),
                exit_code,
                stdout,
                stderr,
            },
            other => Self::OperationFailed {
                context: other.to_string(),
                source: Box::new(other),
            },
        }
    }
}

/// Result type for workload operations.
pub type WorkloadResult<T> = Result<T, WorkloadError>;
