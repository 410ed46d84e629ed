//! CLI-level errors (wraps workload errors)

use thiserror::Error;

use crate::application::WorkloadError;

/// CLI errors are the top-level error type.
/// These are what get displayed to the user.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    Workload(#[from] WorkloadError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("{0}")]
    Usage(String),
}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

impl CliError {
    /// Get the appropriate exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::InvalidArgs(_) | CliError::Usage(_) => crate::exitcode::USAGE,
            CliError::Io(_) => crate::exitcode::IOERR,
            CliError::Workload(e) => match e {
                WorkloadError::ConnectionUnavailable(_) => crate::exitcode::UNAVAILABLE,
                WorkloadError::ServiceNotFound(_) => crate::exitcode::UNAVAILABLE,
                WorkloadError::ExecutionFailed { .. } => crate::exitcode::SOFTWARE,
                WorkloadError::Domain(_) => crate::exitcode::DATAERR,
                WorkloadError::Config { .. } => crate::exitcode::CONFIG,
                WorkloadError::OperationFailed { .. } => crate::exitcode::IOERR,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_execution_failure_when_mapping_then_software() {
        let err = CliError::from(WorkloadError::ExecutionFailed {
            command: vec!["false".into()],
            exit_code: Some(1),
            stdout: String::new(),
            stderr: String::new(),
        });

        assert_eq!(err.exit_code(), crate::exitcode::SOFTWARE);
    }

    #[test]
    fn given_connection_loss_when_mapping_then_unavailable() {
        let err = CliError::from(WorkloadError::ConnectionUnavailable("/srv".into()));

        assert_eq!(err.exit_code(), crate::exitcode::UNAVAILABLE);
    }

    #[test]
    fn given_config_error_when_mapping_then_config() {
        let err = CliError::from(WorkloadError::Config {
            message: "bad".into(),
        });

        assert_eq!(err.exit_code(), crate::exitcode::CONFIG);
    }
}
