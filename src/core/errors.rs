use thiserror::Error;
use super::types::UploadStatus;

#[derive(Error, Debug)]
pub enum TaskError {
    #[error("{0}")]
    Validation(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Server error: status code {status_code}, message: {message}")]
    Server {
        status_code: u16,
        message: String,
    },

    #[error("{0}")]
    TaskFailure(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Cannot {action} while {status}")]
    InvalidTransition {
        action: &'static str,
        status: UploadStatus,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Manager shutdown")]
    ManagerShutdown,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TaskError {
    pub fn server_error(status_code: u16, message: impl Into<String>) -> Self {
        Self::Server {
            status_code,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Transport level failures, the only kind a tolerant poller may absorb
    pub fn is_transient(&self) -> bool {
        matches!(self, TaskError::Network(_))
    }
}

impl From<reqwest::Error> for TaskError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return TaskError::server_error(status.as_u16(), err.to_string());
        }

        if err.is_decode() {
            return TaskError::InvalidResponse(err.to_string());
        }

        TaskError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for TaskError {
    fn from(err: serde_json::Error) -> Self {
        TaskError::InvalidResponse(err.to_string())
    }
}

/// Error alias
pub type Result<T, E = TaskError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = TaskError::server_error(502, "Bad Gateway");
        assert_eq!(err.to_string(), "Server error: status code 502, message: Bad Gateway");

        let err = TaskError::InvalidTransition { action: "submit", status: UploadStatus::Uploading };
        assert_eq!(err.to_string(), "Cannot submit while uploading");
    }

    #[test]
    fn test_only_network_errors_are_transient() {
        assert!(TaskError::network("connection reset").is_transient());
        assert!(!TaskError::server_error(500, "boom").is_transient());
        assert!(!TaskError::TaskFailure("bad audio".into()).is_transient());
    }
}
