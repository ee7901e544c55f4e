//! Error types for partitioned array operations.

use thiserror::Error;

/// Errors that can occur while creating or computing partitioned arrays.
///
/// No-data is deliberately absent: missing values are a regular value
/// state handled by policies, never an error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArrayError {
    /// Shapes, ranks or arguments that cannot work together.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An input value outside the valid domain of an operation, raised
    /// when the domain policy rejects instead of marking no-data.
    #[error("input outside valid domain: {0}")]
    Domain(String),

    /// The component owning a partition no longer exists.
    #[error("remote access failed: {0}")]
    RemoteAccess(String),

    /// A dataflow task failed or panicked.
    #[error("task failed: {0}")]
    Task(String),
}

impl ArrayError {
    /// Create a Configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a Domain error.
    pub fn domain(msg: impl Into<String>) -> Self {
        Self::Domain(msg.into())
    }

    /// Create a RemoteAccess error.
    pub fn remote_access(msg: impl Into<String>) -> Self {
        Self::RemoteAccess(msg.into())
    }

    /// Create a Task error.
    pub fn task(msg: impl Into<String>) -> Self {
        Self::Task(msg.into())
    }

    /// Whether this error means a partition is gone.
    pub fn is_remote_access(&self) -> bool {
        matches!(self, Self::RemoteAccess(_))
    }
}

impl From<tokio::task::JoinError> for ArrayError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task(err.to_string())
    }
}

impl From<tokio::sync::oneshot::error::RecvError> for ArrayError {
    fn from(_: tokio::sync::oneshot::error::RecvError) -> Self {
        Self::RemoteAccess("partition dropped the request before replying".to_string())
    }
}

/// Result type for partitioned array operations.
pub type Result<T> = std::result::Result<T, ArrayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ArrayError::configuration("partition shape [3, 3] does not tile [4, 4]");
        assert_eq!(
            err.to_string(),
            "configuration error: partition shape [3, 3] does not tile [4, 4]"
        );
        assert!(ArrayError::remote_access("gone").is_remote_access());
        assert!(!ArrayError::task("boom").is_remote_access());
    }
}
