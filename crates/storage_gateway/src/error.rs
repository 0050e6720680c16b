//! Error types for storage gateway operations.

use strum::{AsRefStr, Display};

/// Result type for storage gateway operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// The gateway operation an error or metric refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Operation {
    Upload,
    Download,
    Delete,
    Exists,
    List,
    SignedUrl,
    GetMetadata,
    SetMetadata,
}

/// Errors surfaced by the gateway.
///
/// Backend-native errors never cross the backend boundary; they are wrapped
/// into [`StorageError::BackendFailure`] together with the operation and the
/// object they were raised for.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StorageError {
    /// The connection descriptor or gateway configuration is malformed.
    #[error("storage configuration error: {reason}")]
    Configuration { reason: String },

    /// The object or file does not exist.
    #[error("not found: {container}/{path}")]
    NotFound { container: String, path: String },

    /// The container or path cannot be addressed by the backend.
    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// The backend has no such capability (e.g. metadata on local storage).
    #[error("{operation} is not supported by the {backend} backend")]
    UnsupportedOperation {
        operation: Operation,
        backend: &'static str,
    },

    /// The underlying filesystem or storage service failed.
    #[error("{operation} failed for {container}/{path}: {source:#}")]
    BackendFailure {
        operation: Operation,
        container: String,
        path: String,
        source: anyhow::Error,
    },

    /// The connection descriptor could not be fetched from the secret store.
    #[error("connection secret unavailable: {source:#}")]
    SecretUnavailable { source: anyhow::Error },
}

impl StorageError {
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    pub fn not_found(container: impl Into<String>, path: impl Into<String>) -> Self {
        Self::NotFound {
            container: container.into(),
            path: path.into(),
        }
    }

    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn backend(
        operation: Operation,
        container: impl Into<String>,
        path: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::BackendFailure {
            operation,
            container: container.into(),
            path: path.into(),
            source: source.into(),
        }
    }

    /// Identifies errors caused by the caller or the deployment rather than
    /// by the storage service.
    pub fn is_misconfiguration(&self) -> bool {
        matches!(
            self,
            Self::Configuration { .. } | Self::InvalidPath { .. } | Self::UnsupportedOperation { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_labels() {
        assert_eq!(Operation::SignedUrl.as_ref(), "signed_url");
        assert_eq!(Operation::GetMetadata.to_string(), "get_metadata");
    }

    #[test]
    fn test_backend_failure_carries_context() {
        let err = StorageError::backend(
            Operation::Download,
            "docs",
            "a/b.txt",
            anyhow::anyhow!("connection reset"),
        );
        let message = err.to_string();
        assert!(message.contains("download"));
        assert!(message.contains("docs/a/b.txt"));
        assert!(message.contains("connection reset"));
        assert!(!err.is_misconfiguration());
    }

    #[test]
    fn test_misconfiguration_kinds() {
        assert!(StorageError::configuration("bad").is_misconfiguration());
        assert!(StorageError::invalid_path("../x", "parent segment").is_misconfiguration());
        assert!(StorageError::UnsupportedOperation {
            operation: Operation::SetMetadata,
            backend: "local",
        }
        .is_misconfiguration());
        assert!(!StorageError::not_found("docs", "x").is_misconfiguration());
    }
}
