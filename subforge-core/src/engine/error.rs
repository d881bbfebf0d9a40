//! Error taxonomy for lifecycle operations.

use thiserror::Error;

/// Failure of an engine lifecycle operation.
///
/// Every variant carries a human-readable cause; the UI shows `to_string()`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("whisper.cpp is not installed, install it first")]
    NotInstalled,

    #[error("Failed to fetch whisper.cpp: {0}")]
    FetchFailed(String),

    #[error("Failed to build whisper.cpp: {0}")]
    BuildFailed(String),

    #[error("Model download failed: {0}")]
    DownloadFailed(String),

    #[error("Failed to unpack model archive: {0}")]
    UnpackFailed(String),

    #[error("Filesystem error: {0}")]
    FilesystemFailed(String),

    #[error("Invalid model name: {0}")]
    InvalidAsset(String),
}

impl LifecycleError {
    pub(crate) fn fs(context: &str, err: impl std::fmt::Display) -> Self {
        Self::FilesystemFailed(format!("{context}: {err}"))
    }
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_carry_cause() {
        let err = LifecycleError::FetchFailed("connection reset".to_string());
        assert!(err.to_string().contains("connection reset"));

        let err = LifecycleError::fs("Failed to remove /tmp/x", "permission denied");
        assert_eq!(
            err,
            LifecycleError::FilesystemFailed("Failed to remove /tmp/x: permission denied".into())
        );
    }
}
