//! Error taxonomy for the lifecycle controller
//!
//! Registry and rollback errors abort the current operation and propagate
//! verbatim. Detection-layer data problems never surface here; they degrade
//! to safe defaults inside the detector and metrics store.

use std::path::PathBuf;
use std::time::Duration;

/// Result type for lifecycle operations
pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Errors that can occur while detecting, approving, registering or rolling back
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// Unknown version number (or no candidate version for the request)
    #[error("Version not found: {0}")]
    NotFound(String),

    /// Ledger references missing storage, or an operation would break an invariant
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// Invalid threshold or configuration values
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Filesystem failure during copy/remove/write, retryable at the caller's discretion
    #[error("I/O error at {path}: {source}")]
    TransientIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The generated artifact failed its own checks
    #[error("Validation failed: {0}")]
    ValidationFailure(String),

    /// An external step did not finish in time
    #[error("{step} timed out after {}s", .limit.as_secs())]
    Timeout { step: String, limit: Duration },

    /// Another process holds the single-writer lock for this codebase
    #[error("Codebase '{0}' is locked by another process")]
    LockContended(String),

    #[error("Failed to serialize document: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LifecycleError {
    /// Wrap an I/O error with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LifecycleError::TransientIo {
            path: path.into(),
            source,
        }
    }

    /// Whether retrying the operation later may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LifecycleError::TransientIo { .. }
                | LifecycleError::Timeout { .. }
                | LifecycleError::LockContended(_)
        )
    }
}

/// Attach a path to `std::io::Result` values
pub(crate) trait IoContext<T> {
    fn at_path(self, path: &std::path::Path) -> LifecycleResult<T>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn at_path(self, path: &std::path::Path) -> LifecycleResult<T> {
        self.map_err(|e| LifecycleError::io(path, e))
    }
}
