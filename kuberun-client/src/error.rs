//! Error types for the scheduler client

use kuberun_core::domain::job::StatusError;
use thiserror::Error;

/// Result type alias for scheduler operations
pub type Result<T> = std::result::Result<T, SchedulerError>;

/// Errors that can occur when talking to the cluster control plane
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The client binary or endpoint cannot be reached at all
    #[error("Scheduler client '{binary}' is not available: {reason}")]
    Unavailable { binary: String, reason: String },

    /// The client process could not be spawned
    #[error("Failed to execute '{command}': {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The client process ran but reported failure
    #[error("'{command}' failed (exit_code={exit_code}): {stderr}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    /// The control plane answered with something we could not understand
    #[error("Failed to parse scheduler response: {0}")]
    Parse(String),

    /// A job with the same name is already present
    #[error("Job already exists: {0}")]
    AlreadyExists(String),

    /// No workload exists (yet) for the job
    #[error("No workload found for job: {0}")]
    NotFound(String),

    /// The control plane reported a state outside the recognized vocabulary
    #[error("Unknown state encountered: {0}")]
    UnknownState(String),
}

impl SchedulerError {
    /// Check if this error is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if this error is a transport-level failure that may succeed on retry
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::CommandFailed { .. })
    }
}

impl From<StatusError> for SchedulerError {
    fn from(err: StatusError) -> Self {
        match err {
            StatusError::UnknownState(name) => Self::UnknownState(name),
            other => Self::Parse(other.to_string()),
        }
    }
}
