//! Run-level errors
//!
//! Anything that ends the run early. All of these map to process exit code 1.

use kuberun_client::SchedulerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunError {
    /// Bad render inputs or an unwritable descriptor path
    #[error("Configuration error: {0}")]
    Config(String),

    /// Any failure surfaced by the scheduler client
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// No terminal status observed before the deadline
    #[error("Runtime exceeded (limit: {limit}s)")]
    Timeout { limit: u64 },
}

pub type Result<T> = std::result::Result<T, RunError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            RunError::Timeout { limit: 5 }.to_string(),
            "Runtime exceeded (limit: 5s)"
        );

        let err: RunError = SchedulerError::AlreadyExists("abcd-efgh".into()).into();
        assert_eq!(err.to_string(), "Scheduler error: Job already exists: abcd-efgh");
    }
}
