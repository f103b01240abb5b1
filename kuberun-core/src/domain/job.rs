//! Job domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

/// Fixed in-container path the host directory is mounted at.
/// Also used as the container working directory.
pub const CONTAINER_WORKDIR: &str = "/work";

/// Everything needed to render one batch job.
///
/// Built once per run and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDescriptor {
    /// Cluster-valid job name (RFC 1123 label)
    pub name: String,
    /// Container image reference, e.g. `ubuntu:cosmic`
    pub image: String,
    /// Container command, passed through verbatim. Empty means image entrypoint.
    pub command: Vec<String>,
    /// In-container mount point of the host directory
    pub mount_path: String,
    /// Host directory bound into the container
    pub host_path: String,
    pub uid: u32,
    pub gid: u32,
}

/// Identifiers returned by the scheduler on submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    /// Name of the job resource, used as the pod selector
    pub job_name: String,
    /// Workload reference acknowledged by the control plane (e.g. `job.batch/abcd-efgh`)
    pub resource: String,
}

impl JobHandle {
    pub fn new(job_name: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            job_name: job_name.into(),
            resource: resource.into(),
        }
    }
}

impl std::fmt::Display for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.resource)
    }
}

/// Execution state of the job's container.
///
/// The exit code only exists on the terminated variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Waiting,
    Running,
    Terminated { exit_code: i32 },
}

impl JobState {
    /// State names recognized in the control plane's vocabulary
    pub const NAMES: [&'static str; 3] = ["waiting", "running", "terminated"];

    pub fn name(&self) -> &'static str {
        match self {
            JobState::Waiting => "waiting",
            JobState::Running => "running",
            JobState::Terminated { .. } => "terminated",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Terminated { .. })
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Terminated { exit_code } => write!(f, "terminated ({})", exit_code),
            other => write!(f, "{}", other.name()),
        }
    }
}

/// Errors raised while mapping a control-plane state record
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StatusError {
    /// The state name is not one of [`JobState::NAMES`]
    #[error("Unknown state encountered: {0}")]
    UnknownState(String),

    #[error("Terminated state record has no exit code")]
    MissingExitCode,

    #[error("Invalid field '{field}' in state record: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// One snapshot of a job's execution state.
///
/// Produced fresh on every poll and replaced, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    state: JobState,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    reason: Option<String>,
    message: Option<String>,
}

impl JobStatus {
    fn with_state(state: JobState) -> Self {
        Self {
            state,
            started_at: None,
            finished_at: None,
            reason: None,
            message: None,
        }
    }

    pub fn waiting() -> Self {
        Self::with_state(JobState::Waiting)
    }

    pub fn running() -> Self {
        Self::with_state(JobState::Running)
    }

    pub fn terminated(exit_code: i32) -> Self {
        Self::with_state(JobState::Terminated { exit_code })
    }

    pub fn with_started_at(mut self, at: DateTime<Utc>) -> Self {
        self.started_at = Some(at);
        self
    }

    pub fn with_finished_at(mut self, at: DateTime<Utc>) -> Self {
        self.finished_at = Some(at);
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Maps a container state record onto a status.
    ///
    /// `state_name` is the single key of the container's `state` object and
    /// `record` its value, e.g. `("terminated", {"exitCode": 0, ...})`.
    pub fn from_record(state_name: &str, record: &JsonValue) -> Result<Self, StatusError> {
        let state = match state_name {
            "waiting" => JobState::Waiting,
            "running" => JobState::Running,
            "terminated" => {
                let exit_code = match record.get("exitCode") {
                    None | Some(JsonValue::Null) => return Err(StatusError::MissingExitCode),
                    Some(value) => value
                        .as_i64()
                        .and_then(|code| i32::try_from(code).ok())
                        .ok_or_else(|| StatusError::InvalidField {
                            field: "exitCode",
                            reason: format!("expected a 32-bit integer, got {}", value),
                        })?,
                };
                JobState::Terminated { exit_code }
            }
            other => return Err(StatusError::UnknownState(other.to_string())),
        };

        Ok(Self {
            state,
            started_at: timestamp_field(record, "startedAt")?,
            finished_at: timestamp_field(record, "finishedAt")?,
            reason: string_field(record, "reason"),
            message: string_field(record, "message"),
        })
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Exit code of the container, present only once terminated
    pub fn exit_code(&self) -> Option<i32> {
        match self.state {
            JobState::Terminated { exit_code } => Some(exit_code),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

fn string_field(record: &JsonValue, field: &str) -> Option<String> {
    record.get(field).and_then(|v| v.as_str()).map(str::to_string)
}

fn timestamp_field(
    record: &JsonValue,
    field: &'static str,
) -> Result<Option<DateTime<Utc>>, StatusError> {
    let Some(raw) = record.get(field).and_then(|v| v.as_str()) else {
        return Ok(None);
    };

    DateTime::parse_from_rfc3339(raw)
        .map(|ts| Some(ts.with_timezone(&Utc)))
        .map_err(|e| StatusError::InvalidField {
            field,
            reason: e.to_string(),
        })
}

/// Final aggregate of a successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    pub status: JobStatus,
    pub logs: String,
    pub exit_code: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_exit_code_only_when_terminated() {
        assert_eq!(JobStatus::waiting().exit_code(), None);
        assert_eq!(JobStatus::running().exit_code(), None);
        assert_eq!(JobStatus::terminated(3).exit_code(), Some(3));
        assert!(JobStatus::terminated(0).is_terminal());
        assert!(!JobStatus::running().is_terminal());
    }

    #[test]
    fn test_from_record_maps_known_states() {
        for name in JobState::NAMES {
            let record = if name == "terminated" {
                json!({ "exitCode": 0 })
            } else {
                json!({})
            };
            let status = JobStatus::from_record(name, &record).unwrap();
            assert_eq!(status.state().name(), name);
            assert_eq!(status.exit_code().is_some(), name == "terminated");
        }
    }

    #[test]
    fn test_from_record_terminated_fields() {
        let record = json!({
            "exitCode": 2,
            "reason": "Error",
            "message": "boom",
            "startedAt": "2024-05-01T10:00:00Z",
            "finishedAt": "2024-05-01T10:00:05Z",
        });

        let status = JobStatus::from_record("terminated", &record).unwrap();
        assert_eq!(status.exit_code(), Some(2));
        assert_eq!(status.reason(), Some("Error"));
        assert_eq!(status.message(), Some("boom"));
        let elapsed = status.finished_at().unwrap() - status.started_at().unwrap();
        assert_eq!(elapsed.num_seconds(), 5);
    }

    #[test]
    fn test_from_record_rejects_unknown_state() {
        let err = JobStatus::from_record("evicted", &json!({})).unwrap_err();
        assert_eq!(err, StatusError::UnknownState("evicted".to_string()));
    }

    #[test]
    fn test_from_record_requires_exit_code() {
        let err = JobStatus::from_record("terminated", &json!({ "reason": "Completed" }))
            .unwrap_err();
        assert_eq!(err, StatusError::MissingExitCode);
    }

    #[test]
    fn test_from_record_invalid_timestamp() {
        let err = JobStatus::from_record("running", &json!({ "startedAt": "yesterday" }))
            .unwrap_err();
        assert!(matches!(
            err,
            StatusError::InvalidField {
                field: "startedAt",
                ..
            }
        ));
    }

    #[test]
    fn test_waiting_reason_is_kept() {
        let record = json!({ "reason": "ContainerCreating" });
        let status = JobStatus::from_record("waiting", &record).unwrap();
        assert_eq!(status.state(), JobState::Waiting);
        assert_eq!(status.reason(), Some("ContainerCreating"));
    }
}
