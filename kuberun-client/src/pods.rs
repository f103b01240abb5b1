//! Pod list parsing
//!
//! Extracts the job's execution state from `kubectl get pods --output=json`.

use kuberun_core::domain::job::JobStatus;
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};

use crate::error::{Result, SchedulerError};

#[derive(Debug, Deserialize)]
struct PodList {
    #[serde(default)]
    items: Vec<Pod>,
}

#[derive(Debug, Deserialize)]
struct Pod {
    #[serde(default)]
    status: PodStatus,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PodStatus {
    #[serde(default)]
    container_statuses: Vec<ContainerStatus>,
}

#[derive(Debug, Deserialize)]
struct ContainerStatus {
    #[serde(default)]
    state: Map<String, JsonValue>,
}

/// Maps a pod list document onto the job's status
///
/// Uses the first container of the first pod. A list with no pods, or a pod
/// whose containers have not reported yet, means the job is not visible yet.
pub fn parse_pod_list(job_name: &str, body: &str) -> Result<JobStatus> {
    let pods: PodList = serde_json::from_str(body)
        .map_err(|e| SchedulerError::Parse(format!("Invalid pod list for {}: {}", job_name, e)))?;

    let container = pods
        .items
        .into_iter()
        .next()
        .and_then(|pod| pod.status.container_statuses.into_iter().next())
        .ok_or_else(|| SchedulerError::NotFound(job_name.to_string()))?;

    let (state_name, record) = container.state.into_iter().next().ok_or_else(|| {
        SchedulerError::Parse(format!("Container of {} reports no state", job_name))
    })?;

    Ok(JobStatus::from_record(&state_name, &record)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kuberun_core::domain::job::JobState;
    use serde_json::json;

    fn pod_list(state: JsonValue) -> String {
        json!({
            "apiVersion": "v1",
            "kind": "List",
            "items": [{
                "metadata": { "name": "abcd-efgh-ijkl-mnop-x7k2p" },
                "status": {
                    "phase": "Running",
                    "containerStatuses": [{ "name": "abcd-efgh-ijkl-mnop", "state": state }]
                }
            }]
        })
        .to_string()
    }

    #[test]
    fn test_parse_running() {
        let body = pod_list(json!({ "running": { "startedAt": "2024-05-01T10:00:00Z" } }));
        let status = parse_pod_list("job", &body).unwrap();
        assert_eq!(status.state(), JobState::Running);
        assert!(status.started_at().is_some());
        assert_eq!(status.exit_code(), None);
    }

    #[test]
    fn test_parse_terminated() {
        let body = pod_list(json!({
            "terminated": {
                "exitCode": 3,
                "reason": "Error",
                "startedAt": "2024-05-01T10:00:00Z",
                "finishedAt": "2024-05-01T10:01:00Z"
            }
        }));
        let status = parse_pod_list("job", &body).unwrap();
        assert_eq!(status.exit_code(), Some(3));
        assert_eq!(status.reason(), Some("Error"));
    }

    #[test]
    fn test_parse_unknown_state_is_hard_error() {
        let body = pod_list(json!({ "evicted": {} }));
        let err = parse_pod_list("job", &body).unwrap_err();
        assert!(matches!(err, SchedulerError::UnknownState(name) if name == "evicted"));
    }

    #[test]
    fn test_parse_no_pods_is_not_found() {
        let body = json!({ "apiVersion": "v1", "items": [] }).to_string();
        assert!(parse_pod_list("job", &body).unwrap_err().is_not_found());
    }

    #[test]
    fn test_parse_pending_pod_is_not_found() {
        let body = json!({ "items": [{ "status": { "phase": "Pending" } }] }).to_string();
        assert!(parse_pod_list("job", &body).unwrap_err().is_not_found());
    }

    #[test]
    fn test_parse_garbage_is_parse_error() {
        let err = parse_pod_list("job", "error: the server doesn't have a resource type").unwrap_err();
        assert!(matches!(err, SchedulerError::Parse(_)));
    }
}
