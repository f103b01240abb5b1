//! In-memory scheduler
//!
//! Stands in for a live cluster in tests. Statuses are scripted: each query
//! pops the next entry and the last entry repeats once the script runs out.

use async_trait::async_trait;
use kuberun_core::domain::job::{JobHandle, JobStatus};
use kuberun_core::manifest::JobManifest;
use std::collections::{HashSet, VecDeque};
use std::path::Path;
use std::sync::Mutex;

use crate::SchedulerClient;
use crate::error::{Result, SchedulerError};

/// One scripted answer to `query_status`
#[derive(Debug, Clone)]
pub enum ScriptedStatus {
    Status(JobStatus),
    /// Workload not visible yet
    NotFound,
    /// Control plane reports a state name outside the recognized vocabulary
    UnknownState(String),
    /// Transport failure, e.g. API server unreachable
    TransportFailure(String),
}

impl From<JobStatus> for ScriptedStatus {
    fn from(status: JobStatus) -> Self {
        ScriptedStatus::Status(status)
    }
}

#[derive(Debug, Default)]
struct FakeState {
    script: VecDeque<ScriptedStatus>,
    last: Option<ScriptedStatus>,
    jobs: HashSet<String>,
    logs: String,
    fail_logs: bool,
    fail_delete: bool,
    remove_finished: bool,
    submitted: Vec<String>,
    deleted: Vec<(String, bool)>,
    queries: usize,
}

/// Scheduler client backed by in-memory state
#[derive(Debug, Default)]
pub struct FakeScheduler {
    state: Mutex<FakeState>,
}

impl FakeScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends answers to the status script
    pub fn with_statuses<I, S>(self, statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ScriptedStatus>,
    {
        self.state
            .lock()
            .unwrap()
            .script
            .extend(statuses.into_iter().map(Into::into));
        self
    }

    /// Registers a job that exists before any submission
    pub fn with_existing_job(self, name: impl Into<String>) -> Self {
        self.state.lock().unwrap().jobs.insert(name.into());
        self
    }

    pub fn with_logs(self, logs: impl Into<String>) -> Self {
        self.state.lock().unwrap().logs = logs.into();
        self
    }

    pub fn failing_logs(self) -> Self {
        self.state.lock().unwrap().fail_logs = true;
        self
    }

    pub fn failing_delete(self) -> Self {
        self.state.lock().unwrap().fail_delete = true;
        self
    }

    /// Drops a job as soon as a terminal status is served for it,
    /// like a TTL-after-finished controller would
    pub fn removing_finished_jobs(self) -> Self {
        self.state.lock().unwrap().remove_finished = true;
        self
    }

    /// Number of `query_status` calls made so far
    pub fn query_count(&self) -> usize {
        self.state.lock().unwrap().queries
    }

    /// Names of successfully submitted jobs, in order
    pub fn submitted(&self) -> Vec<String> {
        self.state.lock().unwrap().submitted.clone()
    }

    /// `(job_name, force)` for every successful deletion
    pub fn deleted(&self) -> Vec<(String, bool)> {
        self.state.lock().unwrap().deleted.clone()
    }

    /// Whether the job resource currently exists
    pub fn contains_job(&self, name: &str) -> bool {
        self.state.lock().unwrap().jobs.contains(name)
    }

    fn next_scripted(state: &mut FakeState) -> Option<ScriptedStatus> {
        match state.script.pop_front() {
            Some(next) => {
                state.last = Some(next.clone());
                Some(next)
            }
            None => state.last.clone(),
        }
    }
}

#[async_trait]
impl SchedulerClient for FakeScheduler {
    async fn ensure_available(&self) -> Result<()> {
        Ok(())
    }

    async fn submit(&self, descriptor_path: &Path) -> Result<JobHandle> {
        let source = tokio::fs::read_to_string(descriptor_path)
            .await
            .map_err(|source| SchedulerError::Io {
                command: format!("apply -f {}", descriptor_path.display()),
                source,
            })?;
        let manifest =
            JobManifest::from_yaml(&source).map_err(|e| SchedulerError::Parse(e.to_string()))?;
        let name = manifest.metadata.name;

        let mut state = self.state.lock().unwrap();
        if !state.jobs.insert(name.clone()) {
            return Err(SchedulerError::AlreadyExists(name));
        }
        state.submitted.push(name.clone());

        Ok(JobHandle::new(name.clone(), format!("job.batch/{}", name)))
    }

    async fn query_status(&self, job_name: &str) -> Result<JobStatus> {
        let mut state = self.state.lock().unwrap();
        state.queries += 1;

        if !state.jobs.contains(job_name) {
            return Err(SchedulerError::NotFound(job_name.to_string()));
        }

        match Self::next_scripted(&mut state) {
            Some(ScriptedStatus::Status(status)) => {
                if status.is_terminal() && state.remove_finished {
                    state.jobs.remove(job_name);
                }
                Ok(status)
            }
            Some(ScriptedStatus::NotFound) | None => {
                Err(SchedulerError::NotFound(job_name.to_string()))
            }
            Some(ScriptedStatus::UnknownState(name)) => Err(SchedulerError::UnknownState(name)),
            Some(ScriptedStatus::TransportFailure(stderr)) => Err(SchedulerError::CommandFailed {
                command: format!("get pods --selector=job-name={}", job_name),
                exit_code: 1,
                stderr,
            }),
        }
    }

    async fn fetch_logs(&self, handle: &JobHandle, tail_lines: Option<u32>) -> Result<String> {
        let state = self.state.lock().unwrap();
        if state.fail_logs {
            return Err(SchedulerError::CommandFailed {
                command: format!("logs {}", handle.resource),
                exit_code: 1,
                stderr: "container not found".to_string(),
            });
        }

        let lines: Vec<&str> = state.logs.trim().lines().collect();
        let start = match tail_lines {
            Some(tail) => lines.len().saturating_sub(tail as usize),
            None => 0,
        };
        Ok(lines[start..].join("\n"))
    }

    async fn delete_job(&self, job_name: &str, force: bool) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_delete {
            return Err(SchedulerError::CommandFailed {
                command: format!("delete job.batch {}", job_name),
                exit_code: 1,
                stderr: "Unable to connect to the server".to_string(),
            });
        }
        if !state.jobs.remove(job_name) {
            return Err(SchedulerError::NotFound(job_name.to_string()));
        }

        state.deleted.push((job_name.to_string(), force));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kuberun_core::domain::job::JobDescriptor;

    fn write_descriptor(dir: &Path, name: &str) -> std::path::PathBuf {
        let descriptor = JobDescriptor {
            name: name.to_string(),
            image: "alpine".to_string(),
            command: vec!["true".to_string()],
            mount_path: "/work".to_string(),
            host_path: "/tmp".to_string(),
            uid: 0,
            gid: 0,
        };
        let path = dir.join("job.yml");
        let yaml = JobManifest::from(&descriptor).to_yaml().unwrap();
        std::fs::write(&path, yaml).unwrap();
        path
    }

    #[tokio::test]
    async fn test_script_repeats_last_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_descriptor(dir.path(), "aaaa-bbbb");
        let fake = FakeScheduler::new().with_statuses([
            ScriptedStatus::NotFound,
            JobStatus::running().into(),
        ]);

        fake.submit(&path).await.unwrap();
        assert!(fake.query_status("aaaa-bbbb").await.unwrap_err().is_not_found());
        for _ in 0..3 {
            let status = fake.query_status("aaaa-bbbb").await.unwrap();
            assert!(!status.is_terminal());
        }
        assert_eq!(fake.query_count(), 4);
    }

    #[tokio::test]
    async fn test_duplicate_submit_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_descriptor(dir.path(), "aaaa-bbbb");
        let fake = FakeScheduler::new().with_existing_job("aaaa-bbbb");

        let err = fake.submit(&path).await.unwrap_err();
        assert!(matches!(err, SchedulerError::AlreadyExists(name) if name == "aaaa-bbbb"));
        assert!(fake.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_delete_twice_reports_not_found() {
        let fake = FakeScheduler::new().with_existing_job("aaaa-bbbb");

        fake.delete_job("aaaa-bbbb", true).await.unwrap();
        assert!(fake.delete_job("aaaa-bbbb", false).await.unwrap_err().is_not_found());
        assert_eq!(fake.deleted(), vec![("aaaa-bbbb".to_string(), true)]);
    }

    #[tokio::test]
    async fn test_logs_tail() {
        let fake = FakeScheduler::new().with_logs("one\ntwo\nthree\n");
        let handle = JobHandle::new("aaaa-bbbb", "job.batch/aaaa-bbbb");

        assert_eq!(fake.fetch_logs(&handle, None).await.unwrap(), "one\ntwo\nthree");
        assert_eq!(fake.fetch_logs(&handle, Some(2)).await.unwrap(), "two\nthree");
        assert_eq!(fake.fetch_logs(&handle, Some(10)).await.unwrap(), "one\ntwo\nthree");
    }
}
