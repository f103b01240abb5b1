//! Run orchestration
//!
//! Sequences a single run end to end:
//! render -> submit -> monitor -> fetch logs -> cleanup (optional) -> done.
//!
//! Any failure moves the run to `Failed` and skips the remaining steps. A
//! job submitted before the failure is left on the cluster. Cleanup is best
//! effort: its failure is logged and does not change the outcome.

use kuberun_client::SchedulerClient;
use kuberun_core::domain::job::{JobDescriptor, JobHandle, RunResult};
use kuberun_core::domain::run::RunState;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::Result;
use crate::monitor::{Finished, JobMonitor, MonitorPolicy};
use crate::render::{RenderParams, SpecRenderer};

/// What to do with the job resource once logs are fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cleanup {
    Delete,
    /// Delete without waiting for the grace period
    ForceDelete,
    Skip,
}

/// Everything one run needs besides its collaborators
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub render: RenderParams,
    /// Requested timeout, capped by the monitor policy
    pub timeout: Option<Duration>,
    /// Only return the last N log lines
    pub tail_lines: Option<u32>,
    pub cleanup: Cleanup,
}

/// Drives one job through its lifecycle
pub struct Orchestrator {
    client: Arc<dyn SchedulerClient>,
    renderer: SpecRenderer,
    monitor: JobMonitor,
    state: RunState,
}

impl Orchestrator {
    pub fn new(
        client: Arc<dyn SchedulerClient>,
        clock: Arc<dyn Clock>,
        renderer: SpecRenderer,
        policy: MonitorPolicy,
    ) -> Self {
        let monitor = JobMonitor::new(Arc::clone(&client), clock, policy);
        Self {
            client,
            renderer,
            monitor,
            state: RunState::Init,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Runs the job to completion
    ///
    /// Returns the terminal status, logs and the job's exit code. The caller
    /// is responsible for turning an error into a runner failure exit code.
    pub async fn run(&mut self, request: RunRequest) -> Result<RunResult> {
        match self.run_steps(request).await {
            Ok(result) => {
                self.transition(RunState::Done);
                Ok(result)
            }
            Err(e) => {
                self.transition(RunState::Failed);
                Err(e)
            }
        }
    }

    async fn run_steps(&mut self, request: RunRequest) -> Result<RunResult> {
        let descriptor = self.renderer.render(request.render)?;
        self.transition(RunState::Rendered);

        let handle = self.client.submit(self.renderer.output_path()).await?;
        self.transition(RunState::Submitted);
        info!("Launched {}", handle);

        self.transition(RunState::Monitoring);
        let Finished { status, exit_code } =
            self.monitor.monitor(&descriptor.name, request.timeout).await?;
        self.transition(RunState::Terminated);

        debug!("Started: {:?}", status.started_at());
        debug!("Finished: {:?}", status.finished_at());
        debug!("Message: {:?}", status.message());
        debug!("Reason: {:?}", status.reason());
        debug!("Exit code: {}", exit_code);

        debug!("Getting job logs");
        let logs = self.client.fetch_logs(&handle, request.tail_lines).await?;
        self.transition(RunState::LogsFetched);

        self.cleanup(&descriptor, &handle, request.cleanup).await;

        Ok(RunResult {
            status,
            logs,
            exit_code,
        })
    }

    async fn cleanup(&mut self, descriptor: &JobDescriptor, handle: &JobHandle, cleanup: Cleanup) {
        let force = match cleanup {
            Cleanup::Skip => {
                debug!("Leaving {} in place", handle);
                return;
            }
            Cleanup::Delete => false,
            Cleanup::ForceDelete => true,
        };

        debug!("Cleaning up");
        match self.client.delete_job(&descriptor.name, force).await {
            Ok(()) => self.transition(RunState::CleanedUp),
            Err(e) => warn!("Failed to delete job {}: {}", descriptor.name, e),
        }
    }

    fn transition(&mut self, next: RunState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        debug!("Run state: {} -> {}", self.state, next);
        self.state = next;
    }
}
