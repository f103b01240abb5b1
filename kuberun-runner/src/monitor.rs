//! Job monitor
//!
//! Polls the scheduler until the job's container terminates or the deadline
//! passes. Elapsed time is measured on the injected clock after every sleep,
//! and each query may only use what is left of the budget, so a hung query
//! cannot hold the run past its deadline.

use kuberun_client::SchedulerClient;
use kuberun_core::domain::job::JobStatus;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::error::{Result, RunError};

/// Polling policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorPolicy {
    /// Fixed sleep between queries
    pub poll_interval: Duration,

    /// Ceiling applied to any requested timeout
    pub max_timeout: Duration,

    /// Consecutive transient query failures tolerated before giving up
    pub query_retries: u32,
}

impl MonitorPolicy {
    /// Requested timeout capped at the ceiling; the ceiling if none was requested
    pub fn effective_timeout(&self, requested: Option<Duration>) -> Duration {
        match requested {
            Some(timeout) => timeout.min(self.max_timeout),
            None => self.max_timeout,
        }
    }
}

/// Terminal status together with the exit code it carries
#[derive(Debug, Clone)]
pub struct Finished {
    pub status: JobStatus,
    pub exit_code: i32,
}

/// Blocking poll loop over a single job
pub struct JobMonitor {
    client: Arc<dyn SchedulerClient>,
    clock: Arc<dyn Clock>,
    policy: MonitorPolicy,
}

impl JobMonitor {
    pub fn new(client: Arc<dyn SchedulerClient>, clock: Arc<dyn Clock>, policy: MonitorPolicy) -> Self {
        Self {
            client,
            clock,
            policy,
        }
    }

    /// Polls until the job terminates and returns its final status
    ///
    /// # Errors
    /// - `RunError::Timeout` if no terminal status is seen within the effective
    ///   timeout, including a query still pending when the budget runs out
    /// - `RunError::Scheduler` for any query failure other than "not found yet",
    ///   after `query_retries` consecutive transient failures
    pub async fn monitor(&self, job_name: &str, timeout: Option<Duration>) -> Result<Finished> {
        let timeout = self.policy.effective_timeout(timeout);
        let start = self.clock.now();
        let mut elapsed = Duration::ZERO;
        let mut transient_failures = 0u32;

        loop {
            let remaining = timeout.saturating_sub(elapsed);
            let outcome = match tokio::time::timeout(remaining, self.client.query_status(job_name)).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!("Status query for {} still pending at the deadline", job_name);
                    return Err(RunError::Timeout {
                        limit: timeout.as_secs(),
                    });
                }
            };

            match outcome {
                Ok(status) => {
                    if let Some(exit_code) = status.exit_code() {
                        debug!("Job {} finished: {}", job_name, status.state());
                        return Ok(Finished { status, exit_code });
                    }

                    transient_failures = 0;
                    debug!(
                        "Check {} status in {:?} [{}s]: {}",
                        job_name,
                        self.policy.poll_interval,
                        elapsed.as_secs(),
                        status.state()
                    );
                }
                Err(e) if e.is_not_found() => {
                    transient_failures = 0;
                    debug!("Job {} not visible yet [{}s]", job_name, elapsed.as_secs());
                }
                Err(e) if e.is_transient() && transient_failures < self.policy.query_retries => {
                    transient_failures += 1;
                    warn!(
                        "Status query for {} failed (attempt {}/{}): {}",
                        job_name, transient_failures, self.policy.query_retries, e
                    );
                }
                Err(e) => return Err(e.into()),
            }

            self.clock.sleep(self.policy.poll_interval).await;

            elapsed = (self.clock.now() - start).to_std().unwrap_or_default();
            if elapsed >= timeout {
                return Err(RunError::Timeout {
                    limit: timeout.as_secs(),
                });
            }
        }
    }
}
