//! Kuberun scheduler client
//!
//! A thin adapter over the cluster control plane. It submits a rendered job
//! descriptor, queries the job's container state, fetches logs and deletes
//! the job resource.
//!
//! Two implementations are provided:
//! - [`KubectlClient`] shells out to the `kubectl` binary
//! - [`FakeScheduler`] is an in-memory stand-in for tests
//!
//! # Example
//!
//! ```no_run
//! use kuberun_client::{KubectlClient, SchedulerClient};
//! use std::path::Path;
//!
//! # async fn example() -> kuberun_client::Result<()> {
//! let client = KubectlClient::new("kubectl");
//! client.ensure_available().await?;
//!
//! let handle = client.submit(Path::new("ipcexe.yml")).await?;
//! let status = client.query_status(&handle.job_name).await?;
//! println!("{} is {}", handle, status.state());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod fake;
mod kubectl;
mod pods;

pub use error::{Result, SchedulerError};
pub use fake::{FakeScheduler, ScriptedStatus};
pub use kubectl::KubectlClient;
pub use pods::parse_pod_list;

use async_trait::async_trait;
use kuberun_core::domain::job::{JobHandle, JobStatus};
use std::path::Path;

/// Operations consumed from the cluster control plane
///
/// Every method maps one-to-one onto a control-plane request. None of them
/// retry; retry policy belongs to the caller.
#[async_trait]
pub trait SchedulerClient: Send + Sync {
    /// Verifies the control plane can be reached before any other call
    async fn ensure_available(&self) -> Result<()>;

    /// Applies the descriptor file and returns the acknowledged handle
    ///
    /// Fails with [`SchedulerError::AlreadyExists`] if a job with the same
    /// name is already present.
    async fn submit(&self, descriptor_path: &Path) -> Result<JobHandle>;

    /// Looks up the job's workload and maps its container state
    ///
    /// Fails with [`SchedulerError::NotFound`] while the workload is not yet
    /// visible, and with [`SchedulerError::UnknownState`] if the state name is
    /// not recognized.
    async fn query_status(&self, job_name: &str) -> Result<JobStatus>;

    /// Returns captured output, optionally only the last `tail_lines` lines
    async fn fetch_logs(&self, handle: &JobHandle, tail_lines: Option<u32>) -> Result<String>;

    /// Removes the job resource; `force` skips the graceful termination period
    async fn delete_job(&self, job_name: &str, force: bool) -> Result<()>;
}
