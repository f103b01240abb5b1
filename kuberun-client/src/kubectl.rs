//! kubectl-backed scheduler client
//!
//! Every operation is one `kubectl` invocation:
//! - `apply -f <file>` to submit
//! - `get pods --selector=job-name=<name> --output=json` to query state
//! - `logs <resource> [--tail=N]` to fetch output
//! - `delete job.batch <name> [--force --grace-period=0]` to clean up
//!
//! With a request timeout set, every invocation carries `--request-timeout`
//! so a stalled API server fails the call instead of hanging it.

use async_trait::async_trait;
use kuberun_core::domain::job::{JobHandle, JobStatus};
use kuberun_core::manifest::JobManifest;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

use crate::SchedulerClient;
use crate::error::{Result, SchedulerError};
use crate::pods::parse_pod_list;

/// Captured result of one kubectl invocation
struct CommandOutput {
    command: String,
    stdout: String,
    stderr: String,
    exit_code: Option<i32>,
}

impl CommandOutput {
    fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Returns stdout, or a `CommandFailed` error if the process did not succeed
    fn into_stdout(self) -> Result<String> {
        if self.success() {
            return Ok(self.stdout);
        }

        Err(SchedulerError::CommandFailed {
            command: self.command,
            exit_code: self.exit_code.unwrap_or(-1),
            stderr: self.stderr.trim().to_string(),
        })
    }
}

/// Scheduler client driving the `kubectl` binary
#[derive(Debug, Clone)]
pub struct KubectlClient {
    binary: String,
    namespace: Option<String>,
    request_timeout: Option<Duration>,
}

impl KubectlClient {
    /// Creates a client using the given kubectl binary (name on PATH or full path)
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            namespace: None,
            request_timeout: None,
        }
    }

    /// Scopes every invocation to a namespace
    pub fn with_namespace(mut self, namespace: Option<String>) -> Self {
        self.namespace = namespace;
        self
    }

    /// Bounds each API request made by kubectl
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout.filter(|t| !t.is_zero());
        self
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    fn base_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(ns) = &self.namespace {
            args.push("--namespace".to_string());
            args.push(ns.clone());
        }
        if let Some(timeout) = self.request_timeout {
            args.push(format!("--request-timeout={}s", timeout.as_secs().max(1)));
        }
        args
    }

    /// Runs kubectl with the given arguments and captures its output
    async fn exec(&self, args: &[String]) -> Result<CommandOutput> {
        let mut full_args = self.base_args();
        full_args.extend(args.iter().cloned());

        let command = format!("{} {}", self.binary, full_args.join(" "));
        debug!("Executing: {}", command);

        // A dropped call must not leave kubectl running
        let output = Command::new(&self.binary)
            .args(&full_args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| SchedulerError::Io {
                command: command.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !stderr.trim().is_empty() {
            debug!("{} stderr: {}", self.binary, stderr.trim());
        }

        Ok(CommandOutput {
            command,
            stdout,
            stderr,
            exit_code: output.status.code(),
        })
    }
}

/// Job name declared in a descriptor file
async fn manifest_name(path: &Path) -> Result<String> {
    let source = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| SchedulerError::Io {
            command: format!("read {}", path.display()),
            source,
        })?;

    let manifest = JobManifest::from_yaml(&source)
        .map_err(|e| SchedulerError::Parse(format!("Invalid descriptor {}: {}", path.display(), e)))?;
    Ok(manifest.metadata.name)
}

/// Extracts the resource reference from an apply acknowledgment
///
/// `job.batch/abcd-efgh created` yields `job.batch/abcd-efgh`. Acknowledgments
/// reporting an existing object (`unchanged`, `configured`) are rejected.
fn parse_apply_ack(job_name: &str, stdout: &str) -> Result<String> {
    let line = stdout
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or_else(|| SchedulerError::Parse("Empty acknowledgment from apply".to_string()))?;

    let (resource, verb) = line
        .rsplit_once(' ')
        .ok_or_else(|| SchedulerError::Parse(format!("Unexpected apply acknowledgment: {}", line)))?;

    match verb {
        "created" => Ok(resource.trim().to_string()),
        "unchanged" | "configured" => Err(SchedulerError::AlreadyExists(job_name.to_string())),
        _ => Err(SchedulerError::Parse(format!(
            "Unexpected apply acknowledgment: {}",
            line
        ))),
    }
}

fn mentions_existing_object(stderr: &str) -> bool {
    stderr.contains("AlreadyExists")
        || stderr.contains("already exists")
        || stderr.contains("field is immutable")
}

/// Job name from a resource reference such as `job.batch/<name>`
fn job_name_of(resource: &str) -> &str {
    resource.rsplit('/').next().unwrap_or(resource)
}

#[async_trait]
impl SchedulerClient for KubectlClient {
    async fn ensure_available(&self) -> Result<()> {
        let output = self
            .exec(&["version".to_string(), "--client".to_string()])
            .await
            .map_err(|e| SchedulerError::Unavailable {
                binary: self.binary.clone(),
                reason: e.to_string(),
            })?;

        if !output.success() {
            return Err(SchedulerError::Unavailable {
                binary: self.binary.clone(),
                reason: output.stderr.trim().to_string(),
            });
        }

        let version = output.stdout.lines().next().unwrap_or_default().trim().to_string();
        info!("{} is available: {}", self.binary, version);
        Ok(())
    }

    async fn submit(&self, descriptor_path: &Path) -> Result<JobHandle> {
        let declared_name = manifest_name(descriptor_path).await?;
        let path = descriptor_path.to_string_lossy().to_string();
        let output = self
            .exec(&["apply".to_string(), "-f".to_string(), path])
            .await?;

        if !output.success() && mentions_existing_object(&output.stderr) {
            return Err(SchedulerError::AlreadyExists(declared_name));
        }

        let stdout = output.into_stdout()?;
        let resource = parse_apply_ack(&declared_name, &stdout)?;
        let job_name = job_name_of(&resource).to_string();
        Ok(JobHandle::new(job_name, resource))
    }

    async fn query_status(&self, job_name: &str) -> Result<JobStatus> {
        let body = self
            .exec(&[
                "get".to_string(),
                "pods".to_string(),
                format!("--selector=job-name={}", job_name),
                "--output=json".to_string(),
            ])
            .await?
            .into_stdout()?;

        parse_pod_list(job_name, &body)
    }

    async fn fetch_logs(&self, handle: &JobHandle, tail_lines: Option<u32>) -> Result<String> {
        let mut args = vec!["logs".to_string(), handle.resource.clone()];
        if let Some(tail) = tail_lines {
            args.push(format!("--tail={}", tail));
        }

        let logs = self.exec(&args).await?.into_stdout()?;
        Ok(logs.trim().to_string())
    }

    async fn delete_job(&self, job_name: &str, force: bool) -> Result<()> {
        let mut args = vec![
            "delete".to_string(),
            "job.batch".to_string(),
            job_name.to_string(),
        ];
        if force {
            args.push("--force".to_string());
            args.push("--grace-period=0".to_string());
        }

        let output = self.exec(&args).await?;
        if !output.success() && output.stderr.contains("NotFound") {
            return Err(SchedulerError::NotFound(job_name.to_string()));
        }

        output.into_stdout()?;
        debug!("Deleted job {}", job_name);
        Ok(())
    }
}
