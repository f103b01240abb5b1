//! Kuberun
//!
//! Launches a single containerized task as a Kubernetes batch Job, waits for
//! it to finish or time out, prints its logs and tears it down.
//!
//! Architecture:
//! - Configuration: settings from the environment, overridden by flags
//! - Render: job descriptor and manifest file
//! - Monitor: status polling until terminal state or deadline
//! - Orchestrator: render -> submit -> monitor -> logs -> cleanup
//!
//! The process exits with the job's own exit code on a completed run, and
//! with 1 when the runner itself fails.

mod cli;
mod clock;
mod config;
mod error;
mod monitor;
mod orchestrator;
mod render;

use anyhow::{Context, Result};
use kuberun_client::{KubectlClient, SchedulerClient};
use std::io::Write;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::Cli;
use crate::clock::SystemClock;
use crate::config::RunnerConfig;
use crate::orchestrator::Orchestrator;
use crate::render::SpecRenderer;

/// Process exit code when the runner, not the job, fails
const RUNNER_FAILURE: i32 = 1;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.quiet);

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            RUNNER_FAILURE
        }
    };

    // exit() skips destructors
    let _ = std::io::stdout().flush();
    std::process::exit(code);
}

/// Logs go to stderr; stdout is reserved for the job's own output
fn init_logging(quiet: bool) {
    let default_filter = if quiet {
        "kuberun=warn,kuberun_client=warn"
    } else {
        "kuberun=debug,kuberun_client=debug"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Runs the job and returns the exit code to propagate
async fn run(cli: Cli) -> Result<i32> {
    // Load configuration
    let config = RunnerConfig::from_env()
        .context("Failed to load configuration from environment")?
        .with_descriptor_file(cli.filename.clone());
    config.validate()?;

    // Check kubectl before rendering anything
    let client = KubectlClient::new(config.kubectl.clone())
        .with_namespace(config.namespace.clone())
        .with_request_timeout(Some(config.request_timeout));
    client
        .ensure_available()
        .await
        .with_context(|| format!("{} not found", config.kubectl))?;

    // Run the job
    let client: Arc<dyn SchedulerClient> = Arc::new(client);
    let mut orchestrator = Orchestrator::new(
        client,
        Arc::new(SystemClock),
        SpecRenderer::new(config.descriptor_file.clone()),
        config.monitor_policy(),
    );

    let result = orchestrator.run(cli.into_request()).await?;
    info!(
        "Job finished with exit code {} (run state: {})",
        result.exit_code,
        orchestrator.state()
    );

    println!("{}", result.logs);
    Ok(result.exit_code)
}
