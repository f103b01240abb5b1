//! Command-line interface
//!
//! Runner flags carry an `--x-` prefix so they do not collide with the
//! container command, which is everything else on the command line. They
//! must come before the command; one found inside it is rejected.

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use std::path::PathBuf;
use std::time::Duration;

use crate::orchestrator::{Cleanup, RunRequest};
use crate::render::RenderParams;

#[derive(Parser, Debug)]
#[command(name = "kuberun")]
#[command(about = "Run a task in a Kubernetes pod", long_about = None)]
pub struct Cli {
    /// Container repo
    #[arg(
        long = "x-image",
        value_name = "image[:tag]",
        env = "KUBERUN_IMAGE",
        default_value = "ubuntu:cosmic"
    )]
    pub image: String,

    /// Job name (must be distinct)
    #[arg(long = "x-job", value_name = "job-name")]
    pub job: Option<String>,

    /// Job filename
    #[arg(long = "x-filename", value_name = "filename.yml")]
    pub filename: Option<PathBuf>,

    /// Maximum run time, capped at 24 hours
    #[arg(long = "x-timeout", value_name = "seconds")]
    pub timeout: Option<u64>,

    /// Return last n log lines
    #[arg(long = "x-tail", value_name = "lines")]
    pub tail: Option<u32>,

    /// Host directory mounted at /work (default: current directory)
    #[arg(long = "x-workdir", value_name = "path")]
    pub workdir: Option<PathBuf>,

    /// Run as this user id (default: effective uid)
    #[arg(long = "x-uid", value_name = "uid")]
    pub uid: Option<u32>,

    /// Run as this group id (default: effective gid)
    #[arg(long = "x-gid", value_name = "gid")]
    pub gid: Option<u32>,

    /// Do not clean up Job when finished
    #[arg(long = "x-no-cleanup")]
    pub no_cleanup: bool,

    /// Delete the Job immediately, skipping the grace period
    #[arg(long = "x-force-cleanup", conflicts_with = "no_cleanup")]
    pub force_cleanup: bool,

    /// Only log warnings and errors
    #[arg(long = "x-quiet")]
    pub quiet: bool,

    /// Command to run in the container (image entrypoint if omitted).
    /// Runner flags must come before it
    #[arg(
        value_name = "COMMAND",
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub command: Vec<String>,
}

impl Cli {
    /// Parses the process arguments, exiting with a usage error if a runner
    /// flag was given after the command started
    pub fn parse_args() -> Self {
        let cli = Self::parse();
        if let Some(flag) = cli.misplaced_flag() {
            Self::command()
                .error(
                    ErrorKind::ArgumentConflict,
                    format!("'{}' must come before the command", flag),
                )
                .exit();
        }
        cli
    }

    /// First `--x-` flag that ended up inside the container command
    pub fn misplaced_flag(&self) -> Option<&str> {
        self.command
            .iter()
            .map(String::as_str)
            .find(|arg| arg.starts_with("--x-"))
    }

    pub fn cleanup(&self) -> Cleanup {
        if self.no_cleanup {
            Cleanup::Skip
        } else if self.force_cleanup {
            Cleanup::ForceDelete
        } else {
            Cleanup::Delete
        }
    }

    /// Builds the run request; consumes the parsed arguments
    pub fn into_request(self) -> RunRequest {
        let cleanup = self.cleanup();
        RunRequest {
            render: RenderParams {
                name: self.job,
                image: self.image,
                command: self.command,
                host_path: self.workdir,
                uid: self.uid,
                gid: self.gid,
            },
            timeout: self.timeout.map(Duration::from_secs),
            tail_lines: self.tail,
            cleanup,
        }
    }
}
