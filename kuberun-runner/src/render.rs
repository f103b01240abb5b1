//! Job descriptor rendering
//!
//! Builds the [`JobDescriptor`] for a run, filling in defaults from the
//! invoking process, and writes it out as a Job manifest for `kubectl apply`.

use kuberun_core::domain::job::{CONTAINER_WORKDIR, JobDescriptor};
use kuberun_core::manifest::JobManifest;
use nix::unistd::{getegid, geteuid};
use rand::Rng;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Result, RunError};

/// Longest name accepted for a job (RFC 1123 label)
const MAX_NAME_LEN: usize = 63;

/// Inputs for one render
#[derive(Debug, Clone, Default)]
pub struct RenderParams {
    /// Job name; generated when absent
    pub name: Option<String>,
    pub image: String,
    pub command: Vec<String>,
    /// Host directory to mount; current directory when absent
    pub host_path: Option<PathBuf>,
    /// Run-as user; effective uid when absent
    pub uid: Option<u32>,
    /// Run-as group; effective gid when absent
    pub gid: Option<u32>,
}

/// Renders job descriptors and persists them to a fixed file
pub struct SpecRenderer {
    output_path: PathBuf,
}

impl SpecRenderer {
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
        }
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Builds the descriptor and writes its manifest to the output path
    pub fn render(&self, params: RenderParams) -> Result<JobDescriptor> {
        let descriptor = build_descriptor(params)?;

        let manifest = JobManifest::from(&descriptor)
            .to_yaml()
            .map_err(|e| RunError::Config(format!("Failed to serialize job manifest: {}", e)))?;

        std::fs::write(&self.output_path, manifest).map_err(|e| {
            RunError::Config(format!(
                "Cannot write job descriptor to {}: {}",
                self.output_path.display(),
                e
            ))
        })?;

        debug!(
            "Rendered job {} to {}",
            descriptor.name,
            self.output_path.display()
        );
        Ok(descriptor)
    }
}

/// Resolves defaults and validates inputs without touching the filesystem
pub fn build_descriptor(params: RenderParams) -> Result<JobDescriptor> {
    let name = match params.name {
        Some(name) => {
            if !is_valid_job_name(&name) {
                return Err(RunError::Config(format!(
                    "Invalid job name '{}': use 1-{} lowercase letters, digits or '-', \
                     starting and ending with a letter or digit",
                    name, MAX_NAME_LEN
                )));
            }
            name
        }
        None => generate_job_name(),
    };

    if params.image.trim().is_empty() {
        return Err(RunError::Config("Container image cannot be empty".to_string()));
    }

    let host_path = match params.host_path {
        Some(path) => path,
        None => std::env::current_dir().map_err(|e| {
            RunError::Config(format!("Cannot determine current directory: {}", e))
        })?,
    };

    Ok(JobDescriptor {
        name,
        image: params.image,
        command: params.command,
        mount_path: CONTAINER_WORKDIR.to_string(),
        host_path: host_path.to_string_lossy().to_string(),
        uid: params.uid.unwrap_or_else(|| geteuid().as_raw()),
        gid: params.gid.unwrap_or_else(|| getegid().as_raw()),
    })
}

/// Generates a random, valid job name: 4 groups of 4 lowercase letters
pub fn generate_job_name() -> String {
    let mut rng = rand::rng();
    (0..4)
        .map(|_| {
            (0..4)
                .map(|_| (b'a' + rng.random_range(0..26u8)) as char)
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// RFC 1123 label: lowercase alphanumerics and '-', alphanumeric at both ends
pub fn is_valid_job_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    let edge_ok = |b: Option<&u8>| b.is_some_and(|b| b.is_ascii_lowercase() || b.is_ascii_digit());

    !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && bytes
            .iter()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
        && edge_ok(bytes.first())
        && edge_ok(bytes.last())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(command: &[&str]) -> RenderParams {
        RenderParams {
            image: "ubuntu:cosmic".to_string(),
            command: command.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_generated_name_shape() {
        for _ in 0..20 {
            let name = generate_job_name();
            let groups: Vec<&str> = name.split('-').collect();
            assert_eq!(groups.len(), 4);
            assert!(groups.iter().all(|g| g.len() == 4 && g.bytes().all(|b| b.is_ascii_lowercase())));
            assert!(is_valid_job_name(&name));
        }
    }

    #[test]
    fn test_name_validation() {
        assert!(is_valid_job_name("build-42"));
        assert!(is_valid_job_name("a"));
        assert!(!is_valid_job_name(""));
        assert!(!is_valid_job_name("Build"));
        assert!(!is_valid_job_name("-lead"));
        assert!(!is_valid_job_name("trail-"));
        assert!(!is_valid_job_name("under_score"));
        assert!(!is_valid_job_name(&"a".repeat(64)));
        assert!(is_valid_job_name(&"a".repeat(63)));
    }

    #[test]
    fn test_defaults_come_from_environment() {
        let descriptor = build_descriptor(params(&["ls"])).unwrap();

        assert_eq!(descriptor.uid, geteuid().as_raw());
        assert_eq!(descriptor.gid, getegid().as_raw());
        assert_eq!(
            PathBuf::from(&descriptor.host_path),
            std::env::current_dir().unwrap()
        );
        assert_eq!(descriptor.mount_path, "/work");
        assert!(is_valid_job_name(&descriptor.name));
    }

    #[test]
    fn test_explicit_overrides_win() {
        let descriptor = build_descriptor(RenderParams {
            name: Some("nightly-report".to_string()),
            host_path: Some(PathBuf::from("/data/reports")),
            uid: Some(4242),
            gid: Some(7),
            ..params(&["python3", "report.py", "--since", "yesterday"])
        })
        .unwrap();

        assert_eq!(descriptor.name, "nightly-report");
        assert_eq!(descriptor.host_path, "/data/reports");
        assert_eq!(descriptor.uid, 4242);
        assert_eq!(descriptor.gid, 7);
        assert_eq!(descriptor.command, vec!["python3", "report.py", "--since", "yesterday"]);
    }

    #[test]
    fn test_invalid_inputs_are_config_errors() {
        let err = build_descriptor(RenderParams {
            name: Some("Not_Valid".to_string()),
            ..params(&[])
        })
        .unwrap_err();
        assert!(matches!(err, RunError::Config(_)));

        let err = build_descriptor(RenderParams {
            image: " ".to_string(),
            ..params(&[])
        })
        .unwrap_err();
        assert!(matches!(err, RunError::Config(_)));
    }

    #[test]
    fn test_render_writes_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = SpecRenderer::new(dir.path().join("ipcexe.yml"));

        let descriptor = renderer
            .render(params(&["sh", "-c", "echo \"hello: world\" > out.txt"]))
            .unwrap();

        let written = std::fs::read_to_string(renderer.output_path()).unwrap();
        let manifest = JobManifest::from_yaml(&written).unwrap();
        assert_eq!(manifest.metadata.name, descriptor.name);
        assert_eq!(manifest.spec.template.spec.containers[0].command, descriptor.command);
    }

    #[test]
    fn test_render_empty_command_is_legal() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = SpecRenderer::new(dir.path().join("ipcexe.yml"));

        let descriptor = renderer.render(params(&[])).unwrap();
        assert!(descriptor.command.is_empty());
    }

    #[test]
    fn test_render_unwritable_path() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = SpecRenderer::new(dir.path().join("missing").join("ipcexe.yml"));

        let err = renderer.render(params(&["true"])).unwrap_err();
        assert!(matches!(err, RunError::Config(msg) if msg.contains("Cannot write")));
    }
}
