//! Declarative Job manifest
//!
//! Models the `batch/v1` Job document consumed by `kubectl apply`. Only the
//! fields this tool sets are represented.

use serde::{Deserialize, Serialize};

use crate::domain::job::{CONTAINER_WORKDIR, JobDescriptor};

const VOLUME_NAME: &str = "cwd";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobManifest {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: JobSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSpec {
    pub template: PodTemplate,
    /// Always zero: retry policy belongs to the runner, not the scheduler
    pub backoff_limit: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodTemplate {
    pub spec: PodSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    pub containers: Vec<Container>,
    pub restart_policy: String,
    pub security_context: SecurityContext,
    pub volumes: Vec<Volume>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    pub name: String,
    pub image: String,
    /// Omitted when empty so the image entrypoint runs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
    pub working_dir: String,
    pub volume_mounts: Vec<VolumeMount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeMount {
    pub name: String,
    pub mount_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityContext {
    pub run_as_user: u32,
    pub run_as_group: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    pub name: String,
    pub host_path: HostPathSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostPathSource {
    pub path: String,
}

impl JobManifest {
    /// Serializes the manifest as a YAML document
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        let body = serde_yaml::to_string(self)?;
        Ok(format!("---\n{}", body))
    }

    pub fn from_yaml(source: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(source)
    }
}

impl From<&JobDescriptor> for JobManifest {
    fn from(job: &JobDescriptor) -> Self {
        Self {
            api_version: "batch/v1".to_string(),
            kind: "Job".to_string(),
            metadata: ObjectMeta {
                name: job.name.clone(),
            },
            spec: JobSpec {
                template: PodTemplate {
                    spec: PodSpec {
                        containers: vec![Container {
                            name: job.name.clone(),
                            image: job.image.clone(),
                            command: job.command.clone(),
                            working_dir: CONTAINER_WORKDIR.to_string(),
                            volume_mounts: vec![VolumeMount {
                                name: VOLUME_NAME.to_string(),
                                mount_path: job.mount_path.clone(),
                            }],
                        }],
                        restart_policy: "Never".to_string(),
                        security_context: SecurityContext {
                            run_as_user: job.uid,
                            run_as_group: job.gid,
                        },
                        volumes: vec![Volume {
                            name: VOLUME_NAME.to_string(),
                            host_path: HostPathSource {
                                path: job.host_path.clone(),
                            },
                        }],
                    },
                },
                backoff_limit: 0,
            },
        }
    }
}
