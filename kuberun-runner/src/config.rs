//! Runner configuration
//!
//! Defines the tunables for talking to the cluster and for the monitor's
//! polling policy. Values come from the environment with fallback to
//! defaults; command-line flags override them where both exist.

use std::path::PathBuf;
use std::time::Duration;

use crate::monitor::MonitorPolicy;

/// Default descriptor file written next to the invocation
pub const DEFAULT_DESCRIPTOR_FILE: &str = "ipcexe.yml";

/// Hard ceiling on how long a job may be monitored (24 hours)
pub const MAX_TIMEOUT: Duration = Duration::from_secs(86_400);

/// Fixed sleep between status queries
pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Per-request limit handed to kubectl
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Runner configuration
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// kubectl binary, looked up on PATH unless absolute
    pub kubectl: String,

    /// Namespace for every kubectl invocation (None = current context default)
    pub namespace: Option<String>,

    /// Where the rendered job descriptor is written
    pub descriptor_file: PathBuf,

    /// How long to sleep between status queries
    pub poll_interval: Duration,

    /// Upper bound for any requested timeout
    pub max_timeout: Duration,

    /// Consecutive transient query failures tolerated before giving up
    pub query_retries: u32,

    /// kubectl `--request-timeout` (zero disables it)
    pub request_timeout: Duration,
}

impl RunnerConfig {
    /// Creates a configuration with defaults
    pub fn new() -> Self {
        Self {
            kubectl: "kubectl".to_string(),
            namespace: None,
            descriptor_file: PathBuf::from(DEFAULT_DESCRIPTOR_FILE),
            poll_interval: POLL_INTERVAL,
            max_timeout: MAX_TIMEOUT,
            query_retries: 0,
            request_timeout: REQUEST_TIMEOUT,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Recognized environment variables (all optional):
    /// - KUBERUN_KUBECTL (default: kubectl)
    /// - KUBERUN_NAMESPACE
    /// - KUBERUN_FILENAME (default: ipcexe.yml)
    /// - KUBERUN_POLL_INTERVAL (seconds, default: 2)
    /// - KUBERUN_MAX_TIMEOUT (seconds, default: 86400)
    /// - KUBERUN_QUERY_RETRIES (default: 0)
    /// - KUBERUN_REQUEST_TIMEOUT (seconds, default: 30, 0 disables)
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`RunnerConfig::from_env`] with an injectable variable source
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::new();

        let seconds = |key: &str, default: Duration| -> anyhow::Result<Duration> {
            match lookup(key) {
                Some(raw) => raw
                    .trim()
                    .parse::<u64>()
                    .map(Duration::from_secs)
                    .map_err(|_| anyhow::anyhow!("{} must be a number of seconds, got '{}'", key, raw)),
                None => Ok(default),
            }
        };

        let poll_interval = seconds("KUBERUN_POLL_INTERVAL", defaults.poll_interval)?;
        let max_timeout = seconds("KUBERUN_MAX_TIMEOUT", defaults.max_timeout)?;
        let request_timeout = seconds("KUBERUN_REQUEST_TIMEOUT", defaults.request_timeout)?;

        let query_retries = match lookup("KUBERUN_QUERY_RETRIES") {
            Some(raw) => raw.trim().parse::<u32>().map_err(|_| {
                anyhow::anyhow!("KUBERUN_QUERY_RETRIES must be a count, got '{}'", raw)
            })?,
            None => defaults.query_retries,
        };

        Ok(Self {
            kubectl: lookup("KUBERUN_KUBECTL").unwrap_or(defaults.kubectl),
            namespace: lookup("KUBERUN_NAMESPACE").filter(|ns| !ns.trim().is_empty()),
            descriptor_file: lookup("KUBERUN_FILENAME")
                .map(PathBuf::from)
                .unwrap_or(defaults.descriptor_file),
            poll_interval,
            max_timeout,
            query_retries,
            request_timeout,
        })
    }

    /// Overrides the descriptor file location
    pub fn with_descriptor_file(mut self, path: Option<PathBuf>) -> Self {
        if let Some(path) = path {
            self.descriptor_file = path;
        }
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.kubectl.trim().is_empty() {
            anyhow::bail!("kubectl binary cannot be empty");
        }

        if self.descriptor_file.as_os_str().is_empty() {
            anyhow::bail!("descriptor file cannot be empty");
        }

        if self.poll_interval.is_zero() {
            anyhow::bail!("poll_interval must be greater than 0");
        }

        if self.max_timeout.is_zero() {
            anyhow::bail!("max_timeout must be greater than 0");
        }

        Ok(())
    }

    /// Polling policy handed to the job monitor
    pub fn monitor_policy(&self) -> MonitorPolicy {
        MonitorPolicy {
            poll_interval: self.poll_interval,
            max_timeout: self.max_timeout,
            query_retries: self.query_retries,
        }
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = RunnerConfig::default();
        assert_eq!(config.kubectl, "kubectl");
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.max_timeout, Duration::from_secs(86_400));
        assert_eq!(config.descriptor_file, PathBuf::from("ipcexe.yml"));
        assert_eq!(config.query_retries, 0);
        assert_eq!(config.request_timeout, REQUEST_TIMEOUT);

        // Defaults should pass validation
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup_empty_uses_defaults() {
        let config = RunnerConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.poll_interval, POLL_INTERVAL);
        assert!(config.namespace.is_none());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = RunnerConfig::from_lookup(lookup_from(&[
            ("KUBERUN_KUBECTL", "/usr/local/bin/kubectl"),
            ("KUBERUN_NAMESPACE", "batch"),
            ("KUBERUN_FILENAME", "/tmp/job.yml"),
            ("KUBERUN_POLL_INTERVAL", "5"),
            ("KUBERUN_MAX_TIMEOUT", "600"),
            ("KUBERUN_QUERY_RETRIES", "3"),
            ("KUBERUN_REQUEST_TIMEOUT", "0"),
        ]))
        .unwrap();

        assert_eq!(config.kubectl, "/usr/local/bin/kubectl");
        assert_eq!(config.namespace.as_deref(), Some("batch"));
        assert_eq!(config.descriptor_file, PathBuf::from("/tmp/job.yml"));
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.max_timeout, Duration::from_secs(600));
        assert_eq!(config.query_retries, 3);
        assert!(config.request_timeout.is_zero());
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        // Unparsable values are errors, not silent defaults
        assert!(RunnerConfig::from_lookup(lookup_from(&[("KUBERUN_POLL_INTERVAL", "soon")])).is_err());
        assert!(RunnerConfig::from_lookup(lookup_from(&[("KUBERUN_QUERY_RETRIES", "-1")])).is_err());
    }

    #[test]
    fn test_config_validation() {
        let mut config = RunnerConfig::default();
        assert!(config.validate().is_ok());

        // Zero poll interval should fail
        config.poll_interval = Duration::ZERO;
        assert!(config.validate().is_err());
        config.poll_interval = POLL_INTERVAL;

        // Empty binary should fail
        config.kubectl = String::new();
        assert!(config.validate().is_err());
        config.kubectl = "kubectl".to_string();

        // Zero ceiling should fail
        config.max_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_descriptor_override() {
        let config = RunnerConfig::default().with_descriptor_file(Some(PathBuf::from("a.yml")));
        assert_eq!(config.descriptor_file, PathBuf::from("a.yml"));

        let config = RunnerConfig::default().with_descriptor_file(None);
        assert_eq!(config.descriptor_file, PathBuf::from(DEFAULT_DESCRIPTOR_FILE));
    }
}
