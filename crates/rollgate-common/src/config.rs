//! ---
//! rg_section: "01-core-functionality"
//! rg_subsection: "module"
//! rg_type: "source"
//! rg_scope: "code"
//! rg_description: "Shared primitives and utilities for the restart tooling."
//! rg_version: "v0.0.0-prealpha"
//! rg_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds, DurationSeconds};
use tracing::debug;

use crate::logging::LogFormat;
use crate::model::MemberOrder;

fn default_context() -> String {
    "aks1-eastus-dev".to_owned()
}

fn default_max_inflight_requests() -> usize {
    4
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_gate_timeout() -> Duration {
    Duration::from_secs(1800)
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(10)
}

fn default_jitter() -> Duration {
    Duration::from_millis(250)
}

fn default_dry_run() -> bool {
    true
}

fn default_recreate_timeout() -> Duration {
    Duration::from_secs(600)
}

fn default_owner_kind() -> String {
    "CrateDB".to_owned()
}

fn default_owner_label() -> Option<String> {
    Some("app.kubernetes.io/name".to_owned())
}

fn default_max_concurrent_clusters() -> usize {
    1
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

/// Primary configuration object for a rollgate run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// `[kube]` section.
    #[serde(default)]
    pub kube: KubeConfig,
    /// `[health]` section.
    #[serde(default)]
    pub health: HealthConfig,
    /// `[retry]` section.
    #[serde(default)]
    pub retry: RetryConfig,
    /// `[restart]` section.
    #[serde(default)]
    pub restart: RestartConfig,
    /// `[resolver]` section.
    #[serde(default)]
    pub resolver: ResolverConfig,
    /// `[orchestrator]` section.
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    /// `[logging]` section.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// `[metrics]` section.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    /// The parsed and validated configuration.
    pub config: AppConfig,
    /// `None` when no file was found and built-in defaults are in effect.
    pub source: Option<PathBuf>,
}

impl AppConfig {
    /// Environment variable naming a config file that takes precedence over the candidates.
    pub const ENV_CONFIG_PATH: &str = "ROLLGATE_CONFIG";

    /// Load configuration from disk, respecting the `ROLLGATE_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from the first existing candidate. Falls back to the
    /// defaults when none of the candidates exist.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: Some(path),
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: Some(path),
                });
            }
        }

        debug!(
            inspected = candidates.len(),
            "no configuration file found; using defaults"
        );
        Ok(LoadedAppConfig {
            config: Self::default(),
            source: None,
        })
    }

    /// Load a configuration file that must exist.
    pub fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        if self.kube.context.trim().is_empty() {
            return Err(anyhow!("kube.context cannot be empty"));
        }
        if self.kube.max_inflight_requests == 0 {
            return Err(anyhow!("kube.max_inflight_requests must be at least 1"));
        }
        if self.health.poll_interval.is_zero() {
            return Err(anyhow!("health.poll_interval must be greater than zero"));
        }
        if self.retry.base_delay > self.retry.max_delay {
            return Err(anyhow!(
                "retry.base_delay_ms ({:?}) exceeds retry.max_delay_ms ({:?})",
                self.retry.base_delay,
                self.retry.max_delay
            ));
        }
        if self.restart.recreate_timeout.is_zero() {
            return Err(anyhow!("restart.recreate_timeout must be greater than zero"));
        }
        if self.orchestrator.max_concurrent_clusters == 0 {
            return Err(anyhow!(
                "orchestrator.max_concurrent_clusters must be at least 1"
            ));
        }
        self.resolver.validate()?;
        Ok(())
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Cluster access settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KubeConfig {
    /// Kubeconfig context to activate.
    #[serde(default = "default_context")]
    pub context: String,
    /// Upper bound on concurrent outbound API requests.
    #[serde(default = "default_max_inflight_requests")]
    pub max_inflight_requests: usize,
}

impl Default for KubeConfig {
    fn default() -> Self {
        Self {
            context: default_context(),
            max_inflight_requests: default_max_inflight_requests(),
        }
    }
}

/// Health gate cadence.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Seconds between queries while the cluster is not GREEN.
    #[serde(default = "default_poll_interval")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub poll_interval: Duration,
    /// Maximum wait per gate. Zero disables the bound.
    #[serde(default = "default_gate_timeout")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub timeout: Duration,
}

impl HealthConfig {
    /// The gate bound, `None` when the configured timeout is zero.
    pub fn gate_timeout(&self) -> Option<Duration> {
        if self.timeout.is_zero() {
            None
        } else {
            Some(self.timeout)
        }
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            timeout: default_gate_timeout(),
        }
    }
}

/// Backoff applied to failed health queries.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Consecutive failed health queries tolerated before a gate fails.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay before the first retry.
    #[serde(rename = "base_delay_ms", default = "default_base_delay")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub base_delay: Duration,
    /// Ceiling on a single backoff delay.
    #[serde(rename = "max_delay_ms", default = "default_max_delay")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub max_delay: Duration,
    /// Random extra delay added to each retry.
    #[serde(rename = "jitter_ms", default = "default_jitter")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub jitter: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay: default_base_delay(),
            max_delay: default_max_delay(),
            jitter: default_jitter(),
        }
    }
}

/// Member restart behaviour.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestartConfig {
    /// Log the restart action instead of deleting pods.
    #[serde(default = "default_dry_run")]
    pub dry_run: bool,
    /// How long a deleted pod may take to come back Ready.
    #[serde(default = "default_recreate_timeout")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub recreate_timeout: Duration,
    /// Ordinal order within one StatefulSet.
    #[serde(default)]
    pub member_order: MemberOrder,
}

impl Default for RestartConfig {
    fn default() -> Self {
        Self {
            dry_run: default_dry_run(),
            recreate_timeout: default_recreate_timeout(),
            member_order: MemberOrder::default(),
        }
    }
}

/// How StatefulSets are attributed to the CrateDB resource that owns them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Owner reference kind naming the cluster.
    #[serde(default = "default_owner_kind")]
    pub owner_kind: String,
    /// Label whose value names the cluster.
    #[serde(default = "default_owner_label")]
    pub owner_label: Option<String>,
    /// Literal name prefix stripped as a last resort. Disabled unless set.
    #[serde(default)]
    pub legacy_prefix: Option<String>,
}

impl ResolverConfig {
    /// Reject an empty legacy prefix, which would match every workload.
    pub fn validate(&self) -> Result<()> {
        if let Some(prefix) = &self.legacy_prefix {
            if prefix.is_empty() {
                return Err(anyhow!("resolver.legacy_prefix cannot be empty when set"));
            }
        }
        Ok(())
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            owner_kind: default_owner_kind(),
            owner_label: default_owner_label(),
            legacy_prefix: None,
        }
    }
}

/// Fleet-level run settings.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Clusters sequenced at the same time.
    #[serde(default = "default_max_concurrent_clusters")]
    pub max_concurrent_clusters: usize,
    /// Cancel the whole run once this much time has passed.
    #[serde(default)]
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    pub run_deadline: Option<Duration>,
    /// Restrict the run to these namespaces. Empty means all namespaces.
    #[serde(default)]
    pub namespaces: Vec<String>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_clusters: default_max_concurrent_clusters(),
            run_deadline: None,
            namespaces: Vec::new(),
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Console format.
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    /// Optional directory for a daily rolling JSON log file.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    /// File name prefix, the service name when unset.
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
            directory: None,
            file_prefix: None,
        }
    }
}

/// Metrics export settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Write the Prometheus text exposition here when a run finishes.
    #[serde(default)]
    pub textfile: Option<PathBuf>,
}
