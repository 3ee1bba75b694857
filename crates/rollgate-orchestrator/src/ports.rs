//! ---
//! rg_section: "04-restart-orchestration"
//! rg_subsection: "module"
//! rg_type: "source"
//! rg_scope: "code"
//! rg_description: "Collaborator seams towards the cluster API."
//! rg_version: "v0.0.0-prealpha"
//! rg_owner: "tbd"
//! ---
//! Traits the orchestration core uses to reach the outside world. The
//! Kubernetes implementations live in `rollgate-kube`; tests use in-memory fakes.

use std::time::Duration;

use async_trait::async_trait;
use rollgate_common::model::{ClusterIdentity, HealthStatus, WorkloadMember, WorkloadRecord};
use rollgate_resilience::CancelSignal;
use thiserror::Error;

/// Whether a failed query is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// Transport failures, throttling, permission hiccups, server errors.
    Transient,
    /// The request can never succeed as issued (e.g. the resource does not exist).
    Permanent,
}

/// Failure of a single read or write against the cluster API.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct QueryError {
    /// Retry classification.
    pub kind: QueryErrorKind,
    /// Human readable cause.
    pub message: String,
}

impl QueryError {
    /// A failure worth retrying.
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: QueryErrorKind::Transient,
            message: message.into(),
        }
    }

    /// A failure that repeating the request cannot fix.
    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: QueryErrorKind::Permanent,
            message: message.into(),
        }
    }

    /// Whether the health gate may spend retry budget on it.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind, QueryErrorKind::Transient)
    }
}

/// One CrateDB resource as reported by the inventory query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterRecord {
    /// Namespace and resource name.
    pub identity: ClusterIdentity,
    /// `spec.cluster.name`, the human facing cluster name.
    pub cluster_name: Option<String>,
    /// Health at listing time.
    pub health: HealthStatus,
}

/// Reads the health signal of a cluster.
#[async_trait]
pub trait HealthSource: Send + Sync {
    /// Current health of `cluster`.
    async fn cluster_health(&self, cluster: &ClusterIdentity) -> Result<HealthStatus, QueryError>;
}

/// Lists the CrateDB clusters visible to the caller.
#[async_trait]
pub trait ClusterInventory: Send + Sync {
    /// Every cluster across all namespaces.
    async fn list_clusters(&self) -> Result<Vec<ClusterRecord>, QueryError>;
}

/// Lists replica-set style workloads in a namespace.
#[async_trait]
pub trait WorkloadSource: Send + Sync {
    /// All workloads in `namespace`, owned by a cluster or not.
    async fn list_workloads(&self, namespace: &str) -> Result<Vec<WorkloadRecord>, QueryError>;
}

/// Failure of the disruptive step for one member.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ActionError {
    /// The API rejected or failed the restart request.
    #[error("restart request for {pod} failed: {source}")]
    Request { pod: String, source: QueryError },
    /// The replacement pod did not become Ready in time.
    #[error("{pod} was not recreated and ready within {timeout:?}")]
    RecreateTimeout { pod: String, timeout: Duration },
    /// The run was cancelled mid-restart.
    #[error("restart of {pod} cancelled")]
    Cancelled { pod: String },
}

/// The disruptive step applied to a single member.
#[async_trait]
pub trait RestartAction: Send + Sync {
    /// Short label used in logs and metrics.
    fn mode(&self) -> &'static str;

    /// Disrupt `member` and return once it is back, or fail.
    async fn restart(
        &self,
        cluster: &ClusterIdentity,
        member: &WorkloadMember,
        cancel: &CancelSignal,
    ) -> Result<(), ActionError>;
}

/// Restart action that only logs what would have been disrupted.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunAction;

#[async_trait]
impl RestartAction for DryRunAction {
    fn mode(&self) -> &'static str {
        "dry-run"
    }

    async fn restart(
        &self,
        cluster: &ClusterIdentity,
        member: &WorkloadMember,
        _cancel: &CancelSignal,
    ) -> Result<(), ActionError> {
        tracing::info!(
            cluster = %cluster,
            pod = %member.pod_name,
            ordinal = member.ordinal,
            "dry-run: pod would be deleted and recreated"
        );
        Ok(())
    }
}
