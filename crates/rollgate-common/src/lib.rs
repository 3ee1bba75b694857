//! ---
//! rg_section: "01-core-functionality"
//! rg_subsection: "module"
//! rg_type: "source"
//! rg_scope: "code"
//! rg_description: "Shared primitives and utilities for the restart tooling."
//! rg_version: "v0.0.0-prealpha"
//! rg_owner: "tbd"
//! ---
//! Core shared primitives for the rollgate workspace.
//! This crate exposes the cluster/member domain model, configuration loading,
//! and tracing initialisation consumed across the workspace.

#![warn(missing_docs)]

pub mod config;
pub mod logging;
pub mod model;

pub use config::{
    AppConfig, HealthConfig, KubeConfig, LoadedAppConfig, LoggingConfig, MetricsConfig,
    OrchestratorConfig, ResolverConfig, RestartConfig, RetryConfig,
};
pub use logging::{init_tracing, LogFormat};
pub use model::{
    ClusterIdentity, HealthStatus, MemberOrder, OwnerRef, RestartPlan, WorkloadMember,
    WorkloadRecord,
};
