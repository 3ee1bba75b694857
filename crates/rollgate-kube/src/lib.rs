//! ---
//! rg_section: "05-networking-external-interfaces"
//! rg_subsection: "module"
//! rg_type: "source"
//! rg_scope: "code"
//! rg_description: "kube-rs adapters implementing the orchestration ports."
//! rg_version: "v0.0.0-prealpha"
//! rg_owner: "tbd"
//! ---
//! Kubernetes side of rollgate: kubeconfig context loading, CrateDB custom
//! resource reads, StatefulSet listing and the pod delete-and-wait action.

#![warn(missing_docs)]

pub mod client;
pub mod cratedb;
pub mod error;
pub mod limiter;
pub mod pods;
pub mod workloads;

pub use client::connect;
pub use cratedb::{cluster_name_of, cratedb_resource, health_of, CrateDbClient};
pub use error::classify;
pub use limiter::ApiLimiter;
pub use pods::{is_recreated_and_ready, pod_ready, PodRestartAction};
pub use workloads::{workload_record, StatefulSetSource};
