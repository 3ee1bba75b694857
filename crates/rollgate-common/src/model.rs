//! ---
//! rg_section: "01-core-functionality"
//! rg_subsection: "module"
//! rg_type: "source"
//! rg_scope: "code"
//! rg_description: "Cluster, member, and plan domain types."
//! rg_version: "v0.0.0-prealpha"
//! rg_owner: "tbd"
//! ---
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of one CrateDB cluster resource. Immutable once resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClusterIdentity {
    namespace: String,
    name: String,
}

impl ClusterIdentity {
    /// Identity of the CrateDB resource `name` in `namespace`.
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }

    /// `metadata.name` of the CrateDB resource.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Namespace the resource and its workloads live in.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

impl fmt::Display for ClusterIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Health reported by the CrateDB operator under `status.crateDBStatus.health`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HealthStatus {
    /// All shards allocated; the only status that opens a gate.
    Green,
    /// Replicas missing.
    Yellow,
    /// Primaries missing.
    Red,
    /// Field absent or not one of the known values.
    #[default]
    Unknown,
}

impl HealthStatus {
    /// Map a raw wire value to a status. Anything other than the three known
    /// values, including a missing field, is `Unknown`.
    pub fn from_wire(raw: Option<&str>) -> Self {
        match raw {
            Some("GREEN") => HealthStatus::Green,
            Some("YELLOW") => HealthStatus::Yellow,
            Some("RED") => HealthStatus::Red,
            _ => HealthStatus::Unknown,
        }
    }

    /// Whether a health gate may open.
    pub fn is_green(&self) -> bool {
        matches!(self, HealthStatus::Green)
    }

    /// Wire spelling, `UNKNOWN` for [`HealthStatus::Unknown`].
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Green => "GREEN",
            HealthStatus::Yellow => "YELLOW",
            HealthStatus::Red => "RED",
            HealthStatus::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One disruptable pod of a cluster's replica set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkloadMember {
    /// StatefulSet ordinal.
    pub ordinal: u32,
    /// `<workload>-<ordinal>`.
    pub pod_name: String,
}

impl WorkloadMember {
    /// Member with the given ordinal and pod name.
    pub fn new(ordinal: u32, pod_name: impl Into<String>) -> Self {
        Self {
            ordinal,
            pod_name: pod_name.into(),
        }
    }
}

impl fmt::Display for WorkloadMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pod_name)
    }
}

/// Order in which the members of a single workload are disrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberOrder {
    /// Ordinal 0 first.
    #[default]
    Ascending,
    /// Highest ordinal first, as the StatefulSet controller rolls.
    Descending,
}

/// Owner reference attached to a workload resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerRef {
    /// Kind of the owning object, e.g. `CrateDB`.
    pub kind: String,
    /// Name of the owning object.
    pub name: String,
}

/// Snapshot of a replica-set style workload (a StatefulSet) as listed from the API.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WorkloadRecord {
    /// StatefulSet name.
    pub name: String,
    /// StatefulSet namespace.
    pub namespace: String,
    /// `spec.replicas`, defaulted and clamped at zero.
    pub desired_replicas: u32,
    /// `metadata.ownerReferences`.
    pub owners: Vec<OwnerRef>,
    /// `metadata.labels`.
    pub labels: BTreeMap<String, String>,
}

impl WorkloadRecord {
    /// Record without owners or labels.
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        desired_replicas: u32,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            desired_replicas,
            ..Default::default()
        }
    }

    /// Append an owner reference.
    pub fn with_owner(mut self, kind: impl Into<String>, name: impl Into<String>) -> Self {
        self.owners.push(OwnerRef {
            kind: kind.into(),
            name: name.into(),
        });
        self
    }

    /// Set a label.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Members derived from the desired replica count. StatefulSet pods are
    /// named `<workload>-<ordinal>`.
    pub fn members(&self, order: MemberOrder) -> Vec<WorkloadMember> {
        let mut members: Vec<WorkloadMember> = (0..self.desired_replicas)
            .map(|ordinal| WorkloadMember::new(ordinal, format!("{}-{}", self.name, ordinal)))
            .collect();
        if order == MemberOrder::Descending {
            members.reverse();
        }
        members
    }
}

/// Ordered members to restart for one cluster during a single run. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RestartPlan {
    members: Vec<WorkloadMember>,
}

impl RestartPlan {
    /// Plan restarting `members` in the given order.
    pub fn new(members: Vec<WorkloadMember>) -> Self {
        Self { members }
    }

    /// Append members after the existing ones.
    pub fn extend(&mut self, members: impl IntoIterator<Item = WorkloadMember>) {
        self.members.extend(members);
    }

    /// Members in restart order.
    pub fn members(&self) -> &[WorkloadMember] {
        &self.members
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether there is nothing to restart.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
