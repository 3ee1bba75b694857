//! ---
//! rg_section: "04-restart-orchestration"
//! rg_subsection: "module"
//! rg_type: "source"
//! rg_scope: "code"
//! rg_description: "Maps StatefulSets to the CrateDB cluster that owns them."
//! rg_version: "v0.0.0-prealpha"
//! rg_owner: "tbd"
//! ---
use rollgate_common::config::ResolverConfig;
use rollgate_common::model::{ClusterIdentity, WorkloadRecord};
use thiserror::Error;

/// The workload carries no ownership information the resolver understands.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolutionError {
    /// Neither owner reference, label nor prefix matched.
    #[error("workload {namespace}/{workload} has no recognisable owner")]
    NoOwner { workload: String, namespace: String },
}

/// Resolves a workload to its owning cluster using, in order, an owner
/// reference, an ownership label and (opt-in) a literal name prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadResolver {
    owner_kind: String,
    owner_label: Option<String>,
    legacy_prefix: Option<String>,
}

impl Default for WorkloadResolver {
    fn default() -> Self {
        Self::from_config(&ResolverConfig::default())
    }
}

impl WorkloadResolver {
    /// Resolver matching owner references of `owner_kind` only.
    pub fn new(owner_kind: impl Into<String>) -> Self {
        Self {
            owner_kind: owner_kind.into(),
            owner_label: None,
            legacy_prefix: None,
        }
    }

    /// Also accept the value of this label as the cluster name.
    pub fn with_owner_label(mut self, label: impl Into<String>) -> Self {
        self.owner_label = Some(label.into());
        self
    }

    /// Fall back to stripping this literal prefix from the workload name.
    pub fn with_legacy_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.legacy_prefix = Some(prefix.into());
        self
    }

    /// Resolver from the `[resolver]` section.
    pub fn from_config(config: &ResolverConfig) -> Self {
        Self {
            owner_kind: config.owner_kind.clone(),
            owner_label: config.owner_label.clone(),
            legacy_prefix: config.legacy_prefix.clone(),
        }
    }

    /// Owning cluster of `workload`, in the workload's namespace.
    pub fn resolve(&self, workload: &WorkloadRecord) -> Result<ClusterIdentity, ResolutionError> {
        let by_owner = workload
            .owners
            .iter()
            .find(|owner| owner.kind == self.owner_kind && !owner.name.is_empty())
            .map(|owner| owner.name.as_str());

        let by_label = || {
            self.owner_label
                .as_ref()
                .and_then(|label| workload.labels.get(label))
                .map(String::as_str)
                .filter(|value| !value.is_empty())
        };

        match by_owner.or_else(by_label) {
            Some(name) => Ok(ClusterIdentity::new(name, workload.namespace.as_str())),
            None => self.resolve_name(&workload.name, &workload.namespace),
        }
    }

    /// Resolve purely from the workload name. Only succeeds when a legacy
    /// prefix is configured and the name starts with it.
    pub fn resolve_name(
        &self,
        workload: &str,
        namespace: &str,
    ) -> Result<ClusterIdentity, ResolutionError> {
        self.legacy_prefix
            .as_deref()
            .and_then(|prefix| workload.strip_prefix(prefix))
            .filter(|rest| !rest.is_empty())
            .map(|rest| ClusterIdentity::new(rest, namespace))
            .ok_or_else(|| ResolutionError::NoOwner {
                workload: workload.to_string(),
                namespace: namespace.to_string(),
            })
    }
}
