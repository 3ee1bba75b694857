//! ---
//! rg_section: "05-networking-external-interfaces"
//! rg_subsection: "binary"
//! rg_type: "source"
//! rg_scope: "code"
//! rg_description: "Inventory and plan subcommands."
//! rg_version: "v0.0.0-prealpha"
//! rg_owner: "tbd"
//! ---
use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use rollgate_common::config::AppConfig;
use rollgate_kube::{ApiLimiter, CrateDbClient, StatefulSetSource};
use rollgate_orchestrator::{
    discover, ClusterInventory, FleetFilter, RestartPlanner, WorkloadResolver, WorkloadSource,
};

/// Kubernetes adapters sharing one client and one request limiter.
pub struct Fleet {
    pub client: kube::Client,
    pub limiter: ApiLimiter,
    pub inventory: Arc<CrateDbClient>,
    pub workloads: Arc<StatefulSetSource>,
}

impl Fleet {
    pub async fn connect(config: &AppConfig) -> Result<Self> {
        let client = rollgate_kube::connect(&config.kube.context).await?;
        let limiter = ApiLimiter::new(config.kube.max_inflight_requests);
        Ok(Self {
            inventory: Arc::new(CrateDbClient::new(client.clone(), limiter.clone())),
            workloads: Arc::new(StatefulSetSource::new(client.clone(), limiter.clone())),
            client,
            limiter,
        })
    }

    pub fn planner(&self, config: &AppConfig) -> RestartPlanner {
        RestartPlanner::new(
            self.workloads.clone(),
            WorkloadResolver::from_config(&config.resolver),
        )
        .with_order(config.restart.member_order)
    }
}

#[derive(Debug, Args)]
pub struct PlanArgs {
    /// Only plan clusters in this namespace (repeatable).
    #[arg(long = "namespace", value_name = "NS")]
    pub namespaces: Vec<String>,

    /// Only plan clusters with this name (repeatable).
    #[arg(long = "cluster", value_name = "NAME")]
    pub clusters: Vec<String>,
}

pub fn fleet_filter(config: &AppConfig, namespaces: &[String], clusters: &[String]) -> FleetFilter {
    let mut filter = FleetFilter {
        namespaces: config.orchestrator.namespaces.clone(),
        clusters: clusters.to_vec(),
    };
    for namespace in namespaces {
        if !filter.namespaces.contains(namespace) {
            filter.namespaces.push(namespace.clone());
        }
    }
    filter
}

pub async fn run_inventory(config: &AppConfig) -> Result<()> {
    let fleet = Fleet::connect(config).await?;
    let clusters = fleet
        .inventory
        .list_clusters()
        .await
        .context("failed to list CrateDB clusters")?;

    println!(
        "{:<24} {:<32} {:<32} {:<8}",
        "NAMESPACE", "NAME", "CLUSTERNAME", "HEALTH"
    );
    for record in &clusters {
        println!(
            "{:<24} {:<32} {:<32} {:<8}",
            record.identity.namespace(),
            record.identity.name(),
            record.cluster_name.as_deref().unwrap_or("-"),
            record.health
        );
    }

    let namespaces: BTreeSet<&str> = clusters
        .iter()
        .map(|record| record.identity.namespace())
        .collect();
    for namespace in namespaces {
        println!();
        println!("{namespace}:");
        match fleet.workloads.list_workloads(namespace).await {
            Ok(workloads) => {
                for workload in workloads {
                    println!("  {:<40} replicas={}", workload.name, workload.desired_replicas);
                }
            }
            Err(err) => println!("  statefulsets unavailable: {err}"),
        }
    }
    Ok(())
}

pub async fn run_plan(config: &AppConfig, args: &PlanArgs) -> Result<()> {
    let fleet = Fleet::connect(config).await?;
    let planner = fleet.planner(config);
    let filter = fleet_filter(config, &args.namespaces, &args.clusters);
    let planned = discover(fleet.inventory.as_ref(), &planner, &filter)
        .await
        .context("failed to list CrateDB clusters")?;

    for item in &planned {
        match &item.plan {
            Ok(plan) => {
                println!("{} ({} members)", item.cluster, plan.len());
                for (step, member) in plan.members().iter().enumerate() {
                    println!("  {:>3}. {}", step + 1, member.pod_name);
                }
            }
            Err(err) => println!("{} cannot be planned: {err}", item.cluster),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_merges_configured_and_flag_namespaces() {
        let mut config = AppConfig::default();
        config.orchestrator.namespaces = vec!["ns-a".into()];
        let filter = fleet_filter(
            &config,
            &["ns-a".to_string(), "ns-b".to_string()],
            &["foo".to_string()],
        );
        assert_eq!(filter.namespaces, vec!["ns-a", "ns-b"]);
        assert_eq!(filter.clusters, vec!["foo"]);
    }
}
