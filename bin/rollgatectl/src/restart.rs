//! ---
//! rg_section: "05-networking-external-interfaces"
//! rg_subsection: "binary"
//! rg_type: "source"
//! rg_scope: "code"
//! rg_description: "Restart subcommand wiring the orchestrator to the cluster API."
//! rg_version: "v0.0.0-prealpha"
//! rg_owner: "tbd"
//! ---
use std::fs;
use std::future::{pending, Future};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use rollgate_common::config::AppConfig;
use rollgate_kube::PodRestartAction;
use rollgate_logging::{log_system_event, SystemEventOutcome};
use rollgate_orchestrator::{
    new_registry, ClusterStatus, DryRunAction, HealthMonitor, PollPolicy, RestartAction,
    RestartOrchestrator, RestartSequencer, RolloutMetrics, RunSummary,
};
use rollgate_resilience::{cancel_pair, CancelHandle};
use tracing::{info, warn};

use crate::inventory::{fleet_filter, Fleet};

#[derive(Debug, Args)]
pub struct RestartArgs {
    /// Seconds between health queries while a cluster is not GREEN.
    #[arg(long, value_name = "SECS")]
    pub poll_interval: Option<u64>,

    /// Upper bound in seconds on a single health gate; 0 waits indefinitely.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Only log the pods that would be deleted (the default).
    #[arg(long, conflicts_with = "execute")]
    pub dry_run: bool,

    /// Actually delete pods and wait for their recreation.
    #[arg(long)]
    pub execute: bool,

    /// Number of clusters restarted at the same time.
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Only restart clusters in this namespace (repeatable).
    #[arg(long = "namespace", value_name = "NS")]
    pub namespaces: Vec<String>,

    /// Only restart clusters with this name (repeatable).
    #[arg(long = "cluster", value_name = "NAME")]
    pub clusters: Vec<String>,
}

impl RestartArgs {
    /// Fold command line overrides into the loaded configuration.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(secs) = self.poll_interval {
            config.health.poll_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = self.timeout {
            config.health.timeout = Duration::from_secs(secs);
        }
        if self.execute {
            config.restart.dry_run = false;
        } else if self.dry_run {
            config.restart.dry_run = true;
        }
        if let Some(concurrency) = self.concurrency {
            config.orchestrator.max_concurrent_clusters = concurrency;
        }
        for namespace in &self.namespaces {
            if !config.orchestrator.namespaces.contains(namespace) {
                config.orchestrator.namespaces.push(namespace.clone());
            }
        }
    }
}

pub async fn run(config: &AppConfig, args: &RestartArgs) -> Result<ExitCode> {
    let fleet = Fleet::connect(config).await?;
    let metrics = RolloutMetrics::new(new_registry())?;
    let (cancel, signal) = cancel_pair();

    let action: Arc<dyn RestartAction> = if config.restart.dry_run {
        warn!("dry run: no pod will be deleted; pass --execute to restart members");
        Arc::new(DryRunAction)
    } else {
        Arc::new(PodRestartAction::new(
            fleet.client.clone(),
            fleet.limiter.clone(),
            config.restart.recreate_timeout,
        ))
    };

    let monitor = HealthMonitor::new(fleet.inventory.clone())
        .with_cancel(signal)
        .with_metrics(metrics.clone());
    let sequencer = RestartSequencer::new(monitor, action).with_metrics(metrics.clone());
    let orchestrator = RestartOrchestrator::new(
        sequencer,
        PollPolicy::from_config(&config.health, &config.retry),
    )
    .with_max_concurrent(config.orchestrator.max_concurrent_clusters)
    .with_metrics(metrics.clone());

    let planner = fleet.planner(config);
    let filter = fleet_filter(config, &[], &args.clusters);
    let interrupts = tokio::spawn(cancel_on_interrupt(cancel, config.orchestrator.run_deadline));

    let result = orchestrator
        .run_fleet(fleet.inventory.as_ref(), &planner, &filter)
        .await;
    interrupts.abort();
    let summary = result.context("failed to list CrateDB clusters")?;

    print_summary(&summary);
    if let Some(path) = &config.metrics.textfile {
        fs::write(path, metrics.render()?)
            .with_context(|| format!("unable to write metrics to {}", path.display()))?;
        info!(path = %path.display(), "metrics written");
    }

    Ok(if summary.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Cancel the run on Ctrl-C or once the optional run deadline elapses.
async fn cancel_on_interrupt(cancel: CancelHandle, deadline: Option<Duration>) {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => "ctrl-c received",
            Err(err) => {
                // Only the deadline can end the run from here on.
                warn!(error = %err, "unable to listen for ctrl-c");
                pending::<&'static str>().await
            }
        }
    };
    cancel_when(cancel, ctrl_c, deadline).await;
}

/// Cancel once `interrupt` resolves or `deadline` elapses, whichever comes first.
/// A pending `interrupt` never masks the deadline.
async fn cancel_when<F>(cancel: CancelHandle, interrupt: F, deadline: Option<Duration>)
where
    F: Future<Output = &'static str>,
{
    let deadline = async move {
        match deadline {
            Some(deadline) => tokio::time::sleep(deadline).await,
            None => pending::<()>().await,
        }
    };
    let reason = tokio::select! {
        reason = interrupt => reason,
        _ = deadline => "run deadline reached",
    };
    log_system_event(
        None,
        "run.cancel",
        &format!("{reason}; cancelling in-flight gates"),
        SystemEventOutcome::Fault,
    );
    cancel.cancel();
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!("{:<40} {:<10} {:>9}  DETAIL", "CLUSTER", "OUTCOME", "RESTARTED");
    for outcome in &summary.outcomes {
        let (label, detail) = match &outcome.status {
            ClusterStatus::Done { .. } => ("done", String::new()),
            ClusterStatus::Abandoned { reason, .. } => ("abandoned", reason.to_string()),
        };
        println!(
            "{:<40} {:<10} {:>9}  {}",
            outcome.cluster.to_string(),
            label,
            outcome.restarted(),
            detail
        );
    }
    println!(
        "\n{} completed, {} abandoned, {} members restarted",
        summary.completed().count(),
        summary.abandoned().count(),
        summary.total_restarted()
    );
}
