//! ---
//! rg_section: "05-networking-external-interfaces"
//! rg_subsection: "binary"
//! rg_type: "source"
//! rg_scope: "code"
//! rg_description: "Operator CLI for health-gated CrateDB rolling restarts."
//! rg_version: "v0.0.0-prealpha"
//! rg_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use rollgate_common::config::AppConfig;
use rollgate_common::logging::init_tracing;
use tracing::info;

mod inventory;
mod restart;

/// Config files probed when `--config` is not given.
const DEFAULT_CONFIG_CANDIDATES: &[&str] = &["rollgate.toml", "/etc/rollgate/rollgate.toml"];

#[derive(Debug, Parser)]
#[command(
    name = "rollgatectl",
    author,
    disable_version_flag = true,
    about = "Health-gated rolling restarts for CrateDB clusters on Kubernetes",
    long_about = None
)]
struct Cli {
    #[arg(
        short = 'V',
        long = "version",
        action = ArgAction::SetTrue,
        help = "Print version information and exit"
    )]
    version: bool,

    /// Kubeconfig context to use (defaults to `kube.context`, i.e. aks1-eastus-dev).
    #[arg(long = "context", alias = "ctx", global = true, value_name = "NAME")]
    context: Option<String>,

    /// Configuration file. Must exist when given.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "List CrateDB clusters, their health and StatefulSets")]
    Inventory,
    #[command(about = "Print the restart plan of every cluster without acting")]
    Plan(inventory::PlanArgs),
    #[command(about = "Restart cluster members one at a time behind GREEN health gates")]
    Restart(restart::RestartArgs),
}

impl Cli {
    fn load_config(&self) -> Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::from_path(path)?,
            None => AppConfig::load(DEFAULT_CONFIG_CANDIDATES)?,
        };
        if let Some(context) = &self.context {
            config.kube.context = context.clone();
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    if cli.version {
        println!("rollgatectl {}", env!("CARGO_PKG_VERSION"));
        return Ok(ExitCode::SUCCESS);
    }
    let Some(command) = &cli.command else {
        println!("no command given; see `rollgatectl --help`");
        return Ok(ExitCode::FAILURE);
    };

    let mut config = cli.load_config()?;
    if let Commands::Restart(args) = command {
        args.apply(&mut config);
    }
    config.validate()?;
    init_tracing("rollgatectl", &config.logging)?;
    info!(
        context = %config.kube.context,
        dry_run = config.restart.dry_run,
        "configuration loaded"
    );

    match command {
        Commands::Inventory => inventory::run_inventory(&config).await?,
        Commands::Plan(args) => inventory::run_plan(&config, args).await?,
        Commands::Restart(args) => return restart::run(&config, args).await,
    }
    Ok(ExitCode::SUCCESS)
}
