//! ordinald: operator CLI for partitioned rolling updates.
//!
//! # Usage
//!
//! ```text
//! ordinald init --output ordinal.toml --store /var/lib/ordinal/state.redb
//! ordinald apply --file cockroach.json
//! ordinald report --namespace db --name cockroach --ordinal 2 --address 10.0.0.12:8080
//! ordinald rollout --namespace db --name cockroach --image cockroachdb/cockroach:v23.2.4
//! ordinald status --namespace db --name cockroach
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ordinal_core::OrdinalConfig;
use ordinal_state::WorkloadId;

mod commands;

const DEFAULT_LOG_FILTER: &str = "info,ordinald=debug,ordinal_rollout=debug";

#[derive(Parser)]
#[command(
    name = "ordinald",
    about = "Roll templates out to ordered replica sets, one ordinal at a time",
    version,
    propagate_version = true
)]
struct Cli {
    /// Path to ordinal.toml. Defaults apply when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write an ordinal.toml with every default spelled out.
    Init {
        #[arg(short, long, default_value = "ordinal.toml")]
        output: PathBuf,
        /// Store path to record in the scaffold.
        #[arg(long, default_value = ordinal_core::config::DEFAULT_STORE_PATH)]
        store: PathBuf,
    },
    /// Create or replace a workload set from a JSON file.
    Apply {
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Print a workload set as JSON.
    Status {
        #[command(flatten)]
        target: Target,
    },
    /// Record the observed state of one replica.
    Report {
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        ordinal: u32,
        /// Template revision the replica runs. Defaults to the current one,
        /// and is required for ordinals below the partition.
        #[arg(long)]
        revision: Option<String>,
        #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
        ready: bool,
        /// `host:port` the replica serves health checks on.
        #[arg(long)]
        address: Option<String>,
    },
    /// Roll a new image out, highest ordinal first.
    Rollout {
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        image: String,
    },
}

#[derive(clap::Args)]
struct Target {
    #[arg(short, long, default_value = "default")]
    namespace: String,
    #[arg(long)]
    name: String,
}

impl Target {
    fn id(&self) -> WorkloadId {
        WorkloadId::new(&self.namespace, &self.name)
    }
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Init { output, store } => commands::init::init(&output, &store),
        command => {
            let config = commands::load_config(cli.config.as_deref())?;
            run(command, &config).await
        }
    }
}

async fn run(command: Command, config: &OrdinalConfig) -> anyhow::Result<()> {
    match command {
        Command::Init { output, store } => commands::init::init(&output, &store),
        Command::Apply { file } => commands::workload::apply(config, &file),
        Command::Status { target } => commands::workload::status(config, &target.id()),
        Command::Report {
            target,
            ordinal,
            revision,
            ready,
            address,
        } => commands::workload::report(
            config,
            &target.id(),
            commands::workload::ReplicaReport {
                ordinal,
                revision,
                ready,
                address,
            },
        ),
        Command::Rollout { target, image } => {
            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("interrupt received, cancelling rollout");
                    let _ = shutdown_tx.send(true);
                }
            });

            let id = target.id();
            let outcome = commands::rollout::rollout(config, &id, &image, shutdown_rx).await?;
            let skip_sleep = outcome.skip_sleep;
            match outcome.into_result() {
                Ok(skip_sleep) => {
                    println!("rolled {image} out to {id} (skip_sleep: {skip_sleep})");
                    Ok(())
                }
                Err(err) => {
                    println!("rollout of {id} failed (skip_sleep: {skip_sleep})");
                    Err(err.into())
                }
            }
        }
    }
}
