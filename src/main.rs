//! Registry mirror reconciler daemon.
//!
//! Keeps the registry mirror configuration of a fleet of Windows nodes in
//! line with the cluster's ImageDigestMirrorSet and ImageTagMirrorSet
//! resources.
//!
//! # Architecture Overview
//!
//! ```text
//!   manifests dir ──▶ ┌────────────┐    ┌─────────┐    ┌─────────┐
//!   (IDMS / ITMS)     │   rules    │───▶│  merge  │───▶│ render  │
//!                     │   source   │    │         │    │hosts.toml│
//!                     └────────────┘    └─────────┘    └────┬────┘
//!                                                           │
//!   ┌────────────┐    ┌────────────┐                        ▼
//!   │ controller │───▶│ reconciler │──────────────▶ ┌──────────────┐     node 1
//!   │ resync /   │    │  one pass  │                │ distributor  │───▶ node 2
//!   │ watch /    │    └────────────┘                │ bounded fan- │     ...
//!   │ backoff    │          │                       │ out + records│     node N
//!   └────────────┘          ▼                       └──────────────┘
//!                      events / metrics
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use mirror_reconciler::config::{load_config, ObservabilityConfig, SourceWatcher};
use mirror_reconciler::distribute::ApplyRecordStore;
use mirror_reconciler::lifecycle::{signals, startup};
use mirror_reconciler::merge::merge;
use mirror_reconciler::observability::{logging, metrics};
use mirror_reconciler::render::render;
use mirror_reconciler::rules::{ManifestStore, MirrorRuleSource};
use mirror_reconciler::{Controller, Shutdown};

#[derive(Parser)]
#[command(name = "mirror-reconciler")]
#[command(version, about = "Distributes registry mirror configuration to Windows nodes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the reconcile loop until SIGTERM / ctrl-c
    Run {
        #[arg(short, long, default_value = "mirror-reconciler.toml")]
        config: PathBuf,
    },
    /// Merge a manifest directory and print the result without touching any node
    Render {
        #[arg(short, long)]
        manifests: PathBuf,

        #[arg(long, default_value = "certs.d")]
        config_dir: String,
    },
    /// Print the persisted per-node apply records
    Status {
        #[arg(short, long, default_value = "mirror-reconciler.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => run(config).await,
        Commands::Render { manifests, config_dir } => render_manifests(manifests, &config_dir).await,
        Commands::Status { config } => status(config),
    }
}

async fn run(config_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&config_path)?;
    logging::init(&config.observability)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        "mirror-reconciler starting"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let components = startup::build(&config)?;

    let (watcher, events) = SourceWatcher::new(&config_path, &config.sources.manifests_dir);
    let _watcher = match watcher.run() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "File watching unavailable; relying on periodic resync");
            None
        }
    };

    let shutdown = Shutdown::new();
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        match signals::wait_for_shutdown().await {
            Ok(signal) => tracing::info!(signal, "Shutdown signal received"),
            Err(e) => tracing::error!(error = %e, "Signal handler failed; shutting down"),
        }
        signal_shutdown.trigger();
    });

    let controller = Controller::new(components.reconciler, &config.controller).with_fleet(components.fleet);
    let reconciler = controller.run(events, shutdown.token()).await;

    if let Err(e) = reconciler.distributor().records().save_to_file() {
        tracing::warn!(error = %e, "Failed to save node apply records on shutdown");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn render_manifests(manifests: PathBuf, config_dir: &str) -> Result<(), Box<dyn std::error::Error>> {
    logging::init(&ObservabilityConfig {
        log_level: "warn".to_string(),
        ..Default::default()
    })?;

    let store = ManifestStore::new(manifests);
    let source = MirrorRuleSource::new(Arc::new(store));
    let output = merge(&source.fetch_all().await?);

    for conflict in &output.conflicts {
        eprintln!("warning: {conflict}");
    }

    println!("{}", serde_json::to_string_pretty(&output.config)?);
    let artifact = render(&output.config, config_dir);
    for (path, content) in &artifact.files {
        println!("\n# {}\n{}", path.display(), content);
    }
    Ok(())
}

fn status(config_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&config_path)?;
    let Some(path) = config.state.records_path else {
        eprintln!("state.records_path is not set; apply records are kept in memory only");
        return Ok(());
    };

    let records = ApplyRecordStore::load_from_file(&path)?;
    println!("{}", serde_json::to_string_pretty(&records.snapshot())?);
    Ok(())
}
