use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

use scrapesync::{Settings, SyncPipeline, WatchController, logging};

#[derive(Parser)]
#[command(name = "scrapesync")]
#[command(about = "Keeps the log agent's scrape config in sync with a watched directory")]
#[command(version)]
struct Cli {
    /// Path to the configuration file (default: ./scrapesync.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default scrapesync.toml to the working directory
    Init {
        /// Overwrite an existing configuration file
        #[arg(short, long)]
        force: bool,
    },

    /// Show the effective configuration
    Config,

    /// Run one reconciliation cycle and exit
    Sync,

    /// Watch the log directory and reconcile on every change
    Watch,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Init { force } = &cli.command {
        let path = Settings::init_config_file(*force)
            .map_err(|e| anyhow::anyhow!("{e}"))?;
        println!("Created configuration at: {}", path.display());
        return Ok(());
    }

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    }
    .map_err(|e| anyhow::anyhow!("Failed to load configuration: {e}"))?;

    logging::init_with_config(&settings.logging);

    match cli.command {
        Commands::Init { .. } => unreachable!("handled above"),

        Commands::Config => {
            let rendered =
                toml::to_string_pretty(&settings).context("Failed to render configuration")?;
            print!("{rendered}");
        }

        Commands::Sync => {
            ensure_logs_dir(&settings)?;
            let pipeline = SyncPipeline::from_settings(&settings);
            let outcome = pipeline
                .run_cycle()
                .await
                .context("Reconciliation cycle failed")?;
            println!("Updated scrape config with {} jobs", outcome.jobs);
        }

        Commands::Watch => {
            let shutdown = CancellationToken::new();
            let signal_token = shutdown.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("shutdown requested");
                    signal_token.cancel();
                }
            });

            let controller = WatchController::new(
                SyncPipeline::from_settings(&settings),
                settings.watch.logs_dir.clone(),
                settings.watch.debounce_ms,
                shutdown,
            )
            .context("Failed to start watcher")?;

            controller.run().await;
        }
    }

    Ok(())
}

fn ensure_logs_dir(settings: &Settings) -> anyhow::Result<()> {
    let dir = &settings.watch.logs_dir;
    if !dir.exists() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create watched directory {}", dir.display()))?;
    }
    Ok(())
}
