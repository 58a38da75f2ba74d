//! Mirror CLI - mirror command

use anyhow::{Context, Result};
use clap::Parser;
use mirror_sync::{converged, CancelToken, FileConfig, Reconciler, SyncConfig};
use owo_colors::OwoColorize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{info, warn};

mod logging;

/// Mirror - keep a replica directory identical to an origin directory
#[derive(Parser, Debug)]
#[command(name = "mirror")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory to mirror (never modified)
    origin: PathBuf,

    /// Directory kept identical to the origin (created if missing)
    replica: PathBuf,

    /// Directory that receives logs.txt
    log_dir: PathBuf,

    /// Seconds between synchronization passes
    #[arg(value_parser = clap::value_parser!(u64).range(1..))]
    interval_secs: u64,

    /// TOML file with additional settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run a single pass and exit
    #[arg(long, conflicts_with = "verify")]
    once: bool,

    /// Only compare the two trees and report whether they match
    #[arg(long)]
    verify: bool,

    /// Include debug detail in the logs
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let _guard = logging::init(&cli.log_dir, cli.verbose)?;

    let mut config = SyncConfig::new(
        &cli.origin,
        &cli.replica,
        Duration::from_secs(cli.interval_secs),
    );
    if let Some(path) = &cli.config {
        let file = FileConfig::load(path).context("Failed to load config file")?;
        config.apply_file(&file);
    }
    let config = config.validated().context("Invalid sync configuration")?;

    if cli.verify {
        return Ok(verify(&config));
    }

    info!(
        "Start sync \"{}\" and \"{}\"",
        config.origin.display(),
        config.replica.display()
    );
    let mut reconciler = Reconciler::new(config);

    if cli.once {
        let report = reconciler.run_once().context("Synchronization failed")?;
        return Ok(if report.converged {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    let cancel = CancelToken::new();
    spawn_interrupt_handler(cancel.clone());
    reconciler.run(cancel).await.context("Synchronization aborted")?;

    Ok(ExitCode::SUCCESS)
}

/// Trip the cancel token on Ctrl-C; the loop drains its current pass first
fn spawn_interrupt_handler(cancel: CancelToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Stopped by user. Synchronization ending...please wait.");
                cancel.cancel();
            }
            Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
        }
    });
}

fn verify(config: &SyncConfig) -> ExitCode {
    if converged(&config.origin, &config.replica) {
        println!(
            "{} \"{}\" matches \"{}\"",
            "✓".green(),
            config.replica.display(),
            config.origin.display()
        );
        ExitCode::SUCCESS
    } else {
        println!(
            "{} \"{}\" differs from \"{}\"",
            "✗".red(),
            config.replica.display(),
            config.origin.display()
        );
        ExitCode::FAILURE
    }
}
