//! Log sink setup: stdout plus an append-only file in the log directory

use anyhow::{Context, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::{self, format::Writer, time::FormatTime};
use tracing_subscriber::prelude::*;

/// Name of the log file created inside the log directory
pub const LOG_FILE_NAME: &str = "logs.txt";

/// `MM.DD.YYYY HH:MM:SS` in local time
struct LocalTimestamp;

impl FormatTime for LocalTimestamp {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%m.%d.%Y %H:%M:%S"))
    }
}

/// Install the global subscriber
///
/// The returned guard flushes the file writer on drop and must be held for
/// as long as the process logs.
pub fn init(log_dir: &Path, verbose: bool) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let appender = tracing_appender::rolling::never(log_dir, LOG_FILE_NAME);
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    tracing_subscriber::registry()
        .with(level)
        .with(
            fmt::layer()
                .with_timer(LocalTimestamp)
                .with_target(false)
                .with_writer(std::io::stdout),
        )
        .with(
            fmt::layer()
                .with_timer(LocalTimestamp)
                .with_target(false)
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .try_init()
        .context("Failed to install log subscriber")?;

    Ok(guard)
}
