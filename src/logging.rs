//! Tracing setup.
//!
//! Headless runs log to stderr. The TUI owns the terminal, so it logs to a
//! file under the user's local data directory instead.

use anyhow::Result;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

pub(crate) enum LogTarget {
    Stderr,
    File,
}

fn filter(spec: &str) -> EnvFilter {
    EnvFilter::try_new(spec).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Location of the TUI log file.
pub(crate) fn log_file_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("artifact-desk").join("artifact-desk.log"))
}

fn open_log_file() -> Option<std::fs::File> {
    let path = log_file_path()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok()?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .ok()
}

pub(crate) fn init(spec: &str, target: LogTarget) -> Result<()> {
    match target {
        LogTarget::Stderr => {
            tracing_subscriber::fmt()
                .with_env_filter(filter(spec))
                .with_writer(std::io::stderr)
                .with_target(false)
                .try_init()
                .map_err(|e| anyhow::anyhow!("init logging: {e}"))?;
        }
        LogTarget::File => {
            // No usable log file means no log; the TUI must never write to the terminal.
            let Some(file) = open_log_file() else {
                return Ok(());
            };
            tracing_subscriber::fmt()
                .with_env_filter(filter(spec))
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false)
                .try_init()
                .map_err(|e| anyhow::anyhow!("init logging: {e}"))?;
        }
    }
    Ok(())
}
