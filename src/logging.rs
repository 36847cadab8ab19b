//! Tracing setup.
//!
//! The TUI owns the terminal, so in that mode logs go to a file. Text and JSON modes log
//! to stderr, keeping stdout clean for the output itself.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

pub enum LogTarget<'a> {
    Stderr,
    File(&'a Path),
}

/// `<data_local_dir>/tickerdesk/tickerdesk.log`, falling back to the working directory.
pub fn default_log_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("tickerdesk"))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tickerdesk.log")
}

fn env_filter(verbose: bool) -> EnvFilter {
    let fallback = if verbose { "tickerdesk=debug" } else { "tickerdesk=info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

pub fn init(target: LogTarget<'_>, verbose: bool) -> Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbose))
        .with_target(false);

    match target {
        LogTarget::Stderr => builder
            .with_writer(std::io::stderr)
            .try_init()
            .map_err(|e| anyhow::anyhow!("init logging: {e}")),
        LogTarget::File(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create log dir {}", parent.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("open log file {}", path.display()))?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
                .map_err(|e| anyhow::anyhow!("init logging: {e}"))
        }
    }
}
