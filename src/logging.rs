// Tracing subscriber setup

use anyhow::{Context, Result, anyhow};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::Level;

/// Where diagnostics go. The TUI owns the terminal, so it logs to a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    File(PathBuf),
}

impl LogTarget {
    /// `lightmode.log` in the current directory
    pub fn default_file() -> Result<Self> {
        Ok(Self::File(std::env::current_dir()?.join("lightmode.log")))
    }
}

pub fn level_for(verbose: bool) -> Level {
    if verbose { Level::DEBUG } else { Level::INFO }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init(target: LogTarget, verbose: bool) -> Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_max_level(level_for(verbose))
        .with_target(verbose);

    let result = match target {
        LogTarget::Stderr => builder.with_writer(std::io::stderr).try_init(),
        LogTarget::File(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
    };

    result.map_err(|e| anyhow!("Failed to install log subscriber: {}", e))
}
