use std::env;
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;

pub const LOG_FILTER_ENV: &str = "REELS_LOG";
pub const LOG_FILE_ENV: &str = "REELS_LOG_FILE";

const DEFAULT_FILTER: &str = "info";

/// Installs a file-backed subscriber. Returns `false` when no log file is configured,
/// since the terminal itself belongs to the UI.
pub fn init(cfg: &LogConfig) -> Result<bool> {
    let Some(path) = log_path(cfg) else {
        return Ok(false);
    };

    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("logging: create directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("logging: open {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter(cfg))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|err| anyhow!("logging: install subscriber: {err}"))?;
    Ok(true)
}

fn log_path(cfg: &LogConfig) -> Option<PathBuf> {
    env::var_os(LOG_FILE_ENV)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .or_else(|| cfg.file.clone())
}

fn filter(cfg: &LogConfig) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_env(LOG_FILTER_ENV) {
        return filter;
    }
    let configured = cfg.filter.trim();
    let directive = if configured.is_empty() {
        DEFAULT_FILTER
    } else {
        configured
    };
    EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}
