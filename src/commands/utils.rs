use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;

use crate::guard::config::{LoggingConfig, get_default_log_path};

fn level_for(verbose: bool, configured: &str) -> String {
    if verbose { "debug".to_string() } else { configured.to_string() }
}

/// Initialize console-only logging (one-shot commands)
pub fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let level = level_for(verbose, "info");

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(level)))
        .init();
}

/// Initialize console and log file output for the guard process
///
/// The returned guard must stay alive until exit so buffered lines are flushed.
pub fn init_file_logging(verbose: bool, config: &LoggingConfig) -> Result<(WorkerGuard, PathBuf)> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let log_path = match &config.file {
        Some(path) => path.clone(),
        None => get_default_log_path()?,
    };
    let (dir, file_name) = split_log_path(&log_path)?;

    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;

    let appender = tracing_appender::rolling::never(&dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let level = level_for(verbose, &config.level);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(level)))
        .with(fmt::layer())
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .try_init()
        .context("Failed to initialize logging")?;

    Ok((guard, log_path))
}

fn split_log_path(path: &Path) -> Result<(PathBuf, &std::ffi::OsStr)> {
    let file_name = path
        .file_name()
        .with_context(|| format!("Log file path has no file name: {}", path.display()))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((dir, file_name))
}
