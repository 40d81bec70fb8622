use anyhow::{Context, Result};
use chrono::Local;
use std::path::Path;
use std::time::Duration;

use super::utils::{init_file_logging, init_logging};
use crate::agent;
use crate::guard::config::resolve_config;
use crate::guard::{DriftReading, LockEnforcer, Locker, SntpClient, matching_window, measure_drift};

/// How long runtime shutdown waits for blocking dialog/lock threads
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Run the guard in the foreground until a termination signal arrives
pub fn run(config_path: Option<&Path>, verbose: bool) -> Result<()> {
    let (config, source) = resolve_config(config_path)?;
    let (_log_guard, log_path) = init_file_logging(verbose, &config.logging)?;

    match &source {
        Some(path) => tracing::info!("Loaded configuration from: {}", path.display()),
        None => tracing::info!("No configuration file found, using built-in defaults"),
    }
    tracing::info!("Logging to: {}", log_path.display());

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let result = runtime.block_on(agent::run_guard_daemon(config));

    // An open dialog must not keep the process alive
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);
    result
}

/// Print lock window status and drift once
pub fn check(config_path: Option<&Path>, verbose: bool) -> Result<()> {
    init_logging(verbose);
    let (config, _) = resolve_config(config_path)?;

    println!("Clock Guard Check");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let now = Local::now();
    println!("Local time:    {}", now.format("%Y-%m-%d %H:%M:%S %Z"));

    match matching_window(now.time(), &config.lock_windows) {
        Some(window) => println!("Lock window:   INSIDE {}", window),
        None => println!("Lock window:   none active"),
    }

    println!("Querying:      {}", config.time_sources.servers.join(", "));

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let reading = runtime.block_on(measure_drift(
        &SntpClient,
        &config.time_sources.servers,
        config.time_sources.timeout(),
        config.drift.threshold_minutes,
    ));

    if let Some(sample) = reading.sample() {
        println!(
            "Network time:  {}",
            sample.trusted.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S %Z")
        );
        println!("Drift:         {:.2} minutes", sample.drift_minutes);
    }

    match reading {
        DriftReading::Within(_) => println!("Status:        ✓ clock within {} minutes", config.drift.threshold_minutes),
        DriftReading::Exceeded(_) => println!("Status:        ✗ clock off by more than {} minutes", config.drift.threshold_minutes),
        DriftReading::Unavailable => println!("Status:        ✗ network time unavailable"),
    }

    Ok(())
}

/// Lock the current session once
pub fn lock_now(verbose: bool) -> Result<()> {
    init_logging(verbose);

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(LockEnforcer.lock())?;

    println!("✓ Session locked");
    Ok(())
}
