use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::guard::scheduler::LockWindow;

/// Main guard configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GuardConfig {
    /// Network time sources queried for drift checks
    #[serde(default)]
    pub time_sources: TimeSourcesConfig,

    /// Drift tolerance
    #[serde(default)]
    pub drift: DriftConfig,

    /// Daily lock windows
    #[serde(default = "default_lock_windows")]
    pub lock_windows: Vec<LockWindow>,

    /// Countdown and polling intervals
    #[serde(default)]
    pub timings: TimingsConfig,

    /// Warning dialog settings
    #[serde(default)]
    pub dialogs: DialogConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            time_sources: TimeSourcesConfig::default(),
            drift: DriftConfig::default(),
            lock_windows: default_lock_windows(),
            timings: TimingsConfig::default(),
            dialogs: DialogConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Network time source configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimeSourcesConfig {
    /// Endpoints tried in order (`host` or `host:port`)
    #[serde(default = "default_servers")]
    pub servers: Vec<String>,

    /// Per-endpoint query timeout (seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for TimeSourcesConfig {
    fn default() -> Self {
        Self {
            servers: default_servers(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl TimeSourcesConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_servers() -> Vec<String> {
    vec![
        "pool.ntp.org".to_string(),
        "time.windows.com".to_string(),
        "time.apple.com".to_string(),
        "time.google.com".to_string(),
    ]
}

fn default_timeout_secs() -> u64 {
    5
}

/// Drift tolerance configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DriftConfig {
    /// Maximum tolerated |local - trusted| in minutes
    #[serde(default = "default_threshold_minutes")]
    pub threshold_minutes: f64,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            threshold_minutes: default_threshold_minutes(),
        }
    }
}

fn default_threshold_minutes() -> f64 {
    5.0
}

fn default_lock_windows() -> Vec<LockWindow> {
    [
        ("11:00", "13:00"),
        ("17:00", "19:00"),
        // 23:59 stands in for midnight
        ("21:00", "23:59"),
        ("00:00", "07:00"),
    ]
    .into_iter()
    .filter_map(|(start, end)| LockWindow::parse(start, end).ok())
    .collect()
}

/// Countdown and polling intervals (all in seconds)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimingsConfig {
    /// Delay between a lock-window warning and the lock
    #[serde(default = "default_schedule_countdown_secs")]
    pub schedule_countdown_secs: u64,

    /// Total drift countdown before locking
    #[serde(default = "default_drift_countdown_secs")]
    pub drift_countdown_secs: u64,

    /// Interval between time source samples during a drift countdown
    #[serde(default = "default_drift_sample_secs")]
    pub drift_sample_secs: u64,

    /// Re-check interval while inside a lock window
    #[serde(default = "default_lock_window_poll_secs")]
    pub lock_window_poll_secs: u64,

    /// Interval between drift checks
    #[serde(default = "default_drift_poll_secs")]
    pub drift_poll_secs: u64,

    /// Backoff after a failed check cycle
    #[serde(default = "default_error_backoff_secs")]
    pub error_backoff_secs: u64,

    /// How long shutdown waits for an active countdown to exit
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

impl Default for TimingsConfig {
    fn default() -> Self {
        Self {
            schedule_countdown_secs: default_schedule_countdown_secs(),
            drift_countdown_secs: default_drift_countdown_secs(),
            drift_sample_secs: default_drift_sample_secs(),
            lock_window_poll_secs: default_lock_window_poll_secs(),
            drift_poll_secs: default_drift_poll_secs(),
            error_backoff_secs: default_error_backoff_secs(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

fn default_schedule_countdown_secs() -> u64 {
    60
}

fn default_drift_countdown_secs() -> u64 {
    300
}

fn default_drift_sample_secs() -> u64 {
    10
}

fn default_lock_window_poll_secs() -> u64 {
    60
}

fn default_drift_poll_secs() -> u64 {
    300
}

fn default_error_backoff_secs() -> u64 {
    10
}

fn default_shutdown_grace_secs() -> u64 {
    1
}

/// Warning dialog configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DialogConfig {
    /// Show dialogs (otherwise warnings are only logged)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Attempts before giving up on a dialog
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay between attempts (seconds)
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

impl Default for DialogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: default_max_attempts(),
            retry_delay_secs: default_retry_delay_secs(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay_secs() -> u64 {
    1
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Default log level when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (defaults to the platform data directory)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn project_dirs() -> Result<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", "clock-guard")
        .context("Could not determine a home directory for clock-guard")
}

/// Get the platform-specific config file path
pub fn get_config_path() -> Result<PathBuf> {
    Ok(project_dirs()?.config_dir().join("clock-guard.yaml"))
}

/// Get the default log file path
pub fn get_default_log_path() -> Result<PathBuf> {
    Ok(project_dirs()?.data_local_dir().join("clock-guard.log"))
}

/// Resolve the effective configuration
///
/// An explicit path must exist. Without one, the platform config file is
/// used if present, otherwise the compiled-in defaults.
pub fn resolve_config(explicit: Option<&Path>) -> Result<(GuardConfig, Option<PathBuf>)> {
    if let Some(path) = explicit {
        return Ok((load_config(path)?, Some(path.to_path_buf())));
    }

    match get_config_path() {
        Ok(path) if path.exists() => Ok((load_config(&path)?, Some(path))),
        _ => Ok((GuardConfig::default(), None)),
    }
}

/// Load configuration from YAML file
pub fn load_config(path: &Path) -> Result<GuardConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: GuardConfig = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse YAML config file: {}", path.display()))?;

    validate_config(&config)
        .with_context(|| format!("Invalid config file: {}", path.display()))?;

    Ok(config)
}

/// Validate configuration
pub fn validate_config(config: &GuardConfig) -> Result<()> {
    if config.time_sources.servers.is_empty() {
        anyhow::bail!("Configuration must specify at least one time server");
    }

    if let Some(pos) = config.time_sources.servers.iter().position(|s| s.trim().is_empty()) {
        anyhow::bail!("Time server #{} is empty", pos + 1);
    }

    if config.time_sources.timeout_secs == 0 {
        anyhow::bail!("time_sources.timeout_secs must be greater than zero");
    }

    let threshold = config.drift.threshold_minutes;
    if threshold.is_nan() || threshold <= 0.0 {
        anyhow::bail!(
            "drift.threshold_minutes must be positive, got {}",
            threshold
        );
    }

    let timings = &config.timings;
    if timings.drift_sample_secs == 0 {
        anyhow::bail!("timings.drift_sample_secs must be greater than zero");
    }
    if timings.drift_sample_secs > timings.drift_countdown_secs {
        anyhow::bail!(
            "timings.drift_sample_secs ({}) cannot exceed timings.drift_countdown_secs ({})",
            timings.drift_sample_secs,
            timings.drift_countdown_secs
        );
    }
    if timings.lock_window_poll_secs == 0 || timings.drift_poll_secs == 0 {
        anyhow::bail!("Poll intervals must be greater than zero");
    }

    if config.dialogs.max_attempts == 0 {
        anyhow::bail!("dialogs.max_attempts must be at least 1");
    }

    Ok(())
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = include_str!("../../example-clock-guard.yaml");

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = GuardConfig::default();
        assert!(validate_config(&config).is_ok());
        assert_eq!(config.time_sources.servers.len(), 4);
        assert_eq!(config.time_sources.servers[0], "pool.ntp.org");
        assert_eq!(config.lock_windows.len(), 4);
    }

    #[test]
    fn test_default_timings() {
        let timings = TimingsConfig::default();
        assert_eq!(timings.schedule_countdown_secs, 60);
        assert_eq!(timings.drift_countdown_secs, 300);
        assert_eq!(timings.drift_sample_secs, 10);
        assert_eq!(timings.lock_window_poll_secs, 60);
        assert_eq!(timings.drift_poll_secs, 300);
        assert_eq!(timings.error_backoff_secs, 10);
    }

    #[test]
    fn test_example_config_parses_and_matches_defaults() {
        let config: GuardConfig = serde_yaml::from_str(EXAMPLE_CONFIG).unwrap();
        assert!(validate_config(&config).is_ok());
        assert_eq!(config.lock_windows, GuardConfig::default().lock_windows);
        assert_eq!(config.time_sources.servers, default_servers());
    }

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config: GuardConfig = serde_yaml::from_str("{}").unwrap();
        assert!(validate_config(&config).is_ok());
        assert_eq!(config.drift.threshold_minutes, 5.0);
        assert_eq!(config.lock_windows.len(), 4);
    }

    #[test]
    fn test_partial_yaml_overrides() {
        let yaml = r#"
time_sources:
  servers: ["ntp.example.org:1123"]
lock_windows:
  - start: "22:00"
    end: "06:30"
"#;
        let config: GuardConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.time_sources.servers, vec!["ntp.example.org:1123"]);
        assert_eq!(config.time_sources.timeout_secs, 5);
        assert_eq!(config.lock_windows.len(), 1);
        assert!(config.lock_windows[0].wraps_midnight());
    }

    #[test]
    fn test_lock_is_the_only_action() {
        assert!(!EXAMPLE_CONFIG.contains("enforcement"));

        // Older files with an action section still load; the session is always locked
        let config: GuardConfig = serde_yaml::from_str("enforcement:\n  action: shutdown\n").unwrap();
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(!yaml.contains("shutdown"));
    }

    #[test]
    fn test_validate_requires_servers() {
        let mut config = GuardConfig::default();
        config.time_sources.servers.clear();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_rejects_blank_server() {
        let mut config = GuardConfig::default();
        config.time_sources.servers.push("  ".to_string());
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_rejects_non_positive_threshold() {
        let mut config = GuardConfig::default();
        config.drift.threshold_minutes = 0.0;
        assert!(validate_config(&config).is_err());

        config.drift.threshold_minutes = f64::NAN;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_rejects_sample_longer_than_countdown() {
        let mut config = GuardConfig::default();
        config.timings.drift_sample_secs = 600;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_rejects_zero_dialog_attempts() {
        let mut config = GuardConfig::default();
        config.dialogs.max_attempts = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_load_config_rejects_malformed_window() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "lock_windows:\n  - start: \"7pm\"\n    end: \"23:00\"").unwrap();

        let err = load_config(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("7pm"));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "drift:\n  threshold_minutes: 2.5").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.drift.threshold_minutes, 2.5);
    }

    #[test]
    fn test_resolve_config_with_missing_explicit_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.yaml");
        assert!(resolve_config(Some(&missing)).is_err());
    }
}
