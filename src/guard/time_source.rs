use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use rsntp::AsyncSntpClient;
use std::fmt;
use std::future::Future;
use std::time::Duration;

/// A source of trusted wall-clock time
pub trait TimeSource: Send + Sync + 'static {
    /// Query a single endpoint, giving up after `timeout`
    fn query(
        &self,
        server: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<DateTime<Utc>>> + Send;
}

/// SNTP time source backed by `rsntp`
#[derive(Debug, Clone, Copy, Default)]
pub struct SntpClient;

impl TimeSource for SntpClient {
    async fn query(&self, server: &str, timeout: Duration) -> Result<DateTime<Utc>> {
        let mut client = AsyncSntpClient::new();
        client.set_timeout(timeout);

        let result = tokio::time::timeout(timeout, client.synchronize(server.trim()))
            .await
            .with_context(|| format!("Timed out after {}s", timeout.as_secs_f64()))?
            .context("SNTP synchronization failed")?;

        result
            .datetime()
            .into_chrono_datetime()
            .context("Server time is out of range")
    }
}

/// Fetch trusted time from the first endpoint that answers
///
/// Returns `None` when every endpoint fails. Endpoint errors are logged and
/// never propagated.
pub async fn fetch_trusted_time<S: TimeSource>(
    source: &S,
    servers: &[String],
    timeout: Duration,
) -> Option<DateTime<Utc>> {
    for server in servers {
        match source.query(server, timeout).await {
            Ok(time) => {
                tracing::debug!("Got network time from {}", server);
                return Some(time);
            }
            Err(e) => {
                tracing::warn!("Failed to get time from {}: {:#}", server, e);
            }
        }
    }

    None
}

/// Result of comparing the local clock against network time
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DriftReading {
    /// Drift is within tolerance
    Within(DriftSample),
    /// Drift exceeds tolerance
    Exceeded(DriftSample),
    /// No time source could be reached
    Unavailable,
}

/// A single local-vs-network comparison
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriftSample {
    pub local: DateTime<Local>,
    pub trusted: DateTime<Utc>,
    /// Absolute difference in minutes
    pub drift_minutes: f64,
}

impl DriftSample {
    pub fn new(local: DateTime<Local>, trusted: DateTime<Utc>) -> Self {
        let delta = trusted.signed_duration_since(local.with_timezone(&Utc));
        let drift_minutes = (delta.num_milliseconds() as f64 / 60_000.0).abs();

        Self {
            local,
            trusted,
            drift_minutes,
        }
    }
}

impl DriftReading {
    /// Classify a sample against the tolerance (strictly greater triggers)
    pub fn classify(sample: DriftSample, threshold_minutes: f64) -> Self {
        if sample.drift_minutes > threshold_minutes {
            Self::Exceeded(sample)
        } else {
            Self::Within(sample)
        }
    }

    /// Whether this reading should start a drift warning
    pub fn triggers_warning(&self) -> bool {
        !matches!(self, Self::Within(_))
    }

    pub fn sample(&self) -> Option<&DriftSample> {
        match self {
            Self::Within(sample) | Self::Exceeded(sample) => Some(sample),
            Self::Unavailable => None,
        }
    }

    /// Write the reading to the log
    pub fn log(&self) {
        match self.sample() {
            Some(sample) => {
                tracing::info!("Local time: {}", sample.local.format("%Y-%m-%d %H:%M:%S%.3f"));
                tracing::info!(
                    "Network time: {}",
                    sample.trusted.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S%.3f")
                );
                tracing::info!("Time difference: {:.2} minutes", sample.drift_minutes);
            }
            None => tracing::warn!("Unable to obtain network time from any server"),
        }
    }
}

impl fmt::Display for DriftReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Within(s) => write!(f, "within tolerance ({:.2} min)", s.drift_minutes),
            Self::Exceeded(s) => write!(f, "drift of {:.2} min", s.drift_minutes),
            Self::Unavailable => write!(f, "network time unavailable"),
        }
    }
}

/// Query network time and compare it with the local clock
pub async fn measure_drift<S: TimeSource>(
    source: &S,
    servers: &[String],
    timeout: Duration,
    threshold_minutes: f64,
) -> DriftReading {
    match fetch_trusted_time(source, servers, timeout).await {
        Some(trusted) => {
            DriftReading::classify(DriftSample::new(Local::now(), trusted), threshold_minutes)
        }
        None => DriftReading::Unavailable,
    }
}
