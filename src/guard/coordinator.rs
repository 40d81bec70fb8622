use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::guard::config::{DialogConfig, GuardConfig};
use crate::guard::enforcement::{Dialog, Locker, Notifier, present_dialog};
use crate::guard::state::{CountdownOutcome, StopSignal, WarningReason, WarningState};
use crate::guard::time_source::{DriftReading, TimeSource, measure_drift};

/// Countdown parameters resolved from configuration
#[derive(Debug, Clone)]
pub struct CountdownSettings {
    pub schedule_countdown: Duration,
    pub drift_countdown: Duration,
    pub drift_sample: Duration,
    pub shutdown_grace: Duration,
    pub servers: Vec<String>,
    pub query_timeout: Duration,
    pub threshold_minutes: f64,
    pub dialogs: DialogConfig,
}

impl CountdownSettings {
    pub fn from_config(config: &GuardConfig) -> Self {
        let timings = &config.timings;
        Self {
            schedule_countdown: Duration::from_secs(timings.schedule_countdown_secs),
            drift_countdown: Duration::from_secs(timings.drift_countdown_secs),
            drift_sample: Duration::from_secs(timings.drift_sample_secs),
            shutdown_grace: Duration::from_secs(timings.shutdown_grace_secs),
            servers: config.time_sources.servers.clone(),
            query_timeout: config.time_sources.timeout(),
            threshold_minutes: config.drift.threshold_minutes,
            dialogs: config.dialogs.clone(),
        }
    }

    /// Number of time source samples taken during a drift countdown
    pub fn drift_samples(&self) -> u32 {
        let sample = self.drift_sample.as_nanos().max(1);
        (self.drift_countdown.as_nanos() / sample).max(1) as u32
    }

    fn countdown_for(&self, reason: &WarningReason) -> Duration {
        match reason {
            WarningReason::Schedule { .. } => self.schedule_countdown,
            WarningReason::Drift { .. } => self.drift_countdown,
        }
    }
}

/// Whole minutes shown to the user, rounded up
fn remaining_minutes(duration: Duration) -> u64 {
    duration.as_secs().div_ceil(60)
}

#[derive(Default)]
struct Tasks {
    countdown: Option<JoinHandle<Option<CountdownOutcome>>>,
    dialog: Option<JoinHandle<()>>,
}

struct Shared<S, L, N> {
    source: S,
    locker: L,
    notifier: N,
    settings: CountdownSettings,
    warning: WarningState,
    stop: StopSignal,
    tasks: Mutex<Tasks>,
}

/// Runs at most one warning/countdown cycle at a time
pub struct WarningCoordinator<S, L, N> {
    shared: Arc<Shared<S, L, N>>,
}

impl<S, L, N> Clone for WarningCoordinator<S, L, N> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<S: TimeSource, L: Locker, N: Notifier> WarningCoordinator<S, L, N> {
    pub fn new(
        source: S,
        locker: L,
        notifier: N,
        settings: CountdownSettings,
        warning: WarningState,
        stop: StopSignal,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                source,
                locker,
                notifier,
                settings,
                warning,
                stop,
                tasks: Mutex::new(Tasks::default()),
            }),
        }
    }

    pub fn time_source(&self) -> &S {
        &self.shared.source
    }

    pub fn settings(&self) -> &CountdownSettings {
        &self.shared.settings
    }

    pub fn is_warning_active(&self) -> bool {
        self.shared.warning.is_active()
    }

    /// Start a warning cycle unless one is already running
    ///
    /// Returns `true` if a new cycle was started.
    pub async fn trigger(&self, reason: WarningReason) -> bool {
        if self.shared.stop.is_set() {
            debug!("Shutdown in progress, ignoring trigger ({})", reason);
            return false;
        }

        if !self.shared.warning.try_activate() {
            debug!("Warning already active, ignoring trigger ({})", reason);
            return false;
        }

        let countdown = self.shared.settings.countdown_for(&reason);
        info!(
            "Lock warning triggered by {}; locking in {}s unless cancelled",
            reason,
            countdown.as_secs()
        );

        let mut tasks = self.shared.tasks.lock().await;

        let dialog = Dialog::countdown_warning(&reason, remaining_minutes(countdown));
        tasks.dialog = Some(spawn_dialog(self.shared.clone(), dialog));

        let shared = self.shared.clone();
        tasks.countdown = Some(tokio::spawn(async move {
            // Panics inside the countdown surface here instead of killing the guard
            let worker = tokio::spawn(run_cycle(shared.clone(), reason));
            match worker.await {
                Ok(outcome) => Some(outcome),
                Err(e) => {
                    error!("Countdown task failed: {}", e);
                    shared.warning.clear();
                    None
                }
            }
        }));

        true
    }

    /// Wait for the current countdown (if any) to finish
    pub async fn join_countdown(&self) -> Option<CountdownOutcome> {
        let handle = self.shared.tasks.lock().await.countdown.take()?;
        match handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Countdown supervisor failed: {}", e);
                None
            }
        }
    }

    /// Signal stop and give an active countdown a bounded time to exit
    pub async fn shutdown(&self) {
        self.shared.stop.trigger();

        let (countdown, dialog) = {
            let mut tasks = self.shared.tasks.lock().await;
            (tasks.countdown.take(), tasks.dialog.take())
        };

        if let Some(handle) = countdown {
            let grace = self.shared.settings.shutdown_grace;
            match tokio::time::timeout(grace, handle).await {
                Ok(Ok(outcome)) => info!("Countdown stopped: {:?}", outcome),
                Ok(Err(e)) => error!("Countdown task failed during shutdown: {}", e),
                Err(_) => warn!("Countdown did not stop within {:?}", grace),
            }
        }

        if let Some(handle) = dialog {
            if !handle.is_finished() {
                debug!("Leaving open dialog behind on shutdown");
            }
        }

        self.shared.warning.clear();
    }
}

fn spawn_dialog<S, L, N: Notifier>(shared: Arc<Shared<S, L, N>>, dialog: Dialog) -> JoinHandle<()>
where
    S: Send + Sync + 'static,
    L: Send + Sync + 'static,
{
    tokio::spawn(async move {
        present_dialog(&shared.notifier, &dialog, &shared.settings.dialogs).await;
    })
}

/// Run one countdown to completion and return to Idle
async fn run_cycle<S: TimeSource, L: Locker, N: Notifier>(
    shared: Arc<Shared<S, L, N>>,
    reason: WarningReason,
) -> CountdownOutcome {
    let outcome = match reason {
        WarningReason::Schedule { .. } => schedule_countdown(&shared).await,
        WarningReason::Drift { .. } => drift_countdown(&shared).await,
    };

    shared.warning.clear();

    match outcome {
        CountdownOutcome::Resynced => {
            let handle = spawn_dialog(shared.clone(), Dialog::resynced());
            shared.tasks.lock().await.dialog = Some(handle);
        }
        CountdownOutcome::Cancelled => info!("Countdown cancelled by shutdown"),
        CountdownOutcome::Locked | CountdownOutcome::LockFailed => {}
    }

    outcome
}

async fn schedule_countdown<S: TimeSource, L: Locker, N: Notifier>(
    shared: &Shared<S, L, N>,
) -> CountdownOutcome {
    info!(
        "Starting lock window countdown ({}s)...",
        shared.settings.schedule_countdown.as_secs()
    );

    if !shared.stop.sleep(shared.settings.schedule_countdown).await {
        return CountdownOutcome::Cancelled;
    }

    expire(shared).await
}

async fn drift_countdown<S: TimeSource, L: Locker, N: Notifier>(
    shared: &Shared<S, L, N>,
) -> CountdownOutcome {
    let settings = &shared.settings;
    let samples = settings.drift_samples();

    for i in 0..samples {
        if shared.stop.is_set() {
            return CountdownOutcome::Cancelled;
        }

        let reading = measure_drift(
            &shared.source,
            &settings.servers,
            settings.query_timeout,
            settings.threshold_minutes,
        )
        .await;
        reading.log();

        if let DriftReading::Within(sample) = reading {
            info!(
                "Network time restored and clock within tolerance ({:.2} min), cancelling lock",
                sample.drift_minutes
            );
            return CountdownOutcome::Resynced;
        }

        let elapsed = settings.drift_sample * (i + 1);
        let remaining = settings.drift_countdown.saturating_sub(elapsed);
        info!(
            "Countdown check {}/{}: {:.1} minutes remaining",
            i + 1,
            samples,
            remaining.as_secs_f64() / 60.0
        );

        if !shared.stop.sleep(settings.drift_sample).await {
            return CountdownOutcome::Cancelled;
        }
    }

    expire(shared).await
}

/// Countdown ran out: invoke the lock action once
async fn expire<S: TimeSource, L: Locker, N: Notifier>(shared: &Shared<S, L, N>) -> CountdownOutcome {
    if shared.stop.is_set() {
        return CountdownOutcome::Cancelled;
    }

    match shared.locker.lock().await {
        Ok(()) => CountdownOutcome::Locked,
        Err(e) => {
            error!("Failed to lock system: {:#}", e);
            CountdownOutcome::LockFailed
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Millisecond-scale settings so countdowns finish quickly
    pub fn fast_settings(drift_samples: u32) -> CountdownSettings {
        CountdownSettings {
            schedule_countdown: Duration::from_millis(20),
            drift_countdown: Duration::from_millis(2 * drift_samples as u64),
            drift_sample: Duration::from_millis(2),
            shutdown_grace: Duration::from_secs(2),
            servers: vec!["ntp.test".to_string()],
            query_timeout: Duration::from_millis(50),
            threshold_minutes: 5.0,
            dialogs: DialogConfig {
                enabled: true,
                max_attempts: 3,
                retry_delay_secs: 0,
            },
        }
    }
}
