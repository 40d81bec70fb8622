use anyhow::Result;
use chrono::{Local, NaiveTime};
use std::time::Duration;

use super::signals;
use crate::guard::{
    CountdownSettings, DialogNotifier, GuardConfig, LockEnforcer, LockWindow, Locker, Notifier,
    SntpClient, StopSignal, TimeSource, WarningCoordinator, WarningReason, WarningState,
    matching_window, measure_drift,
};

/// The periodic check loop
pub struct GuardLoop<S, L, N> {
    coordinator: WarningCoordinator<S, L, N>,
    windows: Vec<LockWindow>,
    lock_window_poll: Duration,
    drift_poll: Duration,
    error_backoff: Duration,
    stop: StopSignal,
}

impl<S, L, N> Clone for GuardLoop<S, L, N> {
    fn clone(&self) -> Self {
        Self {
            coordinator: self.coordinator.clone(),
            windows: self.windows.clone(),
            lock_window_poll: self.lock_window_poll,
            drift_poll: self.drift_poll,
            error_backoff: self.error_backoff,
            stop: self.stop.clone(),
        }
    }
}

impl<S: TimeSource, L: Locker, N: Notifier> GuardLoop<S, L, N> {
    pub fn new(coordinator: WarningCoordinator<S, L, N>, config: &GuardConfig, stop: StopSignal) -> Self {
        Self {
            coordinator,
            windows: config.lock_windows.clone(),
            lock_window_poll: Duration::from_secs(config.timings.lock_window_poll_secs),
            drift_poll: Duration::from_secs(config.timings.drift_poll_secs),
            error_backoff: Duration::from_secs(config.timings.error_backoff_secs),
            stop,
        }
    }

    /// Run check cycles until stopped
    pub async fn run(&self) {
        while !self.stop.is_set() {
            let pause = self.run_cycle_at(Local::now().time()).await;
            tracing::debug!("Next check in {} seconds", pause.as_secs());
            if !self.stop.sleep(pause).await {
                break;
            }
        }

        tracing::info!("Check loop stopped");
    }

    /// One check cycle; returns how long to wait before the next one
    pub async fn run_cycle_at(&self, now: NaiveTime) -> Duration {
        // Lock windows take priority over drift checks
        if let Some(window) = matching_window(now, &self.windows) {
            tracing::info!(
                "Current time {} is within lock window {}",
                now.format("%H:%M"),
                window
            );
            self.coordinator
                .trigger(WarningReason::Schedule { window: *window })
                .await;
            return self.lock_window_poll;
        }

        let settings = self.coordinator.settings();
        let reading = measure_drift(
            self.coordinator.time_source(),
            &settings.servers,
            settings.query_timeout,
            settings.threshold_minutes,
        )
        .await;
        reading.log();

        if reading.triggers_warning() {
            self.coordinator
                .trigger(WarningReason::Drift { reading })
                .await;
        }

        self.drift_poll
    }
}

/// Run the guard until a termination signal arrives
pub async fn run_guard_daemon(config: GuardConfig) -> Result<()> {
    tracing::info!("Starting clock guard");
    tracing::info!("Time servers: {}", config.time_sources.servers.join(", "));
    tracing::info!(
        "Lock windows: {}",
        config
            .lock_windows
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );
    tracing::info!(
        "Drift threshold: {} minutes",
        config.drift.threshold_minutes
    );

    let stop = StopSignal::new();
    let coordinator = WarningCoordinator::new(
        SntpClient,
        LockEnforcer,
        DialogNotifier::new(&config.dialogs),
        CountdownSettings::from_config(&config),
        WarningState::new(),
        stop.clone(),
    );
    let guard = GuardLoop::new(coordinator.clone(), &config, stop.clone());

    let signal_stop = stop.clone();
    tokio::spawn(async move {
        match signals::wait_for_shutdown_signal().await {
            Ok(name) => {
                tracing::info!("Received {}, shutting down...", name);
                signal_stop.trigger();
            }
            Err(e) => {
                tracing::error!("Signal handling unavailable: {:#}", e);
            }
        }
    });

    tracing::info!("Clock guard initialized");
    supervise(&guard, &stop).await;

    tracing::info!("Running cleanup...");
    coordinator.shutdown().await;
    tracing::info!("Clock guard stopped");

    Ok(())
}

/// Keep the check loop alive, restarting it after a crash
async fn supervise<S: TimeSource, L: Locker, N: Notifier>(guard: &GuardLoop<S, L, N>, stop: &StopSignal) {
    loop {
        let worker = guard.clone();
        match tokio::spawn(async move { worker.run().await }).await {
            Ok(()) => break,
            Err(e) => {
                tracing::error!("Check loop crashed: {}", e);
                if !stop.sleep(guard.error_backoff).await {
                    break;
                }
                tracing::info!("Restarting check loop");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::CountdownOutcome;
    use crate::guard::coordinator::testing::fast_settings;
    use crate::guard::enforcement::testing::{FakeLocker, FakeNotifier};
    use crate::guard::time_source::testing::{FakeTimeSource, Reply};

    type TestLoop = GuardLoop<FakeTimeSource, FakeLocker, FakeNotifier>;

    fn make_loop(reply: Reply) -> TestLoop {
        let config = GuardConfig::default();
        let stop = StopSignal::new();
        let coordinator = WarningCoordinator::new(
            FakeTimeSource::always(reply),
            FakeLocker::default(),
            FakeNotifier::default(),
            fast_settings(3),
            WarningState::new(),
            stop.clone(),
        );
        GuardLoop::new(coordinator, &config, stop)
    }

    fn at(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
    }

    #[tokio::test]
    async fn test_cycle_inside_lock_window_triggers_schedule_countdown() {
        let guard = make_loop(Reply::OffsetMinutes(0));

        let pause = guard.run_cycle_at(at(22, 30)).await;
        assert_eq!(pause, Duration::from_secs(60));
        assert!(guard.coordinator.is_warning_active());
        // Drift is not checked inside a lock window
        assert_eq!(guard.coordinator.time_source().query_count(), 0);

        assert_eq!(guard.coordinator.join_countdown().await, Some(CountdownOutcome::Locked));
    }

    #[tokio::test]
    async fn test_cycle_with_large_drift_triggers_drift_countdown() {
        let guard = make_loop(Reply::OffsetMinutes(10));

        let pause = guard.run_cycle_at(at(15, 0)).await;
        assert_eq!(pause, Duration::from_secs(300));
        assert!(guard.coordinator.is_warning_active());

        assert_eq!(guard.coordinator.join_countdown().await, Some(CountdownOutcome::Locked));
    }

    #[tokio::test]
    async fn test_cycle_with_small_drift_does_not_trigger() {
        let guard = make_loop(Reply::OffsetMinutes(3));

        let pause = guard.run_cycle_at(at(15, 0)).await;
        assert_eq!(pause, Duration::from_secs(300));
        assert!(!guard.coordinator.is_warning_active());
        assert_eq!(guard.coordinator.join_countdown().await, None);
    }

    #[tokio::test]
    async fn test_cycle_with_unavailable_time_triggers() {
        let guard = make_loop(Reply::Fail);

        guard.run_cycle_at(at(8, 0)).await;
        assert!(guard.coordinator.is_warning_active());

        guard.coordinator.shutdown().await;
        assert!(!guard.coordinator.is_warning_active());
    }

    #[tokio::test]
    async fn test_repeated_cycles_inside_window_start_one_countdown() {
        let mut guard = make_loop(Reply::OffsetMinutes(0));
        guard.windows = vec![LockWindow::parse("00:00", "23:59").unwrap()];

        guard.run_cycle_at(at(12, 0)).await;
        guard.run_cycle_at(at(12, 1)).await;
        guard.run_cycle_at(at(12, 2)).await;

        assert_eq!(guard.coordinator.join_countdown().await, Some(CountdownOutcome::Locked));
        assert_eq!(guard.coordinator.join_countdown().await, None);
    }

    #[tokio::test]
    async fn test_supervise_restarts_crashed_loop() {
        let mut guard = make_loop(Reply::OffsetMinutes(0));
        guard.windows.clear();
        guard.coordinator = WarningCoordinator::new(
            FakeTimeSource::new([Reply::Panic, Reply::OffsetMinutes(0)]),
            FakeLocker::default(),
            FakeNotifier::default(),
            fast_settings(3),
            WarningState::new(),
            guard.stop.clone(),
        );
        guard.drift_poll = Duration::from_millis(5);
        guard.error_backoff = Duration::from_millis(20);
        let stop = guard.stop.clone();

        let supervisor = {
            let (guard, stop) = (guard.clone(), stop.clone());
            tokio::spawn(async move { supervise(&guard, &stop).await })
        };

        // First cycle panics, the restarted loop keeps querying
        let mut restarted = false;
        for _ in 0..200 {
            if guard.coordinator.time_source().query_count() >= 3 {
                restarted = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(restarted);
        assert!(!guard.coordinator.is_warning_active());

        stop.trigger();
        tokio::time::timeout(Duration::from_secs(5), supervisor)
            .await
            .expect("supervisor should exit promptly after stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_supervise_waits_backoff_before_restart() {
        let mut guard = make_loop(Reply::Panic);
        guard.windows.clear();
        guard.error_backoff = Duration::from_secs(60);
        let stop = guard.stop.clone();

        let supervisor = {
            let (guard, stop) = (guard.clone(), stop.clone());
            tokio::spawn(async move { supervise(&guard, &stop).await })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        // Still inside the backoff, so the loop ran exactly once
        assert_eq!(guard.coordinator.time_source().query_count(), 1);

        stop.trigger();
        tokio::time::timeout(Duration::from_secs(5), supervisor)
            .await
            .expect("backoff should be interrupted by stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_run_exits_when_stopped() {
        let guard = make_loop(Reply::OffsetMinutes(0));
        let stop = guard.stop.clone();

        let runner = guard.clone();
        let handle = tokio::spawn(async move { runner.run().await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        stop.trigger();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("loop should exit promptly after stop")
            .unwrap();
    }
}
