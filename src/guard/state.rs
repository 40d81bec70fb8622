use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::watch;

use crate::guard::scheduler::LockWindow;
use crate::guard::time_source::DriftReading;

/// Process-wide "a warning cycle is in progress" flag
///
/// Cloning shares the flag. Entry is a compare-and-set, so two concurrent
/// triggers cannot both start a cycle.
#[derive(Debug, Clone, Default)]
pub struct WarningState {
    active: Arc<AtomicBool>,
}

impl WarningState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move Idle -> WarningActive; false if a cycle is already running
    pub fn try_activate(&self) -> bool {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Move back to Idle
    pub fn clear(&self) {
        self.active.store(false, Ordering::Release);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

/// Shutdown flag observed by every background task
#[derive(Debug, Clone)]
pub struct StopSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl StopSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Request shutdown; idempotent
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_set(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once shutdown has been requested
    pub async fn stopped(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close here
        let _ = rx.wait_for(|stopped| *stopped).await;
    }

    /// Sleep for `duration` unless stopped first
    ///
    /// Returns `true` if the full duration elapsed, `false` on stop.
    pub async fn sleep(&self, duration: Duration) -> bool {
        if self.is_set() {
            return false;
        }

        tokio::select! {
            _ = tokio::time::sleep(duration) => !self.is_set(),
            _ = self.stopped() => false,
        }
    }
}

/// Why a warning cycle was started
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WarningReason {
    /// Current time is inside a lock window
    Schedule { window: LockWindow },
    /// Local clock drifted or network time is unavailable
    Drift { reading: DriftReading },
}

impl fmt::Display for WarningReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Schedule { window } => write!(f, "lock window {}", window),
            Self::Drift { reading } => write!(f, "time sync ({})", reading),
        }
    }
}

/// How a countdown ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownOutcome {
    /// Countdown expired and the lock action succeeded
    Locked,
    /// Countdown expired but the lock action failed
    LockFailed,
    /// Network time came back within tolerance
    Resynced,
    /// Shutdown was requested before expiry
    Cancelled,
}
