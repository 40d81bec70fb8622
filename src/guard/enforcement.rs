use anyhow::{Context, Result};
use std::future::Future;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::guard::config::DialogConfig;
use crate::guard::platform::{self, DialogKind};
use crate::guard::state::WarningReason;

/// Something that can lock the workstation
pub trait Locker: Send + Sync + 'static {
    fn lock(&self) -> impl Future<Output = Result<()>> + Send;
}

/// Something that can put a dialog in front of the user
pub trait Notifier: Send + Sync + 'static {
    /// Show a dialog, resolving once it is dismissed
    fn show(&self, dialog: &Dialog) -> impl Future<Output = Result<()>> + Send;
}

/// A modal dialog to present
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dialog {
    pub kind: DialogKind,
    pub title: String,
    pub message: String,
}

impl Dialog {
    /// Countdown warning shown when a cycle starts
    pub fn countdown_warning(reason: &WarningReason, remaining_minutes: u64) -> Self {
        let minutes = format!(
            "{} minute{}",
            remaining_minutes,
            if remaining_minutes == 1 { "" } else { "s" }
        );

        let message = match reason {
            WarningReason::Drift { .. } => format!(
                "System time may be inaccurate!\n\
                 The system will lock in {}...\n\
                 If network time syncs successfully and the clock is correct before then, \
                 the lock will be cancelled.",
                minutes
            ),
            WarningReason::Schedule { window } => format!(
                "The current time is inside the scheduled lock period ({})!\n\
                 The system will lock in {}...",
                window, minutes
            ),
        };

        Self {
            kind: DialogKind::Warning,
            title: "System Lock Warning".to_string(),
            message,
        }
    }

    /// Confirmation shown when a drift countdown is cancelled
    pub fn resynced() -> Self {
        Self {
            kind: DialogKind::Info,
            title: "System Notice".to_string(),
            message: "Time synchronized normally, lock cancelled".to_string(),
        }
    }
}

/// Lock enforcer backed by the platform lock mechanism
#[derive(Debug, Clone, Copy, Default)]
pub struct LockEnforcer;

impl Locker for LockEnforcer {
    async fn lock(&self) -> Result<()> {
        info!("Locking system...");

        tokio::task::spawn_blocking(platform::lock_computer)
            .await
            .context("Lock task panicked")?
            .context("Failed to lock the session")?;

        info!("System locked");
        Ok(())
    }
}

/// Notifier backed by native dialogs
#[derive(Debug, Clone, Copy)]
pub struct DialogNotifier {
    enabled: bool,
}

impl DialogNotifier {
    pub fn new(config: &DialogConfig) -> Self {
        Self {
            enabled: config.enabled,
        }
    }
}

impl Notifier for DialogNotifier {
    async fn show(&self, dialog: &Dialog) -> Result<()> {
        if !self.enabled {
            warn!("{}: {}", dialog.title, dialog.message.replace('\n', " "));
            return Ok(());
        }

        let Dialog { kind, title, message } = dialog.clone();
        tokio::task::spawn_blocking(move || platform::show_dialog(kind, &title, &message))
            .await
            .context("Dialog task panicked")?
    }
}

/// Show a dialog, retrying transient failures
///
/// Failure is logged and swallowed; dialogs never hold up a lock.
pub async fn present_dialog<N: Notifier>(notifier: &N, dialog: &Dialog, config: &DialogConfig) -> bool {
    let attempts = config.max_attempts.max(1);
    let delay = Duration::from_secs(config.retry_delay_secs);

    for attempt in 1..=attempts {
        match notifier.show(dialog).await {
            Ok(()) => return true,
            Err(e) => {
                error!("Dialog failed (attempt {}/{}): {:#}", attempt, attempts, e);
                if attempt < attempts {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    error!("All dialog attempts failed; continuing without '{}'", dialog.title);
    false
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Locker that counts invocations instead of locking
    #[derive(Default)]
    pub struct FakeLocker {
        pub calls: AtomicUsize,
        pub fail: bool,
        pub panic: bool,
    }

    impl FakeLocker {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        pub fn panicking() -> Self {
            Self {
                panic: true,
                ..Default::default()
            }
        }

        pub fn count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Locker for FakeLocker {
        async fn lock(&self) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.panic {
                panic!("scripted lock panic");
            }
            if self.fail {
                anyhow::bail!("scripted lock failure");
            }
            Ok(())
        }
    }

    /// Notifier that records dialogs, failing the first `failures` calls
    #[derive(Default)]
    pub struct FakeNotifier {
        pub shown: Mutex<Vec<Dialog>>,
        pub attempts: AtomicUsize,
        pub failures: usize,
    }

    impl FakeNotifier {
        pub fn failing(failures: usize) -> Self {
            Self {
                failures,
                ..Default::default()
            }
        }

        pub fn shown(&self) -> Vec<Dialog> {
            self.shown.lock().unwrap().clone()
        }
    }

    impl Notifier for FakeNotifier {
        async fn show(&self, dialog: &Dialog) -> Result<()> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt < self.failures {
                anyhow::bail!("scripted dialog failure");
            }
            self.shown.lock().unwrap().push(dialog.clone());
            Ok(())
        }
    }
}
