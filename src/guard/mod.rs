//! Clock guard core
//!
//! This module provides functionality to:
//! - Evaluate daily lock windows
//! - Measure local clock drift against network time
//! - Run a single warning/countdown cycle at a time
//! - Lock the workstation and show warning dialogs per platform

pub mod config;
pub mod coordinator;
pub mod enforcement;
pub mod platform;
pub mod scheduler;
pub mod state;
pub mod time_source;

pub use config::GuardConfig;
pub use coordinator::{CountdownSettings, WarningCoordinator};
pub use enforcement::{Dialog, DialogNotifier, LockEnforcer, Locker, Notifier};
pub use scheduler::{LockWindow, is_within_lock_window, matching_window};
pub use state::{CountdownOutcome, StopSignal, WarningReason, WarningState};
pub use time_source::{DriftReading, SntpClient, TimeSource, fetch_trusted_time, measure_drift};
