use anyhow::{Context, Result};
use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Time-of-day format used for lock window boundaries
const WINDOW_TIME_FORMAT: &str = "%H:%M";

/// A daily interval during which the workstation must be locked
///
/// Both boundaries are inclusive. A window whose start is later than its
/// end wraps past midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "RawLockWindow", into = "RawLockWindow")]
pub struct LockWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

/// On-disk form of a lock window (`"HH:MM"` strings)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawLockWindow {
    pub start: String,
    pub end: String,
}

impl LockWindow {
    /// Parse a window from two `HH:MM` strings
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        Ok(Self {
            start: parse_time_of_day(start)?,
            end: parse_time_of_day(end)?,
        })
    }

    /// Whether this window wraps past midnight
    pub fn wraps_midnight(&self) -> bool {
        self.start > self.end
    }

    /// Check whether a time of day falls inside this window
    pub fn contains(&self, now: NaiveTime) -> bool {
        let now = truncate_to_minute(now);

        if self.wraps_midnight() {
            now >= self.start || now <= self.end
        } else {
            self.start <= now && now <= self.end
        }
    }
}

impl fmt::Display for LockWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}",
            self.start.format(WINDOW_TIME_FORMAT),
            self.end.format(WINDOW_TIME_FORMAT)
        )
    }
}

impl TryFrom<RawLockWindow> for LockWindow {
    type Error = anyhow::Error;

    fn try_from(raw: RawLockWindow) -> Result<Self> {
        Self::parse(&raw.start, &raw.end)
            .with_context(|| format!("Invalid lock window {}-{}", raw.start, raw.end))
    }
}

impl From<LockWindow> for RawLockWindow {
    fn from(window: LockWindow) -> Self {
        Self {
            start: window.start.format(WINDOW_TIME_FORMAT).to_string(),
            end: window.end.format(WINDOW_TIME_FORMAT).to_string(),
        }
    }
}

/// Parse a 24-hour `HH:MM` time of day
pub fn parse_time_of_day(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), WINDOW_TIME_FORMAT)
        .with_context(|| format!("Expected HH:MM (24-hour), got '{}'", value))
}

/// Drop seconds and sub-seconds; windows have minute granularity
fn truncate_to_minute(time: NaiveTime) -> NaiveTime {
    time.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(time)
}

/// Find the first window containing `now`
pub fn matching_window(now: NaiveTime, windows: &[LockWindow]) -> Option<&LockWindow> {
    windows.iter().find(|window| window.contains(now))
}

/// Check if `now` falls inside any configured lock window
pub fn is_within_lock_window(now: NaiveTime, windows: &[LockWindow]) -> bool {
    matching_window(now, windows).is_some()
}
