use anyhow::{Context, Result};
use crate::guard::platform::DialogKind;
use std::process::Command;

/// Lock the screen on macOS
pub fn lock_computer() -> Result<()> {
    // Ctrl+Cmd+Q is the system "Lock Screen" shortcut
    run_osascript(
        "tell application \"System Events\" to keystroke \"q\" using {command down, control down}",
    )
}

/// Show a modal dialog via AppleScript
pub fn show_dialog(kind: DialogKind, title: &str, message: &str) -> Result<()> {
    let icon = match kind {
        DialogKind::Warning => "caution",
        DialogKind::Info => "note",
    };
    let script = format!(
        "display dialog \"{}\" with title \"{}\" buttons {{\"OK\"}} default button \"OK\" with icon {}",
        escape_applescript(message),
        escape_applescript(title),
        icon
    );
    run_osascript(&script)
}

fn escape_applescript(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn run_osascript(script: &str) -> Result<()> {
    let output = Command::new("osascript")
        .arg("-e")
        .arg(script)
        .output()
        .context("Failed to run osascript")?;

    if !output.status.success() {
        anyhow::bail!(
            "osascript failed ({}): {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    Ok(())
}
