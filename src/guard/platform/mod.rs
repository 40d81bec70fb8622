/// Platform-specific workstation locking and dialog implementations

#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(target_os = "linux")]
pub mod linux;

use anyhow::Result;

/// Severity of a modal dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogKind {
    Warning,
    Info,
}

/// Lock the current interactive session using the platform-specific mechanism
pub fn lock_computer() -> Result<()> {
    #[cfg(target_os = "windows")]
    {
        windows::lock_computer()
    }

    #[cfg(target_os = "macos")]
    {
        macos::lock_computer()
    }

    #[cfg(target_os = "linux")]
    {
        linux::lock_computer()
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    {
        anyhow::bail!("Unsupported operating system for computer locking")
    }
}

/// Show a modal dialog and block until it is dismissed
pub fn show_dialog(kind: DialogKind, title: &str, message: &str) -> Result<()> {
    #[cfg(target_os = "windows")]
    {
        windows::show_dialog(kind, title, message)
    }

    #[cfg(target_os = "macos")]
    {
        macos::show_dialog(kind, title, message)
    }

    #[cfg(target_os = "linux")]
    {
        linux::show_dialog(kind, title, message)
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    {
        let _ = (kind, title, message);
        anyhow::bail!("Unsupported operating system for dialogs")
    }
}
