use anyhow::Result;
use crate::guard::platform::DialogKind;

use windows_sys::Win32::System::Shutdown::LockWorkStation;
use windows_sys::Win32::UI::WindowsAndMessaging::{
    MB_ICONINFORMATION, MB_ICONWARNING, MB_OK, MB_SETFOREGROUND, MB_SYSTEMMODAL, MessageBoxW,
};

/// Lock the interactive session on Windows
pub fn lock_computer() -> Result<()> {
    // SAFETY: plain Win32 call without arguments
    let ok = unsafe { LockWorkStation() };

    if ok == 0 {
        anyhow::bail!("LockWorkStation failed: {}", std::io::Error::last_os_error());
    }

    Ok(())
}

/// Show a system-modal message box
pub fn show_dialog(kind: DialogKind, title: &str, message: &str) -> Result<()> {
    let icon = match kind {
        DialogKind::Warning => MB_ICONWARNING,
        DialogKind::Info => MB_ICONINFORMATION,
    };
    let text = to_wide(message);
    let caption = to_wide(title);

    // SAFETY: both buffers are NUL-terminated and outlive the call
    let result = unsafe {
        MessageBoxW(
            std::ptr::null_mut(),
            text.as_ptr(),
            caption.as_ptr(),
            MB_OK | icon | MB_SYSTEMMODAL | MB_SETFOREGROUND,
        )
    };

    if result == 0 {
        anyhow::bail!("MessageBoxW failed: {}", std::io::Error::last_os_error());
    }

    Ok(())
}

fn to_wide(value: &str) -> Vec<u16> {
    value.encode_utf16().chain(std::iter::once(0)).collect()
}
