use anyhow::{Context, Result};
use crate::guard::platform::DialogKind;
use std::process::Command;

/// Screen lockers tried in order of preference
const SCREEN_LOCKERS: &[(&str, &[&str])] = &[
    // systemd-logind (works across desktop environments)
    ("loginctl", &["lock-session"]),
    ("xdg-screensaver", &["lock"]),
    ("gnome-screensaver-command", &["--lock"]),
    ("cinnamon-screensaver-command", &["--lock"]),
    ("mate-screensaver-command", &["--lock"]),
    ("xscreensaver-command", &["-lock"]),
    ("light-locker-command", &["--lock"]),
    ("i3lock", &["-c", "000000"]),
    ("slock", &[]),
];

/// Exit status zenity and kdialog use when the dialog is closed without OK
const DIALOG_DISMISSED: i32 = 1;

/// Lock the screen, trying each known locker until one succeeds
pub fn lock_computer() -> Result<()> {
    for (cmd, args) in SCREEN_LOCKERS {
        match try_command(cmd, args) {
            Ok(()) => {
                tracing::debug!("Screen locked with {}", cmd);
                return Ok(());
            }
            Err(e) => tracing::debug!("{} unavailable: {:#}", cmd, e),
        }
    }

    anyhow::bail!("No supported screen lock mechanism found on this Linux system")
}

/// One way of putting a dialog on screen
#[derive(Debug, Clone, PartialEq, Eq)]
struct DialogCommand {
    program: String,
    args: Vec<String>,
    /// Modal tools report a closed window as `DIALOG_DISMISSED`
    modal: bool,
}

impl DialogCommand {
    fn new(program: &str, args: &[&str], modal: bool) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|arg| arg.to_string()).collect(),
            modal,
        }
    }

    /// Run the tool; `Ok` once the user has seen the dialog
    fn run(&self) -> Result<()> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .output()
            .with_context(|| format!("Failed to run {}", self.program))?;

        let shown = match output.status.code() {
            Some(0) => true,
            Some(DIALOG_DISMISSED) => self.modal,
            _ => false,
        };

        if !shown {
            anyhow::bail!(
                "{} failed ({}): {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(())
    }
}

/// zenity, then kdialog, then a critical notification
fn dialog_commands(kind: DialogKind, title: &str, message: &str) -> Vec<DialogCommand> {
    let (zenity_kind, kdialog_kind) = match kind {
        DialogKind::Warning => ("--warning", "--sorry"),
        DialogKind::Info => ("--info", "--msgbox"),
    };

    vec![
        DialogCommand::new(
            "zenity",
            &[zenity_kind, &format!("--title={}", title), &format!("--text={}", message)],
            true,
        ),
        DialogCommand::new("kdialog", &["--title", title, kdialog_kind, message], true),
        // Not modal, but at least visible
        DialogCommand::new(
            "notify-send",
            &[title, message, "--urgency=critical", "--icon=dialog-warning"],
            false,
        ),
    ]
}

/// Show a dialog with the first tool that works
pub fn show_dialog(kind: DialogKind, title: &str, message: &str) -> Result<()> {
    show_first_available(&dialog_commands(kind, title, message))
}

fn show_first_available(commands: &[DialogCommand]) -> Result<()> {
    for command in commands {
        match command.run() {
            Ok(()) => return Ok(()),
            Err(e) => tracing::debug!("Dialog via {} unavailable: {:#}", command.program, e),
        }
    }

    anyhow::bail!("No dialog tool (zenity, kdialog, notify-send) available")
}

/// Try to execute a command, returning Ok if successful
fn try_command(cmd: &str, args: &[&str]) -> Result<()> {
    let output = Command::new(cmd)
        .args(args)
        .output()?;

    if output.status.success() {
        Ok(())
    } else {
        anyhow::bail!(
            "Command failed: {} {:?} ({}): {}",
            cmd,
            args,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )
    }
}
