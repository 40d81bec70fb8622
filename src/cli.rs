use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Clock Guard
///
/// Verifies the local clock against network time and locks the workstation
/// during scheduled lock windows or when the clock cannot be trusted.
#[derive(Parser, Debug)]
#[command(name = "clock-guard")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file (defaults to the platform config path, if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run the guard in the foreground (default)
    Run,
    /// Report lock window status and clock drift once, without locking
    Check,
    /// Write an example configuration file
    Init {
        /// Output path (defaults to the platform config path)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Show the effective configuration
    ShowConfig,
    /// Lock the current session now
    Lock,
}
