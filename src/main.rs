use anyhow::Result;
use clap::Parser;

use clock_guard::cli::{Args, Commands};
use clock_guard::commands;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    let config = args.config.as_deref();

    // No subcommand: run the guard
    match args.command.unwrap_or(Commands::Run) {
        Commands::Run => commands::guard::run(config, args.verbose),
        Commands::Check => commands::guard::check(config, args.verbose),
        Commands::Init { output, force } => commands::config::init(output, force),
        Commands::ShowConfig => commands::config::show(config),
        Commands::Lock => commands::guard::lock_now(args.verbose),
    }
}
