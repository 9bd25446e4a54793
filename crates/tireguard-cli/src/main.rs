//! TireGuard - tire identity audits for fleet units
//!
//! A CLI tool that fingerprints the tires on a unit from photos, compares
//! them against the approved baseline, and records justifications,
//! approvals and disposals.

mod cli;
mod commands;
mod output;

use clap::Parser;
use cli::Cli;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Warning: logging unavailable: {}", e);
    }

    if let Err(e) = commands::execute(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
