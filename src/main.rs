use clap::Parser;
use owo_colors::OwoColorize;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod activities;
mod classify;
mod cli;
mod config;
mod data;
mod entries;
mod error;
mod projects;
mod schema;
mod stale_worklogs;
mod subtickets;
mod sync;
mod ticket_systems;
mod tracker;
mod users;
mod utils;
mod worklog;

#[cfg(test)]
mod testing;

fn main() {
    init_tracing();
    let cli = cli::Cli::parse();
    if let Err(e) = cli.dispatch() {
        tracing::debug!(error = ?e, "command failed");
        eprintln!("{} {e:#}", "Error:".red().bold());
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("TLOG_LOG").unwrap_or_else(|_| EnvFilter::new("tlog=warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();
}
