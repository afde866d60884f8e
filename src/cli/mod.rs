use clap::{Parser, Subcommand};
use eyre::Result;

mod catalog;
mod common;
mod config;
mod entries;
mod projects;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Add a new time entry
    #[clap(visible_alias("new"), alias("n"), alias("a"))]
    Add(entries::AddCmd),
    /// Change an existing entry
    #[clap(alias("e"))]
    Edit(entries::EditCmd),
    /// Delete an entry and its work-log
    #[clap(alias("rm"))]
    Delete(entries::DeleteCmd),
    /// Add the same entry to every day of a range
    Bulk(entries::BulkCmd),
    /// Display the entries of a day
    #[clap(alias("s"))]
    Show(entries::ShowCmd),
    /// Manage projects
    #[command(subcommand)]
    #[clap(alias("p"))]
    Project(projects::ProjectCmd),
    /// Manage ticket systems
    #[command(subcommand)]
    #[clap(alias("ts"))]
    TicketSystem(catalog::TicketSystemCmd),
    /// Manage users and their access tokens
    #[command(subcommand)]
    User(catalog::UserCmd),
    /// Manage customers
    #[command(subcommand)]
    Customer(catalog::CustomerCmd),
    /// Manage activities
    #[command(subcommand)]
    Activity(catalog::ActivityCmd),
    /// Update configuration
    #[command(subcommand)]
    Config(config::ConfigCmd),
}

#[derive(Debug, Parser)]
#[command(version, about = "Team time tracking with work-log sync")]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

impl Cli {
    pub fn dispatch(self) -> Result<()> {
        match self.command {
            Command::Add(cmd) => cmd.dispatch(),
            Command::Edit(cmd) => cmd.dispatch(),
            Command::Delete(cmd) => cmd.dispatch(),
            Command::Bulk(cmd) => cmd.dispatch(),
            Command::Show(cmd) => cmd.dispatch(),
            Command::Project(cmd) => cmd.dispatch(),
            Command::TicketSystem(cmd) => cmd.dispatch(),
            Command::User(cmd) => cmd.dispatch(),
            Command::Customer(cmd) => cmd.dispatch(),
            Command::Activity(cmd) => cmd.dispatch(),
            Command::Config(cmd) => cmd.dispatch(),
        }
    }
}
