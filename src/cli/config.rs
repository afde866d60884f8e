use super::common::clock_value_parser;
use crate::config::Config;
use clap::Subcommand;
use eyre::Result;
use owo_colors::OwoColorize;
use std::path::PathBuf;

#[derive(Debug, Subcommand)]
pub enum ConfigCmd {
    DataPath {
        new_path: Option<PathBuf>,
    },
    /// Username the CLI acts as
    User {
        username: Option<String>,
    },
    /// Entries added before this time of day default to the previous day
    DayChangeThreshold {
        #[arg(value_parser = clock_value_parser)]
        new_threshold: Option<time::Time>,
    },
    /// Timeout for ticket system requests, in seconds
    TrackerTimeout {
        seconds: Option<u64>,
    },
    Reset,
}

impl ConfigCmd {
    pub fn dispatch(self) -> Result<()> {
        match self {
            ConfigCmd::DataPath { new_path } => match new_path {
                None => {
                    let data_path = Config::read()?.unwrap_or_default().data_path;
                    println!("{}", data_path.to_string_lossy());
                }
                Some(new_path) => {
                    let config = Config::update(|config| config.data_path = new_path)?;
                    updated("Data path", config.data_path.to_string_lossy());
                }
            },
            ConfigCmd::User { username } => match username {
                None => {
                    let user = Config::read()?.unwrap_or_default().user;
                    println!("{}", user.unwrap_or_default());
                }
                Some(username) => {
                    Config::update(|config| config.user = Some(username.clone()))?;
                    updated("User", username);
                }
            },
            ConfigCmd::DayChangeThreshold { new_threshold } => match new_threshold {
                None => {
                    let threshold = Config::read()?.unwrap_or_default().day_change_threshold();
                    println!("{}", crate::utils::fmt_time(threshold));
                }
                Some(new_threshold) => {
                    Config::update(|config| config.day_change_threshold = Some(new_threshold))?;
                    updated("Day change threshold", crate::utils::fmt_time(new_threshold));
                }
            },
            ConfigCmd::TrackerTimeout { seconds } => match seconds {
                None => {
                    let timeout = Config::read()?.unwrap_or_default().tracker_timeout();
                    println!("{}", timeout.as_secs());
                }
                Some(seconds) => {
                    Config::update(|config| config.tracker_timeout_secs = Some(seconds))?;
                    updated("Tracker timeout", format!("{seconds}s"));
                }
            },
            ConfigCmd::Reset => Config::reset()?,
        }
        Ok(())
    }
}

fn updated(what: &str, value: impl std::fmt::Display) {
    eprintln!("{} {what} updated to {value}", "Success:".green().bold());
}
