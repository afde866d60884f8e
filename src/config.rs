use crate::utils::yn_prompt;
use directories::ProjectDirs;
use eyre::Result;
use owo_colors::OwoColorize;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use time::Time;

const DEFAULT_TRACKER_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Serialize, Deserialize)]
pub struct Config {
    pub data_path: PathBuf,
    /// Username the CLI acts as.
    pub user: Option<String>,
    pub day_change_threshold: Option<Time>,
    pub tracker_timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        let data_path = directories()
            .map(|dirs| dirs.data_dir().join("tlog.db"))
            .unwrap_or_else(|_| PathBuf::from("tlog.db"));
        Self {
            data_path,
            user: None,
            day_change_threshold: None,
            tracker_timeout_secs: None,
        }
    }
}

impl Config {
    pub fn read() -> Result<Option<Self>> {
        let config_path = directories()?.config_dir().join("config.toml");
        let config_str = match std::fs::read_to_string(config_path) {
            Ok(str) => str,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        toml::from_str(&config_str).map(Some).map_err(Into::into)
    }

    /// Applies `change` to the stored configuration (or the default one) and
    /// writes it back.
    pub fn update(change: impl FnOnce(&mut Config)) -> Result<Self> {
        let mut config = Config::read()?.unwrap_or_default();
        change(&mut config);
        config.write()?;
        Ok(config)
    }

    pub fn reset() -> Result<()> {
        if !yn_prompt("Do you want to reset to default configuration?")? {
            eyre::bail!("Config reset aborted");
        }
        Config::default().write()?;

        eprintln!(
            "{} Default configuration restored",
            "Success:".green().bold()
        );

        Ok(())
    }

    fn write(&self) -> Result<()> {
        let dirs = directories()?;
        let config_folder = dirs.config_dir();
        std::fs::create_dir_all(config_folder)?;
        let config_path = config_folder.join("config.toml");

        let mut f = std::fs::File::create(&config_path)?;
        let config_str = toml::to_string_pretty(self)?;
        f.write_all(config_str.as_bytes())?;
        tracing::debug!(path = %config_path.display(), "wrote configuration");
        Ok(())
    }

    pub fn day_change_threshold(&self) -> Time {
        self.day_change_threshold.unwrap_or(Time::MIDNIGHT)
    }

    pub fn tracker_timeout(&self) -> Duration {
        Duration::from_secs(
            self.tracker_timeout_secs
                .unwrap_or(DEFAULT_TRACKER_TIMEOUT_SECS),
        )
    }
}

fn directories() -> Result<ProjectDirs> {
    ProjectDirs::from("net", "tlog", "tlog")
        .ok_or_else(|| eyre::eyre!("Unable to find app data directory for the current system"))
}
