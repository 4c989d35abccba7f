use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sources::nats;

const fn default_interval() -> Duration {
    Duration::from_secs(10)
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file {path:?} failed, {err}")]
    Read { path: PathBuf, err: std::io::Error },

    #[error("parse config failed, {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid config, {0}")]
    Validate(&'static str),
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Config {
    /// How often a collection cycle runs.
    #[serde(default = "default_interval", with = "humanize::duration::serde")]
    pub interval: Duration,

    #[serde(flatten)]
    pub nats: nats::Config,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            interval: default_interval(),
            nats: nats::Config::default(),
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| ConfigError::Read {
            path: path.to_path_buf(),
            err,
        })?;

        text.parse()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nats.urls.is_empty() {
            return Err(ConfigError::Validate("urls is required"));
        }

        if self.interval.is_zero() {
            return Err(ConfigError::Validate("interval must be greater than zero"));
        }

        Ok(())
    }
}

impl std::str::FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let config: Config = serde_yaml::from_str(s)?;
        config.validate()?;

        Ok(config)
    }
}
