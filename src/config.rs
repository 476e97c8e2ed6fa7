use std::path::Path;
use std::time::Duration;
use serde::Deserialize;
use tracing::debug;
use crate::core::{Result, TaskError, UploadConfig};

pub const DEFAULT_CONFIG_FILE: &str = "scrumbot.toml";

/// Client configuration, every field is optional in the file
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Api root, e.g. `http://localhost:8000/api`
    pub base_url: String,
    pub poll_interval_ms: u64,
    pub reset_delay_ms: u64,
    pub request_timeout_secs: u64,
    pub max_poll_failures: u32,
    pub event_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".to_string(),
            poll_interval_ms: 3_000,
            reset_delay_ms: 25_000,
            request_timeout_secs: 300,
            max_poll_failures: 0,
            event_capacity: 256,
        }
    }
}

impl Config {
    pub fn load_config(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        let config_str = std::fs::read_to_string(path)?;
        Self::parse(&config_str)
            .map_err(|err| TaskError::Config(format!("Can't load {}: {}", path.display(), err)))
    }

    /// Missing file falls back to the defaults, a broken one is an error
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Config::default());
        }

        Self::load_config(path)
    }

    pub fn parse(config_str: &str) -> Result<Config> {
        let config: Config = toml::from_str(config_str)
            .map_err(|err| TaskError::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(TaskError::Config("poll_interval_ms must be greater than 0".to_string()));
        }
        if self.request_timeout_secs == 0 {
            return Err(TaskError::Config("request_timeout_secs must be greater than 0".to_string()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn upload_config(&self) -> UploadConfig {
        UploadConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            reset_delay: Duration::from_millis(self.reset_delay_ms),
            max_poll_failures: self.max_poll_failures,
            event_capacity: self.event_capacity,
        }
    }
}
