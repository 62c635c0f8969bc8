use secrecy::ExposeSecret;
use thiserror::Error;
use url::Url;

use super::Config;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.discord.bot_token.expose_secret().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "discord.bot_token cannot be empty (set DISCORD_TOKEN)".to_string(),
            ));
        }

        if self.database.connection_string().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "database connection string cannot be empty".to_string(),
            ));
        }

        if self.tracker.timeout_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "tracker.timeout_secs must be greater than zero".to_string(),
            ));
        }

        if self.discord.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "discord.request_timeout_secs must be greater than zero".to_string(),
            ));
        }

        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(ConfigError::InvalidConfig(format!(
                "logging.format must be 'pretty' or 'json', got '{}'",
                self.logging.format
            )));
        }

        Url::parse(&self.tracker.base_url).map_err(|e| {
            ConfigError::InvalidConfig(format!(
                "tracker.base_url '{}' is not a valid url: {}",
                self.tracker.base_url, e
            ))
        })?;

        Ok(())
    }
}
