use super::ConfigError;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiscordConfig {
    #[serde(default, serialize_with = "serialize_redacted")]
    pub bot_token: SecretString,
    /// Guild to register slash commands in; commands are global when unset.
    #[serde(default)]
    pub guild_id: Option<u64>,
    /// Fallback coordinator role used when a guild has not configured one.
    #[serde(default)]
    pub coordinator_role_id: Option<u64>,
    #[serde(default)]
    pub use_privileged_intents: bool,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            bot_token: SecretString::default(),
            guild_id: None,
            coordinator_role_id: None,
            use_privileged_intents: false,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrackerConfig {
    #[serde(default = "default_tracker_base_url")]
    pub base_url: String,
    #[serde(default = "default_tracker_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            base_url: default_tracker_base_url(),
            timeout_secs: default_tracker_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub max_connections: Option<u32>,
    #[serde(default)]
    pub min_connections: Option<u32>,
}

impl DatabaseConfig {
    pub fn db_type(&self) -> DbType {
        let url = self.connection_string();
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            DbType::Postgres
        } else {
            DbType::Sqlite
        }
    }

    pub fn connection_string(&self) -> String {
        if let Some(ref url) = self.url {
            url.clone()
        } else if let Some(ref file) = self.filename {
            format!("sqlite://{}", file)
        } else {
            String::new()
        }
    }

    pub fn sqlite_path(&self) -> Option<String> {
        if let DbType::Sqlite = self.db_type() {
            let url = self.connection_string();
            Some(url.strip_prefix("sqlite://").unwrap_or(&url).to_string())
        } else {
            None
        }
    }

    pub fn max_connections(&self) -> Option<u32> {
        match self.db_type() {
            DbType::Postgres => self.max_connections,
            DbType::Sqlite => Some(1),
        }
    }

    pub fn min_connections(&self) -> Option<u32> {
        match self.db_type() {
            DbType::Postgres => self.min_connections,
            DbType::Sqlite => Some(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbType {
    Postgres,
    Sqlite,
}

impl Config {
    /// Reads the YAML file at `path` when it exists, then layers the
    /// environment on top. A missing file is not an error.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::from_yaml(&content)?
        } else {
            Config::default()
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Config::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("DISCORD_TOKEN") {
            self.discord.bot_token = SecretString::from(value);
        }
        if let Some(value) = lookup("DATABASE_PATH") {
            self.database.url = None;
            self.database.filename = Some(value);
        }
        if let Some(value) = lookup("LOG_LEVEL") {
            self.logging.level = value;
        }
        if let Some(value) = lookup("DISCORD_GUILD_ID").and_then(|v| v.parse().ok()) {
            self.discord.guild_id = Some(value);
        }
        if let Some(value) = lookup("COORDINATOR_ROLE_ID").and_then(|v| v.parse().ok()) {
            self.discord.coordinator_role_id = Some(value);
        }
        if self.database.connection_string().is_empty() {
            self.database.filename = Some(default_database_path());
        }
    }
}

fn serialize_redacted<S>(_: &SecretString, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str("[REDACTED]")
}

fn default_database_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    Path::new(&home)
        .join(".voidling")
        .join("voidling.db")
        .to_string_lossy()
        .into_owned()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_tracker_base_url() -> String {
    "https://api.wiseoldman.net/v2".to_string()
}

fn default_tracker_timeout_secs() -> u64 {
    10
}

fn default_user_agent() -> String {
    concat!("voidling/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::{Config, DbType};

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn empty_yaml_yields_defaults() {
        let config = Config::from_yaml("").expect("parse empty");
        assert_eq!(config.tracker.base_url, "https://api.wiseoldman.net/v2");
        assert_eq!(config.tracker.timeout_secs, 10);
        assert_eq!(config.logging.level, "info");
        assert!(config.discord.guild_id.is_none());
    }

    #[test]
    fn yaml_sections_are_parsed() {
        let yaml = r#"
discord:
  bot_token: "abc"
  guild_id: 1234
tracker:
  timeout_secs: 3
database:
  url: "postgres://localhost/voidling"
  max_connections: 4
logging:
  format: json
"#;
        let config = Config::from_yaml(yaml).expect("parse yaml");
        assert_eq!(config.discord.bot_token.expose_secret(), "abc");
        assert_eq!(config.discord.guild_id, Some(1234));
        assert_eq!(config.tracker.timeout_secs, 3);
        assert_eq!(config.database.db_type(), DbType::Postgres);
        assert_eq!(config.database.max_connections(), Some(4));
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn env_overrides_replace_file_values() {
        let mut config = Config::from_yaml("discord:\n  bot_token: from-file\n").expect("parse");
        let vars = env(&[
            ("DISCORD_TOKEN", "from-env"),
            ("DATABASE_PATH", "/tmp/voidling.db"),
            ("LOG_LEVEL", "debug"),
            ("DISCORD_GUILD_ID", "42"),
            ("COORDINATOR_ROLE_ID", "not-a-number"),
        ]);
        config.apply_env_overrides(|key| vars.get(key).cloned());

        assert_eq!(config.discord.bot_token.expose_secret(), "from-env");
        assert_eq!(config.database.sqlite_path().as_deref(), Some("/tmp/voidling.db"));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.discord.guild_id, Some(42));
        assert!(config.discord.coordinator_role_id.is_none());
    }

    #[test]
    fn missing_database_falls_back_to_home_sqlite_file() {
        let mut config = Config::default();
        config.apply_env_overrides(|_| None);
        let path = config.database.sqlite_path().expect("sqlite path");
        assert!(path.ends_with("voidling.db"));
    }
}
