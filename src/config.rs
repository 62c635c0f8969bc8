pub use self::parser::{
    Config, DatabaseConfig, DbType, LoggingConfig, TrackerConfig,
};
pub use self::validator::ConfigError;

mod parser;
mod validator;
