use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(
    name = "voidling",
    version,
    about = "Clan competitions and events for Old School RuneScape"
)]
pub struct Cli {
    /// Path to the YAML configuration file. A missing file means defaults plus
    /// environment overrides.
    #[arg(short, long, env = "CONFIG_PATH", default_value = "config.yaml")]
    pub config: PathBuf,

    /// Overrides `logging.level` from the configuration.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Load and validate the configuration, run migrations, then exit.
    #[arg(long)]
    pub check: bool,
}
