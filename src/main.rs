#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use secrecy::ExposeSecret;
use serenity::all::Http;
use tracing::{error, info};

mod accounts;
mod calendar;
mod cli;
mod competition;
mod config;
mod db;
mod discord;
mod error;
mod guild;
mod schedule;
mod timezone;
mod tracker;
mod utils;

use accounts::AccountLinkManager;
use calendar::CalendarService;
use cli::Cli;
use competition::CompetitionLifecycleCoordinator;
use config::Config;
use discord::{BotServices, DiscordBot, DiscordCalendar};
use guild::GuildSettings;
use schedule::{ParticipantRegistry, ScheduledEventScheduler};
use timezone::TimezoneResolver;
use tracker::{TrackingService, WiseOldManClient};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)
        .with_context(|| format!("failed to load config from {}", cli.config.display()))?;
    if let Some(level) = cli.log_level.clone() {
        config.logging.level = level;
    }
    utils::logging::init_tracing(&config.logging);
    let config = Arc::new(config);
    info!(config = %cli.config.display(), "voidling starting up");

    let db_manager = Arc::new(db::DatabaseManager::new(&config.database).await?);
    db_manager.migrate().await?;

    if cli.check {
        info!("configuration and database are valid");
        return Ok(());
    }

    let tracker: Arc<dyn TrackingService> = Arc::new(WiseOldManClient::new(&config.tracker)?);
    let http = Arc::new(Http::new(config.discord.bot_token.expose_secret()));
    let calendar: Arc<dyn CalendarService> = Arc::new(DiscordCalendar::new(
        http,
        Duration::from_secs(config.discord.request_timeout_secs),
    ));

    let settings = db_manager.settings_store();
    let accounts = AccountLinkManager::new(db_manager.account_link_store());
    let services = Arc::new(BotServices {
        accounts: accounts.clone(),
        competitions: CompetitionLifecycleCoordinator::new(
            db_manager.competition_store(),
            accounts.clone(),
            tracker.clone(),
            calendar.clone(),
            settings.clone(),
        ),
        registry: ParticipantRegistry::new(db_manager.event_store(), accounts),
        scheduler: ScheduledEventScheduler::new(
            db_manager.event_store(),
            calendar,
            settings.clone(),
            TimezoneResolver::new(settings.clone()),
        ),
        guilds: GuildSettings::new(settings),
        tracker,
        coordinator_role_fallback: config
            .discord
            .coordinator_role_id
            .and_then(|id| i64::try_from(id).ok()),
    });

    let bot = DiscordBot::new(config.clone(), services);
    bot.start().await?;

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                error!(error = %e, "failed to listen for shutdown signal");
            }
            info!("shutdown requested");
        }
        _ = bot.wait() => {
            error!("discord gateway exited unexpectedly");
        }
    }

    bot.stop().await?;
    info!("voidling shutting down");
    Ok(())
}
