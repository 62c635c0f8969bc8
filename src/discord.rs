use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use secrecy::ExposeSecret;
use serenity::all::{
    ButtonStyle, ChannelId, Client as SerenityClient, CreateActionRow, CreateButton, CreateEmbed,
    CreateMessage, CreateScheduledEvent, GatewayIntents, GuildId, Http, ScheduledEventType,
    Timestamp,
};
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, error, info};

use crate::accounts::AccountLinkManager;
use crate::calendar::{
    CalendarService, ControlStyle, ExternalEventRequest, InteractiveControl, Notification,
    RichPayload,
};
use crate::competition::CompetitionLifecycleCoordinator;
use crate::config::Config;
use crate::error::ExternalServiceError;
use crate::guild::GuildSettings;
use crate::schedule::{ParticipantRegistry, ScheduledEventScheduler};
use crate::tracker::TrackingService;

pub mod commands;
pub mod handlers;
pub mod interactions;

use self::handlers::BotHandler;

const INITIAL_LOGIN_RETRY_SECONDS: u64 = 2;
const MAX_LOGIN_RETRY_SECONDS: u64 = 300;
const READY_TIMEOUT_SECONDS: u64 = 30;
const SERVICE: &str = "discord";

/// Discord snowflakes fit in 63 bits, so the conversion is lossless.
pub(crate) fn snowflake(id: u64) -> i64 {
    id as i64
}

/// Inverse of [`snowflake`]. Zero and negative references are not ids.
pub(crate) fn snowflake_ref(id: i64) -> Option<u64> {
    u64::try_from(id).ok().filter(|id| *id != 0)
}

pub(crate) fn build_embed(payload: &RichPayload) -> CreateEmbed {
    let mut embed = CreateEmbed::new()
        .title(&payload.title)
        .description(&payload.description);
    for (name, value) in &payload.fields {
        embed = embed.field(name, value, false);
    }
    if let Some(color) = payload.color {
        embed = embed.color(color);
    }
    embed
}

pub(crate) fn build_buttons(controls: &[InteractiveControl]) -> Vec<CreateActionRow> {
    if controls.is_empty() {
        return Vec::new();
    }
    let buttons = controls
        .iter()
        .map(|control| {
            let style = match control.style {
                ControlStyle::Secondary => ButtonStyle::Secondary,
                ControlStyle::Success => ButtonStyle::Success,
                ControlStyle::Danger => ButtonStyle::Danger,
            };
            CreateButton::new(&control.custom_id)
                .label(&control.label)
                .style(style)
        })
        .collect();
    vec![CreateActionRow::Buttons(buttons)]
}

pub(crate) fn map_serenity_error(err: serenity::Error) -> ExternalServiceError {
    match &err {
        serenity::Error::Http(http_err) => match http_err.status_code() {
            Some(status) => ExternalServiceError::Rejected {
                service: SERVICE,
                status: status.as_u16(),
                message: http_err.to_string(),
            },
            None => ExternalServiceError::Unreachable {
                service: SERVICE,
                message: http_err.to_string(),
            },
        },
        other => ExternalServiceError::Unreachable {
            service: SERVICE,
            message: other.to_string(),
        },
    }
}

fn timestamp(instant: chrono::DateTime<chrono::Utc>) -> Result<Timestamp, ExternalServiceError> {
    Timestamp::from_unix_timestamp(instant.timestamp()).map_err(|e| {
        ExternalServiceError::Decode {
            service: SERVICE,
            message: format!("invalid event time {instant}: {e}"),
        }
    })
}

/// Scheduled events and channel messages through the Discord REST API.
pub struct DiscordCalendar {
    http: Arc<Http>,
    timeout: Duration,
}

impl DiscordCalendar {
    pub fn new(http: Arc<Http>, timeout: Duration) -> Self {
        Self { http, timeout }
    }

    async fn call<T>(
        &self,
        request: impl Future<Output = serenity::Result<T>>,
    ) -> Result<T, ExternalServiceError> {
        match tokio::time::timeout(self.timeout, request).await {
            Ok(result) => result.map_err(map_serenity_error),
            Err(_) => Err(ExternalServiceError::Timeout { service: SERVICE }),
        }
    }
}

#[async_trait]
impl CalendarService for DiscordCalendar {
    async fn create_external_event(
        &self,
        request: &ExternalEventRequest,
    ) -> Result<String, ExternalServiceError> {
        let guild = snowflake_ref(request.guild_id).ok_or_else(|| ExternalServiceError::NotFound {
            service: SERVICE,
            what: format!("guild {}", request.guild_id),
        })?;
        let builder = CreateScheduledEvent::new(
            ScheduledEventType::External,
            request.name.clone(),
            timestamp(request.start)?,
        )
        .description(request.description.clone())
        .end_time(timestamp(request.end)?)
        .location(request.location.clone());

        let event = self
            .call(GuildId::new(guild).create_scheduled_event(&self.http, builder))
            .await?;
        debug!(guild, event = %event.id, "created guild scheduled event");
        Ok(event.id.to_string())
    }

    async fn post_notification(
        &self,
        notification: &Notification,
    ) -> Result<(), ExternalServiceError> {
        let channel =
            snowflake_ref(notification.channel_ref).ok_or_else(|| ExternalServiceError::NotFound {
                service: SERVICE,
                what: format!("channel {}", notification.channel_ref),
            })?;

        let mut message = CreateMessage::new().components(build_buttons(&notification.controls));
        if !notification.content.is_empty() {
            message = message.content(&notification.content);
        }
        if let Some(payload) = &notification.payload {
            message = message.embed(build_embed(payload));
        }
        self.call(ChannelId::new(channel).send_message(&self.http, message))
            .await?;
        Ok(())
    }
}

/// Everything the interaction handlers call into.
pub struct BotServices {
    pub accounts: AccountLinkManager,
    pub competitions: CompetitionLifecycleCoordinator,
    pub registry: ParticipantRegistry,
    pub scheduler: ScheduledEventScheduler,
    pub guilds: GuildSettings,
    pub tracker: Arc<dyn TrackingService>,
    /// `COORDINATOR_ROLE_ID` from the environment, used when a guild has not
    /// configured its own role.
    pub coordinator_role_fallback: Option<i64>,
}

#[derive(Default)]
struct DiscordLoginState {
    is_logged_in: bool,
    gateway_task: Option<tokio::task::JoinHandle<()>>,
    gateway_abort: Option<tokio::task::AbortHandle>,
}

pub struct DiscordBot {
    config: Arc<Config>,
    services: Arc<BotServices>,
    login_state: Mutex<DiscordLoginState>,
}

impl DiscordBot {
    pub fn new(config: Arc<Config>, services: Arc<BotServices>) -> Self {
        info!("initializing discord bot");
        Self {
            config,
            services,
            login_state: Mutex::new(DiscordLoginState::default()),
        }
    }

    pub async fn login(&self) -> Result<()> {
        let mut state = self.login_state.lock().await;
        if state.is_logged_in {
            return Ok(());
        }

        let intents = if self.config.discord.use_privileged_intents {
            GatewayIntents::non_privileged() | GatewayIntents::GUILD_MEMBERS
        } else {
            GatewayIntents::non_privileged()
        };

        let (ready_tx, ready_rx) = oneshot::channel();
        let handler = BotHandler::new(
            self.services.clone(),
            self.config.discord.guild_id,
            ready_tx,
        );

        let mut gateway_client =
            SerenityClient::builder(self.config.discord.bot_token.expose_secret(), intents)
                .event_handler(handler)
                .await
                .map_err(|err| anyhow!("failed to build discord gateway client: {err}"))?;

        let gateway_task = tokio::spawn(async move {
            if let Err(err) = gateway_client.start_autosharded().await {
                error!(error = %err, "discord gateway stopped");
            }
        });

        match tokio::time::timeout(Duration::from_secs(READY_TIMEOUT_SECONDS), ready_rx).await {
            Ok(Ok(())) => {
                state.is_logged_in = true;
                state.gateway_abort = Some(gateway_task.abort_handle());
                state.gateway_task = Some(gateway_task);
                info!("discord bot login succeeded and gateway is connected");
                Ok(())
            }
            Ok(Err(_)) => {
                gateway_task.abort();
                Err(anyhow!("discord gateway exited before receiving Ready event"))
            }
            Err(_) => {
                gateway_task.abort();
                Err(anyhow!("timed out waiting for discord Ready event"))
            }
        }
    }

    /// Logs in, retrying with exponential backoff until the gateway is ready.
    pub async fn start(&self) -> Result<()> {
        let mut retry_seconds = INITIAL_LOGIN_RETRY_SECONDS;

        loop {
            match self.login().await {
                Ok(()) => {
                    info!("discord bot is ready");
                    return Ok(());
                }
                Err(err) => {
                    error!(
                        error = %err,
                        retry_seconds,
                        "failed to start discord bot, retrying"
                    );
                    tokio::time::sleep(Duration::from_secs(retry_seconds)).await;
                    retry_seconds = (retry_seconds * 2).min(MAX_LOGIN_RETRY_SECONDS);
                }
            }
        }
    }

    /// Resolves when the gateway task ends on its own.
    pub async fn wait(&self) {
        let task = self.login_state.lock().await.gateway_task.take();
        if let Some(task) = task {
            if let Err(join_err) = task.await {
                error!(error = %join_err, "discord gateway task join error");
            }
        }
        self.login_state.lock().await.is_logged_in = false;
    }

    pub async fn stop(&self) -> Result<()> {
        let mut state = self.login_state.lock().await;
        if !state.is_logged_in {
            return Ok(());
        }

        match (state.gateway_task.take(), state.gateway_abort.take()) {
            (Some(gateway_task), _) => {
                gateway_task.abort();
                match gateway_task.await {
                    Ok(()) => info!("discord gateway task exited"),
                    Err(join_err) if join_err.is_cancelled() => {
                        info!("discord gateway task aborted")
                    }
                    Err(join_err) => error!(error = %join_err, "discord gateway task join error"),
                }
            }
            // `wait` owns the join handle.
            (None, Some(abort)) => abort.abort(),
            (None, None) => {}
        }

        state.is_logged_in = false;
        info!("discord bot stopped");
        Ok(())
    }
}
