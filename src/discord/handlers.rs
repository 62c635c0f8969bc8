use std::sync::Arc;

use serenity::all::{
    ActionRowComponent, ChannelId, ChannelType, Command, CommandInteraction, ComponentInteraction,
    Context, CreateActionRow, CreateAllowedMentions, CreateAutocompleteResponse, CreateInputText,
    CreateInteractionResponse, CreateInteractionResponseMessage, CreateMessage, CreateModal,
    CreateThread, EditInteractionResponse, EditMember, EventHandler, GuildId, InputTextStyle,
    Interaction, Member, ModalInteraction, Permissions, Ready, ResolvedOption, ResolvedValue,
    UserId,
};
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, error, info, warn};

use super::commands::{self, Access, CommandRoute, LINK_INPUT_MAX};
use super::interactions::{
    self, ComponentAction, LINK_INPUT_ID, LINK_MODAL_ID, parse_register_data, register_data,
};
use super::{BotServices, build_buttons, build_embed, snowflake, snowflake_ref};
use crate::accounts::lookup_account;
use crate::calendar::{ControlStyle, InteractiveControl};
use crate::competition::{Winner, format_number, render_participants};
use crate::db::{CompetitionKind, EventKind};
use crate::error::{CoreError, CoreResult, ErrorCategory};
use crate::guild::{is_coordinator, resolve_coordinator_role};
use crate::schedule::{EventRequest, render_event_participants, render_upcoming_events};
use crate::timezone::{format_for_discord, format_with_timezone, search_timezones};

const GUILD_ONLY: &str = "This command can only be used in a server.";
const NO_PERMISSION: &str = "You don't have permission to use this command.";
const INVALID_BUTTON: &str = "This button is no longer valid.";
const UPCOMING_LIMIT: i64 = 5;

/// Flattens subcommands into a path such as `config event-role` and returns
/// the options of the innermost command.
fn command_path<'a>(
    name: &str,
    mut options: Vec<ResolvedOption<'a>>,
) -> (String, Vec<ResolvedOption<'a>>) {
    let mut path = name.to_string();
    while matches!(
        options.first().map(|o| &o.value),
        Some(ResolvedValue::SubCommand(_) | ResolvedValue::SubCommandGroup(_))
    ) {
        let first = options.remove(0);
        path.push(' ');
        path.push_str(first.name);
        options = match first.value {
            ResolvedValue::SubCommand(inner) | ResolvedValue::SubCommandGroup(inner) => inner,
            _ => Vec::new(),
        };
    }
    (path, options)
}

fn option<'a, 'b>(
    options: &'b [ResolvedOption<'a>],
    name: &str,
) -> Option<&'b ResolvedValue<'a>> {
    options.iter().find(|o| o.name == name).map(|o| &o.value)
}

fn missing(name: &str) -> CoreError {
    CoreError::Validation(format!("Missing option `{name}`."))
}

fn string_option<'a>(options: &[ResolvedOption<'a>], name: &str) -> Option<&'a str> {
    match option(options, name) {
        Some(ResolvedValue::String(value)) => Some(*value),
        _ => None,
    }
}

fn require_string<'a>(options: &[ResolvedOption<'a>], name: &str) -> CoreResult<&'a str> {
    string_option(options, name).ok_or_else(|| missing(name))
}

fn require_integer(options: &[ResolvedOption<'_>], name: &str) -> CoreResult<i64> {
    match option(options, name) {
        Some(ResolvedValue::Integer(value)) => Ok(*value),
        _ => Err(missing(name)),
    }
}

fn require_role(options: &[ResolvedOption<'_>], name: &str) -> CoreResult<i64> {
    match option(options, name) {
        Some(ResolvedValue::Role(role)) => Ok(snowflake(role.id.get())),
        _ => Err(missing(name)),
    }
}

fn require_channel(options: &[ResolvedOption<'_>], name: &str) -> CoreResult<i64> {
    match option(options, name) {
        Some(ResolvedValue::Channel(channel)) => Ok(snowflake(channel.id.get())),
        _ => Err(missing(name)),
    }
}

/// Logs failures that are our fault and returns the text shown to the member.
fn failure_text(operation: &str, err: &CoreError) -> String {
    match err.category() {
        ErrorCategory::ExternalService | ErrorCategory::Persistence => {
            error!(operation, error = %err, retryable = err.is_retryable(), "operation failed");
        }
        _ => debug!(operation, error = %err, "operation rejected"),
    }
    err.user_message()
}

/// Commands that also work in DMs.
fn works_outside_guild(route: CommandRoute) -> bool {
    matches!(
        route,
        CommandRoute::LinkAccount
            | CommandRoute::UnlinkAccount
            | CommandRoute::UpcomingEvents
            | CommandRoute::SetMyTimezone
    )
}

/// Winners with a linked Discord account. Only these are pinged by the
/// announcement.
fn winner_mentions(winners: &[Winner]) -> Vec<UserId> {
    winners
        .iter()
        .filter_map(|w| w.platform_identity.and_then(snowflake_ref))
        .map(UserId::new)
        .collect()
}

fn is_administrator(member: Option<&Member>) -> bool {
    member
        .and_then(|m| m.permissions)
        .is_some_and(|p| p.contains(Permissions::ADMINISTRATOR))
}

pub struct BotHandler {
    services: Arc<BotServices>,
    guild_id: Option<u64>,
    ready_sender: Mutex<Option<oneshot::Sender<()>>>,
}

impl BotHandler {
    pub fn new(
        services: Arc<BotServices>,
        guild_id: Option<u64>,
        ready_sender: oneshot::Sender<()>,
    ) -> Self {
        Self {
            services,
            guild_id,
            ready_sender: Mutex::new(Some(ready_sender)),
        }
    }

    async fn register_commands(&self, ctx: &Context) {
        let definitions = commands::definitions();
        match self.guild_id.filter(|id| *id != 0) {
            Some(guild_id) => {
                let guild = GuildId::new(guild_id);
                match guild.set_commands(&ctx.http, definitions).await {
                    Ok(registered) => {
                        info!(guild_id, count = registered.len(), "registered guild slash commands")
                    }
                    Err(e) => {
                        warn!(guild_id, error = %e, "failed to register guild slash commands")
                    }
                }
            }
            None => match Command::set_global_commands(&ctx.http, definitions).await {
                Ok(registered) => {
                    info!(count = registered.len(), "registered global slash commands")
                }
                Err(e) => warn!(error = %e, "failed to register global slash commands"),
            },
        }
    }

    async fn authorize(&self, ctx: &Context, command: &CommandInteraction, access: Access) -> bool {
        let member = command.member.as_deref();
        match access {
            Access::Anyone => true,
            Access::Administrator => is_administrator(member),
            Access::Coordinator => {
                if is_administrator(member) {
                    return true;
                }
                let (Some(guild_id), Some(member)) = (command.guild_id, member) else {
                    return false;
                };
                let guild_ref = snowflake(guild_id.get());
                let config = match self.services.guilds.get_config(guild_ref).await {
                    Ok(config) => config,
                    Err(e) => {
                        warn!(
                            guild_id = %guild_id,
                            error = %e,
                            "failed to read guild config for permission check"
                        );
                        None
                    }
                };

                let needs_lookup = config.as_ref().and_then(|c| c.coordinator_role_id).is_none()
                    && self.services.coordinator_role_fallback.is_none();
                let guild_roles: Vec<(i64, String)> = if needs_lookup {
                    match guild_id.roles(&ctx.http).await {
                        Ok(roles) => roles
                            .into_values()
                            .map(|role| (snowflake(role.id.get()), role.name))
                            .collect(),
                        Err(e) => {
                            warn!(guild_id = %guild_id, error = %e, "failed to list guild roles");
                            Vec::new()
                        }
                    }
                } else {
                    Vec::new()
                };

                let role = resolve_coordinator_role(
                    config.as_ref(),
                    self.services.coordinator_role_fallback,
                    &guild_roles,
                );
                let member_roles: Vec<i64> =
                    member.roles.iter().map(|r| snowflake(r.get())).collect();
                is_coordinator(&member_roles, role)
            }
        }
    }

    async fn respond_ephemeral(&self, ctx: &Context, command: &CommandInteraction, content: &str) {
        let response = CreateInteractionResponse::Message(
            CreateInteractionResponseMessage::new()
                .content(content)
                .ephemeral(true),
        );
        if let Err(e) = command.create_response(&ctx.http, response).await {
            warn!(error = %e, "failed to respond to command");
        }
    }

    async fn handle_command(&self, ctx: &Context, command: &CommandInteraction) {
        let (path, options) = command_path(&command.data.name, command.data.options());
        let Some(route) = commands::route_command(&path) else {
            warn!(command = %path, "unknown command");
            self.respond_ephemeral(ctx, command, "Unknown command.").await;
            return;
        };

        if !works_outside_guild(route) && command.guild_id.is_none() {
            self.respond_ephemeral(ctx, command, GUILD_ONLY).await;
            return;
        }
        if !self.authorize(ctx, command, route.access()).await {
            info!(command = %path, user = %command.user.id, "command denied");
            self.respond_ephemeral(ctx, command, NO_PERMISSION).await;
            return;
        }

        if route == CommandRoute::LinkAccount {
            self.show_link_modal(ctx, command).await;
            return;
        }

        if let Err(e) = command.defer_ephemeral(&ctx.http).await {
            warn!(command = %path, error = %e, "failed to defer command");
            return;
        }
        let content = match self.run_command(ctx, command, route, &options).await {
            Ok(content) => content,
            Err(err) => failure_text(&path, &err),
        };
        if let Err(e) = command
            .edit_response(&ctx.http, EditInteractionResponse::new().content(content))
            .await
        {
            warn!(command = %path, error = %e, "failed to edit command response");
        }
    }

    async fn show_link_modal(&self, ctx: &Context, command: &CommandInteraction) {
        let input = CreateInputText::new(InputTextStyle::Short, "RuneScape name", LINK_INPUT_ID)
            .placeholder("Zezima")
            .min_length(1)
            .max_length(LINK_INPUT_MAX)
            .required(true);
        let modal = CreateModal::new(LINK_MODAL_ID, "Link your RuneScape account")
            .components(vec![CreateActionRow::InputText(input)]);
        if let Err(e) = command
            .create_response(&ctx.http, CreateInteractionResponse::Modal(modal))
            .await
        {
            warn!(error = %e, "failed to show link modal");
        }
    }

    async fn run_command(
        &self,
        ctx: &Context,
        command: &CommandInteraction,
        route: CommandRoute,
        options: &[ResolvedOption<'_>],
    ) -> CoreResult<String> {
        let user_id = snowflake(command.user.id.get());
        let guild_id = command.guild_id.map(|g| snowflake(g.get()));
        let services = &self.services;

        match route {
            CommandRoute::LinkAccount => Ok(String::new()),
            CommandRoute::UnlinkAccount => {
                let link = services.accounts.unlink_account(user_id).await?;
                Ok(format!(
                    "Successfully unlinked your account from **{}**.",
                    link.account_name
                ))
            }
            CommandRoute::StartCompetition(kind) => {
                let option_name = match kind {
                    CompetitionKind::BossOfTheWeek => "boss",
                    CompetitionKind::SkillOfTheWeek => "skill",
                };
                let metric = require_string(options, option_name)?;
                self.start_competition(ctx, command, kind, metric).await
            }
            CommandRoute::FinishCompetition(kind) => {
                self.finish_competition(ctx, command, kind).await
            }
            CommandRoute::ScheduleEvent(kind) => {
                let request = EventRequest {
                    activity: require_string(options, "activity")?.to_string(),
                    location: require_string(options, "location")?.to_string(),
                    local_time: require_string(options, "time")?.to_string(),
                    duration_minutes: require_integer(options, "duration")?,
                    timezone: string_option(options, "timezone").map(str::to_string),
                    guild_id: guild_id.unwrap_or_default(),
                    user_id,
                };
                let outcome = match kind {
                    EventKind::Mass => services.scheduler.schedule_mass_event(&request).await?,
                    _ => services.scheduler.schedule_event(kind, &request).await?,
                };
                let mut reply = format!(
                    "Scheduled **{}** at {} from {} until {} ({}).",
                    outcome.activity,
                    outcome.location,
                    format_for_discord(outcome.start),
                    format_for_discord(outcome.end),
                    format_with_timezone(outcome.start, &outcome.timezone)
                );
                if outcome.record.is_none() {
                    reply.push_str("\nThe Discord event is live, but sign-ups are unavailable.");
                }
                Ok(reply)
            }
            CommandRoute::UpcomingEvents => {
                let events = services
                    .scheduler
                    .upcoming_events(chrono::Utc::now(), UPCOMING_LIMIT)
                    .await?;
                Ok(render_upcoming_events(&events))
            }
            CommandRoute::ShowConfig => {
                let guild_id = guild_id.unwrap_or_default();
                let config = services.guilds.get_config(guild_id).await?.unwrap_or_default();
                let role =
                    |id: Option<i64>| id.map_or("not set".to_string(), |id| format!("<@&{id}>"));
                let channel =
                    |id: Option<i64>| id.map_or("not set".to_string(), |id| format!("<#{id}>"));
                Ok(format!(
                    "**Server settings**\n\
                     Coordinator role: {}\n\
                     Competition code channel: {}\n\
                     Event channel: {}\n\
                     Event role: {}\n\
                     Default timezone: {}",
                    role(config.coordinator_role_id),
                    channel(config.competition_code_channel_id),
                    channel(config.event_notification_channel_id),
                    role(config.event_notification_role_id),
                    config.default_timezone.as_deref().unwrap_or("UTC"),
                ))
            }
            CommandRoute::SetCoordinatorRole => {
                let role = require_role(options, "role")?;
                services
                    .guilds
                    .set_coordinator_role(guild_id.unwrap_or_default(), role)
                    .await?;
                Ok(format!("Coordinator role set to <@&{role}>."))
            }
            CommandRoute::SetCompetitionCodeChannel => {
                let channel = require_channel(options, "channel")?;
                services
                    .guilds
                    .set_competition_code_channel(guild_id.unwrap_or_default(), channel)
                    .await?;
                Ok(format!("Competition codes will be posted in <#{channel}>."))
            }
            CommandRoute::SetEventNotificationChannel => {
                let channel = require_channel(options, "channel")?;
                services
                    .guilds
                    .set_event_notification_channel(guild_id.unwrap_or_default(), channel)
                    .await?;
                Ok(format!("Events will be announced in <#{channel}>."))
            }
            CommandRoute::SetEventNotificationRole => {
                let role = require_role(options, "role")?;
                services
                    .guilds
                    .set_event_notification_role(guild_id.unwrap_or_default(), role)
                    .await?;
                Ok(format!("<@&{role}> will be pinged for new events."))
            }
            CommandRoute::SetDefaultTimezone => {
                let label = require_string(options, "timezone")?;
                let config = services
                    .guilds
                    .set_default_timezone(guild_id.unwrap_or_default(), label)
                    .await?;
                Ok(format!(
                    "Default timezone set to **{}**.",
                    config.default_timezone.unwrap_or_default()
                ))
            }
            CommandRoute::SetMyTimezone => {
                let label = require_string(options, "timezone")?;
                let stored = services.guilds.set_user_timezone(user_id, label).await?;
                Ok(format!("Your timezone is now **{stored}**."))
            }
        }
    }

    async fn start_competition(
        &self,
        ctx: &Context,
        command: &CommandInteraction,
        kind: CompetitionKind,
        metric: &str,
    ) -> CoreResult<String> {
        if !commands::is_known_metric(kind, metric) {
            return Err(CoreError::Validation(format!(
                "'{metric}' is not a {} activity.",
                kind.display_name()
            )));
        }

        let title = crate::competition::competition_title(kind, metric);
        let thread = match command
            .channel_id
            .create_thread(
                &ctx.http,
                CreateThread::new(title.clone()).kind(ChannelType::PublicThread),
            )
            .await
        {
            Ok(thread) => Some(thread.id),
            Err(e) => {
                warn!(
                    channel = %command.channel_id,
                    error = %e,
                    "failed to create competition thread"
                );
                None
            }
        };
        let thread_ref = thread.map(|t| snowflake(t.get()));

        let started = self
            .services
            .competitions
            .start_competition(kind, metric, thread_ref)
            .await?;
        let external_id = started.competition.external_competition_id;

        if let Some(thread) = thread {
            if let Err(e) = thread
                .send_message(&ctx.http, CreateMessage::new().content(started.announcement()))
                .await
            {
                warn!(external_id, error = %e, "failed to post competition announcement");
            }
        }

        let controls = [
            InteractiveControl::new(
                interactions::register_action(kind),
                &register_data(external_id, thread_ref),
                "Register",
                ControlStyle::Success,
            ),
            InteractiveControl::new(
                interactions::list_action(kind),
                &external_id.to_string(),
                "List Participants",
                ControlStyle::Secondary,
            ),
        ];
        let message = CreateMessage::new()
            .content(format!("**{}** has started! Click below to join.", started.title))
            .components(build_buttons(&controls));
        if let Err(e) = command.channel_id.send_message(&ctx.http, message).await {
            warn!(external_id, error = %e, "failed to post registration buttons");
        }

        if let Some(guild_id) = command.guild_id {
            self.services
                .competitions
                .announce_verification_code(snowflake(guild_id.get()), &started)
                .await;
        }

        Ok(format!("Started **{}**!", started.title))
    }

    async fn finish_competition(
        &self,
        ctx: &Context,
        command: &CommandInteraction,
        kind: CompetitionKind,
    ) -> CoreResult<String> {
        let result = self.services.competitions.finish_competition(kind).await?;
        let channel = result
            .competition
            .thread_ref
            .and_then(snowflake_ref)
            .map(ChannelId::new)
            .unwrap_or(command.channel_id);

        let message = CreateMessage::new()
            .content(&result.headline)
            .embed(build_embed(&result.payload))
            .allowed_mentions(CreateAllowedMentions::new().users(winner_mentions(&result.winners)));
        if let Err(e) = channel.send_message(&ctx.http, message).await {
            warn!(channel = %channel, error = %e, "failed to announce winners");
            return Ok(result.headline);
        }
        Ok(format!(
            "Announced {} winner(s) in <#{channel}>.",
            result.winners.len()
        ))
    }

    async fn handle_component(&self, ctx: &Context, component: &ComponentInteraction) {
        let Some((action, data)) = interactions::route_component(&component.data.custom_id)
        else {
            warn!(custom_id = %component.data.custom_id, "unknown component action");
            return;
        };
        let user_id = snowflake(component.user.id.get());

        match action {
            ComponentAction::ConfirmLink | ComponentAction::CancelLink => {
                if let Err(e) = component.defer(&ctx.http).await {
                    warn!(error = %e, "failed to acknowledge link button");
                    return;
                }
                let content = if action == ComponentAction::CancelLink {
                    format!("Account linking cancelled for '{data}'.")
                } else {
                    match self.services.accounts.link_account(user_id, data).await {
                        Ok(link) => self.after_link(ctx, component, &link.account_name).await,
                        Err(err) => failure_text("confirm-rsn", &err),
                    }
                };
                let edit = EditInteractionResponse::new()
                    .content(content)
                    .components(Vec::new());
                if let Err(e) = component.edit_response(&ctx.http, edit).await {
                    warn!(error = %e, "failed to update link prompt");
                }
            }
            _ => {
                if let Err(e) = component.defer_ephemeral(&ctx.http).await {
                    warn!(error = %e, "failed to defer component");
                    return;
                }
                let content = match self.run_component(ctx, action, data, user_id).await {
                    Ok(content) => content,
                    Err(err) => failure_text(&component.data.custom_id, &err),
                };
                if let Err(e) = component
                    .edit_response(&ctx.http, EditInteractionResponse::new().content(content))
                    .await
                {
                    warn!(error = %e, "failed to edit component response");
                }
            }
        }
    }

    /// Sets the member's nickname to the linked name. Failure only changes the
    /// confirmation text.
    async fn after_link(
        &self,
        ctx: &Context,
        component: &ComponentInteraction,
        account_name: &str,
    ) -> String {
        let mut content = format!("Successfully linked your account to **{account_name}**!");
        let Some(guild_id) = component.guild_id else {
            return content;
        };
        match guild_id
            .edit_member(&ctx.http, component.user.id, EditMember::new().nickname(account_name))
            .await
        {
            Ok(_) => content.push_str("\nYour nickname has been updated to match."),
            Err(e) => {
                warn!(
                    guild_id = %guild_id,
                    user = %component.user.id,
                    error = %e,
                    "failed to update nickname"
                );
                content.push_str("\nI couldn't update your nickname, so please set it yourself.");
            }
        }
        content
    }

    async fn run_component(
        &self,
        ctx: &Context,
        action: ComponentAction,
        data: &str,
        user_id: i64,
    ) -> CoreResult<String> {
        let services = &self.services;
        match action {
            ComponentAction::RegisterCompetition(_) => {
                let (external_id, thread_ref) = parse_register_data(data)
                    .ok_or_else(|| CoreError::Validation(INVALID_BUTTON.to_string()))?;
                let receipt = services
                    .competitions
                    .register_participant(external_id, user_id)
                    .await?;
                let confirmation = receipt.confirmation();
                if let Some(thread) = thread_ref.and_then(snowflake_ref) {
                    let message = CreateMessage::new().content(&confirmation);
                    if let Err(e) = ChannelId::new(thread).send_message(&ctx.http, message).await {
                        warn!(external_id, error = %e, "failed to post registration in thread");
                    }
                }
                Ok(confirmation)
            }
            ComponentAction::ListCompetition(_) => {
                let external_id = data
                    .trim()
                    .parse()
                    .map_err(|_| CoreError::Validation(INVALID_BUTTON.to_string()))?;
                let standings = services.competitions.list_participants(external_id).await?;
                Ok(render_participants(&standings))
            }
            ComponentAction::ParticipateEvent(_) => {
                let registration = services.registry.register_for_event(data, user_id).await?;
                Ok(registration.confirmation())
            }
            ComponentAction::ListEvent(_) => {
                let (event, participants) = services.registry.list_participants(data).await?;
                Ok(render_event_participants(&event, &participants))
            }
            ComponentAction::ConfirmLink | ComponentAction::CancelLink => Ok(String::new()),
        }
    }

    async fn handle_modal(&self, ctx: &Context, modal: &ModalInteraction) {
        if modal.data.custom_id != LINK_MODAL_ID {
            warn!(custom_id = %modal.data.custom_id, "unknown modal");
            return;
        }
        let name = modal
            .data
            .components
            .iter()
            .flat_map(|row| row.components.iter())
            .find_map(|component| match component {
                ActionRowComponent::InputText(input) if input.custom_id == LINK_INPUT_ID => {
                    input.value.clone()
                }
                _ => None,
            })
            .unwrap_or_default();

        if let Err(e) = modal.defer_ephemeral(&ctx.http).await {
            warn!(error = %e, "failed to defer link modal");
            return;
        }

        let edit = match lookup_account(self.services.tracker.as_ref(), &name).await {
            Ok(account) => {
                let controls = [
                    InteractiveControl::new(
                        "confirm-rsn",
                        &account.display_name,
                        "That's me!",
                        ControlStyle::Success,
                    ),
                    InteractiveControl::new(
                        "cancel-rsn",
                        &account.display_name,
                        "Not me",
                        ControlStyle::Danger,
                    ),
                ];
                EditInteractionResponse::new()
                    .content(format!(
                        "Found **{}** on Wise Old Man with {} total XP. Is this your account?",
                        account.display_name,
                        format_number(account.exp)
                    ))
                    .components(build_buttons(&controls))
            }
            Err(err) => EditInteractionResponse::new().content(failure_text("link-rsn", &err)),
        };
        if let Err(e) = modal.edit_response(&ctx.http, edit).await {
            warn!(error = %e, "failed to answer link modal");
        }
    }

    async fn handle_autocomplete(&self, ctx: &Context, command: &CommandInteraction) {
        let Some(focused) = command.data.autocomplete() else {
            return;
        };
        let choices: Vec<(String, String)> = match focused.name {
            "timezone" => search_timezones(focused.value)
                .into_iter()
                .map(|tz| (tz.to_string(), tz.to_string()))
                .collect(),
            "boss" => commands::search_bosses(focused.value)
                .into_iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
            _ => Vec::new(),
        };
        let response = choices
            .into_iter()
            .fold(CreateAutocompleteResponse::new(), |response, (name, value)| {
                response.add_string_choice(name, value)
            });
        if let Err(e) = command
            .create_response(&ctx.http, CreateInteractionResponse::Autocomplete(response))
            .await
        {
            debug!(error = %e, "failed to answer autocomplete");
        }
    }
}

#[serenity::async_trait]
impl EventHandler for BotHandler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!(user = %ready.user.name, id = %ready.user.id, "discord gateway ready");
        self.register_commands(&ctx).await;
        if let Some(sender) = self.ready_sender.lock().await.take() {
            let _ = sender.send(());
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::Command(command) => self.handle_command(&ctx, &command).await,
            Interaction::Component(component) => self.handle_component(&ctx, &component).await,
            Interaction::Modal(modal) => self.handle_modal(&ctx, &modal).await,
            Interaction::Autocomplete(command) => self.handle_autocomplete(&ctx, &command).await,
            _ => {}
        }
    }
}
