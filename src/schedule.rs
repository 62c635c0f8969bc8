//! Mass events and Wildy Wednesdays published as Discord scheduled events.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{error, info, warn};

use crate::calendar::{
    COLOR_MASS, COLOR_WILDY, CalendarService, ControlStyle, ExternalEventRequest,
    InteractiveControl, Notification, RichPayload,
};
use crate::db::{EventKind, EventStore, NewScheduledEvent, ScheduledEvent, SettingsStore};
use crate::error::{CoreError, CoreResult, PartialSuccessWarning};
use crate::timezone::{
    TimezoneResolver, format_for_discord, format_for_discord_relative, format_with_timezone,
    parse_local_datetime,
};

pub mod participants;

pub use self::participants::{ParticipantRegistry, render_event_participants};

/// Discord rejects scheduled events longer than this.
const MAX_DURATION_MINUTES: i64 = 7 * 24 * 60;

impl EventKind {
    /// Component action prefixes used by the notification buttons.
    pub fn participate_action(&self) -> &'static str {
        match self {
            EventKind::Mass => "participate-mass",
            EventKind::WildyWednesday => "participate-wildy",
        }
    }

    pub fn list_action(&self) -> &'static str {
        match self {
            EventKind::Mass => "list-participants-mass",
            EventKind::WildyWednesday => "list-participants-wildy",
        }
    }

    fn external_name(&self, activity: &str) -> String {
        match self {
            EventKind::Mass => format!("Mass: {activity}"),
            EventKind::WildyWednesday => format!("Wildy Wednesday: {activity}"),
        }
    }

    fn external_description(&self, location: &str) -> String {
        match self {
            EventKind::Mass => format!(
                "Join us for a mass event at {location}!\n\nClick 'Interested' to RSVP and get a reminder before the event starts."
            ),
            EventKind::WildyWednesday => format!(
                "Wildy Wednesday at {location}! Bring only what you are willing to lose.\n\nClick 'Interested' to RSVP and get a reminder before the event starts."
            ),
        }
    }
}

/// Input of the `/mass` command.
#[derive(Debug, Clone)]
pub struct EventRequest {
    pub activity: String,
    pub location: String,
    /// `YYYY-MM-DD HH:MM` in the effective timezone.
    pub local_time: String,
    pub duration_minutes: i64,
    pub timezone: Option<String>,
    pub guild_id: i64,
    pub user_id: i64,
}

#[derive(Debug, Clone)]
pub struct ScheduledOutcome {
    pub kind: EventKind,
    pub external_event_ref: String,
    pub activity: String,
    pub location: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub timezone: String,
    /// `None` when the local record could not be written.
    pub record: Option<ScheduledEvent>,
    pub payload: RichPayload,
}

fn event_payload(
    kind: EventKind,
    activity: &str,
    location: &str,
    start: DateTime<Utc>,
    timezone: &str,
) -> RichPayload {
    let (title, color) = match kind {
        EventKind::Mass => ("⚔️ Mass Event", COLOR_MASS),
        EventKind::WildyWednesday => ("💀 Wildy Wednesday", COLOR_WILDY),
    };
    RichPayload {
        title: title.to_string(),
        description: format!("Join us for **{activity}**!"),
        fields: vec![
            ("Location".to_string(), location.to_string()),
            ("Time".to_string(), format_for_discord(start)),
            ("Countdown".to_string(), format_for_discord_relative(start)),
            (
                "Scheduled as".to_string(),
                format_with_timezone(start, timezone),
            ),
        ],
        color: Some(color),
    }
}

/// Reply for `/events`.
pub fn render_upcoming_events(events: &[ScheduledEvent]) -> String {
    if events.is_empty() {
        return "No events are scheduled right now.".to_string();
    }
    let mut out = "**Upcoming events:**\n".to_string();
    for event in events {
        let label = match event.kind {
            EventKind::Mass => "Mass",
            EventKind::WildyWednesday => "Wildy Wednesday",
        };
        out.push_str(&format!(
            "\n{label}: **{}** at {}, {} ({})",
            event.activity,
            event.location,
            format_for_discord(event.scheduled_at),
            format_for_discord_relative(event.scheduled_at)
        ));
    }
    out
}

#[derive(Clone)]
pub struct ScheduledEventScheduler {
    events: Arc<dyn EventStore>,
    calendar: Arc<dyn CalendarService>,
    settings: Arc<dyn SettingsStore>,
    timezones: TimezoneResolver,
}

impl ScheduledEventScheduler {
    pub fn new(
        events: Arc<dyn EventStore>,
        calendar: Arc<dyn CalendarService>,
        settings: Arc<dyn SettingsStore>,
        timezones: TimezoneResolver,
    ) -> Self {
        Self {
            events,
            calendar,
            settings,
            timezones,
        }
    }

    pub async fn schedule_mass_event(
        &self,
        request: &EventRequest,
    ) -> CoreResult<ScheduledOutcome> {
        self.schedule_event(EventKind::Mass, request).await
    }

    /// Publishes the event to Discord first, then records it locally. A local
    /// write failure after the Discord event exists is logged and tolerated.
    pub async fn schedule_event(
        &self,
        kind: EventKind,
        request: &EventRequest,
    ) -> CoreResult<ScheduledOutcome> {
        let activity = request.activity.trim();
        let location = request.location.trim();
        if activity.is_empty() || location.is_empty() {
            return Err(CoreError::Validation(
                "Both an activity and a location are required.".to_string(),
            ));
        }
        if !(1..=MAX_DURATION_MINUTES).contains(&request.duration_minutes) {
            return Err(CoreError::Validation(format!(
                "Duration must be between 1 and {MAX_DURATION_MINUTES} minutes."
            )));
        }

        let timezone = self
            .timezones
            .resolve(
                Some(request.guild_id),
                request.user_id,
                request.timezone.as_deref(),
            )
            .await;
        let start = parse_local_datetime(&request.local_time, &timezone).map_err(|e| match e {
            CoreError::InvalidFormat(detail) => CoreError::InvalidTime(detail),
            other => other,
        })?;
        if start <= Utc::now() {
            return Err(CoreError::PastTime);
        }
        let end = start + Duration::minutes(request.duration_minutes);

        let external_request = ExternalEventRequest {
            guild_id: request.guild_id,
            name: kind.external_name(activity),
            description: kind.external_description(location),
            start,
            end,
            location: location.to_string(),
        };
        let external_event_ref = self
            .calendar
            .create_external_event(&external_request)
            .await
            .inspect_err(|e| {
                error!(guild_id = request.guild_id, error = %e, "failed to create scheduled event")
            })?;

        let record = NewScheduledEvent {
            kind,
            activity: activity.to_string(),
            location: location.to_string(),
            scheduled_at: start,
            timezone: timezone.clone(),
            external_event_ref: external_event_ref.clone(),
        };
        let record = match self.events.create_event(&record).await {
            Ok(event) => Some(event),
            Err(e) => {
                PartialSuccessWarning {
                    operation: "schedule_event",
                    external_ref: external_event_ref.clone(),
                    cause: &e,
                }
                .log();
                None
            }
        };

        info!(
            kind = kind.as_str(),
            event = %external_event_ref,
            start = %start,
            timezone = %timezone,
            "scheduled event"
        );

        let outcome = ScheduledOutcome {
            kind,
            payload: event_payload(kind, activity, location, start, &timezone),
            external_event_ref,
            activity: activity.to_string(),
            location: location.to_string(),
            start,
            end,
            timezone,
            record,
        };
        self.notify(request.guild_id, &outcome).await;
        Ok(outcome)
    }

    /// Posts the event to the guild's notification channel when one is set.
    async fn notify(&self, guild_id: i64, outcome: &ScheduledOutcome) {
        let config = match self.settings.get_guild_config(guild_id).await {
            Ok(config) => config,
            Err(e) => {
                warn!(guild_id, error = %e, "failed to read event notification settings");
                return;
            }
        };
        let Some(config) = config else {
            return;
        };
        let Some(channel_ref) = config.event_notification_channel_id else {
            return;
        };

        let content = match config.event_notification_role_id {
            Some(role) => format!("<@&{role}> A new event has been scheduled!"),
            None => "A new event has been scheduled!".to_string(),
        };
        let notification = Notification {
            channel_ref,
            content,
            payload: Some(outcome.payload.clone()),
            controls: vec![
                InteractiveControl::new(
                    outcome.kind.participate_action(),
                    &outcome.external_event_ref,
                    "Participate",
                    ControlStyle::Success,
                ),
                InteractiveControl::new(
                    outcome.kind.list_action(),
                    &outcome.external_event_ref,
                    "List Participants",
                    ControlStyle::Secondary,
                ),
            ],
        };
        if let Err(e) = self.calendar.post_notification(&notification).await {
            warn!(
                guild_id,
                event = %outcome.external_event_ref,
                error = %e,
                "failed to post event notification"
            );
        }
    }

    /// Persisted events starting after `now`, soonest first.
    pub async fn upcoming_events(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> CoreResult<Vec<ScheduledEvent>> {
        Ok(self.events.list_upcoming(now, limit).await?)
    }
}
