use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::DatabaseError;
use super::models::{
    AccountLink, CompetitionKind, EventParticipant, GuildConfig, LinkOutcome, NewCompetition,
    NewScheduledEvent, RegistrationOutcome, ScheduledEvent, TrackedCompetition,
};

#[async_trait]
pub trait AccountLinkStore: Send + Sync {
    /// Binds `account_name` to `platform_identity` in a single transaction,
    /// deactivating any other active link for the identity.
    async fn link_account(
        &self,
        platform_identity: i64,
        account_name: &str,
    ) -> Result<LinkOutcome, DatabaseError>;
    /// Deactivates the active link, returning it, or `None` when there was none.
    async fn unlink_account(
        &self,
        platform_identity: i64,
    ) -> Result<Option<AccountLink>, DatabaseError>;
    async fn get_active_link(
        &self,
        platform_identity: i64,
    ) -> Result<Option<AccountLink>, DatabaseError>;
    /// Case-insensitive lookup that prefers an active link over inactive history.
    async fn find_by_account_name(
        &self,
        account_name: &str,
    ) -> Result<Option<AccountLink>, DatabaseError>;
    /// Every row for an identity, active or not, oldest first.
    #[cfg(test)]
    async fn list_links(&self, platform_identity: i64) -> Result<Vec<AccountLink>, DatabaseError>;
}

#[async_trait]
pub trait CompetitionStore: Send + Sync {
    async fn create_competition(
        &self,
        competition: &NewCompetition,
    ) -> Result<TrackedCompetition, DatabaseError>;
    async fn get_by_external_id(
        &self,
        external_competition_id: i64,
    ) -> Result<Option<TrackedCompetition>, DatabaseError>;
    async fn latest_open_by_kind(
        &self,
        kind: CompetitionKind,
    ) -> Result<Option<TrackedCompetition>, DatabaseError>;
    /// Moves an open competition to finished. Returns `false` when the row was
    /// no longer open.
    async fn mark_finished(&self, id: i64, at: DateTime<Utc>) -> Result<bool, DatabaseError>;
}

#[async_trait]
pub trait EventStore: Send + Sync {
    async fn create_event(&self, event: &NewScheduledEvent)
    -> Result<ScheduledEvent, DatabaseError>;
    async fn get_by_external_ref(
        &self,
        external_event_ref: &str,
    ) -> Result<Option<ScheduledEvent>, DatabaseError>;
    async fn list_upcoming(
        &self,
        after: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<ScheduledEvent>, DatabaseError>;
    async fn register_participant(
        &self,
        event_id: i64,
        account_link_id: i64,
    ) -> Result<RegistrationOutcome, DatabaseError>;
    /// Participants in insertion order.
    async fn list_participants(&self, event_id: i64)
    -> Result<Vec<EventParticipant>, DatabaseError>;
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get_guild_config(&self, guild_id: i64) -> Result<Option<GuildConfig>, DatabaseError>;
    async fn upsert_guild_config(&self, config: &GuildConfig) -> Result<(), DatabaseError>;
    async fn get_user_timezone(
        &self,
        platform_identity: i64,
    ) -> Result<Option<String>, DatabaseError>;
    async fn set_user_timezone(
        &self,
        platform_identity: i64,
        timezone: &str,
    ) -> Result<(), DatabaseError>;
}
