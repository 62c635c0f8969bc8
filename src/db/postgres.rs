use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;

use crate::db::manager::Pool;
use crate::db::schema::{
    account_links, event_participations, guild_configs, scheduled_events, tracked_competitions,
};

use super::{
    DatabaseError,
    models::{
        AccountLink, CompetitionKind, CompetitionStatus, EventParticipant, EventParticipation,
        GuildConfig, LinkOutcome, NewCompetition, NewScheduledEvent, RegistrationOutcome,
        ScheduledEvent, TrackedCompetition,
    },
};

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = account_links)]
struct DbAccountLink {
    id: i64,
    platform_identity: i64,
    account_name: String,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<DbAccountLink> for AccountLink {
    fn from(value: DbAccountLink) -> Self {
        Self {
            id: value.id,
            platform_identity: value.platform_identity,
            account_name: value.account_name,
            active: value.active,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = account_links)]
struct NewAccountLink<'a> {
    platform_identity: i64,
    account_name: &'a str,
    account_name_key: &'a str,
    active: bool,
    created_at: &'a DateTime<Utc>,
    updated_at: &'a DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = tracked_competitions)]
struct DbTrackedCompetition {
    id: i64,
    external_competition_id: i64,
    verification_secret: String,
    thread_ref: Option<i64>,
    metric: String,
    kind: String,
    status: String,
    created_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl TryFrom<DbTrackedCompetition> for TrackedCompetition {
    type Error = DatabaseError;

    fn try_from(value: DbTrackedCompetition) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.id,
            external_competition_id: value.external_competition_id,
            verification_secret: value.verification_secret,
            thread_ref: value.thread_ref,
            metric: value.metric,
            kind: value.kind.parse().map_err(DatabaseError::Query)?,
            status: value.status.parse().map_err(DatabaseError::Query)?,
            created_at: value.created_at,
            finished_at: value.finished_at,
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = tracked_competitions)]
struct NewDbCompetition<'a> {
    external_competition_id: i64,
    verification_secret: &'a str,
    thread_ref: Option<i64>,
    metric: &'a str,
    kind: &'a str,
    status: &'a str,
    created_at: &'a DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = scheduled_events)]
struct DbScheduledEvent {
    id: i64,
    kind: String,
    activity: String,
    location: String,
    scheduled_at: DateTime<Utc>,
    timezone: String,
    external_event_ref: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<DbScheduledEvent> for ScheduledEvent {
    type Error = DatabaseError;

    fn try_from(value: DbScheduledEvent) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.id,
            kind: value.kind.parse().map_err(DatabaseError::Query)?,
            activity: value.activity,
            location: value.location,
            scheduled_at: value.scheduled_at,
            timezone: value.timezone,
            external_event_ref: value.external_event_ref,
            created_at: value.created_at,
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = scheduled_events)]
struct NewDbScheduledEvent<'a> {
    kind: &'a str,
    activity: &'a str,
    location: &'a str,
    scheduled_at: &'a DateTime<Utc>,
    timezone: &'a str,
    external_event_ref: &'a str,
    created_at: &'a DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = event_participations)]
struct DbEventParticipation {
    id: i64,
    event_id: i64,
    account_link_id: i64,
    notified: bool,
    created_at: DateTime<Utc>,
}

impl From<DbEventParticipation> for EventParticipation {
    fn from(value: DbEventParticipation) -> Self {
        Self {
            id: value.id,
            event_id: value.event_id,
            account_link_id: value.account_link_id,
            notified: value.notified,
            created_at: value.created_at,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = guild_configs)]
struct DbGuildConfig {
    guild_id: i64,
    coordinator_role_id: Option<i64>,
    default_timezone: Option<String>,
    competition_code_channel_id: Option<i64>,
    event_notification_channel_id: Option<i64>,
    event_notification_role_id: Option<i64>,
}

impl From<DbGuildConfig> for GuildConfig {
    fn from(value: DbGuildConfig) -> Self {
        Self {
            guild_id: value.guild_id,
            coordinator_role_id: value.coordinator_role_id,
            default_timezone: value.default_timezone,
            competition_code_channel_id: value.competition_code_channel_id,
            event_notification_channel_id: value.event_notification_channel_id,
            event_notification_role_id: value.event_notification_role_id,
        }
    }
}

#[derive(Insertable, AsChangeset)]
#[diesel(table_name = guild_configs, treat_none_as_null = true)]
struct UpsertGuildConfig<'a> {
    guild_id: i64,
    coordinator_role_id: Option<i64>,
    default_timezone: Option<&'a str>,
    competition_code_channel_id: Option<i64>,
    event_notification_channel_id: Option<i64>,
    event_notification_role_id: Option<i64>,
    updated_at: &'a DateTime<Utc>,
}

async fn with_connection<T, F>(pool: Pool, operation: F) -> Result<T, DatabaseError>
where
    T: Send + 'static,
    F: FnOnce(&mut PgConnection) -> Result<T, DatabaseError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;
        operation(&mut conn)
    })
    .await
    .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
}

pub struct PostgresAccountLinkStore {
    pool: Pool,
}

impl PostgresAccountLinkStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl super::AccountLinkStore for PostgresAccountLinkStore {
    async fn link_account(
        &self,
        identity: i64,
        name: &str,
    ) -> Result<LinkOutcome, DatabaseError> {
        let pool = self.pool.clone();
        let name = name.trim().to_string();
        let key = name.to_lowercase();
        with_connection(pool, move |conn| {
            conn.build_transaction()
                .read_committed()
                .run::<_, DatabaseError, _>(|conn| {
                    // Row lock on the identity's links serialises concurrent link calls.
                    let existing: Vec<DbAccountLink> = account_links::table
                        .filter(account_links::platform_identity.eq(identity))
                        .select(DbAccountLink::as_select())
                        .for_update()
                        .load(conn)?;

                    let matching = existing
                        .into_iter()
                        .find(|row| row.account_name.to_lowercase() == key);

                    if let Some(row) = matching.as_ref().filter(|row| row.active) {
                        return Ok(LinkOutcome::AlreadyActive(row.clone().into()));
                    }

                    let now = Utc::now();
                    diesel::update(
                        account_links::table
                            .filter(account_links::platform_identity.eq(identity))
                            .filter(account_links::active.eq(true)),
                    )
                    .set((
                        account_links::active.eq(false),
                        account_links::updated_at.eq(&now),
                    ))
                    .execute(conn)?;

                    match matching {
                        Some(row) => {
                            let link = diesel::update(
                                account_links::table.filter(account_links::id.eq(row.id)),
                            )
                            .set((
                                account_links::active.eq(true),
                                account_links::updated_at.eq(&now),
                            ))
                            .returning(DbAccountLink::as_returning())
                            .get_result(conn)?;
                            Ok(LinkOutcome::Reactivated(link.into()))
                        }
                        None => {
                            let link = diesel::insert_into(account_links::table)
                                .values(&NewAccountLink {
                                    platform_identity: identity,
                                    account_name: &name,
                                    account_name_key: &key,
                                    active: true,
                                    created_at: &now,
                                    updated_at: &now,
                                })
                                .returning(DbAccountLink::as_returning())
                                .get_result(conn)?;
                            Ok(LinkOutcome::Created(link.into()))
                        }
                    }
                })
                .map_err(|e| match e {
                    // Another link call for the same identity committed first.
                    DatabaseError::UniqueViolation(message) => DatabaseError::Conflict(message),
                    other => other,
                })
        })
        .await
    }

    async fn unlink_account(&self, identity: i64) -> Result<Option<AccountLink>, DatabaseError> {
        let pool = self.pool.clone();
        with_connection(pool, move |conn| {
            conn.build_transaction()
                .read_committed()
                .run::<_, DatabaseError, _>(|conn| {
                    let updated = diesel::update(
                        account_links::table
                            .filter(account_links::platform_identity.eq(identity))
                            .filter(account_links::active.eq(true)),
                    )
                    .set((
                        account_links::active.eq(false),
                        account_links::updated_at.eq(Utc::now()),
                    ))
                    .returning(DbAccountLink::as_returning())
                    .get_results::<DbAccountLink>(conn)?;
                    Ok(updated.into_iter().next().map(Into::into))
                })
        })
        .await
    }

    async fn get_active_link(&self, identity: i64) -> Result<Option<AccountLink>, DatabaseError> {
        let pool = self.pool.clone();
        with_connection(pool, move |conn| {
            use crate::db::schema::account_links::dsl::*;
            Ok(account_links
                .filter(platform_identity.eq(identity))
                .filter(active.eq(true))
                .select(DbAccountLink::as_select())
                .first::<DbAccountLink>(conn)
                .optional()?
                .map(Into::into))
        })
        .await
    }

    async fn find_by_account_name(
        &self,
        name: &str,
    ) -> Result<Option<AccountLink>, DatabaseError> {
        let pool = self.pool.clone();
        let key = name.trim().to_lowercase();
        with_connection(pool, move |conn| {
            use crate::db::schema::account_links::dsl::*;
            Ok(account_links
                .filter(account_name_key.eq(key))
                .order((active.desc(), updated_at.desc()))
                .select(DbAccountLink::as_select())
                .first::<DbAccountLink>(conn)
                .optional()?
                .map(Into::into))
        })
        .await
    }

    #[cfg(test)]
    async fn list_links(&self, identity: i64) -> Result<Vec<AccountLink>, DatabaseError> {
        let pool = self.pool.clone();
        with_connection(pool, move |conn| {
            use crate::db::schema::account_links::dsl::*;
            Ok(account_links
                .filter(platform_identity.eq(identity))
                .order(id.asc())
                .select(DbAccountLink::as_select())
                .load::<DbAccountLink>(conn)?
                .into_iter()
                .map(Into::into)
                .collect())
        })
        .await
    }
}

pub struct PostgresCompetitionStore {
    pool: Pool,
}

impl PostgresCompetitionStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl super::CompetitionStore for PostgresCompetitionStore {
    async fn create_competition(
        &self,
        competition: &NewCompetition,
    ) -> Result<TrackedCompetition, DatabaseError> {
        let pool = self.pool.clone();
        let competition = competition.clone();
        with_connection(pool, move |conn| {
            let now = Utc::now();
            diesel::insert_into(tracked_competitions::table)
                .values(&NewDbCompetition {
                    external_competition_id: competition.external_competition_id,
                    verification_secret: &competition.verification_secret,
                    thread_ref: competition.thread_ref,
                    metric: &competition.metric,
                    kind: competition.kind.as_str(),
                    status: CompetitionStatus::Open.as_str(),
                    created_at: &now,
                })
                .returning(DbTrackedCompetition::as_returning())
                .get_result::<DbTrackedCompetition>(conn)?
                .try_into()
        })
        .await
    }

    async fn get_by_external_id(
        &self,
        external_id: i64,
    ) -> Result<Option<TrackedCompetition>, DatabaseError> {
        let pool = self.pool.clone();
        with_connection(pool, move |conn| {
            use crate::db::schema::tracked_competitions::dsl::*;
            tracked_competitions
                .filter(external_competition_id.eq(external_id))
                .select(DbTrackedCompetition::as_select())
                .first::<DbTrackedCompetition>(conn)
                .optional()?
                .map(TryInto::try_into)
                .transpose()
        })
        .await
    }

    async fn latest_open_by_kind(
        &self,
        competition_kind: CompetitionKind,
    ) -> Result<Option<TrackedCompetition>, DatabaseError> {
        let pool = self.pool.clone();
        with_connection(pool, move |conn| {
            use crate::db::schema::tracked_competitions::dsl::*;
            tracked_competitions
                .filter(kind.eq(competition_kind.as_str()))
                .filter(status.eq(CompetitionStatus::Open.as_str()))
                .order((created_at.desc(), id.desc()))
                .select(DbTrackedCompetition::as_select())
                .first::<DbTrackedCompetition>(conn)
                .optional()?
                .map(TryInto::try_into)
                .transpose()
        })
        .await
    }

    async fn mark_finished(&self, row_id: i64, at: DateTime<Utc>) -> Result<bool, DatabaseError> {
        let pool = self.pool.clone();
        with_connection(pool, move |conn| {
            use crate::db::schema::tracked_competitions::dsl::*;
            let updated = diesel::update(
                tracked_competitions
                    .filter(id.eq(row_id))
                    .filter(status.eq(CompetitionStatus::Open.as_str())),
            )
            .set((
                status.eq(CompetitionStatus::Finished.as_str()),
                finished_at.eq(Some(at)),
            ))
            .execute(conn)?;
            Ok(updated == 1)
        })
        .await
    }
}

pub struct PostgresEventStore {
    pool: Pool,
}

impl PostgresEventStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl super::EventStore for PostgresEventStore {
    async fn create_event(
        &self,
        event: &NewScheduledEvent,
    ) -> Result<ScheduledEvent, DatabaseError> {
        let pool = self.pool.clone();
        let event = event.clone();
        with_connection(pool, move |conn| {
            let now = Utc::now();
            diesel::insert_into(scheduled_events::table)
                .values(&NewDbScheduledEvent {
                    kind: event.kind.as_str(),
                    activity: &event.activity,
                    location: &event.location,
                    scheduled_at: &event.scheduled_at,
                    timezone: &event.timezone,
                    external_event_ref: &event.external_event_ref,
                    created_at: &now,
                })
                .returning(DbScheduledEvent::as_returning())
                .get_result::<DbScheduledEvent>(conn)?
                .try_into()
        })
        .await
    }

    async fn get_by_external_ref(
        &self,
        event_ref: &str,
    ) -> Result<Option<ScheduledEvent>, DatabaseError> {
        let pool = self.pool.clone();
        let event_ref = event_ref.to_string();
        with_connection(pool, move |conn| {
            use crate::db::schema::scheduled_events::dsl::*;
            scheduled_events
                .filter(external_event_ref.eq(event_ref))
                .select(DbScheduledEvent::as_select())
                .first::<DbScheduledEvent>(conn)
                .optional()?
                .map(TryInto::try_into)
                .transpose()
        })
        .await
    }

    async fn list_upcoming(
        &self,
        after: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<ScheduledEvent>, DatabaseError> {
        let pool = self.pool.clone();
        with_connection(pool, move |conn| {
            use crate::db::schema::scheduled_events::dsl::*;
            scheduled_events
                .filter(scheduled_at.gt(after))
                .order((scheduled_at.asc(), id.asc()))
                .limit(limit)
                .select(DbScheduledEvent::as_select())
                .load::<DbScheduledEvent>(conn)?
                .into_iter()
                .map(TryInto::try_into)
                .collect()
        })
        .await
    }

    async fn register_participant(
        &self,
        event: i64,
        link: i64,
    ) -> Result<RegistrationOutcome, DatabaseError> {
        let pool = self.pool.clone();
        with_connection(pool, move |conn| {
            let inserted = diesel::insert_into(event_participations::table)
                .values((
                    event_participations::event_id.eq(event),
                    event_participations::account_link_id.eq(link),
                    event_participations::notified.eq(false),
                    event_participations::created_at.eq(Utc::now()),
                ))
                .on_conflict((
                    event_participations::event_id,
                    event_participations::account_link_id,
                ))
                .do_nothing()
                .returning(DbEventParticipation::as_returning())
                .get_result::<DbEventParticipation>(conn)
                .optional()?;

            Ok(match inserted {
                Some(row) => RegistrationOutcome::Registered(row.into()),
                None => RegistrationOutcome::AlreadyRegistered,
            })
        })
        .await
    }

    async fn list_participants(&self, event: i64) -> Result<Vec<EventParticipant>, DatabaseError> {
        let pool = self.pool.clone();
        with_connection(pool, move |conn| {
            Ok(event_participations::table
                .inner_join(account_links::table)
                .filter(event_participations::event_id.eq(event))
                .order(event_participations::id.asc())
                .select((
                    DbEventParticipation::as_select(),
                    account_links::account_name,
                ))
                .load::<(DbEventParticipation, String)>(conn)?
                .into_iter()
                .map(|(row, name)| EventParticipant {
                    participation: row.into(),
                    account_name: name,
                })
                .collect())
        })
        .await
    }
}

pub struct PostgresSettingsStore {
    pool: Pool,
}

impl PostgresSettingsStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl super::SettingsStore for PostgresSettingsStore {
    async fn get_guild_config(&self, guild: i64) -> Result<Option<GuildConfig>, DatabaseError> {
        let pool = self.pool.clone();
        with_connection(pool, move |conn| {
            use crate::db::schema::guild_configs::dsl::*;
            Ok(guild_configs
                .filter(guild_id.eq(guild))
                .select(DbGuildConfig::as_select())
                .first::<DbGuildConfig>(conn)
                .optional()?
                .map(Into::into))
        })
        .await
    }

    async fn upsert_guild_config(&self, config: &GuildConfig) -> Result<(), DatabaseError> {
        let pool = self.pool.clone();
        let config = config.clone();
        with_connection(pool, move |conn| {
            let now = Utc::now();
            let row = UpsertGuildConfig {
                guild_id: config.guild_id,
                coordinator_role_id: config.coordinator_role_id,
                default_timezone: config.default_timezone.as_deref(),
                competition_code_channel_id: config.competition_code_channel_id,
                event_notification_channel_id: config.event_notification_channel_id,
                event_notification_role_id: config.event_notification_role_id,
                updated_at: &now,
            };
            diesel::insert_into(guild_configs::table)
                .values(&row)
                .on_conflict(guild_configs::guild_id)
                .do_update()
                .set(&row)
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn get_user_timezone(&self, identity: i64) -> Result<Option<String>, DatabaseError> {
        let pool = self.pool.clone();
        with_connection(pool, move |conn| {
            use crate::db::schema::user_timezone_prefs::dsl::*;
            Ok(user_timezone_prefs
                .filter(platform_identity.eq(identity))
                .select(timezone)
                .first::<String>(conn)
                .optional()?)
        })
        .await
    }

    async fn set_user_timezone(&self, identity: i64, label: &str) -> Result<(), DatabaseError> {
        let pool = self.pool.clone();
        let label = label.to_string();
        with_connection(pool, move |conn| {
            use crate::db::schema::user_timezone_prefs::dsl::*;
            let now = Utc::now();
            diesel::insert_into(user_timezone_prefs)
                .values((
                    platform_identity.eq(identity),
                    timezone.eq(&label),
                    updated_at.eq(&now),
                ))
                .on_conflict(platform_identity)
                .do_update()
                .set((timezone.eq(&label), updated_at.eq(&now)))
                .execute(conn)?;
            Ok(())
        })
        .await
    }
}
