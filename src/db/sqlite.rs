use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use std::sync::Arc;

use crate::db::schema_sqlite::{
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

// Fixed-width UTC text so that string comparison matches chronological order.
fn datetime_to_string(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn string_to_datetime(s: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::Query(format!("invalid datetime format: {}", e)))
}

pub(crate) fn establish_connection(path: &str) -> Result<SqliteConnection, DatabaseError> {
    let mut conn =
        SqliteConnection::establish(path).map_err(|e| DatabaseError::Connection(e.to_string()))?;
    diesel::sql_query("PRAGMA busy_timeout = 5000")
        .execute(&mut conn)
        .map_err(|e| DatabaseError::Connection(e.to_string()))?;
    diesel::sql_query("PRAGMA foreign_keys = ON")
        .execute(&mut conn)
        .map_err(|e| DatabaseError::Connection(e.to_string()))?;
    Ok(conn)
}

async fn with_connection<T, F>(db_path: Arc<String>, operation: F) -> Result<T, DatabaseError>
where
    T: Send + 'static,
    F: FnOnce(&mut SqliteConnection) -> Result<T, DatabaseError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut conn = establish_connection(&db_path)?;
        operation(&mut conn)
    })
    .await
    .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = account_links)]
struct DbAccountLink {
    id: i32,
    platform_identity: i64,
    account_name: String,
    active: bool,
    created_at: String,
    updated_at: String,
}

impl DbAccountLink {
    fn to_account_link(&self) -> Result<AccountLink, DatabaseError> {
        Ok(AccountLink {
            id: self.id as i64,
            platform_identity: self.platform_identity,
            account_name: self.account_name.clone(),
            active: self.active,
            created_at: string_to_datetime(&self.created_at)?,
            updated_at: string_to_datetime(&self.updated_at)?,
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = account_links)]
struct NewAccountLink<'a> {
    platform_identity: i64,
    account_name: &'a str,
    account_name_key: &'a str,
    active: bool,
    created_at: String,
    updated_at: String,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = tracked_competitions)]
struct DbTrackedCompetition {
    id: i32,
    external_competition_id: i64,
    verification_secret: String,
    thread_ref: Option<i64>,
    metric: String,
    kind: String,
    status: String,
    created_at: String,
    finished_at: Option<String>,
}

impl DbTrackedCompetition {
    fn to_competition(&self) -> Result<TrackedCompetition, DatabaseError> {
        Ok(TrackedCompetition {
            id: self.id as i64,
            external_competition_id: self.external_competition_id,
            verification_secret: self.verification_secret.clone(),
            thread_ref: self.thread_ref,
            metric: self.metric.clone(),
            kind: self.kind.parse().map_err(DatabaseError::Query)?,
            status: self.status.parse().map_err(DatabaseError::Query)?,
            created_at: string_to_datetime(&self.created_at)?,
            finished_at: self
                .finished_at
                .as_deref()
                .map(string_to_datetime)
                .transpose()?,
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
    created_at: String,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = scheduled_events)]
struct DbScheduledEvent {
    id: i32,
    kind: String,
    activity: String,
    location: String,
    scheduled_at: String,
    timezone: String,
    external_event_ref: String,
    created_at: String,
}

impl DbScheduledEvent {
    fn to_event(&self) -> Result<ScheduledEvent, DatabaseError> {
        Ok(ScheduledEvent {
            id: self.id as i64,
            kind: self.kind.parse().map_err(DatabaseError::Query)?,
            activity: self.activity.clone(),
            location: self.location.clone(),
            scheduled_at: string_to_datetime(&self.scheduled_at)?,
            timezone: self.timezone.clone(),
            external_event_ref: self.external_event_ref.clone(),
            created_at: string_to_datetime(&self.created_at)?,
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = scheduled_events)]
struct NewDbScheduledEvent<'a> {
    kind: &'a str,
    activity: &'a str,
    location: &'a str,
    scheduled_at: String,
    timezone: &'a str,
    external_event_ref: &'a str,
    created_at: String,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = event_participations)]
struct DbEventParticipation {
    id: i32,
    event_id: i32,
    account_link_id: i32,
    notified: bool,
    created_at: String,
}

impl DbEventParticipation {
    fn to_participation(&self) -> Result<EventParticipation, DatabaseError> {
        Ok(EventParticipation {
            id: self.id as i64,
            event_id: self.event_id as i64,
            account_link_id: self.account_link_id as i64,
            notified: self.notified,
            created_at: string_to_datetime(&self.created_at)?,
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = event_participations)]
struct NewDbParticipation {
    event_id: i32,
    account_link_id: i32,
    notified: bool,
    created_at: String,
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
    updated_at: String,
}

pub struct SqliteAccountLinkStore {
    db_path: Arc<String>,
}

impl SqliteAccountLinkStore {
    pub fn new(db_path: Arc<String>) -> Self {
        Self { db_path }
    }
}

#[async_trait]
impl super::AccountLinkStore for SqliteAccountLinkStore {
    async fn link_account(
        &self,
        identity: i64,
        name: &str,
    ) -> Result<LinkOutcome, DatabaseError> {
        let name = name.trim().to_string();
        let key = name.to_lowercase();
        with_connection(self.db_path.clone(), move |conn| {
            conn.immediate_transaction::<_, DatabaseError, _>(|conn| {
                use crate::db::schema_sqlite::account_links::dsl::*;

                let existing = account_links
                    .filter(platform_identity.eq(identity))
                    .filter(account_name_key.eq(&key))
                    .select(DbAccountLink::as_select())
                    .first::<DbAccountLink>(conn)
                    .optional()?;

                if let Some(row) = existing.as_ref().filter(|row| row.active) {
                    return Ok(LinkOutcome::AlreadyActive(row.to_account_link()?));
                }

                let now = datetime_to_string(&Utc::now());
                diesel::update(
                    account_links
                        .filter(platform_identity.eq(identity))
                        .filter(active.eq(true)),
                )
                .set((active.eq(false), updated_at.eq(&now)))
                .execute(conn)?;

                let reactivated = match existing {
                    Some(row) => {
                        diesel::update(account_links.filter(id.eq(row.id)))
                            .set((active.eq(true), updated_at.eq(&now)))
                            .execute(conn)?;
                        true
                    }
                    None => {
                        diesel::insert_into(account_links)
                            .values(&NewAccountLink {
                                platform_identity: identity,
                                account_name: &name,
                                account_name_key: &key,
                                active: true,
                                created_at: now.clone(),
                                updated_at: now.clone(),
                            })
                            .execute(conn)?;
                        false
                    }
                };

                let link = account_links
                    .filter(platform_identity.eq(identity))
                    .filter(account_name_key.eq(&key))
                    .select(DbAccountLink::as_select())
                    .first::<DbAccountLink>(conn)?
                    .to_account_link()?;

                Ok(if reactivated {
                    LinkOutcome::Reactivated(link)
                } else {
                    LinkOutcome::Created(link)
                })
            })
        })
        .await
    }

    async fn unlink_account(&self, identity: i64) -> Result<Option<AccountLink>, DatabaseError> {
        with_connection(self.db_path.clone(), move |conn| {
            conn.immediate_transaction::<_, DatabaseError, _>(|conn| {
                use crate::db::schema_sqlite::account_links::dsl::*;

                let Some(row) = account_links
                    .filter(platform_identity.eq(identity))
                    .filter(active.eq(true))
                    .select(DbAccountLink::as_select())
                    .first::<DbAccountLink>(conn)
                    .optional()?
                else {
                    return Ok(None);
                };

                let now = Utc::now();
                diesel::update(account_links.filter(id.eq(row.id)))
                    .set((active.eq(false), updated_at.eq(datetime_to_string(&now))))
                    .execute(conn)?;

                let mut link = row.to_account_link()?;
                link.active = false;
                link.updated_at = now;
                Ok(Some(link))
            })
        })
        .await
    }

    async fn get_active_link(&self, identity: i64) -> Result<Option<AccountLink>, DatabaseError> {
        with_connection(self.db_path.clone(), move |conn| {
            use crate::db::schema_sqlite::account_links::dsl::*;
            account_links
                .filter(platform_identity.eq(identity))
                .filter(active.eq(true))
                .select(DbAccountLink::as_select())
                .first::<DbAccountLink>(conn)
                .optional()?
                .map(|row| row.to_account_link())
                .transpose()
        })
        .await
    }

    async fn find_by_account_name(
        &self,
        name: &str,
    ) -> Result<Option<AccountLink>, DatabaseError> {
        let key = name.trim().to_lowercase();
        with_connection(self.db_path.clone(), move |conn| {
            use crate::db::schema_sqlite::account_links::dsl::*;
            account_links
                .filter(account_name_key.eq(key))
                .order((active.desc(), updated_at.desc()))
                .select(DbAccountLink::as_select())
                .first::<DbAccountLink>(conn)
                .optional()?
                .map(|row| row.to_account_link())
                .transpose()
        })
        .await
    }

    #[cfg(test)]
    async fn list_links(&self, identity: i64) -> Result<Vec<AccountLink>, DatabaseError> {
        with_connection(self.db_path.clone(), move |conn| {
            use crate::db::schema_sqlite::account_links::dsl::*;
            account_links
                .filter(platform_identity.eq(identity))
                .order(id.asc())
                .select(DbAccountLink::as_select())
                .load::<DbAccountLink>(conn)?
                .iter()
                .map(DbAccountLink::to_account_link)
                .collect()
        })
        .await
    }
}

pub struct SqliteCompetitionStore {
    db_path: Arc<String>,
}

impl SqliteCompetitionStore {
    pub fn new(db_path: Arc<String>) -> Self {
        Self { db_path }
    }
}

#[async_trait]
impl super::CompetitionStore for SqliteCompetitionStore {
    async fn create_competition(
        &self,
        competition: &NewCompetition,
    ) -> Result<TrackedCompetition, DatabaseError> {
        let competition = competition.clone();
        with_connection(self.db_path.clone(), move |conn| {
            use crate::db::schema_sqlite::tracked_competitions::dsl::*;
            diesel::insert_into(tracked_competitions)
                .values(&NewDbCompetition {
                    external_competition_id: competition.external_competition_id,
                    verification_secret: &competition.verification_secret,
                    thread_ref: competition.thread_ref,
                    metric: &competition.metric,
                    kind: competition.kind.as_str(),
                    status: CompetitionStatus::Open.as_str(),
                    created_at: datetime_to_string(&Utc::now()),
                })
                .execute(conn)?;

            tracked_competitions
                .filter(external_competition_id.eq(competition.external_competition_id))
                .select(DbTrackedCompetition::as_select())
                .first::<DbTrackedCompetition>(conn)?
                .to_competition()
        })
        .await
    }

    async fn get_by_external_id(
        &self,
        external_id: i64,
    ) -> Result<Option<TrackedCompetition>, DatabaseError> {
        with_connection(self.db_path.clone(), move |conn| {
            use crate::db::schema_sqlite::tracked_competitions::dsl::*;
            tracked_competitions
                .filter(external_competition_id.eq(external_id))
                .select(DbTrackedCompetition::as_select())
                .first::<DbTrackedCompetition>(conn)
                .optional()?
                .map(|row| row.to_competition())
                .transpose()
        })
        .await
    }

    async fn latest_open_by_kind(
        &self,
        competition_kind: CompetitionKind,
    ) -> Result<Option<TrackedCompetition>, DatabaseError> {
        with_connection(self.db_path.clone(), move |conn| {
            use crate::db::schema_sqlite::tracked_competitions::dsl::*;
            tracked_competitions
                .filter(kind.eq(competition_kind.as_str()))
                .filter(status.eq(CompetitionStatus::Open.as_str()))
                .order(id.desc())
                .select(DbTrackedCompetition::as_select())
                .first::<DbTrackedCompetition>(conn)
                .optional()?
                .map(|row| row.to_competition())
                .transpose()
        })
        .await
    }

    async fn mark_finished(&self, row_id: i64, at: DateTime<Utc>) -> Result<bool, DatabaseError> {
        let row_id = row_id as i32;
        with_connection(self.db_path.clone(), move |conn| {
            use crate::db::schema_sqlite::tracked_competitions::dsl::*;
            let updated = diesel::update(
                tracked_competitions
                    .filter(id.eq(row_id))
                    .filter(status.eq(CompetitionStatus::Open.as_str())),
            )
            .set((
                status.eq(CompetitionStatus::Finished.as_str()),
                finished_at.eq(Some(datetime_to_string(&at))),
            ))
            .execute(conn)?;
            Ok(updated == 1)
        })
        .await
    }
}

pub struct SqliteEventStore {
    db_path: Arc<String>,
}

impl SqliteEventStore {
    pub fn new(db_path: Arc<String>) -> Self {
        Self { db_path }
    }
}

#[async_trait]
impl super::EventStore for SqliteEventStore {
    async fn create_event(
        &self,
        event: &NewScheduledEvent,
    ) -> Result<ScheduledEvent, DatabaseError> {
        let event = event.clone();
        with_connection(self.db_path.clone(), move |conn| {
            use crate::db::schema_sqlite::scheduled_events::dsl::*;
            diesel::insert_into(scheduled_events)
                .values(&NewDbScheduledEvent {
                    kind: event.kind.as_str(),
                    activity: &event.activity,
                    location: &event.location,
                    scheduled_at: datetime_to_string(&event.scheduled_at),
                    timezone: &event.timezone,
                    external_event_ref: &event.external_event_ref,
                    created_at: datetime_to_string(&Utc::now()),
                })
                .execute(conn)?;

            scheduled_events
                .filter(external_event_ref.eq(&event.external_event_ref))
                .select(DbScheduledEvent::as_select())
                .first::<DbScheduledEvent>(conn)?
                .to_event()
        })
        .await
    }

    async fn get_by_external_ref(
        &self,
        event_ref: &str,
    ) -> Result<Option<ScheduledEvent>, DatabaseError> {
        let event_ref = event_ref.to_string();
        with_connection(self.db_path.clone(), move |conn| {
            use crate::db::schema_sqlite::scheduled_events::dsl::*;
            scheduled_events
                .filter(external_event_ref.eq(event_ref))
                .select(DbScheduledEvent::as_select())
                .first::<DbScheduledEvent>(conn)
                .optional()?
                .map(|row| row.to_event())
                .transpose()
        })
        .await
    }

    async fn list_upcoming(
        &self,
        after: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<ScheduledEvent>, DatabaseError> {
        with_connection(self.db_path.clone(), move |conn| {
            use crate::db::schema_sqlite::scheduled_events::dsl::*;
            scheduled_events
                .filter(scheduled_at.gt(datetime_to_string(&after)))
                .order((scheduled_at.asc(), id.asc()))
                .limit(limit)
                .select(DbScheduledEvent::as_select())
                .load::<DbScheduledEvent>(conn)?
                .iter()
                .map(DbScheduledEvent::to_event)
                .collect()
        })
        .await
    }

    async fn register_participant(
        &self,
        event: i64,
        link: i64,
    ) -> Result<RegistrationOutcome, DatabaseError> {
        let (event, link) = (event as i32, link as i32);
        with_connection(self.db_path.clone(), move |conn| {
            use crate::db::schema_sqlite::event_participations::dsl::*;

            let existing = event_participations
                .filter(event_id.eq(event))
                .filter(account_link_id.eq(link))
                .select(id)
                .first::<i32>(conn)
                .optional()?;
            if existing.is_some() {
                return Ok(RegistrationOutcome::AlreadyRegistered);
            }

            let inserted = diesel::insert_into(event_participations)
                .values(&NewDbParticipation {
                    event_id: event,
                    account_link_id: link,
                    notified: false,
                    created_at: datetime_to_string(&Utc::now()),
                })
                .execute(conn)
                .map_err(DatabaseError::from);
            match inserted {
                Ok(_) => {}
                // A concurrent registration won the race on the unique index.
                Err(DatabaseError::UniqueViolation(_)) => {
                    return Ok(RegistrationOutcome::AlreadyRegistered);
                }
                Err(e) => return Err(e),
            }

            let row = event_participations
                .filter(event_id.eq(event))
                .filter(account_link_id.eq(link))
                .select(DbEventParticipation::as_select())
                .first::<DbEventParticipation>(conn)?;
            Ok(RegistrationOutcome::Registered(row.to_participation()?))
        })
        .await
    }

    async fn list_participants(&self, event: i64) -> Result<Vec<EventParticipant>, DatabaseError> {
        let event = event as i32;
        with_connection(self.db_path.clone(), move |conn| {
            event_participations::table
                .inner_join(account_links::table)
                .filter(event_participations::event_id.eq(event))
                .order(event_participations::id.asc())
                .select((
                    DbEventParticipation::as_select(),
                    account_links::account_name,
                ))
                .load::<(DbEventParticipation, String)>(conn)?
                .into_iter()
                .map(|(row, name)| {
                    Ok(EventParticipant {
                        participation: row.to_participation()?,
                        account_name: name,
                    })
                })
                .collect()
        })
        .await
    }
}

pub struct SqliteSettingsStore {
    db_path: Arc<String>,
}

impl SqliteSettingsStore {
    pub fn new(db_path: Arc<String>) -> Self {
        Self { db_path }
    }
}

#[async_trait]
impl super::SettingsStore for SqliteSettingsStore {
    async fn get_guild_config(&self, guild: i64) -> Result<Option<GuildConfig>, DatabaseError> {
        with_connection(self.db_path.clone(), move |conn| {
            use crate::db::schema_sqlite::guild_configs::dsl::*;
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
        let config = config.clone();
        with_connection(self.db_path.clone(), move |conn| {
            use crate::db::schema_sqlite::guild_configs::dsl::*;
            let row = UpsertGuildConfig {
                guild_id: config.guild_id,
                coordinator_role_id: config.coordinator_role_id,
                default_timezone: config.default_timezone.as_deref(),
                competition_code_channel_id: config.competition_code_channel_id,
                event_notification_channel_id: config.event_notification_channel_id,
                event_notification_role_id: config.event_notification_role_id,
                updated_at: datetime_to_string(&Utc::now()),
            };
            diesel::insert_into(guild_configs)
                .values(&row)
                .on_conflict(guild_id)
                .do_update()
                .set(&row)
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn get_user_timezone(&self, identity: i64) -> Result<Option<String>, DatabaseError> {
        with_connection(self.db_path.clone(), move |conn| {
            use crate::db::schema_sqlite::user_timezone_prefs::dsl::*;
            Ok(user_timezone_prefs
                .filter(platform_identity.eq(identity))
                .select(timezone)
                .first::<String>(conn)
                .optional()?)
        })
        .await
    }

    async fn set_user_timezone(&self, identity: i64, label: &str) -> Result<(), DatabaseError> {
        let label = label.to_string();
        with_connection(self.db_path.clone(), move |conn| {
            use crate::db::schema_sqlite::user_timezone_prefs::dsl::*;
            let now = datetime_to_string(&Utc::now());
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

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use tempfile::NamedTempFile;

    use crate::config::DatabaseConfig;
    use crate::db::{
        DatabaseManager, EventKind, GuildConfig, LinkOutcome, NewScheduledEvent,
        RegistrationOutcome,
    };

    async fn manager(file: &NamedTempFile) -> DatabaseManager {
        let config = DatabaseConfig {
            filename: Some(file.path().to_string_lossy().to_string()),
            ..Default::default()
        };
        let manager = DatabaseManager::new(&config).await.expect("db manager");
        manager.migrate().await.expect("migrate");
        manager
    }

    #[tokio::test]
    async fn relinking_other_name_keeps_single_active_row() {
        let file = NamedTempFile::new().expect("temp sqlite file");
        let db = manager(&file).await;
        let links = db.account_link_store();

        let first = links.link_account(7, "Zezima").await.expect("link first");
        assert!(matches!(first, LinkOutcome::Created(_)));
        let second = links.link_account(7, "Lynx Titan").await.expect("link second");
        assert!(matches!(second, LinkOutcome::Created(_)));

        let all = links.list_links(7).await.expect("list");
        assert_eq!(all.len(), 2);
        assert_eq!(all.iter().filter(|l| l.active).count(), 1);
        let active = links.get_active_link(7).await.expect("active").expect("some");
        assert_eq!(active.account_name, "Lynx Titan");

        let back = links.link_account(7, "zezima").await.expect("relink first");
        let link = match back {
            LinkOutcome::Reactivated(link) => link,
            other => panic!("expected reactivation, got {other:?}"),
        };
        assert_eq!(link.account_name, "Zezima");
        assert_eq!(links.list_links(7).await.expect("list").len(), 2);
    }

    #[tokio::test]
    async fn linking_active_pair_writes_nothing() {
        let file = NamedTempFile::new().expect("temp sqlite file");
        let db = manager(&file).await;
        let links = db.account_link_store();

        links.link_account(1, "Woox").await.expect("link");
        let again = links.link_account(1, "WOOX").await.expect("link again");
        assert!(matches!(again, LinkOutcome::AlreadyActive(_)));
        assert_eq!(links.list_links(1).await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn unlink_deactivates_once() {
        let file = NamedTempFile::new().expect("temp sqlite file");
        let db = manager(&file).await;
        let links = db.account_link_store();

        assert!(links.unlink_account(3).await.expect("unlink").is_none());
        links.link_account(3, "B0aty").await.expect("link");
        let removed = links.unlink_account(3).await.expect("unlink").expect("row");
        assert!(!removed.active);
        assert!(links.unlink_account(3).await.expect("unlink").is_none());
        assert!(links.get_active_link(3).await.expect("active").is_none());

        let found = links.find_by_account_name("b0aty").await.expect("find");
        assert_eq!(found.map(|l| l.platform_identity), Some(3));
    }

    #[tokio::test]
    async fn participants_are_idempotent_and_ordered() {
        let file = NamedTempFile::new().expect("temp sqlite file");
        let db = manager(&file).await;
        let links = db.account_link_store();
        let events = db.event_store();

        let event = events
            .create_event(&NewScheduledEvent {
                kind: EventKind::Mass,
                activity: "Tombs of Amascut".to_string(),
                location: "W330".to_string(),
                scheduled_at: Utc::now() + Duration::days(1),
                timezone: "UTC".to_string(),
                external_event_ref: "evt-1".to_string(),
            })
            .await
            .expect("create event");

        let mut link_ids = Vec::new();
        for (identity, name) in [(10, "Alpha"), (11, "Bravo")] {
            match links.link_account(identity, name).await.expect("link") {
                LinkOutcome::Created(link) => link_ids.push(link.id),
                other => panic!("unexpected outcome {other:?}"),
            }
        }

        for link_id in &link_ids {
            let outcome = events
                .register_participant(event.id, *link_id)
                .await
                .expect("register");
            assert!(matches!(outcome, RegistrationOutcome::Registered(_)));
        }
        let again = events
            .register_participant(event.id, link_ids[0])
            .await
            .expect("register again");
        assert_eq!(again, RegistrationOutcome::AlreadyRegistered);

        let names: Vec<_> = events
            .list_participants(event.id)
            .await
            .expect("list")
            .into_iter()
            .map(|p| p.account_name)
            .collect();
        assert_eq!(names, vec!["Alpha", "Bravo"]);
    }

    #[tokio::test]
    async fn upcoming_events_skip_past_and_sort_soonest_first() {
        let file = NamedTempFile::new().expect("temp sqlite file");
        let db = manager(&file).await;
        let events = db.event_store();
        let now = Utc::now();

        for (reference, offset_hours) in [("late", 48), ("past", -2), ("soon", 3)] {
            events
                .create_event(&NewScheduledEvent {
                    kind: EventKind::Mass,
                    activity: "Nex".to_string(),
                    location: "W302".to_string(),
                    scheduled_at: now + Duration::hours(offset_hours),
                    timezone: "UTC".to_string(),
                    external_event_ref: reference.to_string(),
                })
                .await
                .expect("create");
        }

        let upcoming: Vec<_> = events
            .list_upcoming(now, 10)
            .await
            .expect("upcoming")
            .into_iter()
            .map(|e| e.external_event_ref)
            .collect();
        assert_eq!(upcoming, vec!["soon", "late"]);
    }

    #[tokio::test]
    async fn guild_config_upsert_overwrites_row() {
        let file = NamedTempFile::new().expect("temp sqlite file");
        let db = manager(&file).await;
        let settings = db.settings_store();

        assert!(settings.get_guild_config(5).await.expect("get").is_none());

        let mut config = GuildConfig::empty(5);
        config.default_timezone = Some("Europe/London".to_string());
        config.coordinator_role_id = Some(99);
        settings.upsert_guild_config(&config).await.expect("upsert");

        config.coordinator_role_id = None;
        settings.upsert_guild_config(&config).await.expect("upsert again");

        let stored = settings.get_guild_config(5).await.expect("get").expect("row");
        assert_eq!(stored.default_timezone.as_deref(), Some("Europe/London"));
        assert_eq!(stored.coordinator_role_id, None);

        settings.set_user_timezone(8, "Asia/Tokyo").await.expect("set tz");
        settings.set_user_timezone(8, "Asia/Seoul").await.expect("reset tz");
        assert_eq!(
            settings.get_user_timezone(8).await.expect("get tz").as_deref(),
            Some("Asia/Seoul")
        );
    }
}
