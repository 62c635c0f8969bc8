use crate::config::{DatabaseConfig as ConfigDatabaseConfig, DbType as ConfigDbType};
use crate::db::{AccountLinkStore, CompetitionStore, DatabaseError, EventStore, SettingsStore};
use std::sync::Arc;

#[cfg(feature = "postgres")]
use crate::db::postgres::{
    PostgresAccountLinkStore, PostgresCompetitionStore, PostgresEventStore,
    PostgresSettingsStore,
};
#[cfg(feature = "postgres")]
use diesel::pg::PgConnection;
#[cfg(feature = "postgres")]
use diesel::r2d2::{self, ConnectionManager};
#[cfg(any(feature = "postgres", feature = "sqlite"))]
use diesel::RunQueryDsl;

#[cfg(feature = "postgres")]
pub type Pool = r2d2::Pool<ConnectionManager<PgConnection>>;

#[cfg(feature = "sqlite")]
use crate::db::sqlite::{
    SqliteAccountLinkStore, SqliteCompetitionStore, SqliteEventStore, SqliteSettingsStore,
    establish_connection,
};

#[cfg(feature = "postgres")]
const POSTGRES_MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS account_links (
        id BIGSERIAL PRIMARY KEY,
        platform_identity BIGINT NOT NULL,
        account_name TEXT NOT NULL,
        account_name_key TEXT NOT NULL,
        active BOOLEAN NOT NULL DEFAULT TRUE,
        created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tracked_competitions (
        id BIGSERIAL PRIMARY KEY,
        external_competition_id BIGINT NOT NULL UNIQUE,
        verification_secret TEXT NOT NULL,
        thread_ref BIGINT,
        metric TEXT NOT NULL,
        kind TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'open',
        created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
        finished_at TIMESTAMP WITH TIME ZONE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS scheduled_events (
        id BIGSERIAL PRIMARY KEY,
        kind TEXT NOT NULL,
        activity TEXT NOT NULL,
        location TEXT NOT NULL,
        scheduled_at TIMESTAMP WITH TIME ZONE NOT NULL,
        timezone TEXT NOT NULL,
        external_event_ref TEXT NOT NULL UNIQUE,
        created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS event_participations (
        id BIGSERIAL PRIMARY KEY,
        event_id BIGINT NOT NULL REFERENCES scheduled_events(id) ON DELETE CASCADE,
        account_link_id BIGINT NOT NULL REFERENCES account_links(id) ON DELETE CASCADE,
        notified BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS guild_configs (
        guild_id BIGINT PRIMARY KEY,
        coordinator_role_id BIGINT,
        default_timezone TEXT,
        competition_code_channel_id BIGINT,
        event_notification_channel_id BIGINT,
        event_notification_role_id BIGINT,
        updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_timezone_prefs (
        platform_identity BIGINT PRIMARY KEY,
        timezone TEXT NOT NULL,
        updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
    )
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_account_links_identity_name ON account_links(platform_identity, account_name_key)",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_account_links_single_active ON account_links(platform_identity) WHERE active",
    "CREATE INDEX IF NOT EXISTS idx_account_links_name_key ON account_links(account_name_key)",
    "CREATE INDEX IF NOT EXISTS idx_tracked_competitions_kind_status ON tracked_competitions(kind, status)",
    "CREATE INDEX IF NOT EXISTS idx_scheduled_events_scheduled_at ON scheduled_events(scheduled_at)",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_event_participations_event_link ON event_participations(event_id, account_link_id)",
];

#[cfg(feature = "sqlite")]
const SQLITE_MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS account_links (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        platform_identity BIGINT NOT NULL,
        account_name TEXT NOT NULL,
        account_name_key TEXT NOT NULL,
        active BOOLEAN NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tracked_competitions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        external_competition_id BIGINT NOT NULL UNIQUE,
        verification_secret TEXT NOT NULL,
        thread_ref BIGINT,
        metric TEXT NOT NULL,
        kind TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'open',
        created_at TEXT NOT NULL,
        finished_at TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS scheduled_events (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        kind TEXT NOT NULL,
        activity TEXT NOT NULL,
        location TEXT NOT NULL,
        scheduled_at TEXT NOT NULL,
        timezone TEXT NOT NULL,
        external_event_ref TEXT NOT NULL UNIQUE,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS event_participations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        event_id INTEGER NOT NULL REFERENCES scheduled_events(id) ON DELETE CASCADE,
        account_link_id INTEGER NOT NULL REFERENCES account_links(id) ON DELETE CASCADE,
        notified BOOLEAN NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS guild_configs (
        guild_id BIGINT PRIMARY KEY,
        coordinator_role_id BIGINT,
        default_timezone TEXT,
        competition_code_channel_id BIGINT,
        event_notification_channel_id BIGINT,
        event_notification_role_id BIGINT,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_timezone_prefs (
        platform_identity BIGINT PRIMARY KEY,
        timezone TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_account_links_identity_name ON account_links(platform_identity, account_name_key)",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_account_links_single_active ON account_links(platform_identity) WHERE active = 1",
    "CREATE INDEX IF NOT EXISTS idx_account_links_name_key ON account_links(account_name_key)",
    "CREATE INDEX IF NOT EXISTS idx_tracked_competitions_kind_status ON tracked_competitions(kind, status)",
    "CREATE INDEX IF NOT EXISTS idx_scheduled_events_scheduled_at ON scheduled_events(scheduled_at)",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_event_participations_event_link ON event_participations(event_id, account_link_id)",
];

#[derive(Clone)]
pub struct DatabaseManager {
    #[cfg(feature = "postgres")]
    postgres_pool: Option<Pool>,
    #[cfg(feature = "sqlite")]
    sqlite_path: Option<Arc<String>>,
    account_link_store: Arc<dyn AccountLinkStore>,
    competition_store: Arc<dyn CompetitionStore>,
    event_store: Arc<dyn EventStore>,
    settings_store: Arc<dyn SettingsStore>,
    db_type: DbType,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DbType {
    Postgres,
    Sqlite,
}

impl From<ConfigDbType> for DbType {
    fn from(value: ConfigDbType) -> Self {
        match value {
            ConfigDbType::Postgres => DbType::Postgres,
            ConfigDbType::Sqlite => DbType::Sqlite,
        }
    }
}

impl DatabaseManager {
    pub async fn new(config: &ConfigDatabaseConfig) -> Result<Self, DatabaseError> {
        let db_type = DbType::from(config.db_type());

        match db_type {
            #[cfg(feature = "postgres")]
            DbType::Postgres => {
                let manager = ConnectionManager::<PgConnection>::new(config.connection_string());
                let pool = r2d2::Pool::builder()
                    .max_size(config.max_connections().unwrap_or(10))
                    .min_idle(Some(config.min_connections().unwrap_or(1)))
                    .build(manager)
                    .map_err(|e| DatabaseError::Connection(e.to_string()))?;

                Ok(Self {
                    account_link_store: Arc::new(PostgresAccountLinkStore::new(pool.clone())),
                    competition_store: Arc::new(PostgresCompetitionStore::new(pool.clone())),
                    event_store: Arc::new(PostgresEventStore::new(pool.clone())),
                    settings_store: Arc::new(PostgresSettingsStore::new(pool.clone())),
                    postgres_pool: Some(pool),
                    #[cfg(feature = "sqlite")]
                    sqlite_path: None,
                    db_type,
                })
            }
            #[cfg(feature = "sqlite")]
            DbType::Sqlite => {
                let path = config.sqlite_path().ok_or_else(|| {
                    DatabaseError::Connection("sqlite database path is not configured".to_string())
                })?;
                if let Some(parent) = std::path::Path::new(&path).parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent)
                            .map_err(|e| DatabaseError::Connection(e.to_string()))?;
                    }
                }
                let path = Arc::new(path);

                Ok(Self {
                    #[cfg(feature = "postgres")]
                    postgres_pool: None,
                    account_link_store: Arc::new(SqliteAccountLinkStore::new(path.clone())),
                    competition_store: Arc::new(SqliteCompetitionStore::new(path.clone())),
                    event_store: Arc::new(SqliteEventStore::new(path.clone())),
                    settings_store: Arc::new(SqliteSettingsStore::new(path.clone())),
                    sqlite_path: Some(path),
                    db_type,
                })
            }
            #[cfg(not(feature = "postgres"))]
            DbType::Postgres => Err(DatabaseError::Connection(
                "PostgreSQL feature not enabled".to_string(),
            )),
            #[cfg(not(feature = "sqlite"))]
            DbType::Sqlite => Err(DatabaseError::Connection(
                "SQLite feature not enabled".to_string(),
            )),
        }
    }

    pub async fn migrate(&self) -> Result<(), DatabaseError> {
        match self.db_type {
            #[cfg(feature = "postgres")]
            DbType::Postgres => {
                let pool = self.postgres_pool.clone().ok_or_else(|| {
                    DatabaseError::Migration("postgres pool not initialised".to_string())
                })?;
                tokio::task::spawn_blocking(move || {
                    let mut conn = pool
                        .get()
                        .map_err(|e| DatabaseError::Connection(e.to_string()))?;
                    for statement in POSTGRES_MIGRATIONS {
                        diesel::sql_query(*statement)
                            .execute(&mut conn)
                            .map_err(|e| DatabaseError::Migration(e.to_string()))?;
                    }
                    Ok(())
                })
                .await
                .map_err(|e| DatabaseError::Migration(format!("migration task failed: {e}")))?
            }
            #[cfg(feature = "sqlite")]
            DbType::Sqlite => {
                let path = self.sqlite_path.clone().ok_or_else(|| {
                    DatabaseError::Migration("sqlite path not initialised".to_string())
                })?;
                tokio::task::spawn_blocking(move || {
                    let mut conn = establish_connection(&path)?;
                    diesel::sql_query("PRAGMA journal_mode = WAL")
                        .execute(&mut conn)
                        .map_err(|e| DatabaseError::Migration(e.to_string()))?;
                    for statement in SQLITE_MIGRATIONS {
                        diesel::sql_query(*statement)
                            .execute(&mut conn)
                            .map_err(|e| DatabaseError::Migration(e.to_string()))?;
                    }
                    Ok(())
                })
                .await
                .map_err(|e| DatabaseError::Migration(format!("migration task failed: {e}")))?
            }
            #[cfg(not(feature = "postgres"))]
            DbType::Postgres => Err(DatabaseError::Migration(
                "PostgreSQL feature not enabled".to_string(),
            )),
            #[cfg(not(feature = "sqlite"))]
            DbType::Sqlite => Err(DatabaseError::Migration(
                "SQLite feature not enabled".to_string(),
            )),
        }
    }

    pub fn account_link_store(&self) -> Arc<dyn AccountLinkStore> {
        self.account_link_store.clone()
    }

    pub fn competition_store(&self) -> Arc<dyn CompetitionStore> {
        self.competition_store.clone()
    }

    pub fn event_store(&self) -> Arc<dyn EventStore> {
        self.event_store.clone()
    }

    pub fn settings_store(&self) -> Arc<dyn SettingsStore> {
        self.settings_store.clone()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tempfile::NamedTempFile;

    use super::DatabaseManager;
    use crate::config::DatabaseConfig;
    use crate::db::{CompetitionKind, CompetitionStatus, NewCompetition};

    #[tokio::test]
    async fn sqlite_competition_survives_reopen_and_finishes_once() {
        let file = NamedTempFile::new().expect("temp sqlite file");
        let config = DatabaseConfig {
            filename: Some(file.path().to_string_lossy().to_string()),
            ..Default::default()
        };

        let manager = DatabaseManager::new(&config).await.expect("db manager");
        manager.migrate().await.expect("migrate");

        let created = manager
            .competition_store()
            .create_competition(&NewCompetition {
                external_competition_id: 4242,
                verification_secret: "123-456-789".to_string(),
                thread_ref: Some(99),
                metric: "vorkath".to_string(),
                kind: CompetitionKind::BossOfTheWeek,
            })
            .await
            .expect("create competition");
        assert_eq!(created.status, CompetitionStatus::Open);

        let reopened = DatabaseManager::new(&config).await.expect("db manager reopened");
        reopened.migrate().await.expect("migrate is idempotent");
        let store = reopened.competition_store();

        let latest = store
            .latest_open_by_kind(CompetitionKind::BossOfTheWeek)
            .await
            .expect("latest")
            .expect("open competition");
        assert_eq!(latest.external_competition_id, 4242);
        assert!(
            store
                .latest_open_by_kind(CompetitionKind::SkillOfTheWeek)
                .await
                .expect("latest sotw")
                .is_none()
        );

        assert!(store.mark_finished(latest.id, Utc::now()).await.expect("finish"));
        assert!(!store.mark_finished(latest.id, Utc::now()).await.expect("finish twice"));

        let finished = store
            .get_by_external_id(4242)
            .await
            .expect("get")
            .expect("row");
        assert_eq!(finished.status, CompetitionStatus::Finished);
        assert!(finished.finished_at.is_some());
        assert!(
            store
                .latest_open_by_kind(CompetitionKind::BossOfTheWeek)
                .await
                .expect("latest after finish")
                .is_none()
        );
    }
}
