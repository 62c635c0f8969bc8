pub use self::error::DatabaseError;
pub use self::manager::DatabaseManager;
pub use self::models::{
    AccountLink, CompetitionKind, CompetitionStatus, EventKind, EventParticipant,
    EventParticipation, GuildConfig, LinkOutcome, NewCompetition, NewScheduledEvent,
    RegistrationOutcome, ScheduledEvent, TrackedCompetition,
};
pub use self::stores::{AccountLinkStore, CompetitionStore, EventStore, SettingsStore};

pub mod error;
pub mod manager;
pub mod models;
pub mod stores;

#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "postgres")]
pub mod schema;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "sqlite")]
pub mod schema_sqlite;
