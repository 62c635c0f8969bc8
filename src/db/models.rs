use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Binding between a Discord member and an Old School RuneScape account name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountLink {
    pub id: i64,
    pub platform_identity: i64,
    pub account_name: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What a successful link transaction did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    Created(AccountLink),
    Reactivated(AccountLink),
    /// The exact pair was already active; nothing was written.
    AlreadyActive(AccountLink),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompetitionKind {
    BossOfTheWeek,
    SkillOfTheWeek,
}

impl CompetitionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompetitionKind::BossOfTheWeek => "BOSS_OF_THE_WEEK",
            CompetitionKind::SkillOfTheWeek => "SKILL_OF_THE_WEEK",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            CompetitionKind::BossOfTheWeek => "Boss of the Week",
            CompetitionKind::SkillOfTheWeek => "Skill of the Week",
        }
    }

    /// Unit used when announcing progress.
    pub fn unit(&self) -> &'static str {
        match self {
            CompetitionKind::BossOfTheWeek => "KC",
            CompetitionKind::SkillOfTheWeek => "XP",
        }
    }
}

impl fmt::Display for CompetitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompetitionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BOSS_OF_THE_WEEK" => Ok(CompetitionKind::BossOfTheWeek),
            "SKILL_OF_THE_WEEK" => Ok(CompetitionKind::SkillOfTheWeek),
            other => Err(format!("unknown competition kind: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompetitionStatus {
    Open,
    Finished,
}

impl CompetitionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompetitionStatus::Open => "open",
            CompetitionStatus::Finished => "finished",
        }
    }
}

impl FromStr for CompetitionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(CompetitionStatus::Open),
            "finished" => Ok(CompetitionStatus::Finished),
            other => Err(format!("unknown competition status: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedCompetition {
    pub id: i64,
    pub external_competition_id: i64,
    pub verification_secret: String,
    pub thread_ref: Option<i64>,
    pub metric: String,
    pub kind: CompetitionKind,
    pub status: CompetitionStatus,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewCompetition {
    pub external_competition_id: i64,
    pub verification_secret: String,
    pub thread_ref: Option<i64>,
    pub metric: String,
    pub kind: CompetitionKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Mass,
    WildyWednesday,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Mass => "MASS",
            EventKind::WildyWednesday => "WILDY_WEDNESDAY",
        }
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MASS" => Ok(EventKind::Mass),
            "WILDY_WEDNESDAY" => Ok(EventKind::WildyWednesday),
            other => Err(format!("unknown event kind: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledEvent {
    pub id: i64,
    pub kind: EventKind,
    pub activity: String,
    pub location: String,
    pub scheduled_at: DateTime<Utc>,
    pub timezone: String,
    pub external_event_ref: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewScheduledEvent {
    pub kind: EventKind,
    pub activity: String,
    pub location: String,
    pub scheduled_at: DateTime<Utc>,
    pub timezone: String,
    pub external_event_ref: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventParticipation {
    pub id: i64,
    pub event_id: i64,
    pub account_link_id: i64,
    pub notified: bool,
    pub created_at: DateTime<Utc>,
}

/// A participation row joined with the linked account name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventParticipant {
    pub participation: EventParticipation,
    pub account_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    Registered(EventParticipation),
    AlreadyRegistered,
}

/// Per-guild settings. Every field is optional; unset values fall through to
/// process defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildConfig {
    pub guild_id: i64,
    pub coordinator_role_id: Option<i64>,
    pub default_timezone: Option<String>,
    pub competition_code_channel_id: Option<i64>,
    pub event_notification_channel_id: Option<i64>,
    pub event_notification_role_id: Option<i64>,
}

impl GuildConfig {
    pub fn empty(guild_id: i64) -> Self {
        Self {
            guild_id,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CompetitionKind, CompetitionStatus, EventKind};
    use test_case::test_case;

    #[test_case(CompetitionKind::BossOfTheWeek, "BOSS_OF_THE_WEEK")]
    #[test_case(CompetitionKind::SkillOfTheWeek, "SKILL_OF_THE_WEEK")]
    fn competition_kind_text(kind: CompetitionKind, text: &str) {
        assert_eq!(kind.as_str(), text);
        assert_eq!(text.parse::<CompetitionKind>().ok(), Some(kind));
    }

    #[test]
    fn units_follow_kind() {
        assert_eq!(CompetitionKind::BossOfTheWeek.unit(), "KC");
        assert_eq!(CompetitionKind::SkillOfTheWeek.unit(), "XP");
    }

    #[test]
    fn unknown_values_are_rejected() {
        assert!("WEEKLY".parse::<CompetitionKind>().is_err());
        assert!("closed".parse::<CompetitionStatus>().is_err());
        assert!("PARTY".parse::<EventKind>().is_err());
    }
}
