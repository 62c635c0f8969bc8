//! Boss of the Week / Skill of the Week competitions mirrored on Wise Old Man.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{error, info, warn};

use crate::accounts::AccountLinkManager;
use crate::calendar::{
    COLOR_BOTW, COLOR_INFO, COLOR_SOTW, CalendarService, Notification, RichPayload,
};
use crate::db::{
    CompetitionKind, CompetitionStatus, CompetitionStore, NewCompetition, SettingsStore,
    TrackedCompetition,
};
use crate::error::{CoreError, CoreResult, PartialSuccessWarning};
use crate::tracker::{Progress, Standing, Standings, TrackingService};

pub mod ranking;

const COMPETITION_URL: &str = "https://wiseoldman.net/competitions";
const MEDALS: [&str; 3] = ["🥇", "🥈", "🥉"];

/// Turns a tracker metric such as `corporeal_beast` into `Corporeal Beast`.
pub fn format_activity_name(metric: &str) -> String {
    metric
        .split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn competition_title(kind: CompetitionKind, metric: &str) -> String {
    format!("{} - {}", kind.display_name(), format_activity_name(metric))
}

pub fn competition_url(external_id: i64) -> String {
    format!("{COMPETITION_URL}/{external_id}")
}

/// Formats with thousands separators, e.g. `1,234,567`.
pub fn format_number(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[derive(Debug, Clone)]
pub struct StartedCompetition {
    pub competition: TrackedCompetition,
    pub title: String,
}

impl StartedCompetition {
    /// Opening message for the competition thread.
    pub fn announcement(&self) -> String {
        format!(
            "**{}** event has started!\n\n🔗 [View on Wise Old Man]({})\n\nClick the Register button in the channel to join!",
            self.title,
            competition_url(self.competition.external_competition_id)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationReceipt {
    pub account_name: String,
    pub activity: String,
    /// Passed through unchanged from the tracking service.
    pub message: String,
}

impl RegistrationReceipt {
    pub fn confirmation(&self) -> String {
        format!(
            "Registered **{}** for **{}**! {}",
            self.account_name, self.activity, self.message
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Winner {
    pub rank: usize,
    pub account_name: String,
    pub display_name: String,
    pub progress: Progress,
    /// Discord member owning the account, when a link exists.
    pub platform_identity: Option<i64>,
}

impl Winner {
    fn mention(&self) -> String {
        match self.platform_identity {
            Some(id) => format!("<@{id}>"),
            None => format!("**{}**", self.display_name),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompetitionResult {
    pub competition: TrackedCompetition,
    pub winners: Vec<Winner>,
    /// First-place announcement.
    pub headline: String,
    pub payload: RichPayload,
}

fn winners_payload(kind: CompetitionKind, metric: &str, winners: &[Winner]) -> RichPayload {
    let (title, color) = match kind {
        CompetitionKind::BossOfTheWeek => ("🏆 Boss of the Week - Winners", COLOR_BOTW),
        CompetitionKind::SkillOfTheWeek => ("📚 Skill of the Week - Winners", COLOR_SOTW),
    };
    let fields = winners
        .iter()
        .zip(MEDALS)
        .map(|(winner, medal)| {
            (
                format!("{medal} {}", winner.display_name),
                format!(
                    "Progress: **{} {}**\nStart: {} | End: {}",
                    format_number(winner.progress.gained),
                    kind.unit(),
                    format_number(winner.progress.start),
                    format_number(winner.progress.end)
                ),
            )
        })
        .collect();

    RichPayload {
        title: title.to_string(),
        description: format!(
            "**{}** has concluded!\n\nHere are the top performers:",
            format_activity_name(metric)
        ),
        fields,
        color: Some(color),
    }
}

/// Text listing of the current standings, in service order.
pub fn render_participants(standings: &Standings) -> String {
    if standings.participations.is_empty() {
        return "No participants yet! Be the first to register!".to_string();
    }
    let mut out = format!("**Participants for {}:**\n", standings.title);
    for (i, standing) in standings.participations.iter().enumerate() {
        out.push_str(&format!(
            "\n{}. {} - {} gained",
            i + 1,
            standing.display_name,
            format_number(standing.progress.gained)
        ));
    }
    out
}

#[derive(Clone)]
pub struct CompetitionLifecycleCoordinator {
    competitions: Arc<dyn CompetitionStore>,
    accounts: AccountLinkManager,
    tracker: Arc<dyn TrackingService>,
    calendar: Arc<dyn CalendarService>,
    settings: Arc<dyn SettingsStore>,
}

impl CompetitionLifecycleCoordinator {
    pub fn new(
        competitions: Arc<dyn CompetitionStore>,
        accounts: AccountLinkManager,
        tracker: Arc<dyn TrackingService>,
        calendar: Arc<dyn CalendarService>,
        settings: Arc<dyn SettingsStore>,
    ) -> Self {
        Self {
            competitions,
            accounts,
            tracker,
            calendar,
            settings,
        }
    }

    /// Creates a week-long competition on the tracking service, starting one
    /// minute from now, then records it locally.
    pub async fn start_competition(
        &self,
        kind: CompetitionKind,
        metric: &str,
        thread_ref: Option<i64>,
    ) -> CoreResult<StartedCompetition> {
        let metric = metric.trim();
        if metric.is_empty() {
            return Err(CoreError::Validation("An activity is required.".to_string()));
        }
        let title = competition_title(kind, metric);
        let starts_at = Utc::now() + Duration::minutes(1);
        let ends_at = starts_at + Duration::days(7);

        let created = self
            .tracker
            .create_competition(&title, metric, starts_at, ends_at)
            .await
            .inspect_err(|e| {
                error!(kind = %kind, metric, error = %e, "failed to create competition")
            })?;

        let record = NewCompetition {
            external_competition_id: created.external_id,
            verification_secret: created.verification_secret,
            thread_ref,
            metric: metric.to_string(),
            kind,
        };
        let competition = match self.competitions.create_competition(&record).await {
            Ok(competition) => competition,
            Err(e) => {
                PartialSuccessWarning {
                    operation: "start_competition",
                    external_ref: created.external_id.to_string(),
                    cause: &e,
                }
                .log();
                return Err(e.into());
            }
        };

        info!(
            kind = %kind,
            metric,
            external_id = competition.external_competition_id,
            "competition started"
        );
        Ok(StartedCompetition { competition, title })
    }

    /// Posts the verification code to the guild's code channel, if one is
    /// configured. Returns whether a message was sent.
    pub async fn announce_verification_code(
        &self,
        guild_id: i64,
        started: &StartedCompetition,
    ) -> bool {
        let channel = match self.settings.get_guild_config(guild_id).await {
            Ok(config) => config.and_then(|c| c.competition_code_channel_id),
            Err(e) => {
                warn!(guild_id, error = %e, "failed to read competition code channel");
                None
            }
        };
        let Some(channel_ref) = channel else {
            return false;
        };

        let external_id = started.competition.external_competition_id;
        let notification = Notification {
            channel_ref,
            content: String::new(),
            payload: Some(RichPayload {
                title: "🔑 Competition Verification Code".to_string(),
                description: format!("Verification code for **{}**", started.title),
                fields: vec![
                    (
                        "Code".to_string(),
                        format!("`{}`", started.competition.verification_secret),
                    ),
                    ("Competition".to_string(), competition_url(external_id)),
                ],
                color: Some(COLOR_INFO),
            }),
            controls: Vec::new(),
        };
        match self.calendar.post_notification(&notification).await {
            Ok(()) => true,
            Err(e) => {
                warn!(guild_id, external_id, error = %e, "failed to post verification code");
                false
            }
        }
    }

    pub async fn register_participant(
        &self,
        external_id: i64,
        identity: i64,
    ) -> CoreResult<RegistrationReceipt> {
        let competition = self
            .competitions
            .get_by_external_id(external_id)
            .await?
            .ok_or(CoreError::CompetitionNotFound(external_id))?;
        let link = self.accounts.active_link(identity).await?;

        if let Err(e) = self.tracker.refresh_account(&link.account_name).await {
            warn!(
                account = %link.account_name,
                error = %e,
                "account refresh failed, registering anyway"
            );
        }

        let result = self
            .tracker
            .add_participants(
                external_id,
                std::slice::from_ref(&link.account_name),
                &competition.verification_secret,
            )
            .await
            .inspect_err(|e| {
                error!(
                    external_id,
                    account = %link.account_name,
                    error = %e,
                    "failed to add participant"
                )
            })?;

        info!(
            external_id,
            identity,
            account = %link.account_name,
            "registered competition participant"
        );
        Ok(RegistrationReceipt {
            account_name: link.account_name,
            activity: format_activity_name(&competition.metric),
            message: result.message,
        })
    }

    /// Current standings of a tracked competition in the service's order.
    pub async fn list_participants(&self, external_id: i64) -> CoreResult<Standings> {
        self.competitions
            .get_by_external_id(external_id)
            .await?
            .ok_or(CoreError::CompetitionNotFound(external_id))?;
        Ok(self.tracker.get_standings(external_id).await?)
    }

    /// Closes the newest open competition of `kind` and picks its winners.
    ///
    /// The competition stays open when standings cannot be fetched. Once they
    /// were read it is finished, even when nobody placed.
    pub async fn finish_competition(&self, kind: CompetitionKind) -> CoreResult<CompetitionResult> {
        let mut competition = self
            .competitions
            .latest_open_by_kind(kind)
            .await?
            .ok_or(CoreError::NoActiveCompetition(kind))?;
        let external_id = competition.external_competition_id;

        let standings = self
            .tracker
            .get_standings(external_id)
            .await
            .inspect_err(|e| error!(external_id, error = %e, "failed to fetch standings"))?;

        let finished_at = Utc::now();
        if !self
            .competitions
            .mark_finished(competition.id, finished_at)
            .await?
        {
            return Err(CoreError::NoActiveCompetition(kind));
        }
        competition.status = CompetitionStatus::Finished;
        competition.finished_at = Some(finished_at);

        if standings.participations.is_empty() {
            info!(external_id, "competition finished without participants");
            return Err(CoreError::NoParticipants);
        }
        let podium = ranking::podium(standings.participations);
        if podium.is_empty() {
            info!(external_id, "competition finished without progress");
            return Err(CoreError::NoProgress);
        }

        let mut winners = Vec::with_capacity(podium.len());
        for (i, standing) in podium.into_iter().enumerate() {
            let Standing { account_name, display_name, progress } = standing;
            let platform_identity = self.accounts.identity_for_account(&account_name).await;
            winners.push(Winner {
                rank: i + 1,
                account_name,
                display_name,
                progress,
                platform_identity,
            });
        }

        let first = &winners[0];
        let headline = format!(
            "Winner of this week's {} is {} with **{} {}**! Congratulations!",
            kind.display_name(),
            first.mention(),
            format_number(first.progress.gained),
            kind.unit()
        );
        let payload = winners_payload(kind, &competition.metric, &winners);

        info!(external_id, winner = %first.display_name, "competition finished");
        Ok(CompetitionResult {
            competition,
            winners,
            headline,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;
    use tempfile::NamedTempFile;
    use test_case::test_case;

    use super::*;
    use crate::calendar::fake::FakeCalendar;
    use crate::config::DatabaseConfig;
    use crate::db::{DatabaseManager, GuildConfig};
    use crate::tracker::fake::FakeTracker;

    struct Harness {
        coordinator: CompetitionLifecycleCoordinator,
        tracker: Arc<FakeTracker>,
        calendar: Arc<FakeCalendar>,
        accounts: AccountLinkManager,
        manager: DatabaseManager,
    }

    async fn harness(file: &NamedTempFile) -> Harness {
        let config = DatabaseConfig {
            filename: Some(file.path().to_string_lossy().to_string()),
            ..Default::default()
        };
        let manager = DatabaseManager::new(&config).await.expect("db manager");
        manager.migrate().await.expect("migrate");

        let tracker = Arc::new(FakeTracker::with_accounts(&["Zezima", "Woox", "Lynx Titan"]));
        let calendar = Arc::new(FakeCalendar::default());
        let accounts = AccountLinkManager::new(manager.account_link_store());
        let coordinator = CompetitionLifecycleCoordinator::new(
            manager.competition_store(),
            accounts.clone(),
            tracker.clone(),
            calendar.clone(),
            manager.settings_store(),
        );
        Harness {
            coordinator,
            tracker,
            calendar,
            accounts,
            manager,
        }
    }

    fn standing(name: &str, start: i64, gained: i64) -> Standing {
        Standing {
            account_name: name.to_lowercase(),
            display_name: name.to_string(),
            progress: Progress {
                start,
                end: start + gained,
                gained,
            },
        }
    }

    fn set_standings(tracker: &FakeTracker, external_id: i64, entries: Vec<Standing>) {
        tracker.standings.lock().insert(
            external_id,
            Standings {
                title: "Boss of the Week - Nex".to_string(),
                metric: "nex".to_string(),
                participations: entries,
            },
        );
    }

    #[test_case("corporeal_beast", "Corporeal Beast")]
    #[test_case("nex", "Nex")]
    #[test_case("theatre_of_blood_hard_mode", "Theatre Of Blood Hard Mode")]
    fn activity_names(metric: &str, expected: &str) {
        assert_eq!(format_activity_name(metric), expected);
    }

    #[test_case(0, "0")]
    #[test_case(999, "999")]
    #[test_case(1000, "1,000")]
    #[test_case(13034431, "13,034,431")]
    #[test_case(-2500, "-2,500")]
    fn numbers(n: i64, expected: &str) {
        assert_eq!(format_number(n), expected);
    }

    #[tokio::test]
    async fn start_creates_week_long_window_and_persists() {
        let file = NamedTempFile::new().expect("temp sqlite file");
        let h = harness(&file).await;

        let before = Utc::now();
        let started = h
            .coordinator
            .start_competition(CompetitionKind::BossOfTheWeek, "corporeal_beast", Some(55))
            .await
            .expect("start");

        assert_eq!(started.title, "Boss of the Week - Corporeal Beast");
        assert_eq!(started.competition.status, CompetitionStatus::Open);
        assert_eq!(started.competition.thread_ref, Some(55));
        assert!(started.announcement().contains("https://wiseoldman.net/competitions/1001"));

        let calls = h.tracker.created.lock().clone();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].starts_at > before);
        assert!(calls[0].starts_at <= Utc::now() + Duration::minutes(1));
        assert_eq!(calls[0].ends_at - calls[0].starts_at, Duration::days(7));

        let stored = h
            .manager
            .competition_store()
            .get_by_external_id(1001)
            .await
            .expect("query")
            .expect("persisted");
        assert_eq!(stored.verification_secret, "secret-1");
    }

    #[tokio::test]
    async fn failed_external_create_persists_nothing() {
        let file = NamedTempFile::new().expect("temp sqlite file");
        let h = harness(&file).await;
        *h.tracker.fail_create.lock() = true;

        let err = h
            .coordinator
            .start_competition(CompetitionKind::SkillOfTheWeek, "woodcutting", None)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert!(
            h.manager
                .competition_store()
                .latest_open_by_kind(CompetitionKind::SkillOfTheWeek)
                .await
                .expect("query")
                .is_none()
        );
    }

    #[tokio::test]
    async fn local_write_failure_after_external_create_is_reported() {
        let file = NamedTempFile::new().expect("temp sqlite file");
        let h = harness(&file).await;
        h.coordinator
            .start_competition(CompetitionKind::BossOfTheWeek, "nex", None)
            .await
            .expect("first start");

        // The tracker hands out 1001 again, which the local table already holds.
        *h.tracker.next_id.lock() = 0;
        let err = h
            .coordinator
            .start_competition(CompetitionKind::SkillOfTheWeek, "woodcutting", None)
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::Persistence(_)));
        assert!(err.is_retryable());
        assert_eq!(h.tracker.created.lock().len(), 2);
        assert!(
            h.manager
                .competition_store()
                .latest_open_by_kind(CompetitionKind::SkillOfTheWeek)
                .await
                .expect("query")
                .is_none()
        );
    }

    #[tokio::test]
    async fn registration_uses_stored_secret_and_tolerates_refresh_failure() {
        let file = NamedTempFile::new().expect("temp sqlite file");
        let h = harness(&file).await;
        h.coordinator
            .start_competition(CompetitionKind::SkillOfTheWeek, "woodcutting", None)
            .await
            .expect("start");

        assert!(matches!(
            h.coordinator.register_participant(1001, 7).await,
            Err(CoreError::NotLinked)
        ));
        assert!(matches!(
            h.coordinator.register_participant(4242, 7).await,
            Err(CoreError::CompetitionNotFound(4242))
        ));

        h.accounts.link_account(7, "Woox").await.expect("link");
        *h.tracker.fail_refresh.lock() = true;
        let receipt = h
            .coordinator
            .register_participant(1001, 7)
            .await
            .expect("register");

        assert_eq!(receipt.activity, "Woodcutting");
        assert_eq!(
            receipt.confirmation(),
            "Registered **Woox** for **Woodcutting**! Successfully added 1 participants."
        );
        let added = h.tracker.added.lock().clone();
        assert_eq!(added, vec![(1001, vec!["Woox".to_string()], "secret-1".to_string())]);
    }

    #[tokio::test]
    async fn finish_without_open_competition() {
        let file = NamedTempFile::new().expect("temp sqlite file");
        let h = harness(&file).await;
        assert!(matches!(
            h.coordinator.finish_competition(CompetitionKind::BossOfTheWeek).await,
            Err(CoreError::NoActiveCompetition(CompetitionKind::BossOfTheWeek))
        ));
    }

    #[tokio::test]
    async fn finish_ranks_podium_and_mentions_linked_members() {
        let file = NamedTempFile::new().expect("temp sqlite file");
        let h = harness(&file).await;
        h.coordinator
            .start_competition(CompetitionKind::BossOfTheWeek, "nex", Some(9))
            .await
            .expect("start");
        h.accounts.link_account(501, "Woox").await.expect("link");
        set_standings(
            &h.tracker,
            1001,
            vec![
                standing("Zezima", 10, 4),
                standing("Woox", 100, 1250),
                standing("Idle", 3, 0),
                standing("Lynx Titan", 50, 4),
                standing("Late", 1, 2),
            ],
        );

        let result = h
            .coordinator
            .finish_competition(CompetitionKind::BossOfTheWeek)
            .await
            .expect("finish");

        let names: Vec<_> = result.winners.iter().map(|w| w.display_name.as_str()).collect();
        assert_eq!(names, vec!["Woox", "Zezima", "Lynx Titan"]);
        assert_eq!(result.winners[0].platform_identity, Some(501));
        assert_eq!(result.winners[1].platform_identity, None);
        assert_eq!(
            result.headline,
            "Winner of this week's Boss of the Week is <@501> with **1,250 KC**! Congratulations!"
        );
        assert_eq!(result.payload.title, "🏆 Boss of the Week - Winners");
        assert_eq!(result.payload.fields[0].0, "🥇 Woox");
        assert_eq!(
            result.payload.fields[0].1,
            "Progress: **1,250 KC**\nStart: 100 | End: 1,350"
        );
        assert_eq!(result.competition.status, CompetitionStatus::Finished);
        assert_eq!(result.competition.thread_ref, Some(9));

        assert!(matches!(
            h.coordinator.finish_competition(CompetitionKind::BossOfTheWeek).await,
            Err(CoreError::NoActiveCompetition(_))
        ));
    }

    #[tokio::test]
    async fn finish_with_no_progress_has_no_winners() {
        let file = NamedTempFile::new().expect("temp sqlite file");
        let h = harness(&file).await;
        h.coordinator
            .start_competition(CompetitionKind::SkillOfTheWeek, "fishing", None)
            .await
            .expect("start");
        set_standings(
            &h.tracker,
            1001,
            vec![standing("Zezima", 10, 0), standing("Woox", 5, 0)],
        );

        assert!(matches!(
            h.coordinator.finish_competition(CompetitionKind::SkillOfTheWeek).await,
            Err(CoreError::NoProgress)
        ));
    }

    #[tokio::test]
    async fn finish_with_empty_standings_closes_competition() {
        let file = NamedTempFile::new().expect("temp sqlite file");
        let h = harness(&file).await;
        h.coordinator
            .start_competition(CompetitionKind::SkillOfTheWeek, "fishing", None)
            .await
            .expect("start");
        set_standings(&h.tracker, 1001, Vec::new());

        assert!(matches!(
            h.coordinator.finish_competition(CompetitionKind::SkillOfTheWeek).await,
            Err(CoreError::NoParticipants)
        ));
        let stored = h
            .manager
            .competition_store()
            .get_by_external_id(1001)
            .await
            .expect("query")
            .expect("row");
        assert_eq!(stored.status, CompetitionStatus::Finished);
    }

    #[tokio::test]
    async fn standings_failure_keeps_competition_open() {
        let file = NamedTempFile::new().expect("temp sqlite file");
        let h = harness(&file).await;
        h.coordinator
            .start_competition(CompetitionKind::SkillOfTheWeek, "mining", None)
            .await
            .expect("start");
        set_standings(&h.tracker, 1001, vec![standing("Zezima", 0, 300)]);

        *h.tracker.fail_standings.lock() = true;
        let err = h
            .coordinator
            .finish_competition(CompetitionKind::SkillOfTheWeek)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::External(_)));

        *h.tracker.fail_standings.lock() = false;
        let result = h
            .coordinator
            .finish_competition(CompetitionKind::SkillOfTheWeek)
            .await
            .expect("finish after recovery");
        assert_eq!(result.winners.len(), 1);
        assert!(result.headline.contains("**300 XP**"));
    }

    #[tokio::test]
    async fn verification_code_goes_to_configured_channel() {
        let file = NamedTempFile::new().expect("temp sqlite file");
        let h = harness(&file).await;
        let started = h
            .coordinator
            .start_competition(CompetitionKind::BossOfTheWeek, "vorkath", None)
            .await
            .expect("start");

        assert!(!h.coordinator.announce_verification_code(3, &started).await);
        assert!(h.calendar.notifications.lock().is_empty());

        let mut config = GuildConfig::empty(3);
        config.competition_code_channel_id = Some(808);
        h.manager
            .settings_store()
            .upsert_guild_config(&config)
            .await
            .expect("config");

        assert!(h.coordinator.announce_verification_code(3, &started).await);
        let sent = h.calendar.notifications.lock().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].channel_ref, 808);
        let payload = sent[0].payload.as_ref().expect("payload");
        assert_eq!(payload.fields[0].1, "`secret-1`");
        assert_eq!(payload.fields[1].1, "https://wiseoldman.net/competitions/1001");
    }

    #[tokio::test]
    async fn participants_are_listed_in_service_order() {
        let file = NamedTempFile::new().expect("temp sqlite file");
        let h = harness(&file).await;
        h.coordinator
            .start_competition(CompetitionKind::BossOfTheWeek, "nex", None)
            .await
            .expect("start");
        set_standings(&h.tracker, 1001, Vec::new());
        let standings = h.coordinator.list_participants(1001).await.expect("list");
        assert_eq!(
            render_participants(&standings),
            "No participants yet! Be the first to register!"
        );

        set_standings(
            &h.tracker,
            1001,
            vec![standing("Zezima", 0, 5), standing("Woox", 0, 1500)],
        );
        let standings = h.coordinator.list_participants(1001).await.expect("list");
        assert_eq!(
            render_participants(&standings),
            "**Participants for Boss of the Week - Nex:**\n\n1. Zezima - 5 gained\n2. Woox - 1,500 gained"
        );
    }
}
