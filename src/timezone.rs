use std::sync::Arc;

use chrono::{DateTime, LocalResult, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::db::SettingsStore;
use crate::error::{CoreError, CoreResult};

pub const FALLBACK_TIMEZONE: &str = "UTC";

/// Discord caps autocomplete responses at 25 choices.
const MAX_SEARCH_RESULTS: usize = 25;

const LOCAL_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M";

static LOCAL_DATETIME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2}$").expect("valid datetime pattern"));

pub const COMMON_TIMEZONES: &[&str] = &[
    "UTC",
    "America/New_York",
    "America/Chicago",
    "America/Denver",
    "America/Los_Angeles",
    "America/Toronto",
    "America/Vancouver",
    "America/Phoenix",
    "America/Anchorage",
    "America/Sao_Paulo",
    "America/Argentina/Buenos_Aires",
    "America/Mexico_City",
    "Europe/London",
    "Europe/Paris",
    "Europe/Berlin",
    "Europe/Amsterdam",
    "Europe/Madrid",
    "Europe/Rome",
    "Europe/Stockholm",
    "Europe/Moscow",
    "Europe/Athens",
    "Europe/Istanbul",
    "Asia/Tokyo",
    "Asia/Shanghai",
    "Asia/Hong_Kong",
    "Asia/Singapore",
    "Asia/Seoul",
    "Asia/Dubai",
    "Asia/Kolkata",
    "Asia/Bangkok",
    "Asia/Jakarta",
    "Asia/Manila",
    "Australia/Sydney",
    "Australia/Melbourne",
    "Australia/Brisbane",
    "Australia/Perth",
    "Pacific/Auckland",
    "Pacific/Fiji",
    "Pacific/Honolulu",
];

/// Checks `label` against the IANA database bundled with chrono-tz.
pub fn validate_timezone(label: &str) -> CoreResult<Tz> {
    let label = label.trim();
    if label.is_empty() {
        return Err(CoreError::InvalidTimezone(String::new()));
    }
    label
        .parse::<Tz>()
        .map_err(|_| CoreError::InvalidTimezone(label.to_string()))
}

/// Interprets `text` (`YYYY-MM-DD HH:MM`) as wall-clock time in `label`.
///
/// Ambiguous local times during a DST fall-back resolve to the earlier
/// instant. Times skipped by a spring-forward transition do not exist and
/// are rejected.
pub fn parse_local_datetime(text: &str, label: &str) -> CoreResult<DateTime<Utc>> {
    let text = text.trim();
    if !LOCAL_DATETIME_PATTERN.is_match(text) {
        return Err(CoreError::InvalidFormat(format!(
            "'{text}' does not match YYYY-MM-DD HH:MM"
        )));
    }
    let tz = validate_timezone(label)
        .map_err(|_| CoreError::InvalidFormat(format!("unknown timezone '{label}'")))?;
    let naive = NaiveDateTime::parse_from_str(text, LOCAL_DATETIME_FORMAT)
        .map_err(|e| CoreError::InvalidFormat(format!("'{text}': {e}")))?;

    match tz.from_local_datetime(&naive) {
        LocalResult::Single(local) => Ok(local.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest.with_timezone(&Utc)),
        LocalResult::None => Err(CoreError::InvalidFormat(format!(
            "'{text}' does not exist in {tz} (daylight saving transition)"
        ))),
    }
}

/// `<t:UNIX:F>`, rendered by Discord in the viewer's own timezone.
pub fn format_for_discord(instant: DateTime<Utc>) -> String {
    format!("<t:{}:F>", instant.timestamp())
}

/// `<t:UNIX:R>`, e.g. "in 3 hours".
pub fn format_for_discord_relative(instant: DateTime<Utc>) -> String {
    format!("<t:{}:R>", instant.timestamp())
}

/// Formats like "January 15, 2025 8:00 PM EST". Falls back to UTC without
/// an abbreviation when the label is unknown.
pub fn format_with_timezone(instant: DateTime<Utc>, label: &str) -> String {
    match label.trim().parse::<Tz>() {
        Ok(tz) => instant
            .with_timezone(&tz)
            .format("%B %-d, %Y %-I:%M %p %Z")
            .to_string(),
        Err(_) => instant.format("%B %-d, %Y %-I:%M %p").to_string(),
    }
}

/// Case-insensitive substring search over [`COMMON_TIMEZONES`].
pub fn search_timezones(query: &str) -> Vec<&'static str> {
    let query = query.trim().to_lowercase();
    COMMON_TIMEZONES
        .iter()
        .copied()
        .filter(|tz| tz.to_lowercase().contains(&query))
        .take(MAX_SEARCH_RESULTS)
        .collect()
}

#[derive(Clone)]
pub struct TimezoneResolver {
    settings: Arc<dyn SettingsStore>,
}

impl TimezoneResolver {
    pub fn new(settings: Arc<dyn SettingsStore>) -> Self {
        Self { settings }
    }

    /// Picks the effective timezone: explicit parameter, then the user's
    /// stored preference, then the guild default, then UTC. Invalid or
    /// unreadable entries fall through to the next step.
    pub async fn resolve(
        &self,
        guild_id: Option<i64>,
        user_id: i64,
        explicit: Option<&str>,
    ) -> String {
        if let Some(label) = explicit.map(str::trim).filter(|l| !l.is_empty()) {
            if validate_timezone(label).is_ok() {
                return label.to_string();
            }
            debug!(timezone = label, "ignoring invalid explicit timezone");
        }

        match self.settings.get_user_timezone(user_id).await {
            Ok(Some(label)) if validate_timezone(&label).is_ok() => return label,
            Ok(_) => {}
            Err(e) => warn!(user_id, error = %e, "failed to read user timezone preference"),
        }

        if let Some(guild_id) = guild_id {
            match self.settings.get_guild_config(guild_id).await {
                Ok(Some(config)) => {
                    if let Some(label) = config
                        .default_timezone
                        .filter(|label| validate_timezone(label).is_ok())
                    {
                        return label;
                    }
                }
                Ok(None) => {}
                Err(e) => warn!(guild_id, error = %e, "failed to read guild default timezone"),
            }
        }

        FALLBACK_TIMEZONE.to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use tempfile::NamedTempFile;
    use test_case::test_case;

    use super::*;
    use crate::config::DatabaseConfig;
    use crate::db::{DatabaseManager, GuildConfig};

    async fn resolver(file: &NamedTempFile) -> (TimezoneResolver, Arc<dyn SettingsStore>) {
        let config = DatabaseConfig {
            filename: Some(file.path().to_string_lossy().to_string()),
            ..Default::default()
        };
        let manager = DatabaseManager::new(&config).await.expect("db manager");
        manager.migrate().await.expect("migrate");
        let settings = manager.settings_store();
        (TimezoneResolver::new(settings.clone()), settings)
    }

    #[test_case("America/New_York" ; "americas")]
    #[test_case("Europe/London" ; "europe")]
    #[test_case("UTC" ; "utc")]
    fn valid_zones(label: &str) {
        assert!(validate_timezone(label).is_ok());
    }

    #[test_case("" ; "empty")]
    #[test_case("Mars/Olympus_Mons" ; "unknown")]
    #[test_case("EST5EDT nonsense" ; "garbage")]
    fn invalid_zones(label: &str) {
        assert!(matches!(validate_timezone(label), Err(CoreError::InvalidTimezone(_))));
    }

    #[test]
    fn parses_wall_clock_in_zone() {
        let instant = parse_local_datetime("2025-01-15 20:00", "America/New_York").expect("parse");
        assert_eq!(instant, Utc.with_ymd_and_hms(2025, 1, 16, 1, 0, 0).unwrap());
    }

    #[test_case("2025-01-15T20:00" ; "iso separator")]
    #[test_case("2025-1-15 20:00" ; "short month")]
    #[test_case("2025-01-15 20:00:00" ; "seconds")]
    #[test_case("2025-13-01 10:00" ; "bad month")]
    #[test_case("tomorrow" ; "words")]
    fn rejects_malformed_text(text: &str) {
        assert!(matches!(
            parse_local_datetime(text, "UTC"),
            Err(CoreError::InvalidFormat(_))
        ));
    }

    #[test]
    fn invalid_zone_is_a_format_error() {
        assert!(matches!(
            parse_local_datetime("2025-01-15 20:00", "Nowhere/City"),
            Err(CoreError::InvalidFormat(_))
        ));
    }

    #[test]
    fn spring_forward_gap_is_rejected() {
        assert!(parse_local_datetime("2025-03-09 02:30", "America/New_York").is_err());
    }

    #[test]
    fn formats_for_display() {
        let instant = Utc.with_ymd_and_hms(2025, 1, 16, 1, 0, 0).unwrap();
        assert_eq!(format_for_discord(instant), "<t:1736989200:F>");
        assert_eq!(format_for_discord_relative(instant), "<t:1736989200:R>");
        assert_eq!(
            format_with_timezone(instant, "America/New_York"),
            "January 15, 2025 8:00 PM EST"
        );
    }

    #[test]
    fn search_is_case_insensitive_and_capped() {
        assert_eq!(search_timezones("tokyo"), vec!["Asia/Tokyo"]);
        assert_eq!(search_timezones("").len(), 25);
        assert!(search_timezones("zzz").is_empty());
    }

    #[tokio::test]
    async fn resolution_precedence() {
        let file = NamedTempFile::new().expect("temp sqlite file");
        let (resolver, settings) = resolver(&file).await;

        assert_eq!(resolver.resolve(Some(1), 2, None).await, "UTC");

        let mut guild = GuildConfig::empty(1);
        guild.default_timezone = Some("Europe/Berlin".to_string());
        settings.upsert_guild_config(&guild).await.expect("guild");
        assert_eq!(resolver.resolve(Some(1), 2, Some("")).await, "Europe/Berlin");
        assert_eq!(resolver.resolve(None, 2, None).await, "UTC");

        settings.set_user_timezone(2, "Asia/Tokyo").await.expect("user tz");
        assert_eq!(resolver.resolve(Some(1), 2, Some("")).await, "Asia/Tokyo");
        assert_eq!(resolver.resolve(Some(1), 2, Some("Not/AZone")).await, "Asia/Tokyo");

        assert_eq!(
            resolver.resolve(Some(1), 2, Some("America/New_York")).await,
            "America/New_York"
        );
    }
}
