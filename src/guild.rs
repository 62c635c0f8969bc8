use std::sync::Arc;

use tracing::info;

use crate::db::{GuildConfig, SettingsStore};
use crate::error::CoreResult;
use crate::timezone::validate_timezone;

/// Name of the role treated as coordinator when nothing is configured.
pub const DEFAULT_COORDINATOR_ROLE: &str = "Coordinator";

/// Picks the role allowed to run competitions and events: the guild's
/// configured role, then the process-wide fallback, then a role named
/// `Coordinator`.
pub fn resolve_coordinator_role(
    config: Option<&GuildConfig>,
    fallback: Option<i64>,
    guild_roles: &[(i64, String)],
) -> Option<i64> {
    config
        .and_then(|c| c.coordinator_role_id)
        .or(fallback)
        .or_else(|| {
            guild_roles
                .iter()
                .find(|(_, name)| name.eq_ignore_ascii_case(DEFAULT_COORDINATOR_ROLE))
                .map(|(id, _)| *id)
        })
}

pub fn is_coordinator(member_roles: &[i64], role: Option<i64>) -> bool {
    role.is_some_and(|role| member_roles.contains(&role))
}

#[derive(Clone)]
pub struct GuildSettings {
    settings: Arc<dyn SettingsStore>,
}

impl GuildSettings {
    pub fn new(settings: Arc<dyn SettingsStore>) -> Self {
        Self { settings }
    }

    pub async fn get_config(&self, guild_id: i64) -> CoreResult<Option<GuildConfig>> {
        Ok(self.settings.get_guild_config(guild_id).await?)
    }

    async fn update(
        &self,
        guild_id: i64,
        apply: impl FnOnce(&mut GuildConfig),
    ) -> CoreResult<GuildConfig> {
        let mut config = self
            .settings
            .get_guild_config(guild_id)
            .await?
            .unwrap_or_else(|| GuildConfig::empty(guild_id));
        apply(&mut config);
        self.settings.upsert_guild_config(&config).await?;
        Ok(config)
    }

    pub async fn set_coordinator_role(
        &self,
        guild_id: i64,
        role_id: i64,
    ) -> CoreResult<GuildConfig> {
        info!(guild_id, role_id, "setting coordinator role");
        self.update(guild_id, |c| c.coordinator_role_id = Some(role_id))
            .await
    }

    pub async fn set_competition_code_channel(
        &self,
        guild_id: i64,
        channel_id: i64,
    ) -> CoreResult<GuildConfig> {
        info!(guild_id, channel_id, "setting competition code channel");
        self.update(guild_id, |c| c.competition_code_channel_id = Some(channel_id))
            .await
    }

    pub async fn set_event_notification_channel(
        &self,
        guild_id: i64,
        channel_id: i64,
    ) -> CoreResult<GuildConfig> {
        info!(guild_id, channel_id, "setting event notification channel");
        self.update(guild_id, |c| c.event_notification_channel_id = Some(channel_id))
            .await
    }

    pub async fn set_event_notification_role(
        &self,
        guild_id: i64,
        role_id: i64,
    ) -> CoreResult<GuildConfig> {
        info!(guild_id, role_id, "setting event notification role");
        self.update(guild_id, |c| c.event_notification_role_id = Some(role_id))
            .await
    }

    pub async fn set_default_timezone(
        &self,
        guild_id: i64,
        label: &str,
    ) -> CoreResult<GuildConfig> {
        let tz = validate_timezone(label)?;
        info!(guild_id, timezone = %tz, "setting guild default timezone");
        self.update(guild_id, |c| c.default_timezone = Some(tz.name().to_string()))
            .await
    }

    /// Stores a member's own timezone, which takes precedence over the guild
    /// default.
    pub async fn set_user_timezone(&self, user_id: i64, label: &str) -> CoreResult<String> {
        let tz = validate_timezone(label)?;
        self.settings.set_user_timezone(user_id, tz.name()).await?;
        info!(user_id, timezone = %tz, "stored user timezone");
        Ok(tz.name().to_string())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::NamedTempFile;
    use test_case::test_case;

    use super::*;
    use crate::config::DatabaseConfig;
    use crate::db::DatabaseManager;
    use crate::error::CoreError;

    async fn settings(file: &NamedTempFile) -> (GuildSettings, Arc<dyn SettingsStore>) {
        let config = DatabaseConfig {
            filename: Some(file.path().to_string_lossy().to_string()),
            ..Default::default()
        };
        let manager = DatabaseManager::new(&config).await.expect("db manager");
        manager.migrate().await.expect("migrate");
        let store = manager.settings_store();
        (GuildSettings::new(store.clone()), store)
    }

    fn roles() -> Vec<(i64, String)> {
        vec![(1, "Member".to_string()), (2, "coordinator".to_string())]
    }

    #[test_case(Some(10), Some(20), 10 ; "guild config wins")]
    #[test_case(None, Some(20), 20 ; "fallback from environment")]
    #[test_case(None, None, 2 ; "named role")]
    fn coordinator_role_precedence(configured: Option<i64>, fallback: Option<i64>, expected: i64) {
        let mut config = GuildConfig::empty(1);
        config.coordinator_role_id = configured;
        assert_eq!(
            resolve_coordinator_role(Some(&config), fallback, &roles()),
            Some(expected)
        );
    }

    #[test]
    fn no_coordinator_role_anywhere() {
        let roles = vec![(1, "Member".to_string())];
        assert_eq!(resolve_coordinator_role(None, None, &roles), None);
        assert!(!is_coordinator(&[1], None));
        assert!(is_coordinator(&[1, 5], Some(5)));
    }

    #[tokio::test]
    async fn setters_preserve_other_columns() {
        let file = NamedTempFile::new().expect("temp sqlite file");
        let (guilds, _) = settings(&file).await;

        assert!(guilds.get_config(4).await.expect("get").is_none());
        guilds.set_coordinator_role(4, 100).await.expect("role");
        guilds.set_competition_code_channel(4, 200).await.expect("code channel");
        guilds.set_event_notification_channel(4, 300).await.expect("notify channel");
        guilds.set_event_notification_role(4, 400).await.expect("notify role");
        guilds.set_default_timezone(4, "Europe/London").await.expect("tz");

        let config = guilds.get_config(4).await.expect("get").expect("row");
        assert_eq!(
            config,
            GuildConfig {
                guild_id: 4,
                coordinator_role_id: Some(100),
                default_timezone: Some("Europe/London".to_string()),
                competition_code_channel_id: Some(200),
                event_notification_channel_id: Some(300),
                event_notification_role_id: Some(400),
            }
        );
    }

    #[tokio::test]
    async fn timezones_are_validated_before_storing() {
        let file = NamedTempFile::new().expect("temp sqlite file");
        let (guilds, store) = settings(&file).await;

        assert!(matches!(
            guilds.set_default_timezone(4, "Mars/Base").await,
            Err(CoreError::InvalidTimezone(_))
        ));
        assert!(guilds.get_config(4).await.expect("get").is_none());

        assert!(matches!(
            guilds.set_user_timezone(9, "").await,
            Err(CoreError::InvalidTimezone(_))
        ));
        assert_eq!(
            guilds.set_user_timezone(9, " Asia/Tokyo ").await.expect("user tz"),
            "Asia/Tokyo"
        );
        assert_eq!(
            store.get_user_timezone(9).await.expect("get").as_deref(),
            Some("Asia/Tokyo")
        );
    }
}
