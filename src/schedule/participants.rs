use std::sync::Arc;

use tracing::info;

use crate::accounts::AccountLinkManager;
use crate::db::{EventParticipant, EventStore, RegistrationOutcome, ScheduledEvent};
use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone)]
pub struct EventRegistration {
    pub event: ScheduledEvent,
    pub account_name: String,
}

impl EventRegistration {
    pub fn confirmation(&self) -> String {
        format!(
            "Signed up **{}** for **{}** at {}!",
            self.account_name, self.event.activity, self.event.location
        )
    }
}

pub fn render_event_participants(
    event: &ScheduledEvent,
    participants: &[EventParticipant],
) -> String {
    if participants.is_empty() {
        return "No participants yet! Be the first to sign up!".to_string();
    }
    let mut out = format!("**Participants for {}:**\n", event.activity);
    for (i, participant) in participants.iter().enumerate() {
        out.push_str(&format!("\n{}. {}", i + 1, participant.account_name));
    }
    out
}

/// Sign-ups for scheduled events, keyed by linked account.
#[derive(Clone)]
pub struct ParticipantRegistry {
    events: Arc<dyn EventStore>,
    accounts: AccountLinkManager,
}

impl ParticipantRegistry {
    pub fn new(events: Arc<dyn EventStore>, accounts: AccountLinkManager) -> Self {
        Self { events, accounts }
    }

    async fn resolve_event(&self, external_event_ref: &str) -> CoreResult<ScheduledEvent> {
        self.events
            .get_by_external_ref(external_event_ref)
            .await?
            .ok_or_else(|| CoreError::EventNotFound(external_event_ref.to_string()))
    }

    pub async fn register_for_event(
        &self,
        external_event_ref: &str,
        identity: i64,
    ) -> CoreResult<EventRegistration> {
        let link = self.accounts.active_link(identity).await?;
        let event = self.resolve_event(external_event_ref).await?;

        match self.events.register_participant(event.id, link.id).await? {
            RegistrationOutcome::Registered(participation) => {
                info!(
                    event = external_event_ref,
                    identity,
                    participation = participation.id,
                    account = %link.account_name,
                    "registered event participant"
                );
                Ok(EventRegistration {
                    event,
                    account_name: link.account_name,
                })
            }
            RegistrationOutcome::AlreadyRegistered => Err(CoreError::AlreadyRegistered),
        }
    }

    pub async fn list_participants(
        &self,
        external_event_ref: &str,
    ) -> CoreResult<(ScheduledEvent, Vec<EventParticipant>)> {
        let event = self.resolve_event(external_event_ref).await?;
        let participants = self.events.list_participants(event.id).await?;
        Ok((event, participants))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use tempfile::NamedTempFile;

    use super::*;
    use crate::config::DatabaseConfig;
    use crate::db::{DatabaseManager, EventKind, NewScheduledEvent};

    async fn setup(
        file: &NamedTempFile,
    ) -> (ParticipantRegistry, AccountLinkManager, ScheduledEvent) {
        let config = DatabaseConfig {
            filename: Some(file.path().to_string_lossy().to_string()),
            ..Default::default()
        };
        let manager = DatabaseManager::new(&config).await.expect("db manager");
        manager.migrate().await.expect("migrate");

        let events = manager.event_store();
        let event = events
            .create_event(&NewScheduledEvent {
                kind: EventKind::Mass,
                activity: "Nex".to_string(),
                location: "World 444".to_string(),
                scheduled_at: Utc::now() + Duration::days(1),
                timezone: "UTC".to_string(),
                external_event_ref: "evt-1".to_string(),
            })
            .await
            .expect("event");
        let accounts = AccountLinkManager::new(manager.account_link_store());
        (ParticipantRegistry::new(events, accounts.clone()), accounts, event)
    }

    #[tokio::test]
    async fn second_registration_is_rejected() {
        let file = NamedTempFile::new().expect("temp sqlite file");
        let (registry, accounts, event) = setup(&file).await;
        accounts.link_account(10, "Zezima").await.expect("link");

        let first = registry.register_for_event("evt-1", 10).await.expect("first");
        assert_eq!(first.event.id, event.id);
        assert_eq!(first.confirmation(), "Signed up **Zezima** for **Nex** at World 444!");

        assert!(matches!(
            registry.register_for_event("evt-1", 10).await,
            Err(CoreError::AlreadyRegistered)
        ));
        let (_, participants) = registry.list_participants("evt-1").await.expect("list");
        assert_eq!(participants.len(), 1);
        assert!(!participants[0].participation.notified);
    }

    #[tokio::test]
    async fn registration_requires_link_and_event() {
        let file = NamedTempFile::new().expect("temp sqlite file");
        let (registry, accounts, _) = setup(&file).await;

        assert!(matches!(
            registry.register_for_event("evt-1", 11).await,
            Err(CoreError::NotLinked)
        ));
        accounts.link_account(11, "Woox").await.expect("link");
        assert!(matches!(
            registry.register_for_event("missing", 11).await,
            Err(CoreError::EventNotFound(r)) if r == "missing"
        ));
    }

    #[tokio::test]
    async fn listing_keeps_signup_order() {
        let file = NamedTempFile::new().expect("temp sqlite file");
        let (registry, accounts, _) = setup(&file).await;
        for (identity, name) in [(3, "Woox"), (1, "Zezima"), (2, "B0aty")] {
            accounts.link_account(identity, name).await.expect("link");
            registry.register_for_event("evt-1", identity).await.expect("register");
        }

        let (event, participants) = registry.list_participants("evt-1").await.expect("list");
        assert_eq!(
            render_event_participants(&event, &participants),
            "**Participants for Nex:**\n\n1. Woox\n2. Zezima\n3. B0aty"
        );
        assert_eq!(
            render_event_participants(&event, &[]),
            "No participants yet! Be the first to sign up!"
        );
    }
}
