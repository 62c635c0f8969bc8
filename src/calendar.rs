//! Calendar and notification collaborator. The Discord adapter implements
//! this with guild scheduled events and channel messages.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::ExternalServiceError;

pub const COLOR_INFO: u32 = 0x3498db;
pub const COLOR_BOTW: u32 = 0x9b59b6;
pub const COLOR_SOTW: u32 = 0x1abc9c;
pub const COLOR_MASS: u32 = 0xe67e22;
pub const COLOR_WILDY: u32 = 0xc0392b;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalEventRequest {
    pub guild_id: i64,
    pub name: String,
    pub description: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub location: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlStyle {
    Secondary,
    Success,
    Danger,
}

/// A button rendered under a notification. `custom_id` uses the
/// `action:data` routing format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractiveControl {
    pub custom_id: String,
    pub label: String,
    pub style: ControlStyle,
}

impl InteractiveControl {
    pub fn new(action: &str, data: &str, label: &str, style: ControlStyle) -> Self {
        Self {
            custom_id: format!("{action}:{data}"),
            label: label.to_string(),
            style,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RichPayload {
    pub title: String,
    pub description: String,
    pub fields: Vec<(String, String)>,
    pub color: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Notification {
    pub channel_ref: i64,
    pub content: String,
    pub payload: Option<RichPayload>,
    pub controls: Vec<InteractiveControl>,
}

#[async_trait]
pub trait CalendarService: Send + Sync {
    /// Creates the externally visible event and returns its reference.
    async fn create_external_event(
        &self,
        request: &ExternalEventRequest,
    ) -> Result<String, ExternalServiceError>;
    async fn post_notification(&self, notification: &Notification)
    -> Result<(), ExternalServiceError>;
}

#[cfg(test)]
pub(crate) mod fake {
    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::{CalendarService, ExternalEventRequest, Notification};
    use crate::error::ExternalServiceError;

    #[derive(Default)]
    pub struct FakeCalendar {
        pub events: Mutex<Vec<ExternalEventRequest>>,
        pub notifications: Mutex<Vec<Notification>>,
        pub fail_create: Mutex<bool>,
        pub fail_notify: Mutex<bool>,
    }

    #[async_trait]
    impl CalendarService for FakeCalendar {
        async fn create_external_event(
            &self,
            request: &ExternalEventRequest,
        ) -> Result<String, ExternalServiceError> {
            if *self.fail_create.lock() {
                return Err(ExternalServiceError::Timeout { service: "discord" });
            }
            let mut events = self.events.lock();
            events.push(request.clone());
            Ok(format!("event-{}", events.len()))
        }

        async fn post_notification(
            &self,
            notification: &Notification,
        ) -> Result<(), ExternalServiceError> {
            if *self.fail_notify.lock() {
                return Err(ExternalServiceError::Rejected {
                    service: "discord",
                    status: 403,
                    message: "Missing Access".to_string(),
                });
            }
            self.notifications.lock().push(notification.clone());
            Ok(())
        }
    }
}
