use thiserror::Error;
use tracing::warn;

use crate::db::{CompetitionKind, DatabaseError};

/// Failure talking to the tracking service or the chat platform.
#[derive(Debug, Error)]
pub enum ExternalServiceError {
    #[error("{service} did not answer in time")]
    Timeout { service: &'static str },
    #[error("{service} is unreachable: {message}")]
    Unreachable {
        service: &'static str,
        message: String,
    },
    #[error("{service} rejected the request ({status}): {message}")]
    Rejected {
        service: &'static str,
        status: u16,
        message: String,
    },
    #[error("{service} has no record of {what}")]
    NotFound { service: &'static str, what: String },
    #[error("{service} returned an unreadable response: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },
}

impl ExternalServiceError {
    pub fn from_reqwest(service: &'static str, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            ExternalServiceError::Timeout { service }
        } else if err.is_decode() {
            ExternalServiceError::Decode {
                service,
                message: err.to_string(),
            }
        } else {
            ExternalServiceError::Unreachable {
                service,
                message: err.to_string(),
            }
        }
    }

    /// Builds a rejection from an HTTP status and response body. Long bodies
    /// are cut so they stay readable in logs.
    pub fn from_status(service: &'static str, status: u16, body: &str) -> Self {
        const MAX_BODY: usize = 300;
        let message = if body.len() > MAX_BODY {
            let mut end = MAX_BODY;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}...", &body[..end])
        } else {
            body.to_string()
        };
        ExternalServiceError::Rejected {
            service,
            status,
            message,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    NotFound,
    Conflict,
    ExternalService,
    Persistence,
}

/// Errors returned by the coordinators to the command handlers.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid timezone: {0}")]
    InvalidTimezone(String),
    #[error("invalid date/time format: {0}")]
    InvalidFormat(String),
    #[error("invalid event time: {0}")]
    InvalidTime(String),
    #[error("event time is not in the future")]
    PastTime,
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("no active account link")]
    NotLinked,
    #[error("account {0} does not exist on the tracking service")]
    AccountNotFound(String),
    #[error("competition {0} is not tracked")]
    CompetitionNotFound(i64),
    #[error("event {0} is not tracked")]
    EventNotFound(String),
    #[error("no open {0} competition")]
    NoActiveCompetition(CompetitionKind),
    #[error("competition has no participants")]
    NoParticipants,
    #[error("no participant made progress")]
    NoProgress,

    #[error("account {0} is already linked")]
    AlreadyLinkedActive(String),
    #[error("already registered for this event")]
    AlreadyRegistered,

    #[error(transparent)]
    External(#[from] ExternalServiceError),
    #[error(transparent)]
    Persistence(#[from] DatabaseError),
}

impl CoreError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            CoreError::InvalidTimezone(_)
            | CoreError::InvalidFormat(_)
            | CoreError::InvalidTime(_)
            | CoreError::PastTime
            | CoreError::Validation(_) => ErrorCategory::Validation,
            CoreError::NotLinked
            | CoreError::AccountNotFound(_)
            | CoreError::CompetitionNotFound(_)
            | CoreError::EventNotFound(_)
            | CoreError::NoActiveCompetition(_)
            | CoreError::NoParticipants
            | CoreError::NoProgress => ErrorCategory::NotFound,
            CoreError::AlreadyLinkedActive(_) | CoreError::AlreadyRegistered => {
                ErrorCategory::Conflict
            }
            CoreError::External(_) => ErrorCategory::ExternalService,
            CoreError::Persistence(_) => ErrorCategory::Persistence,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::ExternalService | ErrorCategory::Persistence
        )
    }

    /// Text shown to the member who triggered the operation. External and
    /// persistence details stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            CoreError::InvalidTimezone(label) => format!(
                "'{label}' is not a valid timezone. Use an IANA name such as America/New_York or Europe/London."
            ),
            CoreError::InvalidFormat(_) | CoreError::InvalidTime(_) => {
                "Invalid date/time format. Please use YYYY-MM-DD HH:MM (e.g., 2025-01-15 20:00).".to_string()
            }
            CoreError::PastTime => "The event time must be in the future.".to_string(),
            CoreError::Validation(message) => message.clone(),
            CoreError::NotLinked => {
                "You don't have a linked RSN. Use /link-rsn to link your account first.".to_string()
            }
            CoreError::AccountNotFound(name) => format!(
                "Could not find '{name}' on Wise Old Man. Check the spelling and try again."
            ),
            CoreError::CompetitionNotFound(_) => {
                "This competition is no longer being tracked.".to_string()
            }
            CoreError::EventNotFound(_) => "This event could not be found.".to_string(),
            CoreError::NoActiveCompetition(kind) => {
                format!("There's no active {} competition ongoing!", kind.display_name())
            }
            CoreError::NoParticipants => {
                "Sadly there were no participants this time! :(".to_string()
            }
            CoreError::NoProgress => {
                "No one made any progress during this competition!".to_string()
            }
            CoreError::AlreadyLinkedActive(name) => {
                format!("'{name}' is already linked to your account.")
            }
            CoreError::AlreadyRegistered => {
                "You are already registered for this event.".to_string()
            }
            CoreError::External(_) | CoreError::Persistence(_) => {
                "Something went wrong on our side. Please try again in a moment.".to_string()
            }
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

/// An external side effect that succeeded while its local bookkeeping failed.
/// It is reported, never rolled back.
#[derive(Debug)]
pub struct PartialSuccessWarning<'a> {
    pub operation: &'static str,
    pub external_ref: String,
    pub cause: &'a DatabaseError,
}

impl PartialSuccessWarning<'_> {
    pub fn log(&self) {
        warn!(
            operation = self.operation,
            external_ref = %self.external_ref,
            error = %self.cause,
            "external side effect succeeded but local record was not persisted"
        );
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::{CoreError, ErrorCategory, ExternalServiceError};
    use crate::db::{CompetitionKind, DatabaseError};

    #[test_case(CoreError::PastTime, ErrorCategory::Validation, false)]
    #[test_case(CoreError::NotLinked, ErrorCategory::NotFound, false)]
    #[test_case(
        CoreError::NoActiveCompetition(CompetitionKind::SkillOfTheWeek),
        ErrorCategory::NotFound,
        false
    )]
    #[test_case(CoreError::AlreadyRegistered, ErrorCategory::Conflict, false)]
    #[test_case(
        CoreError::External(ExternalServiceError::Timeout { service: "wiseoldman" }),
        ErrorCategory::ExternalService,
        true
    )]
    #[test_case(
        CoreError::Persistence(DatabaseError::Conflict("busy".into())),
        ErrorCategory::Persistence,
        true
    )]
    fn classification(err: CoreError, category: ErrorCategory, retryable: bool) {
        assert_eq!(err.category(), category);
        assert_eq!(err.is_retryable(), retryable);
    }

    #[test]
    fn internal_details_are_not_leaked() {
        let err = CoreError::Persistence(DatabaseError::Query("no such table: secrets".into()));
        assert!(!err.user_message().contains("secrets"));

        let err = CoreError::External(ExternalServiceError::from_status(
            "wiseoldman",
            500,
            "stack trace here",
        ));
        assert!(!err.user_message().contains("stack trace"));
    }

    #[test]
    fn long_bodies_are_truncated() {
        let body = "x".repeat(1000);
        let ExternalServiceError::Rejected { message, status, .. } =
            ExternalServiceError::from_status("wiseoldman", 400, &body)
        else {
            panic!("expected rejection");
        };
        assert_eq!(status, 400);
        assert_eq!(message.len(), 303);
    }
}
