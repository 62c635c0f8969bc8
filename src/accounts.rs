use std::sync::Arc;

use tracing::{info, warn};

use crate::db::{AccountLink, AccountLinkStore, LinkOutcome};
use crate::error::{CoreError, CoreResult, ExternalServiceError};
use crate::tracker::{PlayerAccount, TrackingService};

/// Longest display name the game allows.
pub const MAX_ACCOUNT_NAME_LEN: usize = 12;

/// Trims and checks an account name before it reaches the tracking service.
pub fn normalize_account_name(name: &str) -> CoreResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CoreError::Validation("Username cannot be empty.".to_string()));
    }
    if name.chars().count() > MAX_ACCOUNT_NAME_LEN {
        return Err(CoreError::Validation(format!(
            "Usernames are at most {MAX_ACCOUNT_NAME_LEN} characters."
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '_'))
    {
        return Err(CoreError::Validation(
            "Usernames may only contain letters, numbers, spaces, hyphens and underscores."
                .to_string(),
        ));
    }
    Ok(name.to_string())
}

/// Confirms the account exists on the tracking service. Callers run this
/// before [`AccountLinkManager::link_account`].
pub async fn lookup_account(
    tracker: &dyn TrackingService,
    name: &str,
) -> CoreResult<PlayerAccount> {
    let name = normalize_account_name(name)?;
    match tracker.get_account(&name).await {
        Ok(account) => Ok(account),
        Err(ExternalServiceError::NotFound { .. }) => Err(CoreError::AccountNotFound(name)),
        Err(e) => Err(e.into()),
    }
}

#[derive(Clone)]
pub struct AccountLinkManager {
    links: Arc<dyn AccountLinkStore>,
}

impl AccountLinkManager {
    pub fn new(links: Arc<dyn AccountLinkStore>) -> Self {
        Self { links }
    }

    /// Makes `account_name` the single active link for `identity`.
    pub async fn link_account(&self, identity: i64, account_name: &str) -> CoreResult<AccountLink> {
        let account_name = normalize_account_name(account_name)?;
        match self.links.link_account(identity, &account_name).await? {
            LinkOutcome::AlreadyActive(link) => {
                Err(CoreError::AlreadyLinkedActive(link.account_name))
            }
            LinkOutcome::Reactivated(link) => {
                info!(identity, account = %link.account_name, "reactivated account link");
                Ok(link)
            }
            LinkOutcome::Created(link) => {
                info!(identity, account = %link.account_name, "created account link");
                Ok(link)
            }
        }
    }

    pub async fn unlink_account(&self, identity: i64) -> CoreResult<AccountLink> {
        let link = self
            .links
            .unlink_account(identity)
            .await?
            .ok_or(CoreError::NotLinked)?;
        info!(identity, account = %link.account_name, "unlinked account");
        Ok(link)
    }

    pub async fn active_link(&self, identity: i64) -> CoreResult<AccountLink> {
        self.links
            .get_active_link(identity)
            .await?
            .ok_or(CoreError::NotLinked)
    }

    /// Best-effort reverse lookup. Store failures are logged and treated as
    /// "unknown".
    pub async fn identity_for_account(&self, account_name: &str) -> Option<i64> {
        match self.links.find_by_account_name(account_name).await {
            Ok(link) => link.filter(|l| l.active).map(|l| l.platform_identity),
            Err(e) => {
                warn!(account = account_name, error = %e, "reverse account lookup failed");
                None
            }
        }
    }
}
