//! Session issue and validation.
//!
//! One live session per account: issuing a new session deletes every
//! previous row for that account in the same transaction, which is how a
//! login on a second device silently signs the first one out. Expiry is
//! enforced lazily at validation time; there is no background sweeper.

use anyhow::anyhow;
use chrono::{DateTime, Duration, Utc};
use tracing::warn;

use crate::auth::error::AuthError;
use crate::auth::status::{AccountStatus, effective_status};
use crate::auth::token::generate_session_token;
use crate::db::Store;
use crate::entities::{user_sessions, users};

/// Result of a successful [`SessionManager::issue`].
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    /// RFC 3339 UTC instant after which the session stops validating.
    pub expires_at: String,
    /// How many prior sessions this login displaced.
    pub kicked: u64,
}

/// A validated token together with the account it belongs to.
pub struct AuthenticatedSession {
    pub account: users::Model,
    pub session: user_sessions::Model,
}

#[derive(Clone)]
pub struct SessionManager {
    store: Store,
}

impl SessionManager {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    /// Mints a fresh token for `account_id`, displacing any session the
    /// account already holds.
    ///
    /// # Errors
    ///
    /// Fails only on storage errors. A token collision trips the unique
    /// index and surfaces here as an internal error rather than silently
    /// overwriting another account's session.
    pub async fn issue(
        &self,
        account_id: i32,
        ip: Option<String>,
        user_agent: Option<String>,
        ttl_minutes: u32,
    ) -> Result<IssuedSession, AuthError> {
        let token = generate_session_token();
        let expires_at = (Utc::now() + Duration::minutes(i64::from(ttl_minutes))).to_rfc3339();
        let (kicked, _session) = self
            .store
            .sessions()
            .replace_for_user(account_id, &token, ip, user_agent, &expires_at)
            .await?;
        Ok(IssuedSession {
            token,
            expires_at,
            kicked,
        })
    }

    /// Resolves a bearer token to its session and account, enforcing
    /// session expiry and the account-level gates.
    ///
    /// # Errors
    ///
    /// - [`AuthError::SessionKicked`] when no session row carries this
    ///   token, the common cause being a newer login elsewhere.
    /// - [`AuthError::SessionExpired`] when the row exists but has timed
    ///   out. The stale row is deleted on the way out, so a retry with
    ///   the same token reports `SessionKicked` instead.
    /// - [`AuthError::AccountDisabled`] / [`AuthError::AccountExpired`]
    ///   when the account itself no longer admits access.
    pub async fn validate(&self, token: &str) -> Result<AuthenticatedSession, AuthError> {
        if token.is_empty() {
            return Err(AuthError::Unauthenticated);
        }
        let Some(session) = self.store.sessions().find_by_token(token).await? else {
            return Err(AuthError::SessionKicked);
        };

        let now = Utc::now();
        let still_live = DateTime::parse_from_rfc3339(&session.expires_at)
            .is_ok_and(|t| t.with_timezone(&Utc) > now);
        if !still_live {
            self.delete_quietly(token).await;
            return Err(AuthError::SessionExpired);
        }

        let Some(account) = self.store.accounts().find_by_id(session.user_id).await? else {
            // Orphaned session, the account was deleted underneath it.
            self.delete_quietly(token).await;
            return Err(AuthError::SessionKicked);
        };

        match effective_status(&account, now.date_naive()) {
            Some(AccountStatus::Locked) => return Err(AuthError::AccountDisabled),
            Some(AccountStatus::Pending) => return Err(AuthError::PendingApproval),
            Some(AccountStatus::Rejected) => return Err(AuthError::RegistrationRejected),
            Some(AccountStatus::Expired) => {
                if account.status != AccountStatus::Expired.as_str()
                    && let Err(err) = self
                        .store
                        .accounts()
                        .set_status(account.id, AccountStatus::Expired.as_str())
                        .await
                {
                    warn!(account_id = account.id, error = %err, "Failed to persist expired status");
                }
                return Err(AuthError::AccountExpired);
            }
            Some(AccountStatus::Active) => {}
            None => {
                return Err(AuthError::Internal(anyhow!(
                    "account {} has unknown status {:?}",
                    account.id,
                    account.status
                )));
            }
        }

        Ok(AuthenticatedSession { account, session })
    }

    /// Deletes the session carrying `token`. Idempotent.
    ///
    /// # Errors
    ///
    /// Fails only on storage errors.
    pub async fn revoke(&self, token: &str) -> Result<(), AuthError> {
        self.store.sessions().delete_by_token(token).await?;
        Ok(())
    }

    /// Deletes every session held by `account_id`, returning how many
    /// rows went away.
    ///
    /// # Errors
    ///
    /// Fails only on storage errors.
    pub async fn revoke_all(&self, account_id: i32) -> Result<u64, AuthError> {
        Ok(self.store.sessions().delete_for_user(account_id).await?)
    }

    async fn delete_quietly(&self, token: &str) {
        if let Err(err) = self.store.sessions().delete_by_token(token).await {
            warn!(error = %err, "Failed to delete stale session row");
        }
    }
}
