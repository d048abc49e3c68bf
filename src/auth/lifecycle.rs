//! Account lifecycle orchestration.
//!
//! The controller owns every state-changing operation on accounts: the
//! login procedure, self registration, logout, renewal requests, and the
//! administrative actions. Reads that only shape data for display go
//! straight to the repositories; everything that mutates or must be
//! audited comes through here.

use std::collections::BTreeMap;

use anyhow::anyhow;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use sea_orm::SqlErr;
use serde_json::json;
use tokio::task;

use crate::auth::activity::ActivityLogger;
use crate::auth::error::AuthError;
use crate::auth::session::SessionManager;
use crate::auth::status::{AccountStatus, Role, days_until_expiry, effective_status};
use crate::config::SecurityConfig;
use crate::db::repositories::account::{hash_password, verify_password_hash};
use crate::db::{AuditEvent, NewAccount, Store};
use crate::entities::{renewal_requests, users};

/// Approvals and renewals default to this many days of validity.
pub const DEFAULT_APPROVAL_DAYS: i64 = 90;

/// Shortest password accepted at registration and reset.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Request-scoped metadata attached to sessions and audit entries.
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

/// Self-registration payload. The password arrives in the clear and is
/// hashed before anything touches the store.
#[derive(Debug, Clone, Default)]
pub struct Registration {
    pub username: String,
    pub password: String,
    pub full_name: String,
    pub rank: Option<String>,
    pub position: Option<String>,
    pub division: Option<String>,
    pub subdivision: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// What a successful login hands back to the transport layer.
pub struct LoginOutcome {
    pub token: String,
    pub expires_at: String,
    pub account: users::Model,
    /// Set when the account is inside the expiry warning window.
    pub expire_warning: Option<String>,
}

/// Batch operations accepted by [`LifecycleController::bulk`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkAction {
    Approve,
    Lock,
    Unlock,
    Extend30,
    Extend365,
    Delete,
}

impl BulkAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Lock => "lock",
            Self::Unlock => "unlock",
            Self::Extend30 => "extend30",
            Self::Extend365 => "extend365",
            Self::Delete => "delete",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "approve" => Some(Self::Approve),
            "lock" => Some(Self::Lock),
            "unlock" => Some(Self::Unlock),
            "extend30" => Some(Self::Extend30),
            "extend365" => Some(Self::Extend365),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct LifecycleController {
    store: Store,
    sessions: SessionManager,
    activity: ActivityLogger,
    security: SecurityConfig,
}

impl LifecycleController {
    #[must_use]
    pub fn new(store: Store, sessions: SessionManager, security: SecurityConfig) -> Self {
        let activity = ActivityLogger::new(store.clone());
        Self {
            store,
            sessions,
            activity,
            security,
        }
    }

    /// The login procedure. Checks run in a fixed order: account lookup,
    /// time lock, password, account status, and only then session issue.
    /// The failed-attempt counter is bumped atomically so concurrent
    /// wrong guesses cannot slip under the lockout threshold.
    ///
    /// # Errors
    ///
    /// Every refusal maps to its own [`AuthError`] variant; see the enum
    /// for the full vocabulary.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        meta: &RequestMeta,
    ) -> Result<LoginOutcome, AuthError> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::Validation(
                "Username and password are required".to_string(),
            ));
        }

        let policy = self.store.settings().auth_policy().await?;

        let Some(account) = self.store.accounts().find_by_username(username).await? else {
            self.activity
                .record(auth_event(
                    None,
                    "login_failed",
                    None,
                    json!({ "username": username, "reason": "user_not_found" }),
                    meta,
                ))
                .await;
            return Err(AuthError::InvalidCredentials);
        };

        let now = Utc::now();
        if let Some(raw) = account.locked_until.as_deref()
            && let Ok(until) = DateTime::parse_from_rfc3339(raw)
        {
            let until = until.with_timezone(&Utc);
            if until > now {
                let remaining_minutes = ((until - now).num_seconds() + 59) / 60;
                return Err(AuthError::AccountLocked { remaining_minutes });
            }
        }

        let password_ok =
            verify_off_thread(account.password_hash.clone(), password.to_string()).await?;
        if !password_ok {
            let lock_until =
                (now + Duration::minutes(i64::from(policy.lock_duration_minutes))).to_rfc3339();
            let max_attempts = i32::try_from(policy.max_login_attempts).unwrap_or(i32::MAX);
            let (attempts, locked) = self
                .store
                .accounts()
                .register_failed_attempt(account.id, max_attempts, &lock_until)
                .await?;

            if locked {
                self.activity
                    .record(auth_event(
                        Some(account.id),
                        "account_locked",
                        Some(account.id),
                        json!({ "attempts": attempts }),
                        meta,
                    ))
                    .await;
                return Err(AuthError::TooManyAttempts {
                    attempts,
                    lock_minutes: policy.lock_duration_minutes,
                });
            }

            self.activity
                .record(auth_event(
                    Some(account.id),
                    "login_failed",
                    Some(account.id),
                    json!({ "reason": "wrong_password", "attempts": attempts }),
                    meta,
                ))
                .await;
            let used = u32::try_from(attempts).unwrap_or(0);
            return Err(AuthError::WrongPassword {
                remaining: policy.max_login_attempts.saturating_sub(used),
            });
        }

        let today = now.date_naive();
        match effective_status(&account, today) {
            Some(AccountStatus::Pending) => return Err(AuthError::PendingApproval),
            Some(AccountStatus::Rejected) => return Err(AuthError::RegistrationRejected),
            Some(AccountStatus::Locked) => return Err(AuthError::AccountDisabled),
            Some(AccountStatus::Expired) => {
                if account.status != AccountStatus::Expired.as_str() {
                    self.store
                        .accounts()
                        .set_status(account.id, AccountStatus::Expired.as_str())
                        .await?;
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

        let issued = self
            .sessions
            .issue(
                account.id,
                meta.ip.clone(),
                meta.user_agent.clone(),
                policy.session_timeout_minutes,
            )
            .await?;
        if issued.kicked > 0 {
            self.activity
                .record(auth_event(
                    Some(account.id),
                    "session_kicked",
                    Some(account.id),
                    json!({
                        "kicked_sessions": issued.kicked,
                        "reason": "new_login_from_another_device",
                    }),
                    meta,
                ))
                .await;
        }

        self.store.accounts().mark_logged_in(account.id).await?;
        self.activity
            .record(auth_event(
                Some(account.id),
                "login",
                Some(account.id),
                json!({ "success": true }),
                meta,
            ))
            .await;

        let expire_warning = days_until_expiry(account.expire_date.as_deref(), today)
            .filter(|days| *days <= i64::from(policy.warn_expire_days))
            .map(|days| format!("Your account expires in {days} days"));

        Ok(LoginOutcome {
            token: issued.token,
            expires_at: issued.expires_at,
            account,
            expire_warning,
        })
    }

    /// Creates a pending account. The unique index on username backstops
    /// the pre-check, so two concurrent registrations of the same name
    /// both report a duplicate instead of one of them crashing.
    ///
    /// # Errors
    ///
    /// [`AuthError::Validation`] for missing fields or a short password,
    /// [`AuthError::DuplicateUsername`] when the name is taken.
    pub async fn register(
        &self,
        registration: Registration,
        meta: &RequestMeta,
    ) -> Result<users::Model, AuthError> {
        let username = registration.username.trim().to_string();
        let full_name = registration.full_name.trim().to_string();
        if username.is_empty() || registration.password.is_empty() || full_name.is_empty() {
            return Err(AuthError::Validation(
                "Username, password and full name are required".to_string(),
            ));
        }
        if registration.password.len() < MIN_PASSWORD_LEN {
            return Err(AuthError::Validation(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        if self
            .store
            .accounts()
            .find_by_username(&username)
            .await?
            .is_some()
        {
            return Err(AuthError::DuplicateUsername);
        }

        let password_hash = self.hash_off_thread(registration.password).await?;
        let new = NewAccount {
            username: username.clone(),
            password_hash,
            full_name,
            rank: registration.rank,
            position: registration.position,
            division: registration.division,
            subdivision: registration.subdivision,
            phone: registration.phone,
            email: registration.email,
            role: Role::User.as_str().to_string(),
            status: AccountStatus::Pending.as_str().to_string(),
            expire_date: None,
        };

        let created = match self.store.accounts().create(new).await {
            Ok(model) => model,
            Err(err) if is_unique_violation(&err) => return Err(AuthError::DuplicateUsername),
            Err(err) => return Err(AuthError::Internal(err)),
        };

        self.activity
            .record(auth_event(
                Some(created.id),
                "register",
                Some(created.id),
                json!({ "username": username }),
                meta,
            ))
            .await;
        Ok(created)
    }

    /// Revokes the presented session. Idempotent.
    ///
    /// # Errors
    ///
    /// Fails only on storage errors.
    pub async fn logout(
        &self,
        account_id: i32,
        token: &str,
        meta: &RequestMeta,
    ) -> Result<(), AuthError> {
        self.sessions.revoke(token).await?;
        self.activity
            .record(auth_event(
                Some(account_id),
                "logout",
                Some(account_id),
                json!({}),
                meta,
            ))
            .await;
        Ok(())
    }

    /// Files a renewal request for the calling account, one pending
    /// request at a time.
    ///
    /// # Errors
    ///
    /// [`AuthError::Validation`] when a pending request already exists.
    pub async fn submit_renewal(
        &self,
        account_id: i32,
        reason: Option<String>,
        meta: &RequestMeta,
    ) -> Result<renewal_requests::Model, AuthError> {
        if self.store.renewals().has_pending(account_id).await? {
            return Err(AuthError::Validation(
                "A pending renewal request already exists".to_string(),
            ));
        }

        let request = self
            .store
            .renewals()
            .create(account_id, reason.clone())
            .await?;
        self.activity
            .record(auth_event(
                Some(account_id),
                "renew_request",
                Some(account_id),
                json!({ "reason": reason }),
                meta,
            ))
            .await;
        Ok(request)
    }

    /// Activates a pending account with `days` of validity (90 when
    /// unspecified).
    ///
    /// # Errors
    ///
    /// [`AuthError::NotFound`] when no such account exists.
    pub async fn approve(
        &self,
        actor: i32,
        target: i32,
        days: Option<i64>,
        meta: &RequestMeta,
    ) -> Result<(), AuthError> {
        let account = self.require_account(target).await?;
        let days = days.unwrap_or(DEFAULT_APPROVAL_DAYS);
        let expire = expire_date_after(Utc::now().date_naive(), days);
        self.store.accounts().approve(account.id, &expire).await?;
        self.activity
            .record(admin_event(
                actor,
                "user_approve",
                Some(account.id),
                json!({ "action": "approve" }),
                meta,
            ))
            .await;
        Ok(())
    }

    /// # Errors
    ///
    /// [`AuthError::NotFound`] when no such account exists.
    pub async fn reject(
        &self,
        actor: i32,
        target: i32,
        meta: &RequestMeta,
    ) -> Result<(), AuthError> {
        let account = self.require_account(target).await?;
        self.store
            .accounts()
            .set_status(account.id, AccountStatus::Rejected.as_str())
            .await?;
        self.activity
            .record(admin_event(
                actor,
                "user_reject",
                Some(account.id),
                json!({ "action": "reject" }),
                meta,
            ))
            .await;
        Ok(())
    }

    /// Administrative lock: flips the status, which both blocks new
    /// logins and invalidates existing sessions at their next check.
    ///
    /// # Errors
    ///
    /// [`AuthError::NotFound`] when no such account exists.
    pub async fn lock(&self, actor: i32, target: i32, meta: &RequestMeta) -> Result<(), AuthError> {
        let account = self.require_account(target).await?;
        self.store
            .accounts()
            .set_status(account.id, AccountStatus::Locked.as_str())
            .await?;
        self.activity
            .record(admin_event(
                actor,
                "user_lock",
                Some(account.id),
                json!({ "action": "lock" }),
                meta,
            ))
            .await;
        Ok(())
    }

    /// Clears both lock mechanisms at once: status back to active, the
    /// failed-attempt counter zeroed, the time lock lifted.
    ///
    /// # Errors
    ///
    /// [`AuthError::NotFound`] when no such account exists.
    pub async fn unlock(
        &self,
        actor: i32,
        target: i32,
        meta: &RequestMeta,
    ) -> Result<(), AuthError> {
        let account = self.require_account(target).await?;
        self.store.accounts().unlock(account.id).await?;
        self.activity
            .record(admin_event(
                actor,
                "user_unlock",
                Some(account.id),
                json!({ "action": "unlock" }),
                meta,
            ))
            .await;
        Ok(())
    }

    /// Writes an explicit expire date chosen by an administrator.
    ///
    /// # Errors
    ///
    /// [`AuthError::Validation`] for a missing or malformed date,
    /// [`AuthError::NotFound`] when no such account exists.
    pub async fn save_expire_date(
        &self,
        actor: i32,
        target: i32,
        expire_date: Option<&str>,
        meta: &RequestMeta,
    ) -> Result<(), AuthError> {
        let Some(expire_date) = expire_date else {
            return Err(AuthError::Validation("Expire date is required".to_string()));
        };
        if NaiveDate::parse_from_str(expire_date, "%Y-%m-%d").is_err() {
            return Err(AuthError::Validation(
                "Expire date must be YYYY-MM-DD".to_string(),
            ));
        }

        let account = self.require_account(target).await?;
        self.store
            .accounts()
            .set_expire_date(account.id, Some(expire_date))
            .await?;
        self.activity
            .record(admin_event(
                actor,
                "user_save",
                Some(account.id),
                json!({ "action": "save" }),
                meta,
            ))
            .await;
        Ok(())
    }

    /// # Errors
    ///
    /// [`AuthError::Validation`] for a short password,
    /// [`AuthError::NotFound`] when no such account exists.
    pub async fn reset_password(
        &self,
        actor: i32,
        target: i32,
        new_password: &str,
        meta: &RequestMeta,
    ) -> Result<(), AuthError> {
        if new_password.len() < MIN_PASSWORD_LEN {
            return Err(AuthError::Validation(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        let account = self.require_account(target).await?;
        let password_hash = self.hash_off_thread(new_password.to_string()).await?;
        self.store
            .accounts()
            .update_password(account.id, &password_hash)
            .await?;
        self.activity
            .record(admin_event(
                actor,
                "reset_password",
                Some(account.id),
                json!({}),
                meta,
            ))
            .await;
        Ok(())
    }

    /// Deletes an account outright, along with any live session it still
    /// holds. Super admins cannot be deleted.
    ///
    /// # Errors
    ///
    /// [`AuthError::NotFound`] when no such account exists,
    /// [`AuthError::SuperAdminProtected`] for a super admin target.
    pub async fn delete(
        &self,
        actor: i32,
        target: i32,
        meta: &RequestMeta,
    ) -> Result<(), AuthError> {
        let account = self.require_account(target).await?;
        if account.role == Role::SuperAdmin.as_str() {
            return Err(AuthError::SuperAdminProtected);
        }
        self.sessions.revoke_all(account.id).await?;
        self.store.accounts().delete(account.id).await?;
        self.activity
            .record(admin_event(
                actor,
                "delete_user",
                Some(account.id),
                json!({}),
                meta,
            ))
            .await;
        Ok(())
    }

    /// Applies one action to many accounts. Super admin rows are skipped
    /// by the store layer, never touched. Returns how many rows changed.
    ///
    /// # Errors
    ///
    /// [`AuthError::Validation`] for an empty id list.
    pub async fn bulk(
        &self,
        actor: i32,
        action: BulkAction,
        ids: &[i32],
        meta: &RequestMeta,
    ) -> Result<u64, AuthError> {
        if ids.is_empty() {
            return Err(AuthError::Validation("No users selected".to_string()));
        }

        let today = Utc::now().date_naive();
        let accounts = self.store.accounts();
        let affected = match action {
            BulkAction::Approve => {
                accounts
                    .bulk_approve(ids, &expire_date_after(today, DEFAULT_APPROVAL_DAYS))
                    .await?
            }
            BulkAction::Lock => {
                accounts
                    .bulk_set_status(ids, AccountStatus::Locked.as_str())
                    .await?
            }
            BulkAction::Unlock => accounts.bulk_unlock(ids).await?,
            BulkAction::Extend30 => accounts.extend_expiry(ids, 30, today).await?,
            BulkAction::Extend365 => accounts.extend_expiry(ids, 365, today).await?,
            BulkAction::Delete => accounts.bulk_delete(ids).await?,
        };

        let tag = format!("bulk_{}", action.as_str());
        self.activity
            .record(admin_event(
                actor,
                &tag,
                None,
                json!({ "userIds": ids, "action": action.as_str() }),
                meta,
            ))
            .await;
        Ok(affected)
    }

    /// Approves every pending account in one stroke. Returns the count.
    ///
    /// # Errors
    ///
    /// Fails only on storage errors.
    pub async fn approve_all(
        &self,
        actor: i32,
        days: Option<i64>,
        meta: &RequestMeta,
    ) -> Result<u64, AuthError> {
        let days = days.unwrap_or(DEFAULT_APPROVAL_DAYS);
        let expire = expire_date_after(Utc::now().date_naive(), days);
        let count = self.store.accounts().approve_all_pending(&expire).await?;
        self.activity
            .record(admin_event(
                actor,
                "approve_all",
                None,
                json!({ "count": count, "days": days }),
                meta,
            ))
            .await;
        Ok(count)
    }

    /// Resolves a renewal request. Approval extends the account from the
    /// later of its current expiry or today and reactivates it if it had
    /// already expired.
    ///
    /// # Errors
    ///
    /// [`AuthError::NotFound`] for an unknown request,
    /// [`AuthError::Validation`] when it was already resolved.
    pub async fn resolve_renewal(
        &self,
        actor: i32,
        request_id: i32,
        approve: bool,
        days: Option<i64>,
        meta: &RequestMeta,
    ) -> Result<(), AuthError> {
        let Some(request) = self.store.renewals().find_by_id(request_id).await? else {
            return Err(AuthError::NotFound("Renewal request"));
        };
        if request.status != "pending" {
            return Err(AuthError::Validation(
                "Renewal request has already been resolved".to_string(),
            ));
        }

        if approve {
            let days = days.unwrap_or(DEFAULT_APPROVAL_DAYS);
            let today = Utc::now().date_naive();
            self.store
                .accounts()
                .extend_expiry(&[request.user_id], days, today)
                .await?;
            if let Some(account) = self.store.accounts().find_by_id(request.user_id).await?
                && account.status == AccountStatus::Expired.as_str()
            {
                self.store
                    .accounts()
                    .set_status(account.id, AccountStatus::Active.as_str())
                    .await?;
            }
            self.store.renewals().set_status(request.id, "approved").await?;
            self.activity
                .record(admin_event(
                    actor,
                    "renewal_approve",
                    Some(request.user_id),
                    json!({ "requestId": request.id, "days": days }),
                    meta,
                ))
                .await;
        } else {
            self.store.renewals().set_status(request.id, "rejected").await?;
            self.activity
                .record(admin_event(
                    actor,
                    "renewal_reject",
                    Some(request.user_id),
                    json!({ "requestId": request.id }),
                    meta,
                ))
                .await;
        }
        Ok(())
    }

    /// Writes a batch of settings, creating keys that do not exist yet,
    /// and audits the whole map as one entry.
    ///
    /// # Errors
    ///
    /// Fails only on storage errors.
    pub async fn update_settings(
        &self,
        actor: i32,
        entries: BTreeMap<String, serde_json::Value>,
        meta: &RequestMeta,
    ) -> Result<(), AuthError> {
        for (key, value) in &entries {
            self.store
                .settings()
                .upsert(key, &setting_text(value), Some(actor))
                .await?;
        }
        self.activity
            .record(AuditEvent {
                actor: Some(actor),
                action: "update_settings".to_string(),
                target_type: "settings".to_string(),
                target_id: None,
                details: json!(entries),
                ip_address: meta.ip.clone(),
                user_agent: meta.user_agent.clone(),
            })
            .await;
        Ok(())
    }

    async fn require_account(&self, id: i32) -> Result<users::Model, AuthError> {
        self.store
            .accounts()
            .find_by_id(id)
            .await?
            .ok_or(AuthError::NotFound("User"))
    }

    async fn hash_off_thread(&self, password: String) -> Result<String, AuthError> {
        let security = self.security.clone();
        let hash = task::spawn_blocking(move || hash_password(&password, Some(&security)))
            .await
            .map_err(|err| AuthError::Internal(anyhow!("password hashing task failed: {err}")))??;
        Ok(hash)
    }
}

async fn verify_off_thread(stored_hash: String, password: String) -> Result<bool, AuthError> {
    let verified = task::spawn_blocking(move || verify_password_hash(&stored_hash, &password))
        .await
        .map_err(|err| AuthError::Internal(anyhow!("password verification task failed: {err}")))??;
    Ok(verified)
}

fn expire_date_after(today: NaiveDate, days: i64) -> String {
    (today + Duration::days(days)).format("%Y-%m-%d").to_string()
}

/// Settings arrive as arbitrary JSON; strings are stored verbatim and
/// anything else in its JSON rendering.
fn setting_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn auth_event(
    actor: Option<i32>,
    action: &str,
    target_id: Option<i32>,
    details: serde_json::Value,
    meta: &RequestMeta,
) -> AuditEvent {
    AuditEvent {
        actor,
        action: action.to_string(),
        target_type: "auth".to_string(),
        target_id,
        details,
        ip_address: meta.ip.clone(),
        user_agent: meta.user_agent.clone(),
    }
}

fn admin_event(
    actor: i32,
    action: &str,
    target_id: Option<i32>,
    details: serde_json::Value,
    meta: &RequestMeta,
) -> AuditEvent {
    AuditEvent {
        actor: Some(actor),
        action: action.to_string(),
        target_type: "user".to_string(),
        target_id,
        details,
        ip_address: meta.ip.clone(),
        user_agent: meta.user_agent.clone(),
    }
}

fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.downcast_ref::<sea_orm::DbErr>()
        .and_then(sea_orm::DbErr::sql_err)
        .is_some_and(|sql| matches!(sql, SqlErr::UniqueConstraintViolation(_)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn expire_date_arithmetic_crosses_month_and_year_ends() {
        assert_eq!(expire_date_after(day("2025-06-15"), 90), "2025-09-13");
        assert_eq!(expire_date_after(day("2025-12-31"), 30), "2026-01-30");
        assert_eq!(expire_date_after(day("2024-02-28"), 1), "2024-02-29");
    }

    #[test]
    fn setting_values_keep_strings_verbatim() {
        assert_eq!(setting_text(&json!("Forensic HR")), "Forensic HR");
        assert_eq!(setting_text(&json!(5)), "5");
        assert_eq!(setting_text(&json!(true)), "true");
    }

    #[test]
    fn bulk_actions_parse_their_wire_names() {
        for action in [
            BulkAction::Approve,
            BulkAction::Lock,
            BulkAction::Unlock,
            BulkAction::Extend30,
            BulkAction::Extend365,
            BulkAction::Delete,
        ] {
            assert_eq!(BulkAction::parse(action.as_str()), Some(action));
        }
        assert_eq!(BulkAction::parse("promote"), None);
    }
}
