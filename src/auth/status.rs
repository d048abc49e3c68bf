//! Account status and role vocabulary.
//!
//! Statuses are stored as lowercase strings; the enums here keep the
//! comparisons typo-proof. Expiry is never written back eagerly: an
//! `active` account whose expire date has passed is *treated* as expired
//! wherever it matters, which is what [`effective_status`] computes.

use chrono::NaiveDate;

use crate::entities::users;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountStatus {
    Pending,
    Active,
    Rejected,
    Locked,
    Expired,
}

impl AccountStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Rejected => "rejected",
            Self::Locked => "locked",
            Self::Expired => "expired",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "active" => Some(Self::Active),
            "rejected" => Some(Self::Rejected),
            "locked" => Some(Self::Locked),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Admin,
    SuperAdmin,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
            Self::SuperAdmin => "super_admin",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Self::User),
            "admin" => Some(Self::Admin),
            "super_admin" => Some(Self::SuperAdmin),
            _ => None,
        }
    }
}

/// An account is past expiry from the start of its expire date onward,
/// so the last fully usable day is the one before `expire_date`.
#[must_use]
pub fn is_past_expiry(expire_date: Option<&str>, today: NaiveDate) -> bool {
    expire_date
        .and_then(|raw| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok())
        .is_some_and(|date| date <= today)
}

/// Whole days until the expire date, negative once it has passed.
/// `None` when the account has no expire date or the value is unparsable.
#[must_use]
pub fn days_until_expiry(expire_date: Option<&str>, today: NaiveDate) -> Option<i64> {
    expire_date
        .and_then(|raw| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok())
        .map(|date| (date - today).num_days())
}

/// Stored status overlaid with the expiry rule. Returns `None` for a
/// status string outside the known vocabulary.
#[must_use]
pub fn effective_status(account: &users::Model, today: NaiveDate) -> Option<AccountStatus> {
    let stored = AccountStatus::parse(&account.status)?;
    if stored == AccountStatus::Active && is_past_expiry(account.expire_date.as_deref(), today) {
        return Some(AccountStatus::Expired);
    }
    Some(stored)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(status: &str, expire_date: Option<&str>) -> users::Model {
        users::Model {
            id: 1,
            username: "somchai".to_string(),
            password_hash: "$argon2id$stub".to_string(),
            full_name: "Somchai Jaidee".to_string(),
            rank: None,
            position: None,
            division: None,
            subdivision: None,
            phone: None,
            email: None,
            role: "user".to_string(),
            status: status.to_string(),
            login_attempts: 0,
            locked_until: None,
            expire_date: expire_date.map(str::to_string),
            last_login: None,
            created_at: "2025-01-01T00:00:00+00:00".to_string(),
            updated_at: "2025-01-01T00:00:00+00:00".to_string(),
        }
    }

    fn day(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn status_strings_round_trip() {
        for status in [
            AccountStatus::Pending,
            AccountStatus::Active,
            AccountStatus::Rejected,
            AccountStatus::Locked,
            AccountStatus::Expired,
        ] {
            assert_eq!(AccountStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(AccountStatus::parse("suspended"), None);
    }

    #[test]
    fn role_strings_round_trip() {
        for role in [Role::User, Role::Admin, Role::SuperAdmin] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("root"), None);
    }

    #[test]
    fn expiry_starts_on_the_expire_date_itself() {
        let today = day("2025-06-15");
        assert!(is_past_expiry(Some("2025-06-15"), today));
        assert!(is_past_expiry(Some("2025-06-01"), today));
        assert!(!is_past_expiry(Some("2025-06-16"), today));
        assert!(!is_past_expiry(None, today));
        assert!(!is_past_expiry(Some("not-a-date"), today));
    }

    #[test]
    fn days_until_expiry_counts_whole_days() {
        let today = day("2025-06-15");
        assert_eq!(days_until_expiry(Some("2025-06-20"), today), Some(5));
        assert_eq!(days_until_expiry(Some("2025-06-15"), today), Some(0));
        assert_eq!(days_until_expiry(Some("2025-06-10"), today), Some(-5));
        assert_eq!(days_until_expiry(None, today), None);
    }

    #[test]
    fn active_account_past_expire_date_reads_as_expired() {
        let today = day("2025-06-15");
        let fresh = account("active", Some("2025-07-01"));
        assert_eq!(effective_status(&fresh, today), Some(AccountStatus::Active));

        let lapsed = account("active", Some("2025-06-15"));
        assert_eq!(effective_status(&lapsed, today), Some(AccountStatus::Expired));
    }

    #[test]
    fn non_active_statuses_ignore_the_expire_date() {
        let today = day("2025-06-15");
        let locked = account("locked", Some("2025-01-01"));
        assert_eq!(effective_status(&locked, today), Some(AccountStatus::Locked));

        let pending = account("pending", Some("2025-01-01"));
        assert_eq!(effective_status(&pending, today), Some(AccountStatus::Pending));
    }

    #[test]
    fn unknown_status_string_yields_none() {
        let today = day("2025-06-15");
        assert_eq!(effective_status(&account("banned", None), today), None);
    }
}
