//! Throttle and timeout knobs for the login path.
//!
//! Loaded fresh from the settings table on each use, with these constants
//! as the fallback when a row is missing. Injected into the lifecycle
//! controller and session manager rather than looked up ambiently.

pub const DEFAULT_MAX_LOGIN_ATTEMPTS: u32 = 3;
pub const DEFAULT_LOCK_DURATION_MINUTES: u32 = 30;
pub const DEFAULT_SESSION_TIMEOUT_MINUTES: u32 = 60;
pub const DEFAULT_WARN_EXPIRE_DAYS: u32 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthPolicy {
    /// Failed logins tolerated before the time lock engages.
    pub max_login_attempts: u32,
    /// How long the time lock holds, in minutes.
    pub lock_duration_minutes: u32,
    /// Session lifetime from issue, in minutes.
    pub session_timeout_minutes: u32,
    /// Start warning this many days before account expiry.
    pub warn_expire_days: u32,
}

impl Default for AuthPolicy {
    fn default() -> Self {
        Self {
            max_login_attempts: DEFAULT_MAX_LOGIN_ATTEMPTS,
            lock_duration_minutes: DEFAULT_LOCK_DURATION_MINUTES,
            session_timeout_minutes: DEFAULT_SESSION_TIMEOUT_MINUTES,
            warn_expire_days: DEFAULT_WARN_EXPIRE_DAYS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_fallbacks() {
        let policy = AuthPolicy::default();
        assert_eq!(policy.max_login_attempts, 3);
        assert_eq!(policy.lock_duration_minutes, 30);
        assert_eq!(policy.session_timeout_minutes, 60);
        assert_eq!(policy.warn_expire_days, 7);
    }
}
