//! Domain errors for authentication and account lifecycle operations.
//!
//! Every refusal the login and session paths can produce is a distinct
//! variant so the HTTP layer can map each one to its own status and,
//! where the client needs to branch, a machine-readable code.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),

    #[error("Username is already taken")]
    DuplicateUsername,

    /// Unknown username. Deliberately worded the same as a bad password.
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Incorrect password ({remaining} attempts remaining)")]
    WrongPassword { remaining: u32 },

    /// The time lock is still running.
    #[error("Account is temporarily locked, try again in {remaining_minutes} minutes")]
    AccountLocked { remaining_minutes: i64 },

    /// This attempt crossed the threshold and engaged the time lock.
    #[error("Too many failed attempts ({attempts}), account locked for {lock_minutes} minutes")]
    TooManyAttempts { attempts: i32, lock_minutes: u32 },

    #[error("Account is awaiting administrator approval")]
    PendingApproval,

    #[error("Account registration was rejected")]
    RegistrationRejected,

    #[error("Account has been locked by an administrator")]
    AccountDisabled,

    #[error("Account has expired, please request a renewal")]
    AccountExpired,

    #[error("Authentication required")]
    Unauthenticated,

    /// Token has no session row, which after a concurrent login means
    /// another device displaced this one.
    #[error("Signed in from another device")]
    SessionKicked,

    #[error("Session expired, please sign in again")]
    SessionExpired,

    #[error("Insufficient privileges")]
    Forbidden,

    #[error("Super admin accounts cannot be deleted")]
    SuperAdminProtected,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    /// Stable code attached to the response envelope when the client is
    /// expected to branch on the refusal rather than just display it.
    #[must_use]
    pub const fn client_code(&self) -> Option<&'static str> {
        match self {
            Self::PendingApproval => Some("PENDING"),
            Self::RegistrationRejected => Some("REJECTED"),
            Self::AccountDisabled => Some("LOCKED"),
            Self::AccountExpired => Some("EXPIRED"),
            Self::SessionKicked => Some("SESSION_KICKED"),
            Self::SessionExpired => Some("SESSION_EXPIRED"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_embed_the_countdown_numbers() {
        let err = AuthError::WrongPassword { remaining: 2 };
        assert_eq!(err.to_string(), "Incorrect password (2 attempts remaining)");

        let err = AuthError::AccountLocked {
            remaining_minutes: 17,
        };
        assert!(err.to_string().contains("17 minutes"));

        let err = AuthError::TooManyAttempts {
            attempts: 3,
            lock_minutes: 30,
        };
        assert!(err.to_string().contains('3'));
        assert!(err.to_string().contains("30 minutes"));
    }

    #[test]
    fn branchable_refusals_carry_codes() {
        assert_eq!(AuthError::PendingApproval.client_code(), Some("PENDING"));
        assert_eq!(AuthError::SessionKicked.client_code(), Some("SESSION_KICKED"));
        assert_eq!(AuthError::SessionExpired.client_code(), Some("SESSION_EXPIRED"));
        assert_eq!(AuthError::InvalidCredentials.client_code(), None);
        assert_eq!(
            AuthError::WrongPassword { remaining: 1 }.client_code(),
            None
        );
    }
}
