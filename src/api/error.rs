use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;

use super::ApiResponse;
use crate::auth::AuthError;

#[derive(Debug)]
pub enum ApiError {
    /// Refusal from the authentication and lifecycle layer. Carries its
    /// own status mapping and, for branchable refusals, a client code.
    Auth(AuthError),

    ValidationError(String),

    NotFound(String),

    InternalError(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auth(err) => write!(f, "{err}"),
            Self::ValidationError(msg) => write!(f, "Validation error: {msg}"),
            Self::NotFound(msg) => write!(f, "Not found: {msg}"),
            Self::InternalError(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, code) = match &self {
            Self::Auth(err) => (auth_status(err), err.to_string(), err.client_code()),
            Self::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone(), None),
            Self::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone(), None),
        };

        // Never leak internals to the client
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Internal error: {message}");
            "An internal error occurred".to_string()
        } else {
            message
        };

        let body = code.map_or_else(
            || ApiResponse::<()>::error(message.clone()),
            |code| ApiResponse::<()>::error_with_code(message.clone(), code),
        );
        (status, Json(body)).into_response()
    }
}

const fn auth_status(err: &AuthError) -> StatusCode {
    match err {
        AuthError::Validation(_) | AuthError::DuplicateUsername => StatusCode::BAD_REQUEST,
        AuthError::InvalidCredentials
        | AuthError::WrongPassword { .. }
        | AuthError::Unauthenticated
        | AuthError::SessionKicked
        | AuthError::SessionExpired => StatusCode::UNAUTHORIZED,
        AuthError::AccountLocked { .. }
        | AuthError::TooManyAttempts { .. }
        | AuthError::PendingApproval
        | AuthError::RegistrationRejected
        | AuthError::AccountDisabled
        | AuthError::AccountExpired
        | AuthError::Forbidden
        | AuthError::SuperAdminProtected => StatusCode::FORBIDDEN,
        AuthError::NotFound(_) => StatusCode::NOT_FOUND,
        AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self::Auth(err)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::InternalError(format!("{err:#}"))
    }
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_refusals_map_to_their_statuses() {
        assert_eq!(
            auth_status(&AuthError::InvalidCredentials),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            auth_status(&AuthError::WrongPassword { remaining: 1 }),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            auth_status(&AuthError::AccountLocked {
                remaining_minutes: 5
            }),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            auth_status(&AuthError::PendingApproval),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            auth_status(&AuthError::DuplicateUsername),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            auth_status(&AuthError::SessionExpired),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(auth_status(&AuthError::NotFound("User")), StatusCode::NOT_FOUND);
    }
}
