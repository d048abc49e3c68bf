//! Request authentication for the protected routes.
//!
//! `require_auth` resolves the presented token to an account and stashes
//! a [`Principal`] plus the raw token in request extensions for the
//! handlers. `require_super_admin` layers the role gate on top.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;

use super::{ApiError, AppState};
use crate::auth::{AuthError, RequestMeta, Role};
use crate::entities::users;

/// Name of the cookie the login handler sets.
pub const SESSION_COOKIE: &str = "token";

/// The authenticated identity attached to a request. A deliberate subset
/// of the account row; the password hash never rides in extensions.
#[derive(Debug, Clone)]
pub struct Principal {
    pub id: i32,
    pub username: String,
    pub full_name: String,
    pub role: String,
    pub division: Option<String>,
    pub status: String,
    pub expire_date: Option<String>,
}

impl Principal {
    #[must_use]
    pub fn from_account(account: &users::Model) -> Self {
        Self {
            id: account.id,
            username: account.username.clone(),
            full_name: account.full_name.clone(),
            role: account.role.clone(),
            division: account.division.clone(),
            status: account.status.clone(),
            expire_date: account.expire_date.clone(),
        }
    }

    #[must_use]
    pub fn is_super_admin(&self) -> bool {
        self.role == Role::SuperAdmin.as_str()
    }
}

/// The raw session token for the current request, kept so logout can
/// revoke exactly the session that called it.
#[derive(Debug, Clone)]
pub struct SessionToken(pub String);

/// Validates the bearer token (header or cookie) and attaches the
/// [`Principal`] to the request.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<impl IntoResponse, ApiError> {
    let Some(token) = extract_token(request.headers()) else {
        return Err(ApiError::Auth(AuthError::Unauthenticated));
    };

    let authenticated = state.sessions.validate(&token).await?;
    tracing::Span::current().record("user_id", authenticated.account.id);

    request
        .extensions_mut()
        .insert(Principal::from_account(&authenticated.account));
    request.extensions_mut().insert(SessionToken(token));
    Ok(next.run(request).await)
}

/// Rejects anyone below super admin. Must run after [`require_auth`].
pub async fn require_super_admin(
    request: Request,
    next: Next,
) -> Result<impl IntoResponse, ApiError> {
    let allowed = request
        .extensions()
        .get::<Principal>()
        .is_some_and(Principal::is_super_admin);
    if !allowed {
        return Err(ApiError::Auth(AuthError::Forbidden));
    }
    Ok(next.run(request).await)
}

/// Token extraction order: `Authorization: Bearer` first, then the
/// session cookie.
fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION)
        && let Ok(auth_str) = auth_header.to_str()
        && let Some(token) = auth_str.strip_prefix("Bearer ")
    {
        let token = token.trim();
        if !token.is_empty() {
            return Some(token.to_string());
        }
    }

    if let Some(cookie_header) = headers.get(header::COOKIE)
        && let Ok(cookies) = cookie_header.to_str()
    {
        for pair in cookies.split(';') {
            if let Some((name, value)) = pair.trim().split_once('=')
                && name == SESSION_COOKIE
                && !value.is_empty()
            {
                return Some(value.trim().to_string());
            }
        }
    }

    None
}

/// Client metadata recorded with sessions and audit entries. The IP comes
/// from the forwarding headers the reverse proxy sets.
#[must_use]
pub fn request_meta(headers: &HeaderMap) -> RequestMeta {
    let ip = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| raw.split(',').next())
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        });

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    RequestMeta { ip, user_agent }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(
                axum::http::HeaderName::try_from(*name).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    #[test]
    fn bearer_header_wins_over_cookie() {
        let map = headers(&[
            ("authorization", "Bearer abc123"),
            ("cookie", "token=fromcookie"),
        ]);
        assert_eq!(extract_token(&map), Some("abc123".to_string()));
    }

    #[test]
    fn token_cookie_is_found_among_others() {
        let map = headers(&[("cookie", "theme=dark; token=deadbeef; lang=th")]);
        assert_eq!(extract_token(&map), Some("deadbeef".to_string()));
    }

    #[test]
    fn missing_and_empty_tokens_yield_none() {
        assert_eq!(extract_token(&HeaderMap::new()), None);
        let map = headers(&[("authorization", "Bearer ")]);
        assert_eq!(extract_token(&map), None);
        let map = headers(&[("cookie", "token=")]);
        assert_eq!(extract_token(&map), None);
    }

    #[test]
    fn forwarded_ip_takes_first_hop() {
        let map = headers(&[
            ("x-forwarded-for", "203.0.113.7, 10.0.0.1"),
            ("user-agent", "Mozilla/5.0"),
        ]);
        let meta = request_meta(&map);
        assert_eq!(meta.ip.as_deref(), Some("203.0.113.7"));
        assert_eq!(meta.user_agent.as_deref(), Some("Mozilla/5.0"));
    }
}
