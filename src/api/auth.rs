//! Public authentication endpoints plus the session-scoped ones
//! (logout, profile, renewal).

use axum::{
    Extension, Json,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::guard::{Principal, SESSION_COOKIE, SessionToken, request_meta};
use super::types::{
    LoginData, LoginRequest, LoginUserDto, ProfileDto, RegisterRequest, RegisteredDto,
    RenewRequestBody, RenewalRequestDto,
};
use super::{ApiError, ApiResponse, AppState};
use crate::auth::Registration;

/// Settings every visitor may read, mostly branding for the login page.
const PUBLIC_SETTINGS: &[&str] = &[
    "system_name",
    "organization_name",
    "welcome_message",
    "footer_text",
    "admin_email",
    "admin_phone",
    "primary_color",
    "main_logo",
    "login_logo",
    "favicon",
];

/// POST /api/auth/login
///
/// Runs the full login procedure and, on success, returns the token in
/// the body and mirrors it into an httpOnly cookie.
pub async fn login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let meta = request_meta(&headers);
    let outcome = state
        .lifecycle
        .login(&payload.username, &payload.password, &meta)
        .await?;

    let max_age = DateTime::parse_from_rfc3339(&outcome.expires_at)
        .map(|expires| (expires.with_timezone(&Utc) - Utc::now()).num_seconds().max(0))
        .unwrap_or(0);
    let cookie = session_cookie(
        &outcome.token,
        max_age,
        state.config.server.secure_cookies,
    );

    let account = &outcome.account;
    let body = ApiResponse::success(LoginData {
        token: outcome.token.clone(),
        user: LoginUserDto {
            id: account.id,
            username: account.username.clone(),
            full_name: account.full_name.clone(),
            role: account.role.clone(),
            division: account.division.clone(),
            expire_date: account.expire_date.clone(),
        },
        expires_at: outcome.expires_at.clone(),
        expire_warning: outcome.expire_warning.clone(),
    });

    Ok(([(header::SET_COOKIE, cookie)], Json(body)))
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let meta = request_meta(&headers);
    let registration = Registration {
        username: payload.username,
        password: payload.password,
        full_name: payload.full_name,
        rank: payload.rank,
        position: payload.position,
        division: payload.division,
        subdivision: payload.subdivision,
        phone: payload.phone,
        email: payload.email,
    };
    let created = state.lifecycle.register(registration, &meta).await?;

    let body = ApiResponse::success_with_message(
        RegisteredDto {
            id: created.id,
            username: created.username,
            full_name: created.full_name,
            status: created.status,
        },
        "Registration successful, awaiting administrator approval",
    );
    Ok((StatusCode::CREATED, Json(body)))
}

/// POST /api/auth/logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Extension(SessionToken(token)): Extension<SessionToken>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let meta = request_meta(&headers);
    state.lifecycle.logout(principal.id, &token, &meta).await?;

    let cookie = session_cookie("", 0, state.config.server.secure_cookies);
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(ApiResponse::<()>::message("Logged out")),
    ))
}

/// GET /api/auth/me
pub async fn me(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<ApiResponse<ProfileDto>>, ApiError> {
    let account = state
        .store
        .accounts()
        .find_by_id(principal.id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(Json(ApiResponse::success(ProfileDto::from_model(&account))))
}

/// POST /api/auth/renew-request
pub async fn renew_request(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    headers: HeaderMap,
    Json(payload): Json<RenewRequestBody>,
) -> Result<impl IntoResponse, ApiError> {
    let meta = request_meta(&headers);
    let request = state
        .lifecycle
        .submit_renewal(principal.id, payload.reason, &meta)
        .await?;

    let body = ApiResponse::success_with_message(
        RenewalRequestDto::from_model(&request),
        "Renewal request submitted",
    );
    Ok((StatusCode::CREATED, Json(body)))
}

/// GET /api/auth/settings
///
/// Unauthenticated branding lookup for the login page. Only whitelisted
/// keys ever leave the settings table this way.
pub async fn public_settings(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<BTreeMap<String, String>>>, ApiError> {
    let rows = state.store.settings().get_many(PUBLIC_SETTINGS).await?;
    let settings: BTreeMap<String, String> = rows
        .into_iter()
        .map(|row| (row.setting_key, row.setting_value))
        .collect();
    Ok(Json(ApiResponse::success(settings)))
}

fn session_cookie(token: &str, max_age_seconds: i64, secure: bool) -> String {
    let mut cookie =
        format!("{SESSION_COOKIE}={token}; HttpOnly; SameSite=Strict; Path=/; Max-Age={max_age_seconds}");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}
