use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::db::{LogEntryRow, RenewalRow};
use crate::entities::{renewal_requests, users};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            error: None,
            code: None,
        }
    }

    pub fn success_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message.into()),
            error: None,
            code: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: None,
            error: Some(message.into()),
            code: None,
        }
    }

    pub fn error_with_code(message: impl Into<String>, code: &'static str) -> Self {
        Self {
            success: false,
            data: None,
            message: None,
            error: Some(message.into()),
            code: Some(code),
        }
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            message: Some(message.into()),
            error: None,
            code: None,
        }
    }
}

/// List responses carry the pagination block alongside the data array.
#[derive(Debug, Serialize)]
pub struct PagedResponse<T> {
    pub success: bool,
    pub data: Vec<T>,
    pub pagination: PaginationDto,
}

impl<T> PagedResponse<T> {
    pub const fn new(data: Vec<T>, pagination: PaginationDto) -> Self {
        Self {
            success: true,
            data,
            pagination,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationDto {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub total_pages: u64,
}

// ============================================================================
// Auth payloads
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub full_name: String,
    #[serde(default)]
    pub rank: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub division: Option<String>,
    #[serde(default)]
    pub subdivision: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RenewRequestBody {
    #[serde(default)]
    pub reason: Option<String>,
}

/// The compact identity block embedded in the login response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginUserDto {
    pub id: i32,
    pub username: String,
    pub full_name: String,
    pub role: String,
    pub division: Option<String>,
    pub expire_date: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginData {
    pub token: String,
    pub user: LoginUserDto,
    pub expires_at: String,
    pub expire_warning: Option<String>,
}

/// What `/auth/me` exposes: the full profile minus anything secret.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDto {
    pub id: i32,
    pub username: String,
    pub full_name: String,
    pub rank: Option<String>,
    pub position: Option<String>,
    pub division: Option<String>,
    pub subdivision: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub role: String,
    pub status: String,
    pub expire_date: Option<String>,
    pub last_login: Option<String>,
}

impl ProfileDto {
    #[must_use]
    pub fn from_model(user: &users::Model) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            full_name: user.full_name.clone(),
            rank: user.rank.clone(),
            position: user.position.clone(),
            division: user.division.clone(),
            subdivision: user.subdivision.clone(),
            phone: user.phone.clone(),
            email: user.email.clone(),
            role: user.role.clone(),
            status: user.status.clone(),
            expire_date: user.expire_date.clone(),
            last_login: user.last_login.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredDto {
    pub id: i32,
    pub username: String,
    pub full_name: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct RenewalRequestDto {
    pub id: i32,
    pub user_id: i32,
    pub reason: Option<String>,
    pub status: String,
    pub created_at: String,
}

impl RenewalRequestDto {
    #[must_use]
    pub fn from_model(request: &renewal_requests::Model) -> Self {
        Self {
            id: request.id,
            user_id: request.user_id,
            reason: request.reason.clone(),
            status: request.status.clone(),
            created_at: request.created_at.clone(),
        }
    }
}

// ============================================================================
// Admin payloads
// ============================================================================

/// Row shape for the admin user table. Serialized with the storage field
/// names, which is what the dashboard table binds to.
#[derive(Debug, Serialize)]
pub struct AdminUserDto {
    pub id: i32,
    pub username: String,
    pub full_name: String,
    pub rank: Option<String>,
    pub position: Option<String>,
    pub division: Option<String>,
    pub subdivision: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub role: String,
    pub status: String,
    pub login_attempts: i32,
    pub locked_until: Option<String>,
    pub expire_date: Option<String>,
    pub last_login: Option<String>,
    pub created_at: String,
}

impl AdminUserDto {
    #[must_use]
    pub fn from_model(user: &users::Model) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            full_name: user.full_name.clone(),
            rank: user.rank.clone(),
            position: user.position.clone(),
            division: user.division.clone(),
            subdivision: user.subdivision.clone(),
            phone: user.phone.clone(),
            email: user.email.clone(),
            role: user.role.clone(),
            status: user.status.clone(),
            login_attempts: user.login_attempts,
            locked_until: user.locked_until.clone(),
            expire_date: user.expire_date.clone(),
            last_login: user.last_login.clone(),
            created_at: user.created_at.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatsDto {
    pub total: u64,
    pub active: u64,
    pub pending: u64,
    pub locked: u64,
    pub expired: u64,
    pub expiring: u64,
    pub online: u64,
}

#[derive(Debug, Deserialize)]
pub struct UsersQuery {
    #[serde(default)]
    pub page: Option<u64>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub division: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserActionRequest {
    pub action: String,
    #[serde(default)]
    pub days: Option<i64>,
    #[serde(default)]
    pub expire_date: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkActionRequest {
    pub action: String,
    #[serde(default)]
    pub user_ids: Vec<i32>,
}

#[derive(Debug, Deserialize)]
pub struct ApproveAllRequest {
    #[serde(default)]
    pub days: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogsQuery {
    #[serde(default)]
    pub page: Option<u64>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub date_from: Option<String>,
    #[serde(default)]
    pub date_to: Option<String>,
    /// Filters on the action tag; named `type` on the wire.
    #[serde(default, rename = "type")]
    pub action: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChartsQuery {
    #[serde(default)]
    pub days: Option<i64>,
}

/// Audit log row joined with the actor's display name.
#[derive(Debug, Serialize)]
pub struct LogEntryDto {
    pub id: i64,
    pub user_id: Option<i32>,
    pub user_name: Option<String>,
    pub action: String,
    pub target_type: String,
    pub target_id: Option<i32>,
    pub details: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: String,
}

impl LogEntryDto {
    #[must_use]
    pub fn from_row(row: &LogEntryRow) -> Self {
        let details = row.entry.details.as_deref().map(|raw| {
            serde_json::from_str(raw)
                .unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
        });
        Self {
            id: row.entry.id,
            user_id: row.entry.user_id,
            user_name: row.user_name.clone(),
            action: row.entry.action.clone(),
            target_type: row.entry.target_type.clone(),
            target_id: row.entry.target_id,
            details,
            ip_address: row.entry.ip_address.clone(),
            user_agent: row.entry.user_agent.clone(),
            created_at: row.entry.created_at.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RenewalAdminDto {
    pub id: i32,
    pub user_id: i32,
    pub user_name: Option<String>,
    pub reason: Option<String>,
    pub status: String,
    pub created_at: String,
}

impl RenewalAdminDto {
    #[must_use]
    pub fn from_row(row: &RenewalRow) -> Self {
        Self {
            id: row.request.id,
            user_id: row.request.user_id,
            user_name: row.user_name.clone(),
            reason: row.request.reason.clone(),
            status: row.request.status.clone(),
            created_at: row.request.created_at.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ResolveRenewalRequest {
    pub action: String,
    #[serde(default)]
    pub days: Option<i64>,
}

pub type SettingsUpdateRequest = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Serialize)]
pub struct HealthDto {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime: u64,
    pub database: &'static str,
}
