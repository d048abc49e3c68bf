//! Management surface, super admin only.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::HeaderMap,
};
use chrono::Utc;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::guard::{Principal, request_meta};
use super::types::{
    AdminUserDto, ApproveAllRequest, BulkActionRequest, ChartsQuery, LogEntryDto, LogsQuery,
    PagedResponse, PaginationDto, RenewalAdminDto, ResetPasswordRequest, ResolveRenewalRequest,
    SettingsUpdateRequest, StatsDto, UserActionRequest, UsersQuery,
};
use super::{ApiError, ApiResponse, AppState};
use crate::auth::BulkAction;
use crate::db::{AccountFilter, ActivityCharts, LogFilter};

const DEFAULT_USERS_PAGE_SIZE: u64 = 10;
const DEFAULT_LOGS_PAGE_SIZE: u64 = 15;
const DEFAULT_CHART_DAYS: i64 = 30;

/// GET /api/admin/stats
pub async fn stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<StatsDto>>, ApiError> {
    let now = Utc::now();
    let rollup = state.store.accounts().stats(now.date_naive()).await?;
    let online = state.store.sessions().count_live(&now.to_rfc3339()).await?;

    Ok(Json(ApiResponse::success(StatsDto {
        total: rollup.total,
        active: rollup.active,
        pending: rollup.pending,
        locked: rollup.locked,
        expired: rollup.expired,
        expiring: rollup.expiring,
        online,
    })))
}

/// GET /api/admin/users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UsersQuery>,
) -> Result<Json<PagedResponse<AdminUserDto>>, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(DEFAULT_USERS_PAGE_SIZE).clamp(1, 100);
    let filter = AccountFilter {
        search: query.search,
        division: query.division,
        status: query.status,
    };

    let result = state.store.accounts().search(&filter, page, limit).await?;
    let users = result
        .accounts
        .iter()
        .map(AdminUserDto::from_model)
        .collect();

    Ok(Json(PagedResponse::new(
        users,
        PaginationDto {
            page,
            limit,
            total: result.total_items,
            total_pages: result.total_pages,
        },
    )))
}

/// GET /api/admin/divisions
pub async fn divisions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<String>>>, ApiError> {
    let divisions = state.store.accounts().divisions().await?;
    Ok(Json(ApiResponse::success(divisions)))
}

/// PUT /api/admin/users/{id}
///
/// One endpoint, several actions: approve, reject, lock, unlock, save.
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<i32>,
    headers: HeaderMap,
    Json(payload): Json<UserActionRequest>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let meta = request_meta(&headers);
    let lifecycle = &state.lifecycle;

    let message = match payload.action.as_str() {
        "approve" => {
            lifecycle.approve(principal.id, id, payload.days, &meta).await?;
            "User approved"
        }
        "reject" => {
            lifecycle.reject(principal.id, id, &meta).await?;
            "User rejected"
        }
        "lock" => {
            lifecycle.lock(principal.id, id, &meta).await?;
            "Account locked"
        }
        "unlock" => {
            lifecycle.unlock(principal.id, id, &meta).await?;
            "Account unlocked"
        }
        "save" => {
            lifecycle
                .save_expire_date(principal.id, id, payload.expire_date.as_deref(), &meta)
                .await?;
            "Expire date saved"
        }
        _ => return Err(ApiError::validation("Unknown action")),
    };

    Ok(Json(ApiResponse::message(message)))
}

/// POST /api/admin/users/{id}/reset-password
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<i32>,
    headers: HeaderMap,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let meta = request_meta(&headers);
    state
        .lifecycle
        .reset_password(principal.id, id, &payload.new_password, &meta)
        .await?;
    Ok(Json(ApiResponse::message("Password reset")))
}

/// POST /api/admin/users/bulk
pub async fn bulk_action(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    headers: HeaderMap,
    Json(payload): Json<BulkActionRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let Some(action) = BulkAction::parse(&payload.action) else {
        return Err(ApiError::validation("Unknown action"));
    };

    let meta = request_meta(&headers);
    let affected = state
        .lifecycle
        .bulk(principal.id, action, &payload.user_ids, &meta)
        .await?;

    let message = match action {
        BulkAction::Approve => format!("Approved {affected} users"),
        BulkAction::Lock => format!("Locked {affected} users"),
        BulkAction::Unlock => format!("Unlocked {affected} users"),
        BulkAction::Extend30 => format!("Extended {affected} users by 30 days"),
        BulkAction::Extend365 => format!("Extended {affected} users by 365 days"),
        BulkAction::Delete => format!("Deleted {affected} users"),
    };
    Ok(Json(ApiResponse::success_with_message(
        json!({ "affected": affected }),
        message,
    )))
}

/// POST /api/admin/users/approve-all
pub async fn approve_all(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    headers: HeaderMap,
    Json(payload): Json<ApproveAllRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let meta = request_meta(&headers);
    let count = state
        .lifecycle
        .approve_all(principal.id, payload.days, &meta)
        .await?;
    Ok(Json(ApiResponse::success_with_message(
        json!({ "count": count }),
        format!("Approved {count} pending users"),
    )))
}

/// DELETE /api/admin/users/{id}
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<i32>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let meta = request_meta(&headers);
    state.lifecycle.delete(principal.id, id, &meta).await?;
    Ok(Json(ApiResponse::message("User deleted")))
}

/// GET /api/admin/logs
pub async fn logs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<PagedResponse<LogEntryDto>>, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(DEFAULT_LOGS_PAGE_SIZE).clamp(1, 100);
    let filter = LogFilter {
        search: query.search,
        date_from: query.date_from,
        date_to: query.date_to,
        action: query.action,
    };

    let result = state.store.activity().list(&filter, page, limit).await?;
    let entries = result.entries.iter().map(LogEntryDto::from_row).collect();

    Ok(Json(PagedResponse::new(
        entries,
        PaginationDto {
            page,
            limit,
            total: result.total_items,
            total_pages: result.total_pages,
        },
    )))
}

/// GET /api/admin/stats/charts
pub async fn log_charts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ChartsQuery>,
) -> Result<Json<ApiResponse<ActivityCharts>>, ApiError> {
    let days = query.days.unwrap_or(DEFAULT_CHART_DAYS).clamp(1, 365);
    let charts = state
        .store
        .activity()
        .charts(days, Utc::now().date_naive())
        .await?;
    Ok(Json(ApiResponse::success(charts)))
}

/// GET /api/admin/renewal-requests
pub async fn list_renewals(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<RenewalAdminDto>>>, ApiError> {
    let rows = state.store.renewals().list_with_names().await?;
    let requests = rows.iter().map(RenewalAdminDto::from_row).collect();
    Ok(Json(ApiResponse::success(requests)))
}

/// PUT /api/admin/renewal-requests/{id}
pub async fn resolve_renewal(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<i32>,
    headers: HeaderMap,
    Json(payload): Json<ResolveRenewalRequest>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let approve = match payload.action.as_str() {
        "approve" => true,
        "reject" => false,
        _ => return Err(ApiError::validation("Unknown action")),
    };

    let meta = request_meta(&headers);
    state
        .lifecycle
        .resolve_renewal(principal.id, id, approve, payload.days, &meta)
        .await?;

    let message = if approve {
        "Renewal approved"
    } else {
        "Renewal rejected"
    };
    Ok(Json(ApiResponse::message(message)))
}

/// GET /api/admin/settings
pub async fn get_settings(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<BTreeMap<String, String>>>, ApiError> {
    let rows = state.store.settings().all().await?;
    let settings: BTreeMap<String, String> = rows
        .into_iter()
        .map(|row| (row.setting_key, row.setting_value))
        .collect();
    Ok(Json(ApiResponse::success(settings)))
}

/// PUT /api/admin/settings
pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    headers: HeaderMap,
    Json(payload): Json<SettingsUpdateRequest>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let meta = request_meta(&headers);
    state
        .lifecycle
        .update_settings(principal.id, payload, &meta)
        .await?;
    Ok(Json(ApiResponse::message("Settings saved")))
}
