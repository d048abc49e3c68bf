use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{delete, get, post, put},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::{LifecycleController, SessionManager};
use crate::config::Config;
use crate::db::Store;

pub mod admin;
pub mod auth;
mod error;
pub mod guard;
mod observability;
mod system;
mod types;

pub use error::ApiError;
pub use types::*;

use metrics_exporter_prometheus::PrometheusHandle;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,

    pub store: Store,

    pub sessions: SessionManager,

    pub lifecycle: LifecycleController,

    pub start_time: std::time::Instant,

    pub prometheus_handle: Option<PrometheusHandle>,
}

/// Connects the store (running migrations) and wires the domain layer.
pub async fn create_app_state(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let store = Store::with_pool_options(
        &config.general.database_url,
        config.general.max_db_connections,
        config.general.min_db_connections,
    )
    .await?;

    let sessions = SessionManager::new(store.clone());
    let lifecycle =
        LifecycleController::new(store.clone(), sessions.clone(), config.security.clone());

    Ok(Arc::new(AppState {
        config,
        store,
        sessions,
        lifecycle,
        start_time: std::time::Instant::now(),
        prometheus_handle,
    }))
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors_origins = state.config.server.cors_allowed_origins.clone();

    let api_router = Router::new()
        .nest("/auth", auth_routes(state.clone()))
        .nest("/admin", admin_routes(state.clone()))
        .route("/health", get(system::health))
        .route("/metrics", get(observability::get_metrics))
        .with_state(state);

    let cors_layer = if cors_origins.contains(&"*".to_string()) {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .nest("/api", api_router)
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(observability::security_headers))
        .layer(middleware::from_fn(observability::track_metrics))
}

fn auth_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let protected = Router::new()
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .route("/renew-request", post(auth::renew_request))
        .route_layer(middleware::from_fn_with_state(state, guard::require_auth));

    Router::new()
        .route("/login", post(auth::login))
        .route("/register", post(auth::register))
        .route("/settings", get(auth::public_settings))
        .merge(protected)
}

fn admin_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/stats", get(admin::stats))
        .route("/stats/charts", get(admin::log_charts))
        .route("/users", get(admin::list_users))
        .route("/users/bulk", post(admin::bulk_action))
        .route("/users/approve-all", post(admin::approve_all))
        .route("/users/{id}", put(admin::update_user))
        .route("/users/{id}", delete(admin::delete_user))
        .route("/users/{id}/reset-password", post(admin::reset_password))
        .route("/divisions", get(admin::divisions))
        .route("/logs", get(admin::logs))
        .route("/renewal-requests", get(admin::list_renewals))
        .route("/renewal-requests/{id}", put(admin::resolve_renewal))
        .route("/settings", get(admin::get_settings))
        .route("/settings", put(admin::update_settings))
        // Guards run outermost-first: authenticate, then check the role
        .route_layer(middleware::from_fn(guard::require_super_admin))
        .route_layer(middleware::from_fn_with_state(state, guard::require_auth))
}
