//! Operator routes under `/v1/admin`, guarded by Basic credentials.

pub mod handlers;

use axum::{
    middleware,
    routing::{delete, get},
    Router,
};

use crate::http::server::AppState;
use crate::security::auth::basic_auth_middleware;
use self::handlers::*;

pub fn admin_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/v1/admin/status", get(get_status))
        .route("/v1/admin/limiter", get(get_limiter))
        .route("/v1/admin/cache", get(get_cache).delete(flush_cache))
        .route("/v1/admin/users/{id}", delete(delete_user))
        .route_layer(middleware::from_fn_with_state(state, basic_auth_middleware))
}
