use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use serde::Serialize;

use crate::cache::CacheStats;
use crate::http::context::parse_id;
use crate::http::error::{ApiResult, Data};
use crate::http::server::AppState;
use crate::security::rate_limit::LimiterStats;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub env: String,
    pub uptime_secs: u64,
}

pub async fn get_status(State(state): State<AppState>) -> Data<SystemStatus> {
    Data(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        env: state.config.env.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

#[derive(Serialize)]
pub struct LimiterStatus {
    pub enabled: bool,
    #[serde(flatten)]
    pub stats: LimiterStats,
}

pub async fn get_limiter(State(state): State<AppState>) -> Data<LimiterStatus> {
    Data(LimiterStatus {
        enabled: state.config.rate_limit.enabled,
        stats: state.limiter.stats(),
    })
}

pub async fn get_cache(State(state): State<AppState>) -> Data<CacheStats> {
    Data(state.cache.stats())
}

#[derive(Serialize)]
pub struct Flushed {
    pub removed: usize,
}

pub async fn flush_cache(State(state): State<AppState>) -> Data<Flushed> {
    let removed = state.cache.flush();
    tracing::info!(removed, "Identity cache flushed");
    Data(Flushed { removed })
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_id(&raw_id)?;
    state.store(state.storage.users.delete(id)).await?;
    if let Err(e) = state.cache.delete(id).await {
        tracing::warn!(user_id = id, error = %e, "Failed to evict deleted user from cache");
    }
    tracing::info!(user_id = id, "User deleted by operator");
    Ok(StatusCode::NO_CONTENT)
}
