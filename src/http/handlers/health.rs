use axum::extract::State;
use serde::Serialize;

use crate::http::error::Data;
use crate::http::server::AppState;

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub env: String,
    pub version: &'static str,
}

pub async fn health(State(state): State<AppState>) -> Data<Health> {
    Data(Health {
        status: "ok",
        env: state.config.env.clone(),
        version: env!("CARGO_PKG_VERSION"),
    })
}
