//! Request-scoped stages that load the resource named in the path.
//!
//! Each stage parses `{id}`, loads the entity and stores it in request
//! extensions under its own wrapper type, so handlers and the authorization
//! gate pick it up with `Extension<PostContext>` / `Extension<TargetUser>`.

use axum::{
    body::Body,
    extract::{Path, State},
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::http::error::ApiError;
use crate::http::server::AppState;
use crate::store::{Post, User};

/// The post addressed by `/v1/posts/{id}`.
#[derive(Debug, Clone)]
pub struct PostContext(pub Post);

/// The user addressed by `/v1/users/{id}`.
#[derive(Debug, Clone)]
pub struct TargetUser(pub User);

/// Positive integer id from a path segment.
pub fn parse_id(raw: &str) -> Result<i64, ApiError> {
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ApiError::BadRequest(format!("invalid id '{raw}'"))),
    }
}

pub async fn load_post_middleware(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let id = match parse_id(&raw_id) {
        Ok(id) => id,
        Err(e) => return e.into_response(),
    };
    match state.store(state.storage.posts.get(id)).await {
        Ok(post) => {
            request.extensions_mut().insert(PostContext(post));
            next.run(request).await
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}

pub async fn load_target_user_middleware(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let id = match parse_id(&raw_id) {
        Ok(id) => id,
        Err(e) => return e.into_response(),
    };
    match state.store(state.storage.users.get_by_id(id)).await {
        Ok(user) => {
            request.extensions_mut().insert(TargetUser(user));
            next.run(request).await
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}
