use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;

use crate::http::error::{ApiError, ApiResult, Data};
use crate::http::handlers::check_len;
use crate::http::server::AppState;
use crate::security::auth::Identity;
use crate::store::{Comment, NewComment};

#[derive(Debug, Deserialize)]
pub struct CreateCommentPayload {
    pub post_id: i64,
    pub comment: String,
}

pub async fn create_comment(
    State(state): State<AppState>,
    Extension(Identity(user)): Extension<Identity>,
    payload: Result<Json<CreateCommentPayload>, JsonRejection>,
) -> ApiResult<(StatusCode, Data<Comment>)> {
    let Json(payload) = payload?;
    if payload.post_id <= 0 {
        return Err(ApiError::BadRequest("post_id must be positive".into()));
    }
    check_len("comment", &payload.comment, 1, 100)?;

    let comment = state
        .store(state.storage.comments.create(NewComment {
            post_id: payload.post_id,
            user_id: user.id,
            comment: payload.comment,
        }))
        .await?;

    tracing::info!(comment_id = comment.id, post_id = comment.post_id, "Comment created");
    Ok((StatusCode::CREATED, Data(comment)))
}
