use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::http::context::PostContext;
use crate::http::error::{ApiError, ApiResult, Data};
use crate::http::handlers::check_len;
use crate::http::server::AppState;
use crate::security::auth::Identity;
use crate::store::{Comment, NewPost, Post, PostUpdate};

const MAX_TITLE: usize = 100;
const MAX_CONTENT: usize = 1000;

#[derive(Debug, Deserialize)]
pub struct CreatePostPayload {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

pub async fn create_post(
    State(state): State<AppState>,
    Extension(Identity(user)): Extension<Identity>,
    payload: Result<Json<CreatePostPayload>, JsonRejection>,
) -> ApiResult<(StatusCode, Data<Post>)> {
    let Json(payload) = payload?;
    check_len("title", &payload.title, 1, MAX_TITLE)?;
    check_len("content", &payload.content, 1, MAX_CONTENT)?;

    let post = state
        .store(state.storage.posts.create(NewPost {
            user_id: user.id,
            title: payload.title,
            content: payload.content,
            tags: payload.tags,
        }))
        .await?;

    tracing::info!(post_id = post.id, user_id = user.id, "Post created");
    Ok((StatusCode::CREATED, Data(post)))
}

#[derive(Debug, Serialize)]
pub struct PostWithComments {
    #[serde(flatten)]
    pub post: Post,
    pub comments: Vec<Comment>,
}

pub async fn get_post(
    State(state): State<AppState>,
    Extension(PostContext(post)): Extension<PostContext>,
) -> ApiResult<Data<PostWithComments>> {
    let comments = state
        .store(state.storage.comments.list_for_post(post.id))
        .await?;
    Ok(Data(PostWithComments { post, comments }))
}

/// Partial update. `version` defaults to the version read when the request
/// loaded the post.
#[derive(Debug, Deserialize)]
pub struct UpdatePostPayload {
    pub title: Option<String>,
    pub content: Option<String>,
    pub version: Option<i64>,
}

pub async fn update_post(
    State(state): State<AppState>,
    Extension(PostContext(post)): Extension<PostContext>,
    payload: Result<Json<UpdatePostPayload>, JsonRejection>,
) -> ApiResult<Data<Post>> {
    let Json(payload) = payload?;
    if payload.title.is_none() && payload.content.is_none() {
        return Err(ApiError::BadRequest(
            "at least one of title or content is required".into(),
        ));
    }
    if let Some(title) = &payload.title {
        check_len("title", title, 1, MAX_TITLE)?;
    }
    if let Some(content) = &payload.content {
        check_len("content", content, 1, MAX_CONTENT)?;
    }

    // Omitted fields are filled in by the conditional write itself, from the
    // row at the presented version.
    let update = PostUpdate {
        id: post.id,
        version: payload.version.unwrap_or(post.version),
        title: payload.title,
        content: payload.content,
    };
    let updated = state.mutations.apply(update).await?;
    Ok(Data(updated))
}

pub async fn delete_post(
    State(state): State<AppState>,
    Extension(PostContext(post)): Extension<PostContext>,
) -> ApiResult<StatusCode> {
    state
        .store(state.storage.comments.delete_for_post(post.id))
        .await?;
    state.store(state.storage.posts.delete(post.id)).await?;

    tracing::info!(post_id = post.id, "Post deleted");
    Ok(StatusCode::NO_CONTENT)
}
