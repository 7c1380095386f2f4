use axum::{extract::State, http::StatusCode, Extension};

use crate::http::context::TargetUser;
use crate::http::error::{ApiError, ApiResult, Data};
use crate::http::server::AppState;
use crate::security::auth::Identity;
use crate::store::User;

pub async fn get_user(Extension(TargetUser(user)): Extension<TargetUser>) -> Data<User> {
    Data(user)
}

pub async fn follow_user(
    State(state): State<AppState>,
    Extension(Identity(me)): Extension<Identity>,
    Extension(TargetUser(target)): Extension<TargetUser>,
) -> ApiResult<StatusCode> {
    if me.id == target.id {
        return Err(ApiError::BadRequest("you cannot follow yourself".into()));
    }
    state
        .store(state.storage.followers.follow(me.id, target.id))
        .await?;
    tracing::info!(follower = me.id, followee = target.id, "Followed user");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn unfollow_user(
    State(state): State<AppState>,
    Extension(Identity(me)): Extension<Identity>,
    Extension(TargetUser(target)): Extension<TargetUser>,
) -> ApiResult<StatusCode> {
    state
        .store(state.storage.followers.unfollow(me.id, target.id))
        .await?;
    tracing::info!(follower = me.id, followee = target.id, "Unfollowed user");
    Ok(StatusCode::NO_CONTENT)
}
