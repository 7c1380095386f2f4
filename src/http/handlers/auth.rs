//! Registration, activation and token issuance.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::http::error::{ApiError, ApiResult, Data};
use crate::http::handlers::check_len;
use crate::http::server::AppState;
use crate::security::credentials::{hash_password, hash_token, verify_password, Invitation};
use crate::store::{NewUser, StoreError, User};

#[derive(Debug, Deserialize)]
pub struct RegisterPayload {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl RegisterPayload {
    fn validate(&self) -> Result<(), ApiError> {
        check_len("email", &self.email, 1, 255)?;
        if !self.email.contains('@') {
            return Err(ApiError::BadRequest("email must be a valid address".into()));
        }
        check_len("username", &self.username, 8, 20)?;
        check_len("password", &self.password, 8, 50)?;
        Ok(())
    }
}

/// A newly registered user plus the plain activation token.
#[derive(Debug, Serialize)]
pub struct Registration {
    #[serde(flatten)]
    pub user: User,
    pub token: String,
}

fn invitation_expiry(ttl_secs: u64) -> Result<chrono::DateTime<chrono::Utc>, ApiError> {
    i64::try_from(ttl_secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .and_then(|ttl| chrono::Utc::now().checked_add_signed(ttl))
        .ok_or_else(|| ApiError::Internal(format!("invitation ttl {ttl_secs}s out of range")))
}

pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterPayload>, JsonRejection>,
) -> ApiResult<(StatusCode, Data<Registration>)> {
    let Json(payload) = payload?;
    payload.validate()?;

    let password_hash = hash_password(payload.password, state.config.auth.bcrypt_cost).await?;
    let invitation = Invitation::generate();
    let expires_at = invitation_expiry(state.config.auth.invitation_ttl_secs)?;

    let user = state
        .store(state.storage.users.create_and_invite(
            NewUser {
                username: payload.username,
                email: payload.email,
                password_hash,
                role: "user".to_string(),
            },
            invitation.token_hash,
            expires_at,
        ))
        .await?;

    tracing::info!(user_id = user.id, username = %user.username, "User registered");
    Ok((
        StatusCode::CREATED,
        Data(Registration {
            user,
            token: invitation.token,
        }),
    ))
}

pub async fn activate(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ApiResult<Data<&'static str>> {
    if token.trim().is_empty() {
        return Err(ApiError::BadRequest("missing token".into()));
    }

    let user_id = state.store(state.storage.users.activate(&hash_token(&token))).await?;
    if let Err(e) = state.cache.delete(user_id).await {
        tracing::warn!(user_id, error = %e, "Failed to evict activated user from cache");
    }

    tracing::info!(user_id, "User activated");
    Ok(Data("user activated"))
}

#[derive(Debug, Deserialize)]
pub struct TokenPayload {
    pub email: String,
    pub password: String,
}

/// Exchange email and password for a bearer token. Every credential problem
/// answers the same 401.
pub async fn create_token(
    State(state): State<AppState>,
    payload: Result<Json<TokenPayload>, JsonRejection>,
) -> ApiResult<(StatusCode, Data<String>)> {
    let Json(payload) = payload.map_err(|_| ApiError::Unauthorized)?;
    if check_len("email", &payload.email, 1, 255).is_err()
        || check_len("password", &payload.password, 8, 50).is_err()
    {
        return Err(ApiError::Unauthorized);
    }

    let credentials = match state
        .store(state.storage.users.get_credentials_by_email(&payload.email))
        .await
    {
        Ok(c) => c,
        Err(StoreError::NotFound) => {
            tracing::warn!("Token requested for unknown email");
            return Err(ApiError::Unauthorized);
        }
        Err(e) => return Err(e.into()),
    };

    let user = credentials.user;
    if !verify_password(payload.password, credentials.password_hash).await? {
        tracing::warn!(user_id = user.id, "Token requested with wrong password");
        return Err(ApiError::Unauthorized);
    }
    if !user.is_active {
        tracing::warn!(user_id = user.id, "Token requested for inactive user");
        return Err(ApiError::Unauthorized);
    }

    let token = state
        .authenticator
        .tokens
        .issue(user.id)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    tracing::info!(user_id = user.id, "Token issued");
    Ok((StatusCode::CREATED, Data(token)))
}
