//! Authorization gate: resource owner, or a role at least as high as required.
//!
//! Role levels come from the role store on every decision. A token never
//! carries a level, so a demotion takes effect on the next request.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::http::context::PostContext;
use crate::http::error::ApiError;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::resilience::with_deadline;
use crate::security::auth::Identity;
use crate::store::{RoleRepository, StoreError, StoreResult, User};

pub struct Authorizer {
    roles: Arc<dyn RoleRepository>,
    deadline: Duration,
}

impl Authorizer {
    pub fn new(roles: Arc<dyn RoleRepository>, deadline: Duration) -> Self {
        Self { roles, deadline }
    }

    async fn level_of(&self, role: &str) -> StoreResult<i32> {
        with_deadline(self.deadline, self.roles.level_of(role))
            .await
            .map_err(StoreError::from)?
    }

    /// `Ok(true)` when `identity` owns the resource or its role level is at
    /// least the level of `required_role`. A role that cannot be resolved is
    /// an error, not a denial.
    pub async fn authorize(
        &self,
        identity: &User,
        owner_id: i64,
        required_role: &str,
    ) -> StoreResult<bool> {
        if identity.id == owner_id {
            return Ok(true);
        }
        let required = self.level_of(required_role).await?;
        let held = self.level_of(&identity.role).await?;
        Ok(held >= required)
    }
}

/// Role a non-owner needs for `method` on a post.
fn required_role<'a>(state: &'a AppState, method: &Method) -> &'a str {
    let policy = &state.config.authorization;
    match *method {
        Method::DELETE => &policy.delete_role,
        Method::GET | Method::HEAD => &policy.read_role,
        _ => &policy.update_role,
    }
}

/// Gate for `/v1/posts/{id}`. Runs after authentication and the post-context
/// stage.
pub async fn post_authorization_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let (Some(Identity(user)), Some(PostContext(post))) = (
        request.extensions().get::<Identity>(),
        request.extensions().get::<PostContext>(),
    ) else {
        return ApiError::Internal("authorization ran without identity or post".into())
            .into_response();
    };

    let role = required_role(&state, request.method());
    match state.authorizer.authorize(user, post.user_id, role).await {
        Ok(true) => next.run(request).await,
        Ok(false) => {
            tracing::warn!(
                user_id = user.id,
                role = %user.role,
                required = role,
                post_id = post.id,
                "Authorization denied"
            );
            metrics::record_authz_denial();
            ApiError::Forbidden.into_response()
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}
