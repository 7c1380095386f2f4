//! Error responses.
//!
//! Every failure leaves the API as `{"error": "..."}` with a status from the
//! table below. Internal detail is logged here and never returned.
//!
//! | variant             | status |
//! |---------------------|--------|
//! | `BadRequest`        | 400    |
//! | `Unauthorized`      | 401    |
//! | `BasicUnauthorized` | 401 + `WWW-Authenticate` |
//! | `Forbidden`         | 403    |
//! | `NotFound`          | 404    |
//! | `Conflict`          | 409    |
//! | `RateLimited`       | 429 + `Retry-After` |
//! | `Internal`          | 500    |

use std::time::Duration;

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

use crate::mutation::MutationError;
use crate::security::credentials::CredentialError;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("invalid authorization")]
    Unauthorized,
    #[error("invalid authorization")]
    BasicUnauthorized,
    #[error("not permitted")]
    Forbidden,
    #[error("resource not found")]
    NotFound,
    #[error("edit conflict: the resource changed, reload and try again")]
    Conflict,
    #[error("rate limit exceeded")]
    RateLimited { retry_after: Duration },
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized | ApiError::BasicUnauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Conflict => StatusCode::CONFLICT,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Whole seconds, rounded up, never below one.
fn retry_after_secs(wait: Duration) -> u64 {
    let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
    secs.max(1)
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "Request failed");
                "the server encountered a problem and could not process your request".to_string()
            }
            other => other.to_string(),
        };

        let mut response = (status, Json(json!({ "error": message }))).into_response();
        match self {
            ApiError::RateLimited { retry_after } => {
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs(retry_after)));
            }
            ApiError::BasicUnauthorized => {
                response.headers_mut().insert(
                    header::WWW_AUTHENTICATE,
                    HeaderValue::from_static(r#"Basic realm="restricted", charset="UTF-8""#),
                );
            }
            _ => {}
        }
        response
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => ApiError::NotFound,
            StoreError::DuplicateEmail
            | StoreError::DuplicateUsername
            | StoreError::InvalidToken => ApiError::BadRequest(e.to_string()),
            StoreError::UnknownRole(_) | StoreError::Unavailable(_) => {
                ApiError::Internal(e.to_string())
            }
        }
    }
}

impl From<MutationError> for ApiError {
    fn from(e: MutationError) -> Self {
        match e {
            MutationError::Conflict { .. } => ApiError::Conflict,
            MutationError::Store(e) => e.into(),
        }
    }
}

impl From<CredentialError> for ApiError {
    fn from(e: CredentialError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::BadRequest(e.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(e: PathRejection) -> Self {
        ApiError::BadRequest(e.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(e: QueryRejection) -> Self {
        ApiError::BadRequest(e.body_text())
    }
}

/// Success envelope: `{"data": ...}`.
#[derive(Debug, Serialize)]
pub struct Data<T>(pub T);

impl<T: Serialize> IntoResponse for Data<T> {
    fn into_response(self) -> Response {
        Json(json!({ "data": self.0 })).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
