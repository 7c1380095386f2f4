//! Authentication gate.
//!
//! # Responsibilities
//! - Verify `Authorization: Bearer <jwt>` and resolve the caller's `User`
//! - Verify `Authorization: Basic <b64>` for operator routes
//! - Issue tokens for the token endpoint
//!
//! # Data Flow
//! ```text
//! header → scheme check → signature/exp/nbf/iss/aud → sub → i64
//!     → IdentityResolver (cache, then repository)
//!     → Identity in request extensions
//! ```
//!
//! # Design Decisions
//! - Checks run in a fixed order; the first failure wins
//! - Every failure answers 401 "invalid authorization"; the cause is only
//!   logged, never returned
//! - Tokens carry the subject id only; role and level are looked up per request

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::Engine;
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::cache::UserCache;
use crate::config::{BasicAuthConfig, JwtConfig};
use crate::http::error::ApiError;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::resilience::with_deadline;
use crate::store::{StoreError, User, UserRepository};

/// The authenticated caller, attached to the request by `bearer_auth_middleware`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity(pub User);

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("authorization header missing")]
    MissingHeader,
    #[error("authorization header malformed")]
    MalformedHeader,
    #[error("unexpected authorization scheme")]
    WrongScheme,
    #[error("token rejected: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
    #[error("token subject is not a user id")]
    InvalidSubject,
    #[error("identity lookup failed: {0}")]
    Identity(#[from] StoreError),
    #[error("basic credentials do not match")]
    BadCredentials,
}

impl AuthError {
    /// Metric label for the stage that rejected the request.
    pub fn stage(&self) -> &'static str {
        match self {
            AuthError::MissingHeader | AuthError::MalformedHeader | AuthError::WrongScheme => {
                "header"
            }
            AuthError::InvalidToken(_) => "token",
            AuthError::InvalidSubject => "subject",
            AuthError::Identity(_) => "identity",
            AuthError::BadCredentials => "basic",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

/// Signs and verifies bearer tokens.
pub struct TokenAuthority {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    issuer: String,
    audience: String,
    lifetime: Duration,
}

impl TokenAuthority {
    pub fn new(config: &JwtConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.set_audience(&[config.audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "nbf", "iss", "aud", "sub"]);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.leeway = config.leeway_secs;

        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            lifetime: Duration::from_secs(config.expiry_secs),
        }
    }

    /// Claims for a token issued now.
    pub fn claims_for(&self, user_id: i64) -> Claims {
        let now = Utc::now().timestamp();
        Claims {
            sub: user_id.to_string(),
            iat: now,
            nbf: now,
            exp: now + self.lifetime.as_secs() as i64,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        }
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, AuthError> {
        Ok(encode(&Header::new(Algorithm::HS256), claims, &self.encoding)?)
    }

    pub fn issue(&self, user_id: i64) -> Result<String, AuthError> {
        self.sign(&self.claims_for(user_id))
    }

    /// Verify a token and return its subject as a user id.
    pub fn verify(&self, token: &str) -> Result<i64, AuthError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)?;
        data.claims
            .sub
            .parse::<i64>()
            .map_err(|_| AuthError::InvalidSubject)
    }
}

/// Cache-aside lookup of a user by id.
pub struct IdentityResolver {
    users: Arc<dyn UserRepository>,
    cache: Arc<UserCache>,
    deadline: Duration,
}

impl IdentityResolver {
    pub fn new(users: Arc<dyn UserRepository>, cache: Arc<UserCache>, deadline: Duration) -> Self {
        Self {
            users,
            cache,
            deadline,
        }
    }

    pub async fn resolve(&self, user_id: i64) -> Result<User, AuthError> {
        if let Some(user) = self.cache.get(user_id).await {
            tracing::debug!(user_id, "Identity served from cache");
            return Ok(user);
        }

        let user = with_deadline(self.deadline, self.users.get_by_id(user_id))
            .await
            .map_err(StoreError::from)??;
        tracing::debug!(user_id, "Identity loaded from repository");
        self.cache.set(&user).await;
        Ok(user)
    }
}

/// Bearer verification plus identity resolution.
pub struct Authenticator {
    pub tokens: TokenAuthority,
    pub identities: IdentityResolver,
}

impl Authenticator {
    pub fn new(tokens: TokenAuthority, identities: IdentityResolver) -> Self {
        Self { tokens, identities }
    }

    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<User, AuthError> {
        let token = credential(headers, "Bearer")?;
        let user_id = self.tokens.verify(token)?;
        self.identities.resolve(user_id).await
    }
}

/// Split `<scheme> <credential>` and check the scheme.
fn credential<'a>(headers: &'a HeaderMap, scheme: &str) -> Result<&'a str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingHeader)?
        .to_str()
        .map_err(|_| AuthError::MalformedHeader)?;
    let (given, rest) = value.split_once(' ').ok_or(AuthError::MalformedHeader)?;
    if given != scheme {
        return Err(AuthError::WrongScheme);
    }
    let rest = rest.trim();
    if rest.is_empty() {
        return Err(AuthError::MalformedHeader);
    }
    Ok(rest)
}

/// Check `Authorization: Basic` against the configured operator credentials.
pub fn verify_basic(headers: &HeaderMap, expected: &BasicAuthConfig) -> Result<(), AuthError> {
    let encoded = credential(headers, "Basic")?;
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|_| AuthError::MalformedHeader)?;
    let decoded = String::from_utf8(decoded).map_err(|_| AuthError::MalformedHeader)?;
    let (username, password) = decoded.split_once(':').ok_or(AuthError::MalformedHeader)?;

    let user_ok = constant_time_eq(username.as_bytes(), expected.username.as_bytes());
    let pass_ok = constant_time_eq(password.as_bytes(), expected.password.as_bytes());
    if user_ok & pass_ok {
        Ok(())
    } else {
        Err(AuthError::BadCredentials)
    }
}

/// Compares digests so neither the contents nor the length of the
/// configured value shows in timing.
fn constant_time_eq(given: &[u8], expected: &[u8]) -> bool {
    let given = Sha256::digest(given);
    let expected = Sha256::digest(expected);
    given.ct_eq(&expected).into()
}

fn reject(request: &Request<Body>, error: &AuthError) {
    tracing::warn!(
        stage = error.stage(),
        error = %error,
        method = %request.method(),
        path = %request.uri().path(),
        "Authentication rejected"
    );
    metrics::record_auth_rejection(error.stage());
}

pub async fn bearer_auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    match state.authenticator.authenticate(request.headers()).await {
        Ok(user) => {
            request.extensions_mut().insert(Identity(user));
            next.run(request).await
        }
        Err(e) => {
            reject(&request, &e);
            ApiError::Unauthorized.into_response()
        }
    }
}

pub async fn basic_auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    match verify_basic(request.headers(), &state.config.auth.basic) {
        Ok(()) => next.run(request).await,
        Err(e) => {
            reject(&request, &e);
            ApiError::BasicUnauthorized.into_response()
        }
    }
}
