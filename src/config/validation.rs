//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (windows > 0, limits > 0, addresses parse)
//! - Cap lifetimes so deadline and expiry arithmetic cannot overflow
//! - Reject empty secrets
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::AppConfig;

/// Upper bound for every configured lifetime (one year).
pub const MAX_LIFETIME_SECS: u64 = 365 * 24 * 60 * 60;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Check a deserialized configuration for semantic errors.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be > 0"));
    }
    if config.timeouts.store_call_secs == 0 {
        errors.push(ValidationError::new("timeouts.store_call_secs", "must be > 0"));
    }

    if config.rate_limit.max_requests == 0 {
        errors.push(ValidationError::new("rate_limit.max_requests", "must be > 0"));
    }
    if config.rate_limit.window_secs == 0 {
        errors.push(ValidationError::new("rate_limit.window_secs", "must be > 0"));
    }

    if config.cache.ttl_secs == 0 {
        errors.push(ValidationError::new("cache.ttl_secs", "must be > 0"));
    }
    if config.auth.invitation_ttl_secs == 0 {
        errors.push(ValidationError::new("auth.invitation_ttl_secs", "must be > 0"));
    }

    for (field, secs) in [
        ("timeouts.request_secs", config.timeouts.request_secs),
        ("timeouts.store_call_secs", config.timeouts.store_call_secs),
        ("rate_limit.window_secs", config.rate_limit.window_secs),
        ("cache.ttl_secs", config.cache.ttl_secs),
        ("cache.jitter_secs", config.cache.jitter_secs),
        ("auth.invitation_ttl_secs", config.auth.invitation_ttl_secs),
        ("auth.jwt.expiry_secs", config.auth.jwt.expiry_secs),
        ("auth.jwt.leeway_secs", config.auth.jwt.leeway_secs),
    ] {
        if secs > MAX_LIFETIME_SECS {
            errors.push(ValidationError::new(
                field,
                format!("must be at most {MAX_LIFETIME_SECS} seconds"),
            ));
        }
    }

    if config.auth.jwt.secret.is_empty() {
        errors.push(ValidationError::new("auth.jwt.secret", "must not be empty"));
    }
    if config.auth.jwt.issuer.is_empty() {
        errors.push(ValidationError::new("auth.jwt.issuer", "must not be empty"));
    }
    if config.auth.jwt.audience.is_empty() {
        errors.push(ValidationError::new("auth.jwt.audience", "must not be empty"));
    }
    if config.auth.jwt.expiry_secs == 0 {
        errors.push(ValidationError::new("auth.jwt.expiry_secs", "must be > 0"));
    }
    if !(4..=31).contains(&config.auth.bcrypt_cost) {
        errors.push(ValidationError::new("auth.bcrypt_cost", "must be within 4..=31"));
    }
    if config.auth.basic.username.is_empty() || config.auth.basic.password.is_empty() {
        errors.push(ValidationError::new("auth.basic", "username and password are required"));
    }

    for (field, role) in [
        ("authorization.read_role", &config.authorization.read_role),
        ("authorization.update_role", &config.authorization.update_role),
        ("authorization.delete_role", &config.authorization.delete_role),
    ] {
        if role.is_empty() {
            errors.push(ValidationError::new(field, "must name a role"));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "must be a socket address when metrics are enabled",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
