//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the API.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the social API.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Deployment environment name ("development", "production").
    pub env: String,

    /// Listener configuration (bind address, client identification).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Admission control (fixed-window rate limiting).
    pub rate_limit: RateLimitConfig,

    /// Identity cache settings.
    pub cache: CacheConfig,

    /// Credential verification settings.
    pub auth: AuthConfig,

    /// Role requirements for post routes.
    pub authorization: AuthorizationConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Operator routes.
    pub admin: AdminConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            env: "development".to_string(),
            listener: ListenerConfig::default(),
            timeouts: TimeoutConfig::default(),
            rate_limit: RateLimitConfig::default(),
            cache: CacheConfig::default(),
            auth: AuthConfig::default(),
            authorization: AuthorizationConfig::default(),
            observability: ObservabilityConfig::default(),
            admin: AdminConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Derive the client key from `X-Real-IP` / `X-Forwarded-For`.
    /// Only enable behind a proxy that overwrites these headers.
    pub trust_forwarded_headers: bool,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            trust_forwarded_headers: false,
            max_body_size: 1024 * 1024,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Deadline for a single cache or repository call, in seconds.
    pub store_call_secs: u64,
}

impl TimeoutConfig {
    pub fn store_call(&self) -> Duration {
        Duration::from_secs(self.store_call_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 60,
            store_call_secs: 5,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Maximum requests per client inside one window.
    pub max_requests: u32,

    /// Window length in seconds. Also the sweep interval.
    pub window_secs: u64,
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 200,
            window_secs: 60,
        }
    }
}

/// Identity cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Use the in-memory backend. When false the no-op backend is used.
    pub enabled: bool,

    /// Base time-to-live of an entry in seconds.
    pub ttl_secs: u64,

    /// Upper bound (exclusive) of the random TTL extension, in seconds.
    pub jitter_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ttl_secs: 600,
            jitter_secs: 30,
        }
    }
}

/// Credential configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    pub jwt: JwtConfig,
    pub basic: BasicAuthConfig,

    /// How long an activation token stays valid, in seconds.
    pub invitation_ttl_secs: u64,

    /// bcrypt work factor for stored passwords.
    pub bcrypt_cost: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt: JwtConfig::default(),
            basic: BasicAuthConfig::default(),
            invitation_ttl_secs: 24 * 60 * 60,
            bcrypt_cost: 12,
        }
    }
}

/// Bearer token settings.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct JwtConfig {
    /// HMAC secret used to sign and verify tokens.
    pub secret: String,

    /// Expected `iss` claim.
    pub issuer: String,

    /// Expected `aud` claim.
    pub audience: String,

    /// Token lifetime in seconds.
    pub expiry_secs: u64,

    /// Clock skew tolerated on `exp` / `nbf`, in seconds.
    pub leeway_secs: u64,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"[REDACTED]")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("expiry_secs", &self.expiry_secs)
            .field("leeway_secs", &self.leeway_secs)
            .finish()
    }
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            // WARNING: This is a placeholder! Change this in production.
            secret: "CHANGE_ME_IN_PRODUCTION".to_string(),
            issuer: "social-api".to_string(),
            audience: "social-api".to_string(),
            expiry_secs: 60 * 60,
            leeway_secs: 0,
        }
    }
}

/// Basic credentials guarding the operator routes.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BasicAuthConfig {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for BasicAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuthConfig")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl Default for BasicAuthConfig {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            // WARNING: This is a placeholder! Change this in production.
            password: "CHANGE_ME_IN_PRODUCTION".to_string(),
        }
    }
}

/// Minimum role a non-owner needs for each post operation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthorizationConfig {
    pub read_role: String,
    pub update_role: String,
    pub delete_role: String,
}

impl Default for AuthorizationConfig {
    fn default() -> Self {
        Self {
            read_role: "moderator".to_string(),
            update_role: "moderator".to_string(),
            delete_role: "admin".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Operator route configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Mount the `/v1/admin` routes.
    pub enabled: bool,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [rate_limit]
            max_requests = 2
            window_secs = 1

            [cache]
            enabled = true
            "#,
        )
        .unwrap();

        assert_eq!(config.rate_limit.max_requests, 2);
        assert!(config.rate_limit.enabled);
        assert!(config.cache.enabled);
        assert_eq!(config.cache.ttl_secs, 600);
        assert_eq!(config.timeouts.store_call_secs, 5);
        assert_eq!(config.authorization.delete_role, "admin");
    }

    #[test]
    fn test_secrets_are_redacted_in_debug() {
        let config = AppConfig::default();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("CHANGE_ME_IN_PRODUCTION"));
    }
}
