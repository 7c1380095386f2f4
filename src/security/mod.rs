//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (fixed window per client key; 429 + Retry-After)
//!     → auth.rs (bearer token → Identity; basic for operator routes)
//!     → authorization.rs (owner, or role level ≥ required)
//!     → handler
//! ```
//!
//! # Design Decisions
//! - Every gate is a hard stop: a rejection ends the request
//! - Fail closed: an unresolvable identity or role never grants access
//! - Authentication failures look identical from outside

pub mod auth;
pub mod authorization;
pub mod credentials;
pub mod rate_limit;

pub use auth::{AuthError, Authenticator, Identity, IdentityResolver, TokenAuthority};
pub use authorization::Authorizer;
pub use rate_limit::{Admission, FixedWindowLimiter};
