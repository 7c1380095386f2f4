//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, timeout, body limit, tracing)
//!     → security (admission, authentication)
//!     → context.rs (load the post / user named in the path)
//!     → security (authorization for post routes)
//!     → handlers/ (validate payload, call repositories or the mutation coordinator)
//!     → error.rs ({"data": ...} or {"error": ...})
//! ```

pub mod context;
pub mod error;
pub mod handlers;
pub mod server;

pub use error::{ApiError, ApiResult, Data};
pub use server::{build_router, AppState, HttpServer};
