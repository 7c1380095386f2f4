//! Social API library: admission control, authentication, authorization and
//! optimistic-concurrency writes over an abstract repository.

pub mod admin;
pub mod cache;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod mutation;
pub mod observability;
pub mod resilience;
pub mod security;
pub mod store;

pub use config::schema::AppConfig;
pub use http::{AppState, HttpServer};
pub use lifecycle::Shutdown;
pub use store::{MemoryStore, Storage};
