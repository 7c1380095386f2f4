//! Mutation subsystem.
//!
//! # Data Flow
//! ```text
//! PATCH /v1/posts/{id}
//!     → coordinator.rs (PostUpdate{id, version, changed fields})
//!     → PostRepository::update (conditional on version; unchanged fields
//!       are taken from the matched row inside the same write)
//!         stored row at new version → 200
//!         no row matched → Conflict → 409
//! ```
//!
//! # Design Decisions
//! - One attempt per request; a conflict goes back to the client
//! - Versions only move forward, and only through the coordinator

pub mod coordinator;

pub use coordinator::{MutationCoordinator, MutationError};
