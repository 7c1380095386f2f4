//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to cache or repository:
//!     → timeouts.rs (enforce per-call deadline)
//!     → On timeout: caller decides (cache → miss, repository → 500)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - No automatic retries: a conflicting or failed write is surfaced to the
//!   client, which decides whether to reload and resubmit

pub mod timeouts;

pub use timeouts::{with_deadline, DeadlineExceeded};
