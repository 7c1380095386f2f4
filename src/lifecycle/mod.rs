//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → metrics exporter → storage → services → bind listener → serve
//!
//! Shutdown (shutdown.rs):
//!     Trigger → stop accepting → drain in-flight requests → stop sweeper → exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then core services, then listeners
//! - Fail fast: any startup error is fatal
//! - Background tasks are owned by the component that started them and are
//!   stopped explicitly, not left to process exit

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{run, StartupError};
