//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to target:
//!     → timeouts.rs (enforce per-call deadline)
//!     → On 403: proxy::retrier (refresh credentials, replay exactly once)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - No generic retries: only a forbidden response is retried, and only once

pub mod timeouts;

pub use timeouts::with_timeout;
