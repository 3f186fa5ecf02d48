//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (Host header or URI authority)
//!     → resolver.rs (strip port, first label, strip re-<env>- prefix)
//!     → Return: service ID or None (400)
//! ```
//!
//! # Design Decisions
//! - Routing is by host only; the path is forwarded untouched
//! - Deterministic: same host always yields the same service ID
//! - No regex in hot path

pub mod resolver;

pub use resolver::NameResolver;
