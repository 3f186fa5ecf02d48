//! Credential-injecting forwarding subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → dispatcher.rs (resolve service ID from Host)
//!     → cache.rs (entry hit, or metadata lookup + factory on miss)
//!     → forward.rs (strategy setup, join target URL, send with timeout)
//!     → retrier.rs (on first 403: reset, rebuild entry, replay once)
//!     → http::response (stream target response back)
//!
//! Failures:
//!     → error.rs (ProxyError → JSON {status, code, message} with mapped status)
//! ```
//!
//! # Design Decisions
//! - Request bodies are buffered so the retry replays identical bytes
//! - Cache entries are immutable; a rebuild replaces, never mutates
//! - Every outbound call has its own deadline

pub mod cache;
pub mod dispatcher;
pub mod error;
pub mod forward;
pub mod retrier;

pub use cache::{CacheEntry, ProxyCache};
pub use dispatcher::{DispatchLimits, ProxyDispatcher};
pub use error::{error_response, ProxyError};
pub use retrier::ForbiddenRetrier;
