//! Outbound authorization subsystem.
//!
//! # Data Flow
//! ```text
//! ServiceDefinition.credentials
//!     → factory.rs (pick variant: OAuth > Basic > None, attach CSRF)
//!     → strategy.rs (setup: write Authorization / CSRF headers)
//!         → oauth/token_source.rs (cached or coalesced token fetch)
//!             → oauth/endpoint.rs (client-credentials HTTP call)
//!         → csrf.rs (X-CSRF-Token handshake)
//!
//! On 403 from target:
//!     strategy.reset() → token_source.invalidate(client_id)
//! ```
//!
//! # Design Decisions
//! - Token sources are injected and shared by every strategy
//! - Token state is keyed by credentials, not by cache entry, so racing
//!   rebuilds of one service never diverge
//! - Reset clears secrets in place; the strategy object survives

pub mod csrf;
pub mod factory;
pub mod oauth;
pub mod strategy;

pub use csrf::{CsrfError, CsrfToken, CsrfTokenSource};
pub use factory::AuthorizationStrategyFactory;
pub use oauth::{HttpTokenEndpoint, OAuthTokenSource, TokenEndpoint, TokenError, TokenResponse};
pub use strategy::{AuthorizationError, AuthorizationStrategy, CsrfHandshake};
