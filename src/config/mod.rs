//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → shared to all subsystems at startup
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → server swaps the static service table and clears the proxy cache
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; only the service table is hot-reloaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{
    BasicCredentialsConfig, CertificateGenConfig, CredentialsConfig, CsrfConfig, ListenerConfig,
    LogFormat, OAuthConfig, OAuthCredentialsConfig, ObservabilityConfig, ProxyConfig,
    ProxySettings, ResolverConfig, ServiceConfig,
};
