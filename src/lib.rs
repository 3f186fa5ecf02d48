//! Host-routed reverse proxy that injects per-service credentials.

pub mod authorization;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod metadata;
pub mod observability;
pub mod proxy;
pub mod resilience;
pub mod routing;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use proxy::ProxyDispatcher;
