//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the service proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Forwarding, caching and TLS behaviour.
    pub proxy: ProxySettings,

    /// OAuth token endpoint settings.
    pub oauth: OAuthConfig,

    /// Host name to service ID resolution.
    pub resolver: ResolverConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Static service definitions served by the built-in metadata source.
    pub services: Vec<ServiceConfig>,
}

/// Listener configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Proxy behaviour shared by every service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxySettings {
    /// Timeout for each outbound call to a target, in seconds.
    /// The initial call and the forbidden retry each get their own budget.
    pub timeout_secs: u64,

    /// Skip TLS certificate verification for target services (process-wide).
    pub skip_verify: bool,

    /// How long a cache entry stays fresh, in seconds.
    pub cache_ttl_secs: u64,

    /// Interval of the expired-entry sweeper in seconds. Zero disables it.
    pub cache_sweep_interval_secs: u64,

    /// Maximum inbound body size buffered for forwarding and replay.
    pub max_body_bytes: usize,
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            skip_verify: false,
            cache_ttl_secs: 120,
            cache_sweep_interval_secs: 60,
            max_body_bytes: 10 * 1024 * 1024, // 10MB
        }
    }
}

/// OAuth client-credentials settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OAuthConfig {
    /// Timeout for token endpoint and CSRF endpoint calls, in seconds.
    pub token_timeout_secs: u64,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            token_timeout_secs: 10,
        }
    }
}

/// Settings for extracting service IDs from host names.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ResolverConfig {
    /// Remote environment name; hosts are prefixed with `re-<name>-`.
    pub remote_environment: String,

    /// Namespace the gateway services live in.
    pub namespace: String,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable, for development.
    #[default]
    Pretty,
    /// One JSON object per line, for production.
    Json,
}

/// A statically configured service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Service identifier as it appears in the host name.
    pub id: String,

    /// Base URL requests are forwarded to.
    pub target_url: String,

    /// Outbound credentials.
    #[serde(default)]
    pub credentials: Option<CredentialsConfig>,
}

/// Credential descriptor for a service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CredentialsConfig {
    pub oauth: Option<OAuthCredentialsConfig>,
    pub basic: Option<BasicCredentialsConfig>,
    pub certificate_gen: Option<CertificateGenConfig>,
    pub csrf: Option<CsrfConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct OAuthCredentialsConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Token endpoint URL.
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BasicCredentialsConfig {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CertificateGenConfig {
    pub common_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CsrfConfig {
    /// Endpoint answering `X-CSRF-Token: Fetch` requests.
    pub token_endpoint_url: String,
}
