//! Service definition types and errors.

use std::fmt;

use thiserror::Error;

use crate::config::{CredentialsConfig, ServiceConfig};

/// Read-only snapshot of what the proxy needs to reach a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDefinition {
    pub target_url: String,
    pub credentials: Option<Credentials>,
}

/// Credential descriptor attached to a service definition.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub oauth: Option<OAuthCredentials>,
    pub basic: Option<BasicCredentials>,
    pub certificate_gen: Option<CertificateGen>,
    pub csrf: Option<CsrfInfo>,
}

#[derive(Clone, PartialEq, Eq)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub token_url: String,
}

#[derive(Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

/// Certificate issuance descriptor; carried but not acted upon by the proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateGen {
    pub common_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrfInfo {
    pub token_endpoint_url: String,
}

// Secrets stay out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("oauth", &self.oauth)
            .field("basic", &self.basic)
            .field("certificate_gen", &self.certificate_gen)
            .field("csrf", &self.csrf)
            .finish()
    }
}

impl fmt::Debug for OAuthCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("token_url", &self.token_url)
            .finish()
    }
}

impl fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl From<&CredentialsConfig> for Credentials {
    fn from(config: &CredentialsConfig) -> Self {
        Self {
            oauth: config.oauth.as_ref().map(|o| OAuthCredentials {
                client_id: o.client_id.clone(),
                client_secret: o.client_secret.clone(),
                token_url: o.url.clone(),
            }),
            basic: config.basic.as_ref().map(|b| BasicCredentials {
                username: b.username.clone(),
                password: b.password.clone(),
            }),
            certificate_gen: config.certificate_gen.as_ref().map(|c| CertificateGen {
                common_name: c.common_name.clone(),
            }),
            csrf: config.csrf.as_ref().map(|c| CsrfInfo {
                token_endpoint_url: c.token_endpoint_url.clone(),
            }),
        }
    }
}

impl From<&ServiceConfig> for ServiceDefinition {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            target_url: config.target_url.clone(),
            credentials: config.credentials.as_ref().map(Credentials::from),
        }
    }
}

/// Why a metadata lookup failed. The proxy maps each kind to a status code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetadataError {
    /// No service is registered under the ID.
    #[error("service '{0}' not found")]
    NotFound(String),

    /// The metadata store could not be reached.
    #[error("metadata store unavailable: {0}")]
    Unavailable(String),

    /// The stored definition is unusable.
    #[error("internal metadata error: {0}")]
    Internal(String),
}
