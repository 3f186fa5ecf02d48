//! Service metadata subsystem.
//!
//! # Data Flow
//! ```text
//! ProxyDispatcher cache miss / forbidden rebuild
//!     → ServiceDefinitionService::get_service_definition(id)
//!     → ServiceDefinition { target_url, credentials }
//! ```
//!
//! # Design Decisions
//! - Lookup is synchronous; implementations own their retry policy
//! - Definitions are snapshots, fetched fresh on every miss or rebuild
//! - Errors are classified so the proxy can choose a status code

pub mod model;
pub mod static_source;

pub use model::{
    BasicCredentials, CertificateGen, Credentials, CsrfInfo, MetadataError, OAuthCredentials,
    ServiceDefinition,
};
pub use static_source::StaticServiceDefinitions;

/// Source of service definitions keyed by service ID.
pub trait ServiceDefinitionService: Send + Sync {
    fn get_service_definition(&self, service_id: &str) -> Result<ServiceDefinition, MetadataError>;
}
