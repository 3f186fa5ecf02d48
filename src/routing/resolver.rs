//! Service name resolution from inbound host names.
//!
//! # Responsibilities
//! - Extract the service ID from a Host header value
//! - Build the remote resource name and in-cluster gateway host for an ID
//!
//! # Design Decisions
//! - Host matching is case-insensitive; IDs are returned lowercase
//! - Only the first DNS label carries the service ID
//! - An empty remote environment disables prefix stripping

/// Maps host names to service IDs and back.
#[derive(Debug, Clone, Default)]
pub struct NameResolver {
    prefix: String,
    namespace: String,
}

impl NameResolver {
    pub fn new(remote_environment: &str, namespace: impl Into<String>) -> Self {
        let prefix = if remote_environment.is_empty() {
            String::new()
        } else {
            format!("re-{}-", remote_environment.to_lowercase())
        };
        Self {
            prefix,
            namespace: namespace.into(),
        }
    }

    /// `re-<env>-<id>.<namespace>.svc.cluster.local[:port]` → `<id>`.
    ///
    /// Returns `None` when no ID can be extracted.
    pub fn extract_service_id(&self, host: &str) -> Option<String> {
        let host = strip_port(host.trim());
        let label = host.split('.').next()?.to_lowercase();
        let id = label
            .strip_prefix(self.prefix.as_str())
            .unwrap_or(label.as_str());
        (!id.is_empty()).then(|| id.to_string())
    }

    pub fn resource_name(&self, service_id: &str) -> String {
        format!("{}{}", self.prefix, service_id)
    }

    pub fn gateway_host(&self, service_id: &str) -> String {
        format!(
            "{}.{}.svc.cluster.local",
            self.resource_name(service_id),
            self.namespace
        )
    }
}

fn strip_port(host: &str) -> &str {
    // IPv6 literals keep their colons inside brackets
    if let Some(rest) = host.strip_prefix('[') {
        return rest.split(']').next().unwrap_or(rest);
    }
    host.rsplit_once(':').map_or(host, |(name, _)| name)
}
