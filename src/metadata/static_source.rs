//! Service definitions served from configuration.
//!
//! The table is swapped atomically on config reload; lookups never block.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::config::ServiceConfig;
use crate::metadata::model::{MetadataError, ServiceDefinition};
use crate::metadata::ServiceDefinitionService;

/// Config-backed [`ServiceDefinitionService`].
#[derive(Debug)]
pub struct StaticServiceDefinitions {
    services: ArcSwap<HashMap<String, ServiceDefinition>>,
}

impl StaticServiceDefinitions {
    pub fn new(services: &[ServiceConfig]) -> Self {
        Self {
            services: ArcSwap::from_pointee(Self::table(services)),
        }
    }

    /// Replace the whole table.
    pub fn replace(&self, services: &[ServiceConfig]) {
        self.services.store(Arc::new(Self::table(services)));
        tracing::info!(services = services.len(), "Service definitions reloaded");
    }

    pub fn len(&self) -> usize {
        self.services.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // keyed by lowercase id, matching what the resolver extracts from Host
    fn table(services: &[ServiceConfig]) -> HashMap<String, ServiceDefinition> {
        services
            .iter()
            .map(|s| (s.id.to_lowercase(), ServiceDefinition::from(s)))
            .collect()
    }
}

impl ServiceDefinitionService for StaticServiceDefinitions {
    fn get_service_definition(&self, service_id: &str) -> Result<ServiceDefinition, MetadataError> {
        self.services
            .load()
            .get(service_id)
            .cloned()
            .ok_or_else(|| MetadataError::NotFound(service_id.to_string()))
    }
}
