//! Per-request orchestration.
//!
//! ```text
//! Start → Resolved → CacheHit ─────────────┐
//!                  → CacheMiss → Built ────┤
//!                                          → Authorized → Forwarded → Done
//!                                                                   → Retrying (403) → Done
//! ```

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;

use crate::authorization::{
    AuthorizationStrategyFactory, CsrfTokenSource, HttpTokenEndpoint, OAuthTokenSource,
};
use crate::config::ProxyConfig;
use crate::http::request::{request_host, OutboundRequest};
use crate::http::response::from_upstream;
use crate::metadata::ServiceDefinitionService;
use crate::proxy::cache::{CacheEntry, ProxyCache};
use crate::proxy::error::ProxyError;
use crate::proxy::forward::execute;
use crate::proxy::retrier::ForbiddenRetrier;
use crate::routing::NameResolver;

/// Per-call limits applied to every forwarded request.
#[derive(Debug, Clone, Copy)]
pub struct DispatchLimits {
    pub timeout: Duration,
    pub max_body_bytes: usize,
}

/// Routes inbound requests to their target service with injected credentials.
pub struct ProxyDispatcher {
    resolver: NameResolver,
    metadata: Arc<dyn ServiceDefinitionService>,
    cache: ProxyCache,
    factory: AuthorizationStrategyFactory,
    limits: DispatchLimits,
}

impl ProxyDispatcher {
    pub fn new(
        resolver: NameResolver,
        metadata: Arc<dyn ServiceDefinitionService>,
        cache: ProxyCache,
        factory: AuthorizationStrategyFactory,
        limits: DispatchLimits,
    ) -> Self {
        Self {
            resolver,
            metadata,
            cache,
            factory,
            limits,
        }
    }

    /// Wire up the token sources, cache and resolver described by `config`.
    pub fn from_config(
        config: &ProxyConfig,
        metadata: Arc<dyn ServiceDefinitionService>,
    ) -> Result<Self, reqwest::Error> {
        let settings = &config.proxy;
        let token_timeout = Duration::from_secs(config.oauth.token_timeout_secs);

        let endpoint = HttpTokenEndpoint::new(token_timeout, settings.skip_verify)?;
        let factory = AuthorizationStrategyFactory::new(
            OAuthTokenSource::new(Arc::new(endpoint)),
            CsrfTokenSource::new(token_timeout, settings.skip_verify)?,
        );
        let cache = ProxyCache::new(
            Duration::from_secs(settings.cache_ttl_secs),
            settings.skip_verify,
        )?;
        let resolver = NameResolver::new(
            &config.resolver.remote_environment,
            config.resolver.namespace.clone(),
        );

        Ok(Self::new(
            resolver,
            metadata,
            cache,
            factory,
            DispatchLimits {
                timeout: Duration::from_secs(settings.timeout_secs),
                max_body_bytes: settings.max_body_bytes,
            },
        ))
    }

    pub fn cache(&self) -> &ProxyCache {
        &self.cache
    }

    /// Cached entry for `service_id`, building one on a miss.
    pub fn entry_for(&self, service_id: &str) -> Result<Arc<CacheEntry>, ProxyError> {
        match self.cache.get(service_id) {
            Some(entry) => Ok(entry),
            None => self.rebuild_entry(service_id),
        }
    }

    /// Re-query metadata and replace the cache entry for `service_id`.
    pub fn rebuild_entry(&self, service_id: &str) -> Result<Arc<CacheEntry>, ProxyError> {
        let definition = self
            .metadata
            .get_service_definition(service_id)
            .map_err(|source| ProxyError::MetadataUnavailable {
                service_id: service_id.to_string(),
                source,
            })?;

        let strategy = self.factory.create(definition.credentials.as_ref());
        self.cache.put(service_id, &definition.target_url, strategy)
    }

    /// Forward one inbound request and produce the response for the caller.
    pub async fn dispatch(&self, request: Request<Body>) -> Result<Response, ProxyError> {
        let host = request_host(&request)
            .ok_or_else(|| ProxyError::InvalidRequest("missing Host header".to_string()))?;
        let service_id = self.resolver.extract_service_id(host).ok_or_else(|| {
            ProxyError::InvalidRequest(format!("cannot resolve a service from host '{}'", host))
        })?;

        let outbound = OutboundRequest::from_request(request, self.limits.max_body_bytes).await?;
        let entry = self.entry_for(&service_id)?;

        tracing::debug!(
            service_id = %service_id,
            method = %outbound.method,
            path = %outbound.path_and_query,
            authorization = entry.authorization.name(),
            "Dispatching request"
        );

        let response = execute(&entry, &outbound, self.limits.timeout).await?;

        let mut retrier = ForbiddenRetrier::new();
        let response = retrier
            .on_response(response, &entry, &outbound, self.limits.timeout, || {
                self.rebuild_entry(&service_id)
            })
            .await?;

        Ok(from_upstream(response))
    }
}
