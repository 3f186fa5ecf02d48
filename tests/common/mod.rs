//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::Form;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use service_proxy::config::{
    BasicCredentialsConfig, CredentialsConfig, OAuthCredentialsConfig, ProxyConfig, ServiceConfig,
};
use service_proxy::http::HttpServer;
use service_proxy::lifecycle::Shutdown;
use service_proxy::metadata::{
    MetadataError, ServiceDefinition, ServiceDefinitionService, StaticServiceDefinitions,
};

pub const REMOTE_ENVIRONMENT: &str = "env";
pub const NAMESPACE: &str = "ns";

/// Host header that routes to `service_id`.
pub fn service_host(service_id: &str) -> String {
    format!(
        "re-{}-{}.{}.svc.cluster.local",
        REMOTE_ENVIRONMENT, service_id, NAMESPACE
    )
}

/// Client that never goes through an environment proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// What a target saw for one call.
#[derive(Debug, Clone)]
pub struct Seen {
    pub method: String,
    pub uri: String,
    pub authorization: Option<String>,
    pub body: String,
}

/// A programmable target service that records every call.
#[derive(Clone)]
pub struct Target {
    pub addr: SocketAddr,
    seen: Arc<Mutex<Vec<Seen>>>,
}

impl Target {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }

    pub fn authorizations(&self) -> Vec<Option<String>> {
        self.seen().into_iter().map(|s| s.authorization).collect()
    }
}

/// Start a target whose answer to call `n` (0-based) is `respond(n, authorization)`.
pub async fn start_target<F>(respond: F) -> Target
where
    F: Fn(usize, Option<&str>) -> (u16, String) + Send + Sync + 'static,
{
    let seen: Arc<Mutex<Vec<Seen>>> = Arc::new(Mutex::new(Vec::new()));
    let respond = Arc::new(respond);
    let recorder = seen.clone();

    let router = Router::new().fallback(
        move |method: axum::http::Method,
              uri: axum::http::Uri,
              headers: HeaderMap,
              body: String| {
            let recorder = recorder.clone();
            let respond = respond.clone();
            async move {
                let authorization = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                let n = {
                    let mut seen = recorder.lock().unwrap();
                    seen.push(Seen {
                        method: method.to_string(),
                        uri: uri.to_string(),
                        authorization: authorization.clone(),
                        body,
                    });
                    seen.len() - 1
                };
                let (status, body) = respond(n, authorization.as_deref());
                (StatusCode::from_u16(status).unwrap(), body).into_response()
            }
        },
    );

    Target {
        addr: serve(router).await,
        seen,
    }
}

/// Start a target that always answers `status` with `body`.
pub async fn start_fixed_target(status: u16, body: &'static str) -> Target {
    start_target(move |_, _| (status, body.to_string())).await
}

/// Start a target that answers 200 only after `delay`.
pub async fn start_slow_target(delay: Duration) -> SocketAddr {
    serve(Router::new().fallback(move || async move {
        tokio::time::sleep(delay).await;
        "late"
    }))
    .await
}

/// An address nothing listens on.
pub async fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// A client-credentials token endpoint issuing `token1`, `token2`, ...
#[derive(Clone)]
pub struct TokenServer {
    pub addr: SocketAddr,
    calls: Arc<AtomicUsize>,
}

impl TokenServer {
    pub fn url(&self) -> String {
        format!("http://{}/oauth/token", self.addr)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[derive(serde::Deserialize)]
struct TokenForm {
    grant_type: String,
    client_id: String,
    client_secret: String,
}

/// Start a token endpoint answering after `delay`, or with `fail_status` if set.
pub async fn start_token_server(delay: Duration, fail_status: Option<u16>) -> TokenServer {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();

    let router = Router::new().route(
        "/oauth/token",
        post(move |Form(form): Form<TokenForm>| {
            let counter = counter.clone();
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                tokio::time::sleep(delay).await;
                assert_eq!(form.grant_type, "client_credentials");
                assert_eq!(form.client_id, "abc");
                assert_eq!(form.client_secret, "xyz");

                match fail_status {
                    Some(status) => StatusCode::from_u16(status).unwrap().into_response(),
                    None => Json(json!({
                        "access_token": format!("token{}", n),
                        "token_type": "bearer",
                        "expires_in": 3600
                    }))
                    .into_response(),
                }
            }
        }),
    );

    TokenServer {
        addr: serve(router).await,
        calls,
    }
}

/// OAuth service `id` pointing at `target` with client `abc`/`xyz`.
pub fn oauth_service(id: &str, target: &str, token_url: &str) -> ServiceConfig {
    ServiceConfig {
        id: id.to_string(),
        target_url: target.to_string(),
        credentials: Some(CredentialsConfig {
            oauth: Some(OAuthCredentialsConfig {
                client_id: "abc".into(),
                client_secret: "xyz".into(),
                url: token_url.to_string(),
            }),
            ..Default::default()
        }),
    }
}

pub fn basic_service(id: &str, target: &str) -> ServiceConfig {
    ServiceConfig {
        id: id.to_string(),
        target_url: target.to_string(),
        credentials: Some(CredentialsConfig {
            basic: Some(BasicCredentialsConfig {
                username: "username".into(),
                password: "password".into(),
            }),
            ..Default::default()
        }),
    }
}

pub fn plain_service(id: &str, target: &str) -> ServiceConfig {
    ServiceConfig {
        id: id.to_string(),
        target_url: target.to_string(),
        credentials: None,
    }
}

/// Config-backed metadata that counts lookups.
pub struct CountingMetadata {
    inner: StaticServiceDefinitions,
    lookups: AtomicUsize,
}

impl CountingMetadata {
    pub fn new(services: &[ServiceConfig]) -> Arc<Self> {
        Arc::new(Self {
            inner: StaticServiceDefinitions::new(services),
            lookups: AtomicUsize::new(0),
        })
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl ServiceDefinitionService for CountingMetadata {
    fn get_service_definition(&self, service_id: &str) -> Result<ServiceDefinition, MetadataError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.get_service_definition(service_id)
    }
}

/// Proxy config for tests: short timeout, resolver matching [`service_host`].
pub fn proxy_config(services: Vec<ServiceConfig>) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.resolver.remote_environment = REMOTE_ENVIRONMENT.into();
    config.resolver.namespace = NAMESPACE.into();
    config.proxy.timeout_secs = 1;
    config.oauth.token_timeout_secs = 2;
    config.services = services;
    config
}

/// A proxy running on an ephemeral port.
pub struct RunningProxy {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub reload: mpsc::UnboundedSender<ProxyConfig>,
}

impl RunningProxy {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

async fn run(server: HttpServer) -> RunningProxy {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let (reload, config_updates) = mpsc::unbounded_channel();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, config_updates, server_shutdown).await;
    });

    RunningProxy {
        addr,
        shutdown,
        reload,
    }
}

/// Start a proxy serving `config.services`.
pub async fn start_proxy(config: ProxyConfig) -> RunningProxy {
    run(HttpServer::new(config).unwrap()).await
}

/// Start a proxy backed by `metadata` instead of `config.services`.
pub async fn start_proxy_with(
    config: ProxyConfig,
    metadata: Arc<dyn ServiceDefinitionService>,
) -> RunningProxy {
    run(HttpServer::with_metadata(config, metadata).unwrap()).await
}
