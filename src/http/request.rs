//! Request handling and transformation.
//!
//! # Responsibilities
//! - Attach and propagate `x-request-id`
//! - Extract routing-relevant information (host)
//! - Buffer the inbound request into a replayable [`OutboundRequest`]
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - The body is buffered once so a 403 retry replays identical bytes
//! - An inbound `Access-Token` header is lifted out and never forwarded as-is

use axum::body::{Body, Bytes};
use axum::http::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH, HOST};
use axum::http::{Method, Request};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

use crate::http::response::strip_hop_by_hop;
use crate::proxy::ProxyError;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Caller-supplied token that replaces the service's own credentials.
pub const ACCESS_TOKEN: HeaderName = HeaderName::from_static("access-token");

/// Layer that assigns a UUID request ID when the caller sent none.
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid)
}

/// Layer that copies the request ID onto the response.
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(X_REQUEST_ID)
}

pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Host the caller addressed: the Host header, else the URI authority.
pub fn request_host<B>(request: &Request<B>) -> Option<&str> {
    request
        .headers()
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| request.uri().authority().map(|a| a.as_str()))
        .filter(|h| !h.is_empty())
}

/// A fully buffered inbound request, ready to be sent (and re-sent) to a target.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    /// Path and query exactly as received, e.g. `/orders?limit=10`.
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Value of the inbound `Access-Token` header, if any.
    pub access_token: Option<HeaderValue>,
}

impl OutboundRequest {
    pub async fn from_request(
        request: Request<Body>,
        max_body_bytes: usize,
    ) -> Result<Self, ProxyError> {
        let (parts, body) = request.into_parts();

        let body = axum::body::to_bytes(body, max_body_bytes)
            .await
            .map_err(|e| ProxyError::InvalidRequest(format!("failed to read request body: {}", e)))?;

        let mut headers = parts.headers;
        let access_token = headers.remove(ACCESS_TOKEN).map(|mut value| {
            value.set_sensitive(true);
            value
        });
        strip_hop_by_hop(&mut headers);
        headers.remove(HOST);
        headers.remove(CONTENT_LENGTH);

        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());

        Ok(Self {
            method: parts.method,
            path_and_query,
            headers,
            body,
            access_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_from_request() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/orders?limit=10")
            .header(HOST, "re-env-svc-42.ns.svc.cluster.local")
            .header("access-token", "Bearer caller-token")
            .header("connection", "close")
            .header("content-type", "application/json")
            .header("content-length", "13")
            .body(Body::from(r#"{"qty": 1234}"#))
            .unwrap();

        let outbound = OutboundRequest::from_request(request, 1024).await.unwrap();

        assert_eq!(outbound.method, Method::POST);
        assert_eq!(outbound.path_and_query, "/orders?limit=10");
        assert_eq!(outbound.body, Bytes::from_static(br#"{"qty": 1234}"#));
        assert_eq!(outbound.access_token.unwrap(), "Bearer caller-token");
        assert!(outbound.headers.get(HOST).is_none());
        assert!(outbound.headers.get("access-token").is_none());
        assert!(outbound.headers.get("connection").is_none());
        assert_eq!(outbound.headers.get("content-type").unwrap(), "application/json");
    }

    #[tokio::test]
    async fn test_body_limit() {
        let request = Request::builder()
            .uri("/upload")
            .body(Body::from(vec![0u8; 64]))
            .unwrap();

        let err = OutboundRequest::from_request(request, 16).await.unwrap_err();
        assert!(matches!(err, ProxyError::InvalidRequest(_)));
    }

    #[test]
    fn test_request_host() {
        let request = Request::builder()
            .uri("/")
            .header(HOST, "svc.example.com:8080")
            .body(())
            .unwrap();
        assert_eq!(request_host(&request), Some("svc.example.com:8080"));

        let request = Request::builder()
            .uri("http://svc.example.com/path")
            .body(())
            .unwrap();
        assert_eq!(request_host(&request), Some("svc.example.com"));

        let request = Request::builder().uri("/path").body(()).unwrap();
        assert_eq!(request_host(&request), None);
    }

    #[test]
    fn test_request_id_fallback() {
        let mut headers = HeaderMap::new();
        assert_eq!(request_id(&headers), "unknown");
        headers.insert(X_REQUEST_ID, HeaderValue::from_static("abc-123"));
        assert_eq!(request_id(&headers), "abc-123");
    }
}
