//! Sending a buffered request to a cached target.

use std::time::Duration;

use axum::http::header::AUTHORIZATION;
use url::Url;

use crate::http::request::OutboundRequest;
use crate::proxy::cache::CacheEntry;
use crate::proxy::error::ProxyError;
use crate::resilience::with_timeout;

/// Join the target URL with the inbound path and query.
///
/// Paths are joined with exactly one slash; queries are concatenated with `&`.
pub fn join_target(target: &Url, path_and_query: &str) -> Url {
    let (path, query) = match path_and_query.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (path_and_query, None),
    };

    let mut url = target.clone();
    url.set_path(&single_joining_slash(target.path(), path));

    let merged = match (
        target.query().filter(|q| !q.is_empty()),
        query.filter(|q| !q.is_empty()),
    ) {
        (Some(a), Some(b)) => Some(format!("{}&{}", a, b)),
        (Some(a), None) => Some(a.to_string()),
        (None, Some(b)) => Some(b.to_string()),
        (None, None) => None,
    };
    url.set_query(merged.as_deref());
    url
}

fn single_joining_slash(a: &str, b: &str) -> String {
    match (a.ends_with('/'), b.starts_with('/')) {
        (true, true) => format!("{}{}", a, &b[1..]),
        (false, false) if !b.is_empty() => format!("{}/{}", a, b),
        _ => format!("{}{}", a, b),
    }
}

/// Authorize and send one attempt of `outbound` through `entry`.
///
/// A caller-supplied access token replaces the entry's strategy. `timeout`
/// covers the whole exchange: a body still streaming at the deadline is
/// aborted mid-response.
pub async fn execute(
    entry: &CacheEntry,
    outbound: &OutboundRequest,
    timeout: Duration,
) -> Result<reqwest::Response, ProxyError> {
    let mut headers = outbound.headers.clone();

    match &outbound.access_token {
        Some(token) => {
            headers.insert(AUTHORIZATION, token.clone());
        }
        None => entry
            .authorization
            .setup(&mut headers)
            .await
            .map_err(|source| ProxyError::UpstreamAuthFailure {
                service_id: entry.service_id.clone(),
                source,
            })?,
    }

    let url = join_target(&entry.target_url, &outbound.path_and_query);
    tracing::debug!(
        service_id = %entry.service_id,
        method = %outbound.method,
        url = %url,
        "Forwarding request"
    );

    // the per-request timeout also bounds streaming the response body
    let request = entry
        .transport
        .request(outbound.method.clone(), url)
        .timeout(timeout)
        .headers(headers)
        .body(outbound.body.clone());

    with_timeout(&entry.service_id, timeout, request.send())
        .await?
        .map_err(|e| {
            if e.is_timeout() {
                ProxyError::Timeout {
                    service_id: entry.service_id.clone(),
                    after: timeout,
                }
            } else {
                ProxyError::Transport {
                    service_id: entry.service_id.clone(),
                    message: e.to_string(),
                }
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn join(target: &str, path_and_query: &str) -> String {
        join_target(&Url::parse(target).unwrap(), path_and_query).to_string()
    }

    #[test]
    fn test_join_paths() {
        assert_eq!(join("http://backend", "/orders"), "http://backend/orders");
        assert_eq!(join("http://backend/api", "/orders"), "http://backend/api/orders");
        assert_eq!(join("http://backend/api/", "/orders"), "http://backend/api/orders");
        assert_eq!(join("http://backend/api", "/"), "http://backend/api/");
        assert_eq!(join("http://backend/api", ""), "http://backend/api");
    }

    #[test]
    fn test_join_queries() {
        assert_eq!(
            join("http://backend/api", "/orders?limit=10"),
            "http://backend/api/orders?limit=10"
        );
        assert_eq!(
            join("http://backend/api?tenant=a", "/orders"),
            "http://backend/api/orders?tenant=a"
        );
        assert_eq!(
            join("http://backend/api?tenant=a", "/orders?limit=10"),
            "http://backend/api/orders?tenant=a&limit=10"
        );
    }

    #[tokio::test]
    async fn test_stalled_body_is_cut_at_deadline() {
        use crate::authorization::AuthorizationStrategy;
        use crate::http::response::from_upstream;
        use crate::proxy::cache::ProxyCache;
        use axum::body::Body;
        use axum::http::Request;
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        // headers promise 100 bytes, then the target goes silent
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            socket
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 100\r\n\r\nabc")
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let cache = ProxyCache::new(Duration::from_secs(60), false).unwrap();
        let entry = cache
            .put("svc", &format!("http://{}", addr), AuthorizationStrategy::none())
            .unwrap();
        let request = Request::builder().uri("/slow").body(Body::empty()).unwrap();
        let outbound = OutboundRequest::from_request(request, 1024).await.unwrap();

        let response = execute(&entry, &outbound, Duration::from_millis(300))
            .await
            .unwrap();
        assert_eq!(response.status(), 200);

        let body = from_upstream(response).into_body();
        let read = tokio::time::timeout(
            Duration::from_secs(3),
            axum::body::to_bytes(body, usize::MAX),
        )
        .await
        .expect("body stream must end at the request deadline");
        assert!(read.is_err());
    }
}
