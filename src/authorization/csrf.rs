//! CSRF token handshake.
//!
//! Some targets only accept modifying calls that carry a CSRF token obtained
//! from a separate endpoint. The token and its session cookies are fetched with
//! `X-CSRF-Token: Fetch`, cached per endpoint, and injected into forwarded
//! requests.

use std::time::Duration;

use dashmap::DashMap;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, InvalidHeaderValue, AUTHORIZATION, COOKIE, SET_COOKIE,
};
use thiserror::Error;

pub const X_CSRF_TOKEN: HeaderName = HeaderName::from_static("x-csrf-token");

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CsrfError {
    #[error("CSRF token request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("CSRF token endpoint {url} responded with status {status}")]
    Status { url: String, status: u16 },

    #[error("CSRF token endpoint {url} returned no token")]
    MissingToken { url: String },

    #[error("CSRF token is not a valid header value")]
    InvalidHeader,
}

impl From<InvalidHeaderValue> for CsrfError {
    fn from(_: InvalidHeaderValue) -> Self {
        CsrfError::InvalidHeader
    }
}

/// A CSRF token plus the cookies binding it to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrfToken {
    pub token: String,
    pub cookies: Vec<String>,
}

impl CsrfToken {
    /// Write the token onto an outbound request and add its cookies after
    /// any the caller already sent.
    pub fn apply(&self, headers: &mut HeaderMap) -> Result<(), CsrfError> {
        headers.insert(X_CSRF_TOKEN, HeaderValue::from_str(&self.token)?);
        if self.cookies.is_empty() {
            return Ok(());
        }

        let mut cookies: Vec<&str> = headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .collect();
        cookies.extend(self.cookies.iter().map(String::as_str));

        let merged = HeaderValue::from_str(&cookies.join("; "))?;
        headers.insert(COOKIE, merged);
        Ok(())
    }
}

/// Cache of CSRF tokens keyed by token endpoint URL.
#[derive(Debug, Clone)]
pub struct CsrfTokenSource {
    client: reqwest::Client,
    tokens: std::sync::Arc<DashMap<String, CsrfToken>>,
}

impl CsrfTokenSource {
    pub fn new(timeout: Duration, skip_verify: bool) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(skip_verify)
            .no_proxy()
            .build()?;
        Ok(Self {
            client,
            tokens: Default::default(),
        })
    }

    /// Return the cached token for `endpoint_url` or fetch a new one.
    ///
    /// `authorization` is forwarded so the endpoint sees the same identity as
    /// the proxied call.
    pub async fn get_token(
        &self,
        endpoint_url: &str,
        authorization: Option<&HeaderValue>,
    ) -> Result<CsrfToken, CsrfError> {
        if let Some(token) = self.tokens.get(endpoint_url) {
            return Ok(token.clone());
        }

        let mut request = self
            .client
            .get(endpoint_url)
            .header(X_CSRF_TOKEN, "Fetch");
        if let Some(value) = authorization {
            request = request.header(AUTHORIZATION, value.clone());
        }

        let response = request.send().await.map_err(|e| CsrfError::Request {
            url: endpoint_url.to_string(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CsrfError::Status {
                url: endpoint_url.to_string(),
                status: status.as_u16(),
            });
        }

        let token = response
            .headers()
            .get(X_CSRF_TOKEN)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| CsrfError::MissingToken {
                url: endpoint_url.to_string(),
            })?
            .to_string();

        let cookies = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|v| v.split(';').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect();

        let token = CsrfToken { token, cookies };
        self.tokens.insert(endpoint_url.to_string(), token.clone());
        tracing::debug!(endpoint = %endpoint_url, "CSRF token fetched");
        Ok(token)
    }

    pub fn invalidate(&self, endpoint_url: &str) {
        self.tokens.remove(endpoint_url);
    }
}
