//! Client-credentials token endpoint client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use thiserror::Error;

/// Successful token endpoint answer.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,

    #[serde(default)]
    pub token_type: Option<String>,

    /// Lifetime in seconds; absent means valid until invalidated.
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Errors from a token request. Cloneable so one failure can be handed to every waiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("token endpoint {url} responded with status {status}")]
    Status { url: String, status: u16 },

    #[error("malformed token response from {url}: {message}")]
    Malformed { url: String, message: String },
}

/// Network seam for fetching client-credentials tokens.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    async fn request_token(
        &self,
        client_id: &str,
        client_secret: &str,
        token_url: &str,
    ) -> Result<TokenResponse, TokenError>;
}

/// [`TokenEndpoint`] speaking the standard form-encoded client-credentials grant.
#[derive(Debug, Clone)]
pub struct HttpTokenEndpoint {
    client: reqwest::Client,
}

impl HttpTokenEndpoint {
    pub fn new(timeout: Duration, skip_verify: bool) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(skip_verify)
            .no_proxy()
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl TokenEndpoint for HttpTokenEndpoint {
    async fn request_token(
        &self,
        client_id: &str,
        client_secret: &str,
        token_url: &str,
    ) -> Result<TokenResponse, TokenError> {
        let response = self
            .client
            .post(token_url)
            .header(ACCEPT, "application/json")
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", client_id),
                ("client_secret", client_secret),
            ])
            .send()
            .await
            .map_err(|e| TokenError::Request {
                url: token_url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TokenError::Status {
                url: token_url.to_string(),
                status: status.as_u16(),
            });
        }

        let token: TokenResponse = response.json().await.map_err(|e| TokenError::Malformed {
            url: token_url.to_string(),
            message: e.to_string(),
        })?;

        if token.access_token.is_empty() {
            return Err(TokenError::Malformed {
                url: token_url.to_string(),
                message: "empty access_token".to_string(),
            });
        }

        Ok(token)
    }
}
