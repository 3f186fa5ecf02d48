//! Authorization strategies applied to outbound requests.
//!
//! # Variants
//! - None: headers are left untouched
//! - Basic: `Authorization: Basic base64(username:password)`
//! - OAuth: `Authorization: Bearer <token>` from the shared [`OAuthTokenSource`]
//!
//! Any variant may carry a [`CsrfHandshake`], run after credentials are set.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue, InvalidHeaderValue, AUTHORIZATION};
use thiserror::Error;

use crate::authorization::csrf::{CsrfError, CsrfTokenSource};
use crate::authorization::oauth::{OAuthTokenSource, TokenError};

/// Failure to attach credentials. The request must not be forwarded.
#[derive(Debug, Error)]
pub enum AuthorizationError {
    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Csrf(#[from] CsrfError),

    #[error("credentials do not form a valid header value")]
    InvalidHeader(#[from] InvalidHeaderValue),
}

/// The credential mechanism of a strategy.
enum AuthorizationKind {
    None,
    Basic {
        username: String,
        password: String,
    },
    OAuth {
        client_id: String,
        client_secret: String,
        token_url: String,
        tokens: OAuthTokenSource,
    },
}

/// Optional CSRF handshake attached to a strategy.
#[derive(Debug, Clone)]
pub struct CsrfHandshake {
    endpoint_url: String,
    tokens: CsrfTokenSource,
}

impl CsrfHandshake {
    pub fn new(endpoint_url: impl Into<String>, tokens: CsrfTokenSource) -> Self {
        Self {
            endpoint_url: endpoint_url.into(),
            tokens,
        }
    }

    async fn setup(&self, headers: &mut HeaderMap) -> Result<(), CsrfError> {
        let token = self
            .tokens
            .get_token(&self.endpoint_url, headers.get(AUTHORIZATION))
            .await?;
        token.apply(headers)
    }

    fn reset(&self) {
        self.tokens.invalidate(&self.endpoint_url);
    }
}

/// Attaches outbound credentials to requests for one service.
///
/// Lives exactly as long as its cache entry. [`reset`](Self::reset) clears
/// cached secrets in place so the next [`setup`](Self::setup) fetches fresh ones.
pub struct AuthorizationStrategy {
    kind: AuthorizationKind,
    csrf: Option<CsrfHandshake>,
}

impl AuthorizationStrategy {
    pub fn none() -> Self {
        Self::from_kind(AuthorizationKind::None)
    }

    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::from_kind(AuthorizationKind::Basic {
            username: username.into(),
            password: password.into(),
        })
    }

    pub fn oauth(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        token_url: impl Into<String>,
        tokens: OAuthTokenSource,
    ) -> Self {
        Self::from_kind(AuthorizationKind::OAuth {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            token_url: token_url.into(),
            tokens,
        })
    }

    fn from_kind(kind: AuthorizationKind) -> Self {
        Self { kind, csrf: None }
    }

    pub fn with_csrf(mut self, handshake: CsrfHandshake) -> Self {
        self.csrf = Some(handshake);
        self
    }

    #[cfg(test)]
    pub(crate) fn has_csrf(&self) -> bool {
        self.csrf.is_some()
    }

    /// Short name for logs and metrics.
    pub fn name(&self) -> &'static str {
        match self.kind {
            AuthorizationKind::None => "none",
            AuthorizationKind::Basic { .. } => "basic",
            AuthorizationKind::OAuth { .. } => "oauth",
        }
    }

    /// Set the authorization headers of an outbound request.
    pub async fn setup(&self, headers: &mut HeaderMap) -> Result<(), AuthorizationError> {
        match &self.kind {
            AuthorizationKind::None => {}
            AuthorizationKind::Basic { username, password } => {
                headers.insert(AUTHORIZATION, basic_header(username, password)?);
            }
            AuthorizationKind::OAuth {
                client_id,
                client_secret,
                token_url,
                tokens,
            } => {
                let token = tokens.get_token(client_id, client_secret, token_url).await?;
                headers.insert(AUTHORIZATION, bearer_header(&token)?);
                tracing::debug!(client_id = %client_id, "OAuth token attached");
            }
        }

        if let Some(csrf) = &self.csrf {
            csrf.setup(headers).await?;
        }
        Ok(())
    }

    /// Forget cached secrets. Idempotent.
    pub fn reset(&self) {
        if let AuthorizationKind::OAuth {
            client_id, tokens, ..
        } = &self.kind
        {
            tokens.invalidate(client_id);
        }
        if let Some(csrf) = &self.csrf {
            csrf.reset();
        }
    }
}

impl fmt::Debug for AuthorizationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("AuthorizationStrategy");
        out.field("kind", &self.name());
        if let AuthorizationKind::OAuth {
            client_id,
            token_url,
            ..
        } = &self.kind
        {
            out.field("client_id", client_id).field("token_url", token_url);
        }
        out.field("csrf", &self.csrf.as_ref().map(|c| c.endpoint_url.as_str()))
            .finish()
    }
}

fn basic_header(username: &str, password: &str) -> Result<HeaderValue, InvalidHeaderValue> {
    let encoded = STANDARD.encode(format!("{}:{}", username, password));
    let mut value = HeaderValue::from_str(&format!("Basic {}", encoded))?;
    value.set_sensitive(true);
    Ok(value)
}

fn bearer_header(token: &str) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut value = HeaderValue::from_str(&format!("Bearer {}", token))?;
    value.set_sensitive(true);
    Ok(value)
}
