//! Maps credential descriptors to authorization strategies.

use crate::authorization::csrf::CsrfTokenSource;
use crate::authorization::oauth::OAuthTokenSource;
use crate::authorization::strategy::{AuthorizationStrategy, CsrfHandshake};
use crate::metadata::Credentials;

/// Builds strategies that share the process-wide token sources.
#[derive(Debug, Clone)]
pub struct AuthorizationStrategyFactory {
    oauth_tokens: OAuthTokenSource,
    csrf_tokens: CsrfTokenSource,
}

impl AuthorizationStrategyFactory {
    pub fn new(oauth_tokens: OAuthTokenSource, csrf_tokens: CsrfTokenSource) -> Self {
        Self {
            oauth_tokens,
            csrf_tokens,
        }
    }

    /// OAuth wins over Basic; anything else (including certificate-only) is None.
    pub fn create(&self, credentials: Option<&Credentials>) -> AuthorizationStrategy {
        let Some(credentials) = credentials else {
            return AuthorizationStrategy::none();
        };

        let strategy = match (&credentials.oauth, &credentials.basic) {
            (Some(oauth), _) if !oauth.client_id.is_empty() && !oauth.client_secret.is_empty() => {
                AuthorizationStrategy::oauth(
                    &oauth.client_id,
                    &oauth.client_secret,
                    &oauth.token_url,
                    self.oauth_tokens.clone(),
                )
            }
            (_, Some(basic)) if !basic.username.is_empty() => {
                AuthorizationStrategy::basic(&basic.username, &basic.password)
            }
            _ => AuthorizationStrategy::none(),
        };

        match &credentials.csrf {
            Some(csrf) => strategy.with_csrf(CsrfHandshake::new(
                &csrf.token_endpoint_url,
                self.csrf_tokens.clone(),
            )),
            None => strategy,
        }
    }
}
