//! OAuth2 client-credentials support.

pub mod endpoint;
pub mod token_source;

pub use endpoint::{HttpTokenEndpoint, TokenEndpoint, TokenError, TokenResponse};
pub use token_source::OAuthTokenSource;
