//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, TTL > 0)
//! - Check that service IDs are unique and URLs parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::ProxyConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid bind address '{0}'")]
    BindAddress(String),

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("service at index {index} has an empty id")]
    EmptyServiceId { index: usize },

    #[error("service '{0}' is defined more than once")]
    DuplicateService(String),

    #[error("service '{service}' has an invalid {field} '{value}'")]
    InvalidUrl {
        service: String,
        field: &'static str,
        value: String,
    },
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.proxy.timeout_secs == 0 {
        errors.push(ValidationError::Zero { field: "proxy.timeout_secs" });
    }
    if config.proxy.cache_ttl_secs == 0 {
        errors.push(ValidationError::Zero { field: "proxy.cache_ttl_secs" });
    }
    if config.proxy.max_body_bytes == 0 {
        errors.push(ValidationError::Zero { field: "proxy.max_body_bytes" });
    }
    if config.oauth.token_timeout_secs == 0 {
        errors.push(ValidationError::Zero { field: "oauth.token_timeout_secs" });
    }

    let mut seen = HashSet::new();
    for (index, service) in config.services.iter().enumerate() {
        if service.id.trim().is_empty() {
            errors.push(ValidationError::EmptyServiceId { index });
            continue;
        }
        if !seen.insert(service.id.as_str()) {
            errors.push(ValidationError::DuplicateService(service.id.clone()));
        }

        check_url(&mut errors, &service.id, "target_url", &service.target_url);

        if let Some(credentials) = &service.credentials {
            if let Some(oauth) = &credentials.oauth {
                check_url(&mut errors, &service.id, "oauth.url", &oauth.url);
            }
            if let Some(csrf) = &credentials.csrf {
                check_url(
                    &mut errors,
                    &service.id,
                    "csrf.token_endpoint_url",
                    &csrf.token_endpoint_url,
                );
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_url(errors: &mut Vec<ValidationError>, service: &str, field: &'static str, value: &str) {
    if Url::parse(value).is_err() {
        errors.push(ValidationError::InvalidUrl {
            service: service.to_string(),
            field,
            value: value.to_string(),
        });
    }
}
