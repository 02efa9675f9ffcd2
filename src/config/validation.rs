//! Configuration validation.
//!
//! Collects every problem in one pass so operators fix the file once, not
//! field by field.

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::EngineConfig;

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("listener.bind_address '{0}' is not a valid socket address")]
    InvalidBindAddress(String),

    #[error("observability.metrics_address '{0}' is not a valid socket address")]
    InvalidMetricsAddress(String),

    #[error("listener.max_body_bytes must be greater than zero")]
    ZeroBodyLimit,

    #[error("timeouts.request_secs must be greater than zero")]
    ZeroRequestTimeout,

    #[error("throttle.rate must be greater than zero when throttling is enabled")]
    ZeroThrottleRate,

    #[error("throttle.window_secs must be greater than zero when throttling is enabled")]
    ZeroThrottleWindow,

    #[error("cache.default_ttl_secs must be greater than zero")]
    ZeroCacheTtl,

    #[error("cors.allow_origins must not be empty when CORS is enabled")]
    EmptyCorsOrigins,
}

/// Validate the whole configuration, returning every violation found.
pub fn validate_config(config: &EngineConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }
    if config.throttle.enabled {
        if config.throttle.rate == 0 {
            errors.push(ValidationError::ZeroThrottleRate);
        }
        if config.throttle.window_secs == 0 {
            errors.push(ValidationError::ZeroThrottleWindow);
        }
    }
    if config.cache.default_ttl_secs == 0 {
        errors.push(ValidationError::ZeroCacheTtl);
    }
    if config.cors.enabled && config.cors.allow_origins.is_empty() {
        errors.push(ValidationError::EmptyCorsOrigins);
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&EngineConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = EngineConfig::default();
        config.listener.bind_address = "nonsense".to_string();
        config.throttle.enabled = true;
        config.throttle.rate = 0;
        config.cache.default_ttl_secs = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&ValidationError::ZeroThrottleRate));
        assert!(errors.contains(&ValidationError::ZeroCacheTtl));
    }
}
