//! Type-safe configuration with validation.
//!
//! All settings come from environment variables (with `.env` support) and
//! are validated before the service starts.

use std::env;
use std::str::FromStr;

use thiserror::Error;
use url::Url;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid URL format
    #[error("invalid URL for {field}: {reason}")]
    InvalidUrl {
        /// The configuration field at fault
        field: String,
        /// Why the value was rejected
        reason: String,
    },

    /// Invalid port number
    #[error("invalid port: must be between 1 and 65535")]
    InvalidPort,

    /// Invalid threshold value
    #[error("invalid threshold: must be greater than 0")]
    InvalidThreshold,

    /// Invalid timeout value
    #[error("invalid timeout: must be greater than 0")]
    InvalidTimeout,

    /// Environment variable parse error
    #[error("failed to parse environment variable {name}: {reason}")]
    ParseError {
        /// The variable name
        name: String,
        /// Why parsing failed
        reason: String,
    },
}

/// Service configuration with validation.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port (1-65535)
    pub port: u16,
    /// Shared counter store URL; absent means the in-process fallback
    pub redis_url: Option<Url>,
    /// Whether the rate limiter admits requests when the store is down
    pub rate_limit_fail_open: bool,
    /// Inbound request timeout in seconds
    pub request_timeout_secs: u64,
    /// Outbound per-call cancellation boundary in seconds
    pub call_timeout_secs: u64,
    /// Per-call boundary for AI model calls in seconds
    pub ai_call_timeout_secs: u64,
    /// Circuit breaker failure threshold (must be > 0)
    pub breaker_failure_threshold: u32,
    /// Circuit breaker success threshold (must be > 0)
    pub breaker_success_threshold: u32,
    /// Circuit breaker reset timeout in seconds
    pub breaker_reset_timeout_secs: u64,
    /// OAuth provider token endpoint
    pub oauth_token_url: Url,
    /// OAuth provider userinfo endpoint
    pub oauth_userinfo_url: Url,
    /// OAuth client id
    pub oauth_client_id: String,
    /// OAuth client secret
    pub oauth_client_secret: String,
    /// Billing provider webhook endpoint
    pub billing_webhook_url: Url,
    /// AI provider base URL
    pub ai_service_url: Url,
}

impl Config {
    /// Loads configuration from environment variables with validation.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when a variable fails to parse or the
    /// resulting configuration is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_env("PORT", 8080)?,
            redis_url: parse_optional_url_env("REDIS_URL")?,
            rate_limit_fail_open: parse_env("RATE_LIMIT_FAIL_OPEN", true)?,
            request_timeout_secs: parse_env("REQUEST_TIMEOUT", 30)?,
            call_timeout_secs: parse_env("CALL_TIMEOUT", 30)?,
            ai_call_timeout_secs: parse_env("AI_CALL_TIMEOUT", 120)?,
            breaker_failure_threshold: parse_env("CB_FAILURE_THRESHOLD", 5)?,
            breaker_success_threshold: parse_env("CB_SUCCESS_THRESHOLD", 2)?,
            breaker_reset_timeout_secs: parse_env("CB_RESET_TIMEOUT", 30)?,
            oauth_token_url: parse_url_env(
                "OAUTH_TOKEN_URL",
                "https://auth.example.com/oauth/token",
            )?,
            oauth_userinfo_url: parse_url_env(
                "OAUTH_USERINFO_URL",
                "https://auth.example.com/oauth/userinfo",
            )?,
            oauth_client_id: env::var("OAUTH_CLIENT_ID")
                .unwrap_or_else(|_| "talent-platform".to_string()),
            oauth_client_secret: env::var("OAUTH_CLIENT_SECRET")
                .unwrap_or_else(|_| "development-secret".to_string()),
            billing_webhook_url: parse_url_env(
                "BILLING_WEBHOOK_URL",
                "https://billing.example.com/webhooks/talent",
            )?,
            ai_service_url: parse_url_env("AI_SERVICE_URL", "https://ai.example.com")?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for out-of-range values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        if self.breaker_failure_threshold == 0 || self.breaker_success_threshold == 0 {
            return Err(ConfigError::InvalidThreshold);
        }
        if self.request_timeout_secs == 0
            || self.call_timeout_secs == 0
            || self.ai_call_timeout_secs == 0
            || self.breaker_reset_timeout_secs == 0
        {
            return Err(ConfigError::InvalidTimeout);
        }
        Ok(())
    }
}

/// Parse an environment variable with a default, using `FromStr`.
fn parse_env<T: FromStr>(name: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(value) => value.parse().map_err(|e: T::Err| ConfigError::ParseError {
            name: name.to_string(),
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

/// Parse a URL environment variable with a default.
fn parse_url_env(name: &str, default: &str) -> Result<Url, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl {
        field: name.to_string(),
        reason: e.to_string(),
    })
}

/// Parse an optional URL environment variable; unset means `None`.
fn parse_optional_url_env(name: &str) -> Result<Option<Url>, ConfigError> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => {
            let url = Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl {
                field: name.to_string(),
                reason: e.to_string(),
            })?;
            Ok(Some(url))
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            host: "0.0.0.0".to_string(),
            port: 8080,
            redis_url: None,
            rate_limit_fail_open: true,
            request_timeout_secs: 30,
            call_timeout_secs: 30,
            ai_call_timeout_secs: 120,
            breaker_failure_threshold: 5,
            breaker_success_threshold: 2,
            breaker_reset_timeout_secs: 30,
            oauth_token_url: Url::parse("https://auth.example.com/oauth/token").unwrap(),
            oauth_userinfo_url: Url::parse("https://auth.example.com/oauth/userinfo").unwrap(),
            oauth_client_id: "talent-platform".to_string(),
            oauth_client_secret: "secret".to_string(),
            billing_webhook_url: Url::parse("https://billing.example.com/webhooks/talent").unwrap(),
            ai_service_url: Url::parse("https://ai.example.com").unwrap(),
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_zero_port_rejected() {
        let config = Config {
            port: 0,
            ..valid_config()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidPort)));
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let config = Config {
            breaker_failure_threshold: 0,
            ..valid_config()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidThreshold)
        ));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = Config {
            call_timeout_secs: 0,
            ..valid_config()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidTimeout)));
    }

    #[test]
    fn test_parse_env_uses_default_when_unset() {
        let value: u64 = parse_env("GATEWAY_TEST_UNSET_VAR", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_parse_env_reads_value() {
        env::set_var("GATEWAY_TEST_PORT_VAR", "9090");
        let value: u16 = parse_env("GATEWAY_TEST_PORT_VAR", 8080).unwrap();
        assert_eq!(value, 9090);
        env::remove_var("GATEWAY_TEST_PORT_VAR");
    }

    #[test]
    fn test_parse_env_rejects_garbage() {
        env::set_var("GATEWAY_TEST_BAD_VAR", "not-a-number");
        let result: Result<u16, _> = parse_env("GATEWAY_TEST_BAD_VAR", 8080);
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
        env::remove_var("GATEWAY_TEST_BAD_VAR");
    }
}
