//! Provider configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::client::{Client, ClientError, DEFAULT_HTTP_TIMEOUT};
use crate::schema::{Attribute, Diagnostic, Schema};
use crate::state::ResourceData;

const DEFAULT_POLL_INTERVAL_MS: u64 = 5000;

/// The provider block as written by the user.
///
/// Host and token fall back to the environment when unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Base URL of the control plane.
    pub duplo_host: Option<String>,
    /// API bearer token.
    pub duplo_token: Option<String>,
    /// Skip TLS certificate verification.
    pub ssl_no_verify: bool,
    /// Request timeout in seconds.
    pub http_timeout: Option<u64>,
    /// How often waits poll the control plane, in milliseconds.
    pub poll_interval_ms: Option<u64>,
}

impl ProviderConfig {
    /// Decode the provider block. A null block is the empty configuration.
    ///
    /// Attributes the host sends as null take their schema defaults.
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        if value.is_null() {
            return Ok(Self::default());
        }
        if !value.is_object() {
            return serde_json::from_value(value);
        }
        let mut block = ResourceData::from_value(value);
        block.apply_defaults(&Self::schema().block);
        serde_json::from_value(block.into_value())
    }

    /// The schema of the provider block.
    pub fn schema() -> Schema {
        Schema::v0()
            .with_attribute(
                "duplo_host",
                Attribute::optional_string().with_description(
                    "This is the base URL to the Duplo REST API. It must be provided, \
                     but it can also be sourced from the `duplo_host` environment variable.",
                ),
            )
            .with_attribute(
                "duplo_token",
                Attribute::optional_string().sensitive().with_description(
                    "This is a bearer token used to authenticate to the Duplo REST API. \
                     It must be provided, but it can also be sourced from the \
                     `duplo_token` environment variable.",
                ),
            )
            .with_attribute(
                "ssl_no_verify",
                Attribute::optional_bool()
                    .with_description("Disable SSL certificate verification.")
                    .with_default(serde_json::json!(false)),
            )
            .with_attribute(
                "http_timeout",
                Attribute::optional_int64()
                    .with_description("Timeout for HTTP requests, in seconds.")
                    .with_default(serde_json::json!(DEFAULT_HTTP_TIMEOUT.as_secs())),
            )
            .with_attribute(
                "poll_interval_ms",
                Attribute::optional_int64()
                    .with_description("How often to poll while waiting on the control plane.")
                    .with_default(serde_json::json!(DEFAULT_POLL_INTERVAL_MS)),
            )
    }

    /// The host, from config or the environment.
    pub fn host(&self) -> Option<String> {
        non_empty(self.duplo_host.clone())
            .or_else(|| env_var("duplo_host"))
            .or_else(|| env_var("DUPLO_HOST"))
    }

    /// The token, from config or the environment.
    pub fn token(&self) -> Option<String> {
        non_empty(self.duplo_token.clone())
            .or_else(|| env_var("duplo_token"))
            .or_else(|| env_var("DUPLO_TOKEN"))
    }

    /// Request timeout.
    pub fn timeout(&self) -> Duration {
        self.http_timeout
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_HTTP_TIMEOUT)
    }

    /// Polling interval for waits.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS))
    }

    /// Warnings for settings that are not in the block itself.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        let mut diags = Vec::new();
        if non_empty(self.duplo_host.clone()).is_none() {
            diags.push(
                Diagnostic::warning("duplo_host is not set in the provider block")
                    .with_detail("It will be read from the duplo_host environment variable.")
                    .with_attribute("duplo_host"),
            );
        }
        if non_empty(self.duplo_token.clone()).is_none() {
            diags.push(
                Diagnostic::warning("duplo_token is not set in the provider block")
                    .with_detail("It will be read from the duplo_token environment variable.")
                    .with_attribute("duplo_token"),
            );
        }
        diags
    }

    /// Build an HTTP client for the configured control plane.
    pub fn build_client(&self) -> Result<Client, ClientError> {
        Client::with_options(
            &self.host().unwrap_or_default(),
            &self.token().unwrap_or_default(),
            self.timeout(),
            self.ssl_no_verify,
        )
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn env_var(name: &str) -> Option<String> {
    non_empty(std::env::var(name).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_test::assert_ok;

    #[test]
    fn test_decode_with_defaults() {
        let config = assert_ok!(ProviderConfig::from_value(json!({
            "duplo_host": "https://duplo.example.com",
            "duplo_token": "secret"
        })));
        assert_eq!(config.host().as_deref(), Some("https://duplo.example.com"));
        assert!(!config.ssl_no_verify);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.poll_interval(), Duration::from_millis(5000));
        assert!(config.diagnostics().is_empty());
    }

    #[test]
    fn test_null_block_is_empty() {
        let config = assert_ok!(ProviderConfig::from_value(serde_json::Value::Null));
        assert_eq!(config, ProviderConfig::default());
        assert_eq!(config.diagnostics().len(), 2);
    }

    #[test]
    fn test_explicit_settings() {
        let config = assert_ok!(ProviderConfig::from_value(json!({
            "duplo_host": "https://duplo.example.com",
            "duplo_token": "secret",
            "ssl_no_verify": true,
            "http_timeout": 5,
            "poll_interval_ms": 10
        })));
        assert!(config.ssl_no_verify);
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.poll_interval(), Duration::from_millis(10));
        let client = assert_ok!(config.build_client());
        assert_eq!(client.host_url(), "https://duplo.example.com");
    }

    #[test]
    fn test_null_attributes_take_defaults() {
        let config = assert_ok!(ProviderConfig::from_value(json!({
            "duplo_host": "https://duplo.example.com",
            "duplo_token": "secret",
            "ssl_no_verify": null,
            "http_timeout": null,
            "poll_interval_ms": null
        })));
        assert!(!config.ssl_no_verify);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.poll_interval(), Duration::from_millis(5000));
    }

    #[test]
    fn test_wrong_types_are_rejected() {
        assert!(ProviderConfig::from_value(json!({"http_timeout": "soon"})).is_err());
    }

    #[test]
    fn test_schema_marks_token_sensitive() {
        let schema = ProviderConfig::schema();
        assert!(schema.attribute("duplo_token").unwrap().flags.sensitive);
        assert_eq!(
            schema.attribute("http_timeout").unwrap().default,
            Some(json!(30))
        );
    }
}
