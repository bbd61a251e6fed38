//! Client configuration.
//!
//! [`StreamOptions`] is an explicitly constructed value handed to each
//! client instance — there is no process-wide configuration singleton.
//! All fields carry serde defaults so partial JSON configs deserialize
//! cleanly, mirroring the retry config in `airvoice-core`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use airvoice_core::retry::RetryConfig;

use crate::error::TransportError;

/// Default connect endpoint path.
pub const DEFAULT_ENDPOINT: &str = "/api/v1/sse";

/// Default HTTP method for the connect request.
pub const DEFAULT_METHOD: &str = "POST";

/// Options for one streaming client instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamOptions {
    /// Target URL of the event stream endpoint.
    #[serde(default = "default_url")]
    pub url: String,
    /// HTTP method for the connect request (default `POST`).
    #[serde(default = "default_method")]
    pub method: String,
    /// Extra request headers, merged over the protocol headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Optional JSON request body.
    #[serde(default)]
    pub body: Option<Value>,
    /// Whether to carry credentials (cookies) on the connect request.
    #[serde(default)]
    pub with_credentials: bool,
    /// Reconnect retry policy.
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_url() -> String {
    DEFAULT_ENDPOINT.to_owned()
}
fn default_method() -> String {
    DEFAULT_METHOD.to_owned()
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            url: default_url(),
            method: default_method(),
            headers: BTreeMap::new(),
            body: None,
            with_credentials: false,
            retry: RetryConfig::default(),
        }
    }
}

impl StreamOptions {
    /// Parse the configured method into a [`reqwest::Method`].
    pub fn http_method(&self) -> Result<reqwest::Method, TransportError> {
        reqwest::Method::from_bytes(self.method.as_bytes()).map_err(|_| {
            TransportError::InvalidConfig {
                message: format!("unsupported HTTP method: {}", self.method),
            }
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn defaults() {
        let options = StreamOptions::default();
        assert_eq!(options.url, "/api/v1/sse");
        assert_eq!(options.method, "POST");
        assert!(options.headers.is_empty());
        assert!(options.body.is_none());
        assert!(!options.with_credentials);
        assert_eq!(options.retry.max_retries, 3);
    }

    #[test]
    fn serde_empty_object_uses_defaults() {
        let options: StreamOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, StreamOptions::default());
    }

    #[test]
    fn serde_partial_override() {
        let options: StreamOptions = serde_json::from_str(
            r#"{"url": "https://assistant.example/api/v1/sse", "retry": {"maxRetries": 1}}"#,
        )
        .unwrap();
        assert_eq!(options.url, "https://assistant.example/api/v1/sse");
        assert_eq!(options.retry.max_retries, 1);
        assert_eq!(options.method, "POST");
    }

    #[test]
    fn http_method_parses_known_methods() {
        let options = StreamOptions::default();
        assert_eq!(options.http_method().unwrap(), reqwest::Method::POST);

        let options = StreamOptions {
            method: "GET".into(),
            ..StreamOptions::default()
        };
        assert_eq!(options.http_method().unwrap(), reqwest::Method::GET);
    }

    #[test]
    fn http_method_rejects_garbage() {
        let options = StreamOptions {
            method: "P O S T".into(),
            ..StreamOptions::default()
        };
        assert_matches!(
            options.http_method(),
            Err(TransportError::InvalidConfig { .. })
        );
    }
}
