//! Typed client configuration.
//!
//! The loader that reads files or environment variables lives outside this
//! crate; it hands over a `ClientConfig` (usually deserialized from JSON) and
//! the client calls `validate` once on construction.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::T3Error;

fn default_platform() -> String {
    "Rust".to_string()
}

fn default_culture() -> String {
    "en-US".to_string()
}

fn default_header_prefix() -> String {
    "SmartCare".to_string()
}

/// Per-endpoint URLs. Each is optional; calling an operation whose endpoint
/// is missing fails with `T3Error::Validation`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoints {
    #[serde(default)]
    pub login: Option<String>,
    #[serde(default)]
    pub touchmap: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub statements: Option<String>,
    #[serde(default)]
    pub dashboard: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    pub customer_id: String,
    pub app_id: String,
    /// Shared secret mixed into the handshake token.
    pub secret: String,
    #[serde(default = "default_platform")]
    pub platform: String,
    #[serde(default = "default_culture")]
    pub culture: String,
    /// Middle segment of the `X-<prefix>-*` header names.
    #[serde(default = "default_header_prefix")]
    pub header_prefix: String,
    /// Overrides the random per-client session id.
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub verbose: bool,
    /// Age after which `search` treats the touchmap as cold. `None` keeps it
    /// for the life of the client.
    #[serde(default)]
    pub touchmap_ttl_secs: Option<u64>,
    #[serde(default)]
    pub endpoints: Endpoints,
}

impl ClientConfig {
    pub fn new(customer_id: &str, app_id: &str, secret: &str) -> Self {
        Self {
            customer_id: customer_id.to_string(),
            app_id: app_id.to_string(),
            secret: secret.to_string(),
            platform: default_platform(),
            culture: default_culture(),
            header_prefix: default_header_prefix(),
            session_id: None,
            verbose: false,
            touchmap_ttl_secs: None,
            endpoints: Endpoints::default(),
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, T3Error> {
        let config: ClientConfig = serde_json::from_str(raw)
            .map_err(|e| T3Error::validation(format!("config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Point every endpoint at the conventional paths under `base_url`.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        self.endpoints = Endpoints {
            login: Some(format!("{base}/login")),
            touchmap: Some(format!("{base}/touchmap")),
            search: Some(format!("{base}/search")),
            account: Some(format!("{base}/account")),
            statements: Some(format!("{base}/statements")),
            dashboard: Some(format!("{base}/dashboard")),
        };
        self
    }

    pub fn with_session_id(mut self, session_id: &str) -> Self {
        self.session_id = Some(session_id.to_string());
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_touchmap_ttl(mut self, ttl: Duration) -> Self {
        self.touchmap_ttl_secs = Some(ttl.as_secs());
        self
    }

    pub fn touchmap_ttl(&self) -> Option<Duration> {
        self.touchmap_ttl_secs.map(Duration::from_secs)
    }

    pub fn validate(&self) -> Result<(), T3Error> {
        for (field, value) in [
            ("customerId", &self.customer_id),
            ("appId", &self.app_id),
            ("secret", &self.secret),
            ("headerPrefix", &self.header_prefix),
        ] {
            if value.trim().is_empty() {
                return Err(T3Error::validation(format!("{field} must not be empty")));
            }
        }

        if let Some(session_id) = &self.session_id {
            if session_id.trim().is_empty() {
                return Err(T3Error::validation("sessionId must not be empty"));
            }
        }

        let endpoints = &self.endpoints;
        for (field, value) in [
            ("login", &endpoints.login),
            ("touchmap", &endpoints.touchmap),
            ("search", &endpoints.search),
            ("account", &endpoints.account),
            ("statements", &endpoints.statements),
            ("dashboard", &endpoints.dashboard),
        ] {
            if let Some(raw) = value {
                Url::parse(raw)
                    .map_err(|e| T3Error::validation(format!("endpoints.{field}: {e}")))?;
            }
        }
        Ok(())
    }
}
