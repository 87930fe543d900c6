use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection settings for building the default HTTP transport.
///
/// Meant to be embedded in an application's own configuration; every field
/// has a default so an empty object deserializes to a local server.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Config {
    /// Base URL of the server, e.g. `http://localhost:5984`
    #[serde(default = "default_url")]
    pub url: String,

    /// Replaces the default `couchdb-rs/<version>` client identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    /// Per-request timeout; unset leaves the HTTP client's default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    #[serde(default)]
    pub insecure_skip_verify: bool,
}

fn default_url() -> String {
    "http://localhost:5984".to_string()
}

impl Config {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: default_url(),
            user_agent: None,
            timeout_secs: None,
            insecure_skip_verify: false,
        }
    }
}
