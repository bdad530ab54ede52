//! Configuration types for docfetch

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Fetch behavior configuration
///
/// Every field has a default, so an empty JSON object is a valid configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchConfig {
    /// User-Agent header sent with every request (default: "docfetch/<version>")
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Total time allowed for a single request, including the body (default: 30 seconds)
    ///
    /// This is the transport's own timeout and is independent of any
    /// [`CancellationContext`](crate::context::CancellationContext) deadline.
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Time allowed to establish a connection (default: 10 seconds)
    #[serde(default = "default_connect_timeout", with = "duration_serde")]
    pub connect_timeout: Duration,

    /// Ask every cache along the way to revalidate (default: true)
    #[serde(default = "default_true")]
    pub bypass_cache: bool,

    /// Send the context credential even when its domain scope does not match
    /// the request host (default: true)
    #[serde(default = "default_true")]
    pub force_credentials: bool,

    /// Treat non-2xx responses as transport failures (default: false)
    ///
    /// When false, error pages are parsed and handed to the processor like
    /// any other document.
    #[serde(default)]
    pub require_success_status: bool,

    /// Maximum accepted body size in bytes (default: 16 MiB, None = unlimited)
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: Option<u64>,

    /// Accept header sent with document requests
    #[serde(default = "default_accept")]
    pub accept: String,

    /// Deadline used by [`CancellationContext::arm_with_config`](crate::context::CancellationContext::arm_with_config)
    /// (default: None = never armed)
    #[serde(default, with = "optional_duration_serde")]
    pub default_deadline: Option<Duration>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            request_timeout: default_request_timeout(),
            connect_timeout: default_connect_timeout(),
            bypass_cache: true,
            force_credentials: true,
            require_success_status: false,
            max_body_bytes: default_max_body_bytes(),
            accept: default_accept(),
            default_deadline: None,
        }
    }
}

impl FetchConfig {
    /// Load a configuration from a JSON document
    ///
    /// Missing fields take their defaults. The result is validated.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: FetchConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values the transport cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.user_agent.trim().is_empty() {
            return Err(config_error("user_agent must not be empty", "user_agent"));
        }
        if self.request_timeout.is_zero() {
            return Err(config_error(
                "request_timeout must be greater than zero",
                "request_timeout",
            ));
        }
        if self.connect_timeout.is_zero() {
            return Err(config_error(
                "connect_timeout must be greater than zero",
                "connect_timeout",
            ));
        }
        if self.max_body_bytes == Some(0) {
            return Err(config_error(
                "max_body_bytes must be greater than zero or unset",
                "max_body_bytes",
            ));
        }
        Ok(())
    }
}

fn config_error(message: &str, key: &str) -> Error {
    Error::Config {
        message: message.to_string(),
        key: Some(key.to_string()),
    }
}

fn default_true() -> bool {
    true
}

fn default_user_agent() -> String {
    format!("docfetch/{}", env!("CARGO_PKG_VERSION"))
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_max_body_bytes() -> Option<u64> {
    Some(16 * 1024 * 1024)
}

fn default_accept() -> String {
    "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string()
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Optional Duration serialization helper
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}
