//! Configuration types for devto-feed

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Largest page size the public API accepts
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Main configuration for [`DevToClient`](crate::DevToClient) and [`ArticleFeed`](crate::ArticleFeed)
///
/// Every field has a default, so an empty JSON object (or `Config::default()`)
/// points at the public DEV.to API without authentication.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// API root; articles are served under `<base_url>/articles` (default: "https://dev.to/api")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Optional API key, sent as the `api-key` header when set and non-empty
    #[serde(default)]
    pub api_key: Option<String>,

    /// Articles requested per page (default: 30, max: 1000)
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Per-request timeout (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// How many rows before the end of the list should trigger `load_more` (default: 5)
    #[serde(default = "default_prefetch_distance")]
    pub prefetch_distance: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            page_size: default_page_size(),
            request_timeout: default_request_timeout(),
            user_agent: default_user_agent(),
            prefetch_distance: default_prefetch_distance(),
        }
    }
}

impl Config {
    /// Check the configuration for values the client cannot work with
    ///
    /// # Errors
    /// Returns [`Error::Config`] naming the offending key when the base URL does not
    /// parse as an absolute http(s) URL, or the page size is outside `1..=1000`.
    pub fn validate(&self) -> Result<()> {
        let parsed = url::Url::parse(&self.base_url).map_err(|e| Error::Config {
            message: format!("invalid base_url '{}': {}", self.base_url, e),
            key: Some("base_url".to_string()),
        })?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::Config {
                message: format!(
                    "base_url must use http or https, got '{}'",
                    parsed.scheme()
                ),
                key: Some("base_url".to_string()),
            });
        }

        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(Error::Config {
                message: format!(
                    "page_size must be between 1 and {}, got {}",
                    MAX_PAGE_SIZE, self.page_size
                ),
                key: Some("page_size".to_string()),
            });
        }

        Ok(())
    }

    /// The API key to send, ignoring an empty string
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|key| !key.is_empty())
    }
}

fn default_base_url() -> String {
    "https://dev.to/api".to_string()
}

fn default_page_size() -> u32 {
    30
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    concat!("devto-feed/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_prefetch_distance() -> usize {
    5
}

// Duration serialization helper (whole seconds)
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
