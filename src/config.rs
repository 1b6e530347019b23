//! Client configuration
//!
//! Settings come from code or from `ANEDYA_*` environment variables.

use std::env;
use std::fmt;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::validate::wire_enum;

/// Request timeout used when none is configured.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

wire_enum! {
    /// Anedya platform region.
    pub enum Region: "region" {
        ApIn1 => "ap-in-1",
    }
}

impl Region {
    /// API endpoint of this region
    pub fn base_url(self) -> String {
        format!("https://api.{}.anedya.io", self.as_str())
    }
}

impl Default for Region {
    fn default() -> Self {
        Region::ApIn1
    }
}

/// Settings used by [`Client::with_config`](crate::Client::with_config).
#[derive(Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: Region::default().base_url(),
            api_key: String::new(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

impl ClientConfig {
    /// Config for `api_key` against the default region.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis().try_into().unwrap_or(u64::MAX);
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load from `ANEDYA_API_KEY`, `ANEDYA_BASE_URL`, `ANEDYA_REGION` and
    /// `ANEDYA_TIMEOUT_MS`.
    ///
    /// An explicit base URL wins over the region. An unparsable timeout falls
    /// back to the default.
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("ANEDYA_API_KEY")
            .ok()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| Error::input_required("ANEDYA_API_KEY environment variable must be set"))?;

        let base_url = match env::var("ANEDYA_BASE_URL").ok().filter(|url| !url.is_empty()) {
            Some(url) => url,
            None => match env::var("ANEDYA_REGION").ok().filter(|r| !r.is_empty()) {
                Some(region) => region.parse::<Region>()?.base_url(),
                None => Region::default().base_url(),
            },
        };

        let timeout_ms = env::var("ANEDYA_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
            .filter(|ms| *ms > 0)
            .unwrap_or(DEFAULT_TIMEOUT_MS);

        Ok(ClientConfig {
            base_url,
            api_key,
            timeout_ms,
        })
    }
}
