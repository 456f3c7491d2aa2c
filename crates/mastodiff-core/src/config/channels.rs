use serde::{Deserialize, Serialize};

use super::defaults::*;

/// Mastodon instance config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MastodonConfig {
    /// Instance base URL, e.g. `https://mastodon.social`.
    #[serde(default)]
    pub endpoint_url: String,
    /// Falls back to `MASTODON_ACCESS_TOKEN` when empty.
    #[serde(default)]
    pub access_token: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

impl Default for MastodonConfig {
    fn default() -> Self {
        Self {
            endpoint_url: String::new(),
            access_token: String::new(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}
