//! Mastodon REST API client.
//!
//! Inbound events are polled from the mention notifications and from the
//! bot account's own timeline; replies, media and boosts go through the
//! regular status endpoints.
//! Docs: <https://docs.joinmastodon.org/methods/>

mod polling;
mod send;
pub(crate) mod types;


use mastodiff_core::config::MastodonConfig;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Newest ids seen on each polled timeline.
#[derive(Debug, Default)]
pub(crate) struct Cursors {
    pub notifications: Option<String>,
    pub own_statuses: Option<String>,
    pub seeded: bool,
}

/// Mastodon client authenticated with an access token.
pub struct MastodonChannel {
    config: MastodonConfig,
    client: reqwest::Client,
    base_url: String,
    cursors: Arc<Mutex<Cursors>>,
}

impl MastodonChannel {
    /// Create a new client from config.
    pub fn new(config: MastodonConfig) -> Self {
        let base_url = config.endpoint_url.trim_end_matches('/').to_string();
        Self {
            config,
            client: reqwest::Client::new(),
            base_url,
            cursors: Arc::new(Mutex::new(Cursors::default())),
        }
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub(crate) fn token(&self) -> &str {
        &self.config.access_token
    }
}
