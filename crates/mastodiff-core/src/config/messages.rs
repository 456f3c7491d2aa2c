use serde::{Deserialize, Serialize};

use super::defaults::*;

/// User-visible strings. Listen toots are only posted when set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesConfig {
    /// Posted once when the bot starts listening.
    #[serde(default)]
    pub listen_start: Option<String>,
    /// Content warning for `listen_start`.
    #[serde(default)]
    pub listen_start_cw: Option<String>,
    /// Posted once when the bot shuts down.
    #[serde(default)]
    pub listen_end: Option<String>,
    #[serde(default = "default_processing_message")]
    pub processing: String,
    #[serde(default = "default_image_spoiler")]
    pub image_spoiler: String,
    #[serde(default = "default_nsfw_withheld")]
    pub nsfw_withheld: String,
    #[serde(default = "default_invalid_request")]
    pub invalid_request: String,
    #[serde(default = "default_generation_failed")]
    pub generation_failed: String,
    #[serde(default = "default_ask_timeout")]
    pub ask_timeout: String,
    #[serde(default = "default_ask_expired")]
    pub ask_expired: String,
    #[serde(default = "default_ask_error")]
    pub ask_error: String,
    #[serde(default = "default_paste_failed")]
    pub paste_failed: String,
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            listen_start: None,
            listen_start_cw: None,
            listen_end: None,
            processing: default_processing_message(),
            image_spoiler: default_image_spoiler(),
            nsfw_withheld: default_nsfw_withheld(),
            invalid_request: default_invalid_request(),
            generation_failed: default_generation_failed(),
            ask_timeout: default_ask_timeout(),
            ask_expired: default_ask_expired(),
            ask_error: default_ask_error(),
            paste_failed: default_paste_failed(),
        }
    }
}
