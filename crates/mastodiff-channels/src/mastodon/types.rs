//! Mastodon API deserialization types not shared with the rest of the bot.

use mastodiff_core::message::Status;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct Notification {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: Option<Status>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiError {
    pub error: String,
}
