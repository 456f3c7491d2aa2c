use serde::{Deserialize, Serialize};

/// Status visibility levels as used by Mastodon.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Unlisted,
    Private,
    Direct,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Unlisted => "unlisted",
            Self::Private => "private",
            Self::Direct => "direct",
        }
    }
}

/// A Mastodon account, as embedded in statuses and returned by
/// `verify_credentials`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    /// `user` for local accounts, `user@domain` for remote ones.
    pub acct: String,
    /// Canonical profile URL. Used as the identity key.
    pub url: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub bot: bool,
}

/// A hashtag attached to a status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    #[serde(default)]
    pub url: String,
}

/// An account mentioned in a status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mention {
    pub id: String,
    pub acct: String,
    pub url: String,
    #[serde(default)]
    pub username: String,
}

/// An uploaded media attachment. The `id` is what a new status references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaAttachment {
    pub id: String,
    #[serde(default, rename = "type")]
    pub media_type: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// One inbound or posted status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Status {
    pub id: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub url: Option<String>,
    pub account: Account,
    #[serde(default)]
    pub visibility: Visibility,
    /// Raw HTML body.
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub mentions: Vec<Mention>,
    #[serde(default)]
    pub in_reply_to_id: Option<String>,
    #[serde(default)]
    pub spoiler_text: String,
    #[serde(default)]
    pub sensitive: bool,
    #[serde(default)]
    pub media_attachments: Vec<MediaAttachment>,
}

/// A status to be posted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NewStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_reply_to_id: Option<String>,
    pub visibility: Visibility,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spoiler_text: Option<String>,
    pub sensitive: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub media_ids: Vec<String>,
}

/// Caller-side options for a reply. Unset visibility means the context's
/// downgraded reply visibility.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reply {
    pub body: String,
    pub visibility: Option<Visibility>,
    pub spoiler_text: Option<String>,
    pub sensitive: bool,
    pub media_ids: Vec<String>,
}

impl Reply {
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Default::default()
        }
    }
}
