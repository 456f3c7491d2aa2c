//! Per-event request context.
//!
//! Wraps one inbound status together with the bot's identity and the social
//! client, and carries request-scoped data that one processing stage stages
//! for a later one. Dropped once the event is fully handled.

use crate::{
    error::BotError,
    message::{Account, NewStatus, Reply, Status, Visibility},
    traits::SocialClient,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Visibility used for every reply unless the caller overrides it.
pub const REPLY_VISIBILITY: Visibility = Visibility::Unlisted;

/// Data staged by the image handler.
#[derive(Debug, Clone, Default)]
pub struct DiffusePayload {
    /// The "processing..." placeholder posted before generation starts.
    pub in_progress: Option<Status>,
}

/// Data staged by the ask handler.
#[derive(Debug, Clone, Default)]
pub struct AskPayload {
    /// The "processing..." placeholder posted before the assistant is asked.
    pub in_progress: Option<Status>,
    /// Where an over-long answer was uploaded.
    pub paste_url: Option<String>,
}

/// Request-scoped side channel, one typed slot per handler.
/// A slot that was never written reads as all-`None`.
#[derive(Debug, Clone, Default)]
pub struct Payloads {
    pub diffuse: DiffusePayload,
    pub ask: AskPayload,
}

/// Everything a handler needs to answer one status.
pub struct RequestContext {
    status: Status,
    client: Arc<dyn SocialClient>,
    bot: Arc<Account>,
    tag_names: HashSet<String>,
    pub payloads: Payloads,
}

impl RequestContext {
    pub fn new(status: Status, client: Arc<dyn SocialClient>, bot: Arc<Account>) -> Self {
        let tag_names = status.tags.iter().map(|tag| tag.name.clone()).collect();
        Self {
            status,
            client,
            bot,
            tag_names,
            payloads: Payloads::default(),
        }
    }

    /// The inbound status.
    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn client(&self) -> &Arc<dyn SocialClient> {
        &self.client
    }

    /// The account the bot posts as.
    pub fn bot(&self) -> &Account {
        &self.bot
    }

    /// Unique tag names on the status.
    pub fn tag_names(&self) -> &HashSet<String> {
        &self.tag_names
    }

    /// Case-sensitive exact tag membership.
    pub fn contains_tag(&self, name: &str) -> bool {
        self.tag_names.contains(name)
    }

    /// True when the status was written by someone other than the bot.
    pub fn is_foreign_author(&self) -> bool {
        self.status.account.url != self.bot.url
    }

    /// True when the status mentions the bot account.
    pub fn mentions_bot(&self) -> bool {
        self.status
            .mentions
            .iter()
            .any(|mention| mention.url == self.bot.url || mention.id == self.bot.id)
    }

    /// Replies never go out as public, whatever the request's visibility.
    pub fn reply_visibility(&self) -> Visibility {
        REPLY_VISIBILITY
    }

    /// Post a reply to `target` and return the created status.
    ///
    /// The target's author is mentioned unless it is the bot itself.
    pub async fn reply(&self, target: &Status, reply: Reply) -> Result<Status, BotError> {
        let body = if target.account.url != self.bot.url && !target.account.acct.is_empty() {
            format!("@{} {}", target.account.acct, reply.body)
        } else {
            reply.body
        };

        let post = NewStatus {
            status: body,
            in_reply_to_id: Some(target.id.clone()),
            visibility: reply.visibility.unwrap_or(REPLY_VISIBILITY),
            spoiler_text: reply.spoiler_text,
            sensitive: reply.sensitive,
            media_ids: reply.media_ids,
        };
        debug!(
            "replying to {} ({} media, {})",
            target.id,
            post.media_ids.len(),
            post.visibility.as_str()
        );
        self.client.post_status(&post).await
    }

    /// Reply to the inbound status itself.
    pub async fn reply_to_request(&self, reply: Reply) -> Result<Status, BotError> {
        let target = self.status.clone();
        self.reply(&target, reply).await
    }
}
