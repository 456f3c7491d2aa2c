//! `#ask`: forward the status text to a chat assistant and post its answer.

use super::{EligibilityRule, ReplyPolicy, RequestHandler};
use async_trait::async_trait;
use mastodiff_core::{
    config::MessagesConfig,
    context::RequestContext,
    error::BotError,
    message::Reply,
    params::GenerationRequest,
    traits::{ChatAssistant, PasteUploader},
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Answers longer than this go to the paste service.
const MAX_INLINE_ANSWER: usize = 400;

/// Characters of the answer kept next to the paste link.
const PASTE_EXCERPT: usize = 300;

/// Characters of the question shown in the spoiler text.
const SPOILER_QUESTION: usize = 20;

/// How the assistant call ended; shown in the spoiler text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AskStatus {
    Done,
    Timeout,
    Expired,
    Error,
}

impl AskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Done => "done",
            Self::Timeout => "timeout",
            Self::Expired => "expired",
            Self::Error => "error",
        }
    }

    /// Classify an assistant failure.
    pub fn classify(error: &BotError) -> Self {
        let text = error.to_string();
        if text.contains("timed out") {
            Self::Timeout
        } else if text.contains("401") {
            Self::Expired
        } else {
            Self::Error
        }
    }
}

pub struct AskHandler {
    rule: EligibilityRule,
    assistant: Arc<dyn ChatAssistant>,
    paste: Option<Arc<dyn PasteUploader>>,
    retry_delay: Duration,
    policy: ReplyPolicy,
    messages: MessagesConfig,
}

impl AskHandler {
    pub fn new(
        rule: EligibilityRule,
        assistant: Arc<dyn ChatAssistant>,
        paste: Option<Arc<dyn PasteUploader>>,
        retry_delay: Duration,
        policy: ReplyPolicy,
        messages: MessagesConfig,
    ) -> Self {
        Self {
            rule,
            assistant,
            paste,
            retry_delay,
            policy,
            messages,
        }
    }

    /// One retry after `retry_delay`, then give up.
    async fn ask(&self, question: &str) -> Result<String, BotError> {
        match self.assistant.send(question).await {
            Ok(answer) => Ok(answer),
            Err(e) => {
                info!("assistant error, retrying in {:?}: {e}", self.retry_delay);
                tokio::time::sleep(self.retry_delay).await;
                self.assistant.send(question).await
            }
        }
    }

    fn failure_text(&self, status: AskStatus, error: &BotError) -> String {
        match status {
            AskStatus::Timeout => self.messages.ask_timeout.clone(),
            AskStatus::Expired => self.messages.ask_expired.clone(),
            _ => format!("{}\n\n{error}", self.messages.ask_error),
        }
    }

    /// Cut an over-long answer to an excerpt and stage its paste link.
    async fn shorten(&self, ctx: &mut RequestContext, question: &str, answer: String) -> String {
        if answer.chars().count() <= MAX_INLINE_ANSWER {
            return answer;
        }
        let excerpt: String = answer.chars().take(PASTE_EXCERPT).collect();
        let Some(paste) = &self.paste else {
            warn!("answer is {} chars but no paste service is configured", answer.chars().count());
            return format!("{excerpt}...");
        };

        match paste.upload(&format!("[bot ask] {question}"), &answer).await {
            Ok(url) => {
                ctx.payloads.ask.paste_url = Some(url);
                format!("{excerpt}...")
            }
            Err(e) => {
                warn!("{} upload failed: {e}", paste.name());
                format!("{}\n\n{e}", self.messages.paste_failed)
            }
        }
    }
}

/// `[status] question`, the question cut to a short prefix.
pub(crate) fn spoiler_text(status: AskStatus, question: &str) -> String {
    if question.chars().count() > SPOILER_QUESTION {
        let head: String = question.chars().take(SPOILER_QUESTION).collect();
        format!("[{}] {head}...", status.as_str())
    } else {
        format!("[{}] {question}", status.as_str())
    }
}

#[async_trait]
impl RequestHandler for AskHandler {
    fn name(&self) -> &str {
        "ask"
    }

    fn is_eligible(&self, ctx: &RequestContext) -> bool {
        self.rule.matches(ctx)
    }

    async fn respond(
        &self,
        ctx: &mut RequestContext,
        request: &GenerationRequest,
    ) -> Result<bool, BotError> {
        let question = request.prompts.positive.clone();
        let placeholder = ctx
            .reply_to_request(Reply::text(&self.messages.processing))
            .await?;
        ctx.payloads.ask.in_progress = Some(placeholder);

        info!("sending question to {}", self.assistant.name());
        let (status, answer) = match self.ask(&question).await {
            Ok(answer) => (AskStatus::Done, answer),
            Err(e) => {
                let status = AskStatus::classify(&e);
                warn!("assistant failed ({}): {e}", status.as_str());
                (status, self.failure_text(status, &e))
            }
        };
        let mut body = self.shorten(ctx, &question, answer).await;
        if let Some(url) = &ctx.payloads.ask.paste_url {
            body.push_str("\n\n");
            body.push_str(url);
        }

        let reply = Reply {
            body,
            visibility: None,
            spoiler_text: Some(spoiler_text(status, &question)),
            sensitive: true,
            media_ids: Vec::new(),
        };
        let placeholder = ctx.payloads.ask.in_progress.take();
        self.policy.deliver(ctx, placeholder.as_ref(), reply).await?;
        match &ctx.payloads.ask.paste_url {
            Some(url) => info!("answered ask request ({}), full answer at {url}", status.as_str()),
            None => info!("answered ask request ({})", status.as_str()),
        }
        Ok(true)
    }
}
