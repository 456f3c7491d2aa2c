//! `#diffuse_me`: turn the status text into images.

use super::{EligibilityRule, ReplyPolicy, RequestHandler};
use crate::diffusion::{BatchResult, BatchRunner};
use async_trait::async_trait;
use mastodiff_core::{
    config::MessagesConfig,
    context::RequestContext,
    error::BotError,
    message::{Reply, Status},
    params::GenerationRequest,
};
use tracing::{info, warn};

/// Mastodon allows four attachments per status.
const MEDIA_PER_STATUS: usize = 4;

/// Longest prompt excerpt echoed back in the reply.
const PROMPT_PREVIEW_CHARS: usize = 400;

pub struct DiffuseMeHandler {
    rule: EligibilityRule,
    runner: BatchRunner,
    policy: ReplyPolicy,
    no_image_on_any_nsfw: bool,
    messages: MessagesConfig,
}

impl DiffuseMeHandler {
    pub fn new(
        rule: EligibilityRule,
        runner: BatchRunner,
        policy: ReplyPolicy,
        no_image_on_any_nsfw: bool,
        messages: MessagesConfig,
    ) -> Self {
        Self {
            rule,
            runner,
            policy,
            no_image_on_any_nsfw,
            messages,
        }
    }

    fn reply_body(&self, request: &GenerationRequest, result: &BatchResult, withheld: bool) -> String {
        let preview: String = request
            .prompts
            .positive
            .chars()
            .take(PROMPT_PREVIEW_CHARS)
            .collect();
        let mut body = format!(
            "{preview}\n\n{} image(s), took {}",
            result.image_filenames.len(),
            result.time_took()
        );
        if withheld {
            body.push_str("\n\n");
            body.push_str(&self.messages.nsfw_withheld);
        }
        body
    }

    async fn abort(&self, ctx: &mut RequestContext, error: &BotError) {
        let placeholder = ctx.payloads.diffuse.in_progress.take();
        let reply = Reply::text(format!("{}\n\n{error}", self.messages.generation_failed));
        let target = match &placeholder {
            Some(p) if !self.policy.delete_processing_message => p.clone(),
            _ => ctx.status().clone(),
        };
        if let Err(e) = ctx.reply(&target, reply).await {
            warn!("could not report generation failure: {e}");
        }
        if let Some(p) = placeholder {
            self.policy.discard_placeholder(ctx, &p).await;
        }
    }
}

#[async_trait]
impl RequestHandler for DiffuseMeHandler {
    fn name(&self) -> &str {
        "diffuse_me"
    }

    fn is_eligible(&self, ctx: &RequestContext) -> bool {
        self.rule.matches(ctx)
    }

    async fn respond(
        &self,
        ctx: &mut RequestContext,
        request: &GenerationRequest,
    ) -> Result<bool, BotError> {
        let placeholder = ctx
            .reply_to_request(Reply::text(&self.messages.processing))
            .await?;
        ctx.payloads.diffuse.in_progress = Some(placeholder);

        let result = match self.runner.run(request, ctx.client().as_ref()).await {
            Ok(r) => r,
            Err(e) => {
                self.abort(ctx, &e).await;
                return Err(e);
            }
        };
        info!(
            "generated {} image(s) in {}, {} grid(s) posted, nsfw={}",
            result.image_filenames.len(),
            result.time_took(),
            result.posted_media.len(),
            result.has_any_nsfw
        );

        let withheld = self.no_image_on_any_nsfw && result.has_any_nsfw;
        let media_ids: Vec<String> = if withheld {
            Vec::new()
        } else {
            result.posted_media.iter().map(|m| m.id.clone()).collect()
        };
        let mut groups = media_ids.chunks(MEDIA_PER_STATUS);
        let spoiler = Some(self.messages.image_spoiler.clone());

        let first = Reply {
            body: self.reply_body(request, &result, withheld),
            visibility: None,
            spoiler_text: spoiler.clone(),
            sensitive: result.has_any_nsfw,
            media_ids: groups.next().map(<[String]>::to_vec).unwrap_or_default(),
        };
        let placeholder = ctx.payloads.diffuse.in_progress.take();
        let mut previous: Status = self.policy.deliver(ctx, placeholder.as_ref(), first).await?;

        let total = media_ids.len().div_ceil(MEDIA_PER_STATUS);
        for (idx, group) in groups.enumerate() {
            let more = Reply {
                body: format!("({}/{total})", idx + 2),
                visibility: None,
                spoiler_text: spoiler.clone(),
                sensitive: result.has_any_nsfw,
                media_ids: group.to_vec(),
            };
            previous = ctx.reply(&previous, more).await?;
        }

        Ok(true)
    }
}
