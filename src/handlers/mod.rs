//! Request handlers and the ordered registry that dispatches to them.
//!
//! Handlers form a closed set held in a fixed order. The first handler whose
//! eligibility check passes owns the event; later handlers are never tried,
//! whatever the owner's outcome.

mod ask;
mod diffuse_me;


pub use ask::{AskHandler, AskStatus};
pub use diffuse_me::DiffuseMeHandler;

use async_trait::async_trait;
use mastodiff_core::{
    config::HandlerConfig,
    context::RequestContext,
    error::BotError,
    message::{Reply, Status},
    params::{GenerationRequest, ParamCompiler},
};
use tracing::warn;

/// One capability the bot answers to.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    fn name(&self) -> &str;

    fn is_eligible(&self, ctx: &RequestContext) -> bool;

    /// Answer the event. `Ok(true)` when it was fully handled.
    async fn respond(
        &self,
        ctx: &mut RequestContext,
        request: &GenerationRequest,
    ) -> Result<bool, BotError>;
}

/// Trigger tag plus who may use it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EligibilityRule {
    pub tag_name: String,
    pub allow_self_request_only: bool,
}

impl EligibilityRule {
    pub fn from_config(config: &HandlerConfig) -> Self {
        Self {
            tag_name: config.tag_name.clone(),
            allow_self_request_only: config.allow_self_request_only,
        }
    }

    /// The tag must be present. The bot's own statuses always qualify;
    /// others only when they mention the bot and the rule is open to all.
    pub fn matches(&self, ctx: &RequestContext) -> bool {
        if !ctx.contains_tag(&self.tag_name) {
            return false;
        }
        !ctx.is_foreign_author() || (!self.allow_self_request_only && ctx.mentions_bot())
    }
}

/// How the final answer is placed relative to the placeholder.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplyPolicy {
    pub delete_processing_message: bool,
    pub reblog_replies: bool,
}

impl ReplyPolicy {
    /// Post `reply` and tidy up the placeholder.
    ///
    /// The reply threads under the request when the placeholder is going
    /// away, otherwise under the placeholder.
    pub async fn deliver(
        &self,
        ctx: &RequestContext,
        placeholder: Option<&Status>,
        reply: Reply,
    ) -> Result<Status, BotError> {
        let target = match placeholder {
            Some(p) if !self.delete_processing_message => p.clone(),
            _ => ctx.status().clone(),
        };
        let posted = ctx.reply(&target, reply).await?;

        if self.reblog_replies {
            if let Err(e) = ctx.client().reblog(&posted.id).await {
                warn!("reblog of {} failed: {e}", posted.id);
            }
        }
        if let Some(p) = placeholder {
            self.discard_placeholder(ctx, p).await;
        }
        Ok(posted)
    }

    /// Delete the placeholder if configured. Failures are only logged.
    pub async fn discard_placeholder(&self, ctx: &RequestContext, placeholder: &Status) {
        if !self.delete_processing_message {
            return;
        }
        if let Err(e) = ctx.client().delete_status(&placeholder.id).await {
            warn!("deleting placeholder {} failed: {e}", placeholder.id);
        }
    }
}

/// The handlers this bot ships with.
pub enum BotHandler {
    DiffuseMe(DiffuseMeHandler),
    Ask(AskHandler),
}

#[async_trait]
impl RequestHandler for BotHandler {
    fn name(&self) -> &str {
        match self {
            Self::DiffuseMe(h) => h.name(),
            Self::Ask(h) => h.name(),
        }
    }

    fn is_eligible(&self, ctx: &RequestContext) -> bool {
        match self {
            Self::DiffuseMe(h) => h.is_eligible(ctx),
            Self::Ask(h) => h.is_eligible(ctx),
        }
    }

    async fn respond(
        &self,
        ctx: &mut RequestContext,
        request: &GenerationRequest,
    ) -> Result<bool, BotError> {
        match self {
            Self::DiffuseMe(h) => h.respond(ctx, request).await,
            Self::Ask(h) => h.respond(ctx, request).await,
        }
    }
}

/// What happened to one event.
#[derive(Debug)]
pub enum Dispatch {
    /// No handler wanted the event.
    Ignored,
    /// A handler was chosen but the text did not compile.
    InvalidRequest { handler: String, error: BotError },
    /// The handler ran to completion.
    Handled { handler: String, fully: bool },
    /// The handler returned an error.
    Failed { handler: String, error: BotError },
}

/// Handlers in registration order.
pub struct HandlerRegistry<H: RequestHandler = BotHandler> {
    handlers: Vec<H>,
}

impl<H: RequestHandler> HandlerRegistry<H> {
    pub fn new(handlers: Vec<H>) -> Self {
        Self { handlers }
    }

    pub fn names(&self) -> Vec<&str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// First handler whose eligibility check passes.
    pub fn find_eligible(&self, ctx: &RequestContext) -> Option<&H> {
        self.handlers.iter().find(|h| h.is_eligible(ctx))
    }

    /// Route one event to at most one handler.
    ///
    /// Parameters are compiled only once an owner is found, so untagged
    /// chatter never reaches the compiler.
    pub async fn dispatch(&self, ctx: &mut RequestContext, compiler: &ParamCompiler) -> Dispatch {
        let Some(handler) = self.find_eligible(ctx) else {
            return Dispatch::Ignored;
        };
        let name = handler.name().to_string();

        let request = match compiler.compile_html(&ctx.status().content) {
            Ok(r) => r,
            Err(error) => return Dispatch::InvalidRequest { handler: name, error },
        };

        match handler.respond(ctx, &request).await {
            Ok(fully) => Dispatch::Handled { handler: name, fully },
            Err(error) => Dispatch::Failed { handler: name, error },
        }
    }
}
