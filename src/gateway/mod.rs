//! Gateway: the event loop between the Mastodon stream and the handlers.
//!
//! Events are processed strictly one at a time; a long generation holds
//! back every later event until it finishes.

#[cfg(test)]
mod tests;

use crate::handlers::{BotHandler, Dispatch, HandlerRegistry, RequestHandler};
use mastodiff_core::{
    config::MessagesConfig,
    context::{RequestContext, REPLY_VISIBILITY},
    message::{Account, NewStatus, Reply, Status},
    params::ParamCompiler,
    traits::SocialClient,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Routes inbound statuses to the first eligible handler.
pub struct Gateway<H: RequestHandler = BotHandler> {
    client: Arc<dyn SocialClient>,
    bot: Arc<Account>,
    registry: HandlerRegistry<H>,
    compiler: ParamCompiler,
    messages: MessagesConfig,
}

impl<H: RequestHandler> Gateway<H> {
    pub fn new(
        client: Arc<dyn SocialClient>,
        bot: Account,
        registry: HandlerRegistry<H>,
        compiler: ParamCompiler,
        messages: MessagesConfig,
    ) -> Self {
        Self {
            client,
            bot: Arc::new(bot),
            registry,
            compiler,
            messages,
        }
    }

    /// Run until ctrl-c or until the inbound stream ends.
    pub async fn run(&self) -> anyhow::Result<()> {
        info!(
            "mastodiff gateway running | client: {} | as: @{} | handlers: {}",
            self.client.name(),
            self.bot.acct,
            self.registry.names().join(", ")
        );

        let mut rx = self
            .client
            .start()
            .await
            .map_err(|e| anyhow::anyhow!("failed to start {}: {e}", self.client.name()))?;

        self.announce(self.messages.listen_start.as_deref(), self.messages.listen_start_cw.as_deref())
            .await;

        loop {
            tokio::select! {
                incoming = rx.recv() => match incoming {
                    Some(status) => self.handle_event(status).await,
                    None => {
                        warn!("inbound stream closed");
                        break;
                    }
                },
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    break;
                }
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// Process one status to completion. Failures are logged, never raised.
    pub async fn handle_event(&self, status: Status) {
        let started = Instant::now();
        let status_id = status.id.clone();
        let author = status.account.acct.clone();
        let mut ctx = RequestContext::new(status, self.client.clone(), self.bot.clone());

        match self.registry.dispatch(&mut ctx, &self.compiler).await {
            Dispatch::Ignored => {
                debug!("status {status_id} from @{author}: no eligible handler");
            }
            Dispatch::InvalidRequest { handler, error } => {
                warn!("status {status_id} [{handler}]: invalid request: {error}");
                let reply = Reply::text(format!("{}\n\n{error}", self.messages.invalid_request));
                if let Err(e) = ctx.reply_to_request(reply).await {
                    error!("status {status_id}: could not report invalid request: {e}");
                }
            }
            Dispatch::Handled { handler, fully } => {
                info!(
                    "status {status_id} from @{author} [{handler}] done in {:.1}s (fully handled: {fully})",
                    started.elapsed().as_secs_f64()
                );
            }
            Dispatch::Failed { handler, error } => {
                error!("status {status_id} from @{author} [{handler}] failed: {error}");
            }
        }
    }

    /// Post a standalone toot if the message is configured.
    async fn announce(&self, body: Option<&str>, spoiler: Option<&str>) {
        let Some(body) = body.filter(|b| !b.is_empty()) else {
            return;
        };
        let post = NewStatus {
            status: body.to_string(),
            visibility: REPLY_VISIBILITY,
            spoiler_text: spoiler.filter(|s| !s.is_empty()).map(String::from),
            ..Default::default()
        };
        if let Err(e) = self.client.post_status(&post).await {
            warn!("could not post announcement: {e}");
        }
    }

    async fn shutdown(&self) {
        info!("Shutting down...");
        self.announce(self.messages.listen_end.as_deref(), None).await;
        if let Err(e) = self.client.stop().await {
            warn!("failed to stop {}: {e}", self.client.name());
        }
        info!("Shutdown complete.");
    }
}
