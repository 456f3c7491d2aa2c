mod diffusion;
mod gateway;
mod handlers;

#[cfg(test)]
mod testing;

use clap::{Parser, Subcommand};
use diffusion::BatchRunner;
use handlers::{AskHandler, BotHandler, DiffuseMeHandler, EligibilityRule, HandlerRegistry, ReplyPolicy};
use mastodiff_channels::mastodon::MastodonChannel;
use mastodiff_core::{
    config::{self, shellexpand, Config},
    params::ParamCompiler,
    traits::{ImagePipeline, SocialClient},
};
use mastodiff_providers::{diffusers::DiffusersPipeline, openai::OpenAiAssistant, paste};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(
    name = "mastodiff",
    version,
    about = "Mastodon bot that turns tagged posts into image-generation jobs"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot.
    Start,
    /// Check configuration, credentials and pipeline availability.
    Status,
    /// Compile a request offline and print it as JSON.
    Compile {
        /// Status text, plain or HTML.
        #[arg(trailing_var_arg = true)]
        text: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load(&cli.config)?;

    match cli.command {
        Commands::Start => {
            let _guard = init_logging(&cfg, true);
            if cfg.mastodon.endpoint_url.is_empty() || cfg.mastodon.access_token.is_empty() {
                anyhow::bail!(
                    "Mastodon endpoint_url and access_token are required. \
                     Set them in config.toml or MASTODON_ACCESS_TOKEN env var."
                );
            }

            info!("starting {}", cfg.bot.name);
            let client: Arc<dyn SocialClient> = Arc::new(MastodonChannel::new(cfg.mastodon.clone()));
            let bot = client.verify_credentials().await?;
            info!("you are, acct: {} / url: {}", bot.acct, bot.url);

            let pipeline: Arc<dyn ImagePipeline> = Arc::new(DiffusersPipeline::from_config(&cfg.pipeline));
            if !pipeline.is_available().await {
                warn!(
                    "pipeline '{}' at {} is not reachable yet",
                    pipeline.name(),
                    cfg.pipeline.base_url
                );
            }

            let registry = build_registry(&cfg, pipeline)?;
            if registry.is_empty() {
                anyhow::bail!("No handlers enabled. Enable at least one handler in config.toml.");
            }

            let gw = gateway::Gateway::new(
                client,
                bot,
                registry,
                build_compiler(&cfg),
                cfg.messages.clone(),
            );
            gw.run().await?;
        }
        Commands::Status => {
            let _guard = init_logging(&cfg, false);
            println!("mastodiff - Status Check\n");
            println!("Config: {}", cli.config);
            println!("Output dir: {}", shellexpand(&cfg.bot.output_dir));
            println!(
                "Images: default {} / max {} / batch {} / tile {}x{}",
                cfg.image_gen.image_count,
                cfg.image_gen.max_image_count,
                cfg.image_gen.max_batch_process,
                cfg.image_gen.image_tile_xy.0,
                cfg.image_gen.image_tile_xy.1
            );
            println!();

            if cfg.mastodon.endpoint_url.is_empty() || cfg.mastodon.access_token.is_empty() {
                println!("  mastodon: missing endpoint_url or access_token");
            } else {
                let client = MastodonChannel::new(cfg.mastodon.clone());
                match client.verify_credentials().await {
                    Ok(me) => println!("  mastodon: authenticated as @{}", me.acct),
                    Err(e) => println!("  mastodon: {e}"),
                }
            }

            let pipeline = DiffusersPipeline::from_config(&cfg.pipeline);
            println!(
                "  pipeline: {}",
                if pipeline.is_available().await {
                    "available"
                } else {
                    "not reachable"
                }
            );

            for (name, handler) in [("diffuse_me", &cfg.handlers.diffuse_me), ("ask", &cfg.handlers.ask)] {
                println!(
                    "  handler {name}: {} (#{}{})",
                    if handler.enabled { "enabled" } else { "disabled" },
                    handler.tag_name,
                    if handler.allow_self_request_only {
                        ", self only"
                    } else {
                        ""
                    }
                );
            }
        }
        Commands::Compile { text } => {
            let _guard = init_logging(&cfg, false);
            if text.is_empty() {
                anyhow::bail!("no text provided. Usage: mastodiff compile <text>");
            }
            let request = build_compiler(&cfg).compile_html(&text.join(" "))?;
            println!("{}", serde_json::to_string_pretty(&request)?);
        }
    }

    Ok(())
}

/// Log to a daily rolling file under `{data_dir}/logs`, and to stdout when
/// running the bot.
fn init_logging(cfg: &Config, stdout: bool) -> Option<WorkerGuard> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.bot.log_level));

    let log_dir = PathBuf::from(shellexpand(&cfg.bot.data_dir)).join("logs");
    let (file_layer, guard) = match std::fs::create_dir_all(&log_dir) {
        Ok(()) => {
            let appender = tracing_appender::rolling::daily(&log_dir, "mastodiff.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        Err(e) => {
            eprintln!("cannot create log dir {}: {e}", log_dir.display());
            (None, None)
        }
    };
    let stdout_layer = stdout.then(tracing_subscriber::fmt::layer);

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();
    guard
}

fn build_compiler(cfg: &Config) -> ParamCompiler {
    ParamCompiler::new(
        cfg.image_gen.clone(),
        cfg.prompt.clone(),
        cfg.prompt_args.clone(),
        cfg.proc_kwargs.clone(),
    )
}

/// Build the enabled handlers in their fixed order: `diffuse_me`, then `ask`.
fn build_registry(
    cfg: &Config,
    pipeline: Arc<dyn ImagePipeline>,
) -> anyhow::Result<HandlerRegistry<BotHandler>> {
    let policy = ReplyPolicy {
        delete_processing_message: cfg.bot.delete_processing_message,
        reblog_replies: cfg.bot.reblog_replies,
    };
    let mut handlers = Vec::new();

    if cfg.handlers.diffuse_me.enabled {
        let runner = BatchRunner::new(
            pipeline,
            cfg.image_gen.max_batch_process,
            cfg.image_gen.image_tile_xy,
            shellexpand(&cfg.bot.output_dir),
        );
        handlers.push(BotHandler::DiffuseMe(DiffuseMeHandler::new(
            EligibilityRule::from_config(&cfg.handlers.diffuse_me),
            runner,
            policy,
            cfg.bot.no_image_on_any_nsfw,
            cfg.messages.clone(),
        )));
    }

    if cfg.handlers.ask.enabled {
        if cfg.assistant.api_key.is_empty() {
            anyhow::bail!(
                "The ask handler is enabled but assistant.api_key is empty. \
                 Set it in config.toml or OPENAI_API_KEY env var."
            );
        }
        handlers.push(BotHandler::Ask(AskHandler::new(
            EligibilityRule::from_config(&cfg.handlers.ask),
            Arc::new(OpenAiAssistant::from_config(&cfg.assistant)),
            paste::build_uploader(&cfg.paste).map(Arc::from),
            Duration::from_secs(cfg.assistant.retry_delay_secs),
            policy,
            cfg.messages.clone(),
        )));
    }

    Ok(HandlerRegistry::new(handlers))
}
