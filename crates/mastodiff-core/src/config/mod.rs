mod channels;
mod defaults;
mod messages;
mod providers;

#[cfg(test)]
mod tests;

pub use channels::*;
pub use messages::*;
pub use providers::*;

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::{error::BotError, knobs::Knobs};
use defaults::*;

/// Top-level mastodiff configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub mastodon: MastodonConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub image_gen: ImageGenConfig,
    #[serde(default)]
    pub prompt: PromptConfig,
    #[serde(default)]
    pub prompt_args: PromptArgsConfig,
    /// Default generation knobs, overridable per request.
    #[serde(default)]
    pub proc_kwargs: Knobs,
    #[serde(default)]
    pub handlers: HandlersConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(default)]
    pub paste: PasteConfig,
    #[serde(default)]
    pub messages: MessagesConfig,
}

/// General bot settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Where generated images and their prompt files are saved.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    /// Delete the "processing..." placeholder once the answer is posted.
    #[serde(default)]
    pub delete_processing_message: bool,
    /// Attach no images when any image in the batch was flagged.
    #[serde(default)]
    pub no_image_on_any_nsfw: bool,
    /// Boost every answer from the bot account.
    #[serde(default)]
    pub reblog_replies: bool,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            output_dir: default_output_dir(),
            delete_processing_message: false,
            no_image_on_any_nsfw: false,
            reblog_replies: false,
        }
    }
}

/// Image count and layout limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageGenConfig {
    /// Count used when the request does not set `args.image_count`.
    #[serde(default = "default_image_count")]
    pub image_count: u32,
    #[serde(default = "default_max_image_count")]
    pub max_image_count: u32,
    /// Most images generated by one pipeline call.
    #[serde(default = "default_max_batch_process")]
    pub max_batch_process: u32,
    /// Grid layout as (columns, rows) for posted images.
    #[serde(default = "default_image_tile_xy")]
    pub image_tile_xy: (u32, u32),
}

impl Default for ImageGenConfig {
    fn default() -> Self {
        Self {
            image_count: default_image_count(),
            max_image_count: default_max_image_count(),
            max_batch_process: default_max_batch_process(),
            image_tile_xy: default_image_tile_xy(),
        }
    }
}

/// Prompt defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptConfig {
    #[serde(default)]
    pub default_negative_prompt: Option<String>,
}

/// Which inline directives callers may use.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptArgsConfig {
    #[serde(default)]
    pub allow_ignore_default_negative_prompt: bool,
}

/// Trigger settings shared by all handlers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub tag_name: String,
    /// Accept only statuses written by the bot account itself.
    #[serde(default)]
    pub allow_self_request_only: bool,
}

/// Per-handler trigger settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlersConfig {
    #[serde(default = "default_diffuse_me_handler")]
    pub diffuse_me: HandlerConfig,
    #[serde(default = "default_ask_handler")]
    pub ask: HandlerConfig,
}

impl Default for HandlersConfig {
    fn default() -> Self {
        Self {
            diffuse_me: default_diffuse_me_handler(),
            ask: default_ask_handler(),
        }
    }
}

fn default_diffuse_me_handler() -> HandlerConfig {
    HandlerConfig {
        enabled: true,
        tag_name: default_diffuse_me_tag(),
        allow_self_request_only: false,
    }
}

fn default_ask_handler() -> HandlerConfig {
    HandlerConfig {
        enabled: false,
        tag_name: default_ask_tag(),
        allow_self_request_only: false,
    }
}

/// Expand `~` to home directory.
pub fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{rest}", home.to_string_lossy());
        }
    }
    path.to_string()
}

/// Fill blank secrets from the environment.
fn apply_env_secrets(config: &mut Config) {
    fn fill(slot: &mut String, var: &str) {
        if slot.is_empty() {
            if let Ok(value) = std::env::var(var) {
                *slot = value;
            }
        }
    }
    fill(&mut config.mastodon.access_token, "MASTODON_ACCESS_TOKEN");
    fill(&mut config.assistant.api_key, "OPENAI_API_KEY");
    fill(&mut config.paste.pastebin_api_key, "PASTEBIN_API_KEY");
    fill(&mut config.paste.github_token, "GITHUB_TOKEN");
}

/// Reject values the pipeline cannot work with.
fn validate(config: &Config) -> Result<(), BotError> {
    let ig = &config.image_gen;
    if ig.max_image_count == 0 {
        return Err(BotError::Config("image_gen.max_image_count must be >= 1".into()));
    }
    if ig.max_batch_process == 0 {
        return Err(BotError::Config("image_gen.max_batch_process must be >= 1".into()));
    }
    if ig.image_tile_xy.0 == 0 || ig.image_tile_xy.1 == 0 {
        return Err(BotError::Config("image_gen.image_tile_xy must be positive".into()));
    }
    Ok(())
}

/// Load configuration from a TOML file.
///
/// Falls back to defaults if the file does not exist.
pub fn load(path: &str) -> Result<Config, BotError> {
    let path = Path::new(path);
    let mut config = if !path.exists() {
        info!(
            "Config file not found at {}, using defaults",
            path.display()
        );
        Config::default()
    } else {
        let content = std::fs::read_to_string(path)
            .map_err(|e| BotError::Config(format!("failed to read {}: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| BotError::Config(format!("failed to parse config: {}", e)))?
    };

    apply_env_secrets(&mut config);
    validate(&config)?;
    Ok(config)
}
