use serde::{Deserialize, Serialize};

use super::defaults::*;

/// Diffusion pipeline server config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_pipeline_base_url")]
    pub base_url: String,
    /// Per-call timeout. Generation of one sub-batch must fit in it.
    #[serde(default = "default_pipeline_timeout")]
    pub timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            base_url: default_pipeline_base_url(),
            timeout_secs: default_pipeline_timeout(),
        }
    }
}

/// OpenAI-compatible chat endpoint used by the `ask` handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    /// Falls back to `OPENAI_API_KEY` when empty.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_openai_model")]
    pub model: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default = "default_assistant_timeout")]
    pub timeout_secs: u64,
    /// Wait before the single retry of a failed request.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_base_url(),
            api_key: String::new(),
            model: default_openai_model(),
            system_prompt: None,
            timeout_secs: default_assistant_timeout(),
            retry_delay_secs: default_retry_delay(),
        }
    }
}

/// Where long answers are uploaded.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PasteBackend {
    #[default]
    None,
    Pastebin,
    Gist,
}

/// Paste service config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasteConfig {
    #[serde(default)]
    pub backend: PasteBackend,
    /// Falls back to `PASTEBIN_API_KEY` when empty.
    #[serde(default)]
    pub pastebin_api_key: String,
    #[serde(default = "default_pastebin_base_url")]
    pub pastebin_base_url: String,
    /// Falls back to `GITHUB_TOKEN` when empty.
    #[serde(default)]
    pub github_token: String,
    #[serde(default = "default_github_api_url")]
    pub github_api_url: String,
}

impl Default for PasteConfig {
    fn default() -> Self {
        Self {
            backend: PasteBackend::None,
            pastebin_api_key: String::new(),
            pastebin_base_url: default_pastebin_base_url(),
            github_token: String::new(),
            github_api_url: default_github_api_url(),
        }
    }
}
