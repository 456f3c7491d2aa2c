//! OpenAI-compatible chat assistant.
//!
//! Works with OpenAI's API and any compatible endpoint. Each question is a
//! fresh single-turn conversation.

use async_trait::async_trait;
use mastodiff_core::{config::AssistantConfig, error::BotError, traits::ChatAssistant};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

/// OpenAI-compatible assistant.
pub struct OpenAiAssistant {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    system_prompt: Option<String>,
    timeout: Duration,
}

impl OpenAiAssistant {
    /// Create from config values.
    pub fn from_config(config: &AssistantConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            system_prompt: config.system_prompt.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

/// Build the message list for one question.
pub(crate) fn build_messages(system: Option<&str>, question: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = system.filter(|s| !s.is_empty()) {
        messages.push(ChatMessage {
            role: "system".to_string(),
            content: system.to_string(),
        });
    }
    messages.push(ChatMessage {
        role: "user".to_string(),
        content: question.to_string(),
    });
    messages
}

#[derive(Serialize, Deserialize, Clone)]
pub(crate) struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Serialize)]
pub(crate) struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

#[derive(Deserialize)]
pub(crate) struct ChatCompletionResponse {
    pub choices: Option<Vec<ChatChoice>>,
    pub usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
pub(crate) struct ChatChoice {
    pub message: Option<ChatMessage>,
}

#[derive(Deserialize)]
pub(crate) struct ChatUsage {
    pub total_tokens: Option<u64>,
}

#[async_trait]
impl ChatAssistant for OpenAiAssistant {
    fn name(&self) -> &str {
        "openai"
    }

    async fn send(&self, text: &str) -> Result<String, BotError> {
        let start = Instant::now();
        let body = ChatCompletionRequest {
            model: self.model.clone(),
            messages: build_messages(self.system_prompt.as_deref(), text),
        };

        let url = format!("{}/chat/completions", self.base_url);
        debug!("openai: POST {url} model={}", self.model);

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BotError::Assistant(format!("openai request timed out: {e}"))
                } else {
                    BotError::Assistant(format!("openai request failed: {e}"))
                }
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(BotError::Assistant(format!(
                "openai returned {status}: {text}"
            )));
        }

        let parsed: ChatCompletionResponse = resp
            .json()
            .await
            .map_err(|e| BotError::Assistant(format!("openai: failed to parse response: {e}")))?;

        let answer = parsed
            .choices
            .as_ref()
            .and_then(|c| c.first())
            .and_then(|c| c.message.as_ref())
            .map(|m| m.content.trim().to_string())
            .filter(|m| !m.is_empty())
            .ok_or_else(|| BotError::Assistant("openai: empty response".into()))?;

        debug!(
            "openai: answered in {}ms, {:?} tokens",
            start.elapsed().as_millis(),
            parsed.usage.as_ref().and_then(|u| u.total_tokens)
        );
        Ok(answer)
    }
}
