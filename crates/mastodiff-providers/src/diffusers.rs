//! Diffusion pipeline served over HTTP.
//!
//! The server runs the model; this client only ships prompts and knobs and
//! decodes the base64 PNGs it gets back.

use async_trait::async_trait;
use base64::Engine;
use mastodiff_core::{
    config::PipelineConfig,
    error::BotError,
    knobs::Knobs,
    traits::{GenerationCall, GenerationOutput, ImagePipeline},
};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// HTTP diffusion pipeline client.
pub struct DiffusersPipeline {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl DiffusersPipeline {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

#[derive(Serialize)]
pub(crate) struct GenerateRequest<'a> {
    pub prompt: &'a [String],
    pub negative_prompt: Option<&'a [String]>,
    #[serde(flatten)]
    pub knobs: &'a Knobs,
}

#[derive(Deserialize)]
pub(crate) struct GenerateResponse {
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub nsfw_content_detected: Option<Vec<bool>>,
}

/// Decode one base64 image, tolerating a `data:` URL prefix.
pub(crate) fn decode_image(encoded: &str) -> Result<image::DynamicImage, BotError> {
    let payload = match encoded.split_once(";base64,") {
        Some((_, data)) => data,
        None => encoded,
    };
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| BotError::Image(format!("invalid base64 image: {e}")))?;
    image::load_from_memory(&bytes).map_err(|e| BotError::Image(format!("undecodable image: {e}")))
}

#[async_trait]
impl ImagePipeline for DiffusersPipeline {
    fn name(&self) -> &str {
        "diffusers"
    }

    async fn generate(&self, call: &GenerationCall) -> Result<GenerationOutput, BotError> {
        let body = GenerateRequest {
            prompt: &call.prompts,
            negative_prompt: call.negative_prompts.as_deref(),
            knobs: &call.knobs,
        };
        let url = format!("{}/generate", self.base_url);
        let start = Instant::now();
        debug!("diffusers: POST {url} batch={}", call.prompts.len());

        let resp = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BotError::Pipeline(format!("generation timed out after {:?}", self.timeout))
                } else {
                    BotError::Pipeline(format!("pipeline request failed: {e}"))
                }
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(BotError::Pipeline(format!("pipeline returned {status}: {text}")));
        }

        let parsed: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| BotError::Pipeline(format!("failed to parse pipeline response: {e}")))?;

        let images = parsed
            .images
            .iter()
            .map(|encoded| decode_image(encoded))
            .collect::<Result<Vec<_>, _>>()?;
        let nsfw_flags = parsed.nsfw_content_detected.unwrap_or_default();
        if !nsfw_flags.is_empty() && nsfw_flags.len() != images.len() {
            warn!(
                "diffusers: {} nsfw flags for {} images",
                nsfw_flags.len(),
                images.len()
            );
        }

        debug!(
            "diffusers: {} image(s) in {}ms",
            images.len(),
            start.elapsed().as_millis()
        );
        Ok(GenerationOutput { images, nsfw_flags })
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self
            .client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                warn!("diffusers pipeline not available: {e}");
                false
            }
        }
    }
}
