//! Paste services used for answers too long for one status.

use async_trait::async_trait;
use mastodiff_core::{
    config::{PasteBackend, PasteConfig},
    error::BotError,
    traits::PasteUploader,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

/// Build the configured uploader, if any.
pub fn build_uploader(config: &PasteConfig) -> Option<Box<dyn PasteUploader>> {
    match config.backend {
        PasteBackend::None => None,
        PasteBackend::Pastebin => {
            if config.pastebin_api_key.is_empty() {
                warn!("paste: pastebin selected but no api key configured");
            }
            Some(Box::new(PastebinUploader::from_config(config)))
        }
        PasteBackend::Gist => {
            if config.github_token.is_empty() {
                warn!("paste: gist selected but no github token configured");
            }
            Some(Box::new(GistUploader::from_config(config)))
        }
    }
}

/// pastebin.com, unlisted and never expiring.
pub struct PastebinUploader {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl PastebinUploader {
    pub fn from_config(config: &PasteConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.pastebin_base_url.trim_end_matches('/').to_string(),
            api_key: config.pastebin_api_key.clone(),
        }
    }
}

#[async_trait]
impl PasteUploader for PastebinUploader {
    fn name(&self) -> &str {
        "pastebin"
    }

    async fn upload(&self, title: &str, text: &str) -> Result<String, BotError> {
        let url = format!("{}/api/api_post.php", self.base_url);
        let form = [
            ("api_dev_key", self.api_key.as_str()),
            ("api_option", "paste"),
            ("api_paste_code", text),
            ("api_paste_name", title),
            ("api_paste_private", "1"),
            ("api_paste_expire_date", "N"),
        ];
        debug!("pastebin: POST {url} ({} chars)", text.len());

        let resp = self
            .client
            .post(&url)
            .form(&form)
            .send()
            .await
            .map_err(|e| BotError::Upload(format!("pastebin request failed: {e}")))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| BotError::Upload(format!("pastebin: failed to read response: {e}")))?;
        let body = body.trim();

        // Errors come back as 200 with a plain-text "Bad API request" body.
        if !status.is_success() || !body.starts_with("http") {
            return Err(BotError::Upload(format!("pastebin returned {status}: {body}")));
        }
        Ok(body.to_string())
    }
}

/// Secret GitHub gist.
pub struct GistUploader {
    client: reqwest::Client,
    api_url: String,
    token: String,
}

impl GistUploader {
    pub fn from_config(config: &PasteConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config.github_api_url.trim_end_matches('/').to_string(),
            token: config.github_token.clone(),
        }
    }
}

#[derive(Deserialize)]
struct GistResponse {
    html_url: String,
}

#[async_trait]
impl PasteUploader for GistUploader {
    fn name(&self) -> &str {
        "gist"
    }

    async fn upload(&self, title: &str, text: &str) -> Result<String, BotError> {
        let url = format!("{}/gists", self.api_url);
        let body = json!({
            "description": title,
            "public": false,
            "files": { "answer.md": { "content": text } }
        });
        debug!("gist: POST {url} ({} chars)", text.len());

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", "mastodiff")
            .json(&body)
            .send()
            .await
            .map_err(|e| BotError::Upload(format!("gist request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(BotError::Upload(format!("gist returned {status}: {text}")));
        }

        let gist: GistResponse = resp
            .json()
            .await
            .map_err(|e| BotError::Upload(format!("gist: failed to parse response: {e}")))?;
        Ok(gist.html_url)
    }
}
