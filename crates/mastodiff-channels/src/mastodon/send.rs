//! Outbound calls: statuses, media uploads, deletes and boosts.

use super::types::ApiError;
use super::MastodonChannel;
use mastodiff_core::{
    error::BotError,
    message::{MediaAttachment, NewStatus, Status},
};
use std::time::Duration;
use tracing::{debug, warn};

/// How many times to poll an upload that is still being processed.
const MEDIA_READY_ATTEMPTS: u32 = 30;

impl MastodonChannel {
    pub(crate) async fn send_status(&self, status: &NewStatus) -> Result<Status, BotError> {
        let resp = self
            .client
            .post(self.url("/api/v1/statuses"))
            .bearer_auth(self.token())
            .json(status)
            .send()
            .await
            .map_err(|e| BotError::Social(format!("post status failed: {e}")))?;
        let resp = check_status(resp, "post status").await?;
        let posted: Status = resp
            .json()
            .await
            .map_err(|e| BotError::Social(format!("post status parse error: {e}")))?;
        debug!("mastodon: posted status {}", posted.id);
        Ok(posted)
    }

    /// Upload through `/api/v2/media`, waiting for server-side processing
    /// to finish so the attachment can be referenced right away.
    pub(crate) async fn upload_media(
        &self,
        bytes: Vec<u8>,
        mime: &str,
    ) -> Result<MediaAttachment, BotError> {
        let ext = mime.rsplit('/').next().unwrap_or("bin");
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(format!("image.{ext}"))
            .mime_str(mime)
            .map_err(|e| BotError::Social(format!("invalid media type {mime}: {e}")))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let resp = self
            .client
            .post(self.url("/api/v2/media"))
            .bearer_auth(self.token())
            .multipart(form)
            .send()
            .await
            .map_err(|e| BotError::Social(format!("media upload failed: {e}")))?;
        let processing = resp.status() == reqwest::StatusCode::ACCEPTED;
        let resp = check_status(resp, "media upload").await?;
        let media: MediaAttachment = resp
            .json()
            .await
            .map_err(|e| BotError::Social(format!("media upload parse error: {e}")))?;

        if processing {
            return self.wait_for_media(media).await;
        }
        Ok(media)
    }

    async fn wait_for_media(&self, media: MediaAttachment) -> Result<MediaAttachment, BotError> {
        let path = format!("/api/v1/media/{}", media.id);
        for _ in 0..MEDIA_READY_ATTEMPTS {
            tokio::time::sleep(Duration::from_secs(1)).await;
            let resp = self
                .client
                .get(self.url(&path))
                .bearer_auth(self.token())
                .send()
                .await
                .map_err(|e| BotError::Social(format!("media status failed: {e}")))?;
            if resp.status() == reqwest::StatusCode::PARTIAL_CONTENT {
                continue;
            }
            let resp = check_status(resp, "media status").await?;
            return resp
                .json()
                .await
                .map_err(|e| BotError::Social(format!("media status parse error: {e}")));
        }
        warn!("mastodon: media {} still processing, posting anyway", media.id);
        Ok(media)
    }

    pub(crate) async fn remove_status(&self, status_id: &str) -> Result<(), BotError> {
        let resp = self
            .client
            .delete(self.url(&format!("/api/v1/statuses/{status_id}")))
            .bearer_auth(self.token())
            .send()
            .await
            .map_err(|e| BotError::Social(format!("delete status failed: {e}")))?;
        check_status(resp, "delete status").await?;
        debug!("mastodon: deleted status {status_id}");
        Ok(())
    }

    pub(crate) async fn boost_status(&self, status_id: &str) -> Result<(), BotError> {
        let resp = self
            .client
            .post(self.url(&format!("/api/v1/statuses/{status_id}/reblog")))
            .bearer_auth(self.token())
            .send()
            .await
            .map_err(|e| BotError::Social(format!("reblog failed: {e}")))?;
        check_status(resp, "reblog").await?;
        Ok(())
    }
}

/// Turn a non-2xx response into a `BotError::Social` carrying the API's
/// `error` field when present.
pub(crate) async fn check_status(
    resp: reqwest::Response,
    what: &str,
) -> Result<reqwest::Response, BotError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ApiError>(&body)
        .map(|e| e.error)
        .unwrap_or(body);
    Err(BotError::Social(format!("{what} returned {status}: {detail}")))
}
