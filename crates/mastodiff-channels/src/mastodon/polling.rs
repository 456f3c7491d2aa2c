//! Timeline polling loop and SocialClient trait implementation.

use super::types::Notification;
use super::{Cursors, MastodonChannel};
use async_trait::async_trait;
use mastodiff_core::{
    error::BotError,
    message::{Account, MediaAttachment, NewStatus, Status},
    traits::SocialClient,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info};

/// Page size used for every timeline request.
const PAGE_SIZE: usize = 40;

/// Pages fetched per poll; the rest is picked up on the next one.
const MAX_PAGES: usize = 5;

#[async_trait]
impl SocialClient for MastodonChannel {
    fn name(&self) -> &str {
        "mastodon"
    }

    async fn verify_credentials(&self) -> Result<Account, BotError> {
        let resp = self
            .client
            .get(self.url("/api/v1/accounts/verify_credentials"))
            .bearer_auth(self.token())
            .send()
            .await
            .map_err(|e| BotError::Social(format!("verify_credentials failed: {e}")))?;
        let resp = super::send::check_status(resp, "verify_credentials").await?;
        resp.json()
            .await
            .map_err(|e| BotError::Social(format!("verify_credentials parse error: {e}")))
    }

    async fn start(&self) -> Result<mpsc::Receiver<Status>, BotError> {
        let me = self.verify_credentials().await?;

        let (tx, rx) = mpsc::channel(64);
        let poller = Poller {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: self.config.access_token.clone(),
            account_id: me.id.clone(),
            cursors: self.cursors.clone(),
        };
        let interval = Duration::from_secs(self.config.poll_interval_secs.max(1));

        info!("mastodon client polling as @{} every {:?}", me.acct, interval);

        tokio::spawn(async move {
            let mut backoff_secs: u64 = 1;

            loop {
                let batch = match poller.poll_once().await {
                    Ok(b) => b,
                    Err(e) => {
                        error!("mastodon poll error (retry in {backoff_secs}s): {e}");
                        tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
                        backoff_secs = (backoff_secs * 2).min(60);
                        continue;
                    }
                };

                // Successful poll -- reset backoff.
                backoff_secs = 1;

                for status in batch {
                    debug!("mastodon: status {} from @{}", status.id, status.account.acct);
                    if tx.send(status).await.is_err() {
                        info!("mastodon receiver dropped, stopping poll loop");
                        return;
                    }
                }

                tokio::time::sleep(interval).await;
            }
        });

        Ok(rx)
    }

    async fn post_status(&self, status: &NewStatus) -> Result<Status, BotError> {
        self.send_status(status).await
    }

    async fn post_media(&self, bytes: Vec<u8>, mime: &str) -> Result<MediaAttachment, BotError> {
        self.upload_media(bytes, mime).await
    }

    async fn delete_status(&self, status_id: &str) -> Result<(), BotError> {
        self.remove_status(status_id).await
    }

    async fn reblog(&self, status_id: &str) -> Result<(), BotError> {
        self.boost_status(status_id).await
    }
}

fn notification_id(notification: &Notification) -> &str {
    &notification.id
}

fn status_id(status: &Status) -> &str {
    &status.id
}

/// State moved into the polling task.
pub(crate) struct Poller {
    pub client: reqwest::Client,
    pub base_url: String,
    pub token: String,
    pub account_id: String,
    pub cursors: Arc<Mutex<Cursors>>,
}

impl Poller {
    /// Fetch new statuses from both timelines, oldest first.
    ///
    /// The first call only records the newest ids so that a restart does
    /// not replay old requests.
    pub async fn poll_once(&self) -> Result<Vec<Status>, BotError> {
        let mut cursors = self.cursors.lock().await;

        let (notifications, newest_notification) = self
            .fetch_after(
                "/api/v1/notifications",
                &[("types[]", "mention")],
                cursors.notifications.as_deref(),
                notification_id,
            )
            .await?;
        let own_path = format!("/api/v1/accounts/{}/statuses", self.account_id);
        let (own, newest_own) = self
            .fetch_after(&own_path, &[], cursors.own_statuses.as_deref(), status_id)
            .await?;

        if newest_notification.is_some() {
            cursors.notifications = newest_notification;
        }
        if newest_own.is_some() {
            cursors.own_statuses = newest_own;
        }

        if !cursors.seeded {
            cursors.seeded = true;
            debug!(
                "mastodon cursors seeded: notifications={:?} statuses={:?}",
                cursors.notifications, cursors.own_statuses
            );
            return Ok(Vec::new());
        }

        let mut batch: Vec<Status> = notifications
            .into_iter()
            .filter(|n| n.kind == "mention")
            .filter_map(|n| n.status)
            .collect();
        batch.extend(own);
        Ok(batch)
    }

    /// Everything newer than `cursor`, oldest first, plus the newest id seen.
    ///
    /// Without a cursor only the latest page is read. With one, pages are
    /// walked forward through `min_id` until a short page comes back, so a
    /// burst larger than one page leaves no gap.
    async fn fetch_after<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        filters: &[(&str, &str)],
        cursor: Option<&str>,
        id_of: fn(&T) -> &str,
    ) -> Result<(Vec<T>, Option<String>), BotError> {
        let limit = PAGE_SIZE.to_string();
        let mut query: Vec<(&str, &str)> = filters.to_vec();
        query.push(("limit", limit.as_str()));

        let Some(cursor) = cursor else {
            // Pages come back newest first.
            let page: Vec<T> = self.get_json(path, &query).await?;
            let newest = page.first().map(|item| id_of(item).to_string());
            return Ok((page.into_iter().rev().collect(), newest));
        };

        let mut items = Vec::new();
        let mut newest: Option<String> = None;
        let mut min_id = cursor.to_string();
        for _ in 0..MAX_PAGES {
            let page: Vec<T> = {
                let mut paged = query.clone();
                paged.push(("min_id", min_id.as_str()));
                self.get_json(path, &paged).await?
            };
            let Some(first) = page.first() else {
                break;
            };
            let next = id_of(first).to_string();
            let full = page.len() >= PAGE_SIZE;
            items.extend(page.into_iter().rev());
            newest = Some(next.clone());
            if !full {
                break;
            }
            min_id = next;
        }
        Ok((items, newest))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, BotError> {
        let resp = self
            .client
            .get(format!("{}{path}", self.base_url))
            .bearer_auth(&self.token)
            .query(query)
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .map_err(|e| BotError::Social(format!("GET {path} failed: {e}")))?;
        let resp = super::send::check_status(resp, path).await?;
        resp.json()
            .await
            .map_err(|e| BotError::Social(format!("GET {path} parse error: {e}")))
    }
}
