//! In-memory collaborators shared by the binary's tests.

use async_trait::async_trait;
use mastodiff_core::{
    error::BotError,
    message::{Account, MediaAttachment, Mention, NewStatus, Status, Tag, Visibility},
    traits::SocialClient,
};
use std::sync::Mutex;
use tokio::sync::mpsc;

pub const BOT_URL: &str = "https://example.social/@bot";

pub fn bot_account() -> Account {
    Account {
        id: "1".into(),
        acct: "bot".into(),
        url: BOT_URL.into(),
        ..Default::default()
    }
}

pub fn alice() -> Account {
    Account {
        id: "2".into(),
        acct: "alice@other.social".into(),
        url: "https://other.social/@alice".into(),
        ..Default::default()
    }
}

/// A status with the given tags whose HTML body is `<p>{text}</p>`.
pub fn status(id: &str, account: Account, tags: &[&str], mention_bot: bool, text: &str) -> Status {
    Status {
        id: id.into(),
        account,
        visibility: Visibility::Public,
        content: format!("<p>{text}</p>"),
        tags: tags
            .iter()
            .map(|name| Tag {
                name: name.to_string(),
                url: String::new(),
            })
            .collect(),
        mentions: if mention_bot {
            vec![Mention {
                id: "1".into(),
                acct: "bot".into(),
                url: BOT_URL.into(),
                username: "bot".into(),
            }]
        } else {
            Vec::new()
        },
        ..Default::default()
    }
}

/// Records everything posted; uploads always succeed.
#[derive(Default)]
pub struct MockClient {
    pub posted: Mutex<Vec<NewStatus>>,
    pub deleted: Mutex<Vec<String>>,
    pub reblogged: Mutex<Vec<String>>,
    pub uploads: Mutex<usize>,
    pub inbound: Mutex<Option<mpsc::Receiver<Status>>>,
}

impl MockClient {
    /// A client whose `start` yields the returned sender's statuses.
    pub fn with_inbound() -> (Self, mpsc::Sender<Status>) {
        let (tx, rx) = mpsc::channel(16);
        let client = Self {
            inbound: Mutex::new(Some(rx)),
            ..Default::default()
        };
        (client, tx)
    }

    pub fn posted(&self) -> Vec<NewStatus> {
        self.posted.lock().unwrap().clone()
    }
}

#[async_trait]
impl SocialClient for MockClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn verify_credentials(&self) -> Result<Account, BotError> {
        Ok(bot_account())
    }

    async fn start(&self) -> Result<mpsc::Receiver<Status>, BotError> {
        match self.inbound.lock().unwrap().take() {
            Some(rx) => Ok(rx),
            None => Err(BotError::Social("already started".into())),
        }
    }

    async fn post_status(&self, post: &NewStatus) -> Result<Status, BotError> {
        let mut posted = self.posted.lock().unwrap();
        posted.push(post.clone());
        Ok(Status {
            id: format!("posted-{}", posted.len()),
            account: bot_account(),
            visibility: post.visibility,
            content: post.status.clone(),
            in_reply_to_id: post.in_reply_to_id.clone(),
            ..Default::default()
        })
    }

    async fn post_media(&self, _bytes: Vec<u8>, _mime: &str) -> Result<MediaAttachment, BotError> {
        let mut uploads = self.uploads.lock().unwrap();
        *uploads += 1;
        Ok(MediaAttachment {
            id: format!("media-{uploads}"),
            media_type: "image".into(),
            url: None,
        })
    }

    async fn delete_status(&self, status_id: &str) -> Result<(), BotError> {
        self.deleted.lock().unwrap().push(status_id.to_string());
        Ok(())
    }

    async fn reblog(&self, status_id: &str) -> Result<(), BotError> {
        self.reblogged.lock().unwrap().push(status_id.to_string());
        Ok(())
    }
}
