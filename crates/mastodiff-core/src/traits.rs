use crate::{
    error::BotError,
    knobs::Knobs,
    message::{Account, MediaAttachment, NewStatus, Status},
};
use async_trait::async_trait;
use image::DynamicImage;

/// Social network client.
///
/// The Mastodon client implements this trait; tests implement it in memory.
#[async_trait]
pub trait SocialClient: Send + Sync {
    /// Human-readable client name.
    fn name(&self) -> &str;

    /// Look up the account the client is authenticated as.
    async fn verify_credentials(&self) -> Result<Account, BotError>;

    /// Start listening for inbound statuses.
    /// Returns a receiver that yields one status per event.
    async fn start(&self) -> Result<tokio::sync::mpsc::Receiver<Status>, BotError>;

    /// Post a new status (a reply when `in_reply_to_id` is set).
    async fn post_status(&self, status: &NewStatus) -> Result<Status, BotError>;

    /// Upload media bytes and return the attachment handle.
    async fn post_media(&self, bytes: Vec<u8>, mime: &str) -> Result<MediaAttachment, BotError>;

    /// Delete one of our own statuses.
    async fn delete_status(&self, status_id: &str) -> Result<(), BotError>;

    /// Boost a status.
    async fn reblog(&self, status_id: &str) -> Result<(), BotError>;

    /// Graceful shutdown.
    async fn stop(&self) -> Result<(), BotError> {
        Ok(())
    }
}

/// One call to the image-generation pipeline. Prompts are already
/// replicated to the sub-batch size.
#[derive(Debug, Clone)]
pub struct GenerationCall {
    pub prompts: Vec<String>,
    pub negative_prompts: Option<Vec<String>>,
    pub knobs: Knobs,
}

/// What the pipeline returns for one call.
#[derive(Debug, Default)]
pub struct GenerationOutput {
    pub images: Vec<DynamicImage>,
    /// One flag per image; may be empty when the pipeline has no checker.
    pub nsfw_flags: Vec<bool>,
}

impl GenerationOutput {
    pub fn any_nsfw(&self) -> bool {
        self.nsfw_flags.iter().any(|flag| *flag)
    }
}

/// Image-generation pipeline, treated as an opaque blocking capability.
#[async_trait]
pub trait ImagePipeline: Send + Sync {
    /// Human-readable pipeline name.
    fn name(&self) -> &str;

    /// Generate one sub-batch of images.
    async fn generate(&self, call: &GenerationCall) -> Result<GenerationOutput, BotError>;

    /// Check if the pipeline is reachable.
    async fn is_available(&self) -> bool;
}

/// Conversational assistant used by the `ask` handler.
#[async_trait]
pub trait ChatAssistant: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, text: &str) -> Result<String, BotError>;
}

/// Paste/gist service for answers too long to post.
#[async_trait]
pub trait PasteUploader: Send + Sync {
    fn name(&self) -> &str;

    /// Upload `text` and return its public URL.
    async fn upload(&self, title: &str, text: &str) -> Result<String, BotError>;
}
