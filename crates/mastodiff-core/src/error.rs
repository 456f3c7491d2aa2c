use thiserror::Error;

/// Top-level error type for mastodiff.
#[derive(Debug, Error)]
pub enum BotError {
    /// Error from the social network client.
    #[error("social error: {0}")]
    Social(String),

    /// Error from the image-generation pipeline.
    #[error("pipeline error: {0}")]
    Pipeline(String),

    /// Error from the conversational assistant.
    #[error("assistant error: {0}")]
    Assistant(String),

    /// Error from a paste/gist upload.
    #[error("upload error: {0}")]
    Upload(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Image decoding, encoding or composition error.
    #[error("image error: {0}")]
    Image(String),

    /// An inline `args.<name> <value>` directive carried a value that does
    /// not parse as the expected type.
    #[error("invalid value for args.{name}: {value:?}")]
    InvalidDirective { name: String, value: String },

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
