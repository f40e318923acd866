//! Error types for Contact Capture.

/// Top-level error type for the capture tool.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),
}

/// Configuration-related errors. Always fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Transport (Telegram Bot API) errors.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to poll for updates: {0}")]
    PollFailed(String),

    #[error("Failed to download file {file_id}: {reason}")]
    DownloadFailed { file_id: String, reason: String },

    #[error("Failed to send message: {0}")]
    SendFailed(String),

    #[error("Invalid update payload: {0}")]
    InvalidUpdate(String),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Per-message pipeline errors.
///
/// Each variant aborts only the message being processed; the batch always
/// continues. `MissingCapability` is the exception — the pipeline intercepts
/// it and degrades instead of aborting.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("Unsupported input kind: {0}")]
    UnsupportedInputKind(String),

    #[error("Capability not configured: {0}")]
    MissingCapability(&'static str),

    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("Business card extraction failed: {0}")]
    VisionExtraction(String),

    #[error("Contact parsing failed: {0}")]
    Parsing(String),

    #[error("Record write failed: {0}")]
    StoreWrite(#[from] StoreError),
}

impl CaptureError {
    /// Short stage label for logs and failure notifications.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::UnsupportedInputKind(_) => "input",
            Self::MissingCapability(_) => "capability",
            Self::Transcription(_) => "transcription",
            Self::VisionExtraction(_) => "vision",
            Self::Parsing(_) => "parsing",
            Self::StoreWrite(_) => "store",
        }
    }
}

/// Persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),
}

/// Result type alias for the capture tool.
pub type Result<T> = std::result::Result<T, Error>;
