use std::path::PathBuf;

use thiserror::Error;

/// Failures of the local key-value store backing the persisted history.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize {key}: {source}")]
    Serialize {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Failures of a speech capability.
#[derive(Debug, Error)]
pub enum SpeechError {
    /// The platform has no engine for this kind of speech.
    #[error("{0} is not supported on this system")]
    Unsupported(&'static str),

    #[error("speech engine failed: {0}")]
    Engine(String),
}

/// Failures of a single call to the Gemini API.
///
/// These never reach the conversation: the client turns every one of them
/// into a fallback reply.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("GEMINI_API_KEY is not set")]
    MissingCredential,

    #[error("invalid endpoint: {0}")]
    Endpoint(#[from] url::ParseError),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API request failed with status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("response contained no text")]
    EmptyResponse,
}

/// Problems loading an image to attach to a message.
#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported image type: {0}")]
    UnsupportedType(String),
}
