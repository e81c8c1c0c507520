//! The seam between the conversation and whatever produces replies.

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use clap::ValueEnum;

use crate::error::AttachmentError;

/// Reply used when no credential is configured.
pub const CONFIGURATION_ERROR_MESSAGE: &str = "I can't reach my brain yet: no GEMINI_API_KEY is configured. \
Add it to your environment or a .env file and restart maxAI.";

/// Something that turns one user query into one reply.
///
/// Implementations must always produce text. Failures are reported as a
/// human-readable reply, never as an error.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, query: &str, attachment: Option<&Attachment>) -> String;
}

/// Voice and style of the assistant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Persona {
    /// maxAI, the general-purpose assistant.
    #[default]
    Assistant,
    /// A friendly buddy who answers in Hinglish.
    Hinglish,
}

impl Persona {
    pub fn system_instruction(self) -> &'static str {
        match self {
            Persona::Assistant => {
                "You are maxAI, a friendly and knowledgeable AI assistant. \
                 Give clear, accurate answers. Keep replies concise enough to be read aloud, \
                 use short paragraphs and simple lists, and avoid heavy markdown."
            }
            Persona::Hinglish => {
                "You are maxAI, the user's witty best friend. Always reply in casual Hinglish \
                 (a natural mix of Hindi and English written in the Latin alphabet), \
                 like chatting with a close buddy. Be warm, funny and helpful, \
                 and keep answers short enough to be read aloud."
            }
        }
    }

    /// Reply used when the service call fails.
    pub fn fallback_message(self) -> &'static str {
        match self {
            Persona::Assistant => {
                "I'm having trouble connecting to my knowledge core right now. \
                 Please try again in a moment."
            }
            Persona::Hinglish => {
                "Arre yaar, kuch gadbad ho gayi! Network ne dhokha de diya. \
                 Thodi der baad phir se try karo na."
            }
        }
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Persona::Assistant => write!(f, "assistant"),
            Persona::Hinglish => write!(f, "hinglish"),
        }
    }
}

/// A single inline binary attachment sent along with a query.
#[derive(Clone, PartialEq, Eq)]
pub struct Attachment {
    pub data: Vec<u8>,
    pub mime_type: String,
}

impl Attachment {
    pub fn new(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            data,
            mime_type: mime_type.into(),
        }
    }

    /// Load an image from disk, deriving its MIME type from the extension.
    pub fn from_image_file(path: &Path) -> Result<Self, AttachmentError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default();

        let mime_type = image_mime_type(&extension)
            .ok_or_else(|| AttachmentError::UnsupportedType(path.display().to_string()))?;

        let data = std::fs::read(path).map_err(|source| AttachmentError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Self::new(data, mime_type))
    }
}

// Raw image bytes are useless in logs.
impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachment")
            .field("mime_type", &self.mime_type)
            .field("len", &self.data.len())
            .finish()
    }
}

fn image_mime_type(extension: &str) -> Option<&'static str> {
    match extension {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "heic" => Some("image/heic"),
        "heif" => Some("image/heif"),
        _ => None,
    }
}
