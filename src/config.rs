use std::env;
use std::path::PathBuf;
use std::time::Duration;

use eyre::{Result, WrapErr, eyre};
use url::Url;

use crate::completion::Persona;

pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Settings for the Gemini client, fixed for the lifetime of the process.
// No Debug: the struct holds the API key.
#[derive(Clone)]
pub struct ClientConfig {
    /// `None` when no credential is configured; the client then answers
    /// every query with a configuration notice.
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: Url,
    pub timeout: Duration,
    pub persona: Persona,
    /// Whether image attachments are forwarded to the model.
    pub multimodal: bool,
}

impl ClientConfig {
    pub fn from_env(persona: Persona) -> Result<Self> {
        let api_key = env::var("GEMINI_API_KEY")
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());

        let model = env::var("MAXAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        let endpoint = env::var("MAXAI_ENDPOINT").unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string());
        let endpoint = Url::parse(&endpoint)
            .wrap_err_with(|| format!("MAXAI_ENDPOINT is not a valid URL: {}", endpoint))?;

        let timeout = match env::var("MAXAI_TIMEOUT_SECS") {
            Ok(secs) => {
                let secs: u64 = secs
                    .trim()
                    .parse()
                    .map_err(|_| eyre!("MAXAI_TIMEOUT_SECS must be a whole number of seconds"))?;
                Duration::from_secs(secs)
            }
            Err(_) => DEFAULT_TIMEOUT,
        };

        Ok(Self {
            api_key,
            model,
            endpoint,
            timeout,
            persona,
            multimodal: true,
        })
    }
}

/// Everything the chat front end needs besides the client settings.
#[derive(Clone)]
pub struct AppConfig {
    pub client: ClientConfig,
    pub data_dir: PathBuf,
    /// Shell command used for dictation; dictation is unavailable without it.
    pub stt_command: Option<String>,
    pub offline: bool,
    pub speech_enabled: bool,
}

impl AppConfig {
    pub fn from_env(persona: Persona, offline: bool, speech_enabled: bool) -> Result<Self> {
        let client = ClientConfig::from_env(persona)?;

        let data_dir = match env::var("MAXAI_DATA_DIR") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => dirs::data_dir()
                .map(|dir| dir.join("maxai"))
                .ok_or_else(|| eyre!("could not determine a data directory; set MAXAI_DATA_DIR"))?,
        };

        let stt_command = env::var("MAXAI_STT_COMMAND")
            .ok()
            .filter(|cmd| !cmd.trim().is_empty());

        Ok(Self {
            client,
            data_dir,
            stt_command,
            offline,
            speech_enabled,
        })
    }
}
