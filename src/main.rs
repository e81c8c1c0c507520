mod cli;
mod completion;
mod config;
mod conversation;
mod error;
mod gemini_client;
mod simulated_client;
mod speech;
mod storage;

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use eyre::Result;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use crate::cli::chat::{format_message_line, ChatContext, ChatOptions};
use crate::completion::{CompletionService, Persona};
use crate::config::AppConfig;
use crate::conversation::ConversationSession;
use crate::gemini_client::GeminiClient;
use crate::simulated_client::SimulatedClient;
use crate::speech::system::{CommandRecognizer, CommandSynthesizer};
use crate::speech::{SpeechInput, SpeechInputCapability, SpeechOutput, SpeechOutputCapability};
use crate::storage::{FileStore, Persistence};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Input to send to the chat
    #[arg(short, long, global = true)]
    input: Option<String>,

    /// Image to attach to the input
    #[arg(long, global = true, requires = "input")]
    image: Option<PathBuf>,

    /// Personality of the assistant
    #[arg(short, long, global = true, value_enum, default_value_t = Persona::Assistant)]
    persona: Persona,

    /// Use the built-in simulated backend instead of Gemini
    #[arg(long, global = true)]
    offline: bool,

    /// Disable voice input and spoken replies
    #[arg(long, global = true)]
    no_speech: bool,

    /// Never send images to the model
    #[arg(long, global = true)]
    text_only: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a chat session
    Chat,
    /// Print the saved conversation
    History,
    /// Delete the saved conversation
    Clear,
}

fn build_session(config: &AppConfig) -> Result<ConversationSession> {
    let completion: Arc<dyn CompletionService> = if config.offline {
        info!("Using simulated backend");
        Arc::new(SimulatedClient::new())
    } else {
        Arc::new(GeminiClient::new(config.client.clone()))
    };

    let (speech_input, speech_output) = if config.speech_enabled {
        let recognizer = CommandRecognizer::probe(config.stt_command.as_deref())
            .map(|r| Box::new(r) as Box<dyn SpeechInputCapability>);
        let synthesizer =
            CommandSynthesizer::probe().map(|s| Box::new(s) as Box<dyn SpeechOutputCapability>);
        (SpeechInput::new(recognizer), SpeechOutput::new(synthesizer))
    } else {
        (SpeechInput::unsupported(), SpeechOutput::unsupported())
    };

    let persistence = Persistence::new(Box::new(FileStore::new(&config.data_dir)?));

    Ok(ConversationSession::new(
        completion,
        speech_input,
        speech_output,
        persistence,
    ))
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load environment variables from .env file
    dotenv().ok();

    let cli = Cli::parse();

    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };

    // Logs go to stderr so they stay out of the transcript.
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = AppConfig::from_env(cli.persona, cli.offline, !cli.no_speech)?;
    config.client.multimodal = !cli.text_only;
    info!("Starting maxAI ({} persona)", config.client.persona);

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => {
            if !config.offline && config.client.api_key.is_none() {
                eprintln!(
                    "GEMINI_API_KEY is not set: replies will explain how to configure it. \
                     Use --offline to try the simulated backend."
                );
            }

            let session = build_session(&config)?;
            let options = ChatOptions {
                interactive: cli.input.is_none(),
                input: cli.input,
                image: cli.image,
                multimodal: config.client.multimodal,
            };
            let mut chat_context = ChatContext::new(Box::new(io::stdout()), options, session);
            chat_context.run().await
        }
        Commands::History => {
            let persistence = Persistence::new(Box::new(FileStore::new(&config.data_dir)?));
            let messages = persistence.load_log();
            let mut stdout = io::stdout();
            if messages.is_empty() {
                writeln!(stdout, "No saved conversation.")?;
            }
            for message in messages {
                writeln!(stdout, "{}\n", format_message_line(message.role, &message.content))?;
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Clear => {
            let persistence = Persistence::new(Box::new(FileStore::new(&config.data_dir)?));
            persistence.save_log(&[])?;
            println!("Conversation history cleared.");
            Ok(ExitCode::SUCCESS)
        }
    }
}
