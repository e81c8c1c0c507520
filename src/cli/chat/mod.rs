pub mod prompt;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use color_print::cformat;
use eyre::Result;
use prompt::generate_prompt;
use rustyline::error::ReadlineError;
use tracing::{debug, error};

use crate::completion::Attachment;
use crate::conversation::{ConversationSession, Message, MessageId, Role, SubmitOutcome, TurnStart};
use crate::error::SpeechError;

/// Starter prompts offered on the welcome screen: title, blurb, query.
pub const SUGGESTIONS: [(&str, &str, &str); 4] = [
    (
        "Explain quantum computing",
        "Break it down in simple terms for a 10 year old.",
        "Explain quantum computing to me like I'm 10.",
    ),
    (
        "Debug my React issue",
        "Get help fixing useEffect dependency array looping.",
        "Why is my useEffect causing an infinite loop in React?",
    ),
    (
        "Draft a sci-fi story",
        "Set in a dystopian future where AI is prohibited.",
        "Write a short sci-fi story about a world without AI.",
    ),
    (
        "Plan a workout routine",
        "A 4-day split for muscle hypertrophy.",
        "Create a 4-day workout split focused on building muscle.",
    ),
];

const WELCOME_TEXT: &str = "
Hello, I'm maxAI.

Your ultimate intelligence nexus. Start a conversation or pick a topic below
to explore the limits of my knowledge.
";

const HELP_TEXT: &str = "
maxAI

/try <n>      Send one of the suggested prompts
/mic          Dictate into the input line
/image <path> Attach an image to your next message
/speak        Turn reading replies aloud on or off
/stop         Stop speaking
/say <n>      Read the n-th reply aloud
/history      Show the conversation
/clear        Clear the conversation history
/help         Show this help dialogue
/quit         Quit the application

Ctrl-C stops speech, stops listening, or stops waiting for a reply.
";

/// Front-end options that don't belong to the session.
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    /// Send this once and exit instead of starting the REPL.
    pub input: Option<String>,
    /// Image attached to the one-shot input.
    pub image: Option<PathBuf>,
    pub interactive: bool,
    pub multimodal: bool,
}

pub struct ChatContext {
    output: Box<dyn Write>,
    options: ChatOptions,
    session: ConversationSession,
    staged_attachment: Option<Attachment>,
}

impl ChatContext {
    pub fn new(output: Box<dyn Write>, options: ChatOptions, session: ConversationSession) -> Self {
        Self {
            output,
            options,
            session,
            staged_attachment: None,
        }
    }

    pub async fn run(&mut self) -> Result<ExitCode> {
        // Handle non-interactive mode (single query)
        if let Some(input) = self.options.input.take() {
            if let Some(path) = self.options.image.take() {
                if !self.stage_attachment(&path)? {
                    return Ok(ExitCode::FAILURE);
                }
            }
            self.process_chat_input(&input).await?;
            self.session.wait_for_speech().await;
            return Ok(ExitCode::SUCCESS);
        }

        if self.options.interactive {
            self.print_welcome()?;
            self.run_interactive().await?;
        }

        Ok(ExitCode::SUCCESS)
    }

    fn print_welcome(&mut self) -> Result<()> {
        writeln!(self.output, "{}", WELCOME_TEXT)?;

        if self.session.messages().is_empty() {
            writeln!(self.output, "Things to try")?;
            for (i, (title, desc, _)) in SUGGESTIONS.iter().enumerate() {
                writeln!(self.output, "{}", cformat!("  <bold>/try {}</>  {} - {}", i + 1, title, desc))?;
            }
        } else {
            self.print_history()?;
        }

        if self.session.speech_input_supported() {
            writeln!(self.output, "\nVoice input is ready: type /mic and start talking.")?;
        }
        if self.session.speech_output_supported() {
            let state = if self.session.auto_speak() { "on" } else { "off" };
            writeln!(self.output, "Reading replies aloud is {} (/speak to toggle).", state)?;
        }
        writeln!(self.output, "\nType /help for commands.\n")?;
        Ok(())
    }

    async fn run_interactive(&mut self) -> Result<()> {
        let mut rl = prompt::rl()?;

        loop {
            self.session.pump_events();
            debug!("Prompting in phase {:?}", self.session.phase());

            let prompt_text = generate_prompt(&self.session.state(), self.staged_attachment.is_some());
            let initial = self.session.pending_input().to_string();
            let readline = if initial.is_empty() {
                rl.readline(&prompt_text)
            } else {
                rl.readline_with_initial(&prompt_text, (initial.as_str(), ""))
            };

            match readline {
                Ok(line) => {
                    self.session.set_pending_input("");
                    if line.trim().is_empty() {
                        continue;
                    }

                    rl.add_history_entry(line.as_str());

                    if line.trim() == "/quit" {
                        self.session.stop_speaking();
                        break;
                    }

                    if let Err(e) = self.handle_input(&line).await {
                        writeln!(self.output, "Error: {}", e)?;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    // Ctrl-C silences speech; a second one on an idle prompt quits.
                    self.session.pump_events();
                    if self.session.state().is_speaking {
                        self.session.stop_speaking();
                        continue;
                    }
                    break;
                }
                Err(ReadlineError::Eof) => break,
                Err(e) => {
                    writeln!(self.output, "Error: {}", e)?;
                    break;
                }
            }
        }

        Ok(())
    }

    async fn handle_input(&mut self, input: &str) -> Result<()> {
        let trimmed = input.trim();
        let (command, argument) = match trimmed.split_once(char::is_whitespace) {
            Some((command, argument)) => (command, argument.trim()),
            None => (trimmed, ""),
        };

        match command {
            "/help" => {
                writeln!(self.output, "{}", HELP_TEXT)?;
            }
            "/clear" => {
                self.session.clear();
                self.staged_attachment = None;
                writeln!(self.output, "Conversation cleared.")?;
            }
            "/history" => {
                self.print_history()?;
            }
            "/speak" => {
                let on = self.session.toggle_auto_speak();
                writeln!(self.output, "Speaking: {}", if on { "On" } else { "Off" })?;
                if on && !self.session.speech_output_supported() {
                    writeln!(self.output, "Note: no speech synthesizer (espeak-ng, espeak or say) was found.")?;
                }
            }
            "/stop" => {
                self.session.stop_speaking();
            }
            "/mic" => {
                self.dictate().await?;
            }
            "/image" => {
                if argument.is_empty() {
                    writeln!(self.output, "Usage: /image <path>")?;
                } else {
                    self.stage_attachment(Path::new(argument))?;
                }
            }
            "/try" => match parse_index(argument, SUGGESTIONS.len()) {
                Some(i) => {
                    let query = SUGGESTIONS[i].2;
                    writeln!(self.output, "{}", format_message_line(Role::User, query))?;
                    self.process_chat_input(query).await?;
                }
                None => writeln!(self.output, "Pick a suggestion between 1 and {}.", SUGGESTIONS.len())?,
            },
            "/say" => {
                let replies = self.reply_ids();
                match parse_index(argument, replies.len()) {
                    Some(i) if self.session.speech_output_supported() => {
                        self.session.speak_message(replies[i]);
                    }
                    Some(_) => writeln!(self.output, "Speech output is not supported on this system.")?,
                    None => writeln!(self.output, "No reply with that number. See /history.")?,
                }
            }
            _ if command.starts_with('/') => {
                writeln!(self.output, "Unknown command {}. Type /help for commands.", command)?;
            }
            _ => {
                self.process_chat_input(input).await?;
            }
        }

        Ok(())
    }

    async fn process_chat_input(&mut self, input: &str) -> Result<()> {
        let attachment = self.staged_attachment.take();

        writeln!(self.output, "{}", cformat!("<dim>maxAI is thinking...</>"))?;
        self.output.flush()?;

        let outcome = if self.options.interactive {
            match self.await_reply(input, attachment).await {
                Some(outcome) => outcome,
                None => {
                    writeln!(self.output, "Stopped waiting for the reply.")?;
                    return Ok(());
                }
            }
        } else {
            self.session.set_pending_input(input);
            self.session.submit_pending(attachment).await
        };

        match outcome {
            SubmitOutcome::Replied(id) => {
                let line = self
                    .find_message(id)
                    .map(|message| format_message_line(message.role, &message.content));
                if let Some(line) = line {
                    writeln!(self.output, "{}\n", line)?;
                }
            }
            SubmitOutcome::Busy => {
                writeln!(self.output, "Still waiting for the previous reply.")?;
            }
            SubmitOutcome::Ignored => debug!("Ignoring blank input"),
        }

        Ok(())
    }

    /// Run a turn that Ctrl-C can abandon. Returns `None` if it was.
    ///
    /// Listening for Ctrl-C replaces the default SIGINT handling for the
    /// rest of the process, so every wait in the REPL has to honour it.
    async fn await_reply(&mut self, input: &str, attachment: Option<Attachment>) -> Option<SubmitOutcome> {
        let turn = match self.session.begin_turn(input, attachment) {
            TurnStart::Ignored => return Some(SubmitOutcome::Ignored),
            TurnStart::Busy => return Some(SubmitOutcome::Busy),
            TurnStart::Started(turn) => turn,
        };

        let completion = self.session.completion_service();
        tokio::select! {
            completed = turn.resolve(completion.as_ref()) => {
                let outcome = match self.session.finish_turn(completed) {
                    Some(id) => SubmitOutcome::Replied(id),
                    None => SubmitOutcome::Ignored,
                };
                Some(outcome)
            }
            _ = tokio::signal::ctrl_c() => {
                self.session.abandon_turn();
                None
            }
        }
    }

    async fn dictate(&mut self) -> Result<()> {
        match self.session.start_listening() {
            Ok(_) => {}
            Err(SpeechError::Unsupported(_)) => {
                writeln!(
                    self.output,
                    "Voice input is not supported here. Set MAXAI_STT_COMMAND to a command that prints a transcript."
                )?;
                return Ok(());
            }
            Err(e) => {
                error!("Failed to start listening: {}", e);
                writeln!(self.output, "Could not start listening: {}", e)?;
                return Ok(());
            }
        }

        writeln!(self.output, "{}", cformat!("<red>Listening...</> (Ctrl-C to cancel)"))?;
        self.output.flush()?;

        while self.session.state().is_capturing_speech {
            let cancelled = tokio::select! {
                _ = self.session.next_speech_input_event() => false,
                _ = tokio::signal::ctrl_c() => true,
            };
            if cancelled {
                self.session.stop_listening();
                writeln!(self.output, "Stopped listening.")?;
            }
        }

        if self.session.pending_input().is_empty() {
            writeln!(self.output, "Didn't catch that.")?;
        }
        Ok(())
    }

    /// Load an image for the next message. Returns `false` and prints a
    /// notice if it can't be used.
    fn stage_attachment(&mut self, path: &Path) -> Result<bool> {
        if !self.options.multimodal {
            writeln!(self.output, "Image attachments are disabled.")?;
            return Ok(false);
        }

        match Attachment::from_image_file(path) {
            Ok(attachment) => {
                writeln!(
                    self.output,
                    "Attached {} ({}, {} bytes) to your next message.",
                    path.display(),
                    attachment.mime_type,
                    attachment.data.len()
                )?;
                self.staged_attachment = Some(attachment);
                Ok(true)
            }
            Err(e) => {
                writeln!(self.output, "Cannot attach image: {}", e)?;
                Ok(false)
            }
        }
    }

    fn print_history(&mut self) -> Result<()> {
        let mut reply_number = 0;
        let lines: Vec<String> = self
            .session
            .messages()
            .iter()
            .map(|message| match message.role {
                Role::User => format_message_line(Role::User, &message.content),
                Role::Ai => {
                    reply_number += 1;
                    format!("[{}] {}", reply_number, format_message_line(Role::Ai, &message.content))
                }
            })
            .collect();

        if lines.is_empty() {
            writeln!(self.output, "No messages yet.")?;
        }
        for line in lines {
            writeln!(self.output, "{}\n", line)?;
        }
        Ok(())
    }

    fn find_message(&self, id: MessageId) -> Option<&Message> {
        self.session.messages().iter().find(|m| m.id == id)
    }

    fn reply_ids(&self) -> Vec<MessageId> {
        self.session
            .messages()
            .iter()
            .filter(|m| m.role == Role::Ai)
            .map(|m| m.id)
            .collect()
    }
}

pub fn format_message_line(role: Role, content: &str) -> String {
    match role {
        Role::User => cformat!("<blue><bold>You:</></> {}", content),
        Role::Ai => cformat!("<magenta><bold>maxAI:</></> {}", content),
    }
}

/// Parse a 1-based index into a list of `len` items.
fn parse_index(argument: &str, len: usize) -> Option<usize> {
    let n: usize = argument.trim().parse().ok()?;
    (1..=len).contains(&n).then(|| n - 1)
}
