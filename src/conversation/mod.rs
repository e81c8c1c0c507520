//! The conversation session: the single owner of the message log and the
//! turn state, coordinating completion, speech and persistence.

mod message;

use std::sync::Arc;

use tracing::{debug, error, info, warn};

pub use message::{Message, MessageId, MessageIdGenerator, Role};

use crate::completion::{Attachment, CompletionService};
use crate::error::SpeechError;
use crate::speech::{SpeechInput, SpeechOutput};
use crate::storage::Persistence;

/// Ephemeral state of the session; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub pending_input: String,
    pub is_awaiting_response: bool,
    pub is_capturing_speech: bool,
    pub is_speaking: bool,
}

/// Where the session is in the turn cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Idle,
    AwaitingCompletion { user_message: MessageId },
    Speaking,
}

/// Outcome of trying to start a turn.
#[derive(Debug)]
pub enum TurnStart {
    /// The input was blank; nothing happened.
    Ignored,
    /// A reply is still outstanding; the input was not taken.
    Busy,
    Started(PendingTurn),
}

/// Outcome of [`ConversationSession::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Ignored,
    Busy,
    Replied(MessageId),
}

/// A turn whose user message is in the log and whose reply is outstanding.
#[derive(Debug)]
pub struct PendingTurn {
    user_message: MessageId,
    generation: u64,
    query: String,
    attachment: Option<Attachment>,
}

impl PendingTurn {
    /// Ask `service` for the reply. Always produces one.
    pub async fn resolve(self, service: &dyn CompletionService) -> CompletedTurn {
        let reply = service.complete(&self.query, self.attachment.as_ref()).await;
        CompletedTurn {
            user_message: self.user_message,
            generation: self.generation,
            reply,
        }
    }
}

#[derive(Debug)]
pub struct CompletedTurn {
    user_message: MessageId,
    generation: u64,
    reply: String,
}

pub struct ConversationSession {
    messages: Vec<Message>,
    ids: MessageIdGenerator,
    pending_input: String,
    in_flight: Option<MessageId>,
    /// Bumped by `clear`, so replies to turns started before it are dropped.
    generation: u64,
    auto_speak: bool,
    completion: Arc<dyn CompletionService>,
    speech_input: SpeechInput,
    speech_output: SpeechOutput,
    persistence: Persistence,
}

impl ConversationSession {
    /// Build a session, restoring the saved log and preference.
    pub fn new(
        completion: Arc<dyn CompletionService>,
        speech_input: SpeechInput,
        speech_output: SpeechOutput,
        persistence: Persistence,
    ) -> Self {
        let messages = persistence.load_log();
        let auto_speak = persistence.load_preference();
        info!(
            "Restored {} messages, auto-speak {}",
            messages.len(),
            if auto_speak { "on" } else { "off" }
        );

        Self {
            ids: MessageIdGenerator::resume_after(&messages),
            messages,
            pending_input: String::new(),
            in_flight: None,
            generation: 0,
            auto_speak,
            completion,
            speech_input,
            speech_output,
            persistence,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn auto_speak(&self) -> bool {
        self.auto_speak
    }

    pub fn pending_input(&self) -> &str {
        &self.pending_input
    }

    pub fn set_pending_input(&mut self, text: impl Into<String>) {
        self.pending_input = text.into();
    }

    pub fn completion_service(&self) -> Arc<dyn CompletionService> {
        Arc::clone(&self.completion)
    }

    pub fn speech_input_supported(&self) -> bool {
        self.speech_input.is_supported()
    }

    pub fn speech_output_supported(&self) -> bool {
        self.speech_output.is_supported()
    }

    pub fn state(&self) -> SessionState {
        SessionState {
            pending_input: self.pending_input.clone(),
            is_awaiting_response: self.in_flight.is_some(),
            is_capturing_speech: self.speech_input.is_listening(),
            is_speaking: self.speech_output.is_speaking(),
        }
    }

    pub fn phase(&self) -> TurnPhase {
        if let Some(user_message) = self.in_flight {
            TurnPhase::AwaitingCompletion { user_message }
        } else if self.speech_output.is_speaking() {
            TurnPhase::Speaking
        } else {
            TurnPhase::Idle
        }
    }

    /// Run a whole turn: append the user message, wait for the reply,
    /// append it and read it aloud if auto-speak is on.
    pub async fn submit(&mut self, text: &str, attachment: Option<Attachment>) -> SubmitOutcome {
        let turn = match self.begin_turn(text, attachment) {
            TurnStart::Ignored => return SubmitOutcome::Ignored,
            TurnStart::Busy => return SubmitOutcome::Busy,
            TurnStart::Started(turn) => turn,
        };

        let completion = self.completion_service();
        let completed = turn.resolve(completion.as_ref()).await;

        match self.finish_turn(completed) {
            Some(id) => SubmitOutcome::Replied(id),
            None => SubmitOutcome::Ignored,
        }
    }

    /// Submit whatever is in the input buffer.
    pub async fn submit_pending(&mut self, attachment: Option<Attachment>) -> SubmitOutcome {
        let text = self.pending_input.clone();
        self.submit(&text, attachment).await
    }

    /// Append the user message and hand back the outstanding turn.
    pub fn begin_turn(&mut self, text: &str, attachment: Option<Attachment>) -> TurnStart {
        let query = text.trim();
        if query.is_empty() {
            return TurnStart::Ignored;
        }
        if let Some(outstanding) = self.in_flight {
            debug!("Rejecting input while reply to {} is outstanding", outstanding);
            return TurnStart::Busy;
        }

        let id = self.ids.next_id();
        self.messages.push(Message::new(id, Role::User, query));
        self.pending_input.clear();
        self.in_flight = Some(id);
        self.persist_log();

        debug!("Turn started with user message {}", id);
        TurnStart::Started(PendingTurn {
            user_message: id,
            generation: self.generation,
            query: query.to_string(),
            attachment,
        })
    }

    /// Append the reply of a turn and return to idle. Returns the id of the
    /// new AI message, or `None` if the log was cleared while the reply was
    /// outstanding.
    pub fn finish_turn(&mut self, turn: CompletedTurn) -> Option<MessageId> {
        if self.in_flight == Some(turn.user_message) {
            self.in_flight = None;
        }

        if turn.generation != self.generation {
            info!(
                "Dropping reply to message {}: the conversation was cleared",
                turn.user_message
            );
            return None;
        }

        let id = self.ids.next_id();
        self.messages.push(Message::new(id, Role::Ai, turn.reply));
        self.persist_log();

        if self.auto_speak {
            let content = self.messages.last().map(|m| m.content.clone()).unwrap_or_default();
            self.speech_output.speak(&content);
        }

        Some(id)
    }

    /// Empty the log and silence any speech.
    pub fn clear(&mut self) {
        self.speech_output.stop();
        self.messages.clear();
        if self.in_flight.take().is_some() {
            self.generation += 1;
        }
        self.persist_log();
        info!("Conversation cleared");
    }

    /// Stop waiting for the outstanding reply. The user message stays in
    /// the log; the reply is dropped when it arrives.
    pub fn abandon_turn(&mut self) {
        if let Some(user_message) = self.in_flight.take() {
            self.generation += 1;
            info!("Abandoned the reply to message {}", user_message);
        }
    }

    /// Flip auto-speak, silencing speech first when turning it off.
    pub fn toggle_auto_speak(&mut self) -> bool {
        // An utterance counts as active from the moment it is requested,
        // before the engine has reported that it started.
        if self.auto_speak && self.speech_output.active_utterance().is_some() {
            self.speech_output.stop();
        }
        self.auto_speak = !self.auto_speak;

        if let Err(e) = self.persistence.save_preference(self.auto_speak) {
            error!("Failed to save auto-speak preference: {}", e);
        }
        self.auto_speak
    }

    pub fn stop_speaking(&mut self) {
        self.speech_output.stop();
    }

    /// Read an AI message aloud on demand. Returns `false` if there is no
    /// such AI message.
    pub fn speak_message(&mut self, id: MessageId) -> bool {
        let Some(message) = self.messages.iter().find(|m| m.id == id && m.role == Role::Ai) else {
            return false;
        };
        let content = message.content.clone();
        self.speech_output.speak(&content);
        true
    }

    /// Start dictation into the input buffer.
    pub fn start_listening(&mut self) -> Result<bool, SpeechError> {
        self.speech_input.start()
    }

    pub fn stop_listening(&mut self) {
        self.speech_input.stop();
    }

    /// Apply every speech event that has arrived so far.
    pub fn pump_events(&mut self) {
        for transcript in self.speech_input.pump() {
            self.append_transcript(&transcript);
        }
        self.speech_output.pump();
    }

    /// Wait for the next dictation event and apply it. Returns the
    /// transcript if the event carried one.
    pub async fn next_speech_input_event(&mut self) -> Option<String> {
        let transcript = self.speech_input.next_event().await?;
        self.append_transcript(&transcript);
        Some(transcript)
    }

    /// Wait for the current utterance, if any, to finish.
    pub async fn wait_for_speech(&mut self) {
        self.speech_output.wait_until_idle().await;
    }

    fn append_transcript(&mut self, transcript: &str) {
        if !self.pending_input.is_empty() && !self.pending_input.ends_with(' ') {
            self.pending_input.push(' ');
        }
        self.pending_input.push_str(transcript);
    }

    fn persist_log(&self) {
        if let Err(e) = self.persistence.save_log(&self.messages) {
            warn!("Failed to save conversation history: {}", e);
        }
    }
}
