use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use crate::error::SpeechError;

pub type RecognitionId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechInputEventKind {
    /// Final transcript of the session.
    Result(String),
    /// Engine error code, e.g. `no-speech` or `aborted`.
    Error(String),
    Ended,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechInputEvent {
    pub session: RecognitionId,
    pub kind: SpeechInputEventKind,
}

impl SpeechInputEvent {
    pub fn new(session: RecognitionId, kind: SpeechInputEventKind) -> Self {
        Self { session, kind }
    }
}

/// A speech-to-text engine running one non-continuous session at a time.
///
/// A session reports at most one final result, then ends. `stop` must be
/// safe to call when no session is running.
pub trait SpeechInputCapability: Send {
    fn start(
        &mut self,
        session: RecognitionId,
        events: UnboundedSender<SpeechInputEvent>,
    ) -> Result<(), SpeechError>;

    fn stop(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenState {
    Idle,
    Listening(RecognitionId),
}

pub struct SpeechInput {
    capability: Option<Box<dyn SpeechInputCapability>>,
    state: ListenState,
    next_id: RecognitionId,
    events_tx: UnboundedSender<SpeechInputEvent>,
    events_rx: UnboundedReceiver<SpeechInputEvent>,
}

impl SpeechInput {
    pub fn new(capability: Option<Box<dyn SpeechInputCapability>>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            capability,
            state: ListenState::Idle,
            next_id: 1,
            events_tx,
            events_rx,
        }
    }

    pub fn unsupported() -> Self {
        Self::new(None)
    }

    pub fn is_supported(&self) -> bool {
        self.capability.is_some()
    }

    #[cfg(test)]
    pub fn state(&self) -> ListenState {
        self.state
    }

    pub fn is_listening(&self) -> bool {
        matches!(self.state, ListenState::Listening(_))
    }

    /// Begin a recognition session.
    ///
    /// Returns `Ok(false)` without starting anything if a session is
    /// already running.
    pub fn start(&mut self) -> Result<bool, SpeechError> {
        if self.is_listening() {
            debug!("Already listening, ignoring start");
            return Ok(false);
        }

        let capability = self
            .capability
            .as_mut()
            .ok_or(SpeechError::Unsupported("speech recognition"))?;

        let session = self.next_id;
        self.next_id += 1;

        capability.start(session, self.events_tx.clone())?;
        self.state = ListenState::Listening(session);
        info!("Listening (session {})", session);
        Ok(true)
    }

    /// End the current session. Anything it reports afterwards is ignored.
    pub fn stop(&mut self) {
        if let ListenState::Listening(session) = self.state {
            debug!("Stopping recognition session {}", session);
            if let Some(capability) = self.capability.as_mut() {
                capability.stop();
            }
        }
        self.state = ListenState::Idle;
    }

    /// Apply an engine event, returning the transcript if it carried one.
    pub fn handle_event(&mut self, event: SpeechInputEvent) -> Option<String> {
        if self.state != ListenState::Listening(event.session) {
            debug!("Ignoring stale speech input event {:?}", event);
            return None;
        }

        match event.kind {
            SpeechInputEventKind::Result(transcript) => {
                let transcript = transcript.trim().to_string();
                (!transcript.is_empty()).then_some(transcript)
            }
            SpeechInputEventKind::Error(code) => {
                warn!("Speech recognition error: {}", code);
                self.state = ListenState::Idle;
                None
            }
            SpeechInputEventKind::Ended => {
                debug!("Recognition session {} ended", event.session);
                self.state = ListenState::Idle;
                None
            }
        }
    }

    /// Apply every event that has already arrived, returning the transcripts.
    pub fn pump(&mut self) -> Vec<String> {
        let mut transcripts = Vec::new();
        while let Ok(event) = self.events_rx.try_recv() {
            if let Some(transcript) = self.handle_event(event) {
                transcripts.push(transcript);
            }
        }
        transcripts
    }

    /// Wait for the next engine event and apply it.
    pub async fn next_event(&mut self) -> Option<String> {
        let event = self.events_rx.recv().await?;
        self.handle_event(event)
    }
}
