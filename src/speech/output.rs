use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use super::VoiceParams;
use crate::error::SpeechError;

pub type UtteranceId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechOutputEventKind {
    Started,
    Ended,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechOutputEvent {
    pub utterance: UtteranceId,
    pub kind: SpeechOutputEventKind,
}

impl SpeechOutputEvent {
    pub fn new(utterance: UtteranceId, kind: SpeechOutputEventKind) -> Self {
        Self { utterance, kind }
    }
}

/// A text-to-speech engine.
///
/// `speak` starts one utterance and reports its progress through `events`.
/// `cancel` silences whatever is playing; it must be safe to call when
/// nothing is.
pub trait SpeechOutputCapability: Send {
    fn speak(
        &mut self,
        utterance: UtteranceId,
        text: &str,
        params: VoiceParams,
        events: UnboundedSender<SpeechOutputEvent>,
    ) -> Result<(), SpeechError>;

    fn cancel(&mut self);
}

/// Plays at most one utterance at a time. A new utterance replaces the
/// current one; nothing is queued.
pub struct SpeechOutput {
    capability: Option<Box<dyn SpeechOutputCapability>>,
    params: VoiceParams,
    active: Option<UtteranceId>,
    next_id: UtteranceId,
    speaking: bool,
    events_tx: UnboundedSender<SpeechOutputEvent>,
    events_rx: UnboundedReceiver<SpeechOutputEvent>,
    reported_unsupported: bool,
}

impl SpeechOutput {
    pub fn new(capability: Option<Box<dyn SpeechOutputCapability>>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            capability,
            params: VoiceParams::default(),
            active: None,
            next_id: 1,
            speaking: false,
            events_tx,
            events_rx,
            reported_unsupported: false,
        }
    }

    /// An adapter with no engine behind it.
    pub fn unsupported() -> Self {
        Self::new(None)
    }

    pub fn is_supported(&self) -> bool {
        self.capability.is_some()
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking
    }

    /// The utterance whose events are currently honoured, if any.
    pub fn active_utterance(&self) -> Option<UtteranceId> {
        self.active
    }

    /// Cancel whatever is playing and start reading `text`.
    pub fn speak(&mut self, text: &str) -> Option<UtteranceId> {
        self.stop();

        let Some(capability) = self.capability.as_mut() else {
            if !self.reported_unsupported {
                info!("Speech output is not supported on this system");
                self.reported_unsupported = true;
            }
            return None;
        };

        let utterance = self.next_id;
        self.next_id += 1;
        self.active = Some(utterance);

        debug!("Starting utterance {} ({} chars)", utterance, text.len());
        if let Err(e) = capability.speak(utterance, text, self.params, self.events_tx.clone()) {
            warn!("Failed to start utterance {}: {}", utterance, e);
            self.active = None;
            self.speaking = false;
            return None;
        }

        Some(utterance)
    }

    /// Silence any active utterance. Safe when idle.
    pub fn stop(&mut self) {
        if let Some(utterance) = self.active.take() {
            debug!("Cancelling utterance {}", utterance);
        }
        if let Some(capability) = self.capability.as_mut() {
            capability.cancel();
        }
        self.speaking = false;
    }

    /// Apply an engine event. Returns `false` for events that belong to an
    /// utterance which is no longer active.
    pub fn handle_event(&mut self, event: SpeechOutputEvent) -> bool {
        if self.active != Some(event.utterance) {
            debug!("Ignoring stale speech output event {:?}", event);
            return false;
        }

        match event.kind {
            SpeechOutputEventKind::Started => self.speaking = true,
            SpeechOutputEventKind::Ended => {
                self.speaking = false;
                self.active = None;
            }
            SpeechOutputEventKind::Failed(reason) => {
                warn!("Utterance {} failed: {}", event.utterance, reason);
                self.speaking = false;
                self.active = None;
            }
        }
        true
    }

    /// Apply every event that has already arrived.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            if self.handle_event(event) {
                applied += 1;
            }
        }
        applied
    }

    /// Wait until the active utterance, if any, has finished.
    pub async fn wait_until_idle(&mut self) {
        while self.active.is_some() {
            match self.events_rx.recv().await {
                Some(event) => {
                    self.handle_event(event);
                }
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speech::testing::FakeSynthesizer;
    use super::SpeechOutputEventKind::*;

    #[test]
    fn test_speak_uses_fixed_voice() {
        let fake = FakeSynthesizer::default();
        let mut output = SpeechOutput::new(Some(Box::new(fake.clone())));

        let utterance = output.speak("Hello").unwrap();

        let spoken = fake.spoken();
        assert_eq!(spoken.len(), 1);
        assert_eq!(spoken[0].0, utterance);
        assert_eq!(spoken[0].1, "Hello");
        assert_eq!(spoken[0].2, VoiceParams { rate: 1.05, pitch: 1.1 });
    }

    #[test]
    fn test_started_and_ended_toggle_speaking() {
        let fake = FakeSynthesizer::default();
        let mut output = SpeechOutput::new(Some(Box::new(fake.clone())));

        let utterance = output.speak("Hello").unwrap();
        assert!(!output.is_speaking());

        fake.emit(utterance, Started);
        output.pump();
        assert!(output.is_speaking());

        fake.emit(utterance, Ended);
        output.pump();
        assert!(!output.is_speaking());
        assert_eq!(output.active_utterance(), None);
    }

    #[test]
    fn test_second_speak_cancels_first() {
        let fake = FakeSynthesizer::default();
        let mut output = SpeechOutput::new(Some(Box::new(fake.clone())));

        let a = output.speak("first").unwrap();
        fake.emit(a, Started);
        output.pump();

        let b = output.speak("second").unwrap();
        assert_ne!(a, b);
        assert_eq!(fake.cancel_count(), 2);
        assert!(!output.is_speaking());

        // Late events of the cancelled utterance have no effect.
        fake.emit(a, Started);
        fake.emit(a, Ended);
        assert_eq!(output.pump(), 0);
        assert!(!output.is_speaking());

        let mut transitions = Vec::new();
        fake.emit(b, Started);
        output.pump();
        transitions.push(output.is_speaking());
        fake.emit(b, Ended);
        output.pump();
        transitions.push(output.is_speaking());

        assert_eq!(transitions, vec![true, false]);
    }

    #[test]
    fn test_stop_is_safe_when_idle() {
        let mut output = SpeechOutput::new(Some(Box::new(FakeSynthesizer::default())));
        output.stop();
        output.stop();
        assert!(!output.is_speaking());

        let mut unsupported = SpeechOutput::unsupported();
        unsupported.stop();
        assert!(!unsupported.is_speaking());
    }

    #[test]
    fn test_stop_makes_pending_events_inert() {
        let fake = FakeSynthesizer::default();
        let mut output = SpeechOutput::new(Some(Box::new(fake.clone())));

        let utterance = output.speak("Hello").unwrap();
        output.stop();
        fake.emit(utterance, Started);

        assert_eq!(output.pump(), 0);
        assert!(!output.is_speaking());
    }

    #[test]
    fn test_failure_ends_speaking() {
        let fake = FakeSynthesizer::default();
        let mut output = SpeechOutput::new(Some(Box::new(fake.clone())));

        let utterance = output.speak("Hello").unwrap();
        fake.emit(utterance, Started);
        fake.emit(utterance, Failed("audio device busy".to_string()));
        output.pump();

        assert!(!output.is_speaking());
    }

    #[test]
    fn test_engine_refusal_leaves_adapter_idle() {
        let fake = FakeSynthesizer::failing();
        let mut output = SpeechOutput::new(Some(Box::new(fake)));

        assert_eq!(output.speak("Hello"), None);
        assert_eq!(output.active_utterance(), None);
        assert!(!output.is_speaking());
    }

    #[test]
    fn test_unsupported_speak_is_noop() {
        let mut output = SpeechOutput::unsupported();
        assert_eq!(output.speak("Hello"), None);
        assert!(!output.is_supported());
    }

    #[tokio::test]
    async fn test_wait_until_idle_returns_after_end() {
        let fake = FakeSynthesizer::default();
        let mut output = SpeechOutput::new(Some(Box::new(fake.clone())));

        let utterance = output.speak("Hello").unwrap();
        fake.emit(utterance, Started);
        fake.emit(utterance, Ended);

        output.wait_until_idle().await;
        assert!(!output.is_speaking());
    }
}
