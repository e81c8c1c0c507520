//! Scriptable speech engines for tests.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::UnboundedSender;

use super::{
    RecognitionId, SpeechInputCapability, SpeechInputEvent, SpeechInputEventKind,
    SpeechOutputCapability, SpeechOutputEvent, SpeechOutputEventKind, UtteranceId, VoiceParams,
};
use crate::error::SpeechError;

#[derive(Default)]
struct SynthesizerLog {
    spoken: Vec<(UtteranceId, String, VoiceParams)>,
    cancels: usize,
    events: Option<UnboundedSender<SpeechOutputEvent>>,
}

/// Records what it is asked to say; events are emitted by the test.
#[derive(Clone, Default)]
pub struct FakeSynthesizer {
    log: Arc<Mutex<SynthesizerLog>>,
    refuse: bool,
}

impl FakeSynthesizer {
    pub fn failing() -> Self {
        Self {
            refuse: true,
            ..Self::default()
        }
    }

    pub fn spoken(&self) -> Vec<(UtteranceId, String, VoiceParams)> {
        self.log.lock().unwrap().spoken.clone()
    }

    pub fn cancel_count(&self) -> usize {
        self.log.lock().unwrap().cancels
    }

    pub fn emit(&self, utterance: UtteranceId, kind: SpeechOutputEventKind) {
        let log = self.log.lock().unwrap();
        let events = log.events.as_ref().expect("nothing was spoken yet");
        events.send(SpeechOutputEvent::new(utterance, kind)).unwrap();
    }
}

impl SpeechOutputCapability for FakeSynthesizer {
    fn speak(
        &mut self,
        utterance: UtteranceId,
        text: &str,
        params: VoiceParams,
        events: UnboundedSender<SpeechOutputEvent>,
    ) -> Result<(), SpeechError> {
        if self.refuse {
            return Err(SpeechError::Engine("no audio device".to_string()));
        }
        let mut log = self.log.lock().unwrap();
        log.spoken.push((utterance, text.to_string(), params));
        log.events = Some(events);
        Ok(())
    }

    fn cancel(&mut self) {
        self.log.lock().unwrap().cancels += 1;
    }
}

#[derive(Default)]
struct RecognizerLog {
    started: Vec<RecognitionId>,
    stops: usize,
    events: Option<UnboundedSender<SpeechInputEvent>>,
}

/// Records recognition sessions; results are emitted by the test.
#[derive(Clone, Default)]
pub struct FakeRecognizer {
    log: Arc<Mutex<RecognizerLog>>,
}

impl FakeRecognizer {
    pub fn started(&self) -> Vec<RecognitionId> {
        self.log.lock().unwrap().started.clone()
    }

    pub fn stop_count(&self) -> usize {
        self.log.lock().unwrap().stops
    }

    pub fn emit(&self, session: RecognitionId, kind: SpeechInputEventKind) {
        let log = self.log.lock().unwrap();
        let events = log.events.as_ref().expect("no session was started");
        events.send(SpeechInputEvent::new(session, kind)).unwrap();
    }
}

impl SpeechInputCapability for FakeRecognizer {
    fn start(
        &mut self,
        session: RecognitionId,
        events: UnboundedSender<SpeechInputEvent>,
    ) -> Result<(), SpeechError> {
        let mut log = self.log.lock().unwrap();
        log.started.push(session);
        log.events = Some(events);
        Ok(())
    }

    fn stop(&mut self) {
        self.log.lock().unwrap().stops += 1;
    }
}
