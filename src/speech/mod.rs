//! Speech input and output.
//!
//! Platform engines sit behind [`SpeechInputCapability`] and
//! [`SpeechOutputCapability`]. The adapters in this module own the
//! listening and speaking state machines and feed them with typed events
//! that engines deliver over a channel. Every event names the session or
//! utterance it belongs to, so events from a cancelled session are ignored.

pub mod input;
pub mod output;
pub mod system;

#[cfg(test)]
pub(crate) mod testing;

pub use input::{
    RecognitionId, SpeechInput, SpeechInputCapability, SpeechInputEvent, SpeechInputEventKind,
};
pub use output::{
    SpeechOutput, SpeechOutputCapability, SpeechOutputEvent, SpeechOutputEventKind, UtteranceId,
};

/// Delivery parameters for an utterance, relative to the engine's normal
/// voice (1.0 = unchanged).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceParams {
    pub rate: f32,
    pub pitch: f32,
}

impl Default for VoiceParams {
    /// A touch faster and higher than normal.
    fn default() -> Self {
        Self {
            rate: 1.05,
            pitch: 1.1,
        }
    }
}
