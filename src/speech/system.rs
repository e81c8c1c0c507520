//! Speech engines backed by external programs.

use std::path::PathBuf;
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::oneshot;
use tracing::{debug, info};

use super::{
    RecognitionId, SpeechInputCapability, SpeechInputEvent, SpeechInputEventKind,
    SpeechOutputCapability, SpeechOutputEvent, SpeechOutputEventKind, UtteranceId, VoiceParams,
};
use crate::error::SpeechError;

/// Words per minute the engines use at rate 1.0.
const BASE_WORDS_PER_MINUTE: f32 = 175.0;
/// espeak's default pitch on its 0-99 scale.
const BASE_ESPEAK_PITCH: f32 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Synthesizer {
    Espeak,
    Say,
}

/// Text-to-speech through `espeak-ng`, `espeak` or macOS `say`.
///
/// Each utterance is a child process; text is passed on stdin so it is
/// never mistaken for a flag.
pub struct CommandSynthesizer {
    program: PathBuf,
    kind: Synthesizer,
    current: Option<oneshot::Sender<()>>,
}

impl CommandSynthesizer {
    /// Look for a supported program on `PATH`.
    pub fn probe() -> Option<Self> {
        let candidates = [
            ("espeak-ng", Synthesizer::Espeak),
            ("espeak", Synthesizer::Espeak),
            ("say", Synthesizer::Say),
        ];

        candidates.into_iter().find_map(|(name, kind)| {
            let program = which::which(name).ok()?;
            info!("Using {} for speech output", program.display());
            Some(Self {
                program,
                kind,
                current: None,
            })
        })
    }

    fn args(&self, params: VoiceParams) -> Vec<String> {
        let words_per_minute = (BASE_WORDS_PER_MINUTE * params.rate).round() as u32;
        match self.kind {
            Synthesizer::Espeak => {
                let pitch = (BASE_ESPEAK_PITCH * params.pitch).round().clamp(0.0, 99.0) as u32;
                vec![
                    "-s".to_string(),
                    words_per_minute.to_string(),
                    "-p".to_string(),
                    pitch.to_string(),
                    "--stdin".to_string(),
                ]
            }
            // say has no pitch flag.
            Synthesizer::Say => vec![
                "-r".to_string(),
                words_per_minute.to_string(),
                "-f".to_string(),
                "-".to_string(),
            ],
        }
    }
}

impl SpeechOutputCapability for CommandSynthesizer {
    fn speak(
        &mut self,
        utterance: UtteranceId,
        text: &str,
        params: VoiceParams,
        events: UnboundedSender<SpeechOutputEvent>,
    ) -> Result<(), SpeechError> {
        self.cancel();

        let mut child = Command::new(&self.program)
            .args(self.args(params))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SpeechError::Engine(format!("{}: {}", self.program.display(), e)))?;

        let (cancel_tx, cancel_rx) = oneshot::channel();
        self.current = Some(cancel_tx);

        let text = text.to_string();
        tokio::spawn(async move {
            let playback = async {
                // Dropping stdin after the write signals end of text.
                if let Some(mut stdin) = child.stdin.take() {
                    stdin.write_all(text.as_bytes()).await?;
                }
                let _ = events.send(SpeechOutputEvent::new(utterance, SpeechOutputEventKind::Started));
                child.wait().await
            };

            // Dropping the sender counts as cancellation too. The child is
            // killed when it goes out of scope.
            tokio::select! {
                status = playback => {
                    let kind = match status {
                        Ok(status) if status.success() => SpeechOutputEventKind::Ended,
                        Ok(status) => SpeechOutputEventKind::Failed(format!("synthesizer exited with {}", status)),
                        Err(e) => SpeechOutputEventKind::Failed(e.to_string()),
                    };
                    let _ = events.send(SpeechOutputEvent::new(utterance, kind));
                }
                _ = cancel_rx => {
                    debug!("Utterance {} cancelled", utterance);
                }
            }
        });

        Ok(())
    }

    fn cancel(&mut self) {
        if let Some(cancel) = self.current.take() {
            let _ = cancel.send(());
        }
    }
}

/// Speech-to-text through a user-supplied shell command.
///
/// The command records and transcribes one utterance and prints the
/// transcript on stdout, e.g. a script wrapping `sox` and `whisper-cli`.
pub struct CommandRecognizer {
    command: String,
    current: Option<oneshot::Sender<()>>,
}

impl CommandRecognizer {
    /// Available only when a command is configured.
    pub fn probe(command: Option<&str>) -> Option<Self> {
        let command = command?.trim();
        if command.is_empty() {
            return None;
        }
        info!("Using `{}` for speech input", command);
        Some(Self {
            command: command.to_string(),
            current: None,
        })
    }
}

impl SpeechInputCapability for CommandRecognizer {
    fn start(
        &mut self,
        session: RecognitionId,
        events: UnboundedSender<SpeechInputEvent>,
    ) -> Result<(), SpeechError> {
        self.stop();

        let child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SpeechError::Engine(format!("failed to run recognizer: {}", e)))?;

        let (cancel_tx, cancel_rx) = oneshot::channel();
        self.current = Some(cancel_tx);

        tokio::spawn(async move {
            tokio::select! {
                output = child.wait_with_output() => {
                    let kind = match output {
                        Ok(output) if output.status.success() => {
                            let transcript = String::from_utf8_lossy(&output.stdout).trim().to_string();
                            if transcript.is_empty() {
                                SpeechInputEventKind::Error("no-speech".to_string())
                            } else {
                                SpeechInputEventKind::Result(transcript)
                            }
                        }
                        Ok(output) => SpeechInputEventKind::Error(format!(
                            "exit-{}",
                            output.status.code().map_or_else(|| "signal".to_string(), |c| c.to_string())
                        )),
                        Err(e) => SpeechInputEventKind::Error(e.to_string()),
                    };
                    let _ = events.send(SpeechInputEvent::new(session, kind));
                    let _ = events.send(SpeechInputEvent::new(session, SpeechInputEventKind::Ended));
                }
                _ = cancel_rx => {
                    debug!("Recognition session {} aborted", session);
                }
            }
        });

        Ok(())
    }

    fn stop(&mut self) {
        if let Some(cancel) = self.current.take() {
            let _ = cancel.send(());
        }
    }
}
