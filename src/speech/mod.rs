//! Narration playback. Owns the speaking state the similarity gate reads
//! and drives a rodio sink on a dedicated thread, since the output stream
//! objects are not `Send`.
//!
//! The state is deliberately not a process-wide global: each
//! [`SpeechController`] owns its own, so the orchestrator passes it where it
//! is needed and tests can run independent instances side by side.

use rodio::{buffer::SamplesBuffer, OutputStream, Sink};
use std::sync::{
    mpsc::{self, RecvTimeoutError, Sender},
    Arc, Mutex, MutexGuard,
};
use std::thread;
use std::time::Duration;

use log::{error, warn};

use crate::error::PlaybackError;

/// What the gate needs to know at decision time: whether narration is
/// active and what text it is reading.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpeechState {
    pub is_speaking: bool,
    pub current_text: String,
}

/// PCM audio for one utterance.
pub struct SynthesizedSpeech {
    pub channels: u16,
    pub sample_rate: u32,
    pub samples: Vec<i16>,
}

/// Text-to-speech synthesis capability. Blocking; the scan loop calls it on
/// a blocking task. Voice selection lives behind this boundary.
pub trait Synthesizer: Send + Sync {
    fn synthesize(&self, text: &str) -> Result<SynthesizedSpeech, PlaybackError>;
}

enum SpeechCommand {
    Speak {
        audio: SynthesizedSpeech,
        generation: u64,
    },
    Stop,
}

#[derive(Default)]
struct StateInner {
    state: SpeechState,
    generation: u64,
}

/// Shared speaking state with consistent snapshots. A stale read here shows
/// up as double-speaking, so every mutation happens under the one lock.
///
/// Each `begin` bumps a generation counter; the audio thread's drain-clear
/// carries the generation of the utterance it played and only takes effect
/// while that utterance is still the current one. Without that link, a
/// drain-clear raced by a fresh `speak` would wipe the new utterance's
/// state and let the gate re-narrate over it.
#[derive(Clone, Default)]
pub(crate) struct SpeechStateHandle {
    inner: Arc<Mutex<StateInner>>,
}

impl SpeechStateHandle {
    fn lock(&self) -> MutexGuard<'_, StateInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Mark a new utterance active and return its generation.
    pub(crate) fn begin(&self, text: &str) -> u64 {
        let mut inner = self.lock();
        inner.generation += 1;
        inner.state.is_speaking = true;
        inner.state.current_text = text.to_string();
        inner.generation
    }

    /// Unconditional reset, for the stop-all path.
    pub(crate) fn clear(&self) {
        let mut inner = self.lock();
        inner.state.is_speaking = false;
        inner.state.current_text.clear();
    }

    /// Reset only if `generation` is still the active utterance. A no-op
    /// when a newer `begin` has already replaced it.
    pub(crate) fn clear_if(&self, generation: u64) {
        let mut inner = self.lock();
        if inner.generation == generation {
            inner.state.is_speaking = false;
            inner.state.current_text.clear();
        }
    }

    pub(crate) fn snapshot(&self) -> SpeechState {
        self.lock().state.clone()
    }
}

/// Playback handle. At most one utterance is active at a time: starting a
/// new one stops and replaces the previous one, and the state reset happens
/// synchronously in the caller before the audio thread touches the sink.
pub struct SpeechController {
    tx: Arc<Mutex<Option<Sender<SpeechCommand>>>>,
    state: SpeechStateHandle,
}

/// Idle poll interval for the audio thread; bounds how late a finished
/// utterance clears `is_speaking`.
const SINK_POLL_INTERVAL: Duration = Duration::from_millis(200);

impl SpeechController {
    pub fn new() -> Self {
        Self {
            tx: Arc::new(Mutex::new(None)),
            state: SpeechStateHandle::default(),
        }
    }

    pub(crate) fn state_handle(&self) -> SpeechStateHandle {
        self.state.clone()
    }

    /// Consistent view of the speaking state for gate decisions.
    pub fn snapshot(&self) -> SpeechState {
        self.state.snapshot()
    }

    fn ensure_thread(&self) -> Result<Sender<SpeechCommand>, PlaybackError> {
        let mut guard = match self.tx.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(tx) = guard.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<SpeechCommand>();
        let state = self.state.clone();

        // Dedicated thread holding the non-Send audio objects.
        thread::Builder::new()
            .name("speech-playback".to_string())
            .spawn(move || {
                let mut _stream: Option<OutputStream> = None;
                let mut sink: Option<Sink> = None;
                // Generation of the utterance the sink is playing, if any.
                let mut active: Option<u64> = None;

                fn ensure_sink(
                    stream: &mut Option<OutputStream>,
                    sink: &mut Option<Sink>,
                ) -> Result<(), String> {
                    if sink.is_none() {
                        let (s, handle) = OutputStream::try_default()
                            .map_err(|e| format!("failed to open audio output: {e}"))?;
                        let new_sink = Sink::try_new(&handle)
                            .map_err(|e| format!("failed to create audio sink: {e}"))?;
                        *stream = Some(s);
                        *sink = Some(new_sink);
                    }
                    Ok(())
                }

                loop {
                    match rx.recv_timeout(SINK_POLL_INTERVAL) {
                        Ok(SpeechCommand::Speak { audio, generation }) => {
                            if let Some(old) = sink.take() {
                                old.stop();
                            }
                            _stream = None;
                            active = None;
                            match ensure_sink(&mut _stream, &mut sink) {
                                Ok(()) => {
                                    if let Some(ref s) = sink {
                                        s.append(SamplesBuffer::new(
                                            audio.channels,
                                            audio.sample_rate,
                                            audio.samples,
                                        ));
                                        active = Some(generation);
                                    }
                                }
                                Err(err) => {
                                    error!("speech playback unavailable: {err}");
                                    state.clear_if(generation);
                                }
                            }
                        }
                        Ok(SpeechCommand::Stop) => {
                            if let Some(old) = sink.take() {
                                old.stop();
                            }
                            _stream = None;
                            active = None;
                        }
                        Err(RecvTimeoutError::Timeout) => {
                            // Utterance ran to completion; release the flag,
                            // but only for the utterance this sink played.
                            let drained = sink.as_ref().map(|s| s.empty()).unwrap_or(false);
                            if drained {
                                if let Some(generation) = active.take() {
                                    state.clear_if(generation);
                                }
                            }
                        }
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })
            .map_err(|e| PlaybackError::Output(e.to_string()))?;

        let tx_clone = tx.clone();
        *guard = Some(tx);
        Ok(tx_clone)
    }

    /// Start narrating `text` from already-synthesized audio, replacing any
    /// active utterance. The speaking state is updated before this returns.
    pub fn speak(&self, text: &str, audio: SynthesizedSpeech) -> Result<(), PlaybackError> {
        let generation = self.state.begin(text);
        let tx = self
            .ensure_thread()
            .inspect_err(|_| self.state.clear_if(generation))?;
        tx.send(SpeechCommand::Speak { audio, generation })
            .map_err(|e| {
                self.state.clear_if(generation);
                PlaybackError::Output(e.to_string())
            })
    }

    /// Stop-all: cancel playback and reset the speaking state synchronously.
    pub fn stop(&self) {
        self.state.clear();
        let tx = match self.tx.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        if let Some(tx) = tx {
            if tx.send(SpeechCommand::Stop).is_err() {
                warn!("speech playback thread is gone; state already reset");
            }
        }
    }
}

impl Default for SpeechController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_controller_is_silent() {
        let controller = SpeechController::new();
        assert_eq!(controller.snapshot(), SpeechState::default());
    }

    #[test]
    fn state_handle_transitions_are_consistent() {
        let state = SpeechStateHandle::default();
        state.begin("今天天氣很好");

        let snapshot = state.snapshot();
        assert!(snapshot.is_speaking);
        assert_eq!(snapshot.current_text, "今天天氣很好");

        state.clear();
        let snapshot = state.snapshot();
        assert!(!snapshot.is_speaking);
        assert!(snapshot.current_text.is_empty());
    }

    #[test]
    fn stale_drain_clear_does_not_wipe_a_newer_utterance() {
        let state = SpeechStateHandle::default();
        let first = state.begin("第一句");
        state.begin("第二句");

        // A drain-clear for the first utterance arriving after the second
        // one started must leave the new state alone.
        state.clear_if(first);
        let snapshot = state.snapshot();
        assert!(snapshot.is_speaking);
        assert_eq!(snapshot.current_text, "第二句");
    }

    #[test]
    fn matching_drain_clear_releases_the_flag() {
        let state = SpeechStateHandle::default();
        let generation = state.begin("文字");
        state.clear_if(generation);
        assert_eq!(state.snapshot(), SpeechState::default());
    }

    #[test]
    fn stop_resets_state_without_a_playback_thread() {
        let controller = SpeechController::new();
        controller.state_handle().begin("文字");
        controller.stop();
        assert_eq!(controller.snapshot(), SpeechState::default());
    }

    #[test]
    fn independent_controllers_do_not_share_state() {
        let a = SpeechController::new();
        let b = SpeechController::new();
        a.state_handle().begin("甲");
        assert!(!b.snapshot().is_speaking);
    }
}
