//! Procedurally synthesized audio cues.
//!
//! No audio assets are shipped: every [`Cue`] is a [`ToneProgram`], a short
//! list of oscillator notes with a shared decay envelope. [`SoundEngine`]
//! turns cues into [`ScheduledTone`]s on an injected [`AudioBackend`].
//!
//! With the `audio-rodio` feature, [`SoundEngine::default_output`] plays on
//! the system's default output device. [`RenderBackend`] mixes into memory.
//!
//! Playback is fire-and-forget. The engine never waits for a cue to finish,
//! and any audio failure is logged and swallowed so it cannot reach game
//! state.
//!
//! ```
//! use spyword_client::sound::{Cue, RenderBackend, SoundEngine};
//!
//! let mix = RenderBackend::new(8_000);
//! let handle = mix.clone();
//! let mut sound = SoundEngine::with_backend(mix);
//! assert!(sound.play(Cue::Click));
//! assert!(handle.peak() > 0.0);
//! ```

pub mod cue;
#[cfg(feature = "audio-rodio")]
pub mod device;
pub mod synth;

pub use cue::{Cue, Envelope, Tone, ToneProgram, Waveform};
#[cfg(feature = "audio-rodio")]
pub use device::RodioBackend;
pub use synth::{RenderBackend, ToneVoice};

use thiserror::Error;
use tracing::{debug, warn};

/// Errors raised by an [`AudioBackend`].
///
/// These never leave the [`SoundEngine`].
#[derive(Debug, Error)]
pub enum AudioError {
    /// No audio output could be opened.
    #[error("audio unavailable: {0}")]
    Unavailable(String),

    /// The backend refused to schedule a tone.
    #[error("audio playback failed: {0}")]
    Playback(String),
}

/// A tone placed on the backend's clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledTone {
    pub tone: Tone,
    pub envelope: Envelope,
    /// Absolute start time on the backend clock, in seconds.
    pub start: f64,
}

impl ScheduledTone {
    /// Absolute time at which the oscillator stops.
    pub fn stop(&self) -> f64 {
        self.start + self.tone.duration + self.envelope.release
    }
}

/// An audio output the engine can schedule tones on.
///
/// [`schedule`](AudioBackend::schedule) must return without waiting for the
/// tone to play.
pub trait AudioBackend: Send {
    /// Current time on the backend clock, in seconds.
    fn now(&self) -> f64;

    /// Wakes a suspended output. Called before every cue.
    fn resume(&mut self) -> Result<(), AudioError> {
        Ok(())
    }

    /// Queues one tone for playback.
    fn schedule(&mut self, tone: &ScheduledTone) -> Result<(), AudioError>;

    /// Releases the output. Tones already queued may still finish.
    fn close(&mut self) {}
}

/// Opens an [`AudioBackend`] on first use.
pub type AudioOpener =
    Box<dyn FnMut() -> Result<Box<dyn AudioBackend>, AudioError> + Send + 'static>;

/// Plays cues on a lazily opened backend, gated by a mute flag.
pub struct SoundEngine {
    opener: Option<AudioOpener>,
    backend: Option<Box<dyn AudioBackend>>,
    muted: bool,
}

impl SoundEngine {
    /// Creates an engine that opens its backend the first time a cue plays.
    ///
    /// If opening fails the cue is dropped and the next cue tries again.
    pub fn new<F>(opener: F) -> Self
    where
        F: FnMut() -> Result<Box<dyn AudioBackend>, AudioError> + Send + 'static,
    {
        Self {
            opener: Some(Box::new(opener)),
            backend: None,
            muted: false,
        }
    }

    /// Creates an engine around an already-open backend.
    pub fn with_backend(backend: impl AudioBackend + 'static) -> Self {
        Self {
            opener: None,
            backend: Some(Box::new(backend)),
            muted: false,
        }
    }

    /// Creates an engine with no audio output. Every cue is a no-op.
    pub fn silent() -> Self {
        Self {
            opener: None,
            backend: None,
            muted: false,
        }
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Schedules `cue` and returns whether it was handed to the backend.
    ///
    /// Returns `false` when muted, when no backend is available, or when the
    /// backend reports an error. Errors are logged, never returned.
    pub fn play(&mut self, cue: Cue) -> bool {
        if self.muted {
            return false;
        }
        match self.try_play(cue) {
            Ok(scheduled) => scheduled,
            Err(e) => {
                warn!(?cue, error = %e, "audio error, cue dropped");
                false
            }
        }
    }

    fn try_play(&mut self, cue: Cue) -> Result<bool, AudioError> {
        let Some(backend) = self.backend()? else {
            return Ok(false);
        };
        backend.resume()?;
        let program = cue.program();
        let base = backend.now();
        for tone in &program.tones {
            backend.schedule(&ScheduledTone {
                tone: *tone,
                envelope: program.envelope,
                start: base + tone.offset,
            })?;
        }
        debug!(?cue, tones = program.tones.len(), "cue scheduled");
        Ok(true)
    }

    fn backend(&mut self) -> Result<Option<&mut Box<dyn AudioBackend>>, AudioError> {
        if self.backend.is_none() {
            if let Some(open) = self.opener.as_mut() {
                self.backend = Some(open()?);
                debug!("audio backend opened");
            }
        }
        Ok(self.backend.as_mut())
    }

    /// Closes the backend. A later cue opens a new one if an opener exists.
    pub fn shutdown(&mut self) {
        if let Some(mut backend) = self.backend.take() {
            backend.close();
            debug!("audio backend closed");
        }
    }
}

impl Default for SoundEngine {
    fn default() -> Self {
        Self::silent()
    }
}

impl std::fmt::Debug for SoundEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoundEngine")
            .field("muted", &self.muted)
            .field("open", &self.backend.is_some())
            .finish()
    }
}

impl Drop for SoundEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex as StdMutex};

    /// Records every scheduled tone.
    struct RecordingBackend {
        scheduled: Arc<StdMutex<Vec<ScheduledTone>>>,
        closed: Arc<AtomicBool>,
        clock: f64,
    }

    impl AudioBackend for RecordingBackend {
        fn now(&self) -> f64 {
            self.clock
        }

        fn schedule(&mut self, tone: &ScheduledTone) -> Result<(), AudioError> {
            self.scheduled.lock().unwrap().push(*tone);
            Ok(())
        }

        fn close(&mut self) {
            self.closed.store(true, Ordering::Relaxed);
        }
    }

    /// Fails every schedule call.
    struct BrokenBackend;

    impl AudioBackend for BrokenBackend {
        fn now(&self) -> f64 {
            0.0
        }

        fn schedule(&mut self, _tone: &ScheduledTone) -> Result<(), AudioError> {
            Err(AudioError::Playback("device lost".into()))
        }
    }

    fn recording() -> (
        RecordingBackend,
        Arc<StdMutex<Vec<ScheduledTone>>>,
        Arc<AtomicBool>,
    ) {
        let scheduled = Arc::new(StdMutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let backend = RecordingBackend {
            scheduled: Arc::clone(&scheduled),
            closed: Arc::clone(&closed),
            clock: 2.0,
        };
        (backend, scheduled, closed)
    }

    #[test]
    fn cue_tones_are_offset_from_backend_clock() {
        let (backend, scheduled, _closed) = recording();
        let mut engine = SoundEngine::with_backend(backend);
        assert!(engine.play(Cue::WordSent));

        let tones = scheduled.lock().unwrap();
        assert_eq!(tones.len(), 2);
        assert!((tones[0].start - 2.0).abs() < 1e-9);
        assert!((tones[1].start - 2.1).abs() < 1e-9);
    }

    #[test]
    fn muted_engine_schedules_nothing() {
        let (backend, scheduled, _closed) = recording();
        let mut engine = SoundEngine::with_backend(backend);
        engine.set_muted(true);
        assert!(!engine.play(Cue::GameStart));
        assert!(scheduled.lock().unwrap().is_empty());

        engine.set_muted(false);
        assert!(engine.play(Cue::GameStart));
        assert_eq!(scheduled.lock().unwrap().len(), 4);
    }

    #[test]
    fn backend_errors_are_swallowed() {
        let mut engine = SoundEngine::with_backend(BrokenBackend);
        assert!(!engine.play(Cue::TimeUp));
        assert!(!engine.play(Cue::Click));
    }

    #[test]
    fn opener_runs_once_and_retries_after_failure() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let mut engine = SoundEngine::new(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                Err(AudioError::Unavailable("no device yet".into()))
            } else {
                let (backend, _, _) = recording();
                Ok(Box::new(backend) as Box<dyn AudioBackend>)
            }
        });

        assert!(!engine.play(Cue::Click));
        assert!(engine.play(Cue::Click));
        assert!(engine.play(Cue::Click));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn silent_engine_never_plays() {
        let mut engine = SoundEngine::silent();
        assert!(!engine.play(Cue::CitizensWin));
    }

    #[test]
    fn shutdown_closes_backend() {
        let (backend, _scheduled, closed) = recording();
        let mut engine = SoundEngine::with_backend(backend);
        engine.shutdown();
        assert!(closed.load(Ordering::Relaxed));
        assert!(!engine.play(Cue::Click));
    }
}
