//! Playback on the default output device through `rodio`.
//!
//! Enabled by the `audio-rodio` feature. Each [`ScheduledTone`] becomes a
//! [`ToneVoice`] source, delayed to its start time and appended to its own
//! detached [`Sink`], so overlapping chord tones mix in the device mixer.
//!
//! `rodio::OutputStream` cannot leave the thread that opened it, while an
//! [`AudioBackend`] must be `Send`. The stream therefore lives on a small
//! dedicated thread, and the backend only holds the stream's handle.

use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use rodio::{OutputStream, OutputStreamHandle, Sink, Source};
use tracing::{debug, warn};

use super::synth::ToneVoice;
use super::{AudioBackend, AudioError, ScheduledTone, SoundEngine};

/// Rate tones are synthesized at. rodio resamples to the device rate.
pub const DEVICE_SAMPLE_RATE: u32 = 44_100;

impl Source for ToneVoice {
    fn current_frame_len(&self) -> Option<usize> {
        Some(self.len())
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        self.rate()
    }

    fn total_duration(&self) -> Option<Duration> {
        Duration::try_from_secs_f64(self.length()).ok()
    }
}

/// An open output stream, owned by its thread.
struct Output {
    handle: OutputStreamHandle,
    /// Dropping this lets the stream thread exit and close the device.
    _stop: mpsc::Sender<()>,
}

impl Output {
    fn open() -> Result<Self, AudioError> {
        let (ready_tx, ready_rx) = mpsc::channel();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        thread::Builder::new()
            .name("spyword-audio".into())
            .spawn(move || match OutputStream::try_default() {
                Ok((_stream, handle)) => {
                    if ready_tx.send(Ok(handle)).is_ok() {
                        // Blocks until the sender is dropped.
                        while stop_rx.recv().is_ok() {}
                    }
                    debug!("audio output stream released");
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(AudioError::Unavailable(e.to_string())));
                }
            })
            .map_err(|e| AudioError::Unavailable(format!("audio thread: {e}")))?;

        let handle = ready_rx
            .recv()
            .map_err(|_| AudioError::Unavailable("audio thread exited".into()))??;
        Ok(Self {
            handle,
            _stop: stop_tx,
        })
    }
}

/// An [`AudioBackend`] that plays on the system's default output device.
///
/// The clock starts when the backend is opened. Closing releases the device;
/// the next [`resume`](AudioBackend::resume) opens it again.
pub struct RodioBackend {
    output: Option<Output>,
    epoch: Instant,
}

impl std::fmt::Debug for RodioBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RodioBackend")
            .field("open", &self.output.is_some())
            .field("clock", &self.now())
            .finish()
    }
}

impl RodioBackend {
    /// Opens the default output device.
    ///
    /// Returns [`AudioError::Unavailable`] if there is no device or the
    /// stream cannot be built.
    pub fn open() -> Result<Self, AudioError> {
        let output = Output::open()?;
        debug!("default audio output opened");
        Ok(Self {
            output: Some(output),
            epoch: Instant::now(),
        })
    }

    pub fn is_open(&self) -> bool {
        self.output.is_some()
    }
}

impl AudioBackend for RodioBackend {
    fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        if self.output.is_none() {
            self.output = Some(Output::open()?);
            debug!("default audio output reopened");
        }
        Ok(())
    }

    fn schedule(&mut self, scheduled: &ScheduledTone) -> Result<(), AudioError> {
        let Some(output) = self.output.as_ref() else {
            return Err(AudioError::Playback("output closed".into()));
        };
        let delay = Duration::try_from_secs_f64((scheduled.start - self.now()).max(0.0))
            .unwrap_or_default();
        let voice = ToneVoice::new(scheduled.tone, scheduled.envelope, DEVICE_SAMPLE_RATE);

        let sink = Sink::try_new(&output.handle).map_err(|e| {
            warn!(error = %e, "output device rejected a sink");
            AudioError::Playback(e.to_string())
        })?;
        sink.append(voice.delay(delay));
        sink.detach();
        Ok(())
    }

    fn close(&mut self) {
        if self.output.take().is_some() {
            debug!("default audio output closed");
        }
    }
}

impl SoundEngine {
    /// Creates an engine that plays on the default output device.
    ///
    /// The device is opened on the first cue. If it is missing, cues are
    /// dropped with a warning and the next cue tries again.
    pub fn default_output() -> Self {
        Self::new(|| {
            RodioBackend::open().map(|backend| Box::new(backend) as Box<dyn AudioBackend>)
        })
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
    use crate::sound::Cue;

    #[test]
    fn voice_source_is_mono_and_finite() {
        let program = Cue::Click.program();
        let voice = ToneVoice::new(program.tones[0], program.envelope, DEVICE_SAMPLE_RATE);
        assert_eq!(voice.channels(), 1);
        assert_eq!(voice.sample_rate(), DEVICE_SAMPLE_RATE);
        assert_eq!(voice.current_frame_len(), Some(3_528));
        let total = voice.total_duration().unwrap();
        assert!((total.as_secs_f64() - 0.08).abs() < 1e-6);
        assert_eq!(voice.count(), 3_528);
    }

    #[test]
    fn delayed_voice_starts_silent() {
        let program = Cue::Click.program();
        let voice = ToneVoice::new(program.tones[0], program.envelope, DEVICE_SAMPLE_RATE);
        let samples: Vec<f32> = voice.delay(Duration::from_millis(100)).collect();

        // 100 ms of leading silence, then the 80 ms note.
        assert!(samples.len().abs_diff(4_410 + 3_528) <= 2);
        assert!(samples.iter().take(4_400).all(|s| *s == 0.0));
        assert!(samples.iter().skip(4_400).any(|s| s.abs() > 0.1));
    }

    #[test]
    fn opening_without_a_device_reports_unavailable() {
        match RodioBackend::open() {
            Ok(mut backend) => {
                assert!(backend.is_open());
                backend.close();
                assert!(!backend.is_open());
                assert!(matches!(
                    backend.schedule(&ScheduledTone {
                        tone: Cue::Click.program().tones[0],
                        envelope: Cue::Click.program().envelope,
                        start: 0.0,
                    }),
                    Err(AudioError::Playback(_))
                ));
            }
            Err(e) => assert!(matches!(e, AudioError::Unavailable(_))),
        }
    }

    #[test]
    fn engine_survives_a_missing_device() {
        let mut engine = SoundEngine::default_output();
        engine.set_muted(true);
        assert!(!engine.play(Cue::Click));
        engine.set_muted(false);
        // Either plays or drops the cue, never panics.
        let _ = engine.play(Cue::Click);
    }
}
