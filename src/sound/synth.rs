//! Offline PCM rendering of tone programs.
//!
//! [`render`] turns a [`ToneProgram`] into mono `f32` samples.
//! [`RenderBackend`] is an [`AudioBackend`] that mixes every scheduled tone
//! into a shared buffer instead of a sound card, for headless clients, for
//! exporting cues, and for tests.

use std::sync::{Arc, Mutex};

use super::cue::{Envelope, Tone, ToneProgram};
use super::{AudioBackend, AudioError, ScheduledTone};

/// Renders a whole program starting at sample zero.
pub fn render(program: &ToneProgram, sample_rate: u32) -> Vec<f32> {
    let len = seconds_to_samples(program.length(), sample_rate);
    let mut out = vec![0.0; len];
    for tone in &program.tones {
        let start = seconds_to_samples(tone.offset, sample_rate);
        mix_tone(&mut out, start, tone, &program.envelope, sample_rate);
    }
    out
}

fn seconds_to_samples(seconds: f64, sample_rate: u32) -> usize {
    (seconds.max(0.0) * f64::from(sample_rate)).round() as usize
}

/// Adds one enveloped tone into `out` beginning at sample `start`.
fn mix_tone(out: &mut [f32], start: usize, tone: &Tone, envelope: &Envelope, sample_rate: u32) {
    let voice = ToneVoice::new(*tone, *envelope, sample_rate);
    for (slot, sample) in out.iter_mut().skip(start).zip(voice) {
        *slot += sample;
    }
}

/// One enveloped tone as a finite stream of mono samples.
///
/// The stream covers the note and its release tail, then ends.
#[derive(Debug, Clone)]
pub struct ToneVoice {
    tone: Tone,
    envelope: Envelope,
    sample_rate: u32,
    index: usize,
    len: usize,
}

impl ToneVoice {
    pub fn new(tone: Tone, envelope: Envelope, sample_rate: u32) -> Self {
        let sample_rate = sample_rate.max(1);
        Self {
            tone,
            envelope,
            sample_rate,
            index: 0,
            len: seconds_to_samples(tone.duration + envelope.release, sample_rate),
        }
    }

    pub fn rate(&self) -> u32 {
        self.sample_rate
    }

    /// Total length in seconds, release tail included.
    pub fn length(&self) -> f64 {
        self.len as f64 / f64::from(self.sample_rate)
    }
}

impl Iterator for ToneVoice {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.index >= self.len {
            return None;
        }
        let t = self.index as f64 / f64::from(self.sample_rate);
        self.index += 1;
        let phase = f64::from(self.tone.frequency_hz) * t;
        Some(self.tone.waveform.sample(phase) * self.envelope.gain_at(&self.tone, t))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.len.saturating_sub(self.index);
        (left, Some(left))
    }
}

impl ExactSizeIterator for ToneVoice {}

#[derive(Debug)]
struct Mix {
    sample_rate: u32,
    clock: f64,
    samples: Vec<f32>,
    tones: usize,
    closed: bool,
}

/// An [`AudioBackend`] that renders into memory.
///
/// Clones share the same buffer, so a clone kept outside the engine can read
/// what was played. The clock only moves when [`advance`](Self::advance) is
/// called.
#[derive(Debug, Clone)]
pub struct RenderBackend {
    mix: Arc<Mutex<Mix>>,
}

impl RenderBackend {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            mix: Arc::new(Mutex::new(Mix {
                sample_rate: sample_rate.max(1),
                clock: 0.0,
                samples: Vec::new(),
                tones: 0,
                closed: false,
            })),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, seconds: f64) {
        if let Ok(mut mix) = self.mix.lock() {
            mix.clock += seconds.max(0.0);
        }
    }

    /// Copy of the mixed samples.
    pub fn samples(&self) -> Vec<f32> {
        self.mix.lock().map(|m| m.samples.clone()).unwrap_or_default()
    }

    /// Largest absolute sample value in the mix.
    pub fn peak(&self) -> f32 {
        self.mix
            .lock()
            .map(|m| m.samples.iter().fold(0.0_f32, |acc, s| acc.max(s.abs())))
            .unwrap_or(0.0)
    }

    /// Number of tones scheduled so far.
    pub fn tone_count(&self) -> usize {
        self.mix.lock().map(|m| m.tones).unwrap_or(0)
    }

    pub fn is_closed(&self) -> bool {
        self.mix.lock().map(|m| m.closed).unwrap_or(true)
    }
}

impl AudioBackend for RenderBackend {
    fn now(&self) -> f64 {
        self.mix.lock().map(|m| m.clock).unwrap_or(0.0)
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        let mut mix = self
            .mix
            .lock()
            .map_err(|_| AudioError::Unavailable("render buffer poisoned".into()))?;
        mix.closed = false;
        Ok(())
    }

    fn schedule(&mut self, scheduled: &ScheduledTone) -> Result<(), AudioError> {
        let mut mix = self
            .mix
            .lock()
            .map_err(|_| AudioError::Playback("render buffer poisoned".into()))?;
        let sample_rate = mix.sample_rate;
        let start = seconds_to_samples(scheduled.start, sample_rate);
        let end = seconds_to_samples(scheduled.stop(), sample_rate);
        if mix.samples.len() < end {
            mix.samples.resize(end, 0.0);
        }
        mix_tone(
            &mut mix.samples,
            start,
            &scheduled.tone,
            &scheduled.envelope,
            sample_rate,
        );
        mix.tones += 1;
        Ok(())
    }

    fn close(&mut self) {
        if let Ok(mut mix) = self.mix.lock() {
            mix.closed = true;
        }
    }
}
