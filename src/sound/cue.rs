//! Declarative tone programs and the cue catalog.

/// Oscillator shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Waveform {
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

impl Waveform {
    /// Oscillator value at `phase` (cycles, wrapped to `0.0..1.0`).
    pub fn sample(&self, phase: f64) -> f32 {
        let p = phase.rem_euclid(1.0);
        let v = match self {
            Self::Sine => (std::f64::consts::TAU * p).sin(),
            Self::Square => {
                if p < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Self::Sawtooth => 2.0 * p - 1.0,
            Self::Triangle => 4.0 * (p - 0.5).abs() - 1.0,
        };
        v as f32
    }
}

/// One note of a cue.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub waveform: Waveform,
    pub frequency_hz: f32,
    /// Seconds from the start of the cue.
    pub offset: f64,
    /// Seconds from onset until the envelope reaches its floor.
    pub duration: f64,
    pub peak_gain: f32,
}

impl Tone {
    pub fn new(
        waveform: Waveform,
        frequency_hz: f32,
        offset: f64,
        duration: f64,
        peak_gain: f32,
    ) -> Self {
        Self {
            waveform,
            frequency_hz,
            offset,
            duration,
            peak_gain,
        }
    }

    /// Seconds from the start of the cue until this tone stops sounding.
    pub fn end(&self, envelope: &Envelope) -> f64 {
        self.offset + self.duration + envelope.release
    }
}

/// Gain shape applied to every tone of a program.
///
/// Each tone starts at its peak gain and, when `decay` is set, falls
/// exponentially to `floor` over its duration. The oscillator keeps running
/// for `release` seconds past the duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    pub decay: bool,
    pub floor: f32,
    pub release: f64,
}

impl Default for Envelope {
    fn default() -> Self {
        Self {
            decay: true,
            floor: 0.001,
            release: 0.02,
        }
    }
}

impl Envelope {
    /// Gain `elapsed` seconds after onset for a tone with the given peak.
    pub fn gain_at(&self, tone: &Tone, elapsed: f64) -> f32 {
        if elapsed < 0.0 || elapsed > tone.duration + self.release {
            return 0.0;
        }
        if !self.decay || tone.peak_gain <= self.floor || tone.duration <= 0.0 {
            return tone.peak_gain;
        }
        if elapsed >= tone.duration {
            return self.floor;
        }
        let ratio = f64::from(self.floor / tone.peak_gain);
        let gain = f64::from(tone.peak_gain) * ratio.powf(elapsed / tone.duration);
        gain as f32
    }
}

/// An ordered list of tones sharing one envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct ToneProgram {
    pub tones: Vec<Tone>,
    pub envelope: Envelope,
}

impl ToneProgram {
    pub fn new(tones: Vec<Tone>) -> Self {
        Self {
            tones,
            envelope: Envelope::default(),
        }
    }

    /// Seconds until the last tone stops.
    pub fn length(&self) -> f64 {
        self.tones
            .iter()
            .map(|t| t.end(&self.envelope))
            .fold(0.0, f64::max)
    }
}

/// Notes played one after another at a fixed step.
fn arpeggio(waveform: Waveform, freqs: &[f32], step: f64, duration: f64, gain: f32) -> Vec<Tone> {
    freqs
        .iter()
        .enumerate()
        .map(|(i, &f)| Tone::new(waveform, f, step * i as f64, duration, gain))
        .collect()
}

/// Remaining seconds at or below which the tick switches to its urgent voice.
pub const URGENT_TICK_SECONDS: i32 = 5;

/// Every sound the client can make.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cue {
    Click,
    GameStart,
    /// Per-second tick; higher and louder when time is short.
    TimerTick { seconds: i32 },
    TimeUp,
    Voting,
    ImposterCaught,
    CitizensWin,
    ImposterWins,
    Eliminated,
    YourTurn,
    WordSent,
    PlayerJoined,
}

impl Cue {
    /// Builds the tone program for this cue.
    pub fn program(&self) -> ToneProgram {
        use Waveform::{Sawtooth, Sine, Square};

        let tones = match *self {
            Self::Click => vec![Tone::new(Square, 800.0, 0.0, 0.06, 0.15)],
            // C4 E4 G4 C5
            Self::GameStart => arpeggio(Sine, &[261.6, 329.6, 392.0, 523.2], 0.12, 0.25, 0.3),
            Self::TimerTick { seconds } => {
                let (freq, gain) = if seconds <= URGENT_TICK_SECONDS {
                    (880.0, 0.25)
                } else {
                    (660.0, 0.12)
                };
                vec![Tone::new(Square, freq, 0.0, 0.05, gain)]
            }
            Self::TimeUp => [0.0, 0.15, 0.30]
                .into_iter()
                .map(|offset| Tone::new(Sawtooth, 440.0, offset, 0.12, 0.3))
                .collect(),
            Self::Voting => arpeggio(Sine, &[130.8, 110.0, 130.8], 0.25, 0.4, 0.25),
            Self::ImposterCaught => {
                arpeggio(Sine, &[523.0, 466.0, 415.0, 370.0, 330.0], 0.1, 0.18, 0.3)
            }
            Self::CitizensWin => {
                arpeggio(Sine, &[330.0, 392.0, 494.0, 587.0, 659.0], 0.11, 0.22, 0.35)
            }
            // All three notes at once.
            Self::ImposterWins => arpeggio(Sine, &[220.0, 261.0, 311.0], 0.0, 0.8, 0.2),
            Self::Eliminated => vec![
                Tone::new(Sawtooth, 300.0, 0.0, 0.1, 0.3),
                Tone::new(Sawtooth, 200.0, 0.12, 0.2, 0.25),
            ],
            Self::YourTurn => arpeggio(Sine, &[440.0, 554.0, 660.0], 0.09, 0.15, 0.3),
            Self::WordSent => vec![
                Tone::new(Sine, 660.0, 0.0, 0.08, 0.2),
                Tone::new(Sine, 880.0, 0.1, 0.08, 0.15),
            ],
            Self::PlayerJoined => vec![
                Tone::new(Sine, 440.0, 0.0, 0.1, 0.2),
                Tone::new(Sine, 550.0, 0.1, 0.12, 0.2),
            ],
        };
        ToneProgram::new(tones)
    }
}
