//! Instrument Catalog and the tempo/rhythm mapping functions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::dsp::oscillator::Waveform;
use crate::error::KeysongError;

/// Accessibility clamp range, in Hz.
pub const ACCESSIBLE_MIN_HZ: f64 = 200.0;
pub const ACCESSIBLE_MAX_HZ: f64 = 800.0;

/// ADSR envelope: attack/decay/release in seconds, sustain as a ratio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Adsr {
    pub attack: f64,
    pub decay: f64,
    pub sustain: f64,
    pub release: f64,
}

impl Adsr {
    pub const fn new(attack: f64, decay: f64, sustain: f64, release: f64) -> Self {
        Adsr {
            attack,
            decay,
            sustain,
            release,
        }
    }
}

/// Inclusive frequency range used by the tempo mapping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencyRange {
    pub min: f64,
    pub max: f64,
}

impl FrequencyRange {
    pub const fn new(min: f64, max: f64) -> Self {
        FrequencyRange { min, max }
    }

    /// One octave upward from `base`.
    pub fn octave_above(base: f64) -> Self {
        FrequencyRange::new(base, base * 2.0)
    }
}

/// Closed set of catalogued instruments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentId {
    Piano,
    Guitar,
    Violin,
    Flute,
    Synth,
    Bells,
    Marimba,
    Bass,
}

impl InstrumentId {
    pub const ALL: [InstrumentId; 8] = [
        InstrumentId::Piano,
        InstrumentId::Guitar,
        InstrumentId::Violin,
        InstrumentId::Flute,
        InstrumentId::Synth,
        InstrumentId::Bells,
        InstrumentId::Marimba,
        InstrumentId::Bass,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            InstrumentId::Piano => "piano",
            InstrumentId::Guitar => "guitar",
            InstrumentId::Violin => "violin",
            InstrumentId::Flute => "flute",
            InstrumentId::Synth => "synth",
            InstrumentId::Bells => "bells",
            InstrumentId::Marimba => "marimba",
            InstrumentId::Bass => "bass",
        }
    }

    /// The static definition for this instrument.
    pub fn config(self) -> &'static InstrumentConfig {
        match self {
            InstrumentId::Piano => &PIANO,
            InstrumentId::Guitar => &GUITAR,
            InstrumentId::Violin => &VIOLIN,
            InstrumentId::Flute => &FLUTE,
            InstrumentId::Synth => &SYNTH,
            InstrumentId::Bells => &BELLS,
            InstrumentId::Marimba => &MARIMBA,
            InstrumentId::Bass => &BASS,
        }
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstrumentId {
    type Err = KeysongError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        InstrumentId::ALL
            .into_iter()
            .find(|id| id.as_str() == lower)
            .ok_or_else(|| KeysongError::UnknownInstrument(s.to_string()))
    }
}

/// Static, read-only instrument definition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstrumentConfig {
    pub id: InstrumentId,
    pub name: &'static str,
    pub waveform: Waveform,
    pub envelope: Adsr,
    pub base_frequency: f64,
    pub range: FrequencyRange,
    /// Peak gain [0, 1] before velocity.
    pub base_volume: f64,
    /// Frequency multipliers of extra partials, quietest last.
    pub harmonics: &'static [f64],
}

pub static PIANO: InstrumentConfig = InstrumentConfig {
    id: InstrumentId::Piano,
    name: "Piano",
    waveform: Waveform::Triangle,
    envelope: Adsr::new(0.01, 0.3, 0.4, 1.0),
    base_frequency: 261.63,
    range: FrequencyRange::new(130.81, 523.25),
    base_volume: 0.6,
    harmonics: &[2.0, 3.0],
};

pub static GUITAR: InstrumentConfig = InstrumentConfig {
    id: InstrumentId::Guitar,
    name: "Guitar",
    waveform: Waveform::Sawtooth,
    envelope: Adsr::new(0.005, 0.2, 0.3, 0.8),
    base_frequency: 196.0,
    range: FrequencyRange::new(82.41, 392.0),
    base_volume: 0.35,
    harmonics: &[2.0],
};

pub static VIOLIN: InstrumentConfig = InstrumentConfig {
    id: InstrumentId::Violin,
    name: "Violin",
    waveform: Waveform::Sawtooth,
    envelope: Adsr::new(0.12, 0.1, 0.8, 0.6),
    base_frequency: 440.0,
    range: FrequencyRange::new(196.0, 880.0),
    base_volume: 0.3,
    harmonics: &[2.0, 3.0, 4.0],
};

pub static FLUTE: InstrumentConfig = InstrumentConfig {
    id: InstrumentId::Flute,
    name: "Flute",
    waveform: Waveform::Sine,
    envelope: Adsr::new(0.08, 0.1, 0.7, 0.4),
    base_frequency: 523.25,
    range: FrequencyRange::new(261.63, 1046.5),
    base_volume: 0.5,
    harmonics: &[2.0],
};

pub static SYNTH: InstrumentConfig = InstrumentConfig {
    id: InstrumentId::Synth,
    name: "Synth",
    waveform: Waveform::Square,
    envelope: Adsr::new(0.02, 0.15, 0.5, 0.3),
    base_frequency: 329.63,
    range: FrequencyRange::new(164.81, 659.25),
    base_volume: 0.25,
    harmonics: &[],
};

pub static BELLS: InstrumentConfig = InstrumentConfig {
    id: InstrumentId::Bells,
    name: "Bells",
    waveform: Waveform::Sine,
    envelope: Adsr::new(0.001, 0.6, 0.2, 1.5),
    base_frequency: 783.99,
    range: FrequencyRange::new(523.25, 1567.98),
    base_volume: 0.4,
    harmonics: &[2.76, 5.4],
};

pub static MARIMBA: InstrumentConfig = InstrumentConfig {
    id: InstrumentId::Marimba,
    name: "Marimba",
    waveform: Waveform::Sine,
    envelope: Adsr::new(0.002, 0.25, 0.1, 0.3),
    base_frequency: 392.0,
    range: FrequencyRange::new(196.0, 783.99),
    base_volume: 0.55,
    harmonics: &[4.0],
};

pub static BASS: InstrumentConfig = InstrumentConfig {
    id: InstrumentId::Bass,
    name: "Bass",
    waveform: Waveform::Triangle,
    envelope: Adsr::new(0.01, 0.2, 0.6, 0.4),
    base_frequency: 82.41,
    range: FrequencyRange::new(41.2, 164.81),
    base_volume: 0.7,
    harmonics: &[2.0],
};

/// Normalized position [0, 1] for a keys-per-minute reading.
///
/// `<40 -> 0`, `[40,80) -> (k-40)/120`, `[80,120) -> 0.33+(k-80)/120`,
/// `>=120 -> 0.66+min((k-120)/240, 0.34)`.
pub fn tempo_position(keys_per_minute: f64) -> f64 {
    let k = keys_per_minute;
    let t = if k < 40.0 {
        0.0
    } else if k < 80.0 {
        (k - 40.0) / 120.0
    } else if k < 120.0 {
        0.33 + (k - 80.0) / 120.0
    } else {
        0.66 + ((k - 120.0) / 240.0).min(0.34)
    };
    t.clamp(0.0, 1.0)
}

/// Map a range and keys-per-minute to a frequency by log2 interpolation.
pub fn frequency_in_range(range: FrequencyRange, keys_per_minute: f64) -> f64 {
    let t = tempo_position(keys_per_minute);
    let lo = range.min.log2();
    let hi = range.max.log2();
    let freq = (lo + t * (hi - lo)).exp2();
    // Guard against exp2/log2 rounding escaping the range at the ends.
    freq.clamp(range.min.min(range.max), range.max.max(range.min))
}

/// Frequency for `instrument` at the given typing tempo.
pub fn frequency_for_tempo(instrument: &InstrumentConfig, keys_per_minute: f64) -> f64 {
    frequency_in_range(instrument.range, keys_per_minute)
}

/// `0.3 + (score / 100) * 0.7`, clamped to [0.3, 1.0].
pub fn velocity_for_rhythm(rhythm_score: f64) -> f64 {
    (0.3 + (rhythm_score / 100.0) * 0.7).clamp(0.3, 1.0)
}

/// Clamp into the accessibility range.
pub fn apply_accessibility_frequency(frequency: f64) -> f64 {
    frequency.clamp(ACCESSIBLE_MIN_HZ, ACCESSIBLE_MAX_HZ)
}
