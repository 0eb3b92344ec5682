//! Mood table: each mood bundles its audio settings with the ambient bed
//! and the note source it uses. Selected once at `start()`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::dsp::oscillator::Waveform;
use crate::error::KeysongError;
use crate::sequencer::SequencerStrategy;

/// Closed set of supported moods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Lofi,
    Melody,
    Jazz,
    Nocturne,
}

/// Continuous background layer of a mood.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BedStrategy {
    /// Drone pad, beat loop and filtered pink noise.
    DrumsAndNoise,
    /// 4-note voicing every 4 beats with crossfades.
    ChordProgression,
    /// Sustained bass pedal tone every 8 beats.
    MidiBass,
    /// No bed; only keystroke notes sound.
    MelodyOnly,
}

/// Static per-mood audio settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoodProfile {
    pub mood: Mood,
    pub base_frequency: f64,
    pub tempo: f64,
    pub volume: f64,
    pub waveform: Waveform,
    pub bed: BedStrategy,
    pub sequencer: SequencerStrategy,
}

impl MoodProfile {
    /// Seconds per beat at this mood's tempo.
    pub fn beat_seconds(&self) -> f64 {
        60.0 / self.tempo
    }
}

static PROFILES: [MoodProfile; 4] = [
    MoodProfile {
        mood: Mood::Lofi,
        base_frequency: 110.0,
        tempo: 80.0,
        volume: 0.5,
        waveform: Waveform::Triangle,
        bed: BedStrategy::DrumsAndNoise,
        sequencer: SequencerStrategy::Pentatonic,
    },
    MoodProfile {
        mood: Mood::Melody,
        base_frequency: 261.63,
        tempo: 90.0,
        volume: 0.6,
        waveform: Waveform::Sine,
        bed: BedStrategy::MelodyOnly,
        sequencer: SequencerStrategy::Melody,
    },
    MoodProfile {
        mood: Mood::Jazz,
        base_frequency: 146.83,
        tempo: 100.0,
        volume: 0.5,
        waveform: Waveform::Triangle,
        bed: BedStrategy::ChordProgression,
        sequencer: SequencerStrategy::Jazz,
    },
    MoodProfile {
        mood: Mood::Nocturne,
        base_frequency: 77.78,
        tempo: 66.0,
        volume: 0.55,
        waveform: Waveform::Sine,
        bed: BedStrategy::MidiBass,
        sequencer: SequencerStrategy::Midi,
    },
];

impl Mood {
    pub const ALL: [Mood; 4] = [Mood::Lofi, Mood::Melody, Mood::Jazz, Mood::Nocturne];

    pub fn as_str(self) -> &'static str {
        match self {
            Mood::Lofi => "lofi",
            Mood::Melody => "melody",
            Mood::Jazz => "jazz",
            Mood::Nocturne => "nocturne",
        }
    }

    pub fn profile(self) -> &'static MoodProfile {
        match self {
            Mood::Lofi => &PROFILES[0],
            Mood::Melody => &PROFILES[1],
            Mood::Jazz => &PROFILES[2],
            Mood::Nocturne => &PROFILES[3],
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mood {
    type Err = KeysongError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Mood::ALL
            .into_iter()
            .find(|m| m.as_str() == lower)
            .ok_or_else(|| KeysongError::UnknownMood(s.to_string()))
    }
}
