//! Rhythm-to-audio binding: turns each rhythm snapshot into live parameter
//! targets for the running bed.

use serde::Serialize;

use crate::dsp::engine::AudioEngine;
use crate::instrument::{FrequencyRange, frequency_in_range, velocity_for_rhythm};
use crate::mood::MoodProfile;
use crate::rhythm::{PEAK_SCORE, RhythmSnapshot};

/// Bed lowpass cutoff at rhythm score 0, in Hz.
pub const MIN_CUTOFF_HZ: f64 = 800.0;
/// Bed lowpass cutoff at the peak rhythm score, in Hz.
pub const MAX_CUTOFF_HZ: f64 = 4_000.0;

/// Parameter targets pushed into the engine on a rhythm tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RhythmModulation {
    /// Drone root, within one octave above the mood's base frequency.
    pub drone_frequency: f64,
    pub filter_cutoff: f64,
    /// Gain scale for bed voices created from now on, in [0.3, 1].
    pub envelope_scale: f64,
}

/// How hard the bed is driven, in [0, 1]: the rhythm score relative to the
/// highest score the estimator can report.
pub fn drive(snapshot: &RhythmSnapshot) -> f64 {
    (f64::from(snapshot.rhythm_score) / f64::from(PEAK_SCORE)).clamp(0.0, 1.0)
}

/// Derive modulation targets from a snapshot for the given mood.
pub fn modulation_for(snapshot: &RhythmSnapshot, profile: &MoodProfile) -> RhythmModulation {
    let drive = drive(snapshot);
    RhythmModulation {
        drone_frequency: frequency_in_range(
            FrequencyRange::octave_above(profile.base_frequency),
            snapshot.keys_per_minute as f64,
        ),
        filter_cutoff: MIN_CUTOFF_HZ + (MAX_CUTOFF_HZ - MIN_CUTOFF_HZ) * drive,
        envelope_scale: velocity_for_rhythm(drive * 100.0),
    }
}

/// Push `snapshot` into `engine`. Returns the applied modulation, or `None`
/// when no mood is playing.
pub fn apply(engine: &mut AudioEngine, snapshot: &RhythmSnapshot) -> Option<RhythmModulation> {
    let profile = engine.profile()?;
    let modulation = modulation_for(snapshot, profile);
    engine.apply_modulation(modulation).then_some(modulation)
}
