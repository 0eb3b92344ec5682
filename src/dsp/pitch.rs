//! Pitch helpers: MIDI note numbers to frequencies.

/// Concert pitch for A4 (MIDI 69).
pub const A4_HZ: f64 = 440.0;

/// Convert a MIDI note number to frequency using the given tuning pitch.
///
/// Formula: `tuning_pitch * 2^((midi - 69) / 12)`
pub fn midi_to_frequency(midi: i32, tuning_pitch: f64) -> f64 {
    tuning_pitch * (2.0_f64).powf((midi as f64 - 69.0) / 12.0)
}

/// Frequency of a table entry at standard tuning.
pub fn note_hz(midi: u8) -> f64 {
    midi_to_frequency(midi as i32, A4_HZ)
}
