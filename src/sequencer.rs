//! Melodic Sequencer: stateful cursors over fixed note tables.
//!
//! Every `next_*` call advances its cursor by one and wraps at the end of
//! its table, so sequences never run out and consecutive calls are
//! order-dependent. All cursors live in one [`Sequencer`] owned by the
//! engine and are reset together.

use serde::{Deserialize, Serialize};

use crate::dsp::pitch::note_hz;

/// C minor pentatonic from G3 to F6.
pub const PENTATONIC: [u8; 15] = [
    55, 58, 60, 63, 65, 67, 70, 72, 75, 77, 79, 82, 84, 87, 89,
];

/// Composed 32-note melody in C major.
pub const MELODY: [u8; 32] = [
    60, 64, 67, 72, 71, 67, 64, 62, //
    60, 62, 64, 65, 67, 69, 67, 65, //
    64, 62, 60, 64, 67, 65, 64, 62, //
    60, 67, 72, 71, 69, 67, 65, 64,
];

/// One chord of the jazz progression and the scale notes drawn over it.
#[derive(Debug, Clone, PartialEq)]
pub struct JazzChord {
    pub name: &'static str,
    pub voicing: [u8; 4],
    pub scale: [u8; 15],
}

/// ii–V–I–vi in C.
pub static JAZZ_PROGRESSION: [JazzChord; 4] = [
    JazzChord {
        name: "Dm7",
        voicing: [50, 57, 60, 65],
        // D dorian
        scale: [62, 64, 65, 67, 69, 71, 72, 74, 76, 77, 79, 81, 83, 84, 86],
    },
    JazzChord {
        name: "G7",
        voicing: [43, 53, 59, 62],
        // G mixolydian
        scale: [55, 57, 59, 60, 62, 64, 65, 67, 69, 71, 72, 74, 76, 77, 79],
    },
    JazzChord {
        name: "Cmaj7",
        voicing: [48, 55, 59, 64],
        // C ionian
        scale: [60, 62, 64, 65, 67, 69, 71, 72, 74, 76, 77, 79, 81, 83, 84],
    },
    JazzChord {
        name: "Am7",
        voicing: [45, 52, 55, 60],
        // A aeolian
        scale: [57, 59, 60, 62, 64, 65, 67, 69, 71, 72, 74, 76, 77, 79, 81],
    },
];

/// Melody line transcribed from the nocturne MIDI source (E-flat major).
pub const MIDI_MELODY: [u8; 24] = [
    70, 79, 77, 79, 77, 75, 70, 79, //
    75, 72, 74, 75, 77, 70, 72, 74, //
    75, 79, 82, 80, 79, 77, 75, 74,
];

/// Bass pedal tones from the same source, one per 8-beat bar pair.
pub const MIDI_BASS: [u8; 8] = [39, 34, 36, 31, 32, 39, 34, 34];

/// Which note table a mood draws keystroke notes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SequencerStrategy {
    #[default]
    Pentatonic,
    Melody,
    Jazz,
    Midi,
}

/// The cursor arena.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sequencer {
    pentatonic: usize,
    melody: usize,
    jazz_chord: usize,
    jazz_scale: usize,
    chord_ticks: u64,
    midi_melody: usize,
    midi_bass: usize,
}

fn advance(cursor: &mut usize, len: usize) -> usize {
    let i = *cursor % len;
    *cursor = (i + 1) % len;
    i
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next keystroke note for `strategy`, in Hz.
    pub fn next_note(&mut self, strategy: SequencerStrategy) -> f64 {
        match strategy {
            SequencerStrategy::Pentatonic => self.next_pentatonic(),
            SequencerStrategy::Melody => self.next_melody(),
            SequencerStrategy::Jazz => self.next_jazz(),
            SequencerStrategy::Midi => self.next_midi_melody(),
        }
    }

    pub fn next_pentatonic(&mut self) -> f64 {
        note_hz(PENTATONIC[advance(&mut self.pentatonic, PENTATONIC.len())])
    }

    pub fn next_melody(&mut self) -> f64 {
        note_hz(MELODY[advance(&mut self.melody, MELODY.len())])
    }

    /// Next note from the scale of the chord currently sounding.
    pub fn next_jazz(&mut self) -> f64 {
        let scale = &self.current_chord().scale;
        let i = advance(&mut self.jazz_scale, scale.len());
        note_hz(scale[i])
    }

    pub fn next_midi_melody(&mut self) -> f64 {
        note_hz(MIDI_MELODY[advance(&mut self.midi_melody, MIDI_MELODY.len())])
    }

    /// Next sustained bass pedal tone, in Hz.
    pub fn next_bass(&mut self) -> f64 {
        note_hz(MIDI_BASS[advance(&mut self.midi_bass, MIDI_BASS.len())])
    }

    pub fn current_chord(&self) -> &'static JazzChord {
        &JAZZ_PROGRESSION[self.jazz_chord % JAZZ_PROGRESSION.len()]
    }

    /// Measure-timer tick: the first tick sounds the first chord, every later
    /// tick moves to the next chord. Returns the chord to sound now.
    pub fn chord_tick(&mut self) -> &'static JazzChord {
        if self.chord_ticks > 0 {
            self.jazz_chord = (self.jazz_chord + 1) % JAZZ_PROGRESSION.len();
        }
        self.chord_ticks += 1;
        self.current_chord()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pentatonic_cycle_length_is_fifteen() {
        let mut seq = Sequencer::new();
        let first = seq.next_pentatonic();
        for _ in 1..15 {
            seq.next_pentatonic();
        }
        assert_eq!(seq.next_pentatonic(), first);
    }

    #[test]
    fn pentatonic_is_ascending_within_cycle() {
        let mut seq = Sequencer::new();
        let notes: Vec<f64> = (0..15).map(|_| seq.next_pentatonic()).collect();
        assert!(notes.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn melody_wraps_after_32() {
        let mut seq = Sequencer::new();
        let notes: Vec<f64> = (0..33).map(|_| seq.next_melody()).collect();
        assert_eq!(notes[32], notes[0]);
        assert!((notes[0] - note_hz(60)).abs() < 1e-9);
    }

    #[test]
    fn strategies_have_independent_cursors() {
        let mut seq = Sequencer::new();
        seq.next_note(SequencerStrategy::Pentatonic);
        seq.next_note(SequencerStrategy::Pentatonic);
        let m = seq.next_note(SequencerStrategy::Melody);
        assert!((m - note_hz(MELODY[0])).abs() < 1e-9);
    }

    #[test]
    fn jazz_notes_follow_current_chord() {
        let mut seq = Sequencer::new();
        assert_eq!(seq.chord_tick().name, "Dm7");
        let a = seq.next_jazz();
        assert!((a - note_hz(JAZZ_PROGRESSION[0].scale[0])).abs() < 1e-9);

        assert_eq!(seq.chord_tick().name, "G7");
        // Shared scale cursor keeps its position across chord changes.
        let b = seq.next_jazz();
        assert!((b - note_hz(JAZZ_PROGRESSION[1].scale[1])).abs() < 1e-9);
    }

    #[test]
    fn chord_progression_wraps() {
        let mut seq = Sequencer::new();
        let names: Vec<&str> = (0..5).map(|_| seq.chord_tick().name).collect();
        assert_eq!(names, vec!["Dm7", "G7", "Cmaj7", "Am7", "Dm7"]);
    }

    #[test]
    fn bass_and_midi_melody_are_independent() {
        let mut seq = Sequencer::new();
        let b0 = seq.next_bass();
        let m0 = seq.next_midi_melody();
        let b1 = seq.next_bass();
        assert!((b0 - note_hz(MIDI_BASS[0])).abs() < 1e-9);
        assert!((m0 - note_hz(MIDI_MELODY[0])).abs() < 1e-9);
        assert!((b1 - note_hz(MIDI_BASS[1])).abs() < 1e-9);
        for _ in 0..MIDI_BASS.len() - 2 {
            seq.next_bass();
        }
        assert_eq!(seq.next_bass(), b0);
    }

    #[test]
    fn reset_returns_all_cursors_to_zero() {
        let mut seq = Sequencer::new();
        seq.next_pentatonic();
        seq.chord_tick();
        seq.chord_tick();
        seq.next_bass();
        seq.reset();
        assert_eq!(seq, Sequencer::new());
        assert_eq!(seq.chord_tick().name, "Dm7");
    }
}
