//! Audio Engine: the mood bed and keystroke notes on one audio graph.
//!
//! The engine is pull-based: the host calls [`AudioEngine::render`] and the
//! engine fires its recurring bed timers (beat, chord, bass) at render-block
//! boundaries before rendering the block. Lifecycle runs
//! `Idle -> Starting -> Playing -> Stopping -> Idle`; the last step happens
//! inside `render` once the two-second fade-out has played.

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::Serialize;

use crate::binding::RhythmModulation;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::instrument::{Adsr, InstrumentId, apply_accessibility_frequency};
use crate::mood::{BedStrategy, Mood, MoodProfile};
use crate::sequencer::{Sequencer, SequencerStrategy};
use crate::timer::{TimerHandle, TimerQueue};

use super::drums::{DrumKind, DrumVoice};
use super::graph::{AudioGraph, Bus, ContextState, DEFAULT_BED_CUTOFF, NodeRole, Source};
use super::noise::pink_noise_buffer;
use super::param::AudioParam;
use super::pitch::note_hz;
use super::voice::Voice;

pub const FADE_IN_SECONDS: f64 = 1.0;
pub const FADE_OUT_SECONDS: f64 = 2.0;
pub const VOLUME_RAMP_SECONDS: f64 = 0.1;
/// Default sustain length of a keystroke note.
pub const DEFAULT_NOTE_DURATION: f64 = 0.6;
/// Master volume before any mood has been started.
pub const DEFAULT_VOLUME: f64 = 0.5;

const MODULATION_RAMP_SECONDS: f64 = 0.5;
const HARMONIC_GAIN: f64 = 0.3;

// Drone pad: root plus fifth.
const DRONE_RATIOS: [f64; 2] = [1.0, 1.5];
const DRONE_LEVEL: f64 = 0.08;
const DRONE_FADE_SECONDS: f64 = 2.0;

const NOISE_LEVEL: f64 = 0.05;
const NOISE_CUTOFF_HZ: f64 = 1_200.0;
const NOISE_LOOP_SECONDS: f64 = 2.0;

const CHORD_LEVEL: f64 = 0.06;
const CHORD_FADE_OUT_SECONDS: f64 = 0.15;
const CHORD_FADE_IN_SECONDS: f64 = 0.6;

const BASS_LEVEL: f64 = 0.3;
const BASS_ENVELOPE: Adsr = Adsr::new(0.05, 0.3, 0.6, 1.2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    Idle,
    Starting,
    Playing,
    Stopping,
}

/// Snapshot returned by [`AudioEngine::get_state`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatus {
    pub is_playing: bool,
    pub mood: Option<Mood>,
    pub volume: f64,
    pub state: EngineState,
}

/// A keystroke note to play.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteRequest {
    pub instrument: InstrumentId,
    /// Velocity in [0, 1].
    pub velocity: f64,
    /// Sustain length in seconds, between decay and release.
    pub duration: f64,
    /// Clamp the note into the comfortable hearing range.
    pub accessibility: bool,
}

impl NoteRequest {
    pub fn new(instrument: InstrumentId, velocity: f64) -> Self {
        NoteRequest {
            instrument,
            velocity,
            duration: DEFAULT_NOTE_DURATION,
            accessibility: false,
        }
    }

    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = duration;
        self
    }

    pub fn accessible(mut self, on: bool) -> Self {
        self.accessibility = on;
        self
    }
}

/// What [`AudioEngine::play_instrument_note`] scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayedNote {
    pub instrument: InstrumentId,
    pub frequency: f64,
    pub velocity: f64,
    pub start_time: f64,
    pub stop_time: f64,
    /// Fundamental plus harmonics actually scheduled.
    pub oscillators: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BedTask {
    Beat,
    Chord,
    Bass,
}

pub struct AudioEngine {
    config: EngineConfig,
    graph: AudioGraph,
    state: EngineState,
    profile: Option<&'static MoodProfile>,
    volume: f64,
    sequencer: Sequencer,
    timers: TimerQueue<BedTask>,
    bed_timers: Vec<TimerHandle>,
    beat: u64,
    /// Gain scale for bed voices, driven by the rhythm binding.
    bed_level: f64,
    /// Audio time the start fade-in reaches full volume.
    fade_in_until: f64,
    fade_out_frame: Option<u64>,
    rng: StdRng,
}

impl AudioEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let mut graph = AudioGraph::new(
            f64::from(config.sample_rate),
            config.reverb_mix,
            config.max_voices,
            DEFAULT_VOLUME,
        );
        graph.connect_destination();
        Ok(AudioEngine {
            rng: StdRng::seed_from_u64(config.seed),
            config,
            graph,
            state: EngineState::Idle,
            profile: None,
            volume: DEFAULT_VOLUME,
            sequencer: Sequencer::new(),
            timers: TimerQueue::new(),
            bed_timers: Vec::new(),
            beat: 0,
            bed_level: 1.0,
            fade_in_until: 0.0,
            fade_out_frame: None,
        })
    }

    pub fn sample_rate(&self) -> f64 {
        self.graph.sample_rate()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Audio clock in seconds.
    pub fn current_time(&self) -> f64 {
        self.graph.current_time()
    }

    pub fn context_state(&self) -> ContextState {
        self.graph.state()
    }

    /// Suspend the output (e.g. the host page lost focus).
    pub fn suspend(&mut self) {
        self.graph.suspend();
    }

    pub fn engine_state(&self) -> EngineState {
        self.state
    }

    /// The mood profile while a bed is playing or fading out.
    pub fn profile(&self) -> Option<&'static MoodProfile> {
        self.profile
    }

    pub fn active_timer_count(&self) -> usize {
        self.timers.len()
    }

    pub fn active_node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Live nodes with the given role.
    pub fn node_count(&self, role: NodeRole) -> usize {
        self.graph.count_role(role)
    }

    /// Current master gain on the audio clock.
    pub fn master_gain(&self) -> f64 {
        self.graph.master.value_at(self.graph.current_time())
    }

    pub fn get_state(&self) -> EngineStatus {
        EngineStatus {
            is_playing: self.state == EngineState::Playing,
            mood: self.profile.map(|p| p.mood),
            volume: self.volume,
            state: self.state,
        }
    }

    /// Start the bed for mood id `mood`. An unknown id fails before any
    /// state changes.
    pub fn start(&mut self, mood: &str) -> Result<()> {
        let mood: Mood = mood.parse()?;
        self.start_mood(mood);
        Ok(())
    }

    pub fn start_mood(&mut self, mood: Mood) {
        if self.state != EngineState::Idle {
            tracing::debug!(state = ?self.state, "restarting: tearing down previous bed");
            self.teardown();
        }
        self.state = EngineState::Starting;
        self.ensure_running();
        self.graph.connect_destination();

        self.sequencer.reset();
        self.beat = 0;
        self.bed_level = 1.0;

        let profile = mood.profile();
        self.profile = Some(profile);
        self.volume = profile.volume;

        let now = self.graph.current_time();
        let beat = profile.beat_seconds();
        self.graph.bed_cutoff.set_value(DEFAULT_BED_CUTOFF);

        match profile.bed {
            BedStrategy::DrumsAndNoise => {
                self.start_drone(profile, now);
                self.start_noise(now);
                let handle = self.timers.every(BedTask::Beat, now, beat);
                self.bed_timers.push(handle);
            }
            BedStrategy::ChordProgression => {
                let handle = self.timers.every(BedTask::Chord, now, beat * 4.0);
                self.bed_timers.push(handle);
            }
            BedStrategy::MidiBass => {
                let handle = self.timers.every(BedTask::Bass, now, beat * 8.0);
                self.bed_timers.push(handle);
            }
            BedStrategy::MelodyOnly => {}
        }

        self.graph.master.set_value_at_time(0.0, now);
        self.graph
            .master
            .linear_ramp_to(profile.volume, now, FADE_IN_SECONDS);
        self.fade_in_until = now + FADE_IN_SECONDS;

        self.state = EngineState::Playing;
        tracing::info!(mood = %mood.as_str(), bed = ?profile.bed, tempo = profile.tempo, "engine started");
    }

    /// Begin the fade-out. Timers are cancelled now; nodes are torn down and
    /// the engine returns to `Idle` once the fade has rendered.
    pub fn stop(&mut self) {
        if matches!(self.state, EngineState::Idle | EngineState::Stopping) {
            tracing::debug!(state = ?self.state, "stop ignored");
            return;
        }
        self.cancel_bed_timers();

        let now = self.graph.current_time();
        for voice in self.graph.voices_mut(NodeRole::Chord) {
            if let Some(gain) = voice.gain_mut() {
                gain.linear_ramp_to(0.0, now, CHORD_FADE_OUT_SECONDS);
            }
        }
        self.graph
            .stop_role(NodeRole::Chord, now + CHORD_FADE_OUT_SECONDS);
        self.graph.stop_role(NodeRole::Noise, now);

        self.graph
            .master
            .exponential_ramp_to(0.0, now, FADE_OUT_SECONDS);
        self.fade_out_frame = Some(self.graph.time_to_frame(now + FADE_OUT_SECONDS));
        self.state = EngineState::Stopping;
        tracing::info!("engine stopping");
    }

    /// Clamp to [0, 1] and ramp the master there. During the start fade-in
    /// the ramp lands where the fade-in would have.
    pub fn set_volume(&mut self, volume: f64) {
        if !volume.is_finite() {
            tracing::warn!(volume, "ignoring non-finite volume");
            return;
        }
        self.volume = volume.clamp(0.0, 1.0);
        if self.state == EngineState::Stopping {
            // Keep the fade-out; the new volume applies on the next start.
            return;
        }
        let now = self.graph.current_time();
        let ramp = (self.fade_in_until - now).max(VOLUME_RAMP_SECONDS);
        self.graph.master.linear_ramp_to(self.volume, now, ramp);
    }

    /// Push rhythm-derived targets into the running bed. Returns false when
    /// nothing is playing.
    pub fn apply_modulation(&mut self, modulation: RhythmModulation) -> bool {
        if self.state != EngineState::Playing {
            return false;
        }
        let now = self.graph.current_time();
        self.graph.bed_cutoff.linear_ramp_to(
            modulation.filter_cutoff,
            now,
            MODULATION_RAMP_SECONDS,
        );
        for (voice, ratio) in self.graph.voices_mut(NodeRole::Drone).zip(DRONE_RATIOS) {
            if let Some(freq) = voice.frequency_mut() {
                freq.linear_ramp_to(
                    modulation.drone_frequency * ratio,
                    now,
                    MODULATION_RAMP_SECONDS,
                );
            }
        }
        self.bed_level = modulation.envelope_scale.clamp(0.0, 1.0);
        tracing::debug!(
            cutoff = modulation.filter_cutoff,
            drone = modulation.drone_frequency,
            scale = self.bed_level,
            "modulation applied"
        );
        true
    }

    /// Play one keystroke note: the fundamental plus one quieter partial per
    /// harmonic, all starting on the same frame. Never fails; problems are
    /// logged and the note is dropped.
    pub fn play_instrument_note(&mut self, request: NoteRequest) -> Option<PlayedNote> {
        self.ensure_running();

        let strategy = self
            .profile
            .map_or(SequencerStrategy::default(), |p| p.sequencer);
        let mut frequency = self.sequencer.next_note(strategy);
        if request.accessibility {
            frequency = apply_accessibility_frequency(frequency);
        }

        let instrument = request.instrument.config();
        if !frequency.is_finite() || frequency <= 0.0 || !request.velocity.is_finite() {
            tracing::warn!(
                instrument = %request.instrument,
                frequency,
                velocity = request.velocity,
                "dropping note with invalid parameters"
            );
            return None;
        }

        let velocity = request.velocity.clamp(0.0, 1.0);
        let duration = if request.duration.is_finite() {
            request.duration.max(0.0)
        } else {
            DEFAULT_NOTE_DURATION
        };
        let nyquist = self.graph.sample_rate() / 2.0;
        let peak = velocity * instrument.base_volume;
        let partials: Vec<(f64, f64)> = std::iter::once((frequency, peak))
            .chain(instrument.harmonics.iter().enumerate().map(|(i, mult)| {
                (frequency * mult, peak * HARMONIC_GAIN / (i as f64 + 2.0))
            }))
            .filter(|(f, _)| *f < nyquist)
            .collect();

        if partials.len() > self.graph.note_capacity() {
            tracing::warn!(
                instrument = %request.instrument,
                live = self.graph.count_role(NodeRole::Note),
                max = self.config.max_voices,
                "voice limit reached, dropping note"
            );
            return None;
        }

        // The release must reach zero by the stop time, so a release longer
        // than the sustain is shortened to fit inside it.
        let env = Adsr {
            release: instrument.envelope.release.min(duration),
            ..instrument.envelope
        };
        let start = self.graph.current_time();
        let stop = start + env.attack + env.decay + duration;
        let release_frame = self.graph.time_to_frame(stop - env.release);
        let sample_rate = self.graph.sample_rate();

        for &(freq, gain) in &partials {
            let voice = Voice::enveloped(instrument.waveform, freq, env, gain, release_frame, sample_rate);
            self.graph
                .add(NodeRole::Note, Bus::Notes, start, Some(stop), Source::Tone(voice));
        }

        tracing::trace!(
            instrument = %request.instrument,
            frequency,
            velocity,
            partials = partials.len(),
            "note scheduled"
        );
        Some(PlayedNote {
            instrument: request.instrument,
            frequency,
            velocity,
            start_time: start,
            stop_time: stop,
            oscillators: partials.len(),
        })
    }

    /// Render the next `out.len()` mono frames.
    pub fn render(&mut self, out: &mut [f32]) {
        if self.graph.state() == ContextState::Suspended {
            out.fill(0.0);
            return;
        }
        let block = self.config.block_size;
        for chunk in out.chunks_mut(block) {
            let block_start = self.graph.current_time();
            let block_end = block_start + chunk.len() as f64 / self.graph.sample_rate();
            while let Some(fired) = self.timers.pop_due(block_end) {
                self.fire(fired.kind, fired.due.max(block_start));
            }

            self.graph.render(chunk);

            if self
                .fade_out_frame
                .is_some_and(|f| self.graph.current_frame() >= f)
            {
                self.teardown();
                tracing::info!("engine idle");
            }
        }
    }

    /// Render `frames` frames into a new buffer.
    pub fn render_frames(&mut self, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0; frames];
        self.render(&mut out);
        out
    }

    fn ensure_running(&mut self) {
        if self.graph.resume() {
            tracing::info!("audio context resumed");
        }
    }

    fn cancel_bed_timers(&mut self) {
        for handle in self.bed_timers.drain(..) {
            self.timers.cancel(handle);
        }
    }

    /// Drop every node and timer immediately and return to `Idle`.
    fn teardown(&mut self) {
        self.cancel_bed_timers();
        self.timers.cancel_all();
        self.graph.disconnect_all();
        self.graph.master.set_value(0.0);
        self.fade_in_until = 0.0;
        self.fade_out_frame = None;
        self.profile = None;
        self.sequencer.reset();
        self.state = EngineState::Idle;
    }

    fn fire(&mut self, task: BedTask, at: f64) {
        match task {
            BedTask::Beat => self.play_beat(at),
            BedTask::Chord => self.play_chord(at),
            BedTask::Bass => self.play_bass(at),
        }
    }

    fn start_drone(&mut self, profile: &MoodProfile, now: f64) {
        let sample_rate = self.graph.sample_rate();
        for ratio in DRONE_RATIOS {
            let freq = profile.base_frequency * ratio;
            let mut gain = AudioParam::new(0.0);
            gain.linear_ramp_to(DRONE_LEVEL, now, DRONE_FADE_SECONDS);
            let voice = Voice::automated(profile.waveform, freq, gain, sample_rate)
                .with_frequency_param(AudioParam::new(freq));
            self.graph
                .add(NodeRole::Drone, Bus::Bed, now, None, Source::Tone(voice));
        }
    }

    fn start_noise(&mut self, now: f64) {
        let sample_rate = self.graph.sample_rate();
        let len = (NOISE_LOOP_SECONDS * sample_rate) as usize;
        let buffer = pink_noise_buffer(len, &mut self.rng);
        let source = Source::noise_bed(buffer, NOISE_CUTOFF_HZ, NOISE_LEVEL, sample_rate);
        self.graph.add(NodeRole::Noise, Bus::Bed, now, None, source);
    }

    fn play_beat(&mut self, at: f64) {
        let sample_rate = self.graph.sample_rate();
        for &kind in DrumKind::pattern(self.beat) {
            let rng = StdRng::seed_from_u64(self.rng.next_u64());
            let voice = DrumVoice::new(kind, self.bed_level, sample_rate, rng);
            self.graph.add(
                NodeRole::Drum,
                Bus::Bed,
                at,
                Some(at + kind.duration()),
                Source::Drum(voice),
            );
        }
        tracing::debug!(beat = self.beat, at, "beat");
        self.beat += 1;
    }

    fn play_chord(&mut self, at: f64) {
        let Some(profile) = self.profile else {
            return;
        };
        for voice in self.graph.voices_mut(NodeRole::Chord) {
            if let Some(gain) = voice.gain_mut() {
                gain.linear_ramp_to(0.0, at, CHORD_FADE_OUT_SECONDS);
            }
        }
        self.graph
            .stop_role(NodeRole::Chord, at + CHORD_FADE_OUT_SECONDS);

        let chord = self.sequencer.chord_tick();
        let sample_rate = self.graph.sample_rate();
        let level = CHORD_LEVEL * self.bed_level;
        for &midi in &chord.voicing {
            let mut gain = AudioParam::new(0.0);
            gain.linear_ramp_to(level, at, CHORD_FADE_IN_SECONDS);
            let voice = Voice::automated(profile.waveform, note_hz(midi), gain, sample_rate);
            self.graph
                .add(NodeRole::Chord, Bus::Bed, at, None, Source::Tone(voice));
        }
        tracing::debug!(chord = chord.name, at, "chord change");
    }

    fn play_bass(&mut self, at: f64) {
        let Some(profile) = self.profile else {
            return;
        };
        let freq = self.sequencer.next_bass();
        let length = profile.beat_seconds() * 8.0;
        let hold = (length - BASS_ENVELOPE.release).max(BASS_ENVELOPE.attack + BASS_ENVELOPE.decay);
        let release_frame = self.graph.time_to_frame(at + hold);
        let voice = Voice::enveloped(
            profile.waveform,
            freq,
            BASS_ENVELOPE,
            BASS_LEVEL * self.bed_level,
            release_frame,
            self.graph.sample_rate(),
        );
        self.graph.add(
            NodeRole::Bass,
            Bus::Bed,
            at,
            Some(at + length),
            Source::Tone(voice),
        );
        tracing::debug!(frequency = freq, at, "bass note");
    }
}
