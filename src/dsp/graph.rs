//! Audio graph: the single output context the engine owns.
//!
//! Holds the audio clock, the master gain, two buses (the ambient bed,
//! which runs through a lowpass filter, and the note bus, which runs
//! through the room reverb) and the set of live source nodes. Every node
//! has a start frame and an optional stop frame and is dropped from the set
//! once it has stopped or finished; [`AudioGraph::disconnect_all`] tears
//! everything down at once.

use super::drums::DrumVoice;
use super::filter::{BiquadFilter, FilterType};
use super::mixer::{Mixer, soft_clip};
use super::noise::NoiseLoop;
use super::param::AudioParam;
use super::reverb::Reverb;
use super::voice::Voice;

/// Bed lowpass cutoff before any rhythm modulation, in Hz.
pub const DEFAULT_BED_CUTOFF: f64 = 1_800.0;

/// Suspend/resume state of the context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// Clock frozen, output silent (autoplay policy before a user gesture).
    Suspended,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bus {
    Bed,
    Notes,
}

/// What a node is for; lets the engine find and retire groups of nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    Note,
    Chord,
    Bass,
    Drone,
    Drum,
    Noise,
}

/// A sound source scheduled on the graph.
#[derive(Debug, Clone)]
pub enum Source {
    Tone(Voice),
    Drum(DrumVoice),
    Noise {
        noise: NoiseLoop,
        filter: BiquadFilter,
        gain: f64,
    },
}

impl Source {
    fn next_sample(&mut self, frame: u64, t: f64) -> f64 {
        match self {
            Source::Tone(v) => v.next_sample(frame, t),
            Source::Drum(d) => d.next_sample(),
            Source::Noise {
                noise,
                filter,
                gain,
            } => filter.process(noise.next_sample()) * *gain,
        }
    }

    fn is_finished(&self) -> bool {
        match self {
            Source::Tone(v) => v.is_finished(),
            Source::Drum(d) => d.is_finished(),
            Source::Noise { .. } => false,
        }
    }

    fn prune(&mut self, now: f64) {
        if let Source::Tone(v) = self {
            v.prune(now);
        }
    }

    /// Build a looping filtered noise bed.
    pub fn noise_bed(buffer: Vec<f64>, cutoff: f64, gain: f64, sample_rate: f64) -> Self {
        Source::Noise {
            noise: NoiseLoop::new(buffer),
            filter: BiquadFilter::with_params(FilterType::Lowpass, cutoff, 0.5, sample_rate),
            gain,
        }
    }
}

#[derive(Debug, Clone)]
struct Node {
    role: NodeRole,
    bus: Bus,
    start_frame: u64,
    stop_frame: u64,
    source: Source,
}

#[derive(Debug, Clone)]
pub struct AudioGraph {
    sample_rate: f64,
    state: ContextState,
    frame: u64,
    connected: bool,
    /// Master output gain.
    pub master: AudioParam,
    /// Cutoff of the bed-bus lowpass.
    pub bed_cutoff: AudioParam,
    bed_filter: BiquadFilter,
    reverb: Reverb,
    nodes: Vec<Node>,
    max_note_nodes: usize,
    bed_mix: Mixer,
    note_mix: Mixer,
}

impl AudioGraph {
    pub fn new(sample_rate: f64, reverb_mix: f64, max_note_nodes: usize, master_gain: f64) -> Self {
        AudioGraph {
            sample_rate,
            state: ContextState::Suspended,
            frame: 0,
            connected: false,
            master: AudioParam::new(master_gain),
            bed_cutoff: AudioParam::new(DEFAULT_BED_CUTOFF),
            bed_filter: BiquadFilter::with_params(
                FilterType::Lowpass,
                DEFAULT_BED_CUTOFF,
                0.707,
                sample_rate,
            ),
            reverb: Reverb::new(sample_rate, 0.6, 0.4, reverb_mix),
            nodes: Vec::new(),
            max_note_nodes,
            bed_mix: Mixer::new(),
            note_mix: Mixer::new(),
        }
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    /// Resume a suspended context. Returns true if the state changed.
    pub fn resume(&mut self) -> bool {
        let changed = self.state == ContextState::Suspended;
        self.state = ContextState::Running;
        changed
    }

    pub fn suspend(&mut self) {
        self.state = ContextState::Suspended;
    }

    /// (Re)attach the master gain to the output; idempotent.
    pub fn connect_destination(&mut self) {
        self.connected = true;
    }

    /// Audio clock in seconds.
    pub fn current_time(&self) -> f64 {
        self.frame as f64 / self.sample_rate
    }

    pub fn current_frame(&self) -> u64 {
        self.frame
    }

    pub fn time_to_frame(&self, t: f64) -> u64 {
        (t.max(0.0) * self.sample_rate).round() as u64
    }

    /// Free slots for note-bus voices.
    pub fn note_capacity(&self) -> usize {
        let used = self.count_role(NodeRole::Note);
        self.max_note_nodes.saturating_sub(used)
    }

    /// Schedule a source to start at `start` and (optionally) stop at `stop`.
    pub fn add(
        &mut self,
        role: NodeRole,
        bus: Bus,
        start: f64,
        stop: Option<f64>,
        source: Source,
    ) {
        let start_frame = self.time_to_frame(start).max(self.frame);
        let stop_frame = stop.map_or(u64::MAX, |t| self.time_to_frame(t));
        self.nodes.push(Node {
            role,
            bus,
            start_frame,
            stop_frame,
            source,
        });
    }

    /// Stop every node with `role` at `t`.
    pub fn stop_role(&mut self, role: NodeRole, t: f64) {
        let frame = self.time_to_frame(t);
        for node in self.nodes.iter_mut().filter(|n| n.role == role) {
            node.stop_frame = node.stop_frame.min(frame);
        }
    }

    /// Tone voices with `role` that have not been scheduled to stop, in
    /// insertion order.
    pub fn voices_mut(&mut self, role: NodeRole) -> impl Iterator<Item = &mut Voice> + '_ {
        self.nodes
            .iter_mut()
            .filter(move |n| n.role == role && n.stop_frame == u64::MAX)
            .filter_map(|n| match &mut n.source {
                Source::Tone(v) => Some(v),
                _ => None,
            })
    }

    /// Stop and drop every node immediately and clear effect tails.
    pub fn disconnect_all(&mut self) {
        self.nodes.clear();
        self.reverb.clear();
        self.bed_filter.reset();
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn count_role(&self, role: NodeRole) -> usize {
        self.nodes.iter().filter(|n| n.role == role).count()
    }

    /// Render the next `out.len()` frames. A suspended context writes
    /// silence and leaves the clock where it is.
    pub fn render(&mut self, out: &mut [f32]) {
        if self.state == ContextState::Suspended {
            out.fill(0.0);
            return;
        }

        let n = out.len();
        let start = self.frame;
        let end = start + n as u64;
        let sr = self.sample_rate;

        self.bed_mix.clear(n);
        self.note_mix.clear(n);
        self.bed_filter
            .set_frequency(self.bed_cutoff.value_at(start as f64 / sr));

        for node in &mut self.nodes {
            if node.start_frame >= end || node.stop_frame <= start {
                continue;
            }
            let from = node.start_frame.max(start);
            let to = node.stop_frame.min(end);
            let mix = match node.bus {
                Bus::Bed => &mut self.bed_mix,
                Bus::Notes => &mut self.note_mix,
            };
            for frame in from..to {
                let s = node.source.next_sample(frame, frame as f64 / sr);
                mix.add((frame - start) as usize, s);
            }
        }

        let bed = self.bed_mix.samples();
        let notes = self.note_mix.samples();
        for (i, slot) in out.iter_mut().enumerate() {
            let t = (start + i as u64) as f64 / sr;
            let dry = self.bed_filter.process(bed[i]) + self.reverb.process(notes[i]);
            let gain = if self.connected { self.master.value_at(t) } else { 0.0 };
            *slot = soft_clip(dry * gain) as f32;
        }

        self.frame = end;
        self.nodes
            .retain(|n| n.stop_frame > end && !n.source.is_finished());
        let now = self.current_time();
        self.master.prune(now);
        self.bed_cutoff.prune(now);
        for node in &mut self.nodes {
            node.source.prune(now);
        }
    }

    /// Start frame and peak gain of each tone with `role`.
    #[cfg(test)]
    pub(crate) fn scheduled_tones(&self, role: NodeRole) -> Vec<(u64, f64)> {
        self.nodes
            .iter()
            .filter(|n| n.role == role)
            .filter_map(|n| match &n.source {
                Source::Tone(v) => Some((n.start_frame, v.velocity)),
                _ => None,
            })
            .collect()
    }

    /// Automation segments held by each tone with `role`.
    #[cfg(test)]
    pub(crate) fn automation_depth(&self, role: NodeRole) -> Vec<usize> {
        self.nodes
            .iter()
            .filter(|n| n.role == role)
            .filter_map(|n| match &n.source {
                Source::Tone(v) => Some(v.automation_depth()),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::oscillator::Waveform;
    use crate::instrument::Adsr;

    const SR: f64 = 44100.0;

    fn running_graph() -> AudioGraph {
        let mut g = AudioGraph::new(SR, 0.0, 8, 1.0);
        g.resume();
        g.connect_destination();
        g
    }

    fn tone(gain: f64) -> Source {
        Source::Tone(Voice::automated(Waveform::Sine, 440.0, AudioParam::new(gain), SR))
    }

    fn peak(buf: &[f32]) -> f32 {
        buf.iter().fold(0.0_f32, |m, s| m.max(s.abs()))
    }

    #[test]
    fn suspended_context_is_silent_and_frozen() {
        let mut g = AudioGraph::new(SR, 0.0, 8, 1.0);
        g.connect_destination();
        g.add(NodeRole::Drone, Bus::Notes, 0.0, None, tone(0.5));
        let mut out = vec![1.0_f32; 256];
        g.render(&mut out);
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(g.current_frame(), 0);
        assert!(g.resume());
        assert!(!g.resume());
    }

    #[test]
    fn disconnected_master_is_silent() {
        let mut g = AudioGraph::new(SR, 0.0, 8, 1.0);
        g.resume();
        g.add(NodeRole::Drone, Bus::Notes, 0.0, None, tone(0.5));
        let mut out = vec![0.0_f32; 256];
        g.render(&mut out);
        assert_eq!(peak(&out), 0.0);
        g.connect_destination();
        g.render(&mut out);
        assert!(peak(&out) > 0.1);
    }

    #[test]
    fn node_starts_at_its_frame() {
        let mut g = running_graph();
        g.add(NodeRole::Drone, Bus::Notes, 64.0 / SR, None, tone(0.5));
        let mut out = vec![0.0_f32; 128];
        g.render(&mut out);
        assert!(out[..64].iter().all(|&s| s == 0.0));
        assert!(peak(&out[64..]) > 0.0);
    }

    #[test]
    fn stopped_nodes_are_retired() {
        let mut g = running_graph();
        g.add(NodeRole::Drum, Bus::Bed, 0.0, Some(100.0 / SR), tone(0.5));
        g.add(NodeRole::Drone, Bus::Bed, 0.0, None, tone(0.5));
        assert_eq!(g.node_count(), 2);
        let mut out = vec![0.0_f32; 128];
        g.render(&mut out);
        assert_eq!(g.node_count(), 1);
        assert_eq!(g.count_role(NodeRole::Drone), 1);
    }

    #[test]
    fn finished_envelopes_are_retired() {
        let mut g = running_graph();
        let v = Voice::enveloped(Waveform::Sine, 440.0, Adsr::new(0.001, 0.001, 0.5, 0.001), 0.5, 100, SR);
        g.add(NodeRole::Note, Bus::Notes, 0.0, None, Source::Tone(v));
        let mut out = vec![0.0_f32; 1024];
        g.render(&mut out);
        assert_eq!(g.node_count(), 0);
    }

    #[test]
    fn stop_role_and_disconnect_all() {
        let mut g = running_graph();
        for _ in 0..3 {
            g.add(NodeRole::Chord, Bus::Bed, 0.0, None, tone(0.1));
        }
        g.add(NodeRole::Noise, Bus::Bed, 0.0, None, tone(0.1));
        assert_eq!(g.voices_mut(NodeRole::Chord).count(), 3);
        g.stop_role(NodeRole::Chord, 0.0);
        assert_eq!(g.voices_mut(NodeRole::Chord).count(), 0);
        let mut out = vec![0.0_f32; 128];
        g.render(&mut out);
        assert_eq!(g.node_count(), 1);
        g.disconnect_all();
        assert_eq!(g.node_count(), 0);
    }

    #[test]
    fn master_gain_ramp_is_applied() {
        let mut g = running_graph();
        g.master.set_value(0.0);
        g.master.linear_ramp_to(1.0, 0.0, 1.0);
        g.add(NodeRole::Drone, Bus::Notes, 0.0, None, tone(0.5));
        let mut first = vec![0.0_f32; 441];
        g.render(&mut first);
        let mut rest = vec![0.0_f32; 44100];
        g.render(&mut rest);
        assert!(peak(&first) < 0.01, "fade-in should start near silence");
        assert!(peak(&rest[43000..]) > 0.4);
    }

    #[test]
    fn note_capacity_counts_only_notes() {
        let mut g = running_graph();
        g.add(NodeRole::Drone, Bus::Bed, 0.0, None, tone(0.1));
        assert_eq!(g.note_capacity(), 8);
        g.add(NodeRole::Note, Bus::Notes, 0.0, None, tone(0.1));
        assert_eq!(g.note_capacity(), 7);
    }
}
