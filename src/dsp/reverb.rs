//! Room reverb for the instrument-note bus: Schroeder/Freeverb style.
//!
//! Parallel damped comb filters followed by series allpass filters. Mono in,
//! mono out; the engine only needs a sense of space behind the notes.

#[derive(Debug, Clone)]
struct CombFilter {
    buffer: Vec<f64>,
    index: usize,
    feedback: f64,
    damp: f64,
    store: f64,
}

impl CombFilter {
    fn new(size: usize) -> Self {
        CombFilter {
            buffer: vec![0.0; size.max(1)],
            index: 0,
            feedback: 0.84,
            damp: 0.2,
            store: 0.0,
        }
    }

    #[inline]
    fn process(&mut self, input: f64) -> f64 {
        let output = self.buffer[self.index];
        // One-pole lowpass in the feedback path.
        self.store = output * (1.0 - self.damp) + self.store * self.damp;
        self.buffer[self.index] = input + self.store * self.feedback;
        self.index = (self.index + 1) % self.buffer.len();
        output
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.store = 0.0;
    }
}

#[derive(Debug, Clone)]
struct AllpassFilter {
    buffer: Vec<f64>,
    index: usize,
}

impl AllpassFilter {
    fn new(size: usize) -> Self {
        AllpassFilter {
            buffer: vec![0.0; size.max(1)],
            index: 0,
        }
    }

    #[inline]
    fn process(&mut self, input: f64) -> f64 {
        let delayed = self.buffer[self.index];
        self.buffer[self.index] = input + delayed * 0.5;
        self.index = (self.index + 1) % self.buffer.len();
        delayed - input
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
    }
}

// Delay lengths in samples at 44.1 kHz.
const COMB_TUNING: [usize; 8] = [1116, 1188, 1277, 1356, 1422, 1491, 1557, 1617];
const ALLPASS_TUNING: [usize; 4] = [556, 441, 341, 225];
const INPUT_GAIN: f64 = 0.015;

#[derive(Debug, Clone)]
pub struct Reverb {
    combs: Vec<CombFilter>,
    allpasses: Vec<AllpassFilter>,
    /// Room size (0.0 to 1.0). Affects decay time.
    room_size: f64,
    /// Damping (0.0 to 1.0). Higher = darker.
    damping: f64,
    /// Dry/wet mix (0.0 = fully dry, 1.0 = fully wet).
    pub mix: f64,
}

impl Reverb {
    pub fn new(sample_rate: f64, room_size: f64, damping: f64, mix: f64) -> Self {
        let scale = sample_rate / 44100.0;
        let scaled = |t: usize| ((t as f64) * scale) as usize;
        let mut reverb = Reverb {
            combs: COMB_TUNING.iter().map(|&t| CombFilter::new(scaled(t))).collect(),
            allpasses: ALLPASS_TUNING.iter().map(|&t| AllpassFilter::new(scaled(t))).collect(),
            room_size: room_size.clamp(0.0, 1.0),
            damping: damping.clamp(0.0, 1.0),
            mix: mix.clamp(0.0, 1.0),
        };
        reverb.update_parameters();
        reverb
    }

    fn update_parameters(&mut self) {
        let feedback = self.room_size * 0.28 + 0.7;
        for comb in &mut self.combs {
            comb.feedback = feedback;
            comb.damp = self.damping;
        }
    }

    /// Process one sample, returning the dry/wet blend.
    #[inline]
    pub fn process(&mut self, input: f64) -> f64 {
        let fed = input * INPUT_GAIN;
        let mut wet: f64 = self.combs.iter_mut().map(|c| c.process(fed)).sum();
        for allpass in &mut self.allpasses {
            wet = allpass.process(wet);
        }
        input * (1.0 - self.mix) + wet * self.mix
    }

    /// Clear the tail.
    pub fn clear(&mut self) {
        self.combs.iter_mut().for_each(CombFilter::clear);
        self.allpasses.iter_mut().for_each(AllpassFilter::clear);
    }
}
