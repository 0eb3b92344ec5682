//! ADSR Envelope generator.
//!
//! Every moving stage is a linear segment from the level the stage started
//! at to its target, so a gate change mid-stage never jumps.

use crate::instrument::Adsr;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Stage {
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
}

#[derive(Debug, Clone)]
pub struct Envelope {
    adsr: Adsr,
    sample_rate: f64,
    stage: Stage,
    level: f64,
    from: f64,
    to: f64,
    length: usize,
    position: usize,
}

impl Envelope {
    /// Stage times are floored at zero and sustain clamped to [0, 1].
    pub fn new(adsr: Adsr, sample_rate: f64) -> Self {
        Envelope {
            adsr: Adsr::new(
                adsr.attack.max(0.0),
                adsr.decay.max(0.0),
                adsr.sustain.clamp(0.0, 1.0),
                adsr.release.max(0.0),
            ),
            sample_rate,
            stage: Stage::Idle,
            level: 0.0,
            from: 0.0,
            to: 0.0,
            length: 0,
            position: 0,
        }
    }

    /// Note on; retriggers from the current level.
    pub fn gate_on(&mut self) {
        self.enter(Stage::Attack, 1.0, self.adsr.attack);
    }

    /// Note off. Ignored while idle.
    pub fn gate_off(&mut self) {
        if self.stage != Stage::Idle {
            self.enter(Stage::Release, 0.0, self.adsr.release);
        }
    }

    /// Next envelope level in [0, 1].
    pub fn next_sample(&mut self) -> f64 {
        match self.stage {
            Stage::Idle => self.level = 0.0,
            Stage::Sustain => self.level = self.adsr.sustain,
            Stage::Attack | Stage::Decay | Stage::Release => {
                if self.position < self.length {
                    let t = self.position as f64 / self.length as f64;
                    self.level = self.from + (self.to - self.from) * t;
                    self.position += 1;
                }
                if self.position >= self.length {
                    self.level = self.to;
                    self.finish_stage();
                }
            }
        }
        self.level
    }

    pub fn is_finished(&self) -> bool {
        self.stage == Stage::Idle
    }

    fn enter(&mut self, stage: Stage, target: f64, seconds: f64) {
        self.stage = stage;
        self.from = self.level;
        self.to = target;
        self.length = (seconds * self.sample_rate) as usize;
        self.position = 0;
    }

    fn finish_stage(&mut self) {
        match self.stage {
            Stage::Attack => self.enter(Stage::Decay, self.adsr.sustain, self.adsr.decay),
            Stage::Decay => self.stage = Stage::Sustain,
            Stage::Release => self.stage = Stage::Idle,
            Stage::Idle | Stage::Sustain => {}
        }
    }
}
