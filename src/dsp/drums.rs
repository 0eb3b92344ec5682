//! One-shot drum voices for the beat loop: kick, snare, hi-hat.

use std::f64::consts::PI;

use rand::rngs::StdRng;

use super::filter::{BiquadFilter, FilterType};
use super::noise::white;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrumKind {
    Kick,
    Snare,
    HiHat,
}

impl DrumKind {
    /// Length of the hit in seconds.
    pub fn duration(self) -> f64 {
        match self {
            DrumKind::Kick => 0.5,
            DrumKind::Snare => 0.2,
            DrumKind::HiHat => 0.05,
        }
    }

    fn gain(self) -> f64 {
        match self {
            DrumKind::Kick => 0.8,
            DrumKind::Snare => 0.35,
            DrumKind::HiHat => 0.12,
        }
    }

    /// Which drums sound on `beat` of a 4/4 bar (0-based): kick on 1 and 3,
    /// snare on 2 and 4, hi-hat on every beat.
    pub fn pattern(beat: u64) -> &'static [DrumKind] {
        match beat % 4 {
            0 | 2 => &[DrumKind::Kick, DrumKind::HiHat],
            _ => &[DrumKind::Snare, DrumKind::HiHat],
        }
    }
}

/// A single synthesized drum hit.
#[derive(Debug, Clone)]
pub struct DrumVoice {
    kind: DrumKind,
    sample_rate: f64,
    total_samples: usize,
    generated: usize,
    phase: f64,
    filter: Option<BiquadFilter>,
    rng: StdRng,
    level: f64,
}

impl DrumVoice {
    /// `level` scales the drum's own gain; `rng` feeds its noise component.
    pub fn new(kind: DrumKind, level: f64, sample_rate: f64, rng: StdRng) -> Self {
        let filter = match kind {
            DrumKind::Kick => None,
            DrumKind::Snare => Some(BiquadFilter::with_params(
                FilterType::Bandpass,
                1800.0,
                0.8,
                sample_rate,
            )),
            DrumKind::HiHat => Some(BiquadFilter::with_params(
                FilterType::Highpass,
                7000.0,
                0.707,
                sample_rate,
            )),
        };
        DrumVoice {
            kind,
            sample_rate,
            total_samples: (kind.duration() * sample_rate) as usize,
            generated: 0,
            phase: 0.0,
            filter,
            rng,
            level,
        }
    }

    pub fn next_sample(&mut self) -> f64 {
        if self.is_finished() {
            return 0.0;
        }
        let t = self.generated as f64 / self.sample_rate;
        self.generated += 1;

        let raw = match self.kind {
            DrumKind::Kick => {
                // Exponential pitch drop 150 Hz -> 45 Hz over 100 ms.
                let freq = 150.0 * (0.3_f64).powf((t / 0.1).min(1.0));
                self.phase = (self.phase + freq / self.sample_rate).fract();
                (self.phase * 2.0 * PI).sin() * (-8.0 * t).exp()
            }
            DrumKind::Snare => {
                let noise = white(&mut self.rng);
                let body = (2.0 * PI * 180.0 * t).sin() * 0.4;
                let filtered = self.filter.as_mut().map_or(noise, |f| f.process(noise));
                (filtered + body) * (-20.0 * t).exp()
            }
            DrumKind::HiHat => {
                let noise = white(&mut self.rng);
                let filtered = self.filter.as_mut().map_or(noise, |f| f.process(noise));
                filtered * (1.0 - t / self.kind.duration()).max(0.0).powi(3)
            }
        };
        raw * self.kind.gain() * self.level
    }

    pub fn is_finished(&self) -> bool {
        self.generated >= self.total_samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn render(kind: DrumKind) -> Vec<f64> {
        let mut v = DrumVoice::new(kind, 1.0, 44100.0, StdRng::seed_from_u64(1));
        let mut out = Vec::new();
        while !v.is_finished() {
            out.push(v.next_sample());
        }
        out
    }

    #[test]
    fn pattern_is_kick_snare_with_hats() {
        assert_eq!(DrumKind::pattern(0), &[DrumKind::Kick, DrumKind::HiHat]);
        assert_eq!(DrumKind::pattern(1), &[DrumKind::Snare, DrumKind::HiHat]);
        assert_eq!(DrumKind::pattern(2), &[DrumKind::Kick, DrumKind::HiHat]);
        assert_eq!(DrumKind::pattern(3), &[DrumKind::Snare, DrumKind::HiHat]);
        assert_eq!(DrumKind::pattern(4), DrumKind::pattern(0));
    }

    #[test]
    fn hits_have_expected_length() {
        for kind in [DrumKind::Kick, DrumKind::Snare, DrumKind::HiHat] {
            let out = render(kind);
            assert_eq!(out.len(), (kind.duration() * 44100.0) as usize);
            assert!(out.iter().any(|s| s.abs() > 0.001), "{kind:?} is silent");
            assert!(out.iter().all(|s| s.is_finite() && s.abs() < 2.0));
        }
    }

    #[test]
    fn kick_decays() {
        let out = render(DrumKind::Kick);
        let head = out[..2205].iter().fold(0.0_f64, |m, s| m.max(s.abs()));
        let tail = out[out.len() - 2205..].iter().fold(0.0_f64, |m, s| m.max(s.abs()));
        assert!(tail < head * 0.1, "head {head}, tail {tail}");
    }

    #[test]
    fn finished_voice_is_silent() {
        let mut v = DrumVoice::new(DrumKind::HiHat, 1.0, 44100.0, StdRng::seed_from_u64(1));
        while !v.is_finished() {
            v.next_sample();
        }
        assert_eq!(v.next_sample(), 0.0);
    }
}
