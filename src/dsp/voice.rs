//! Voice: one oscillator shaped by either an ADSR envelope or an
//! automated gain parameter.

use crate::instrument::Adsr;

use super::envelope::Envelope;
use super::oscillator::{Oscillator, Waveform};
use super::param::AudioParam;

/// What shapes the voice's amplitude.
#[derive(Debug, Clone)]
pub enum Amplitude {
    /// Gated ADSR; the gate drops at the voice's release sample.
    Envelope(Envelope),
    /// Gain automated on the audio clock (crossfades, fades).
    Automated(AudioParam),
}

/// A single voice. Frame positions are absolute graph frames.
#[derive(Debug, Clone)]
pub struct Voice {
    pub oscillator: Oscillator,
    amplitude: Amplitude,
    /// Optional glide source for the oscillator frequency.
    frequency: Option<AudioParam>,
    /// Peak gain applied on top of the amplitude shape.
    pub velocity: f64,
    /// Frame at which the envelope gate is released.
    pub release_frame: u64,
    released: bool,
    finished: bool,
}

impl Voice {
    /// ADSR-shaped note: sounds from its first rendered frame, releases at
    /// `release_frame`.
    pub fn enveloped(
        waveform: Waveform,
        frequency: f64,
        adsr: Adsr,
        velocity: f64,
        release_frame: u64,
        sample_rate: f64,
    ) -> Self {
        let mut envelope = Envelope::new(adsr, sample_rate);
        envelope.gate_on();
        Voice {
            oscillator: Oscillator::with_frequency(waveform, frequency, sample_rate),
            amplitude: Amplitude::Envelope(envelope),
            frequency: None,
            velocity,
            release_frame,
            released: false,
            finished: false,
        }
    }

    /// Voice whose gain follows `gain` on the audio clock.
    pub fn automated(waveform: Waveform, frequency: f64, gain: AudioParam, sample_rate: f64) -> Self {
        Voice {
            oscillator: Oscillator::with_frequency(waveform, frequency, sample_rate),
            amplitude: Amplitude::Automated(gain),
            frequency: None,
            velocity: 1.0,
            release_frame: u64::MAX,
            released: false,
            finished: false,
        }
    }

    /// Let the oscillator frequency follow an automated parameter.
    pub fn with_frequency_param(mut self, frequency: AudioParam) -> Self {
        self.frequency = Some(frequency);
        self
    }

    /// Automated gain, if this voice has one.
    pub fn gain_mut(&mut self) -> Option<&mut AudioParam> {
        match &mut self.amplitude {
            Amplitude::Automated(p) => Some(p),
            Amplitude::Envelope(_) => None,
        }
    }

    pub fn frequency_mut(&mut self) -> Option<&mut AudioParam> {
        self.frequency.as_mut()
    }

    /// Generate the sample for absolute `frame` at audio time `t`.
    pub fn next_sample(&mut self, frame: u64, t: f64) -> f64 {
        if self.finished {
            return 0.0;
        }
        if let Some(freq) = &self.frequency {
            self.oscillator.frequency = freq.value_at(t);
        }
        let osc = self.oscillator.next_sample();
        let amp = match &mut self.amplitude {
            Amplitude::Envelope(env) => {
                if !self.released && frame >= self.release_frame {
                    env.gate_off();
                    self.released = true;
                }
                let level = env.next_sample();
                if env.is_finished() {
                    self.finished = true;
                }
                level
            }
            Amplitude::Automated(gain) => gain.value_at(t),
        };
        osc * amp * self.velocity
    }

    /// Is this voice done (envelope finished after release)?
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Drop automation that finished before `now`.
    pub fn prune(&mut self, now: f64) {
        if let Some(freq) = &mut self.frequency {
            freq.prune(now);
        }
        if let Amplitude::Automated(gain) = &mut self.amplitude {
            gain.prune(now);
        }
    }

    #[cfg(test)]
    pub(crate) fn automation_depth(&self) -> usize {
        let gain = match &self.amplitude {
            Amplitude::Automated(p) => p.segment_count(),
            Amplitude::Envelope(_) => 0,
        };
        gain + self.frequency.as_ref().map_or(0, AudioParam::segment_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f64 = 44100.0;

    fn run(v: &mut Voice, frames: std::ops::Range<u64>) -> Vec<f64> {
        frames.map(|f| v.next_sample(f, f as f64 / SR)).collect()
    }

    #[test]
    fn voice_produces_sound() {
        let mut v = Voice::enveloped(
            Waveform::Triangle,
            440.0,
            Adsr::new(0.01, 0.1, 0.7, 0.3),
            0.8,
            u64::MAX,
            SR,
        );
        let out = run(&mut v, 0..4410);
        assert!(out.iter().any(|s| s.abs() > 0.001), "Voice should produce non-zero output");
    }

    #[test]
    fn voice_silent_after_release() {
        let mut v = Voice::enveloped(
            Waveform::Sine,
            440.0,
            Adsr::new(0.001, 0.001, 0.5, 0.01),
            1.0,
            500,
            SR,
        );
        run(&mut v, 0..2500);
        assert!(v.is_finished(), "Voice should be finished after release");
        assert_eq!(v.next_sample(2500, 2500.0 / SR), 0.0);
    }

    #[test]
    fn enveloped_output_bounded_by_velocity() {
        let mut v = Voice::enveloped(
            Waveform::Sine,
            880.0,
            Adsr::new(0.01, 0.1, 0.7, 0.3),
            0.5,
            22050,
            SR,
        );
        for s in run(&mut v, 0..44100) {
            assert!(s.abs() <= 0.5 + 1e-9, "output {s} exceeds velocity");
        }
    }

    #[test]
    fn automated_gain_follows_param() {
        let mut gain = AudioParam::new(0.0);
        gain.linear_ramp_to(1.0, 0.0, 0.5);
        let mut v = Voice::automated(Waveform::Sine, 440.0, gain, SR);
        let early = run(&mut v, 0..441).iter().fold(0.0_f64, |m, s| m.max(s.abs()));
        let late = run(&mut v, 22050..22491).iter().fold(0.0_f64, |m, s| m.max(s.abs()));
        assert!(early < 0.03, "early {early}");
        assert!(late > 0.9, "late {late}");
        assert!(!v.is_finished());
    }

    #[test]
    fn prune_forgets_finished_glides() {
        let mut freq = AudioParam::new(100.0);
        freq.linear_ramp_to(200.0, 0.0, 0.5);
        let mut gain = AudioParam::new(0.0);
        gain.linear_ramp_to(1.0, 0.0, 0.5);
        let mut v = Voice::automated(Waveform::Sine, 100.0, gain, SR).with_frequency_param(freq);
        assert_eq!(v.automation_depth(), 2);
        v.prune(0.25);
        assert_eq!(v.automation_depth(), 2);
        v.prune(1.0);
        assert_eq!(v.automation_depth(), 0);
        v.next_sample(44100, 1.0);
        assert!((v.oscillator.frequency - 200.0).abs() < 1e-9);
    }

    #[test]
    fn frequency_param_glides_oscillator() {
        let mut freq = AudioParam::new(100.0);
        freq.linear_ramp_to(200.0, 0.0, 1.0);
        let mut v = Voice::automated(Waveform::Sine, 100.0, AudioParam::new(1.0), SR)
            .with_frequency_param(freq);
        v.next_sample(22050, 0.5);
        assert!((v.oscillator.frequency - 150.0).abs() < 1e-9);
    }
}
