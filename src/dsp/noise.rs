//! White and pink noise sources.

use rand::Rng;
use rand::rngs::StdRng;

/// Uniform white noise in [-1, 1).
pub fn white<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    rng.r#gen::<f64>() * 2.0 - 1.0
}

/// Pink (-3 dB/octave) noise using Paul Kellet's refined filter bank.
#[derive(Debug, Clone, Default)]
pub struct PinkFilter {
    b: [f64; 7],
}

impl PinkFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shape one white sample into pink noise, roughly within [-1, 1].
    pub fn process(&mut self, white: f64) -> f64 {
        let b = &mut self.b;
        b[0] = 0.99886 * b[0] + white * 0.0555179;
        b[1] = 0.99332 * b[1] + white * 0.0750759;
        b[2] = 0.96900 * b[2] + white * 0.1538520;
        b[3] = 0.86650 * b[3] + white * 0.3104856;
        b[4] = 0.55000 * b[4] + white * 0.5329522;
        b[5] = -0.7616 * b[5] - white * 0.0168980;
        let out = b[0] + b[1] + b[2] + b[3] + b[4] + b[5] + b[6] + white * 0.5362;
        b[6] = white * 0.115926;
        out * 0.11
    }
}

/// Render `len` samples of pink noise.
pub fn pink_noise_buffer(len: usize, rng: &mut StdRng) -> Vec<f64> {
    let mut filter = PinkFilter::new();
    (0..len).map(|_| filter.process(white(rng))).collect()
}

/// A pre-rendered buffer played on an endless loop.
#[derive(Debug, Clone)]
pub struct NoiseLoop {
    buffer: Vec<f64>,
    position: usize,
}

impl NoiseLoop {
    pub fn new(buffer: Vec<f64>) -> Self {
        NoiseLoop {
            buffer,
            position: 0,
        }
    }

    pub fn next_sample(&mut self) -> f64 {
        if self.buffer.is_empty() {
            return 0.0;
        }
        let s = self.buffer[self.position];
        self.position = (self.position + 1) % self.buffer.len();
        s
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn white_noise_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..10_000 {
            let s = white(&mut rng);
            assert!((-1.0..1.0).contains(&s));
        }
    }

    #[test]
    fn pink_noise_is_bounded_and_not_silent() {
        let mut rng = StdRng::seed_from_u64(7);
        let buf = pink_noise_buffer(44_100, &mut rng);
        let peak = buf.iter().fold(0.0_f64, |m, s| m.max(s.abs()));
        assert!(peak > 0.05, "pink noise too quiet: {peak}");
        assert!(peak < 1.5, "pink noise too loud: {peak}");
    }

    #[test]
    fn pink_noise_has_less_high_frequency_energy_than_white() {
        // Mean absolute first difference tracks high-frequency content.
        let mut rng = StdRng::seed_from_u64(3);
        let white_buf: Vec<f64> = (0..20_000).map(|_| white(&mut rng)).collect();
        let pink_buf = pink_noise_buffer(20_000, &mut rng);
        let rough = |b: &[f64]| {
            let rms = (b.iter().map(|s| s * s).sum::<f64>() / b.len() as f64).sqrt();
            b.windows(2).map(|w| (w[1] - w[0]).abs()).sum::<f64>() / b.len() as f64 / rms
        };
        assert!(rough(&pink_buf) < rough(&white_buf));
    }

    #[test]
    fn loop_wraps() {
        let mut l = NoiseLoop::new(vec![0.1, 0.2, 0.3]);
        let out: Vec<f64> = (0..5).map(|_| l.next_sample()).collect();
        assert_eq!(out, vec![0.1, 0.2, 0.3, 0.1, 0.2]);
        assert_eq!(NoiseLoop::new(Vec::new()).next_sample(), 0.0);
    }

    #[test]
    fn seeded_buffers_are_reproducible() {
        let a = pink_noise_buffer(64, &mut StdRng::seed_from_u64(11));
        let b = pink_noise_buffer(64, &mut StdRng::seed_from_u64(11));
        assert_eq!(a, b);
    }
}
