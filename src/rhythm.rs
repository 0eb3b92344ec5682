//! Rhythm Estimator: tempo, interval statistics and intensity from the
//! sampler's rolling windows.
//!
//! Two metrics are kept deliberately separate: `rhythm_score` and `bpm` are
//! derived from inter-keystroke intervals in the trailing 5 s, while
//! `intensity` is derived from the keys-per-minute count. They can disagree
//! (a short fast burst gives a high score with low intensity) and must not
//! be unified.

use serde::{Deserialize, Serialize};

use crate::input::InputSampler;

/// Trailing window for interval statistics.
pub const RECENT_WINDOW_MS: u64 = 5_000;
/// Cadence of the periodic recompute while active.
pub const TICK_INTERVAL_MS: u64 = 1_000;
/// Minimum spacing of the opportunistic recompute on keystroke.
pub const INLINE_RECOMPUTE_MS: u64 = 500;
/// Intervals shorter than this are treated as this for score and bpm.
const MIN_INTERVAL_MS: f64 = 50.0;
const MAX_BPM: f64 = 180.0;
const MAX_SCORE: f64 = 100.0;
/// Highest score the interval formula can reach: `1000 / MIN_INTERVAL_MS`.
pub const PEAK_SCORE: u32 = 20;

const HIGH_KPM: usize = 80;
const MEDIUM_KPM: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Intensity {
    #[default]
    Low,
    Medium,
    High,
}

impl Intensity {
    /// Exact thresholds: `>= 80` high, `>= 50` medium, else low.
    pub fn from_keys_per_minute(kpm: usize) -> Self {
        if kpm >= HIGH_KPM {
            Intensity::High
        } else if kpm >= MEDIUM_KPM {
            Intensity::Medium
        } else {
            Intensity::Low
        }
    }
}

/// Immutable per-tick rhythm reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RhythmSnapshot {
    /// 0..=100, rounded.
    pub rhythm_score: u32,
    /// 0..=180.
    pub bpm: u32,
    pub intensity: Intensity,
    pub keystroke_count: u64,
    pub click_count: u64,
    pub move_count: usize,
    pub average_interval_ms: f64,
    pub keys_per_minute: usize,
    /// Host timestamp the snapshot was computed at.
    pub computed_at_ms: u64,
}

/// Mean of consecutive differences; `None` with fewer than two stamps.
pub fn average_interval(timestamps: &[u64]) -> Option<f64> {
    if timestamps.len() < 2 {
        return None;
    }
    let total: u64 = timestamps
        .windows(2)
        .map(|w| w[1].saturating_sub(w[0]))
        .sum();
    Some(total as f64 / (timestamps.len() - 1) as f64)
}

/// `round(min(100, 1000 / max(avg, 50)))`
pub fn rhythm_score(average_interval_ms: f64) -> u32 {
    let score = (1000.0 / average_interval_ms.max(MIN_INTERVAL_MS)).min(MAX_SCORE);
    score.round() as u32
}

/// `min(180, round(60000 / max(avg, 50) * 0.25))`
pub fn bpm(average_interval_ms: f64) -> u32 {
    let raw = (60_000.0 / average_interval_ms.max(MIN_INTERVAL_MS) * 0.25).round();
    raw.min(MAX_BPM) as u32
}

/// Periodic/opportunistic recompute scheduler around the pure formulas.
#[derive(Debug, Clone, Default)]
pub struct RhythmEstimator {
    last_computed_ms: Option<u64>,
    latest: RhythmSnapshot,
}

impl RhythmEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute from the sampler's windows at `now_ms`.
    pub fn recompute(&mut self, sampler: &mut InputSampler, now_ms: u64) -> RhythmSnapshot {
        let recent = sampler.keystrokes().within(now_ms, RECENT_WINDOW_MS);
        let keys_per_minute = sampler.keys_in_last_minute(now_ms);

        let mut snapshot = RhythmSnapshot {
            keystroke_count: sampler.keystroke_total(),
            click_count: sampler.click_total(),
            move_count: sampler.moves().len(),
            computed_at_ms: now_ms,
            ..RhythmSnapshot::default()
        };

        if let Some(avg) = average_interval(&recent) {
            snapshot.rhythm_score = rhythm_score(avg);
            snapshot.bpm = bpm(avg);
            snapshot.average_interval_ms = avg;
            snapshot.keys_per_minute = keys_per_minute;
            snapshot.intensity = Intensity::from_keys_per_minute(keys_per_minute);
        }

        tracing::debug!(
            score = snapshot.rhythm_score,
            bpm = snapshot.bpm,
            kpm = snapshot.keys_per_minute,
            intensity = ?snapshot.intensity,
            "rhythm recomputed"
        );

        self.last_computed_ms = Some(now_ms);
        self.latest = snapshot;
        snapshot
    }

    /// Whether the keystroke path should recompute inline at `now_ms`.
    pub fn due_inline(&self, now_ms: u64) -> bool {
        match self.last_computed_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= INLINE_RECOMPUTE_MS,
        }
    }

    pub fn latest(&self) -> RhythmSnapshot {
        self.latest
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{InputKind, InputSample};

    fn sampler_with_keys(stamps: &[u64]) -> InputSampler {
        let mut s = InputSampler::new();
        s.set_active(true);
        for &t in stamps {
            s.record(InputSample {
                kind: InputKind::Keystroke,
                timestamp_ms: t,
            });
        }
        s
    }

    #[test]
    fn fewer_than_two_recent_keys_is_zeroed() {
        let mut s = sampler_with_keys(&[0, 100, 200, 9_000]);
        let mut est = RhythmEstimator::new();
        let snap = est.recompute(&mut s, 10_000);
        assert_eq!(snap.rhythm_score, 0);
        assert_eq!(snap.bpm, 0);
        assert_eq!(snap.keys_per_minute, 0);
        assert_eq!(snap.intensity, Intensity::Low);
        // Counts are preserved.
        assert_eq!(snap.keystroke_count, 4);
    }

    #[test]
    fn empty_buffer_is_zeroed() {
        let mut s = sampler_with_keys(&[]);
        let snap = RhythmEstimator::new().recompute(&mut s, 1_000);
        assert_eq!((snap.rhythm_score, snap.bpm), (0, 0));
    }

    #[test]
    fn steady_500ms_typing_uses_literal_formula() {
        let stamps: Vec<u64> = (0..=12).map(|i| i * 500).collect();
        let mut s = sampler_with_keys(&stamps);
        let snap = RhythmEstimator::new().recompute(&mut s, 6_000);
        // 1000 / 500 = 2, not "high rhythm".
        assert_eq!(snap.rhythm_score, 2);
        // 60000 / 500 * 0.25 = 30
        assert_eq!(snap.bpm, 30);
        assert!((snap.average_interval_ms - 500.0).abs() < 1e-9);
        assert_eq!(snap.keys_per_minute, 13);
    }

    #[test]
    fn very_fast_typing_is_clamped() {
        assert_eq!(rhythm_score(10.0), 20);
        assert_eq!(bpm(10.0), 180);
        assert_eq!(bpm(50.0), 180);
        assert_eq!(bpm(100.0), 150);
        assert_eq!(rhythm_score(0.0), PEAK_SCORE);
    }

    #[test]
    fn keys_per_minute_equals_trailing_window_count() {
        let stamps: Vec<u64> = (0..130).map(|i| i * 700).collect();
        let now = 91_000;
        let mut s = sampler_with_keys(&stamps);
        let snap = RhythmEstimator::new().recompute(&mut s, now);
        let expected = stamps.iter().filter(|&&t| t >= now - 60_000 && t <= now).count();
        assert_eq!(snap.keys_per_minute, expected);
    }

    #[test]
    fn intensity_thresholds_are_exact() {
        assert_eq!(Intensity::from_keys_per_minute(49), Intensity::Low);
        assert_eq!(Intensity::from_keys_per_minute(50), Intensity::Medium);
        assert_eq!(Intensity::from_keys_per_minute(79), Intensity::Medium);
        assert_eq!(Intensity::from_keys_per_minute(80), Intensity::High);
    }

    #[test]
    fn intensity_from_real_minute_of_typing() {
        // 80 keys within the last minute, the final ones close together.
        let stamps: Vec<u64> = (0..80).map(|i| 1_000 + i * 700).collect();
        let now = *stamps.last().unwrap();
        let mut s = sampler_with_keys(&stamps);
        let snap = RhythmEstimator::new().recompute(&mut s, now);
        assert_eq!(snap.keys_per_minute, 80);
        assert_eq!(snap.intensity, Intensity::High);

        let mut s = sampler_with_keys(&stamps[1..]);
        let snap = RhythmEstimator::new().recompute(&mut s, now);
        assert_eq!(snap.keys_per_minute, 79);
        assert_eq!(snap.intensity, Intensity::Medium);
    }

    #[test]
    fn inline_recompute_is_rate_limited() {
        let mut s = sampler_with_keys(&[0, 100]);
        let mut est = RhythmEstimator::new();
        assert!(est.due_inline(0));
        est.recompute(&mut s, 100);
        assert!(!est.due_inline(599));
        assert!(est.due_inline(600));
    }

    #[test]
    fn snapshot_serializes_camel_case() {
        let json = serde_json::to_value(RhythmSnapshot::default()).unwrap();
        assert!(json.get("rhythmScore").is_some());
        assert!(json.get("keysPerMinute").is_some());
        assert_eq!(json["intensity"], "low");
    }
}
