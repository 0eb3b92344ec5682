//! Automatable parameter with WebAudio-style ramps.
//!
//! Times are audio-clock seconds. A ramp always starts from the value the
//! parameter has at the moment it is scheduled, so changing direction
//! mid-ramp never jumps.

/// Smallest value an exponential ramp will touch.
pub const EXP_FLOOR: f64 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Curve {
    Step,
    Linear,
    Exponential,
}

#[derive(Debug, Clone, Copy)]
struct Segment {
    start_time: f64,
    start_value: f64,
    end_time: f64,
    end_value: f64,
    curve: Curve,
}

impl Segment {
    fn value_at(&self, t: f64) -> f64 {
        if t >= self.end_time || self.curve == Curve::Step {
            return self.end_value;
        }
        let span = self.end_time - self.start_time;
        let x = ((t - self.start_time) / span).clamp(0.0, 1.0);
        match self.curve {
            Curve::Step => self.end_value,
            Curve::Linear => self.start_value + (self.end_value - self.start_value) * x,
            Curve::Exponential => self.start_value * (self.end_value / self.start_value).powf(x),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AudioParam {
    /// Value before the first segment (and after pruning).
    value: f64,
    segments: Vec<Segment>,
}

impl AudioParam {
    pub fn new(value: f64) -> Self {
        AudioParam {
            value,
            segments: Vec::new(),
        }
    }

    /// Value at audio time `t`.
    pub fn value_at(&self, t: f64) -> f64 {
        self.segments
            .iter()
            .rev()
            .find(|s| s.start_time <= t)
            .map_or(self.value, |s| s.value_at(t))
    }

    /// Drop all automation and hold `value`.
    pub fn set_value(&mut self, value: f64) {
        self.segments.clear();
        self.value = value;
    }

    /// Jump to `value` at time `t`, discarding automation scheduled after `t`.
    pub fn set_value_at_time(&mut self, value: f64, t: f64) {
        self.truncate_after(t);
        self.segments.push(Segment {
            start_time: t,
            start_value: value,
            end_time: t,
            end_value: value,
            curve: Curve::Step,
        });
    }

    /// Ramp linearly from the current value at `now` to `target` over `duration`.
    pub fn linear_ramp_to(&mut self, target: f64, now: f64, duration: f64) {
        self.push_ramp(target, now, duration, Curve::Linear);
    }

    /// Ramp exponentially to `target`; both ends are floored at [`EXP_FLOOR`].
    pub fn exponential_ramp_to(&mut self, target: f64, now: f64, duration: f64) {
        self.push_ramp(target.max(EXP_FLOOR), now, duration, Curve::Exponential);
    }

    /// Forget segments that finished before `now`.
    pub fn prune(&mut self, now: f64) {
        while let Some(first) = self.segments.first() {
            let next_started = self.segments.get(1).is_none_or(|n| n.start_time <= now);
            if first.end_time <= now && next_started {
                self.value = first.end_value;
                self.segments.remove(0);
            } else {
                break;
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn segment_count(&self) -> usize {
        self.segments.len()
    }

    fn push_ramp(&mut self, target: f64, now: f64, duration: f64, curve: Curve) {
        let mut start_value = self.value_at(now);
        if curve == Curve::Exponential {
            start_value = start_value.max(EXP_FLOOR);
        }
        self.truncate_after(now);
        let duration = duration.max(0.0);
        self.segments.push(Segment {
            start_time: now,
            start_value,
            end_time: now + duration,
            end_value: target,
            curve: if duration == 0.0 { Curve::Step } else { curve },
        });
    }

    /// Remove automation starting after `t` and cut off any ramp in flight.
    fn truncate_after(&mut self, t: f64) {
        let held = self.value_at(t);
        self.segments.retain(|s| s.start_time <= t);
        if let Some(last) = self.segments.last_mut() {
            if last.end_time > t {
                last.end_time = t;
                last.end_value = held;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_without_automation() {
        let p = AudioParam::new(0.5);
        assert_eq!(p.value_at(0.0), 0.5);
        assert_eq!(p.value_at(100.0), 0.5);
    }

    #[test]
    fn linear_ramp_interpolates() {
        let mut p = AudioParam::new(0.0);
        p.linear_ramp_to(1.0, 0.0, 1.0);
        assert!((p.value_at(0.25) - 0.25).abs() < 1e-12);
        assert!((p.value_at(0.5) - 0.5).abs() < 1e-12);
        assert_eq!(p.value_at(2.0), 1.0);
    }

    #[test]
    fn exponential_ramp_is_geometric() {
        let mut p = AudioParam::new(1.0);
        p.exponential_ramp_to(0.01, 0.0, 2.0);
        let mid = p.value_at(1.0);
        assert!((mid - 0.1).abs() < 1e-9, "geometric midpoint, got {mid}");
        assert!((p.value_at(2.0) - 0.01).abs() < 1e-12);
    }

    #[test]
    fn exponential_ramp_from_zero_uses_floor() {
        let mut p = AudioParam::new(0.0);
        p.exponential_ramp_to(0.0, 0.0, 1.0);
        let v = p.value_at(0.5);
        assert!(v.is_finite() && v > 0.0);
    }

    #[test]
    fn retarget_mid_ramp_starts_from_current_value() {
        let mut p = AudioParam::new(0.0);
        p.linear_ramp_to(1.0, 0.0, 1.0);
        p.linear_ramp_to(0.0, 0.5, 0.1);
        // No jump at the retarget point.
        assert!((p.value_at(0.5) - 0.5).abs() < 1e-12);
        assert!((p.value_at(0.55) - 0.25).abs() < 1e-9);
        assert_eq!(p.value_at(0.7), 0.0);
    }

    #[test]
    fn set_value_at_time_steps() {
        let mut p = AudioParam::new(1.0);
        p.set_value_at_time(0.0, 2.0);
        assert_eq!(p.value_at(1.9), 1.0);
        assert_eq!(p.value_at(2.0), 0.0);
    }

    #[test]
    fn prune_keeps_final_value() {
        let mut p = AudioParam::new(0.0);
        p.linear_ramp_to(0.8, 0.0, 0.1);
        p.prune(1.0);
        assert_eq!(p.segment_count(), 0);
        assert!((p.value_at(1.0) - 0.8).abs() < 1e-12);
    }

    #[test]
    fn prune_keeps_a_ramp_in_flight() {
        let mut p = AudioParam::new(0.0);
        p.linear_ramp_to(1.0, 0.0, 1.0);
        p.prune(0.5);
        assert_eq!(p.segment_count(), 1);
        assert!((p.value_at(0.5) - 0.5).abs() < 1e-12);
    }
}
