//! Rhythm session: wires host input events to the rhythm estimator, the
//! rhythm binding and the keystroke note trigger.
//!
//! The session runs on the host's millisecond clock (the timestamps passed
//! with each call) and borrows the engine per call, so one owner holds both.

use serde::Serialize;

use crate::binding::{self, RhythmModulation};
use crate::config::SessionConfig;
use crate::dsp::engine::{AudioEngine, NoteRequest, PlayedNote};
use crate::input::{InputKind, InputSample, InputSampler};
use crate::instrument::{InstrumentId, velocity_for_rhythm};
use crate::rhythm::{RhythmEstimator, RhythmSnapshot, TICK_INTERVAL_MS};
use crate::timer::{TimerHandle, TimerQueue};

/// Minimum gap between note triggers when throttling is enabled.
pub const THROTTLE_MS: u64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionTask {
    RhythmTick,
}

/// A recompute and what it pushed into the engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RhythmUpdate {
    pub snapshot: RhythmSnapshot,
    /// `None` when no bed was playing.
    pub modulation: Option<RhythmModulation>,
}

/// A keystroke that qualified for a note.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteTrigger {
    pub instrument: InstrumentId,
    pub velocity: f64,
    /// `None` if the engine dropped the note.
    pub played: Option<PlayedNote>,
}

/// Result of feeding one input event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputOutcome {
    pub update: Option<RhythmUpdate>,
    pub note: Option<NoteTrigger>,
}

#[derive(Debug)]
pub struct RhythmSession {
    config: SessionConfig,
    sampler: InputSampler,
    estimator: RhythmEstimator,
    timers: TimerQueue<SessionTask>,
    tick: Option<TimerHandle>,
    next_instrument: usize,
    last_trigger_ms: Option<u64>,
}

impl RhythmSession {
    pub fn new(config: SessionConfig) -> Self {
        RhythmSession {
            config,
            sampler: InputSampler::new(),
            estimator: RhythmEstimator::new(),
            timers: TimerQueue::new(),
            tick: None,
            next_instrument: 0,
            last_trigger_ms: None,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Replace the configuration; the round-robin restarts at the first
    /// selected instrument.
    pub fn set_config(&mut self, config: SessionConfig) {
        self.config = config;
        self.next_instrument = 0;
    }

    pub fn is_active(&self) -> bool {
        self.sampler.is_active()
    }

    pub fn latest(&self) -> RhythmSnapshot {
        self.estimator.latest()
    }

    pub fn active_timer_count(&self) -> usize {
        self.timers.len()
    }

    /// Start or stop listening at host time `now_ms`. Activation schedules
    /// the one-second rhythm tick; deactivation cancels it and clears all
    /// input history.
    pub fn set_active(&mut self, active: bool, now_ms: u64) {
        if active == self.sampler.is_active() {
            return;
        }
        self.sampler.set_active(active);
        self.estimator.reset();
        self.last_trigger_ms = None;
        self.next_instrument = 0;
        if let Some(handle) = self.tick.take() {
            self.timers.cancel(handle);
        }
        if active {
            let period = TICK_INTERVAL_MS as f64;
            self.tick = Some(
                self.timers
                    .every(SessionTask::RhythmTick, now_ms as f64 + period, period),
            );
        }
        tracing::info!(active, "input sampling toggled");
    }

    /// Feed one input event. Keystrokes may recompute inline and may trigger
    /// a note.
    pub fn on_input(
        &mut self,
        kind: InputKind,
        now_ms: u64,
        engine: &mut AudioEngine,
    ) -> InputOutcome {
        let sample = InputSample {
            kind,
            timestamp_ms: now_ms,
        };
        if !self.sampler.record(sample) {
            return InputOutcome::default();
        }
        if kind != InputKind::Keystroke {
            return InputOutcome::default();
        }
        let update = self
            .estimator
            .due_inline(now_ms)
            .then(|| self.recompute(now_ms, engine));
        InputOutcome {
            update,
            note: self.trigger_note(now_ms, engine),
        }
    }

    /// Advance the host clock to `now_ms`, running the rhythm tick if due.
    /// Missed ticks collapse into one recompute.
    pub fn advance(&mut self, now_ms: u64, engine: &mut AudioEngine) -> Option<RhythmUpdate> {
        let until = now_ms as f64 + 1.0;
        let mut fired = false;
        while let Some(task) = self.timers.pop_due(until) {
            match task.kind {
                SessionTask::RhythmTick => fired = true,
            }
        }
        (fired && self.sampler.is_active()).then(|| self.recompute(now_ms, engine))
    }

    fn recompute(&mut self, now_ms: u64, engine: &mut AudioEngine) -> RhythmUpdate {
        let snapshot = self.estimator.recompute(&mut self.sampler, now_ms);
        RhythmUpdate {
            snapshot,
            modulation: binding::apply(engine, &snapshot),
        }
    }

    fn trigger_note(&mut self, now_ms: u64, engine: &mut AudioEngine) -> Option<NoteTrigger> {
        if !self.config.enable_instrumental_sounds || self.config.selected_instruments.is_empty() {
            return None;
        }
        if self.config.throttle_rapid_typing
            && self
                .last_trigger_ms
                .is_some_and(|last| now_ms.saturating_sub(last) < THROTTLE_MS)
        {
            tracing::trace!(now_ms, "note throttled");
            return None;
        }

        let instruments = &self.config.selected_instruments;
        let instrument = instruments[self.next_instrument % instruments.len()];
        self.next_instrument = (self.next_instrument + 1) % instruments.len();
        self.last_trigger_ms = Some(now_ms);

        let velocity = velocity_for_rhythm(f64::from(self.estimator.latest().rhythm_score));
        let request = NoteRequest::new(instrument, velocity).accessible(self.config.accessibility_mode);
        Some(NoteTrigger {
            instrument,
            velocity,
            played: engine.play_instrument_note(request),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::dsp::engine::EngineState;
    use crate::rhythm::Intensity;

    fn engine() -> AudioEngine {
        AudioEngine::new(EngineConfig::default()).unwrap()
    }

    fn session(instruments: &[InstrumentId], throttle: bool) -> RhythmSession {
        let mut s = RhythmSession::new(SessionConfig {
            selected_instruments: instruments.to_vec(),
            throttle_rapid_typing: throttle,
            ..SessionConfig::default()
        });
        s.set_active(true, 0);
        s
    }

    fn key(s: &mut RhythmSession, e: &mut AudioEngine, t: u64) -> InputOutcome {
        s.on_input(InputKind::Keystroke, t, e)
    }

    #[test]
    fn round_robin_wraps() {
        use InstrumentId::{Bells, Flute, Piano};
        let mut e = engine();
        let mut s = session(&[Piano, Bells, Flute], false);
        let picked: Vec<InstrumentId> = (0..4)
            .filter_map(|i| key(&mut s, &mut e, i * 200).note)
            .map(|n| n.instrument)
            .collect();
        assert_eq!(picked, vec![Piano, Bells, Flute, Piano]);
    }

    #[test]
    fn throttle_allows_one_note_per_50ms() {
        let mut e = engine();
        let mut s = session(&[InstrumentId::Piano], true);
        assert!(key(&mut s, &mut e, 1_000).note.is_some());
        assert!(key(&mut s, &mut e, 1_010).note.is_none());
        assert!(key(&mut s, &mut e, 1_049).note.is_none());
        assert!(key(&mut s, &mut e, 1_050).note.is_some());
    }

    #[test]
    fn throttled_keystrokes_do_not_advance_round_robin() {
        use InstrumentId::{Bells, Piano};
        let mut e = engine();
        let mut s = session(&[Piano, Bells], true);
        assert_eq!(key(&mut s, &mut e, 0).note.map(|n| n.instrument), Some(Piano));
        assert!(key(&mut s, &mut e, 10).note.is_none());
        assert_eq!(key(&mut s, &mut e, 100).note.map(|n| n.instrument), Some(Bells));
    }

    #[test]
    fn without_throttle_every_keystroke_triggers() {
        let mut e = engine();
        let mut s = session(&[InstrumentId::Piano], false);
        assert!(key(&mut s, &mut e, 0).note.is_some());
        assert!(key(&mut s, &mut e, 10).note.is_some());
    }

    #[test]
    fn disabled_sounds_trigger_nothing() {
        let mut e = engine();
        let mut s = RhythmSession::new(SessionConfig {
            enable_instrumental_sounds: false,
            ..SessionConfig::default()
        });
        s.set_active(true, 0);
        let out = key(&mut s, &mut e, 0);
        assert!(out.note.is_none());
        assert!(out.update.is_some());
        assert_eq!(e.active_node_count(), 0);
    }

    #[test]
    fn inactive_session_ignores_input() {
        let mut e = engine();
        let mut s = RhythmSession::new(SessionConfig::default());
        assert_eq!(key(&mut s, &mut e, 0), InputOutcome::default());
        assert!(s.advance(5_000, &mut e).is_none());
        assert_eq!(s.active_timer_count(), 0);
    }

    #[test]
    fn inline_recompute_is_rate_limited() {
        let mut e = engine();
        let mut s = session(&[InstrumentId::Piano], false);
        assert!(key(&mut s, &mut e, 0).update.is_some());
        assert!(key(&mut s, &mut e, 100).update.is_none());
        assert!(key(&mut s, &mut e, 499).update.is_none());
        assert!(key(&mut s, &mut e, 500).update.is_some());
    }

    #[test]
    fn tick_runs_every_second() {
        let mut e = engine();
        let mut s = session(&[InstrumentId::Piano], false);
        assert!(s.advance(999, &mut e).is_none());
        assert!(s.advance(1_000, &mut e).is_some());
        assert!(s.advance(1_500, &mut e).is_none());
        assert!(s.advance(2_000, &mut e).is_some());
        // Missed ticks collapse.
        assert!(s.advance(10_000, &mut e).is_some());
        assert!(s.advance(10_500, &mut e).is_none());
    }

    #[test]
    fn deactivation_cancels_tick_and_clears_history() {
        let mut e = engine();
        let mut s = session(&[InstrumentId::Piano], false);
        for t in [0, 200, 400] {
            key(&mut s, &mut e, t);
        }
        assert_eq!(s.active_timer_count(), 1);
        s.set_active(false, 500);
        assert_eq!(s.active_timer_count(), 0);
        assert_eq!(s.latest(), RhythmSnapshot::default());
        assert!(s.advance(2_000, &mut e).is_none());

        s.set_active(true, 3_000);
        let update = s.advance(4_000, &mut e).unwrap();
        assert_eq!(update.snapshot.keystroke_count, 0);
    }

    #[test]
    fn steady_half_second_typing_scores_two() {
        let mut e = engine();
        let mut s = session(&[InstrumentId::Piano], false);
        for i in 0..=10 {
            key(&mut s, &mut e, i * 500);
        }
        let update = s.advance(5_000, &mut e).unwrap();
        assert_eq!(update.snapshot.rhythm_score, 2);
        assert_eq!(update.snapshot.bpm, 30);
        assert_eq!(update.snapshot.keystroke_count, 11);
        assert_eq!(update.snapshot.keys_per_minute, 11);
        assert_eq!(update.snapshot.intensity, Intensity::Low);
    }

    #[test]
    fn velocity_follows_latest_score() {
        let mut e = engine();
        let mut s = session(&[InstrumentId::Piano], false);
        // 50 ms apart: score saturates at 20 after the inline recompute.
        let first = key(&mut s, &mut e, 0).note.unwrap();
        assert_eq!(first.velocity, 0.3);
        for t in (50..=500).step_by(50) {
            key(&mut s, &mut e, t);
        }
        let note = key(&mut s, &mut e, 550).note.unwrap();
        assert!((note.velocity - velocity_for_rhythm(20.0)).abs() < 1e-12);
    }

    #[test]
    fn updates_drive_a_playing_engine() {
        let mut e = engine();
        e.start("lofi").unwrap();
        let mut s = session(&[InstrumentId::Piano], false);
        for t in (0..1_000).step_by(100) {
            key(&mut s, &mut e, t);
        }
        let update = s.advance(1_000, &mut e).unwrap();
        let m = update.modulation.unwrap();
        assert!(m.filter_cutoff > binding::MIN_CUTOFF_HZ);

        e.stop();
        assert_eq!(e.engine_state(), EngineState::Stopping);
        assert!(s.advance(2_000, &mut e).unwrap().modulation.is_none());
    }

    #[test]
    fn clicks_and_moves_are_counted_without_notes() {
        let mut e = engine();
        let mut s = session(&[InstrumentId::Piano], false);
        assert!(s.on_input(InputKind::Click, 10, &mut e).note.is_none());
        s.on_input(InputKind::Click, 20, &mut e);
        s.on_input(InputKind::Move, 30, &mut e);
        let update = s.advance(1_000, &mut e).unwrap();
        assert_eq!(update.snapshot.click_count, 2);
        assert_eq!(update.snapshot.move_count, 1);
        assert_eq!(update.snapshot.rhythm_score, 0);
    }
}
