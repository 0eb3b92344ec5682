//! Input Event Sampler: bounded rolling windows of input timestamps.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Most recent keystrokes kept for interval statistics.
pub const KEYSTROKE_CAPACITY: usize = 50;
/// Most recent clicks and moves kept.
pub const POINTER_CAPACITY: usize = 30;
/// Width of the keys-per-minute window.
pub const MINUTE_WINDOW_MS: u64 = 60_000;

/// Kind of input event observed by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    Keystroke,
    Click,
    Move,
}

/// A single timestamped input event (monotonic milliseconds).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputSample {
    pub kind: InputKind,
    pub timestamp_ms: u64,
}

/// Fixed-capacity drop-oldest buffer of timestamps.
#[derive(Debug, Clone)]
pub struct RollingBuffer {
    capacity: usize,
    items: VecDeque<u64>,
}

impl RollingBuffer {
    pub fn new(capacity: usize) -> Self {
        RollingBuffer {
            capacity,
            items: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, timestamp_ms: u64) {
        if self.capacity == 0 {
            return;
        }
        while self.items.len() >= self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(timestamp_ms);
    }

    /// Timestamps within `window_ms` of `now_ms` (inclusive), oldest first.
    pub fn within(&self, now_ms: u64, window_ms: u64) -> Vec<u64> {
        let cutoff = now_ms.saturating_sub(window_ms);
        self.items.iter().copied().filter(|&t| t >= cutoff).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.items.iter().copied()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Time-bounded window: entries older than `window_ms` are evicted on push
/// and on [`TimeWindow::count`].
#[derive(Debug, Clone)]
pub struct TimeWindow {
    window_ms: u64,
    items: VecDeque<u64>,
}

impl TimeWindow {
    pub fn new(window_ms: u64) -> Self {
        TimeWindow {
            window_ms,
            items: VecDeque::new(),
        }
    }

    pub fn push(&mut self, timestamp_ms: u64) {
        self.evict(timestamp_ms);
        self.items.push_back(timestamp_ms);
    }

    /// Number of entries within the window ending at `now_ms`.
    pub fn count(&mut self, now_ms: u64) -> usize {
        self.evict(now_ms);
        let cutoff = now_ms.saturating_sub(self.window_ms);
        self.items.iter().filter(|&&t| t >= cutoff && t <= now_ms).count()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    fn evict(&mut self, now_ms: u64) {
        let cutoff = now_ms.saturating_sub(self.window_ms);
        while self.items.front().is_some_and(|&t| t < cutoff) {
            self.items.pop_front();
        }
    }
}

/// Captures input timestamps while a session is active.
///
/// While inactive every buffer is cleared and stays empty; recording is a
/// no-op.
#[derive(Debug, Clone)]
pub struct InputSampler {
    active: bool,
    keystrokes: RollingBuffer,
    keystroke_minute: TimeWindow,
    clicks: RollingBuffer,
    moves: RollingBuffer,
    keystroke_total: u64,
    click_total: u64,
}

impl InputSampler {
    pub fn new() -> Self {
        InputSampler {
            active: false,
            keystrokes: RollingBuffer::new(KEYSTROKE_CAPACITY),
            keystroke_minute: TimeWindow::new(MINUTE_WINDOW_MS),
            clicks: RollingBuffer::new(POINTER_CAPACITY),
            moves: RollingBuffer::new(POINTER_CAPACITY),
            keystroke_total: 0,
            click_total: 0,
        }
    }

    /// Toggle listening. Deactivating (or reactivating) clears all buffers.
    pub fn set_active(&mut self, active: bool) {
        if active != self.active {
            self.clear();
        }
        self.active = active;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Record an input event. Returns false (and records nothing) when inactive.
    pub fn record(&mut self, sample: InputSample) -> bool {
        if !self.active {
            return false;
        }
        match sample.kind {
            InputKind::Keystroke => {
                self.keystrokes.push(sample.timestamp_ms);
                self.keystroke_minute.push(sample.timestamp_ms);
                self.keystroke_total += 1;
            }
            InputKind::Click => {
                self.clicks.push(sample.timestamp_ms);
                self.click_total += 1;
            }
            InputKind::Move => self.moves.push(sample.timestamp_ms),
        }
        true
    }

    pub fn keystrokes(&self) -> &RollingBuffer {
        &self.keystrokes
    }

    pub fn clicks(&self) -> &RollingBuffer {
        &self.clicks
    }

    pub fn moves(&self) -> &RollingBuffer {
        &self.moves
    }

    /// Exact count of keystrokes in the trailing minute.
    pub fn keys_in_last_minute(&mut self, now_ms: u64) -> usize {
        self.keystroke_minute.count(now_ms)
    }

    /// Keystrokes recorded since the sampler was last activated.
    pub fn keystroke_total(&self) -> u64 {
        self.keystroke_total
    }

    pub fn click_total(&self) -> u64 {
        self.click_total
    }

    fn clear(&mut self) {
        self.keystrokes.clear();
        self.keystroke_minute.clear();
        self.clicks.clear();
        self.moves.clear();
        self.keystroke_total = 0;
        self.click_total = 0;
    }
}

impl Default for InputSampler {
    fn default() -> Self {
        Self::new()
    }
}
