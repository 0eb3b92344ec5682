//! Recurring task queue with owned cancellation handles.
//!
//! A [`TimerQueue`] is clock-agnostic: due times and periods are plain
//! `f64` values in whatever unit the owner drives it with (the engine uses
//! audio-clock seconds, the session uses host milliseconds). Tasks never
//! fire on their own; the owner polls [`TimerQueue::pop_due`] as its clock
//! advances.

/// Owned handle to a registered recurring task.
///
/// Not `Clone`: only the holder can cancel the task.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "dropping a TimerHandle leaves the task running with no way to cancel it"]
pub struct TimerHandle(u64);

impl TimerHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone)]
struct Task<K> {
    id: u64,
    kind: K,
    period: f64,
    next_due: f64,
}

/// A due task popped from the queue.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fired<K> {
    pub kind: K,
    /// The time the task was due, which may be earlier than the poll time.
    pub due: f64,
}

#[derive(Debug, Clone)]
pub struct TimerQueue<K> {
    tasks: Vec<Task<K>>,
    next_id: u64,
}

impl<K: Copy> TimerQueue<K> {
    pub fn new() -> Self {
        TimerQueue {
            tasks: Vec::new(),
            next_id: 1,
        }
    }

    /// Register a task that first fires at `first_due` and then every `period`.
    pub fn every(&mut self, kind: K, first_due: f64, period: f64) -> TimerHandle {
        let id = self.next_id;
        self.next_id += 1;
        self.tasks.push(Task {
            id,
            kind,
            // Zero or negative periods would spin forever in pop_due.
            period: period.max(f64::EPSILON),
            next_due: first_due,
        });
        TimerHandle(id)
    }

    /// Cancel a task. Returns false if it was already gone.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != handle.0);
        self.tasks.len() != before
    }

    pub fn cancel_all(&mut self) {
        self.tasks.clear();
    }

    /// Pop the earliest task due strictly before `until`, rescheduling it
    /// one period later. Call repeatedly until `None`.
    pub fn pop_due(&mut self, until: f64) -> Option<Fired<K>> {
        let task = self
            .tasks
            .iter_mut()
            .filter(|t| t.next_due < until)
            .min_by(|a, b| a.next_due.total_cmp(&b.next_due))?;
        let fired = Fired {
            kind: task.kind,
            due: task.next_due,
        };
        task.next_due += task.period;
        Some(fired)
    }

    /// Number of live recurring tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl<K: Copy> Default for TimerQueue<K> {
    fn default() -> Self {
        Self::new()
    }
}
