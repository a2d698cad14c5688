//! Timer scheduling abstraction.
//!
//! The engine never sleeps. Every edge animation becomes a discrete task that references
//! the edge by id; the scheduler decides when it is handed back. [`VirtualTimers`] keeps
//! a deterministic queue on a virtual clock, so tests and the CLI can step time exactly.

use crate::graph::EdgeId;
use ahash::AHashMap;
use std::collections::BTreeMap;
use std::time::Duration;

/// Opaque handle returned by [`TimerScheduler::schedule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

/// Work the engine performs when a timer fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimTask {
    /// An animating edge reached its target.
    CompleteEdge { edge_id: EdgeId },
}

/// Abstraction for scheduling and cancelling engine tasks.
pub trait TimerScheduler {
    /// Current time on the scheduler's clock.
    fn now(&self) -> Duration;

    fn schedule(&mut self, delay: Duration, task: SimTask) -> TimerHandle;

    /// Returns `false` if the handle already fired or was cancelled.
    fn cancel(&mut self, handle: TimerHandle) -> bool;

    /// Cancels every pending task and returns how many were dropped.
    fn cancel_all(&mut self) -> usize;

    fn pending(&self) -> usize;

    /// Due time of the earliest pending task.
    fn next_due(&self) -> Option<Duration>;

    /// Removes the earliest task due at or before `until`, moving the clock to its due time.
    fn pop_due(&mut self, until: Duration) -> Option<(TimerHandle, SimTask)>;

    /// Moves the clock forward to `until` (never backwards).
    fn advance_to(&mut self, until: Duration);
}

/// Ordering key: due time first, then scheduling order for FIFO among equal times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct TimerKey {
    due: Duration,
    sequence: u64,
}

/// Deterministic timer queue on a virtual clock.
#[derive(Debug, Default)]
pub struct VirtualTimers {
    now: Duration,
    sequence: u64,
    queue: BTreeMap<TimerKey, (TimerHandle, SimTask)>,
    handles: AHashMap<TimerHandle, TimerKey>,
}

impl VirtualTimers {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TimerScheduler for VirtualTimers {
    fn now(&self) -> Duration {
        self.now
    }

    fn schedule(&mut self, delay: Duration, task: SimTask) -> TimerHandle {
        self.sequence += 1;
        let key = TimerKey {
            due: self.now + delay,
            sequence: self.sequence,
        };
        let handle = TimerHandle(self.sequence);
        self.queue.insert(key, (handle, task));
        self.handles.insert(handle, key);
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) -> bool {
        match self.handles.remove(&handle) {
            Some(key) => self.queue.remove(&key).is_some(),
            None => false,
        }
    }

    fn cancel_all(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        self.handles.clear();
        dropped
    }

    fn pending(&self) -> usize {
        self.queue.len()
    }

    fn next_due(&self) -> Option<Duration> {
        self.queue.keys().next().map(|key| key.due)
    }

    fn pop_due(&mut self, until: Duration) -> Option<(TimerHandle, SimTask)> {
        let key = *self.queue.keys().next()?;
        if key.due > until {
            return None;
        }
        let (handle, task) = self.queue.remove(&key)?;
        self.handles.remove(&handle);
        self.now = self.now.max(key.due);
        Some((handle, task))
    }

    fn advance_to(&mut self, until: Duration) {
        self.now = self.now.max(until);
    }
}
