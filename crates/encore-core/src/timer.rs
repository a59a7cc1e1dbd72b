//! Deferred invocation queue on a virtual clock
//!
//! Registrations are ordered by `(deadline, sequence)`, so equal deadlines
//! fire in the order they were registered. Cancellation is lazy: a cancelled
//! registration stays in the heap until it reaches the top and is discarded.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::time::Duration;

/// Opaque handle returned by [`TimerQueue::schedule_after`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

/// A registration that came due
#[derive(Debug)]
pub struct Fired<T> {
    pub handle: TimerHandle,
    pub deadline: Duration,
    pub payload: T,
}

struct Entry<T> {
    deadline: Duration,
    seq: u64,
    payload: T,
}

impl<T> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap and we want the earliest first
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

pub struct TimerQueue<T> {
    now: Duration,
    next_seq: u64,
    heap: BinaryHeap<Entry<T>>,
    live: HashSet<u64>,
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            now: Duration::ZERO,
            next_seq: 0,
            heap: BinaryHeap::new(),
            live: HashSet::new(),
        }
    }

    /// Current instant of the virtual clock
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Register `payload` to fire `delay` after the current instant
    pub fn schedule_after(&mut self, delay: Duration, payload: T) -> TimerHandle {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Entry {
            deadline: self.now.saturating_add(delay),
            seq,
            payload,
        });
        self.live.insert(seq);
        TimerHandle(seq)
    }

    /// Returns false if the registration already fired or was cancelled
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let removed = self.live.remove(&handle.0);
        self.purge_cancelled();
        removed
    }

    /// Drop every pending registration, returning how many were revoked
    pub fn cancel_all(&mut self) -> usize {
        let n = self.live.len();
        self.live.clear();
        self.heap.clear();
        n
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.heap.peek().map(|e| e.deadline)
    }

    /// Pop the earliest registration due at or before `until`.
    ///
    /// The clock moves to the fired registration's deadline so follow-up work
    /// is scheduled relative to the instant it fired at.
    pub fn pop_due(&mut self, until: Duration) -> Option<Fired<T>> {
        self.purge_cancelled();
        if self.heap.peek()?.deadline > until {
            return None;
        }
        let entry = self.heap.pop()?;
        self.live.remove(&entry.seq);
        if entry.deadline > self.now {
            self.now = entry.deadline;
        }
        self.purge_cancelled();
        Some(Fired {
            handle: TimerHandle(entry.seq),
            deadline: entry.deadline,
            payload: entry.payload,
        })
    }

    /// Move the clock forward; never moves backwards
    pub fn advance_to(&mut self, until: Duration) {
        if until > self.now {
            self.now = until;
        }
    }

    fn purge_cancelled(&mut self) {
        while let Some(top) = self.heap.peek() {
            if self.live.contains(&top.seq) {
                break;
            }
            self.heap.pop();
        }
    }
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Seconds to `Duration`, treating negatives and NaN as zero and saturating
/// anything too large to represent
pub fn secs(seconds: f64) -> Duration {
    if seconds > 0.0 {
        Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX)
    } else {
        Duration::ZERO
    }
}
