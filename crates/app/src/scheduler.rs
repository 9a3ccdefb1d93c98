//! Virtual-clock scheduler: deferred tasks without wall-clock waits.
//!
//! Time only moves when the owner calls [`Scheduler::pop_due`] with a later
//! instant. The engine runtime maps tokio time onto it; tests advance it by
//! hand.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::Duration;

struct Entry<T> {
    due: Duration,
    seq: u64,
    task: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.due, self.seq).cmp(&(other.due, other.seq))
    }
}

/// Timer queue keyed on a virtual clock. Tasks due at the same instant fire
/// in the order they were scheduled.
pub struct Scheduler<T> {
    now: Duration,
    next_seq: u64,
    queue: BinaryHeap<Reverse<Entry<T>>>,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self {
            now: Duration::ZERO,
            next_seq: 0,
            queue: BinaryHeap::new(),
        }
    }
}

impl<T> Scheduler<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Schedule `task` to fire `delay` after the current virtual time.
    pub fn schedule_after(&mut self, delay: Duration, task: T) {
        let entry = Entry {
            due: self.now + delay,
            seq: self.next_seq,
            task,
        };
        self.next_seq += 1;
        self.queue.push(Reverse(entry));
    }

    /// When the earliest task is due, if any.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Duration> {
        self.queue.peek().map(|Reverse(entry)| entry.due)
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Drop every pending task matching `predicate`, returning how many
    /// were dropped.
    pub fn cancel(&mut self, predicate: impl Fn(&T) -> bool) -> usize {
        let before = self.queue.len();
        self.queue.retain(|Reverse(entry)| !predicate(&entry.task));
        before - self.queue.len()
    }

    /// Pop the earliest task due at or before `until`, moving the clock to
    /// its deadline. When nothing is due, the clock moves to `until` and
    /// `None` is returned.
    ///
    /// The clock never moves backwards.
    pub fn pop_due(&mut self, until: Duration) -> Option<T> {
        let due = self.next_deadline().filter(|due| *due <= until);
        match due {
            Some(due) => {
                self.now = self.now.max(due);
                self.queue.pop().map(|Reverse(entry)| entry.task)
            }
            None => {
                self.now = self.now.max(until);
                None
            }
        }
    }
}
