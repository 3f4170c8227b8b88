//! Host timer facility: one-shot and repeating timers on a virtual clock.
//!
//! Time only moves when the owner asks for due timers, so a test can drive a
//! whole session by advancing a simulated clock while the binary feeds it
//! wall-clock time. Callbacks are delivered one at a time, in deadline order
//! and then creation order.

use std::time::Duration;

/// Handle for a scheduled timer. Cancelling a handle twice is harmless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

#[derive(Debug)]
struct Entry<T> {
    id: TimerId,
    deadline: Duration,
    period: Option<Duration>,
    payload: T,
}

#[derive(Debug)]
pub struct TimerQueue<T> {
    now: Duration,
    next_id: u64,
    entries: Vec<Entry<T>>,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self {
            now: Duration::ZERO,
            next_id: 0,
            entries: Vec::new(),
        }
    }
}

impl<T: Clone> TimerQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fires once, `delay` after the current time.
    pub fn schedule_once(&mut self, delay: Duration, payload: T) -> TimerId {
        self.push(delay, None, payload)
    }

    /// Fires every `period`, first after one full period.
    pub fn schedule_interval(&mut self, period: Duration, payload: T) -> TimerId {
        debug_assert!(!period.is_zero(), "interval timers need a non-zero period");
        self.push(period, Some(period), payload)
    }

    fn push(&mut self, delay: Duration, period: Option<Duration>, payload: T) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.entries.push(Entry {
            id,
            deadline: self.now + delay,
            period,
            payload,
        });
        id
    }

    /// Returns whether the timer was still pending.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        before != self.entries.len()
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.entries.iter().map(|e| e.deadline).min()
    }

    /// Pops the earliest timer due at or before `until`, moving the clock to
    /// its deadline. Repeating timers are re-armed for their next period.
    pub fn pop_due(&mut self, until: Duration) -> Option<(TimerId, T)> {
        let pos = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.deadline <= until)
            .min_by_key(|(_, e)| (e.deadline, e.id))
            .map(|(pos, _)| pos)?;

        let entry = &mut self.entries[pos];
        self.now = self.now.max(entry.deadline);
        let fired = (entry.id, entry.payload.clone());
        match entry.period {
            Some(period) => entry.deadline += period,
            None => {
                self.entries.swap_remove(pos);
            }
        }
        Some(fired)
    }

    /// Moves the clock forward without firing anything. Never goes back.
    pub fn set_now(&mut self, now: Duration) {
        self.now = self.now.max(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn drain(q: &mut TimerQueue<&'static str>, until: Duration) -> Vec<(u64, &'static str)> {
        let mut out = Vec::new();
        while let Some((_, p)) = q.pop_due(until) {
            out.push((q.now().as_millis() as u64, p));
        }
        q.set_now(until);
        out
    }

    #[test]
    fn fires_in_deadline_then_creation_order() {
        let mut q = TimerQueue::new();
        q.schedule_once(ms(20), "b");
        q.schedule_once(ms(10), "a");
        q.schedule_once(ms(20), "c");
        assert_eq!(q.next_deadline(), Some(ms(10)));
        assert_eq!(drain(&mut q, ms(25)), vec![(10, "a"), (20, "b"), (20, "c")]);
        assert!(q.is_empty());
        assert_eq!(q.now(), ms(25));
    }

    #[test]
    fn interval_rearms_until_cancelled() {
        let mut q = TimerQueue::new();
        let id = q.schedule_interval(ms(100), "tick");
        assert_eq!(drain(&mut q, ms(250)), vec![(100, "tick"), (200, "tick")]);
        assert_eq!(q.len(), 1);
        assert!(q.cancel(id));
        assert!(!q.cancel(id));
        assert!(drain(&mut q, ms(1000)).is_empty());
    }

    #[test]
    fn nothing_fires_before_deadline() {
        let mut q = TimerQueue::new();
        q.schedule_once(ms(50), "late");
        assert!(q.pop_due(ms(49)).is_none());
        q.set_now(ms(49));
        assert_eq!(q.now(), ms(49));
        q.set_now(ms(10));
        assert_eq!(q.now(), ms(49));
    }

    #[test]
    fn delays_are_relative_to_current_time() {
        let mut q = TimerQueue::new();
        q.set_now(ms(1000));
        q.schedule_once(ms(5), "x");
        assert_eq!(q.next_deadline(), Some(ms(1005)));
    }
}
