use std::time::{Duration, Instant};

/// Holds at most one pending value. Each `push` replaces the value and restarts
/// the quiet period; the value is released once nothing new arrived for `delay`.
#[derive(Debug)]
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn push(&mut self, value: T, now: Instant) {
        self.pending = Some((value, now + self.delay));
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, at)| *at)
    }

    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take().map(|(v, _)| v)
    }

    /// Releases the pending value if its deadline has passed.
    pub fn fire_if_due(&mut self, now: Instant) -> Option<T> {
        if self.deadline().is_some_and(|at| at <= now) {
            self.cancel()
        } else {
            None
        }
    }
}
