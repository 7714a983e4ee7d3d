use std::time::{Duration, Instant};
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: u64,
    pub message: String,
    pub severity: Severity,
    pub expires_at: Instant,
}

/// Queue of transient toasts. Nothing reads it for control flow; entries simply
/// expire after `ttl`. Duplicates are kept.
#[derive(Debug)]
pub struct Notifier {
    ttl: Duration,
    next_id: u64,
    shown_through: u64,
    queue: Vec<Notification>,
}

impl Notifier {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            next_id: 1,
            shown_through: 0,
            queue: Vec::new(),
        }
    }

    pub fn notify(&mut self, message: impl Into<String>, severity: Severity, now: Instant) -> u64 {
        let message = message.into();
        match severity {
            Severity::Error => error!(notification = %message, "Notify"),
            _ => info!(notification = %message, "Notify"),
        }
        let id = self.next_id;
        self.next_id += 1;
        self.queue.push(Notification {
            id,
            message,
            severity,
            expires_at: now + self.ttl,
        });
        id
    }

    pub fn prune(&mut self, now: Instant) {
        self.queue.retain(|n| n.expires_at > now);
    }

    /// Notifications raised since the last call; they stay visible until expiry.
    pub fn take_new(&mut self) -> Vec<Notification> {
        let fresh: Vec<Notification> = self
            .queue
            .iter()
            .filter(|n| n.id > self.shown_through)
            .cloned()
            .collect();
        if let Some(last) = fresh.last() {
            self.shown_through = last.id;
        }
        fresh
    }

    pub fn next_expiry(&self) -> Option<Instant> {
        self.queue.iter().map(|n| n.expires_at).min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notifications_stack_and_expire() {
        let t0 = Instant::now();
        let mut n = Notifier::new(Duration::from_secs(4));
        n.notify("saved", Severity::Success, t0);
        n.notify("saved", Severity::Success, t0 + Duration::from_secs(1));
        assert_eq!(n.queue.len(), 2);
        assert_eq!(n.take_new().len(), 2);
        assert!(n.take_new().is_empty());

        let later = t0 + Duration::from_millis(4500);
        n.prune(later);
        assert_eq!(n.queue.len(), 1);
        assert_eq!(n.next_expiry(), Some(t0 + Duration::from_secs(5)));
        n.prune(t0 + Duration::from_secs(5));
        assert!(n.queue.is_empty());
        assert_eq!(n.next_expiry(), None);
    }
}
