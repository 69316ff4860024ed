use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use cmdwire_protocol::AckRequest;
use tracing::debug;

/// Acknowledgements a session is waiting for, keyed by the command id the
/// device answers with.
///
/// Deadlines are computed from the `Instant` the caller passes in; the tracker
/// never reads a clock itself. A second request for the same id replaces the
/// first. A timeout too long to represent as an `Instant` never expires.
#[derive(Debug, Clone, Default)]
pub struct AckTracker {
    pending: Arc<Mutex<HashMap<i32, PendingAck>>>,
}

#[derive(Debug, Clone, Copy)]
struct PendingAck {
    request: AckRequest,
    deadline: Option<Instant>,
}

impl AckTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<i32, PendingAck>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start waiting for `request.command_id`, due `request.timeout` after
    /// `now`.
    pub fn expect(&self, request: AckRequest, now: Instant) {
        let deadline = now.checked_add(request.timeout);
        self.lock()
            .insert(request.command_id, PendingAck { request, deadline });
    }

    /// Clear the pending entry for `command_id`. Returns true if one existed.
    pub fn acknowledge(&self, command_id: i32) -> bool {
        let cleared = self.lock().remove(&command_id).is_some();
        if cleared {
            debug!(command_id, "acknowledged");
        }
        cleared
    }

    /// Stop waiting for `command_id` without it being answered.
    pub fn cancel(&self, command_id: i32) -> bool {
        self.lock().remove(&command_id).is_some()
    }

    pub fn is_pending(&self, command_id: i32) -> bool {
        self.lock().contains_key(&command_id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Remove and return every request whose deadline is at or before `now`,
    /// ordered by deadline.
    pub fn expired(&self, now: Instant) -> Vec<AckRequest> {
        let mut overdue: Vec<PendingAck> = Vec::new();
        self.lock().retain(|_, pending| {
            if pending.deadline.is_some_and(|deadline| deadline <= now) {
                overdue.push(*pending);
                false
            } else {
                true
            }
        });
        overdue.sort_by_key(|pending| pending.deadline);
        overdue.into_iter().map(|pending| pending.request).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn request(command_id: i32, millis: u64) -> AckRequest {
        AckRequest {
            command_id,
            timeout: Duration::from_millis(millis),
        }
    }

    #[test]
    fn acknowledge_clears_pending() {
        let tracker = AckTracker::new();
        let now = Instant::now();
        tracker.expect(request(11, 100), now);

        assert!(tracker.is_pending(11));
        assert!(tracker.acknowledge(11));
        assert!(!tracker.acknowledge(11));
        assert!(tracker.is_empty());
    }

    #[test]
    fn expired_drains_overdue_in_deadline_order() {
        let tracker = AckTracker::new();
        let start = Instant::now();
        tracker.expect(request(1, 300), start);
        tracker.expect(request(2, 100), start);
        tracker.expect(request(3, 1_000), start);

        assert!(tracker.expired(start).is_empty());

        let overdue = tracker.expired(start + Duration::from_millis(300));
        let ids: Vec<i32> = overdue.iter().map(|r| r.command_id).collect();
        assert_eq!(ids, vec![2, 1]);
        assert_eq!(tracker.len(), 1);
        assert!(tracker.is_pending(3));
    }

    #[test]
    fn repeated_request_refreshes_deadline() {
        let tracker = AckTracker::new();
        let start = Instant::now();
        tracker.expect(request(5, 100), start);
        tracker.expect(request(5, 100), start + Duration::from_millis(80));

        assert!(tracker.expired(start + Duration::from_millis(120)).is_empty());
        assert_eq!(tracker.expired(start + Duration::from_millis(180)).len(), 1);
    }

    #[test]
    fn unbounded_timeout_never_expires() {
        let tracker = AckTracker::new();
        let start = Instant::now();
        tracker.expect(
            AckRequest {
                command_id: 3,
                timeout: Duration::MAX,
            },
            start,
        );
        tracker.expect(request(4, 10), start);

        let overdue = tracker.expired(start + Duration::from_secs(86_400 * 365));
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].command_id, 4);
        assert!(tracker.is_pending(3));
        assert!(tracker.acknowledge(3));
    }

    #[test]
    fn cancel_removes_without_acknowledging() {
        let tracker = AckTracker::new();
        tracker.expect(request(8, 10), Instant::now());
        assert!(tracker.cancel(8));
        assert!(!tracker.cancel(8));
        assert!(tracker.is_empty());
    }

    #[test]
    fn clones_share_state() {
        let tracker = AckTracker::new();
        let other = tracker.clone();
        tracker.expect(request(9, 10), Instant::now());
        assert!(other.acknowledge(9));
        assert!(tracker.is_empty());
    }
}
