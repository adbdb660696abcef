//! Bounded, time-limited message history for one channel.
//!
//! History is an ordered log of past messages, newest first. Both retention
//! bounds (entry count and entry age) are applied in the same mutable
//! critical section as the append, so a reader can never observe a sequence
//! violating either bound.

use beacon_protocol::Message;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::trace;

/// A stored history entry.
#[derive(Debug, Clone)]
struct HistoryEntry {
    message: Message,
    stored_at: Instant,
    /// Expiry deadline from the lifetime in force when the entry was
    /// inserted. `None` when that lifetime was zero.
    expires_at: Option<Instant>,
}

impl HistoryEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

/// History buffer for a channel, newest entries at the front.
#[derive(Debug, Default)]
pub struct HistoryBuffer {
    entries: VecDeque<HistoryEntry>,
}

impl HistoryBuffer {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of retained entries, expired ones included until the next
    /// push, snapshot, or prune.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the buffer holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append a message and trim to bounds in one step.
    ///
    /// The message lands at the front; anything beyond `size` entries is
    /// dropped, as is anything older than `lifetime` relative to `now`.
    /// Equal insertion timestamps keep insertion order. A zero `lifetime`
    /// disables age-based expiry for this and future reads of the entry;
    /// a zero `size` empties the buffer.
    pub fn push(&mut self, message: Message, size: usize, lifetime: Duration, now: Instant) {
        let expires_at = (!lifetime.is_zero()).then(|| now + lifetime);
        self.entries.push_front(HistoryEntry {
            message,
            stored_at: now,
            expires_at,
        });

        self.entries.truncate(size);

        if !lifetime.is_zero() {
            self.entries
                .retain(|entry| now.duration_since(entry.stored_at) < lifetime);
        }
        self.entries.retain(|entry| !entry.is_expired(now));

        trace!(retained = self.entries.len(), "History: appended");
    }

    /// Snapshot of retained messages at `now`, newest first.
    ///
    /// Expired entries are pruned as a side effect, so a snapshot never
    /// contains an entry past its lifetime.
    #[must_use]
    pub fn snapshot(&mut self, now: Instant) -> Vec<Message> {
        self.prune_expired(now);
        self.entries.iter().map(|e| e.message.clone()).collect()
    }

    /// Drop entries whose lifetime has elapsed.
    pub fn prune_expired(&mut self, now: Instant) {
        self.entries.retain(|entry| !entry.is_expired(now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_protocol::ClientInfo;
    use serde_json::json;

    const LIFETIME: Duration = Duration::from_secs(60);

    fn message(n: usize) -> Message {
        Message::new("news", json!({ "seq": n }), ClientInfo::new("u", "conn"))
    }

    #[test]
    fn test_size_trim() {
        let mut history = HistoryBuffer::new();
        let now = Instant::now();

        for n in 0..5 {
            history.push(message(n), 3, LIFETIME, now + Duration::from_millis(n as u64));
        }

        let snapshot = history.snapshot(now + Duration::from_millis(10));
        assert_eq!(snapshot.len(), 3);
        // Newest first: 4, 3, 2.
        assert_eq!(snapshot[0].data["seq"], 4);
        assert_eq!(snapshot[1].data["seq"], 3);
        assert_eq!(snapshot[2].data["seq"], 2);
    }

    #[test]
    fn test_lifetime_expiry_under_size() {
        let mut history = HistoryBuffer::new();
        let lifetime = Duration::from_millis(50);
        let now = Instant::now();

        history.push(message(0), 10, lifetime, now);
        assert_eq!(history.snapshot(now + Duration::from_millis(10)).len(), 1);

        // Past the lifetime the entry is gone even though size allows it.
        assert!(history
            .snapshot(now + lifetime + Duration::from_millis(1))
            .is_empty());
        assert!(history.is_empty());
    }

    #[test]
    fn test_push_expires_older_entries() {
        let mut history = HistoryBuffer::new();
        let lifetime = Duration::from_millis(50);
        let now = Instant::now();

        history.push(message(0), 10, lifetime, now);
        history.push(message(1), 10, lifetime, now + Duration::from_millis(60));

        // The insert itself trimmed the expired entry.
        assert_eq!(history.len(), 1);
        let snapshot = history.snapshot(now + Duration::from_millis(61));
        assert_eq!(snapshot[0].data["seq"], 1);
    }

    #[test]
    fn test_zero_lifetime_disables_expiry() {
        let mut history = HistoryBuffer::new();
        let now = Instant::now();

        history.push(message(0), 10, Duration::ZERO, now);
        let much_later = now + Duration::from_secs(3600);
        assert_eq!(history.snapshot(much_later).len(), 1);
    }

    #[test]
    fn test_zero_size_keeps_nothing() {
        let mut history = HistoryBuffer::new();
        let now = Instant::now();

        history.push(message(0), 0, LIFETIME, now);
        assert!(history.is_empty());
    }

    #[test]
    fn test_insertion_order_on_timestamp_ties() {
        let mut history = HistoryBuffer::new();
        let now = Instant::now();

        // Same insertion instant: order stays by insertion sequence.
        history.push(message(0), 10, LIFETIME, now);
        history.push(message(1), 10, LIFETIME, now);
        history.push(message(2), 10, LIFETIME, now);

        let snapshot = history.snapshot(now);
        assert_eq!(snapshot[0].data["seq"], 2);
        assert_eq!(snapshot[1].data["seq"], 1);
        assert_eq!(snapshot[2].data["seq"], 0);
    }
}
