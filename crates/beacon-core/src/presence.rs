//! Presence tracking for one channel.
//!
//! Presence records which connections are active in a channel together with
//! the client info supplied when they joined. Entries are ephemeral: every
//! write refreshes a per-entry deadline, and entries whose deadline has
//! passed are dropped on read and by the engine's periodic sweep. An entry
//! therefore never outlives its last refresh plus the TTL window.

use crate::channel::ConnId;
use beacon_protocol::ClientInfo;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

/// A single presence entry.
#[derive(Debug, Clone)]
pub struct PresenceEntry {
    /// Client info supplied by the caller.
    pub info: ClientInfo,
    /// Entry expiry deadline; refreshed on every write.
    deadline: Instant,
}

impl PresenceEntry {
    /// Check whether the entry has expired at `now`.
    #[must_use]
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.deadline
    }
}

/// Presence tracker for a channel.
///
/// State machine per connection: absent → present (on a write) → absent
/// (on removal or TTL expiry). Re-entering present replaces the stored
/// info wholesale; partial updates are unsupported by design.
#[derive(Debug, Default)]
pub struct PresenceTracker {
    /// Map of connection ID to presence entry.
    members: HashMap<ConnId, PresenceEntry>,
}

impl PresenceTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries, expired ones included until the next prune.
    #[must_use]
    pub fn count(&self) -> usize {
        self.members.len()
    }

    /// Check if the tracker holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Upsert the entry for a connection, refreshing its TTL.
    ///
    /// Returns `true` if this is a new member, `false` if replacing.
    pub fn set(&mut self, conn_id: impl Into<ConnId>, info: ClientInfo, ttl: Duration) -> bool {
        let conn_id = conn_id.into();
        let entry = PresenceEntry {
            info,
            deadline: Instant::now() + ttl,
        };
        let is_new = self.members.insert(conn_id.clone(), entry).is_none();

        if is_new {
            debug!(connection = %conn_id, "Presence: member joined");
        }

        is_new
    }

    /// Remove the entry for a connection.
    ///
    /// Returns the removed client info; an absent key is a silent no-op.
    pub fn remove(&mut self, conn_id: &str) -> Option<ClientInfo> {
        let entry = self.members.remove(conn_id);
        if entry.is_some() {
            debug!(connection = %conn_id, "Presence: member left");
        }
        entry.map(|e| e.info)
    }

    /// Snapshot of live entries at `now`.
    ///
    /// Expired entries are pruned as a side effect, so a snapshot never
    /// contains an entry past its deadline.
    #[must_use]
    pub fn snapshot(&mut self, now: Instant) -> HashMap<ConnId, ClientInfo> {
        self.prune_expired(now);
        self.members
            .iter()
            .map(|(id, entry)| (id.clone(), entry.info.clone()))
            .collect()
    }

    /// Remove entries whose deadline has passed.
    ///
    /// Returns the list of pruned connection IDs.
    pub fn prune_expired(&mut self, now: Instant) -> Vec<ConnId> {
        let expired: Vec<ConnId> = self
            .members
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(id, _)| id.clone())
            .collect();

        for id in &expired {
            self.members.remove(id);
            debug!(connection = %id, "Presence: pruned expired member");
        }

        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TTL: Duration = Duration::from_secs(60);

    #[test]
    fn test_set_and_remove() {
        let mut presence = PresenceTracker::new();

        assert!(presence.set("conn-1", ClientInfo::new("u1", "conn-1"), TTL));
        assert!(!presence.set("conn-1", ClientInfo::new("u1", "conn-1"), TTL));
        assert_eq!(presence.count(), 1);

        assert!(presence.remove("conn-1").is_some());
        assert!(presence.is_empty());
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut presence = PresenceTracker::new();
        assert!(presence.remove("conn-missing").is_none());
    }

    #[test]
    fn test_last_write_wins() {
        let mut presence = PresenceTracker::new();
        let first = ClientInfo::new("u1", "conn-1").with_channel_info(json!({"role": "admin"}));
        let second = ClientInfo::new("u1", "conn-1").with_default_info(json!({"name": "Ada"}));

        presence.set("conn-1", first, TTL);
        presence.set("conn-1", second.clone(), TTL);

        let snapshot = presence.snapshot(Instant::now());
        let stored = &snapshot["conn-1"];
        assert_eq!(stored, &second);
        // Replacement, not a merge: the first write's channel_info is gone.
        assert!(stored.channel_info.is_none());
    }

    #[test]
    fn test_expiry() {
        let mut presence = PresenceTracker::new();
        let ttl = Duration::from_millis(10);
        presence.set("conn-1", ClientInfo::new("u1", "conn-1"), ttl);

        let now = Instant::now();
        assert_eq!(presence.snapshot(now).len(), 1);

        let later = now + ttl + Duration::from_millis(1);
        assert!(presence.snapshot(later).is_empty());
        assert!(presence.is_empty());
    }

    #[test]
    fn test_write_refreshes_deadline() {
        let mut presence = PresenceTracker::new();
        let ttl = Duration::from_secs(60);
        presence.set("conn-1", ClientInfo::new("u1", "conn-1"), Duration::from_millis(1));
        presence.set("conn-1", ClientInfo::new("u1", "conn-1"), ttl);

        let later = Instant::now() + Duration::from_secs(1);
        assert_eq!(presence.snapshot(later).len(), 1);
    }

    #[test]
    fn test_prune_reports_expired_ids() {
        let mut presence = PresenceTracker::new();
        presence.set("gone", ClientInfo::new("u1", "gone"), Duration::from_millis(1));
        presence.set("kept", ClientInfo::new("u2", "kept"), TTL);

        let pruned = presence.prune_expired(Instant::now() + Duration::from_millis(5));
        assert_eq!(pruned, vec!["gone".to_string()]);
        assert_eq!(presence.count(), 1);
    }
}
