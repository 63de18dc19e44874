//! Deduplication ledger for events and cascade updates.
//!
//! Two kinds of marker are tracked:
//! - event markers, keyed by (timestamp, resource, action), so a redelivered
//!   notification is never processed twice;
//! - update markers, keyed by (task, due date), recording the due dates the
//!   cascade has produced so it never advances a task from one of them again.
//!
//! Markers live in memory only. They expire after the configured retention
//! window, and the oldest of a kind are evicted once that kind holds more
//! than `capacity` entries.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::hash::Hash;
use std::sync::Mutex;
use tracing::debug;

use crate::clock::SharedClock;
use crate::config::LedgerConfig;
use crate::types::{EventKey, UpdateKey};

/// Storage for dedup markers.
///
/// The in-process [`DedupLedger`] is the only implementation shipped; the
/// trait is the seam for a shared store when running several instances.
#[async_trait]
pub trait DedupStore: Send + Sync {
    /// Record an event. Returns `false` if it was already recorded.
    async fn mark_event(&self, key: &EventKey) -> bool;

    /// Whether the cascade already produced this due date for the task.
    async fn has_update(&self, key: &UpdateKey) -> bool;

    /// Remember a due date the cascade wrote.
    async fn record_update(&self, key: UpdateKey);
}

/// Markers of one kind, oldest first.
#[derive(Debug)]
struct Bucket<K> {
    seen: HashMap<K, DateTime<Utc>>,
    order: VecDeque<(K, DateTime<Utc>)>,
}

impl<K> Default for Bucket<K> {
    fn default() -> Self {
        Self {
            seen: HashMap::new(),
            order: VecDeque::new(),
        }
    }
}

impl<K: Clone + Eq + Hash + fmt::Debug> Bucket<K> {
    /// Drop expired markers, then the oldest ones beyond capacity.
    fn prune(&mut self, now: DateTime<Utc>, retention: Option<Duration>, capacity: usize) {
        while let Some((marker, at)) = self.order.front().cloned() {
            let expired = retention.is_some_and(|r| now - at >= r);
            let over_capacity = self.seen.len() > capacity;
            if !expired && !over_capacity {
                break;
            }
            self.order.pop_front();
            if self.seen.get(&marker) == Some(&at) {
                self.seen.remove(&marker);
                debug!(marker = ?marker, expired, "Evicted dedup marker");
            }
        }
    }

    /// Insert a marker if absent. Returns `true` when newly inserted.
    fn insert(&mut self, marker: K, now: DateTime<Utc>) -> bool {
        if self.seen.contains_key(&marker) {
            return false;
        }
        self.seen.insert(marker.clone(), now);
        self.order.push_back((marker, now));
        true
    }
}

#[derive(Debug, Default)]
struct LedgerState {
    events: Bucket<EventKey>,
    updates: Bucket<UpdateKey>,
}

/// Bounded in-memory marker set.
///
/// Event and update markers are bounded separately, so a burst of events
/// cannot push out the update markers that stop a double shift.
pub struct DedupLedger {
    state: Mutex<LedgerState>,
    capacity: usize,
    retention: Option<Duration>,
    clock: SharedClock,
}

impl DedupLedger {
    pub fn new(config: &LedgerConfig, clock: SharedClock) -> Self {
        let retention = (config.retention_secs > 0)
            .then(|| Duration::seconds(i64::try_from(config.retention_secs).unwrap_or(i64::MAX)));
        Self {
            state: Mutex::new(LedgerState::default()),
            capacity: config.capacity.max(1),
            retention,
            clock,
        }
    }

    /// Number of live markers of both kinds.
    pub fn len(&self) -> usize {
        let mut state = self.lock();
        self.prune(&mut state, self.clock.utc());
        state.events.seen.len() + state.updates.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn prune(&self, state: &mut LedgerState, now: DateTime<Utc>) {
        state.events.prune(now, self.retention, self.capacity);
        state.updates.prune(now, self.retention, self.capacity);
    }
}

#[async_trait]
impl DedupStore for DedupLedger {
    async fn mark_event(&self, key: &EventKey) -> bool {
        let now = self.clock.utc();
        let mut state = self.lock();
        self.prune(&mut state, now);
        let inserted = state.events.insert(key.clone(), now);
        state.events.prune(now, self.retention, self.capacity);
        inserted
    }

    async fn has_update(&self, key: &UpdateKey) -> bool {
        let now = self.clock.utc();
        let mut state = self.lock();
        self.prune(&mut state, now);
        state.updates.seen.contains_key(key)
    }

    async fn record_update(&self, key: UpdateKey) {
        let now = self.clock.utc();
        let mut state = self.lock();
        self.prune(&mut state, now);
        state.updates.insert(key, now);
        state.updates.prune(now, self.retention, self.capacity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::{NaiveDate, TimeZone};
    use std::sync::Arc;

    fn event(ts: &str, gid: &str) -> EventKey {
        EventKey {
            created_at: ts.to_string(),
            resource_gid: gid.to_string(),
            action: "changed".to_string(),
        }
    }

    fn ledger(capacity: usize, retention_secs: u64) -> (DedupLedger, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        ));
        let config = LedgerConfig {
            capacity,
            retention_secs,
        };
        (DedupLedger::new(&config, clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_mark_event_once() {
        let (ledger, _) = ledger(100, 3600);
        let key = event("t1", "a");

        assert!(ledger.mark_event(&key).await);
        assert!(!ledger.mark_event(&key).await);
        assert!(ledger.mark_event(&event("t2", "a")).await);
        assert_eq!(ledger.len(), 2);
    }

    #[tokio::test]
    async fn test_update_markers_are_separate_from_events() {
        let (ledger, _) = ledger(100, 3600);
        let date = NaiveDate::from_ymd_opt(2024, 1, 7).unwrap();
        let key = UpdateKey::new("T2", date);

        assert!(!ledger.has_update(&key).await);
        ledger.record_update(key.clone()).await;
        assert!(ledger.has_update(&key).await);
        assert!(
            !ledger
                .has_update(&UpdateKey::new("T2", date.succ_opt().unwrap()))
                .await
        );
        assert!(ledger.mark_event(&event("t1", "T2")).await);
    }

    #[tokio::test]
    async fn test_markers_expire_after_retention() {
        let (ledger, clock) = ledger(100, 60);
        let key = event("t1", "a");
        assert!(ledger.mark_event(&key).await);

        clock.advance(Duration::seconds(59));
        assert!(!ledger.mark_event(&key).await);

        clock.advance(Duration::seconds(1));
        assert!(ledger.is_empty());
        assert!(ledger.mark_event(&key).await);
    }

    #[tokio::test]
    async fn test_zero_retention_never_expires() {
        let (ledger, clock) = ledger(100, 0);
        let key = event("t1", "a");
        assert!(ledger.mark_event(&key).await);

        clock.advance(Duration::days(365));
        assert!(!ledger.mark_event(&key).await);
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest() {
        let (ledger, clock) = ledger(2, 0);
        assert!(ledger.mark_event(&event("t1", "a")).await);
        clock.advance(Duration::seconds(1));
        assert!(ledger.mark_event(&event("t2", "a")).await);
        clock.advance(Duration::seconds(1));
        assert!(ledger.mark_event(&event("t3", "a")).await);

        assert_eq!(ledger.len(), 2);
        // Oldest was evicted, the two newest are still known.
        assert!(!ledger.mark_event(&event("t3", "a")).await);
        assert!(!ledger.mark_event(&event("t2", "a")).await);
        assert!(ledger.mark_event(&event("t1", "a")).await);
    }

    #[tokio::test]
    async fn test_event_burst_keeps_update_markers() {
        let (ledger, clock) = ledger(2, 0);
        let key = UpdateKey::new("T2", NaiveDate::from_ymd_opt(2024, 1, 7).unwrap());
        ledger.record_update(key.clone()).await;

        for i in 0..10 {
            clock.advance(Duration::seconds(1));
            assert!(ledger.mark_event(&event(&format!("t{i}"), "a")).await);
        }

        assert!(ledger.has_update(&key).await);
        assert_eq!(ledger.len(), 3);
    }
}
