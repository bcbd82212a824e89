//! Entity state store with domain indexing and an append-only history log
//!
//! The store holds the current snapshot of every known entity and the
//! history of their state-change events. Snapshots are superseded atomically
//! on change; the event log is append-only with strictly monotonic per-entity
//! ordering. Reads are safe under unlimited concurrency; mining works on
//! immutable point-in-time snapshots taken with [`EntityStateStore::events_window`].

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use forge_core::{EntityId, EntityRecord, StateEvent};
use thiserror::Error;
use tracing::{debug, instrument, trace};

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// The append-only ordering invariant was violated. This is corruption
    /// of the history log and is never retried.
    #[error(
        "history ordering violated for {entity_id}: event at {timestamp} precedes last {last}"
    )]
    HistoryOrdering {
        entity_id: EntityId,
        timestamp: DateTime<Utc>,
        last: DateTime<Utc>,
    },
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// An immutable point-in-time copy of the event log
///
/// Sorted by timestamp across entities. Mining batches work exclusively on
/// snapshots, so they may run concurrently with validation and deployment
/// without coordination.
#[derive(Debug, Clone)]
pub struct EventLogSnapshot {
    events: Vec<StateEvent>,
    taken_at: DateTime<Utc>,
}

impl EventLogSnapshot {
    /// All events, ordered by timestamp
    pub fn events(&self) -> &[StateEvent] {
        &self.events
    }

    /// When the snapshot was taken
    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    /// Events for a single entity, in log order
    pub fn for_entity(&self, entity_id: &EntityId) -> Vec<&StateEvent> {
        self.events
            .iter()
            .filter(|e| &e.entity_id == entity_id)
            .collect()
    }

    /// Number of value transitions observed for an entity
    pub fn transition_count(&self, entity_id: &EntityId) -> u64 {
        self.events
            .iter()
            .filter(|e| &e.entity_id == entity_id && e.is_transition())
            .count() as u64
    }
}

/// The entity state store
///
/// Responsible for:
/// - holding the current [`EntityRecord`] of every known entity
/// - maintaining a domain index for domain-scoped queries
/// - appending [`StateEvent`]s to the per-entity history log, enforcing
///   monotonic ordering
/// - producing immutable event-log snapshots for pattern mining
pub struct EntityStateStore {
    /// Current records keyed by entity_id string
    records: DashMap<String, EntityRecord>,
    /// Entity ids by domain
    domain_index: DashMap<String, Vec<String>>,
    /// Append-only history, per entity, monotonic by timestamp
    history: RwLock<HashMap<EntityId, Vec<StateEvent>>>,
}

impl EntityStateStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            domain_index: DashMap::new(),
            history: RwLock::new(HashMap::new()),
        }
    }

    /// Set the current state of an entity
    ///
    /// Supersedes any existing record atomically, preserving `last_changed`
    /// when the value is unchanged, and appends the implied event to the
    /// history log.
    #[instrument(skip(self, state, attributes), fields(entity_id = %entity_id))]
    pub fn upsert(
        &self,
        entity_id: EntityId,
        state: impl Into<String>,
        attributes: HashMap<String, serde_json::Value>,
        at: DateTime<Utc>,
    ) -> StoreResult<EntityRecord> {
        let key = entity_id.to_string();
        let state = state.into();

        let old = self.records.get(&key).map(|r| r.clone());
        let new_record = match &old {
            Some(existing) => existing.superseded_by(state, attributes, at),
            None => EntityRecord::new(entity_id.clone(), state, attributes, at),
        };

        let event = StateEvent::new(
            entity_id.clone(),
            old.as_ref().map(|r| r.state.clone()),
            new_record.state.clone(),
            at,
        );
        self.append(event)?;

        debug!(state = %new_record.state, "entity state set");

        if old.is_none() {
            self.domain_index
                .entry(entity_id.domain().to_string())
                .or_default()
                .push(key.clone());
        }
        self.records.insert(key, new_record.clone());

        Ok(new_record)
    }

    /// Replace the current record without generating a history event
    ///
    /// Used when refreshing snapshots from the external API, where history
    /// is ingested separately through [`EntityStateStore::record_event`].
    pub fn load_record(&self, record: EntityRecord) {
        let key = record.id.to_string();
        if !self.records.contains_key(&key) {
            self.domain_index
                .entry(record.id.domain().to_string())
                .or_default()
                .push(key.clone());
        }
        self.records.insert(key, record);
    }

    /// Append an externally observed event to the history log
    pub fn record_event(&self, event: StateEvent) -> StoreResult<()> {
        self.append(event)
    }

    fn append(&self, event: StateEvent) -> StoreResult<()> {
        let mut history = self.history.write().expect("history lock poisoned");
        let log = history.entry(event.entity_id.clone()).or_default();

        if let Some(last) = log.last() {
            if event.timestamp < last.timestamp {
                return Err(StoreError::HistoryOrdering {
                    entity_id: event.entity_id.clone(),
                    timestamp: event.timestamp,
                    last: last.timestamp,
                });
            }
        }

        trace!(entity_id = %event.entity_id, new_state = %event.new_state, "event appended");
        log.push(event);
        Ok(())
    }

    /// Current record for an entity, if known
    pub fn get(&self, entity_id: &str) -> Option<EntityRecord> {
        self.records.get(entity_id).map(|r| r.clone())
    }

    /// Current state value for an entity, if known
    pub fn get_state(&self, entity_id: &str) -> Option<String> {
        self.records.get(entity_id).map(|r| r.state.clone())
    }

    /// Whether `entity_id` resolves to a known entity
    pub fn contains(&self, entity_id: &str) -> bool {
        self.records.contains_key(entity_id)
    }

    /// All entity ids for a domain
    pub fn entity_ids(&self, domain: &str) -> Vec<String> {
        self.domain_index
            .get(domain)
            .map(|ids| ids.clone())
            .unwrap_or_default()
    }

    /// All current records for a domain
    pub fn domain_records(&self, domain: &str) -> Vec<EntityRecord> {
        self.entity_ids(domain)
            .iter()
            .filter_map(|id| self.get(id))
            .collect()
    }

    /// All current records
    pub fn all(&self) -> Vec<EntityRecord> {
        self.records.iter().map(|r| r.value().clone()).collect()
    }

    /// All domains with at least one known entity
    pub fn domains(&self) -> Vec<String> {
        self.domain_index.iter().map(|r| r.key().clone()).collect()
    }

    /// Number of known entities
    pub fn entity_count(&self) -> usize {
        self.records.len()
    }

    /// History of one entity over the trailing `window`, in log order
    pub fn history(&self, entity_id: &EntityId, window: Duration) -> Vec<StateEvent> {
        let cutoff = Utc::now() - window;
        let history = self.history.read().expect("history lock poisoned");
        history
            .get(entity_id)
            .map(|log| {
                log.iter()
                    .filter(|e| e.timestamp >= cutoff)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Take an immutable snapshot of all events in the trailing `window`
    #[instrument(skip(self))]
    pub fn events_window(&self, window: Duration) -> EventLogSnapshot {
        let taken_at = Utc::now();
        let cutoff = taken_at - window;
        let history = self.history.read().expect("history lock poisoned");

        let mut events: Vec<StateEvent> = history
            .values()
            .flat_map(|log| log.iter().filter(|e| e.timestamp >= cutoff).cloned())
            .collect();
        events.sort_by_key(|e| e.timestamp);

        debug!(count = events.len(), "event snapshot taken");
        EventLogSnapshot { events, taken_at }
    }
}

impl Default for EntityStateStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe handle shared across pipeline components
pub type SharedStateStore = Arc<EntityStateStore>;

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> EntityId {
        s.parse().unwrap()
    }

    #[test]
    fn test_upsert_and_get() {
        let store = EntityStateStore::new();
        store
            .upsert(id("light.kitchen"), "on", HashMap::new(), Utc::now())
            .unwrap();

        assert!(store.contains("light.kitchen"));
        assert_eq!(store.get_state("light.kitchen").as_deref(), Some("on"));
        assert_eq!(store.entity_count(), 1);
        assert_eq!(store.entity_ids("light"), vec!["light.kitchen"]);
    }

    #[test]
    fn test_supersede_keeps_last_changed() {
        let store = EntityStateStore::new();
        let t0 = Utc::now();
        let t1 = t0 + Duration::seconds(10);

        store
            .upsert(id("light.kitchen"), "on", HashMap::new(), t0)
            .unwrap();
        let updated = store
            .upsert(id("light.kitchen"), "on", HashMap::new(), t1)
            .unwrap();

        assert_eq!(updated.last_changed, t0);
        assert_eq!(updated.last_updated, t1);
    }

    #[test]
    fn test_history_ordering_violation_is_fatal() {
        let store = EntityStateStore::new();
        let t0 = Utc::now();

        store
            .upsert(id("light.kitchen"), "on", HashMap::new(), t0)
            .unwrap();
        let result = store.upsert(
            id("light.kitchen"),
            "off",
            HashMap::new(),
            t0 - Duration::seconds(1),
        );

        assert!(matches!(result, Err(StoreError::HistoryOrdering { .. })));
        // The record was not superseded by the rejected write
        assert_eq!(store.get_state("light.kitchen").as_deref(), Some("on"));
    }

    #[test]
    fn test_events_window_is_sorted_and_bounded() {
        let store = EntityStateStore::new();
        let now = Utc::now();

        store
            .record_event(StateEvent::new(
                id("light.a"),
                None,
                "on",
                now - Duration::days(30),
            ))
            .unwrap();
        store
            .record_event(StateEvent::new(
                id("light.b"),
                Some("off".into()),
                "on",
                now - Duration::hours(2),
            ))
            .unwrap();
        store
            .record_event(StateEvent::new(
                id("light.a"),
                Some("on".into()),
                "off",
                now - Duration::hours(1),
            ))
            .unwrap();

        let snapshot = store.events_window(Duration::days(7));
        assert_eq!(snapshot.events().len(), 2);
        assert!(snapshot.events()[0].timestamp <= snapshot.events()[1].timestamp);
        assert_eq!(snapshot.transition_count(&id("light.a")), 1);
    }

    #[test]
    fn test_snapshot_is_point_in_time() {
        let store = EntityStateStore::new();
        let now = Utc::now();

        store
            .record_event(StateEvent::new(id("switch.a"), None, "on", now))
            .unwrap();
        let snapshot = store.events_window(Duration::days(1));

        store
            .record_event(StateEvent::new(
                id("switch.a"),
                Some("on".into()),
                "off",
                now + Duration::seconds(1),
            ))
            .unwrap();

        // The snapshot does not see appends made after it was taken
        assert_eq!(snapshot.events().len(), 1);
    }

    #[test]
    fn test_load_record_skips_history() {
        let store = EntityStateStore::new();
        let record = EntityRecord::new(id("sensor.temp"), "21.0", HashMap::new(), Utc::now());
        store.load_record(record);

        assert!(store.contains("sensor.temp"));
        let snapshot = store.events_window(Duration::days(1));
        assert!(snapshot.events().is_empty());
    }
}
