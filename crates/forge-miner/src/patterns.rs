//! Co-occurrence pattern mining over the event-log snapshot
//!
//! The miner is a heuristic statistical process: it buckets transitions by
//! hour-of-day and weekday, counts lagged co-occurrences between entity
//! pairs, and emits candidates ranked by confidence. False positives are
//! expected; nothing mined here is ever deployed without explicit
//! confirmation downstream.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{Datelike, Timelike, Weekday};
use forge_core::{domains, EntityId};
use forge_store::EventLogSnapshot;
use tracing::{debug, instrument};

use crate::MinerConfig;

/// Transition counts of one entity, bucketed by (weekday, hour-of-day)
#[derive(Debug, Clone, Default)]
pub struct ActivityProfile {
    buckets: HashMap<(Weekday, u32), u64>,
    total: u64,
}

impl ActivityProfile {
    fn add(&mut self, weekday: Weekday, hour: u32) {
        *self.buckets.entry((weekday, hour)).or_default() += 1;
        self.total += 1;
    }

    /// Transitions observed in one bucket
    pub fn bucket(&self, weekday: Weekday, hour: u32) -> u64 {
        self.buckets.get(&(weekday, hour)).copied().unwrap_or(0)
    }

    /// Total transitions across all buckets
    pub fn total_transitions(&self) -> u64 {
        self.total
    }

    /// The busiest bucket, if any transitions were observed
    pub fn peak(&self) -> Option<((Weekday, u32), u64)> {
        self.buckets
            .iter()
            .max_by_key(|(key, count)| (**count, std::cmp::Reverse(key.1)))
            .map(|(key, count)| (*key, *count))
    }
}

/// A mined trigger/effect pattern with its statistics
#[derive(Debug, Clone, PartialEq)]
pub struct CandidatePattern {
    /// Entity whose transition opens the window
    pub trigger_entity: EntityId,
    /// State the trigger entity transitions to
    pub trigger_state: String,
    /// Entity observed to follow within the lag window
    pub effect_entity: EntityId,
    /// State the effect entity transitions to
    pub effect_state: String,
    /// Number of observed co-occurrences
    pub support: u64,
    /// support / trigger-entity transition count, in [0, 1]
    pub confidence: f64,
}

/// The pattern miner
pub struct PatternMiner {
    config: MinerConfig,
}

impl PatternMiner {
    /// Create a miner with the given knobs
    pub fn new(config: MinerConfig) -> Self {
        Self { config }
    }

    /// Per-entity activity profiles over the snapshot
    pub fn activity_profiles(
        &self,
        snapshot: &EventLogSnapshot,
    ) -> HashMap<EntityId, ActivityProfile> {
        let mut profiles: HashMap<EntityId, ActivityProfile> = HashMap::new();
        for event in snapshot.events() {
            if !event.is_transition() {
                continue;
            }
            profiles.entry(event.entity_id.clone()).or_default().add(
                event.timestamp.weekday(),
                event.timestamp.hour(),
            );
        }
        profiles
    }

    /// Mine the snapshot for qualifying patterns
    ///
    /// Returns patterns with `support >= suggestion_threshold` and
    /// `confidence >= min_confidence`, sorted by confidence descending,
    /// support descending, then entity ids lexicographically.
    pub fn analyze(&self, snapshot: &EventLogSnapshot) -> Vec<CandidatePattern> {
        let never = AtomicBool::new(false);
        self.analyze_with_cancel(snapshot, &never)
    }

    /// Like [`PatternMiner::analyze`], checking `cancel` between per-entity
    /// batches; a batch that has started always runs to completion
    #[instrument(skip(self, snapshot, cancel))]
    pub fn analyze_with_cancel(
        &self,
        snapshot: &EventLogSnapshot,
        cancel: &AtomicBool,
    ) -> Vec<CandidatePattern> {
        let events = snapshot.events();

        // Transition indices per trigger entity, in timeline order. BTreeMap
        // keeps batch order deterministic.
        let mut by_entity: BTreeMap<EntityId, Vec<usize>> = BTreeMap::new();
        let mut transition_counts: HashMap<EntityId, u64> = HashMap::new();
        for (i, event) in events.iter().enumerate() {
            if !event.is_transition() {
                continue;
            }
            by_entity.entry(event.entity_id.clone()).or_default().push(i);
            *transition_counts.entry(event.entity_id.clone()).or_default() += 1;
        }

        let mut co_occurrences: HashMap<(EntityId, String, EntityId, String), u64> =
            HashMap::new();

        for (trigger_entity, indices) in &by_entity {
            if cancel.load(Ordering::Relaxed) {
                debug!(%trigger_entity, "mining cancelled between batches");
                break;
            }
            for &i in indices {
                let trigger = &events[i];
                // Each trigger occurrence contributes at most once per
                // distinct effect, keeping support <= trigger transitions
                let mut seen: HashSet<(&EntityId, &str)> = HashSet::new();

                for effect in &events[i + 1..] {
                    let dt = effect.timestamp - trigger.timestamp;
                    if dt > self.config.lag {
                        break;
                    }
                    if dt <= chrono::Duration::zero()
                        || !effect.is_transition()
                        || effect.entity_id == trigger.entity_id
                        || domains::is_readonly_domain(effect.entity_id.domain())
                    {
                        continue;
                    }
                    if seen.insert((&effect.entity_id, effect.new_state.as_str())) {
                        *co_occurrences
                            .entry((
                                trigger_entity.clone(),
                                trigger.new_state.clone(),
                                effect.entity_id.clone(),
                                effect.new_state.clone(),
                            ))
                            .or_default() += 1;
                    }
                }
            }
        }

        let mut patterns: Vec<CandidatePattern> = co_occurrences
            .into_iter()
            .filter(|(_, support)| *support >= self.config.suggestion_threshold)
            .filter_map(|((trigger_entity, trigger_state, effect_entity, effect_state), support)| {
                let transitions = transition_counts.get(&trigger_entity).copied()?;
                if transitions == 0 {
                    return None;
                }
                let confidence = support as f64 / transitions as f64;
                if confidence < self.config.min_confidence {
                    return None;
                }
                Some(CandidatePattern {
                    trigger_entity,
                    trigger_state,
                    effect_entity,
                    effect_state,
                    support,
                    confidence,
                })
            })
            .collect();

        patterns.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then(b.support.cmp(&a.support))
                .then_with(|| {
                    (&a.trigger_entity, &a.effect_entity)
                        .cmp(&(&b.trigger_entity, &b.effect_entity))
                })
        });

        debug!(patterns = patterns.len(), "mining finished");
        patterns
    }
}

/// Build the events a pattern test fixture needs: trigger then effect
#[cfg(test)]
pub(crate) fn transition(
    entity: &str,
    from: &str,
    to: &str,
    at: chrono::DateTime<chrono::Utc>,
) -> forge_core::StateEvent {
    forge_core::StateEvent::new(entity.parse().unwrap(), Some(from.to_string()), to, at)
}
