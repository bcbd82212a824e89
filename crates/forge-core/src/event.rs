//! State-change event type

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::EntityId;

/// One element of the append-only state-change log
///
/// Events are never reordered or mutated once appended; per-entity ordering
/// is monotonic by `timestamp`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateEvent {
    /// The entity whose state changed
    pub entity_id: EntityId,

    /// The state before the change; None for the first observation
    pub old_state: Option<String>,

    /// The state after the change
    pub new_state: String,

    /// When the change happened
    pub timestamp: DateTime<Utc>,
}

impl StateEvent {
    /// Create a new event
    pub fn new(
        entity_id: EntityId,
        old_state: Option<String>,
        new_state: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            entity_id,
            old_state,
            new_state: new_state.into(),
            timestamp,
        }
    }

    /// Whether the event represents an actual value transition
    ///
    /// First observations and same-value rewrites are not transitions.
    pub fn is_transition(&self) -> bool {
        match &self.old_state {
            Some(old) => old != &self.new_state,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_transition() {
        let id: EntityId = "light.hall".parse().unwrap();
        let now = Utc::now();

        let fresh = StateEvent::new(id.clone(), None, "on", now);
        assert!(!fresh.is_transition());

        let same = StateEvent::new(id.clone(), Some("on".into()), "on", now);
        assert!(!same.is_transition());

        let flip = StateEvent::new(id, Some("off".into()), "on", now);
        assert!(flip.is_transition());
    }
}
