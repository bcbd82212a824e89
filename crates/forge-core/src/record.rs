//! Entity snapshot type

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{domains, EntityId};

/// An immutable snapshot of an entity at a point in time
///
/// A record is never mutated in place; a state change supersedes the whole
/// record atomically via [`EntityRecord::superseded_by`]. `last_changed`
/// survives a supersede whose state value is identical, `last_updated` does
/// not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRecord {
    /// The entity this snapshot belongs to
    pub id: EntityId,

    /// Current state value (e.g. "on", "21.5", "unavailable")
    pub state: String,

    /// Open-ended attribute map; use the typed accessors for known keys
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,

    /// When the state value last changed
    pub last_changed: DateTime<Utc>,

    /// When this record was last written, even without a value change
    pub last_updated: DateTime<Utc>,
}

impl EntityRecord {
    /// Create a fresh record with both timestamps set to `at`
    pub fn new(
        id: EntityId,
        state: impl Into<String>,
        attributes: HashMap<String, serde_json::Value>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            state: state.into(),
            attributes,
            last_changed: at,
            last_updated: at,
        }
    }

    /// Build the record that atomically supersedes this one
    pub fn superseded_by(
        &self,
        new_state: impl Into<String>,
        new_attributes: HashMap<String, serde_json::Value>,
        at: DateTime<Utc>,
    ) -> Self {
        let new_state = new_state.into();
        let changed = self.state != new_state;

        Self {
            id: self.id.clone(),
            state: new_state,
            attributes: new_attributes,
            last_changed: if changed { at } else { self.last_changed },
            last_updated: at,
        }
    }

    /// Whether the entity is currently unreachable
    pub fn is_unavailable(&self) -> bool {
        self.state == crate::STATE_UNAVAILABLE
    }

    /// Whether the entity has no known state
    pub fn is_unknown(&self) -> bool {
        self.state == crate::STATE_UNKNOWN
    }

    /// Deserialize an attribute into a concrete type, if present and valid
    pub fn attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Display name: the `friendly_name` attribute, or one derived from the id
    pub fn friendly_name(&self) -> String {
        self.attribute::<String>("friendly_name")
            .unwrap_or_else(|| domains::derive_friendly_name(self.id.object_id()))
    }

    /// The `device_class` attribute (e.g. "motion", "temperature")
    pub fn device_class(&self) -> Option<String> {
        self.attribute("device_class")
    }

    /// The `unit_of_measurement` attribute
    pub fn unit_of_measurement(&self) -> Option<String> {
        self.attribute("unit_of_measurement")
    }

    /// The `supported_features` capability bitmask, 0 if unset
    pub fn supported_features(&self) -> u32 {
        self.attribute("supported_features").unwrap_or(0)
    }
}

impl PartialEq for EntityRecord {
    fn eq(&self, other: &Self) -> bool {
        // Timestamps are not part of record identity
        self.id == other.id && self.state == other.state && self.attributes == other.attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(state: &str) -> EntityRecord {
        let mut attributes = HashMap::new();
        attributes.insert("friendly_name".to_string(), json!("Kitchen Light"));
        attributes.insert("supported_features".to_string(), json!(44));
        EntityRecord::new(
            EntityId::new("light", "kitchen").unwrap(),
            state,
            attributes,
            Utc::now(),
        )
    }

    #[test]
    fn test_supersede_preserves_last_changed_on_same_state() {
        let first = record("on");
        let later = first.last_updated + chrono::Duration::seconds(30);

        let same = first.superseded_by("on", first.attributes.clone(), later);
        assert_eq!(same.last_changed, first.last_changed);
        assert_eq!(same.last_updated, later);

        let changed = first.superseded_by("off", first.attributes.clone(), later);
        assert_eq!(changed.last_changed, later);
    }

    #[test]
    fn test_typed_accessors() {
        let r = record("on");
        assert_eq!(r.friendly_name(), "Kitchen Light");
        assert_eq!(r.supported_features(), 44);
        assert_eq!(r.device_class(), None);
    }

    #[test]
    fn test_derived_friendly_name() {
        let r = EntityRecord::new(
            EntityId::new("sensor", "outdoor_temperature").unwrap(),
            "12.5",
            HashMap::new(),
            Utc::now(),
        );
        assert_eq!(r.friendly_name(), "Outdoor Temperature");
    }

    #[test]
    fn test_equality_ignores_timestamps() {
        let a = record("on");
        let later = a.last_updated + chrono::Duration::minutes(5);
        let b = a.superseded_by("on", a.attributes.clone(), later);
        assert_eq!(a, b);
    }
}
