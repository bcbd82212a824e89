//! Entity ID type representing a domain.object_id pair

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for invalid entity IDs
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EntityIdError {
    #[error("entity id must be of the form 'domain.object_id'")]
    InvalidFormat,

    #[error("domain '{0}' is not valid (lowercase alphanumeric and single underscores only)")]
    InvalidDomain(String),

    #[error("object_id '{0}' is not valid (lowercase alphanumeric and underscores only)")]
    InvalidObjectId(String),
}

/// An addressable smart-home object, identified as `domain.object_id`
///
/// The domain determines which actions the object supports; the object_id
/// names the concrete instance (e.g. "light.kitchen"). Both parts follow the
/// external system's slug rules: lowercase alphanumeric plus underscores,
/// never starting or ending with an underscore, and no double underscore in
/// the domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId {
    domain: String,
    object_id: String,
}

impl EntityId {
    /// Create an EntityId from its two parts, validating both
    pub fn new(
        domain: impl Into<String>,
        object_id: impl Into<String>,
    ) -> Result<Self, EntityIdError> {
        let domain = domain.into();
        let object_id = object_id.into();

        if !is_valid_slug(&domain) || domain.contains("__") {
            return Err(EntityIdError::InvalidDomain(domain));
        }
        if !is_valid_slug(&object_id) {
            return Err(EntityIdError::InvalidObjectId(object_id));
        }

        Ok(Self { domain, object_id })
    }

    /// The domain part (e.g. "light")
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// The object_id part (e.g. "kitchen")
    pub fn object_id(&self) -> &str {
        &self.object_id
    }
}

/// Slug rule shared by domain and object_id: `(?!_)[\da-z_]+(?<!_)`
fn is_valid_slug(s: &str) -> bool {
    if s.is_empty() || s.starts_with('_') || s.ends_with('_') {
        return false;
    }
    s.chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

impl FromStr for EntityId {
    type Err = EntityIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('.') {
            Some((domain, object_id)) if !object_id.contains('.') => {
                Self::new(domain, object_id)
            }
            _ => Err(EntityIdError::InvalidFormat),
        }
    }
}

impl TryFrom<String> for EntityId {
    type Error = EntityIdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> String {
        id.to_string()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.domain, self.object_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_entity_id() {
        let id = EntityId::new("light", "kitchen").unwrap();
        assert_eq!(id.domain(), "light");
        assert_eq!(id.object_id(), "kitchen");
        assert_eq!(id.to_string(), "light.kitchen");
    }

    #[test]
    fn test_parse() {
        let id: EntityId = "binary_sensor.front_door".parse().unwrap();
        assert_eq!(id.domain(), "binary_sensor");
        assert_eq!(id.object_id(), "front_door");
    }

    #[test]
    fn test_invalid_format() {
        assert_eq!(
            "no_dot".parse::<EntityId>().unwrap_err(),
            EntityIdError::InvalidFormat
        );
        assert_eq!(
            "a.b.c".parse::<EntityId>().unwrap_err(),
            EntityIdError::InvalidFormat
        );
    }

    #[test]
    fn test_invalid_parts() {
        assert!(matches!(
            ".kitchen".parse::<EntityId>().unwrap_err(),
            EntityIdError::InvalidDomain(_)
        ));
        assert!(matches!(
            "light.".parse::<EntityId>().unwrap_err(),
            EntityIdError::InvalidObjectId(_)
        ));
        assert!(matches!(
            "Light.kitchen".parse::<EntityId>().unwrap_err(),
            EntityIdError::InvalidDomain(_)
        ));
        assert!(matches!(
            "light.Kitchen".parse::<EntityId>().unwrap_err(),
            EntityIdError::InvalidObjectId(_)
        ));
    }

    #[test]
    fn test_underscore_rules() {
        assert!(matches!(
            "_light.room".parse::<EntityId>().unwrap_err(),
            EntityIdError::InvalidDomain(_)
        ));
        assert!(matches!(
            "light.room_".parse::<EntityId>().unwrap_err(),
            EntityIdError::InvalidObjectId(_)
        ));
        assert!(matches!(
            "my__light.room".parse::<EntityId>().unwrap_err(),
            EntityIdError::InvalidDomain(_)
        ));
        // Double underscore is only rejected in the domain
        assert!("light.my__room".parse::<EntityId>().is_ok());
        assert!("media_player.living_room".parse::<EntityId>().is_ok());
    }

    #[test]
    fn test_serde_string_roundtrip() {
        let id = EntityId::new("switch", "garage").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"switch.garage\"");

        let parsed: EntityId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }
}
