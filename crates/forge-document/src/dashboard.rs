//! Dashboard document nodes

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A dashboard: named views of cards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    /// Dashboard title
    pub title: String,

    /// Frontend theme to apply
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,

    /// Views in display order
    pub views: Vec<View>,
}

/// One dashboard view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct View {
    /// View title
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// URL path segment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// View icon
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    /// Cards in display order
    #[serde(default)]
    pub cards: Vec<Card>,
}

impl View {
    /// Create a view titled `title` with a path derived from it
    pub fn titled(title: impl Into<String>) -> Self {
        let title = title.into();
        let path = slugify(&title);
        Self {
            title: Some(title),
            path: Some(path),
            icon: None,
            cards: Vec::new(),
        }
    }
}

/// A dashboard card
///
/// The card vocabulary is open-ended; known fields are typed and everything
/// else rides in `extra`, which flattens into the serialized card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    /// Card type (e.g. "light", "thermostat", "entities")
    #[serde(rename = "type")]
    pub card_type: String,

    /// Single entity the card shows
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,

    /// Entity list for multi-entity cards
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entities: Vec<String>,

    /// Display name override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Icon override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    /// Any further card options
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_json::Value>,
}

impl Card {
    /// All entity ids the card references
    pub fn entity_refs(&self) -> Vec<&str> {
        let mut refs: Vec<&str> = self.entity.iter().map(|s| s.as_str()).collect();
        refs.extend(self.entities.iter().map(|s| s.as_str()));
        refs
    }
}

/// Lowercased, underscore-separated slug of a title
pub fn slugify(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut last_was_sep = true;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_was_sep = false;
        } else if !last_was_sep {
            out.push('_');
            last_was_sep = true;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Living Room"), "living_room");
        assert_eq!(slugify("  Overview!  "), "overview");
        assert_eq!(slugify("2nd Floor / East"), "2nd_floor_east");
    }

    #[test]
    fn test_view_titled() {
        let view = View::titled("Ground Floor");
        assert_eq!(view.title.as_deref(), Some("Ground Floor"));
        assert_eq!(view.path.as_deref(), Some("ground_floor"));
    }

    #[test]
    fn test_card_extra_flattens() {
        let mut extra = IndexMap::new();
        extra.insert("show_state".to_string(), serde_json::json!(true));
        let card = Card {
            card_type: "light".to_string(),
            entity: Some("light.hall".to_string()),
            entities: Vec::new(),
            name: None,
            icon: None,
            extra,
        };

        let json = serde_json::to_value(&card).unwrap();
        assert_eq!(json["type"], "light");
        assert_eq!(json["show_state"], true);
        assert_eq!(card.entity_refs(), vec!["light.hall"]);
    }
}
