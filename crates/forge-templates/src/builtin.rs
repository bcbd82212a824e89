//! Built-in card and block templates
//!
//! Cards render to dashboard card nodes; blocks render to the typed
//! trigger/condition/action wire forms. All of them are pure value
//! transformations.

use forge_core::domains;
use serde_json::{json, Value};

use crate::{Template, TemplateLibrary, TemplateParams};

/// The fixed domain-to-card template mapping used for dashboard synthesis
///
/// Unrecognized domains fall back to the generic entities card.
pub fn card_for_domain(domain: &str) -> &'static str {
    match domain {
        "light" => "light-card",
        "sensor" => "sensor-card",
        "climate" => "thermostat-card",
        _ => "entities-card",
    }
}

pub(crate) fn register_all(library: &mut TemplateLibrary) {
    // Registration of a fixed built-in set cannot collide
    let register = |library: &mut TemplateLibrary, template: Template| {
        library
            .register(template)
            .unwrap_or_else(|e| unreachable!("builtin template collision: {}", e));
    };

    register(
        library,
        Template::new("light-card", &["entity"], light_card)
            .with_default("icon", json!(domains::icon_for_domain("light"))),
    );
    register(
        library,
        Template::new("sensor-card", &["entity"], sensor_card)
            .with_default("graph", json!("line")),
    );
    register(
        library,
        Template::new("thermostat-card", &["entity"], thermostat_card),
    );
    register(
        library,
        Template::new("entities-card", &["entities"], entities_card),
    );
    register(
        library,
        Template::new("glance-card", &["entities"], glance_card),
    );

    register(
        library,
        Template::new("state-trigger", &["entity_id", "to"], state_trigger),
    );
    register(
        library,
        Template::new("time-trigger", &["at"], time_trigger),
    );
    register(
        library,
        Template::new("state-condition", &["entity_id", "state"], state_condition),
    );
    register(
        library,
        Template::new("service-action", &["service", "entity_id"], service_action),
    );
}

fn optional<'a>(params: &'a TemplateParams, key: &str) -> Option<&'a Value> {
    params.get(key).filter(|v| !v.is_null())
}

fn light_card(params: &TemplateParams) -> Value {
    let mut card = json!({
        "type": "light",
        "entity": params["entity"],
        "icon": params["icon"],
    });
    if let Some(name) = optional(params, "name") {
        card["name"] = name.clone();
    }
    card
}

fn sensor_card(params: &TemplateParams) -> Value {
    let mut card = json!({
        "type": "sensor",
        "entity": params["entity"],
        "graph": params["graph"],
    });
    if let Some(name) = optional(params, "name") {
        card["name"] = name.clone();
    }
    card
}

fn thermostat_card(params: &TemplateParams) -> Value {
    json!({
        "type": "thermostat",
        "entity": params["entity"],
    })
}

fn entities_card(params: &TemplateParams) -> Value {
    let mut card = json!({
        "type": "entities",
        "entities": params["entities"],
    });
    if let Some(title) = optional(params, "title") {
        card["title"] = title.clone();
    }
    if let Some(icon) = optional(params, "icon") {
        card["icon"] = icon.clone();
    }
    card
}

fn glance_card(params: &TemplateParams) -> Value {
    let mut card = json!({
        "type": "glance",
        "entities": params["entities"],
    });
    if let Some(title) = optional(params, "title") {
        card["title"] = title.clone();
    }
    card
}

fn state_trigger(params: &TemplateParams) -> Value {
    let mut node = json!({
        "trigger": "state",
        "entity_id": params["entity_id"],
        "to": params["to"],
    });
    if let Some(from) = optional(params, "from") {
        node["from"] = from.clone();
    }
    if let Some(hold) = optional(params, "for") {
        node["for"] = hold.clone();
    }
    node
}

fn time_trigger(params: &TemplateParams) -> Value {
    let mut node = json!({
        "trigger": "time",
        "at": params["at"],
    });
    if let Some(weekday) = optional(params, "weekday") {
        node["weekday"] = weekday.clone();
    }
    node
}

fn state_condition(params: &TemplateParams) -> Value {
    json!({
        "condition": "state",
        "entity_id": params["entity_id"],
        "state": params["state"],
    })
}

fn service_action(params: &TemplateParams) -> Value {
    let mut node = json!({
        "service": params["service"],
        "target": {"entity_id": params["entity_id"]},
    });
    if let Some(data) = optional(params, "data") {
        node["data"] = data.clone();
    }
    node
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params;

    #[test]
    fn test_card_for_domain_mapping() {
        assert_eq!(card_for_domain("light"), "light-card");
        assert_eq!(card_for_domain("sensor"), "sensor-card");
        assert_eq!(card_for_domain("climate"), "thermostat-card");
        assert_eq!(card_for_domain("switch"), "entities-card");
        assert_eq!(card_for_domain("made_up"), "entities-card");
    }

    #[test]
    fn test_light_card_defaults_icon() {
        let library = TemplateLibrary::builtin();
        let node = library
            .render("light-card", &params(&[("entity", json!("light.hall"))]))
            .unwrap();
        assert_eq!(node["icon"], "mdi:lightbulb");
        assert!(node.get("name").is_none());
    }

    #[test]
    fn test_state_trigger_block() {
        let library = TemplateLibrary::builtin();
        let node = library
            .render(
                "state-trigger",
                &params(&[
                    ("entity_id", json!("binary_sensor.motion")),
                    ("to", json!("on")),
                    ("for", json!("00:00:10")),
                ]),
            )
            .unwrap();
        assert_eq!(node["trigger"], "state");
        assert_eq!(node["for"], "00:00:10");
    }

    #[test]
    fn test_service_action_block() {
        let library = TemplateLibrary::builtin();
        let node = library
            .render(
                "service-action",
                &params(&[
                    ("service", json!("light.turn_on")),
                    ("entity_id", json!("light.hall")),
                ]),
            )
            .unwrap();
        assert_eq!(node["target"]["entity_id"], "light.hall");
        assert!(node.get("data").is_none());
    }
}
