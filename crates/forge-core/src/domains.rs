//! Domain metadata: supported actions, read-only domains, display defaults
//!
//! A domain (the prefix of an entity id) determines which control actions an
//! entity accepts and which display defaults a dashboard card gets.

use std::collections::HashMap;

/// Domains that only report state and accept no control actions
pub static READONLY_DOMAINS: &[&str] = &[
    "sensor",
    "binary_sensor",
    "weather",
    "device_tracker",
    "sun",
    "zone",
    "person",
    "calendar",
];

/// Check if a domain is read-only (no control actions)
pub fn is_readonly_domain(domain: &str) -> bool {
    READONLY_DOMAINS.contains(&domain)
}

fn specific_actions() -> HashMap<&'static str, Vec<&'static str>> {
    [
        (
            "climate",
            vec![
                "turn_on",
                "turn_off",
                "toggle",
                "set_hvac_mode",
                "set_preset_mode",
                "set_temperature",
                "set_humidity",
                "set_fan_mode",
            ],
        ),
        (
            "cover",
            vec![
                "open_cover",
                "close_cover",
                "stop_cover",
                "set_cover_position",
                "toggle",
            ],
        ),
        (
            "fan",
            vec![
                "turn_on",
                "turn_off",
                "toggle",
                "set_percentage",
                "set_preset_mode",
                "oscillate",
            ],
        ),
        ("lock", vec!["lock", "unlock", "open"]),
        (
            "media_player",
            vec![
                "turn_on",
                "turn_off",
                "toggle",
                "volume_set",
                "volume_mute",
                "media_play",
                "media_pause",
                "media_stop",
                "play_media",
                "select_source",
            ],
        ),
        (
            "vacuum",
            vec![
                "turn_on",
                "turn_off",
                "toggle",
                "start",
                "pause",
                "stop",
                "return_to_base",
            ],
        ),
        (
            "humidifier",
            vec!["turn_on", "turn_off", "toggle", "set_humidity", "set_mode"],
        ),
    ]
    .into_iter()
    .collect()
}

/// The set of control actions an entity in `domain` supports
///
/// - `None` for read-only domains
/// - the domain-specific set where one is defined
/// - `["turn_on", "turn_off", "toggle"]` for every other controllable domain
pub fn supported_actions(domain: &str) -> Option<Vec<&'static str>> {
    if is_readonly_domain(domain) {
        return None;
    }

    match specific_actions().remove(domain) {
        Some(actions) => Some(actions),
        None => Some(vec!["turn_on", "turn_off", "toggle"]),
    }
}

/// Check whether `action` is a supported control action for `domain`
pub fn supports_action(domain: &str, action: &str) -> bool {
    supported_actions(domain)
        .map(|actions| actions.contains(&action))
        .unwrap_or(false)
}

/// Default icon for a domain, used when a card does not set one
pub fn icon_for_domain(domain: &str) -> &'static str {
    match domain {
        "light" => "mdi:lightbulb",
        "switch" => "mdi:toggle-switch",
        "sensor" => "mdi:eye",
        "binary_sensor" => "mdi:checkbox-marked-circle",
        "climate" => "mdi:thermostat",
        "weather" => "mdi:weather-cloudy",
        "media_player" => "mdi:play-circle",
        "camera" => "mdi:video",
        "cover" => "mdi:window-shutter",
        "fan" => "mdi:fan",
        "vacuum" => "mdi:robot-vacuum",
        "person" => "mdi:account",
        "device_tracker" => "mdi:cellphone",
        "automation" => "mdi:robot",
        "script" => "mdi:script-text",
        "scene" => "mdi:palette",
        "sun" => "mdi:white-balance-sunny",
        _ => "mdi:home-assistant",
    }
}

/// Derive a human-readable name from an object_id
///
/// "outdoor_temperature" becomes "Outdoor Temperature".
pub fn derive_friendly_name(object_id: &str) -> String {
    object_id
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readonly_domains() {
        assert!(is_readonly_domain("sensor"));
        assert!(is_readonly_domain("binary_sensor"));
        assert!(!is_readonly_domain("light"));
        assert_eq!(supported_actions("sensor"), None);
    }

    #[test]
    fn test_specific_actions() {
        let climate = supported_actions("climate").unwrap();
        assert!(climate.contains(&"set_hvac_mode"));
        let lock = supported_actions("lock").unwrap();
        assert!(lock.contains(&"unlock"));
        assert!(!lock.contains(&"turn_on"));
    }

    #[test]
    fn test_default_actions() {
        let light = supported_actions("light").unwrap();
        assert_eq!(light, vec!["turn_on", "turn_off", "toggle"]);
        assert!(supports_action("switch", "toggle"));
        assert!(!supports_action("switch", "set_hvac_mode"));
        assert!(!supports_action("sensor", "turn_on"));
    }

    #[test]
    fn test_derive_friendly_name() {
        assert_eq!(derive_friendly_name("kitchen"), "Kitchen");
        assert_eq!(derive_friendly_name("front_door_lock"), "Front Door Lock");
    }

    #[test]
    fn test_icons() {
        assert_eq!(icon_for_domain("light"), "mdi:lightbulb");
        assert_eq!(icon_for_domain("something_else"), "mdi:home-assistant");
    }
}
