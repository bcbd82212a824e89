//! Automation document nodes: triggers, conditions, actions
//!
//! These are the typed building blocks an automation document is composed
//! from. They serialize to the wire form the external runtime consumes; the
//! runtime, not this core, evaluates them.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Trigger node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "trigger", rename_all = "snake_case")]
pub enum Trigger {
    /// Fires when an entity's state changes
    State(StateTrigger),

    /// Fires at a fixed time of day
    Time(TimeTrigger),

    /// Fires on a recurring time pattern
    TimePattern(TimePatternTrigger),

    /// Fires when a numeric value crosses a threshold
    NumericState(NumericStateTrigger),

    /// Fires at sunrise or sunset
    Sun(SunTrigger),
}

impl Trigger {
    /// The trigger platform name as the runtime knows it
    pub fn platform(&self) -> &'static str {
        match self {
            Trigger::State(_) => "state",
            Trigger::Time(_) => "time",
            Trigger::TimePattern(_) => "time_pattern",
            Trigger::NumericState(_) => "numeric_state",
            Trigger::Sun(_) => "sun",
        }
    }

    /// Entity ids this trigger references
    pub fn entity_refs(&self) -> Vec<&str> {
        match self {
            Trigger::State(t) => t.entity_id.ids(),
            Trigger::NumericState(t) => t.entity_id.ids(),
            Trigger::Time(_) | Trigger::TimePattern(_) | Trigger::Sun(_) => Vec::new(),
        }
    }
}

/// State change trigger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTrigger {
    /// Entity ids to watch
    pub entity_id: EntityIdSpec,

    /// Previous state to match
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<StateMatch>,

    /// New state to match
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<StateMatch>,

    /// How long the new state must hold before firing
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        with = "option_duration_serde"
    )]
    pub r#for: Option<Duration>,
}

impl StateTrigger {
    /// Trigger on an entity reaching a state
    pub fn to_state(entity_id: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            entity_id: EntityIdSpec::Single(entity_id.into()),
            from: None,
            to: Some(StateMatch::Single(to.into())),
            r#for: None,
        }
    }
}

/// Fixed time-of-day trigger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeTrigger {
    /// Time to fire at (HH:MM:SS)
    pub at: NaiveTime,

    /// Weekdays to fire on, 1-7 for Mon-Sun; empty means every day
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub weekday: Vec<u8>,
}

/// Recurring time-pattern trigger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimePatternTrigger {
    /// Hours pattern (e.g. "/2")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hours: Option<String>,

    /// Minutes pattern
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minutes: Option<String>,

    /// Seconds pattern
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seconds: Option<String>,
}

/// Numeric threshold trigger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericStateTrigger {
    /// Entity ids to watch
    pub entity_id: EntityIdSpec,

    /// Attribute to read instead of the state value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,

    /// Fire when the value rises above this
    #[serde(skip_serializing_if = "Option::is_none")]
    pub above: Option<f64>,

    /// Fire when the value drops below this
    #[serde(skip_serializing_if = "Option::is_none")]
    pub below: Option<f64>,
}

/// Sunrise/sunset trigger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SunTrigger {
    /// Which sun event
    pub event: SunEvent,

    /// Offset from the event
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        with = "option_duration_serde"
    )]
    pub offset: Option<Duration>,
}

/// Sun event kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SunEvent {
    Sunrise,
    Sunset,
}

/// Condition node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "condition", rename_all = "snake_case")]
pub enum Condition {
    /// Entity must currently be in a state
    State(StateCondition),

    /// Numeric value must be within thresholds
    NumericState(NumericStateCondition),

    /// Current time must be inside a window
    Time(TimeCondition),
}

impl Condition {
    /// Entity ids this condition references
    pub fn entity_refs(&self) -> Vec<&str> {
        match self {
            Condition::State(c) => c.entity_id.ids(),
            Condition::NumericState(c) => c.entity_id.ids(),
            Condition::Time(_) => Vec::new(),
        }
    }
}

/// State condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateCondition {
    /// Entity ids to check
    pub entity_id: EntityIdSpec,

    /// Required state
    pub state: StateMatch,
}

/// Numeric state condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericStateCondition {
    /// Entity ids to check
    pub entity_id: EntityIdSpec,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub above: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub below: Option<f64>,
}

/// Time window condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeCondition {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<NaiveTime>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<NaiveTime>,
}

/// Action node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Action {
    /// Call a service on a target
    Service(ServiceAction),

    /// Wait before the next step
    Delay(DelayAction),
}

impl Action {
    /// Entity ids this action targets
    pub fn entity_refs(&self) -> Vec<&str> {
        match self {
            Action::Service(a) => a.target.entity_id.ids(),
            Action::Delay(_) => Vec::new(),
        }
    }
}

/// Service call action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceAction {
    /// Service to call, as "domain.service"
    pub service: String,

    /// Call target
    pub target: ActionTarget,

    /// Service data payload
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub data: serde_json::Value,
}

impl ServiceAction {
    /// Build a plain service call against one entity
    pub fn for_entity(service: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            target: ActionTarget {
                entity_id: EntityIdSpec::Single(entity_id.into()),
            },
            data: serde_json::Value::Null,
        }
    }

    /// Attach a data payload
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    /// Split the service into (domain, verb), if well-formed
    pub fn service_parts(&self) -> Option<(&str, &str)> {
        self.service.split_once('.')
    }
}

/// Target of a service action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionTarget {
    /// Entity ids the call applies to
    pub entity_id: EntityIdSpec,
}

/// Delay step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelayAction {
    /// How long to wait
    #[serde(with = "duration_serde")]
    pub delay: Duration,
}

/// Execution mode, passed through opaquely to the external runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Ignore new triggers while running (the runtime's default)
    #[default]
    Single,
    /// Restart on a new trigger
    Restart,
    /// Queue new runs
    Queued,
    /// Run concurrently
    Parallel,
}

// --- Supporting types ---

/// One entity id or a list of them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityIdSpec {
    Single(String),
    List(Vec<String>),
}

impl EntityIdSpec {
    /// All entity ids in declaration order
    pub fn ids(&self) -> Vec<&str> {
        match self {
            EntityIdSpec::Single(id) => vec![id.as_str()],
            EntityIdSpec::List(ids) => ids.iter().map(|s| s.as_str()).collect(),
        }
    }
}

/// One state value or a list of acceptable values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateMatch {
    Single(String),
    List(Vec<String>),
}

impl StateMatch {
    /// Whether `state` is accepted
    pub fn matches(&self, state: &str) -> bool {
        match self {
            StateMatch::Single(s) => s == state,
            StateMatch::List(list) => list.iter().any(|s| s == state),
        }
    }
}

// --- Duration serde helpers (HH:MM:SS wire form) ---

pub(crate) mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_hms(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse_hms(&s).map_err(serde::de::Error::custom)
    }

    pub(crate) fn format_hms(d: &Duration) -> String {
        let secs = d.as_secs();
        format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
    }

    pub(crate) fn parse_hms(s: &str) -> Result<Duration, String> {
        let parts: Vec<&str> = s.split(':').collect();
        let parse = |p: &str, what: &str| -> Result<u64, String> {
            p.parse().map_err(|_| format!("invalid {}", what))
        };
        match parts.as_slice() {
            [secs] => Ok(Duration::from_secs(parse(secs, "seconds")?)),
            [mins, secs] => Ok(Duration::from_secs(
                parse(mins, "minutes")? * 60 + parse(secs, "seconds")?,
            )),
            [hours, mins, secs] => Ok(Duration::from_secs(
                parse(hours, "hours")? * 3600 + parse(mins, "minutes")? * 60 + parse(secs, "seconds")?,
            )),
            _ => Err("invalid duration format".to_string()),
        }
    }
}

pub(crate) mod option_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_str(&super::duration_serde::format_hms(d)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        let opt: Option<String> = Option::deserialize(deserializer)?;
        opt.map(|s| super::duration_serde::parse_hms(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_trigger_wire_form() {
        let trigger = Trigger::State(StateTrigger::to_state("binary_sensor.motion", "on"));
        let json = serde_json::to_value(&trigger).unwrap();
        assert_eq!(json["trigger"], "state");
        assert_eq!(json["entity_id"], "binary_sensor.motion");
        assert_eq!(json["to"], "on");
    }

    #[test]
    fn test_trigger_roundtrip() {
        let json = r#"{
            "trigger": "state",
            "entity_id": "light.hall",
            "from": "off",
            "to": "on",
            "for": "00:01:30"
        }"#;
        let trigger: Trigger = serde_json::from_str(json).unwrap();
        let Trigger::State(state) = &trigger else {
            panic!("expected state trigger");
        };
        assert_eq!(state.r#for, Some(Duration::from_secs(90)));
        assert!(state.to.as_ref().unwrap().matches("on"));
    }

    #[test]
    fn test_entity_refs() {
        let trigger = Trigger::State(StateTrigger {
            entity_id: EntityIdSpec::List(vec!["light.a".into(), "light.b".into()]),
            from: None,
            to: None,
            r#for: None,
        });
        assert_eq!(trigger.entity_refs(), vec!["light.a", "light.b"]);

        let sun = Trigger::Sun(SunTrigger {
            event: SunEvent::Sunset,
            offset: None,
        });
        assert!(sun.entity_refs().is_empty());
    }

    #[test]
    fn test_service_action() {
        let action = ServiceAction::for_entity("light.turn_on", "light.hall")
            .with_data(serde_json::json!({"brightness": 200}));

        assert_eq!(action.service_parts(), Some(("light", "turn_on")));
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["target"]["entity_id"], "light.hall");
        assert_eq!(json["data"]["brightness"], 200);
    }

    #[test]
    fn test_delay_action_untagged() {
        let json = r#"{"delay": "00:00:05"}"#;
        let action: Action = serde_json::from_str(json).unwrap();
        assert!(matches!(
            action,
            Action::Delay(DelayAction { delay }) if delay == Duration::from_secs(5)
        ));
    }

    #[test]
    fn test_execution_mode_default() {
        assert_eq!(ExecutionMode::default(), ExecutionMode::Single);
        let json = serde_json::to_value(ExecutionMode::Single).unwrap();
        assert_eq!(json, "single");
    }
}
