//! Script and scene document nodes

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::automation::Action;

/// A script: a named action sequence the runtime executes on demand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptDoc {
    /// Display name
    pub alias: String,

    /// What the script does
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Steps in execution order
    pub sequence: Vec<Action>,
}

/// A scene: a set of entities pinned to desired states
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDoc {
    /// Display name
    pub name: String,

    /// Scene icon
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    /// Desired state per entity, in declaration order
    pub entities: IndexMap<String, SceneState>,
}

/// Desired state of one entity within a scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SceneState {
    /// Bare state value
    State(String),

    /// State value plus attributes
    Full {
        state: String,
        #[serde(flatten)]
        attributes: IndexMap<String, serde_json::Value>,
    },
}

impl SceneState {
    /// The desired state value
    pub fn state(&self) -> &str {
        match self {
            SceneState::State(s) => s,
            SceneState::Full { state, .. } => state,
        }
    }
}
