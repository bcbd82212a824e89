//! Typed configuration documents
//!
//! A [`ConfigDocument`] wraps a typed node tree (`body`), the YAML produced
//! from it by the one central serializer (`raw_form`), a stable `logical_id`,
//! and the document's place in the validation lifecycle:
//!
//! ```text
//! synthesized -> validated -> tested -> deployed | rejected
//! ```
//!
//! A document never reaches deployment without being Valid and passing a
//! staged test.

pub mod automation;
pub mod dashboard;
pub mod scripted;
pub mod serializer;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use automation::{
    Action, ActionTarget, Condition, DelayAction, EntityIdSpec, ExecutionMode,
    NumericStateCondition, NumericStateTrigger, ServiceAction, StateCondition, StateMatch,
    StateTrigger, SunEvent, SunTrigger, TimeCondition, TimePatternTrigger, TimeTrigger, Trigger,
};
pub use dashboard::{slugify, Card, Dashboard, View};
pub use scripted::{SceneDoc, SceneState, ScriptDoc};

/// Document errors
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("failed to serialize document: {0}")]
    Serialize(#[source] serde_yaml::Error),

    #[error("failed to canonicalize document for hashing: {0}")]
    Canonicalize(#[source] serde_json::Error),
}

/// Result type for document operations
pub type DocumentResult<T> = Result<T, DocumentError>;

/// The kinds of configuration artifacts the pipeline produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Dashboard,
    Automation,
    Script,
    Scene,
}

impl DocumentKind {
    /// Directory-friendly name of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Dashboard => "dashboard",
            DocumentKind::Automation => "automation",
            DocumentKind::Script => "script",
            DocumentKind::Scene => "scene",
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A complete automation document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationDoc {
    /// Stable logical id; filled in when the document is wrapped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    /// What the automation does
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Triggers that start the automation
    pub triggers: Vec<Trigger>,

    /// Conditions that must hold at trigger time
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// Actions the runtime executes
    pub actions: Vec<Action>,

    /// Re-entry mode, interpreted by the external runtime
    #[serde(default)]
    pub mode: ExecutionMode,
}

impl AutomationDoc {
    /// The stable logical id of this automation's semantic content
    ///
    /// Hashes only the trigger/condition/action structure, so alias and
    /// description edits do not change identity and re-synthesis updates in
    /// place instead of duplicating.
    pub fn logical_id(&self) -> DocumentResult<String> {
        let semantic = (&self.triggers, &self.conditions, &self.actions);
        Ok(format!("auto_{}", serializer::content_hash(&semantic)?))
    }
}

/// A typed document body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocumentBody {
    Dashboard(Dashboard),
    Automation(AutomationDoc),
    Script(ScriptDoc),
    Scene(SceneDoc),
}

impl DocumentBody {
    /// The kind of document this body forms
    pub fn kind(&self) -> DocumentKind {
        match self {
            DocumentBody::Dashboard(_) => DocumentKind::Dashboard,
            DocumentBody::Automation(_) => DocumentKind::Automation,
            DocumentBody::Script(_) => DocumentKind::Script,
            DocumentBody::Scene(_) => DocumentKind::Scene,
        }
    }
}

/// The kind of a validation finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueKind {
    /// Structurally incomplete per the document kind's schema
    SchemaError,
    /// Referenced entity does not resolve in the state store
    UnknownEntity,
    /// Control action outside the target domain's supported set
    UnsupportedAction,
    /// Referenced service or integration is not registered
    MissingDependency,
}

/// One validation finding, anchored to a path inside the document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Where in the document (e.g. "triggers[0].entity_id")
    pub path: String,
    /// What kind of problem
    pub kind: IssueKind,
    /// Human-readable explanation
    pub message: String,
}

impl ValidationIssue {
    /// Create an issue
    pub fn new(path: impl Into<String>, kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind,
            message: message.into(),
        }
    }
}

/// Where a document stands in the validation lifecycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum ValidationStatus {
    /// Fresh from the synthesizer
    #[default]
    Unvalidated,
    /// Passed all validator passes
    Valid,
    /// Failed validation; carries the complete finding list
    Invalid(Vec<ValidationIssue>),
}

/// A configuration document moving through the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigDocument {
    /// What kind of artifact this is
    pub kind: DocumentKind,

    /// Stable identity within its kind
    pub logical_id: String,

    /// The typed node tree
    pub body: DocumentBody,

    /// YAML produced by the central serializer
    pub raw_form: String,

    /// Validation lifecycle state
    #[serde(default)]
    pub validation_status: ValidationStatus,
}

impl ConfigDocument {
    /// Wrap a body into a document: derive kind and logical id, serialize
    /// the raw form, and start Unvalidated
    pub fn new(body: DocumentBody) -> DocumentResult<Self> {
        let kind = body.kind();

        let (body, logical_id) = match body {
            DocumentBody::Automation(mut auto) => {
                let id = auto.logical_id()?;
                auto.id = Some(id.clone());
                (DocumentBody::Automation(auto), id)
            }
            DocumentBody::Dashboard(d) => {
                let id = slugify(&d.title);
                (DocumentBody::Dashboard(d), id)
            }
            DocumentBody::Script(s) => {
                let id = slugify(&s.alias);
                (DocumentBody::Script(s), id)
            }
            DocumentBody::Scene(s) => {
                let id = slugify(&s.name);
                (DocumentBody::Scene(s), id)
            }
        };

        let raw_form = serializer::to_yaml(&body)?;
        Ok(Self {
            kind,
            logical_id,
            body,
            raw_form,
            validation_status: ValidationStatus::default(),
        })
    }

    /// Whether the document has passed validation
    pub fn is_valid(&self) -> bool {
        self.validation_status == ValidationStatus::Valid
    }

    /// Return this document with its lifecycle state replaced
    pub fn with_status(mut self, status: ValidationStatus) -> Self {
        self.validation_status = status;
        self
    }
}
