//! Document synthesizer
//!
//! Composes complete configuration documents from structured requests, the
//! template library, and entity metadata read from the state store. Synthesis
//! is purely a transformation: it reads the store, never writes it, and it
//! never validates: a synthesized document enters the pipeline Unvalidated.

use std::str::FromStr;
use std::sync::Arc;

use forge_core::{domains, EntityId};
use forge_document::{
    slugify, Action, AutomationDoc, Card, Condition, ConfigDocument, Dashboard, DocumentBody,
    DocumentError, ExecutionMode, SceneDoc, SceneState, ScriptDoc, Trigger, View,
};
use forge_store::EntityStateStore;
use forge_templates::{card_for_domain, params, TemplateError, TemplateLibrary};
use indexmap::IndexMap;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, instrument};

/// Synthesizer errors
#[derive(Debug, Error)]
pub enum SynthError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("template '{template}' produced a malformed fragment: {source}")]
    BadFragment {
        template: String,
        #[source]
        source: serde_json::Error,
    },

    /// The request itself is unusable; every problem is listed at once
    #[error("invalid synthesis request: {}", .problems.join("; "))]
    InvalidRequest { problems: Vec<String> },
}

/// Result type for synthesis operations
pub type SynthResult<T> = Result<T, SynthError>;

/// Display defaults applied during synthesis
#[derive(Debug, Clone)]
pub struct SynthOptions {
    /// Icon for views that do not specify one
    pub default_view_icon: String,
    /// Frontend theme stamped onto dashboards
    pub theme: Option<String>,
}

impl Default for SynthOptions {
    fn default() -> Self {
        Self {
            default_view_icon: "mdi:home-assistant".to_string(),
            theme: None,
        }
    }
}

/// Request for one dashboard view
#[derive(Debug, Clone)]
pub struct ViewSpec {
    /// View title
    pub title: String,
    /// Entities to show, in display order
    pub entities: Vec<String>,
    /// Icon override
    pub icon: Option<String>,
}

impl ViewSpec {
    /// A view listing the given entities
    pub fn new(title: impl Into<String>, entities: &[&str]) -> Self {
        Self {
            title: title.into(),
            entities: entities.iter().map(|s| s.to_string()).collect(),
            icon: None,
        }
    }
}

/// The document synthesizer
pub struct DocumentSynthesizer {
    library: Arc<TemplateLibrary>,
    store: Arc<EntityStateStore>,
    options: SynthOptions,
}

impl DocumentSynthesizer {
    /// Create a synthesizer over a built template library and a store
    pub fn new(library: Arc<TemplateLibrary>, store: Arc<EntityStateStore>) -> Self {
        Self {
            library,
            store,
            options: SynthOptions::default(),
        }
    }

    /// Override the display defaults
    pub fn with_options(mut self, options: SynthOptions) -> Self {
        self.options = options;
        self
    }

    /// Build a dashboard document from view specs
    ///
    /// Each entity's domain picks its card via the fixed domain-to-card
    /// mapping; entities of unrecognized domains are grouped into one
    /// generic entities card per view. Entity ids that do not even parse are
    /// request errors, all reported together.
    #[instrument(skip(self, view_specs))]
    pub fn build_dashboard(
        &self,
        title: &str,
        view_specs: &[ViewSpec],
    ) -> SynthResult<ConfigDocument> {
        let mut problems = Vec::new();
        for spec in view_specs {
            for raw in &spec.entities {
                if EntityId::from_str(raw).is_err() {
                    problems.push(format!("'{}' is not a valid entity id", raw));
                }
            }
        }
        if !problems.is_empty() {
            return Err(SynthError::InvalidRequest { problems });
        }

        let mut views = Vec::with_capacity(view_specs.len());
        for spec in view_specs {
            views.push(self.build_view(spec)?);
        }

        let dashboard = Dashboard {
            title: title.to_string(),
            theme: self.options.theme.clone(),
            views,
        };
        debug!(title, views = dashboard.views.len(), "dashboard synthesized");
        Ok(ConfigDocument::new(DocumentBody::Dashboard(dashboard))?)
    }

    fn build_view(&self, spec: &ViewSpec) -> SynthResult<View> {
        let mut cards = Vec::new();
        let mut generic: Vec<String> = Vec::new();

        for raw in &spec.entities {
            // Ids were checked up front
            let Ok(id) = EntityId::from_str(raw) else {
                continue;
            };
            let template = card_for_domain(id.domain());
            if template == "entities-card" {
                generic.push(raw.clone());
                continue;
            }

            let name = self
                .store
                .get(raw)
                .map(|record| record.friendly_name())
                .unwrap_or_else(|| domains::derive_friendly_name(id.object_id()));

            let node = self.library.render(
                template,
                &params(&[("entity", json!(raw)), ("name", json!(name))]),
            )?;
            cards.push(self.fragment_to::<Card>(template, node)?);
        }

        if !generic.is_empty() {
            let node = self.library.render(
                "entities-card",
                &params(&[("entities", json!(generic)), ("title", json!(spec.title))]),
            )?;
            cards.push(self.fragment_to::<Card>("entities-card", node)?);
        }

        let mut view = View::titled(spec.title.clone());
        view.icon = Some(
            spec.icon
                .clone()
                .unwrap_or_else(|| self.options.default_view_icon.clone()),
        );
        view.cards = cards;
        Ok(view)
    }

    /// Build an automation document from typed blocks
    ///
    /// The logical id is a content hash of the trigger/condition/action
    /// structure, so re-synthesizing the same logical automation yields the
    /// same id and updates in place instead of duplicating.
    #[instrument(skip_all)]
    pub fn build_automation(
        &self,
        alias: impl Into<String>,
        triggers: Vec<Trigger>,
        conditions: Vec<Condition>,
        actions: Vec<Action>,
    ) -> SynthResult<ConfigDocument> {
        let automation = AutomationDoc {
            id: None,
            alias: Some(alias.into()),
            description: None,
            triggers,
            conditions,
            actions,
            mode: ExecutionMode::default(),
        };
        let doc = ConfigDocument::new(DocumentBody::Automation(automation))?;
        debug!(logical_id = %doc.logical_id, "automation synthesized");
        Ok(doc)
    }

    /// Build a script document from an action sequence
    pub fn build_script(
        &self,
        alias: impl Into<String>,
        sequence: Vec<Action>,
    ) -> SynthResult<ConfigDocument> {
        let script = ScriptDoc {
            alias: alias.into(),
            description: None,
            sequence,
        };
        Ok(ConfigDocument::new(DocumentBody::Script(script))?)
    }

    /// Build a scene pinning the given entities to their current states
    ///
    /// Entities unknown to the store are pinned to "unknown"; validation,
    /// not synthesis, reports them.
    #[instrument(skip_all)]
    pub fn build_scene(
        &self,
        name: impl Into<String>,
        entity_ids: &[String],
    ) -> SynthResult<ConfigDocument> {
        let name = name.into();
        let mut entities = IndexMap::new();
        for id in entity_ids {
            let state = self
                .store
                .get_state(id)
                .unwrap_or_else(|| forge_core::STATE_UNKNOWN.to_string());
            entities.insert(id.clone(), SceneState::State(state));
        }

        let scene = SceneDoc {
            name: name.clone(),
            icon: Some(domains::icon_for_domain("scene").to_string()),
            entities,
        };
        Ok(ConfigDocument::new(DocumentBody::Scene(scene))?)
    }

    /// Render the "state-trigger" block into a typed trigger
    pub fn state_trigger(
        &self,
        entity_id: &str,
        to: &str,
    ) -> SynthResult<Trigger> {
        let node = self.library.render(
            "state-trigger",
            &params(&[("entity_id", json!(entity_id)), ("to", json!(to))]),
        )?;
        self.fragment_to("state-trigger", node)
    }

    /// Render the "service-action" block into a typed action
    pub fn service_action(
        &self,
        service: &str,
        entity_id: &str,
        data: Option<serde_json::Value>,
    ) -> SynthResult<Action> {
        let node = self.library.render(
            "service-action",
            &params(&[
                ("service", json!(service)),
                ("entity_id", json!(entity_id)),
                ("data", data.unwrap_or(serde_json::Value::Null)),
            ]),
        )?;
        self.fragment_to("service-action", node)
    }

    /// Render the "state-condition" block into a typed condition
    pub fn state_condition(&self, entity_id: &str, state: &str) -> SynthResult<Condition> {
        let node = self.library.render(
            "state-condition",
            &params(&[("entity_id", json!(entity_id)), ("state", json!(state))]),
        )?;
        self.fragment_to("state-condition", node)
    }

    /// Build the control action that moves an entity toward `state`
    ///
    /// Climate entities get `set_hvac_mode` with the state as the mode;
    /// everything else maps on/off to turn_on/turn_off, falling back to
    /// toggle for other values.
    pub fn control_action(&self, entity_id: &EntityId, state: &str) -> SynthResult<Action> {
        let domain = entity_id.domain();
        let (service, data) = match (domain, state) {
            ("climate", mode) => (
                "climate.set_hvac_mode".to_string(),
                Some(json!({ "hvac_mode": mode })),
            ),
            (_, "on") => (format!("{}.turn_on", domain), None),
            (_, "off") => (format!("{}.turn_off", domain), None),
            (d, _) => (format!("{}.toggle", d), None),
        };
        self.service_action(&service, &entity_id.to_string(), data)
    }

    fn fragment_to<T: serde::de::DeserializeOwned>(
        &self,
        template: &str,
        node: serde_json::Value,
    ) -> SynthResult<T> {
        serde_json::from_value(node).map_err(|source| SynthError::BadFragment {
            template: template.to_string(),
            source,
        })
    }

    /// A slug preview of the logical id a dashboard title would get
    pub fn dashboard_id(title: &str) -> String {
        slugify(title)
    }
}
