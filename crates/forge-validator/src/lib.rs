//! Schema validator
//!
//! Checks a configuration document for structural completeness and semantic
//! correctness against a point-in-time view of the state store and the
//! service registry. Three passes run unconditionally (structural, semantic,
//! dependency) and every applicable finding is collected, so one call
//! returns the complete remediation list. Validation is pure: it reads, it
//! never mutates.

use std::str::FromStr;
use std::sync::Arc;

use forge_core::{domains, EntityId};
use forge_document::{
    Action, AutomationDoc, Condition, ConfigDocument, Dashboard, DocumentBody, EntityIdSpec,
    IssueKind, SceneDoc, ScriptDoc, ServiceAction, Trigger, ValidationIssue, ValidationStatus,
};
use forge_services::ServiceRegistry;
use forge_store::EntityStateStore;
use tracing::{debug, instrument};

/// Outcome of validating one document
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    /// Whether the document passed all three passes
    pub valid: bool,
    /// Every finding, in pass order then document order
    pub errors: Vec<ValidationIssue>,
}

impl ValidationReport {
    fn from_errors(errors: Vec<ValidationIssue>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    /// The lifecycle status this report implies
    pub fn status(&self) -> ValidationStatus {
        if self.valid {
            ValidationStatus::Valid
        } else {
            ValidationStatus::Invalid(self.errors.clone())
        }
    }
}

/// The schema validator
pub struct SchemaValidator {
    store: Arc<EntityStateStore>,
    registry: Arc<ServiceRegistry>,
}

impl SchemaValidator {
    /// Create a validator over the store and service registry
    pub fn new(store: Arc<EntityStateStore>, registry: Arc<ServiceRegistry>) -> Self {
        Self { store, registry }
    }

    /// Validate a document, collecting every finding
    #[instrument(skip(self, doc), fields(kind = %doc.kind, logical_id = %doc.logical_id))]
    pub fn validate(&self, doc: &ConfigDocument) -> ValidationReport {
        let mut errors = Vec::new();

        self.structural(&doc.body, &mut errors);
        self.semantic(&doc.body, &mut errors);
        self.dependency(&doc.body, &mut errors);

        debug!(findings = errors.len(), "validation finished");
        ValidationReport::from_errors(errors)
    }

    /// Validate and return the document with its lifecycle status stamped
    pub fn validated(&self, doc: ConfigDocument) -> ConfigDocument {
        let report = self.validate(&doc);
        doc.with_status(report.status())
    }

    // --- Pass 1: structural completeness per kind ---

    fn structural(&self, body: &DocumentBody, errors: &mut Vec<ValidationIssue>) {
        match body {
            DocumentBody::Automation(auto) => self.structural_automation(auto, errors),
            DocumentBody::Dashboard(dashboard) => self.structural_dashboard(dashboard, errors),
            DocumentBody::Script(script) => self.structural_script(script, errors),
            DocumentBody::Scene(scene) => self.structural_scene(scene, errors),
        }
    }

    fn structural_automation(&self, auto: &AutomationDoc, errors: &mut Vec<ValidationIssue>) {
        if auto.triggers.is_empty() {
            errors.push(ValidationIssue::new(
                "triggers",
                IssueKind::SchemaError,
                "automation requires at least one trigger",
            ));
        }
        if auto.actions.is_empty() {
            errors.push(ValidationIssue::new(
                "actions",
                IssueKind::SchemaError,
                "automation requires at least one action",
            ));
        }
    }

    fn structural_dashboard(&self, dashboard: &Dashboard, errors: &mut Vec<ValidationIssue>) {
        if dashboard.title.trim().is_empty() {
            errors.push(ValidationIssue::new(
                "title",
                IssueKind::SchemaError,
                "dashboard title must not be empty",
            ));
        }
        if dashboard.views.is_empty() {
            errors.push(ValidationIssue::new(
                "views",
                IssueKind::SchemaError,
                "dashboard requires at least one view",
            ));
        }
        for (i, view) in dashboard.views.iter().enumerate() {
            if view.title.is_none() && view.path.is_none() {
                errors.push(ValidationIssue::new(
                    format!("views[{}]", i),
                    IssueKind::SchemaError,
                    "view requires a title or a path",
                ));
            }
        }
    }

    fn structural_script(&self, script: &ScriptDoc, errors: &mut Vec<ValidationIssue>) {
        if script.sequence.is_empty() {
            errors.push(ValidationIssue::new(
                "sequence",
                IssueKind::SchemaError,
                "script requires at least one step",
            ));
        }
    }

    fn structural_scene(&self, scene: &SceneDoc, errors: &mut Vec<ValidationIssue>) {
        if scene.entities.is_empty() {
            errors.push(ValidationIssue::new(
                "entities",
                IssueKind::SchemaError,
                "scene requires at least one entity",
            ));
        }
    }

    // --- Pass 2: semantic checks against the store ---

    fn semantic(&self, body: &DocumentBody, errors: &mut Vec<ValidationIssue>) {
        for (path, entity_id) in entity_references(body) {
            if !self.store.contains(&entity_id) {
                errors.push(ValidationIssue::new(
                    path,
                    IssueKind::UnknownEntity,
                    format!("entity '{}' does not resolve in the state store", entity_id),
                ));
            }
        }

        for (path, action) in service_actions(body) {
            self.check_action_supported(&path, action, errors);
        }
    }

    fn check_action_supported(
        &self,
        path: &str,
        action: &ServiceAction,
        errors: &mut Vec<ValidationIssue>,
    ) {
        let Some((service_domain, verb)) = action.service_parts() else {
            errors.push(ValidationIssue::new(
                format!("{}.service", path),
                IssueKind::SchemaError,
                format!("service '{}' is not of the form 'domain.service'", action.service),
            ));
            return;
        };

        for target in action.target.entity_id.ids() {
            let Ok(target_id) = EntityId::from_str(target) else {
                // Unresolvable targets are reported by the entity pass
                continue;
            };
            if target_id.domain() != service_domain {
                errors.push(ValidationIssue::new(
                    format!("{}.service", path),
                    IssueKind::UnsupportedAction,
                    format!(
                        "service '{}' cannot target '{}' ({} entity)",
                        action.service,
                        target,
                        target_id.domain()
                    ),
                ));
            } else if !domains::supports_action(target_id.domain(), verb) {
                errors.push(ValidationIssue::new(
                    format!("{}.service", path),
                    IssueKind::UnsupportedAction,
                    format!(
                        "action '{}' is not supported for domain '{}'",
                        verb,
                        target_id.domain()
                    ),
                ));
            }
        }
    }

    // --- Pass 3: dependency availability against the registry ---

    fn dependency(&self, body: &DocumentBody, errors: &mut Vec<ValidationIssue>) {
        for (path, action) in service_actions(body) {
            let Some((service_domain, verb)) = action.service_parts() else {
                // Malformed services were reported by the semantic pass
                continue;
            };

            if !self.registry.has_service(service_domain, verb) {
                let detail = if self.registry.has_integration(service_domain) {
                    format!(
                        "service '{}' is not registered by integration '{}'",
                        action.service, service_domain
                    )
                } else {
                    format!("integration '{}' is not loaded", service_domain)
                };
                errors.push(ValidationIssue::new(
                    format!("{}.service", path),
                    IssueKind::MissingDependency,
                    detail,
                ));
                continue;
            }

            if !action.data.is_null() {
                if let Ok(violations) =
                    self.registry
                        .validate_payload(service_domain, verb, &action.data)
                {
                    for violation in violations {
                        errors.push(ValidationIssue::new(
                            format!("{}.data", path),
                            IssueKind::SchemaError,
                            violation,
                        ));
                    }
                }
            }
        }
    }
}

// --- Reference extraction ---

/// Every entity reference in the document, with its path
fn entity_references(body: &DocumentBody) -> Vec<(String, String)> {
    let mut refs = Vec::new();
    match body {
        DocumentBody::Automation(auto) => {
            for (i, trigger) in auto.triggers.iter().enumerate() {
                match trigger {
                    Trigger::State(t) => {
                        spec_refs(&format!("triggers[{}]", i), &t.entity_id, &mut refs)
                    }
                    Trigger::NumericState(t) => {
                        spec_refs(&format!("triggers[{}]", i), &t.entity_id, &mut refs)
                    }
                    _ => {}
                }
            }
            for (i, condition) in auto.conditions.iter().enumerate() {
                match condition {
                    Condition::State(c) => {
                        spec_refs(&format!("conditions[{}]", i), &c.entity_id, &mut refs)
                    }
                    Condition::NumericState(c) => {
                        spec_refs(&format!("conditions[{}]", i), &c.entity_id, &mut refs)
                    }
                    Condition::Time(_) => {}
                }
            }
            action_refs("actions", &auto.actions, &mut refs);
        }
        DocumentBody::Dashboard(dashboard) => {
            for (i, view) in dashboard.views.iter().enumerate() {
                for (j, card) in view.cards.iter().enumerate() {
                    let base = format!("views[{}].cards[{}]", i, j);
                    if let Some(entity) = &card.entity {
                        refs.push((format!("{}.entity", base), entity.clone()));
                    }
                    for (k, entity) in card.entities.iter().enumerate() {
                        refs.push((format!("{}.entities[{}]", base, k), entity.clone()));
                    }
                }
            }
        }
        DocumentBody::Script(script) => {
            action_refs("sequence", &script.sequence, &mut refs);
        }
        DocumentBody::Scene(scene) => {
            for (entity_id, _) in &scene.entities {
                refs.push((format!("entities.{}", entity_id), entity_id.clone()));
            }
        }
    }
    refs
}

fn spec_refs(base: &str, spec: &EntityIdSpec, out: &mut Vec<(String, String)>) {
    match spec {
        EntityIdSpec::Single(id) => out.push((format!("{}.entity_id", base), id.clone())),
        EntityIdSpec::List(ids) => {
            for (i, id) in ids.iter().enumerate() {
                out.push((format!("{}.entity_id[{}]", base, i), id.clone()));
            }
        }
    }
}

fn action_refs(base: &str, actions: &[Action], out: &mut Vec<(String, String)>) {
    for (i, action) in actions.iter().enumerate() {
        if let Action::Service(service) = action {
            spec_refs(
                &format!("{}[{}].target", base, i),
                &service.target.entity_id,
                out,
            );
        }
    }
}

/// Every service action in the document, with its path
fn service_actions(body: &DocumentBody) -> Vec<(String, &ServiceAction)> {
    fn collect<'a>(
        base: &str,
        actions: &'a [Action],
        out: &mut Vec<(String, &'a ServiceAction)>,
    ) {
        for (i, action) in actions.iter().enumerate() {
            if let Action::Service(service) = action {
                out.push((format!("{}[{}]", base, i), service));
            }
        }
    }

    let mut out = Vec::new();
    match body {
        DocumentBody::Automation(auto) => collect("actions", &auto.actions, &mut out),
        DocumentBody::Script(script) => collect("sequence", &script.sequence, &mut out),
        DocumentBody::Dashboard(_) | DocumentBody::Scene(_) => {}
    }
    out
}
