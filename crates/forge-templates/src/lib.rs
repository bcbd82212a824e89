//! Library of pure document-fragment builders
//!
//! A template is a named, parameterized, pure function from parameters to a
//! document node. The library is constructed explicitly (usually via
//! [`TemplateLibrary::builtin`]), registered once, and immutable afterward;
//! callers receive it by shared reference. Rendering is deterministic:
//! identical parameters always produce an identical node, which makes
//! regeneration idempotent and exact-match testing possible.

mod builtin;

use indexmap::IndexMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

pub use builtin::card_for_domain;

/// Template errors
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template '{0}' is already registered")]
    DuplicateTemplate(String),

    #[error("template '{0}' is not registered")]
    UnknownTemplate(String),

    #[error("template '{template}' missing required parameters: {}", .parameters.join(", "))]
    MissingParameter {
        template: String,
        parameters: Vec<String>,
    },
}

/// Result type for template operations
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Parameters passed to a render function
pub type TemplateParams = IndexMap<String, serde_json::Value>;

/// A pure render function: parameters in, document node out
pub type RenderFn = Arc<dyn Fn(&TemplateParams) -> serde_json::Value + Send + Sync>;

/// A registered template
#[derive(Clone)]
pub struct Template {
    /// Unique template name
    pub name: String,
    /// Parameters that must be supplied
    pub required: Vec<String>,
    /// Optional parameters with their defaults
    pub defaults: IndexMap<String, serde_json::Value>,
    render: RenderFn,
}

impl Template {
    /// Define a template
    pub fn new(
        name: impl Into<String>,
        required: &[&str],
        render: impl Fn(&TemplateParams) -> serde_json::Value + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            required: required.iter().map(|s| s.to_string()).collect(),
            defaults: IndexMap::new(),
            render: Arc::new(render),
        }
    }

    /// Add a default for an optional parameter
    pub fn with_default(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.defaults.insert(name.into(), value);
        self
    }
}

impl std::fmt::Debug for Template {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Template")
            .field("name", &self.name)
            .field("required", &self.required)
            .field("defaults", &self.defaults)
            .finish()
    }
}

/// The template library
pub struct TemplateLibrary {
    templates: IndexMap<String, Template>,
}

impl TemplateLibrary {
    /// Create an empty library
    pub fn new() -> Self {
        Self {
            templates: IndexMap::new(),
        }
    }

    /// Create a library with the built-in card and block templates
    pub fn builtin() -> Self {
        let mut library = Self::new();
        builtin::register_all(&mut library);
        library
    }

    /// Register a template; duplicate names are rejected
    pub fn register(&mut self, template: Template) -> TemplateResult<()> {
        if self.templates.contains_key(&template.name) {
            return Err(TemplateError::DuplicateTemplate(template.name));
        }
        debug!(template = %template.name, "template registered");
        self.templates.insert(template.name.clone(), template);
        Ok(())
    }

    /// Names of all registered templates, in registration order
    pub fn names(&self) -> Vec<&str> {
        self.templates.keys().map(|s| s.as_str()).collect()
    }

    /// Whether a template is registered
    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    /// Render a template with the given parameters
    ///
    /// Every absent required parameter is reported at once; absent optional
    /// parameters receive their registered defaults.
    pub fn render(&self, name: &str, params: &TemplateParams) -> TemplateResult<serde_json::Value> {
        let template = self
            .templates
            .get(name)
            .ok_or_else(|| TemplateError::UnknownTemplate(name.to_string()))?;

        let missing: Vec<String> = template
            .required
            .iter()
            .filter(|p| !params.contains_key(*p))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(TemplateError::MissingParameter {
                template: name.to_string(),
                parameters: missing,
            });
        }

        let mut effective = params.clone();
        for (key, default) in &template.defaults {
            if !effective.contains_key(key) {
                effective.insert(key.clone(), default.clone());
            }
        }

        Ok((template.render)(&effective))
    }
}

impl Default for TemplateLibrary {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe handle to the built-once library
pub type SharedTemplateLibrary = Arc<TemplateLibrary>;

/// Build a parameter map from key/value pairs
pub fn params(pairs: &[(&str, serde_json::Value)]) -> TemplateParams {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_duplicate_rejected() {
        let mut library = TemplateLibrary::new();
        library
            .register(Template::new("t", &[], |_| json!({})))
            .unwrap();
        let result = library.register(Template::new("t", &[], |_| json!({})));
        assert!(matches!(result, Err(TemplateError::DuplicateTemplate(_))));
    }

    #[test]
    fn test_missing_parameters_all_reported() {
        let library = TemplateLibrary::builtin();
        let result = library.render("light-card", &params(&[]));

        match result {
            Err(TemplateError::MissingParameter { parameters, .. }) => {
                assert_eq!(parameters, vec!["entity"]);
            }
            other => panic!("expected MissingParameter, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_defaults_applied() {
        let mut library = TemplateLibrary::new();
        library
            .register(
                Template::new("greet", &["name"], |p| {
                    json!({"greeting": p["greeting"], "name": p["name"]})
                })
                .with_default("greeting", json!("hello")),
            )
            .unwrap();

        let node = library
            .render("greet", &params(&[("name", json!("world"))]))
            .unwrap();
        assert_eq!(node["greeting"], "hello");

        let node = library
            .render(
                "greet",
                &params(&[("name", json!("world")), ("greeting", json!("hi"))]),
            )
            .unwrap();
        assert_eq!(node["greeting"], "hi");
    }

    #[test]
    fn test_render_is_idempotent() {
        let library = TemplateLibrary::builtin();
        let p = params(&[("entity", json!("light.kitchen")), ("name", json!("Kitchen"))]);

        let once = library.render("light-card", &p).unwrap();
        let twice = library.render("light-card", &p).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_unknown_template() {
        let library = TemplateLibrary::builtin();
        let result = library.render("no-such-card", &params(&[]));
        assert!(matches!(result, Err(TemplateError::UnknownTemplate(_))));
    }
}
