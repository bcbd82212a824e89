//! Registry of available services and integrations
//!
//! The pipeline never executes services itself; execution belongs to the
//! external runtime. This registry records which `domain.service` pairs and
//! which integrations are currently available, so the validator's dependency
//! pass can tell a referenced-but-missing service from a present one, and can
//! check action payloads against a service's registered JSON Schema.

use dashmap::{DashMap, DashSet};
use forge_core::domains;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Registry errors
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    #[error("service not found: {domain}.{service}")]
    NotFound { domain: String, service: String },

    #[error("invalid schema for {domain}.{service}: {reason}")]
    InvalidSchema {
        domain: String,
        service: String,
        reason: String,
    },
}

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Description of an available service
#[derive(Debug, Clone)]
pub struct ServiceDescription {
    /// Domain the service belongs to
    pub domain: String,
    /// Service name
    pub service: String,
    /// Human-readable description
    pub description: Option<String>,
    /// JSON Schema for the service data payload (optional)
    pub schema: Option<serde_json::Value>,
}

impl ServiceDescription {
    /// Create a bare description without schema
    pub fn new(domain: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            service: service.into(),
            description: None,
            schema: None,
        }
    }

    /// Attach a JSON Schema for the data payload
    pub fn with_schema(mut self, schema: serde_json::Value) -> Self {
        self.schema = Some(schema);
        self
    }
}

/// The service registry
pub struct ServiceRegistry {
    /// Services indexed by "domain.service"
    services: DashMap<String, ServiceDescription>,
    /// Names of loaded integrations
    integrations: DashSet<String>,
}

impl ServiceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            services: DashMap::new(),
            integrations: DashSet::new(),
        }
    }

    /// Create a registry pre-populated with the per-domain action sets
    ///
    /// Gives callers and tests a realistic baseline matching what a default
    /// external runtime exposes.
    pub fn standard() -> Self {
        let registry = Self::new();
        for domain in [
            "light",
            "switch",
            "fan",
            "cover",
            "climate",
            "lock",
            "media_player",
            "vacuum",
            "humidifier",
            "scene",
            "script",
            "automation",
        ] {
            if let Some(actions) = domains::supported_actions(domain) {
                for action in actions {
                    registry.register(ServiceDescription::new(domain, action));
                }
            }
            registry.register_integration(domain);
        }
        registry
    }

    /// Register a service description, replacing any previous one
    pub fn register(&self, description: ServiceDescription) {
        let key = format!("{}.{}", description.domain, description.service);
        debug!(service = %key, "service registered");
        self.services.insert(key, description);
    }

    /// Mark an integration as loaded
    pub fn register_integration(&self, name: impl Into<String>) {
        self.integrations.insert(name.into());
    }

    /// Whether `domain.service` is available
    pub fn has_service(&self, domain: &str, service: &str) -> bool {
        self.services
            .contains_key(&format!("{}.{}", domain, service))
    }

    /// Whether the named integration is loaded
    pub fn has_integration(&self, name: &str) -> bool {
        self.integrations.contains(name)
    }

    /// Description of a service, if registered
    pub fn get(&self, domain: &str, service: &str) -> Option<ServiceDescription> {
        self.services
            .get(&format!("{}.{}", domain, service))
            .map(|d| d.clone())
    }

    /// All services registered under a domain
    pub fn domain_services(&self, domain: &str) -> Vec<ServiceDescription> {
        self.services
            .iter()
            .filter(|d| d.domain == domain)
            .map(|d| d.value().clone())
            .collect()
    }

    /// All domains with at least one registered service, sorted
    pub fn domains(&self) -> Vec<String> {
        let mut out: Vec<_> = self.services.iter().map(|d| d.domain.clone()).collect();
        out.sort();
        out.dedup();
        out
    }

    /// All registered services grouped by domain
    pub fn all_services(&self) -> HashMap<String, Vec<ServiceDescription>> {
        let mut out: HashMap<String, Vec<ServiceDescription>> = HashMap::new();
        for entry in self.services.iter() {
            out.entry(entry.domain.clone())
                .or_default()
                .push(entry.value().clone());
        }
        out
    }

    /// Number of registered services
    pub fn service_count(&self) -> usize {
        self.services.len()
    }

    /// Validate a service-call payload against the registered schema
    ///
    /// Returns every violation message, not just the first. A service with no
    /// schema accepts any payload.
    pub fn validate_payload(
        &self,
        domain: &str,
        service: &str,
        data: &serde_json::Value,
    ) -> RegistryResult<Vec<String>> {
        let description = self.get(domain, service).ok_or(RegistryError::NotFound {
            domain: domain.to_string(),
            service: service.to_string(),
        })?;

        let Some(schema) = description.schema else {
            return Ok(Vec::new());
        };

        let compiled = jsonschema::JSONSchema::compile(&schema).map_err(|e| {
            RegistryError::InvalidSchema {
                domain: domain.to_string(),
                service: service.to_string(),
                reason: e.to_string(),
            }
        })?;

        let violations = match compiled.validate(data) {
            Ok(()) => Vec::new(),
            Err(errors) => errors.map(|e| e.to_string()).collect(),
        };
        Ok(violations)
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe handle shared across pipeline components
pub type SharedServiceRegistry = Arc<ServiceRegistry>;
