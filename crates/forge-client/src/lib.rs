//! HTTP client for the external system
//!
//! Wraps the entity API (`/api/states`, `/api/services/...`) and the
//! config-check capability (`/api/config/core/check_config`) behind typed
//! traits. All calls are blocking I/O with a bounded timeout; transient
//! transport failures are retried with doubling backoff before surfacing
//! [`ApiError::Timeout`]. Reads are always safely retryable.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use forge_core::{EntityId, EntityRecord};
use forge_deploy::{CheckOutcome, CheckUnavailable, ConfigCheck, LiveDocument};
use forge_document::ConfigDocument;
use forge_store::EntityStateStore;
use reqwest::{header, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// Client errors
#[derive(Debug, Error)]
pub enum ApiError {
    /// Gave up after every retry attempt
    #[error("request to {path} timed out after {attempts} attempts")]
    Timeout { path: String, attempts: u32 },

    /// Non-success HTTP status
    #[error("API returned {status} for {path}")]
    Status { path: String, status: StatusCode },

    /// Response body did not match the expected shape
    #[error("failed to decode response from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// Entity id in a response was malformed
    #[error("API returned invalid entity id: {0}")]
    InvalidEntityId(#[from] forge_core::EntityIdError),

    /// Client construction failed
    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Connection knobs, consumed as-is
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Verify TLS certificates
    pub verify_ssl: bool,
    /// Per-request timeout
    pub timeout: Duration,
    /// Attempts before surfacing Timeout
    pub attempts: u32,
    /// Delay before the second attempt; doubles each retry
    pub initial_backoff: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            verify_ssl: true,
            timeout: Duration::from_secs(10),
            attempts: 3,
            initial_backoff: Duration::from_millis(250),
        }
    }
}

/// The read/write boundary to the live smart-home state
#[async_trait]
pub trait EntityApi: Send + Sync {
    /// All current entity records
    async fn get_states(&self) -> ApiResult<Vec<EntityRecord>>;

    /// One entity's current record
    async fn get_state(&self, entity_id: &EntityId) -> ApiResult<Option<EntityRecord>>;

    /// Invoke a service against a target
    async fn call_service(
        &self,
        domain: &str,
        service: &str,
        target: &EntityId,
        data: serde_json::Value,
    ) -> ApiResult<serde_json::Value>;
}

/// Wire form of an entity state as the API reports it
#[derive(Debug, Deserialize)]
struct StateDto {
    entity_id: String,
    state: String,
    #[serde(default)]
    attributes: HashMap<String, serde_json::Value>,
    last_changed: DateTime<Utc>,
    last_updated: DateTime<Utc>,
}

impl StateDto {
    fn into_record(self) -> ApiResult<EntityRecord> {
        let id: EntityId = self.entity_id.parse()?;
        let mut record = EntityRecord::new(id, self.state, self.attributes, self.last_updated);
        record.last_changed = self.last_changed;
        Ok(record)
    }
}

/// HTTP client for the external system
pub struct HassClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    options: ClientOptions,
}

impl HassClient {
    /// Connect to `base_url` with a long-lived access token
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        options: ClientOptions,
    ) -> ApiResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(options.timeout)
            .danger_accept_invalid_certs(!options.verify_ssl)
            .build()
            .map_err(ApiError::Build)?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            options,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Refresh the state store's current records from the API
    #[instrument(skip(self, store))]
    pub async fn sync_store(&self, store: &EntityStateStore) -> ApiResult<usize> {
        let records = self.get_states().await?;
        let count = records.len();
        for record in records {
            store.load_record(record);
        }
        debug!(count, "state store refreshed");
        Ok(count)
    }

    async fn request_json(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> ApiResult<serde_json::Value> {
        let mut backoff = self.options.initial_backoff;

        for attempt in 1..=self.options.attempts {
            let mut request = self
                .http
                .request(method.clone(), self.url(path))
                .header(header::AUTHORIZATION, format!("Bearer {}", self.token));
            if let Some(body) = body {
                request = request.json(body);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if !status.is_success() {
                        return Err(ApiError::Status {
                            path: path.to_string(),
                            status,
                        });
                    }
                    let text = response.text().await.map_err(|_| ApiError::Timeout {
                        path: path.to_string(),
                        attempts: attempt,
                    })?;
                    return serde_json::from_str(&text).map_err(|source| ApiError::Decode {
                        path: path.to_string(),
                        source,
                    });
                }
                Err(err) => {
                    warn!(path, attempt, error = %err, "request failed");
                    if attempt < self.options.attempts {
                        tokio::time::sleep(backoff).await;
                        backoff *= 2;
                    }
                }
            }
        }

        Err(ApiError::Timeout {
            path: path.to_string(),
            attempts: self.options.attempts,
        })
    }
}

#[async_trait]
impl EntityApi for HassClient {
    async fn get_states(&self) -> ApiResult<Vec<EntityRecord>> {
        let value = self
            .request_json(reqwest::Method::GET, "/api/states", None)
            .await?;
        let dtos: Vec<StateDto> =
            serde_json::from_value(value).map_err(|source| ApiError::Decode {
                path: "/api/states".to_string(),
                source,
            })?;
        dtos.into_iter().map(StateDto::into_record).collect()
    }

    async fn get_state(&self, entity_id: &EntityId) -> ApiResult<Option<EntityRecord>> {
        let path = format!("/api/states/{}", entity_id);
        match self.request_json(reqwest::Method::GET, &path, None).await {
            Ok(value) => {
                let dto: StateDto =
                    serde_json::from_value(value).map_err(|source| ApiError::Decode {
                        path,
                        source,
                    })?;
                Ok(Some(dto.into_record()?))
            }
            Err(ApiError::Status { status, .. }) if status == StatusCode::NOT_FOUND => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn call_service(
        &self,
        domain: &str,
        service: &str,
        target: &EntityId,
        data: serde_json::Value,
    ) -> ApiResult<serde_json::Value> {
        let path = format!("/api/services/{}/{}", domain, service);

        let mut payload = match data {
            serde_json::Value::Object(map) => map,
            serde_json::Value::Null => serde_json::Map::new(),
            other => {
                let mut map = serde_json::Map::new();
                map.insert("data".to_string(), other);
                map
            }
        };
        payload.insert(
            "entity_id".to_string(),
            serde_json::Value::String(target.to_string()),
        );

        self.request_json(
            reqwest::Method::POST,
            &path,
            Some(&serde_json::Value::Object(payload)),
        )
        .await
    }
}

/// Wire form of the config-check response
#[derive(Debug, Deserialize)]
struct CheckConfigDto {
    result: Option<String>,
    #[serde(default)]
    errors: Option<serde_json::Value>,
}

#[async_trait]
impl ConfigCheck for HassClient {
    /// Invoke the external config-check capability
    ///
    /// Transport failures become [`CheckUnavailable`], which the deployment
    /// tester retries and eventually converts into its rollback path.
    async fn check(
        &self,
        candidate: &ConfigDocument,
        _live: &[LiveDocument],
    ) -> Result<CheckOutcome, CheckUnavailable> {
        let body = serde_json::json!({
            "kind": candidate.kind.as_str(),
            "config": candidate.raw_form,
        });

        let value = self
            .request_json(
                reqwest::Method::POST,
                "/api/config/core/check_config",
                Some(&body),
            )
            .await
            .map_err(|err| CheckUnavailable {
                reason: err.to_string(),
            })?;

        let dto: CheckConfigDto =
            serde_json::from_value(value).map_err(|err| CheckUnavailable {
                reason: format!("malformed check_config response: {}", err),
            })?;

        let ok = dto.result.as_deref() == Some("valid");
        let errors = match dto.errors {
            Some(serde_json::Value::String(s)) => vec![s],
            Some(serde_json::Value::Array(items)) => items
                .into_iter()
                .map(|v| match v {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                })
                .collect(),
            Some(serde_json::Value::Null) | None => Vec::new(),
            Some(other) => vec![other.to_string()],
        };

        Ok(CheckOutcome { ok, errors })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_options_defaults() {
        let options = ClientOptions::default();
        assert!(options.verify_ssl);
        assert_eq!(options.attempts, 3);
    }

    #[test]
    fn test_base_url_normalized() {
        let client =
            HassClient::new("http://hass.local:8123/", "token", ClientOptions::default()).unwrap();
        assert_eq!(client.url("/api/states"), "http://hass.local:8123/api/states");
    }

    #[test]
    fn test_state_dto_conversion() {
        let dto: StateDto = serde_json::from_value(json!({
            "entity_id": "light.kitchen",
            "state": "on",
            "attributes": {"friendly_name": "Kitchen", "brightness": 180},
            "last_changed": "2026-07-01T19:00:00Z",
            "last_updated": "2026-07-01T19:05:00Z"
        }))
        .unwrap();

        let record = dto.into_record().unwrap();
        assert_eq!(record.id.to_string(), "light.kitchen");
        assert_eq!(record.state, "on");
        assert_eq!(record.friendly_name(), "Kitchen");
        assert!(record.last_changed < record.last_updated);
    }

    #[tokio::test]
    async fn test_retry_exhaustion_surfaces_timeout() {
        // Nothing listens on this port, so every attempt fails at transport
        let client = HassClient::new(
            "http://127.0.0.1:1",
            "token",
            ClientOptions {
                timeout: Duration::from_millis(200),
                attempts: 3,
                initial_backoff: Duration::from_millis(1),
                ..ClientOptions::default()
            },
        )
        .unwrap();

        let result = client.get_states().await;
        assert!(matches!(
            result,
            Err(ApiError::Timeout { attempts: 3, .. })
        ));
    }

    #[test]
    fn test_state_dto_rejects_bad_id() {
        let dto: StateDto = serde_json::from_value(json!({
            "entity_id": "notanid",
            "state": "on",
            "last_changed": "2026-07-01T19:00:00Z",
            "last_updated": "2026-07-01T19:00:00Z"
        }))
        .unwrap();

        assert!(matches!(
            dto.into_record(),
            Err(ApiError::InvalidEntityId(_))
        ));
    }
}
