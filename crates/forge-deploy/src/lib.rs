//! Staged deployment with guaranteed rollback
//!
//! # Protocol
//!
//! ```text
//! snapshot live slot -> stage candidate -> external config check
//!     check fails  -> discard staged, live untouched
//!     check passes -> promote atomically; failed write -> restore snapshot
//! ```
//!
//! Concurrent [`DeploymentTester::test`] calls are mutually exclusive; only
//! one deployment cycle holds write access to the live tree at a time.

mod config_store;
mod tester;

use thiserror::Error;

pub use config_store::{ConfigStore, DeploySnapshot, LiveDocument};
pub use tester::{
    CheckOutcome, CheckUnavailable, ConfigCheck, DeploymentTester, RetryPolicy, TestReport,
};

/// Deployment errors
#[derive(Debug, Error)]
pub enum DeployError {
    /// The candidate skipped validation; the tester never substitutes for it
    #[error("document '{logical_id}' has not passed validation")]
    NotValidated { logical_id: String },

    /// The config check rejected the candidate (rolled back cleanly)
    #[error("deployment test failed: {}", .details.join("; "))]
    DeploymentTestFailure { details: Vec<String> },

    /// The checker stayed unreachable through every retry
    #[error("config check timed out after {attempts} attempts: {reason}")]
    Timeout { attempts: u32, reason: String },

    /// Filesystem failure in the config tree
    #[error("config tree I/O error: {0}")]
    Storage(#[from] std::io::Error),

    /// A failed deployment write could not be rolled back
    #[error("rollback failed for '{logical_id}': {reason}")]
    RollbackFailed { logical_id: String, reason: String },
}

/// Result type for deployment operations
pub type DeployResult<T> = Result<T, DeployError>;

#[cfg(test)]
mod tests {
    use super::*;
    use forge_document::{
        Action, AutomationDoc, ConfigDocument, DocumentBody, ExecutionMode, ServiceAction,
        StateTrigger, Trigger, ValidationStatus,
    };
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::sync::Mutex as StdMutex;
    use tempfile::TempDir;

    /// Checker that replays a scripted sequence of responses
    struct ScriptedCheck {
        script: StdMutex<VecDeque<Result<CheckOutcome, CheckUnavailable>>>,
        calls: StdMutex<u32>,
    }

    impl ScriptedCheck {
        fn new(script: Vec<Result<CheckOutcome, CheckUnavailable>>) -> Arc<Self> {
            Arc::new(Self {
                script: StdMutex::new(script.into()),
                calls: StdMutex::new(0),
            })
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait::async_trait]
    impl ConfigCheck for ScriptedCheck {
        async fn check(
            &self,
            _candidate: &ConfigDocument,
            _live: &[LiveDocument],
        ) -> Result<CheckOutcome, CheckUnavailable> {
            *self.calls.lock().unwrap() += 1;
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(CheckOutcome::passed()))
        }
    }

    fn valid_doc() -> ConfigDocument {
        let auto = AutomationDoc {
            id: None,
            alias: Some("Motion light".to_string()),
            description: None,
            triggers: vec![Trigger::State(StateTrigger::to_state(
                "binary_sensor.motion",
                "on",
            ))],
            conditions: Vec::new(),
            actions: vec![Action::Service(ServiceAction::for_entity(
                "light.turn_on",
                "light.hallway",
            ))],
            mode: ExecutionMode::default(),
        };
        ConfigDocument::new(DocumentBody::Automation(auto))
            .unwrap()
            .with_status(ValidationStatus::Valid)
    }

    async fn tree_fingerprint(store: &ConfigStore) -> Vec<(String, String)> {
        store
            .all_documents()
            .await
            .unwrap()
            .into_iter()
            .map(|d| (d.logical_id, d.raw_form))
            .collect()
    }

    #[tokio::test]
    async fn test_failing_check_leaves_live_unchanged() {
        let dir = TempDir::new().unwrap();
        let checker = ScriptedCheck::new(vec![Ok(CheckOutcome::failed(vec![
            "duplicate trigger id".to_string(),
        ]))]);
        let tester = DeploymentTester::new(ConfigStore::new(dir.path()), checker);

        let before = tree_fingerprint(tester.store()).await;
        let report = tester.test(&valid_doc()).await.unwrap();

        assert!(!report.passed);
        assert!(report.rollback_performed);
        assert_eq!(report.details, vec!["duplicate trigger id"]);
        assert_eq!(tree_fingerprint(tester.store()).await, before);
        assert!(tester.store().staged_ids().await.unwrap().is_empty());

        assert!(matches!(
            report.into_result(),
            Err(DeployError::DeploymentTestFailure { .. })
        ));
    }

    #[tokio::test]
    async fn test_passing_check_deploys() {
        let dir = TempDir::new().unwrap();
        let checker = ScriptedCheck::new(vec![Ok(CheckOutcome::passed())]);
        let tester = DeploymentTester::new(ConfigStore::new(dir.path()), checker);
        let doc = valid_doc();

        let report = tester.test(&doc).await.unwrap();

        assert!(report.passed);
        assert!(!report.rollback_performed);
        let live = tester
            .store()
            .get(doc.kind, &doc.logical_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(live.raw_form, doc.raw_form);
        assert!(tester.store().staged_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unvalidated_document_refused() {
        let dir = TempDir::new().unwrap();
        let checker = ScriptedCheck::new(Vec::new());
        let tester = DeploymentTester::new(ConfigStore::new(dir.path()), checker.clone());

        let mut doc = valid_doc();
        doc.validation_status = ValidationStatus::Unvalidated;
        let result = tester.test(&doc).await;

        assert!(matches!(result, Err(DeployError::NotValidated { .. })));
        // The checker was never consulted
        assert_eq!(checker.calls(), 0);
    }

    #[tokio::test]
    async fn test_transient_failures_retried_then_timeout() {
        let dir = TempDir::new().unwrap();
        let unavailable = || {
            Err(CheckUnavailable {
                reason: "connection refused".to_string(),
            })
        };
        let checker = ScriptedCheck::new(vec![unavailable(), unavailable(), unavailable()]);
        let tester = DeploymentTester::new(ConfigStore::new(dir.path()), checker.clone())
            .with_retry(RetryPolicy {
                attempts: 3,
                initial_backoff: std::time::Duration::from_millis(1),
            });

        let before = tree_fingerprint(tester.store()).await;
        let result = tester.test(&valid_doc()).await;

        assert!(matches!(
            result,
            Err(DeployError::Timeout { attempts: 3, .. })
        ));
        assert_eq!(checker.calls(), 3);
        assert_eq!(tree_fingerprint(tester.store()).await, before);
        assert!(tester.store().staged_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transient_failure_then_success() {
        let dir = TempDir::new().unwrap();
        let checker = ScriptedCheck::new(vec![
            Err(CheckUnavailable {
                reason: "timeout".to_string(),
            }),
            Ok(CheckOutcome::passed()),
        ]);
        let tester = DeploymentTester::new(ConfigStore::new(dir.path()), checker.clone())
            .with_retry(RetryPolicy {
                attempts: 3,
                initial_backoff: std::time::Duration::from_millis(1),
            });

        let report = tester.test(&valid_doc()).await.unwrap();
        assert!(report.passed);
        assert_eq!(checker.calls(), 2);
    }

    #[tokio::test]
    async fn test_redeploy_overwrites_same_logical_id() {
        let dir = TempDir::new().unwrap();
        let checker = ScriptedCheck::new(Vec::new());
        let tester = DeploymentTester::new(ConfigStore::new(dir.path()), checker);
        let doc = valid_doc();

        tester.test(&doc).await.unwrap();
        tester.test(&doc).await.unwrap();

        // Same logical id means update-in-place, not duplication
        let docs = tester.store().all_documents().await.unwrap();
        assert_eq!(docs.len(), 1);
    }
}
