//! Deployment tester
//!
//! Stages a validated candidate, runs the external config-check capability
//! against the merged staged + live configuration, and either promotes the
//! candidate into the live tree or rolls everything back. The live tree has
//! single-writer discipline: one deployment cycle at a time, enforced here.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use forge_document::ConfigDocument;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::config_store::{ConfigStore, DeploySnapshot, LiveDocument};
use crate::{DeployError, DeployResult};

/// Result of invoking the external config-check capability
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    /// Whether the merged configuration checked out
    pub ok: bool,
    /// Checker-reported problems
    pub errors: Vec<String>,
}

impl CheckOutcome {
    /// A passing outcome
    pub fn passed() -> Self {
        Self {
            ok: true,
            errors: Vec::new(),
        }
    }

    /// A failing outcome with reasons
    pub fn failed(errors: Vec<String>) -> Self {
        Self { ok: false, errors }
    }
}

/// Transient failure to reach the checker; retried with backoff
#[derive(Debug, Clone, thiserror::Error)]
#[error("config check unavailable: {reason}")]
pub struct CheckUnavailable {
    /// What went wrong at the transport level
    pub reason: String,
}

/// The external config-check capability
#[async_trait]
pub trait ConfigCheck: Send + Sync {
    /// Check the candidate against the merged staged + live configuration
    async fn check(
        &self,
        candidate: &ConfigDocument,
        live: &[LiveDocument],
    ) -> Result<CheckOutcome, CheckUnavailable>;
}

/// Outcome of a deployment test cycle
#[derive(Debug, Clone)]
pub struct TestReport {
    /// Whether the candidate passed and was deployed
    pub passed: bool,
    /// Whether live state had to be (or was preemptively) rolled back
    pub rollback_performed: bool,
    /// Checker output and cycle notes
    pub details: Vec<String>,
}

impl TestReport {
    /// Convert a failed report into an error, for callers that treat a
    /// rejected candidate as a hard failure
    pub fn into_result(self) -> DeployResult<TestReport> {
        if self.passed {
            Ok(self)
        } else {
            Err(DeployError::DeploymentTestFailure {
                details: self.details,
            })
        }
    }
}

/// Retry behavior for transient checker failures
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts before surfacing Timeout
    pub attempts: u32,
    /// Delay before the second attempt; doubles each retry
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            initial_backoff: Duration::from_millis(250),
        }
    }
}

/// The deployment tester
pub struct DeploymentTester {
    store: ConfigStore,
    checker: Arc<dyn ConfigCheck>,
    retry: RetryPolicy,
    /// Single-writer discipline for the live tree
    write_lock: Mutex<()>,
}

impl DeploymentTester {
    /// Create a tester over a config store and a checker
    pub fn new(store: ConfigStore, checker: Arc<dyn ConfigCheck>) -> Self {
        Self {
            store,
            checker,
            retry: RetryPolicy::default(),
            write_lock: Mutex::new(()),
        }
    }

    /// Override the retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The underlying config store
    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// Stage, check, and deploy-or-rollback one candidate
    ///
    /// The candidate must already be Valid; the tester exists to catch
    /// cross-document and runtime-level problems the validator cannot see,
    /// not to substitute for it. On every exit path the staging area is
    /// clean and the live tree is either fully updated or bit-for-bit
    /// unchanged.
    #[instrument(skip(self, doc), fields(kind = %doc.kind, logical_id = %doc.logical_id))]
    pub async fn test(&self, doc: &ConfigDocument) -> DeployResult<TestReport> {
        if !doc.is_valid() {
            return Err(DeployError::NotValidated {
                logical_id: doc.logical_id.clone(),
            });
        }

        let _guard = self.write_lock.lock().await;

        let snapshot = self.store.snapshot(doc.kind, &doc.logical_id).await?;
        let live = self.store.all_documents().await?;
        self.store.stage(doc).await?;

        let check_result = self.check_with_retry(doc, &live).await;
        self.store.discard_staged(&doc.logical_id).await;

        let outcome = match check_result {
            Ok(outcome) => outcome,
            Err(err) => {
                // Nothing was written to the live tree yet; the staged
                // artifact is already discarded.
                warn!(error = %err, "config check unreachable, candidate rejected");
                return Err(err);
            }
        };

        if !outcome.ok {
            info!(errors = outcome.errors.len(), "config check rejected candidate");
            return Ok(TestReport {
                passed: false,
                rollback_performed: true,
                details: outcome.errors,
            });
        }

        self.promote_with_rollback(doc, &snapshot).await?;

        info!("candidate deployed");
        Ok(TestReport {
            passed: true,
            rollback_performed: false,
            details: outcome.errors,
        })
    }

    async fn check_with_retry(
        &self,
        doc: &ConfigDocument,
        live: &[LiveDocument],
    ) -> DeployResult<CheckOutcome> {
        let mut backoff = self.retry.initial_backoff;
        let mut last_reason = String::new();

        for attempt in 1..=self.retry.attempts {
            match self.checker.check(doc, live).await {
                Ok(outcome) => return Ok(outcome),
                Err(err) => {
                    debug!(attempt, reason = %err.reason, "config check attempt failed");
                    last_reason = err.reason;
                    if attempt < self.retry.attempts {
                        tokio::time::sleep(backoff).await;
                        backoff *= 2;
                    }
                }
            }
        }

        Err(DeployError::Timeout {
            attempts: self.retry.attempts,
            reason: last_reason,
        })
    }

    /// Promote into the live tree; a failed write is rolled back to the
    /// snapshot, and the write is retried once only after that rollback is
    /// confirmed.
    async fn promote_with_rollback(
        &self,
        doc: &ConfigDocument,
        snapshot: &DeploySnapshot,
    ) -> DeployResult<()> {
        let mut last_error = None;
        for _ in 0..2 {
            match self.store.persist(doc).await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    warn!(error = %err, "deployment write failed, rolling back");
                    if let Err(restore_err) = self.store.restore(snapshot).await {
                        return Err(DeployError::RollbackFailed {
                            logical_id: doc.logical_id.clone(),
                            reason: restore_err.to_string(),
                        });
                    }
                    last_error = Some(err);
                }
            }
        }
        // Both attempts failed; the confirmed rollback left live unchanged
        Err(last_error.unwrap_or_else(|| DeployError::RollbackFailed {
            logical_id: doc.logical_id.clone(),
            reason: "deployment write failed without error detail".to_string(),
        }))
    }
}
