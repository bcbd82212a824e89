//! On-disk configuration tree with atomic writes
//!
//! Layout:
//!
//! ```text
//! <root>/live/<kind>/<logical_id>.yaml    the deployed configuration
//! <root>/staging/<logical_id>.yaml        candidates under test
//! ```
//!
//! Every write goes through a temp file and an atomic rename, so the live
//! tree is never observable in a half-written state.

use std::path::{Path, PathBuf};

use forge_document::{ConfigDocument, DocumentKind};
use tokio::fs;
use tracing::{debug, warn};

use crate::{DeployError, DeployResult};

/// A deployed document as read back from the live tree
#[derive(Debug, Clone)]
pub struct LiveDocument {
    /// Document kind (live subdirectory)
    pub kind: DocumentKind,
    /// Logical id (file stem)
    pub logical_id: String,
    /// Raw YAML content
    pub raw_form: String,
}

/// Pre-deployment state of one live slot, for rollback
#[derive(Debug, Clone)]
pub struct DeploySnapshot {
    kind: DocumentKind,
    logical_id: String,
    /// File content before the deployment, None if the slot was empty
    content: Option<String>,
}

/// The persisted configuration tree
#[derive(Debug, Clone)]
pub struct ConfigStore {
    root: PathBuf,
}

impl ConfigStore {
    /// Open a config store rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of the tree
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn live_path(&self, kind: DocumentKind, logical_id: &str) -> PathBuf {
        self.root
            .join("live")
            .join(kind.as_str())
            .join(format!("{}.yaml", logical_id))
    }

    fn staging_path(&self, logical_id: &str) -> PathBuf {
        self.root.join("staging").join(format!("{}.yaml", logical_id))
    }

    async fn write_atomic(&self, path: &Path, content: &str) -> DeployResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let temp = path.with_extension("yaml.tmp");
        fs::write(&temp, content).await?;
        fs::rename(&temp, path).await?;
        Ok(())
    }

    /// Capture the current live content of a document's slot
    pub async fn snapshot(
        &self,
        kind: DocumentKind,
        logical_id: &str,
    ) -> DeployResult<DeploySnapshot> {
        let path = self.live_path(kind, logical_id);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => Some(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(DeployError::Storage(e)),
        };
        Ok(DeploySnapshot {
            kind,
            logical_id: logical_id.to_string(),
            content,
        })
    }

    /// Restore a slot to its snapshotted content
    pub async fn restore(&self, snapshot: &DeploySnapshot) -> DeployResult<()> {
        let path = self.live_path(snapshot.kind, &snapshot.logical_id);
        match &snapshot.content {
            Some(content) => self.write_atomic(&path, content).await?,
            None => match fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(DeployError::Storage(e)),
            },
        }
        debug!(logical_id = %snapshot.logical_id, "live slot restored");
        Ok(())
    }

    /// Write a candidate into the staging area
    pub async fn stage(&self, doc: &ConfigDocument) -> DeployResult<PathBuf> {
        let path = self.staging_path(&doc.logical_id);
        self.write_atomic(&path, &doc.raw_form).await?;
        debug!(logical_id = %doc.logical_id, "candidate staged");
        Ok(path)
    }

    /// Remove a staged candidate; missing files are fine
    pub async fn discard_staged(&self, logical_id: &str) {
        let path = self.staging_path(logical_id);
        match fs::remove_file(&path).await {
            Ok(()) => debug!(logical_id, "staged candidate discarded"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(logical_id, error = %e, "failed to discard staged candidate"),
        }
    }

    /// Promote a document into the live tree
    pub async fn persist(&self, doc: &ConfigDocument) -> DeployResult<()> {
        let path = self.live_path(doc.kind, &doc.logical_id);
        self.write_atomic(&path, &doc.raw_form).await?;
        debug!(kind = %doc.kind, logical_id = %doc.logical_id, "document deployed");
        Ok(())
    }

    /// Read one live document back, if deployed
    pub async fn get(
        &self,
        kind: DocumentKind,
        logical_id: &str,
    ) -> DeployResult<Option<LiveDocument>> {
        let path = self.live_path(kind, logical_id);
        match fs::read_to_string(&path).await {
            Ok(raw_form) => Ok(Some(LiveDocument {
                kind,
                logical_id: logical_id.to_string(),
                raw_form,
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(DeployError::Storage(e)),
        }
    }

    /// All deployed documents, across kinds, sorted by (kind, id)
    pub async fn all_documents(&self) -> DeployResult<Vec<LiveDocument>> {
        let mut out = Vec::new();
        for kind in [
            DocumentKind::Dashboard,
            DocumentKind::Automation,
            DocumentKind::Script,
            DocumentKind::Scene,
        ] {
            let dir = self.root.join("live").join(kind.as_str());
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(DeployError::Storage(e)),
            };

            let mut ids = Vec::new();
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if path.extension().map(|e| e == "yaml").unwrap_or(false) {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        ids.push(stem.to_string());
                    }
                }
            }
            ids.sort();

            for id in ids {
                if let Some(doc) = self.get(kind, &id).await? {
                    out.push(doc);
                }
            }
        }
        Ok(out)
    }

    /// Ids of staged candidates left on disk
    pub async fn staged_ids(&self) -> DeployResult<Vec<String>> {
        let dir = self.root.join("staging");
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(DeployError::Storage(e)),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map(|e| e == "yaml").unwrap_or(false) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}
