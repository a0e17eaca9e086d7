//! Model lifecycle manager
//!
//! Owns the active classifier artifact and the historical record set.
//! Readers capture an `Arc` once per request and never observe a partial
//! swap; replacement is a whole-reference update behind a short write
//! lock, with replacements themselves serialized through a single-writer
//! mutex. Once a working artifact has existed, the store is never left
//! without one.

use crate::artifact::ClassifierArtifact;
use crate::error::{EstimatorError, Result};
use crate::historical::HistoricalData;
use crate::models::ReplaceOutcome;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};

/// Summary of what `initialize` managed to load
#[derive(Debug, Clone)]
pub struct StartupReport {
    pub model_loaded: bool,
    /// Number of historical records, when the dataset was present
    pub historical_records: Option<usize>,
}

/// Holds and swaps the active model artifact and historical dataset
pub struct ModelStore {
    model_path: PathBuf,
    model: RwLock<Option<Arc<ClassifierArtifact>>>,
    historical: RwLock<Option<Arc<HistoricalData>>>,
    /// Serializes replace_model; predict paths never take this
    replace_guard: Mutex<()>,
}

impl ModelStore {
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            model: RwLock::new(None),
            historical: RwLock::new(None),
            replace_guard: Mutex::new(()),
        }
    }

    /// Canonical on-disk location of the active artifact
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// Load the artifact from the canonical path and make it active.
    ///
    /// On failure the previously active artifact (if any) stays active.
    pub async fn load_model(&self) -> Result<()> {
        let artifact = ClassifierArtifact::from_path(&self.model_path)?;
        info!(
            path = %self.model_path.display(),
            classes = artifact.classes.len(),
            trees = artifact.trees.len(),
            "Model artifact loaded"
        );
        *self.model.write().await = Some(Arc::new(artifact));
        Ok(())
    }

    /// Startup loading: a missing artifact or dataset degrades the
    /// service instead of refusing to start.
    pub async fn initialize(&self, data_path: Option<&Path>) -> Result<StartupReport> {
        let model_loaded = match self.load_model().await {
            Ok(()) => true,
            Err(EstimatorError::NotFound { path }) => {
                warn!(path = %path.display(), "No model artifact found, starting degraded");
                false
            }
            // corrupt artifact on disk is a misconfiguration the operator
            // must resolve; propagate instead of starting blind
            Err(e) => return Err(e),
        };

        let historical_records = match data_path {
            Some(path) => match self.load_historical_data(path).await {
                Ok(records) => Some(records),
                Err(EstimatorError::NotFound { path }) => {
                    warn!(path = %path.display(), "No historical dataset found");
                    None
                }
                Err(e) => return Err(e),
            },
            None => None,
        };

        Ok(StartupReport {
            model_loaded,
            historical_records,
        })
    }

    /// Wholesale replace of the historical record set
    pub async fn load_historical_data(&self, path: &Path) -> Result<usize> {
        let data = HistoricalData::from_path(path)?;
        let records = data.len();
        info!(path = %path.display(), records, "Historical dataset loaded");
        *self.historical.write().await = Some(Arc::new(data));
        Ok(records)
    }

    /// Capture the active model reference; `None` while degraded
    pub async fn active_model(&self) -> Option<Arc<ClassifierArtifact>> {
        self.model.read().await.clone()
    }

    /// Capture the historical dataset reference
    pub async fn historical(&self) -> Option<Arc<HistoricalData>> {
        self.historical.read().await.clone()
    }

    /// Replace the artifact on disk and in memory.
    ///
    /// The existing file is preserved as a timestamped backup before
    /// overwrite. If the new bytes fail to load, the backup is restored
    /// and reloaded and the original failure is reported, so a previously
    /// working artifact never stops being active.
    pub async fn replace_model(&self, bytes: &[u8]) -> Result<ReplaceOutcome> {
        let _guard = self.replace_guard.lock().await;

        let backup_path = if self.model_path.exists() {
            let backup = self.backup_path_for_now();
            fs::copy(&self.model_path, &backup)?;
            info!(backup = %backup.display(), "Backed up current model artifact");
            Some(backup)
        } else {
            if let Some(parent) = self.model_path.parent() {
                fs::create_dir_all(parent)?;
            }
            None
        };

        fs::write(&self.model_path, bytes)?;

        match self.load_model().await {
            Ok(()) => Ok(ReplaceOutcome {
                checksum: compute_checksum(bytes),
                backup_path: backup_path.map(|p| p.display().to_string()),
            }),
            Err(load_err) => {
                if let Some(backup) = &backup_path {
                    warn!(
                        error = %load_err,
                        backup = %backup.display(),
                        "New artifact rejected, restoring backup"
                    );
                    fs::copy(backup, &self.model_path)?;
                    if let Err(restore_err) = self.load_model().await {
                        // backup no longer loads either; the in-memory
                        // artifact is still the last good one
                        error!(error = %restore_err, "Backup restore failed to load");
                    }
                } else {
                    warn!(error = %load_err, "New artifact rejected, no previous artifact to restore");
                    // leaving the rejected bytes at the canonical path
                    // would make the next startup refuse to come up
                    if let Err(remove_err) = fs::remove_file(&self.model_path) {
                        error!(error = %remove_err, "Failed to remove rejected artifact");
                    }
                }
                Err(load_err)
            }
        }
    }

    fn backup_path_for_now(&self) -> PathBuf {
        let ts = Utc::now().format("%Y%m%dT%H%M%SZ");
        let stem = self
            .model_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("model");
        let ext = self
            .model_path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("json");
        self.model_path
            .with_file_name(format!("{}_backup_{}.{}", stem, ts, ext))
    }
}

/// SHA256 hex digest of artifact bytes
pub fn compute_checksum(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Label;

    fn artifact_bytes() -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "feature_names": ["team_size"],
            "classes": ["junior", "senior"],
            "trees": [{"nodes": [
                {"kind": "split", "feature": 0, "threshold": 5.0, "left": 1, "right": 2},
                {"kind": "leaf", "class": 0},
                {"kind": "leaf", "class": 1},
            ]}],
        }))
        .unwrap()
    }

    fn always_junior_bytes() -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "classes": ["junior"],
            "trees": [{"nodes": [{"kind": "leaf", "class": 0}]}],
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_initialize_degrades_without_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path().join("model.json"));

        let report = store.initialize(None).await.unwrap();
        assert!(!report.model_loaded);
        assert!(store.active_model().await.is_none());
    }

    #[tokio::test]
    async fn test_initialize_loads_artifact_and_data() {
        let dir = tempfile::tempdir().unwrap();
        let model_path = dir.path().join("model.json");
        let data_path = dir.path().join("history.csv");
        fs::write(&model_path, artifact_bytes()).unwrap();
        fs::write(&data_path, "Effort,Transactions\n100,10\n").unwrap();

        let store = ModelStore::new(&model_path);
        let report = store.initialize(Some(&data_path)).await.unwrap();

        assert!(report.model_loaded);
        assert_eq!(report.historical_records, Some(1));
        assert!(store.active_model().await.is_some());
        assert!(store.historical().await.is_some());
    }

    #[tokio::test]
    async fn test_initialize_propagates_corrupt_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let model_path = dir.path().join("model.json");
        fs::write(&model_path, b"{broken").unwrap();

        let store = ModelStore::new(&model_path);
        let err = store.initialize(None).await.unwrap_err();
        assert_eq!(err.kind(), "corrupt_artifact");
    }

    #[tokio::test]
    async fn test_replace_model_swaps_and_backs_up() {
        let dir = tempfile::tempdir().unwrap();
        let model_path = dir.path().join("model.json");
        fs::write(&model_path, artifact_bytes()).unwrap();

        let store = ModelStore::new(&model_path);
        store.load_model().await.unwrap();

        let outcome = store.replace_model(&always_junior_bytes()).await.unwrap();
        assert!(outcome.backup_path.is_some());
        assert_eq!(outcome.checksum, compute_checksum(&always_junior_bytes()));

        // backup file preserved on disk
        let backup = PathBuf::from(outcome.backup_path.unwrap());
        assert!(backup.exists());

        // new model is active
        let model = store.active_model().await.unwrap();
        assert_eq!(
            model.predict(&[vec![]]).unwrap(),
            vec![Label::Text("junior".to_string())]
        );
    }

    #[tokio::test]
    async fn test_replace_model_with_corrupt_bytes_restores_backup() {
        let dir = tempfile::tempdir().unwrap();
        let model_path = dir.path().join("model.json");
        fs::write(&model_path, artifact_bytes()).unwrap();

        let store = ModelStore::new(&model_path);
        store.load_model().await.unwrap();

        let err = store.replace_model(b"definitely not a model").await.unwrap_err();
        assert_eq!(err.kind(), "corrupt_artifact");

        // the canonical file holds the restored artifact again
        let restored = fs::read(&model_path).unwrap();
        assert_eq!(restored, artifact_bytes());

        // and the active model still predicts
        let model = store.active_model().await.unwrap();
        assert_eq!(
            model.predict(&[vec![9.0]]).unwrap(),
            vec![Label::Text("senior".to_string())]
        );
    }

    #[tokio::test]
    async fn test_replace_model_without_prior_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let model_path = dir.path().join("model.json");

        let store = ModelStore::new(&model_path);
        let outcome = store.replace_model(&artifact_bytes()).await.unwrap();
        assert!(outcome.backup_path.is_none());
        assert!(store.active_model().await.is_some());
    }

    #[tokio::test]
    async fn test_replace_corrupt_without_prior_artifact_stays_unloaded() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path().join("model.json"));

        let err = store.replace_model(b"garbage").await.unwrap_err();
        assert_eq!(err.kind(), "corrupt_artifact");
        assert!(store.active_model().await.is_none());
    }

    #[tokio::test]
    async fn test_replace_corrupt_without_prior_artifact_cleans_disk() {
        let dir = tempfile::tempdir().unwrap();
        let model_path = dir.path().join("model.json");

        let store = ModelStore::new(&model_path);
        store.replace_model(b"garbage").await.unwrap_err();

        // rejected bytes must not survive at the canonical path, or the
        // next startup would fail on them
        assert!(!model_path.exists());
        let fresh = ModelStore::new(&model_path);
        let report = fresh.initialize(None).await.unwrap();
        assert!(!report.model_loaded);
    }

    #[test]
    fn test_checksum_is_stable_hex() {
        let sum = compute_checksum(b"abc");
        assert_eq!(
            sum,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
