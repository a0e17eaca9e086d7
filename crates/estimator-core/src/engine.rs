//! Estimation engine
//!
//! Two pure computations over state captured from the lifecycle manager:
//! classification prediction and analogous cost estimation. The engine
//! never mutates the model or the historical data.

use crate::artifact::ClassifierArtifact;
use crate::error::{EstimatorError, Result};
use crate::lifecycle::ModelStore;
use crate::models::{AnalogousEstimate, FeatureVector, Label};
use std::sync::Arc;
use tracing::debug;

/// Mean cost-per-unit observed across the original training corpus; used
/// when no historical dataset is available and strict mode is off.
pub const DEFAULT_FALLBACK_MEAN_COST_PER_UNIT: f64 = 38.191011608301174;

/// Estimation engine bound to a model store
pub struct EstimationEngine {
    store: Arc<ModelStore>,
    /// `None` = strict mode: analogous estimation hard-fails without data
    fallback_mean_cost_per_unit: Option<f64>,
}

impl EstimationEngine {
    pub fn new(store: Arc<ModelStore>, fallback_mean_cost_per_unit: Option<f64>) -> Self {
        Self {
            store,
            fallback_mean_cost_per_unit,
        }
    }

    /// Classify a batch of feature vectors, one label per row.
    ///
    /// When the artifact declares an expected-column list and the supplied
    /// keys don't match it exactly, the vector is reindexed to the
    /// declared columns with missing values filled as zero and the
    /// prediction retried once. Without a declared list, a mismatch
    /// propagates as `ColumnMismatch`.
    pub async fn predict(&self, rows: &[FeatureVector]) -> Result<Vec<Label>> {
        let model = self
            .store
            .active_model()
            .await
            .ok_or(EstimatorError::ModelNotLoaded)?;
        predict_with(&model, rows)
    }

    /// Analogous cost estimate: historical mean cost-per-unit scaled
    /// linearly by `size`.
    ///
    /// Fallback policy: when no dataset is loaded, or the dataset has no
    /// row with nonzero transactions, the configured fallback constant is
    /// used and flagged in the response. In strict mode (no fallback
    /// configured) the same situations are `HistoricalDataUnavailable`.
    /// A loaded dataset missing the required columns is a hard error in
    /// both modes.
    pub async fn analogous_cost(&self, size: f64) -> Result<AnalogousEstimate> {
        let mean = match self.store.historical().await {
            Some(data) => data.mean_unit_cost()?,
            None => None,
        };

        match mean {
            Some(mean_cost_per_unit) => Ok(AnalogousEstimate {
                mean_cost_per_unit,
                estimated_cost: mean_cost_per_unit * size,
                fallback_used: false,
            }),
            None => match self.fallback_mean_cost_per_unit {
                Some(fallback) => {
                    debug!(fallback, "No usable historical data, using fallback mean");
                    Ok(AnalogousEstimate {
                        mean_cost_per_unit: fallback,
                        estimated_cost: fallback * size,
                        fallback_used: true,
                    })
                }
                None => Err(EstimatorError::HistoricalDataUnavailable(
                    "no dataset loaded and strict mode disables the fallback constant".to_string(),
                )),
            },
        }
    }
}

/// Prediction against an already-captured artifact reference
fn predict_with(model: &ClassifierArtifact, rows: &[FeatureVector]) -> Result<Vec<Label>> {
    let numeric: Vec<Vec<f64>> = match model.feature_names() {
        Some(names) => rows
            .iter()
            .map(|features| {
                if keys_match(features, names) {
                    names.iter().map(|n| features[n]).collect()
                } else {
                    debug!("Feature columns differ from model inputs, reindexing with zero fill");
                    names
                        .iter()
                        .map(|n| features.get(n).copied().unwrap_or(0.0))
                        .collect()
                }
            })
            .collect(),
        // without a declared list there is nothing to reindex against:
        // the value count must match the model's arity exactly
        None => rows
            .iter()
            .map(|features| {
                let expected = model.n_features();
                if features.len() != expected {
                    return Err(EstimatorError::ColumnMismatch(format!(
                        "{} feature values supplied but the model expects {}",
                        features.len(),
                        expected
                    )));
                }
                Ok(features.values().copied().collect())
            })
            .collect::<Result<_>>()?,
    };
    model.predict(&numeric)
}

fn keys_match(features: &FeatureVector, names: &[String]) -> bool {
    features.len() == names.len() && names.iter().all(|n| features.contains_key(n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::fs;

    fn features(pairs: &[(&str, f64)]) -> FeatureVector {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect::<BTreeMap<_, _>>()
    }

    fn named_artifact_bytes() -> Vec<u8> {
        // splits on "team_size": <= 5 junior, > 5 senior
        serde_json::to_vec(&serde_json::json!({
            "feature_names": ["team_size", "duration_months"],
            "classes": ["junior", "senior"],
            "trees": [{"nodes": [
                {"kind": "split", "feature": 0, "threshold": 5.0, "left": 1, "right": 2},
                {"kind": "leaf", "class": 0},
                {"kind": "leaf", "class": 1},
            ]}],
        }))
        .unwrap()
    }

    fn anonymous_artifact_bytes() -> Vec<u8> {
        // two-feature tree with no declared feature names
        serde_json::to_vec(&serde_json::json!({
            "classes": ["junior", "senior"],
            "trees": [{"nodes": [
                {"kind": "split", "feature": 0, "threshold": 5.0, "left": 1, "right": 2},
                {"kind": "leaf", "class": 0},
                {"kind": "split", "feature": 1, "threshold": 1e9, "left": 3, "right": 4},
                {"kind": "leaf", "class": 1},
                {"kind": "leaf", "class": 1},
            ]}],
        }))
        .unwrap()
    }

    async fn engine_with_model(
        bytes: &[u8],
        csv: Option<&str>,
        fallback: Option<f64>,
    ) -> (EstimationEngine, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let model_path = dir.path().join("model.json");
        fs::write(&model_path, bytes).unwrap();
        let store = Arc::new(ModelStore::new(&model_path));
        store.load_model().await.unwrap();
        if let Some(csv) = csv {
            let data_path = dir.path().join("history.csv");
            fs::write(&data_path, csv).unwrap();
            store.load_historical_data(&data_path).await.unwrap();
        }
        (EstimationEngine::new(store, fallback), dir)
    }

    #[tokio::test]
    async fn test_predict_without_model_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ModelStore::new(dir.path().join("model.json")));
        let engine = EstimationEngine::new(store, None);

        let err = engine
            .predict(&[features(&[("team_size", 3.0)])])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "model_not_loaded");
    }

    #[tokio::test]
    async fn test_predict_exact_columns() {
        let (engine, _dir) = engine_with_model(&named_artifact_bytes(), None, None).await;

        let labels = engine
            .predict(&[
                features(&[("team_size", 3.0), ("duration_months", 12.0)]),
                features(&[("team_size", 9.0), ("duration_months", 12.0)]),
            ])
            .await
            .unwrap();
        assert_eq!(
            labels,
            vec![
                Label::Text("junior".to_string()),
                Label::Text("senior".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_predict_reindexes_extra_and_missing_keys() {
        let (engine, _dir) = engine_with_model(&named_artifact_bytes(), None, None).await;

        // missing duration_months, extra budget: reindexed with zero fill
        let labels = engine
            .predict(&[features(&[("team_size", 9.0), ("budget", 1e6)])])
            .await
            .unwrap();
        assert_eq!(labels, vec![Label::Text("senior".to_string())]);
    }

    #[tokio::test]
    async fn test_predict_without_declared_names_uses_key_order() {
        let (engine, _dir) = engine_with_model(&anonymous_artifact_bytes(), None, None).await;

        let labels = engine
            .predict(&[features(&[("a_first", 9.0), ("b_second", 1.0)])])
            .await
            .unwrap();
        assert_eq!(labels, vec![Label::Text("senior".to_string())]);
    }

    #[tokio::test]
    async fn test_predict_without_declared_names_mismatch_fails() {
        let (engine, _dir) = engine_with_model(&anonymous_artifact_bytes(), None, None).await;

        let err = engine.predict(&[features(&[])]).await.unwrap_err();
        assert_eq!(err.kind(), "column_mismatch");
    }

    #[tokio::test]
    async fn test_predict_without_declared_names_surplus_fails() {
        let (engine, _dir) = engine_with_model(&anonymous_artifact_bytes(), None, None).await;

        // three values against a two-feature model: no declared list to
        // reindex against, so this must not silently truncate
        let err = engine
            .predict(&[features(&[("a", 1.0), ("b", 2.0), ("c", 3.0)])])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "column_mismatch");
    }

    #[tokio::test]
    async fn test_analogous_cost_worked_example() {
        let (engine, _dir) = engine_with_model(
            &named_artifact_bytes(),
            Some("Effort,Transactions\n100,10\n0,0\n"),
            Some(DEFAULT_FALLBACK_MEAN_COST_PER_UNIT),
        )
        .await;

        let estimate = engine.analogous_cost(5.0).await.unwrap();
        assert_eq!(estimate.mean_cost_per_unit, 10.0);
        assert_eq!(estimate.estimated_cost, 50.0);
        assert!(!estimate.fallback_used);
    }

    #[tokio::test]
    async fn test_analogous_cost_exact_scaling() {
        let (engine, _dir) = engine_with_model(
            &named_artifact_bytes(),
            Some("Effort,Transactions\n7,3\n11,2\n"),
            None,
        )
        .await;

        let estimate = engine.analogous_cost(12.5).await.unwrap();
        let mean = (7.0 / 3.0 + 11.0 / 2.0) / 2.0;
        assert_eq!(estimate.mean_cost_per_unit, mean);
        assert_eq!(estimate.estimated_cost, mean * 12.5);
    }

    #[tokio::test]
    async fn test_analogous_cost_fallback_without_data() {
        let (engine, _dir) = engine_with_model(
            &named_artifact_bytes(),
            None,
            Some(DEFAULT_FALLBACK_MEAN_COST_PER_UNIT),
        )
        .await;

        let estimate = engine.analogous_cost(2.0).await.unwrap();
        assert!(estimate.fallback_used);
        assert_eq!(
            estimate.mean_cost_per_unit,
            DEFAULT_FALLBACK_MEAN_COST_PER_UNIT
        );
        assert_eq!(
            estimate.estimated_cost,
            DEFAULT_FALLBACK_MEAN_COST_PER_UNIT * 2.0
        );
    }

    #[tokio::test]
    async fn test_analogous_cost_strict_mode_fails_without_data() {
        let (engine, _dir) = engine_with_model(&named_artifact_bytes(), None, None).await;

        let err = engine.analogous_cost(2.0).await.unwrap_err();
        assert_eq!(err.kind(), "historical_data_unavailable");
    }

    #[tokio::test]
    async fn test_analogous_cost_all_zero_transactions_uses_fallback() {
        let (engine, _dir) = engine_with_model(
            &named_artifact_bytes(),
            Some("Effort,Transactions\n100,0\n"),
            Some(1.5),
        )
        .await;

        let estimate = engine.analogous_cost(4.0).await.unwrap();
        assert!(estimate.fallback_used);
        assert_eq!(estimate.estimated_cost, 6.0);
    }

    #[tokio::test]
    async fn test_analogous_cost_missing_columns_hard_error() {
        let (engine, _dir) = engine_with_model(
            &named_artifact_bytes(),
            Some("Cost,Size\n100,10\n"),
            Some(DEFAULT_FALLBACK_MEAN_COST_PER_UNIT),
        )
        .await;

        // required columns absent: hard error even with a fallback configured
        let err = engine.analogous_cost(5.0).await.unwrap_err();
        assert_eq!(err.kind(), "historical_data_unavailable");
    }
}
