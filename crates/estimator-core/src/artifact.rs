//! Serialized classifier artifact
//!
//! The artifact is a self-describing JSON document: an optional expected
//! feature-column list, an ordered class label set, and a decision-tree
//! ensemble voting by majority. It is treated as opaque by everything
//! except this module; the lifecycle manager loads and swaps it whole.

use crate::error::{EstimatorError, Result};
use crate::models::Label;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A single node in a decision tree
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeNode {
    /// Branch left when `row[feature] <= threshold`, right otherwise
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    /// Terminal node voting for a class index
    Leaf { class: usize },
}

/// One tree of the ensemble; node 0 is the root
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<TreeNode>,
}

impl DecisionTree {
    /// Walk the tree for one input row, returning the leaf's class index
    fn classify(&self, row: &[f64]) -> Result<usize> {
        let mut idx = 0usize;
        // validate() requires splits to link strictly forward, so the
        // walk always advances and terminates at a leaf
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf { class } => return Ok(*class),
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let value = row.get(*feature).copied().ok_or_else(|| {
                        EstimatorError::ColumnMismatch(format!(
                            "row has {} values but the model references feature index {}",
                            row.len(),
                            feature
                        ))
                    })?;
                    idx = if value <= *threshold { *left } else { *right };
                }
            }
        }
    }
}

/// The loaded classifier artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierArtifact {
    /// Ordered column names the model expects, when the artifact declares
    /// them. Absent lists disable reindex-on-mismatch recovery.
    #[serde(default)]
    pub feature_names: Option<Vec<String>>,
    /// Class labels, indexed by the leaf class indices in `trees`
    pub classes: Vec<Label>,
    pub trees: Vec<DecisionTree>,
}

impl ClassifierArtifact {
    /// Deserialize and validate an artifact from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let artifact: ClassifierArtifact = serde_json::from_slice(bytes)
            .map_err(|e| EstimatorError::CorruptArtifact(e.to_string()))?;
        artifact.validate()?;
        Ok(artifact)
    }

    /// Read and deserialize an artifact from a file path
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(EstimatorError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    /// Structural validation; failures surface as `CorruptArtifact`
    fn validate(&self) -> Result<()> {
        if self.trees.is_empty() {
            return Err(EstimatorError::CorruptArtifact(
                "artifact contains no trees".to_string(),
            ));
        }
        if self.classes.is_empty() {
            return Err(EstimatorError::CorruptArtifact(
                "artifact declares no classes".to_string(),
            ));
        }
        for (t, tree) in self.trees.iter().enumerate() {
            if tree.nodes.is_empty() {
                return Err(EstimatorError::CorruptArtifact(format!(
                    "tree {} has no nodes",
                    t
                )));
            }
            for (n, node) in tree.nodes.iter().enumerate() {
                match node {
                    TreeNode::Leaf { class } => {
                        if *class >= self.classes.len() {
                            return Err(EstimatorError::CorruptArtifact(format!(
                                "tree {} node {} votes for unknown class {}",
                                t, n, class
                            )));
                        }
                    }
                    TreeNode::Split { left, right, .. } => {
                        if *left >= tree.nodes.len() || *right >= tree.nodes.len() {
                            return Err(EstimatorError::CorruptArtifact(format!(
                                "tree {} node {} links past the node table",
                                t, n
                            )));
                        }
                        // splits must link strictly forward; a backward or
                        // self link would make classification loop forever
                        if *left <= n || *right <= n {
                            return Err(EstimatorError::CorruptArtifact(format!(
                                "tree {} node {} links backward",
                                t, n
                            )));
                        }
                    }
                }
            }
        }
        if let Some(names) = &self.feature_names {
            if names.len() < self.n_features() {
                return Err(EstimatorError::CorruptArtifact(format!(
                    "artifact declares {} feature names but references {} features",
                    names.len(),
                    self.n_features()
                )));
            }
        }
        Ok(())
    }

    /// Expected column names, if the artifact declares them
    pub fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    /// Input arity: the declared column count, or the highest feature
    /// index referenced by any split plus one
    pub fn n_features(&self) -> usize {
        if let Some(names) = &self.feature_names {
            return names.len();
        }
        self.trees
            .iter()
            .flat_map(|t| t.nodes.iter())
            .filter_map(|n| match n {
                TreeNode::Split { feature, .. } => Some(*feature + 1),
                TreeNode::Leaf { .. } => None,
            })
            .max()
            .unwrap_or(0)
    }

    /// Classify a batch of rows, one label per row, order-preserving.
    ///
    /// Majority vote across trees; ties break toward the lowest class
    /// index for determinism.
    pub fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<Label>> {
        rows.iter().map(|row| self.predict_row(row)).collect()
    }

    fn predict_row(&self, row: &[f64]) -> Result<Label> {
        let mut votes = vec![0usize; self.classes.len()];
        for tree in &self.trees {
            votes[tree.classify(row)?] += 1;
        }
        let winner = votes
            .iter()
            .enumerate()
            .max_by(|(ia, a), (ib, b)| a.cmp(b).then(ib.cmp(ia)))
            .map(|(i, _)| i)
            .unwrap_or(0);
        Ok(self.classes[winner].clone())
    }
}
