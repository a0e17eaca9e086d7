//! Core data models for the estimation service

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Named scalar inputs describing a project, used for classification.
///
/// A `BTreeMap` keeps iteration order deterministic: when the loaded
/// artifact declares no expected-column list, feature values are applied
/// in ascending key order.
pub type FeatureVector = BTreeMap<String, f64>;

/// A predicted class label. JSON-serializable scalar only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Label {
    Int(i64),
    Text(String),
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Label::Int(v) => write!(f, "{}", v),
            Label::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Analogous cost estimate output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalogousEstimate {
    /// Mean of effort/transactions over usable historical rows (or the
    /// configured fallback constant)
    pub mean_cost_per_unit: f64,
    /// `mean_cost_per_unit * size`, no rounding beyond f64 precision
    pub estimated_cost: f64,
    /// True when the fallback constant stood in for historical data
    pub fallback_used: bool,
}

/// Outcome of a successful model replacement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaceOutcome {
    /// SHA256 of the newly active artifact bytes
    pub checksum: String,
    /// Path of the timestamped backup taken before overwrite, if a
    /// previous artifact existed
    pub backup_path: Option<String>,
}
