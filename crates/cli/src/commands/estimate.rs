//! Prediction and analogous-cost commands

use crate::client::ApiClient;
use crate::output::{self, OutputFormat};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tabled::Tabled;

#[derive(Debug, Deserialize)]
struct PredictResponse {
    predictions: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize, Tabled)]
struct AnalogousRow {
    mean_cost_per_unit: f64,
    estimated_cost: f64,
    fallback_used: bool,
}

/// Parse a `name=value` feature argument
pub fn parse_feature(arg: &str) -> Result<(String, f64)> {
    let (name, value) = arg
        .split_once('=')
        .with_context(|| format!("expected name=value, got '{}'", arg))?;
    if name.is_empty() {
        bail!("feature name is empty in '{}'", arg);
    }
    let value: f64 = value
        .parse()
        .with_context(|| format!("'{}' is not a number in '{}'", value, arg))?;
    Ok((name.to_string(), value))
}

/// `estctl predict team_size=4 duration_months=12`
pub async fn predict(
    client: &ApiClient,
    features: &[String],
    format: OutputFormat,
) -> Result<()> {
    if features.is_empty() {
        bail!("at least one name=value feature is required");
    }
    let features: BTreeMap<String, f64> = features
        .iter()
        .map(|arg| parse_feature(arg))
        .collect::<Result<_>>()?;

    let response: PredictResponse = client
        .post("/predict", &serde_json::json!({ "features": features }))
        .await?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&response.predictions)?)
        }
        OutputFormat::Table => {
            for prediction in &response.predictions {
                output::print_success(&format!("predicted: {}", prediction));
            }
        }
    }
    Ok(())
}

/// `estctl analogous 250`
pub async fn analogous(client: &ApiClient, size: f64, format: OutputFormat) -> Result<()> {
    if !size.is_finite() || size <= 0.0 {
        bail!("size must be a positive number");
    }

    let row: AnalogousRow = client
        .post("/analogous", &serde_json::json!({ "size": size }))
        .await?;

    if row.fallback_used {
        output::print_warning("no historical data on the server, fallback constant used");
    }
    output::print_table(&[row], format);
    Ok(())
}
