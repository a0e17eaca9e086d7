//! Health and readiness commands

use crate::client::ApiClient;
use crate::output::{self, OutputFormat};
use anyhow::Result;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Serialize, Deserialize)]
struct HealthResponse {
    status: String,
    components: BTreeMap<String, ComponentHealth>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ComponentHealth {
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReadinessResponse {
    ready: bool,
    reason: Option<String>,
}

fn colorize_status(status: &str) -> String {
    match status {
        "healthy" => status.green().to_string(),
        "degraded" => status.yellow().to_string(),
        _ => status.red().to_string(),
    }
}

/// `estctl health`
pub async fn health(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let health: HealthResponse = client.get("/healthz").await?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&health)?);
        }
        OutputFormat::Table => {
            println!("Overall: {}", colorize_status(&health.status));
            for (name, component) in &health.components {
                let detail = component.message.as_deref().unwrap_or("");
                println!(
                    "  {:<16} {} {}",
                    name,
                    colorize_status(&component.status),
                    detail
                );
            }
        }
    }
    Ok(())
}

/// `estctl ready`
pub async fn ready(client: &ApiClient) -> Result<()> {
    let readiness: ReadinessResponse = client.get("/readyz").await?;
    if readiness.ready {
        output::print_success("service is ready");
    } else {
        output::print_warning(&format!(
            "service not ready: {}",
            readiness.reason.as_deref().unwrap_or("unknown")
        ));
    }
    Ok(())
}
