//! Model replacement command

use crate::client::ApiClient;
use crate::output;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct UploadResponse {
    detail: String,
    checksum: String,
    backup_path: Option<String>,
}

/// `estctl upload-model new_model.json --token ...`
pub async fn upload(client: &ApiClient, path: &Path, token: &str) -> Result<()> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read artifact {}", path.display()))?;
    let filename = path
        .file_name()
        .and_then(|f| f.to_str())
        .unwrap_or("model.json");

    let response: UploadResponse = client
        .post_bytes(
            &format!("/admin/upload-model?filename={}", filename),
            bytes,
            token,
        )
        .await?;

    output::print_success(&format!("{} (sha256 {})", response.detail, response.checksum));
    if let Some(backup) = response.backup_path {
        println!("previous artifact backed up to {}", backup);
    }
    Ok(())
}
