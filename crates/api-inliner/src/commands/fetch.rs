//! Fetch endpoints and write artifacts without building pages.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use api_inliner_core::BuildMode;

use crate::config::load_config;

/// Run the fetch command.
pub async fn run(
    config_path: &Path,
    output: Option<PathBuf>,
    mode: BuildMode,
    json: bool,
) -> Result<()> {
    let file_config = load_config(config_path)?;
    let output_dir = output.unwrap_or_else(|| file_config.output_dir());
    let orchestrator = super::orchestrator(&file_config, mode)?;

    let report = orchestrator.run(&output_dir).await?;

    if json {
        let rendered =
            serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        println!("{}", rendered);
        return Ok(());
    }

    for endpoint in &report.endpoints {
        let artifact = endpoint
            .artifact
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "-".to_string());
        tracing::info!(
            "  {} [{}, {} attempt(s)] -> {}",
            endpoint.url,
            endpoint.provenance,
            endpoint.attempts,
            artifact
        );
    }
    if report.write_errors > 0 {
        tracing::warn!("{} write error(s)", report.write_errors);
    }

    Ok(())
}
