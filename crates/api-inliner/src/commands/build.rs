//! Static site build command.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use api_inliner_core::{BuildMode, InlinerPlugin};
use api_inliner_site::StaticBuilder;

use crate::config::load_config;

/// Run the build command.
pub async fn run(config_path: &Path, output: Option<PathBuf>, mode: BuildMode) -> Result<()> {
    tracing::info!("Building static site...");

    let file_config = load_config(config_path)?;
    let orchestrator = super::orchestrator(&file_config, mode)?;
    let plugin = Arc::new(InlinerPlugin::new(orchestrator));

    let result = StaticBuilder::new(file_config.site_config(output))
        .plugin(plugin.clone())
        .build()
        .await?;

    tracing::info!("Built {} pages in {}ms", result.pages, result.duration_ms);

    if let Some(report) = plugin.report().await {
        for endpoint in &report.endpoints {
            tracing::info!(
                "  {} [{}] {}",
                endpoint.variable_name.as_deref().unwrap_or("-"),
                endpoint.provenance,
                endpoint.url
            );
        }
        if let Some(path) = &report.declaration_file {
            tracing::info!("Declarations: {}", path.display());
        }
    }

    tracing::info!("Output: {}", result.output_dir.display());

    Ok(())
}
