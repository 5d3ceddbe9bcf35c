pub mod build;
pub mod fetch;
pub mod init;
pub mod serve;

use anyhow::Result;
use api_inliner_core::{BuildMode, Callbacks, Orchestrator};

use crate::config::ConfigFile;

/// Orchestrator for the configured endpoints with callbacks wired to the log.
pub fn orchestrator(config: &ConfigFile, mode: BuildMode) -> Result<Orchestrator> {
    let callbacks = Callbacks::new()
        .on_success(|data, endpoint| {
            tracing::debug!(
                "{} returned {} bytes",
                endpoint.label(),
                data.to_string().len()
            );
        })
        .on_error(|error, endpoint| {
            tracing::debug!("{} reported: {}", endpoint.label(), error);
        });

    let orchestrator = Orchestrator::builder(config.endpoints.clone(), config.options.clone())
        .mode(mode)
        .callbacks(callbacks)
        .build()?;

    Ok(orchestrator)
}
