//! Lifecycle hooks a host build tool exposes to plugins.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::inject::InjectError;
use crate::resolver::ConfigError;

/// Build-wide context passed to run hooks.
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// Directory all build output is written under
    pub output_dir: PathBuf,
}

/// A generated HTML page before it is written.
#[derive(Debug, Clone)]
pub struct HtmlPage {
    /// Output path relative to the output directory
    pub path: PathBuf,
    pub html: String,
}

/// Errors a plugin can abort the build with.
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Inject(#[from] InjectError),

    #[error("Background task failed: {0}")]
    Task(String),
}

/// Hooks invoked by the host, in this order: every `before_run`, then
/// `before_emit` for each page, then every `after_emit`.
///
/// The host continues once the returned future resolves.
#[async_trait]
pub trait BuildPlugin: Send + Sync {
    /// Plugin identifier for log lines
    fn name(&self) -> &'static str;

    /// Fires once per build, before any page is generated.
    async fn before_run(&self, _ctx: &BuildContext) -> Result<(), PluginError> {
        Ok(())
    }

    /// Fires once per generated page, before it is written.
    async fn before_emit(&self, _page: &mut HtmlPage) -> Result<(), PluginError> {
        Ok(())
    }

    /// Fires once per build, after every page has been written.
    async fn after_emit(&self, _ctx: &BuildContext) -> Result<(), PluginError> {
        Ok(())
    }
}
