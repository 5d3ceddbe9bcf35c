//! Attaches an [`Orchestrator`] to a host build through [`BuildPlugin`].

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::hooks::{BuildContext, BuildPlugin, HtmlPage, PluginError};
use crate::inject::{InjectError, InlineInjector};
use crate::orchestrator::{BuildReport, Orchestrator};
use crate::state::{BuildPhase, StateError};

/// Runs the orchestrator alongside the host build.
///
/// `before_run` validates configuration and starts fetching in the
/// background, so the host keeps generating pages meanwhile. `before_emit`
/// waits for the build state before touching a page, which makes the
/// ordering between the two hooks irrelevant; a page emitted before any run
/// was started is an error rather than a wait. `after_emit` waits for
/// artifacts and declarations to be written.
pub struct InlinerPlugin {
    orchestrator: Arc<Orchestrator>,
    injector: InlineInjector,
    task: Mutex<Option<JoinHandle<BuildReport>>>,
    report: Mutex<Option<BuildReport>>,
}

impl InlinerPlugin {
    pub fn new(orchestrator: Orchestrator) -> Self {
        let injector = InlineInjector::new(orchestrator.state());
        Self {
            orchestrator: Arc::new(orchestrator),
            injector,
            task: Mutex::new(None),
            report: Mutex::new(None),
        }
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Report of the last completed build, available after `after_emit`.
    pub async fn report(&self) -> Option<BuildReport> {
        self.report.lock().await.clone()
    }
}

impl Drop for InlinerPlugin {
    fn drop(&mut self) {
        if let Some(handle) = self.task.get_mut().take() {
            handle.abort();
        }
    }
}

#[async_trait]
impl BuildPlugin for InlinerPlugin {
    fn name(&self) -> &'static str {
        "api-inliner"
    }

    async fn before_run(&self, ctx: &BuildContext) -> Result<(), PluginError> {
        // One run at a time: settle the previous one before resolving again
        let previous = self.task.lock().await.take();
        if let Some(handle) = previous {
            tracing::debug!("Waiting for the previous inliner run to finish");
            handle.await.map_err(|e| PluginError::Task(e.to_string()))?;
        }

        let plan = self.orchestrator.resolve()?;
        tracing::info!("Resolving {} API endpoint(s)", plan.endpoints().len());

        let orchestrator = Arc::clone(&self.orchestrator);
        let output_dir = ctx.output_dir.clone();
        let handle = tokio::spawn(async move { orchestrator.execute(plan, &output_dir).await });

        *self.task.lock().await = Some(handle);
        Ok(())
    }

    async fn before_emit(&self, page: &mut HtmlPage) -> Result<(), PluginError> {
        // Nothing would ever settle an idle orchestrator
        if matches!(self.orchestrator.phase(), BuildPhase::Idle) {
            return Err(InjectError::State(StateError::NotStarted).into());
        }

        let count = self.injector.inject(&mut page.html).await?;
        if count > 0 {
            tracing::debug!("Inlined {} global(s) into {}", count, page.path.display());
        }
        Ok(())
    }

    async fn after_emit(&self, _ctx: &BuildContext) -> Result<(), PluginError> {
        let Some(handle) = self.task.lock().await.take() else {
            return Ok(());
        };

        let report = handle.await.map_err(|e| PluginError::Task(e.to_string()))?;
        if report.write_errors > 0 {
            tracing::warn!("{} API artifact(s) could not be written", report.write_errors);
        }
        *self.report.lock().await = Some(report);
        Ok(())
    }
}
