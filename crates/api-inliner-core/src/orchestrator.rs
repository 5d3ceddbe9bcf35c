//! Build orchestration.
//!
//! Drives one build through `Idle → Resolving → Fetching → Finalizing →
//! Done`. Only configuration errors move it to `Failed`; every other failure
//! is absorbed by fallback substitution.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::watch;

use crate::artifacts::write_artifact;
use crate::config::{BuildMode, EndpointConfig, Endpoints, GlobalOptions};
use crate::declarations::emit_declarations;
use crate::fallback::{Callbacks, EndpointError, FallbackCoordinator, Provenance};
use crate::fetch::{FetchExecutor, ReqwestTransport, Transport};
use crate::resolver::{resolve_endpoints, ConfigError, ResolvedEndpoint};
use crate::state::{BuildPhase, BuildState, StateEntry, StateHandle};

/// Endpoints that passed resolution. Only [`Orchestrator::resolve`] creates one.
#[derive(Debug, Clone)]
pub struct ResolvedPlan {
    endpoints: Vec<ResolvedEndpoint>,
}

impl ResolvedPlan {
    pub fn endpoints(&self) -> &[ResolvedEndpoint] {
        &self.endpoints
    }
}

/// Summary of one endpoint's outcome.
#[derive(Debug, Clone, Serialize)]
pub struct EndpointReport {
    pub url: String,
    pub variable_name: Option<String>,
    pub provenance: Provenance,
    pub attempts: u32,
    pub artifact: Option<PathBuf>,
}

/// Result of a build run.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub endpoints: Vec<EndpointReport>,
    pub declaration_file: Option<PathBuf>,
    pub write_errors: usize,
    pub duration_ms: u64,
}

impl BuildReport {
    pub fn fetched(&self) -> usize {
        self.count(Provenance::Fetched)
    }

    pub fn fallbacks(&self) -> usize {
        self.count(Provenance::Fallback)
    }

    fn count(&self, provenance: Provenance) -> usize {
        self.endpoints
            .iter()
            .filter(|e| e.provenance == provenance)
            .count()
    }
}

/// Builder for [`Orchestrator`].
pub struct OrchestratorBuilder {
    endpoints: Vec<EndpointConfig>,
    options: GlobalOptions,
    mode: BuildMode,
    transport: Option<Arc<dyn Transport>>,
    callbacks: Callbacks,
}

impl OrchestratorBuilder {
    pub fn mode(mut self, mode: BuildMode) -> Self {
        self.mode = mode;
        self
    }

    /// Replace the default reqwest transport.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn callbacks(mut self, callbacks: Callbacks) -> Self {
        self.callbacks = callbacks;
        self
    }

    pub fn build(self) -> Result<Orchestrator, ConfigError> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new()?),
        };
        let (phase, _) = watch::channel(BuildPhase::Idle);

        Ok(Orchestrator {
            endpoints: self.endpoints,
            options: self.options,
            mode: self.mode,
            coordinator: FallbackCoordinator::new(FetchExecutor::new(transport), self.callbacks),
            phase,
        })
    }
}

/// Drives endpoint resolution, fetching and output for one build.
pub struct Orchestrator {
    endpoints: Vec<EndpointConfig>,
    options: GlobalOptions,
    mode: BuildMode,
    coordinator: FallbackCoordinator,
    phase: watch::Sender<BuildPhase>,
}

impl Orchestrator {
    pub fn builder(endpoints: impl Into<Endpoints>, options: GlobalOptions) -> OrchestratorBuilder {
        OrchestratorBuilder {
            endpoints: endpoints.into().into_vec(),
            options,
            mode: BuildMode::default(),
            transport: None,
            callbacks: Callbacks::default(),
        }
    }

    pub fn options(&self) -> &GlobalOptions {
        &self.options
    }

    /// Handle for consumers that need the final state, such as the injector.
    pub fn state(&self) -> StateHandle {
        StateHandle::new(self.phase.subscribe())
    }

    pub fn phase(&self) -> BuildPhase {
        self.phase.borrow().clone()
    }

    fn transition(&self, next: BuildPhase) {
        tracing::debug!("Inliner phase: {} -> {}", self.phase.borrow().name(), next.name());
        self.phase.send_replace(next);
    }

    /// Validate configuration. No network I/O happens before this succeeds.
    pub fn resolve(&self) -> Result<ResolvedPlan, ConfigError> {
        self.transition(BuildPhase::Resolving);

        match resolve_endpoints(&self.endpoints, &self.options, self.mode) {
            Ok(endpoints) => Ok(ResolvedPlan { endpoints }),
            Err(e) => {
                self.transition(BuildPhase::Failed(e.to_string()));
                Err(e)
            }
        }
    }

    /// Fetch every endpoint concurrently, then write artifacts and declarations.
    pub async fn execute(&self, plan: ResolvedPlan, output_dir: &Path) -> BuildReport {
        let start = Instant::now();
        self.transition(BuildPhase::Fetching);

        let settled = join_all(
            plan.endpoints
                .iter()
                .map(|endpoint| self.coordinator.resolve(endpoint)),
        )
        .await;

        let state = Arc::new(BuildState::new(
            plan.endpoints
                .into_iter()
                .zip(settled)
                .map(|(endpoint, data)| StateEntry { endpoint, data })
                .collect(),
        ));
        self.transition(BuildPhase::Finalizing(Arc::clone(&state)));

        let artifact_root = output_dir.join(&self.options.output_path);
        let mut write_errors = 0;
        let mut endpoints = Vec::with_capacity(state.len());

        for entry in state.entries() {
            let artifact = match write_artifact(&artifact_root, &entry.endpoint, &entry.data).await
            {
                Ok(path) => path,
                Err(e) => {
                    tracing::warn!("{}", e);
                    write_errors += 1;
                    self.coordinator
                        .callbacks()
                        .error(&EndpointError::Write(e), &entry.endpoint);
                    None
                }
            };

            endpoints.push(EndpointReport {
                url: entry.endpoint.url.to_string(),
                variable_name: entry.endpoint.variable_name.clone(),
                provenance: entry.data.provenance,
                attempts: entry.data.attempts,
                artifact,
            });
        }

        let mut declaration_file = None;
        if self.options.emit_declaration_file {
            let path = output_dir.join(&self.options.declaration_file_path);
            let resolved: Vec<ResolvedEndpoint> =
                state.entries().iter().map(|e| e.endpoint.clone()).collect();

            match emit_declarations(&path, &resolved, &self.options.default_type).await {
                Ok(()) => declaration_file = Some(path),
                Err(e) => {
                    tracing::warn!("{}", e);
                    write_errors += 1;
                    // Reported against every global the file would have declared
                    let error = EndpointError::Write(e);
                    for endpoint in resolved.iter().filter(|r| r.inline_name().is_some()) {
                        self.coordinator.callbacks().error(&error, endpoint);
                    }
                }
            }
        }

        let report = BuildReport {
            endpoints,
            declaration_file,
            write_errors,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        tracing::info!(
            "Resolved {} endpoint(s): {} fetched, {} fallback in {}ms",
            report.endpoints.len(),
            report.fetched(),
            report.fallbacks(),
            report.duration_ms
        );

        self.transition(BuildPhase::Done(state));
        report
    }

    /// Resolve and execute in one go.
    pub async fn run(&self, output_dir: &Path) -> Result<BuildReport, ConfigError> {
        let plan = self.resolve()?;
        Ok(self.execute(plan, output_dir).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::test_support::{Reply, ScriptedTransport};
    use serde_json::{json, Value};
    use tempfile::tempdir;

    fn orchestrator(
        endpoints: Vec<EndpointConfig>,
        options: GlobalOptions,
        transport: Arc<ScriptedTransport>,
    ) -> Orchestrator {
        Orchestrator::builder(endpoints, options)
            .transport(transport)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn development_endpoint_uses_fallback_without_network() {
        let temp = tempdir().unwrap();
        let transport = Arc::new(ScriptedTransport::new());
        let orch = orchestrator(
            vec![EndpointConfig::new("https://x/a", json!({ "v": 1 }))
                .variable_name("A")
                .production(false)],
            GlobalOptions::default(),
            transport.clone(),
        );

        let report = orch.run(temp.path()).await.unwrap();
        let state = orch.state().ready().await.unwrap();

        let a = state.by_variable("A").unwrap();
        assert_eq!(a.data, json!({ "v": 1 }));
        assert_eq!(a.provenance, Provenance::Fallback);
        assert_eq!(transport.total_calls(), 0);
        assert_eq!(report.fallbacks(), 1);
    }

    #[tokio::test]
    async fn retries_until_success() {
        let temp = tempdir().unwrap();
        let transport = Arc::new(ScriptedTransport::new().script(
            "https://x/b",
            vec![
                Reply::Status(500),
                Reply::Status(500),
                Reply::Json(json!({ "v": 9 })),
            ],
        ));
        let orch = orchestrator(
            vec![EndpointConfig::new("https://x/b", json!({ "v": 0 }))
                .variable_name("B")
                .production(true)
                .retry_count(2)],
            GlobalOptions::default(),
            transport.clone(),
        );

        let report = orch.run(temp.path()).await.unwrap();
        let state = orch.state().ready().await.unwrap();

        let b = state.by_variable("B").unwrap();
        assert_eq!(b.data, json!({ "v": 9 }));
        assert_eq!(b.provenance, Provenance::Fetched);
        assert_eq!(transport.calls("https://x/b"), 3);
        assert_eq!(report.endpoints[0].attempts, 3);
    }

    #[tokio::test]
    async fn duplicate_names_fail_before_any_request() {
        let temp = tempdir().unwrap();
        let transport = Arc::new(ScriptedTransport::new());
        let orch = orchestrator(
            vec![
                EndpointConfig::new("https://x/a", json!(1)).variable_name("DUP"),
                EndpointConfig::new("https://x/b", json!(2)).variable_name("DUP"),
            ],
            GlobalOptions {
                production: Some(true),
                ..Default::default()
            },
            transport.clone(),
        );

        let err = orch.run(temp.path()).await.unwrap_err();

        assert!(matches!(err, ConfigError::DuplicateVariableName { .. }));
        assert_eq!(transport.total_calls(), 0);
        assert!(matches!(orch.phase(), BuildPhase::Failed(_)));
        assert!(orch.state().ready().await.is_err());
    }

    #[tokio::test]
    async fn one_entry_per_endpoint_with_mixed_outcomes() {
        let temp = tempdir().unwrap();
        let transport = Arc::new(
            ScriptedTransport::new()
                .script("https://x/ok", vec![Reply::Json(json!("live"))])
                .script("https://x/down", vec![Reply::Hang, Reply::Hang]),
        );
        let errors = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&errors);
        let orch = Orchestrator::builder(
            vec![
                EndpointConfig::new("https://x/ok", json!("ok-fallback")),
                EndpointConfig::new("https://x/down", json!("down-fallback"))
                    .retry_count(1)
                    .request_timeout(20),
                EndpointConfig::new("https://x/dev", json!("dev")).production(false),
            ],
            GlobalOptions::default(),
        )
        .mode(BuildMode::Production)
        .transport(transport.clone())
        .callbacks(Callbacks::new().on_error(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        }))
        .build()
        .unwrap();

        orch.run(temp.path()).await.unwrap();
        let state = orch.state().ready().await.unwrap();

        assert_eq!(state.len(), 3);
        let data: Vec<&Value> = state.entries().iter().map(|e| &e.data.data).collect();
        assert_eq!(data, vec![&json!("live"), &json!("down-fallback"), &json!("dev")]);
        assert_eq!(state.count(Provenance::Fetched), 1);
        assert_eq!(state.count(Provenance::Fallback), 2);
        assert_eq!(transport.calls("https://x/down"), 2);
        assert_eq!(errors.load(Ordering::SeqCst), 1);
        assert!(matches!(orch.phase(), BuildPhase::Done(_)));
    }

    #[tokio::test]
    async fn writes_artifacts_under_output_path() {
        let temp = tempdir().unwrap();
        let transport = Arc::new(
            ScriptedTransport::new().script("https://x/posts", vec![Reply::Json(json!([1, 2]))]),
        );
        let orch = orchestrator(
            vec![
                EndpointConfig::new("https://x/posts", json!([])).output_file("posts.json"),
                EndpointConfig::new("https://x/none", json!([]))
                    .output_file("none.json")
                    .save_as_file(false)
                    .production(false),
            ],
            GlobalOptions {
                output_path: "api".to_string(),
                ..Default::default()
            },
            transport,
        );

        let report = orch.run(temp.path()).await.unwrap();

        let posts = temp.path().join("api/posts.json");
        assert_eq!(std::fs::read_to_string(&posts).unwrap(), "[1,2]");
        assert_eq!(report.endpoints[0].artifact.as_deref(), Some(posts.as_path()));
        assert!(!temp.path().join("api/none.json").exists());
        assert_eq!(report.write_errors, 0);
    }

    #[tokio::test]
    async fn write_failure_is_reported_not_fatal() {
        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join("blocked"), "").unwrap();
        let errors = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&errors);
        let orch = Orchestrator::builder(
            vec![EndpointConfig::new("https://x/a", json!(1))
                .output_file("blocked/a.json")
                .production(false)],
            GlobalOptions::default(),
        )
        .transport(Arc::new(ScriptedTransport::new()))
        .callbacks(Callbacks::new().on_error(move |error, _| {
            assert!(matches!(error, EndpointError::Write(_)));
            counter.fetch_add(1, Ordering::SeqCst);
        }))
        .build()
        .unwrap();

        let report = orch.run(temp.path()).await.unwrap();

        assert_eq!(report.write_errors, 1);
        assert_eq!(errors.load(Ordering::SeqCst), 1);
        assert!(orch.state().ready().await.unwrap().by_variable("API_DATA_0").is_some());
    }

    #[tokio::test]
    async fn emits_declarations_when_enabled() {
        let temp = tempdir().unwrap();
        let orch = orchestrator(
            vec![EndpointConfig::new("https://x/a", json!(1))
                .variable_name("A")
                .type_reference("number")],
            GlobalOptions {
                production: Some(false),
                emit_declaration_file: true,
                declaration_file_path: "types/globals.d.ts".to_string(),
                ..Default::default()
            },
            Arc::new(ScriptedTransport::new()),
        );

        let report = orch.run(temp.path()).await.unwrap();

        let path = temp.path().join("types/globals.d.ts");
        assert_eq!(report.declaration_file.as_deref(), Some(path.as_path()));
        assert!(std::fs::read_to_string(&path).unwrap().contains("A: number;"));
    }

    #[tokio::test]
    async fn declaration_write_failure_reaches_error_callback() {
        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join("blocked"), "").unwrap();
        let failed = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&failed);
        let orch = Orchestrator::builder(
            vec![
                EndpointConfig::new("https://x/a", json!(1)).variable_name("A"),
                EndpointConfig::new("https://x/b", json!(2)).inline_as_variable(false),
                EndpointConfig::new("https://x/c", json!(3)).variable_name("C"),
            ],
            GlobalOptions {
                production: Some(false),
                emit_declaration_file: true,
                declaration_file_path: "blocked/types.d.ts".to_string(),
                ..Default::default()
            },
        )
        .transport(Arc::new(ScriptedTransport::new()))
        .callbacks(Callbacks::new().on_error(move |error, endpoint| {
            assert!(matches!(error, EndpointError::Write(_)));
            sink.lock().unwrap().push(endpoint.variable_name.clone());
        }))
        .build()
        .unwrap();

        let report = orch.run(temp.path()).await.unwrap();

        assert_eq!(report.write_errors, 1);
        assert!(report.declaration_file.is_none());
        assert_eq!(
            *failed.lock().unwrap(),
            vec![Some("A".to_string()), Some("C".to_string())]
        );
        assert!(matches!(orch.phase(), BuildPhase::Done(_)));
    }

    #[tokio::test]
    async fn walks_through_phases() {
        let temp = tempdir().unwrap();
        let orch = orchestrator(vec![], GlobalOptions::default(), Arc::new(ScriptedTransport::new()));
        assert!(matches!(orch.phase(), BuildPhase::Idle));

        let plan = orch.resolve().unwrap();
        assert!(matches!(orch.phase(), BuildPhase::Resolving));
        assert!(plan.endpoints().is_empty());

        orch.execute(plan, temp.path()).await;
        assert!(matches!(orch.phase(), BuildPhase::Done(_)));
    }
}
