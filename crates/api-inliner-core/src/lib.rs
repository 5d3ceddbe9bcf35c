//! Build-time API inlining.
//!
//! Fetches data from remote endpoints while a static site builds, falls back
//! to configured data when fetching is skipped or fails, and injects the
//! result into the build output as JSON artifacts, inline `<script>` globals
//! and an optional type declaration file.

pub mod artifacts;
pub mod config;
pub mod declarations;
pub mod fallback;
pub mod fetch;
pub mod hooks;
pub mod inject;
pub mod orchestrator;
pub mod plugin;
pub mod resolver;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;

pub use artifacts::{write_artifact, WriteError};
pub use config::{BuildMode, EndpointConfig, Endpoints, GlobalOptions, RequestOptions};
pub use declarations::{emit_declarations, render_declarations};
pub use fallback::{Callbacks, EndpointError, FallbackCoordinator, FinalData, Provenance};
pub use fetch::{FetchError, FetchExecutor, FetchOutcome, HttpResponse, ReqwestTransport, Transport};
pub use hooks::{BuildContext, BuildPlugin, HtmlPage, PluginError};
pub use inject::{inject_state, script_tag, InjectError, InlineInjector};
pub use orchestrator::{BuildReport, EndpointReport, Orchestrator, OrchestratorBuilder, ResolvedPlan};
pub use plugin::InlinerPlugin;
pub use resolver::{resolve_endpoints, ConfigError, EndpointKey, ResolvedEndpoint, ResolvedRequest};
pub use state::{BuildPhase, BuildState, StateEntry, StateError, StateHandle};
