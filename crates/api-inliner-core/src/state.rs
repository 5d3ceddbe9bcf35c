//! Per-build state and the readiness signal consumers wait on.

use std::sync::Arc;

use tokio::sync::watch;

use crate::fallback::{FinalData, Provenance};
use crate::resolver::{EndpointKey, ResolvedEndpoint};

/// Final data for one endpoint.
#[derive(Debug, Clone)]
pub struct StateEntry {
    pub endpoint: ResolvedEndpoint,
    pub data: FinalData,
}

/// Final data for every endpoint of one build, in configuration order.
///
/// Built once by the orchestrator and shared read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct BuildState {
    entries: Vec<StateEntry>,
}

impl BuildState {
    pub(crate) fn new(entries: Vec<StateEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[StateEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &EndpointKey) -> Option<&FinalData> {
        self.entries
            .iter()
            .find(|e| &e.endpoint.key() == key)
            .map(|e| &e.data)
    }

    /// Look up data by variable name.
    pub fn by_variable(&self, name: &str) -> Option<&FinalData> {
        self.entries
            .iter()
            .find(|e| e.endpoint.variable_name.as_deref() == Some(name))
            .map(|e| &e.data)
    }

    /// Entries that are inlined into HTML, in configuration order.
    pub fn inlined(&self) -> impl Iterator<Item = (&str, &FinalData)> {
        self.entries
            .iter()
            .filter_map(|e| e.endpoint.inline_name().map(|name| (name, &e.data)))
    }

    pub fn count(&self, provenance: Provenance) -> usize {
        self.entries
            .iter()
            .filter(|e| e.data.provenance == provenance)
            .count()
    }
}

/// Orchestrator lifecycle. `Failed` is only reached on configuration errors.
#[derive(Debug, Clone, Default)]
pub enum BuildPhase {
    #[default]
    Idle,
    Resolving,
    Fetching,
    Finalizing(Arc<BuildState>),
    Done(Arc<BuildState>),
    Failed(String),
}

impl BuildPhase {
    pub fn name(&self) -> &'static str {
        match self {
            BuildPhase::Idle => "idle",
            BuildPhase::Resolving => "resolving",
            BuildPhase::Fetching => "fetching",
            BuildPhase::Finalizing(_) => "finalizing",
            BuildPhase::Done(_) => "done",
            BuildPhase::Failed(_) => "failed",
        }
    }

    /// The build state, once every endpoint has settled.
    pub fn state(&self) -> Option<&Arc<BuildState>> {
        match self {
            BuildPhase::Finalizing(state) | BuildPhase::Done(state) => Some(state),
            _ => None,
        }
    }

    fn is_settled(&self) -> bool {
        matches!(
            self,
            BuildPhase::Finalizing(_) | BuildPhase::Done(_) | BuildPhase::Failed(_)
        )
    }
}

/// Errors waiting for build state.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StateError {
    #[error("Endpoint resolution failed: {0}")]
    Failed(String),

    #[error("Orchestrator was dropped before endpoints were resolved")]
    Abandoned,

    #[error("Endpoint resolution was never started")]
    NotStarted,
}

/// Read side of the orchestrator's phase. Cheap to clone.
#[derive(Debug, Clone)]
pub struct StateHandle {
    rx: watch::Receiver<BuildPhase>,
}

impl StateHandle {
    pub(crate) fn new(rx: watch::Receiver<BuildPhase>) -> Self {
        Self { rx }
    }

    /// Current phase, without waiting.
    pub fn phase(&self) -> BuildPhase {
        self.rx.borrow().clone()
    }

    /// Wait until every endpoint has settled and return the final state.
    pub async fn ready(&self) -> Result<Arc<BuildState>, StateError> {
        let mut rx = self.rx.clone();
        let phase = rx
            .wait_for(BuildPhase::is_settled)
            .await
            .map_err(|_| StateError::Abandoned)?
            .clone();

        match phase {
            BuildPhase::Finalizing(state) | BuildPhase::Done(state) => Ok(state),
            BuildPhase::Failed(reason) => Err(StateError::Failed(reason)),
            _ => Err(StateError::Abandoned),
        }
    }
}
