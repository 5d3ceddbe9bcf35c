//! Fallback coordination and user callbacks.
//!
//! Every endpoint ends up with data: either what the endpoint returned or
//! its configured fallback. Failures never escape this module; they surface
//! through the error callback and the [`Provenance`] tag only.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::artifacts::WriteError;
use crate::fetch::{FetchError, FetchExecutor, FetchOutcome};
use crate::resolver::ResolvedEndpoint;

/// Where final data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Fetched,
    Fallback,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::Fetched => write!(f, "fetched"),
            Provenance::Fallback => write!(f, "fallback"),
        }
    }
}

/// Data for one endpoint after fallback substitution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinalData {
    pub data: Value,
    pub provenance: Provenance,
    /// Requests issued; zero when fetching was skipped
    pub attempts: u32,
}

/// Non-fatal failures reported through the error callback.
#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    #[error("Fetch failed after {attempts} attempt(s): {error}")]
    Fetch { error: FetchError, attempts: u32 },

    #[error(transparent)]
    Write(#[from] WriteError),
}

pub type SuccessCallback = Arc<dyn Fn(&Value, &ResolvedEndpoint) + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(&EndpointError, &ResolvedEndpoint) + Send + Sync>;

/// User notifications. A panicking callback is logged and otherwise ignored.
#[derive(Clone, Default)]
pub struct Callbacks {
    on_success: Option<SuccessCallback>,
    on_error: Option<ErrorCallback>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_success<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Value, &ResolvedEndpoint) + Send + Sync + 'static,
    {
        self.on_success = Some(Arc::new(callback));
        self
    }

    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&EndpointError, &ResolvedEndpoint) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(callback));
        self
    }

    pub(crate) fn success(&self, data: &Value, endpoint: &ResolvedEndpoint) {
        if let Some(callback) = &self.on_success {
            guard("onSuccess", endpoint, || callback(data, endpoint));
        }
    }

    pub(crate) fn error(&self, error: &EndpointError, endpoint: &ResolvedEndpoint) {
        if let Some(callback) = &self.on_error {
            guard("onError", endpoint, || callback(error, endpoint));
        }
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_success", &self.on_success.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

fn guard(name: &str, endpoint: &ResolvedEndpoint, callback: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(callback)).is_err() {
        tracing::warn!("{} callback panicked for {}", name, endpoint.label());
    }
}

/// Decides whether to fetch and substitutes fallback data on failure.
#[derive(Clone)]
pub struct FallbackCoordinator {
    executor: FetchExecutor,
    callbacks: Callbacks,
}

impl FallbackCoordinator {
    pub fn new(executor: FetchExecutor, callbacks: Callbacks) -> Self {
        Self {
            executor,
            callbacks,
        }
    }

    pub fn callbacks(&self) -> &Callbacks {
        &self.callbacks
    }

    /// Produce final data for one endpoint. Never fails.
    pub async fn resolve(&self, endpoint: &ResolvedEndpoint) -> FinalData {
        if !endpoint.production {
            tracing::debug!("Skipping fetch for {} (development)", endpoint.label());
            return FinalData {
                data: endpoint.fallback_data.clone(),
                provenance: Provenance::Fallback,
                attempts: 0,
            };
        }

        match self.executor.fetch(endpoint).await {
            FetchOutcome::Success { data, attempts } => {
                tracing::info!(
                    "Fetched {} in {} attempt(s)",
                    endpoint.label(),
                    attempts
                );
                self.callbacks.success(&data, endpoint);
                FinalData {
                    data,
                    provenance: Provenance::Fetched,
                    attempts,
                }
            }
            FetchOutcome::Failure { error, attempts } => {
                tracing::warn!(
                    "Using fallback data for {}: {} ({} attempt(s))",
                    endpoint.label(),
                    error,
                    attempts
                );
                self.callbacks
                    .error(&EndpointError::Fetch { error, attempts }, endpoint);
                FinalData {
                    data: endpoint.fallback_data.clone(),
                    provenance: Provenance::Fallback,
                    attempts,
                }
            }
        }
    }
}
