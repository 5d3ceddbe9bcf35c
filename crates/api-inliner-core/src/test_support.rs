//! In-memory transport used by unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::fetch::{FetchError, HttpResponse, Transport};
use crate::resolver::ResolvedEndpoint;

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum Reply {
    Json(Value),
    Status(u16),
    Body(&'static str),
    NetworkError,
    Hang,
}

/// Replays scripted replies per URL and counts requests.
///
/// Once a URL's script is used up every further request fails with a
/// network error.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, url: &str, replies: Vec<Reply>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(url.to_string(), replies.into());
        self
    }

    pub fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, endpoint: &ResolvedEndpoint) -> Result<HttpResponse, FetchError> {
        let url = endpoint.url.to_string();
        *self.calls.lock().unwrap().entry(url.clone()).or_default() += 1;

        let reply = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&url)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Reply::NetworkError);

        match reply {
            Reply::Json(value) => Ok(HttpResponse {
                status: 200,
                body: serde_json::to_vec(&value).unwrap(),
            }),
            Reply::Status(status) => Ok(HttpResponse {
                status,
                body: Vec::new(),
            }),
            Reply::Body(body) => Ok(HttpResponse {
                status: 200,
                body: body.as_bytes().to_vec(),
            }),
            Reply::NetworkError => Err(FetchError::Network("connection refused".to_string())),
            Reply::Hang => std::future::pending().await,
        }
    }
}
