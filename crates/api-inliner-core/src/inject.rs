//! Inline injection of build data into generated HTML.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::state::{BuildState, StateError, StateHandle};

static HEAD_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</head\s*>").expect("head pattern is valid"));

/// Errors injecting scripts into a page.
#[derive(Debug, thiserror::Error)]
pub enum InjectError {
    #[error(transparent)]
    State(#[from] StateError),

    #[error("Failed to serialize `{name}`: {message}")]
    Serialize { name: String, message: String },
}

/// Serialize a value for embedding in a `<script>` element.
///
/// `<` only occurs inside JSON strings, so escaping it cannot change the
/// value but keeps `</script>` and `<!--` out of the markup.
pub fn script_json(value: &Value) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(value)?;
    Ok(json
        .replace('<', "\\u003c")
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029"))
}

/// Build the `<script>` element assigning `data` to `window[name]`.
pub fn script_tag(name: &str, data: &Value) -> Result<String, InjectError> {
    let serialize = |e: serde_json::Error| InjectError::Serialize {
        name: name.to_string(),
        message: e.to_string(),
    };
    let key = script_json(&Value::String(name.to_string())).map_err(serialize)?;
    let value = script_json(data).map_err(serialize)?;

    Ok(format!("<script>window[{}] = {};</script>", key, value))
}

/// Script elements for every inlined endpoint, in configuration order.
pub fn script_tags(state: &BuildState) -> Result<Vec<String>, InjectError> {
    state
        .inlined()
        .map(|(name, data)| script_tag(name, &data.data))
        .collect()
}

/// Insert `snippet` right before the first closing head tag.
///
/// Returns false, leaving `html` untouched, when there is no closing head tag.
pub fn insert_before_head_close(html: &mut String, snippet: &str) -> bool {
    let Some(at) = HEAD_CLOSE.find(html).map(|m| m.start()) else {
        return false;
    };

    let mut insertion = String::with_capacity(snippet.len() + 1);
    insertion.push_str(snippet);
    insertion.push('\n');
    html.insert_str(at, &insertion);
    true
}

/// Injects inlined data into pages once the build state is ready.
#[derive(Debug, Clone)]
pub struct InlineInjector {
    state: StateHandle,
}

impl InlineInjector {
    pub fn new(state: StateHandle) -> Self {
        Self { state }
    }

    /// Wait for the build state, then insert one script per inlined endpoint.
    ///
    /// Returns the number of scripts inserted.
    pub async fn inject(&self, html: &mut String) -> Result<usize, InjectError> {
        let state = self.state.ready().await?;
        inject_state(&state, html)
    }
}

/// Insert scripts for an already resolved state.
pub fn inject_state(state: &BuildState, html: &mut String) -> Result<usize, InjectError> {
    let tags = script_tags(state)?;
    if tags.is_empty() {
        return Ok(0);
    }

    if !insert_before_head_close(html, &tags.join("\n")) {
        tracing::warn!("No closing </head> tag found; skipped inlining {} global(s)", tags.len());
        return Ok(0);
    }

    Ok(tags.len())
}
