//! Endpoint resolution.
//!
//! Merges each [`EndpointConfig`] with [`GlobalOptions`] into a
//! [`ResolvedEndpoint`]. Resolution is pure: no I/O happens here, and every
//! configuration error is reported before the first request is issued.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde_json::Value;
use url::Url;

use crate::config::{BuildMode, EndpointConfig, GlobalOptions, RequestOptions};

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").expect("identifier pattern is valid")
});

/// Unrecoverable configuration problems. These abort the build.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Endpoint #{index} is missing required field `{field}`")]
    MissingField { index: usize, field: &'static str },

    #[error("Endpoint #{index} has an invalid url '{url}': {reason}")]
    InvalidUrl {
        index: usize,
        url: String,
        reason: String,
    },

    #[error("Variable name '{name}' is used by endpoints #{first} and #{second}")]
    DuplicateVariableName {
        name: String,
        first: usize,
        second: usize,
    },

    #[error("Endpoint #{index} has an invalid variable name '{name}'")]
    InvalidVariableName { index: usize, name: String },

    #[error("Endpoint #{index} has an invalid request option: {reason}")]
    InvalidRequest { index: usize, reason: String },

    #[error("Endpoint #{index} has a zero request timeout")]
    ZeroTimeout { index: usize },

    #[error("Path for `{field}` must stay inside the output directory: {path}")]
    UnsafePath { field: &'static str, path: String },

    #[error("Failed to initialise HTTP client: {0}")]
    HttpClient(String),
}

/// Request parameters after validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRequest {
    pub method: Method,
    pub headers: Vec<(HeaderName, HeaderValue)>,
    pub body: Option<String>,
}

impl Default for ResolvedRequest {
    fn default() -> Self {
        Self {
            method: Method::GET,
            headers: Vec::new(),
            body: None,
        }
    }
}

/// An endpoint with every optional field defaulted. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedEndpoint {
    /// Position in configuration order
    pub index: usize,
    pub url: Url,
    pub output_file: Option<PathBuf>,
    pub fallback_data: Value,
    pub inline_as_variable: bool,
    /// Always set when `inline_as_variable` is true
    pub variable_name: Option<String>,
    pub request: ResolvedRequest,
    pub save_as_file: bool,
    pub type_reference: Option<String>,
    pub production: bool,
    pub request_timeout: Duration,
    pub retry_count: u32,
}

impl ResolvedEndpoint {
    /// The global name this endpoint is inlined as, if inlining is enabled.
    pub fn inline_name(&self) -> Option<&str> {
        if self.inline_as_variable {
            self.variable_name.as_deref()
        } else {
            None
        }
    }

    /// Identity of this endpoint within one build.
    pub fn key(&self) -> EndpointKey {
        EndpointKey {
            index: self.index,
            url: self.url.to_string(),
            variable_name: self.variable_name.clone(),
        }
    }

    /// Short label for log lines.
    pub fn label(&self) -> String {
        match &self.variable_name {
            Some(name) => format!("{} ({})", name, self.url),
            None => self.url.to_string(),
        }
    }
}

/// Identity of an endpoint in [`crate::BuildState`].
///
/// Url and variable name alone are not unique: endpoints that are not
/// inlined may share both, so the configuration position is part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointKey {
    pub index: usize,
    pub url: String,
    pub variable_name: Option<String>,
}

/// Resolve endpoints in configuration order.
///
/// Fails on the first invalid endpoint or on the first variable name that is
/// inlined by two endpoints.
pub fn resolve_endpoints(
    endpoints: &[EndpointConfig],
    options: &GlobalOptions,
    mode: BuildMode,
) -> Result<Vec<ResolvedEndpoint>, ConfigError> {
    check_relative("output_path", &options.output_path)?;
    check_relative("declaration_file_path", &options.declaration_file_path)?;

    let mut resolved = Vec::with_capacity(endpoints.len());
    let mut names: HashMap<String, usize> = HashMap::new();

    for (index, config) in endpoints.iter().enumerate() {
        let endpoint = merge(index, config, options, mode)?;

        if let Some(name) = endpoint.inline_name() {
            if let Some(&first) = names.get(name) {
                return Err(ConfigError::DuplicateVariableName {
                    name: name.to_string(),
                    first,
                    second: index,
                });
            }
            names.insert(name.to_string(), index);
        }

        resolved.push(endpoint);
    }

    Ok(resolved)
}

/// Merge one endpoint with the global defaults. Endpoint fields always win.
pub fn merge(
    index: usize,
    config: &EndpointConfig,
    options: &GlobalOptions,
    mode: BuildMode,
) -> Result<ResolvedEndpoint, ConfigError> {
    let raw_url = config
        .url
        .as_deref()
        .ok_or(ConfigError::MissingField { index, field: "url" })?;
    let url = parse_url(index, raw_url)?;

    let fallback_data = config
        .fallback_data
        .clone()
        .ok_or(ConfigError::MissingField {
            index,
            field: "fallback_data",
        })?;

    let inline_as_variable = config
        .inline_as_variable
        .unwrap_or(options.inline_as_variable);

    let variable_name = match config.variable_name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => Some(name.to_string()),
        _ if inline_as_variable => Some(format!("{}_{}", options.variable_prefix, index)),
        _ => None,
    };

    if inline_as_variable {
        if let Some(name) = &variable_name {
            if !IDENTIFIER.is_match(name) {
                return Err(ConfigError::InvalidVariableName {
                    index,
                    name: name.clone(),
                });
            }
        }
    }

    let output_file = match &config.output_file {
        Some(path) => {
            check_relative("output_file", path)?;
            Some(PathBuf::from(path))
        }
        None => None,
    };

    let timeout_ms = config.request_timeout.unwrap_or(options.request_timeout);
    if timeout_ms == 0 {
        return Err(ConfigError::ZeroTimeout { index });
    }

    let request = match &config.request_options {
        Some(request) => resolve_request(index, request)?,
        None => ResolvedRequest::default(),
    };

    Ok(ResolvedEndpoint {
        index,
        url,
        output_file,
        fallback_data,
        inline_as_variable,
        variable_name,
        request,
        save_as_file: config.save_as_file.unwrap_or(options.save_as_file),
        type_reference: config.type_reference.clone(),
        production: config
            .production
            .unwrap_or_else(|| options.production_for(mode)),
        request_timeout: Duration::from_millis(timeout_ms),
        retry_count: config.retry_count.unwrap_or(options.retry_count),
    })
}

fn parse_url(index: usize, raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidUrl {
        index,
        url: raw.to_string(),
        reason,
    };

    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(format!("unsupported scheme '{}'", other))),
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host".to_string()));
    }

    Ok(url)
}

fn resolve_request(index: usize, options: &RequestOptions) -> Result<ResolvedRequest, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidRequest { index, reason };

    let method = match &options.method {
        Some(method) => Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes())
            .map_err(|_| invalid(format!("method '{}'", method)))?,
        None => Method::GET,
    };

    let mut headers = Vec::with_capacity(options.headers.len());
    for (name, value) in &options.headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| invalid(format!("header name '{}'", name)))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|_| invalid(format!("value of header '{}'", name)))?;
        headers.push((header_name, header_value));
    }

    let body = match &options.body {
        None => None,
        Some(Value::String(text)) => Some(text.clone()),
        Some(value) => {
            if !headers.iter().any(|(name, _)| name == CONTENT_TYPE) {
                headers.push((CONTENT_TYPE, HeaderValue::from_static("application/json")));
            }
            Some(value.to_string())
        }
    };

    Ok(ResolvedRequest {
        method,
        headers,
        body,
    })
}

fn check_relative(field: &'static str, path: &str) -> Result<(), ConfigError> {
    let escapes = Path::new(path).components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });

    if escapes {
        return Err(ConfigError::UnsafePath {
            field,
            path: path.to_string(),
        });
    }
    Ok(())
}
