//! Endpoint and global configuration as supplied by the user.
//!
//! These types mirror the configuration file one to one. Every optional
//! field stays optional here; [`crate::resolver`] merges them with the
//! global defaults into a [`crate::ResolvedEndpoint`].

use std::collections::BTreeMap;
use std::fmt;

use serde::de::value::{MapAccessDeserializer, SeqAccessDeserializer};
use serde::de::{MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Whether the host build runs in production or development mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    #[default]
    Production,
    Development,
}

impl BuildMode {
    /// Production builds are the only ones that touch the network by default.
    pub fn is_production(self) -> bool {
        matches!(self, BuildMode::Production)
    }
}

/// Configuration of a single remote endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Absolute HTTP(S) URL to fetch (required)
    #[serde(default)]
    pub url: Option<String>,

    /// Artifact path relative to the output path
    #[serde(default)]
    pub output_file: Option<String>,

    /// Substitute data for development builds and failed fetches (required)
    #[serde(default, deserialize_with = "present")]
    pub fallback_data: Option<Value>,

    /// Overrides [`GlobalOptions::inline_as_variable`]
    #[serde(default)]
    pub inline_as_variable: Option<bool>,

    /// Global the data is assigned to when inlined
    #[serde(default)]
    pub variable_name: Option<String>,

    /// Method, headers and body for the request
    #[serde(default)]
    pub request_options: Option<RequestOptions>,

    /// Overrides [`GlobalOptions::save_as_file`]
    #[serde(default)]
    pub save_as_file: Option<bool>,

    /// Type annotation used in the declaration file
    #[serde(default)]
    pub type_reference: Option<String>,

    /// Overrides [`GlobalOptions::production`] and the build mode
    #[serde(default)]
    pub production: Option<bool>,

    /// Overrides [`GlobalOptions::request_timeout`] (milliseconds)
    #[serde(default)]
    pub request_timeout: Option<u64>,

    /// Overrides [`GlobalOptions::retry_count`]
    #[serde(default)]
    pub retry_count: Option<u32>,
}

impl EndpointConfig {
    /// Create an endpoint with the two required fields set.
    pub fn new(url: impl Into<String>, fallback_data: Value) -> Self {
        Self {
            url: Some(url.into()),
            fallback_data: Some(fallback_data),
            ..Default::default()
        }
    }

    pub fn variable_name(mut self, name: impl Into<String>) -> Self {
        self.variable_name = Some(name.into());
        self
    }

    pub fn output_file(mut self, path: impl Into<String>) -> Self {
        self.output_file = Some(path.into());
        self
    }

    pub fn production(mut self, production: bool) -> Self {
        self.production = Some(production);
        self
    }

    pub fn retry_count(mut self, retries: u32) -> Self {
        self.retry_count = Some(retries);
        self
    }

    pub fn request_timeout(mut self, millis: u64) -> Self {
        self.request_timeout = Some(millis);
        self
    }

    pub fn inline_as_variable(mut self, inline: bool) -> Self {
        self.inline_as_variable = Some(inline);
        self
    }

    pub fn save_as_file(mut self, save: bool) -> Self {
        self.save_as_file = Some(save);
        self
    }

    pub fn type_reference(mut self, type_reference: impl Into<String>) -> Self {
        self.type_reference = Some(type_reference.into());
        self
    }
}

/// An explicit `null` is still a supplied value, unlike a missing key.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Request customisation for an endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestOptions {
    /// HTTP method, `GET` when unset
    #[serde(default)]
    pub method: Option<String>,

    /// Extra request headers
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Request body. Strings are sent verbatim, anything else as JSON.
    #[serde(default)]
    pub body: Option<Value>,
}

/// A single endpoint or a list of them, as accepted by the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Endpoints {
    One(Box<EndpointConfig>),
    Many(Vec<EndpointConfig>),
}

/// Branches on the input shape so an error inside an endpoint keeps its
/// field name instead of collapsing into "no variant matched".
impl<'de> Deserialize<'de> for Endpoints {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct EndpointsVisitor;

        impl<'de> Visitor<'de> for EndpointsVisitor {
            type Value = Endpoints;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an endpoint table or a list of endpoint tables")
            }

            fn visit_seq<A>(self, seq: A) -> Result<Endpoints, A::Error>
            where
                A: SeqAccess<'de>,
            {
                Vec::deserialize(SeqAccessDeserializer::new(seq)).map(Endpoints::Many)
            }

            fn visit_map<A>(self, map: A) -> Result<Endpoints, A::Error>
            where
                A: MapAccess<'de>,
            {
                EndpointConfig::deserialize(MapAccessDeserializer::new(map))
                    .map(|endpoint| Endpoints::One(Box::new(endpoint)))
            }
        }

        deserializer.deserialize_any(EndpointsVisitor)
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Endpoints::Many(Vec::new())
    }
}

impl Endpoints {
    /// Normalize into configuration order.
    pub fn into_vec(self) -> Vec<EndpointConfig> {
        match self {
            Endpoints::One(endpoint) => vec![*endpoint],
            Endpoints::Many(endpoints) => endpoints,
        }
    }
}

impl From<EndpointConfig> for Endpoints {
    fn from(endpoint: EndpointConfig) -> Self {
        Endpoints::One(Box::new(endpoint))
    }
}

impl From<Vec<EndpointConfig>> for Endpoints {
    fn from(endpoints: Vec<EndpointConfig>) -> Self {
        Endpoints::Many(endpoints)
    }
}

/// Defaults applied to every endpoint that does not override them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalOptions {
    /// Fetch for real. Falls back to the build mode when unset.
    pub production: Option<bool>,

    /// Inline data into generated HTML
    pub inline_as_variable: bool,

    /// Prefix for generated variable names
    pub variable_prefix: String,

    /// Write a JSON artifact per endpoint
    pub save_as_file: bool,

    /// Per-attempt timeout in milliseconds
    pub request_timeout: u64,

    /// Additional attempts after the first failure
    pub retry_count: u32,

    /// Directory under the build output that receives artifacts
    pub output_path: String,

    /// Emit a type declaration file for inlined globals
    pub emit_declaration_file: bool,

    /// Declaration file path relative to the build output
    pub declaration_file_path: String,

    /// Type used for globals without a type reference
    pub default_type: String,
}

impl Default for GlobalOptions {
    fn default() -> Self {
        Self {
            production: None,
            inline_as_variable: true,
            variable_prefix: "API_DATA".to_string(),
            save_as_file: true,
            request_timeout: 10_000,
            retry_count: 2,
            output_path: String::new(),
            emit_declaration_file: false,
            declaration_file_path: "api-inliner.d.ts".to_string(),
            default_type: "any".to_string(),
        }
    }
}

impl GlobalOptions {
    /// Effective production flag for the given build mode.
    pub fn production_for(&self, mode: BuildMode) -> bool {
        self.production.unwrap_or(mode.is_production())
    }
}
