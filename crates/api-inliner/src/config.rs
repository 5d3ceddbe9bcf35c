//! Configuration file (inliner.toml).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use api_inliner_core::{Endpoints, GlobalOptions};
use api_inliner_site::SiteConfig;
use serde::Deserialize;

#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub site: SiteSection,
    #[serde(default)]
    pub options: GlobalOptions,
    #[serde(default)]
    pub endpoints: Endpoints,
}

#[derive(Debug, Deserialize)]
pub struct SiteSection {
    #[serde(default = "default_pages")]
    pub pages: String,
    #[serde(default = "default_output")]
    pub output: String,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for SiteSection {
    fn default() -> Self {
        Self {
            pages: default_pages(),
            output: default_output(),
            title: default_title(),
            base_url: default_base_url(),
        }
    }
}

fn default_pages() -> String {
    "pages".to_string()
}
fn default_output() -> String {
    "dist".to_string()
}
fn default_title() -> String {
    "Site".to_string()
}
fn default_base_url() -> String {
    "/".to_string()
}

impl ConfigFile {
    /// Site builder settings, with an optional output directory override.
    pub fn site_config(&self, output: Option<PathBuf>) -> SiteConfig {
        SiteConfig {
            pages_dir: PathBuf::from(&self.site.pages),
            output_dir: output.unwrap_or_else(|| self.output_dir()),
            title: self.site.title.clone(),
            base_url: self.site.base_url.clone(),
        }
    }

    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(&self.site.output)
    }
}

/// Load configuration if the file exists.
/// Returns an error if the file exists but is malformed.
pub fn load_config(path: &Path) -> Result<ConfigFile> {
    if !path.exists() {
        tracing::debug!("{} not found, using defaults", path.display());
        return Ok(ConfigFile::default());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    tracing::info!("Loaded config from {}", path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::tempdir;

    fn load(content: &str) -> Result<ConfigFile> {
        let temp = tempdir().unwrap();
        let path = temp.path().join("inliner.toml");
        fs::write(&path, content).unwrap();
        load_config(&path)
    }

    #[test]
    fn missing_file_uses_defaults() {
        let temp = tempdir().unwrap();

        let config = load_config(&temp.path().join("inliner.toml")).unwrap();

        assert_eq!(config.site.pages, "pages");
        assert_eq!(config.output_dir(), PathBuf::from("dist"));
        assert_eq!(config.options, GlobalOptions::default());
        assert!(config.endpoints.into_vec().is_empty());
    }

    #[test]
    fn parses_endpoint_list() {
        let config = load(
            r#"
[site]
title = "Shop"

[options]
variable_prefix = "SHOP"
retry_count = 0
emit_declaration_file = true

[[endpoints]]
url = "https://api.example.com/products"
output_file = "products.json"
variable_name = "PRODUCTS"
fallback_data = []

[[endpoints]]
url = "https://api.example.com/config"
fallback_data = { theme = "light", columns = 3 }
request_options = { method = "POST", headers = { authorization = "Bearer x" } }
"#,
        )
        .unwrap();

        assert_eq!(config.site.title, "Shop");
        assert_eq!(config.site.output, "dist");
        assert_eq!(config.options.variable_prefix, "SHOP");
        assert_eq!(config.options.retry_count, 0);
        assert!(config.options.emit_declaration_file);
        assert_eq!(config.options.request_timeout, 10_000);

        let endpoints = config.endpoints.into_vec();
        assert_eq!(endpoints.len(), 2);
        assert_eq!(endpoints[0].variable_name.as_deref(), Some("PRODUCTS"));
        assert_eq!(endpoints[0].fallback_data, Some(json!([])));
        assert_eq!(
            endpoints[1].fallback_data,
            Some(json!({ "theme": "light", "columns": 3 }))
        );
        let request = endpoints[1].request_options.as_ref().unwrap();
        assert_eq!(request.method.as_deref(), Some("POST"));
        assert_eq!(request.headers["authorization"], "Bearer x");
    }

    #[test]
    fn parses_single_endpoint_table() {
        let config = load(
            r#"
[endpoints]
url = "https://api.example.com/config"
fallback_data = "offline"
retry_count = 4
"#,
        )
        .unwrap();

        let endpoints = config.endpoints.into_vec();
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].retry_count, Some(4));
        assert_eq!(endpoints[0].fallback_data, Some(json!("offline")));
    }

    #[test]
    fn ignores_unknown_keys() {
        let config = load(
            r#"
theme = "extra"

[options]
unknown_option = 1

[[endpoints]]
url = "https://api.example.com/a"
fallback_data = 1
not_a_field = true
"#,
        )
        .unwrap();

        assert_eq!(config.endpoints.into_vec().len(), 1);
    }

    #[test]
    fn malformed_file_names_the_file() {
        let err = load("[site\ntitle = ").unwrap_err();

        assert!(format!("{err:#}").contains("Failed to parse"));
        assert!(format!("{err:#}").contains("inliner.toml"));
    }

    #[test]
    fn bad_endpoint_field_is_reported() {
        let err = load(
            r#"
[[endpoints]]
url = "https://api.example.com/a"
fallback_data = 1
retry_count = "x"
"#,
        )
        .unwrap_err();

        let message = format!("{err:#}");
        assert!(message.contains("invalid type"), "{message}");
        assert!(!message.contains("did not match any variant"), "{message}");
    }

    #[test]
    fn output_override_wins() {
        let config = ConfigFile::default();

        let site = config.site_config(Some(PathBuf::from("public")));

        assert_eq!(site.output_dir, PathBuf::from("public"));
        assert_eq!(site.pages_dir, PathBuf::from("pages"));
    }
}
