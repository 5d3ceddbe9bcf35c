//! Create a starter project.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Run the init command.
pub async fn run(config_path: &Path, yes: bool) -> Result<()> {
    tracing::info!("Initializing api-inliner...");

    write_starter(config_path, DEFAULT_CONFIG, yes)?;

    let pages_dir = Path::new("pages");
    fs::create_dir_all(pages_dir).context("Failed to create pages directory")?;
    write_starter(&pages_dir.join("index.md"), DEFAULT_INDEX, yes)?;

    tracing::info!("Initialization complete!");
    tracing::info!("Run 'api-inliner build' to build the site.");

    Ok(())
}

/// Write a starter file unless it exists and overwriting was not requested.
fn write_starter(path: &Path, content: &str, yes: bool) -> Result<bool> {
    if path.exists() && !yes {
        tracing::warn!("{} already exists. Use --yes to overwrite.", path.display());
        return Ok(false);
    }

    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::info!("Created {}", path.display());
    Ok(true)
}

const DEFAULT_CONFIG: &str = r#"# api-inliner configuration

[site]
# Source directory for pages (.md and .html)
pages = "pages"

# Output directory for the built site
output = "dist"

# Site title
title = "My Site"

# Base URL (for deployment)
base_url = "/"

[options]
# Fetch in production builds only; set to force either way
# production = true
inline_as_variable = true
variable_prefix = "API_DATA"
save_as_file = true
request_timeout = 10000
retry_count = 2
output_path = "api"
emit_declaration_file = true
declaration_file_path = "api-inliner.d.ts"
default_type = "any"

[[endpoints]]
url = "https://jsonplaceholder.typicode.com/todos/1"
output_file = "todo.json"
variable_name = "TODO"
type_reference = "{ id: number; title: string; completed: boolean }"
fallback_data = { id = 0, title = "offline", completed = false }
"#;

const DEFAULT_INDEX: &str = r#"# Welcome

This page was built with **api-inliner**.

Data fetched at build time is available to scripts as `window.TODO`
and on disk under `api/todo.json`.
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    use crate::config::load_config;

    #[test]
    fn starter_config_is_valid() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("inliner.toml");
        fs::write(&path, DEFAULT_CONFIG).unwrap();

        let config = load_config(&path).unwrap();
        let endpoints = config.endpoints.into_vec();

        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].variable_name.as_deref(), Some("TODO"));
        assert!(config.options.emit_declaration_file);
        assert!(api_inliner_core::resolve_endpoints(
            &endpoints,
            &config.options,
            api_inliner_core::BuildMode::Production
        )
        .is_ok());
    }

    #[test]
    fn refuses_to_overwrite_without_yes() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("inliner.toml");
        fs::write(&path, "keep").unwrap();

        assert!(!write_starter(&path, DEFAULT_CONFIG, false).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "keep");

        assert!(write_starter(&path, DEFAULT_CONFIG, true).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), DEFAULT_CONFIG);
    }
}
