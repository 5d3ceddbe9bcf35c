//! Type declaration output for inlined globals.

use std::path::Path;

use crate::artifacts::{write_atomic, WriteError};
use crate::resolver::ResolvedEndpoint;

const HEADER: &str = "// Generated by api-inliner. Do not edit.\n";

/// Render the declaration file for all inlined endpoints, in order.
///
/// The output is a module augmentation that adds one property per inlined
/// endpoint to the global `Window` interface.
pub fn render_declarations<'a, I>(endpoints: I, default_type: &str) -> String
where
    I: IntoIterator<Item = &'a ResolvedEndpoint>,
{
    let mut out = String::from(HEADER);
    out.push_str("export {};\n\ndeclare global {\n  interface Window {\n");

    for endpoint in endpoints {
        let Some(name) = endpoint.inline_name() else {
            continue;
        };
        let ty = endpoint
            .type_reference
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(default_type);
        out.push_str(&format!("    {}: {};\n", name, ty));
    }

    out.push_str("  }\n}\n");
    out
}

/// Render and write the declaration file, replacing any existing one.
pub async fn emit_declarations(
    path: &Path,
    endpoints: &[ResolvedEndpoint],
    default_type: &str,
) -> Result<(), WriteError> {
    let contents = render_declarations(endpoints, default_type);
    write_atomic(path, contents.as_bytes()).await?;
    tracing::info!("Wrote declarations to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BuildMode, EndpointConfig, GlobalOptions};
    use crate::resolver::resolve_endpoints;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::tempdir;

    fn endpoints() -> Vec<ResolvedEndpoint> {
        let configs = vec![
            EndpointConfig::new("https://x/posts", json!([]))
                .variable_name("POSTS")
                .type_reference("Post[]"),
            EndpointConfig::new("https://x/hidden", json!({})).inline_as_variable(false),
            EndpointConfig::new("https://x/user", json!({})),
        ];
        resolve_endpoints(&configs, &GlobalOptions::default(), BuildMode::Production).unwrap()
    }

    #[test]
    fn declares_one_property_per_inlined_endpoint() {
        let rendered = render_declarations(&endpoints(), "unknown");

        assert_eq!(
            rendered,
            "// Generated by api-inliner. Do not edit.\n\
             export {};\n\
             \n\
             declare global {\n  \
               interface Window {\n    \
                 POSTS: Post[];\n    \
                 API_DATA_2: unknown;\n  \
               }\n\
             }\n"
        );
    }

    #[test]
    fn empty_when_nothing_is_inlined() {
        let rendered = render_declarations(&Vec::<ResolvedEndpoint>::new(), "any");
        assert!(rendered.contains("interface Window {\n  }"));
    }

    #[tokio::test]
    async fn emission_is_idempotent() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("types/api-inliner.d.ts");
        let endpoints = endpoints();

        emit_declarations(&path, &endpoints, "any").await.unwrap();
        let first = std::fs::read(&path).unwrap();
        emit_declarations(&path, &endpoints, "any").await.unwrap();
        let second = std::fs::read(&path).unwrap();

        assert_eq!(first, second);
    }
}
