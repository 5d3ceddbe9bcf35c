//! Preview a built site, including its JSON artifacts.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use axum::Router;
use tower_http::services::ServeDir;

/// Run the serve command.
pub async fn run(port: u16, dir: PathBuf) -> Result<()> {
    if !dir.is_dir() {
        anyhow::bail!(
            "Directory not found: {}. Run 'api-inliner build' first.",
            dir.display()
        );
    }

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    let url = format!("http://{}", addr);
    tracing::info!("Serving {} at {}", dir.display(), url);

    if let Err(e) = open::that(&url) {
        tracing::debug!("Could not open browser: {}", e);
    }

    axum::serve(listener, router(&dir)).await?;

    Ok(())
}

/// Static file router; directories resolve to their `index.html`.
fn router(dir: &Path) -> Router {
    Router::new().fallback_service(ServeDir::new(dir).append_index_html_on_directories(true))
}
