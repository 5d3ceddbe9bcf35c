//! JSON artifact output.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tokio::fs;

use crate::fallback::FinalData;
use crate::resolver::ResolvedEndpoint;

/// Errors writing artifacts or declaration files.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("Failed to serialize data for {path}: {message}")]
    Serialize { path: PathBuf, message: String },

    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Write the endpoint's data under `root` if file output is enabled.
///
/// Returns the written path, or `None` when the endpoint has no artifact.
pub async fn write_artifact(
    root: &Path,
    endpoint: &ResolvedEndpoint,
    data: &FinalData,
) -> Result<Option<PathBuf>, WriteError> {
    let Some(relative) = endpoint.output_file.as_ref().filter(|_| endpoint.save_as_file) else {
        return Ok(None);
    };

    let path = root.join(relative);
    let json = serde_json::to_vec(&data.data).map_err(|e| WriteError::Serialize {
        path: path.clone(),
        message: e.to_string(),
    })?;

    write_atomic(&path, &json).await?;
    tracing::debug!("Wrote {}", path.display());

    Ok(Some(path))
}

/// Write through a sibling temporary file so readers never see partial output.
pub(crate) async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), WriteError> {
    let io = |source| WriteError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.map_err(io)?;
    }

    let staging = staging_path(path);
    fs::write(&staging, contents).await.map_err(io)?;

    if let Err(e) = fs::rename(&staging, path).await {
        let _ = fs::remove_file(&staging).await;
        return Err(io(e));
    }

    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name: OsString = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
