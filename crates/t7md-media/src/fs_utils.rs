//! Filesystem helpers for run artifacts.

use std::path::Path;
use tokio::fs;

use crate::error::{MediaError, MediaResult};

/// Create `dir` and its parents, reporting failures as output setup errors.
pub async fn ensure_dir(dir: impl AsRef<Path>) -> MediaResult<()> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)
        .await
        .map_err(|e| MediaError::output_setup(dir, e.to_string()))
}

/// Write `bytes` to `path` through a sibling temp file and a rename, so
/// readers never observe a half-written file.
pub async fn write_atomic(path: impl AsRef<Path>, bytes: &[u8]) -> MediaResult<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = std::path::PathBuf::from(tmp);

    fs::write(&tmp, bytes).await?;
    if let Err(e) = fs::rename(&tmp, path).await {
        // Clean up temp file on failure
        let _ = fs::remove_file(&tmp).await;
        tracing::error!(
            "Failed to move {} into place at {}: {}",
            tmp.display(),
            path.display(),
            e
        );
        return Err(MediaError::from(e));
    }

    tracing::debug!(path = %path.display(), bytes = bytes.len(), "Wrote file");
    Ok(())
}
