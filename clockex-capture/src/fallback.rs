use std::io;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::filename::{FILENAME_MAX, sanitize};

/// Local directory that receives a session's payload when its upload fails,
/// so a failed upload never loses data.
#[derive(Debug, Clone)]
pub struct LocalFallback {
    dir: PathBuf,
}

impl LocalFallback {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn target(&self, filename: &str) -> PathBuf {
        self.dir.join(sanitize(filename, FILENAME_MAX))
    }

    pub async fn save_json(&self, filename: &str, payload: &Value) -> io::Result<PathBuf> {
        let bytes = serde_json::to_vec_pretty(payload).map_err(io::Error::other)?;
        self.save_bytes(filename, &bytes).await
    }

    pub async fn save_bytes(&self, filename: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.target(filename);
        tokio::fs::write(&path, bytes).await?;
        tracing::info!(path = %path.display(), bytes = bytes.len(), "saved fallback copy");
        Ok(path)
    }
}
