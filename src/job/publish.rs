// Display URLs for source and output artifacts

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use tempfile::TempDir;
use uuid::Uuid;

use super::types::DisplayUrl;

/// Turns byte buffers into revocable locators the user can open.
pub trait ArtifactPublisher: Send {
    fn publish(&mut self, name: &str, mime: &str, bytes: &[u8]) -> Result<DisplayUrl>;

    /// Release a locator. Unknown locators are ignored.
    fn revoke(&mut self, url: &DisplayUrl);
}

#[derive(Debug, Clone)]
struct BlobEntry {
    name: String,
    mime: String,
    len: usize,
}

/// In-memory `blob:` registry. Clones share state, so a handle kept by the
/// caller can observe what the controller has published.
#[derive(Debug, Clone, Default)]
pub struct BlobRegistry {
    live: Arc<Mutex<HashMap<DisplayUrl, BlobEntry>>>,
}

impl BlobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_count(&self) -> usize {
        self.live.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_live(&self, url: &DisplayUrl) -> bool {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(url)
    }

    /// `(name, mime, len)` of a live entry.
    pub fn describe(&self, url: &DisplayUrl) -> Option<(String, String, usize)> {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(url)
            .map(|e| (e.name.clone(), e.mime.clone(), e.len))
    }
}

impl ArtifactPublisher for BlobRegistry {
    fn publish(&mut self, name: &str, mime: &str, bytes: &[u8]) -> Result<DisplayUrl> {
        let url = DisplayUrl(format!("blob:lightmode/{}", Uuid::new_v4()));
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                url.clone(),
                BlobEntry {
                    name: name.to_string(),
                    mime: mime.to_string(),
                    len: bytes.len(),
                },
            );
        Ok(url)
    }

    fn revoke(&mut self, url: &DisplayUrl) {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(url);
    }
}

/// Materializes artifacts as files in a private temporary directory so an
/// external player can open them. Revoking deletes the file.
pub struct TempDirPublisher {
    dir: TempDir,
    files: HashMap<DisplayUrl, PathBuf>,
}

impl TempDirPublisher {
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("lightmode-")
            .tempdir()
            .context("Failed to create artifact directory")?;
        Ok(Self {
            dir,
            files: HashMap::new(),
        })
    }

    pub fn live_count(&self) -> usize {
        self.files.len()
    }
}

impl ArtifactPublisher for TempDirPublisher {
    fn publish(&mut self, name: &str, _mime: &str, bytes: &[u8]) -> Result<DisplayUrl> {
        let file_name = std::path::Path::new(name)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "artifact".to_string());
        // Unique subdirectory keeps the original file name intact
        let sub = self.dir.path().join(Uuid::new_v4().simple().to_string());
        fs::create_dir_all(&sub)
            .with_context(|| format!("Failed to create {}", sub.display()))?;
        let path = sub.join(file_name);
        fs::write(&path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;

        let url = DisplayUrl(format!("file://{}", path.display()));
        self.files.insert(url.clone(), path);
        Ok(url)
    }

    fn revoke(&mut self, url: &DisplayUrl) {
        if let Some(path) = self.files.remove(url) {
            if let Some(parent) = path.parent() {
                if let Err(e) = fs::remove_dir_all(parent) {
                    tracing::warn!(path = %path.display(), error = %e, "failed to remove artifact");
                }
            }
        }
    }
}
