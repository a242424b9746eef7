//! Memo of images already uploaded to the sink, so repeated runs reuse media.
//!
//! Entries are keyed by the full image URL. Two feeds can serve different
//! images under the same file name, so the file name alone is not a safe key.
//!
//! Media ids only mean something to the sink that issued them, so the file
//! records a scope (the sink's identity) and entries written under another
//! scope are ignored on load.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::contract::MediaId;
use crate::error::CacheError;

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    #[serde(default)]
    scope: String,
    #[serde(default)]
    media: BTreeMap<String, MediaId>,
}

#[derive(Debug, Default)]
pub struct DownloadCache {
    path: Option<PathBuf>,
    scope: String,
    entries: BTreeMap<String, MediaId>,
}

impl DownloadCache {
    /// A cache that lives only as long as the run.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Loads the cache file at `path` for the sink identified by `scope`.
    ///
    /// A missing file is an empty cache. A file written for another scope is
    /// treated as empty and is overwritten on the next record.
    pub fn load(path: impl AsRef<Path>, scope: &str) -> Result<Self, CacheError> {
        let path = path.as_ref().to_path_buf();
        let file: CacheFile = match fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => CacheFile::default(),
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No download cache yet");
                CacheFile::default()
            }
            Err(e) => return Err(e.into()),
        };
        let entries = if file.scope == scope || file.media.is_empty() {
            file.media
        } else {
            warn!(
                path = %path.display(),
                cached_scope = %file.scope,
                scope,
                ignored = file.media.len(),
                "Download cache belongs to another sink, ignoring its entries"
            );
            BTreeMap::new()
        };
        info!(path = %path.display(), scope, entries = entries.len(), "Loaded download cache");
        Ok(Self {
            path: Some(path),
            scope: scope.to_string(),
            entries,
        })
    }

    /// Identity of the sink the cached media ids belong to.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn get(&self, image_url: &str) -> Option<MediaId> {
        self.entries.get(image_url).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Upserts `image_url -> media_id` and rewrites the file, if there is one.
    pub fn record(&mut self, image_url: &str, media_id: MediaId) -> Result<(), CacheError> {
        self.entries.insert(image_url.to_string(), media_id);
        self.save()
    }

    /// Like [`record`](Self::record), but a failed write is only logged.
    pub fn record_or_warn(&mut self, image_url: &str, media_id: MediaId) {
        if let Err(e) = self.record(image_url, media_id) {
            warn!(image_url, error = %e, "Could not persist download cache");
        }
    }

    fn save(&self) -> Result<(), CacheError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = CacheFile {
            scope: self.scope.clone(),
            media: self.entries.clone(),
        };
        fs::write(path, serde_json::to_string_pretty(&file)?)?;
        Ok(())
    }
}
