// src/cache/manifest.rs

use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::model::Manifest;
use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use tempfile::NamedTempFile;
use tracing::{info, warn};

/// Reads and atomically replaces `manifest.json` for a repository.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    config: CacheConfig,
}

impl ManifestStore {
    pub fn new(config: CacheConfig) -> Self {
        ManifestStore { config }
    }

    /// `Ok(None)` when no manifest exists; `ManifestUnreadable` when one
    /// exists but doesn't parse.
    pub fn try_load(&self, repo_url: &str) -> Result<Option<Manifest>, CacheError> {
        let path = self.config.manifest_path(repo_url);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::io(path, e)),
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| CacheError::ManifestUnreadable { path, reason: e.to_string() })
    }

    /// Like `try_load`, but any failure means "no cache yet".
    pub fn load(&self, repo_url: &str) -> Option<Manifest> {
        match self.try_load(repo_url) {
            Ok(manifest) => manifest,
            Err(err) => {
                warn!(%err, "ignoring repository cache manifest");
                None
            }
        }
    }

    /// Writes to a temp file in the same directory, then renames it over
    /// the manifest. The temp file is removed if anything fails first.
    pub fn save(&self, repo_url: &str, manifest: &Manifest) -> Result<(), CacheError> {
        let dir = self.config.repo_dir(repo_url);
        fs::create_dir_all(&dir).map_err(|e| CacheError::io(&dir, e))?;
        let path = self.config.manifest_path(repo_url);

        let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| CacheError::io(&dir, e))?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, manifest)?;
            writer.flush().map_err(|e| CacheError::io(&path, e))?;
        }
        tmp.persist(&path).map_err(|e| CacheError::io(&path, e.error))?;
        Ok(())
    }

    /// Drops the manifest and every chunk of the repository.
    pub fn clear(&self, repo_url: &str) -> Result<(), CacheError> {
        let dir = self.config.repo_dir(repo_url);
        match fs::remove_dir_all(&dir) {
            Ok(()) => {
                info!(dir = %dir.display(), "cleared repository cache");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::io(dir, e)),
        }
    }
}
