// src/config.rs

use sha1::{Digest, Sha1};
use std::path::{Path, PathBuf};
use url::Url;

/// Environment variable that overrides the default cache location
pub const CACHE_DIR_ENV: &str = "REVLOG_CACHE_DIR";

pub const DEFAULT_PAGE_SIZE: usize = 2000;
pub const MAX_PAGE_SIZE: usize = 5000;
pub const DEFAULT_PER_PAGE: usize = 50;
pub const MAX_PER_PAGE: usize = 500;

/// Where the cache lives. Passed explicitly to every store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub root: PathBuf,
}

impl CacheConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        CacheConfig { root: root.into() }
    }

    /// Explicit override first, then `REVLOG_CACHE_DIR`, then the platform
    /// cache directory.
    pub fn resolve(explicit: Option<PathBuf>) -> Self {
        if let Some(root) = explicit {
            return CacheConfig::new(root);
        }
        if let Some(root) = std::env::var_os(CACHE_DIR_ENV).filter(|v| !v.is_empty()) {
            return CacheConfig::new(root);
        }
        let base = dirs::cache_dir().unwrap_or_else(std::env::temp_dir);
        CacheConfig::new(base.join("revlog-cache"))
    }

    /// `<root>/svn/<sha1(normalized url)>`
    pub fn repo_dir(&self, repo_url: &str) -> PathBuf {
        self.root.join("svn").join(repo_key(repo_url))
    }

    pub fn manifest_path(&self, repo_url: &str) -> PathBuf {
        self.repo_dir(repo_url).join("manifest.json")
    }

    pub fn chunks_dir(&self, repo_url: &str) -> PathBuf {
        self.repo_dir(repo_url).join("chunks")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Canonical spelling of a repository URL, which is what the cache is keyed
/// on: lowercase scheme and host, no default http/https port, credentials,
/// query or fragment dropped, and a single trailing `/`. Anything that does
/// not parse as an absolute URL (a `/svn/...` proxy path, say) only gets the
/// trailing slash.
pub fn normalize_repo_url(url: &str) -> String {
    let raw = url.trim();
    if raw.is_empty() {
        return String::new();
    }
    let parsed = match Url::parse(raw) {
        Ok(parsed) if !parsed.cannot_be_a_base() => parsed,
        _ => return with_trailing_slash(raw),
    };

    // the url crate already omits 80/443 for http/https
    let host = parsed.host_str().unwrap_or_default().to_ascii_lowercase();
    let port = parsed.port().map(|p| format!(":{p}")).unwrap_or_default();
    format!("{}://{host}{port}{}", parsed.scheme(), with_trailing_slash(parsed.path()))
}

fn with_trailing_slash(path: &str) -> String {
    format!("{}/", path.trim_end_matches('/'))
}

pub fn repo_key(url: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(normalize_repo_url(url).as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn clamp_page_size(requested: Option<usize>) -> usize {
    requested.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
}
