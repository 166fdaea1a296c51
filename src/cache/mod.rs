// src/cache/mod.rs

//! Chunked on-disk cache of revision logs.
//!
//! ```text
//! <cache-root>/svn/<sha1(repo url)>/
//!   manifest.json
//!   chunks/r<startRev>-r<endRev>.jsonl.gz
//! ```
//!
//! Chunks are immutable once written and the manifest is only ever replaced
//! wholesale, so readers may run alongside a writer. Only one writer per
//! repository is expected at a time; nothing here locks the manifest.

pub mod chunk_store;
pub mod manifest;
pub mod pager;

use crate::config::{normalize_repo_url, CacheConfig};
use crate::error::CacheError;
use crate::model::{CacheStats, ChunkEntry, ChunkWrite, Manifest, Page};
use chunk_store::ChunkStore;
use manifest::ManifestStore;
use std::fs;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct RevisionCache {
    config: CacheConfig,
    chunks: ChunkStore,
    manifests: ManifestStore,
}

impl RevisionCache {
    pub fn new(config: CacheConfig) -> Self {
        RevisionCache {
            chunks: ChunkStore::new(config.clone()),
            manifests: ManifestStore::new(config.clone()),
            config,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn get_meta(&self, repo_url: &str) -> Option<Manifest> {
        self.manifests.load(repo_url)
    }

    /// Never fails: a repository without a readable manifest reports
    /// `exists: false` and zero bytes.
    pub fn get_stats(&self, repo_url: &str) -> CacheStats {
        let Some(manifest) = self.manifests.load(repo_url) else {
            return CacheStats::default();
        };

        let manifest_bytes = fs::metadata(self.config.manifest_path(repo_url))
            .map(|meta| meta.len())
            .unwrap_or(0);

        CacheStats {
            exists: true,
            bytes: manifest_bytes + self.chunks.stored_bytes(repo_url),
            total_count: Some(manifest.total_count),
            newest_rev: manifest.newest_rev,
            oldest_rev: manifest.oldest_rev,
            chunks: Some(manifest.chunks.len()),
            updated_at: Some(manifest.updated_at),
        }
    }

    pub fn clear(&self, repo_url: &str) -> Result<(), CacheError> {
        self.manifests.clear(repo_url)
    }

    /// Persists one page as a chunk and records it in the manifest.
    ///
    /// Writing the same range twice is accepted and counted once, so a
    /// caller may retry after a partial failure. A range that only partly
    /// overlaps a cached chunk is rejected before anything is written.
    pub fn write_chunk(&self, repo_url: &str, chunk: &ChunkWrite) -> Result<Manifest, CacheError> {
        validate_chunk(chunk)?;

        let mut manifest = self
            .manifests
            .load(repo_url)
            .unwrap_or_else(|| Manifest::empty(&normalize_repo_url(repo_url)));
        if manifest.contains_range(chunk.start_rev, chunk.end_rev)? {
            debug!(start_rev = chunk.start_rev, end_rev = chunk.end_rev, "chunk already in manifest");
            return Ok(manifest);
        }

        let file = self.chunks.write(repo_url, chunk.start_rev, chunk.end_rev, &chunk.records)?;
        let entry = ChunkEntry {
            start_rev: chunk.start_rev,
            end_rev: chunk.end_rev,
            count: chunk.records.len(),
            file,
        };
        manifest.record_chunk(entry, chrono::Utc::now().timestamp_millis())?;
        self.manifests.save(repo_url, &manifest)?;
        info!(
            start_rev = chunk.start_rev,
            end_rev = chunk.end_rev,
            count = chunk.records.len(),
            total = manifest.total_count,
            "committed chunk"
        );

        Ok(manifest)
    }

    /// Returns an empty page when nothing is cached; a chunk that fails to
    /// decode surfaces as `CorruptChunk` and stays listed.
    pub fn read_page(&self, repo_url: &str, page: usize, per_page: usize) -> Result<Page, CacheError> {
        match self.manifests.load(repo_url) {
            Some(manifest) if !manifest.chunks.is_empty() => {
                pager::read_page(&self.chunks, repo_url, &manifest, page, per_page)
            }
            _ => Ok(Page::default()),
        }
    }
}

fn validate_chunk(chunk: &ChunkWrite) -> Result<(), CacheError> {
    if chunk.start_rev < chunk.end_rev {
        return Err(CacheError::InvalidChunk {
            reason: format!("start r{} is older than end r{}", chunk.start_rev, chunk.end_rev),
        });
    }
    if let Some(stray) = chunk
        .records
        .iter()
        .find(|r| r.revision > chunk.start_rev || r.revision < chunk.end_rev)
    {
        return Err(CacheError::InvalidChunk {
            reason: format!(
                "r{} lies outside r{}-r{}",
                stray.revision, chunk.start_rev, chunk.end_rev
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Revision, RevisionRecord};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const REPO: &str = "https://svn.example.org/repo";

    fn record(revision: Revision) -> RevisionRecord {
        RevisionRecord {
            revision,
            author: "bob".to_string(),
            date: None,
            message: format!("r{revision}"),
            paths: Vec::new(),
        }
    }

    fn chunk(start: Revision, end: Revision) -> ChunkWrite {
        ChunkWrite { start_rev: start, end_rev: end, records: (end..=start).rev().map(record).collect() }
    }

    fn revisions(page: &Page) -> Vec<Revision> {
        page.items.iter().map(|r| r.revision).collect()
    }

    #[test]
    fn duplicate_write_counts_once() {
        let tmp = TempDir::new().unwrap();
        let cache = RevisionCache::new(CacheConfig::new(tmp.path()));

        cache.write_chunk(REPO, &chunk(10, 6)).unwrap();
        let manifest = cache.write_chunk(REPO, &chunk(10, 6)).unwrap();

        assert_eq!(manifest.total_count, 5);
        assert_eq!(manifest.chunks.len(), 1);
        let files = fs::read_dir(cache.config().chunks_dir(REPO)).unwrap().count();
        assert_eq!(files, 1);
    }

    #[test]
    fn pages_span_chunks_in_order() {
        let tmp = TempDir::new().unwrap();
        let cache = RevisionCache::new(CacheConfig::new(tmp.path()));
        cache.write_chunk(REPO, &chunk(100, 91)).unwrap();
        cache.write_chunk(REPO, &chunk(90, 81)).unwrap();

        let first = cache.read_page(REPO, 1, 15).unwrap();
        assert_eq!(first.total_count, 20);
        assert_eq!(revisions(&first), (86..=100).rev().collect::<Vec<_>>());

        let second = cache.read_page(REPO, 2, 15).unwrap();
        assert_eq!(revisions(&second), vec![85, 84, 83, 82, 81]);

        assert!(cache.read_page(REPO, 3, 15).unwrap().items.is_empty());
    }

    #[test]
    fn manifest_stays_sorted_with_true_watermarks() {
        let tmp = TempDir::new().unwrap();
        let cache = RevisionCache::new(CacheConfig::new(tmp.path()));
        for (start, end) in [(40, 31), (100, 91), (60, 55), (20, 20), (80, 71)] {
            cache.write_chunk(REPO, &chunk(start, end)).unwrap();
        }

        let manifest = cache.get_meta(REPO).unwrap();
        let starts: Vec<_> = manifest.chunks.iter().map(|c| c.start_rev).collect();
        assert!(starts.windows(2).all(|w| w[0] > w[1]));
        assert_eq!(manifest.newest_rev, manifest.chunks.iter().map(|c| c.start_rev).max());
        assert_eq!(manifest.oldest_rev, manifest.chunks.iter().map(|c| c.end_rev).min());
        assert_eq!(manifest.total_count, 10 + 10 + 6 + 1 + 10);
    }

    #[test]
    fn overlapping_write_is_rejected_and_leaves_no_file() {
        let tmp = TempDir::new().unwrap();
        let cache = RevisionCache::new(CacheConfig::new(tmp.path()));
        cache.write_chunk(REPO, &chunk(10, 9)).unwrap();

        let err = cache.write_chunk(REPO, &chunk(10, 8)).unwrap_err();
        assert!(matches!(err, CacheError::InvalidChunk { .. }));
        assert!(!cache.config().chunks_dir(REPO).join("r10-r8.jsonl.gz").exists());

        let manifest = cache.get_meta(REPO).unwrap();
        let starts: Vec<_> = manifest.chunks.iter().map(|c| c.start_rev).collect();
        assert_eq!(starts, vec![10]);
        assert_eq!(manifest.total_count, 2);
        assert_eq!(revisions(&cache.read_page(REPO, 1, 10).unwrap()), vec![10, 9]);
    }

    #[test]
    fn empty_cache_reads_do_not_fail() {
        let tmp = TempDir::new().unwrap();
        let cache = RevisionCache::new(CacheConfig::new(tmp.path()));

        assert!(cache.get_meta(REPO).is_none());
        assert_eq!(cache.read_page(REPO, 1, 50).unwrap(), Page::default());
        let stats = cache.get_stats(REPO);
        assert!(!stats.exists);
        assert_eq!(stats.bytes, 0);
        assert_eq!(serde_json::to_value(&stats).unwrap(), serde_json::json!({ "exists": false, "bytes": 0 }));
    }

    #[test]
    fn clear_forgets_the_repository() {
        let tmp = TempDir::new().unwrap();
        let cache = RevisionCache::new(CacheConfig::new(tmp.path()));
        cache.write_chunk(REPO, &chunk(5, 1)).unwrap();
        assert!(cache.get_stats(REPO).exists);

        cache.clear(REPO).unwrap();
        assert!(cache.get_meta(REPO).is_none());
        assert!(!cache.get_stats(REPO).exists);
    }

    #[test]
    fn stats_report_disk_usage() {
        let tmp = TempDir::new().unwrap();
        let cache = RevisionCache::new(CacheConfig::new(tmp.path()));
        cache.write_chunk(REPO, &chunk(5, 1)).unwrap();

        let stats = cache.get_stats(REPO);
        assert!(stats.bytes > 0);
        assert_eq!(stats.total_count, Some(5));
        assert_eq!(stats.newest_rev, Some(5));
        assert_eq!(stats.oldest_rev, Some(1));
        assert_eq!(stats.chunks, Some(1));
    }

    #[test]
    fn invalid_ranges_are_rejected_before_disk() {
        let tmp = TempDir::new().unwrap();
        let cache = RevisionCache::new(CacheConfig::new(tmp.path()));

        let backwards = ChunkWrite { start_rev: 1, end_rev: 5, records: Vec::new() };
        assert!(matches!(cache.write_chunk(REPO, &backwards), Err(CacheError::InvalidChunk { .. })));

        let stray = ChunkWrite { start_rev: 5, end_rev: 4, records: vec![record(9)] };
        assert!(matches!(cache.write_chunk(REPO, &stray), Err(CacheError::InvalidChunk { .. })));

        assert!(!cache.config().repo_dir(REPO).exists());
    }

    #[test]
    fn corrupt_chunk_surfaces_and_stays_listed() {
        let tmp = TempDir::new().unwrap();
        let cache = RevisionCache::new(CacheConfig::new(tmp.path()));
        cache.write_chunk(REPO, &chunk(5, 1)).unwrap();
        fs::write(cache.config().chunks_dir(REPO).join("r5-r1.jsonl.gz"), b"garbage").unwrap();

        assert!(matches!(cache.read_page(REPO, 1, 10), Err(CacheError::CorruptChunk { .. })));
        assert_eq!(cache.get_meta(REPO).unwrap().chunks.len(), 1);
    }

    #[test]
    fn trailing_slash_hits_the_same_cache() {
        let tmp = TempDir::new().unwrap();
        let cache = RevisionCache::new(CacheConfig::new(tmp.path()));
        cache.write_chunk(&format!("{REPO}/"), &chunk(3, 1)).unwrap();

        let manifest = cache.get_meta(REPO).unwrap();
        assert_eq!(manifest.repo_url, format!("{REPO}/"));
        assert_eq!(cache.get_meta("HTTPS://SVN.EXAMPLE.ORG:443/repo").unwrap().total_count, 3);
        assert_eq!(manifest.total_count, 3);
    }
}
