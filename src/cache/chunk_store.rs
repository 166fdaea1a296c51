// src/cache/chunk_store.rs

use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::model::{Revision, RevisionRecord};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use tempfile::NamedTempFile;
use tracing::debug;

/// Immutable gzip'd JSONL files, one per fetched page.
#[derive(Debug, Clone)]
pub struct ChunkStore {
    config: CacheConfig,
}

pub fn chunk_file_name(start_rev: Revision, end_rev: Revision) -> String {
    format!("r{start_rev}-r{end_rev}.jsonl.gz")
}

impl ChunkStore {
    pub fn new(config: CacheConfig) -> Self {
        ChunkStore { config }
    }

    /// Persists `records` under a name derived from the range and returns
    /// that name. An existing file with the same name is left untouched.
    pub fn write(
        &self,
        repo_url: &str,
        start_rev: Revision,
        end_rev: Revision,
        records: &[RevisionRecord],
    ) -> Result<String, CacheError> {
        let dir = self.config.chunks_dir(repo_url);
        fs::create_dir_all(&dir).map_err(|e| CacheError::io(&dir, e))?;

        let file = chunk_file_name(start_rev, end_rev);
        let path = dir.join(&file);
        if path.exists() {
            debug!(%file, "chunk already on disk, skipping write");
            return Ok(file);
        }

        let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| CacheError::io(&dir, e))?;
        {
            let mut encoder = GzEncoder::new(BufWriter::new(tmp.as_file_mut()), Compression::new(6));
            for record in records {
                serde_json::to_writer(&mut encoder, record)?;
                encoder.write_all(b"\n").map_err(|e| CacheError::io(&path, e))?;
            }
            let mut inner = encoder.finish().map_err(|e| CacheError::io(&path, e))?;
            inner.flush().map_err(|e| CacheError::io(&path, e))?;
        }
        tmp.persist(&path).map_err(|e| CacheError::io(&path, e.error))?;

        debug!(%file, count = records.len(), "wrote chunk");
        Ok(file)
    }

    /// Decompresses and parses one chunk. Any failure, including a missing
    /// file, is reported as `CorruptChunk`.
    pub fn read(&self, repo_url: &str, file: &str) -> Result<Vec<RevisionRecord>, CacheError> {
        let corrupt = |reason: String| CacheError::CorruptChunk { file: file.to_string(), reason };

        let path = self.config.chunks_dir(repo_url).join(file);
        let handle = File::open(&path).map_err(|e| corrupt(e.to_string()))?;
        let reader = BufReader::new(GzDecoder::new(handle));

        let mut records = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| corrupt(format!("decompression failed: {e}")))?;
            if line.trim().is_empty() {
                continue;
            }
            let record = serde_json::from_str(&line).map_err(|e| corrupt(format!("line {}: {e}", idx + 1)))?;
            records.push(record);
        }
        Ok(records)
    }

    /// Total size of the files in the chunks directory. Unreadable entries
    /// count as zero.
    pub fn stored_bytes(&self, repo_url: &str) -> u64 {
        let Ok(entries) = fs::read_dir(self.config.chunks_dir(repo_url)) else {
            return 0;
        };
        entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.metadata().ok())
            .filter(|meta| meta.is_file())
            .map(|meta| meta.len())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn record(revision: Revision) -> RevisionRecord {
        RevisionRecord {
            revision,
            author: "alice".to_string(),
            date: Some("2024-01-01T00:00:00.000000Z".to_string()),
            message: format!("commit {revision}"),
            paths: Vec::new(),
        }
    }

    #[test]
    fn writes_and_reads_back_in_order() {
        let tmp = TempDir::new().unwrap();
        let store = ChunkStore::new(CacheConfig::new(tmp.path()));
        let records = vec![record(12), record(11), record(10)];

        let file = store.write("repo", 12, 10, &records).unwrap();
        assert_eq!(file, "r12-r10.jsonl.gz");
        assert_eq!(store.read("repo", &file).unwrap(), records);
    }

    #[test]
    fn existing_file_is_not_rewritten() {
        let tmp = TempDir::new().unwrap();
        let store = ChunkStore::new(CacheConfig::new(tmp.path()));

        store.write("repo", 2, 1, &[record(2), record(1)]).unwrap();
        store.write("repo", 2, 1, &[record(2)]).unwrap();

        assert_eq!(store.read("repo", "r2-r1.jsonl.gz").unwrap().len(), 2);
        let files = fs::read_dir(CacheConfig::new(tmp.path()).chunks_dir("repo")).unwrap().count();
        assert_eq!(files, 1);
    }

    #[test]
    fn garbage_is_reported_as_corrupt() {
        let tmp = TempDir::new().unwrap();
        let config = CacheConfig::new(tmp.path());
        let store = ChunkStore::new(config.clone());
        fs::create_dir_all(config.chunks_dir("repo")).unwrap();
        fs::write(config.chunks_dir("repo").join("r5-r1.jsonl.gz"), b"definitely not gzip").unwrap();

        let err = store.read("repo", "r5-r1.jsonl.gz").unwrap_err();
        assert!(matches!(err, CacheError::CorruptChunk { ref file, .. } if file == "r5-r1.jsonl.gz"));
    }

    #[test]
    fn missing_file_is_reported_as_corrupt() {
        let tmp = TempDir::new().unwrap();
        let store = ChunkStore::new(CacheConfig::new(tmp.path()));
        assert!(matches!(store.read("repo", "r9-r9.jsonl.gz"), Err(CacheError::CorruptChunk { .. })));
    }

    #[test]
    fn stored_bytes_sums_chunk_files() {
        let tmp = TempDir::new().unwrap();
        let config = CacheConfig::new(tmp.path());
        let store = ChunkStore::new(config.clone());
        assert_eq!(store.stored_bytes("repo"), 0);

        store.write("repo", 3, 3, &[record(3)]).unwrap();
        store.write("repo", 2, 2, &[record(2)]).unwrap();
        let expected: u64 = ["r3-r3.jsonl.gz", "r2-r2.jsonl.gz"]
            .iter()
            .map(|f| fs::metadata(config.chunks_dir("repo").join(f)).unwrap().len())
            .sum();
        assert_eq!(store.stored_bytes("repo"), expected);
    }
}
