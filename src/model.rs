// src/model.rs

use crate::error::CacheError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Monotonically increasing identifier of one committed change
pub type Revision = u64;

/// What happened to a path in a revision
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathAction {
    Added,
    Modified,
    Deleted,
    Replaced,
    /// Any tag we don't recognise, kept verbatim
    Other(String),
}

impl PathAction {
    /// Accepts both the single-letter `svn log` tags and the WebDAV
    /// element names (`added`, `modified`, ...).
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "A" | "added" => PathAction::Added,
            "M" | "modified" => PathAction::Modified,
            "D" | "deleted" => PathAction::Deleted,
            "R" | "replaced" => PathAction::Replaced,
            other => PathAction::Other(other.to_string()),
        }
    }

    pub fn as_tag(&self) -> &str {
        match self {
            PathAction::Added => "A",
            PathAction::Modified => "M",
            PathAction::Deleted => "D",
            PathAction::Replaced => "R",
            PathAction::Other(tag) => tag,
        }
    }
}

impl fmt::Display for PathAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

impl Serialize for PathAction {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_tag())
    }
}

impl<'de> Deserialize<'de> for PathAction {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(PathAction::from_tag(&tag))
    }
}

/// A single path touched by a revision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangedPath {
    pub action: PathAction,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copy_from_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copy_from_rev: Option<Revision>,
}

/// One commit as fetched from the log source. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionRecord {
    pub revision: Revision,
    #[serde(default = "unknown_author")]
    pub author: String,
    /// ISO 8601 timestamp, when the source provides one
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub paths: Vec<ChangedPath>,
}

fn unknown_author() -> String {
    "Unknown".to_string()
}

/// One fetched page handed to the cache writer, newest record first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkWrite {
    pub start_rev: Revision,
    pub end_rev: Revision,
    pub records: Vec<RevisionRecord>,
}

impl ChunkWrite {
    /// Builds a chunk whose range is taken from the first and last record.
    /// Returns `None` for an empty page.
    pub fn from_records(records: Vec<RevisionRecord>) -> Option<Self> {
        let start_rev = records.first()?.revision;
        let end_rev = records.last()?.revision;
        Some(ChunkWrite { start_rev, end_rev, records })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkEntry {
    pub start_rev: Revision,
    pub end_rev: Revision,
    pub count: usize,
    pub file: String,
}

/// Per-repository index of cached chunks.
///
/// `chunks` is kept sorted by `start_rev`, newest first, and the summary
/// fields always agree with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub repo_url: String,
    pub total_count: usize,
    pub newest_rev: Option<Revision>,
    pub oldest_rev: Option<Revision>,
    pub chunks: Vec<ChunkEntry>,
    /// Epoch milliseconds of the last change
    #[serde(default)]
    pub updated_at: i64,
}

impl Manifest {
    pub fn empty(repo_url: &str) -> Self {
        Manifest {
            repo_url: repo_url.to_string(),
            total_count: 0,
            newest_rev: None,
            oldest_rev: None,
            chunks: Vec::new(),
            updated_at: 0,
        }
    }

    /// Checks `[end_rev, start_rev]` against the listed chunks. `Ok(true)`
    /// means exactly this range is already cached; a partial overlap is an
    /// `InvalidChunk` error.
    pub fn contains_range(
        &self,
        start_rev: Revision,
        end_rev: Revision,
    ) -> Result<bool, CacheError> {
        let overlapping = |c: &&ChunkEntry| c.end_rev <= start_rev && end_rev <= c.start_rev;
        let Some(hit) = self.chunks.iter().find(overlapping) else {
            return Ok(false);
        };
        if hit.start_rev == start_rev && hit.end_rev == end_rev {
            return Ok(true);
        }
        Err(CacheError::InvalidChunk {
            reason: format!(
                "r{start_rev}-r{end_rev} overlaps cached r{}-r{}",
                hit.start_rev, hit.end_rev
            ),
        })
    }

    /// Adds `entry` unless a chunk with the same range is already listed.
    /// Returns `true` when the manifest changed and needs saving.
    pub fn record_chunk(&mut self, entry: ChunkEntry, now_ms: i64) -> Result<bool, CacheError> {
        if self.contains_range(entry.start_rev, entry.end_rev)? {
            return Ok(false);
        }

        self.total_count += entry.count;
        self.newest_rev = Some(self.newest_rev.map_or(entry.start_rev, |r| r.max(entry.start_rev)));
        self.oldest_rev = Some(self.oldest_rev.map_or(entry.end_rev, |r| r.min(entry.end_rev)));
        self.chunks.push(entry);
        self.chunks.sort_by(|a, b| b.start_rev.cmp(&a.start_rev));
        self.updated_at = now_ms;
        Ok(true)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub total_count: usize,
    pub items: Vec<RevisionRecord>,
}

/// On-disk footprint and summary of one repository's cache
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub exists: bool,
    pub bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub newest_rev: Option<Revision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oldest_rev: Option<Revision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunks: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}
