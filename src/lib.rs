// src/lib.rs

//! Incremental, chunked on-disk cache for source-control revision logs.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod model;
pub mod source;

pub use cache::RevisionCache;
pub use config::CacheConfig;
pub use error::{CacheError, FetchError, SourceError};
pub use fetcher::{FetchOptions, FetchSummary, LogFetcher, StopReason};
pub use model::{
    CacheStats, ChangedPath, ChunkEntry, ChunkWrite, Manifest, Page, PathAction, Revision,
    RevisionRecord,
};
