// src/fetcher.rs

//! Walks a revision log backwards from HEAD in bounded pages and commits
//! every page to the cache before asking for the next one, so an aborted run
//! still leaves a usable partial cache.

use crate::cache::RevisionCache;
use crate::config::{clamp_page_size, DEFAULT_PAGE_SIZE};
use crate::error::FetchError;
use crate::model::{ChunkWrite, Revision, RevisionRecord};
use crate::source::{Cursor, HeadRevision, RevisionSource};
use indicatif::ProgressBar;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Cap on the number of new records; `None` or `Some(0)` fetches all.
    pub limit: Option<usize>,
    /// Records requested per page, clamped to `[1, 5000]`.
    pub page_size: usize,
    /// Overrides the cached `newest_rev` as the point to stop at.
    pub stop_at: Option<Revision>,
    /// Checked between pages.
    pub cancel: Option<Arc<AtomicBool>>,
    pub progress: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        FetchOptions {
            limit: None,
            page_size: DEFAULT_PAGE_SIZE,
            stop_at: None,
            cancel: None,
            progress: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The requested number of records was committed
    LimitReached,
    /// Reached revisions the cache already holds
    Watermark,
    /// The source has nothing older
    Exhausted,
    /// A page contained only revisions already seen in this run
    NoNewRecords,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchSummary {
    pub total: usize,
    pub pages: usize,
    pub chunks: usize,
    pub head: Option<Revision>,
    pub stop_at: Option<Revision>,
    pub reason: StopReason,
}

type PageObserver<'a> = Box<dyn FnMut(&[RevisionRecord]) + 'a>;

pub struct LogFetcher<'a> {
    cache: &'a RevisionCache,
    repo_url: String,
    options: FetchOptions,
    on_page: Option<PageObserver<'a>>,
}

impl<'a> LogFetcher<'a> {
    pub fn new(cache: &'a RevisionCache, repo_url: impl Into<String>, options: FetchOptions) -> Self {
        LogFetcher { cache, repo_url: repo_url.into(), options, on_page: None }
    }

    /// Called with the records of each chunk right after it is committed.
    pub fn on_page(mut self, observer: impl FnMut(&[RevisionRecord]) + 'a) -> Self {
        self.on_page = Some(Box::new(observer));
        self
    }

    fn cancelled(&self) -> bool {
        self.options.cancel.as_ref().is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    fn progress_bar(&self, limit: Option<usize>) -> ProgressBar {
        if !self.options.progress {
            return ProgressBar::hidden();
        }
        match limit {
            Some(max) => ProgressBar::new(max as u64),
            None => ProgressBar::new_spinner(),
        }
    }

    pub fn run<S: RevisionSource + ?Sized>(&mut self, source: &mut S) -> Result<FetchSummary, FetchError> {
        let head = match source.head_revision() {
            Ok(head) => head,
            Err(err) => {
                warn!(%err, "could not resolve HEAD revision, paging from symbolic HEAD");
                HeadRevision::Symbolic
            }
        };
        let manifest = self.cache.get_meta(&self.repo_url);
        let stop_at = self.options.stop_at.or_else(|| manifest.as_ref().and_then(|m| m.newest_rev));
        // ranges on disk, including the ones this run commits
        let mut cached: Vec<(Revision, Revision)> = manifest
            .map(|m| m.chunks.iter().map(|c| (c.start_rev, c.end_rev)).collect())
            .unwrap_or_default();
        let limit = self.options.limit.filter(|&max| max > 0);
        let page_size = clamp_page_size(Some(self.options.page_size));

        info!(repo = %self.repo_url, ?head, ?stop_at, page_size, "starting log fetch");
        let bar = self.progress_bar(limit);

        let mut cursor = Cursor::from(head);
        let mut seen: HashSet<Revision> = HashSet::new();
        let mut total = 0usize;
        let mut pages = 0usize;
        let mut chunks = 0usize;

        let reason = loop {
            if self.cancelled() {
                break StopReason::Cancelled;
            }

            let page_limit = match limit {
                Some(max) => page_size.min(max - total),
                None => page_size,
            };
            if page_limit == 0 {
                break StopReason::LimitReached;
            }

            pages += 1;
            bar.set_message(format!("page {pages} from {cursor}"));
            debug!(page = pages, %cursor, limit = page_limit, "requesting log page");
            let raw = source
                .log_page(cursor, page_limit)
                .map_err(|source| FetchError::Source { page: pages, source })?;

            let Some(oldest) = raw.last().map(|r| r.revision) else {
                break StopReason::Exhausted;
            };
            let mut hit_stop = false;
            let mut covered = 0usize;
            let kept: Vec<RevisionRecord> = raw
                .into_iter()
                .filter(|record| {
                    if stop_at.is_some_and(|stop| record.revision <= stop) {
                        hit_stop = true;
                        return false;
                    }
                    if !seen.insert(record.revision) {
                        return false;
                    }
                    if cached.iter().any(|&(start, end)| (end..=start).contains(&record.revision)) {
                        covered += 1;
                        return false;
                    }
                    true
                })
                .collect();

            if kept.is_empty() && covered == 0 {
                break if hit_stop { StopReason::Watermark } else { StopReason::NoNewRecords };
            }
            if covered > 0 {
                debug!(page = pages, covered, "skipped revisions that are already cached");
            }

            for run in split_around_cached(kept, &cached) {
                let Some(chunk) = ChunkWrite::from_records(run) else {
                    continue;
                };
                self.cache.write_chunk(&self.repo_url, &chunk)?;
                cached.push((chunk.start_rev, chunk.end_rev));
                chunks += 1;
                total += chunk.records.len();
                bar.inc(chunk.records.len() as u64);
                if let Some(observer) = self.on_page.as_mut() {
                    observer(&chunk.records);
                }
            }

            if limit.is_some_and(|max| total >= max) {
                break StopReason::LimitReached;
            }
            if hit_stop {
                break StopReason::Watermark;
            }
            if oldest == 0 {
                break StopReason::Exhausted;
            }
            cursor = Cursor::At(oldest - 1);
        };

        bar.finish_with_message(format!("{total} revisions"));
        info!(repo = %self.repo_url, total, pages, ?reason, "log fetch finished");

        Ok(FetchSummary {
            total,
            pages,
            chunks,
            head: match head {
                HeadRevision::Number(rev) => Some(rev),
                HeadRevision::Symbolic => None,
            },
            stop_at,
            reason,
        })
    }
}

/// Cuts a newest-first run of records wherever a cached chunk sits between
/// two neighbours, so no chunk written from it spans revisions already on disk.
fn split_around_cached(
    records: Vec<RevisionRecord>,
    cached: &[(Revision, Revision)],
) -> Vec<Vec<RevisionRecord>> {
    let mut runs: Vec<Vec<RevisionRecord>> = Vec::new();
    for record in records {
        let gap = runs.last().and_then(|run| run.last()).is_some_and(|prev| {
            cached
                .iter()
                .any(|&(start, end)| record.revision < end && start < prev.revision)
        });
        match runs.last_mut() {
            Some(run) if !gap => run.push(record),
            _ => runs.push(vec![record]),
        }
    }
    runs
}
