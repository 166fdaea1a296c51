// src/cache/pager.rs
//
// Index-based pagination over the chunk-partitioned log. The manifest acts
// as a skip index so only chunks overlapping the requested window are
// decompressed.

use super::chunk_store::ChunkStore;
use crate::config::MAX_PER_PAGE;
use crate::error::CacheError;
use crate::model::{Manifest, Page};
use rayon::prelude::*;
use std::ops::Range;

/// A chunk that overlaps the requested window, with the logical offset of
/// its first record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSlot {
    pub file: String,
    pub base: usize,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagePlan {
    pub window: Range<usize>,
    pub per_page: usize,
    pub slots: Vec<ChunkSlot>,
}

/// Clamps `page` to at least 1 and `per_page` to `[1, 500]`, then picks the
/// chunks whose `[base, base + count)` intersects the page window.
pub fn plan_page(manifest: &Manifest, page: usize, per_page: usize) -> PagePlan {
    let page = page.max(1);
    let per_page = per_page.clamp(1, MAX_PER_PAGE);
    let start = (page - 1).saturating_mul(per_page);
    let end = start.saturating_add(per_page);

    let mut slots = Vec::new();
    let mut base = 0usize;
    for chunk in &manifest.chunks {
        let next = base + chunk.count;
        if next > start && base < end {
            slots.push(ChunkSlot { file: chunk.file.clone(), base, count: chunk.count });
        }
        base = next;
        if base >= end {
            break;
        }
    }

    PagePlan { window: start..end, per_page, slots }
}

pub fn read_page(
    store: &ChunkStore,
    repo_url: &str,
    manifest: &Manifest,
    page: usize,
    per_page: usize,
) -> Result<Page, CacheError> {
    let plan = plan_page(manifest, page, per_page);

    let loaded = plan
        .slots
        .par_iter()
        .map(|slot| store.read(repo_url, &slot.file))
        .collect::<Result<Vec<_>, CacheError>>()?;

    let mut items = Vec::with_capacity(plan.per_page);
    for (slot, records) in plan.slots.iter().zip(loaded) {
        let local_start = plan.window.start.saturating_sub(slot.base);
        let local_end = records.len().min(plan.window.end - slot.base);
        if local_start < local_end {
            items.extend(records.into_iter().skip(local_start).take(local_end - local_start));
        }
        if items.len() >= plan.per_page {
            break;
        }
    }
    items.truncate(plan.per_page);

    Ok(Page { total_count: manifest.total_count, items })
}
