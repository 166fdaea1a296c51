// src/source/git.rs

use super::{Cursor, HeadRevision, RevisionSource};
use crate::error::SourceError;
use crate::model::{ChangedPath, PathAction, Revision, RevisionRecord};
use chrono::{SecondsFormat, TimeZone};
use git2::{Commit, Delta, DiffDelta, DiffFindOptions, DiffOptions, Oid, Repository};
use std::path::Path;
use tracing::info;

/// Presents a local git repository's first-parent history as a numbered
/// revision log: the root commit is r1 and HEAD is the chain length.
pub struct GitSource {
    repo: Repository,
    /// HEAD first, root last
    chain: Vec<Oid>,
}

impl GitSource {
    pub fn open(repo_path: &Path) -> Result<Self, SourceError> {
        let repo = Repository::open(repo_path)?;

        let mut revwalk = repo.revwalk()?;
        revwalk.push_head()?;
        revwalk.simplify_first_parent()?;
        revwalk.set_sorting(git2::Sort::TOPOLOGICAL)?;
        let chain = revwalk.collect::<Result<Vec<_>, _>>()?;

        info!(repo = %repo_path.display(), commits = chain.len(), "opened git history");
        Ok(GitSource { repo, chain })
    }

    fn revision_at(&self, idx: usize) -> Revision {
        (self.chain.len() - idx) as Revision
    }

    fn record_at(&self, idx: usize) -> Result<RevisionRecord, SourceError> {
        let revision = self.revision_at(idx);
        let commit = self.repo.find_commit(self.chain[idx])?;
        let author = commit.author();

        let record = RevisionRecord {
            revision,
            author: author.name().unwrap_or("Unknown").to_string(),
            date: chrono::Utc
                .timestamp_opt(commit.time().seconds(), 0)
                .single()
                .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true)),
            message: commit.message().unwrap_or("").trim_end().to_string(),
            paths: self.changed_paths(&commit, revision)?,
        };
        Ok(record)
    }

    fn changed_paths(&self, commit: &Commit<'_>, revision: Revision) -> Result<Vec<ChangedPath>, SourceError> {
        let parent_tree = if commit.parent_count() > 0 {
            Some(commit.parent(0)?.tree()?)
        } else {
            None
        };
        let current_tree = commit.tree()?;

        let mut diff_opts = DiffOptions::new();
        diff_opts.ignore_filemode(true);
        let mut diff = self
            .repo
            .diff_tree_to_tree(parent_tree.as_ref(), Some(&current_tree), Some(&mut diff_opts))?;

        let mut find_opts = DiffFindOptions::new();
        find_opts.renames(true);
        diff.find_similar(Some(&mut find_opts))?;

        Ok(diff
            .deltas()
            .flat_map(|delta| delta_paths(&delta, revision.saturating_sub(1)))
            .collect())
    }
}

fn repo_path(path: Option<&Path>) -> Option<String> {
    path.and_then(|p| p.to_str()).map(|p| format!("/{p}"))
}

/// Maps a tree delta onto Subversion-style path actions. A rename becomes an
/// add-with-history plus a delete, the way `svn log` reports `svn mv`.
fn delta_paths(delta: &DiffDelta<'_>, parent_rev: Revision) -> Vec<ChangedPath> {
    let old_path = repo_path(delta.old_file().path());
    let new_path = repo_path(delta.new_file().path());
    let plain = |action: PathAction, path: String| ChangedPath {
        action,
        path,
        copy_from_path: None,
        copy_from_rev: None,
    };

    match (delta.status(), old_path, new_path) {
        (Delta::Added, _, Some(new)) => vec![plain(PathAction::Added, new)],
        (Delta::Deleted, Some(old), _) => vec![plain(PathAction::Deleted, old)],
        (Delta::Modified | Delta::Typechange, _, Some(new)) => vec![plain(PathAction::Modified, new)],
        (Delta::Renamed, Some(old), Some(new)) => vec![
            ChangedPath {
                action: PathAction::Added,
                path: new,
                copy_from_path: Some(old.clone()),
                copy_from_rev: Some(parent_rev),
            },
            plain(PathAction::Deleted, old),
        ],
        (Delta::Copied, Some(old), Some(new)) => vec![ChangedPath {
            action: PathAction::Added,
            path: new,
            copy_from_path: Some(old),
            copy_from_rev: Some(parent_rev),
        }],
        _ => Vec::new(),
    }
}

impl RevisionSource for GitSource {
    fn head_revision(&mut self) -> Result<HeadRevision, SourceError> {
        Ok(HeadRevision::Number(self.chain.len() as Revision))
    }

    fn log_page(&mut self, from: Cursor, limit: usize) -> Result<Vec<RevisionRecord>, SourceError> {
        let len = self.chain.len();
        let top = match from {
            Cursor::Head => len,
            Cursor::At(rev) => usize::try_from(rev).unwrap_or(usize::MAX).min(len),
        };
        (len - top..len).take(limit).map(|idx| self.record_at(idx)).collect()
    }
}
