// src/source/mod.rs

//! Producers of revision records. Wire formats stay behind
//! [`RevisionSource`] so the cache never sees them.

pub mod git;
pub mod svn;
pub mod svn_xml;

use crate::error::SourceError;
use crate::model::{Revision, RevisionRecord};
use std::fmt;

/// The newest revision of a log, if the source can name it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadRevision {
    Number(Revision),
    /// The source only offered an opaque "HEAD" token
    Symbolic,
}

/// Where the next page starts (inclusive), walking towards older revisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    Head,
    At(Revision),
}

impl From<HeadRevision> for Cursor {
    fn from(head: HeadRevision) -> Self {
        match head {
            HeadRevision::Number(rev) => Cursor::At(rev),
            HeadRevision::Symbolic => Cursor::Head,
        }
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cursor::Head => f.write_str("HEAD"),
            Cursor::At(rev) => write!(f, "{rev}"),
        }
    }
}

pub trait RevisionSource {
    fn head_revision(&mut self) -> Result<HeadRevision, SourceError>;

    /// Up to `limit` records starting at `from` and going backwards,
    /// newest first.
    fn log_page(&mut self, from: Cursor, limit: usize) -> Result<Vec<RevisionRecord>, SourceError>;
}

impl<S: RevisionSource + ?Sized> RevisionSource for Box<S> {
    fn head_revision(&mut self) -> Result<HeadRevision, SourceError> {
        (**self).head_revision()
    }

    fn log_page(&mut self, from: Cursor, limit: usize) -> Result<Vec<RevisionRecord>, SourceError> {
        (**self).log_page(from, limit)
    }
}
