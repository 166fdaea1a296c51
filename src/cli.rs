// src/cli.rs

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Cache root directory (defaults to $REVLOG_CACHE_DIR, then the platform cache dir)
    #[arg(long, global = true)]
    pub cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch new revisions into the cache, stopping at what is already cached
    Fetch {
        /// Repository URL (svn) or path (git)
        repo: String,

        #[arg(long, value_enum, default_value_t = SourceKind::Svn)]
        source: SourceKind,

        /// Maximum number of new revisions to fetch (0 = no limit)
        #[arg(long, default_value_t = 0)]
        limit: usize,

        /// Revisions requested per page
        #[arg(long, default_value_t = 2000)]
        page_size: usize,

        /// Stop at this revision instead of the cached newest revision
        #[arg(long)]
        stop_at: Option<u64>,

        #[arg(long)]
        username: Option<String>,

        #[arg(long)]
        password: Option<String>,

        /// Show a progress bar on stderr
        #[arg(long)]
        progress: bool,
    },

    /// Print the cache manifest
    Meta { repo: String },

    /// Print on-disk size and summary counts
    Stats { repo: String },

    /// Delete every cached chunk of a repository
    Clear { repo: String },

    /// Print one page of cached revisions, newest first
    Page {
        repo: String,

        #[arg(long, default_value_t = 1)]
        page: usize,

        #[arg(long, default_value_t = 50)]
        per_page: usize,
    },
}

#[derive(clap::ValueEnum, Clone, Debug, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Remote Subversion repository, read through the `svn` client
    Svn,
    /// Local git repository, first-parent history numbered from the root commit
    Git,
}
