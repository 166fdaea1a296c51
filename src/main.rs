// src/main.rs

use anyhow::Context;
use clap::Parser;
use revlog_cache::cli::{Args, Command, SourceKind};
use revlog_cache::source::git::GitSource;
use revlog_cache::source::svn::SvnCliSource;
use revlog_cache::source::RevisionSource;
use revlog_cache::{CacheConfig, FetchOptions, LogFetcher, RevisionCache};
use serde::Serialize;
use std::path::Path;
use std::time::Instant;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let cache = RevisionCache::new(CacheConfig::resolve(args.cache_dir));
    tracing::debug!(root = %cache.config().root().display(), "using cache root");

    match args.command {
        Command::Fetch {
            repo,
            source,
            limit,
            page_size,
            stop_at,
            username,
            password,
            progress,
        } => {
            let mut source: Box<dyn RevisionSource> = match source {
                SourceKind::Svn => {
                    Box::new(SvnCliSource::new(&repo).with_credentials(username, password))
                }
                SourceKind::Git => Box::new(
                    GitSource::open(Path::new(&repo))
                        .with_context(|| format!("opening git repository {repo}"))?,
                ),
            };
            let options =
                FetchOptions { limit: Some(limit), page_size, stop_at, cancel: None, progress };

            let start_time = Instant::now();
            let summary = LogFetcher::new(&cache, repo.as_str(), options)
                .run(&mut source)
                .with_context(|| format!("fetch of {repo} stopped early; rerun to resume"))?;
            tracing::info!("fetched {} revisions in {:.2?}", summary.total, start_time.elapsed());
            print_json(&summary)
        }
        Command::Meta { repo } => print_json(&cache.get_meta(&repo)),
        Command::Stats { repo } => print_json(&cache.get_stats(&repo)),
        Command::Clear { repo } => {
            cache.clear(&repo).with_context(|| format!("clearing cache for {repo}"))?;
            Ok(())
        }
        Command::Page { repo, page, per_page } => {
            let page = cache
                .read_page(&repo, page, per_page)
                .with_context(|| format!("reading page {page} of {repo}"))?;
            print_json(&page)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
