//! Crawler CLI: crawl a set of starting URLs breadth-first, index every
//! fetched page into the store, and optionally write a summary dump.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use url::Url;

use crawler::{build_client, PageQueue};
use indexer::UnindexedPage;
use store::Store;
use supervisor::{Supervisor, SupervisorConfig, SlotResult};

/// Crawl the web breadth-first, indexing every page into a relational store.
#[derive(Debug, Parser)]
#[command(name = "crawl", about = "Crawl the web and index pages into a store")]
struct Args {
    /// Starting URLs to seed the crawl with.
    urls: Vec<Url>,

    /// Number of pages to fetch before stopping. Negative means "one per
    /// starting URL".
    #[arg(long, default_value_t = -1)]
    page_count: i64,

    /// Postgres connection string for the index store.
    #[arg(long)]
    database_path: String,

    /// Where to write the summary dump. No summary is written if omitted.
    #[arg(long)]
    summary_path: Option<PathBuf>,

    /// Number of pages to include in the summary. Negative means "all".
    #[arg(long, default_value_t = -1)]
    summary_count: i64,

    /// Number of keywords per page in the summary. Negative means "all".
    #[arg(long, default_value_t = 10)]
    keyword_count: i64,

    /// Number of outbound links per page in the summary. Negative means
    /// "all".
    #[arg(long, default_value_t = 10)]
    link_count: i64,

    /// Number of concurrent fetch workers.
    #[arg(long, default_value_t = 6)]
    request_concurrency: usize,

    /// Number of concurrent indexing workers. Indexing is a pure, cheap
    /// function here, so this only bounds how many pages are indexed
    /// in-flight rather than spinning up a dedicated worker pool.
    #[arg(long, default_value_t = 4)]
    index_concurrency: usize,

    /// Number of database connections in the store's connection pool.
    #[arg(long, default_value_t = 1)]
    database_concurrency: u32,

    /// Accepted for interface compatibility; no progress bar is implemented.
    #[arg(long)]
    no_progress: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _ = args.no_progress;

    init_logging();

    log::info!("Connecting to the database...");
    let pool = PgPoolOptions::new()
        .max_connections(args.database_concurrency.max(1))
        .connect(&args.database_path)
        .await
        .context("connecting to the database")?;
    let store = Store::new(pool);
    store.migrate().await;
    log::info!("Successfully connected to the database!");

    let mut queue = PageQueue::new();
    if !args.urls.is_empty() {
        queue.enqueue(args.urls.clone(), false, false).context("enqueueing starting URLs")?;
    }

    let page_count = if args.page_count < 0 { args.urls.len() as i64 } else { args.page_count };

    let config = SupervisorConfig {
        request_concurrency: args.request_concurrency,
        max_queue_size: args.index_concurrency.max(1) * 4,
    };
    let supervisor = Supervisor::new(build_client(), queue, config);
    let mut handle = supervisor.spawn(page_count);

    let mut pages_indexed: u64 = 0;
    while let Some(event) = handle.recv().await {
        match event {
            SlotResult::Fetched { url, outcome } => {
                let Some(content) = outcome.content else {
                    log::debug!("skipping {url}: not a crawlable document");
                    continue;
                };
                let unindexed = UnindexedPage {
                    url,
                    raw_bytes_as_text: content,
                    headers: outcome.meta.headers,
                    links: outcome.outlinks,
                };
                let indexed = indexer::index_page(unindexed);
                let page_url = indexed.url.clone();
                match store.index_page(indexed).await {
                    Ok(true) => pages_indexed += 1,
                    Ok(false) => log::debug!("{page_url} already up to date; skipped"),
                    Err(err) => log::error!("failed to index {page_url}: {err}"),
                }
            }
            SlotResult::Errored(err) => {
                log::warn!("crawl of {} failed: {}", err.url, err.cause);
            }
        }
    }
    handle.join().await.context("tearing down the crawl")?;
    log::info!("Crawl finished; indexed {pages_indexed} pages");

    if let Some(summary_path) = args.summary_path {
        let text = summary::render(&store, args.summary_count, args.keyword_count, args.link_count)
            .await
            .context("rendering summary")?;
        tokio::fs::write(&summary_path, text).await.context("writing summary file")?;
        log::info!("Wrote summary to {}", summary_path.display());
    }

    Ok(())
}

#[cfg(feature = "logging")]
fn init_logging() {
    let log_dir = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("logs");
    utils::init_logging(Some(log_dir));
}

#[cfg(not(feature = "logging"))]
fn init_logging() {
    utils::init_logging(None);
}
