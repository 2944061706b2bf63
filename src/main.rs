use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use album_scraper::config;
use album_scraper::db::{self, SqliteStore};
use album_scraper::model::AlbumSpec;
use album_scraper::remote::HttpTransport;
use album_scraper::scrape::{spawn_batch, Scraper};
use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Also scrape the album list saved for the owner in the database
    #[arg(long)]
    saved: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let pool = db::init_pool(&cfg.database_url()).await?;
    db::run_migrations(&pool).await?;

    let owner_id = cfg.owner.id;
    let mut albums = cfg.albums.clone();
    if args.saved {
        albums.extend(db::get_scrape_config(&pool, owner_id).await?);
    }
    let albums = dedup_by_url(albums);
    if albums.is_empty() {
        warn!("no albums to scrape");
        return Ok(());
    }

    let transport = Arc::new(
        HttpTransport::new(cfg.app.request_timeout()).context("building http client")?,
    );
    let store = Arc::new(SqliteStore::new(pool));
    let scraper = Scraper::new(transport, &cfg.base_url()?, store)
        .context("building rpc endpoint")?
        .with_limits(cfg.app.max_pages, cfg.app.metadata_batch_size);

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; cancelling scrapes");
            ctrl_c.cancel();
        }
    });

    let count = albums.len();
    let handle = spawn_batch(
        Arc::new(scraper),
        albums,
        owner_id,
        cfg.app.concurrency,
        cancel,
    );
    info!(albums = count, "processing started");

    let report = handle.await.context("batch task panicked")?;
    for status in &report.statuses {
        match &status.outcome {
            Ok(summary) => info!(
                album = %status.album.name,
                album_id = %summary.album_id,
                records = summary.total_records,
                incomplete_blocks = summary.incomplete_blocks,
                "done"
            ),
            Err(err) => error!(album = %status.album.name, %err, "failed"),
        }
    }
    info!(
        succeeded = report.succeeded(),
        failed = report.failed(),
        partial = report.partial(),
        records = report.total_records(),
        "batch finished"
    );
    Ok(())
}

/// Keep the first entry for each share URL.
fn dedup_by_url(albums: Vec<AlbumSpec>) -> Vec<AlbumSpec> {
    let mut seen = HashSet::new();
    albums
        .into_iter()
        .filter(|a| seen.insert(a.url.clone()))
        .collect()
}
