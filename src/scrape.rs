//! Album scrape pipeline and the bounded batch runner on top of it.
use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use reqwest::Url;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::db::MediaStore;
use crate::enrich::{FileNames, MetadataEnricher, DEFAULT_BATCH_SIZE};
use crate::error::{cancellable, ScrapeError};
use crate::extract::{extract_data_blocks, extract_items, parse_literal};
use crate::model::{
    Album, AlbumSpec, AlbumStatus, BatchReport, MediaCandidate, MediaRecord, OwnerId,
    ScrapeSummary,
};
use crate::pagination::{PaginationWalker, DEFAULT_MAX_PAGES};
use crate::remote::resolve::resolve_album;
use crate::remote::rpc::ProtocolClient;
use crate::remote::Transport;

const BLOCK_ENTRIES: usize = 1;
const BLOCK_CURSOR: usize = 2;

/// Items embedded in one page block, plus the cursor for the rest.
#[derive(Debug, Clone, PartialEq)]
pub struct PageBlock {
    pub entries: Vec<Value>,
    /// `None` when the block carries no string cursor; treated as terminal.
    pub cursor: Option<String>,
}

/// Every usable page block in `html`. Blocks whose literal does not parse or
/// whose entry list is missing are skipped.
pub fn page_blocks(html: &str) -> Vec<PageBlock> {
    let mut blocks = Vec::new();
    for (idx, literal) in extract_data_blocks(html).into_iter().enumerate() {
        let data = match parse_literal(literal) {
            Ok(v) => v,
            Err(err) => {
                debug!(block = idx, %err, "skipping unparsable data literal");
                continue;
            }
        };
        let Some(Value::Array(entries)) = data.get(BLOCK_ENTRIES) else {
            debug!(block = idx, "data literal has no entry list");
            continue;
        };
        let cursor = data
            .get(BLOCK_CURSOR)
            .and_then(Value::as_str)
            .map(str::to_string);
        blocks.push(PageBlock {
            entries: entries.clone(),
            cursor,
        });
    }
    blocks
}

/// Attach file names to candidates. Items without an answer get `None`.
pub fn merge_records(
    candidates: Vec<MediaCandidate>,
    names: &FileNames,
    album_id: &str,
    owner_id: OwnerId,
) -> Vec<MediaRecord> {
    candidates
        .into_iter()
        .map(|candidate| MediaRecord {
            file_name: names.get(&candidate.internal_id).cloned(),
            candidate,
            album_id: album_id.to_string(),
            owner_id,
        })
        .collect()
}

/// Runs the full pipeline for one album at a time. Cheap to share behind an `Arc`.
pub struct Scraper {
    transport: Arc<dyn Transport>,
    rpc: ProtocolClient,
    store: Arc<dyn MediaStore>,
    max_pages: usize,
    batch_size: usize,
}

impl std::fmt::Debug for Scraper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scraper")
            .field("rpc", &self.rpc)
            .field("max_pages", &self.max_pages)
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

impl Scraper {
    pub fn new(
        transport: Arc<dyn Transport>,
        base_url: &Url,
        store: Arc<dyn MediaStore>,
    ) -> Result<Self, url::ParseError> {
        let rpc = ProtocolClient::new(transport.clone(), base_url)?;
        Ok(Self {
            transport,
            rpc,
            store,
            max_pages: DEFAULT_MAX_PAGES,
            batch_size: DEFAULT_BATCH_SIZE,
        })
    }

    pub fn with_limits(mut self, max_pages: usize, batch_size: usize) -> Self {
        self.max_pages = max_pages;
        self.batch_size = batch_size;
        self
    }

    #[instrument(skip_all, fields(album = %spec.name))]
    pub async fn scrape_album(
        &self,
        spec: &AlbumSpec,
        owner_id: OwnerId,
        cancel: &CancellationToken,
    ) -> Result<ScrapeSummary, ScrapeError> {
        let resolved = resolve_album(self.transport.as_ref(), &spec.url, cancel).await?;
        let album = Album {
            album_id: resolved.album_id.clone(),
            album_key: resolved.access_key.clone(),
            album_name: spec.name.clone(),
            owner_id,
        };
        self.store
            .save_album(&album)
            .await
            .map_err(ScrapeError::Persistence)?;

        let html = cancellable(cancel, self.transport.fetch_text(&spec.url)).await?;
        let blocks = page_blocks(&html);
        if blocks.is_empty() {
            warn!(album_id = %album.album_id, "no data blocks on album page");
        }

        let walker = PaginationWalker::new(&self.rpc, self.max_pages);
        let enricher = MetadataEnricher::new(&self.rpc, self.batch_size);
        let mut records = Vec::new();
        let mut incomplete_blocks = 0;
        for block in blocks {
            let walk = walker
                .walk(&resolved, block.entries, block.cursor, cancel)
                .await?;
            if !walk.complete {
                incomplete_blocks += 1;
            }
            let extracted = extract_items(&walk.entries);
            let names = enricher
                .file_names(&extracted.ids, &resolved.access_key, cancel)
                .await?;
            debug!(
                pages = walk.pages,
                complete = walk.complete,
                items = extracted.candidates.len(),
                named = names.len(),
                "block scraped"
            );
            records.extend(merge_records(
                extracted.candidates,
                &names,
                &album.album_id,
                owner_id,
            ));
        }

        self.store
            .save_media_items(&album.album_id, &records, owner_id)
            .await
            .map_err(ScrapeError::Persistence)?;
        if incomplete_blocks > 0 {
            warn!(
                album_id = %album.album_id,
                incomplete_blocks,
                "album stored partially; some pages were unreadable"
            );
        }
        info!(album_id = %album.album_id, records = records.len(), "album scraped");
        Ok(ScrapeSummary {
            album_id: album.album_id,
            total_records: records.len(),
            incomplete_blocks,
        })
    }
}

/// Scrape `albums` with at most `concurrency` in flight and report every outcome.
pub async fn run_batch(
    scraper: Arc<Scraper>,
    albums: Vec<AlbumSpec>,
    owner_id: OwnerId,
    concurrency: usize,
    cancel: CancellationToken,
) -> BatchReport {
    let statuses = stream::iter(albums)
        .map(|album| {
            let scraper = scraper.clone();
            let cancel = cancel.clone();
            async move {
                let outcome = scraper.scrape_album(&album, owner_id, &cancel).await;
                if let Err(err) = &outcome {
                    error!(album = %album.name, %err, "album scrape failed");
                }
                AlbumStatus {
                    album,
                    outcome: outcome.map_err(|e| e.to_string()),
                    finished_at: Utc::now(),
                }
            }
        })
        .buffer_unordered(concurrency.max(1))
        .collect::<Vec<_>>()
        .await;
    BatchReport { statuses }
}

/// Start [`run_batch`] in the background; the handle resolves to the report.
pub fn spawn_batch(
    scraper: Arc<Scraper>,
    albums: Vec<AlbumSpec>,
    owner_id: OwnerId,
    concurrency: usize,
    cancel: CancellationToken,
) -> JoinHandle<BatchReport> {
    tokio::spawn(run_batch(scraper, albums, owner_id, concurrency, cancel))
}
