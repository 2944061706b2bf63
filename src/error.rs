//! Error taxonomy for a single album scrape.
//!
//! Shape mismatches inside the remote payload are not errors: entries and blocks
//! that do not decode are skipped where they are found. Only failures that end an
//! album's scrape live here.
use std::future::Future;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum ScrapeError {
    /// The share link did not redirect, or its target could not be split into id and key.
    #[error("cannot resolve share link {url}: {reason}")]
    Resolution { url: String, reason: String },
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("request to {url} returned status {status}")]
    Status { url: String, status: u16 },
    /// The remote kept handing out cursors past the configured page cap.
    #[error("album {album_id} still had more pages after {pages} requests")]
    PaginationLimit { album_id: String, pages: usize },
    #[error("persistence failed: {0:#}")]
    Persistence(#[source] anyhow::Error),
    #[error("scrape cancelled")]
    Cancelled,
}

impl ScrapeError {
    pub fn resolution(url: &str, reason: impl Into<String>) -> Self {
        ScrapeError::Resolution {
            url: url.to_string(),
            reason: reason.into(),
        }
    }
}

/// Run `fut` unless `cancel` fires first.
pub async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T, ScrapeError>
where
    F: Future<Output = Result<T, ScrapeError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ScrapeError::Cancelled),
        res = fut => res,
    }
}
