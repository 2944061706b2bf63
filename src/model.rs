use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque id of the user an album is stored under.
pub type OwnerId = Uuid;

/// One album the caller wants ingested.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AlbumSpec {
    pub name: String,
    pub url: String,
}

/// Album row handed to the store. Identity is `(album_id, owner_id)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Album {
    pub album_id: String,
    pub album_key: String,
    pub album_name: String,
    pub owner_id: OwnerId,
}

/// Typed view of one catalog item, before filename enrichment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MediaCandidate {
    pub internal_id: String,
    pub url: Option<String>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub duration_ms: Option<i64>,
    pub timestamp_taken: Option<i64>,
    pub timestamp_uploaded: Option<i64>,
}

/// Unit handed to the store. Identity is `(internal_id, owner_id)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MediaRecord {
    #[serde(flatten)]
    pub candidate: MediaCandidate,
    pub file_name: Option<String>,
    pub album_id: String,
    pub owner_id: OwnerId,
}

impl MediaRecord {
    pub fn internal_id(&self) -> &str {
        &self.candidate.internal_id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScrapeSummary {
    pub album_id: String,
    pub total_records: usize,
    /// Page blocks whose pagination stopped on an unreadable reply.
    pub incomplete_blocks: usize,
}

impl ScrapeSummary {
    pub fn is_partial(&self) -> bool {
        self.incomplete_blocks > 0
    }
}

/// Final state of one album in a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlbumStatus {
    pub album: AlbumSpec,
    pub outcome: Result<ScrapeSummary, String>,
    pub finished_at: DateTime<Utc>,
}

impl AlbumStatus {
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Per-album statuses of a batch, in completion order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub statuses: Vec<AlbumStatus>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.statuses.iter().filter(|s| s.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.statuses.len() - self.succeeded()
    }

    /// Albums that succeeded but stored only part of their items.
    pub fn partial(&self) -> usize {
        self.statuses
            .iter()
            .filter_map(|s| s.outcome.as_ref().ok())
            .filter(|s| s.is_partial())
            .count()
    }

    pub fn total_records(&self) -> usize {
        self.statuses
            .iter()
            .filter_map(|s| s.outcome.as_ref().ok())
            .map(|s| s.total_records)
            .sum()
    }
}
