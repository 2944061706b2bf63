//! Row models returned by the repository queries.
//!
//! Keep these focused on what the queries select; interpretation belongs to callers.

use chrono::NaiveDateTime;
use sqlx::FromRow;

use crate::filename::FileNameFields;

#[derive(Debug, Clone, FromRow)]
pub struct AlbumRow {
    pub album_id: String,
    pub album_key: String,
    pub album_name: Option<String>,
    pub owner_id: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, FromRow)]
pub struct MediaRow {
    pub internal_id: String,
    pub owner_id: String,
    pub album_id: String,
    pub url: Option<String>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub duration_ms: Option<i64>,
    pub timestamp_taken: Option<i64>,
    pub timestamp_uploaded: Option<i64>,
    pub file_name: Option<String>,
    pub title: Option<String>,
    pub season: Option<i64>,
    pub episode: Option<i64>,
    /// JSON array of names.
    pub stars: String,
}

impl MediaRow {
    pub fn stars(&self) -> Vec<String> {
        serde_json::from_str(&self.stars).unwrap_or_default()
    }

    pub fn file_name_fields(&self) -> FileNameFields {
        FileNameFields {
            title: self.title.clone(),
            season: self.season,
            episode: self.episode,
            stars: self.stars(),
        }
    }
}
