//! Persistence for scraped albums.
//!
//! - `model`: row types returned by queries.
//! - `repo`: SQL-only functions over a SQLite pool.
//!
//! The scrape pipeline only sees the [`MediaStore`] trait; [`SqliteStore`] is the
//! implementation backed by `repo`.

pub mod model;
pub mod repo;

use anyhow::Result;
use async_trait::async_trait;

use crate::model::{Album, MediaRecord, OwnerId};

pub use model::{AlbumRow, MediaRow};
pub use repo::*;

/// Where finished scrapes are written. Both operations must be idempotent upserts.
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn save_album(&self, album: &Album) -> Result<()>;

    async fn save_media_items(
        &self,
        album_id: &str,
        records: &[MediaRecord],
        owner_id: OwnerId,
    ) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: Pool,
}

impl SqliteStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MediaStore for SqliteStore {
    async fn save_album(&self, album: &Album) -> Result<()> {
        upsert_album(&self.pool, album).await
    }

    async fn save_media_items(
        &self,
        album_id: &str,
        records: &[MediaRecord],
        owner_id: OwnerId,
    ) -> Result<()> {
        upsert_media_items(&self.pool, album_id, records, owner_id).await
    }
}
