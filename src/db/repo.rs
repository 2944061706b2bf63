use super::model::{AlbumRow, MediaRow};
use crate::filename::parse_file_name;
use crate::model::{Album, AlbumSpec, MediaRecord, OwnerId};
use anyhow::{Context, Result};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tracing::instrument;

pub type Pool = SqlitePool;

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    // Every connection to `sqlite::memory:` is its own database; keep one.
    let max_connections = if normalized.starts_with("sqlite::memory") { 1 } else { 5 };
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect(&normalized)
        .await
        .with_context(|| format!("failed to open database {normalized}"))?;
    // Enable WAL and stricter durability.
    sqlx::query("PRAGMA journal_mode=WAL;")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous=FULL;")
        .execute(&pool)
        .await?;
    Ok(pool)
}

/// If using a file-backed SQLite URL, expand a leading `~/`, ensure the parent
/// directory exists and ask SQLite to create the file. Leaves in-memory URLs
/// untouched.
fn prepare_sqlite_url(url: &str) -> String {
    if !url.starts_with("sqlite:") || url.starts_with("sqlite::memory") {
        return url.to_string();
    }

    let rest = &url["sqlite:".len()..];
    let path_with_query = rest.strip_prefix("//").unwrap_or(rest);
    let (path_part, query_part) = match path_with_query.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path_with_query, None),
    };
    if path_part.is_empty() {
        return url.to_string();
    }

    let expanded_path = match (path_part.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), rest),
        _ => path_part.to_string(),
    };

    if let Some(parent) = std::path::Path::new(&expanded_path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    let query = match query_part {
        Some(q) if q.contains("mode=") => q.to_string(),
        Some(q) => format!("{q}&mode=rwc"),
        None => "mode=rwc".to_string(),
    };
    format!("sqlite://{expanded_path}?{query}")
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Insert the album or refresh its key and name.
#[instrument(skip_all, fields(album_id = %album.album_id))]
pub async fn upsert_album(pool: &Pool, album: &Album) -> Result<()> {
    sqlx::query(
        "INSERT INTO albums (album_id, album_key, album_name, owner_id) VALUES (?, ?, ?, ?)
         ON CONFLICT (album_id, owner_id) DO UPDATE SET
             album_key = excluded.album_key,
             album_name = excluded.album_name,
             updated_at = CURRENT_TIMESTAMP",
    )
    .bind(&album.album_id)
    .bind(&album.album_key)
    .bind(&album.album_name)
    .bind(album.owner_id.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

/// Upsert every record in one transaction. Existing rows get all mutable fields,
/// filename-derived ones included, overwritten.
#[instrument(skip_all, fields(album_id = %album_id, records = records.len()))]
pub async fn upsert_media_items(
    pool: &Pool,
    album_id: &str,
    records: &[MediaRecord],
    owner_id: OwnerId,
) -> Result<()> {
    let owner = owner_id.to_string();
    let mut tx = pool.begin().await?;
    for record in records {
        let derived = parse_file_name(record.file_name.as_deref());
        let stars = serde_json::to_string(&derived.stars)?;
        let c = &record.candidate;
        sqlx::query(
            "INSERT INTO media (
                internal_id, owner_id, album_id, url, width, height, duration_ms,
                timestamp_taken, timestamp_uploaded, file_name, title, season, episode, stars
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (internal_id, owner_id) DO UPDATE SET
                album_id = excluded.album_id,
                url = excluded.url,
                width = excluded.width,
                height = excluded.height,
                duration_ms = excluded.duration_ms,
                timestamp_taken = excluded.timestamp_taken,
                timestamp_uploaded = excluded.timestamp_uploaded,
                file_name = excluded.file_name,
                title = excluded.title,
                season = excluded.season,
                episode = excluded.episode,
                stars = excluded.stars,
                updated_at = CURRENT_TIMESTAMP",
        )
        .bind(&c.internal_id)
        .bind(&owner)
        .bind(album_id)
        .bind(&c.url)
        .bind(c.width)
        .bind(c.height)
        .bind(c.duration_ms)
        .bind(c.timestamp_taken)
        .bind(c.timestamp_uploaded)
        .bind(&record.file_name)
        .bind(&derived.title)
        .bind(derived.season)
        .bind(derived.episode)
        .bind(stars)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("failed to upsert media {}", record.internal_id()))?;
    }
    tx.commit().await?;
    Ok(())
}

/// Replace the owner's saved album list.
#[instrument(skip_all)]
pub async fn save_scrape_config(pool: &Pool, owner_id: OwnerId, albums: &[AlbumSpec]) -> Result<()> {
    let config = serde_json::to_string(albums)?;
    sqlx::query(
        "INSERT INTO scrape_configs (owner_id, config) VALUES (?, ?)
         ON CONFLICT (owner_id) DO UPDATE SET config = excluded.config, updated_at = CURRENT_TIMESTAMP",
    )
    .bind(owner_id.to_string())
    .bind(config)
    .execute(pool)
    .await?;
    Ok(())
}

/// The owner's saved album list; empty when nothing was saved.
#[instrument(skip_all)]
pub async fn get_scrape_config(pool: &Pool, owner_id: OwnerId) -> Result<Vec<AlbumSpec>> {
    let config: Option<String> =
        sqlx::query_scalar("SELECT config FROM scrape_configs WHERE owner_id = ?")
            .bind(owner_id.to_string())
            .fetch_optional(pool)
            .await?;
    match config {
        Some(raw) => serde_json::from_str(&raw).context("stored scrape config is not valid JSON"),
        None => Ok(Vec::new()),
    }
}

#[instrument(skip_all)]
pub async fn list_albums(pool: &Pool, owner_id: OwnerId) -> Result<Vec<AlbumRow>> {
    let rows = sqlx::query_as::<_, AlbumRow>(
        "SELECT album_id, album_key, album_name, owner_id, created_at, updated_at
         FROM albums WHERE owner_id = ? ORDER BY album_name ASC",
    )
    .bind(owner_id.to_string())
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Stored media for an owner, newest upload first, optionally limited to one album.
#[instrument(skip_all)]
pub async fn list_media(
    pool: &Pool,
    owner_id: OwnerId,
    album_id: Option<&str>,
) -> Result<Vec<MediaRow>> {
    let rows = sqlx::query_as::<_, MediaRow>(
        "SELECT internal_id, owner_id, album_id, url, width, height, duration_ms,
                timestamp_taken, timestamp_uploaded, file_name, title, season, episode, stars
         FROM media
         WHERE owner_id = ? AND (? IS NULL OR album_id = ?)
         ORDER BY timestamp_uploaded DESC, internal_id ASC",
    )
    .bind(owner_id.to_string())
    .bind(album_id)
    .bind(album_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn count_media(pool: &Pool, owner_id: OwnerId) -> Result<i64> {
    let cnt: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM media WHERE owner_id = ?")
        .bind(owner_id.to_string())
        .fetch_one(pool)
        .await?;
    Ok(cnt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MediaCandidate;
    use uuid::Uuid;

    async fn setup_pool() -> Pool {
        let pool = init_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        pool
    }

    fn record(id: &str, owner: OwnerId, file_name: Option<&str>) -> MediaRecord {
        MediaRecord {
            candidate: MediaCandidate {
                internal_id: id.into(),
                url: Some(format!("http://x/{id}")),
                width: Some(100),
                height: Some(200),
                duration_ms: None,
                timestamp_taken: Some(1000),
                timestamp_uploaded: Some(5000),
            },
            file_name: file_name.map(str::to_string),
            album_id: "alb".into(),
            owner_id: owner,
        }
    }

    #[test]
    fn sqlite_url_normalization() {
        assert_eq!(prepare_sqlite_url("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(prepare_sqlite_url("postgres://db"), "postgres://db");
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join("nested/albums.db");
        let url = prepare_sqlite_url(&format!("sqlite://{}", path.display()));
        assert_eq!(url, format!("sqlite://{}?mode=rwc", path.display()));
        assert!(td.path().join("nested").exists());
        let url = prepare_sqlite_url(&format!("sqlite://{}?mode=ro", path.display()));
        assert!(url.ends_with("?mode=ro"));
    }

    #[tokio::test]
    async fn album_upsert_is_idempotent_and_refreshes_key() {
        let pool = setup_pool().await;
        let owner = Uuid::new_v4();
        let mut album = Album {
            album_id: "alb".into(),
            album_key: "k1".into(),
            album_name: "Trip".into(),
            owner_id: owner,
        };
        upsert_album(&pool, &album).await.unwrap();
        album.album_key = "k2".into();
        upsert_album(&pool, &album).await.unwrap();

        let rows = list_albums(&pool, owner).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].album_key, "k2");
        assert!(list_albums(&pool, Uuid::new_v4()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn media_upsert_overwrites_fields() {
        let pool = setup_pool().await;
        let owner = Uuid::new_v4();
        upsert_media_items(&pool, "alb", &[record("a", owner, None)], owner)
            .await
            .unwrap();

        let mut updated = record("a", owner, Some("movie - Title - S01_E02 - Alice.mp4"));
        updated.candidate.width = Some(640);
        upsert_media_items(&pool, "alb", &[updated], owner).await.unwrap();

        assert_eq!(count_media(&pool, owner).await.unwrap(), 1);
        let rows = list_media(&pool, owner, Some("alb")).await.unwrap();
        let row = &rows[0];
        assert_eq!(row.width, Some(640));
        assert_eq!(row.title.as_deref(), Some("Title"));
        assert_eq!(row.season, Some(1));
        assert_eq!(row.episode, Some(2));
        assert_eq!(row.stars(), vec!["Alice"]);
    }

    #[tokio::test]
    async fn same_item_for_two_owners_is_two_rows() {
        let pool = setup_pool().await;
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        upsert_media_items(&pool, "alb", &[record("x", a, None)], a).await.unwrap();
        upsert_media_items(&pool, "alb", &[record("x", b, None)], b).await.unwrap();
        assert_eq!(count_media(&pool, a).await.unwrap(), 1);
        assert_eq!(count_media(&pool, b).await.unwrap(), 1);
        assert_eq!(list_media(&pool, a, None).await.unwrap().len(), 1);
        assert!(list_media(&pool, a, Some("other")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn scrape_config_roundtrip() {
        let pool = setup_pool().await;
        let owner = Uuid::new_v4();
        assert!(get_scrape_config(&pool, owner).await.unwrap().is_empty());

        let albums = vec![AlbumSpec {
            name: "Trip".into(),
            url: "https://share/1".into(),
        }];
        save_scrape_config(&pool, owner, &albums).await.unwrap();
        save_scrape_config(&pool, owner, &albums).await.unwrap();
        assert_eq!(get_scrape_config(&pool, owner).await.unwrap(), albums);
    }
}
