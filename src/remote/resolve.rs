//! Turns a public share link into the album id and access key.
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::error::{cancellable, ScrapeError};
use crate::remote::Transport;

/// Index of the `<albumId>?key=<accessKey>` segment in the redirect target.
const ALBUM_SEGMENT: usize = 4;
const KEY_PARAM: &str = "key=";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAlbum {
    pub album_id: String,
    pub access_key: String,
}

/// Resolve `share_url` by inspecting where it redirects. Never cached.
#[instrument(skip_all, fields(url = %share_url))]
pub async fn resolve_album(
    transport: &dyn Transport,
    share_url: &str,
    cancel: &CancellationToken,
) -> Result<ResolvedAlbum, ScrapeError> {
    let location = cancellable(cancel, transport.redirect_location(share_url))
        .await?
        .ok_or_else(|| ScrapeError::resolution(share_url, "no redirect location"))?;
    let resolved = parse_location(&location).ok_or_else(|| {
        ScrapeError::resolution(share_url, format!("unexpected redirect target {location}"))
    })?;
    info!(album_id = %resolved.album_id, "share link resolved");
    Ok(resolved)
}

/// Split a redirect target like `https://host/share/<id>?key=<key>`.
pub fn parse_location(location: &str) -> Option<ResolvedAlbum> {
    let segment = location.split('/').nth(ALBUM_SEGMENT)?;
    let (album_id, query) = segment.split_once('?')?;
    let access_key = query.strip_prefix(KEY_PARAM)?;
    if album_id.is_empty()
        || access_key.is_empty()
        || access_key.contains(|c: char| matches!(c, '&' | '=' | '?'))
    {
        return None;
    }
    Some(ResolvedAlbum {
        album_id: album_id.to_string(),
        access_key: access_key.to_string(),
    })
}
