//! Cursor-driven retrieval of the album items that did not fit on the page.
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::error::ScrapeError;
use crate::remote::resolve::ResolvedAlbum;
use crate::remote::rpc::{Envelope, ProtocolClient};

pub const DEFAULT_MAX_PAGES: usize = 1000;

const PAGE_ENTRIES: usize = 1;
const PAGE_CURSOR: usize = 2;

/// Entries gathered for one page block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageWalk {
    pub entries: Vec<Value>,
    /// Remote pages fetched, not counting the embedded seed.
    pub pages: usize,
    /// False when a malformed reply ended the walk before an empty cursor.
    pub complete: bool,
}

/// Entries and next cursor of one decoded page (`[_, entries, cursor, ..]`).
/// A missing or null entry list counts as empty; the cursor must be a string.
pub fn parse_page(page: &Value) -> Option<(Vec<Value>, String)> {
    let items = page.as_array()?;
    let cursor = items.get(PAGE_CURSOR)?.as_str()?.to_string();
    let entries = match items.get(PAGE_ENTRIES) {
        Some(Value::Array(entries)) => entries.clone(),
        None | Some(Value::Null) => Vec::new(),
        Some(_) => return None,
    };
    Some((entries, cursor))
}

#[derive(Debug, Clone)]
pub struct PaginationWalker<'a> {
    rpc: &'a ProtocolClient,
    max_pages: usize,
}

impl<'a> PaginationWalker<'a> {
    pub fn new(rpc: &'a ProtocolClient, max_pages: usize) -> Self {
        Self { rpc, max_pages }
    }

    /// Append every further page to `seed` until the remote returns an empty
    /// cursor. `cursor == None` means the seed is already the whole list.
    #[instrument(skip_all, fields(album_id = %album.album_id))]
    pub async fn walk(
        &self,
        album: &ResolvedAlbum,
        seed: Vec<Value>,
        cursor: Option<String>,
        cancel: &CancellationToken,
    ) -> Result<PageWalk, ScrapeError> {
        let mut walk = PageWalk {
            entries: seed,
            pages: 0,
            complete: true,
        };
        let mut cursor = cursor.unwrap_or_default();
        while !cursor.is_empty() {
            if walk.pages >= self.max_pages {
                return Err(ScrapeError::PaginationLimit {
                    album_id: album.album_id.clone(),
                    pages: walk.pages,
                });
            }
            let envelope = Envelope::next_page(&album.album_id, &cursor, &album.access_key);
            let reply = self.rpc.call(&[envelope], cancel).await?;
            walk.pages += 1;

            let page = reply
                .into_envelopes()
                .into_iter()
                .next()
                .and_then(|env| env.decode_payload())
                .and_then(Result::ok);
            let Some((entries, next)) = page.as_ref().and_then(parse_page) else {
                warn!(page = walk.pages, "unusable page reply; keeping entries gathered so far");
                walk.complete = false;
                break;
            };
            debug!(page = walk.pages, entries = entries.len(), "page fetched");
            walk.entries.extend(entries);
            cursor = next;
        }
        Ok(walk)
    }
}
