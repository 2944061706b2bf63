//! Per-item filename lookup through the metadata RPC.
use std::collections::HashMap;

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::error::ScrapeError;
use crate::remote::rpc::{Envelope, ProtocolClient, ResponseEnvelope};

pub const DEFAULT_BATCH_SIZE: usize = 500;

/// `internal_id -> file name` for the items the remote answered for.
pub type FileNames = HashMap<String, String>;

/// Pull the `(id, file name)` pair out of one reply envelope. Envelopes without
/// a payload, with an undecodable payload, or of the wrong shape yield `None`.
pub fn file_name_entry(envelope: &ResponseEnvelope) -> Option<(String, String)> {
    let decoded = match envelope.decode_payload()? {
        Ok(v) => v,
        Err(err) => {
            debug!(%err, "skipping undecodable metadata payload");
            return None;
        }
    };
    let head = decoded.as_array()?.first()?.as_array()?;
    let id = head.first()?.as_str()?;
    let name = head.get(2)?.as_str().filter(|s| !s.is_empty())?;
    Some((id.to_string(), name.to_string()))
}

#[derive(Debug, Clone)]
pub struct MetadataEnricher<'a> {
    rpc: &'a ProtocolClient,
    batch_size: usize,
}

impl<'a> MetadataEnricher<'a> {
    pub fn new(rpc: &'a ProtocolClient, batch_size: usize) -> Self {
        Self {
            rpc,
            batch_size: batch_size.max(1),
        }
    }

    /// Look up file names for `ids`, `batch_size` identifiers per request.
    /// Items the remote does not answer for are simply absent from the map.
    #[instrument(skip_all, fields(ids = ids.len()))]
    pub async fn file_names(
        &self,
        ids: &[String],
        access_key: &str,
        cancel: &CancellationToken,
    ) -> Result<FileNames, ScrapeError> {
        let mut names = FileNames::with_capacity(ids.len());
        for chunk in ids.chunks(self.batch_size) {
            let envelopes: Vec<Envelope> = chunk
                .iter()
                .map(|id| Envelope::item_metadata(id, access_key))
                .collect();
            let reply = self.rpc.call(&envelopes, cancel).await?;
            if reply.is_malformed() {
                warn!(batch = chunk.len(), "metadata batch unreadable; file names left empty");
            }
            names.extend(reply.into_envelopes().iter().filter_map(file_name_entry));
        }
        debug!(resolved = names.len(), "file names fetched");
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_id_and_name() {
        let env = ResponseEnvelope(json!([
            "wrb.fr",
            "fDcn4b",
            "[[\"id1\",1690000000,\"clip.mp4\",null],null]"
        ]));
        assert_eq!(
            file_name_entry(&env),
            Some(("id1".to_string(), "clip.mp4".to_string()))
        );
    }

    #[test]
    fn skips_unusable_envelopes() {
        for env in [
            json!(["di", 42]),
            json!(["wrb.fr", "fDcn4b", "[[\"id1\""]),
            json!(["af.httprm", 10, "-1234", 5]),
            json!(["wrb.fr", "fDcn4b", "[[\"id1\",1]]"]),
            json!(["wrb.fr", "fDcn4b", "[null]"]),
            json!(["wrb.fr", "fDcn4b", "[[\"id1\",1,\"\"]]"]),
        ] {
            assert_eq!(file_name_entry(&ResponseEnvelope(env)), None);
        }
    }
}
