//! Client for the remote's batched RPC endpoint.
//!
//! A call is a list of positional envelopes `[function, params-as-json-string,
//! indexA, indexB]`, wrapped as `[[env, env, ...]]`, serialized to JSON and posted
//! as the `f.req` form field. Replies start with an anti-hijack prefix; each reply
//! envelope carries its own result as a JSON *string* in position 2, so decoding is
//! two-stage: [`ProtocolClient::call`] decodes the outer array and
//! [`ResponseEnvelope::decode_payload`] decodes one envelope's payload.
use std::sync::Arc;

use reqwest::Url;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::error::{cancellable, ScrapeError};
use crate::remote::Transport;

pub const RPC_PATH: &str = "_/PhotosUi/data/batchexecute";
pub const RESPONSE_PREFIX: &str = ")]}'";
pub const REQUEST_FIELD: &str = "f.req";

/// Fetch the next page of an album's items.
pub const FN_NEXT_PAGE: &str = "snAcKc";
/// Fetch per-item metadata (filename).
pub const FN_ITEM_METADATA: &str = "fDcn4b";

/// One call in a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub function: &'static str,
    pub params: Value,
    pub index_a: Option<&'static str>,
    pub index_b: Option<&'static str>,
}

impl Envelope {
    pub fn next_page(album_id: &str, cursor: &str, key: &str) -> Self {
        Self {
            function: FN_NEXT_PAGE,
            params: json!([album_id, cursor, null, key]),
            index_a: None,
            index_b: Some("generic"),
        }
    }

    pub fn item_metadata(internal_id: &str, key: &str) -> Self {
        Self {
            function: FN_ITEM_METADATA,
            params: json!([internal_id, null, key, null, null, [2]]),
            index_a: None,
            index_b: Some("1"),
        }
    }

    pub fn encode(&self) -> Value {
        json!([
            self.function,
            self.params.to_string(),
            self.index_a,
            self.index_b
        ])
    }
}

/// Serialize a batch into the `f.req` value.
pub fn encode_batch(envelopes: &[Envelope]) -> String {
    let inner: Vec<Value> = envelopes.iter().map(Envelope::encode).collect();
    Value::Array(vec![Value::Array(inner)]).to_string()
}

pub fn form_body(envelopes: &[Envelope]) -> String {
    format!(
        "{}={}",
        REQUEST_FIELD,
        urlencoding::encode(&encode_batch(envelopes))
    )
}

/// One entry of the decoded outer reply array.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEnvelope(pub Value);

impl ResponseEnvelope {
    /// The still-encoded payload at position 2, when it is a non-empty string.
    pub fn payload(&self) -> Option<&str> {
        self.0.get(2).and_then(Value::as_str).filter(|s| !s.is_empty())
    }

    /// Second decode stage. `None` when the envelope carries no payload.
    pub fn decode_payload(&self) -> Option<Result<Value, serde_json::Error>> {
        self.payload().map(serde_json::from_str)
    }
}

/// Outcome of the first decode stage.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcReply {
    Envelopes(Vec<ResponseEnvelope>),
    /// The body could not be decoded; the reason is kept for logging.
    Malformed(String),
}

impl RpcReply {
    pub fn is_malformed(&self) -> bool {
        matches!(self, RpcReply::Malformed(_))
    }

    /// Degrade a malformed reply to an empty envelope list.
    pub fn into_envelopes(self) -> Vec<ResponseEnvelope> {
        match self {
            RpcReply::Envelopes(envs) => envs,
            RpcReply::Malformed(_) => Vec::new(),
        }
    }
}

/// Strip the anti-hijack prefix and decode the outer reply array.
pub fn decode_reply(body: &str) -> RpcReply {
    let text = body.strip_prefix(RESPONSE_PREFIX).unwrap_or(body);
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Array(items)) => {
            RpcReply::Envelopes(items.into_iter().map(ResponseEnvelope).collect())
        }
        Ok(other) => RpcReply::Malformed(format!("expected an array, got {}", kind_of(&other))),
        Err(err) => RpcReply::Malformed(err.to_string()),
    }
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[derive(Clone)]
pub struct ProtocolClient {
    transport: Arc<dyn Transport>,
    endpoint: Url,
}

impl std::fmt::Debug for ProtocolClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolClient")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl ProtocolClient {
    pub fn new(transport: Arc<dyn Transport>, base_url: &Url) -> Result<Self, url::ParseError> {
        let endpoint = base_url.join(RPC_PATH)?;
        Ok(Self {
            transport,
            endpoint,
        })
    }

    /// Post one batch. Transport failures propagate; an undecodable body comes
    /// back as [`RpcReply::Malformed`].
    #[instrument(skip_all, fields(calls = envelopes.len()))]
    pub async fn call(
        &self,
        envelopes: &[Envelope],
        cancel: &CancellationToken,
    ) -> Result<RpcReply, ScrapeError> {
        let body = form_body(envelopes);
        let text = cancellable(cancel, self.transport.post_form(&self.endpoint, body)).await?;
        let reply = decode_reply(&text);
        match &reply {
            RpcReply::Malformed(reason) => {
                warn!(%reason, bytes = text.len(), "undecodable rpc reply");
            }
            RpcReply::Envelopes(envs) => {
                debug!(envelopes = envs.len(), "rpc reply decoded");
            }
        }
        Ok(reply)
    }
}
