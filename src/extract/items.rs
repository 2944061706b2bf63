//! Decoding of positional catalog entries into [`MediaCandidate`]s.
use serde_json::{Map, Value};
use tracing::debug;

use crate::model::MediaCandidate;

/// Positions of the fields inside one raw catalog entry. Protocol drift is a
/// change here and nowhere else.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntrySchema {
    pub min_arity: usize,
    pub id: usize,
    pub media: usize,
    pub media_url: usize,
    pub media_width: usize,
    pub media_height: usize,
    pub taken: usize,
    pub uploaded: usize,
    pub metadata: usize,
    pub duration_value: usize,
    pub duration_width: usize,
    pub duration_height: usize,
    /// Durations must be longer than this many milliseconds.
    pub min_duration_ms: f64,
}

pub const ENTRY_SCHEMA: EntrySchema = EntrySchema {
    min_arity: 2,
    id: 0,
    media: 1,
    media_url: 0,
    media_width: 1,
    media_height: 2,
    taken: 2,
    uploaded: 5,
    metadata: 9,
    duration_value: 0,
    duration_width: 2,
    duration_height: 3,
    min_duration_ms: 1000.0,
};

/// An entry that passed shape validation. Fields not yet interpreted stay raw.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEntry<'a> {
    pub id: &'a str,
    pub media: &'a [Value],
    pub taken: Option<&'a Value>,
    pub uploaded: Option<&'a Value>,
    pub metadata: Option<&'a Value>,
}

/// Why an entry was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntrySkip {
    NotASequence,
    TooShort,
    MissingId,
    MissingMedia,
}

impl<'a> RawEntry<'a> {
    pub fn decode(value: &'a Value, schema: &EntrySchema) -> Result<Self, EntrySkip> {
        let items = value.as_array().ok_or(EntrySkip::NotASequence)?;
        if items.len() < schema.min_arity {
            return Err(EntrySkip::TooShort);
        }
        let id = items
            .get(schema.id)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or(EntrySkip::MissingId)?;
        let media = items
            .get(schema.media)
            .and_then(Value::as_array)
            .ok_or(EntrySkip::MissingMedia)?;
        Ok(Self {
            id,
            media,
            taken: items.get(schema.taken),
            uploaded: items.get(schema.uploaded),
            metadata: items.get(schema.metadata),
        })
    }

    pub fn to_candidate(&self, schema: &EntrySchema) -> MediaCandidate {
        let url = self
            .media
            .get(schema.media_url)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let width = self.media.get(schema.media_width).and_then(positive_int);
        let height = self.media.get(schema.media_height).and_then(positive_int);
        let duration_ms = match (self.metadata, width, height) {
            (Some(meta), Some(w), Some(h)) => find_duration(meta, w, h, schema),
            _ => None,
        };
        MediaCandidate {
            internal_id: self.id.to_string(),
            url,
            width,
            height,
            duration_ms,
            timestamp_taken: self.taken.and_then(positive_int),
            timestamp_uploaded: self.uploaded.and_then(positive_int),
        }
    }
}

/// Zero, absent and non-numeric values all count as missing.
fn positive_int(v: &Value) -> Option<i64> {
    let n = v.as_i64().or_else(|| v.as_f64().map(|f| f as i64))?;
    (n != 0).then_some(n)
}

/// First metadata block that looks like `[duration, _, w, h, ..]` for a rendition
/// no larger than the item itself. Object blocks are visited in property order:
/// array-index keys ascending, then the rest as written. A `null` dimension
/// compares as 0; a missing one never fits.
pub fn find_duration(
    metadata: &Value,
    width: i64,
    height: i64,
    schema: &EntrySchema,
) -> Option<i64> {
    let blocks: Vec<&Value> = match metadata {
        Value::Object(map) => property_order(map),
        Value::Array(items) => items.iter().collect(),
        _ => return None,
    };
    for block in blocks {
        let Some(block) = block.as_array() else {
            continue;
        };
        let Some(duration) = block.get(schema.duration_value).and_then(Value::as_f64) else {
            continue;
        };
        let fits = |idx: usize, limit: i64| match block.get(idx) {
            Some(Value::Null) => 0.0 <= limit as f64,
            Some(v) => v.as_f64().is_some_and(|d| d <= limit as f64),
            None => false,
        };
        if duration > schema.min_duration_ms
            && fits(schema.duration_width, width)
            && fits(schema.duration_height, height)
        {
            return Some(duration as i64);
        }
    }
    None
}

/// Values of `map` with array-index keys first in ascending order, then the
/// remaining keys in insertion order.
fn property_order(map: &Map<String, Value>) -> Vec<&Value> {
    let mut indexed: Vec<(u32, &Value)> = Vec::new();
    let mut named: Vec<&Value> = Vec::new();
    for (key, value) in map {
        match array_index(key) {
            Some(idx) => indexed.push((idx, value)),
            None => named.push(value),
        }
    }
    indexed.sort_by_key(|(idx, _)| *idx);
    indexed.into_iter().map(|(_, v)| v).chain(named).collect()
}

/// `key` as a canonical array index: decimal, no leading zeros, below 2^32 - 1.
fn array_index(key: &str) -> Option<u32> {
    let idx: u32 = key.parse().ok()?;
    (idx != u32::MAX && idx.to_string() == key).then_some(idx)
}

/// Identifier list and candidates, index-aligned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extracted {
    pub ids: Vec<String>,
    pub candidates: Vec<MediaCandidate>,
}

/// Decode every entry that has the expected shape; the rest are skipped.
pub fn extract_items(entries: &[Value]) -> Extracted {
    extract_items_with(entries, &ENTRY_SCHEMA)
}

pub fn extract_items_with(entries: &[Value], schema: &EntrySchema) -> Extracted {
    let mut out = Extracted::default();
    let mut skipped = 0usize;
    for value in entries {
        match RawEntry::decode(value, schema) {
            Ok(entry) => {
                out.ids.push(entry.id.to_string());
                out.candidates.push(entry.to_candidate(schema));
            }
            Err(reason) => {
                skipped += 1;
                debug!(?reason, "skipping catalog entry");
            }
        }
    }
    if skipped > 0 {
        debug!(skipped, kept = out.ids.len(), "catalog entries skipped");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry_with_meta(meta: Value) -> Value {
        json!(["vid", ["http://v", 1920, 1080], 10, null, null, 20, null, null, null, meta])
    }

    #[test]
    fn decodes_basic_entry() {
        let entries = vec![json!(["id1", ["http://x", 100, 200], 1000, null, null, 5000])];
        let out = extract_items(&entries);
        assert_eq!(out.ids, vec!["id1"]);
        assert_eq!(
            out.candidates[0],
            MediaCandidate {
                internal_id: "id1".into(),
                url: Some("http://x".into()),
                width: Some(100),
                height: Some(200),
                duration_ms: None,
                timestamp_taken: Some(1000),
                timestamp_uploaded: Some(5000),
            }
        );
    }

    #[test]
    fn skips_malformed_entries() {
        let entries = vec![
            json!("not an entry"),
            json!(["only-id"]),
            json!([null, ["http://x", 1, 1]]),
            json!(["id", "no media array"]),
            json!(["ok", []]),
        ];
        let out = extract_items(&entries);
        assert_eq!(out.ids, vec!["ok"]);
        let c = &out.candidates[0];
        assert!(c.url.is_none() && c.width.is_none() && c.timestamp_taken.is_none());
    }

    #[test]
    fn decode_reports_skip_reason() {
        assert_eq!(
            RawEntry::decode(&json!(["x"]), &ENTRY_SCHEMA),
            Err(EntrySkip::TooShort)
        );
        assert_eq!(
            RawEntry::decode(&json!({"a": 1}), &ENTRY_SCHEMA),
            Err(EntrySkip::NotASequence)
        );
        assert_eq!(
            RawEntry::decode(&json!(["", []]), &ENTRY_SCHEMA),
            Err(EntrySkip::MissingId)
        );
    }

    #[test]
    fn zero_values_are_missing() {
        let entries = vec![json!(["id", ["", 0, 0], 0, null, null, 0])];
        let c = &extract_items(&entries).candidates[0];
        assert_eq!(c.url, None);
        assert_eq!(c.width, None);
        assert_eq!(c.timestamp_taken, None);
        assert_eq!(c.timestamp_uploaded, None);
    }

    #[test]
    fn duration_first_plausible_block_wins() {
        let meta = json!({
            "1": "text",
            "2": [500, 0, 10, 10],
            "3": [90000, 0, 4000, 10],
            "4": [61000, 0, 1280, 720],
            "5": [75000, 0, 640, 360]
        });
        let c = &extract_items(&[entry_with_meta(meta)]).candidates[0];
        assert_eq!(c.duration_ms, Some(61000));
    }

    #[test]
    fn reordering_non_matching_blocks_keeps_result() {
        let a = json!({"x": [500, 0, 1, 1], "y": [2000, 0, 9999, 1], "z": [42000, 0, 1920, 1080]});
        let b = json!({"y": [2000, 0, 9999, 1], "z": [42000, 0, 1920, 1080], "x": [500, 0, 1, 1]});
        let da = extract_items(&[entry_with_meta(a)]).candidates[0].duration_ms;
        let db = extract_items(&[entry_with_meta(b)]).candidates[0].duration_ms;
        assert_eq!(da, Some(42000));
        assert_eq!(da, db);
    }

    #[test]
    fn duration_uses_stored_order_not_maximum() {
        let meta = json!({"b": [3000, 0, 100, 100], "a": [99000, 0, 100, 100]});
        let c = &extract_items(&[entry_with_meta(meta)]).candidates[0];
        assert_eq!(c.duration_ms, Some(3000));
    }

    #[test]
    fn numeric_keys_are_visited_in_ascending_order() {
        let meta = json!({"200": [5000, 0, 100, 100], "15": [9000, 0, 100, 100]});
        let c = &extract_items(&[entry_with_meta(meta)]).candidates[0];
        assert_eq!(c.duration_ms, Some(9000));
    }

    #[test]
    fn numeric_keys_come_before_named_keys() {
        let meta = json!({
            "b": [3000, 0, 100, 100],
            "07": [4000, 0, 100, 100],
            "30": [7000, 0, 100, 100],
            "4": [6000, 0, 100, 100]
        });
        let map = meta.as_object().unwrap();
        let order: Vec<i64> = property_order(map)
            .iter()
            .map(|v| v[0].as_i64().unwrap())
            .collect();
        assert_eq!(order, vec![6000, 7000, 3000, 4000]);
        assert_eq!(array_index("0"), Some(0));
        assert_eq!(array_index("07"), None);
        assert_eq!(array_index("+1"), None);
        assert_eq!(array_index("4294967295"), None);
    }

    #[test]
    fn null_dimension_compares_as_zero() {
        let meta = json!({"a": [5000, 0, null, null]});
        let c = &extract_items(&[entry_with_meta(meta)]).candidates[0];
        assert_eq!(c.duration_ms, Some(5000));

        let meta = json!({"a": [5000, 0, null]});
        let c = &extract_items(&[entry_with_meta(meta)]).candidates[0];
        assert_eq!(c.duration_ms, None);
    }

    #[test]
    fn duration_requires_more_than_one_second_and_dims() {
        let meta = json!({"a": [1000, 0, 10, 10], "b": [5000, 0], "c": ["5000", 0, 1, 1]});
        assert_eq!(extract_items(&[entry_with_meta(meta)]).candidates[0].duration_ms, None);

        let no_dims = json!(["vid", ["http://v"], 1, null, null, 2, null, null, null, {"a": [5000, 0, 1, 1]}]);
        assert_eq!(extract_items(&[no_dims]).candidates[0].duration_ms, None);
    }
}
