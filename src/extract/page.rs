//! Locates the `data:` array literals that album pages embed in
//! `AF_initDataCallback({...})` calls.
//!
//! Scanning is textual: brackets are balanced with a depth counter, skipping over
//! quoted strings, so the literal is returned verbatim for the permissive
//! evaluator in [`crate::extract::literal`].

pub const CALLBACK_MARKER: &str = "AF_initDataCallback";
const DATA_FIELD: &str = "data";

/// Extract the `data:` literal of every callback block on the page, in page order.
/// Blocks without a usable `data:` field are skipped.
pub fn extract_data_blocks(html: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut from = 0;
    while let Some(found) = html[from..].find(CALLBACK_MARKER) {
        let after_marker = from + found + CALLBACK_MARKER.len();
        from = after_marker;
        let Some(object) = callback_argument(html, after_marker) else {
            continue;
        };
        from = object.end;
        if let Some(data) = data_field(&html[object.clone()]) {
            blocks.push(data);
        }
    }
    blocks
}

/// Byte range of the `{...}` argument of the call starting at `pos`.
fn callback_argument(html: &str, pos: usize) -> Option<std::ops::Range<usize>> {
    let bytes = html.as_bytes();
    let mut i = skip_ws(bytes, pos);
    if bytes.get(i) != Some(&b'(') {
        return None;
    }
    i = skip_ws(bytes, i + 1);
    if bytes.get(i) != Some(&b'{') {
        return None;
    }
    let end = balanced_end(bytes, i, b'{', b'}')?;
    Some(i..end)
}

/// The `[...]` value of the top-level `data:` key inside an object literal.
pub fn data_field(object: &str) -> Option<&str> {
    let bytes = object.as_bytes();
    let mut depth = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' => {
                i = skip_string(bytes, i)?;
                continue;
            }
            b'{' | b'[' | b'(' => depth += 1,
            b'}' | b']' | b')' => depth = depth.saturating_sub(1),
            _ if depth == 1 && is_key_at(bytes, i) => {
                let colon = skip_ws(bytes, i + DATA_FIELD.len());
                if bytes.get(colon) == Some(&b':') {
                    let start = skip_ws(bytes, colon + 1);
                    if bytes.get(start) != Some(&b'[') {
                        return None;
                    }
                    let end = balanced_end(bytes, start, b'[', b']')?;
                    return Some(&object[start..end]);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

fn is_key_at(bytes: &[u8], i: usize) -> bool {
    bytes[i..].starts_with(DATA_FIELD.as_bytes())
        && (i == 0 || !is_word(bytes[i - 1]))
        && bytes
            .get(i + DATA_FIELD.len())
            .map_or(true, |&c| !is_word(c))
}

fn is_word(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_' || c == b'$'
}

fn skip_ws(bytes: &[u8], mut i: usize) -> usize {
    while bytes.get(i).is_some_and(|c| c.is_ascii_whitespace()) {
        i += 1;
    }
    i
}

/// Index just past the quoted string opening at `start`.
fn skip_string(bytes: &[u8], start: usize) -> Option<usize> {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            c if c == quote => return Some(i + 1),
            _ => i += 1,
        }
    }
    None
}

/// Index just past the bracket that closes the one at `start`.
fn balanced_end(bytes: &[u8], start: usize, open: u8, close: u8) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = start;
    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' => {
                i = skip_string(bytes, i)?;
                continue;
            }
            c if c == open => depth += 1,
            c if c == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}
