//! Evaluator for the JavaScript-flavoured array literals embedded in album pages.
//!
//! Accepts a superset of JSON: single-quoted strings, `\x` escapes, bare object
//! keys, trailing commas, array holes (`[1,,2]`), `undefined`/`NaN`/`Infinity`,
//! other bare identifiers (all read as `null`) and comments. Object key order is
//! kept as written.
use serde_json::{Map, Number, Value};
use thiserror::Error;

const MAX_DEPTH: usize = 512;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid literal at byte {offset}: {message}")]
pub struct LiteralError {
    pub offset: usize,
    pub message: String,
}

/// Evaluate `text` as a single literal. Trailing content other than whitespace,
/// comments or a `;` is an error.
pub fn parse_literal(text: &str) -> Result<Value, LiteralError> {
    let mut p = Parser {
        src: text,
        bytes: text.as_bytes(),
        pos: 0,
        depth: 0,
    };
    let value = p.value()?;
    p.skip_trivia()?;
    if p.peek() == Some(b';') {
        p.pos += 1;
        p.skip_trivia()?;
    }
    if p.pos != p.bytes.len() {
        return Err(p.error("unexpected trailing input"));
    }
    Ok(value)
}

struct Parser<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn error(&self, message: impl Into<String>) -> LiteralError {
        LiteralError {
            offset: self.pos,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_trivia(&mut self) -> Result<(), LiteralError> {
        loop {
            match self.peek() {
                Some(b' ' | b'\t' | b'\n' | b'\r') => self.pos += 1,
                Some(b'/') if self.bytes.get(self.pos + 1) == Some(&b'/') => {
                    while !matches!(self.peek(), None | Some(b'\n')) {
                        self.pos += 1;
                    }
                }
                Some(b'/') if self.bytes.get(self.pos + 1) == Some(&b'*') => {
                    let rest = &self.src[self.pos + 2..];
                    let end = rest
                        .find("*/")
                        .ok_or_else(|| self.error("unterminated comment"))?;
                    self.pos += 2 + end + 2;
                }
                _ => return Ok(()),
            }
        }
    }

    fn value(&mut self) -> Result<Value, LiteralError> {
        self.skip_trivia()?;
        match self.peek() {
            None => Err(self.error("unexpected end of input")),
            Some(b'[') => self.nested(Self::array),
            Some(b'{') => self.nested(Self::object),
            Some(q @ (b'"' | b'\'')) => self.string(q).map(Value::String),
            Some(b'-' | b'+' | b'.' | b'0'..=b'9') => self.number(),
            Some(c) if is_ident_start(c) => Ok(keyword(self.ident())),
            Some(c) => Err(self.error(format!("unexpected character {:?}", c as char))),
        }
    }

    fn nested(
        &mut self,
        f: fn(&mut Self) -> Result<Value, LiteralError>,
    ) -> Result<Value, LiteralError> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error("nesting too deep"));
        }
        self.depth += 1;
        let res = f(self);
        self.depth -= 1;
        res
    }

    fn array(&mut self) -> Result<Value, LiteralError> {
        self.pos += 1;
        let mut items = Vec::new();
        loop {
            self.skip_trivia()?;
            match self.peek() {
                Some(b']') => {
                    self.pos += 1;
                    return Ok(Value::Array(items));
                }
                // hole
                Some(b',') => {
                    self.pos += 1;
                    items.push(Value::Null);
                    continue;
                }
                None => return Err(self.error("unterminated array")),
                _ => {}
            }
            items.push(self.value()?);
            self.skip_trivia()?;
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b']') => {}
                _ => return Err(self.error("expected ',' or ']'")),
            }
        }
    }

    fn object(&mut self) -> Result<Value, LiteralError> {
        self.pos += 1;
        let mut map = Map::new();
        loop {
            self.skip_trivia()?;
            let key = match self.peek() {
                Some(b'}') => {
                    self.pos += 1;
                    return Ok(Value::Object(map));
                }
                Some(q @ (b'"' | b'\'')) => self.string(q)?,
                Some(c) if is_ident_start(c) || c.is_ascii_digit() => self.ident().to_string(),
                None => return Err(self.error("unterminated object")),
                Some(_) => return Err(self.error("expected object key")),
            };
            self.skip_trivia()?;
            if self.peek() != Some(b':') {
                return Err(self.error("expected ':'"));
            }
            self.pos += 1;
            let value = self.value()?;
            map.insert(key, value);
            self.skip_trivia()?;
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b'}') => {}
                _ => return Err(self.error("expected ',' or '}'")),
            }
        }
    }

    fn ident(&mut self) -> &'a str {
        let src = self.src;
        let start = self.pos;
        while self.peek().is_some_and(is_ident_char) {
            self.pos += 1;
        }
        &src[start..self.pos]
    }

    fn number(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        if matches!(self.peek(), Some(b'-' | b'+')) {
            self.pos += 1;
        }
        // Infinity / NaN after a sign
        if self.peek().is_some_and(is_ident_start) {
            self.ident();
            return Ok(Value::Null);
        }
        if self.peek() == Some(b'0') && matches!(self.bytes.get(self.pos + 1), Some(b'x' | b'X')) {
            self.pos += 2;
            let digits_start = self.pos;
            while self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
                self.pos += 1;
            }
            let digits = &self.src[digits_start..self.pos];
            let n = i64::from_str_radix(digits, 16).map_err(|_| self.error("bad hex literal"))?;
            let negative = self.bytes[start] == b'-';
            return Ok(Value::Number(Number::from(if negative { -n } else { n })));
        }
        let mut integral = true;
        while let Some(c) = self.peek() {
            match c {
                b'0'..=b'9' => {}
                b'.' => integral = false,
                b'e' | b'E' => {
                    integral = false;
                    if matches!(self.bytes.get(self.pos + 1), Some(b'-' | b'+')) {
                        self.pos += 1;
                    }
                }
                _ => break,
            }
            self.pos += 1;
        }
        let text = self.src[start..self.pos].trim_start_matches('+');
        if integral {
            if let Ok(n) = text.parse::<i64>() {
                return Ok(Value::Number(Number::from(n)));
            }
        }
        let f: f64 = text
            .parse()
            .map_err(|_| LiteralError {
                offset: start,
                message: format!("bad number {text:?}"),
            })?;
        Ok(Number::from_f64(f).map_or(Value::Null, Value::Number))
    }

    fn string(&mut self, quote: u8) -> Result<String, LiteralError> {
        self.pos += 1;
        let mut out = String::new();
        let mut run = self.pos;
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated string")),
                Some(c) if c == quote => {
                    out.push_str(&self.src[run..self.pos]);
                    self.pos += 1;
                    return Ok(out);
                }
                Some(b'\\') => {
                    out.push_str(&self.src[run..self.pos]);
                    self.pos += 1;
                    self.escape(&mut out)?;
                    run = self.pos;
                }
                Some(_) => self.pos += 1,
            }
        }
    }

    fn escape(&mut self, out: &mut String) -> Result<(), LiteralError> {
        let Some(c) = self.peek() else {
            return Err(self.error("unterminated escape"));
        };
        self.pos += 1;
        match c {
            b'n' => out.push('\n'),
            b't' => out.push('\t'),
            b'r' => out.push('\r'),
            b'b' => out.push('\u{8}'),
            b'f' => out.push('\u{c}'),
            b'v' => out.push('\u{b}'),
            b'0' => out.push('\0'),
            // line continuation
            b'\n' => {}
            b'\r' => {
                if self.peek() == Some(b'\n') {
                    self.pos += 1;
                }
            }
            b'x' => {
                let code = self.hex(2)?;
                out.push(char::from_u32(code).unwrap_or('\u{fffd}'));
            }
            b'u' => {
                let ch = self.unicode_escape()?;
                out.push(ch);
            }
            _ => {
                // Any other escaped character stands for itself; back up so a
                // multi-byte character is copied whole.
                self.pos -= 1;
                let ch = self.src[self.pos..]
                    .chars()
                    .next()
                    .ok_or_else(|| self.error("unterminated escape"))?;
                self.pos += ch.len_utf8();
                out.push(ch);
            }
        }
        Ok(())
    }

    fn unicode_escape(&mut self) -> Result<char, LiteralError> {
        if self.peek() == Some(b'{') {
            self.pos += 1;
            let start = self.pos;
            while self.peek().is_some_and(|c| c != b'}') {
                self.pos += 1;
            }
            let code = u32::from_str_radix(&self.src[start..self.pos], 16)
                .map_err(|_| self.error("bad \\u{} escape"))?;
            self.pos += 1;
            return Ok(char::from_u32(code).unwrap_or('\u{fffd}'));
        }
        let high = self.hex(4)?;
        if (0xD800..0xDC00).contains(&high)
            && self.bytes.get(self.pos) == Some(&b'\\')
            && self.bytes.get(self.pos + 1) == Some(&b'u')
        {
            let save = self.pos;
            self.pos += 2;
            let low = self.hex(4)?;
            if (0xDC00..0xE000).contains(&low) {
                let code = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
                return Ok(char::from_u32(code).unwrap_or('\u{fffd}'));
            }
            self.pos = save;
        }
        Ok(char::from_u32(high).unwrap_or('\u{fffd}'))
    }

    fn hex(&mut self, len: usize) -> Result<u32, LiteralError> {
        let digits = self
            .src
            .get(self.pos..self.pos + len)
            .filter(|d| d.bytes().all(|c| c.is_ascii_hexdigit()))
            .ok_or_else(|| self.error("bad hex escape"))?;
        self.pos += len;
        u32::from_str_radix(digits, 16).map_err(|_| self.error("bad hex escape"))
    }
}

fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_' || c == b'$'
}

fn is_ident_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_' || c == b'$'
}

fn keyword(word: &str) -> Value {
    match word {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::Null,
    }
}
