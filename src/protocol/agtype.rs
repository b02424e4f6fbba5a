//! agtype literal codec
//!
//! Apache AGE returns every result column as agtype text: JSON extended with
//! `NaN`/`Infinity` float literals and `::vertex`, `::edge`, `::path` and
//! `::numeric` annotations. Parameters travel the same way, as one agtype map.
//!
//! ```text
//! {"id": 844424930131969, "label": "Person", "properties": {"name": "Alice"}}::vertex
//! {"id": 1125899906842625, "label": "KNOWS", "end_id": 2, "start_id": 1, "properties": {}}::edge
//! ```
//!
//! Encoding is only ever used for the bound parameter payload; values are
//! never spliced into statement text.

use crate::error::{OgmError, OgmResult};
use crate::graph::{EdgeRecord, EntityIdentity, GraphId, PropertyMap, PropertyValue, VertexRecord};
use std::fmt::Write;

/// Characters of input quoted in decode errors
const FRAGMENT_LEN: usize = 32;

/// Encode a value as agtype literal text
pub fn encode(value: &PropertyValue) -> String {
    let mut out = String::new();
    encode_into(value, &mut out);
    out
}

/// Encode a property map as an agtype map literal
pub fn encode_map(map: &PropertyMap) -> String {
    let mut out = String::new();
    encode_map_into(map, &mut out);
    out
}

fn encode_into(value: &PropertyValue, out: &mut String) {
    match value {
        PropertyValue::Null => out.push_str("null"),
        PropertyValue::Boolean(b) => out.push_str(if *b { "true" } else { "false" }),
        PropertyValue::Integer(i) => {
            let _ = write!(out, "{}", i);
        }
        PropertyValue::Float(f) => encode_float(*f, out),
        PropertyValue::String(s) => encode_string(s, out),
        PropertyValue::List(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                encode_into(item, out);
            }
            out.push(']');
        }
        PropertyValue::Map(map) => encode_map_into(map, out),
        PropertyValue::Vertex(v) => {
            let _ = write!(out, "{{\"id\": {}, \"label\": ", v.identity.id);
            encode_string(&v.identity.label, out);
            out.push_str(", \"properties\": ");
            encode_map_into(&v.properties, out);
            out.push_str("}::vertex");
        }
        PropertyValue::Edge(e) => {
            let _ = write!(out, "{{\"id\": {}, \"label\": ", e.identity.id);
            encode_string(&e.identity.label, out);
            let _ = write!(
                out,
                ", \"end_id\": {}, \"start_id\": {}, \"properties\": ",
                e.end_id, e.start_id
            );
            encode_map_into(&e.properties, out);
            out.push_str("}::edge");
        }
    }
}

fn encode_map_into(map: &PropertyMap, out: &mut String) {
    out.push('{');
    for (i, (key, val)) in map.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        encode_string(key, out);
        out.push_str(": ");
        encode_into(val, out);
    }
    out.push('}');
}

fn encode_float(f: f64, out: &mut String) {
    if f.is_nan() {
        out.push_str("NaN");
    } else if f.is_infinite() {
        out.push_str(if f > 0.0 { "Infinity" } else { "-Infinity" });
    } else {
        // Debug keeps a fractional part or exponent, so the literal reads back as a float
        let _ = write!(out, "{:?}", f);
    }
}

fn encode_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

/// Decode agtype literal text into a value
pub fn decode(text: &str) -> OgmResult<PropertyValue> {
    let mut parser = Parser::new(text);
    parser.skip_ws();
    let value = parser.parse_value()?;
    parser.skip_ws();
    if !parser.at_end() {
        return Err(parser.error("unexpected trailing characters"));
    }
    Ok(value)
}

/// Decode a column that must hold a vertex
pub fn decode_vertex(text: &str) -> OgmResult<VertexRecord> {
    match decode(text)? {
        PropertyValue::Vertex(v) => Ok(*v),
        other => Err(shape_error(text, "vertex", &other)),
    }
}

/// Decode a column that must hold an edge
pub fn decode_edge(text: &str) -> OgmResult<EdgeRecord> {
    match decode(text)? {
        PropertyValue::Edge(e) => Ok(*e),
        other => Err(shape_error(text, "edge", &other)),
    }
}

/// Decode a column holding either one edge or the edge list of a
/// variable-length match, in path order
pub fn decode_edges(text: &str) -> OgmResult<Vec<EdgeRecord>> {
    match decode(text)? {
        PropertyValue::Edge(e) => Ok(vec![*e]),
        PropertyValue::List(items) => items
            .into_iter()
            .map(|item| match item {
                PropertyValue::Edge(e) => Ok(*e),
                other => Err(shape_error(text, "edge", &other)),
            })
            .collect(),
        other => Err(shape_error(text, "edge list", &other)),
    }
}

fn shape_error(text: &str, expected: &str, got: &PropertyValue) -> OgmError {
    OgmError::Decode {
        fragment: fragment_at(text, 0),
        reason: format!("expected {}, got {}", expected, got.type_name()),
    }
}

fn fragment_at(text: &str, pos: usize) -> String {
    let start = floor_char_boundary(text, pos);
    text[start..].chars().take(FRAGMENT_LEN).collect()
}

fn floor_char_boundary(text: &str, mut pos: usize) -> usize {
    pos = pos.min(text.len());
    while !text.is_char_boundary(pos) {
        pos -= 1;
    }
    pos
}

/// Deepest list or map nesting accepted from the database
const MAX_DEPTH: usize = 128;

/// Recursive-descent parser over agtype text
struct Parser<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Parser {
            src,
            bytes: src.as_bytes(),
            pos: 0,
            depth: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while let Some(b) = self.peek() {
            if b.is_ascii_whitespace() {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn error(&self, reason: impl Into<String>) -> OgmError {
        self.error_at(self.pos, reason)
    }

    fn error_at(&self, pos: usize, reason: impl Into<String>) -> OgmError {
        OgmError::Decode {
            fragment: fragment_at(self.src, pos),
            reason: reason.into(),
        }
    }

    fn expect(&mut self, byte: u8) -> OgmResult<()> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(format!("expected `{}`", byte as char)))
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.src[self.pos..].starts_with(keyword) {
            self.pos += keyword.len();
            true
        } else {
            false
        }
    }

    fn parse_value(&mut self) -> OgmResult<PropertyValue> {
        let start = self.pos;
        let value = match self.peek() {
            None => return Err(self.error("unexpected end of input")),
            Some(b'{') => self.nested(Self::parse_map)?,
            Some(b'[') => self.nested(Self::parse_list)?,
            Some(b'"') => PropertyValue::String(self.parse_string()?),
            Some(b't') if self.eat_keyword("true") => PropertyValue::Boolean(true),
            Some(b'f') if self.eat_keyword("false") => PropertyValue::Boolean(false),
            Some(b'n') if self.eat_keyword("null") => PropertyValue::Null,
            Some(b'N') if self.eat_keyword("NaN") => PropertyValue::Float(f64::NAN),
            Some(b'I') if self.eat_keyword("Infinity") => PropertyValue::Float(f64::INFINITY),
            Some(b'-') if self.eat_keyword("-Infinity") => PropertyValue::Float(f64::NEG_INFINITY),
            Some(b) if b == b'-' || b.is_ascii_digit() => self.parse_number()?,
            Some(_) => return Err(self.error("unrecognized literal")),
        };
        self.parse_annotation(start, value)
    }

    fn nested(&mut self, parse: fn(&mut Self) -> OgmResult<PropertyValue>) -> OgmResult<PropertyValue> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error(format!("nesting deeper than {} levels", MAX_DEPTH)));
        }
        self.depth += 1;
        let value = parse(self);
        self.depth -= 1;
        value
    }

    fn parse_annotation(&mut self, start: usize, value: PropertyValue) -> OgmResult<PropertyValue> {
        if !self.src[self.pos..].starts_with("::") {
            return Ok(value);
        }
        let annotation_start = self.pos;
        self.pos += 2;
        let name_start = self.pos;
        while let Some(b) = self.peek() {
            if b.is_ascii_alphanumeric() || b == b'_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        let name = &self.src[name_start..self.pos];
        match name {
            "vertex" => self.vertex_from(start, value),
            "edge" => self.edge_from(start, value),
            "path" => match value {
                PropertyValue::List(_) => Ok(value),
                _ => Err(self.error_at(start, "path annotation on a non-list value")),
            },
            "numeric" | "float" | "int" | "integer" => match value {
                PropertyValue::Integer(_) | PropertyValue::Float(_) => Ok(value),
                _ => Err(self.error_at(start, format!("{} annotation on a non-numeric value", name))),
            },
            _ => Err(self.error_at(annotation_start, format!("unknown annotation `::{}`", name))),
        }
    }

    fn vertex_from(&self, start: usize, value: PropertyValue) -> OgmResult<PropertyValue> {
        let PropertyValue::Map(mut map) = value else {
            return Err(self.error_at(start, "vertex annotation on a non-map value"));
        };
        let identity = self.take_identity(start, &mut map)?;
        let properties = self.take_properties(start, &mut map)?;
        Ok(VertexRecord::new(identity, properties).into())
    }

    fn edge_from(&self, start: usize, value: PropertyValue) -> OgmResult<PropertyValue> {
        let PropertyValue::Map(mut map) = value else {
            return Err(self.error_at(start, "edge annotation on a non-map value"));
        };
        let identity = self.take_identity(start, &mut map)?;
        let start_id = self.take_id(start, &mut map, "start_id")?;
        let end_id = self.take_id(start, &mut map, "end_id")?;
        let properties = self.take_properties(start, &mut map)?;
        Ok(EdgeRecord::new(identity, start_id, end_id, properties).into())
    }

    fn take_identity(&self, start: usize, map: &mut PropertyMap) -> OgmResult<EntityIdentity> {
        let id = self.take_id(start, map, "id")?;
        match map.shift_remove("label") {
            Some(PropertyValue::String(label)) => Ok(EntityIdentity::new(label, id)),
            _ => Err(self.error_at(start, "entity is missing a string `label`")),
        }
    }

    fn take_id(&self, start: usize, map: &mut PropertyMap, key: &str) -> OgmResult<GraphId> {
        match map.shift_remove(key) {
            Some(PropertyValue::Integer(id)) => Ok(GraphId(id)),
            _ => Err(self.error_at(start, format!("entity is missing an integer `{}`", key))),
        }
    }

    fn take_properties(&self, start: usize, map: &mut PropertyMap) -> OgmResult<PropertyMap> {
        match map.shift_remove("properties") {
            Some(PropertyValue::Map(props)) => Ok(props),
            None => Ok(PropertyMap::new()),
            Some(_) => Err(self.error_at(start, "entity `properties` is not a map")),
        }
    }

    fn parse_map(&mut self) -> OgmResult<PropertyValue> {
        self.expect(b'{')?;
        let mut map = PropertyMap::new();
        self.skip_ws();
        if self.peek() == Some(b'}') {
            self.pos += 1;
            return Ok(PropertyValue::Map(map));
        }
        loop {
            self.skip_ws();
            if self.peek() != Some(b'"') {
                return Err(self.error("map keys must be strings"));
            }
            let key = self.parse_string()?;
            self.skip_ws();
            self.expect(b':')?;
            self.skip_ws();
            let value = self.parse_value()?;
            map.insert(key, value);
            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b'}') => {
                    self.pos += 1;
                    return Ok(PropertyValue::Map(map));
                }
                _ => return Err(self.error("expected `,` or `}` in map")),
            }
        }
    }

    fn parse_list(&mut self) -> OgmResult<PropertyValue> {
        self.expect(b'[')?;
        let mut items = Vec::new();
        self.skip_ws();
        if self.peek() == Some(b']') {
            self.pos += 1;
            return Ok(PropertyValue::List(items));
        }
        loop {
            self.skip_ws();
            items.push(self.parse_value()?);
            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b']') => {
                    self.pos += 1;
                    return Ok(PropertyValue::List(items));
                }
                _ => return Err(self.error("expected `,` or `]` in list")),
            }
        }
    }

    fn parse_string(&mut self) -> OgmResult<String> {
        let start = self.pos;
        self.expect(b'"')?;
        let mut out = String::new();
        loop {
            let rest = &self.src[self.pos..];
            let Some(c) = rest.chars().next() else {
                return Err(self.error_at(start, "unterminated string"));
            };
            self.pos += c.len_utf8();
            match c {
                '"' => return Ok(out),
                '\\' => out.push(self.parse_escape()?),
                c => out.push(c),
            }
        }
    }

    fn parse_escape(&mut self) -> OgmResult<char> {
        let escape_start = self.pos - 1;
        let Some(b) = self.peek() else {
            return Err(self.error_at(escape_start, "unterminated escape"));
        };
        self.pos += 1;
        Ok(match b {
            b'"' => '"',
            b'\\' => '\\',
            b'/' => '/',
            b'b' => '\u{8}',
            b'f' => '\u{c}',
            b'n' => '\n',
            b'r' => '\r',
            b't' => '\t',
            b'u' => {
                let high = self.parse_hex4(escape_start)?;
                if (0xD800..0xDC00).contains(&high) {
                    if !self.src[self.pos..].starts_with("\\u") {
                        return Err(self.error_at(escape_start, "unpaired surrogate"));
                    }
                    self.pos += 2;
                    let low = self.parse_hex4(escape_start)?;
                    if !(0xDC00..0xE000).contains(&low) {
                        return Err(self.error_at(escape_start, "invalid low surrogate"));
                    }
                    let code = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
                    char::from_u32(code).ok_or_else(|| self.error_at(escape_start, "invalid code point"))?
                } else {
                    char::from_u32(high).ok_or_else(|| self.error_at(escape_start, "invalid code point"))?
                }
            }
            _ => return Err(self.error_at(escape_start, "invalid escape")),
        })
    }

    fn parse_hex4(&mut self, escape_start: usize) -> OgmResult<u32> {
        let digits = self
            .src
            .get(self.pos..self.pos + 4)
            .ok_or_else(|| self.error_at(escape_start, "truncated unicode escape"))?;
        let code = u32::from_str_radix(digits, 16)
            .map_err(|_| self.error_at(escape_start, "invalid unicode escape"))?;
        self.pos += 4;
        Ok(code)
    }

    fn parse_number(&mut self) -> OgmResult<PropertyValue> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        let mut is_float = false;
        while let Some(b) = self.peek() {
            match b {
                b'0'..=b'9' => {}
                b'.' | b'e' | b'E' => is_float = true,
                b'+' | b'-' if is_float => {}
                _ => break,
            }
            self.pos += 1;
        }
        let text = &self.src[start..self.pos];
        if is_float {
            text.parse::<f64>()
                .map(PropertyValue::Float)
                .map_err(|e| self.error_at(start, format!("invalid float: {}", e)))
        } else {
            text.parse::<i64>()
                .map(PropertyValue::Integer)
                .map_err(|e| self.error_at(start, format!("invalid integer: {}", e)))
        }
    }
}
