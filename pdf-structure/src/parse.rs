use std::collections::HashMap;

use crate::objects::ObjectRef;

// ── Error type ────────────────────────────────────────────────────────────────

/// Errors that can occur while parsing a PDF document.
#[derive(Debug, PartialEq)]
pub enum ParseError {
    /// The startxref/trailer/xref framing is missing or an offset is out of range.
    MalformedHeader,
    /// A dictionary could not be parsed (`>>` missing, bad key, bad value).
    MalformedDict,
    /// An array could not be parsed or holds a token the core does not handle.
    MalformedArray,
    /// A token expected to be an indirect reference (`N G R`) is not one.
    NotAReference,
    /// A stream declares a filter other than `/FlateDecode`.
    UnsupportedFilter(String),
    /// An object declares a `/Type` the core does not handle on the
    /// traversal path.
    UnknownType(String),
    /// A reference could not be resolved in any cross-reference source.
    UnknownObject(u32),
    /// A structure element references an MCID absent from its page's
    /// content stream.
    MissingMCID(u32),
    /// Deflate failure, CMap range miss, or an undecodable character code.
    DecodeError(String),
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::MalformedHeader => write!(f, "malformed header or xref framing"),
            ParseError::MalformedDict => write!(f, "malformed dictionary"),
            ParseError::MalformedArray => write!(f, "malformed array"),
            ParseError::NotAReference => write!(f, "not an indirect reference"),
            ParseError::UnsupportedFilter(name) => {
                write!(f, "unsupported stream filter: {}", name)
            }
            ParseError::UnknownType(name) => write!(f, "unknown object type: {}", name),
            ParseError::UnknownObject(id) => write!(f, "cannot resolve object {}", id),
            ParseError::MissingMCID(id) => write!(f, "no marked content with MCID {}", id),
            ParseError::DecodeError(msg) => write!(f, "decode error: {}", msg),
        }
    }
}

impl std::error::Error for ParseError {}

// ── Parsed values ─────────────────────────────────────────────────────────────

/// A dictionary value: nested dictionary, array, or a raw textual token.
///
/// Tokens keep their source spelling: names include the leading `/`,
/// indirect references stay `"12 0 R"`, numbers stay as written. Literal
/// and hex strings are stored as their inner text.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Dict(Dict),
    Array(Vec<ArrayItem>),
    Token(String),
}

/// One classified array element.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayItem {
    /// Indirect reference, reduced to its object number.
    Ref(u32),
    /// Name, stored without the leading `/`.
    Name(String),
    /// Hex string, stored without the angle brackets.
    Hex(String),
    Int(i64),
    Real(f64),
}

/// A parsed PDF dictionary. Keys are stored without the leading `/`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dict {
    entries: HashMap<String, Value>,
}

impl Value {
    pub fn as_token(&self) -> Option<&str> {
        match self {
            Value::Token(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        self.as_token()?.parse().ok()
    }

    /// Name token without its leading `/`.
    pub fn as_name(&self) -> Option<&str> {
        self.as_token()?.strip_prefix('/')
    }

    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            Value::Dict(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[ArrayItem]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Coerce an `N G R` token to its object number.
    pub fn as_reference(&self) -> Result<u32, ParseError> {
        let token = self.as_token().ok_or(ParseError::NotAReference)?;
        Ok(parse_reference(token)?.number)
    }
}

impl Dict {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn require(&self, key: &str) -> Result<&Value, ParseError> {
        self.entries.get(key).ok_or(ParseError::MalformedDict)
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key)?.as_int()
    }

    pub fn get_name(&self, key: &str) -> Option<&str> {
        self.get(key)?.as_name()
    }

    pub fn get_token(&self, key: &str) -> Option<&str> {
        self.get(key)?.as_token()
    }

    pub fn get_dict(&self, key: &str) -> Option<&Dict> {
        self.get(key)?.as_dict()
    }

    pub fn get_array(&self, key: &str) -> Option<&[ArrayItem]> {
        self.get(key)?.as_array()
    }

    pub fn require_int(&self, key: &str) -> Result<i64, ParseError> {
        self.require(key)?.as_int().ok_or(ParseError::MalformedDict)
    }

    pub fn require_name(&self, key: &str) -> Result<&str, ParseError> {
        self.require(key)?.as_name().ok_or(ParseError::MalformedDict)
    }

    pub fn require_array(&self, key: &str) -> Result<&[ArrayItem], ParseError> {
        self.require(key)?
            .as_array()
            .ok_or(ParseError::MalformedDict)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }
}

// ── Dictionary parser ─────────────────────────────────────────────────────────

/// Parse a `<< ... >>` prefix of `data`.
///
/// Returns the dictionary and the number of bytes consumed, so callers can
/// keep reading the object body (stream data) that follows. Keys terminate
/// at the first non-alphanumeric byte; interleaved whitespace and `\r\n`
/// line endings are skipped throughout.
pub fn parse_dict(data: &[u8]) -> Result<(Dict, usize), ParseError> {
    let total = data.len();
    let mut cur = skip_ascii_whitespace(data);
    if !cur.starts_with(b"<<") {
        return Err(ParseError::MalformedDict);
    }
    cur = &cur[2..];

    let mut entries = HashMap::new();
    loop {
        cur = skip_ascii_whitespace(cur);
        if cur.starts_with(b">>") {
            cur = &cur[2..];
            break;
        }
        if cur.is_empty() || cur[0] != b'/' {
            return Err(ParseError::MalformedDict);
        }
        let end = cur[1..]
            .iter()
            .position(|b| !b.is_ascii_alphanumeric())
            .unwrap_or(cur.len() - 1);
        if end == 0 {
            return Err(ParseError::MalformedDict);
        }
        let key = std::str::from_utf8(&cur[1..1 + end])
            .map_err(|_| ParseError::MalformedDict)?
            .to_string();
        cur = skip_ascii_whitespace(&cur[1 + end..]);

        let (value, rest) = parse_value(cur)?;
        entries.insert(key, value);
        cur = rest;
    }

    Ok((Dict { entries }, total - cur.len()))
}

/// Parse one dictionary value starting at `data`, returning the remainder.
fn parse_value(data: &[u8]) -> Result<(Value, &[u8]), ParseError> {
    if data.starts_with(b"<<") {
        let (dict, consumed) = parse_dict(data)?;
        return Ok((Value::Dict(dict), &data[consumed..]));
    }
    if data.starts_with(b"[") {
        let (items, consumed) = parse_array(data)?;
        return Ok((Value::Array(items), &data[consumed..]));
    }
    if data.starts_with(b"(") {
        let (text, rest) = take_literal_string(data)?;
        return Ok((Value::Token(text), rest));
    }
    if data.starts_with(b"<") {
        // Single angle bracket: hex string.
        let close = data
            .iter()
            .position(|&b| b == b'>')
            .ok_or(ParseError::MalformedDict)?;
        let text = std::str::from_utf8(&data[1..close])
            .map_err(|_| ParseError::MalformedDict)?
            .trim()
            .to_string();
        return Ok((Value::Token(text), &data[close + 1..]));
    }
    if data.starts_with(b"/") {
        let end = 1 + data[1..]
            .iter()
            .position(|&b| is_delimiter(b))
            .unwrap_or(data.len() - 1);
        let name = std::str::from_utf8(&data[..end]).map_err(|_| ParseError::MalformedDict)?;
        return Ok((Value::Token(name.to_string()), &data[end..]));
    }

    // Raw token: everything up to the next delimiter. This keeps indirect
    // references ("12 0 R") in one piece.
    let end = data
        .iter()
        .position(|&b| matches!(b, b'/' | b'<' | b'>' | b'[' | b'('))
        .unwrap_or(data.len());
    let token = std::str::from_utf8(&data[..end])
        .map_err(|_| ParseError::MalformedDict)?
        .trim()
        .to_string();
    if token.is_empty() {
        return Err(ParseError::MalformedDict);
    }
    Ok((Value::Token(token), &data[end..]))
}

/// Consume a `(...)` literal string (backslash escapes, nested parens).
/// Returns the inner text with escapes collapsed and the remaining bytes.
fn take_literal_string(data: &[u8]) -> Result<(String, &[u8]), ParseError> {
    let mut text = String::new();
    let mut depth = 1usize;
    let mut i = 1;
    while i < data.len() {
        match data[i] {
            b'\\' => {
                if let Some(&next) = data.get(i + 1) {
                    text.push(next as char);
                }
                i += 2;
            }
            b'(' => {
                depth += 1;
                text.push('(');
                i += 1;
            }
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok((text, &data[i + 1..]));
                }
                text.push(')');
                i += 1;
            }
            b => {
                text.push(b as char);
                i += 1;
            }
        }
    }
    Err(ParseError::MalformedDict)
}

// ── Array parser ──────────────────────────────────────────────────────────────

/// Parse a `[ ... ]` prefix of `data` up to the next `]`.
///
/// Items are tokenized and classified one by one (references, names, hex
/// strings, integers, reals) rather than guessed per-array, so `/K` arrays
/// mixing integers with references come out exact.
pub fn parse_array(data: &[u8]) -> Result<(Vec<ArrayItem>, usize), ParseError> {
    let total = data.len();
    let cur = skip_ascii_whitespace(data);
    if !cur.starts_with(b"[") {
        return Err(ParseError::MalformedArray);
    }
    let close = cur
        .iter()
        .position(|&b| b == b']')
        .ok_or(ParseError::MalformedArray)?;
    let consumed = (total - cur.len()) + close + 1;
    let mut body = &cur[1..close];

    let mut items = Vec::new();
    loop {
        body = skip_ascii_whitespace(body);
        if body.is_empty() {
            break;
        }
        match body[0] {
            b'/' => {
                let end = 1 + body[1..]
                    .iter()
                    .position(|&b| is_delimiter(b))
                    .unwrap_or(body.len() - 1);
                let name = std::str::from_utf8(&body[1..end])
                    .map_err(|_| ParseError::MalformedArray)?;
                items.push(ArrayItem::Name(name.to_string()));
                body = &body[end..];
            }
            b'<' => {
                let end = body
                    .iter()
                    .position(|&b| b == b'>')
                    .ok_or(ParseError::MalformedArray)?;
                let hex = std::str::from_utf8(&body[1..end])
                    .map_err(|_| ParseError::MalformedArray)?;
                items.push(ArrayItem::Hex(hex.trim().to_string()));
                body = &body[end + 1..];
            }
            _ => {
                let (token, rest) = next_token(body).ok_or(ParseError::MalformedArray)?;
                // A digit run may open an "N G R" reference.
                if token.bytes().all(|b| b.is_ascii_digit()) {
                    if let Some((num, after)) = take_reference_tail(token, rest) {
                        items.push(ArrayItem::Ref(num));
                        body = after;
                        continue;
                    }
                }
                if let Ok(n) = token.parse::<i64>() {
                    items.push(ArrayItem::Int(n));
                } else if let Ok(r) = token.parse::<f64>() {
                    items.push(ArrayItem::Real(r));
                } else {
                    return Err(ParseError::MalformedArray);
                }
                body = rest;
            }
        }
    }

    Ok((items, consumed))
}

/// If `rest` continues `first` as `"<gen> R"`, consume it and return the
/// object number with the remaining bytes.
fn take_reference_tail<'a>(first: &str, rest: &'a [u8]) -> Option<(u32, &'a [u8])> {
    let (gen, after_gen) = next_token(rest)?;
    if !gen.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let (keyword, after) = next_token(after_gen)?;
    if keyword != "R" {
        return None;
    }
    Some((first.parse().ok()?, after))
}

// ── Reference coercion ────────────────────────────────────────────────────────

/// Parse an indirect reference token of the form `"12 0 R"`.
pub fn parse_reference(token: &str) -> Result<ObjectRef, ParseError> {
    let mut parts = token.split_ascii_whitespace();
    let number = parts
        .next()
        .and_then(|p| p.parse::<u32>().ok())
        .ok_or(ParseError::NotAReference)?;
    let generation = parts
        .next()
        .and_then(|p| p.parse::<u16>().ok())
        .ok_or(ParseError::NotAReference)?;
    match (parts.next(), parts.next()) {
        (Some("R"), None) => Ok(ObjectRef { number, generation }),
        _ => Err(ParseError::NotAReference),
    }
}

// ── Byte utilities ────────────────────────────────────────────────────────────

/// Return a sub-slice starting at the first non-whitespace byte.
pub(crate) fn skip_ascii_whitespace(data: &[u8]) -> &[u8] {
    let pos = data
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(data.len());
    &data[pos..]
}

/// Read the next whitespace-delimited token.
/// Returns `(token, remaining_bytes)` or `None` at end of input.
pub(crate) fn next_token(data: &[u8]) -> Option<(&str, &[u8])> {
    let data = skip_ascii_whitespace(data);
    if data.is_empty() {
        return None;
    }
    let end = data
        .iter()
        .position(|&b| b.is_ascii_whitespace() || is_delimiter(b))
        .unwrap_or(data.len());
    let end = end.max(1);
    let token = std::str::from_utf8(&data[..end]).ok()?;
    Some((token, &data[end..]))
}

/// Byte offset of the first occurrence of `needle` in `haystack`.
pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Byte offset of the last occurrence of `needle` in `haystack`.
pub(crate) fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).rposition(|w| w == needle)
}

fn is_delimiter(b: u8) -> bool {
    b.is_ascii_whitespace() || matches!(b, b'/' | b'<' | b'>' | b'[' | b']' | b'(' | b')')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dict_simple_entries() {
        let (dict, _) = parse_dict(b"<</Type /Catalog /Count 2>>").unwrap();
        assert_eq!(dict.get_name("Type"), Some("Catalog"));
        assert_eq!(dict.get_int("Count"), Some(2));
    }

    #[test]
    fn dict_reports_consumed_bytes() {
        let data = b"<</A 1>>stream";
        let (_, consumed) = parse_dict(data).unwrap();
        assert_eq!(&data[consumed..], b"stream");
    }

    #[test]
    fn dict_indirect_reference_value() {
        let (dict, _) = parse_dict(b"<</Pages 2 0 R/Count 1>>").unwrap();
        assert_eq!(dict.require("Pages").unwrap().as_reference().unwrap(), 2);
        assert_eq!(dict.get_int("Count"), Some(1));
    }

    #[test]
    fn dict_nested() {
        let (dict, _) =
            parse_dict(b"<</Resources <</Font <</F1 5 0 R>>>> /Contents 4 0 R>>").unwrap();
        let fonts = dict
            .get_dict("Resources")
            .and_then(|r| r.get_dict("Font"))
            .unwrap();
        assert_eq!(fonts.require("F1").unwrap().as_reference().unwrap(), 5);
    }

    #[test]
    fn dict_array_value() {
        let (dict, _) = parse_dict(b"<</Kids [3 0 R 6 0 R] /Count 2>>").unwrap();
        let kids = dict.get_array("Kids").unwrap();
        assert_eq!(kids, &[ArrayItem::Ref(3), ArrayItem::Ref(6)]);
    }

    #[test]
    fn dict_literal_string_value() {
        let (dict, _) = parse_dict(b"<</Author (Jamie \\(Wood\\))/T (x)>>").unwrap();
        assert_eq!(dict.get_token("Author"), Some("Jamie (Wood)"));
    }

    #[test]
    fn dict_crlf_and_whitespace_tolerant() {
        let (dict, _) = parse_dict(b"<<\r\n/Type\r\n/Page\r\n/Count   3\r\n>>").unwrap();
        assert_eq!(dict.get_name("Type"), Some("Page"));
        assert_eq!(dict.get_int("Count"), Some(3));
    }

    #[test]
    fn dict_unterminated_is_malformed() {
        assert_eq!(
            parse_dict(b"<</Type /Catalog").unwrap_err(),
            ParseError::MalformedDict
        );
    }

    #[test]
    fn dict_not_a_dict_is_malformed() {
        assert_eq!(parse_dict(b"[1 2 3]").unwrap_err(), ParseError::MalformedDict);
    }

    #[test]
    fn array_of_references() {
        let (items, _) = parse_array(b"[3 0 R 8 0 R 12 0 R]").unwrap();
        assert_eq!(
            items,
            vec![ArrayItem::Ref(3), ArrayItem::Ref(8), ArrayItem::Ref(12)]
        );
    }

    #[test]
    fn array_of_names() {
        let (items, _) = parse_array(b"[/PDF /Text]").unwrap();
        assert_eq!(
            items,
            vec![
                ArrayItem::Name("PDF".to_string()),
                ArrayItem::Name("Text".to_string())
            ]
        );
    }

    #[test]
    fn array_of_hex_strings() {
        let (items, _) = parse_array(b"[<AB12> <ff00>]").unwrap();
        assert_eq!(
            items,
            vec![
                ArrayItem::Hex("AB12".to_string()),
                ArrayItem::Hex("ff00".to_string())
            ]
        );
    }

    #[test]
    fn array_of_integers_and_reals() {
        let (items, _) = parse_array(b"[0 0 612 792.5]").unwrap();
        assert_eq!(
            items,
            vec![
                ArrayItem::Int(0),
                ArrayItem::Int(0),
                ArrayItem::Int(612),
                ArrayItem::Real(792.5)
            ]
        );
    }

    #[test]
    fn array_mixing_integers_and_references() {
        let (items, _) = parse_array(b"[0 9 0 R 1]").unwrap();
        assert_eq!(
            items,
            vec![ArrayItem::Int(0), ArrayItem::Ref(9), ArrayItem::Int(1)]
        );
    }

    #[test]
    fn array_consumed_stops_after_bracket() {
        let data = b"[1 2] /Next";
        let (_, consumed) = parse_array(data).unwrap();
        assert_eq!(&data[consumed..], b" /Next");
    }

    #[test]
    fn array_unterminated_is_malformed() {
        assert_eq!(parse_array(b"[1 2 3").unwrap_err(), ParseError::MalformedArray);
    }

    #[test]
    fn reference_round_trip() {
        let r = parse_reference("12 0 R").unwrap();
        assert_eq!(r.number, 12);
        assert_eq!(r.generation, 0);
    }

    #[test]
    fn reference_rejects_non_references() {
        assert_eq!(parse_reference("12").unwrap_err(), ParseError::NotAReference);
        assert_eq!(parse_reference("12 0 X").unwrap_err(), ParseError::NotAReference);
        assert_eq!(
            parse_reference("foo bar R").unwrap_err(),
            ParseError::NotAReference
        );
    }

    #[test]
    fn reference_tolerates_line_endings() {
        assert_eq!(parse_reference(" 7 0 R\r\n").unwrap().number, 7);
    }
}
