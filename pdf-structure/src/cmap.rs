use crate::objects;
use crate::parse::{Dict, ParseError};

/// A `/ToUnicode` character map: ordered `(src_lo, src_hi, dst_base)`
/// ranges collected from `bfchar`/`bfrange` blocks. A code `c` inside a
/// range maps to `dst_base + (c - src_lo)`.
///
/// Lookup is a linear scan, first match wins; fonts carry tens of entries
/// at most, so no index is built.
#[derive(Debug)]
pub struct CMap {
    mappings: Vec<(u32, u32, u32)>,
}

impl CMap {
    pub(crate) fn new(dict: &Dict, body: &[u8]) -> Result<CMap, ParseError> {
        let payload = objects::stream_payload(body)?;
        let text = objects::decode_stream(dict, payload)?;
        Ok(CMap {
            mappings: parse_mappings(&text)?,
        })
    }

    /// Translate one character code to a Unicode scalar.
    pub fn map_char(&self, code: u32) -> Result<char, ParseError> {
        for &(lo, hi, dst) in &self.mappings {
            if lo <= code && code <= hi {
                let scalar = dst + (code - lo);
                return char::from_u32(scalar).ok_or_else(|| {
                    ParseError::DecodeError(format!("code {:#06x} maps outside Unicode", code))
                });
            }
        }
        Err(ParseError::DecodeError(format!(
            "no CMap range covers code {:#06x}",
            code
        )))
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn from_mappings(mappings: Vec<(u32, u32, u32)>) -> CMap {
        CMap { mappings }
    }
}

/// Scan inflated CMap text for `bfchar`/`bfrange` blocks.
///
/// `bfchar` lines carry two hex tokens (`<src> <dst>`), recorded as a
/// one-code range; `bfrange` lines carry three (`<lo> <hi> <dst>`).
/// Lines without a hex token inside a block (comments, `endcmap`
/// scaffolding) are skipped.
fn parse_mappings(text: &[u8]) -> Result<Vec<(u32, u32, u32)>, ParseError> {
    let text = String::from_utf8_lossy(text);
    let mut mappings = Vec::new();
    let mut in_char = false;
    let mut in_range = false;

    for line in text.lines() {
        let line = line.trim();
        if line.ends_with("beginbfchar") {
            in_char = true;
        } else if line.ends_with("endbfchar") {
            in_char = false;
        } else if line.ends_with("beginbfrange") {
            in_range = true;
        } else if line.ends_with("endbfrange") {
            in_range = false;
        } else if in_char && line.contains('<') {
            let (src, rest) = hex_token(line)?;
            let (dst, _) = hex_token(rest)?;
            mappings.push((src, src, dst));
        } else if in_range && line.contains('<') {
            let (lo, rest) = hex_token(line)?;
            let (hi, rest) = hex_token(rest)?;
            let (dst, _) = hex_token(rest)?;
            mappings.push((lo, hi, dst));
        }
    }

    Ok(mappings)
}

/// Read the next `<hex>` token from a CMap line.
fn hex_token(line: &str) -> Result<(u32, &str), ParseError> {
    let open = line
        .find('<')
        .ok_or_else(|| ParseError::DecodeError("CMap entry missing hex token".to_string()))?;
    let rest = &line[open + 1..];
    let close = rest
        .find('>')
        .ok_or_else(|| ParseError::DecodeError("unterminated CMap hex token".to_string()))?;
    let value = u32::from_str_radix(rest[..close].trim(), 16)
        .map_err(|e| ParseError::DecodeError(format!("bad CMap hex token: {}", e)))?;
    Ok((value, &rest[close + 1..]))
}
