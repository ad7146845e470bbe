use std::collections::HashMap;
use std::rc::Rc;

use crate::fonts::{Font, FontMap};
use crate::objects;
use crate::parse::{self, Dict, ParseError};

/// One marked-content region's decoded Unicode text. These are the leaves
/// of the structure tree.
#[derive(Debug)]
pub struct MarkedContent {
    pub text: String,
}

/// A page's content stream: the inflated operator bytes and the text of
/// every marked-content region, keyed by MCID.
#[derive(Debug)]
pub struct ContentStream {
    pub data: Vec<u8>,
    pub marked: HashMap<u32, Rc<MarkedContent>>,
}

impl ContentStream {
    pub(crate) fn new(dict: &Dict, body: &[u8], fonts: &FontMap) -> Result<Self, ParseError> {
        let payload = objects::stream_payload(body)?;
        let data = objects::decode_stream(dict, payload)?;
        let marked = decode_marked_regions(&data, fonts)?;
        Ok(ContentStream { data, marked })
    }

    /// Look up a marked-content region by MCID.
    pub fn marked_content(&self, id: u32) -> Result<Rc<MarkedContent>, ParseError> {
        self.marked
            .get(&id)
            .cloned()
            .ok_or(ParseError::MissingMCID(id))
    }
}

// ── Region segmentation ───────────────────────────────────────────────────────

const REGION_HEADER: &[u8] = b"<</MCID";

/// Slice the stream into marked-content regions and decode each.
///
/// A region opens with a `<</MCID ...>>` property dictionary (the `BDC`
/// operand) and runs to the last `EMC` before the next header; regions do
/// not nest in the subset this core walks.
fn decode_marked_regions(
    data: &[u8],
    fonts: &FontMap,
) -> Result<HashMap<u32, Rc<MarkedContent>>, ParseError> {
    let mut marked = HashMap::new();
    let mut offset = 0;

    while let Some(pos) = parse::find(&data[offset..], REGION_HEADER) {
        let start = offset + pos;
        let (props, _) = parse::parse_dict(&data[start..])?;
        let id = props.require_int("MCID")? as u32;

        let next = parse::find(&data[start + REGION_HEADER.len()..], REGION_HEADER)
            .map(|p| start + REGION_HEADER.len() + p)
            .unwrap_or(data.len());
        let end = parse::rfind(&data[start..next], b"EMC")
            .map(|p| start + p)
            .unwrap_or(next);

        let text = decode_region(&data[start..end], fonts)?;
        marked.insert(id, Rc::new(MarkedContent { text }));
        offset = end.max(start + REGION_HEADER.len());
    }

    Ok(marked)
}

/// Decode the text-showing operators of one region.
///
/// The only state carried between lines is the current font, selected by
/// `Tf`. Text comes from `TJ` operands; `Tj`, `'` and `"` are not
/// handled (common tagged-PDF producers emit `TJ`).
fn decode_region(region: &[u8], fonts: &FontMap) -> Result<String, ParseError> {
    let mut text = String::new();
    let mut current: Option<&Rc<Font>> = None;

    for line in region.split(|&b| b == b'\n') {
        let line = trim_bytes(line);
        if line.len() < 2 {
            continue;
        }
        if line.ends_with(b"Tf") {
            let (token, _) = parse::next_token(line).ok_or(ParseError::MalformedDict)?;
            let name = token.trim_start_matches('/');
            current = Some(fonts.get(name).ok_or_else(|| {
                ParseError::DecodeError(format!("font {} not in page resources", name))
            })?);
        } else if line.ends_with(b"TJ") {
            decode_tj(&line[..line.len() - 2], current, &mut text)?;
        }
    }

    Ok(text)
}

/// Walk a `TJ` operand (a bracketed array) character by character.
///
/// Outside any string, kerning numbers and whitespace are skipped.
/// Literal `(...)` bytes are emitted directly, with `\` passing the next
/// byte through verbatim. Hex `<...>` digits accumulate four at a time
/// into 16-bit codes translated through the current font's CMap; bytes
/// that are not hex digits (spacing inside the string) are skipped, and a
/// short trailing group is dropped when the string closes.
fn decode_tj(operand: &[u8], font: Option<&Rc<Font>>, out: &mut String) -> Result<(), ParseError> {
    let mut in_literal = false;
    let mut in_hex = false;
    let mut escape = false;
    let mut acc: u32 = 0;
    let mut digits = 0u8;

    for &b in operand {
        if in_literal {
            if escape {
                out.push(b as char);
                escape = false;
            } else if b == b'\\' {
                escape = true;
            } else if b == b')' {
                in_literal = false;
            } else {
                out.push(b as char);
            }
        } else if in_hex {
            if b == b'>' {
                in_hex = false;
                acc = 0;
                digits = 0;
            } else if let Some(d) = (b as char).to_digit(16) {
                acc = (acc << 4) | d;
                digits += 1;
                if digits == 4 {
                    let font = font.ok_or_else(|| {
                        ParseError::DecodeError("hex string with no font selected".to_string())
                    })?;
                    let cmap = font.to_unicode.as_ref().ok_or_else(|| {
                        ParseError::DecodeError("current font has no ToUnicode CMap".to_string())
                    })?;
                    out.push(cmap.map_char(acc)?);
                    acc = 0;
                    digits = 0;
                }
            }
        } else if b == b'(' {
            in_literal = true;
        } else if b == b'<' {
            in_hex = true;
        }
        // Everything else outside a string is kerning or spacing.
    }

    Ok(())
}

fn trim_bytes(line: &[u8]) -> &[u8] {
    let start = line
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(line.len());
    let end = line
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map(|p| p + 1)
        .unwrap_or(line.len());
    &line[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmap::CMap;

    fn fonts_with_cmap(name: &str, mappings: Vec<(u32, u32, u32)>) -> FontMap {
        let mut fonts = FontMap::new();
        fonts.insert(
            name.to_string(),
            Rc::new(Font {
                to_unicode: Some(Rc::new(CMap::from_mappings(mappings))),
            }),
        );
        fonts
    }

    #[test]
    fn literal_text() {
        let ops = b"/P <</MCID 0>> BDC\nBT\n/F1 12 Tf\n[(Hello)] TJ\nET\nEMC\n";
        let marked = decode_marked_regions(ops, &fonts_with_cmap("F1", vec![])).unwrap();
        assert_eq!(marked[&0].text, "Hello");
    }

    #[test]
    fn kerning_numbers_ignored() {
        let ops = b"/P <</MCID 0>> BDC\n/F1 12 Tf\n[(He) -24 (llo) 108.5] TJ\nEMC\n";
        let marked = decode_marked_regions(ops, &fonts_with_cmap("F1", vec![])).unwrap();
        assert_eq!(marked[&0].text, "Hello");
    }

    #[test]
    fn escaped_bytes_pass_through() {
        let ops = b"/P <</MCID 0>> BDC\n/F1 12 Tf\n[(a\\(b\\)c)] TJ\nEMC\n";
        let marked = decode_marked_regions(ops, &fonts_with_cmap("F1", vec![])).unwrap();
        assert_eq!(marked[&0].text, "a(b)c");
    }

    #[test]
    fn hex_codes_translate_through_cmap() {
        let fonts = fonts_with_cmap("F1", vec![(1, 2, 0x41)]);
        let ops = b"/P <</MCID 0>> BDC\n/F1 9 Tf\n[<0001 0002>] TJ\nEMC\n";
        let marked = decode_marked_regions(ops, &fonts).unwrap();
        assert_eq!(marked[&0].text, "AB");
    }

    #[test]
    fn mixed_literal_and_hex() {
        let fonts = fonts_with_cmap("F1", vec![(0x41, 0x41, 0x58)]);
        let ops = b"/P <</MCID 0>> BDC\n/F1 9 Tf\n[(Hi) <0041>] TJ\nEMC\n";
        let marked = decode_marked_regions(ops, &fonts).unwrap();
        assert_eq!(marked[&0].text, "HiX");
    }

    #[test]
    fn hex_with_no_font_is_decode_error() {
        let ops = b"/P <</MCID 0>> BDC\n[<0041>] TJ\nEMC\n";
        assert!(matches!(
            decode_marked_regions(ops, &FontMap::new()),
            Err(ParseError::DecodeError(_))
        ));
    }

    #[test]
    fn unknown_font_name_is_decode_error() {
        let ops = b"/P <</MCID 0>> BDC\n/F9 12 Tf\n[(x)] TJ\nEMC\n";
        assert!(matches!(
            decode_marked_regions(ops, &FontMap::new()),
            Err(ParseError::DecodeError(_))
        ));
    }

    #[test]
    fn multiple_regions_keyed_by_mcid() {
        let ops = b"/P <</MCID 0>> BDC\n/F1 12 Tf\n[(one)] TJ\nEMC\n\
            /P <</MCID 1>> BDC\n/F1 12 Tf\n[(two)] TJ\nEMC\n";
        let marked = decode_marked_regions(ops, &fonts_with_cmap("F1", vec![])).unwrap();
        assert_eq!(marked.len(), 2);
        assert_eq!(marked[&0].text, "one");
        assert_eq!(marked[&1].text, "two");
    }

    #[test]
    fn text_after_emc_is_not_captured() {
        let ops = b"/P <</MCID 0>> BDC\n/F1 12 Tf\n[(in)] TJ\nEMC\n/F1 12 Tf\n[(out)] TJ\n";
        let marked = decode_marked_regions(ops, &fonts_with_cmap("F1", vec![])).unwrap();
        assert_eq!(marked[&0].text, "in");
    }

    #[test]
    fn font_switch_mid_region() {
        let mut fonts = fonts_with_cmap("F1", vec![(1, 1, 0x41)]);
        fonts.insert(
            "F2".to_string(),
            Rc::new(Font {
                to_unicode: Some(Rc::new(CMap::from_mappings(vec![(1, 1, 0x5A)]))),
            }),
        );
        let ops = b"/P <</MCID 0>> BDC\n/F1 9 Tf\n[<0001>] TJ\n/F2 9 Tf\n[<0001>] TJ\nEMC\n";
        let marked = decode_marked_regions(ops, &fonts).unwrap();
        assert_eq!(marked[&0].text, "AZ");
    }
}
