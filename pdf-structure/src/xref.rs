use std::collections::{HashMap, HashSet};

use crate::objects;
use crate::parse::{self, ArrayItem, Dict, ParseError};

/// The two cross-reference maps: direct byte offsets, and membership in
/// object streams (object number of the containing `/ObjStm`).
///
/// An object number lives in at most one map. Sections are processed
/// newest first, so insertion never overwrites an existing entry; that is
/// what gives incremental updates their precedence.
#[derive(Debug, Default)]
pub struct XrefMaps {
    pub offsets: HashMap<u32, usize>,
    pub compressed: HashMap<u32, u32>,
}

impl XrefMaps {
    pub fn new() -> Self {
        XrefMaps::default()
    }

    fn known(&self, id: u32) -> bool {
        self.offsets.contains_key(&id) || self.compressed.contains_key(&id)
    }

    fn insert_offset(&mut self, id: u32, offset: usize) {
        if !self.known(id) {
            self.offsets.insert(id, offset);
        }
    }

    fn insert_compressed(&mut self, id: u32, container: u32) {
        if !self.known(id) {
            self.compressed.insert(id, container);
        }
    }
}

// ── Section chain ─────────────────────────────────────────────────────────────

/// Read the cross-reference section at `start` and every older section it
/// chains to via `/Prev`, plus any hybrid `/XRefStm` streams along the
/// way. Returns the newest trailer dictionary (the one carrying `/Root`).
pub(crate) fn read_chain(
    data: &[u8],
    start: usize,
    maps: &mut XrefMaps,
) -> Result<Dict, ParseError> {
    let mut seen = HashSet::new();
    let mut newest: Option<Dict> = None;
    let mut next = Some(start);

    while let Some(offset) = next {
        // A repeated offset would loop forever; treat it as end of chain.
        if !seen.insert(offset) {
            break;
        }
        let trailer = read_section(data, offset, maps)?;
        if let Some(stm) = trailer.get_int("XRefStm") {
            let stm = stm as usize;
            if seen.insert(stm) {
                read_stream_section(data, stm, maps)?;
            }
        }
        next = trailer.get_int("Prev").map(|p| p as usize);
        if newest.is_none() {
            newest = Some(trailer);
        }
    }

    newest.ok_or(ParseError::MalformedHeader)
}

/// Read one section, auto-detecting the legacy table form (the `xref`
/// keyword) versus a cross-reference stream.
fn read_section(data: &[u8], offset: usize, maps: &mut XrefMaps) -> Result<Dict, ParseError> {
    if offset >= data.len() {
        return Err(ParseError::MalformedHeader);
    }
    if data[offset..].starts_with(b"xref") {
        read_table_section(data, offset, maps)
    } else {
        read_stream_section(data, offset, maps)
    }
}

// ── Legacy tables ─────────────────────────────────────────────────────────────

/// Parse a legacy `xref` table and the trailer dictionary that follows it.
///
/// Each subsection has a `first count` header line followed by `count`
/// fixed 20-byte records (`{offset:010} {gen:05} {n|f}` plus line ending).
/// Only `n` records are indexed; subsections repeat until `trailer`.
fn read_table_section(
    data: &[u8],
    offset: usize,
    maps: &mut XrefMaps,
) -> Result<Dict, ParseError> {
    const ENTRY_SIZE: usize = 20;

    let mut cur = parse::skip_ascii_whitespace(&data[offset + 4..]);
    loop {
        cur = parse::skip_ascii_whitespace(cur);
        if cur.starts_with(b"trailer") {
            cur = &cur[7..];
            break;
        }
        if cur.is_empty() {
            return Err(ParseError::MalformedHeader);
        }

        let (first, rest) = parse::next_token(cur).ok_or(ParseError::MalformedHeader)?;
        let first: u32 = first.parse().map_err(|_| ParseError::MalformedHeader)?;
        let (count, rest) = parse::next_token(rest).ok_or(ParseError::MalformedHeader)?;
        let count: usize = count.parse().map_err(|_| ParseError::MalformedHeader)?;

        let entries = skip_line(rest);
        if entries.len() < count * ENTRY_SIZE {
            return Err(ParseError::MalformedHeader);
        }
        for i in 0..count {
            let entry = &entries[i * ENTRY_SIZE..(i + 1) * ENTRY_SIZE];
            // Status byte: 'n' in use, 'f' free.
            if entry[17] != b'n' {
                continue;
            }
            let loc = std::str::from_utf8(&entry[..10])
                .ok()
                .and_then(|s| s.trim().parse::<usize>().ok())
                .ok_or(ParseError::MalformedHeader)?;
            let id = first + i as u32;
            if id > 0 {
                maps.insert_offset(id, loc);
            }
        }
        cur = &entries[count * ENTRY_SIZE..];
    }

    let (trailer, _) = parse::parse_dict(cur)?;
    Ok(trailer)
}

/// Skip to the start of the next line (past `\n` or `\r\n`).
fn skip_line(data: &[u8]) -> &[u8] {
    match data.iter().position(|&b| b == b'\n') {
        Some(pos) => &data[pos + 1..],
        None => &data[data.len()..],
    }
}

// ── Cross-reference streams ───────────────────────────────────────────────────

/// Parse a cross-reference stream object at `offset`.
///
/// The inflated payload is a packed run of `sum(/W)`-byte records, each
/// field big-endian. Field one selects the kind: 0 free (skipped), 1
/// direct (field two is a byte offset), 2 compressed (field two is the
/// object number of the containing object stream). `/Index` supplies
/// `first count` pairs, defaulting to `[0 /Size]`. The stream dictionary
/// doubles as the trailer.
fn read_stream_section(
    data: &[u8],
    offset: usize,
    maps: &mut XrefMaps,
) -> Result<Dict, ParseError> {
    if offset >= data.len() {
        return Err(ParseError::MalformedHeader);
    }
    let slice = &data[offset..];
    let body_start = parse::find(slice, b"obj").ok_or(ParseError::MalformedHeader)? + 3;
    let (dict, consumed) = parse::parse_dict(&slice[body_start..])?;
    let body = &slice[body_start + consumed..];
    let payload = objects::stream_payload(body)?;
    let records = objects::decode_stream(&dict, payload)?;

    let widths = dict.require_array("W")?;
    let widths: Vec<usize> = widths
        .iter()
        .map(|w| match w {
            ArrayItem::Int(n) if *n >= 0 => Ok(*n as usize),
            _ => Err(ParseError::MalformedHeader),
        })
        .collect::<Result<_, _>>()?;
    if widths.len() != 3 {
        return Err(ParseError::MalformedHeader);
    }
    let (w_type, w_loc, w_gen) = (widths[0], widths[1], widths[2]);
    let record_size = w_type + w_loc + w_gen;
    if record_size == 0 {
        return Err(ParseError::MalformedHeader);
    }

    let index = match dict.get_array("Index") {
        Some(items) => items
            .chunks(2)
            .map(|pair| match pair {
                [ArrayItem::Int(first), ArrayItem::Int(count)] if *first >= 0 && *count >= 0 => {
                    Ok((*first as u32, *count as usize))
                }
                _ => Err(ParseError::MalformedHeader),
            })
            .collect::<Result<Vec<_>, _>>()?,
        None => {
            let size = dict.require_int("Size")?;
            vec![(0u32, size as usize)]
        }
    };

    let mut cursor = &records[..];
    for (first, count) in index {
        for i in 0..count {
            if cursor.len() < record_size {
                return Err(ParseError::MalformedHeader);
            }
            let kind = be_value(&cursor[..w_type]);
            let loc = be_value(&cursor[w_type..w_type + w_loc]);
            cursor = &cursor[record_size..];

            let id = first + i as u32;
            match kind {
                1 => maps.insert_offset(id, loc as usize),
                2 => maps.insert_compressed(id, loc as u32),
                // 0 is a free entry; other kinds are ignored.
                _ => {}
            }
        }
    }

    Ok(dict)
}

/// Big-endian unsigned integer from a field of `bytes.len()` bytes.
/// A zero-width field yields 0.
fn be_value(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
}
