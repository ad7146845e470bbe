use std::collections::HashMap;
use std::io::Read;
use std::rc::Rc;

use flate2::read::ZlibDecoder;

use crate::cmap::CMap;
use crate::content::ContentStream;
use crate::document::{Catalog, Document, Info, Page, Pages};
use crate::fonts::{Font, FontMap};
use crate::parse::{self, ArrayItem, Dict, ParseError, Value};
use crate::structure::{StructElem, StructTreeRoot};

/// Object identifier: (object number, generation number).
/// Lookup uses only the number; the generation is parsed and discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    pub number: u32,
    pub generation: u16,
}

/// A loaded PDF object. Variants wrap their node in `Rc` so the document
/// cache and the structure tree can share instances; cloning is cheap.
#[derive(Debug, Clone)]
pub enum Object {
    Catalog(Rc<Catalog>),
    Pages(Rc<Pages>),
    Page(Rc<Page>),
    Font(Rc<Font>),
    CMap(Rc<CMap>),
    Content(Rc<ContentStream>),
    StructTreeRoot(Rc<StructTreeRoot>),
    StructElem(Rc<StructElem>),
    ObjStm(Rc<ObjectStream>),
    Info(Rc<Info>),
    /// `/OBJR` elements; callers drop the slot.
    Ignored,
}

/// Construction context for objects that omit `/Type`, or that need state
/// from the enclosing traversal. Passed down the call chain so the
/// document carries no mutable current-page state.
#[derive(Clone)]
pub enum LoadHint<'a> {
    /// The object is a page content stream; fonts resolve through the
    /// enclosing page's table.
    Content(&'a FontMap),
    /// The object is a `/ToUnicode` CMap.
    CMap,
    /// The object is the document information dictionary.
    Info,
    /// The object is a structure element; carries the nearest enclosing
    /// page for MCID resolution.
    Elem(Option<Rc<Page>>),
}

impl Object {
    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Catalog(_) => "Catalog",
            Object::Pages(_) => "Pages",
            Object::Page(_) => "Page",
            Object::Font(_) => "Font",
            Object::CMap(_) => "CMap",
            Object::Content(_) => "ContentStream",
            Object::StructTreeRoot(_) => "StructTreeRoot",
            Object::StructElem(_) => "StructElem",
            Object::ObjStm(_) => "ObjStm",
            Object::Info(_) => "Info",
            Object::Ignored => "OBJR",
        }
    }

    pub fn into_catalog(self) -> Result<Rc<Catalog>, ParseError> {
        match self {
            Object::Catalog(c) => Ok(c),
            other => Err(ParseError::UnknownType(other.type_name().to_string())),
        }
    }

    pub fn into_pages(self) -> Result<Rc<Pages>, ParseError> {
        match self {
            Object::Pages(p) => Ok(p),
            other => Err(ParseError::UnknownType(other.type_name().to_string())),
        }
    }

    pub fn into_page(self) -> Result<Rc<Page>, ParseError> {
        match self {
            Object::Page(p) => Ok(p),
            other => Err(ParseError::UnknownType(other.type_name().to_string())),
        }
    }

    pub fn into_font(self) -> Result<Rc<Font>, ParseError> {
        match self {
            Object::Font(f) => Ok(f),
            other => Err(ParseError::UnknownType(other.type_name().to_string())),
        }
    }

    pub fn into_cmap(self) -> Result<Rc<CMap>, ParseError> {
        match self {
            Object::CMap(c) => Ok(c),
            other => Err(ParseError::UnknownType(other.type_name().to_string())),
        }
    }

    pub fn into_content(self) -> Result<Rc<ContentStream>, ParseError> {
        match self {
            Object::Content(c) => Ok(c),
            other => Err(ParseError::UnknownType(other.type_name().to_string())),
        }
    }

    pub fn into_struct_tree_root(self) -> Result<Rc<StructTreeRoot>, ParseError> {
        match self {
            Object::StructTreeRoot(r) => Ok(r),
            other => Err(ParseError::UnknownType(other.type_name().to_string())),
        }
    }

    pub fn into_objstm(self) -> Result<Rc<ObjectStream>, ParseError> {
        match self {
            Object::ObjStm(s) => Ok(s),
            other => Err(ParseError::UnknownType(other.type_name().to_string())),
        }
    }

    pub fn into_info(self) -> Result<Rc<Info>, ParseError> {
        match self {
            Object::Info(i) => Ok(i),
            other => Err(ParseError::UnknownType(other.type_name().to_string())),
        }
    }
}

// ── Loader and dispatch ───────────────────────────────────────────────────────

/// Load one object from its body (the bytes between `obj` and `endobj`, or
/// an object-stream member slice). Dispatches on the declared `/Type`, or
/// on the hint for objects that do not declare one.
pub(crate) fn load_object(
    doc: &Document,
    body: &[u8],
    hint: Option<&LoadHint>,
) -> Result<Object, ParseError> {
    let (dict, consumed) = parse::parse_dict(body)?;
    let rest = parse::skip_ascii_whitespace(&body[consumed..]);

    match dict.get_name("Type") {
        Some("ObjStm") => Ok(Object::ObjStm(Rc::new(ObjectStream::new(&dict, rest)?))),
        Some("Catalog") => Ok(Object::Catalog(Rc::new(Catalog::new(doc, &dict)?))),
        Some("Pages") => Ok(Object::Pages(Rc::new(Pages::new(doc, &dict)?))),
        Some("Page") => Ok(Object::Page(Rc::new(Page::new(doc, &dict)?))),
        Some("Font") => Ok(Object::Font(Rc::new(Font::new(doc, &dict)?))),
        Some("CMap") => Ok(Object::CMap(Rc::new(CMap::new(&dict, rest)?))),
        Some("StructTreeRoot") => Ok(Object::StructTreeRoot(Rc::new(StructTreeRoot::new(
            doc, &dict,
        )?))),
        Some("StructElem") => {
            let page = match hint {
                Some(LoadHint::Elem(page)) => page.clone(),
                _ => None,
            };
            Ok(Object::StructElem(Rc::new(StructElem::new(
                doc, &dict, page,
            )?)))
        }
        Some("Info") => Ok(Object::Info(Rc::new(Info::new(&dict)))),
        Some("OBJR") => Ok(Object::Ignored),
        Some(other) => Err(ParseError::UnknownType(other.to_string())),
        None => match hint {
            Some(LoadHint::Content(fonts)) => Ok(Object::Content(Rc::new(ContentStream::new(
                &dict, rest, fonts,
            )?))),
            Some(LoadHint::CMap) => Ok(Object::CMap(Rc::new(CMap::new(&dict, rest)?))),
            Some(LoadHint::Info) => Ok(Object::Info(Rc::new(Info::new(&dict)))),
            _ => Err(ParseError::UnknownType("(none)".to_string())),
        },
    }
}

// ── Object streams ────────────────────────────────────────────────────────────

/// An `/ObjStm` container: several objects packed into one compressed
/// stream. The header before `/First` is a run of `id offset` pairs; each
/// offset is relative to `/First`.
#[derive(Debug)]
pub struct ObjectStream {
    index: HashMap<u32, usize>,
    data: Vec<u8>,
}

impl ObjectStream {
    pub(crate) fn new(dict: &Dict, body: &[u8]) -> Result<Self, ParseError> {
        let payload = stream_payload(body)?;
        let data = decode_stream(dict, payload)?;
        let first = dict.require_int("First")? as usize;
        if first > data.len() {
            return Err(ParseError::MalformedDict);
        }

        let header =
            std::str::from_utf8(&data[..first]).map_err(|_| ParseError::MalformedDict)?;
        let mut tokens = header.split_ascii_whitespace();
        let mut index = HashMap::new();
        while let (Some(id), Some(offset)) = (tokens.next(), tokens.next()) {
            let id: u32 = id.parse().map_err(|_| ParseError::MalformedDict)?;
            let offset: usize = offset.parse().map_err(|_| ParseError::MalformedDict)?;
            index.insert(id, first + offset);
        }

        Ok(ObjectStream { index, data })
    }

    /// Number of objects indexed by this stream.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Load a member object by its object number.
    pub(crate) fn load_member(
        &self,
        doc: &Document,
        id: u32,
        hint: Option<&LoadHint>,
    ) -> Result<Object, ParseError> {
        let &offset = self.index.get(&id).ok_or(ParseError::UnknownObject(id))?;
        if offset > self.data.len() {
            return Err(ParseError::UnknownObject(id));
        }
        load_object(doc, &self.data[offset..], hint)
    }
}

// ── Stream payloads ───────────────────────────────────────────────────────────

/// Slice the raw payload out of a `stream ... endstream` body, dropping
/// the end-of-line bytes after `stream` and before `endstream` (`\n` or
/// `\r\n` both occur in the wild).
pub(crate) fn stream_payload(body: &[u8]) -> Result<&[u8], ParseError> {
    let mut start = parse::find(body, b"stream").ok_or(ParseError::MalformedDict)? + 6;
    if body.get(start) == Some(&b'\r') {
        start += 1;
    }
    if body.get(start) == Some(&b'\n') {
        start += 1;
    }
    let mut end = parse::rfind(body, b"endstream").ok_or(ParseError::MalformedDict)?;
    if end > start && body[end - 1] == b'\n' {
        end -= 1;
    }
    if end > start && body[end - 1] == b'\r' {
        end -= 1;
    }
    if end < start {
        return Err(ParseError::MalformedDict);
    }
    Ok(&body[start..end])
}

/// Decode a stream payload according to its dictionary's `/Filter`.
/// No filter passes the bytes through; `/FlateDecode` inflates; anything
/// else is unsupported.
pub(crate) fn decode_stream(dict: &Dict, payload: &[u8]) -> Result<Vec<u8>, ParseError> {
    match filter_name(dict)? {
        None => Ok(payload.to_vec()),
        Some("FlateDecode") => {
            let mut out = Vec::new();
            ZlibDecoder::new(payload)
                .read_to_end(&mut out)
                .map_err(|e| ParseError::DecodeError(e.to_string()))?;
            Ok(out)
        }
        Some(other) => Err(ParseError::UnsupportedFilter(other.to_string())),
    }
}

/// The stream's filter name, unwrapping the single-element array form.
fn filter_name(dict: &Dict) -> Result<Option<&str>, ParseError> {
    match dict.get("Filter") {
        None => Ok(None),
        Some(value) => {
            if let Some(name) = value.as_name() {
                return Ok(Some(name));
            }
            if let Value::Array(items) = value {
                if let [ArrayItem::Name(name)] = items.as_slice() {
                    return Ok(Some(name));
                }
            }
            Err(ParseError::UnsupportedFilter("(filter chain)".to_string()))
        }
    }
}
