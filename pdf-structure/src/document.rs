use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::content::ContentStream;
use crate::fonts::{Font, FontMap};
use crate::objects::{self, LoadHint, Object};
use crate::parse::{self, Dict, ParseError};
use crate::structure::StructTreeRoot;
use crate::xref::{self, XrefMaps};

// ── Document ──────────────────────────────────────────────────────────────────

/// A parsed Tagged PDF document.
///
/// Owns the input bytes, the cross-reference maps, and the object cache.
/// Everything reachable from the catalog is resolved eagerly during
/// [`Document::open`], depth first, so errors anywhere on the traversal
/// path surface there.
#[derive(Debug)]
pub struct Document {
    data: Vec<u8>,
    xref: XrefMaps,
    /// Monotonic: once an object number is constructed, every later
    /// lookup returns the same instance.
    cache: RefCell<HashMap<u32, Object>>,
    catalog: Option<Rc<Catalog>>,
    info: Option<Rc<Info>>,
}

impl Document {
    /// Parse a complete PDF from raw bytes.
    pub fn open(data: Vec<u8>) -> Result<Document, ParseError> {
        let mut data = data;
        while data.last().map_or(false, |b| b.is_ascii_whitespace()) {
            data.pop();
        }

        let start = find_startxref(&data)?;
        let mut maps = XrefMaps::new();
        let trailer = xref::read_chain(&data, start, &mut maps)?;

        let mut doc = Document {
            data,
            xref: maps,
            cache: RefCell::new(HashMap::new()),
            catalog: None,
            info: None,
        };

        let root = trailer.require("Root")?.as_reference()?;
        let catalog = doc.get_object(root)?.into_catalog()?;
        doc.catalog = Some(catalog);
        if let Some(value) = trailer.get("Info") {
            let info = doc
                .get_object_as(value.as_reference()?, Some(&LoadHint::Info))?
                .into_info()?;
            doc.info = Some(info);
        }

        Ok(doc)
    }

    /// The document catalog. Present on every document `open` returns.
    pub fn catalog(&self) -> &Rc<Catalog> {
        self.catalog
            .as_ref()
            .expect("catalog is resolved during open")
    }

    /// The information dictionary, when the trailer names one.
    pub fn info(&self) -> Option<&Rc<Info>> {
        self.info.as_ref()
    }

    /// The root of the structure tree, or `None` for a well-formed but
    /// untagged document.
    pub fn get_structure_tree(&self) -> Option<Rc<StructTreeRoot>> {
        self.catalog.as_ref()?.struct_tree_root.clone()
    }

    /// Resolve an object by number: cache, then direct offsets, then
    /// object-stream membership.
    pub fn get_object(&self, number: u32) -> Result<Object, ParseError> {
        self.get_object_as(number, None)
    }

    /// Resolve an object with a construction hint for objects that omit
    /// `/Type` or need context (content streams, CMaps, `/Info`,
    /// structure elements inheriting a page).
    pub fn get_object_as(
        &self,
        number: u32,
        hint: Option<&LoadHint>,
    ) -> Result<Object, ParseError> {
        if let Some(object) = self.cache.borrow().get(&number) {
            return Ok(object.clone());
        }

        let object = if let Some(&offset) = self.xref.offsets.get(&number) {
            self.load_at(offset, hint)?
        } else if let Some(&container) = self.xref.compressed.get(&number) {
            let stream = self.get_object(container)?.into_objstm()?;
            stream.load_member(self, number, hint)?
        } else {
            return Err(ParseError::UnknownObject(number));
        };

        self.cache.borrow_mut().insert(number, object.clone());
        Ok(object)
    }

    /// Load the object whose `obj ... endobj` body sits at `offset`.
    fn load_at(&self, offset: usize, hint: Option<&LoadHint>) -> Result<Object, ParseError> {
        if offset >= self.data.len() {
            return Err(ParseError::MalformedHeader);
        }
        let slice = &self.data[offset..];
        let start = parse::find(slice, b"obj").ok_or(ParseError::MalformedHeader)? + 3;
        let end = parse::find(slice, b"endobj").ok_or(ParseError::MalformedHeader)?;
        if end < start {
            return Err(ParseError::MalformedHeader);
        }
        objects::load_object(self, parse::skip_ascii_whitespace(&slice[start..end]), hint)
    }
}

/// Locate the cross-reference start offset from the file tail: the last
/// line is `%%EOF`, the penultimate line is the decimal offset written
/// after `startxref`.
fn find_startxref(data: &[u8]) -> Result<usize, ParseError> {
    let last = parse::rfind(data, b"\n").ok_or(ParseError::MalformedHeader)?;
    let prev = parse::rfind(&data[..last], b"\n").ok_or(ParseError::MalformedHeader)?;
    let line = std::str::from_utf8(&data[prev + 1..last]).map_err(|_| ParseError::MalformedHeader)?;
    let offset: usize = line.trim().parse().map_err(|_| ParseError::MalformedHeader)?;
    if offset >= data.len() {
        return Err(ParseError::MalformedHeader);
    }
    Ok(offset)
}

// ── Catalog, pages, info ──────────────────────────────────────────────────────

/// The document root: the page tree, plus the structure tree when the
/// document is tagged.
#[derive(Debug)]
pub struct Catalog {
    pub pages: Rc<Pages>,
    pub struct_tree_root: Option<Rc<StructTreeRoot>>,
}

impl Catalog {
    pub(crate) fn new(doc: &Document, dict: &Dict) -> Result<Self, ParseError> {
        let pages = doc
            .get_object(dict.require("Pages")?.as_reference()?)?
            .into_pages()?;
        let struct_tree_root = match dict.get("StructTreeRoot") {
            Some(value) => Some(
                doc.get_object(value.as_reference()?)?
                    .into_struct_tree_root()?,
            ),
            None => None,
        };
        Ok(Catalog {
            pages,
            struct_tree_root,
        })
    }
}

/// The page tree, flattened into its declared order.
#[derive(Debug)]
pub struct Pages {
    pub count: u32,
    pub pages: Vec<Rc<Page>>,
}

impl Pages {
    pub(crate) fn new(doc: &Document, dict: &Dict) -> Result<Self, ParseError> {
        let count = dict.require_int("Count")? as u32;
        let mut pages = Vec::new();
        for kid in dict.require_array("Kids")? {
            match kid {
                parse::ArrayItem::Ref(num) => {
                    pages.push(doc.get_object(*num)?.into_page()?);
                }
                _ => return Err(ParseError::MalformedArray),
            }
        }
        Ok(Pages { count, pages })
    }
}

/// One page: its font resources and decoded content stream.
#[derive(Debug)]
pub struct Page {
    pub fonts: FontMap,
    pub contents: Rc<ContentStream>,
}

impl Page {
    /// Fonts are loaded before `/Contents` so the content-stream decoder
    /// can resolve `Tf` operands through this page's table.
    pub(crate) fn new(doc: &Document, dict: &Dict) -> Result<Self, ParseError> {
        let mut fonts = FontMap::new();
        if let Some(font_dict) = dict
            .get_dict("Resources")
            .and_then(|resources| resources.get_dict("Font"))
        {
            for (name, value) in font_dict.iter() {
                let font: Rc<Font> = doc.get_object(value.as_reference()?)?.into_font()?;
                fonts.insert(name.clone(), font);
            }
        }

        let contents_ref = dict.require("Contents")?.as_reference()?;
        let contents = doc
            .get_object_as(contents_ref, Some(&LoadHint::Content(&fonts)))?
            .into_content()?;

        Ok(Page { fonts, contents })
    }
}

/// The document information dictionary. Every field is optional; absent
/// keys stay `None`.
#[derive(Debug)]
pub struct Info {
    pub author: Option<String>,
    pub creator: Option<String>,
    pub creation_date: Option<String>,
    pub mod_date: Option<String>,
    pub producer: Option<String>,
}

impl Info {
    pub(crate) fn new(dict: &Dict) -> Info {
        let field = |key: &str| dict.get_token(key).map(str::to_string);
        Info {
            author: field("Author"),
            creator: field("Creator"),
            creation_date: field("CreationDate"),
            mod_date: field("ModDate"),
            producer: field("Producer"),
        }
    }
}
