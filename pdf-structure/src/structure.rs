use std::rc::Rc;

use crate::content::MarkedContent;
use crate::document::{Document, Page};
use crate::objects::{LoadHint, Object};
use crate::parse::{self, ArrayItem, Dict, ParseError, Value};

/// Root of the structure tree. Kids keep the `/K` array order.
#[derive(Debug)]
pub struct StructTreeRoot {
    pub kids: Vec<Rc<StructElem>>,
}

/// One structure element: a semantic tag (`P`, `Sect`, `H1`, ...), the
/// page its marked content lives on, and its children in declared order.
#[derive(Debug)]
pub struct StructElem {
    pub subtype: String,
    pub page: Option<Rc<Page>>,
    pub kids: Vec<StructKid>,
}

/// A resolved child of a structure element.
#[derive(Debug, Clone)]
pub enum StructKid {
    Elem(Rc<StructElem>),
    Content(Rc<MarkedContent>),
}

/// A `/K` entry before resolution: a page-local MCID or an indirect
/// reference to a child element.
#[derive(Debug)]
enum Kid {
    Mcid(u32),
    Ref(u32),
}

/// Normalize `/K`, which may be a single integer, a single reference, or
/// an array mixing both. A missing `/K` is an empty kid list.
fn normalize_kids(dict: &Dict) -> Result<Vec<Kid>, ParseError> {
    let value = match dict.get("K") {
        Some(v) => v,
        None => return Ok(Vec::new()),
    };
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                ArrayItem::Int(n) if *n >= 0 => Ok(Kid::Mcid(*n as u32)),
                ArrayItem::Ref(num) => Ok(Kid::Ref(*num)),
                _ => Err(ParseError::MalformedArray),
            })
            .collect(),
        Value::Token(token) => {
            if let Ok(n) = token.parse::<u32>() {
                Ok(vec![Kid::Mcid(n)])
            } else {
                Ok(vec![Kid::Ref(parse::parse_reference(token)?.number)])
            }
        }
        Value::Dict(_) => Err(ParseError::MalformedDict),
    }
}

impl StructTreeRoot {
    pub(crate) fn new(doc: &Document, dict: &Dict) -> Result<Self, ParseError> {
        let mut kids = Vec::new();
        for kid in normalize_kids(dict)? {
            match kid {
                Kid::Ref(num) => {
                    match doc.get_object_as(num, Some(&LoadHint::Elem(None)))? {
                        Object::StructElem(elem) => kids.push(elem),
                        Object::Ignored => {}
                        other => {
                            return Err(ParseError::UnknownType(other.type_name().to_string()))
                        }
                    }
                }
                // MCIDs are page-local; the root has no page to resolve
                // them against.
                Kid::Mcid(_) => return Err(ParseError::MalformedDict),
            }
        }
        Ok(StructTreeRoot { kids })
    }
}

impl StructElem {
    /// Build an element, resolving integer kids against the owning page's
    /// content stream. The owning page is the element's own `/Pg` or,
    /// failing that, `inherited` from the nearest enclosing element.
    pub(crate) fn new(
        doc: &Document,
        dict: &Dict,
        inherited: Option<Rc<Page>>,
    ) -> Result<Self, ParseError> {
        let subtype = dict.require_name("S")?.to_string();
        let page = match dict.get("Pg") {
            Some(value) => Some(doc.get_object(value.as_reference()?)?.into_page()?),
            None => inherited,
        };

        let mut kids = Vec::new();
        for kid in normalize_kids(dict)? {
            match kid {
                Kid::Mcid(id) => {
                    let page = page.as_ref().ok_or(ParseError::MissingMCID(id))?;
                    kids.push(StructKid::Content(page.contents.marked_content(id)?));
                }
                Kid::Ref(num) => {
                    match doc.get_object_as(num, Some(&LoadHint::Elem(page.clone())))? {
                        Object::StructElem(elem) => kids.push(StructKid::Elem(elem)),
                        Object::Ignored => {}
                        other => {
                            return Err(ParseError::UnknownType(other.type_name().to_string()))
                        }
                    }
                }
            }
        }

        Ok(StructElem {
            subtype,
            page,
            kids,
        })
    }
}
