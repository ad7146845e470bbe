use std::collections::HashMap;
use std::rc::Rc;

use crate::cmap::CMap;
use crate::document::Document;
use crate::objects::LoadHint;
use crate::parse::{Dict, ParseError};

/// Fonts a page binds by resource name (`F1`, `F2`, ...).
pub type FontMap = HashMap<String, Rc<Font>>;

/// A font resource. Only the `/ToUnicode` CMap matters for text
/// extraction; fonts without one can still show literal-string text.
#[derive(Debug)]
pub struct Font {
    pub to_unicode: Option<Rc<CMap>>,
}

impl Font {
    pub(crate) fn new(doc: &Document, dict: &Dict) -> Result<Font, ParseError> {
        let to_unicode = match dict.get("ToUnicode") {
            // ToUnicode streams rarely declare a /Type; force CMap.
            Some(value) => Some(
                doc.get_object_as(value.as_reference()?, Some(&LoadHint::CMap))?
                    .into_cmap()?,
            ),
            None => None,
        };
        Ok(Font { to_unicode })
    }
}
