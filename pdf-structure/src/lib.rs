pub mod cmap;
pub mod content;
pub mod document;
pub mod fonts;
pub mod objects;
pub mod parse;
pub mod structure;
pub mod xref;

pub use cmap::CMap;
pub use content::{ContentStream, MarkedContent};
pub use document::{Catalog, Document, Info, Page, Pages};
pub use fonts::{Font, FontMap};
pub use objects::{LoadHint, Object, ObjectRef, ObjectStream};
pub use parse::{ArrayItem, Dict, ParseError, Value};
pub use structure::{StructElem, StructKid, StructTreeRoot};
