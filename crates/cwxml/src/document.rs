//! Whole-document reading and writing.

use xmltree::{Element, EmitterConfig};

use crate::error::{XmlError, XmlResult};

/// Parse a document and return its root element.
///
/// # Errors
///
/// Returns [`XmlError::MalformedXml`] if the input is not well-formed.
pub fn parse_document(bytes: &[u8]) -> XmlResult<Element> {
    Element::parse(bytes).map_err(|e| XmlError::MalformedXml {
        detail: e.to_string(),
    })
}

/// Serialise `root` as an indented UTF-8 document with an XML declaration.
///
/// # Errors
///
/// Returns [`XmlError::Write`] if the emitter rejects the tree.
pub fn write_document(root: &Element) -> XmlResult<Vec<u8>> {
    let config = EmitterConfig::new()
        .perform_indent(true)
        .indent_string("  ");
    let mut out = Vec::new();
    root.write_with_config(&mut out, config)
        .map_err(|e| XmlError::Write {
            detail: e.to_string(),
        })?;
    out.push(b'\n');
    Ok(out)
}
