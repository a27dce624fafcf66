//! Property kinds usable in a [`schema!`](crate::schema) field table.
//!
//! Each kind is a zero-sized marker implementing [`Property`] for the field
//! types it supports. The `tag` argument is the child element name, or the
//! attribute name for the attribute kinds.
//!
//! `read` returns `Ok(None)` when the attribute or child is absent, which
//! leaves the record's own default in place. `Child` is the only kind that
//! treats absence as a schema violation.

use glam::{Mat4, Vec4};
use xmltree::{Element, XMLNode};

use crate::blob::{BlobRow, format_flat, format_rows, parse_flat, parse_rows};
use crate::error::{XmlError, XmlResult};
use crate::flags::Flags;
use crate::record::{Record, XmlElement};
use crate::value::{VectorValue, XmlValue, format_f32};
use crate::{ElementPath, ITEM_TAG, NONE_TYPE};

/// Values per line for flat number lists.
pub const NUMBERS_PER_LINE: usize = 24;

/// Binding between a field type and its on-disk form.
pub trait Property<T> {
    fn read(parent: &Element, tag: &str, path: &ElementPath) -> XmlResult<Option<T>>;
    fn write(parent: &mut Element, tag: &str, value: &T);
}

/// First child element named `tag`.
#[must_use]
pub fn child<'a>(parent: &'a Element, tag: &str) -> Option<&'a Element> {
    parent.get_child(tag)
}

/// Child elements of `parent`, in document order.
pub fn child_elements(parent: &Element) -> impl Iterator<Item = &Element> {
    parent.children.iter().filter_map(XMLNode::as_element)
}

/// Concatenated text content of `element`.
#[must_use]
pub fn text_of(element: &Element) -> String {
    element.get_text().map(|t| t.into_owned()).unwrap_or_default()
}

/// Raw attribute value.
#[must_use]
pub fn attr<'a>(element: &'a Element, name: &str) -> Option<&'a str> {
    element.attributes.get(name).map(String::as_str)
}

/// Parse an attribute; `None` when absent, an error when present but invalid.
pub fn parse_attr<T: XmlValue>(
    element: &Element,
    name: &str,
    path: &ElementPath,
) -> XmlResult<Option<T>> {
    match attr(element, name) {
        None => Ok(None),
        Some(raw) => T::parse_xml(raw).map(Some).ok_or_else(|| {
            XmlError::schema(&path.attribute(name), format!("cannot parse '{raw}'"))
        }),
    }
}

/// Set an attribute, keeping first-insertion order.
pub fn set_attr(element: &mut Element, name: &str, value: String) {
    element.attributes.insert(name.to_string(), value);
}

/// Append a child element.
pub fn push_element(parent: &mut Element, element: Element) {
    parent.children.push(XMLNode::Element(element));
}

/// Append an empty `<tag />` element.
pub fn push_empty(parent: &mut Element, tag: &str) {
    push_element(parent, Element::new(tag));
}

/// Append `<tag>text</tag>`; empty text yields `<tag />`.
pub fn push_text(parent: &mut Element, tag: &str, text: String) {
    let mut element = Element::new(tag);
    if !text.is_empty() {
        element.children.push(XMLNode::Text(text));
    }
    push_element(parent, element);
}

/// Read a vector from the axis attributes of `element`. Missing axes read as zero.
pub fn read_vector<V: VectorValue>(element: &Element, path: &ElementPath) -> XmlResult<V> {
    let mut components = [0.0f32; 4];
    for (slot, axis) in components.iter_mut().zip(V::AXES) {
        if let Some(v) = parse_attr::<f32>(element, axis, path)? {
            *slot = v;
        }
    }
    Ok(V::from_components(&components[..V::AXES.len()]))
}

/// Write a vector into the axis attributes of `element`.
pub fn write_vector<V: VectorValue>(element: &mut Element, value: &V) {
    let components = value.to_components();
    for (axis, v) in V::AXES.iter().zip(components) {
        set_attr(element, axis, format_f32(v));
    }
}

/// Attribute on the record's own element.
pub struct Attr;

impl<T: XmlValue> Property<T> for Attr {
    fn read(parent: &Element, tag: &str, path: &ElementPath) -> XmlResult<Option<T>> {
        parse_attr(parent, tag, path)
    }

    fn write(parent: &mut Element, tag: &str, value: &T) {
        set_attr(parent, tag, value.to_xml());
    }
}

/// Attribute on the record's own element that may be absent.
pub struct OptAttr;

impl<T: XmlValue> Property<Option<T>> for OptAttr {
    fn read(parent: &Element, tag: &str, path: &ElementPath) -> XmlResult<Option<Option<T>>> {
        parse_attr(parent, tag, path).map(Some)
    }

    fn write(parent: &mut Element, tag: &str, value: &Option<T>) {
        if let Some(value) = value {
            set_attr(parent, tag, value.to_xml());
        }
    }
}

/// Vector stored in the axis attributes of the record's own element.
/// The tag is descriptive only.
pub struct AttrVector;

impl<V: VectorValue> Property<V> for AttrVector {
    fn read(parent: &Element, _tag: &str, path: &ElementPath) -> XmlResult<Option<V>> {
        read_vector(parent, path).map(Some)
    }

    fn write(parent: &mut Element, _tag: &str, value: &V) {
        write_vector(parent, value);
    }
}

/// Text content of the record's own element. The tag is descriptive only.
pub struct Content;

impl<T: XmlValue> Property<T> for Content {
    fn read(parent: &Element, _tag: &str, path: &ElementPath) -> XmlResult<Option<T>> {
        let text = text_of(parent);
        T::parse_xml(text.trim())
            .map(Some)
            .ok_or_else(|| XmlError::schema(path, format!("cannot parse '{}'", text.trim())))
    }

    fn write(parent: &mut Element, _tag: &str, value: &T) {
        let text = value.to_xml();
        if !text.is_empty() {
            parent.children.push(XMLNode::Text(text));
        }
    }
}

/// `<tag value="..." />`.
pub struct Value;

impl<T: XmlValue> Property<T> for Value {
    fn read(parent: &Element, tag: &str, path: &ElementPath) -> XmlResult<Option<T>> {
        match child(parent, tag) {
            Some(element) => parse_attr(element, "value", &path.child(tag)),
            None => Ok(None),
        }
    }

    fn write(parent: &mut Element, tag: &str, value: &T) {
        let mut element = Element::new(tag);
        set_attr(&mut element, "value", value.to_xml());
        push_element(parent, element);
    }
}

/// `<tag>text</tag>`.
pub struct Text;

impl<T: XmlValue> Property<T> for Text {
    fn read(parent: &Element, tag: &str, path: &ElementPath) -> XmlResult<Option<T>> {
        let Some(element) = child(parent, tag) else {
            return Ok(None);
        };
        let text = text_of(element);
        T::parse_xml(text.trim()).map(Some).ok_or_else(|| {
            XmlError::schema(&path.child(tag), format!("cannot parse '{}'", text.trim()))
        })
    }

    fn write(parent: &mut Element, tag: &str, value: &T) {
        push_text(parent, tag, value.to_xml());
    }
}

/// `<tag>text</tag>` that may be absent. Empty text also reads as `None`.
pub struct OptText;

impl<T: XmlValue> Property<Option<T>> for OptText {
    fn read(parent: &Element, tag: &str, path: &ElementPath) -> XmlResult<Option<Option<T>>> {
        let Some(element) = child(parent, tag) else {
            return Ok(None);
        };
        let text = text_of(element);
        let text = text.trim();
        if text.is_empty() {
            return Ok(Some(None));
        }
        T::parse_xml(text)
            .map(|v| Some(Some(v)))
            .ok_or_else(|| XmlError::schema(&path.child(tag), format!("cannot parse '{text}'")))
    }

    fn write(parent: &mut Element, tag: &str, value: &Option<T>) {
        if let Some(value) = value {
            push_text(parent, tag, value.to_xml());
        }
    }
}

/// `<tag x=".." y=".." z=".." w=".." />`.
pub struct Vector;

impl<V: VectorValue> Property<V> for Vector {
    fn read(parent: &Element, tag: &str, path: &ElementPath) -> XmlResult<Option<V>> {
        child(parent, tag)
            .map(|element| read_vector(element, &path.child(tag)))
            .transpose()
    }

    fn write(parent: &mut Element, tag: &str, value: &V) {
        let mut element = Element::new(tag);
        write_vector(&mut element, value);
        push_element(parent, element);
    }
}

/// 4x4 matrix as four text rows; row `i` holds glam column `i`.
pub struct Matrix;

impl Property<Mat4> for Matrix {
    fn read(parent: &Element, tag: &str, path: &ElementPath) -> XmlResult<Option<Mat4>> {
        let Some(element) = child(parent, tag) else {
            return Ok(None);
        };
        let path = path.child(tag);
        let rows: Vec<Vec4> = parse_rows(&text_of(element), &path)?;
        if rows.len() != 4 {
            return Err(XmlError::blob(
                &path,
                format!("expected 4 matrix rows, got {}", rows.len()),
            ));
        }
        Ok(Some(Mat4::from_cols(rows[0], rows[1], rows[2], rows[3])))
    }

    fn write(parent: &mut Element, tag: &str, value: &Mat4) {
        let rows = [value.x_axis, value.y_axis, value.z_axis, value.w_axis];
        push_text(parent, tag, format_rows(&rows));
    }
}

/// `<tag>A, B, C</tag>` flag set.
pub struct FlagSet;

impl Property<Flags> for FlagSet {
    fn read(parent: &Element, tag: &str, _path: &ElementPath) -> XmlResult<Option<Flags>> {
        Ok(child(parent, tag).map(|element| Flags::parse(&text_of(element))))
    }

    fn write(parent: &mut Element, tag: &str, value: &Flags) {
        push_text(parent, tag, value.to_string());
    }
}

/// Row blob, one `a, b, c` row per line.
pub struct Rows;

impl<R: BlobRow> Property<Vec<R>> for Rows {
    fn read(parent: &Element, tag: &str, path: &ElementPath) -> XmlResult<Option<Vec<R>>> {
        child(parent, tag)
            .map(|element| parse_rows(&text_of(element), &path.child(tag)))
            .transpose()
    }

    fn write(parent: &mut Element, tag: &str, value: &Vec<R>) {
        push_text(parent, tag, format_rows(value));
    }
}

/// Flat, space separated number list wrapped at [`NUMBERS_PER_LINE`].
pub struct Numbers;

impl<T: XmlValue> Property<Vec<T>> for Numbers {
    fn read(parent: &Element, tag: &str, path: &ElementPath) -> XmlResult<Option<Vec<T>>> {
        child(parent, tag)
            .map(|element| parse_flat(&text_of(element), &path.child(tag)))
            .transpose()
    }

    fn write(parent: &mut Element, tag: &str, value: &Vec<T>) {
        push_text(parent, tag, format_flat(value, NUMBERS_PER_LINE));
    }
}

/// Inline `1, 2, 3` list. Omitted when empty.
pub struct CommaList;

impl<T: XmlValue> Property<Vec<T>> for CommaList {
    fn read(parent: &Element, tag: &str, path: &ElementPath) -> XmlResult<Option<Vec<T>>> {
        <Numbers as Property<Vec<T>>>::read(parent, tag, path)
    }

    fn write(parent: &mut Element, tag: &str, value: &Vec<T>) {
        if value.is_empty() {
            return;
        }
        let parts: Vec<String> = value.iter().map(XmlValue::to_xml).collect();
        push_text(parent, tag, parts.join(", "));
    }
}

/// Required nested record.
pub struct Child;

impl<T: XmlElement> Property<T> for Child {
    fn read(parent: &Element, tag: &str, path: &ElementPath) -> XmlResult<Option<T>> {
        let element = child(parent, tag)
            .ok_or_else(|| XmlError::schema(path, format!("missing required child <{tag}>")))?;
        T::from_element(element, &path.child(tag)).map(Some)
    }

    fn write(parent: &mut Element, tag: &str, value: &T) {
        if let Some(element) = value.to_element(tag) {
            push_element(parent, element);
        }
    }
}

/// Nested record that keeps its default when absent. Always emitted.
pub struct Nested;

impl<T: XmlElement> Property<T> for Nested {
    fn read(parent: &Element, tag: &str, path: &ElementPath) -> XmlResult<Option<T>> {
        child(parent, tag)
            .map(|element| T::from_element(element, &path.child(tag)))
            .transpose()
    }

    fn write(parent: &mut Element, tag: &str, value: &T) {
        if let Some(element) = value.to_element(tag) {
            push_element(parent, element);
        }
    }
}

/// Optional nested record.
pub struct OptChild;

impl<T: XmlElement> Property<Option<T>> for OptChild {
    fn read(parent: &Element, tag: &str, path: &ElementPath) -> XmlResult<Option<Option<T>>> {
        child(parent, tag)
            .map(|element| T::from_element(element, &path.child(tag)))
            .transpose()
            .map(Some)
    }

    fn write(parent: &mut Element, tag: &str, value: &Option<T>) {
        if let Some(element) = value.as_ref().and_then(|v| v.to_element(tag)) {
            push_element(parent, element);
        }
    }
}

/// A record whose fields live directly on the parent element. The tag is
/// descriptive only.
pub struct Inline;

impl<T: Record> Property<T> for Inline {
    fn read(parent: &Element, _tag: &str, path: &ElementPath) -> XmlResult<Option<T>> {
        T::read_fields(parent, path).map(Some)
    }

    fn write(parent: &mut Element, _tag: &str, value: &T) {
        value.write_fields(parent);
    }
}

/// `<tag><Item>..</Item>..</tag>` list. The container is always emitted.
pub struct Items;

impl<T: XmlElement> Property<Vec<T>> for Items {
    fn read(parent: &Element, tag: &str, path: &ElementPath) -> XmlResult<Option<Vec<T>>> {
        let Some(list) = child(parent, tag) else {
            return Ok(None);
        };
        let list_path = path.child(tag);
        child_elements(list)
            .filter(|e| e.name == ITEM_TAG)
            .enumerate()
            .map(|(index, item)| T::from_element(item, &list_path.item(ITEM_TAG, index)))
            .collect::<XmlResult<Vec<T>>>()
            .map(Some)
    }

    fn write(parent: &mut Element, tag: &str, value: &Vec<T>) {
        let mut list = Element::new(tag);
        for item in value {
            if let Some(element) = item.to_element(ITEM_TAG) {
                push_element(&mut list, element);
            }
        }
        push_element(parent, list);
    }
}

/// Item list where `<Item type="None" />` entries are significant nulls.
pub struct OptItems;

impl<T: XmlElement> Property<Vec<Option<T>>> for OptItems {
    fn read(
        parent: &Element,
        tag: &str,
        path: &ElementPath,
    ) -> XmlResult<Option<Vec<Option<T>>>> {
        let Some(list) = child(parent, tag) else {
            return Ok(None);
        };
        let list_path = path.child(tag);
        child_elements(list)
            .filter(|e| e.name == ITEM_TAG)
            .enumerate()
            .map(|(index, item)| {
                if attr(item, "type") == Some(NONE_TYPE) {
                    Ok(None)
                } else {
                    T::from_element(item, &list_path.item(ITEM_TAG, index)).map(Some)
                }
            })
            .collect::<XmlResult<Vec<Option<T>>>>()
            .map(Some)
    }

    fn write(parent: &mut Element, tag: &str, value: &Vec<Option<T>>) {
        let mut list = Element::new(tag);
        for item in value {
            let element = match item {
                Some(item) => item.to_element(ITEM_TAG),
                None => {
                    let mut none = Element::new(ITEM_TAG);
                    set_attr(&mut none, "type", NONE_TYPE.to_string());
                    Some(none)
                }
            };
            if let Some(element) = element {
                push_element(&mut list, element);
            }
        }
        push_element(parent, list);
    }
}

/// `<tag>` holding children of any name; each child dispatches on its own tag.
pub struct Elements;

impl<T: XmlElement> Property<Vec<T>> for Elements {
    fn read(parent: &Element, tag: &str, path: &ElementPath) -> XmlResult<Option<Vec<T>>> {
        let Some(list) = child(parent, tag) else {
            return Ok(None);
        };
        let list_path = path.child(tag);
        child_elements(list)
            .enumerate()
            .map(|(index, element)| T::from_element(element, &list_path.item(&element.name, index)))
            .collect::<XmlResult<Vec<T>>>()
            .map(Some)
    }

    fn write(parent: &mut Element, tag: &str, value: &Vec<T>) {
        let mut list = Element::new(tag);
        for item in value {
            // The element's own tag is chosen by the item.
            if let Some(element) = item.to_element("") {
                push_element(&mut list, element);
            }
        }
        push_element(parent, list);
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use crate::parse_document;

    use super::*;

    fn root(xml: &str) -> Element {
        parse_document(xml.as_bytes()).unwrap()
    }

    #[test]
    fn test_value_default_when_missing() {
        let parent = root("<R />");
        let v: Option<u32> = Value::read(&parent, "Count", &ElementPath::root("R")).unwrap();
        assert_eq!(v, None);
    }

    #[test]
    fn test_matrix_rows_are_columns() {
        let parent = root(
            "<R><M>\n1, 0, 0, 0\n0, 1, 0, 0\n0, 0, 1, 0\n5, 6, 7, 1\n</M></R>",
        );
        let m = Matrix::read(&parent, "M", &ElementPath::root("R")).unwrap().unwrap();
        assert_eq!(m.w_axis.truncate(), Vec3::new(5.0, 6.0, 7.0));

        let mut out = Element::new("R");
        Matrix::write(&mut out, "M", &m);
        let again = Matrix::read(&out, "M", &ElementPath::root("R")).unwrap().unwrap();
        assert_eq!(again, m);
    }

    #[test]
    fn test_matrix_wrong_row_count() {
        let parent = root("<R><M>1, 0, 0, 0</M></R>");
        let result = Matrix::read(&parent, "M", &ElementPath::root("R"));
        assert!(matches!(result, Err(XmlError::MalformedBlob { .. })));
    }

    #[test]
    fn test_opt_text_absent_and_empty() {
        let parent = root("<R><Name /></R>");
        let name: Option<Option<String>> =
            OptText::read(&parent, "Name", &ElementPath::root("R")).unwrap();
        assert_eq!(name, Some(None));
        let name: Option<Option<String>> =
            OptText::read(&parent, "Other", &ElementPath::root("R")).unwrap();
        assert_eq!(name, None);
    }

    #[test]
    fn test_required_child_missing() {
        struct Unit;
        impl XmlElement for Unit {
            fn from_element(_: &Element, _: &ElementPath) -> XmlResult<Self> {
                Ok(Unit)
            }
            fn to_element(&self, tag: &str) -> Option<Element> {
                Some(Element::new(tag))
            }
        }
        let parent = root("<R />");
        let result: XmlResult<Option<Unit>> =
            Child::read(&parent, "Needed", &ElementPath::root("R"));
        assert!(matches!(result, Err(XmlError::SchemaViolation { .. })));
    }

    #[test]
    fn test_comma_list() {
        let mut out = Element::new("R");
        CommaList::write(&mut out, "Ids", &vec![1u16, 2, 3]);
        assert_eq!(text_of(child(&out, "Ids").unwrap()), "1, 2, 3");
        let ids: Option<Vec<u16>> = CommaList::read(&out, "Ids", &ElementPath::root("R")).unwrap();
        assert_eq!(ids, Some(vec![1, 2, 3]));

        let mut empty = Element::new("R");
        CommaList::write(&mut empty, "Ids", &Vec::<u16>::new());
        assert!(child(&empty, "Ids").is_none());
    }
}
