//! Vertex and index buffers.
//!
//! Vertex data is stored by column, one typed array per layout attribute. The
//! disk form is one row per vertex: attributes separated by three spaces,
//! components by one.

use cwxml::property::{
    child, child_elements, parse_attr, push_element, push_empty, push_text, set_attr, text_of,
};
use cwxml::{Element, ElementPath, Field, Record, XmlElement, XmlError, XmlResult, XmlValue};
use glam::{Vec2, Vec3, Vec4};

use crate::error::{Error, Result};

/// Most vertices a single buffer may hold.
pub const MAX_VERTICES: usize = 65535;

/// A vertex attribute from the closed set the engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VertexAttribute {
    Position,
    BlendWeights,
    BlendIndices,
    Normal,
    Colour(u8),
    TexCoord(u8),
    Tangent,
}

const COLOUR_TAGS: [&str; 2] = ["Colour0", "Colour1"];
const TEXCOORD_TAGS: [&str; 8] = [
    "TexCoord0", "TexCoord1", "TexCoord2", "TexCoord3", "TexCoord4", "TexCoord5", "TexCoord6",
    "TexCoord7",
];

/// Storage class of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentType {
    Float2,
    Float3,
    Float4,
    Byte4,
}

impl VertexAttribute {
    /// Every attribute in canonical layout order.
    pub const ALL: [VertexAttribute; 15] = [
        VertexAttribute::Position,
        VertexAttribute::BlendWeights,
        VertexAttribute::BlendIndices,
        VertexAttribute::Normal,
        VertexAttribute::Colour(0),
        VertexAttribute::Colour(1),
        VertexAttribute::TexCoord(0),
        VertexAttribute::TexCoord(1),
        VertexAttribute::TexCoord(2),
        VertexAttribute::TexCoord(3),
        VertexAttribute::TexCoord(4),
        VertexAttribute::TexCoord(5),
        VertexAttribute::TexCoord(6),
        VertexAttribute::TexCoord(7),
        VertexAttribute::Tangent,
    ];

    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            VertexAttribute::Position => "Position",
            VertexAttribute::BlendWeights => "BlendWeights",
            VertexAttribute::BlendIndices => "BlendIndices",
            VertexAttribute::Normal => "Normal",
            VertexAttribute::Colour(n) => COLOUR_TAGS[usize::from(n).min(1)],
            VertexAttribute::TexCoord(n) => TEXCOORD_TAGS[usize::from(n).min(7)],
            VertexAttribute::Tangent => "Tangent",
        }
    }

    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.tag() == tag)
    }

    #[must_use]
    pub fn component_type(self) -> ComponentType {
        match self {
            VertexAttribute::Position | VertexAttribute::Normal => ComponentType::Float3,
            VertexAttribute::TexCoord(_) => ComponentType::Float2,
            VertexAttribute::Tangent => ComponentType::Float4,
            VertexAttribute::BlendWeights
            | VertexAttribute::BlendIndices
            | VertexAttribute::Colour(_) => ComponentType::Byte4,
        }
    }

    /// Scalars per vertex in memory.
    #[must_use]
    pub fn width(self) -> usize {
        match self.component_type() {
            ComponentType::Float2 => 2,
            ComponentType::Float3 => 3,
            ComponentType::Float4 | ComponentType::Byte4 => 4,
        }
    }

    /// Scalars per vertex on disk for `family`.
    #[must_use]
    pub fn disk_width(self, family: LayoutFamily) -> usize {
        if self == VertexAttribute::Normal && family == LayoutFamily::Gtav2 {
            4
        } else {
            self.width()
        }
    }
}

/// Layout family token. `GTAV2` stores normals as four floats on disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum LayoutFamily {
    #[default]
    Gtav1,
    Gtav2,
    Gtav3,
}

impl XmlValue for LayoutFamily {
    fn parse_xml(text: &str) -> Option<Self> {
        match text.trim() {
            "GTAV1" => Some(LayoutFamily::Gtav1),
            "GTAV2" => Some(LayoutFamily::Gtav2),
            "GTAV3" => Some(LayoutFamily::Gtav3),
            _ => None,
        }
    }

    fn to_xml(&self) -> String {
        match self {
            LayoutFamily::Gtav1 => "GTAV1",
            LayoutFamily::Gtav2 => "GTAV2",
            LayoutFamily::Gtav3 => "GTAV3",
        }
        .to_string()
    }
}

/// Ordered attribute list of a vertex buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct VertexLayout {
    pub family: LayoutFamily,
    pub attributes: Vec<VertexAttribute>,
}

impl VertexLayout {
    #[must_use]
    pub fn new(family: LayoutFamily, attributes: Vec<VertexAttribute>) -> Self {
        Self { family, attributes }
    }

    #[must_use]
    pub fn contains(&self, attribute: VertexAttribute) -> bool {
        self.attributes.contains(&attribute)
    }

    #[must_use]
    pub fn is_skinned(&self) -> bool {
        self.contains(VertexAttribute::BlendWeights)
    }

    /// Scalars per row on disk.
    #[must_use]
    pub fn disk_width(&self) -> usize {
        self.attributes.iter().map(|a| a.disk_width(self.family)).sum()
    }
}

impl XmlElement for VertexLayout {
    fn from_element(element: &Element, path: &ElementPath) -> XmlResult<Self> {
        let family = parse_attr(element, "type", path)?.unwrap_or_default();
        let mut attributes = Vec::new();
        for (index, item) in child_elements(element).enumerate() {
            let attribute = VertexAttribute::from_tag(&item.name)
                .ok_or_else(|| XmlError::unknown_variant(path, item.name.clone()))?;
            if attributes.contains(&attribute) {
                return Err(XmlError::schema(
                    &path.item(&item.name, index),
                    "duplicate vertex attribute",
                ));
            }
            attributes.push(attribute);
        }
        Ok(Self { family, attributes })
    }

    fn to_element(&self, tag: &str) -> Option<Element> {
        let mut element = Element::new(tag);
        set_attr(&mut element, "type", self.family.to_xml());
        for attribute in &self.attributes {
            push_empty(&mut element, attribute.tag());
        }
        Some(element)
    }
}

/// One attribute's values for every vertex.
#[derive(Debug, Clone, PartialEq)]
pub enum VertexColumn {
    Float2(Vec<Vec2>),
    Float3(Vec<Vec3>),
    Float4(Vec<Vec4>),
    Byte4(Vec<[u8; 4]>),
}

impl VertexColumn {
    /// Empty column of the right storage class for `attribute`.
    #[must_use]
    pub fn for_attribute(attribute: VertexAttribute) -> Self {
        match attribute.component_type() {
            ComponentType::Float2 => VertexColumn::Float2(Vec::new()),
            ComponentType::Float3 => VertexColumn::Float3(Vec::new()),
            ComponentType::Float4 => VertexColumn::Float4(Vec::new()),
            ComponentType::Byte4 => VertexColumn::Byte4(Vec::new()),
        }
    }

    #[must_use]
    pub fn component_type(&self) -> ComponentType {
        match self {
            VertexColumn::Float2(_) => ComponentType::Float2,
            VertexColumn::Float3(_) => ComponentType::Float3,
            VertexColumn::Float4(_) => ComponentType::Float4,
            VertexColumn::Byte4(_) => ComponentType::Byte4,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            VertexColumn::Float2(v) => v.len(),
            VertexColumn::Float3(v) => v.len(),
            VertexColumn::Float4(v) => v.len(),
            VertexColumn::Byte4(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Values of `index` widened to f64, used for row comparison.
    pub fn push_row_values(&self, index: usize, out: &mut Vec<f64>) {
        match self {
            VertexColumn::Float2(v) => out.extend(v[index].to_array().map(f64::from)),
            VertexColumn::Float3(v) => out.extend(v[index].to_array().map(f64::from)),
            VertexColumn::Float4(v) => out.extend(v[index].to_array().map(f64::from)),
            VertexColumn::Byte4(v) => out.extend(v[index].map(f64::from)),
        }
    }

    /// Keep only the rows listed in `order`, in that order.
    #[must_use]
    pub fn gather(&self, order: &[usize]) -> Self {
        match self {
            VertexColumn::Float2(v) => VertexColumn::Float2(order.iter().map(|&i| v[i]).collect()),
            VertexColumn::Float3(v) => VertexColumn::Float3(order.iter().map(|&i| v[i]).collect()),
            VertexColumn::Float4(v) => VertexColumn::Float4(order.iter().map(|&i| v[i]).collect()),
            VertexColumn::Byte4(v) => VertexColumn::Byte4(order.iter().map(|&i| v[i]).collect()),
        }
    }

    fn push_tokens(&mut self, tokens: &[&str]) -> Option<()> {
        fn float(token: &str) -> Option<f32> {
            token.parse().ok()
        }
        match self {
            VertexColumn::Float2(v) => v.push(Vec2::new(float(tokens[0])?, float(tokens[1])?)),
            VertexColumn::Float3(v) => v.push(Vec3::new(
                float(tokens[0])?,
                float(tokens[1])?,
                float(tokens[2])?,
            )),
            VertexColumn::Float4(v) => v.push(Vec4::new(
                float(tokens[0])?,
                float(tokens[1])?,
                float(tokens[2])?,
                float(tokens[3])?,
            )),
            VertexColumn::Byte4(v) => {
                let mut bytes = [0u8; 4];
                for (slot, token) in bytes.iter_mut().zip(tokens) {
                    *slot = token.parse().ok()?;
                }
                v.push(bytes);
            }
        }
        Some(())
    }

    fn write_row(&self, index: usize, disk_width: usize, out: &mut String) {
        let parts: Vec<String> = match self {
            VertexColumn::Float2(v) => v[index].to_array().map(cwxml::format_f32).to_vec(),
            VertexColumn::Float3(v) => v[index].to_array().map(cwxml::format_f32).to_vec(),
            VertexColumn::Float4(v) => v[index].to_array().map(cwxml::format_f32).to_vec(),
            VertexColumn::Byte4(v) => v[index].map(|b| b.to_string()).to_vec(),
        };
        out.push_str(&parts.join(" "));
        for _ in parts.len()..disk_width {
            out.push_str(" 0");
        }
    }
}

/// Vertex table typed by its layout.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VertexBuffer {
    pub flags: u32,
    layout: VertexLayout,
    columns: Vec<VertexColumn>,
}

impl VertexBuffer {
    /// Empty buffer for `layout`.
    #[must_use]
    pub fn new(layout: VertexLayout) -> Self {
        let columns = layout
            .attributes
            .iter()
            .map(|&a| VertexColumn::for_attribute(a))
            .collect();
        Self {
            flags: 0,
            layout,
            columns,
        }
    }

    /// Build a buffer from one column per layout attribute.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the columns do not match the
    /// layout or differ in length, and [`Error::CapacityExceeded`] past
    /// [`MAX_VERTICES`] rows.
    pub fn from_columns(layout: VertexLayout, columns: Vec<VertexColumn>) -> Result<Self> {
        if columns.len() != layout.attributes.len() {
            return Err(Error::configuration(format!(
                "{} columns for {} layout attributes",
                columns.len(),
                layout.attributes.len()
            )));
        }
        for (attribute, column) in layout.attributes.iter().zip(&columns) {
            if attribute.component_type() != column.component_type() {
                return Err(Error::configuration(format!(
                    "column for {} has the wrong storage class",
                    attribute.tag()
                )));
            }
        }
        let count = columns.first().map_or(0, VertexColumn::len);
        if columns.iter().any(|c| c.len() != count) {
            return Err(Error::configuration("vertex columns differ in length"));
        }
        if count > MAX_VERTICES {
            return Err(Error::CapacityExceeded {
                what: "vertex buffer",
                count,
                limit: MAX_VERTICES,
            });
        }
        Ok(Self {
            flags: 0,
            layout,
            columns,
        })
    }

    #[must_use]
    pub fn layout(&self) -> &VertexLayout {
        &self.layout
    }

    #[must_use]
    pub fn columns(&self) -> &[VertexColumn] {
        &self.columns
    }

    #[must_use]
    pub fn column(&self, attribute: VertexAttribute) -> Option<&VertexColumn> {
        let index = self.layout.attributes.iter().position(|&a| a == attribute)?;
        self.columns.get(index)
    }

    /// Vertex positions; empty when the layout has none.
    #[must_use]
    pub fn positions(&self) -> &[Vec3] {
        match self.column(VertexAttribute::Position) {
            Some(VertexColumn::Float3(v)) => v,
            _ => &[],
        }
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.columns.first().map_or(0, VertexColumn::len)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vertex_count() == 0
    }

    fn parse_data(&mut self, text: &str, path: &ElementPath) -> XmlResult<()> {
        let family = self.layout.family;
        let widths: Vec<usize> = self
            .layout
            .attributes
            .iter()
            .map(|a| a.disk_width(family))
            .collect();
        let expected: usize = widths.iter().sum();
        for (line_no, line) in text.lines().enumerate() {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.is_empty() {
                continue;
            }
            if tokens.len() != expected {
                return Err(XmlError::blob(
                    path,
                    format!(
                        "line {}: expected {expected} values, got {}",
                        line_no + 1,
                        tokens.len()
                    ),
                ));
            }
            let mut offset = 0;
            for (column, width) in self.columns.iter_mut().zip(&widths) {
                column
                    .push_tokens(&tokens[offset..offset + width])
                    .ok_or_else(|| {
                        XmlError::blob(path, format!("line {}: non-numeric token", line_no + 1))
                    })?;
                offset += width;
            }
        }
        if self.vertex_count() > MAX_VERTICES {
            return Err(XmlError::schema(
                path,
                format!(
                    "{} vertices exceed the limit of {MAX_VERTICES}",
                    self.vertex_count()
                ),
            ));
        }
        Ok(())
    }

    fn format_data(&self) -> String {
        let count = self.vertex_count();
        if count == 0 {
            return String::new();
        }
        let family = self.layout.family;
        let mut text = String::from("\n");
        for index in 0..count {
            for (position, (attribute, column)) in
                self.layout.attributes.iter().zip(&self.columns).enumerate()
            {
                if position > 0 {
                    text.push_str("   ");
                }
                column.write_row(index, attribute.disk_width(family), &mut text);
            }
            text.push('\n');
        }
        text
    }
}

impl XmlElement for VertexBuffer {
    fn from_element(element: &Element, path: &ElementPath) -> XmlResult<Self> {
        let layout_element = child(element, "Layout")
            .ok_or_else(|| XmlError::schema(path, "missing required child <Layout>"))?;
        let layout = VertexLayout::from_element(layout_element, &path.child("Layout"))?;
        let mut buffer = VertexBuffer::new(layout);
        buffer.flags = parse_attr(element, "Flags", path)?.unwrap_or_default();
        if let Some(data) = child(element, "Data") {
            buffer.parse_data(&text_of(data), &path.child("Data"))?;
        }
        Ok(buffer)
    }

    fn to_element(&self, tag: &str) -> Option<Element> {
        let mut element = Element::new(tag);
        set_attr(&mut element, "Flags", self.flags.to_xml());
        if let Some(layout) = self.layout.to_element("Layout") {
            push_element(&mut element, layout);
        }
        push_text(&mut element, "Data", self.format_data());
        Some(element)
    }
}

/// Triangle list indices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexBuffer {
    pub indices: Vec<u32>,
}

impl Record for IndexBuffer {
    const FIELDS: &'static [Field<Self>] = cwxml::schema!(IndexBuffer {
        Numbers "Data" => indices,
    });

    fn after_read(&mut self, path: &ElementPath) -> XmlResult<()> {
        if self.indices.len() % 3 != 0 {
            return Err(XmlError::schema(
                &path.child("Data"),
                format!("{} indices is not a multiple of 3", self.indices.len()),
            ));
        }
        Ok(())
    }
}

impl IndexBuffer {
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]])
    }
}
