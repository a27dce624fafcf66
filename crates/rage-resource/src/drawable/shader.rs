//! Shader groups and shader parameters.

use cwxml::property::{
    attr, child, child_elements, push_element, push_text, read_vector, set_attr, text_of,
    write_vector,
};
use cwxml::{Element, ElementPath, Field, Record, XmlElement, XmlError, XmlResult};
use glam::{Mat4, Vec4};

use super::Texture;

/// Disk form of a shader parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterKind {
    Texture,
    Vector,
    Array,
    Matrix,
}

impl ParameterKind {
    #[must_use]
    pub fn type_name(self) -> &'static str {
        match self {
            ParameterKind::Texture => "Texture",
            ParameterKind::Vector => "Vector",
            ParameterKind::Array => "Array",
            ParameterKind::Matrix => "FLOAT4X4",
        }
    }

    #[must_use]
    pub fn from_type_name(name: &str) -> Option<Self> {
        match name {
            "Texture" => Some(ParameterKind::Texture),
            "Vector" => Some(ParameterKind::Vector),
            "Array" => Some(ParameterKind::Array),
            "FLOAT4X4" | "Matrix" => Some(ParameterKind::Matrix),
            _ => None,
        }
    }
}

/// Value of a shader parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    /// Texture name, or `None` for an unbound slot.
    Texture(Option<String>),
    Vector(Vec4),
    Array(Vec<Vec4>),
    Matrix(Mat4),
}

impl ParameterValue {
    #[must_use]
    pub fn kind(&self) -> ParameterKind {
        match self {
            ParameterValue::Texture(_) => ParameterKind::Texture,
            ParameterValue::Vector(_) => ParameterKind::Vector,
            ParameterValue::Array(_) => ParameterKind::Array,
            ParameterValue::Matrix(_) => ParameterKind::Matrix,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShaderParameter {
    pub name: String,
    pub value: ParameterValue,
}

impl ShaderParameter {
    #[must_use]
    pub fn new(name: impl Into<String>, value: ParameterValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

fn read_values(element: &Element, path: &ElementPath) -> XmlResult<Vec<Vec4>> {
    child_elements(element)
        .filter(|e| e.name == "Value")
        .enumerate()
        .map(|(index, value)| read_vector(value, &path.item("Value", index)))
        .collect()
}

fn push_values(element: &mut Element, values: &[Vec4]) {
    for value in values {
        let mut item = Element::new("Value");
        write_vector(&mut item, value);
        push_element(element, item);
    }
}

impl XmlElement for ShaderParameter {
    fn from_element(element: &Element, path: &ElementPath) -> XmlResult<Self> {
        let name = attr(element, "name").unwrap_or_default().to_string();
        let Some(type_name) = attr(element, "type") else {
            return Err(XmlError::schema(
                &path.attribute("type"),
                "missing parameter type",
            ));
        };
        let kind = ParameterKind::from_type_name(type_name)
            .ok_or_else(|| XmlError::unknown_variant(path, type_name))?;
        let value = match kind {
            ParameterKind::Texture => ParameterValue::Texture(
                child(element, "Name")
                    .map(|n| text_of(n).trim().to_string())
                    .filter(|n| !n.is_empty()),
            ),
            ParameterKind::Vector => ParameterValue::Vector(read_vector(element, path)?),
            ParameterKind::Array => ParameterValue::Array(read_values(element, path)?),
            ParameterKind::Matrix => {
                let rows = read_values(element, path)?;
                if rows.len() != 4 {
                    return Err(XmlError::schema(
                        path,
                        format!("expected 4 matrix rows, got {}", rows.len()),
                    ));
                }
                ParameterValue::Matrix(Mat4::from_cols(rows[0], rows[1], rows[2], rows[3]))
            }
        };
        Ok(Self { name, value })
    }

    fn to_element(&self, tag: &str) -> Option<Element> {
        let mut element = Element::new(tag);
        set_attr(&mut element, "name", self.name.clone());
        set_attr(&mut element, "type", self.value.kind().type_name().to_string());
        match &self.value {
            ParameterValue::Texture(name) => {
                if let Some(name) = name {
                    push_text(&mut element, "Name", name.clone());
                }
            }
            ParameterValue::Vector(v) => write_vector(&mut element, v),
            ParameterValue::Array(values) => push_values(&mut element, values),
            ParameterValue::Matrix(m) => {
                push_values(&mut element, &[m.x_axis, m.y_axis, m.z_axis, m.w_axis]);
            }
        }
        Some(element)
    }
}

/// A shader instance bound to one or more geometries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Shader {
    pub name: String,
    pub filename: String,
    pub render_bucket: u8,
    pub parameters: Vec<ShaderParameter>,
}

impl Record for Shader {
    const FIELDS: &'static [Field<Self>] = cwxml::schema!(Shader {
        Text "Name" => name,
        Text "FileName" => filename,
        Value "RenderBucket" => render_bucket,
        Items "Parameters" => parameters,
    });
}

impl Shader {
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&ShaderParameter> {
        self.parameters.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }

    pub fn parameter_mut(&mut self, name: &str) -> Option<&mut ShaderParameter> {
        self.parameters
            .iter_mut()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Names of the textures bound by this shader.
    pub fn texture_names(&self) -> impl Iterator<Item = &str> {
        self.parameters.iter().filter_map(|p| match &p.value {
            ParameterValue::Texture(Some(name)) => Some(name.as_str()),
            _ => None,
        })
    }
}

/// Shaders of a drawable and its embedded texture dictionary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShaderGroup {
    pub unknown_30: u32,
    pub textures: Vec<Texture>,
    pub shaders: Vec<Shader>,
}

impl Record for ShaderGroup {
    const FIELDS: &'static [Field<Self>] = cwxml::schema!(ShaderGroup {
        Value "Unknown30" => unknown_30,
        Items "TextureDictionary" => textures,
        Items "Shaders" => shaders,
    });
}

impl ShaderGroup {
    /// Drop textures whose name repeats an earlier entry. Returns the number removed.
    pub fn dedup_textures(&mut self) -> usize {
        let before = self.textures.len();
        let mut seen = Vec::new();
        self.textures.retain(|t| {
            let key = t.name.to_ascii_lowercase();
            if seen.contains(&key) {
                false
            } else {
                seen.push(key);
                true
            }
        });
        before - self.textures.len()
    }
}

#[cfg(test)]
mod tests {
    use cwxml::{parse_document, write_document};

    use super::*;

    const SHADER: &str = r#"<Item>
  <Name>default</Name>
  <FileName>default.sps</FileName>
  <RenderBucket value="0" />
  <Parameters>
    <Item name="DiffuseSampler" type="Texture"><Name>brick_d</Name></Item>
    <Item name="BumpSampler" type="Texture" />
    <Item name="specularIntensityMult" type="Vector" x="1" y="0" z="0" w="0" />
    <Item name="wrinkleMaskStrengths" type="Array">
      <Value x="1" y="2" z="3" w="4" />
      <Value x="5" y="6" z="7" w="8" />
    </Item>
    <Item name="gWorldMatrix" type="FLOAT4X4">
      <Value x="1" y="0" z="0" w="0" />
      <Value x="0" y="1" z="0" w="0" />
      <Value x="0" y="0" z="1" w="0" />
      <Value x="3" y="4" z="5" w="1" />
    </Item>
  </Parameters>
</Item>"#;

    fn read(xml: &str) -> XmlResult<Shader> {
        let root = parse_document(xml.as_bytes()).unwrap();
        Shader::from_element(&root, &ElementPath::root("Item"))
    }

    #[test]
    fn test_parameter_forms() {
        let shader = read(SHADER).unwrap();
        assert_eq!(shader.parameters.len(), 5);
        assert_eq!(
            shader.parameter("diffusesampler").unwrap().value,
            ParameterValue::Texture(Some("brick_d".to_string()))
        );
        assert_eq!(
            shader.parameter("BumpSampler").unwrap().value,
            ParameterValue::Texture(None)
        );
        assert_eq!(
            shader.parameter("specularIntensityMult").unwrap().value,
            ParameterValue::Vector(Vec4::X)
        );
        let ParameterValue::Array(values) = &shader.parameter("wrinkleMaskStrengths").unwrap().value
        else {
            panic!("expected an array");
        };
        assert_eq!(values[1], Vec4::new(5.0, 6.0, 7.0, 8.0));
        let ParameterValue::Matrix(m) = shader.parameter("gWorldMatrix").unwrap().value else {
            panic!("expected a matrix");
        };
        assert_eq!(m.w_axis, Vec4::new(3.0, 4.0, 5.0, 1.0));
        assert_eq!(shader.texture_names().collect::<Vec<_>>(), ["brick_d"]);
    }

    #[test]
    fn test_round_trip() {
        let shader = read(SHADER).unwrap();
        let bytes = write_document(&shader.to_element("Item").unwrap()).unwrap();
        let again = read(std::str::from_utf8(&bytes).unwrap()).unwrap();
        assert_eq!(again, shader);
    }

    #[test]
    fn test_unknown_parameter_type() {
        let result = read(
            r#"<Item><Parameters><Item name="x" type="Sampler3D" /></Parameters></Item>"#,
        );
        match result {
            Err(XmlError::UnknownVariant { parent, got }) => {
                assert_eq!(got, "Sampler3D");
                assert_eq!(parent.as_str(), "Item/Parameters/Item[0]");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_dedup_textures() {
        let mut group = ShaderGroup::default();
        for name in ["a", "b", "A"] {
            group.textures.push(Texture {
                name: name.to_string(),
                ..Texture::default()
            });
        }
        assert_eq!(group.dedup_textures(), 1);
        assert_eq!(group.textures.len(), 2);
    }
}
