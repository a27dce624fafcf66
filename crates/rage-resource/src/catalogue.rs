//! The shader catalogue.
//!
//! A read-only table of shader definitions indexed by filename and by
//! filename hash. Each definition fixes the vertex layouts a shader accepts
//! and its parameters, in presentation order, with their default values.

use std::collections::HashMap;

use cwxml::property::{parse_attr, set_attr};
use cwxml::{
    Element, ElementPath, Field, Record, XmlElement, XmlError, XmlResult, parse_document,
};
use glam::Vec4;
use tracing::debug;

use crate::drawable::{
    ParameterKind, ParameterValue, Shader, ShaderParameter, VertexAttribute, VertexLayout,
};
use crate::error::{Error, Result};
use crate::hash::{joaat, parse_hash_name};

/// Catalogue shipped with the crate.
const SHIPPED_CATALOGUE: &str = include_str!("../data/shaders.xml");

/// A filename alias of a shader and the render bucket it selects.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShaderFilename {
    pub filename: String,
    pub render_bucket: u8,
}

impl Record for ShaderFilename {
    const FIELDS: &'static [Field<Self>] = cwxml::schema!(ShaderFilename {
        Content "FileName" => filename,
        Attr "bucket" => render_bucket,
    });
}

/// One parameter of a shader definition.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDef {
    pub name: String,
    pub kind: ParameterKind,
    /// Texture coordinate set sampled by a texture parameter.
    pub uv: Option<u8>,
    /// Element count of an array parameter; 1 otherwise.
    pub count: usize,
    pub default: ParameterValue,
}

impl XmlElement for ParameterDef {
    fn from_element(element: &Element, path: &ElementPath) -> XmlResult<Self> {
        let parameter = ShaderParameter::from_element(element, path)?;
        let uv = parse_attr(element, "uv", path)?;
        let mut default = parameter.value;
        let count = match &mut default {
            ParameterValue::Array(values) => {
                let count = parse_attr::<u32>(element, "count", path)?
                    .map_or(values.len(), |c| c as usize);
                values.resize(count, Vec4::ZERO);
                count
            }
            _ => 1,
        };
        Ok(Self {
            name: parameter.name,
            kind: default.kind(),
            uv,
            count,
            default,
        })
    }

    fn to_element(&self, tag: &str) -> Option<Element> {
        let mut element = ShaderParameter::new(self.name.clone(), self.default.clone())
            .to_element(tag)?;
        if let Some(uv) = self.uv {
            set_attr(&mut element, "uv", uv.to_string());
        }
        if self.kind == ParameterKind::Array {
            set_attr(&mut element, "count", self.count.to_string());
        }
        Some(element)
    }
}

/// A shader definition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShaderDef {
    pub name: String,
    pub is_cloth: bool,
    pub filenames: Vec<ShaderFilename>,
    pub layouts: Vec<VertexLayout>,
    pub parameters: Vec<ParameterDef>,
}

impl Record for ShaderDef {
    const FIELDS: &'static [Field<Self>] = cwxml::schema!(ShaderDef {
        Text "Name" => name,
        Value "IsCloth" => is_cloth,
        Items "FileNames" => filenames,
        Items "Layouts" => layouts,
        Items "Parameters" => parameters,
    });

    fn after_read(&mut self, path: &ElementPath) -> XmlResult<()> {
        if self.filenames.is_empty() {
            return Err(XmlError::schema(&path.child("FileNames"), "no filenames"));
        }
        if self.layouts.is_empty() {
            return Err(XmlError::schema(&path.child("Layouts"), "no layouts"));
        }
        Ok(())
    }
}

impl ShaderDef {
    fn any_layout(&self, attribute: VertexAttribute) -> bool {
        self.layouts.iter().any(|l| l.contains(attribute))
    }

    #[must_use]
    pub fn requires_tangent(&self) -> bool {
        self.any_layout(VertexAttribute::Tangent)
    }

    #[must_use]
    pub fn requires_normal(&self) -> bool {
        self.any_layout(VertexAttribute::Normal)
    }

    /// Texture coordinate sets used by any layout, ascending.
    #[must_use]
    pub fn used_texcoords(&self) -> Vec<u8> {
        (0..8)
            .filter(|&n| self.any_layout(VertexAttribute::TexCoord(n)))
            .collect()
    }

    /// Colour sets used by any layout, ascending.
    #[must_use]
    pub fn used_colours(&self) -> Vec<u8> {
        (0..2)
            .filter(|&n| self.any_layout(VertexAttribute::Colour(n)))
            .collect()
    }

    /// The layout for skinned or unskinned geometry, falling back to the first.
    #[must_use]
    pub fn layout(&self, skinned: bool) -> Option<&VertexLayout> {
        self.layouts
            .iter()
            .find(|l| l.is_skinned() == skinned)
            .or_else(|| self.layouts.first())
    }

    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&ParameterDef> {
        self.parameters
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Render bucket of the alias `filename`.
    #[must_use]
    pub fn render_bucket(&self, filename: &str) -> Option<u8> {
        self.filenames
            .iter()
            .find(|f| f.filename.eq_ignore_ascii_case(filename))
            .map(|f| f.render_bucket)
    }

    /// Fresh parameter list holding the default values.
    #[must_use]
    pub fn default_parameters(&self) -> Vec<ShaderParameter> {
        self.parameters
            .iter()
            .map(|p| ShaderParameter::new(p.name.clone(), p.default.clone()))
            .collect()
    }

    /// Position of a parameter in presentation order.
    #[must_use]
    pub fn parameter_rank(&self, name: &str) -> Option<usize> {
        self.parameters
            .iter()
            .position(|p| p.name.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, Default)]
struct CatalogueDocument {
    shaders: Vec<ShaderDef>,
}

impl Record for CatalogueDocument {
    const FIELDS: &'static [Field<Self>] = cwxml::schema!(CatalogueDocument {
        Items "Shaders" => shaders,
    });
}

/// Shader definitions indexed by filename and filename hash.
#[derive(Debug, Clone, Default)]
pub struct ShaderCatalogue {
    shaders: Vec<ShaderDef>,
    by_filename: HashMap<String, usize>,
    by_hash: HashMap<u32, usize>,
}

impl ShaderCatalogue {
    /// Build a catalogue from definitions. Later aliases win on collision.
    #[must_use]
    pub fn new(shaders: Vec<ShaderDef>) -> Self {
        let mut by_filename = HashMap::new();
        let mut by_hash = HashMap::new();
        for (index, shader) in shaders.iter().enumerate() {
            for alias in &shader.filenames {
                by_filename.insert(alias.filename.to_ascii_lowercase(), index);
                by_hash.insert(joaat(&alias.filename), index);
            }
        }
        Self {
            shaders,
            by_filename,
            by_hash,
        }
    }

    /// Parse a catalogue document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Xml`] if the document is malformed or a definition
    /// lacks filenames or layouts.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let root = parse_document(bytes)?;
        let document = CatalogueDocument::from_element(&root, &ElementPath::root(&root.name))?;
        debug!(shaders = document.shaders.len(), "parsed shader catalogue");
        Ok(Self::new(document.shaders))
    }

    /// The catalogue shipped with this crate.
    ///
    /// # Errors
    ///
    /// Returns an error only if the bundled document is corrupt.
    pub fn shipped() -> Result<Self> {
        Self::parse(SHIPPED_CATALOGUE.as_bytes())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.shaders.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shaders.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ShaderDef> {
        self.shaders.iter()
    }

    /// Look up a definition by filename alias, case-insensitively.
    #[must_use]
    pub fn get(&self, filename: &str) -> Option<&ShaderDef> {
        self.by_filename
            .get(&filename.to_ascii_lowercase())
            .map(|&i| &self.shaders[i])
    }

    /// Look up a definition by the hash of a filename alias.
    #[must_use]
    pub fn get_by_hash(&self, hash: u32) -> Option<&ShaderDef> {
        self.by_hash.get(&hash).map(|&i| &self.shaders[i])
    }

    /// Resolve a filename or a `hash_<hex>` placeholder.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnresolvedShader`] if neither lookup succeeds.
    pub fn resolve(&self, key: &str) -> Result<&ShaderDef> {
        self.get(key)
            .or_else(|| parse_hash_name(key).and_then(|h| self.get_by_hash(h)))
            .ok_or_else(|| Error::UnresolvedShader {
                filename: key.to_string(),
            })
    }

    /// Filename alias matching `key`, which may be a `hash_<hex>` placeholder.
    #[must_use]
    pub fn canonical_filename(&self, key: &str) -> Option<&str> {
        let def = self.resolve(key).ok()?;
        let hash = parse_hash_name(key);
        def.filenames
            .iter()
            .find(|f| {
                f.filename.eq_ignore_ascii_case(key) || hash == Some(joaat(&f.filename))
            })
            .map(|f| f.filename.as_str())
    }

    /// Vertex layout for `filename`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnresolvedShader`] for unknown shaders.
    pub fn layout_for(&self, filename: &str, skinned: bool) -> Result<&VertexLayout> {
        self.resolve(filename)?
            .layout(skinned)
            .ok_or_else(|| Error::UnresolvedShader {
                filename: filename.to_string(),
            })
    }

    /// Default parameter list for `filename`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnresolvedShader`] for unknown shaders.
    pub fn default_parameters(&self, filename: &str) -> Result<Vec<ShaderParameter>> {
        Ok(self.resolve(filename)?.default_parameters())
    }

    /// A new shader instance with default parameters.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnresolvedShader`] for unknown shaders.
    pub fn instantiate(&self, filename: &str) -> Result<Shader> {
        let def = self.resolve(filename)?;
        let filename = self.canonical_filename(filename).unwrap_or(filename);
        Ok(Shader {
            name: def.name.clone(),
            filename: filename.to_string(),
            render_bucket: def.render_bucket(filename).unwrap_or_default(),
            parameters: def.default_parameters(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::hash_name;

    fn catalogue() -> ShaderCatalogue {
        ShaderCatalogue::shipped().unwrap()
    }

    #[test]
    fn test_shipped_catalogue_parses() {
        let catalogue = catalogue();
        assert!(catalogue.len() >= 8);
        assert!(catalogue.iter().any(|s| s.is_cloth));
    }

    #[test]
    fn test_resolve_by_filename_and_hash() {
        let catalogue = catalogue();
        let by_name = catalogue.resolve("Normal_Spec.sps").unwrap();
        assert_eq!(by_name.name, "normal_spec");
        let key = hash_name(joaat("normal_spec.sps"));
        let by_hash = catalogue.resolve(&key).unwrap();
        assert_eq!(by_hash.name, "normal_spec");
        assert_eq!(catalogue.canonical_filename(&key), Some("normal_spec.sps"));
    }

    #[test]
    fn test_unresolved() {
        let binding = catalogue();
        let result = binding.resolve("nonexistent.sps");
        assert!(matches!(result, Err(Error::UnresolvedShader { .. })));
    }

    #[test]
    fn test_derived_queries() {
        let catalogue = catalogue();
        let spec = catalogue.get("normal_spec.sps").unwrap();
        assert!(spec.requires_tangent());
        assert!(spec.requires_normal());
        assert_eq!(spec.used_texcoords(), [0, 1]);
        assert_eq!(spec.used_colours(), [0]);
        let default = catalogue.get("default.sps").unwrap();
        assert!(!default.requires_tangent());
    }

    #[test]
    fn test_layout_for_skinning() {
        let catalogue = catalogue();
        assert!(catalogue.layout_for("default.sps", true).unwrap().is_skinned());
        assert!(!catalogue.layout_for("default.sps", false).unwrap().is_skinned());
        // Only a skinned layout exists; it is used for both.
        assert!(catalogue.layout_for("ped.sps", false).unwrap().is_skinned());
    }

    #[test]
    fn test_instantiate_uses_alias_bucket() {
        let catalogue = catalogue();
        let shader = catalogue.instantiate("normal_alpha.sps").unwrap();
        assert_eq!(shader.name, "normal");
        assert_eq!(shader.render_bucket, 1);
        assert_eq!(shader.parameters[0].name, "DiffuseSampler");
        assert_eq!(shader.parameters[0].value, ParameterValue::Texture(None));
    }

    #[test]
    fn test_array_default_padded_to_count() {
        let catalogue = catalogue();
        let ped = catalogue.get("ped.sps").unwrap();
        let wrinkle = ped.parameter("wrinkleMaskStrengths").unwrap();
        assert_eq!(wrinkle.count, 4);
        assert_eq!(wrinkle.default, ParameterValue::Array(vec![Vec4::ZERO; 4]));
    }

    #[test]
    fn test_definition_requires_layouts() {
        let result = ShaderCatalogue::parse(
            b"<ShaderCatalogue><Shaders><Item><Name>x</Name><FileNames><Item bucket=\"0\">x.sps</Item></FileNames></Item></Shaders></ShaderCatalogue>",
        );
        assert!(matches!(result, Err(Error::Xml(XmlError::SchemaViolation { .. }))));
    }
}
