//! File format dispatch and the codec context.
//!
//! A [`Codec`] owns a shader catalogue snapshot and the options that govern
//! the derived-field pass. It maps each resource suffix to the record that
//! reads and writes it:
//!
//! | Suffix     | Root tag               | Record                 |
//! |------------|------------------------|------------------------|
//! | `.ybn.xml` | `<BoundsFile>`         | [`BoundFile`]          |
//! | `.ydr.xml` | `<Drawable>`           | [`Drawable`]           |
//! | `.ydd.xml` | `<DrawableDictionary>` | [`DrawableDictionary`] |
//! | `.yld.xml` | `<ClothDictionary>`    | [`ClothDictionary`]    |
//! | `.yft.xml` | `<Fragment>`           | [`Fragment`]           |
//!
//! # Design principles
//!
//! - **Snapshot catalogue**: the catalogue is shared behind an `Arc` and never
//!   mutated; reloading means building a new codec
//! - **Refresh before emit**: [`Codec::export`] recomputes derived fields, while
//!   [`Codec::emit`] writes the IR exactly as given

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use cwxml::property::{child, push_element};
use cwxml::{Element, ElementPath, XmlElement, XmlError, XmlResult, parse_document, write_document};
use tracing::debug;

use crate::bound::Bound;
use crate::catalogue::ShaderCatalogue;
use crate::dictionary::{ClothDictionary, DrawableDictionary};
use crate::drawable::Drawable;
use crate::error::{Error, Result};
use crate::fragment::Fragment;

/// Resource file kinds, keyed by file suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileFormat {
    Bounds,
    Drawable,
    DrawableDictionary,
    ClothDictionary,
    Fragment,
}

impl FileFormat {
    pub const ALL: [FileFormat; 5] = [
        FileFormat::Bounds,
        FileFormat::Drawable,
        FileFormat::DrawableDictionary,
        FileFormat::ClothDictionary,
        FileFormat::Fragment,
    ];

    #[must_use]
    pub fn suffix(self) -> &'static str {
        match self {
            FileFormat::Bounds => ".ybn.xml",
            FileFormat::Drawable => ".ydr.xml",
            FileFormat::DrawableDictionary => ".ydd.xml",
            FileFormat::ClothDictionary => ".yld.xml",
            FileFormat::Fragment => ".yft.xml",
        }
    }

    #[must_use]
    pub fn root_tag(self) -> &'static str {
        match self {
            FileFormat::Bounds => BoundFile::ROOT_TAG,
            FileFormat::Drawable => "Drawable",
            FileFormat::DrawableDictionary => DrawableDictionary::ROOT_TAG,
            FileFormat::ClothDictionary => ClothDictionary::ROOT_TAG,
            FileFormat::Fragment => "Fragment",
        }
    }

    /// Format of `path`, matched case-insensitively on its suffix.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|format| name.ends_with(format.suffix()))
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// `<BoundsFile>` document holding a single root bound, usually a composite.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundFile {
    pub bounds: Bound,
}

impl BoundFile {
    pub const ROOT_TAG: &'static str = "BoundsFile";
}

impl XmlElement for BoundFile {
    fn from_element(element: &Element, path: &ElementPath) -> XmlResult<Self> {
        let bounds = child(element, "Bounds")
            .ok_or_else(|| XmlError::schema(path, "missing required child <Bounds>"))?;
        Ok(Self {
            bounds: Bound::from_element(bounds, &path.child("Bounds"))?,
        })
    }

    fn to_element(&self, tag: &str) -> Option<Element> {
        let mut element = Element::new(tag);
        if let Some(bounds) = self.bounds.to_element("Bounds") {
            push_element(&mut element, bounds);
        }
        Some(element)
    }
}

/// A parsed resource of any supported format.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceFile {
    Bounds(BoundFile),
    Drawable(Drawable),
    DrawableDictionary(DrawableDictionary),
    ClothDictionary(ClothDictionary),
    Fragment(Fragment),
}

impl ResourceFile {
    #[must_use]
    pub fn format(&self) -> FileFormat {
        match self {
            ResourceFile::Bounds(_) => FileFormat::Bounds,
            ResourceFile::Drawable(_) => FileFormat::Drawable,
            ResourceFile::DrawableDictionary(_) => FileFormat::DrawableDictionary,
            ResourceFile::ClothDictionary(_) => FileFormat::ClothDictionary,
            ResourceFile::Fragment(_) => FileFormat::Fragment,
        }
    }
}

/// Switches for the derived-field pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecOptions {
    /// Overwrite bone tags with values derived from bone names.
    pub auto_bone_tags: bool,
    /// Recompute the three skeleton checksums on refresh. Turn off to keep
    /// values copied from a vanilla asset.
    pub recompute_skeleton_checksums: bool,
    /// Emit dictionary items in name hash order.
    pub sort_dictionaries: bool,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            auto_bone_tags: false,
            recompute_skeleton_checksums: true,
            sort_dictionaries: true,
        }
    }
}

/// Reads, refreshes and writes resource documents.
#[derive(Debug, Clone)]
pub struct Codec {
    catalogue: Arc<ShaderCatalogue>,
    options: CodecOptions,
}

impl Codec {
    /// Codec over the catalogue shipped with this crate.
    ///
    /// # Errors
    ///
    /// Returns an error if the shipped catalogue fails to parse.
    pub fn new() -> Result<Self> {
        Ok(Self::with_catalogue(Arc::new(ShaderCatalogue::shipped()?)))
    }

    #[must_use]
    pub fn with_catalogue(catalogue: Arc<ShaderCatalogue>) -> Self {
        Self {
            catalogue,
            options: CodecOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: CodecOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn catalogue(&self) -> &ShaderCatalogue {
        &self.catalogue
    }

    #[must_use]
    pub fn options(&self) -> &CodecOptions {
        &self.options
    }

    /// Parse a document of the given format.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Xml`] if the document is malformed, has the wrong
    /// root element or does not match the record schema.
    pub fn parse(&self, format: FileFormat, bytes: &[u8]) -> Result<ResourceFile> {
        let root = parse_document(bytes)?;
        let expected = format.root_tag();
        let path = ElementPath::root(expected);
        if root.name != expected {
            return Err(XmlError::schema(
                &path,
                format!("expected root <{expected}>, got <{}>", root.name),
            )
            .into());
        }
        let resource = match format {
            FileFormat::Bounds => ResourceFile::Bounds(BoundFile::from_element(&root, &path)?),
            FileFormat::Drawable => ResourceFile::Drawable(Drawable::from_element(&root, &path)?),
            FileFormat::DrawableDictionary => {
                ResourceFile::DrawableDictionary(DrawableDictionary::from_element(&root, &path)?)
            }
            FileFormat::ClothDictionary => {
                ResourceFile::ClothDictionary(ClothDictionary::from_element(&root, &path)?)
            }
            FileFormat::Fragment => ResourceFile::Fragment(Fragment::from_element(&root, &path)?),
        };
        debug!(%format, "parsed resource");
        Ok(resource)
    }

    /// Recompute derived fields and check invariants.
    ///
    /// # Errors
    ///
    /// Returns the first validation or capacity error.
    pub fn refresh(&self, resource: &mut ResourceFile) -> Result<()> {
        match resource {
            ResourceFile::Bounds(file) => file.bounds.refresh(),
            ResourceFile::Drawable(drawable) => drawable.refresh(&self.catalogue, &self.options)?,
            ResourceFile::DrawableDictionary(dictionary) => {
                dictionary.refresh(&self.catalogue, &self.options)?;
            }
            ResourceFile::ClothDictionary(dictionary) => dictionary.refresh()?,
            ResourceFile::Fragment(fragment) => fragment.refresh(&self.catalogue, &self.options)?,
        }
        Ok(())
    }

    /// Serialise the IR as given. Dictionaries are written in hash order when
    /// [`CodecOptions::sort_dictionaries`] is set; the IR is not reordered.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Xml`] if the emitter fails.
    pub fn emit(&self, resource: &ResourceFile) -> Result<Vec<u8>> {
        let tag = resource.format().root_tag();
        let element = match resource {
            ResourceFile::Bounds(file) => file.to_element(tag),
            ResourceFile::Drawable(drawable) => drawable.to_element(tag),
            ResourceFile::DrawableDictionary(dictionary) if self.options.sort_dictionaries => {
                dictionary.sorted().to_element(tag)
            }
            ResourceFile::DrawableDictionary(dictionary) => dictionary.to_element(tag),
            ResourceFile::ClothDictionary(dictionary) if self.options.sort_dictionaries => {
                dictionary.sorted().to_element(tag)
            }
            ResourceFile::ClothDictionary(dictionary) => dictionary.to_element(tag),
            ResourceFile::Fragment(fragment) => fragment.to_element(tag),
        };
        let element = element.unwrap_or_else(|| Element::new(tag));
        Ok(write_document(&element)?)
    }

    /// Refresh, then emit.
    ///
    /// # Errors
    ///
    /// Returns the first refresh or emission error.
    pub fn export(&self, resource: &mut ResourceFile) -> Result<Vec<u8>> {
        self.refresh(resource)?;
        self.emit(resource)
    }

    /// Read and parse a file, choosing the format from its suffix.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFile`] for an unknown suffix,
    /// [`Error::Io`] if the file cannot be read, or a parse error.
    pub fn read_file(&self, path: &Path) -> Result<ResourceFile> {
        let format = FileFormat::from_path(path).ok_or_else(|| Error::UnsupportedFile {
            path: path.display().to_string(),
        })?;
        let bytes = std::fs::read(path).map_err(|e| Error::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        debug!(path = %path.display(), bytes = bytes.len(), "read resource file");
        self.parse(format, &bytes)
    }

    /// Emit `resource` and write it to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFile`] if the suffix of `path` does not
    /// match the resource's format, [`Error::Io`] if the write fails, or an
    /// emission error.
    pub fn write_file(&self, path: &Path, resource: &ResourceFile) -> Result<()> {
        if FileFormat::from_path(path) != Some(resource.format()) {
            return Err(Error::UnsupportedFile {
                path: path.display().to_string(),
            });
        }
        let bytes = self.emit(resource)?;
        std::fs::write(path, &bytes).map_err(|e| Error::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        debug!(path = %path.display(), bytes = bytes.len(), "wrote resource file");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use glam::Vec3;

    use super::*;
    use crate::bound::BoundKind;
    use crate::cloth::CharacterCloth;
    use crate::hash::joaat;

    const S1: &str = r#"<BoundsFile><Bounds type="Composite"><Children><Item type="Box"><BoxMin x="-1" y="-1" z="-1"/><BoxMax x="1" y="1" z="1"/></Item><Item type="None"/></Children></Bounds></BoundsFile>"#;

    fn codec() -> Codec {
        Codec::new().unwrap()
    }

    fn composite(resource: &ResourceFile) -> &crate::bound::BoundComposite {
        match resource {
            ResourceFile::Bounds(BoundFile {
                bounds: Bound::Composite(composite),
            }) => composite,
            other => panic!("unexpected resource: {other:?}"),
        }
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            FileFormat::from_path(Path::new("dir/prop.YDR.xml")),
            Some(FileFormat::Drawable)
        );
        assert_eq!(
            FileFormat::from_path(Path::new("mp_f_freemode_01.yld.xml")),
            Some(FileFormat::ClothDictionary)
        );
        assert_eq!(FileFormat::from_path(Path::new("prop.ydr")), None);
        assert_eq!(FileFormat::from_path(Path::new("prop.xml")), None);
    }

    #[test]
    fn test_bound_file_keeps_null_children() {
        let codec = codec();
        let resource = codec.parse(FileFormat::Bounds, S1.as_bytes()).unwrap();
        let bounds = composite(&resource);
        assert_eq!(bounds.child_count(), 2);
        let first = bounds.children[0].as_ref().unwrap();
        assert_eq!(first.kind(), BoundKind::Box);
        assert_eq!(first.base().box_min, Vec3::splat(-1.0));
        assert_eq!(first.base().box_max, Vec3::splat(1.0));
        assert!(bounds.children[1].is_none());

        let bytes = codec.emit(&resource).unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.contains(r#"<Item type="None" />"#));
        let again = codec.parse(FileFormat::Bounds, &bytes).unwrap();
        assert_eq!(again, resource);
    }

    #[test]
    fn test_emit_is_stable() {
        let codec = codec();
        let resource = codec.parse(FileFormat::Bounds, S1.as_bytes()).unwrap();
        let first = codec.emit(&resource).unwrap();
        let second = codec
            .emit(&codec.parse(FileFormat::Bounds, &first).unwrap())
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_wrong_root_tag() {
        let result = codec().parse(FileFormat::Drawable, S1.as_bytes());
        match result {
            Err(Error::Xml(XmlError::SchemaViolation { element, .. })) => {
                assert_eq!(element.as_str(), "Drawable");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_missing_bounds_child() {
        let result = codec().parse(FileFormat::Bounds, b"<BoundsFile />");
        assert!(matches!(
            result,
            Err(Error::Xml(XmlError::SchemaViolation { .. }))
        ));
    }

    #[test]
    fn test_emit_sorts_dictionary_without_reordering() {
        let names = ["skirt", "cape", "scarf", "apron"];
        let resource = ResourceFile::ClothDictionary(ClothDictionary {
            cloths: names
                .iter()
                .map(|name| CharacterCloth {
                    name: (*name).to_string(),
                    ..CharacterCloth::default()
                })
                .collect(),
        });
        let codec = codec();
        let bytes = codec.emit(&resource).unwrap();
        let ResourceFile::ClothDictionary(emitted) =
            codec.parse(FileFormat::ClothDictionary, &bytes).unwrap()
        else {
            panic!("wrong format");
        };
        let hashes: Vec<u32> = emitted.cloths.iter().map(|c| joaat(&c.name)).collect();
        assert!(hashes.windows(2).all(|w| w[0] < w[1]));

        let ResourceFile::ClothDictionary(original) = &resource else {
            unreachable!();
        };
        assert_eq!(original.cloths[0].name, "skirt");

        let unsorted = codec.clone().with_options(CodecOptions {
            sort_dictionaries: false,
            ..CodecOptions::default()
        });
        let ResourceFile::ClothDictionary(kept) = unsorted
            .parse(FileFormat::ClothDictionary, &unsorted.emit(&resource).unwrap())
            .unwrap()
        else {
            panic!("wrong format");
        };
        let kept: Vec<&str> = kept.cloths.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(kept, names);
    }

    #[test]
    fn test_export_refreshes_bounds() {
        let codec = codec();
        let mut resource = codec.parse(FileFormat::Bounds, S1.as_bytes()).unwrap();
        codec.export(&mut resource).unwrap();
        let bounds = composite(&resource);
        assert_eq!(bounds.base.box_min, Vec3::splat(-1.0));
        assert_eq!(bounds.base.box_max, Vec3::splat(1.0));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = std::env::temp_dir().join(format!("rage-resource-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path: PathBuf = dir.join("test.ybn.xml");
        let codec = codec();
        let resource = codec.parse(FileFormat::Bounds, S1.as_bytes()).unwrap();
        codec.write_file(&path, &resource).unwrap();
        assert_eq!(codec.read_file(&path).unwrap(), resource);

        assert!(matches!(
            codec.write_file(&dir.join("test.ydr.xml"), &resource),
            Err(Error::UnsupportedFile { .. })
        ));
        assert!(matches!(
            codec.read_file(&dir.join("missing.ybn.xml")),
            Err(Error::Io { .. })
        ));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
