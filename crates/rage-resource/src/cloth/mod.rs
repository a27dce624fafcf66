//! Cloth resources.
//!
//! Two flavours share the same controller and verlet graph:
//!
//! - **Character cloth** lives in a cloth dictionary next to a ped drawable.
//!   Each cloth vertex is skinned to up to four bones.
//! - **Environment cloth** lives inside a fragment and carries its own
//!   rendered drawable plus a small block of tuning values.
//!
//! # Design principles
//!
//! - Capacity limits are checked by `validate`, not by the codec, so a file
//!   over the limit still parses and can be inspected.
//! - Derived values (boxes, bridge counts) are recomputed by `refresh`.

mod controller;
mod verlet;

pub use controller::{
    CharacterClothBinding, CharacterClothController, ClothBridge, ClothController,
    MorphController,
};
pub use verlet::{Edge, LANE_WIDTH, PADDING_LENGTH_SQR, VerletCloth, lane_conflict};

use cwxml::property::{NUMBERS_PER_LINE, text_of};
use cwxml::{
    Element, ElementPath, Field, Record, XMLNode, XmlElement, XmlResult, format_flat, parse_flat,
};
use glam::{Mat4, Vec3, Vec4};

use crate::bound::Bound;
use crate::catalogue::ShaderCatalogue;
use crate::drawable::Drawable;
use crate::error::{Error, Result};
use crate::format::CodecOptions;

/// Largest vertex count of a character cloth.
pub const CHARACTER_CLOTH_MAX_VERTICES: usize = 254;

/// Largest vertex count of an environment cloth.
pub const ENVIRONMENT_CLOTH_MAX_VERTICES: usize = 1000;

/// Bits per vertex id in the packed wind feedback trio.
const WIND_FEEDBACK_BITS: u32 = 10;
const WIND_FEEDBACK_MASK: u32 = (1 << WIND_FEEDBACK_BITS) - 1;

fn check_capacity(what: &'static str, count: usize, limit: usize) -> Result<()> {
    if count > limit {
        return Err(Error::CapacityExceeded { what, count, limit });
    }
    Ok(())
}

/// Cloth simulated on a character and skinned to its skeleton.
#[derive(Debug, Clone, PartialEq)]
pub struct CharacterCloth {
    pub name: String,
    pub parent_matrix: Mat4,
    pub poses: Vec<Vec4>,
    pub bounds_bone_ids: Vec<u32>,
    pub bounds_bone_indices: Vec<u32>,
    pub controller: CharacterClothController,
    pub bounds: Option<Bound>,
}

impl Default for CharacterCloth {
    fn default() -> Self {
        Self {
            name: String::new(),
            parent_matrix: Mat4::IDENTITY,
            poses: Vec::new(),
            bounds_bone_ids: Vec::new(),
            bounds_bone_indices: Vec::new(),
            controller: CharacterClothController::default(),
            bounds: None,
        }
    }
}

impl Record for CharacterCloth {
    const FIELDS: &'static [Field<Self>] = cwxml::schema!(CharacterCloth {
        Text "Name" => name,
        Matrix "ParentMatrix" => parent_matrix,
        Rows "Poses" => poses,
        Numbers "BoundsBoneIDs" => bounds_bone_ids,
        Numbers "BoundsBoneIndices" => bounds_bone_indices,
        Nested "Controller" => controller,
        OptChild "Bounds" => bounds,
    });
}

impl CharacterCloth {
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.controller.base.vertex_count()
    }

    pub fn refresh(&mut self) {
        self.controller.base.refresh();
        if let Some(bounds) = &mut self.bounds {
            bounds.refresh();
        }
    }

    /// # Errors
    ///
    /// Returns [`Error::CapacityExceeded`] above
    /// [`CHARACTER_CLOTH_MAX_VERTICES`] and [`Error::Validation`] when the
    /// controller or the bound bone tables are inconsistent.
    pub fn validate(&self, path: &ElementPath) -> Result<()> {
        check_capacity(
            "character cloth vertex",
            self.vertex_count(),
            CHARACTER_CLOTH_MAX_VERTICES,
        )?;
        if self.bounds_bone_ids.len() != self.bounds_bone_indices.len() {
            return Err(Error::validation(
                &path.child("BoundsBoneIndices"),
                format!(
                    "{} bone indices for {} bone ids",
                    self.bounds_bone_indices.len(),
                    self.bounds_bone_ids.len()
                ),
            ));
        }
        self.controller.validate(&path.child("Controller"))
    }
}

/// Simulation tunables of an environment cloth.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClothTuning {
    pub flags: u32,
    pub extra_force: Vec3,
    pub weight: f32,
    pub distance_threshold: f32,
    pub rotation_rate: f32,
    pub angle_threshold: f32,
    /// Three vertex ids packed ten bits apart.
    pub wind_feedback: u32,
}

impl Record for ClothTuning {
    const FIELDS: &'static [Field<Self>] = cwxml::schema!(ClothTuning {
        Value "Flags" => flags,
        Vector "ExtraForce" => extra_force,
        Value "Weight" => weight,
        Value "DistanceThreshold" => distance_threshold,
        Value "RotationRate" => rotation_rate,
        Value "AngleThreshold" => angle_threshold,
        Value "WindFeedback" => wind_feedback,
    });
}

impl ClothTuning {
    /// The packed wind feedback vertex ids.
    #[must_use]
    pub fn wind_feedback_vertices(&self) -> [u16; 3] {
        [0, 1, 2].map(|slot| {
            ((self.wind_feedback >> (slot * WIND_FEEDBACK_BITS)) & WIND_FEEDBACK_MASK) as u16
        })
    }

    /// Pack three vertex ids into `wind_feedback`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if an id does not fit in ten bits.
    pub fn set_wind_feedback(&mut self, vertices: [u16; 3]) -> Result<()> {
        let mut packed = 0;
        for (slot, vertex) in (0u32..).zip(vertices) {
            let vertex = u32::from(vertex);
            if vertex > WIND_FEEDBACK_MASK {
                return Err(Error::configuration(format!(
                    "wind feedback vertex {vertex} does not fit in {WIND_FEEDBACK_BITS} bits"
                )));
            }
            packed |= vertex << (slot * WIND_FEEDBACK_BITS);
        }
        self.wind_feedback = packed;
        Ok(())
    }
}

/// Per-vertex force transform modes in cloth order.
///
/// Written as `<UnknownData>` only when some vertex is non-zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForceTransforms(pub Vec<u8>);

impl ForceTransforms {
    /// Largest valid mode.
    pub const MAX_MODE: u8 = 2;

    #[must_use]
    pub fn is_all_zero(&self) -> bool {
        self.0.iter().all(|&v| v == 0)
    }
}

impl XmlElement for ForceTransforms {
    fn from_element(element: &Element, path: &ElementPath) -> XmlResult<Self> {
        parse_flat(&text_of(element), path).map(ForceTransforms)
    }

    fn to_element(&self, tag: &str) -> Option<Element> {
        if self.is_all_zero() {
            return None;
        }
        let mut element = Element::new(tag);
        element
            .children
            .push(XMLNode::Text(format_flat(&self.0, NUMBERS_PER_LINE)));
        Some(element)
    }
}

/// Cloth attached to a fragment, rendered by its own drawable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvironmentCloth {
    pub flags: u32,
    pub tuning: Option<ClothTuning>,
    pub drawable: Option<Drawable>,
    pub controller: ClothController,
    pub force_transforms: ForceTransforms,
}

impl Record for EnvironmentCloth {
    const FIELDS: &'static [Field<Self>] = cwxml::schema!(EnvironmentCloth {
        Value "Flags" => flags,
        OptChild "Tuning" => tuning,
        OptChild "Drawable" => drawable,
        Nested "Controller" => controller,
        Nested "UnknownData" => force_transforms,
    });
}

impl EnvironmentCloth {
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.controller.vertex_count()
    }

    /// Refresh the controller and the embedded drawable.
    ///
    /// # Errors
    ///
    /// Propagates [`Drawable::refresh`] failures.
    pub fn refresh(&mut self, catalogue: &ShaderCatalogue, options: &CodecOptions) -> Result<()> {
        self.controller.refresh();
        if let Some(drawable) = &mut self.drawable {
            drawable.refresh(catalogue, options)?;
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`Error::CapacityExceeded`] above
    /// [`ENVIRONMENT_CLOTH_MAX_VERTICES`] and [`Error::Validation`] when
    /// the controller, the force transforms or the wind feedback ids are
    /// inconsistent with the vertex count.
    pub fn validate(&self, path: &ElementPath) -> Result<()> {
        let count = self.vertex_count();
        check_capacity("environment cloth vertex", count, ENVIRONMENT_CLOTH_MAX_VERTICES)?;
        self.controller.validate(&path.child("Controller"))?;

        let modes = &self.force_transforms.0;
        if !modes.is_empty() && modes.len() != count {
            return Err(Error::validation(
                &path.child("UnknownData"),
                format!("{} force transforms for {count} vertices", modes.len()),
            ));
        }
        if let Some(bad) = modes.iter().find(|&&m| m > ForceTransforms::MAX_MODE) {
            return Err(Error::validation(
                &path.child("UnknownData"),
                format!("force transform mode {bad} is not 0, 1 or 2"),
            ));
        }

        let wind = self
            .tuning
            .as_ref()
            .filter(|t| t.wind_feedback != 0)
            .map(ClothTuning::wind_feedback_vertices);
        if let Some(bad) = wind.iter().flatten().find(|&&v| usize::from(v) >= count) {
            return Err(Error::validation(
                &path.child("Tuning").child("WindFeedback"),
                format!("wind feedback vertex {bad} out of range for {count} vertices"),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use cwxml::{parse_document, write_document};

    use super::*;

    fn grid_cloth(count: usize) -> VerletCloth {
        VerletCloth {
            vertex_positions: (0..count).map(|i| Vec3::new(i as f32, 0.0, 0.0)).collect(),
            ..VerletCloth::default()
        }
    }

    #[test]
    fn test_character_cloth_capacity() {
        let mut cloth = CharacterCloth::default();
        cloth.controller.base.cloth_high = grid_cloth(255);
        match cloth.validate(&ElementPath::root("Item")) {
            Err(Error::CapacityExceeded { count, limit, .. }) => {
                assert_eq!(count, 255);
                assert_eq!(limit, CHARACTER_CLOTH_MAX_VERTICES);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_environment_cloth_capacity() {
        let mut cloth = EnvironmentCloth::default();
        cloth.controller.cloth_high = grid_cloth(1001);
        assert!(matches!(
            cloth.validate(&ElementPath::root("Item")),
            Err(Error::CapacityExceeded { limit: 1000, .. })
        ));
        cloth.controller.cloth_high = grid_cloth(1000);
        assert!(cloth.validate(&ElementPath::root("Item")).is_ok());
    }

    #[test]
    fn test_wind_feedback_packing() {
        let mut tuning = ClothTuning::default();
        tuning.set_wind_feedback([5, 999, 1]).unwrap();
        assert_eq!(tuning.wind_feedback, 5 | (999 << 10) | (1 << 20));
        assert_eq!(tuning.wind_feedback_vertices(), [5, 999, 1]);
        assert!(matches!(
            tuning.set_wind_feedback([1024, 0, 0]),
            Err(Error::Configuration { .. })
        ));
    }

    #[test]
    fn test_force_transforms_omitted_when_zero() {
        let cloth = EnvironmentCloth {
            force_transforms: ForceTransforms(vec![0, 0, 0]),
            ..EnvironmentCloth::default()
        };
        let element = cloth.to_element("Item").unwrap();
        assert!(element.get_child("UnknownData").is_none());
        assert!(element.get_child("Controller").is_some());
    }

    #[test]
    fn test_force_transforms_round_trip() {
        let cloth = EnvironmentCloth {
            controller: ClothController {
                cloth_high: grid_cloth(3),
                ..ClothController::default()
            },
            force_transforms: ForceTransforms(vec![0, 2, 1]),
            ..EnvironmentCloth::default()
        };
        let bytes = write_document(&cloth.to_element("Item").unwrap()).unwrap();
        let root = parse_document(&bytes).unwrap();
        let again = EnvironmentCloth::from_element(&root, &ElementPath::root("Item")).unwrap();
        assert_eq!(again.force_transforms, ForceTransforms(vec![0, 2, 1]));
        assert!(again.validate(&ElementPath::root("Item")).is_ok());
    }

    #[test]
    fn test_bad_force_transform_mode() {
        let cloth = EnvironmentCloth {
            controller: ClothController {
                cloth_high: grid_cloth(2),
                ..ClothController::default()
            },
            force_transforms: ForceTransforms(vec![3, 0]),
            ..EnvironmentCloth::default()
        };
        assert!(matches!(
            cloth.validate(&ElementPath::root("Item")),
            Err(Error::Validation { .. })
        ));
    }

    #[test]
    fn test_character_cloth_parent_matrix_defaults_to_identity() {
        let root = parse_document(b"<Item><Name>skirt</Name></Item>").unwrap();
        let cloth = CharacterCloth::from_element(&root, &ElementPath::root("Item")).unwrap();
        assert_eq!(cloth.name, "skirt");
        assert_eq!(cloth.parent_matrix, Mat4::IDENTITY);
    }
}
