//! Drawables: renderable models with their shaders, skeleton and bounds.

mod buffers;
mod light;
mod model;
mod shader;
mod texture;

pub use buffers::{
    ComponentType, IndexBuffer, LayoutFamily, MAX_VERTICES, VertexAttribute, VertexBuffer,
    VertexColumn, VertexLayout,
};
pub use light::{Light, LightType, Rgb};
pub use model::{DrawableModel, Geometry};
pub use shader::{ParameterKind, ParameterValue, Shader, ShaderGroup, ShaderParameter};
pub use texture::Texture;

use cwxml::{ElementPath, Field, ITEM_TAG, Record};
use glam::Vec3;
use tracing::{debug, warn};

use crate::bound::Bound;
use crate::catalogue::ShaderCatalogue;
use crate::error::{Error, Result};
use crate::format::CodecOptions;
use crate::skeleton::{Joints, Skeleton};

/// Level of detail of a model list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LodLevel {
    High,
    Medium,
    Low,
    VeryLow,
}

impl LodLevel {
    pub const ALL: [LodLevel; 4] = [
        LodLevel::High,
        LodLevel::Medium,
        LodLevel::Low,
        LodLevel::VeryLow,
    ];

    /// Position in [`LodLevel::ALL`].
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Element holding the model list of this level.
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            LodLevel::High => "DrawableModelsHigh",
            LodLevel::Medium => "DrawableModelsMedium",
            LodLevel::Low => "DrawableModelsLow",
            LodLevel::VeryLow => "DrawableModelsVeryLow",
        }
    }
}

/// Distance used for LOD levels that never switch.
pub const DEFAULT_LOD_DISTANCE: f32 = 9998.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Drawable {
    pub name: String,
    pub bounding_sphere_center: Vec3,
    pub bounding_sphere_radius: f32,
    pub bbox_min: Vec3,
    pub bbox_max: Vec3,
    pub lod_dist_high: f32,
    pub lod_dist_med: f32,
    pub lod_dist_low: f32,
    pub lod_dist_vlow: f32,
    pub flags_high: u32,
    pub flags_med: u32,
    pub flags_low: u32,
    pub flags_vlow: u32,
    pub shader_group: ShaderGroup,
    pub skeleton: Option<Skeleton>,
    pub joints: Option<Joints>,
    pub models_high: Vec<DrawableModel>,
    pub models_med: Vec<DrawableModel>,
    pub models_low: Vec<DrawableModel>,
    pub models_vlow: Vec<DrawableModel>,
    pub lights: Vec<Light>,
    pub bounds: Option<Bound>,
}

impl Default for Drawable {
    fn default() -> Self {
        Self {
            name: String::new(),
            bounding_sphere_center: Vec3::ZERO,
            bounding_sphere_radius: 0.0,
            bbox_min: Vec3::ZERO,
            bbox_max: Vec3::ZERO,
            lod_dist_high: DEFAULT_LOD_DISTANCE,
            lod_dist_med: DEFAULT_LOD_DISTANCE,
            lod_dist_low: DEFAULT_LOD_DISTANCE,
            lod_dist_vlow: DEFAULT_LOD_DISTANCE,
            flags_high: 0,
            flags_med: 0,
            flags_low: 0,
            flags_vlow: 0,
            shader_group: ShaderGroup::default(),
            skeleton: None,
            joints: None,
            models_high: Vec::new(),
            models_med: Vec::new(),
            models_low: Vec::new(),
            models_vlow: Vec::new(),
            lights: Vec::new(),
            bounds: None,
        }
    }
}

impl Record for Drawable {
    const FIELDS: &'static [Field<Self>] = cwxml::schema!(Drawable {
        Text "Name" => name,
        Vector "BoundingSphereCenter" => bounding_sphere_center,
        Value "BoundingSphereRadius" => bounding_sphere_radius,
        Vector "BoundingBoxMin" => bbox_min,
        Vector "BoundingBoxMax" => bbox_max,
        Value "LodDistHigh" => lod_dist_high,
        Value "LodDistMed" => lod_dist_med,
        Value "LodDistLow" => lod_dist_low,
        Value "LodDistVlow" => lod_dist_vlow,
        Value "FlagsHigh" => flags_high,
        Value "FlagsMed" => flags_med,
        Value "FlagsLow" => flags_low,
        Value "FlagsVlow" => flags_vlow,
        Nested "ShaderGroup" => shader_group,
        OptChild "Skeleton" => skeleton,
        OptChild "Joints" => joints,
        Items "DrawableModelsHigh" => models_high,
        Items "DrawableModelsMedium" => models_med,
        Items "DrawableModelsLow" => models_low,
        Items "DrawableModelsVeryLow" => models_vlow,
        Items "Lights" => lights,
        OptChild "Bounds" => bounds,
    });
}

impl Drawable {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn lod(&self, level: LodLevel) -> &[DrawableModel] {
        match level {
            LodLevel::High => &self.models_high,
            LodLevel::Medium => &self.models_med,
            LodLevel::Low => &self.models_low,
            LodLevel::VeryLow => &self.models_vlow,
        }
    }

    pub fn lod_mut(&mut self, level: LodLevel) -> &mut Vec<DrawableModel> {
        match level {
            LodLevel::High => &mut self.models_high,
            LodLevel::Medium => &mut self.models_med,
            LodLevel::Low => &mut self.models_low,
            LodLevel::VeryLow => &mut self.models_vlow,
        }
    }

    /// Every model with its level, highest detail first.
    pub fn all_models(&self) -> impl Iterator<Item = (LodLevel, &DrawableModel)> {
        LodLevel::ALL
            .into_iter()
            .flat_map(move |level| self.lod(level).iter().map(move |m| (level, m)))
    }

    /// Every geometry of every level.
    pub fn all_geometries(&self) -> impl Iterator<Item = &Geometry> {
        self.all_models().flat_map(|(_, m)| m.geometries.iter())
    }

    /// Recompute derived fields and check cross-record invariants.
    ///
    /// Updates geometry and drawable extents, the `flags_*` model counters,
    /// skeleton links, tags (when enabled), limit flags and checksums (when
    /// enabled), drops duplicate textures and puts shader parameters in
    /// catalogue order. Bounds are refreshed last.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if a geometry references a missing
    /// shader, a level holds more than one skinned model or the skeleton is
    /// malformed.
    pub fn refresh(&mut self, catalogue: &ShaderCatalogue, options: &CodecOptions) -> Result<()> {
        for level in LodLevel::ALL {
            for model in self.lod_mut(level) {
                for geometry in &mut model.geometries {
                    geometry.refresh_extents();
                }
            }
        }
        self.refresh_extents();
        self.flags_high = self.models_high.len() as u32;
        self.flags_med = self.models_med.len() as u32;
        self.flags_low = self.models_low.len() as u32;
        self.flags_vlow = self.models_vlow.len() as u32;
        self.validate_models()?;

        if let Some(skeleton) = &mut self.skeleton {
            skeleton.link();
            if options.auto_bone_tags {
                skeleton.assign_tags();
            }
            if let Some(joints) = &self.joints {
                joints.apply_limit_flags(skeleton);
            }
            skeleton.validate()?;
            if options.recompute_skeleton_checksums {
                skeleton.apply_checksums();
            }
        }

        let removed = self.shader_group.dedup_textures();
        if removed > 0 {
            debug!(drawable = %self.name, removed, "dropped duplicate textures");
        }
        for shader in &mut self.shader_group.shaders {
            order_parameters(shader, catalogue);
        }

        if let Some(bounds) = &mut self.bounds {
            bounds.refresh();
        }
        Ok(())
    }

    fn refresh_extents(&mut self) {
        let level = LodLevel::ALL
            .into_iter()
            .find(|&l| self.lod(l).iter().any(|m| m.extents().is_some()));
        let Some(level) = level else {
            return;
        };
        let Some((min, max)) = self
            .lod(level)
            .iter()
            .filter_map(DrawableModel::extents)
            .reduce(|(amin, amax), (bmin, bmax)| (amin.min(bmin), amax.max(bmax)))
        else {
            return;
        };
        let center = (min + max) * 0.5;
        let radius = self
            .lod(level)
            .iter()
            .flat_map(|m| m.geometries.iter())
            .flat_map(|g| g.vertex_buffer.positions().iter())
            .map(|p| p.distance(center))
            .fold(0.0f32, f32::max);
        self.bbox_min = min;
        self.bbox_max = max;
        self.bounding_sphere_center = center;
        self.bounding_sphere_radius = radius;
    }

    fn validate_models(&self) -> Result<()> {
        let root = ElementPath::root("Drawable");
        let shader_count = self.shader_group.shaders.len();
        for level in LodLevel::ALL {
            let list = root.child(level.tag());
            let skinned = self.lod(level).iter().filter(|m| m.has_skin).count();
            if skinned > 1 {
                return Err(Error::validation(
                    &list,
                    format!("{skinned} skinned models in one level"),
                ));
            }
            for (i, model) in self.lod(level).iter().enumerate() {
                for (j, geometry) in model.geometries.iter().enumerate() {
                    if usize::from(geometry.shader_index) >= shader_count {
                        return Err(Error::validation(
                            &list
                                .item(ITEM_TAG, i)
                                .child("Geometries")
                                .item(ITEM_TAG, j)
                                .child("ShaderIndex"),
                            format!(
                                "shader {} out of range for {shader_count} shaders",
                                geometry.shader_index
                            ),
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Sort parameters into catalogue order. Parameters the catalogue does not
/// know keep their relative order after the known ones.
fn order_parameters(shader: &mut Shader, catalogue: &ShaderCatalogue) {
    let Ok(def) = catalogue.resolve(&shader.filename) else {
        warn!(filename = %shader.filename, "shader not in catalogue; parameter order kept");
        return;
    };
    shader
        .parameters
        .sort_by_key(|p| def.parameter_rank(&p.name).unwrap_or(usize::MAX));
}
