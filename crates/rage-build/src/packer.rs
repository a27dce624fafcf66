//! Vertex and index buffer packing.
//!
//! [`DrawableBuilder`] turns [`MeshObject`]s into drawable models:
//!
//! 1. Each mesh is split by shader. Every triangle corner is materialised
//!    into one column per attribute of the shader's vertex layout.
//! 2. Skinned meshes of one level are merged per shader into a single
//!    skinned model. Unskinned meshes form one model per parent bone.
//! 3. Corners are deduplicated with a six decimal tolerance, giving the
//!    vertex buffer and an index buffer.
//! 4. A geometry that would exceed [`MAX_VERTICES`] is split greedily into
//!    several, each indexed from zero.
//!
//! Recoverable problems are collected in [`PackDiagnostics`] and logged.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use glam::{Vec2, Vec3, Vec4};
use rage_resource::catalogue::ShaderCatalogue;
use rage_resource::drawable::{
    Drawable, DrawableModel, Geometry, IndexBuffer, LayoutFamily, LodLevel, MAX_VERTICES, Shader,
    VertexAttribute, VertexBuffer, VertexColumn, VertexLayout,
};
use rage_resource::skeleton::Skeleton;
use rage_resource::{CodecOptions, Error, Result};
use tracing::{debug, warn};

use crate::dedup::dedup_rows;
use crate::mesh::MeshObject;
use crate::skin::{MAX_INFLUENCES, SkinWeights};
use crate::tangents::corner_tangents;

/// Most bones one geometry's blend indices can address.
pub const MAX_GEOMETRY_BONES: usize = 255;

/// Blend slot with no influence.
const NO_BONE: u16 = u16::MAX;

/// A recoverable packing problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackWarning {
    /// The shader is not in the catalogue; a position and normal layout was used.
    UnresolvedShader { filename: String },
    /// Skinned vertices without any mapped group were bound rigidly to bone 0.
    UngroupedVertices { mesh: String, count: usize },
    /// The layout needs tangents but the mesh has no UV layer; tangents are zero.
    MissingUvLayer { mesh: String },
    /// Tangent generation failed; tangents are zero.
    TangentsFailed { mesh: String },
    /// A geometry was split to respect the vertex buffer limit.
    GeometrySplit {
        lod: LodLevel,
        shader_index: u16,
        parts: usize,
    },
}

impl fmt::Display for PackWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackWarning::UnresolvedShader { filename } => {
                write!(f, "shader '{filename}' not in catalogue, using position and normal")
            }
            PackWarning::UngroupedVertices { mesh, count } => {
                write!(f, "mesh '{mesh}': {count} vertices in no bone group, bound to bone 0")
            }
            PackWarning::MissingUvLayer { mesh } => {
                write!(f, "mesh '{mesh}': no UV layer for tangents, writing zero tangents")
            }
            PackWarning::TangentsFailed { mesh } => {
                write!(f, "mesh '{mesh}': tangent generation failed, writing zero tangents")
            }
            PackWarning::GeometrySplit {
                lod,
                shader_index,
                parts,
            } => write!(
                f,
                "{lod:?} geometry for shader {shader_index} split into {parts} parts"
            ),
        }
    }
}

/// Warnings collected while packing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackDiagnostics {
    pub warnings: Vec<PackWarning>,
}

impl PackDiagnostics {
    fn warn(&mut self, warning: PackWarning) {
        if !self.warnings.contains(&warning) {
            warn!("{warning}");
            self.warnings.push(warning);
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Layout used for shaders the catalogue cannot resolve.
#[must_use]
pub fn fallback_layout() -> VertexLayout {
    VertexLayout::new(
        LayoutFamily::Gtav1,
        vec![VertexAttribute::Position, VertexAttribute::Normal],
    )
}

/// Linear colour channel to an sRGB byte.
#[must_use]
pub fn linear_to_srgb(value: f32) -> u8 {
    let value = value.clamp(0.0, 1.0);
    let encoded = if value <= 0.003_130_8 {
        value * 12.92
    } else {
        1.055 * value.powf(1.0 / 2.4) - 0.055
    };
    (encoded * 255.0).round() as u8
}

fn colour_bytes(colour: Vec4) -> [u8; 4] {
    [
        linear_to_srgb(colour.x),
        linear_to_srgb(colour.y),
        linear_to_srgb(colour.z),
        (colour.w.clamp(0.0, 1.0) * 255.0).round() as u8,
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum BatchKey {
    Skinned { shader_index: u16 },
    Rigid { bone_index: u16, shader_index: u16 },
}

impl BatchKey {
    fn shader_index(self) -> u16 {
        match self {
            BatchKey::Skinned { shader_index } | BatchKey::Rigid { shader_index, .. } => {
                shader_index
            }
        }
    }
}

/// Corners gathered for one future geometry.
#[derive(Debug)]
struct Batch {
    layout: VertexLayout,
    columns: Vec<VertexColumn>,
    /// Bone of each blend slot per corner, [`NO_BONE`] for empty slots.
    bones: Vec<[u16; MAX_INFLUENCES]>,
}

impl Batch {
    fn new(layout: VertexLayout) -> Self {
        let columns = layout
            .attributes
            .iter()
            .map(|&a| VertexColumn::for_attribute(a))
            .collect();
        Self {
            layout,
            columns,
            bones: Vec::new(),
        }
    }

    fn corner_count(&self) -> usize {
        self.columns.first().map_or(0, VertexColumn::len)
    }
}

/// Per-mesh values shared by every shader group of the mesh.
struct MeshStreams {
    normals: Vec<Vec3>,
    tangents: Option<Vec<Vec4>>,
    skin: Vec<SkinWeights>,
}

/// Assembles a drawable from meshes.
pub struct DrawableBuilder<'a> {
    catalogue: &'a ShaderCatalogue,
    drawable: Drawable,
    batches: [BTreeMap<BatchKey, Batch>; 4],
    diagnostics: PackDiagnostics,
}

impl<'a> DrawableBuilder<'a> {
    #[must_use]
    pub fn new(catalogue: &'a ShaderCatalogue, name: impl Into<String>) -> Self {
        Self {
            catalogue,
            drawable: Drawable::new(name),
            batches: Default::default(),
            diagnostics: PackDiagnostics::default(),
        }
    }

    /// Add a catalogue shader with default parameters and return its index.
    /// Unknown filenames are kept with no parameters and reported.
    pub fn add_shader(&mut self, filename: &str) -> u16 {
        let shader = self.catalogue.instantiate(filename).unwrap_or_else(|_| {
            self.diagnostics.warn(PackWarning::UnresolvedShader {
                filename: filename.to_string(),
            });
            Shader {
                name: filename
                    .split_once('.')
                    .map_or(filename, |(stem, _)| stem)
                    .to_string(),
                filename: filename.to_string(),
                ..Shader::default()
            }
        });
        self.add_shader_instance(shader)
    }

    /// Add a prepared shader and return its index.
    pub fn add_shader_instance(&mut self, shader: Shader) -> u16 {
        let shaders = &mut self.drawable.shader_group.shaders;
        shaders.push(shader);
        (shaders.len() - 1) as u16
    }

    pub fn set_skeleton(&mut self, skeleton: Skeleton) {
        self.drawable.skeleton = Some(skeleton);
    }

    pub fn set_lod_distance(&mut self, lod: LodLevel, distance: f32) {
        match lod {
            LodLevel::High => self.drawable.lod_dist_high = distance,
            LodLevel::Medium => self.drawable.lod_dist_med = distance,
            LodLevel::Low => self.drawable.lod_dist_low = distance,
            LodLevel::VeryLow => self.drawable.lod_dist_vlow = distance,
        }
    }

    #[must_use]
    pub fn diagnostics(&self) -> &PackDiagnostics {
        &self.diagnostics
    }

    fn layout_for(&mut self, shader_index: u16, skinned: bool) -> VertexLayout {
        let filename = &self.drawable.shader_group.shaders[usize::from(shader_index)].filename;
        match self.catalogue.layout_for(filename, skinned) {
            Ok(layout) => layout.clone(),
            Err(_) => {
                let filename = filename.clone();
                self.diagnostics
                    .warn(PackWarning::UnresolvedShader { filename });
                fallback_layout()
            }
        }
    }

    /// Add the triangles of `mesh` to its level.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the mesh is inconsistent or
    /// references a shader that was not added.
    pub fn add_mesh(&mut self, mesh: &MeshObject) -> Result<()> {
        mesh.check()?;
        let shader_count = self.drawable.shader_group.shaders.len();
        if let Some(t) = mesh
            .triangles
            .iter()
            .find(|t| usize::from(t.shader_index) >= shader_count)
        {
            return Err(Error::configuration(format!(
                "mesh '{}' uses shader {} but only {shader_count} were added",
                mesh.name, t.shader_index
            )));
        }

        let mut groups: BTreeMap<u16, Vec<usize>> = BTreeMap::new();
        for (index, triangle) in mesh.triangles.iter().enumerate() {
            groups.entry(triangle.shader_index).or_default().push(index);
        }
        let skinned = mesh.skin.is_some();
        let layouts: Vec<(u16, VertexLayout)> = groups
            .keys()
            .map(|&shader| (shader, self.layout_for(shader, skinned)))
            .collect();
        let streams = self.mesh_streams(mesh, layouts.iter().map(|(_, l)| l));

        for ((shader_index, layout), triangles) in layouts.into_iter().zip(groups.into_values()) {
            let key = if skinned {
                BatchKey::Skinned { shader_index }
            } else {
                BatchKey::Rigid {
                    bone_index: mesh.bone_index,
                    shader_index,
                }
            };
            let batch = self.batches[mesh.lod.index()]
                .entry(key)
                .or_insert_with(|| Batch::new(layout));
            for triangle in triangles {
                for corner in triangle * 3..triangle * 3 + 3 {
                    push_corner(batch, mesh, &streams, corner);
                }
            }
        }
        debug!(mesh = %mesh.name, triangles = mesh.triangles.len(), "added mesh");
        Ok(())
    }

    fn mesh_streams<'l>(
        &mut self,
        mesh: &MeshObject,
        mut layouts: impl Iterator<Item = &'l VertexLayout>,
    ) -> MeshStreams {
        let normals = if mesh.corner_normals.is_empty() {
            mesh.flat_normals()
        } else {
            mesh.corner_normals.clone()
        };

        let needs_tangents = layouts.any(|l| l.contains(VertexAttribute::Tangent));
        let tangents = if !needs_tangents {
            None
        } else if let Some(uvs) = mesh.uv_layers.first() {
            let positions: Vec<Vec3> = (0..mesh.corner_count())
                .map(|c| mesh.positions[mesh.corner_vertex(c)])
                .collect();
            let tangents = corner_tangents(&positions, &normals, uvs);
            if tangents.is_none() {
                self.diagnostics.warn(PackWarning::TangentsFailed {
                    mesh: mesh.name.clone(),
                });
            }
            tangents
        } else {
            self.diagnostics.warn(PackWarning::MissingUvLayer {
                mesh: mesh.name.clone(),
            });
            None
        };

        let skin = match &mesh.skin {
            Some(skin) => {
                let mut ungrouped = 0;
                let weights = (0..mesh.positions.len())
                    .map(|v| {
                        SkinWeights::quantise(&skin.bone_weights(v)).unwrap_or_else(|| {
                            ungrouped += 1;
                            SkinWeights::rigid(0)
                        })
                    })
                    .collect();
                if ungrouped > 0 {
                    self.diagnostics.warn(PackWarning::UngroupedVertices {
                        mesh: mesh.name.clone(),
                        count: ungrouped,
                    });
                }
                weights
            }
            None => vec![SkinWeights::rigid(mesh.bone_index); mesh.positions.len()],
        };

        MeshStreams {
            normals,
            tangents,
            skin,
        }
    }

    /// Pack every batch into models and refresh the drawable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapacityExceeded`] if a geometry addresses too many
    /// bones, or any error from [`Drawable::refresh`].
    pub fn finish(mut self, options: &CodecOptions) -> Result<(Drawable, PackDiagnostics)> {
        let batches = std::mem::take(&mut self.batches);
        for (lod, batches) in LodLevel::ALL.into_iter().zip(batches) {
            let mut models: Vec<DrawableModel> = Vec::new();
            for (key, batch) in batches {
                let geometries = self.pack_batch(lod, key, batch)?;
                let (has_skin, bone_index) = match key {
                    BatchKey::Skinned { .. } => (true, 0),
                    BatchKey::Rigid { bone_index, .. } => (false, bone_index),
                };
                let position = models
                    .iter()
                    .position(|m| m.has_skin == has_skin && m.bone_index == bone_index)
                    .unwrap_or_else(|| {
                        models.push(DrawableModel {
                            render_mask: 0xFF,
                            has_skin,
                            bone_index,
                            ..DrawableModel::default()
                        });
                        models.len() - 1
                    });
                let model = &mut models[position];
                model.geometries.extend(geometries);
                if has_skin {
                    model.matrix_count = model
                        .geometries
                        .iter()
                        .map(|g| g.bone_ids.len() as u32)
                        .max()
                        .unwrap_or(0);
                }
            }
            *self.drawable.lod_mut(lod) = models;
        }
        self.drawable.refresh(self.catalogue, options)?;
        Ok((self.drawable, self.diagnostics))
    }

    fn pack_batch(&mut self, lod: LodLevel, key: BatchKey, batch: Batch) -> Result<Vec<Geometry>> {
        let skinned = batch.layout.is_skinned();
        let width: usize = batch.layout.attributes.iter().map(|a| a.width()).sum::<usize>()
            + if skinned { MAX_INFLUENCES } else { 0 };
        let corners = batch.corner_count();
        let mut values = Vec::with_capacity(corners * width);
        for corner in 0..corners {
            for column in &batch.columns {
                column.push_row_values(corner, &mut values);
            }
            if skinned {
                values.extend(batch.bones[corner].map(f64::from));
            }
        }
        let dedup = dedup_rows(&values, width);

        // Greedy split: start a new bucket when a triangle would overflow.
        let mut buckets: Vec<(Vec<usize>, Vec<u32>)> = Vec::new();
        let mut local: HashMap<u32, u32> = HashMap::new();
        let mut rows: Vec<usize> = Vec::new();
        let mut indices: Vec<u32> = Vec::new();
        for triangle in dedup.inverse.chunks_exact(3) {
            let new = triangle
                .iter()
                .enumerate()
                .filter(|&(i, v)| !local.contains_key(v) && !triangle[..i].contains(v))
                .count();
            if rows.len() + new > MAX_VERTICES {
                buckets.push((std::mem::take(&mut rows), std::mem::take(&mut indices)));
                local.clear();
            }
            for &unique in triangle {
                let next = rows.len() as u32;
                let index = *local.entry(unique).or_insert_with(|| {
                    rows.push(dedup.unique[unique as usize]);
                    next
                });
                indices.push(index);
            }
        }
        if !rows.is_empty() {
            buckets.push((rows, indices));
        }

        let shader_index = key.shader_index();
        if buckets.len() > 1 {
            self.diagnostics.warn(PackWarning::GeometrySplit {
                lod,
                shader_index,
                parts: buckets.len(),
            });
        }
        debug!(
            ?lod,
            shader_index,
            corners,
            vertices = dedup.unique.len(),
            parts = buckets.len(),
            "packed geometry"
        );

        buckets
            .into_iter()
            .map(|(rows, indices)| build_geometry(&batch, shader_index, &rows, indices))
            .collect()
    }
}

fn build_geometry(
    batch: &Batch,
    shader_index: u16,
    rows: &[usize],
    indices: Vec<u32>,
) -> Result<Geometry> {
    let mut columns: Vec<VertexColumn> = batch.columns.iter().map(|c| c.gather(rows)).collect();
    let mut bone_ids = Vec::new();
    if batch.layout.is_skinned() {
        let bones: Vec<[u16; MAX_INFLUENCES]> = rows.iter().map(|&r| batch.bones[r]).collect();
        bone_ids = bones.iter().flatten().copied().filter(|&b| b != NO_BONE).collect();
        bone_ids.sort_unstable();
        bone_ids.dedup();
        if bone_ids.len() > MAX_GEOMETRY_BONES {
            return Err(Error::CapacityExceeded {
                what: "geometry bone",
                count: bone_ids.len(),
                limit: MAX_GEOMETRY_BONES,
            });
        }
        let slots: Vec<[u8; 4]> = bones
            .iter()
            .map(|vertex| {
                vertex.map(|bone| {
                    bone_ids
                        .binary_search(&bone)
                        .map_or(0, |slot| slot as u8)
                })
            })
            .collect();
        if let Some(position) = batch
            .layout
            .attributes
            .iter()
            .position(|&a| a == VertexAttribute::BlendIndices)
        {
            columns[position] = VertexColumn::Byte4(slots);
        }
    }
    let vertex_buffer = VertexBuffer::from_columns(batch.layout.clone(), columns)?;
    let mut geometry = Geometry::new(shader_index, vertex_buffer, IndexBuffer { indices });
    geometry.bone_ids = bone_ids;
    Ok(geometry)
}

fn push_corner(batch: &mut Batch, mesh: &MeshObject, streams: &MeshStreams, corner: usize) {
    let vertex = mesh.corner_vertex(corner);
    let skin = &streams.skin[vertex];
    for (attribute, column) in batch.layout.attributes.iter().zip(&mut batch.columns) {
        match (attribute, column) {
            (VertexAttribute::Position, VertexColumn::Float3(v)) => v.push(mesh.positions[vertex]),
            (VertexAttribute::Normal, VertexColumn::Float3(v)) => v.push(streams.normals[corner]),
            (VertexAttribute::Tangent, VertexColumn::Float4(v)) => v.push(
                streams
                    .tangents
                    .as_ref()
                    .map_or(Vec4::ZERO, |t| t[corner]),
            ),
            (VertexAttribute::Colour(n), VertexColumn::Byte4(v)) => v.push(
                mesh.colour_layers
                    .get(usize::from(*n))
                    .map_or([255; 4], |layer| colour_bytes(layer[corner])),
            ),
            (VertexAttribute::TexCoord(n), VertexColumn::Float2(v)) => {
                let uv = mesh
                    .uv_layers
                    .get(usize::from(*n))
                    .map_or(Vec2::ZERO, |layer| layer[corner]);
                v.push(Vec2::new(uv.x, 1.0 - uv.y));
            }
            (VertexAttribute::BlendWeights, VertexColumn::Byte4(v)) => v.push(skin.weights),
            // Filled with table slots once the geometry's bone table is known.
            (VertexAttribute::BlendIndices, VertexColumn::Byte4(v)) => v.push([0; 4]),
            _ => {}
        }
    }
    if batch.layout.is_skinned() {
        let mut bones = skin.bones;
        for (bone, &weight) in bones.iter_mut().zip(&skin.weights) {
            if weight == 0 {
                *bone = NO_BONE;
            }
        }
        batch.bones.push(bones);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use proptest::prelude::*;

    use super::*;
    use crate::mesh::{GroupWeight, MeshSkin, MeshTriangle};

    const COLOUR_CATALOGUE: &str = r#"<ShaderCatalogue><Shaders>
        <Item>
          <Name>vertex_colour</Name>
          <FileNames><Item bucket="0">vertex_colour.sps</Item></FileNames>
          <Layouts><Item type="GTAV1"><Position /><Colour0 /></Item></Layouts>
        </Item>
    </Shaders></ShaderCatalogue>"#;

    fn colour_catalogue() -> ShaderCatalogue {
        ShaderCatalogue::parse(COLOUR_CATALOGUE.as_bytes()).unwrap()
    }

    fn triangles(list: &[[u32; 3]]) -> Vec<MeshTriangle> {
        list.iter()
            .map(|&vertices| MeshTriangle {
                vertices,
                shader_index: 0,
            })
            .collect()
    }

    fn fan() -> MeshObject {
        let mut positions = vec![Vec3::ZERO];
        positions.extend((0..6).map(|i| {
            let angle = i as f32;
            Vec3::new(angle.cos(), angle.sin(), 0.0)
        }));
        MeshObject::new("fan", positions, triangles(&[[0, 1, 2], [0, 3, 4], [0, 5, 6]]))
    }

    fn skinned(mut mesh: MeshObject, groups: Vec<Option<u16>>) -> MeshObject {
        let count = mesh.positions.len();
        mesh.skin = Some(MeshSkin {
            group_bones: groups,
            vertex_groups: (0..count)
                .map(|v| {
                    vec![GroupWeight {
                        group: v % 2,
                        weight: 1.0,
                    }]
                })
                .collect(),
        });
        mesh
    }

    #[test]
    fn test_shared_vertex_with_split_colour() {
        let catalogue = colour_catalogue();
        let mut builder = DrawableBuilder::new(&catalogue, "fan");
        builder.add_shader("vertex_colour.sps");
        let mut mesh = fan();
        let red = Vec4::new(1.0, 0.0, 0.0, 1.0);
        let blue = Vec4::new(0.0, 0.0, 1.0, 1.0);
        let mut colours = vec![Vec4::ONE; 9];
        colours[0] = red;
        colours[3] = red;
        colours[6] = blue;
        mesh.colour_layers.push(colours);
        builder.add_mesh(&mesh).unwrap();
        let (drawable, diagnostics) = builder.finish(&CodecOptions::default()).unwrap();

        assert!(diagnostics.is_empty());
        let geometry = &drawable.models_high[0].geometries[0];
        // Six rim vertices plus the centre in two colours.
        assert_eq!(geometry.vertex_buffer.vertex_count(), 8);
        assert_eq!(geometry.index_buffer.indices.len(), 9);
        assert!(geometry.index_buffer.indices.iter().all(|&i| i < 8));
    }

    #[test]
    fn test_split_at_vertex_limit() {
        let catalogue = colour_catalogue();
        let mut builder = DrawableBuilder::new(&catalogue, "big");
        builder.add_shader("vertex_colour.sps");
        let positions: Vec<Vec3> = (0..70_000).map(|i| Vec3::new(i as f32, 0.0, 0.0)).collect();
        let mut list: Vec<[u32; 3]> = (0..23_333).map(|t| [t * 3, t * 3 + 1, t * 3 + 2]).collect();
        list.push([69_999, 69_998, 69_997]);
        builder
            .add_mesh(&MeshObject::new("big", positions, triangles(&list)))
            .unwrap();
        let (drawable, diagnostics) = builder.finish(&CodecOptions::default()).unwrap();

        let geometries = &drawable.models_high[0].geometries;
        assert_eq!(geometries.len(), 2);
        let counts: Vec<usize> = geometries
            .iter()
            .map(|g| g.vertex_buffer.vertex_count())
            .collect();
        assert_eq!(counts.iter().sum::<usize>(), 70_000);
        assert!(counts.iter().all(|&c| c <= MAX_VERTICES));
        for geometry in geometries {
            let count = geometry.vertex_buffer.vertex_count() as u32;
            assert!(geometry.index_buffer.indices.iter().all(|&i| i < count));
        }
        assert!(matches!(
            diagnostics.warnings.as_slice(),
            [PackWarning::GeometrySplit { parts: 2, .. }]
        ));
    }

    #[test]
    fn test_skinned_meshes_merge_into_one_model() {
        let catalogue = ShaderCatalogue::shipped().unwrap();
        let mut builder = DrawableBuilder::new(&catalogue, "ped");
        builder.add_shader("default.sps");
        builder
            .add_mesh(&skinned(fan(), vec![Some(2), Some(5)]))
            .unwrap();
        let mut other = skinned(fan(), vec![Some(5), Some(7)]);
        other.name = "other".to_string();
        builder.add_mesh(&other).unwrap();
        let mut prop = fan();
        prop.bone_index = 3;
        builder.add_mesh(&prop).unwrap();
        let (drawable, _) = builder.finish(&CodecOptions::default()).unwrap();

        assert_eq!(drawable.models_high.len(), 2);
        let skin_model = &drawable.models_high[0];
        assert!(skin_model.has_skin);
        assert_eq!(skin_model.geometries.len(), 1);
        let geometry = &skin_model.geometries[0];
        assert_eq!(geometry.bone_ids, vec![2, 5, 7]);
        assert_eq!(skin_model.matrix_count, 3);
        let Some(VertexColumn::Byte4(slots)) =
            geometry.vertex_buffer.column(VertexAttribute::BlendIndices)
        else {
            panic!("missing blend indices");
        };
        assert!(slots.iter().flatten().all(|&s| s < 3));

        let rigid = &drawable.models_high[1];
        assert!(!rigid.has_skin);
        assert_eq!(rigid.bone_index, 3);
        assert_eq!(drawable.flags_high, 2);
    }

    #[test]
    fn test_ungrouped_vertices_warn() {
        let catalogue = ShaderCatalogue::shipped().unwrap();
        let mut builder = DrawableBuilder::new(&catalogue, "ped");
        builder.add_shader("default.sps");
        let mut mesh = skinned(fan(), vec![Some(1), Some(1)]);
        if let Some(skin) = &mut mesh.skin {
            skin.vertex_groups[4].clear();
        }
        builder.add_mesh(&mesh).unwrap();
        let (_, diagnostics) = builder.finish(&CodecOptions::default()).unwrap();
        assert!(diagnostics.warnings.contains(&PackWarning::UngroupedVertices {
            mesh: "fan".to_string(),
            count: 1,
        }));
    }

    #[test]
    fn test_unresolved_shader_falls_back() {
        let catalogue = ShaderCatalogue::shipped().unwrap();
        let mut builder = DrawableBuilder::new(&catalogue, "odd");
        builder.add_shader("missing.sps");
        builder.add_mesh(&fan()).unwrap();
        let (drawable, diagnostics) = builder.finish(&CodecOptions::default()).unwrap();
        assert_eq!(drawable.shader_group.shaders[0].name, "missing");
        let layout = drawable.models_high[0].geometries[0].vertex_buffer.layout();
        assert_eq!(*layout, fallback_layout());
        assert!(matches!(
            diagnostics.warnings.as_slice(),
            [PackWarning::UnresolvedShader { .. }]
        ));
    }

    #[test]
    fn test_tangents_without_uv_warn() {
        let catalogue = ShaderCatalogue::shipped().unwrap();
        let mut builder = DrawableBuilder::new(&catalogue, "flat");
        builder.add_shader("normal.sps");
        builder.add_mesh(&fan()).unwrap();
        let (_, diagnostics) = builder.finish(&CodecOptions::default()).unwrap();
        assert!(diagnostics.warnings.contains(&PackWarning::MissingUvLayer {
            mesh: "fan".to_string()
        }));
    }

    #[test]
    fn test_uv_v_is_flipped() {
        let catalogue = ShaderCatalogue::shipped().unwrap();
        let mut builder = DrawableBuilder::new(&catalogue, "uv");
        builder.add_shader("default.sps");
        let mut mesh = fan();
        mesh.uv_layers.push(vec![Vec2::new(0.25, 0.25); 9]);
        builder.add_mesh(&mesh).unwrap();
        let (drawable, _) = builder.finish(&CodecOptions::default()).unwrap();
        let buffer = &drawable.models_high[0].geometries[0].vertex_buffer;
        let Some(VertexColumn::Float2(uvs)) = buffer.column(VertexAttribute::TexCoord(0)) else {
            panic!("missing uvs");
        };
        assert!(uvs.iter().all(|uv| *uv == Vec2::new(0.25, 0.75)));
    }

    #[test]
    fn test_unknown_shader_index() {
        let catalogue = ShaderCatalogue::shipped().unwrap();
        let mut builder = DrawableBuilder::new(&catalogue, "none");
        assert!(matches!(
            builder.add_mesh(&fan()),
            Err(Error::Configuration { .. })
        ));
    }

    #[test]
    fn test_linear_to_srgb() {
        assert_eq!(linear_to_srgb(0.0), 0);
        assert_eq!(linear_to_srgb(1.0), 255);
        assert_eq!(linear_to_srgb(0.214_041_14), 128);
    }

    proptest! {
        #[test]
        fn test_indices_in_range_and_rows_unique(
            list in prop::collection::vec(prop::array::uniform3(0u32..12), 1..40)
        ) {
            let positions: Vec<Vec3> =
                (0..12).map(|i| Vec3::new((i % 4) as f32, (i / 4) as f32, 0.0)).collect();
            let catalogue = colour_catalogue();
            let mut builder = DrawableBuilder::new(&catalogue, "grid");
            builder.add_shader("vertex_colour.sps");
            builder.add_mesh(&MeshObject::new("grid", positions, triangles(&list))).unwrap();
            let (drawable, _) = builder.finish(&CodecOptions::default()).unwrap();

            let geometry = &drawable.models_high[0].geometries[0];
            let count = geometry.vertex_buffer.vertex_count();
            prop_assert_eq!(geometry.index_buffer.indices.len(), list.len() * 3);
            prop_assert!(geometry.index_buffer.indices.iter().all(|&i| (i as usize) < count));

            let rows: HashSet<[u32; 3]> = geometry
                .vertex_buffer
                .positions()
                .iter()
                .map(|p| p.to_array().map(f32::to_bits))
                .collect();
            prop_assert_eq!(rows.len(), count);
        }
    }
}
