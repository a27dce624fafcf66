//! Cloth graph construction.
//!
//! A [`ClothMesh`] is a triangle mesh whose vertices become simulation
//! nodes. [`build_graph`] reorders the vertices so pinned nodes come first,
//! derives verlet edges from triangle and loose edges and groups the edges
//! into lanes of eight with no repeated vertex per lane, padding short lanes.
//! [`build_character_cloth`] and [`build_environment_cloth`] wrap the graph
//! into the two cloth resources.

use std::collections::HashSet;

use cwxml::ElementPath;
use glam::{Vec3, Vec4};
use rage_resource::cloth::{
    CHARACTER_CLOTH_MAX_VERTICES, CharacterCloth, CharacterClothBinding,
    CharacterClothController, ClothBridge, ClothController, ClothTuning, ENVIRONMENT_CLOTH_MAX_VERTICES,
    Edge, EnvironmentCloth, ForceTransforms, LANE_WIDTH, VerletCloth,
};
use rage_resource::drawable::{Drawable, LodLevel};
use rage_resource::skeleton::Skeleton;
use rage_resource::{Error, Result};
use tracing::debug;

use crate::binder::{BindingDiagnostics, bind_drawable, match_display_map};
use crate::mesh::MeshSkin;
use crate::skin::MAX_INFLUENCES;

/// Compression weight written on every generated edge.
pub const COMPRESSION_WEIGHT: f32 = 0.25;

/// Pin radius sets a cloth can carry.
pub const MAX_PIN_RADIUS_SETS: usize = 4;

/// Simulation attributes of one cloth vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClothVertex {
    pub pinned: bool,
    pub pin_radius: [f32; MAX_PIN_RADIUS_SETS],
    pub vertex_weight: f32,
    pub inflation_scale: f32,
    /// 0, 1 or 2.
    pub force_transform: u8,
}

impl Default for ClothVertex {
    fn default() -> Self {
        Self {
            pinned: false,
            pin_radius: [0.0; MAX_PIN_RADIUS_SETS],
            vertex_weight: 1.0,
            inflation_scale: 0.0,
            force_transform: 0,
        }
    }
}

/// Source mesh of a cloth.
#[derive(Debug, Clone, Default)]
pub struct ClothMesh {
    pub name: String,
    pub positions: Vec<Vec3>,
    /// Per vertex; empty when the mesh has none.
    pub normals: Vec<Vec3>,
    pub triangles: Vec<[u32; 3]>,
    /// Edges that belong to no triangle.
    pub loose_edges: Vec<[u32; 2]>,
    /// Material of each triangle; empty means a single material.
    pub triangle_materials: Vec<u16>,
    /// Per vertex; empty means defaults for every vertex.
    pub vertices: Vec<ClothVertex>,
    /// How many of the four pin radius sets are in use.
    pub pin_radius_sets: usize,
    pub skin: Option<MeshSkin>,
}

impl ClothMesh {
    #[must_use]
    pub fn new(name: impl Into<String>, positions: Vec<Vec3>, triangles: Vec<[u32; 3]>) -> Self {
        Self {
            name: name.into(),
            positions,
            triangles,
            ..Self::default()
        }
    }

    fn vertex(&self, index: usize) -> ClothVertex {
        self.vertices.get(index).copied().unwrap_or_default()
    }

    fn check(&self) -> Result<()> {
        let bad = |detail: String| {
            Err(Error::configuration(format!("cloth mesh '{}': {detail}", self.name)))
        };
        let count = self.positions.len();
        if count > usize::from(u16::MAX) {
            return bad(format!("{count} vertices do not fit 16-bit indices"));
        }
        if !self.vertices.is_empty() && self.vertices.len() != count {
            return bad(format!("{} attribute rows for {count} vertices", self.vertices.len()));
        }
        if !self.normals.is_empty() && self.normals.len() != count {
            return bad(format!("{} normals for {count} vertices", self.normals.len()));
        }
        let corners = self.triangles.iter().flatten().chain(self.loose_edges.iter().flatten());
        if let Some(v) = corners.copied().find(|&v| v as usize >= count) {
            return bad(format!("vertex {v} out of range for {count} vertices"));
        }
        let materials: HashSet<u16> = self.triangle_materials.iter().copied().collect();
        if materials.len() > 1 {
            return bad(format!("{} materials, a cloth takes one", materials.len()));
        }
        if self.pin_radius_sets > MAX_PIN_RADIUS_SETS {
            return bad(format!(
                "{} pin radius sets, at most {MAX_PIN_RADIUS_SETS}",
                self.pin_radius_sets
            ));
        }
        if let Some(v) = self.vertices.iter().find(|v| v.force_transform > ForceTransforms::MAX_MODE) {
            return bad(format!("force transform mode {} is not 0, 1 or 2", v.force_transform));
        }
        Ok(())
    }
}

/// Simulation graph of a cloth mesh, in cloth vertex order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClothGraph {
    /// Cloth vertex of each mesh vertex.
    pub mesh_to_cloth: Vec<u16>,
    /// Mesh vertex of each cloth vertex.
    pub cloth_to_mesh: Vec<u32>,
    pub pinned_count: usize,
    pub positions: Vec<Vec3>,
    /// Empty when the mesh has no normals.
    pub normals: Vec<Vec3>,
    pub triangle_indices: Vec<u16>,
    pub edges: Vec<Edge>,
    pub custom_edges: Vec<Edge>,
}

impl ClothGraph {
    /// Highest level verlet cloth of this graph.
    #[must_use]
    pub fn verlet_cloth(&self, with_normals: bool) -> VerletCloth {
        let count = self.positions.len() as u32;
        let mut cloth = VerletCloth {
            pinned_vertices_count: self.pinned_count as u32,
            dynamic_pin_list_size: count.div_ceil(32),
            vertex_positions: self.positions.clone(),
            vertex_normals: if with_normals { self.normals.clone() } else { Vec::new() },
            edges: self.edges.clone(),
            custom_edges: self.custom_edges.clone(),
            ..VerletCloth::default()
        };
        cloth.refresh_extents();
        cloth
    }
}

/// Build the simulation graph of `mesh`.
///
/// # Errors
///
/// Returns [`Error::Configuration`] if the mesh tables disagree, indices are
/// out of range or the triangles use more than one material.
pub fn build_graph(mesh: &ClothMesh) -> Result<ClothGraph> {
    mesh.check()?;
    let count = mesh.positions.len();
    let pinned = |v: usize| mesh.vertex(v).pinned;

    let (mut cloth_to_mesh, rest): (Vec<u32>, Vec<u32>) =
        (0..count as u32).partition(|&v| pinned(v as usize));
    let pinned_count = cloth_to_mesh.len();
    cloth_to_mesh.extend(rest);
    let mut mesh_to_cloth = vec![0u16; count];
    for (cloth, &vertex) in cloth_to_mesh.iter().enumerate() {
        mesh_to_cloth[vertex as usize] = cloth as u16;
    }

    let positions: Vec<Vec3> = cloth_to_mesh.iter().map(|&v| mesh.positions[v as usize]).collect();
    let normals = if mesh.normals.is_empty() {
        Vec::new()
    } else {
        cloth_to_mesh.iter().map(|&v| mesh.normals[v as usize]).collect()
    };
    let triangle_indices = mesh
        .triangles
        .iter()
        .flatten()
        .map(|&v| mesh_to_cloth[v as usize])
        .collect();

    let mut seen = HashSet::new();
    let mut edge_for = |a: u32, b: u32| -> Option<Edge> {
        let (ca, cb) = (mesh_to_cloth[a as usize], mesh_to_cloth[b as usize]);
        let key = (ca.min(cb), ca.max(cb));
        let (pa, pb) = (pinned(a as usize), pinned(b as usize));
        if ca == cb || (pa && pb) || !seen.insert(key) {
            return None;
        }
        Some(Edge {
            v0: ca,
            v1: cb,
            length_sqr: positions[usize::from(ca)].distance_squared(positions[usize::from(cb)]),
            weight0: if pa {
                0.0
            } else if pb {
                1.0
            } else {
                0.5
            },
            compression_weight: COMPRESSION_WEIGHT,
        })
    };
    let edges: Vec<Edge> = mesh
        .triangles
        .iter()
        .flat_map(|&[a, b, c]| [(a, b), (b, c), (c, a)])
        .filter_map(|(a, b)| edge_for(a, b))
        .collect();
    let custom_edges: Vec<Edge> = mesh
        .loose_edges
        .iter()
        .filter_map(|&[a, b]| edge_for(a, b))
        .collect();

    let graph = ClothGraph {
        mesh_to_cloth,
        cloth_to_mesh,
        pinned_count,
        positions,
        normals,
        triangle_indices,
        edges: bucket_edges(edges),
        custom_edges: bucket_edges(custom_edges),
    };
    debug!(
        cloth = %mesh.name,
        vertices = count,
        pinned = pinned_count,
        edges = graph.edges.len(),
        custom_edges = graph.custom_edges.len(),
        "built cloth graph"
    );
    Ok(graph)
}

fn shares_vertex(a: &Edge, b: &Edge) -> bool {
    a.v0 == b.v0 || a.v0 == b.v1 || a.v1 == b.v0 || a.v1 == b.v1
}

/// Group edges into lanes of [`LANE_WIDTH`] with no vertex repeated inside a
/// lane, first fit, padding each lane with [`Edge::PADDING`].
#[must_use]
pub fn bucket_edges(edges: Vec<Edge>) -> Vec<Edge> {
    let mut lanes: Vec<Vec<Edge>> = Vec::new();
    for edge in edges {
        let lane = lanes
            .iter()
            .position(|lane| lane.len() < LANE_WIDTH && !lane.iter().any(|e| shares_vertex(e, &edge)));
        match lane {
            Some(lane) => lanes[lane].push(edge),
            None => lanes.push(vec![edge]),
        }
    }
    lanes
        .into_iter()
        .flat_map(|mut lane| {
            lane.resize(LANE_WIDTH, Edge::PADDING);
            lane
        })
        .collect()
}

fn bridge(mesh: &ClothMesh, graph: &ClothGraph) -> ClothBridge {
    let rows: Vec<ClothVertex> = graph.cloth_to_mesh.iter().map(|&v| mesh.vertex(v as usize)).collect();
    ClothBridge {
        vertex_count_high: rows.len() as u32,
        pin_radius_high: (0..mesh.pin_radius_sets)
            .flat_map(|set| rows.iter().map(move |v| v.pin_radius[set]))
            .collect(),
        vertex_weights_high: rows.iter().map(|v| v.vertex_weight).collect(),
        inflation_scale_high: rows.iter().map(|v| v.inflation_scale).collect(),
        display_map_high: graph.mesh_to_cloth.clone(),
        ..ClothBridge::default()
    }
}

fn check_capacity(what: &'static str, count: usize, limit: usize) -> Result<()> {
    if count > limit {
        return Err(Error::CapacityExceeded { what, count, limit });
    }
    Ok(())
}

/// Build a character cloth skinned to `skeleton`.
///
/// Each cloth vertex keeps its four heaviest mapped groups, renormalised.
/// The bone tables list the used bones in ascending skeleton order.
///
/// # Errors
///
/// Returns [`Error::CapacityExceeded`] above [`CHARACTER_CLOTH_MAX_VERTICES`]
/// and [`Error::Configuration`] if the mesh has no skin, a vertex maps to no
/// bone or a group names a bone missing from the skeleton.
pub fn build_character_cloth(mesh: &ClothMesh, skeleton: &Skeleton) -> Result<CharacterCloth> {
    check_capacity(
        "character cloth vertex",
        mesh.positions.len(),
        CHARACTER_CLOTH_MAX_VERTICES,
    )?;
    let skin = mesh.skin.as_ref().ok_or_else(|| {
        Error::configuration(format!("character cloth '{}' has no vertex groups", mesh.name))
    })?;
    let graph = build_graph(mesh)?;

    let mut influences = Vec::with_capacity(graph.cloth_to_mesh.len());
    for &vertex in &graph.cloth_to_mesh {
        let mut weights = skin.bone_weights(vertex as usize);
        weights.retain(|&(_, w)| w > 0.0);
        weights.sort_by(|a, b| b.1.total_cmp(&a.1));
        weights.truncate(MAX_INFLUENCES);
        let total: f32 = weights.iter().map(|&(_, w)| w).sum();
        if weights.is_empty() || total <= 0.0 {
            return Err(Error::configuration(format!(
                "character cloth '{}': vertex {vertex} is in no mapped bone group",
                mesh.name
            )));
        }
        for (bone, weight) in &mut weights {
            if usize::from(*bone) >= skeleton.bones.len() {
                return Err(Error::configuration(format!(
                    "character cloth '{}': bone {bone} not in a skeleton of {} bones",
                    mesh.name,
                    skeleton.bones.len()
                )));
            }
            *weight /= total;
        }
        influences.push(weights);
    }

    let mut bones: Vec<u16> = influences.iter().flatten().map(|&(b, _)| b).collect();
    bones.sort_unstable();
    bones.dedup();
    check_capacity("character cloth bone", bones.len(), usize::from(u8::MAX) + 1)?;

    let bindings = influences
        .iter()
        .map(|weights| {
            let mut binding = CharacterClothBinding::default();
            let mut values = [0.0f32; MAX_INFLUENCES];
            for (slot, &(bone, weight)) in weights.iter().enumerate() {
                values[slot] = weight;
                binding.indices[slot] = bones.binary_search(&bone).map_or(0, |i| i as u8);
            }
            binding.weights = Vec4::from_array(values);
            binding
        })
        .collect();

    let controller = CharacterClothController {
        base: ClothController {
            name: mesh.name.clone(),
            bridge: bridge(mesh, &graph),
            triangle_indices: graph.triangle_indices.clone(),
            cloth_high: graph.verlet_cloth(true),
            ..ClothController::default()
        },
        bone_indices: bones.iter().map(|&b| u32::from(b)).collect(),
        bone_ids: bones
            .iter()
            .map(|&b| skeleton.bones[usize::from(b)].tag)
            .collect(),
        bindings,
    };
    let mut cloth = CharacterCloth {
        name: mesh.name.clone(),
        controller,
        ..CharacterCloth::default()
    };
    cloth.refresh();
    cloth.validate(&ElementPath::root("CharacterCloth"))?;
    Ok(cloth)
}

/// Build an environment cloth.
///
/// With a drawable, the display map is rebuilt by matching the positions of
/// its high level geometries against the cloth vertices, and those vertices
/// are bound to the cloth triangles through their blend columns. Vertices
/// that could not be bound are returned in the diagnostics.
///
/// # Errors
///
/// Returns [`Error::CapacityExceeded`] above
/// [`ENVIRONMENT_CLOTH_MAX_VERTICES`] and [`Error::Configuration`] if the
/// mesh is inconsistent, a rendered vertex matches no cloth vertex or
/// several, or the drawable's layout has no blend columns.
pub fn build_environment_cloth(
    mesh: &ClothMesh,
    mut drawable: Option<Drawable>,
    tuning: Option<ClothTuning>,
) -> Result<(EnvironmentCloth, BindingDiagnostics)> {
    check_capacity(
        "environment cloth vertex",
        mesh.positions.len(),
        ENVIRONMENT_CLOTH_MAX_VERTICES,
    )?;
    let graph = build_graph(mesh)?;
    let mut bridge = bridge(mesh, &graph);
    let mut diagnostics = BindingDiagnostics::default();

    if let Some(drawable) = &mut drawable {
        let rendered: Vec<Vec3> = drawable
            .lod(LodLevel::High)
            .iter()
            .flat_map(|m| &m.geometries)
            .flat_map(|g| g.vertex_buffer.positions().iter().copied())
            .collect();
        let matches = match_display_map(&rendered, &graph.positions)?;
        bridge.display_map_high = matches
            .into_iter()
            .enumerate()
            .map(|(vertex, cloth)| {
                cloth.ok_or_else(|| {
                    Error::configuration(format!(
                        "environment cloth '{}': rendered vertex {vertex} matches no cloth vertex",
                        mesh.name
                    ))
                })
            })
            .collect::<Result<_>>()?;
        diagnostics = bind_drawable(drawable, &graph.positions, &graph.triangle_indices)?;
    }

    let modes: Vec<u8> = graph
        .cloth_to_mesh
        .iter()
        .map(|&v| mesh.vertex(v as usize).force_transform)
        .collect();
    let mut cloth = EnvironmentCloth {
        flags: 0,
        tuning,
        drawable,
        controller: ClothController {
            name: mesh.name.clone(),
            bridge,
            triangle_indices: graph.triangle_indices.clone(),
            cloth_high: graph.verlet_cloth(false),
            ..ClothController::default()
        },
        force_transforms: ForceTransforms(modes),
    };
    cloth.controller.refresh();
    cloth.validate(&ElementPath::root("EnvironmentCloth"))?;
    Ok((cloth, diagnostics))
}
