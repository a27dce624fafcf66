//! Source meshes handed over by the scene exporter.
//!
//! These are plain data: vertex positions plus per-corner attributes for
//! every triangle, in the layout an editor naturally produces. Nothing here
//! knows about shaders or vertex layouts.

use glam::{Vec2, Vec3, Vec4};
use rage_resource::drawable::LodLevel;

/// A triangle referencing mesh vertices and the shader that draws it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshTriangle {
    pub vertices: [u32; 3],
    /// Index into the drawable's shader group.
    pub shader_index: u16,
}

/// Membership of a vertex in a vertex group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupWeight {
    pub group: usize,
    pub weight: f32,
}

/// Skin binding of a mesh: vertex group memberships plus the bone each
/// group drives.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshSkin {
    /// Skeleton bone index per vertex group. `None` marks a group with no
    /// bone of the same name, which is ignored.
    pub group_bones: Vec<Option<u16>>,
    /// Group memberships per mesh vertex.
    pub vertex_groups: Vec<Vec<GroupWeight>>,
}

impl MeshSkin {
    /// Bone-weight pairs of `vertex`, unmapped groups dropped.
    #[must_use]
    pub fn bone_weights(&self, vertex: usize) -> Vec<(u16, f32)> {
        self.vertex_groups
            .get(vertex)
            .into_iter()
            .flatten()
            .filter_map(|gw| {
                let bone = self.group_bones.get(gw.group).copied().flatten()?;
                Some((bone, gw.weight))
            })
            .collect()
    }
}

/// One exported mesh object.
///
/// Per-corner arrays are indexed `3 * triangle + corner` and must be empty
/// or hold exactly `3 * triangles.len()` entries.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshObject {
    pub name: String,
    pub lod: LodLevel,
    /// Bone the object is parented to when it is not skinned.
    pub bone_index: u16,
    pub positions: Vec<Vec3>,
    pub triangles: Vec<MeshTriangle>,
    pub corner_normals: Vec<Vec3>,
    /// Up to eight UV layers, `v` pointing up as in the editor.
    pub uv_layers: Vec<Vec<Vec2>>,
    /// Up to two linear RGBA colour layers.
    pub colour_layers: Vec<Vec<Vec4>>,
    pub skin: Option<MeshSkin>,
}

impl MeshObject {
    #[must_use]
    pub fn new(name: impl Into<String>, positions: Vec<Vec3>, triangles: Vec<MeshTriangle>) -> Self {
        Self {
            name: name.into(),
            lod: LodLevel::High,
            bone_index: 0,
            positions,
            triangles,
            corner_normals: Vec::new(),
            uv_layers: Vec::new(),
            colour_layers: Vec::new(),
            skin: None,
        }
    }

    #[must_use]
    pub fn corner_count(&self) -> usize {
        self.triangles.len() * 3
    }

    /// Mesh vertex behind a corner.
    #[must_use]
    pub fn corner_vertex(&self, corner: usize) -> usize {
        self.triangles[corner / 3].vertices[corner % 3] as usize
    }

    /// Face normals, one per corner, for meshes that carry none.
    #[must_use]
    pub fn flat_normals(&self) -> Vec<Vec3> {
        self.triangles
            .iter()
            .flat_map(|t| {
                let [a, b, c] = t.vertices.map(|v| self.positions[v as usize]);
                let normal = (b - a).cross(c - a).normalize_or_zero();
                [normal; 3]
            })
            .collect()
    }

    /// Check that every index and per-corner array is consistent.
    ///
    /// # Errors
    ///
    /// Returns [`rage_resource::Error::Configuration`] naming the first problem.
    pub fn check(&self) -> rage_resource::Result<()> {
        let bad = |detail: String| {
            Err(rage_resource::Error::configuration(format!(
                "mesh '{}': {detail}",
                self.name
            )))
        };
        let count = self.positions.len();
        if let Some(t) = self
            .triangles
            .iter()
            .find(|t| t.vertices.iter().any(|&v| v as usize >= count))
        {
            return bad(format!("triangle {:?} out of range for {count} vertices", t.vertices));
        }
        let corners = self.corner_count();
        if !self.corner_normals.is_empty() && self.corner_normals.len() != corners {
            return bad(format!("{} normals for {corners} corners", self.corner_normals.len()));
        }
        for (name, lens) in [
            ("uv", self.uv_layers.iter().map(Vec::len).collect::<Vec<_>>()),
            ("colour", self.colour_layers.iter().map(Vec::len).collect()),
        ] {
            if let Some(len) = lens.into_iter().find(|&len| len != corners) {
                return bad(format!("{name} layer has {len} values for {corners} corners"));
            }
        }
        if self.uv_layers.len() > 8 || self.colour_layers.len() > 2 {
            return bad(format!(
                "{} uv layers and {} colour layers, at most 8 and 2",
                self.uv_layers.len(),
                self.colour_layers.len()
            ));
        }
        let groups = self.skin.as_ref().map_or(count, |s| s.vertex_groups.len());
        if groups != count {
            return bad(format!("{groups} vertex group lists for {count} vertices"));
        }
        Ok(())
    }
}
