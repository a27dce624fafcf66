//! Per-corner tangent generation.

use glam::{Vec2, Vec3, Vec4};
use mikktspace::{Geometry, generate_tangents};

/// Triangle list where every corner carries its own attributes.
struct CornerGeometry<'a> {
    positions: &'a [Vec3],
    normals: &'a [Vec3],
    uvs: &'a [Vec2],
    tangents: &'a mut [Vec4],
}

impl Geometry for CornerGeometry<'_> {
    fn num_faces(&self) -> usize {
        self.positions.len() / 3
    }

    fn num_vertices_of_face(&self, _face: usize) -> usize {
        3
    }

    fn position(&self, face: usize, vert: usize) -> [f32; 3] {
        self.positions[face * 3 + vert].to_array()
    }

    fn normal(&self, face: usize, vert: usize) -> [f32; 3] {
        self.normals[face * 3 + vert].to_array()
    }

    fn tex_coord(&self, face: usize, vert: usize) -> [f32; 2] {
        self.uvs[face * 3 + vert].to_array()
    }

    fn set_tangent_encoded(&mut self, tangent: [f32; 4], face: usize, vert: usize) {
        self.tangents[face * 3 + vert] = Vec4::from_array(tangent);
    }
}

/// Generate a tangent with bitangent sign in `w` for every corner.
///
/// All slices are per corner, three per triangle. Returns `None` if the
/// lengths disagree or generation fails.
#[must_use]
pub fn corner_tangents(positions: &[Vec3], normals: &[Vec3], uvs: &[Vec2]) -> Option<Vec<Vec4>> {
    if positions.len() % 3 != 0 || normals.len() != positions.len() || uvs.len() != positions.len()
    {
        return None;
    }
    let mut tangents = vec![Vec4::ZERO; positions.len()];
    let mut geometry = CornerGeometry {
        positions,
        normals,
        uvs,
        tangents: &mut tangents,
    };
    generate_tangents(&mut geometry).then_some(tangents)
}
