//! Binding rendered mesh vertices to cloth triangles.
//!
//! Each rendered vertex is projected onto the cloth triangles near it. The
//! closest accepted projection gives barycentric weights and a signed offset
//! along the triangle normal, which the renderer uses to follow the cloth.
//!
//! # Design principles
//!
//! - Orientation is decided per vertex by a heuristic that assumes the model
//!   is roughly cylindrical around the Z axis: a normal pointing towards the
//!   axis flips the triangle winding.
//!   A normal with no XY component towards or away from the axis leaves the
//!   orientation ambiguous; such vertices are bound as outside-facing and
//!   listed in [`BindingDiagnostics::ambiguous`].
//! - A vertex that cannot be bound is reported in [`BindingDiagnostics`]
//!   and left unbound. Only an ambiguous display map is an error.
//! - [`bind_drawable`] writes the bindings into the blend columns of the
//!   cloth's rendered geometry.

use std::fmt;

use glam::{Vec3, Vec4};
use rage_resource::drawable::{Drawable, LodLevel, VertexAttribute, VertexBuffer, VertexColumn};
use rage_resource::{Error, Result};
use tracing::{debug, warn};

/// Slack on the barycentric sum when accepting a projection.
pub const BARYCENTRIC_SLACK: f32 = 1.05;

/// Largest distance from a cloth triangle plane that still binds.
pub const MAX_PLANE_DISTANCE: f32 = 0.05;

/// Position tolerance when matching rendered vertices to cloth vertices.
pub const DISPLAY_MAP_TOLERANCE: f32 = 1e-5;

/// Index marking the slot that flags a cloth binding to the renderer.
pub const BINDING_SENTINEL: u16 = 255;

/// Binding of one rendered vertex to a cloth triangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClothBinding {
    /// Barycentric weights, then the plane offset mapped to `[0, 1]`.
    pub weights: Vec4,
    /// Triangle vertices as `(b1, b0, sentinel, b2)`.
    pub indices: [u16; 4],
}

impl ClothBinding {
    /// Blend weight and blend index bytes for a vertex buffer.
    #[must_use]
    pub fn blend_bytes(&self) -> ([u8; 4], [u8; 4]) {
        let weights = self
            .weights
            .to_array()
            .map(|w| (w.clamp(0.0, 1.0) * 255.0).round() as u8);
        let indices = self.indices.map(|i| u8::try_from(i).unwrap_or(u8::MAX));
        (weights, indices)
    }
}

/// Why a rendered vertex could not be bound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BindingError {
    pub vertex: usize,
    pub position: Vec3,
    /// No triangle contained the projected point.
    pub projection_failed: bool,
    /// The point projected inside a triangle but too far from its plane.
    pub distance_failed: bool,
    pub multiple_matches: bool,
}

impl fmt::Display for BindingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut reasons = Vec::new();
        if self.projection_failed {
            reasons.push("projection");
        }
        if self.distance_failed {
            reasons.push("distance");
        }
        if self.multiple_matches {
            reasons.push("multiple matches");
        }
        write!(
            f,
            "vertex {} at ({}, {}, {}) not bound: {}",
            self.vertex,
            self.position.x,
            self.position.y,
            self.position.z,
            reasons.join(", ")
        )
    }
}

/// Problems found by [`bind_mesh_to_cloth`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindingDiagnostics {
    /// Vertices left unbound.
    pub errors: Vec<BindingError>,
    /// Vertices whose facing could not be told from the normal.
    pub ambiguous: Vec<usize>,
}

impl BindingDiagnostics {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty() && self.ambiguous.is_empty()
    }

    fn extend_offset(&mut self, other: BindingDiagnostics, offset: usize) {
        self.errors.extend(other.errors.into_iter().map(|mut e| {
            e.vertex += offset;
            e
        }));
        self.ambiguous
            .extend(other.ambiguous.into_iter().map(|v| v + offset));
    }
}

struct Candidate {
    distance_sqr: f32,
    binding: ClothBinding,
}

/// Bind each rendered vertex to its closest cloth triangle.
///
/// `triangle_indices` holds three cloth vertex indices per triangle. The
/// result has one entry per rendered vertex, `None` where binding failed.
///
/// # Errors
///
/// Returns [`Error::Configuration`] if there is not one normal per rendered
/// vertex.
pub fn bind_mesh_to_cloth(
    cloth_positions: &[Vec3],
    triangle_indices: &[u16],
    mesh_positions: &[Vec3],
    mesh_normals: &[Vec3],
) -> Result<(Vec<Option<ClothBinding>>, BindingDiagnostics)> {
    if mesh_normals.len() != mesh_positions.len() {
        return Err(Error::configuration(format!(
            "{} normals for {} rendered vertices",
            mesh_normals.len(),
            mesh_positions.len()
        )));
    }
    let mut diagnostics = BindingDiagnostics::default();
    let bindings: Vec<Option<ClothBinding>> = mesh_positions
        .iter()
        .zip(mesh_normals)
        .enumerate()
        .map(|(vertex, (&p, &n))| {
            let facing = n.truncate().dot(-p.truncate());
            if facing.abs() <= f32::EPSILON {
                debug!(vertex, "orientation ambiguous, binding as outside-facing");
                diagnostics.ambiguous.push(vertex);
            }
            let inside = facing > f32::EPSILON;
            let mut best: Option<Candidate> = None;
            let mut projected = false;
            for triangle in triangle_indices.chunks_exact(3) {
                let [mut b0, mut b1, b2] = [triangle[0], triangle[1], triangle[2]];
                if inside {
                    std::mem::swap(&mut b0, &mut b1);
                }
                let Some(candidate) = project(cloth_positions, [b0, b1, b2], p) else {
                    continue;
                };
                projected = true;
                if candidate.distance_sqr >= MAX_PLANE_DISTANCE * MAX_PLANE_DISTANCE {
                    continue;
                }
                if best.as_ref().is_none_or(|b| candidate.distance_sqr < b.distance_sqr) {
                    best = Some(candidate);
                }
            }
            if best.is_none() {
                let error = BindingError {
                    vertex,
                    position: p,
                    projection_failed: !projected,
                    distance_failed: projected,
                    multiple_matches: false,
                };
                debug!("{error}");
                diagnostics.errors.push(error);
            }
            best.map(|c| c.binding)
        })
        .collect();

    if !diagnostics.errors.is_empty() {
        warn!(
            unbound = diagnostics.errors.len(),
            vertices = mesh_positions.len(),
            "rendered vertices not bound to cloth"
        );
    }
    Ok((bindings, diagnostics))
}

/// Bind the high level geometries of `drawable` to a cloth and store the
/// result in their `BlendWeights` and `BlendIndices` columns.
///
/// Vertices are numbered across geometries in model order. Unbound vertices
/// get zero weights and indices. A layout without normals binds every vertex
/// as outside-facing.
///
/// # Errors
///
/// Returns [`Error::Configuration`] if a geometry's layout has no blend
/// columns.
pub fn bind_drawable(
    drawable: &mut Drawable,
    cloth_positions: &[Vec3],
    triangle_indices: &[u16],
) -> Result<BindingDiagnostics> {
    let mut diagnostics = BindingDiagnostics::default();
    let mut offset = 0;
    for model in drawable.lod_mut(LodLevel::High) {
        for geometry in &mut model.geometries {
            let buffer = &geometry.vertex_buffer;
            let layout = buffer.layout();
            let (Some(weight_slot), Some(index_slot)) = (
                attribute_slot(buffer, VertexAttribute::BlendWeights),
                attribute_slot(buffer, VertexAttribute::BlendIndices),
            ) else {
                return Err(Error::configuration(format!(
                    "cloth geometry layout {:?} has no blend weights and indices",
                    layout.attributes.iter().map(|a| a.tag()).collect::<Vec<_>>()
                )));
            };
            let positions = buffer.positions();
            let normals = match buffer.column(VertexAttribute::Normal) {
                Some(VertexColumn::Float3(normals)) => normals.clone(),
                _ => vec![Vec3::ZERO; positions.len()],
            };
            let (bindings, found) =
                bind_mesh_to_cloth(cloth_positions, triangle_indices, positions, &normals)?;

            let (weights, indices): (Vec<[u8; 4]>, Vec<[u8; 4]>) = bindings
                .iter()
                .map(|b| b.map_or(([0; 4], [0; 4]), |b| b.blend_bytes()))
                .unzip();
            let mut columns = buffer.columns().to_vec();
            columns[weight_slot] = VertexColumn::Byte4(weights);
            columns[index_slot] = VertexColumn::Byte4(indices);
            let flags = buffer.flags;
            let mut rebuilt = VertexBuffer::from_columns(layout.clone(), columns)?;
            rebuilt.flags = flags;

            diagnostics.extend_offset(found, offset);
            offset += bindings.len();
            geometry.vertex_buffer = rebuilt;
        }
    }
    debug!(
        drawable = %drawable.name,
        vertices = offset,
        unbound = diagnostics.errors.len(),
        "bound drawable to cloth"
    );
    Ok(diagnostics)
}

fn attribute_slot(buffer: &VertexBuffer, attribute: VertexAttribute) -> Option<usize> {
    buffer.layout().attributes.iter().position(|&a| a == attribute)
}

/// Project `p` onto the triangle, returning the binding when the projection
/// falls inside it.
fn project(positions: &[Vec3], [b0, b1, b2]: [u16; 3], p: Vec3) -> Option<Candidate> {
    let v0 = *positions.get(usize::from(b0))?;
    let v1 = *positions.get(usize::from(b1))?;
    let v2 = *positions.get(usize::from(b2))?;
    let cross = (v1 - v0).cross(v2 - v0);
    let area = cross.length();
    if area <= f32::EPSILON {
        return None;
    }
    let normal = cross / area;
    let d = (p - v0).dot(normal);
    let q = p - d * normal;
    let w0 = (v1 - q).cross(v2 - q).length() / area;
    let w1 = (v2 - q).cross(v0 - q).length() / area;
    let w2 = (v0 - q).cross(v1 - q).length() / area;
    if w0 + w1 + w2 >= BARYCENTRIC_SLACK {
        return None;
    }
    Some(Candidate {
        distance_sqr: d * d,
        binding: ClothBinding {
            weights: Vec4::new(w0, w1, w2, (d * 10.0 + 0.5).clamp(0.0, 1.0)),
            indices: [b1, b0, BINDING_SENTINEL, b2],
        },
    })
}

/// Match each rendered vertex to the cloth vertex at the same position.
///
/// # Errors
///
/// Returns [`Error::Configuration`] if a rendered vertex matches more than
/// one cloth vertex, since the display map would be ambiguous.
pub fn match_display_map(mesh_positions: &[Vec3], cloth_positions: &[Vec3]) -> Result<Vec<Option<u16>>> {
    let tolerance = DISPLAY_MAP_TOLERANCE * DISPLAY_MAP_TOLERANCE;
    mesh_positions
        .iter()
        .enumerate()
        .map(|(vertex, p)| {
            let mut matches = cloth_positions
                .iter()
                .enumerate()
                .filter(|(_, c)| c.distance_squared(*p) <= tolerance)
                .map(|(i, _)| i as u16);
            let first = matches.next();
            if matches.next().is_some() {
                let error = BindingError {
                    vertex,
                    position: *p,
                    projection_failed: false,
                    distance_failed: false,
                    multiple_matches: true,
                };
                return Err(Error::configuration(error.to_string()));
            }
            Ok(first)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use rage_resource::drawable::{DrawableModel, Geometry, IndexBuffer, LayoutFamily, VertexLayout};

    use super::*;

    fn unit_triangle() -> Vec<Vec3> {
        vec![Vec3::ZERO, Vec3::X, Vec3::Y]
    }

    #[test]
    fn test_binds_point_above_triangle() {
        let (bindings, diagnostics) = bind_mesh_to_cloth(
            &unit_triangle(),
            &[0, 1, 2],
            &[Vec3::new(0.25, 0.25, 0.02)],
            &[Vec3::Z],
        )
        .unwrap();
        // A normal along Z says nothing about facing.
        assert!(diagnostics.errors.is_empty());
        assert_eq!(diagnostics.ambiguous, vec![0]);
        let binding = bindings[0].unwrap();
        assert_eq!(binding.indices, [1, 0, 255, 2]);
        assert!((binding.weights.x - 0.5).abs() < 1e-5);
        assert!((binding.weights.y - 0.25).abs() < 1e-5);
        assert!((binding.weights.z - 0.25).abs() < 1e-5);
        assert!((binding.weights.w - 0.7).abs() < 1e-5);
    }

    #[test]
    fn test_inward_normal_flips_winding() {
        let (bindings, _) = bind_mesh_to_cloth(
            &unit_triangle(),
            &[0, 1, 2],
            &[Vec3::new(0.25, 0.25, -0.02)],
            &[Vec3::new(-1.0, -1.0, 0.0)],
        )
        .unwrap();
        let binding = bindings[0].unwrap();
        assert_eq!(binding.indices, [0, 1, 255, 2]);
        // Flipped winding turns the normal to -Z, so the point sits above it.
        assert!((binding.weights.w - 0.7).abs() < 1e-5);
    }

    #[test]
    fn test_closest_triangle_wins() {
        let cloth = vec![
            Vec3::ZERO,
            Vec3::X,
            Vec3::Y,
            Vec3::new(0.0, 0.0, 0.03),
            Vec3::new(1.0, 0.0, 0.03),
            Vec3::new(0.0, 1.0, 0.03),
        ];
        let (bindings, _) = bind_mesh_to_cloth(
            &cloth,
            &[0, 1, 2, 3, 4, 5],
            &[Vec3::new(0.25, 0.25, 0.02)],
            &[Vec3::Z],
        )
        .unwrap();
        assert_eq!(bindings[0].unwrap().indices, [4, 3, 255, 5]);
    }

    #[test]
    fn test_failures_are_reported() {
        let (bindings, diagnostics) = bind_mesh_to_cloth(
            &unit_triangle(),
            &[0, 1, 2],
            &[Vec3::new(0.25, 0.25, 0.5), Vec3::new(3.0, 3.0, 0.0)],
            &[Vec3::Z, Vec3::Z],
        )
        .unwrap();
        assert_eq!(bindings, vec![None, None]);
        assert_eq!(diagnostics.errors.len(), 2);
        assert!(diagnostics.errors[0].distance_failed);
        assert!(diagnostics.errors[1].projection_failed);
        assert_eq!(diagnostics.errors[1].vertex, 1);
    }

    #[test]
    fn test_outward_normal_is_not_ambiguous() {
        let (bindings, diagnostics) = bind_mesh_to_cloth(
            &unit_triangle(),
            &[0, 1, 2],
            &[Vec3::new(0.25, 0.25, 0.02)],
            &[Vec3::new(1.0, 1.0, 0.0)],
        )
        .unwrap();
        assert!(diagnostics.is_empty());
        assert_eq!(bindings[0].unwrap().indices, [1, 0, 255, 2]);
    }

    #[test]
    fn test_normal_count_must_match() {
        let result = bind_mesh_to_cloth(
            &unit_triangle(),
            &[0, 1, 2],
            &[Vec3::ZERO, Vec3::X],
            &[Vec3::Z],
        );
        assert!(matches!(result, Err(Error::Configuration { .. })));
    }

    fn cloth_drawable(positions: Vec<Vec3>, normals: Vec<Vec3>, with_blend: bool) -> Drawable {
        let mut attributes = vec![VertexAttribute::Position];
        let mut columns = vec![VertexColumn::Float3(positions.clone())];
        if with_blend {
            attributes.extend([VertexAttribute::BlendWeights, VertexAttribute::BlendIndices]);
            columns.push(VertexColumn::Byte4(vec![[9; 4]; positions.len()]));
            columns.push(VertexColumn::Byte4(vec![[9; 4]; positions.len()]));
        }
        attributes.push(VertexAttribute::Normal);
        columns.push(VertexColumn::Float3(normals));
        let layout = VertexLayout::new(LayoutFamily::Gtav2, attributes);
        let mut buffer = VertexBuffer::from_columns(layout, columns).unwrap();
        buffer.flags = 3;
        let mut drawable = Drawable::new("cloth");
        drawable.lod_mut(LodLevel::High).push(DrawableModel {
            geometries: vec![Geometry::new(0, buffer, IndexBuffer::default())],
            ..DrawableModel::default()
        });
        drawable
    }

    #[test]
    fn test_bind_drawable_writes_blend_columns() {
        let mut drawable = cloth_drawable(
            vec![Vec3::new(0.2, 0.2, 0.03), Vec3::new(3.0, 3.0, 0.0)],
            vec![Vec3::new(1.0, 1.0, 0.0); 2],
            true,
        );
        let diagnostics = bind_drawable(&mut drawable, &unit_triangle(), &[0, 1, 2]).unwrap();
        assert_eq!(diagnostics.errors.len(), 1);
        assert_eq!(diagnostics.errors[0].vertex, 1);

        let buffer = &drawable.models_high[0].geometries[0].vertex_buffer;
        assert_eq!(buffer.flags, 3);
        assert_eq!(
            buffer.column(VertexAttribute::BlendWeights),
            Some(&VertexColumn::Byte4(vec![[153, 51, 51, 204], [0; 4]]))
        );
        assert_eq!(
            buffer.column(VertexAttribute::BlendIndices),
            Some(&VertexColumn::Byte4(vec![[1, 0, 255, 2], [0; 4]]))
        );
    }

    #[test]
    fn test_bind_drawable_needs_blend_columns() {
        let mut drawable = cloth_drawable(vec![Vec3::ZERO], vec![Vec3::Z], false);
        assert!(matches!(
            bind_drawable(&mut drawable, &unit_triangle(), &[0, 1, 2]),
            Err(Error::Configuration { .. })
        ));
    }

    #[test]
    fn test_blend_bytes() {
        let binding = ClothBinding {
            weights: Vec4::new(0.5, 0.25, 0.25, 0.8),
            indices: [1, 0, BINDING_SENTINEL, 2],
        };
        let (weights, indices) = binding.blend_bytes();
        assert_eq!(weights, [128, 64, 64, 204]);
        assert_eq!(indices, [1, 0, 255, 2]);
    }

    #[test]
    fn test_display_map() {
        let cloth = unit_triangle();
        let mesh = [Vec3::Y, Vec3::new(0.0, 0.0, 4e-6), Vec3::ONE];
        let map = match_display_map(&mesh, &cloth).unwrap();
        assert_eq!(map, vec![Some(2), Some(0), None]);
    }

    #[test]
    fn test_display_map_multiple_matches() {
        let cloth = vec![Vec3::ZERO, Vec3::X, Vec3::ZERO];
        assert!(matches!(
            match_display_map(&[Vec3::ZERO], &cloth),
            Err(Error::Configuration { .. })
        ));
    }
}
