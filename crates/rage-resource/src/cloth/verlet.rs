//! Verlet simulation graphs.

use cwxml::{ElementPath, Field, ITEM_TAG, Record};
use glam::Vec3;

use crate::bound::Bound;
use crate::error::{Error, Result};

/// Edges per SIMD lane group.
pub const LANE_WIDTH: usize = 8;

/// Rest length of padding edges.
pub const PADDING_LENGTH_SQR: f32 = 1e8;

/// Distance constraint between two cloth vertices.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Edge {
    pub v0: u16,
    pub v1: u16,
    /// Squared rest length.
    pub length_sqr: f32,
    /// Share of the correction applied to `v0`: 0, 0.5 or 1.
    pub weight0: f32,
    pub compression_weight: f32,
}

impl Record for Edge {
    const FIELDS: &'static [Field<Self>] = cwxml::schema!(Edge {
        Value "Vertex0" => v0,
        Value "Vertex1" => v1,
        Value "Length" => length_sqr,
        Value "Weight0" => weight0,
        Value "CompressionWeight" => compression_weight,
    });
}

impl Edge {
    /// Filler that completes a short lane group.
    pub const PADDING: Edge = Edge {
        v0: 0,
        v1: 0,
        length_sqr: PADDING_LENGTH_SQR,
        weight0: 0.0,
        compression_weight: 0.0,
    };

    #[must_use]
    pub fn is_padding(&self) -> bool {
        *self == Self::PADDING
    }
}

/// First lane group, by index, in which a vertex id repeats. Padding edges
/// are ignored.
#[must_use]
pub fn lane_conflict(edges: &[Edge]) -> Option<usize> {
    edges.chunks(LANE_WIDTH).position(|group| {
        let mut seen = Vec::with_capacity(LANE_WIDTH * 2);
        for edge in group.iter().filter(|e| !e.is_padding()) {
            for v in [edge.v0, edge.v1] {
                if seen.contains(&v) {
                    return true;
                }
                seen.push(v);
            }
        }
        false
    })
}

/// One level of detail of a cloth simulation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VerletCloth {
    pub bb_min: Vec3,
    pub bb_max: Vec3,
    pub switch_distance_up: f32,
    pub switch_distance_down: f32,
    pub flags: u32,
    pub pinned_vertices_count: u32,
    pub dynamic_pin_list_size: u32,
    pub cloth_weight: f32,
    pub vertex_positions: Vec<Vec3>,
    /// Empty when the cloth carries no normals.
    pub vertex_normals: Vec<Vec3>,
    pub edges: Vec<Edge>,
    pub custom_edges: Vec<Edge>,
    pub bounds: Option<Bound>,
}

impl Record for VerletCloth {
    const FIELDS: &'static [Field<Self>] = cwxml::schema!(VerletCloth {
        Vector "BBMin" => bb_min,
        Vector "BBMax" => bb_max,
        Value "SwitchDistanceUp" => switch_distance_up,
        Value "SwitchDistanceDown" => switch_distance_down,
        Value "Flags" => flags,
        Value "PinnedVerticesCount" => pinned_vertices_count,
        Value "DynamicPinListSize" => dynamic_pin_list_size,
        Value "ClothWeight" => cloth_weight,
        Rows "VertexPositions" => vertex_positions,
        Rows "VertexNormals" => vertex_normals,
        Items "Edges" => edges,
        Items "CustomEdges" => custom_edges,
        OptChild "Bounds" => bounds,
        sentinel "Behaviour",
        sentinel "Unknown140",
    });
}

impl VerletCloth {
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertex_positions.len()
    }

    /// Fit the box around the vertex positions.
    pub fn refresh_extents(&mut self) {
        if let Some(&first) = self.vertex_positions.first() {
            let (min, max) = self
                .vertex_positions
                .iter()
                .fold((first, first), |(min, max), &p| (min.min(p), max.max(p)));
            self.bb_min = min;
            self.bb_max = max;
        }
    }

    /// Check the graph invariants: edge endpoints in range, rest lengths
    /// matching positions, weights drawn from {0, 0.5, 1} and lane groups
    /// free of repeated vertices.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] at the first offending edge or group.
    pub fn validate(&self, path: &ElementPath) -> Result<()> {
        if self.pinned_vertices_count as usize > self.vertex_count() {
            return Err(Error::validation(
                &path.child("PinnedVerticesCount"),
                format!(
                    "{} pinned of {} vertices",
                    self.pinned_vertices_count,
                    self.vertex_count()
                ),
            ));
        }
        if !self.vertex_normals.is_empty() && self.vertex_normals.len() != self.vertex_count() {
            return Err(Error::validation(
                &path.child("VertexNormals"),
                format!(
                    "{} normals for {} vertices",
                    self.vertex_normals.len(),
                    self.vertex_count()
                ),
            ));
        }
        for (tag, edges) in [("Edges", &self.edges), ("CustomEdges", &self.custom_edges)] {
            let list = path.child(tag);
            for (index, edge) in edges.iter().enumerate() {
                if edge.is_padding() {
                    continue;
                }
                let item = list.item(ITEM_TAG, index);
                let (Some(a), Some(b)) = (
                    self.vertex_positions.get(usize::from(edge.v0)),
                    self.vertex_positions.get(usize::from(edge.v1)),
                ) else {
                    return Err(Error::validation(&item, "edge vertex out of range"));
                };
                let expected = a.distance_squared(*b);
                if (edge.length_sqr - expected).abs() > 1e-4 * expected.max(1.0) {
                    return Err(Error::validation(
                        &item,
                        format!("rest length {} but vertices are {expected} apart", edge.length_sqr),
                    ));
                }
                if ![0.0, 0.5, 1.0].contains(&edge.weight0) {
                    return Err(Error::validation(
                        &item,
                        format!("weight0 {} is not 0, 0.5 or 1", edge.weight0),
                    ));
                }
            }
            if let Some(group) = lane_conflict(edges) {
                return Err(Error::validation(
                    &list,
                    format!("lane group {group} repeats a vertex"),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use cwxml::{XmlElement, parse_document};

    use super::*;

    fn cloth() -> VerletCloth {
        VerletCloth {
            vertex_positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::ONE],
            pinned_vertices_count: 1,
            edges: vec![
                Edge {
                    v0: 0,
                    v1: 1,
                    length_sqr: 1.0,
                    weight0: 0.0,
                    compression_weight: 0.25,
                },
                Edge {
                    v0: 2,
                    v1: 3,
                    length_sqr: 2.0,
                    weight0: 0.5,
                    compression_weight: 0.25,
                },
            ],
            ..VerletCloth::default()
        }
    }

    #[test]
    fn test_sentinels_always_emitted() {
        let element = VerletCloth::default().to_element("VerletCloth1").unwrap();
        assert!(element.get_child("Behaviour").is_some());
        assert!(element.get_child("Unknown140").is_some());
    }

    #[test]
    fn test_round_trip() {
        let mut cloth = cloth();
        cloth.edges.extend([Edge::PADDING; 6]);
        let element = cloth.to_element("VerletCloth1").unwrap();
        let again = VerletCloth::from_element(&element, &ElementPath::root("VerletCloth1")).unwrap();
        assert_eq!(again, cloth);
        assert!(again.edges[7].is_padding());
    }

    #[test]
    fn test_validate_accepts_graph() {
        assert!(cloth().validate(&ElementPath::root("VerletCloth1")).is_ok());
    }

    #[test]
    fn test_validate_rejects_wrong_length() {
        let mut cloth = cloth();
        cloth.edges[1].length_sqr = 1.0;
        assert!(matches!(
            cloth.validate(&ElementPath::root("VerletCloth1")),
            Err(Error::Validation { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_lane_conflict() {
        let mut cloth = cloth();
        cloth.edges[1].v0 = 1;
        cloth.edges[1].length_sqr = 2.0;
        match cloth.validate(&ElementPath::root("VerletCloth1")) {
            Err(Error::Validation { element, .. }) => {
                assert_eq!(element.as_str(), "VerletCloth1/Edges");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_lane_conflict_ignores_padding() {
        let edges = [Edge::PADDING, Edge::PADDING];
        assert_eq!(lane_conflict(&edges), None);
    }

    #[test]
    fn test_reads_edge_values() {
        let root = parse_document(
            br#"<Item><Vertex0 value="3" /><Vertex1 value="7" /><Length value="0.25" /><Weight0 value="1" /><CompressionWeight value="0.25" /></Item>"#,
        )
        .unwrap();
        let edge = Edge::from_element(&root, &ElementPath::root("Item")).unwrap();
        assert_eq!((edge.v0, edge.v1), (3, 7));
        assert_eq!(edge.length_sqr, 0.25);
    }
}
