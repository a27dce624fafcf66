//! Models and their geometries.

use cwxml::{ElementPath, Field, Record, XmlError, XmlResult};
use glam::Vec3;

use super::{IndexBuffer, VertexBuffer};

/// One draw call: a vertex buffer, its indices and the shader they use.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Geometry {
    pub shader_index: u16,
    pub bbox_min: Vec3,
    pub bbox_max: Vec3,
    /// Skeleton bone indices addressed by the blend indices; empty when unskinned.
    pub bone_ids: Vec<u16>,
    pub vertex_buffer: VertexBuffer,
    pub index_buffer: IndexBuffer,
}

impl Record for Geometry {
    const FIELDS: &'static [Field<Self>] = cwxml::schema!(Geometry {
        Value "ShaderIndex" => shader_index,
        Vector "BoundingBoxMin" => bbox_min,
        Vector "BoundingBoxMax" => bbox_max,
        CommaList "BoneIDs" => bone_ids,
        Child "VertexBuffer" => vertex_buffer,
        Child "IndexBuffer" => index_buffer,
    });

    fn after_read(&mut self, path: &ElementPath) -> XmlResult<()> {
        let count = self.vertex_buffer.vertex_count();
        if let Some(&index) = self.index_buffer.indices.iter().find(|&&i| i as usize >= count) {
            return Err(XmlError::schema(
                &path.child("IndexBuffer").child("Data"),
                format!("index {index} out of range for {count} vertices"),
            ));
        }
        Ok(())
    }
}

impl Geometry {
    #[must_use]
    pub fn new(shader_index: u16, vertex_buffer: VertexBuffer, index_buffer: IndexBuffer) -> Self {
        let mut geometry = Self {
            shader_index,
            vertex_buffer,
            index_buffer,
            ..Self::default()
        };
        geometry.refresh_extents();
        geometry
    }

    /// Fit the bounding box around the vertex positions.
    pub fn refresh_extents(&mut self) {
        let positions = self.vertex_buffer.positions();
        if let Some(&first) = positions.first() {
            let (min, max) = positions
                .iter()
                .fold((first, first), |(min, max), &p| (min.min(p), max.max(p)));
            self.bbox_min = min;
            self.bbox_max = max;
        }
    }

    #[must_use]
    pub fn is_skinned(&self) -> bool {
        self.vertex_buffer.layout().is_skinned()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrawableModel {
    pub render_mask: u8,
    pub flags: u16,
    pub has_skin: bool,
    pub bone_index: u16,
    pub matrix_count: u32,
    pub geometries: Vec<Geometry>,
}

impl Record for DrawableModel {
    const FIELDS: &'static [Field<Self>] = cwxml::schema!(DrawableModel {
        Value "RenderMask" => render_mask,
        Value "Flags" => flags,
        Value "HasSkin" => has_skin,
        Value "BoneIndex" => bone_index,
        Value "MatrixCount" => matrix_count,
        Items "Geometries" => geometries,
    });
}

impl DrawableModel {
    /// Union of the geometry boxes, `None` for a model without geometry.
    #[must_use]
    pub fn extents(&self) -> Option<(Vec3, Vec3)> {
        self.geometries
            .iter()
            .filter(|g| !g.vertex_buffer.is_empty())
            .map(|g| (g.bbox_min, g.bbox_max))
            .reduce(|(amin, amax), (bmin, bmax)| (amin.min(bmin), amax.max(bmax)))
    }
}
