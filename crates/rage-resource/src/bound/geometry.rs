//! Polygon soup bounds.

use cwxml::{Element, ElementPath, Field, Flags, Record, XmlElement, XmlError, XmlResult};
use glam::Vec3;

use super::{BoundBase, ChildTransform};

/// Surface material referenced by polygons.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundMaterial {
    pub material_type: u8,
    pub procedural_id: u8,
    pub room_id: u8,
    pub ped_density: u8,
    pub flags: Flags,
    pub material_colour_index: u8,
    pub unk: u16,
}

impl Record for BoundMaterial {
    const FIELDS: &'static [Field<Self>] = cwxml::schema!(BoundMaterial {
        Value "Type" => material_type,
        Value "ProceduralID" => procedural_id,
        Value "RoomID" => room_id,
        Value "PedDensity" => ped_density,
        FlagSet "Flags" => flags,
        Value "MaterialColourIndex" => material_colour_index,
        Value "Unk" => unk,
    });
}

/// Triangle with its three edge neighbours (`-1` for an open edge).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolygonTriangle {
    pub material_index: u8,
    pub v1: u32,
    pub v2: u32,
    pub v3: u32,
    pub f1: i16,
    pub f2: i16,
    pub f3: i16,
}

impl Record for PolygonTriangle {
    const FIELDS: &'static [Field<Self>] = cwxml::schema!(PolygonTriangle {
        Attr "m" => material_index,
        Attr "v1" => v1,
        Attr "v2" => v2,
        Attr "v3" => v3,
        Attr "f1" => f1,
        Attr "f2" => f2,
        Attr "f3" => f3,
    });
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolygonSphere {
    pub material_index: u8,
    pub v: u32,
    pub radius: f32,
}

impl Record for PolygonSphere {
    const FIELDS: &'static [Field<Self>] = cwxml::schema!(PolygonSphere {
        Attr "m" => material_index,
        Attr "v" => v,
        Attr "radius" => radius,
    });
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolygonCapsule {
    pub material_index: u8,
    pub v1: u32,
    pub v2: u32,
    pub radius: f32,
}

impl Record for PolygonCapsule {
    const FIELDS: &'static [Field<Self>] = cwxml::schema!(PolygonCapsule {
        Attr "m" => material_index,
        Attr "v1" => v1,
        Attr "v2" => v2,
        Attr "radius" => radius,
    });
}

/// Box given by four of its corners.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolygonBox {
    pub material_index: u8,
    pub v1: u32,
    pub v2: u32,
    pub v3: u32,
    pub v4: u32,
}

impl Record for PolygonBox {
    const FIELDS: &'static [Field<Self>] = cwxml::schema!(PolygonBox {
        Attr "m" => material_index,
        Attr "v1" => v1,
        Attr "v2" => v2,
        Attr "v3" => v3,
        Attr "v4" => v4,
    });
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolygonCylinder {
    pub material_index: u8,
    pub v1: u32,
    pub v2: u32,
    pub radius: f32,
}

impl Record for PolygonCylinder {
    const FIELDS: &'static [Field<Self>] = cwxml::schema!(PolygonCylinder {
        Attr "m" => material_index,
        Attr "v1" => v1,
        Attr "v2" => v2,
        Attr "radius" => radius,
    });
}

/// A polygon of a geometry bound, selected on disk by element name.
#[derive(Debug, Clone, PartialEq)]
pub enum Polygon {
    Triangle(PolygonTriangle),
    Sphere(PolygonSphere),
    Capsule(PolygonCapsule),
    Box(PolygonBox),
    Cylinder(PolygonCylinder),
}

impl Polygon {
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            Polygon::Triangle(_) => "Triangle",
            Polygon::Sphere(_) => "Sphere",
            Polygon::Capsule(_) => "Capsule",
            Polygon::Box(_) => "Box",
            Polygon::Cylinder(_) => "Cylinder",
        }
    }

    #[must_use]
    pub fn material_index(&self) -> u8 {
        match self {
            Polygon::Triangle(p) => p.material_index,
            Polygon::Sphere(p) => p.material_index,
            Polygon::Capsule(p) => p.material_index,
            Polygon::Box(p) => p.material_index,
            Polygon::Cylinder(p) => p.material_index,
        }
    }

    /// Vertex indices referenced by the polygon.
    #[must_use]
    pub fn vertices(&self) -> Vec<u32> {
        match self {
            Polygon::Triangle(p) => vec![p.v1, p.v2, p.v3],
            Polygon::Sphere(p) => vec![p.v],
            Polygon::Capsule(p) => vec![p.v1, p.v2],
            Polygon::Box(p) => vec![p.v1, p.v2, p.v3, p.v4],
            Polygon::Cylinder(p) => vec![p.v1, p.v2],
        }
    }

    /// Radius swept around the vertices, zero for flat polygons.
    #[must_use]
    pub fn radius(&self) -> f32 {
        match self {
            Polygon::Sphere(p) => p.radius,
            Polygon::Capsule(p) => p.radius,
            Polygon::Cylinder(p) => p.radius,
            Polygon::Triangle(_) | Polygon::Box(_) => 0.0,
        }
    }
}

impl XmlElement for Polygon {
    fn from_element(element: &Element, path: &ElementPath) -> XmlResult<Self> {
        Ok(match element.name.as_str() {
            "Triangle" => Polygon::Triangle(PolygonTriangle::read_fields(element, path)?),
            "Sphere" => Polygon::Sphere(PolygonSphere::read_fields(element, path)?),
            "Capsule" => Polygon::Capsule(PolygonCapsule::read_fields(element, path)?),
            "Box" => Polygon::Box(PolygonBox::read_fields(element, path)?),
            "Cylinder" => Polygon::Cylinder(PolygonCylinder::read_fields(element, path)?),
            other => return Err(XmlError::unknown_variant(path, other)),
        })
    }

    fn to_element(&self, _tag: &str) -> Option<Element> {
        let mut element = Element::new(self.tag());
        match self {
            Polygon::Triangle(p) => p.write_fields(&mut element),
            Polygon::Sphere(p) => p.write_fields(&mut element),
            Polygon::Capsule(p) => p.write_fields(&mut element),
            Polygon::Box(p) => p.write_fields(&mut element),
            Polygon::Cylinder(p) => p.write_fields(&mut element),
        }
        Some(element)
    }
}

/// Geometry bound: a vertex table and the polygons over it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundGeometry {
    pub base: BoundBase,
    pub child: ChildTransform,
    pub geometry_center: Vec3,
    pub materials: Vec<BoundMaterial>,
    pub vertices: Vec<Vec3>,
    pub vertex_colours: Vec<[u8; 4]>,
    pub polygons: Vec<Polygon>,
}

impl Record for BoundGeometry {
    const FIELDS: &'static [Field<Self>] = cwxml::schema!(BoundGeometry {
        Inline "Base" => base,
        Inline "Child" => child,
        Vector "GeometryCenter" => geometry_center,
        Items "Materials" => materials,
        Rows "Vertices" => vertices,
        Rows "VertexColours" => vertex_colours,
        Elements "Polygons" => polygons,
    });

    fn after_read(&mut self, path: &ElementPath) -> XmlResult<()> {
        let count = self.vertices.len();
        for (index, polygon) in self.polygons.iter().enumerate() {
            if let Some(v) = polygon.vertices().into_iter().find(|&v| v as usize >= count) {
                return Err(XmlError::schema(
                    &path.child("Polygons").item(polygon.tag(), index),
                    format!("vertex {v} out of range for {count} vertices"),
                ));
            }
        }
        if !self.vertex_colours.is_empty() && self.vertex_colours.len() != count {
            return Err(XmlError::schema(
                &path.child("VertexColours"),
                format!(
                    "{} colours for {count} vertices",
                    self.vertex_colours.len()
                ),
            ));
        }
        Ok(())
    }
}

impl BoundGeometry {
    /// Fit the box around the vertices, widened by swept polygon radii.
    ///
    /// Vertices are stored relative to `geometry_center`; the box is in
    /// bound space.
    pub fn refresh(&mut self) {
        let center = self.geometry_center;
        let mut points: Vec<Vec3> = self.vertices.iter().map(|&v| v + center).collect();
        for polygon in &self.polygons {
            let radius = polygon.radius();
            if radius <= 0.0 {
                continue;
            }
            for v in polygon.vertices() {
                if let Some(&p) = self.vertices.get(v as usize) {
                    points.push(p + center - Vec3::splat(radius));
                    points.push(p + center + Vec3::splat(radius));
                }
            }
        }
        self.base.fit_points(points);
        self.base.refresh_from_box();
    }
}
