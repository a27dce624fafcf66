//! Collision bounds.
//!
//! A bound is one of a closed set of primitives, a polygon soup ("geometry",
//! optionally BVH accelerated) or a composite of child bounds. On disk the
//! variant is selected by the `type` attribute of the element.

mod composite;
mod geometry;

pub use composite::BoundComposite;
pub use geometry::{
    BoundGeometry, BoundMaterial, Polygon, PolygonBox, PolygonCapsule, PolygonCylinder,
    PolygonSphere, PolygonTriangle,
};

use cwxml::property::{attr, set_attr};
use cwxml::{Element, ElementPath, Field, Flags, Record, XmlElement, XmlError, XmlResult};
use glam::{Mat4, Vec3};

/// Fields shared by every bound variant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundBase {
    pub box_min: Vec3,
    pub box_max: Vec3,
    pub box_center: Vec3,
    pub sphere_center: Vec3,
    pub sphere_radius: f32,
    pub margin: f32,
    pub volume: f32,
    pub inertia: Vec3,
    pub material_index: u8,
    pub material_color_index: u8,
    pub procedural_id: u8,
    pub room_id: u8,
    pub ped_density: u8,
    pub unk_flags: u8,
    pub poly_flags: u8,
    pub ref_count: u8,
}

impl Record for BoundBase {
    const FIELDS: &'static [Field<Self>] = cwxml::schema!(BoundBase {
        Vector "BoxMin" => box_min,
        Vector "BoxMax" => box_max,
        Vector "BoxCenter" => box_center,
        Vector "SphereCenter" => sphere_center,
        Value "SphereRadius" => sphere_radius,
        Value "Margin" => margin,
        Value "Volume" => volume,
        Vector "Inertia" => inertia,
        Value "MaterialIndex" => material_index,
        Value "MaterialColourIndex" => material_color_index,
        Value "ProceduralID" => procedural_id,
        Value "RoomID" => room_id,
        Value "PedDensity" => ped_density,
        Value "UnkFlags" => unk_flags,
        Value "PolyFlags" => poly_flags,
        Value "UnkType" => ref_count,
    });
}

impl BoundBase {
    /// Derive the box centre and bounding sphere from the box extents.
    pub fn refresh_from_box(&mut self) {
        self.box_center = (self.box_min + self.box_max) * 0.5;
        self.sphere_center = self.box_center;
        self.sphere_radius = (self.box_max - self.box_min).length() * 0.5;
    }

    /// Grow the box to cover `points`. Returns false if there were none.
    pub(crate) fn fit_points(&mut self, points: impl IntoIterator<Item = Vec3>) -> bool {
        let mut points = points.into_iter();
        let Some(first) = points.next() else {
            return false;
        };
        let (min, max) = points.fold((first, first), |(min, max), p| (min.min(p), max.max(p)));
        self.box_min = min;
        self.box_max = max;
        true
    }
}

/// Placement of a bound inside its parent composite.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildTransform {
    pub transform: Mat4,
    pub flags1: Flags,
    pub flags2: Flags,
}

impl Default for ChildTransform {
    fn default() -> Self {
        Self {
            transform: Mat4::IDENTITY,
            flags1: Flags::new(),
            flags2: Flags::new(),
        }
    }
}

impl Record for ChildTransform {
    const FIELDS: &'static [Field<Self>] = cwxml::schema!(ChildTransform {
        Matrix "CompositeTransform" => transform,
        FlagSet "CompositeFlags1" => flags1,
        FlagSet "CompositeFlags2" => flags2,
    });
}

/// A primitive bound: the box extents describe the shape.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundShape {
    pub base: BoundBase,
    pub child: ChildTransform,
}

impl Record for BoundShape {
    const FIELDS: &'static [Field<Self>] = cwxml::schema!(BoundShape {
        Inline "Base" => base,
        Inline "Child" => child,
    });
}

/// Discriminant of [`Bound`], with its on-disk `type` token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoundKind {
    Box,
    Sphere,
    Capsule,
    Cylinder,
    Disc,
    Plane,
    Geometry,
    GeometryBvh,
    Composite,
}

impl BoundKind {
    /// The `type` token written for this kind.
    #[must_use]
    pub fn type_name(self) -> &'static str {
        match self {
            BoundKind::Box => "Box",
            BoundKind::Sphere => "Sphere",
            BoundKind::Capsule => "Capsule",
            BoundKind::Cylinder => "Cylinder",
            BoundKind::Disc => "Disc",
            BoundKind::Plane => "Plane",
            BoundKind::Geometry => "Geometry",
            BoundKind::GeometryBvh => "GeometryBVH",
            BoundKind::Composite => "Composite",
        }
    }

    /// Parse a `type` token. `Cloth` is an alias of `Plane`.
    #[must_use]
    pub fn from_type_name(name: &str) -> Option<Self> {
        Some(match name {
            "Box" => BoundKind::Box,
            "Sphere" => BoundKind::Sphere,
            "Capsule" => BoundKind::Capsule,
            "Cylinder" => BoundKind::Cylinder,
            "Disc" => BoundKind::Disc,
            "Plane" | "Cloth" => BoundKind::Plane,
            "Geometry" => BoundKind::Geometry,
            "GeometryBVH" => BoundKind::GeometryBvh,
            "Composite" => BoundKind::Composite,
            _ => return None,
        })
    }
}

/// A collision bound.
#[derive(Debug, Clone, PartialEq)]
pub enum Bound {
    Box(BoundShape),
    Sphere(BoundShape),
    Capsule(BoundShape),
    Cylinder(BoundShape),
    Disc(BoundShape),
    Plane(BoundShape),
    Geometry(BoundGeometry),
    GeometryBvh(BoundGeometry),
    Composite(BoundComposite),
}

impl Bound {
    #[must_use]
    pub fn kind(&self) -> BoundKind {
        match self {
            Bound::Box(_) => BoundKind::Box,
            Bound::Sphere(_) => BoundKind::Sphere,
            Bound::Capsule(_) => BoundKind::Capsule,
            Bound::Cylinder(_) => BoundKind::Cylinder,
            Bound::Disc(_) => BoundKind::Disc,
            Bound::Plane(_) => BoundKind::Plane,
            Bound::Geometry(_) => BoundKind::Geometry,
            Bound::GeometryBvh(_) => BoundKind::GeometryBvh,
            Bound::Composite(_) => BoundKind::Composite,
        }
    }

    #[must_use]
    pub fn base(&self) -> &BoundBase {
        match self {
            Bound::Box(s)
            | Bound::Sphere(s)
            | Bound::Capsule(s)
            | Bound::Cylinder(s)
            | Bound::Disc(s)
            | Bound::Plane(s) => &s.base,
            Bound::Geometry(g) | Bound::GeometryBvh(g) => &g.base,
            Bound::Composite(c) => &c.base,
        }
    }

    pub fn base_mut(&mut self) -> &mut BoundBase {
        match self {
            Bound::Box(s)
            | Bound::Sphere(s)
            | Bound::Capsule(s)
            | Bound::Cylinder(s)
            | Bound::Disc(s)
            | Bound::Plane(s) => &mut s.base,
            Bound::Geometry(g) | Bound::GeometryBvh(g) => &mut g.base,
            Bound::Composite(c) => &mut c.base,
        }
    }

    /// Placement within a parent composite. Composites carry none.
    #[must_use]
    pub fn child_transform(&self) -> Option<&ChildTransform> {
        match self {
            Bound::Box(s)
            | Bound::Sphere(s)
            | Bound::Capsule(s)
            | Bound::Cylinder(s)
            | Bound::Disc(s)
            | Bound::Plane(s) => Some(&s.child),
            Bound::Geometry(g) | Bound::GeometryBvh(g) => Some(&g.child),
            Bound::Composite(_) => None,
        }
    }

    /// Recompute derived extents: box centre and sphere for every bound, box
    /// extents from vertices for geometry and from children for composites.
    pub fn refresh(&mut self) {
        match self {
            Bound::Geometry(g) | Bound::GeometryBvh(g) => g.refresh(),
            Bound::Composite(c) => c.refresh(),
            _ => self.base_mut().refresh_from_box(),
        }
    }

    /// Corners of the box in the parent composite's space.
    pub(crate) fn placed_corners(&self) -> [Vec3; 8] {
        let base = self.base();
        let transform = self
            .child_transform()
            .map_or(Mat4::IDENTITY, |c| c.transform);
        let (min, max) = (base.box_min, base.box_max);
        let mut corners = [Vec3::ZERO; 8];
        for (i, corner) in corners.iter_mut().enumerate() {
            let local = Vec3::new(
                if i & 1 == 0 { min.x } else { max.x },
                if i & 2 == 0 { min.y } else { max.y },
                if i & 4 == 0 { min.z } else { max.z },
            );
            *corner = transform.transform_point3(local);
        }
        corners
    }
}

impl XmlElement for Bound {
    fn from_element(element: &Element, path: &ElementPath) -> XmlResult<Self> {
        let Some(type_name) = attr(element, "type") else {
            return Err(XmlError::schema(
                &path.attribute("type"),
                "missing bound type",
            ));
        };
        let kind = BoundKind::from_type_name(type_name)
            .ok_or_else(|| XmlError::unknown_variant(path, type_name))?;
        Ok(match kind {
            BoundKind::Box => Bound::Box(BoundShape::read_fields(element, path)?),
            BoundKind::Sphere => Bound::Sphere(BoundShape::read_fields(element, path)?),
            BoundKind::Capsule => Bound::Capsule(BoundShape::read_fields(element, path)?),
            BoundKind::Cylinder => Bound::Cylinder(BoundShape::read_fields(element, path)?),
            BoundKind::Disc => Bound::Disc(BoundShape::read_fields(element, path)?),
            BoundKind::Plane => Bound::Plane(BoundShape::read_fields(element, path)?),
            BoundKind::Geometry => Bound::Geometry(BoundGeometry::read_fields(element, path)?),
            BoundKind::GeometryBvh => {
                Bound::GeometryBvh(BoundGeometry::read_fields(element, path)?)
            }
            BoundKind::Composite => Bound::Composite(BoundComposite::read_fields(element, path)?),
        })
    }

    fn to_element(&self, tag: &str) -> Option<Element> {
        let mut element = Element::new(tag);
        set_attr(&mut element, "type", self.kind().type_name().to_string());
        match self {
            Bound::Box(s)
            | Bound::Sphere(s)
            | Bound::Capsule(s)
            | Bound::Cylinder(s)
            | Bound::Disc(s)
            | Bound::Plane(s) => s.write_fields(&mut element),
            Bound::Geometry(g) | Bound::GeometryBvh(g) => g.write_fields(&mut element),
            Bound::Composite(c) => c.write_fields(&mut element),
        }
        Some(element)
    }
}

#[cfg(test)]
mod tests {
    use cwxml::parse_document;

    use super::*;

    fn read(xml: &str) -> XmlResult<Bound> {
        let root = parse_document(xml.as_bytes()).unwrap();
        Bound::from_element(&root, &ElementPath::root("Bounds"))
    }

    #[test]
    fn test_cloth_alias_reads_as_plane() {
        let bound = read(r#"<Bounds type="Cloth"><BoxMax x="1" y="0" z="1" /></Bounds>"#).unwrap();
        assert_eq!(bound.kind(), BoundKind::Plane);
        let element = bound.to_element("Bounds").unwrap();
        assert_eq!(attr(&element, "type"), Some("Plane"));
    }

    #[test]
    fn test_unknown_type() {
        let result = read(r#"<Bounds type="Torus" />"#);
        match result {
            Err(XmlError::UnknownVariant { got, .. }) => assert_eq!(got, "Torus"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_missing_type() {
        let result = read("<Bounds />");
        assert!(matches!(result, Err(XmlError::SchemaViolation { .. })));
    }

    #[test]
    fn test_shape_defaults() {
        let bound = read(r#"<Bounds type="Sphere" />"#).unwrap();
        let Bound::Sphere(shape) = bound else {
            panic!("expected a sphere");
        };
        assert_eq!(shape.child.transform, Mat4::IDENTITY);
        assert!(shape.child.flags1.is_empty());
    }

    #[test]
    fn test_refresh_box() {
        let mut bound = read(
            r#"<Bounds type="Box"><BoxMin x="-1" y="-2" z="-2" /><BoxMax x="1" y="2" z="2" /></Bounds>"#,
        )
        .unwrap();
        bound.refresh();
        let base = bound.base();
        assert_eq!(base.box_center, Vec3::ZERO);
        assert_eq!(base.sphere_center, Vec3::ZERO);
        assert!((base.sphere_radius - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_composite_flags_round_trip() {
        let bound = read(
            r#"<Bounds type="Box"><CompositeFlags1>MAP_WEAPON, MAP_DYNAMIC</CompositeFlags1></Bounds>"#,
        )
        .unwrap();
        let element = bound.to_element("Bounds").unwrap();
        let again = Bound::from_element(&element, &ElementPath::root("Bounds")).unwrap();
        assert_eq!(again, bound);
        let flags = &again.child_transform().unwrap().flags1;
        assert_eq!(flags.iter().collect::<Vec<_>>(), ["MAP_WEAPON", "MAP_DYNAMIC"]);
    }
}
