//! Light attachments. The codec treats a light as a flat record.

use cwxml::{Field, Record, XmlValue};
use glam::Vec3;

/// Emitter shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LightType {
    #[default]
    Point,
    Spot,
    Capsule,
}

impl XmlValue for LightType {
    fn parse_xml(text: &str) -> Option<Self> {
        match text.trim() {
            "Point" => Some(LightType::Point),
            "Spot" => Some(LightType::Spot),
            "Capsule" => Some(LightType::Capsule),
            _ => None,
        }
    }

    fn to_xml(&self) -> String {
        match self {
            LightType::Point => "Point",
            LightType::Spot => "Spot",
            LightType::Capsule => "Capsule",
        }
        .to_string()
    }
}

/// 8-bit colour stored as `r`/`g`/`b` attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Default for Rgb {
    fn default() -> Self {
        Self {
            r: 255,
            g: 255,
            b: 255,
        }
    }
}

impl Record for Rgb {
    const FIELDS: &'static [Field<Self>] = cwxml::schema!(Rgb {
        Attr "r" => r,
        Attr "g" => g,
        Attr "b" => b,
    });
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Light {
    pub position: Vec3,
    pub colour: Rgb,
    pub flashiness: u8,
    pub intensity: f32,
    pub flags: u32,
    pub bone_id: u16,
    pub light_type: LightType,
    pub group_id: u8,
    pub time_flags: u32,
    pub falloff: f32,
    pub falloff_exponent: f32,
    pub culling_plane_normal: Vec3,
    pub culling_plane_offset: f32,
    pub unknown_45: u8,
    pub unknown_46: u8,
    pub volume_intensity: f32,
    pub volume_size_scale: f32,
    pub volume_outer_colour: Rgb,
    pub light_hash: u8,
    pub volume_outer_intensity: f32,
    pub corona_size: f32,
    pub volume_outer_exponent: f32,
    pub light_fade_distance: u8,
    pub shadow_fade_distance: u8,
    pub specular_fade_distance: u8,
    pub volumetric_fade_distance: u8,
    pub shadow_near_clip: f32,
    pub corona_intensity: f32,
    pub corona_z_bias: f32,
    pub direction: Vec3,
    pub tangent: Vec3,
    pub cone_inner_angle: f32,
    pub cone_outer_angle: f32,
    pub extent: Vec3,
    pub projected_texture_hash: String,
}

impl Record for Light {
    const FIELDS: &'static [Field<Self>] = cwxml::schema!(Light {
        Vector "Position" => position,
        Nested "Colour" => colour,
        Value "Flashiness" => flashiness,
        Value "Intensity" => intensity,
        Value "Flags" => flags,
        Value "BoneId" => bone_id,
        Text "Type" => light_type,
        Value "GroupId" => group_id,
        Value "TimeFlags" => time_flags,
        Value "Falloff" => falloff,
        Value "FalloffExponent" => falloff_exponent,
        Vector "CullingPlaneNormal" => culling_plane_normal,
        Value "CullingPlaneOffset" => culling_plane_offset,
        Value "Unknown45" => unknown_45,
        Value "Unknown46" => unknown_46,
        Value "VolumeIntensity" => volume_intensity,
        Value "VolumeSizeScale" => volume_size_scale,
        Nested "VolumeOuterColour" => volume_outer_colour,
        Value "LightHash" => light_hash,
        Value "VolumeOuterIntensity" => volume_outer_intensity,
        Value "CoronaSize" => corona_size,
        Value "VolumeOuterExponent" => volume_outer_exponent,
        Value "LightFadeDistance" => light_fade_distance,
        Value "ShadowFadeDistance" => shadow_fade_distance,
        Value "SpecularFadeDistance" => specular_fade_distance,
        Value "VolumetricFadeDistance" => volumetric_fade_distance,
        Value "ShadowNearClip" => shadow_near_clip,
        Value "CoronaIntensity" => corona_intensity,
        Value "CoronaZBias" => corona_z_bias,
        Vector "Direction" => direction,
        Vector "Tangent" => tangent,
        Value "ConeInnerAngle" => cone_inner_angle,
        Value "ConeOuterAngle" => cone_outer_angle,
        Vector "Extent" => extent,
        Text "ProjectedTextureHash" => projected_texture_hash,
    });
}

#[cfg(test)]
mod tests {
    use cwxml::{ElementPath, XmlElement, parse_document};

    use super::*;

    #[test]
    fn test_light_fields() {
        let root = parse_document(
            br#"<Item><Position x="1" y="2" z="3" /><Colour r="255" g="128" b="0" /><Type>Spot</Type><ConeOuterAngle value="45" /></Item>"#,
        )
        .unwrap();
        let light = Light::from_element(&root, &ElementPath::root("Item")).unwrap();
        assert_eq!(light.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(light.colour, Rgb { r: 255, g: 128, b: 0 });
        assert_eq!(light.light_type, LightType::Spot);
        assert_eq!(light.cone_outer_angle, 45.0);
        assert_eq!(light.volume_outer_colour, Rgb::default());

        let element = light.to_element("Item").unwrap();
        let again = Light::from_element(&element, &ElementPath::root("Item")).unwrap();
        assert_eq!(again, light);
    }

    #[test]
    fn test_bad_light_type() {
        let root = parse_document(b"<Item><Type>Area</Type></Item>").unwrap();
        let result = Light::from_element(&root, &ElementPath::root("Item"));
        assert!(result.is_err());
    }
}
