//! Scalar and vector value codecs.

use glam::{Quat, Vec2, Vec3, Vec4};

/// A value that can be stored in an attribute or a text node.
pub trait XmlValue: Sized + Clone + Default {
    /// Parse the value from its trimmed textual form.
    fn parse_xml(text: &str) -> Option<Self>;

    /// Format the value for emission.
    fn to_xml(&self) -> String;
}

/// Format a float in its shortest round-trip form.
///
/// `1.0` is written as `1`, `0.25` as `0.25`.
#[must_use]
pub fn format_f32(value: f32) -> String {
    format!("{value}")
}

fn parse_unsigned(text: &str) -> Option<u64> {
    let text = text.trim();
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()
    } else {
        text.parse().ok()
    }
}

macro_rules! unsigned_value {
    ($($ty:ty),*) => {$(
        impl XmlValue for $ty {
            fn parse_xml(text: &str) -> Option<Self> {
                parse_unsigned(text).and_then(|v| <$ty>::try_from(v).ok())
            }

            fn to_xml(&self) -> String {
                self.to_string()
            }
        }
    )*};
}

macro_rules! signed_value {
    ($($ty:ty),*) => {$(
        impl XmlValue for $ty {
            fn parse_xml(text: &str) -> Option<Self> {
                text.trim().parse().ok()
            }

            fn to_xml(&self) -> String {
                self.to_string()
            }
        }
    )*};
}

unsigned_value!(u8, u16, u32, u64);
signed_value!(i8, i16, i32, i64);

impl XmlValue for f32 {
    fn parse_xml(text: &str) -> Option<Self> {
        text.trim().parse().ok()
    }

    fn to_xml(&self) -> String {
        format_f32(*self)
    }
}

impl XmlValue for f64 {
    fn parse_xml(text: &str) -> Option<Self> {
        text.trim().parse().ok()
    }

    fn to_xml(&self) -> String {
        format!("{self}")
    }
}

/// Booleans are stored as `0`/`1`; `true`/`false` are accepted on read.
impl XmlValue for bool {
    fn parse_xml(text: &str) -> Option<Self> {
        match text.trim() {
            "1" => Some(true),
            "0" => Some(false),
            other if other.eq_ignore_ascii_case("true") => Some(true),
            other if other.eq_ignore_ascii_case("false") => Some(false),
            _ => None,
        }
    }

    fn to_xml(&self) -> String {
        let text = if *self { "1" } else { "0" };
        text.to_string()
    }
}

impl XmlValue for String {
    fn parse_xml(text: &str) -> Option<Self> {
        Some(text.to_string())
    }

    fn to_xml(&self) -> String {
        self.clone()
    }
}

macro_rules! inline_array {
    ($($ty:ty; $n:literal),*) => {$(
        /// Fixed-length inline array written as `a, b, c`.
        impl XmlValue for [$ty; $n] {
            fn parse_xml(text: &str) -> Option<Self> {
                let mut out = [<$ty>::default(); $n];
                let mut tokens = text
                    .split(|c: char| c == ',' || c.is_whitespace())
                    .filter(|t| !t.is_empty());
                for slot in &mut out {
                    *slot = <$ty>::parse_xml(tokens.next()?)?;
                }
                tokens.next().is_none().then_some(out)
            }

            fn to_xml(&self) -> String {
                let parts: Vec<String> = self.iter().map(XmlValue::to_xml).collect();
                parts.join(", ")
            }
        }
    )*};
}

inline_array!(u8; 4, u16; 3, f32; 4);

/// A fixed-width float vector stored as `x`/`y`/`z`/`w` attributes.
pub trait VectorValue: Sized + Copy + Default {
    /// Attribute names, in order.
    const AXES: &'static [&'static str];

    /// Build from `AXES.len()` components.
    fn from_components(components: &[f32]) -> Self;

    /// Components in axis order; entries past `AXES.len()` are ignored.
    fn to_components(&self) -> [f32; 4];
}

impl VectorValue for Vec2 {
    const AXES: &'static [&'static str] = &["x", "y"];

    fn from_components(c: &[f32]) -> Self {
        Vec2::new(c[0], c[1])
    }

    fn to_components(&self) -> [f32; 4] {
        [self.x, self.y, 0.0, 0.0]
    }
}

impl VectorValue for Vec3 {
    const AXES: &'static [&'static str] = &["x", "y", "z"];

    fn from_components(c: &[f32]) -> Self {
        Vec3::new(c[0], c[1], c[2])
    }

    fn to_components(&self) -> [f32; 4] {
        [self.x, self.y, self.z, 0.0]
    }
}

impl VectorValue for Vec4 {
    const AXES: &'static [&'static str] = &["x", "y", "z", "w"];

    fn from_components(c: &[f32]) -> Self {
        Vec4::new(c[0], c[1], c[2], c[3])
    }

    fn to_components(&self) -> [f32; 4] {
        self.to_array()
    }
}

impl VectorValue for Quat {
    const AXES: &'static [&'static str] = &["x", "y", "z", "w"];

    fn from_components(c: &[f32]) -> Self {
        Quat::from_xyzw(c[0], c[1], c[2], c[3])
    }

    fn to_components(&self) -> [f32; 4] {
        self.to_array()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_format_is_shortest() {
        assert_eq!(format_f32(1.0), "1");
        assert_eq!(format_f32(-1.0), "-1");
        assert_eq!(format_f32(0.25), "0.25");
        assert_eq!(format_f32(0.1), "0.1");
    }

    #[test]
    fn test_unsigned_accepts_hex() {
        assert_eq!(u32::parse_xml("0x1F"), Some(31));
        assert_eq!(u32::parse_xml(" 42 "), Some(42));
        assert_eq!(u8::parse_xml("256"), None);
        assert_eq!(u16::parse_xml("-1"), None);
    }

    #[test]
    fn test_bool_forms() {
        assert_eq!(bool::parse_xml("1"), Some(true));
        assert_eq!(bool::parse_xml("False"), Some(false));
        assert_eq!(bool::parse_xml("2"), None);
        assert_eq!(true.to_xml(), "1");
    }

    #[test]
    fn test_inline_arrays() {
        assert_eq!(<[u8; 4]>::parse_xml("1, 0, 255, 2"), Some([1, 0, 255, 2]));
        assert_eq!(<[u8; 4]>::parse_xml("1 2 3"), None);
        assert_eq!(<[u8; 4]>::parse_xml("1 2 3 4 5"), None);
        assert_eq!([0.5f32, 1.0, 0.0, 2.0].to_xml(), "0.5, 1, 0, 2");
    }

    #[test]
    fn test_quat_axes() {
        let q = Quat::from_components(&[0.0, 0.0, 0.0, 1.0]);
        assert_eq!(q, Quat::IDENTITY);
        assert_eq!(q.to_components(), [0.0, 0.0, 0.0, 1.0]);
    }
}
