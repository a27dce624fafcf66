//! Embedded texture descriptors. Pixel data lives beside the document.

use cwxml::{Field, Flags, Record};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Texture {
    pub name: String,
    pub usage: String,
    pub usage_flags: Flags,
    pub extra_flags: u32,
    pub width: u16,
    pub height: u16,
    pub mip_levels: u8,
    pub format: String,
    pub filename: String,
}

impl Record for Texture {
    const FIELDS: &'static [Field<Self>] = cwxml::schema!(Texture {
        Text "Name" => name,
        Text "Usage" => usage,
        FlagSet "UsageFlags" => usage_flags,
        Value "ExtraFlags" => extra_flags,
        Value "Width" => width,
        Value "Height" => height,
        Value "MipLevels" => mip_levels,
        Text "Format" => format,
        Text "FileName" => filename,
    });
}

impl Texture {
    /// Descriptor for a `.dds` file named after the texture.
    #[must_use]
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            usage: "UNKNOWN".to_string(),
            mip_levels: 1,
            format: "D3DFMT_DXT1".to_string(),
            filename: format!("{name}.dds"),
            ..Self::default()
        }
    }
}
