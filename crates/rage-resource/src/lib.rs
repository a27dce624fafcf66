//! Intermediate representation and XML codec for GTA V resources.
//!
//! Covers the CodeWalker XML form of bounds (`.ybn.xml`), drawables
//! (`.ydr.xml`), drawable dictionaries (`.ydd.xml`), cloth dictionaries
//! (`.yld.xml`) and fragments with environment cloth (`.yft.xml`).
//!
//! Data flows linearly in both directions:
//!
//! - **Decode**: bytes → element tree → records ([`Codec::parse`])
//! - **Encode**: records → derived-field refresh → element tree → bytes
//!   ([`Codec::export`])
//!
//! # Design principles
//!
//! - **Closed variants**: bounds, polygons and shader parameters are enums
//!   dispatched on a `type` attribute or element tag
//! - **Derived fields are explicit**: extents, counters, checksums and tags
//!   are computed by `refresh`, never while writing
//! - **Shared read-only catalogue**: the shader catalogue is built once and
//!   passed by reference
//!
//! # Example
//!
//! ```
//! use rage_resource::{Codec, FileFormat};
//!
//! let codec = Codec::new()?;
//! let xml = br#"<BoundsFile><Bounds type="Composite"><Children>
//!     <Item type="Box"><BoxMin x="-1" y="-1" z="-1"/><BoxMax x="1" y="1" z="1"/></Item>
//!     <Item type="None"/>
//! </Children></Bounds></BoundsFile>"#;
//! let mut resource = codec.parse(FileFormat::Bounds, xml)?;
//! let bytes = codec.export(&mut resource)?;
//! assert!(String::from_utf8_lossy(&bytes).contains("BoundsFile"));
//! # Ok::<(), rage_resource::Error>(())
//! ```

pub mod bound;
pub mod catalogue;
pub mod cloth;
pub mod dictionary;
pub mod drawable;
mod error;
pub mod format;
pub mod fragment;
pub mod hash;
pub mod skeleton;

pub use catalogue::ShaderCatalogue;
pub use error::{Error, Result};
pub use format::{Codec, CodecOptions, FileFormat, ResourceFile};
pub use hash::joaat;
