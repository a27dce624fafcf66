//! Schema-driven element tree codec for CodeWalker-style XML resources.
//!
//! This crate provides the bottom two layers of the resource codec:
//!
//! - **Primitive values**: scalars, vectors, quaternions, matrices, flag sets
//!   and whitespace/comma separated numeric blobs stored in text nodes.
//! - **Records**: a reflection-free binding between tagged elements and Rust
//!   types. A record publishes a constant field table once (see [`schema!`])
//!   and the walker visits that table in order in both directions.
//!
//! # Design principles
//!
//! - **Synchronous**: parsing and emission never suspend
//! - **Explicit**: every declared field is emitted, including defaults
//! - **Located errors**: every failure carries the [`ElementPath`] it occurred at

mod blob;
mod document;
mod error;
mod flags;
mod path;
pub mod property;
mod record;
mod value;

pub use blob::{BlobRow, format_flat, format_rows, parse_flat, parse_rows};
pub use document::{parse_document, write_document};
pub use error::{XmlError, XmlResult};
pub use flags::Flags;
pub use path::ElementPath;
pub use record::{Field, Record, XmlElement};
pub use value::{VectorValue, XmlValue, format_f32};

/// Re-exported element tree types.
pub use xmltree::{Element, XMLNode};

/// Tag used for list entries.
pub const ITEM_TAG: &str = "Item";

/// `type` attribute value marking a null entry in an optional item list.
pub const NONE_TYPE: &str = "None";
