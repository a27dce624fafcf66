//! Builders that turn triangle meshes into resource records.
//!
//! - [`packer`]: vertex and index buffers for drawables, with skin weight
//!   quantisation, tangent generation and splitting at the vertex limit
//! - [`cloth`]: verlet graphs with pinned vertices first and edges grouped
//!   into lanes of eight, wrapped as character or environment cloth
//! - [`binder`]: rendered vertices bound to cloth triangles, and display
//!   maps matched by position
//!
//! Recoverable problems are returned as diagnostics next to the result and
//! logged through `tracing`; everything else is a [`rage_resource::Error`].

pub mod binder;
pub mod cloth;
pub mod dedup;
pub mod mesh;
pub mod packer;
pub mod skin;
mod tangents;

pub use binder::{
    BindingDiagnostics, BindingError, ClothBinding, bind_drawable, bind_mesh_to_cloth,
    match_display_map,
};
pub use cloth::{ClothGraph, ClothMesh, ClothVertex, build_character_cloth, build_environment_cloth, build_graph};
pub use mesh::{GroupWeight, MeshObject, MeshSkin, MeshTriangle};
pub use packer::{DrawableBuilder, PackDiagnostics, PackWarning};
pub use skin::SkinWeights;
