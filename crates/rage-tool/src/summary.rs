//! Plain-text summaries of resources and shader definitions.

use std::fmt::Write as _;

use rage_resource::ResourceFile;
use rage_resource::bound::Bound;
use rage_resource::catalogue::ShaderDef;
use rage_resource::cloth::CharacterCloth;
use rage_resource::dictionary::name_hash;
use rage_resource::drawable::{Drawable, LodLevel};

pub fn resource(file: &ResourceFile) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "format: {}", file.format());
    match file {
        ResourceFile::Bounds(file) => bound(&mut out, &file.bounds, 0),
        ResourceFile::Drawable(d) => drawable(&mut out, d, 0),
        ResourceFile::DrawableDictionary(dictionary) => {
            let _ = writeln!(out, "drawables: {}", dictionary.drawables.len());
            for d in &dictionary.drawables {
                drawable(&mut out, d, 1);
            }
        }
        ResourceFile::ClothDictionary(dictionary) => {
            let _ = writeln!(out, "cloths: {}", dictionary.cloths.len());
            for c in &dictionary.cloths {
                character_cloth(&mut out, c);
            }
        }
        ResourceFile::Fragment(fragment) => {
            let _ = writeln!(out, "fragment: {}", fragment.name);
            if let Some(d) = &fragment.drawable {
                drawable(&mut out, d, 1);
            }
            for (index, cloth) in fragment.cloths.iter().enumerate() {
                let _ = writeln!(
                    out,
                    "  cloth {index}: {} vertices, {} edges",
                    cloth.vertex_count(),
                    cloth.controller.cloth_high.edges.len()
                );
            }
        }
    }
    out
}

fn bound(out: &mut String, node: &Bound, depth: usize) {
    let indent = "  ".repeat(depth);
    match node {
        Bound::Composite(composite) => {
            let _ = writeln!(out, "{indent}Composite, {} children", composite.child_count());
            for child in &composite.children {
                match child {
                    Some(child) => bound(out, child, depth + 1),
                    None => {
                        let _ = writeln!(out, "{indent}  None");
                    }
                }
            }
        }
        Bound::Geometry(geometry) | Bound::GeometryBvh(geometry) => {
            let _ = writeln!(
                out,
                "{indent}{}, {} vertices, {} polygons",
                node.kind().type_name(),
                geometry.vertices.len(),
                geometry.polygons.len()
            );
        }
        other => {
            let _ = writeln!(out, "{indent}{}", other.kind().type_name());
        }
    }
}

fn drawable(out: &mut String, drawable: &Drawable, depth: usize) {
    let indent = "  ".repeat(depth);
    let _ = writeln!(
        out,
        "{indent}drawable: {} (hash {:08x})",
        drawable.name,
        name_hash(&drawable.name)
    );
    let _ = writeln!(out, "{indent}  shaders: {}", drawable.shader_group.shaders.len());
    for level in LodLevel::ALL {
        let models = drawable.lod(level);
        if models.is_empty() {
            continue;
        }
        let geometries: usize = models.iter().map(|m| m.geometries.len()).sum();
        let vertices: usize = models
            .iter()
            .flat_map(|m| &m.geometries)
            .map(|g| g.vertex_buffer.vertex_count())
            .sum();
        let _ = writeln!(
            out,
            "{indent}  {}: {} models, {geometries} geometries, {vertices} vertices",
            level.tag(),
            models.len()
        );
    }
    if let Some(skeleton) = &drawable.skeleton {
        let _ = writeln!(out, "{indent}  bones: {}", skeleton.bones.len());
    }
}

fn character_cloth(out: &mut String, cloth: &CharacterCloth) {
    let _ = writeln!(
        out,
        "  cloth: {} (hash {:08x}), {} vertices, {} bones",
        cloth.name,
        name_hash(&cloth.name),
        cloth.vertex_count(),
        cloth.controller.bone_ids.len()
    );
}

pub fn shader(def: &ShaderDef) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "shader: {}{}", def.name, if def.is_cloth { " (cloth)" } else { "" });
    for filename in &def.filenames {
        let _ = writeln!(out, "  file: {} bucket {}", filename.filename, filename.render_bucket);
    }
    for layout in &def.layouts {
        let tags: Vec<&str> = layout.attributes.iter().map(|a| a.tag()).collect();
        let _ = writeln!(out, "  layout {:?}: {}", layout.family, tags.join(" "));
    }
    for parameter in &def.parameters {
        let _ = writeln!(out, "  parameter: {} ({})", parameter.name, parameter.kind.type_name());
    }
    out
}
