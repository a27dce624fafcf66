//! Cloth controllers: the bridge to the rendered mesh plus the simulation
//! graphs per level of detail.

use cwxml::{ElementPath, Field, Record};
use glam::Vec4;

use super::VerletCloth;
use crate::error::{Error, Result};

/// Per-vertex tables linking the rendered mesh to the simulation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClothBridge {
    pub vertex_count_high: u32,
    pub vertex_count_med: u32,
    pub vertex_count_low: u32,
    pub vertex_count_vlow: u32,
    /// Soft pin radii, set-major: all of set 0, then set 1, and so on.
    pub pin_radius_high: Vec<f32>,
    pub vertex_weights_high: Vec<f32>,
    pub inflation_scale_high: Vec<f32>,
    /// Rendered vertex index to cloth vertex index.
    pub display_map_high: Vec<u16>,
}

impl Record for ClothBridge {
    const FIELDS: &'static [Field<Self>] = cwxml::schema!(ClothBridge {
        Value "VertexCountHigh" => vertex_count_high,
        Value "VertexCountMed" => vertex_count_med,
        Value "VertexCountLow" => vertex_count_low,
        Value "VertexCountVlow" => vertex_count_vlow,
        Numbers "PinRadiusHigh" => pin_radius_high,
        Numbers "VertexWeightsHigh" => vertex_weights_high,
        Numbers "InflationScaleHigh" => inflation_scale_high,
        Numbers "DisplayMapHigh" => display_map_high,
    });
}

impl ClothBridge {
    /// Number of pin radius sets held by `pin_radius_high`.
    #[must_use]
    pub fn pin_radius_sets(&self) -> usize {
        let count = self.vertex_count_high as usize;
        if count == 0 {
            0
        } else {
            self.pin_radius_high.len() / count
        }
    }

    /// Pin radius of `vertex` in `set`.
    #[must_use]
    pub fn pin_radius(&self, set: usize, vertex: usize) -> Option<f32> {
        let count = self.vertex_count_high as usize;
        if vertex >= count {
            return None;
        }
        self.pin_radius_high.get(set * count + vertex).copied()
    }
}

/// Mesh morph mapping between the rendered and simulated vertices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MorphController {
    pub poly_count_high: u32,
    pub vertex_map_high: Vec<u16>,
    pub index_map_high: Vec<u16>,
}

impl Record for MorphController {
    const FIELDS: &'static [Field<Self>] = cwxml::schema!(MorphController {
        Value "PolyCountHigh" => poly_count_high,
        Numbers "VertexMapHigh" => vertex_map_high,
        Numbers "IndexMapHigh" => index_map_high,
    });
}

/// Bridge, morph data and the verlet graph of each level.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClothController {
    pub name: String,
    pub flags: u32,
    pub bridge: ClothBridge,
    pub morph: Option<MorphController>,
    /// Cloth-order triangle corners, three per triangle.
    pub triangle_indices: Vec<u16>,
    pub cloth_high: VerletCloth,
    pub cloth_med: Option<VerletCloth>,
    pub cloth_low: Option<VerletCloth>,
}

impl Record for ClothController {
    const FIELDS: &'static [Field<Self>] = cwxml::schema!(ClothController {
        Text "Name" => name,
        Value "Flags" => flags,
        Nested "Bridge" => bridge,
        OptChild "MorphController" => morph,
        Numbers "TriangleIndices" => triangle_indices,
        Nested "VerletCloth1" => cloth_high,
        OptChild "VerletCloth2" => cloth_med,
        OptChild "VerletCloth3" => cloth_low,
    });
}

impl ClothController {
    /// Simulated vertices at the highest level.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.cloth_high.vertex_count()
    }

    fn levels_mut(&mut self) -> impl Iterator<Item = &mut VerletCloth> {
        std::iter::once(&mut self.cloth_high)
            .chain(self.cloth_med.as_mut())
            .chain(self.cloth_low.as_mut())
    }

    /// Refit every level's box and sync the bridge vertex counts.
    pub fn refresh(&mut self) {
        for cloth in self.levels_mut() {
            cloth.refresh_extents();
            if let Some(bounds) = &mut cloth.bounds {
                bounds.refresh();
            }
        }
        self.bridge.vertex_count_high = self.cloth_high.vertex_count() as u32;
        self.bridge.vertex_count_med = level_count(self.cloth_med.as_ref());
        self.bridge.vertex_count_low = level_count(self.cloth_low.as_ref());
    }

    /// Check the bridge tables and every simulation level.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if a triangle or display map entry
    /// points past the cloth vertices, a per-vertex table has the wrong
    /// length or a level breaks a graph invariant.
    pub fn validate(&self, path: &ElementPath) -> Result<()> {
        let count = self.vertex_count();
        if self.triangle_indices.len() % 3 != 0 {
            return Err(Error::validation(
                &path.child("TriangleIndices"),
                format!(
                    "{} indices is not a whole number of triangles",
                    self.triangle_indices.len()
                ),
            ));
        }
        if let Some(bad) = self.triangle_indices.iter().find(|&&i| usize::from(i) >= count) {
            return Err(Error::validation(
                &path.child("TriangleIndices"),
                format!("index {bad} out of range for {count} vertices"),
            ));
        }

        let bridge = path.child("Bridge");
        if let Some(bad) = self.bridge.display_map_high.iter().find(|&&i| usize::from(i) >= count) {
            return Err(Error::validation(
                &bridge.child("DisplayMapHigh"),
                format!("cloth vertex {bad} out of range for {count} vertices"),
            ));
        }
        for (tag, len) in [
            ("VertexWeightsHigh", self.bridge.vertex_weights_high.len()),
            ("InflationScaleHigh", self.bridge.inflation_scale_high.len()),
        ] {
            if len != 0 && len != count {
                return Err(Error::validation(
                    &bridge.child(tag),
                    format!("{len} values for {count} vertices"),
                ));
            }
        }
        if count > 0 && self.bridge.pin_radius_high.len() % count != 0 {
            return Err(Error::validation(
                &bridge.child("PinRadiusHigh"),
                format!(
                    "{} radii is not a whole number of sets for {count} vertices",
                    self.bridge.pin_radius_high.len()
                ),
            ));
        }

        self.cloth_high.validate(&path.child("VerletCloth1"))?;
        if let Some(cloth) = &self.cloth_med {
            cloth.validate(&path.child("VerletCloth2"))?;
        }
        if let Some(cloth) = &self.cloth_low {
            cloth.validate(&path.child("VerletCloth3"))?;
        }
        Ok(())
    }
}

fn level_count(cloth: Option<&VerletCloth>) -> u32 {
    cloth.map_or(0, |c| c.vertex_count() as u32)
}

/// Skinning of one cloth vertex to up to four bones.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CharacterClothBinding {
    pub weights: Vec4,
    /// Positions in the controller's compact bone tables.
    pub indices: [u8; 4],
}

impl Record for CharacterClothBinding {
    const FIELDS: &'static [Field<Self>] = cwxml::schema!(CharacterClothBinding {
        Vector "Weights" => weights,
        Text "Indices" => indices,
    });
}

/// Controller of a character cloth: the common controller plus bone bindings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CharacterClothController {
    pub base: ClothController,
    /// Skeleton bone index of each compact bone slot.
    pub bone_indices: Vec<u32>,
    /// Bone tag of each compact bone slot.
    pub bone_ids: Vec<u32>,
    pub bindings: Vec<CharacterClothBinding>,
}

impl Record for CharacterClothController {
    const FIELDS: &'static [Field<Self>] = cwxml::schema!(CharacterClothController {
        Inline "Base" => base,
        Numbers "BoneIndices" => bone_indices,
        Numbers "BoneIDs" => bone_ids,
        Items "Bindings" => bindings,
    });
}

impl CharacterClothController {
    /// Check the common controller, then that every cloth vertex has a
    /// binding into the bone tables.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] on the first broken table.
    pub fn validate(&self, path: &ElementPath) -> Result<()> {
        self.base.validate(path)?;
        if self.bone_indices.len() != self.bone_ids.len() {
            return Err(Error::validation(
                &path.child("BoneIDs"),
                format!(
                    "{} bone ids for {} bone indices",
                    self.bone_ids.len(),
                    self.bone_indices.len()
                ),
            ));
        }
        let count = self.base.vertex_count();
        if self.bindings.len() != count {
            return Err(Error::validation(
                &path.child("Bindings"),
                format!("{} bindings for {count} vertices", self.bindings.len()),
            ));
        }
        let list = path.child("Bindings");
        for (index, binding) in self.bindings.iter().enumerate() {
            let used = binding
                .indices
                .iter()
                .zip(binding.weights.to_array())
                .filter(|&(_, weight)| weight > 0.0);
            for (&slot, _) in used {
                if usize::from(slot) >= self.bone_ids.len() {
                    return Err(Error::validation(
                        &list.item(cwxml::ITEM_TAG, index).child("Indices"),
                        format!("bone slot {slot} out of range for {} bones", self.bone_ids.len()),
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use cwxml::{XmlElement, parse_document, write_document};
    use glam::Vec3;

    use super::*;

    #[test]
    fn test_pin_radius_sets_are_set_major() {
        let bridge = ClothBridge {
            vertex_count_high: 3,
            pin_radius_high: vec![0.1, 0.2, 0.3, 1.1, 1.2, 1.3],
            ..ClothBridge::default()
        };
        assert_eq!(bridge.pin_radius_sets(), 2);
        assert_eq!(bridge.pin_radius(1, 0), Some(1.1));
        assert_eq!(bridge.pin_radius(0, 2), Some(0.3));
        assert_eq!(bridge.pin_radius(0, 3), None);
    }

    fn triangle_controller() -> ClothController {
        ClothController {
            triangle_indices: vec![0, 1, 2],
            bridge: ClothBridge {
                display_map_high: vec![2, 0, 1],
                ..ClothBridge::default()
            },
            cloth_high: VerletCloth {
                vertex_positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
                ..VerletCloth::default()
            },
            ..ClothController::default()
        }
    }

    #[test]
    fn test_refresh_syncs_counts() {
        let mut controller = triangle_controller();
        controller.refresh();
        assert_eq!(controller.bridge.vertex_count_high, 3);
        assert_eq!(controller.bridge.vertex_count_med, 0);
        assert_eq!(controller.cloth_high.bb_max, Vec3::new(1.0, 1.0, 0.0));
        assert!(controller.validate(&ElementPath::root("Controller")).is_ok());
    }

    #[test]
    fn test_display_map_out_of_range() {
        let mut controller = triangle_controller();
        controller.bridge.display_map_high[0] = 3;
        match controller.validate(&ElementPath::root("Controller")) {
            Err(Error::Validation { element, .. }) => {
                assert_eq!(element.as_str(), "Controller/Bridge/DisplayMapHigh");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_binding_count_must_match_vertices() {
        let controller = CharacterClothController {
            base: triangle_controller(),
            bone_indices: vec![0],
            bone_ids: vec![0],
            bindings: vec![CharacterClothBinding::default(); 2],
        };
        assert!(matches!(
            controller.validate(&ElementPath::root("Controller")),
            Err(Error::Validation { .. })
        ));
    }

    #[test]
    fn test_character_controller_round_trip() {
        let controller = CharacterClothController {
            base: ClothController {
                name: "skirt".to_string(),
                triangle_indices: vec![0, 1, 2],
                ..ClothController::default()
            },
            bone_indices: vec![0, 14],
            bone_ids: vec![0, 14410],
            bindings: vec![CharacterClothBinding {
                weights: Vec4::new(0.75, 0.25, 0.0, 0.0),
                indices: [1, 0, 0, 0],
            }],
        };
        let bytes = write_document(&controller.to_element("Controller").unwrap()).unwrap();
        let root = parse_document(&bytes).unwrap();
        let again =
            CharacterClothController::from_element(&root, &ElementPath::root("Controller"))
                .unwrap();
        assert_eq!(again, controller);
        assert!(root.get_child("VerletCloth1").is_some());
        assert!(root.get_child("VerletCloth2").is_none());
    }
}
