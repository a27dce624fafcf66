//! Fragments: a drawable plus the environment cloths attached to it.

use cwxml::{ElementPath, Field, ITEM_TAG, Record};
use glam::Vec3;

use crate::catalogue::ShaderCatalogue;
use crate::cloth::EnvironmentCloth;
use crate::drawable::Drawable;
use crate::error::Result;
use crate::format::CodecOptions;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fragment {
    pub name: String,
    pub bounding_sphere_center: Vec3,
    pub bounding_sphere_radius: f32,
    pub drawable: Option<Drawable>,
    pub cloths: Vec<EnvironmentCloth>,
}

impl Record for Fragment {
    const FIELDS: &'static [Field<Self>] = cwxml::schema!(Fragment {
        Text "Name" => name,
        Vector "BoundingSphereCenter" => bounding_sphere_center,
        Value "BoundingSphereRadius" => bounding_sphere_radius,
        OptChild "Drawable" => drawable,
        Items "Cloths" => cloths,
    });
}

impl Fragment {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Refresh the drawable and every cloth, take the bounding sphere from
    /// the drawable, then validate the cloths.
    ///
    /// # Errors
    ///
    /// Propagates drawable refresh errors and cloth validation errors.
    pub fn refresh(&mut self, catalogue: &ShaderCatalogue, options: &CodecOptions) -> Result<()> {
        if let Some(drawable) = &mut self.drawable {
            drawable.refresh(catalogue, options)?;
            self.bounding_sphere_center = drawable.bounding_sphere_center;
            self.bounding_sphere_radius = drawable.bounding_sphere_radius;
        }
        for cloth in &mut self.cloths {
            cloth.refresh(catalogue, options)?;
        }
        self.validate()
    }

    /// # Errors
    ///
    /// Returns the first cloth validation error.
    pub fn validate(&self) -> Result<()> {
        let list = ElementPath::root("Fragment").child("Cloths");
        for (index, cloth) in self.cloths.iter().enumerate() {
            cloth.validate(&list.item(ITEM_TAG, index))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use cwxml::{XmlElement, parse_document, write_document};

    use super::*;
    use crate::cloth::{ClothController, VerletCloth};
    use crate::error::Error;

    fn catalogue() -> ShaderCatalogue {
        ShaderCatalogue::shipped().unwrap()
    }

    #[test]
    fn test_fragment_round_trip() {
        let mut fragment = Fragment::new("prop_flag");
        fragment.drawable = Some(Drawable::new("prop_flag"));
        fragment.cloths.push(EnvironmentCloth {
            flags: 3,
            ..EnvironmentCloth::default()
        });
        let bytes = write_document(&fragment.to_element("Fragment").unwrap()).unwrap();
        let root = parse_document(&bytes).unwrap();
        let again = Fragment::from_element(&root, &ElementPath::root("Fragment")).unwrap();
        assert_eq!(again, fragment);
    }

    #[test]
    fn test_refresh_reports_cloth_path() {
        let mut fragment = Fragment::new("prop_flag");
        fragment.cloths.push(EnvironmentCloth::default());
        fragment.cloths.push(EnvironmentCloth {
            controller: ClothController {
                triangle_indices: vec![0, 1, 5],
                cloth_high: VerletCloth {
                    vertex_positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
                    ..VerletCloth::default()
                },
                ..ClothController::default()
            },
            ..EnvironmentCloth::default()
        });
        match fragment.refresh(&catalogue(), &CodecOptions::default()) {
            Err(Error::Validation { element, .. }) => {
                assert_eq!(
                    element.as_str(),
                    "Fragment/Cloths/Item[1]/Controller/TriangleIndices"
                );
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
