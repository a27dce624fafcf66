//! Dictionary containers: ordered lists of drawables or character cloths
//! stored as `<Item>` children of a typed root.
//!
//! Items are kept in the order they were read or pushed. Export ordering is
//! by the hash of each item's base name, see [`base_name`].

use cwxml::property::{child_elements, push_element};
use cwxml::{Element, ElementPath, ITEM_TAG, XmlElement, XmlResult};

use crate::catalogue::ShaderCatalogue;
use crate::cloth::CharacterCloth;
use crate::drawable::Drawable;
use crate::error::Result;
use crate::format::CodecOptions;
use crate::hash::joaat;

/// Strip a numeric `.NNN` suffix, as left behind by duplicated scene objects.
///
/// ```
/// use rage_resource::dictionary::base_name;
///
/// assert_eq!(base_name("skirt.001"), "skirt");
/// assert_eq!(base_name("head_000_r"), "head_000_r");
/// ```
#[must_use]
pub fn base_name(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, suffix))
            if !stem.is_empty() && !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()) =>
        {
            stem
        }
        _ => name,
    }
}

/// Hash key of an item name.
#[must_use]
pub fn name_hash(name: &str) -> u32 {
    joaat(base_name(name))
}

fn read_items<T: XmlElement>(element: &Element, path: &ElementPath) -> XmlResult<Vec<T>> {
    child_elements(element)
        .filter(|e| e.name == ITEM_TAG)
        .enumerate()
        .map(|(index, item)| T::from_element(item, &path.item(ITEM_TAG, index)))
        .collect()
}

fn write_items<'a, T: XmlElement + 'a>(
    tag: &str,
    items: impl IntoIterator<Item = &'a T>,
) -> Element {
    let mut element = Element::new(tag);
    for item in items {
        if let Some(child) = item.to_element(ITEM_TAG) {
            push_element(&mut element, child);
        }
    }
    element
}

/// Indices of `names` in ascending hash order. Ties keep input order.
fn hash_order<'a>(names: impl Iterator<Item = &'a str>) -> Vec<usize> {
    let keys: Vec<u32> = names.map(name_hash).collect();
    let mut order: Vec<usize> = (0..keys.len()).collect();
    order.sort_by_key(|&i| keys[i]);
    order
}

/// `<DrawableDictionary>` document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrawableDictionary {
    pub drawables: Vec<Drawable>,
}

impl DrawableDictionary {
    pub const ROOT_TAG: &'static str = "DrawableDictionary";

    /// Copy with the drawables in export order.
    #[must_use]
    pub fn sorted(&self) -> Self {
        let order = hash_order(self.drawables.iter().map(|d| d.name.as_str()));
        Self {
            drawables: order.into_iter().map(|i| self.drawables[i].clone()).collect(),
        }
    }

    /// First drawable whose base name hashes to `hash`.
    #[must_use]
    pub fn get_by_hash(&self, hash: u32) -> Option<&Drawable> {
        self.drawables.iter().find(|d| name_hash(&d.name) == hash)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Drawable> {
        self.get_by_hash(name_hash(name))
    }

    /// Refresh every drawable.
    ///
    /// # Errors
    ///
    /// Returns the first drawable refresh error.
    pub fn refresh(&mut self, catalogue: &ShaderCatalogue, options: &CodecOptions) -> Result<()> {
        for drawable in &mut self.drawables {
            drawable.refresh(catalogue, options)?;
        }
        Ok(())
    }
}

impl XmlElement for DrawableDictionary {
    fn from_element(element: &Element, path: &ElementPath) -> XmlResult<Self> {
        Ok(Self {
            drawables: read_items(element, path)?,
        })
    }

    fn to_element(&self, tag: &str) -> Option<Element> {
        Some(write_items(tag, &self.drawables))
    }
}

/// `<ClothDictionary>` document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClothDictionary {
    pub cloths: Vec<CharacterCloth>,
}

impl ClothDictionary {
    pub const ROOT_TAG: &'static str = "ClothDictionary";

    /// Copy with the cloths in export order.
    #[must_use]
    pub fn sorted(&self) -> Self {
        let order = hash_order(self.cloths.iter().map(|c| c.name.as_str()));
        Self {
            cloths: order.into_iter().map(|i| self.cloths[i].clone()).collect(),
        }
    }

    #[must_use]
    pub fn get_by_hash(&self, hash: u32) -> Option<&CharacterCloth> {
        self.cloths.iter().find(|c| name_hash(&c.name) == hash)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&CharacterCloth> {
        self.get_by_hash(name_hash(name))
    }

    /// Refresh every cloth, then validate it.
    ///
    /// # Errors
    ///
    /// Returns the first capacity or validation error, located at the
    /// offending `<Item>`.
    pub fn refresh(&mut self) -> Result<()> {
        let root = ElementPath::root(Self::ROOT_TAG);
        for (index, cloth) in self.cloths.iter_mut().enumerate() {
            cloth.refresh();
            cloth.validate(&root.item(ITEM_TAG, index))?;
        }
        Ok(())
    }
}

impl XmlElement for ClothDictionary {
    fn from_element(element: &Element, path: &ElementPath) -> XmlResult<Self> {
        Ok(Self {
            cloths: read_items(element, path)?,
        })
    }

    fn to_element(&self, tag: &str) -> Option<Element> {
        Some(write_items(tag, &self.cloths))
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_base_name() {
        assert_eq!(base_name("skirt.001"), "skirt");
        assert_eq!(base_name("skirt.1.002"), "skirt.1");
        assert_eq!(base_name("skirt."), "skirt.");
        assert_eq!(base_name(".001"), ".001");
        assert_eq!(base_name("lod.high"), "lod.high");
    }

    #[test]
    fn test_lookup_by_name_ignores_suffix() {
        let dictionary = DrawableDictionary {
            drawables: vec![Drawable::new("head_000.002"), Drawable::new("uppr_001")],
        };
        assert_eq!(dictionary.get("head_000").unwrap().name, "head_000.002");
        assert_eq!(
            dictionary.get_by_hash(joaat("uppr_001")).unwrap().name,
            "uppr_001"
        );
        assert!(dictionary.get("lowr_000").is_none());
    }

    #[test]
    fn test_sorted_does_not_touch_original() {
        let dictionary = DrawableDictionary {
            drawables: ["c", "a", "b"].into_iter().map(Drawable::new).collect(),
        };
        let sorted = dictionary.sorted();
        assert_eq!(dictionary.drawables[0].name, "c");
        let keys: Vec<u32> = sorted.drawables.iter().map(|d| name_hash(&d.name)).collect();
        assert!(keys.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_cloth_dictionary_round_trip() {
        let dictionary = ClothDictionary {
            cloths: vec![
                CharacterCloth {
                    name: "skirt".to_string(),
                    ..CharacterCloth::default()
                },
                CharacterCloth {
                    name: "cape".to_string(),
                    ..CharacterCloth::default()
                },
            ],
        };
        let element = dictionary.to_element(ClothDictionary::ROOT_TAG).unwrap();
        let again =
            ClothDictionary::from_element(&element, &ElementPath::root(ClothDictionary::ROOT_TAG))
                .unwrap();
        assert_eq!(again, dictionary);
    }

    proptest! {
        #[test]
        fn test_sorted_orders_by_base_name_hash(names in prop::collection::vec("[a-z_]{1,8}(\\.[0-9]{3})?", 0..12)) {
            let dictionary = ClothDictionary {
                cloths: names
                    .iter()
                    .map(|name| CharacterCloth { name: name.clone(), ..CharacterCloth::default() })
                    .collect(),
            };
            let sorted = dictionary.sorted();
            prop_assert_eq!(sorted.cloths.len(), names.len());
            let keys: Vec<u32> = sorted.cloths.iter().map(|c| name_hash(&c.name)).collect();
            prop_assert!(keys.windows(2).all(|w| w[0] <= w[1]));
        }
    }
}
