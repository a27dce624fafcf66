//! Skeletons, bone tags and joint limits.

use cwxml::{ElementPath, Field, Flags, Record, format_f32};
use glam::{Quat, Vec3, Vec4};

use crate::error::{Error, Result};
use crate::hash::joaat;

/// Tag of the root bone.
pub const ROOT_TAG: u32 = 0;

/// Flag token set on bones with a rotation limit.
pub const LIMIT_ROTATION: &str = "LimitRotation";

/// Flag token set on bones with a translation limit.
pub const LIMIT_TRANSLATION: &str = "LimitTranslation";

/// Derive a bone tag from a bone name.
///
/// Shifted-accumulate hash over the uppercased name, folded into
/// `[0x170, 0x170 + 0xFE8F)`.
#[must_use]
pub fn bone_tag(name: &str) -> u32 {
    let mut hash: u32 = 0;
    for ch in name.chars().flat_map(char::to_uppercase) {
        hash = (hash << 4).wrapping_add(u32::from(ch));
        let high = hash & 0xF000_0000;
        if high != 0 {
            hash ^= high >> 24;
        }
        hash &= !high;
    }
    (hash % 0xFE8F) + 0x170
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bone {
    pub name: String,
    pub tag: u32,
    pub index: i16,
    /// `-1` for the root.
    pub parent_index: i16,
    /// Next bone with the same parent, `-1` for the last one.
    pub sibling_index: i16,
    pub flags: Flags,
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    pub transform_unk: Vec4,
}

impl Default for Bone {
    fn default() -> Self {
        Self {
            name: String::new(),
            tag: 0,
            index: 0,
            parent_index: -1,
            sibling_index: -1,
            flags: Flags::new(),
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            transform_unk: Vec4::ZERO,
        }
    }
}

impl Record for Bone {
    const FIELDS: &'static [Field<Self>] = cwxml::schema!(Bone {
        Text "Name" => name,
        Value "Tag" => tag,
        Value "Index" => index,
        Value "ParentIndex" => parent_index,
        Value "SiblingIndex" => sibling_index,
        FlagSet "Flags" => flags,
        Vector "Translation" => translation,
        Vector "Rotation" => rotation,
        Vector "Scale" => scale,
        Vector "TransformUnk" => transform_unk,
    });
}

impl Bone {
    #[must_use]
    pub fn new(name: impl Into<String>, parent_index: i16) -> Self {
        Self {
            name: name.into(),
            parent_index,
            ..Self::default()
        }
    }
}

/// The three derived skeleton checksums.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkeletonChecksums {
    pub unknown_50: u32,
    pub unknown_54: u32,
    pub unknown_58: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Skeleton {
    pub unknown_1c: u32,
    pub unknown_50: u32,
    pub unknown_54: u32,
    pub unknown_58: u32,
    pub bones: Vec<Bone>,
}

impl Record for Skeleton {
    const FIELDS: &'static [Field<Self>] = cwxml::schema!(Skeleton {
        Value "Unknown1C" => unknown_1c,
        Value "Unknown50" => unknown_50,
        Value "Unknown54" => unknown_54,
        Value "Unknown58" => unknown_58,
        Items "Bones" => bones,
    });
}

impl Skeleton {
    /// Set each bone's index to its position and derive sibling links from
    /// the parent indices.
    pub fn link(&mut self) {
        let parents: Vec<i16> = self.bones.iter().map(|b| b.parent_index).collect();
        for (i, bone) in self.bones.iter_mut().enumerate() {
            bone.index = i as i16;
            bone.sibling_index = parents
                .iter()
                .enumerate()
                .skip(i + 1)
                .find(|&(_, &p)| p == parents[i])
                .map_or(-1, |(j, _)| j as i16);
        }
    }

    /// Derive every bone's tag from its name. The root gets [`ROOT_TAG`];
    /// unnamed bones hash a positional placeholder.
    pub fn assign_tags(&mut self) {
        for (i, bone) in self.bones.iter_mut().enumerate() {
            bone.tag = if i == 0 {
                ROOT_TAG
            } else if bone.name.is_empty() {
                (joaat(&format!("bone_{i}")) % 0xFE8F) + 0x170
            } else {
                bone_tag(&bone.name)
            };
        }
    }

    /// Check the structural invariants: positional indices, parents before
    /// children, forward sibling links within one parent and unique tags.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] naming the first offending bone.
    pub fn validate(&self) -> Result<()> {
        let bones_path = ElementPath::root("Skeleton").child("Bones");
        for (i, bone) in self.bones.iter().enumerate() {
            let path = bones_path.item(cwxml::ITEM_TAG, i);
            if usize::try_from(bone.index).ok() != Some(i) {
                return Err(Error::validation(
                    &path,
                    format!("bone index {} at position {i}", bone.index),
                ));
            }
            let parent = i32::from(bone.parent_index);
            if parent < -1 || parent >= i as i32 {
                return Err(Error::validation(
                    &path,
                    format!("parent {parent} does not precede bone {i}"),
                ));
            }
            if bone.sibling_index >= 0 {
                let sibling = bone.sibling_index as usize;
                let valid = sibling > i
                    && self
                        .bones
                        .get(sibling)
                        .is_some_and(|s| s.parent_index == bone.parent_index);
                if !valid {
                    return Err(Error::validation(
                        &path,
                        format!("sibling {sibling} is not a later bone with the same parent"),
                    ));
                }
            }
            if let Some(j) = self.bones[..i].iter().position(|b| b.tag == bone.tag) {
                return Err(Error::validation(
                    &path,
                    format!("tag {} already used by bone {j}", bone.tag),
                ));
            }
        }
        Ok(())
    }

    /// Compute the three checksums the native loader consults.
    #[must_use]
    pub fn checksums(&self) -> SkeletonChecksums {
        let mut plain = Vec::with_capacity(self.bones.len());
        let mut augmented = Vec::with_capacity(self.bones.len());
        for bone in &self.bones {
            let flags: Vec<&str> = bone.flags.iter().collect();
            let entry = format!("{} {}", bone.tag, flags.join(" "));
            let pose: Vec<String> = bone
                .translation
                .to_array()
                .into_iter()
                .chain(bone.rotation.to_array())
                .chain(bone.scale.to_array())
                .map(format_f32)
                .collect();
            augmented.push(format!("{entry} {}", pose.join(" ")));
            plain.push(entry);
        }
        let plain = plain.join(" ");
        let augmented = augmented.join(" ");
        SkeletonChecksums {
            unknown_50: joaat(&plain),
            unknown_54: crc32fast::hash(plain.as_bytes()),
            unknown_58: crc32fast::hash(augmented.as_bytes()),
        }
    }

    /// Store freshly computed checksums.
    pub fn apply_checksums(&mut self) {
        let sums = self.checksums();
        self.unknown_50 = sums.unknown_50;
        self.unknown_54 = sums.unknown_54;
        self.unknown_58 = sums.unknown_58;
    }

    #[must_use]
    pub fn bone_by_tag(&self, tag: u32) -> Option<&Bone> {
        self.bones.iter().find(|b| b.tag == tag)
    }

    #[must_use]
    pub fn bone_by_name(&self, name: &str) -> Option<&Bone> {
        self.bones.iter().find(|b| b.name.eq_ignore_ascii_case(name))
    }
}

/// Rotation or translation limit of one bone, keyed by bone tag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JointLimit {
    pub bone_id: u32,
    pub unknown_a: u32,
    pub min: Vec3,
    pub max: Vec3,
}

impl Record for JointLimit {
    const FIELDS: &'static [Field<Self>] = cwxml::schema!(JointLimit {
        Value "BoneId" => bone_id,
        Value "UnknownA" => unknown_a,
        Vector "Min" => min,
        Vector "Max" => max,
    });
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Joints {
    pub rotation_limits: Vec<JointLimit>,
    pub translation_limits: Vec<JointLimit>,
}

impl Record for Joints {
    const FIELDS: &'static [Field<Self>] = cwxml::schema!(Joints {
        Items "RotationLimits" => rotation_limits,
        Items "TranslationLimits" => translation_limits,
    });
}

impl Joints {
    /// Make the limit flags of every bone reflect the limit tables.
    pub fn apply_limit_flags(&self, skeleton: &mut Skeleton) {
        for bone in &mut skeleton.bones {
            for (limits, token) in [
                (&self.rotation_limits, LIMIT_ROTATION),
                (&self.translation_limits, LIMIT_TRANSLATION),
            ] {
                if limits.iter().any(|l| l.bone_id == bone.tag) {
                    bone.flags.insert(token);
                } else {
                    bone.flags.remove(token);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use cwxml::XmlElement;

    use super::*;

    fn skeleton() -> Skeleton {
        let mut skeleton = Skeleton {
            bones: vec![
                Bone::new("SKEL_ROOT", -1),
                Bone::new("SKEL_Pelvis", 0),
                Bone::new("SKEL_L_Thigh", 1),
                Bone::new("SKEL_R_Thigh", 1),
                Bone::new("SKEL_SPINE0", 1),
            ],
            ..Skeleton::default()
        };
        skeleton.link();
        skeleton.assign_tags();
        skeleton
    }

    #[test]
    fn test_bone_tag() {
        assert_eq!(bone_tag("SKEL_SPINE0"), 14410);
        assert_eq!(bone_tag("skel_spine0"), bone_tag("SKEL_SPINE0"));
        let tag = bone_tag("SKEL_SPINE0");
        assert!((0x170..0x170 + 0xFE8F).contains(&tag));
    }

    #[test]
    fn test_root_tag_is_zero() {
        let skeleton = skeleton();
        assert_eq!(skeleton.bones[0].tag, ROOT_TAG);
        assert_eq!(skeleton.bones[4].tag, 14410);
        assert_eq!(skeleton.bone_by_tag(14410).unwrap().name, "SKEL_SPINE0");
    }

    #[test]
    fn test_link_siblings() {
        let skeleton = skeleton();
        let siblings: Vec<i16> = skeleton.bones.iter().map(|b| b.sibling_index).collect();
        assert_eq!(siblings, [-1, -1, 3, 4, -1]);
        assert!(skeleton.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_forward_parent() {
        let mut skeleton = skeleton();
        skeleton.bones[1].parent_index = 3;
        assert!(matches!(skeleton.validate(), Err(Error::Validation { .. })));
    }

    #[test]
    fn test_validate_rejects_duplicate_tags() {
        let mut skeleton = skeleton();
        skeleton.bones[3].tag = skeleton.bones[2].tag;
        match skeleton.validate() {
            Err(Error::Validation { element, .. }) => {
                assert_eq!(element.as_str(), "Skeleton/Bones/Item[3]");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_checksums_stable() {
        let mut skeleton = skeleton();
        skeleton.bones[2].flags.insert("RotX");
        let first = skeleton.checksums();
        assert_eq!(skeleton.checksums(), first);

        let element = skeleton.to_element("Skeleton").unwrap();
        let again = Skeleton::from_element(&element, &ElementPath::root("Skeleton")).unwrap();
        assert_eq!(again.checksums(), first);

        skeleton.bones[2].translation.x = 0.5;
        let moved = skeleton.checksums();
        assert_eq!(moved.unknown_50, first.unknown_50);
        assert_eq!(moved.unknown_54, first.unknown_54);
        assert_ne!(moved.unknown_58, first.unknown_58);
    }

    #[test]
    fn test_limit_flags() {
        let mut skeleton = skeleton();
        skeleton.bones[1].flags.insert(LIMIT_TRANSLATION);
        let joints = Joints {
            rotation_limits: vec![JointLimit {
                bone_id: skeleton.bones[2].tag,
                min: Vec3::splat(-1.0),
                max: Vec3::splat(1.0),
                ..JointLimit::default()
            }],
            translation_limits: Vec::new(),
        };
        joints.apply_limit_flags(&mut skeleton);
        assert!(skeleton.bones[2].flags.contains(LIMIT_ROTATION));
        assert!(!skeleton.bones[1].flags.contains(LIMIT_TRANSLATION));
        assert!(!skeleton.bones[3].flags.contains(LIMIT_ROTATION));
    }

    #[test]
    fn test_bone_defaults_when_missing() {
        let root = cwxml::parse_document(b"<Item><Name>b</Name></Item>").unwrap();
        let bone = Bone::from_element(&root, &ElementPath::root("Item")).unwrap();
        assert_eq!(bone.scale, Vec3::ONE);
        assert_eq!(bone.parent_index, -1);
        assert_eq!(bone.rotation, Quat::IDENTITY);
    }
}
