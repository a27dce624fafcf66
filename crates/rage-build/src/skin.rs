//! Skin weight quantisation.

/// Largest number of bones influencing one vertex.
pub const MAX_INFLUENCES: usize = 4;

/// Slot order used when writing the four influences, lightest first.
const SLOT_ORDER: [usize; MAX_INFLUENCES] = [3, 0, 1, 2];

/// Quantised influences of one vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkinWeights {
    /// Normalised weights before quantisation, in slot order.
    pub normalised: [f32; MAX_INFLUENCES],
    /// 8-bit weights summing to exactly 255, in slot order.
    pub weights: [u8; MAX_INFLUENCES],
    /// Bone indices, in slot order. Empty slots hold bone 0.
    pub bones: [u16; MAX_INFLUENCES],
}

impl SkinWeights {
    /// Full weight on a single bone.
    #[must_use]
    pub fn rigid(bone: u16) -> Self {
        Self::quantise(&[(bone, 1.0)]).unwrap_or(Self {
            normalised: [0.0, 0.0, 1.0, 0.0],
            weights: [0, 0, 255, 0],
            bones: [0, 0, bone, 0],
        })
    }

    /// Quantise bone-weight pairs.
    ///
    /// Keeps the four heaviest influences, renormalises them to sum to one,
    /// rounds to 8 bits, adjusts the heaviest so the bytes sum to 255, then
    /// places them lightest first starting at slot 3 and wrapping.
    ///
    /// Returns `None` when no influence has positive weight.
    #[must_use]
    pub fn quantise(influences: &[(u16, f32)]) -> Option<Self> {
        let mut kept: Vec<(u16, f32)> = influences
            .iter()
            .copied()
            .filter(|&(_, w)| w > 0.0 && w.is_finite())
            .collect();
        kept.sort_by(|a, b| b.1.total_cmp(&a.1));
        kept.truncate(MAX_INFLUENCES);

        let total: f32 = kept.iter().map(|&(_, w)| w).sum();
        if kept.is_empty() || total <= 0.0 {
            return None;
        }

        let mut normalised = [0.0f32; MAX_INFLUENCES];
        let mut bytes = [0i32; MAX_INFLUENCES];
        let mut bones = [0u16; MAX_INFLUENCES];
        for (i, &(bone, weight)) in kept.iter().enumerate() {
            normalised[i] = weight / total;
            bytes[i] = (normalised[i] * 255.0).round() as i32;
            bones[i] = bone;
        }
        // kept is sorted heaviest first, so slot 0 takes the rounding error.
        bytes[0] += 255 - bytes.iter().sum::<i32>();

        let mut order: Vec<usize> = (0..MAX_INFLUENCES).collect();
        order.sort_by(|&a, &b| normalised[a].total_cmp(&normalised[b]));

        let mut out = Self {
            normalised: [0.0; MAX_INFLUENCES],
            weights: [0; MAX_INFLUENCES],
            bones: [0; MAX_INFLUENCES],
        };
        for (source, slot) in order.into_iter().zip(SLOT_ORDER) {
            out.normalised[slot] = normalised[source];
            out.weights[slot] = bytes[source].clamp(0, 255) as u8;
            out.bones[slot] = bones[source];
        }
        Some(out)
    }

    #[must_use]
    pub fn byte_sum(&self) -> u32 {
        self.weights.iter().map(|&w| u32::from(w)).sum()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_single_influence() {
        let skin = SkinWeights::quantise(&[(7, 0.3)]).unwrap();
        // The heaviest influence lands in slot 2.
        assert_eq!(skin.weights, [0, 0, 255, 0]);
        assert_eq!(skin.bones, [0, 0, 7, 0]);
        assert_eq!(skin.normalised[2], 1.0);
    }

    #[test]
    fn test_slot_order_lightest_first() {
        let skin = SkinWeights::quantise(&[(1, 0.1), (2, 0.4), (3, 0.2), (4, 0.3)]).unwrap();
        // Ascending weight fills slots 3, 0, 1, 2.
        assert_eq!(skin.bones, [3, 4, 2, 1]);
        assert_eq!(skin.byte_sum(), 255);
    }

    #[test]
    fn test_keeps_four_heaviest() {
        let skin =
            SkinWeights::quantise(&[(1, 0.05), (2, 0.3), (3, 0.3), (4, 0.2), (5, 0.15)]).unwrap();
        assert!(!skin.bones.contains(&1));
        let total: f32 = skin.normalised.iter().sum();
        assert!((total - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_no_weight_is_none() {
        assert!(SkinWeights::quantise(&[]).is_none());
        assert!(SkinWeights::quantise(&[(1, 0.0)]).is_none());
    }

    #[test]
    fn test_rigid() {
        assert_eq!(SkinWeights::rigid(0).weights, [0, 0, 255, 0]);
        assert_eq!(SkinWeights::rigid(9).bones, [0, 0, 9, 0]);
    }

    proptest! {
        #[test]
        fn test_weights_always_normalised(
            influences in prop::collection::vec((0u16..200, 0.001f32..1.0), 1..8)
        ) {
            let skin = SkinWeights::quantise(&influences).unwrap();
            prop_assert_eq!(skin.byte_sum(), 255);
            let total: f32 = skin.normalised.iter().sum();
            prop_assert!((total - 1.0).abs() <= 1e-6);
        }
    }
}
