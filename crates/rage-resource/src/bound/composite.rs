//! Composite bounds.

use cwxml::{Field, Record};
use glam::Vec3;

use super::{Bound, BoundBase};

/// A list of child bounds, each placed by its own composite transform.
///
/// `None` children keep their slot so fragment physics can index the list by
/// position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundComposite {
    pub base: BoundBase,
    pub children: Vec<Option<Bound>>,
}

impl Record for BoundComposite {
    const FIELDS: &'static [Field<Self>] = cwxml::schema!(BoundComposite {
        Inline "Base" => base,
        OptItems "Children" => children,
    });
}

impl BoundComposite {
    /// Number of slots, including empty ones.
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Occupied slots with their positions.
    pub fn present_children(&self) -> impl Iterator<Item = (usize, &Bound)> {
        self.children
            .iter()
            .enumerate()
            .filter_map(|(index, child)| child.as_ref().map(|c| (index, c)))
    }

    /// Refresh every child, then fit the box around the placed children.
    pub fn refresh(&mut self) {
        for child in self.children.iter_mut().flatten() {
            child.refresh();
        }
        let corners: Vec<Vec3> = self
            .present_children()
            .flat_map(|(_, child)| child.placed_corners())
            .collect();
        self.base.fit_points(corners);
        self.base.refresh_from_box();
    }
}
