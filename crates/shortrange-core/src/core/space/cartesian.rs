use super::min_pair_distance;
use crate::core::geometry::{AABox, CoordinateGroup};
use nalgebra::Vector3;

/// Open, infinite Cartesian space with Euclidean distances.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cartesian;

impl Cartesian {
    #[inline]
    pub fn beyond(&self, cutoff: f64, box0: &AABox, box1: &AABox) -> bool {
        box0.beyond(cutoff, box1)
    }

    pub fn minimum_distance(&self, group0: &CoordinateGroup, group1: &CoordinateGroup) -> f64 {
        min_pair_distance(group0.points(), &Vector3::zeros(), group1.points())
    }

    /// There is only one image in open space: the group itself, if close enough.
    pub fn copies_within(
        &self,
        group: &CoordinateGroup,
        center: &CoordinateGroup,
        cutoff: f64,
    ) -> Vec<(f64, CoordinateGroup)> {
        if self.beyond(cutoff, group.aabox(), center.aabox()) {
            return Vec::new();
        }
        let dist = self.minimum_distance(group, center);
        if dist <= cutoff {
            vec![(dist, group.clone())]
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    #[test]
    fn copies_within_returns_group_when_close() {
        let a = CoordinateGroup::new(vec![Point3::new(0.0, 0.0, 0.0)]);
        let b = CoordinateGroup::new(vec![Point3::new(3.0, 4.0, 0.0)]);

        let copies = Cartesian.copies_within(&a, &b, 6.0);
        assert_eq!(copies.len(), 1);
        assert!((copies[0].0 - 5.0).abs() < 1e-12);
        assert!(copies[0].1.shares_storage_with(&a));

        assert!(Cartesian.copies_within(&a, &b, 4.0).is_empty());
    }
}
