//! # Space Module
//!
//! Distance metrics over which groups of points interact.
//!
//! A [`Space`] is either an open [`Cartesian`] space or an orthorhombic
//! [`PeriodicBox`] with minimum-image distances. Both variants share one
//! contract: fill a caller-owned pairwise matrix between two groups and return
//! the minimum distance, answer cheap bounding-box cutoff queries, and map
//! groups onto their nearest periodic image.

mod cartesian;
mod matrix;
mod periodic;

pub use cartesian::Cartesian;
pub use matrix::{DeltaMatrix, DistMatrix, PairMatrix};
pub use periodic::PeriodicBox;

use crate::core::geometry::{AABox, CoordinateGroup};
use nalgebra::{Point3, Vector3};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SpaceError {
    #[error("Periodic box must have max > min on every axis (min = {min:?}, max = {max:?})")]
    InvalidBox { min: [f64; 3], max: [f64; 3] },
}

/// Which quantity a distance matrix is filled with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistanceKind {
    #[default]
    Distance,
    DistanceSquared,
    InverseDistance,
    InverseDistanceSquared,
}

impl DistanceKind {
    #[inline]
    fn apply(self, dist2: f64) -> f64 {
        match self {
            DistanceKind::Distance => dist2.sqrt(),
            DistanceKind::DistanceSquared => dist2,
            DistanceKind::InverseDistance => 1.0 / dist2.sqrt(),
            DistanceKind::InverseDistanceSquared => 1.0 / dist2,
        }
    }
}

/// A distance metric: open Cartesian space or a periodic box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Space {
    Cartesian(Cartesian),
    Periodic(PeriodicBox),
}

impl Default for Space {
    fn default() -> Self {
        Space::Cartesian(Cartesian)
    }
}

impl From<Cartesian> for Space {
    fn from(space: Cartesian) -> Self {
        Space::Cartesian(space)
    }
}

impl From<PeriodicBox> for Space {
    fn from(space: PeriodicBox) -> Self {
        Space::Periodic(space)
    }
}

impl Space {
    pub fn cartesian() -> Self {
        Space::Cartesian(Cartesian)
    }

    pub fn periodic(min: Point3<f64>, max: Point3<f64>) -> Result<Self, SpaceError> {
        PeriodicBox::new(min, max).map(Space::Periodic)
    }

    /// A cubic periodic box with one corner at the origin.
    pub fn cubic_box(length: f64) -> Result<Self, SpaceError> {
        Self::periodic(Point3::origin(), Point3::new(length, length, length))
    }

    #[inline]
    pub fn is_periodic(&self) -> bool {
        matches!(self, Space::Periodic(_))
    }

    /// Edge lengths of the periodic box, or `None` for open space.
    pub fn box_length(&self) -> Option<Vector3<f64>> {
        match self {
            Space::Cartesian(_) => None,
            Space::Periodic(pbox) => Some(*pbox.length()),
        }
    }

    /// The shift to add to `v1` so that it lies within half a box length of
    /// `v0` on every axis. Always zero in open space.
    #[inline]
    pub fn wrap_delta(&self, v0: &Point3<f64>, v1: &Point3<f64>) -> Vector3<f64> {
        match self {
            Space::Cartesian(_) => Vector3::zeros(),
            Space::Periodic(pbox) => pbox.wrap_delta(v0, v1),
        }
    }

    /// Fills `matrix` with the pairwise `kind` values between every point of
    /// `group0` (rows) and `group1` (columns).
    ///
    /// # Arguments
    ///
    /// * `group0` - Row group.
    /// * `group1` - Column group.
    /// * `kind` - Quantity stored in each cell.
    /// * `matrix` - Reused workspace, reshaped to `group0.len() x group1.len()`.
    ///
    /// # Return
    ///
    /// The minimum pairwise distance, or `f64::INFINITY` if either group is
    /// empty.
    pub fn distance_matrix(
        &self,
        group0: &CoordinateGroup,
        group1: &CoordinateGroup,
        kind: DistanceKind,
        matrix: &mut DistMatrix,
    ) -> f64 {
        let shift = self.group_shift(group0, group1);
        fill_distance_matrix(group0.points(), &shift, group1.points(), kind, matrix)
    }

    /// Fills `matrix` with the displacement `p0_i - p1_j` for every pair,
    /// applying the same single group-level wrap as [`Space::distance_matrix`].
    ///
    /// # Return
    ///
    /// The minimum pairwise distance, or `f64::INFINITY` if either group is
    /// empty.
    pub fn delta_matrix(
        &self,
        group0: &CoordinateGroup,
        group1: &CoordinateGroup,
        matrix: &mut DeltaMatrix,
    ) -> f64 {
        let shift = self.group_shift(group0, group1);
        matrix.reset(group0.len(), group1.len());
        let mut min2 = f64::INFINITY;
        for p0 in group0.points() {
            let p0 = p0 + shift;
            for p1 in group1.points() {
                let delta = p0 - p1;
                min2 = min2.min(delta.norm_squared());
                matrix.push(delta);
            }
        }
        min2.sqrt()
    }

    /// Displacement between the centers of two groups, using the minimum image
    /// in a periodic box.
    pub fn group_separation(&self, group0: &CoordinateGroup, group1: &CoordinateGroup) -> Vector3<f64> {
        let shift = self.group_shift(group0, group1);
        (group0.center() + shift) - group1.center()
    }

    /// Distance between two individual points (minimum image if periodic).
    #[inline]
    pub fn point_distance(&self, p0: &Point3<f64>, p1: &Point3<f64>) -> f64 {
        match self {
            Space::Cartesian(_) => (p0 - p1).norm(),
            Space::Periodic(pbox) => pbox.minimum_image_delta(p0, p1).norm(),
        }
    }

    /// Conservative bounding-sphere cutoff test between two boxes.
    ///
    /// `true` guarantees that nothing in `box0` is within `cutoff` of anything
    /// in `box1` (under the minimum image if periodic).
    #[inline]
    pub fn beyond(&self, cutoff: f64, box0: &AABox, box1: &AABox) -> bool {
        match self {
            Space::Cartesian(space) => space.beyond(cutoff, box0, box1),
            Space::Periodic(pbox) => pbox.beyond(cutoff, box0, box1),
        }
    }

    #[inline]
    pub fn beyond_groups(&self, cutoff: f64, group0: &CoordinateGroup, group1: &CoordinateGroup) -> bool {
        self.beyond(cutoff, group0.aabox(), group1.aabox())
    }

    /// Minimum distance between any point of `group0` and any point of `group1`.
    pub fn minimum_distance(&self, group0: &CoordinateGroup, group1: &CoordinateGroup) -> f64 {
        let shift = self.group_shift(group0, group1);
        min_pair_distance(group0.points(), &shift, group1.points())
    }

    /// Minimum distance between the volumes of two boxes.
    pub fn minimum_distance_boxes(&self, box0: &AABox, box1: &AABox) -> f64 {
        match self {
            Space::Cartesian(_) => box0.min_distance(box1),
            Space::Periodic(pbox) => pbox.minimum_distance_boxes(box0, box1),
        }
    }

    /// Returns the periodic image of `group` whose center is closest to `point`.
    ///
    /// In open space, or when the group is already the closest image, the
    /// returned group shares storage with `group`.
    pub fn minimum_image(&self, group: &CoordinateGroup, point: &Point3<f64>) -> CoordinateGroup {
        group.translated(&self.wrap_delta(point, group.center()))
    }

    /// Returns the image of `group` whose center lies inside the primary box.
    pub fn move_to_center_box(&self, group: &CoordinateGroup) -> CoordinateGroup {
        match self {
            Space::Cartesian(_) => group.clone(),
            Space::Periodic(pbox) => pbox.move_to_center_box(group),
        }
    }

    /// Every image of `group` that has some point within `cutoff` of
    /// `center`, paired with its minimum distance and sorted by it.
    pub fn copies_within(
        &self,
        group: &CoordinateGroup,
        center: &CoordinateGroup,
        cutoff: f64,
    ) -> Vec<(f64, CoordinateGroup)> {
        match self {
            Space::Cartesian(space) => space.copies_within(group, center, cutoff),
            Space::Periodic(pbox) => pbox.copies_within(group, center, cutoff),
        }
    }

    /// Shift applied to every point of `group0` before Cartesian math.
    #[inline]
    fn group_shift(&self, group0: &CoordinateGroup, group1: &CoordinateGroup) -> Vector3<f64> {
        self.wrap_delta(group1.center(), group0.center())
    }
}

pub(crate) fn fill_distance_matrix(
    points0: &[Point3<f64>],
    shift: &Vector3<f64>,
    points1: &[Point3<f64>],
    kind: DistanceKind,
    matrix: &mut DistMatrix,
) -> f64 {
    matrix.reset(points0.len(), points1.len());
    let mut min2 = f64::INFINITY;
    for p0 in points0 {
        let p0 = p0 + shift;
        for p1 in points1 {
            let dist2 = (p0 - p1).norm_squared();
            min2 = min2.min(dist2);
            matrix.push(kind.apply(dist2));
        }
    }
    min2.sqrt()
}

pub(crate) fn min_pair_distance(
    points0: &[Point3<f64>],
    shift: &Vector3<f64>,
    points1: &[Point3<f64>],
) -> f64 {
    let mut min2 = f64::INFINITY;
    for p0 in points0 {
        let p0 = p0 + shift;
        for p1 in points1 {
            min2 = min2.min((p0 - p1).norm_squared());
        }
    }
    min2.sqrt()
}
