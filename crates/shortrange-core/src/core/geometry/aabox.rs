use nalgebra::{Point3, Vector3};

/// An axis-aligned bounding box described by its center and half-extents.
///
/// The bounding-sphere radius is cached alongside the half-extents and is only
/// ever recomputed together with them, so `radius() == half_extents().norm()`
/// always holds.
///
/// The box of an empty point set is a zero box at the origin that is flagged as
/// empty. It behaves as the identity for [`AABox::union`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AABox {
    center: Point3<f64>,
    half_extents: Vector3<f64>,
    radius: f64,
    empty: bool,
}

impl Default for AABox {
    fn default() -> Self {
        Self::empty()
    }
}

impl AABox {
    /// Returns the empty box (zero box at the origin).
    pub fn empty() -> Self {
        Self {
            center: Point3::origin(),
            half_extents: Vector3::zeros(),
            radius: 0.0,
            empty: true,
        }
    }

    /// Builds a box from its center and half-extents.
    ///
    /// Negative half-extents are folded to their absolute value.
    pub fn from_center_and_half_extents(center: Point3<f64>, half_extents: Vector3<f64>) -> Self {
        let half_extents = half_extents.abs();
        Self {
            center,
            radius: half_extents.norm(),
            half_extents,
            empty: false,
        }
    }

    /// Builds a box spanning the two corners `min` and `max`.
    ///
    /// The half-extents are rounded outwards, so `min_coords() <= min` and
    /// `max_coords() >= max` hold exactly in floating point.
    pub fn from_min_max(min: &Point3<f64>, max: &Point3<f64>) -> Self {
        let center = nalgebra::center(min, max);
        let half_extents = Vector3::new(
            enclosing_half_extent(center.x, min.x, max.x),
            enclosing_half_extent(center.y, min.y, max.y),
            enclosing_half_extent(center.z, min.z, max.z),
        );
        Self::from_center_and_half_extents(center, half_extents)
    }

    /// Computes the tightest box enclosing all `points`.
    ///
    /// # Arguments
    ///
    /// * `points` - The points to enclose.
    ///
    /// # Return
    ///
    /// The enclosing box, or [`AABox::empty`] if `points` is empty.
    pub fn from_points(points: &[Point3<f64>]) -> Self {
        let Some((first, rest)) = points.split_first() else {
            return Self::empty();
        };

        let mut min = *first;
        let mut max = *first;
        for p in rest {
            min = min.inf(p);
            max = max.sup(p);
        }

        Self::from_min_max(&min, &max)
    }

    #[inline]
    pub fn center(&self) -> &Point3<f64> {
        &self.center
    }

    #[inline]
    pub fn half_extents(&self) -> &Vector3<f64> {
        &self.half_extents
    }

    /// Radius of the sphere centred on [`AABox::center`] that encloses the box.
    #[inline]
    pub fn radius(&self) -> f64 {
        self.radius
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.empty
    }

    pub fn min_coords(&self) -> Point3<f64> {
        self.center - self.half_extents
    }

    pub fn max_coords(&self) -> Point3<f64> {
        self.center + self.half_extents
    }

    /// Returns the smallest box enclosing both `self` and `other`.
    pub fn union(&self, other: &AABox) -> AABox {
        if self.empty {
            return *other;
        }
        if other.empty {
            return *self;
        }

        let min = self.min_coords().inf(&other.min_coords());
        let max = self.max_coords().sup(&other.max_coords());
        Self::from_min_max(&min, &max)
    }

    /// Grows the box in place so that it also encloses `point`.
    pub fn add_point(&mut self, point: &Point3<f64>) {
        *self = if self.empty {
            Self::from_center_and_half_extents(*point, Vector3::zeros())
        } else {
            let min = self.min_coords().inf(point);
            let max = self.max_coords().sup(point);
            Self::from_min_max(&min, &max)
        };
    }

    /// Shifts the box by `delta`. Only the center changes.
    pub fn translate(&mut self, delta: &Vector3<f64>) {
        if !self.empty {
            self.center += delta;
        }
    }

    pub fn translated(&self, delta: &Vector3<f64>) -> AABox {
        let mut moved = *self;
        moved.translate(delta);
        moved
    }

    /// Conservative cutoff test on the bounding spheres.
    ///
    /// Returns `true` only if every point of `self` is guaranteed to be further
    /// than `dist` from every point of `other`. A `false` answer means the boxes
    /// *may* be within `dist` and the caller must look closer. An empty box
    /// holds no points, so it is beyond everything.
    #[inline]
    pub fn beyond(&self, dist: f64, other: &AABox) -> bool {
        if self.empty || other.empty {
            return true;
        }
        let reach = dist + self.radius + other.radius;
        (self.center - other.center).norm_squared() > reach * reach
    }

    /// Per-axis separation between the two box surfaces, clamped at zero.
    #[inline]
    fn axis_gaps(delta: &Vector3<f64>, h0: &Vector3<f64>, h1: &Vector3<f64>) -> Vector3<f64> {
        Vector3::new(
            (delta.x.abs() - h0.x - h1.x).max(0.0),
            (delta.y.abs() - h0.y - h1.y).max(0.0),
            (delta.z.abs() - h0.z - h1.z).max(0.0),
        )
    }

    /// Minimum distance between any point of `self` and any point of `other`.
    ///
    /// Overlapping boxes have a minimum distance of zero.
    pub fn min_distance(&self, other: &AABox) -> f64 {
        self.min_distance_for_delta(&(other.center - self.center), other)
    }

    /// Same as [`AABox::min_distance`], but with an explicit center-to-center
    /// displacement. Used by periodic spaces that have already resolved the
    /// minimum image of the centers.
    pub(crate) fn min_distance_for_delta(&self, delta: &Vector3<f64>, other: &AABox) -> f64 {
        Self::axis_gaps(delta, &self.half_extents, &other.half_extents).norm()
    }

    /// Returns `true` if the two boxes overlap (touching counts as overlap).
    pub fn intersects(&self, other: &AABox) -> bool {
        let delta = other.center - self.center;
        let reach = self.half_extents + other.half_extents;
        delta.x.abs() <= reach.x && delta.y.abs() <= reach.y && delta.z.abs() <= reach.z
    }

    /// Returns `true` if some point of `self` is within `dist` of some point
    /// of `other`.
    pub fn within_distance(&self, dist: f64, other: &AABox) -> bool {
        let delta = other.center - self.center;
        Self::axis_gaps(&delta, &self.half_extents, &other.half_extents).norm_squared()
            <= dist * dist
    }

    /// Tests `point` against the corners, the same bounds
    /// [`AABox::from_min_max`] guarantees.
    pub fn contains(&self, point: &Point3<f64>) -> bool {
        if self.empty {
            return false;
        }
        let (min, max) = (self.min_coords(), self.max_coords());
        (0..3).all(|axis| min[axis] <= point[axis] && point[axis] <= max[axis])
    }

    pub fn contains_box(&self, other: &AABox) -> bool {
        if other.empty {
            return true;
        }
        if self.empty {
            return false;
        }
        let (min, max) = (self.min_coords(), self.max_coords());
        let (other_min, other_max) = (other.min_coords(), other.max_coords());
        (0..3).all(|axis| min[axis] <= other_min[axis] && other_max[axis] <= max[axis])
    }
}

/// Half-extent about `center` with `center - half <= min` and
/// `center + half >= max` after rounding.
fn enclosing_half_extent(center: f64, min: f64, max: f64) -> f64 {
    let mut half = (max - center).max(center - min);
    while center - half > min || center + half < max {
        half = half.next_up();
    }
    half
}
