use super::{SpaceError, min_pair_distance};
use crate::core::geometry::{AABox, CoordinateGroup};
use nalgebra::{Point3, Vector3};

/// An orthorhombic periodic box spanning `min..max`.
///
/// Distances follow the minimum image convention. Groups are wrapped as a
/// whole (one shift per group pair, computed from the box centers), which is
/// valid as long as no group spans more than half a box length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeriodicBox {
    min: Point3<f64>,
    max: Point3<f64>,
    length: Vector3<f64>,
    half_length: Vector3<f64>,
    inv_length: Vector3<f64>,
}

/// Number of whole box lengths to add to a displacement so that it lands in
/// `[-L/2, L/2]`. Ties go to the even multiple, which keeps a displacement of
/// exactly `±L/2` where it is.
#[inline]
fn wrap_count(delta: f64, inv_length: f64) -> f64 {
    (delta * inv_length).round_ties_even()
}

impl PeriodicBox {
    pub fn new(min: Point3<f64>, max: Point3<f64>) -> Result<Self, SpaceError> {
        let length = max - min;
        if !(length.x > 0.0 && length.y > 0.0 && length.z > 0.0) {
            return Err(SpaceError::InvalidBox {
                min: [min.x, min.y, min.z],
                max: [max.x, max.y, max.z],
            });
        }
        Ok(Self {
            min,
            max,
            length,
            half_length: length * 0.5,
            inv_length: length.map(|l| 1.0 / l),
        })
    }

    #[inline]
    pub fn min(&self) -> &Point3<f64> {
        &self.min
    }

    #[inline]
    pub fn max(&self) -> &Point3<f64> {
        &self.max
    }

    #[inline]
    pub fn length(&self) -> &Vector3<f64> {
        &self.length
    }

    #[inline]
    pub fn half_length(&self) -> &Vector3<f64> {
        &self.half_length
    }

    pub fn volume(&self) -> f64 {
        self.length.x * self.length.y * self.length.z
    }

    /// The shift (a whole number of box lengths per axis) that moves `v1` to
    /// within half a box length of `v0`.
    #[inline]
    pub fn wrap_delta(&self, v0: &Point3<f64>, v1: &Point3<f64>) -> Vector3<f64> {
        let d = v0 - v1;
        Vector3::new(
            wrap_count(d.x, self.inv_length.x) * self.length.x,
            wrap_count(d.y, self.inv_length.y) * self.length.y,
            wrap_count(d.z, self.inv_length.z) * self.length.z,
        )
    }

    /// Minimum image of the displacement `p0 - p1`.
    #[inline]
    pub fn minimum_image_delta(&self, p0: &Point3<f64>, p1: &Point3<f64>) -> Vector3<f64> {
        (p0 - p1) - self.wrap_delta(p0, p1)
    }

    /// Bounding-sphere test on the minimum image of the two box centers.
    /// Empty boxes are beyond everything.
    pub fn beyond(&self, cutoff: f64, box0: &AABox, box1: &AABox) -> bool {
        if box0.is_empty() || box1.is_empty() {
            return true;
        }
        let reach = cutoff + box0.radius() + box1.radius();
        self.minimum_image_delta(box0.center(), box1.center())
            .norm_squared()
            > reach * reach
    }

    /// Exact minimum distance between two box volumes over all periodic images.
    pub fn minimum_distance_boxes(&self, box0: &AABox, box1: &AABox) -> f64 {
        let delta = self.minimum_image_delta(box1.center(), box0.center());
        box0.min_distance_for_delta(&delta, box1)
    }

    pub fn move_to_center_box(&self, group: &CoordinateGroup) -> CoordinateGroup {
        let offset = group.center() - self.min;
        let shift = Vector3::new(
            -(offset.x * self.inv_length.x).floor() * self.length.x,
            -(offset.y * self.inv_length.y).floor() * self.length.y,
            -(offset.z * self.inv_length.z).floor() * self.length.z,
        );
        group.translated(&shift)
    }

    /// Enumerates every periodic replica of `group` with some point within
    /// `cutoff` of `center`.
    ///
    /// The search starts from the minimum image and walks all integer box
    /// offsets up to `ceil((r_group + r_center + cutoff) / L)` on each axis, so
    /// several replicas are returned when the cutoff sphere is larger than the
    /// box.
    pub fn copies_within(
        &self,
        group: &CoordinateGroup,
        center: &CoordinateGroup,
        cutoff: f64,
    ) -> Vec<(f64, CoordinateGroup)> {
        if group.is_empty() || center.is_empty() || cutoff < 0.0 {
            return Vec::new();
        }

        let image = group.translated(&self.wrap_delta(center.center(), group.center()));
        let reach = image.aabox().radius() + center.aabox().radius() + cutoff;
        let layers = (reach * self.inv_length).map(|n| n.ceil() as i64);

        let mut copies = Vec::new();
        for i in -layers.x..=layers.x {
            for j in -layers.y..=layers.y {
                for k in -layers.z..=layers.z {
                    let offset = Vector3::new(
                        i as f64 * self.length.x,
                        j as f64 * self.length.y,
                        k as f64 * self.length.z,
                    );
                    if image.aabox().translated(&offset).beyond(cutoff, center.aabox()) {
                        continue;
                    }
                    let dist = min_pair_distance(image.points(), &offset, center.points());
                    if dist <= cutoff {
                        copies.push((dist, image.translated(&offset)));
                    }
                }
            }
        }

        copies.sort_by(|a, b| a.0.total_cmp(&b.0));
        copies
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn cube(length: f64) -> PeriodicBox {
        PeriodicBox::new(Point3::origin(), Point3::new(length, length, length)).unwrap()
    }

    fn group(points: &[[f64; 3]]) -> CoordinateGroup {
        CoordinateGroup::new(points.iter().map(|p| Point3::new(p[0], p[1], p[2])).collect())
    }

    #[test]
    fn new_rejects_non_positive_lengths() {
        let result = PeriodicBox::new(Point3::origin(), Point3::new(10.0, 0.0, 10.0));
        assert!(matches!(result, Err(SpaceError::InvalidBox { .. })));
        let result = PeriodicBox::new(Point3::new(5.0, 5.0, 5.0), Point3::origin());
        assert!(result.is_err());
    }

    #[test]
    fn wrap_delta_never_increases_distance_and_lands_in_half_box() {
        let pbox = PeriodicBox::new(Point3::new(-3.0, 0.0, 2.0), Point3::new(7.0, 8.0, 17.0)).unwrap();
        let samples = [
            [0.0, 0.0, 0.0],
            [9.9, -4.1, 33.0],
            [-12.5, 7.9, 2.0],
            [5.0, 16.2, -14.9],
            [1.25, 3.99, 7.49],
        ];
        for a in &samples {
            for b in &samples {
                let v0 = Point3::new(a[0], a[1], a[2]);
                let v1 = Point3::new(b[0], b[1], b[2]);
                let shifted = v1 + pbox.wrap_delta(&v0, &v1);
                let d = v0 - shifted;

                assert!(d.norm() <= (v0 - v1).norm() + 1e-9);
                for axis in 0..3 {
                    assert!(d[axis].abs() <= pbox.half_length()[axis] + 1e-9);
                }
            }
        }
    }

    #[test]
    fn minimum_image_is_idempotent() {
        let space = crate::core::space::Space::Periodic(cube(10.0));
        let g = group(&[[23.0, -4.0, 15.5], [24.0, -3.0, 15.0]]);
        let reference = Point3::new(1.0, 2.0, 3.0);

        let once = space.minimum_image(&g, &reference);
        let twice = space.minimum_image(&once, &reference);

        assert_eq!(once, twice);
        assert!(twice.shares_storage_with(&once));
        let d = once.center() - reference;
        assert!(d.x.abs() <= 5.0 && d.y.abs() <= 5.0 && d.z.abs() <= 5.0);
    }

    #[test]
    fn move_to_center_box_puts_center_inside_primary_box() {
        let pbox = cube(10.0);
        let g = group(&[[-13.0, 25.0, 4.0], [-12.0, 26.0, 5.0]]);
        let moved = pbox.move_to_center_box(&g);
        let c = moved.center();
        for axis in 0..3 {
            assert!(c[axis] >= 0.0 && c[axis] < 10.0);
        }
        assert!((moved.points()[1] - moved.points()[0] - (g.points()[1] - g.points()[0])).norm() < 1e-12);
    }

    #[test]
    fn minimum_distance_boxes_wraps_across_boundary() {
        let pbox = cube(10.0);
        let a = AABox::from_center_and_half_extents(Point3::new(0.5, 5.0, 5.0), Vector3::repeat(0.5));
        let b = AABox::from_center_and_half_extents(Point3::new(9.0, 5.0, 5.0), Vector3::repeat(0.5));
        assert!((pbox.minimum_distance_boxes(&a, &b) - 0.5).abs() < 1e-12);
    }

    /// A coordinate on `0..length`, biased towards the faces and sometimes
    /// just outside the primary box.
    fn face_biased(rng: &mut StdRng, length: f64) -> f64 {
        match rng.gen_range(0..4) {
            0 => rng.gen_range(0.0..2.0),
            1 => length - rng.gen_range(0.0..2.0),
            2 => length + rng.gen_range(0.0..2.0),
            _ => rng.gen_range(0.0..length),
        }
    }

    fn random_box(rng: &mut StdRng) -> AABox {
        let center = Point3::new(
            face_biased(rng, 20.0),
            face_biased(rng, 25.0),
            face_biased(rng, 30.0),
        );
        let half = Vector3::new(
            rng.gen_range(0.0..3.0),
            rng.gen_range(0.0..3.0),
            rng.gen_range(0.0..3.0),
        );
        AABox::from_center_and_half_extents(center, half)
    }

    #[test]
    fn beyond_implies_minimum_box_distance_exceeds_cutoff() {
        let pbox = PeriodicBox::new(Point3::origin(), Point3::new(20.0, 25.0, 30.0)).unwrap();
        let mut rng = StdRng::seed_from_u64(99);
        let mut pruned = 0;

        for _ in 0..5000 {
            let b0 = random_box(&mut rng);
            let b1 = random_box(&mut rng);
            let cutoff = rng.gen_range(0.0..12.0);

            let exact = pbox.minimum_distance_boxes(&b0, &b1);
            let mut over_images = f64::INFINITY;
            for i in -1..=1 {
                for j in -1..=1 {
                    for k in -1..=1 {
                        let offset = Vector3::new(i as f64 * 20.0, j as f64 * 25.0, k as f64 * 30.0);
                        over_images = over_images.min(b0.min_distance(&b1.translated(&offset)));
                    }
                }
            }
            assert!((exact - over_images).abs() < 1e-9, "{exact} vs {over_images}");

            if pbox.beyond(cutoff, &b0, &b1) {
                pruned += 1;
                assert!(exact > cutoff, "pruned boxes {exact} apart at cutoff {cutoff}");
            }
        }
        assert!(pruned > 0);
    }

    #[test]
    fn empty_boxes_are_beyond_in_a_periodic_box() {
        let pbox = cube(10.0);
        let a = AABox::from_center_and_half_extents(Point3::new(1.0, 1.0, 1.0), Vector3::repeat(0.5));
        assert!(pbox.beyond(50.0, &a, &AABox::empty()));
        assert!(pbox.beyond(50.0, &AABox::empty(), &a));
    }

    #[test]
    fn copies_within_finds_single_image_in_large_box() {
        let pbox = cube(20.0);
        let g = group(&[[19.0, 0.0, 0.0]]);
        let center = group(&[[1.0, 0.0, 0.0]]);

        let copies = pbox.copies_within(&g, &center, 5.0);
        assert_eq!(copies.len(), 1);
        assert!((copies[0].0 - 2.0).abs() < 1e-12);
        assert!((copies[0].1.points()[0].x - (-1.0)).abs() < 1e-12);
    }

    #[test]
    fn copies_within_finds_several_images_when_cutoff_exceeds_box() {
        let pbox = cube(4.0);
        let g = group(&[[0.0, 0.0, 0.0]]);
        let center = group(&[[0.0, 0.0, 0.0]]);

        let copies = pbox.copies_within(&g, &center, 4.5);
        // the origin itself plus the six face neighbours at distance 4
        assert_eq!(copies.len(), 7);
        assert_eq!(copies[0].0, 0.0);
        assert!(copies[1..].iter().all(|(d, _)| (d - 4.0).abs() < 1e-12));
    }
}
