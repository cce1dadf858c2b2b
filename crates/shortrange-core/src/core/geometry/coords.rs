use super::aabox::AABox;
use nalgebra::{Point3, Rotation3, Vector3};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GeometryError {
    #[error("Point index {index} is out of range for a group of {len} points")]
    IndexOutOfRange { index: usize, len: usize },
}

#[derive(Debug, Clone, PartialEq)]
struct GroupData {
    points: Vec<Point3<f64>>,
    aabox: AABox,
}

/// An immutable, cheaply clonable array of points with its enclosing [`AABox`].
///
/// Clones share the same backing storage. Edits go through a
/// [`CoordinateGroupEditor`], which detaches from the shared storage on its
/// first write and recomputes the bounding box once on [`CoordinateGroupEditor::commit`].
/// Readers holding the old group keep seeing the old coordinates.
#[derive(Debug, Clone, Default)]
pub struct CoordinateGroup {
    data: Arc<GroupData>,
}

impl Default for GroupData {
    fn default() -> Self {
        Self {
            points: Vec::new(),
            aabox: AABox::empty(),
        }
    }
}

impl CoordinateGroup {
    /// Creates a group from `points`, computing the bounding box eagerly.
    pub fn new(points: Vec<Point3<f64>>) -> Self {
        let aabox = AABox::from_points(&points);
        Self {
            data: Arc::new(GroupData { points, aabox }),
        }
    }

    pub fn from_slice(points: &[Point3<f64>]) -> Self {
        Self::new(points.to_vec())
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Concatenates `groups` into one group whose box is the union of the
    /// input boxes.
    ///
    /// Zero groups give an empty group. A single group is returned as-is,
    /// still sharing its storage.
    pub fn combine(groups: &[CoordinateGroup]) -> Self {
        match groups {
            [] => Self::empty(),
            [single] => single.clone(),
            _ => {
                let total: usize = groups.iter().map(CoordinateGroup::len).sum();
                let mut points = Vec::with_capacity(total);
                let mut aabox = AABox::empty();
                for group in groups {
                    points.extend_from_slice(group.points());
                    aabox = aabox.union(group.aabox());
                }
                Self {
                    data: Arc::new(GroupData { points, aabox }),
                }
            }
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.points.is_empty()
    }

    #[inline]
    pub fn points(&self) -> &[Point3<f64>] {
        &self.data.points
    }

    #[inline]
    pub fn point(&self, index: usize) -> Option<&Point3<f64>> {
        self.data.points.get(index)
    }

    #[inline]
    pub fn aabox(&self) -> &AABox {
        &self.data.aabox
    }

    #[inline]
    pub fn center(&self) -> &Point3<f64> {
        self.data.aabox.center()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Point3<f64>> {
        self.data.points.iter()
    }

    /// Starts a batch of edits on a copy of this group.
    pub fn edit(&self) -> CoordinateGroupEditor {
        CoordinateGroupEditor {
            data: Arc::clone(&self.data),
            dirty: false,
        }
    }

    /// Returns a copy of the group shifted by `delta`.
    ///
    /// A zero shift returns a handle to the same storage.
    pub fn translated(&self, delta: &Vector3<f64>) -> Self {
        if *delta == Vector3::zeros() {
            return self.clone();
        }
        let mut editor = self.edit();
        editor.translate(delta);
        editor.commit()
    }

    /// Cheap pre-check for equality: `false` guarantees the groups are equal,
    /// `true` means they might differ and a full comparison is needed.
    #[inline]
    pub fn maybe_different(&self, other: &CoordinateGroup) -> bool {
        !Arc::ptr_eq(&self.data, &other.data)
    }

    /// Returns `true` if both handles refer to the same backing storage.
    #[inline]
    pub fn shares_storage_with(&self, other: &CoordinateGroup) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl PartialEq for CoordinateGroup {
    fn eq(&self, other: &Self) -> bool {
        !self.maybe_different(other)
            || (self.data.aabox == other.data.aabox && self.data.points == other.data.points)
    }
}

impl From<Vec<Point3<f64>>> for CoordinateGroup {
    fn from(points: Vec<Point3<f64>>) -> Self {
        Self::new(points)
    }
}

impl<'a> IntoIterator for &'a CoordinateGroup {
    type Item = &'a Point3<f64>;
    type IntoIter = std::slice::Iter<'a, Point3<f64>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Mutable view used to apply a batch of edits to a [`CoordinateGroup`].
///
/// The first write detaches the editor from any storage it still shares with
/// live groups. The bounding box is only recomputed when it is read or when
/// the edits are committed.
#[derive(Debug, Clone)]
pub struct CoordinateGroupEditor {
    data: Arc<GroupData>,
    dirty: bool,
}

impl CoordinateGroupEditor {
    fn points_mut(&mut self) -> &mut Vec<Point3<f64>> {
        self.dirty = true;
        &mut Arc::make_mut(&mut self.data).points
    }

    fn check_index(&self, index: usize) -> Result<(), GeometryError> {
        let len = self.data.points.len();
        if index < len {
            Ok(())
        } else {
            Err(GeometryError::IndexOutOfRange { index, len })
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.points.is_empty()
    }

    #[inline]
    pub fn points(&self) -> &[Point3<f64>] {
        &self.data.points
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Returns the current bounding box, recomputing it if edits are pending.
    pub fn aabox(&mut self) -> AABox {
        self.refresh_aabox();
        self.data.aabox
    }

    fn refresh_aabox(&mut self) {
        if self.dirty {
            let data = Arc::make_mut(&mut self.data);
            data.aabox = AABox::from_points(&data.points);
            self.dirty = false;
        }
    }

    pub fn translate(&mut self, delta: &Vector3<f64>) -> &mut Self {
        for p in self.points_mut().iter_mut() {
            *p += delta;
        }
        self
    }

    pub fn translate_point(
        &mut self,
        index: usize,
        delta: &Vector3<f64>,
    ) -> Result<&mut Self, GeometryError> {
        self.check_index(index)?;
        self.points_mut()[index] += delta;
        Ok(self)
    }

    /// Rotates every point by `rotation` about `center`.
    pub fn rotate(&mut self, rotation: &Rotation3<f64>, center: &Point3<f64>) -> &mut Self {
        for p in self.points_mut().iter_mut() {
            *p = center + rotation * (*p - center);
        }
        self
    }

    pub fn rotate_point(
        &mut self,
        index: usize,
        rotation: &Rotation3<f64>,
        center: &Point3<f64>,
    ) -> Result<&mut Self, GeometryError> {
        self.check_index(index)?;
        let p = &mut self.points_mut()[index];
        *p = center + rotation * (*p - center);
        Ok(self)
    }

    pub fn set_point(
        &mut self,
        index: usize,
        point: Point3<f64>,
    ) -> Result<&mut Self, GeometryError> {
        self.check_index(index)?;
        self.points_mut()[index] = point;
        Ok(self)
    }

    /// Finishes the batch, recomputing the bounding box once.
    pub fn commit(mut self) -> CoordinateGroup {
        self.refresh_aabox();
        CoordinateGroup { data: self.data }
    }
}
