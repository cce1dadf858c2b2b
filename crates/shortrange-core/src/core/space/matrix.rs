use nalgebra::Vector3;

/// A dense row-major matrix of pairwise values between two groups.
///
/// Matrices are owned by the caller and reused between calls: `reset` keeps the
/// allocation, so filling the same workspace in a hot loop does not allocate
/// once it has grown to the largest group pair.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PairMatrix<T> {
    nrows: usize,
    ncols: usize,
    data: Vec<T>,
}

/// Pairwise distances (or a derived quantity, see [`super::DistanceKind`]).
pub type DistMatrix = PairMatrix<f64>;

/// Pairwise displacement vectors `p0_i - p1_j` after any periodic wrap.
pub type DeltaMatrix = PairMatrix<Vector3<f64>>;

impl<T: Copy> PairMatrix<T> {
    pub fn new() -> Self {
        Self {
            nrows: 0,
            ncols: 0,
            data: Vec::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nrows: 0,
            ncols: 0,
            data: Vec::with_capacity(capacity),
        }
    }

    /// Clears the contents and sets the new shape. Values are appended
    /// row-major with [`PairMatrix::push`].
    pub(crate) fn reset(&mut self, nrows: usize, ncols: usize) {
        self.nrows = nrows;
        self.ncols = ncols;
        self.data.clear();
        self.data.reserve(nrows * ncols);
    }

    #[inline]
    pub(crate) fn push(&mut self, value: T) {
        self.data.push(value);
    }

    #[inline]
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    #[inline]
    pub fn ncols(&self) -> usize {
        self.ncols
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> Option<T> {
        if i < self.nrows && j < self.ncols {
            self.data.get(i * self.ncols + j).copied()
        } else {
            None
        }
    }

    /// Row `i` as a slice of length `ncols`.
    #[inline]
    pub fn row(&self, i: usize) -> &[T] {
        let start = i * self.ncols;
        &self.data[start..start + self.ncols]
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }
}
