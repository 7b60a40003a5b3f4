// Row-major flattening shared by feature buffers and the voting space
//
// Both frame-major feature buffers `(t, y, x)` and voting cells
// `(t, y, x, scale)` flatten their coordinates the same way: the leading
// time axis is unbounded, every trailing axis has a fixed extent.

/// Row-major layout with an unbounded outer axis and `N` bounded inner axes
///
/// `encode(outer, [a, b, ..])` is `((outer * e0 + a) * e1 + b) ..`, which for
/// the voting space reads `t*(H*W*S) + y*(W*S) + x*S + s`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowMajor<const N: usize> {
    extents: [usize; N],
}

/// Feature buffer layout: `(t; y, x)` with extents `[height, width]`
pub type FrameLayout = RowMajor<2>;

/// Voting cell layout: `(t; y, x, scale)` with extents `[height, width, n_scales]`
pub type CellLayout = RowMajor<3>;

impl<const N: usize> RowMajor<N> {
    /// Create a layout from the inner extents (outermost first)
    ///
    /// Every extent must be non-zero; callers validate their configuration
    /// before building a layout.
    pub fn new(extents: [usize; N]) -> Self {
        debug_assert!(extents.iter().all(|&e| e > 0), "zero extent in layout");
        Self { extents }
    }

    pub fn extents(&self) -> [usize; N] {
        self.extents
    }

    /// Number of flat positions covered by one step of the outer axis
    pub fn outer_stride(&self) -> usize {
        self.extents.iter().product()
    }

    /// True when every inner coordinate lies inside its extent
    pub fn contains(&self, inner: [usize; N]) -> bool {
        inner.iter().zip(self.extents.iter()).all(|(c, e)| c < e)
    }

    pub fn encode(&self, outer: usize, inner: [usize; N]) -> usize {
        inner
            .iter()
            .zip(self.extents.iter())
            .fold(outer, |index, (coordinate, extent)| index * extent + coordinate)
    }

    /// `encode`, or `None` when the flat index does not fit in `usize`
    pub fn checked_encode(&self, outer: usize, inner: [usize; N]) -> Option<usize> {
        inner
            .iter()
            .zip(self.extents.iter())
            .try_fold(outer, |index, (coordinate, extent)| {
                index.checked_mul(*extent)?.checked_add(*coordinate)
            })
    }

    /// Largest outer coordinate whose whole block, and the start of the
    /// next one, are addressable
    pub fn max_outer(&self) -> usize {
        (usize::MAX / self.outer_stride()).saturating_sub(1)
    }

    pub fn decode(&self, index: usize) -> (usize, [usize; N]) {
        let mut rest = index;
        let mut inner = [0; N];
        for axis in (0..N).rev() {
            inner[axis] = rest % self.extents[axis];
            rest /= self.extents[axis];
        }
        (rest, inner)
    }

    /// First flat index belonging to `outer`
    pub fn outer_start(&self, outer: usize) -> usize {
        outer * self.outer_stride()
    }
}
