//! Weighted-window kernel and the per-cell convolution transform.
//!
//! One output cell is the true convolution of the current generation with the
//! kernel (flipped on both axes), zero-padded past the grid edges, divided by
//! a fixed divisor with truncation toward zero and saturated to `±bound`.

use rayon::prelude::*;

use super::grid::{Grid, flatten_square};
use crate::error::ShapeError;

/// Reference divisor and saturation bound.
pub const DEFAULT_DIVISOR: i32 = 16;
pub const DEFAULT_BOUND: i32 = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KernelBackend {
    /// Single-threaded row sweep.
    Scalar,
    /// Rows partitioned across the engine's rayon pool.
    Parallel,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Kernel {
    dim: usize,
    weights: Vec<i32>,
}

impl Kernel {
    /// Build a kernel from parsed rows. The kernel must be square with an odd
    /// dimension.
    pub fn from_rows(rows: Vec<Vec<i32>>) -> Result<Self, ShapeError> {
        let (dim, weights) = flatten_square(rows)?;
        if dim % 2 == 0 {
            return Err(ShapeError::EvenKernel(dim));
        }
        Ok(Self { dim, weights })
    }

    /// A kernel whose only nonzero weight is `center`.
    pub fn centered(dim: usize, center: i32) -> Result<Self, ShapeError> {
        let mut rows = vec![vec![0; dim]; dim];
        if let Some(row) = rows.get_mut(dim / 2) {
            row[dim / 2] = center;
        }
        Self::from_rows(rows)
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    #[inline]
    pub fn half_width(&self) -> usize {
        self.dim / 2
    }

    #[inline]
    pub fn weight(&self, row: usize, col: usize) -> i32 {
        self.weights[row * self.dim + col]
    }

    /// Weight applied to the source at offset `(l, m)` from the output cell,
    /// i.e. the kernel entry at `(H - l, H - m)`.
    #[inline]
    pub fn reversed_weight(&self, l: isize, m: isize) -> i32 {
        let h = self.half_width() as isize;
        self.weight((h - l) as usize, (h - m) as usize)
    }

    pub fn positive_sum(&self) -> i64 {
        self.weights
            .iter()
            .filter(|&&w| w > 0)
            .map(|&w| w as i64)
            .sum()
    }
}

/// Post-accumulation scaling: truncating division then saturation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Scaling {
    divisor: i32,
    bound: i32,
}

impl Default for Scaling {
    fn default() -> Self {
        Self {
            divisor: DEFAULT_DIVISOR,
            bound: DEFAULT_BOUND,
        }
    }
}

impl Scaling {
    pub fn new(divisor: i32, bound: i32) -> Result<Self, ShapeError> {
        if divisor == 0 {
            return Err(ShapeError::ZeroDivisor);
        }
        if bound < 0 {
            return Err(ShapeError::NegativeBound(bound));
        }
        Ok(Self { divisor, bound })
    }

    /// Divisor and bound both set to the kernel's positive-weight sum, or 1
    /// when the kernel has no positive weight.
    pub fn derived_from(kernel: &Kernel) -> Self {
        let sum = kernel.positive_sum().clamp(1, i32::MAX as i64) as i32;
        Self {
            divisor: sum,
            bound: sum,
        }
    }

    #[inline]
    pub fn divisor(&self) -> i32 {
        self.divisor
    }

    #[inline]
    pub fn bound(&self) -> i32 {
        self.bound
    }

    /// `/` on integers truncates toward zero: -17 / 16 == -1.
    #[inline(always)]
    pub fn apply(&self, acc: i128) -> i32 {
        let bound = self.bound as i128;
        (acc / self.divisor as i128).clamp(-bound, bound) as i32
    }
}

/// Compute output cell `(i, j)` from the current generation.
#[inline]
pub fn convolve_cell(current: &Grid, kernel: &Kernel, scaling: Scaling, i: usize, j: usize) -> i32 {
    let dim = current.dim() as isize;
    let h = kernel.half_width() as isize;
    let (i, j) = (i as isize, j as isize);

    // Taps whose source falls outside [0, dim) are skipped entirely.
    let l_lo = (-h).max(-i);
    let l_hi = h.min(dim - 1 - i);
    let m_lo = (-h).max(-j);
    let m_hi = h.min(dim - 1 - j);

    // A single i32 * i32 product can reach 2^62, so two taps already exceed i64.
    let mut acc = 0i128;
    for l in l_lo..=l_hi {
        let src = current.row((i + l) as usize);
        for m in m_lo..=m_hi {
            acc += src[(j + m) as usize] as i128 * kernel.reversed_weight(l, m) as i128;
        }
    }
    scaling.apply(acc)
}

/// Fill one output row.
#[inline]
pub fn convolve_row(current: &Grid, kernel: &Kernel, scaling: Scaling, i: usize, out: &mut [i32]) {
    debug_assert_eq!(out.len(), current.dim());
    for (j, cell) in out.iter_mut().enumerate() {
        *cell = convolve_cell(current, kernel, scaling, i, j);
    }
}

/// One full pass, rows in order on the calling thread.
pub fn advance_scalar(current: &Grid, next: &mut Grid, kernel: &Kernel, scaling: Scaling) {
    let dim = current.dim();
    if dim == 0 {
        return;
    }
    for (i, out) in next.as_mut_slice().chunks_exact_mut(dim).enumerate() {
        convolve_row(current, kernel, scaling, i, out);
    }
}

/// One full pass with rows spread over the active rayon pool. Each output row
/// has exactly one writer; returning from this call is the pass barrier.
pub fn advance_parallel(current: &Grid, next: &mut Grid, kernel: &Kernel, scaling: Scaling) {
    let dim = current.dim();
    if dim == 0 {
        return;
    }
    next.as_mut_slice()
        .par_chunks_mut(dim)
        .enumerate()
        .for_each(|(i, out)| convolve_row(current, kernel, scaling, i, out));
}
