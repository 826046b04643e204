//! Square sample grid and the two-generation buffer used during passes.
//!
//! Storage is a single row-major `Vec<i32>`. `Generations` owns two distinct
//! grids so a pass can only read `current` and only write `next`.

use crate::error::ShapeError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grid {
    dim: usize,
    cells: Vec<i32>,
}

impl Grid {
    /// A `dim`×`dim` grid of zeros.
    pub fn new(dim: usize) -> Self {
        Self::filled(dim, 0)
    }

    pub fn filled(dim: usize, value: i32) -> Self {
        Self {
            dim,
            cells: vec![value; dim * dim],
        }
    }

    /// Build a grid from parsed rows. Rows must all have the same length and
    /// there must be as many rows as columns.
    pub fn from_rows(rows: Vec<Vec<i32>>) -> Result<Self, ShapeError> {
        let (dim, cells) = flatten_square(rows)?;
        Ok(Self { dim, cells })
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> i32 {
        self.cells[row * self.dim + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: i32) {
        self.cells[row * self.dim + col] = value;
    }

    #[inline]
    pub fn row(&self, row: usize) -> &[i32] {
        let start = row * self.dim;
        &self.cells[start..start + self.dim]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[i32]> {
        // chunks_exact(0) panics; a zero-dim grid simply has no rows.
        self.cells.chunks_exact(self.dim.max(1))
    }

    #[inline]
    pub fn as_slice(&self) -> &[i32] {
        &self.cells
    }

    #[inline]
    pub(crate) fn as_mut_slice(&mut self) -> &mut [i32] {
        &mut self.cells
    }
}

/// Flatten `rows` into a row-major buffer, checking it is square.
pub(crate) fn flatten_square(rows: Vec<Vec<i32>>) -> Result<(usize, Vec<i32>), ShapeError> {
    let Some(first) = rows.first() else {
        return Err(ShapeError::Empty);
    };
    let cols = first.len();
    if cols == 0 {
        return Err(ShapeError::Empty);
    }
    for (row, values) in rows.iter().enumerate() {
        if values.len() != cols {
            return Err(ShapeError::Ragged {
                row,
                expected: cols,
                found: values.len(),
            });
        }
    }
    if rows.len() != cols {
        return Err(ShapeError::NotSquare {
            rows: rows.len(),
            cols,
        });
    }
    Ok((cols, rows.into_iter().flatten().collect()))
}

/// Current and next generation of one grid.
pub struct Generations {
    current: Grid,
    next: Grid,
    generation: u64,
}

impl Generations {
    pub fn new(initial: Grid) -> Self {
        let next = Grid::new(initial.dim());
        Self {
            current: initial,
            next,
            generation: 0,
        }
    }

    #[inline]
    pub fn current(&self) -> &Grid {
        &self.current
    }

    /// Number of completed passes.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Borrow the read-only current generation and the write-only next one.
    #[inline]
    pub(crate) fn split(&mut self) -> (&Grid, &mut Grid) {
        (&self.current, &mut self.next)
    }

    /// Promote `next` to `current`. Handles are exchanged, cells are not copied.
    #[inline]
    pub(crate) fn swap(&mut self) {
        std::mem::swap(&mut self.current, &mut self.next);
        self.generation += 1;
    }

    pub fn into_current(self) -> Grid {
        self.current
    }
}
