//! Error types for loading, validating and writing a convolution run.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias for run-level operations.
pub type RunResult<T> = Result<T, RunError>;

/// Shape violations detected while building a grid or kernel.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShapeError {
    #[error("matrix has no rows")]
    Empty,

    #[error("row {row} has {found} values, expected {expected}")]
    Ragged {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("matrix is {rows}x{cols}, expected a square matrix")]
    NotSquare { rows: usize, cols: usize },

    #[error("kernel dimension {0} is even, expected an odd dimension")]
    EvenKernel(usize),

    #[error("kernel dimension {kernel} exceeds grid dimension {grid}")]
    KernelTooLarge { kernel: usize, grid: usize },

    #[error("scaling divisor must be nonzero")]
    ZeroDivisor,

    #[error("saturation bound {0} is negative")]
    NegativeBound(i32),
}

/// Everything that can abort a run before or after the engine executes.
///
/// The engine itself never fails; every variant is raised at the boundary.
#[derive(Error, Debug)]
pub enum RunError {
    /// Too few run arguments were supplied.
    #[error("{0}")]
    Usage(String),

    /// An input source could not be opened for reading.
    #[error("cannot open {}: {source}", path.display())]
    InputAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Iteration count was zero or not a positive integer.
    #[error("invalid iteration count: {0:?}")]
    InvalidIteration(String),

    /// A token in a grid or kernel source was not an integer.
    #[error("{}:{line}:{column}: invalid integer {token:?}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        column: usize,
        token: String,
    },

    /// Grid or kernel had an unusable shape.
    #[error("{}: {source}", path.display())]
    Shape {
        path: PathBuf,
        #[source]
        source: ShapeError,
    },

    /// Run parameters did not fit together.
    #[error("invalid configuration: {0}")]
    Config(#[from] ShapeError),

    /// The output destination could not be written.
    #[error("cannot write {}: {source}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The worker pool could not be created.
    #[error("failed to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
