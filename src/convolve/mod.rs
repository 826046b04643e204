//! Convolution engine internals and public API.

mod engine;
mod grid;
mod kernel;

pub use engine::{ConvolveConfig, ConvolveEngine, apply};
pub use grid::{Generations, Grid};
pub use kernel::{
    DEFAULT_BOUND, DEFAULT_DIVISOR, Kernel, KernelBackend, Scaling, advance_parallel,
    advance_scalar, convolve_cell,
};
