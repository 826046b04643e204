//! Repeated fixed-kernel integer convolution with truncating scale and
//! saturation.

pub mod convolve;
pub mod error;
pub mod run;
pub mod textio;
pub use convolve::{ConvolveConfig, ConvolveEngine, Grid, Kernel, KernelBackend, Scaling};
pub use error::{RunError, RunResult, ShapeError};
