//! Run configuration and the load → convolve → write pipeline.

use std::fs::File;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::convolve::{ConvolveConfig, ConvolveEngine, Scaling};
use crate::error::{RunError, RunResult, ShapeError};
use crate::textio;

/// Parse a pass count. Anything other than a positive integer is rejected.
pub fn parse_iterations(raw: &str) -> RunResult<NonZeroU32> {
    raw.trim()
        .parse::<u32>()
        .ok()
        .and_then(NonZeroU32::new)
        .ok_or_else(|| RunError::InvalidIteration(raw.to_string()))
}

fn check_readable(path: &Path) -> RunResult<()> {
    File::open(path)
        .map(drop)
        .map_err(|source| RunError::InputAccess {
            path: path.to_path_buf(),
            source,
        })
}

#[derive(Clone, Debug)]
pub struct RunConfig {
    pub grid_path: PathBuf,
    pub kernel_path: PathBuf,
    pub output_path: PathBuf,
    pub iterations: NonZeroU32,
    pub engine: ConvolveConfig,
    /// Replace `engine.scaling` with one derived from the loaded kernel.
    pub derive_scaling: bool,
}

impl RunConfig {
    /// Validate raw run arguments in order: both inputs must be readable,
    /// then the iteration count must be a positive integer.
    pub fn from_args(
        grid_path: impl Into<PathBuf>,
        kernel_path: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
        iterations: &str,
    ) -> RunResult<Self> {
        let grid_path = grid_path.into();
        let kernel_path = kernel_path.into();
        check_readable(&grid_path)?;
        check_readable(&kernel_path)?;
        let iterations = parse_iterations(iterations)?;
        Ok(Self {
            grid_path,
            kernel_path,
            output_path: output_path.into(),
            iterations,
            engine: ConvolveConfig::default(),
            derive_scaling: false,
        })
    }

    pub fn engine(mut self, engine: ConvolveConfig) -> Self {
        self.engine = engine;
        self
    }

    pub fn derive_scaling(mut self, derive: bool) -> Self {
        self.derive_scaling = derive;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunSummary {
    pub dim: usize,
    pub kernel_dim: usize,
    pub iterations: u32,
    pub scaling: Scaling,
    pub elapsed: Duration,
}

/// Load both inputs, run the engine and write the result.
///
/// The output file is only created once every input check and every pass
/// has succeeded.
pub fn execute(config: &RunConfig) -> RunResult<RunSummary> {
    let start = Instant::now();
    let grid = textio::read_grid(&config.grid_path)?;
    let kernel = textio::read_kernel(&config.kernel_path)?;
    if kernel.dim() > grid.dim() {
        return Err(RunError::Config(ShapeError::KernelTooLarge {
            kernel: kernel.dim(),
            grid: grid.dim(),
        }));
    }

    let mut engine_config = config.engine.clone();
    if config.derive_scaling {
        engine_config = engine_config.scaling(Scaling::derived_from(&kernel));
    }
    let engine = ConvolveEngine::with_config(engine_config)?;
    let scaling = engine.scaling();
    tracing::info!(
        dim = grid.dim(),
        kernel_dim = kernel.dim(),
        iterations = config.iterations.get(),
        divisor = scaling.divisor(),
        bound = scaling.bound(),
        "starting run"
    );

    let dim = grid.dim();
    let result = engine.apply(grid, &kernel, config.iterations);
    textio::save_grid(&config.output_path, &result)?;
    tracing::info!(path = %config.output_path.display(), "wrote output");

    Ok(RunSummary {
        dim,
        kernel_dim: kernel.dim(),
        iterations: config.iterations.get(),
        scaling,
        elapsed: start.elapsed(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iterations_must_be_positive_integers() {
        assert_eq!(parse_iterations("3").unwrap().get(), 3);
        assert_eq!(parse_iterations(" 12 ").unwrap().get(), 12);
        for bad in ["0", "", "-1", "abc", "2.5", "99999999999"] {
            assert!(
                matches!(parse_iterations(bad), Err(RunError::InvalidIteration(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn missing_input_is_reported_before_iterations() {
        let err = RunConfig::from_args("/nonexistent/grid.txt", "/nonexistent/k.txt", "out", "0")
            .unwrap_err();
        assert!(matches!(err, RunError::InputAccess { .. }));
    }
}
