use std::num::NonZeroU32;
use std::sync::OnceLock;
use std::time::Instant;

use super::grid::{Generations, Grid};
use super::kernel::{Kernel, KernelBackend, Scaling, advance_parallel, advance_scalar};

// Below this many rows the pool hand-off costs more than the pass itself.
const PARALLEL_MIN_ROWS: usize = 64;

static PHYSICAL_CORES: OnceLock<usize> = OnceLock::new();

#[inline]
fn physical_core_count() -> usize {
    *PHYSICAL_CORES.get_or_init(|| num_cpus::get_physical().max(1))
}

#[inline]
fn auto_pool_thread_count_for_physical(physical: usize) -> usize {
    let physical = physical.max(1);
    if physical <= 8 {
        physical
    } else {
        physical.div_ceil(2).max(6)
    }
}

#[inline]
fn auto_pool_thread_count() -> usize {
    auto_pool_thread_count_for_physical(physical_core_count())
}

fn resolve_thread_count(config: &ConvolveConfig) -> usize {
    let mut threads = config.thread_count.unwrap_or_else(auto_pool_thread_count);
    if let Some(cap) = config.max_threads {
        threads = threads.min(cap);
    }
    threads.max(1)
}

/// Pick the pass backend for a grid of `dim` rows.
fn resolve_kernel_backend(requested: Option<KernelBackend>, threads: usize, dim: usize) -> KernelBackend {
    if let Some(backend) = requested {
        return backend;
    }
    if threads > 1 && dim >= PARALLEL_MIN_ROWS {
        KernelBackend::Parallel
    } else {
        KernelBackend::Scalar
    }
}

#[inline]
fn advance(backend: KernelBackend, gens: &mut Generations, kernel: &Kernel, scaling: Scaling) {
    let (current, next) = gens.split();
    match backend {
        KernelBackend::Scalar => advance_scalar(current, next, kernel, scaling),
        KernelBackend::Parallel => advance_parallel(current, next, kernel, scaling),
    }
    gens.swap();
}

/// Configuration for a convolution engine instance.
///
/// Use `ConvolveConfig::default()` for auto-tuned defaults and the reference
/// scaling, or customise individual knobs via the builder methods.
#[derive(Clone, Debug, Default)]
pub struct ConvolveConfig {
    /// Number of threads for the compute pool.
    /// `None` means auto-detect (physical cores, memory-bandwidth capped).
    pub thread_count: Option<usize>,
    /// Hard upper bound on threads regardless of auto-detection.
    pub max_threads: Option<usize>,
    /// Pass backend. `None` picks parallel for large grids when more than
    /// one thread is available.
    pub kernel: Option<KernelBackend>,
    /// Divisor and saturation bound applied after every windowed sum.
    pub scaling: Scaling,
}

impl ConvolveConfig {
    /// Set an explicit thread count for the compute pool.
    pub fn thread_count(mut self, n: usize) -> Self {
        self.thread_count = Some(n.max(1));
        self
    }

    /// Set a hard upper bound on threads.
    pub fn max_threads(mut self, n: usize) -> Self {
        self.max_threads = Some(n.max(1));
        self
    }

    /// Force a specific pass backend.
    pub fn kernel(mut self, backend: KernelBackend) -> Self {
        self.kernel = Some(backend);
        self
    }

    pub fn scaling(mut self, scaling: Scaling) -> Self {
        self.scaling = scaling;
        self
    }
}

/// Applies a kernel to a grid for a number of sequential passes.
pub struct ConvolveEngine {
    pool: rayon::ThreadPool,
    threads: usize,
    backend: Option<KernelBackend>,
    scaling: Scaling,
}

impl ConvolveEngine {
    pub fn new() -> Result<Self, rayon::ThreadPoolBuildError> {
        Self::with_config(ConvolveConfig::default())
    }

    /// Create an engine with explicit configuration.
    pub fn with_config(config: ConvolveConfig) -> Result<Self, rayon::ThreadPoolBuildError> {
        let threads = resolve_thread_count(&config);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("convolve-{i}"))
            .build()?;
        Ok(Self {
            pool,
            threads,
            backend: config.kernel,
            scaling: config.scaling,
        })
    }

    #[inline]
    pub fn threads(&self) -> usize {
        self.threads
    }

    #[inline]
    pub fn scaling(&self) -> Scaling {
        self.scaling
    }

    /// Backend this engine would use for a grid of dimension `dim`.
    pub fn backend_for(&self, dim: usize) -> KernelBackend {
        resolve_kernel_backend(self.backend, self.threads, dim)
    }

    /// Run one pass: `current` is read, `next` is written, then they swap.
    pub fn step(&self, gens: &mut Generations, kernel: &Kernel) {
        let backend = self.backend_for(gens.current().dim());
        self.pool.install(|| advance(backend, gens, kernel, self.scaling));
    }

    /// Run `iterations` passes and return the final generation.
    ///
    /// Taps that fall outside the grid contribute nothing, so a kernel wider
    /// than the grid is still well defined.
    pub fn apply(&self, grid: Grid, kernel: &Kernel, iterations: NonZeroU32) -> Grid {
        debug_assert!(kernel.dim() % 2 == 1, "kernel dimension must be odd");

        let dim = grid.dim();
        let backend = self.backend_for(dim);
        let start = Instant::now();
        let mut gens = Generations::new(grid);

        self.pool.install(|| {
            for _ in 0..iterations.get() {
                advance(backend, &mut gens, kernel, self.scaling);
                tracing::debug!(generation = gens.generation(), "pass complete");
            }
        });

        tracing::info!(
            dim,
            kernel_dim = kernel.dim(),
            passes = gens.generation(),
            ?backend,
            threads = self.threads,
            elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
            "convolution finished"
        );
        gens.into_current()
    }
}

/// Run `iterations` passes with the reference scaling on the global rayon pool.
pub fn apply(grid: Grid, kernel: &Kernel, iterations: NonZeroU32) -> Grid {
    let backend = resolve_kernel_backend(None, rayon::current_num_threads(), grid.dim());
    let mut gens = Generations::new(grid);
    for _ in 0..iterations.get() {
        advance(backend, &mut gens, kernel, Scaling::default());
    }
    gens.into_current()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn once() -> NonZeroU32 {
        NonZeroU32::new(1).unwrap()
    }

    #[test]
    fn auto_pool_thread_count_targets_bandwidth_sweet_spot() {
        assert_eq!(auto_pool_thread_count_for_physical(0), 1);
        assert_eq!(auto_pool_thread_count_for_physical(1), 1);
        assert_eq!(auto_pool_thread_count_for_physical(4), 4);
        assert_eq!(auto_pool_thread_count_for_physical(8), 8);
        assert_eq!(auto_pool_thread_count_for_physical(9), 6);
        assert_eq!(auto_pool_thread_count_for_physical(16), 8);
        assert_eq!(auto_pool_thread_count_for_physical(24), 12);
    }

    #[test]
    fn thread_count_respects_cap() {
        let config = ConvolveConfig::default().thread_count(12).max_threads(3);
        assert_eq!(resolve_thread_count(&config), 3);
        let config = ConvolveConfig::default().thread_count(0);
        assert_eq!(resolve_thread_count(&config), 1);
    }

    #[test]
    fn backend_defaults_follow_grid_size() {
        assert_eq!(resolve_kernel_backend(None, 4, 8), KernelBackend::Scalar);
        assert_eq!(resolve_kernel_backend(None, 1, 1024), KernelBackend::Scalar);
        assert_eq!(resolve_kernel_backend(None, 4, 1024), KernelBackend::Parallel);
        assert_eq!(
            resolve_kernel_backend(Some(KernelBackend::Parallel), 1, 4),
            KernelBackend::Parallel
        );
    }

    #[test]
    fn step_advances_generation_counter() {
        let engine = ConvolveEngine::with_config(ConvolveConfig::default().thread_count(2)).unwrap();
        let kernel = Kernel::centered(3, 16).unwrap();
        let mut gens = Generations::new(Grid::filled(4, 3));
        engine.step(&mut gens, &kernel);
        engine.step(&mut gens, &kernel);
        assert_eq!(gens.generation(), 2);
        assert_eq!(gens.current(), &Grid::filled(4, 3));
    }

    #[test]
    fn engine_and_free_apply_match() {
        let kernel =
            Kernel::from_rows(vec![vec![0, 1, 0], vec![1, 12, 1], vec![0, 1, 0]]).unwrap();
        let mut grid = Grid::new(5);
        grid.set(2, 2, 16);
        grid.set(0, 4, -16);
        let engine = ConvolveEngine::with_config(ConvolveConfig::default().thread_count(1)).unwrap();
        assert_eq!(
            engine.apply(grid.clone(), &kernel, once()),
            apply(grid, &kernel, once())
        );
    }
}
