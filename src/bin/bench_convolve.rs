#[cfg(feature = "mimalloc-global")]
#[global_allocator]
static GLOBAL_ALLOCATOR: mimalloc::MiMalloc = mimalloc::MiMalloc;

use rand::Rng;
use rand::SeedableRng;
use sat_convolve::{ConvolveConfig, ConvolveEngine, Grid, Kernel, KernelBackend};
use std::env;
use std::num::NonZeroU32;
use std::time::Instant;

const REFERENCE_KERNEL: [[i32; 5]; 5] = [
    [0, 0, 1, 0, 0],
    [0, 1, 2, 1, 0],
    [1, 2, 0, 2, 1],
    [0, 1, 2, 1, 0],
    [0, 0, 1, 0, 0],
];

#[derive(Clone, Debug)]
struct BenchConfig {
    size: usize,
    warmup: u32,
    iters: u32,
    seed: u64,
    threads: Option<usize>,
    json: bool,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            size: 1024,
            warmup: 1,
            iters: 10,
            seed: 0x5EED_1234_ABCD_EF01,
            threads: None,
            json: false,
        }
    }
}

fn parse_args() -> BenchConfig {
    let mut cfg = BenchConfig::default();
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--size" => {
                if let Some(v) = args.next() {
                    cfg.size = v.parse().expect("--size expects usize");
                }
            }
            "--warmup" => {
                if let Some(v) = args.next() {
                    cfg.warmup = v.parse().expect("--warmup expects u32");
                }
            }
            "--iters" => {
                if let Some(v) = args.next() {
                    cfg.iters = v.parse().expect("--iters expects u32");
                }
            }
            "--threads" => {
                if let Some(v) = args.next() {
                    cfg.threads = Some(v.parse().expect("--threads expects usize"));
                }
            }
            "--seed" => {
                if let Some(v) = args.next() {
                    cfg.seed = if let Some(hex) = v.strip_prefix("0x") {
                        u64::from_str_radix(hex, 16).expect("--seed hex parse failed")
                    } else {
                        v.parse().expect("--seed expects u64")
                    };
                }
            }
            "--json" => {
                cfg.json = true;
            }
            other => panic!(
                "unknown argument: {other}\nusage: bench_convolve [--size N] [--warmup N] [--iters N] [--threads N] [--seed S] [--json]"
            ),
        }
    }
    cfg
}

fn random_grid(size: usize, seed: u64) -> Grid {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let mut grid = Grid::new(size);
    for row in 0..size {
        for col in 0..size {
            grid.set(row, col, rng.gen_range(-16..=16));
        }
    }
    grid
}

fn bench_backend(cfg: &BenchConfig, backend: KernelBackend, kernel: &Kernel, grid: &Grid) -> f64 {
    let mut config = ConvolveConfig::default().kernel(backend);
    if let Some(n) = cfg.threads {
        config = config.thread_count(n);
    }
    let engine = ConvolveEngine::with_config(config).expect("failed to build thread pool");

    if let Some(warmup) = NonZeroU32::new(cfg.warmup) {
        std::hint::black_box(engine.apply(grid.clone(), kernel, warmup));
    }

    let iters = NonZeroU32::new(cfg.iters.max(1)).expect("iters is at least 1");
    let input = grid.clone();
    let start = Instant::now();
    let out = engine.apply(input, kernel, iters);
    let total_ms = start.elapsed().as_secs_f64() * 1000.0;
    std::hint::black_box(out);
    total_ms
}

fn main() {
    let cfg = parse_args();
    let kernel = Kernel::from_rows(REFERENCE_KERNEL.iter().map(|r| r.to_vec()).collect())
        .expect("reference kernel is 5x5");
    let grid = random_grid(cfg.size, cfg.seed);

    let scalar_ms = bench_backend(&cfg, KernelBackend::Scalar, &kernel, &grid);
    let parallel_ms = bench_backend(&cfg, KernelBackend::Parallel, &kernel, &grid);
    let iters = cfg.iters.max(1) as f64;
    let speedup = scalar_ms / parallel_ms;

    if cfg.json {
        println!(
            "{{\"size\":{},\"iters\":{},\"scalar_ms\":{:.3},\"parallel_ms\":{:.3},\"speedup\":{:.3}}}",
            cfg.size, cfg.iters, scalar_ms, parallel_ms, speedup
        );
        return;
    }

    println!("Grid {0}x{0}, {1} passes", cfg.size, cfg.iters);
    println!(
        "  Scalar:   {scalar_ms:.3} ms total, {:.4} ms/pass",
        scalar_ms / iters
    );
    println!(
        "  Parallel: {parallel_ms:.3} ms total, {:.4} ms/pass",
        parallel_ms / iters
    );
    println!("Speedup (Scalar / Parallel): {speedup:.2}x");
}
