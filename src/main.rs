#[cfg(feature = "mimalloc-global")]
#[global_allocator]
static GLOBAL_ALLOCATOR: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::{Parser, ValueEnum};
use sat_convolve::run::{self, RunConfig};
use sat_convolve::{ConvolveConfig, KernelBackend, RunError, RunResult, Scaling};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BackendArg {
    Scalar,
    Parallel,
}

impl From<BackendArg> for KernelBackend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Scalar => KernelBackend::Scalar,
            BackendArg::Parallel => KernelBackend::Parallel,
        }
    }
}

/// Apply a fixed odd-sized kernel to a square integer grid for N passes,
/// scaling and saturating after every pass.
#[derive(Parser)]
#[command(name = "sat-convolve")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Comma-separated input grid, one row per line
    grid: PathBuf,

    /// Comma-separated kernel, one row per line
    kernel: PathBuf,

    /// Destination for the space-separated result grid
    output: PathBuf,

    /// Number of passes (positive integer)
    #[arg(allow_hyphen_values = true)]
    iterations: String,

    /// Arguments past the fourth positional are ignored
    #[arg(hide = true, trailing_var_arg = true, allow_hyphen_values = true)]
    extra: Vec<String>,

    /// Threads in the compute pool (default: physical cores, capped)
    #[arg(long)]
    threads: Option<usize>,

    /// Hard upper bound on compute threads
    #[arg(long)]
    max_threads: Option<usize>,

    /// Pass backend (default: chosen from grid size)
    #[arg(long, value_enum)]
    backend: Option<BackendArg>,

    /// Divisor applied to each windowed sum
    #[arg(long, default_value_t = sat_convolve::convolve::DEFAULT_DIVISOR)]
    divisor: i32,

    /// Saturation bound, results are clamped to [-bound, bound]
    #[arg(long, default_value_t = sat_convolve::convolve::DEFAULT_BOUND)]
    bound: i32,

    /// Derive divisor and bound from the kernel's positive weights
    #[arg(long, conflicts_with_all = ["divisor", "bound"])]
    derive_scaling: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

fn setup_logging(verbose: bool, quiet: bool) {
    let default = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn build_config(cli: &Cli) -> RunResult<RunConfig> {
    let mut engine = ConvolveConfig::default().scaling(Scaling::new(cli.divisor, cli.bound)?);
    if let Some(n) = cli.threads {
        engine = engine.thread_count(n);
    }
    if let Some(n) = cli.max_threads {
        engine = engine.max_threads(n);
    }
    if let Some(backend) = cli.backend {
        engine = engine.kernel(backend.into());
    }
    Ok(RunConfig::from_args(&cli.grid, &cli.kernel, &cli.output, &cli.iterations)?
        .engine(engine)
        .derive_scaling(cli.derive_scaling))
}

fn report(err: &RunError) -> ExitCode {
    eprintln!("Error: {err}");
    ExitCode::FAILURE
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            let message = e.to_string();
            let message = message.trim_start_matches("error: ").trim_end();
            return report(&RunError::Usage(message.to_string()));
        }
    };
    setup_logging(cli.verbose, cli.quiet);
    if !cli.extra.is_empty() {
        tracing::debug!(ignored = ?cli.extra, "extra arguments ignored");
    }

    let result = build_config(&cli).and_then(|config| run::execute(&config));
    match result {
        Ok(summary) => {
            tracing::info!(
                dim = summary.dim,
                iterations = summary.iterations,
                elapsed_ms = summary.elapsed.as_secs_f64() * 1000.0,
                "done"
            );
            ExitCode::SUCCESS
        }
        Err(e) => report(&e),
    }
}
