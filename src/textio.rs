//! Comma-separated matrix loader and space-separated grid writer.
//!
//! Input: one row per line, values separated by commas. Output: one row per
//! line, each value followed by a single space.

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::convolve::{Grid, Kernel};
use crate::error::{RunError, RunResult};

/// Parse comma-separated rows. Blank lines are skipped, a trailing comma on a
/// row is allowed.
pub fn parse_matrix(path: &Path, text: &str) -> RunResult<Vec<Vec<i32>>> {
    let mut rows = Vec::new();
    for (line_idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let line = line.strip_suffix(',').unwrap_or(line);
        let mut row = Vec::new();
        for (col_idx, token) in line.split(',').enumerate() {
            let token = token.trim();
            let value = token.parse::<i32>().map_err(|_| RunError::Parse {
                path: path.to_path_buf(),
                line: line_idx + 1,
                column: col_idx + 1,
                token: token.to_string(),
            })?;
            row.push(value);
        }
        rows.push(row);
    }
    Ok(rows)
}

fn read_source(path: &Path) -> RunResult<String> {
    fs::read_to_string(path).map_err(|source| RunError::InputAccess {
        path: path.to_path_buf(),
        source,
    })
}

pub fn read_grid(path: &Path) -> RunResult<Grid> {
    let rows = parse_matrix(path, &read_source(path)?)?;
    let grid = Grid::from_rows(rows).map_err(|source| RunError::Shape {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(path = %path.display(), dim = grid.dim(), "loaded grid");
    Ok(grid)
}

pub fn read_kernel(path: &Path) -> RunResult<Kernel> {
    let rows = parse_matrix(path, &read_source(path)?)?;
    let kernel = Kernel::from_rows(rows).map_err(|source| RunError::Shape {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(path = %path.display(), dim = kernel.dim(), "loaded kernel");
    Ok(kernel)
}

pub fn write_grid<W: Write>(mut out: W, grid: &Grid) -> io::Result<()> {
    for row in grid.rows() {
        for value in row {
            write!(out, "{value} ")?;
        }
        out.write_all(b"\n")?;
    }
    out.flush()
}

/// Create (or truncate) `path` and write `grid` to it.
pub fn save_grid(path: &Path, grid: &Grid) -> RunResult<()> {
    let to_output_err = |source: io::Error| RunError::Output {
        path: path.to_path_buf(),
        source,
    };
    let file = fs::File::create(path).map_err(to_output_err)?;
    write_grid(BufWriter::new(file), grid).map_err(to_output_err)
}
