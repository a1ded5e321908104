//! Benchmark corpus discovery and per-program argument extraction.
//!
//! A benchmark program declares its runtime arguments with a single comment
//! line:
//!
//! ```text
//! # ARGS: 4 7
//! ```
//!
//! Tokens after the marker, whitespace-split, become the argument list handed
//! to every execution of that program. A program without the marker simply
//! runs with no arguments.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Marker prefix for the in-file argument annotation.
const ARGS_MARKER: &str = "# ARGS:";

/// One source program queued for benchmarking. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct BenchmarkUnit {
    pub path: PathBuf,
    /// Program identity used as the report key.
    pub name: String,
    /// Ordered runtime argument tokens; possibly empty.
    pub arguments: Vec<String>,
}

impl BenchmarkUnit {
    pub fn from_file(path: &Path) -> io::Result<Self> {
        let source = fs::read_to_string(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            name: path.display().to_string(),
            arguments: extract_args(&source),
        })
    }
}

/// Scan source text for the first `# ARGS:` line. Absence of the marker
/// yields an empty list, not an error. Pure.
pub fn extract_args(source: &str) -> Vec<String> {
    for line in source.lines() {
        if let Some(rest) = line.trim_start().strip_prefix(ARGS_MARKER) {
            return rest.split_whitespace().map(str::to_string).collect();
        }
    }
    Vec::new()
}

/// Recursively collect `.bril` programs under `root`, sorted by path so the
/// corpus order is stable across runs.
pub fn discover(root: &Path) -> io::Result<Vec<BenchmarkUnit>> {
    let mut units = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry?;
        if entry.file_type().is_file()
            && entry.path().extension().is_some_and(|ext| ext == "bril")
        {
            units.push(BenchmarkUnit::from_file(entry.path())?);
        }
    }
    units.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(units)
}
