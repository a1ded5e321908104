//! Benchmark orchestration and statistical validation for Bril optimization
//! configurations.
//!
//! The pipeline compiles every program in a corpus under a table of named
//! optimization flag sets, times each compiled variant under an external
//! statistical benchmarking tool, obtains a dynamic instruction count from a
//! separate instrumented interpreter run, and aggregates everything into a
//! JSON report carrying a per-measurement stability rating.
//!
//! Scheduling runs in two strict phases on one bounded worker pool:
//! compile-all-variants, then measure-all-variants. See [`scheduler`].

pub mod compile;
pub mod corpus;
pub mod error;
pub mod exec;
pub mod measure;
pub mod scheduler;
pub mod schema;
pub mod stats;

/// External tool entry points for one run. All three are reached through the
/// [`exec::ProcessRunner`] seam.
#[derive(Debug, Clone)]
pub struct Tools {
    /// Bril optimizer: program path + flags in, compiled artifact on stdout.
    pub compiler: String,
    /// Bril interpreter: artifact on stdin; `-p` enables the instruction
    /// profile on the diagnostic stream.
    pub interpreter: String,
    /// Statistical timing tool (hyperfine-compatible CLI).
    pub timer: String,
}

impl Default for Tools {
    fn default() -> Self {
        Self {
            compiler: "./target/release/rust_bril".to_string(),
            interpreter: "brilirs".to_string(),
            timer: "hyperfine".to_string(),
        }
    }
}
