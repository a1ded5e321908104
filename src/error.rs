use std::io;

use thiserror::Error;

/// Failure taxonomy for a benchmark run.
///
/// `ToolchainBuild` and `ReportWrite` are fatal to the whole run. Everything
/// else is job-scoped: the scheduler records it, logs it with enough context
/// to reproduce, and keeps going.
#[derive(Debug, Error)]
pub enum BenchError {
    #[error("toolchain build failed: {0}")]
    ToolchainBuild(String),

    #[error("compiling {program} [{config}]: {cause}")]
    Compile {
        program: String,
        config: String,
        cause: String,
    },

    #[error("no instruction count in instrumented output: {0:?}")]
    InstrumentationParse(String),

    #[error("timing tool failed for {program} [{config}]: {cause}")]
    TimingTool {
        program: String,
        config: String,
        cause: String,
    },

    #[error("could not write report to {path}: {source}")]
    ReportWrite { path: String, source: io::Error },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl BenchError {
    /// Whether this error must abort the run instead of being recorded.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BenchError::ToolchainBuild(_) | BenchError::ReportWrite { .. }
        )
    }
}
