//! Measurement of one compiled variant.
//!
//! Each job owns two scoped temporary files (the persisted artifact and the
//! timing tool's export JSON). Both are `NamedTempFile`s, so they are removed
//! on every exit path of the job, error returns included.
//!
//! Dynamic instruction count comes from a single separate instrumented
//! interpreter run, not from the timed runs: profile output on the
//! diagnostic stream would perturb the wall-clock sample set.

use std::fs;
use std::io::Write;
use std::path::Path;

use log::{debug, warn};
use serde::Deserialize;

use crate::compile::CompiledVariant;
use crate::corpus::BenchmarkUnit;
use crate::error::BenchError;
use crate::exec::ProcessRunner;
use crate::schema::MeasurementRecord;
use crate::stats::{StabilityMetrics, CV_POOR};
use crate::Tools;

/// Warmup iterations discarded before timing begins.
const WARMUP_RUNS: u32 = 10;
/// Timed iterations collected even when variance is already low.
const MIN_RUNS: u32 = 20;

/// Per-command results inside the timing tool's export JSON.
#[derive(Debug, Deserialize)]
struct TimerExport {
    results: Vec<TimerResult>,
}

#[derive(Debug, Deserialize)]
struct TimerResult {
    mean: f64,
    stddev: f64,
    median: f64,
    min: f64,
    max: f64,
    #[serde(default)]
    times: Vec<f64>,
}

/// Time one compiled variant and attach its instrumented instruction count.
///
/// Job-scoped failures (`TimingTool`, `InstrumentationParse`) come back as
/// errors for the scheduler to record; they never abort sibling jobs.
pub fn measure(
    runner: &dyn ProcessRunner,
    tools: &Tools,
    unit: &BenchmarkUnit,
    variant: &CompiledVariant,
    requested_runs: u32,
) -> Result<MeasurementRecord, BenchError> {
    let mut artifact = tempfile::Builder::new().suffix(".json").tempfile()?;
    artifact.write_all(variant.artifact.as_bytes())?;
    artifact.flush()?;

    let export = tempfile::Builder::new().suffix(".json").tempfile()?;

    let dyn_instr_count = instrumented_count(runner, tools, unit, &variant.artifact)?;

    debug!(
        "timing {} [{}] (warmup {WARMUP_RUNS}, {MIN_RUNS}..{} runs)",
        unit.name,
        variant.config.name,
        u64::from(requested_runs) * 2
    );

    run_timer(
        runner,
        tools,
        unit,
        &variant.config.name,
        artifact.path(),
        export.path(),
        requested_runs,
    )?;

    let result = read_export(export.path()).map_err(|cause| BenchError::TimingTool {
        program: unit.name.clone(),
        config: variant.config.name.clone(),
        cause,
    })?;

    let metrics =
        StabilityMetrics::from_summary(result.mean, result.stddev, result.min, result.max, result.median);

    if let Some(cv) = metrics.cv {
        if cv > CV_POOR {
            warn!(
                "high variance for {} [{}]: CV={cv:.3}",
                unit.name, variant.config.name
            );
        }
    }

    Ok(MeasurementRecord {
        run_name: variant.config.name.clone(),
        flags: variant.config.flags.clone(),
        runs: requested_runs,
        dyn_instr_count,
        avg_time: metrics.mean,
        std_dev: metrics.stddev,
        min_time: metrics.min,
        max_time: metrics.max,
        median_time: metrics.median,
        coefficient_of_variation: metrics.cv,
        stability_rating: metrics.rating,
        times: result.times,
    })
}

/// One instrumented interpreter run; the artifact goes in on stdin and the
/// diagnostic stream ends in `...: <count>`.
fn instrumented_count(
    runner: &dyn ProcessRunner,
    tools: &Tools,
    unit: &BenchmarkUnit,
    artifact: &str,
) -> Result<u64, BenchError> {
    let mut args = vec!["-p".to_string()];
    args.extend(unit.arguments.iter().cloned());

    let out = runner.run(&tools.interpreter, &args, Some(artifact))?;
    if !out.success() {
        return Err(BenchError::InstrumentationParse(out.stderr.trim().to_string()));
    }
    parse_dyn_count(&out.stderr)
}

/// Parse the trailing integer after the final `:` of the diagnostic stream.
fn parse_dyn_count(diag: &str) -> Result<u64, BenchError> {
    let trimmed = diag.trim();
    trimmed
        .rsplit(':')
        .next()
        .and_then(|tail| tail.trim().parse().ok())
        .ok_or_else(|| BenchError::InstrumentationParse(trimmed.to_string()))
}

/// Invoke the timing tool with the fixed statistical protocol.
fn run_timer(
    runner: &dyn ProcessRunner,
    tools: &Tools,
    unit: &BenchmarkUnit,
    config_name: &str,
    artifact_path: &Path,
    export_path: &Path,
    requested_runs: u32,
) -> Result<(), BenchError> {
    let command = if unit.arguments.is_empty() {
        format!("{} < {}", tools.interpreter, artifact_path.display())
    } else {
        format!(
            "{} {} < {}",
            tools.interpreter,
            unit.arguments.join(" "),
            artifact_path.display()
        )
    };

    let args: Vec<String> = vec![
        "--show-output".to_string(),
        "--warmup".to_string(),
        WARMUP_RUNS.to_string(),
        "--min-runs".to_string(),
        MIN_RUNS.to_string(),
        "--max-runs".to_string(),
        (u64::from(requested_runs) * 2).to_string(),
        "--export-json".to_string(),
        export_path.display().to_string(),
        "--command-name".to_string(),
        config_name.to_string(),
        command,
    ];

    let timing_error = |cause: String| BenchError::TimingTool {
        program: unit.name.to_string(),
        config: config_name.to_string(),
        cause,
    };

    let out = runner
        .run(&tools.timer, &args, None)
        .map_err(|e| timing_error(e.to_string()))?;

    if !out.success() {
        return Err(timing_error(out.stderr.trim().to_string()));
    }
    Ok(())
}

fn read_export(path: &Path) -> Result<TimerResult, String> {
    let raw = fs::read_to_string(path).map_err(|e| format!("export unreadable: {e}"))?;
    let export: TimerExport =
        serde_json::from_str(&raw).map_err(|e| format!("bad export json: {e}"))?;
    export
        .results
        .into_iter()
        .next()
        .ok_or_else(|| "export contains no results".to_string())
}
