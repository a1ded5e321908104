use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::stats::StabilityRating;

/// One (program, configuration) outcome.
///
/// Field names match the report format the downstream plotting scripts
/// consume, so the JSON layout is part of the external contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    /// Configuration name.
    pub run_name: String,
    /// Flag tokens the variant was compiled with.
    pub flags: Vec<String>,
    /// Requested timed runs; the timing tool may take up to twice this many.
    pub runs: u32,
    /// Instructions executed at runtime, from the separate instrumented run.
    /// Measured independently of the timing samples, never derived from them.
    pub dyn_instr_count: u64,
    pub avg_time: f64,
    pub std_dev: f64,
    pub min_time: f64,
    pub max_time: f64,
    pub median_time: f64,
    /// std_dev / avg_time; absent when the mean is not positive.
    pub coefficient_of_variation: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stability_rating: Option<StabilityRating>,
    /// Raw samples, kept for downstream inspection.
    pub times: Vec<f64>,
}

/// Terminal artifact of a run: per-program records in configuration
/// evaluation order, plus job accounting. Written once, never mutated.
///
/// The mapping is partial: a program whose jobs failed carries fewer records
/// than the configuration table, and the failures show up in `skipped`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub programs: BTreeMap<String, Vec<MeasurementRecord>>,
    pub completed: usize,
    pub skipped: usize,
}
