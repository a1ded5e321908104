//! Two-phase job scheduling and result aggregation.
//!
//! Phase 1 compiles every (program, configuration) pair across a bounded
//! rayon pool; phase 2 measures the surviving variants on the same pool. The
//! `collect()` between the phases is the barrier: no measurement starts until
//! the whole corpus has compiled, so measurement jobs never compete with
//! compilation for CPU while timing samples are being taken.
//!
//! Jobs share no mutable state. Each owns its variants, temp files and sample
//! buffers; the pool's admission is the only process-wide resource.

use std::collections::BTreeMap;
use std::io;

use log::{info, warn};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;

use crate::compile::{self, CompiledVariant, OptConfig};
use crate::corpus::BenchmarkUnit;
use crate::error::BenchError;
use crate::exec::ProcessRunner;
use crate::measure;
use crate::schema::{BenchmarkReport, MeasurementRecord};
use crate::Tools;

/// Settings for one suite run. The pool size is fixed per run and shared by
/// both phases.
#[derive(Debug, Clone)]
pub struct SuiteConfig {
    pub workers: usize,
    /// Requested timed runs per variant; the timing tool caps at twice this.
    pub runs: u32,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        // Few workers: timing jobs starve each other on a saturated machine.
        Self {
            workers: 4,
            runs: 500,
        }
    }
}

/// Per-program outcome of the compile phase.
struct CompiledUnit<'a> {
    unit: &'a BenchmarkUnit,
    variants: Vec<CompiledVariant>,
    failures: usize,
}

/// Outcomes of all measurement jobs, keyed by program, in configuration
/// evaluation order per program.
pub type JobOutcomes = Vec<(String, Vec<Result<MeasurementRecord, BenchError>>)>;

/// Run the full suite: compile everything, then measure everything.
///
/// Individual job failures are recorded and skipped; only pool construction
/// itself can fail here.
pub fn run_suite(
    runner: &dyn ProcessRunner,
    tools: &Tools,
    units: &[BenchmarkUnit],
    configs: &[OptConfig],
    suite: &SuiteConfig,
) -> Result<BenchmarkReport, BenchError> {
    let pool = ThreadPoolBuilder::new()
        .num_threads(suite.workers)
        .build()
        .map_err(io::Error::other)?;

    info!(
        "compiling {} programs x {} configurations on {} workers",
        units.len(),
        configs.len(),
        suite.workers
    );

    let compiled: Vec<CompiledUnit> = pool.install(|| {
        units
            .par_iter()
            .map(|unit| {
                let mut variants = Vec::with_capacity(configs.len());
                let mut failures = 0;
                for config in configs {
                    match compile::compile(runner, &tools.compiler, unit, config) {
                        Ok(v) => variants.push(v),
                        Err(e) => {
                            warn!("{e}");
                            failures += 1;
                        }
                    }
                }
                CompiledUnit {
                    unit,
                    variants,
                    failures,
                }
            })
            .collect()
    });

    let compile_failures: usize = compiled.iter().map(|c| c.failures).sum();
    info!("compile phase done ({compile_failures} failures); measuring");

    let outcomes: JobOutcomes = pool.install(|| {
        compiled
            .par_iter()
            .map(|cu| {
                let results = cu
                    .variants
                    .iter()
                    .map(|v| measure::measure(runner, tools, cu.unit, v, suite.runs))
                    .collect();
                (cu.unit.name.clone(), results)
            })
            .collect()
    });

    Ok(aggregate(&outcomes, compile_failures))
}

/// Group job outcomes by program, preserving per-program configuration
/// evaluation order. Failed jobs are logged and counted, never included.
///
/// Pure in its input, so aggregating the same outcome set twice yields an
/// identical report.
pub fn aggregate(outcomes: &JobOutcomes, compile_failures: usize) -> BenchmarkReport {
    let mut programs: BTreeMap<String, Vec<MeasurementRecord>> = BTreeMap::new();
    let mut completed = 0;
    let mut skipped = compile_failures;

    for (name, results) in outcomes {
        let records = programs.entry(name.clone()).or_default();
        for result in results {
            match result {
                Ok(record) => {
                    completed += 1;
                    records.push(record.clone());
                }
                Err(e) => {
                    warn!("skipping measurement: {e}");
                    skipped += 1;
                }
            }
        }
    }

    BenchmarkReport {
        programs,
        completed,
        skipped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::default_configs;
    use crate::exec::{exec_fail, exec_ok, FnRunner};
    use crate::stats::StabilityRating;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::thread;
    use std::time::{Duration, Instant};

    fn unit(name: &str, arguments: &[&str]) -> BenchmarkUnit {
        BenchmarkUnit {
            path: PathBuf::from(name),
            name: name.to_string(),
            arguments: arguments.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn write_export(args: &[String], mean: f64, stddev: f64) {
        let at = args.iter().position(|a| a == "--export-json").unwrap();
        let export = serde_json::json!({"results": [{
            "mean": mean, "stddev": stddev, "median": mean,
            "min": mean * 0.9, "max": mean * 1.1,
            "times": [mean, mean, mean],
        }]});
        fs::write(&args[at + 1], export.to_string()).unwrap();
    }

    #[test]
    fn end_to_end_report_with_stub_tools() {
        let units = [unit("fib.bril", &["4", "7"])];
        let configs = [
            OptConfig::new("ssa", &[]),
            OptConfig::new("dce", &["--dce"]),
        ];

        let runner = FnRunner(|program: &str, args: &[String], stdin: Option<&str>| {
            match program {
                "rust_bril" => Ok(exec_ok("{\"functions\":[]}", "")),
                "brilirs" => {
                    assert_eq!(stdin, Some("{\"functions\":[]}"));
                    Ok(exec_ok("", "total_dyn_inst: 4321"))
                }
                "hyperfine" => {
                    // CV 0.04, strictly inside the good band (0.05 exactly
                    // would classify as fair).
                    write_export(args, 0.01, 0.0004);
                    Ok(exec_ok("", ""))
                }
                other => panic!("unexpected program {other}"),
            }
        });

        let tools = Tools {
            compiler: "rust_bril".to_string(),
            ..Tools::default()
        };
        let suite = SuiteConfig {
            workers: 2,
            runs: 100,
        };

        let report = run_suite(&runner, &tools, &units, &configs, &suite).unwrap();

        assert_eq!(report.completed, 2);
        assert_eq!(report.skipped, 0);
        let records = &report.programs["fib.bril"];
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].run_name, "ssa");
        assert_eq!(records[1].run_name, "dce");
        for record in records {
            assert_eq!(record.dyn_instr_count, 4321);
            let cv = record.coefficient_of_variation.unwrap();
            assert!((cv - 0.04).abs() < 1e-12);
            assert_eq!(record.stability_rating, Some(StabilityRating::Good));
        }
    }

    #[test]
    fn no_measurement_starts_before_all_compiles_finish() {
        let units = [
            unit("a.bril", &[]),
            unit("slow.bril", &[]),
            unit("c.bril", &[]),
        ];
        let configs = [OptConfig::new("ssa", &[])];

        let compile_done = Mutex::new(Vec::<Instant>::new());
        let measure_started = Mutex::new(Vec::<Instant>::new());

        let runner = FnRunner(|program: &str, args: &[String], _stdin: Option<&str>| {
            match program {
                "cc" => {
                    if args.iter().any(|a| a.contains("slow.bril")) {
                        thread::sleep(Duration::from_millis(150));
                    }
                    compile_done.lock().unwrap().push(Instant::now());
                    Ok(exec_ok("artifact", ""))
                }
                "brilirs" => {
                    measure_started.lock().unwrap().push(Instant::now());
                    Ok(exec_ok("", "count: 1"))
                }
                "hyperfine" => {
                    write_export(args, 0.01, 0.0001);
                    Ok(exec_ok("", ""))
                }
                other => panic!("unexpected program {other}"),
            }
        });

        let tools = Tools {
            compiler: "cc".to_string(),
            ..Tools::default()
        };
        let suite = SuiteConfig {
            workers: 3,
            runs: 50,
        };

        run_suite(&runner, &tools, &units, &configs, &suite).unwrap();

        let compiles = compile_done.lock().unwrap().clone();
        let measures = measure_started.lock().unwrap().clone();
        assert_eq!(compiles.len(), 3);
        assert_eq!(measures.len(), 3);

        let last_compile = compiles.iter().max().unwrap();
        let first_measure = measures.iter().min().unwrap();
        assert!(
            first_measure >= last_compile,
            "a measurement began before the compile phase finished"
        );
    }

    #[test]
    fn one_failing_configuration_leaves_siblings_intact() {
        let units = [
            unit("a.bril", &[]),
            unit("b.bril", &[]),
            unit("c.bril", &[]),
        ];
        let configs = [
            OptConfig::new("ssa", &[]),
            OptConfig::new("loop", &["--loops"]),
        ];

        let runner = FnRunner(|program: &str, args: &[String], _stdin: Option<&str>| {
            match program {
                "cc" => {
                    let is_b = args.iter().any(|a| a.contains("b.bril"));
                    let is_loop = args.iter().any(|a| a == "--loops");
                    if is_b && is_loop {
                        Ok(exec_fail("loop pass exploded"))
                    } else {
                        Ok(exec_ok("artifact", ""))
                    }
                }
                "brilirs" => Ok(exec_ok("", "count: 7")),
                "hyperfine" => {
                    write_export(args, 0.02, 0.001);
                    Ok(exec_ok("", ""))
                }
                other => panic!("unexpected program {other}"),
            }
        });

        let tools = Tools {
            compiler: "cc".to_string(),
            ..Tools::default()
        };
        let suite = SuiteConfig {
            workers: 2,
            runs: 50,
        };

        let report = run_suite(&runner, &tools, &units, &configs, &suite).unwrap();

        assert_eq!(report.programs["a.bril"].len(), 2);
        assert_eq!(report.programs["b.bril"].len(), 1);
        assert_eq!(report.programs["b.bril"][0].run_name, "ssa");
        assert_eq!(report.programs["c.bril"].len(), 2);
        assert_eq!(report.completed, 5);
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn aggregation_is_idempotent() {
        let record = MeasurementRecord {
            run_name: "ssa".to_string(),
            flags: vec![],
            runs: 100,
            dyn_instr_count: 10,
            avg_time: 0.01,
            std_dev: 0.001,
            min_time: 0.009,
            max_time: 0.011,
            median_time: 0.01,
            coefficient_of_variation: Some(0.1),
            stability_rating: Some(StabilityRating::Fair),
            times: vec![0.01, 0.011],
        };

        let outcomes: JobOutcomes = vec![
            (
                "a.bril".to_string(),
                vec![
                    Ok(record.clone()),
                    Err(BenchError::TimingTool {
                        program: "a.bril".to_string(),
                        config: "loop".to_string(),
                        cause: "boom".to_string(),
                    }),
                ],
            ),
            ("b.bril".to_string(), vec![Ok(record)]),
        ];

        let first = aggregate(&outcomes, 1);
        let second = aggregate(&outcomes, 1);
        assert_eq!(first, second);
        assert_eq!(first.completed, 2);
        assert_eq!(first.skipped, 2);
        assert_eq!(first.programs.len(), 2);
    }

    #[test]
    fn arrival_order_does_not_leak_into_the_report() {
        let record = |name: &str| MeasurementRecord {
            run_name: name.to_string(),
            flags: vec![],
            runs: 1,
            dyn_instr_count: 1,
            avg_time: 0.01,
            std_dev: 0.0,
            min_time: 0.01,
            max_time: 0.01,
            median_time: 0.01,
            coefficient_of_variation: Some(0.0),
            stability_rating: Some(StabilityRating::Good),
            times: vec![],
        };

        // Programs arriving out of submission order still key deterministically.
        let shuffled: JobOutcomes = vec![
            ("z.bril".to_string(), vec![Ok(record("ssa"))]),
            ("a.bril".to_string(), vec![Ok(record("ssa"))]),
        ];
        let report = aggregate(&shuffled, 0);
        let keys: Vec<&String> = report.programs.keys().collect();
        assert_eq!(keys, ["a.bril", "z.bril"]);
    }

    #[test]
    fn suite_over_default_table_counts_every_pair() {
        let units = [unit("x.bril", &[])];
        let runner = FnRunner(|program: &str, args: &[String], _stdin: Option<&str>| {
            match program {
                "cc" => Ok(exec_ok("artifact", "")),
                "brilirs" => Ok(exec_ok("", "count: 2")),
                "hyperfine" => {
                    write_export(args, 0.05, 0.02);
                    Ok(exec_ok("", ""))
                }
                other => panic!("unexpected program {other}"),
            }
        });
        let tools = Tools {
            compiler: "cc".to_string(),
            ..Tools::default()
        };
        let report = run_suite(
            &runner,
            &tools,
            &units,
            &default_configs(),
            &SuiteConfig {
                workers: 1,
                runs: 20,
            },
        )
        .unwrap();

        let records = &report.programs["x.bril"];
        assert_eq!(records.len(), 5);
        // 0.02 / 0.05 = 0.4: every record is rated poor but still reported.
        for r in records {
            assert_eq!(r.stability_rating, Some(StabilityRating::Poor));
        }
    }
}
