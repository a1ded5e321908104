use std::fs;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info};

use bril_opt_bench::compile::{self, default_configs};
use bril_opt_bench::corpus;
use bril_opt_bench::error::BenchError;
use bril_opt_bench::exec::SystemRunner;
use bril_opt_bench::scheduler::{self, SuiteConfig};
use bril_opt_bench::Tools;

#[derive(Parser, Debug)]
#[command(name = "bril-opt-bench")]
#[command(about = "Benchmark Bril optimization configurations (JSON report)")]
struct Args {
    /// Directory scanned recursively for `.bril` benchmark programs.
    #[arg(long, default_value = "benchmarks")]
    benchmarks: PathBuf,

    /// Requested timed runs per variant; the timing tool may take up to 2x.
    #[arg(long, default_value_t = 500)]
    runs: u32,

    /// Worker pool size shared by the compile and measure phases.
    ///
    /// Kept small by default so measurement jobs do not contend for cores.
    #[arg(long, default_value_t = 4)]
    workers: usize,

    /// Bril optimizer binary.
    #[arg(long, default_value = "./target/release/rust_bril")]
    compiler: String,

    /// Bril interpreter binary.
    #[arg(long, default_value = "brilirs")]
    interpreter: String,

    /// Statistical timing tool.
    #[arg(long, default_value = "hyperfine")]
    timer: String,

    /// Toolchain build command run before any jobs start; a failure aborts
    /// the whole run. Pass an empty string to skip the preflight build.
    #[arg(long, default_value = "cargo build --release")]
    build: String,

    /// Where to write the JSON report. If omitted, prints to stdout.
    #[arg(long)]
    out: Option<PathBuf>,
}

fn run(args: &Args) -> Result<(), BenchError> {
    let runner = SystemRunner;
    let tools = Tools {
        compiler: args.compiler.clone(),
        interpreter: args.interpreter.clone(),
        timer: args.timer.clone(),
    };

    if !args.build.trim().is_empty() {
        let build_cmd: Vec<String> = args.build.split_whitespace().map(str::to_string).collect();
        compile::ensure_toolchain(&runner, &build_cmd)?;
    }

    let units = corpus::discover(&args.benchmarks)?;
    info!(
        "found {} benchmark programs under {}",
        units.len(),
        args.benchmarks.display()
    );

    let suite = SuiteConfig {
        workers: args.workers,
        runs: args.runs,
    };
    let report = scheduler::run_suite(&runner, &tools, &units, &default_configs(), &suite)?;

    info!(
        "{} measurements completed, {} skipped",
        report.completed, report.skipped
    );

    let json = serde_json::to_string_pretty(&report).map_err(|e| BenchError::ReportWrite {
        path: "<serialize>".to_string(),
        source: io::Error::other(e),
    })?;

    match &args.out {
        Some(path) => fs::write(path, json).map_err(|e| BenchError::ReportWrite {
            path: path.display().to_string(),
            source: e,
        })?,
        None => println!("{json}"),
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
