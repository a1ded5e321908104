//! Variant compilation through the external Bril optimizer.

use log::debug;

use crate::corpus::BenchmarkUnit;
use crate::error::BenchError;
use crate::exec::ProcessRunner;

/// A named set of optimization flags applied uniformly to one program for one
/// measurement unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptConfig {
    pub name: String,
    pub flags: Vec<String>,
}

impl OptConfig {
    pub fn new(name: &str, flags: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            flags: flags.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// The configuration table evaluated by default, from the unoptimized
/// pass-through up to the full pipeline.
pub fn default_configs() -> Vec<OptConfig> {
    vec![
        OptConfig::new("original", &["-s"]),
        OptConfig::new("ssa", &[]),
        OptConfig::new("loop", &["--loops"]),
        OptConfig::new("lvn & dce", &["--lvn", "--dce"]),
        OptConfig::new("all", &["--lvn", "--dce", "--loops"]),
    ]
}

/// Output of compiling one unit under one configuration: the optimizer's
/// stdout, owned by the producing job until measurement consumes it.
#[derive(Debug, Clone)]
pub struct CompiledVariant {
    pub config: OptConfig,
    pub artifact: String,
}

/// Build the optimizer itself before any jobs start. A failure here aborts
/// the whole run; nothing has been scheduled yet.
pub fn ensure_toolchain(
    runner: &dyn ProcessRunner,
    build_cmd: &[String],
) -> Result<(), BenchError> {
    let (program, args) = build_cmd
        .split_first()
        .ok_or_else(|| BenchError::ToolchainBuild("empty build command".to_string()))?;

    let out = runner
        .run(program, args, None)
        .map_err(|e| BenchError::ToolchainBuild(e.to_string()))?;

    if !out.success() {
        return Err(BenchError::ToolchainBuild(out.stderr.trim().to_string()));
    }
    Ok(())
}

/// Compile one (program, configuration) pair. Failure is scoped to this pair:
/// the caller records it and moves on to the next configuration.
pub fn compile(
    runner: &dyn ProcessRunner,
    compiler: &str,
    unit: &BenchmarkUnit,
    config: &OptConfig,
) -> Result<CompiledVariant, BenchError> {
    let mut args: Vec<String> = vec!["--log-level=off".to_string()];
    args.extend(config.flags.iter().cloned());
    args.push(unit.path.display().to_string());

    debug!("compile {} [{}]", unit.name, config.name);

    let out = runner
        .run(compiler, &args, None)
        .map_err(|e| BenchError::Compile {
            program: unit.name.clone(),
            config: config.name.clone(),
            cause: e.to_string(),
        })?;

    if !out.success() {
        return Err(BenchError::Compile {
            program: unit.name.clone(),
            config: config.name.clone(),
            cause: out.stderr.trim().to_string(),
        });
    }

    Ok(CompiledVariant {
        config: config.clone(),
        artifact: out.stdout,
    })
}
