//! Narrow process-execution capability.
//!
//! Every external tool the pipeline touches (the optimizer, the interpreter,
//! the timing tool, the toolchain build) is reached through [`ProcessRunner`]:
//! program name and argv in, captured stdout/stderr/exit code out. Tests
//! substitute a closure-backed mock here instead of touching the process
//! table.

use std::io::{self, Write};
use std::process::{Command, Stdio};

/// Captured outcome of one external process invocation.
#[derive(Debug, Clone)]
pub struct ExecOutput {
    /// Exit code, if the process terminated normally.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Seam between the pipeline and the outside world.
pub trait ProcessRunner: Send + Sync {
    /// Run `program` with `args`, optionally feeding `stdin`, and wait for it.
    ///
    /// An `Err` means the process could not be launched or its pipes broke;
    /// a non-zero exit comes back as a normal [`ExecOutput`].
    fn run(&self, program: &str, args: &[String], stdin: Option<&str>) -> io::Result<ExecOutput>;
}

/// Runner backed by `std::process::Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String], stdin: Option<&str>) -> io::Result<ExecOutput> {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn()?;
        if let Some(input) = stdin {
            // Take the handle so the pipe closes before we wait on the child.
            let mut pipe = child
                .stdin
                .take()
                .ok_or_else(|| io::Error::other("child stdin unavailable"))?;
            pipe.write_all(input.as_bytes())?;
        }

        let out = child.wait_with_output()?;
        Ok(ExecOutput {
            status: out.status.code(),
            stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
        })
    }
}

/// Closure-backed runner for tests in this crate.
#[cfg(test)]
pub struct FnRunner<F>(pub F);

#[cfg(test)]
impl<F> ProcessRunner for FnRunner<F>
where
    F: Fn(&str, &[String], Option<&str>) -> io::Result<ExecOutput> + Send + Sync,
{
    fn run(&self, program: &str, args: &[String], stdin: Option<&str>) -> io::Result<ExecOutput> {
        (self.0)(program, args, stdin)
    }
}

#[cfg(test)]
pub fn exec_ok(stdout: &str, stderr: &str) -> ExecOutput {
    ExecOutput {
        status: Some(0),
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
    }
}

#[cfg(test)]
pub fn exec_fail(stderr: &str) -> ExecOutput {
    ExecOutput {
        status: Some(1),
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}
