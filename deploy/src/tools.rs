use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::ExitStatus;
use std::process::Stdio;

use log::trace;

/// Captured result of an external tool invocation.
#[derive(Debug)]
pub struct ToolOutput {
    /// Exit status.
    pub status: ExitStatus,
    /// Captured standard output (empty in verbose mode).
    pub stdout: String,
    /// Captured standard error (empty in verbose mode).
    pub stderr: String,
}

impl ToolOutput {
    /// Whether the tool exited with status zero.
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// Locate an external tool on `PATH`.
///
/// Handles the platform conventions (executable extensions on Windows).
pub fn find_tool(name: &str) -> Option<PathBuf> {
    which::which(name).ok()
}

/// Run an external tool and wait for it.
///
/// With `verbose` the child inherits stdio; otherwise its output is
/// captured and returned alongside the exit status.
pub fn run_tool<P, I, S>(program: P, args: I, verbose: bool) -> Result<ToolOutput, std::io::Error>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = S>,
    S: AsRef<std::ffi::OsStr>,
{
    let mut command = Command::new(program.as_ref());
    command.args(args).stdin(Stdio::null());
    trace!("Running {command:?}");
    if verbose {
        let status = command.status()?;
        Ok(ToolOutput {
            status,
            stdout: String::new(),
            stderr: String::new(),
        })
    } else {
        let output = command.output()?;
        Ok(ToolOutput {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Run an external tool in a working directory, capturing its output.
pub fn run_tool_in<P, I, S>(
    dir: &Path,
    program: P,
    args: I,
) -> Result<ToolOutput, std::io::Error>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = S>,
    S: AsRef<std::ffi::OsStr>,
{
    let output = Command::new(program.as_ref())
        .args(args)
        .current_dir(dir)
        .stdin(Stdio::null())
        .output()?;
    Ok(ToolOutput {
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Worker count for per-file parallel phases: the host CPU count, floor 4.
pub fn worker_threads() -> usize {
    std::thread::available_parallelism()
        .map(usize::from)
        .unwrap_or(1)
        .max(4)
}
