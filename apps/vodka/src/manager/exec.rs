//! Running programs from an installed version.
//!
//! The child sees `<version>/bin` at the front of `PATH`, so `wine`,
//! `wineserver` and `winetricks`-style helpers resolve to the chosen build.
//! `argv[0]` is looked up the same way: the version's `bin/` first, then
//! the inherited `PATH`.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use super::Result;
use crate::errors::{IoContext, VodkaError};

/// Captured result of a child process.
#[derive(Debug)]
pub struct ExecOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub status: ExitStatus,
}

impl ExecOutput {
    /// Exit code, with signal deaths mapped to 1.
    #[must_use]
    pub fn code(&self) -> i32 {
        self.status.code().unwrap_or(1)
    }
}

/// `PATH` with `<version>/bin` prepended.
///
/// # Errors
///
/// Returns an error if the version path contains the platform's path separator.
pub fn search_path(version_dir: &Path) -> Result<OsString> {
    let bin = version_dir.join("bin");
    let inherited = std::env::var_os("PATH").unwrap_or_default();
    let dirs = std::iter::once(bin).chain(std::env::split_paths(&inherited));
    std::env::join_paths(dirs).map_err(|e| {
        VodkaError::io(
            format!("Cannot add {} to PATH", version_dir.display()),
            std::io::Error::new(std::io::ErrorKind::InvalidInput, e),
        )
    })
}

/// Resolves `program` against `path`. Names containing a separator are used as given.
///
/// # Errors
///
/// Returns an I/O error of kind `NotFound` if nothing matches.
pub fn resolve_program(program: &str, path: &OsStr) -> Result<PathBuf> {
    if Path::new(program).components().count() > 1 {
        return Ok(PathBuf::from(program));
    }
    let cwd = std::env::current_dir().io_context(|| "Failed to read current directory")?;
    which::which_in(program, Some(path), cwd).map_err(|e| {
        VodkaError::io(
            format!("Program '{program}' not found in the version's bin directory or PATH"),
            std::io::Error::new(std::io::ErrorKind::NotFound, e),
        )
    })
}

/// Runs `argv` with the version's environment plus `extra_env`, capturing output.
///
/// # Errors
///
/// Returns an error if `argv` is empty, the program cannot be resolved, or
/// the process cannot be spawned. A non-zero exit is not an error here.
pub fn run(version_dir: &Path, argv: &[String], extra_env: &[(String, OsString)]) -> Result<ExecOutput> {
    let Some((program, args)) = argv.split_first() else {
        return Err(VodkaError::io(
            "No command given",
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty argv"),
        ));
    };

    let path = search_path(version_dir)?;
    let resolved = resolve_program(program, &path)?;
    tracing::debug!("Running {} {:?}", resolved.display(), args);

    let mut command = Command::new(&resolved);
    command.args(args).env("PATH", &path);
    for (key, value) in extra_env {
        command.env(key, value);
    }

    let output = command
        .output()
        .io_context(|| format!("Failed to execute {}", resolved.display()))?;

    tracing::debug!("{} exited with {}", resolved.display(), output.status);
    Ok(ExecOutput {
        stdout: output.stdout,
        stderr: output.stderr,
        status: output.status,
    })
}
