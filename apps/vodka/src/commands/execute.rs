//! Execute command for the vodka CLI.
//!
//! Runs a program with an installed Wine version's `bin/` directory at the
//! front of `PATH`.
//!
//! ## Usage
//!
//! ```bash
//! vodka execute wine notepad                  # Default version
//! vodka execute staging-7.0 wine notepad      # Explicit version
//! vodka execute --prefix ~/games wine setup.exe
//! ```
//!
//! The first argument names the version only when at least two arguments
//! are given and it matches an installed version.

use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Args;

use crate::errors::VodkaError;
use crate::manager::{Manager, exec};

/// Arguments for the execute command.
#[derive(Args)]
pub struct ExecuteArgs {
    /// Wine prefix exported to the program as `WINEPREFIX`.
    #[clap(long)]
    pub prefix: Option<PathBuf>,

    /// Optional installed version followed by the command to run.
    #[clap(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

/// Executes the execute command.
///
/// ## Exit Codes
///
/// - Returns `Ok(())` if the program exits with code 0
/// - Returns `Err(VodkaError::ProcessExitCode)` with the program's code otherwise
///
/// # Errors
///
/// Returns an error if no version is given and no default is set, or if the
/// program cannot be found or started.
pub fn execute(args: &ExecuteArgs) -> Result<()> {
    let manager = Manager::open(false)?;
    let (version, argv) = select_version(&manager, &args.command)?;

    let mut extra_env: Vec<(String, OsString)> = Vec::new();
    if let Some(prefix) = &args.prefix {
        extra_env.push(("WINEPREFIX".to_string(), prefix.clone().into_os_string()));
    }

    let version_dir = manager.versions().path_of(&version);
    tracing::debug!("Executing {:?} with {version}", argv);
    let output = exec::run(&version_dir, argv, &extra_env)?;

    std::io::stdout().write_all(&output.stdout)?;
    std::io::stderr().write_all(&output.stderr)?;

    if !output.status.success() {
        return Err(VodkaError::process_exit_code(output.code()).into());
    }
    Ok(())
}

fn select_version<'a>(manager: &Manager, command: &'a [String]) -> Result<(String, &'a [String])> {
    if let [first, rest @ ..] = command
        && !rest.is_empty()
        && manager.is_installed(first)
    {
        return Ok((first.clone(), rest));
    }

    match manager.default_version() {
        Some(version) => Ok((version, command)),
        None => bail!(
            "{}\n\
             Run 'vodka default <version>' or name an installed version first.",
            VodkaError::NoDefault
        ),
    }
}
