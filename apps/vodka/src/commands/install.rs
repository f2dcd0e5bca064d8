//! Install command for the vodka CLI.
//!
//! Downloads and unpacks a Wine version from the versions catalog. The first
//! version installed becomes the default.
//!
//! ## Usage
//!
//! ```bash
//! vodka install stable-9.0
//! ```

use anyhow::{Context, Result};
use clap::Args;

use super::with_lookup_hint;
use crate::manager::{DefaultAssignment, InstallOutcome, Manager};

/// Arguments for the install command.
#[derive(Args)]
pub struct InstallArgs {
    /// Version to install, as listed by `vodka list` (case-insensitive).
    pub name: String,
}

/// Executes the install command.
///
/// # Errors
///
/// Returns an error if:
/// - The versions catalog cannot be loaded
/// - The name is not in the catalog
/// - Download, checksum verification or unpacking fails
pub fn execute(args: &InstallArgs) -> Result<()> {
    let mut manager = Manager::open(true)?;
    let catalog = manager
        .versions_catalog()
        .context("Failed to load the versions catalog")?;

    let name = catalog
        .get(&args.name)
        .map_or_else(|| args.name.clone(), |entry| entry.name.clone());

    println!("Installing {name}...");
    let outcome = manager
        .install_version(&catalog, &name)
        .map_err(|e| with_lookup_hint(e, ""))?;

    match outcome {
        InstallOutcome::AlreadyInstalled => {
            println!("{name} is already installed.");
        }
        InstallOutcome::Installed { default } => {
            println!("{name} installed successfully.");
            match default {
                DefaultAssignment::Assigned => println!("{name} is now the default version."),
                DefaultAssignment::Skipped => {
                    println!("Run 'vodka default {name}' to make it the default version.");
                }
                DefaultAssignment::Failed(e) => {
                    eprintln!("Warning: {name} is installed but could not be made the default: {e}");
                    eprintln!("Run 'vodka default {name}' to try again.");
                }
            }
        }
    }

    Ok(())
}
