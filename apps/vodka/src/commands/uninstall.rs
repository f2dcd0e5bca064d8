//! Uninstall command for the vodka CLI.
//!
//! Removes an installed Wine version. Removing the default moves the default
//! to the highest-sorted remaining version.
//!
//! ## Usage
//!
//! ```bash
//! vodka uninstall staging-7.0
//! ```

use anyhow::Result;
use clap::Args;

use super::local_version_entry;
use crate::manager::Manager;

/// Arguments for the uninstall command.
#[derive(Args)]
pub struct UninstallArgs {
    /// Installed version to remove.
    pub name: String,
}

/// Executes the uninstall command.
///
/// An installed directory name is used as given; otherwise the name is
/// matched case-insensitively through the local versions catalog.
///
/// # Errors
///
/// Returns an error if the version is not installed or its directory cannot
/// be removed.
pub fn execute(args: &UninstallArgs) -> Result<()> {
    let mut manager = Manager::open(false)?;
    let name = if manager.is_installed(&args.name) {
        args.name.clone()
    } else {
        local_version_entry(&manager, &args.name).map_or_else(|| args.name.clone(), |e| e.name)
    };

    println!("Uninstalling {name}...");
    let outcome = manager.uninstall_version(&name)?;
    println!("{name} uninstalled.");

    if outcome.was_default {
        match outcome.new_default {
            Some(next) => println!("Default version changed to {next}."),
            None => println!("No versions remaining. Default has been cleared."),
        }
    }

    Ok(())
}
