//! Default command for the vodka CLI.
//!
//! Shows or changes the version the `default` pointer names.
//!
//! ## Usage
//!
//! ```bash
//! vodka default               # Show the current default
//! vodka default stable-9.0    # Make stable-9.0 the default
//! ```

use anyhow::{Result, bail};
use clap::Args;

use super::local_version_entry;
use crate::manager::Manager;

/// Arguments for the default command.
#[derive(Args)]
pub struct DefaultArgs {
    /// Installed version to make the default. Prints the current default when omitted.
    pub name: Option<String>,
}

/// Executes the default command.
///
/// Names are matched case-insensitively through the local versions catalog
/// when one is present. The catalog is never fetched here.
///
/// # Errors
///
/// Returns an error if the version is not installed or the pointer cannot
/// be replaced.
pub fn execute(args: &DefaultArgs) -> Result<()> {
    let manager = Manager::open(false)?;

    let Some(requested) = &args.name else {
        match manager.default_version() {
            Some(name) => println!("{name}"),
            None => {
                println!("No default version set.");
                println!("Run 'vodka default <version>' to set one.");
            }
        }
        return Ok(());
    };

    let name = if manager.is_installed(requested) {
        requested.clone()
    } else {
        match local_version_entry(&manager, requested) {
            Some(entry) if manager.is_installed(&entry.name) => entry.name.clone(),
            Some(entry) => bail!(
                "{} is not installed.\n\
                 Run 'vodka install {}' to install it first.",
                entry.name,
                entry.name
            ),
            None => bail!(
                "{requested} is not installed.\n\
                 Run 'vodka list --filter {requested}' to search the catalog."
            ),
        }
    };

    if manager.is_default(&name) {
        println!("{name} is already the default.");
        return Ok(());
    }

    manager.set_default(&name)?;
    println!("Default version set to {name}.");

    Ok(())
}
