//! Component commands for the vodka CLI.
//!
//! Components are redistributable add-ons (DLL packages and the like).
//! `install` unpacks one under `components/` and, given `--prefix`, copies
//! its files into the prefix and registers its DLL overrides.
//!
//! ## Usage
//!
//! ```bash
//! vodka component list --filter d3d
//! vodka component install d3dx9 --prefix ~/.wine
//! vodka component refresh
//! vodka component uninstall d3dx9
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use super::list::{self, ListArgs, Listing};
use super::with_lookup_hint;
use crate::manager::Manager;

/// Arguments for the component command.
#[derive(Args)]
pub struct ComponentArgs {
    #[command(subcommand)]
    pub command: ComponentCommand,
}

/// Available component subcommands.
#[derive(Subcommand)]
pub enum ComponentCommand {
    /// Download a component and optionally apply it to a prefix.
    Install(ComponentInstallArgs),

    /// Browse the components catalog.
    List(ListArgs),

    /// Re-fetch the components catalog.
    Refresh,

    /// Remove an unpacked component. Prefixes it was applied to are left alone.
    Uninstall(ComponentUninstallArgs),
}

/// Arguments for `component install`.
#[derive(Args)]
pub struct ComponentInstallArgs {
    /// Component to install (case-insensitive).
    pub name: String,

    /// Wine prefix to apply the component to.
    #[clap(long)]
    pub prefix: Option<PathBuf>,
}

/// Arguments for `component uninstall`.
#[derive(Args)]
pub struct ComponentUninstallArgs {
    /// Component to remove.
    pub name: String,
}

/// Executes a component subcommand.
///
/// # Errors
///
/// Returns an error if the catalog cannot be loaded, the component is not
/// in the catalog, or fetching or applying it fails.
pub fn execute(args: &ComponentArgs) -> Result<()> {
    match &args.command {
        ComponentCommand::Install(args) => install(args),
        ComponentCommand::List(args) => list_components(args),
        ComponentCommand::Refresh => refresh(),
        ComponentCommand::Uninstall(args) => uninstall(args),
    }
}

fn install(args: &ComponentInstallArgs) -> Result<()> {
    let mut manager = Manager::open(true)?;
    let catalog = manager
        .components_catalog()
        .context("Failed to load the components catalog")?;

    let name = catalog
        .get(&args.name)
        .map_or_else(|| args.name.clone(), |entry| entry.name.clone());

    println!("Installing component {name}...");
    let outcome = manager
        .install_component(&catalog, &name, args.prefix.as_deref())
        .map_err(|e| with_lookup_hint(e, "component "))?;

    if outcome.fetched {
        println!("Component {name} downloaded.");
    } else {
        println!("Component {name} is already downloaded.");
    }

    match (&outcome.applied, &args.prefix) {
        (Some(report), Some(prefix)) => {
            println!("Applied {name} to {}:", prefix.display());
            println!("  {} file(s) copied", report.copied.len());
            println!("  {} DLL override(s) registered", report.overrides);
            if report.environment > 0 {
                println!("  {} environment variable(s) set", report.environment);
            }
        }
        _ => println!("Pass --prefix <path> to apply it to a Wine prefix."),
    }

    Ok(())
}

fn list_components(args: &ListArgs) -> Result<()> {
    let manager = Manager::open(!args.json)?;
    let catalog = manager
        .components_catalog()
        .context("Failed to load the components catalog")?;
    let rows = manager.list_components(&catalog);

    list::show(
        rows,
        args,
        &Listing {
            heading: "Components",
            command: "component list",
            show_default: false,
        },
    )
}

fn refresh() -> Result<()> {
    let manager = Manager::open(true)?;
    println!("Refreshing components catalog...");
    let catalog = manager
        .refresh_components()
        .context("Failed to refresh the components catalog")?;
    if catalog.is_empty() {
        tracing::warn!("The fetched components catalog lists no components");
    }
    println!("Components catalog updated: {} components available.", catalog.len());
    Ok(())
}

fn uninstall(args: &ComponentUninstallArgs) -> Result<()> {
    let mut manager = Manager::open(false)?;
    manager.uninstall_component(&args.name)?;
    println!("Component {} removed.", args.name);
    Ok(())
}
