//! Refresh command for the vodka CLI.
//!
//! Re-fetches the versions catalog from the configured URL
//! (`versions_url` in `config.toml` or `VODKA_VERSIONS_URL`).

use anyhow::{Context, Result};

use crate::manager::Manager;

/// Executes the refresh command.
///
/// # Errors
///
/// Returns an error if the catalog cannot be fetched or is corrupt. A
/// corrupt download leaves the previous catalog in place.
pub fn execute() -> Result<()> {
    let manager = Manager::open(true)?;
    println!("Refreshing versions catalog...");
    let catalog = manager
        .refresh_versions()
        .context("Failed to refresh the versions catalog")?;
    if catalog.is_empty() {
        tracing::warn!("The fetched versions catalog lists no versions");
    }
    println!("Versions catalog updated: {} versions available.", catalog.len());
    Ok(())
}
