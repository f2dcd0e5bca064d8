//! Command modules for the vodka CLI.
//!
//! ## Version Commands
//!
//! - [`install`] - Install a Wine version
//! - [`uninstall`] - Remove an installed version
//! - [`default`] - Show or set the default version
//! - [`list`] - Browse the versions catalog
//! - [`refresh`] - Re-fetch the versions catalog
//! - [`execute`] - Run a program with an installed version
//!
//! ## Component Commands
//!
//! - [`component`] - Install, list, refresh and remove components

pub mod component;
pub mod default;
pub mod execute;
pub mod install;
pub mod list;
pub mod refresh;
pub mod uninstall;

use anyhow::anyhow;

use crate::errors::VodkaError;
use crate::manager::{Catalog, CatalogEntry, CatalogKind, Manager};

/// Looks `requested` up in the local versions catalog without fetching it.
///
/// A missing or unreadable catalog counts as a miss.
pub(crate) fn local_version_entry(manager: &Manager, requested: &str) -> Option<CatalogEntry> {
    let catalog = Catalog::load(&manager.paths().versions_catalog(), CatalogKind::Versions).ok()?;
    catalog.get(requested).cloned()
}

/// Attaches search and refresh suggestions to catalog lookup misses.
///
/// `scope` is the command prefix for the catalog in question: `""` for
/// versions, `"component "` for components.
pub(crate) fn with_lookup_hint(err: VodkaError, scope: &str) -> anyhow::Error {
    let VodkaError::EntryNotFound { name, .. } = &err else {
        return err.into();
    };
    anyhow!(
        "{err}\n\
         Run 'vodka {scope}list --filter {name}' to search the catalog, \
         or 'vodka {scope}refresh' to update it."
    )
}
