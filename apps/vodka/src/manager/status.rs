//! Derived views over catalogs and installed state.

use serde::Serialize;

use super::catalog::{Catalog, CatalogEntry};
use super::installer::Manager;

/// One catalog entry with its install state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryStatus {
    pub name: String,
    pub title: String,
    pub category: String,
    pub category_name: String,
    pub installed: bool,
    pub is_default: bool,
}

impl EntryStatus {
    fn new(entry: &CatalogEntry, installed: bool, is_default: bool) -> Self {
        Self {
            name: entry.name.clone(),
            title: entry.title.clone(),
            category: entry.category.clone(),
            category_name: entry.category_name.clone(),
            installed,
            is_default,
        }
    }
}

impl Manager {
    /// Every version in `catalog` with installed and default flags.
    #[must_use]
    pub fn list_versions(&self, catalog: &Catalog) -> Vec<EntryStatus> {
        let default = self.default_version();
        catalog
            .entries()
            .iter()
            .map(|entry| {
                EntryStatus::new(
                    entry,
                    self.is_installed(&entry.name),
                    default.as_deref() == Some(entry.name.as_str()),
                )
            })
            .collect()
    }

    /// Every component in `catalog` with its installed flag.
    #[must_use]
    pub fn list_components(&self, catalog: &Catalog) -> Vec<EntryStatus> {
        catalog
            .entries()
            .iter()
            .map(|entry| EntryStatus::new(entry, self.components().contains(&entry.name), false))
            .collect()
    }
}
