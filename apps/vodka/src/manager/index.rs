//! In-memory view of what is installed.
//!
//! An entry is installed iff a directory with its name exists under the
//! scanned directory. The index is rehydrated from one directory scan and
//! kept current by the install and uninstall paths, so "installed set" is a
//! single queryable value instead of repeated filesystem checks.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use super::Result;
use super::paths::is_reserved_name;
use crate::errors::IoContext;

/// Installed entries under one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallIndex {
    dir: PathBuf,
    entries: BTreeSet<String>,
}

impl InstallIndex {
    /// Scans `dir` for installed entries.
    ///
    /// Symlinks (the default pointer), plain files (catalogs, config) and
    /// reserved names are skipped. A missing directory yields an empty index.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be read.
    pub fn scan(dir: &Path) -> Result<Self> {
        let mut entries = BTreeSet::new();

        if dir.is_dir() {
            let read_dir = std::fs::read_dir(dir)
                .io_context(|| format!("Failed to read directory: {}", dir.display()))?;
            for entry in read_dir {
                let entry = entry.io_context(|| "Failed to read directory entry")?;
                let file_type = entry
                    .file_type()
                    .io_context(|| format!("Failed to stat {}", entry.path().display()))?;
                if !file_type.is_dir() {
                    continue;
                }
                let Ok(name) = entry.file_name().into_string() else {
                    continue;
                };
                if !is_reserved_name(&name) {
                    entries.insert(name);
                }
            }
        }

        tracing::debug!("Indexed {} entries in {}", entries.len(), dir.display());
        Ok(Self {
            dir: dir.to_path_buf(),
            entries,
        })
    }

    /// Install directory of `name`.
    #[must_use]
    pub fn path_of(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Returns `true` if `name` is installed.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains(name)
    }

    /// Installed names in sorted order.
    #[must_use]
    pub fn entries(&self) -> &BTreeSet<String> {
        &self.entries
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn insert(&mut self, name: &str) {
        self.entries.insert(name.to_string());
    }

    pub(crate) fn remove(&mut self, name: &str) {
        self.entries.remove(name);
    }
}
