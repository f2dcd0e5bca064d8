//! The `default` pointer naming the active version.
//!
//! The pointer is a symlink at `root/default`. It either does not exist or
//! resolves to an installed version directory. Replacement goes through a
//! temporary link renamed over the old one, so an interrupted switch leaves
//! either the previous default or the new one in place, never a dangling
//! pointer.

use std::path::{Path, PathBuf};

use super::Result;
use super::index::InstallIndex;
use super::paths::VodkaPaths;
use crate::errors::{IoContext, VodkaError};

const TEMP_LINK: &str = ".default.tmp";

/// Handle on the default pointer of one managed root.
#[derive(Debug, Clone)]
pub struct DefaultPointer {
    link: PathBuf,
    temp: PathBuf,
}

impl DefaultPointer {
    #[must_use]
    pub fn new(paths: &VodkaPaths) -> Self {
        Self {
            link: paths.default_link(),
            temp: paths.root.join(TEMP_LINK),
        }
    }

    /// Returns `true` iff the pointer exists, `name` is installed, and both
    /// resolve to the same directory.
    #[must_use]
    pub fn is_default(&self, index: &InstallIndex, name: &str) -> bool {
        if !index.contains(name) {
            return false;
        }
        match (
            std::fs::canonicalize(&self.link),
            std::fs::canonicalize(index.path_of(name)),
        ) {
            (Ok(current), Ok(candidate)) => current == candidate,
            _ => false,
        }
    }

    /// Name of the current default, if the pointer resolves to an installed entry.
    #[must_use]
    pub fn current(&self, index: &InstallIndex) -> Option<String> {
        let target = std::fs::read_link(&self.link).ok()?;
        let name = target.file_name()?.to_str()?.to_string();
        self.is_default(index, &name).then_some(name)
    }

    /// Points the default at `name`.
    ///
    /// Calling this with the current default is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`VodkaError::NotInstalled`] if `name` is not installed, or an
    /// I/O error if the link cannot be replaced.
    pub fn set(&self, index: &InstallIndex, name: &str) -> Result<()> {
        if !index.contains(name) {
            return Err(VodkaError::not_installed(name));
        }
        if self.is_default(index, name) {
            tracing::debug!("{name} is already the default");
            return Ok(());
        }

        let target = index.path_of(name);
        remove_link(&self.temp)?;
        create_dir_link(&target, &self.temp)?;
        std::fs::rename(&self.temp, &self.link).io_context(|| {
            format!(
                "Failed to move {} to {}",
                self.temp.display(),
                self.link.display()
            )
        })?;

        tracing::info!("Default version set to {name}");
        Ok(())
    }

    /// Removes the pointer. Removing an absent pointer succeeds.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the link exists but cannot be removed.
    pub fn clear(&self) -> Result<()> {
        remove_link(&self.link)?;
        tracing::info!("Default version cleared");
        Ok(())
    }
}

/// Removes a symlink, broken or not.
fn remove_link(path: &Path) -> Result<()> {
    // exists() is false for broken links; symlink_metadata is not.
    if path.symlink_metadata().is_ok() {
        std::fs::remove_file(path)
            .io_context(|| format!("Failed to remove link: {}", path.display()))?;
    }
    Ok(())
}

fn create_dir_link(source: &Path, link: &Path) -> Result<()> {
    #[cfg(unix)]
    let created = std::os::unix::fs::symlink(source, link);

    #[cfg(windows)]
    let created = std::os::windows::fs::symlink_dir(source, link);

    created.io_context(|| {
        format!(
            "Failed to create symlink from {} to {}",
            link.display(),
            source.display()
        )
    })
}
