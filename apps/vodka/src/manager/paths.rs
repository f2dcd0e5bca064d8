//! Path management for the vodka managed root.
//!
//! The default root directory is `~/.vodka/`, which can be overridden by
//! setting the `VODKA_HOME` environment variable.
//!
//! ## Directory Structure
//!
//! ```text
//! ~/.vodka/                   # Root directory (or VODKA_HOME)
//!   stable-9.0/               # Unpacked version tree
//!   staging-7.0/
//!   default -> stable-9.0/    # Default pointer (symlink)
//!   components/               # Unpacked components
//!     d3dx9/
//!   versions.json             # Versions catalog
//!   components.json           # Components catalog
//!   config.toml               # Optional configuration
//!   .downloads/               # Temporary artifacts
//!   .staging-<name>/          # In-progress unpack (removed on failure)
//! ```
//!
//! Every engine operation takes a `VodkaPaths` value instead of reading the
//! environment itself.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable to override the default root directory.
pub const VODKA_HOME_ENV: &str = "VODKA_HOME";

/// Name of the default pointer inside the root.
pub const DEFAULT_LINK: &str = "default";

/// Name of the components area inside the root.
pub const COMPONENTS_DIR: &str = "components";

const VERSIONS_CATALOG: &str = "versions.json";
const COMPONENTS_CATALOG: &str = "components.json";
const CONFIG_FILE: &str = "config.toml";
const DOWNLOADS_DIR: &str = ".downloads";
const STAGING_PREFIX: &str = ".staging-";

/// Manages paths inside the vodka root.
#[derive(Debug, Clone)]
pub struct VodkaPaths {
    /// Root directory (`~/.vodka` or `VODKA_HOME`).
    pub root: PathBuf,
    /// Directory holding unpacked components.
    pub components: PathBuf,
    /// Directory for temporary downloads.
    pub downloads: PathBuf,
}

impl VodkaPaths {
    /// Creates a new `VodkaPaths` instance.
    ///
    /// The root directory is determined by:
    /// 1. The `VODKA_HOME` environment variable if set and non-empty
    /// 2. `~/.vodka` in the user's home directory
    ///
    /// A relative `VODKA_HOME` is resolved against the working directory, so
    /// symlinks created under the root never depend on where they live.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined or the
    /// root cannot be made absolute.
    pub fn new() -> Result<Self> {
        let root = match std::env::var(VODKA_HOME_ENV) {
            Ok(home) if !home.trim().is_empty() => PathBuf::from(home),
            _ => dirs::home_dir()
                .context("Cannot determine home directory. Set VODKA_HOME environment variable.")?
                .join(".vodka"),
        };
        let root = std::path::absolute(&root)
            .with_context(|| format!("Cannot resolve root directory: {}", root.display()))?;

        Ok(Self::with_root(root))
    }

    /// Creates a new `VodkaPaths` instance with a specific root directory.
    #[must_use = "returns new paths instance without side effects"]
    pub fn with_root(root: PathBuf) -> Self {
        Self {
            components: root.join(COMPONENTS_DIR),
            downloads: root.join(DOWNLOADS_DIR),
            root,
        }
    }

    /// Replaces the downloads directory (from `config.toml`).
    #[must_use]
    pub fn with_downloads(mut self, downloads: PathBuf) -> Self {
        self.downloads = downloads;
        self
    }

    #[cfg(test)]
    pub fn version_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    #[cfg(test)]
    pub fn component_dir(&self, name: &str) -> PathBuf {
        self.components.join(name)
    }

    /// Returns the staging directory an archive is unpacked into before it is moved in place.
    #[must_use]
    pub fn staging_dir(parent: &Path, name: &str) -> PathBuf {
        parent.join(format!("{STAGING_PREFIX}{name}"))
    }

    /// Returns the default pointer path.
    #[must_use]
    pub fn default_link(&self) -> PathBuf {
        self.root.join(DEFAULT_LINK)
    }

    /// Returns the versions catalog path.
    #[must_use]
    pub fn versions_catalog(&self) -> PathBuf {
        self.root.join(VERSIONS_CATALOG)
    }

    /// Returns the components catalog path.
    #[must_use]
    pub fn components_catalog(&self) -> PathBuf {
        self.root.join(COMPONENTS_CATALOG)
    }

    /// Returns the configuration file path.
    #[must_use]
    pub fn config_file(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    /// Returns the temporary download path for an artifact.
    ///
    /// The archive extension of `uri` is kept so the unpacker can pick a format.
    #[must_use]
    pub fn download_path(&self, name: &str, uri: &str) -> PathBuf {
        self.downloads.join(format!("{name}.{}", archive_extension(uri)))
    }

    /// Ensures the root and components directories exist.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory cannot be created.
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [&self.root, &self.components] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }
        Ok(())
    }
}

/// Returns `true` for directory names under the root that are never catalog entries.
#[must_use]
pub fn is_reserved_name(name: &str) -> bool {
    name == DEFAULT_LINK || name == COMPONENTS_DIR || name.starts_with('.')
}

/// Extracts the archive extension of a URI, defaulting to `tar.gz`.
fn archive_extension(uri: &str) -> &'static str {
    let file = uri.rsplit('/').next().unwrap_or(uri).to_ascii_lowercase();
    if file.ends_with(".zip") {
        "zip"
    } else if file.ends_with(".tgz") {
        "tgz"
    } else {
        "tar.gz"
    }
}
