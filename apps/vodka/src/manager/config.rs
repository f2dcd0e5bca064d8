//! User configuration for vodka.
//!
//! Configuration is read from an optional `config.toml` in the managed root.
//! All keys are optional:
//!
//! ```toml
//! versions_url = "https://mirror.example.org/wine.json"
//! components_url = "https://mirror.example.org/components.json"
//! downloads_dir = "/var/cache/vodka"
//! ```
//!
//! The catalog URLs can also be overridden with the `VODKA_VERSIONS_URL` and
//! `VODKA_COMPONENTS_URL` environment variables, which take precedence over
//! the file. Empty or whitespace-only values are treated as unset.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use super::Result;
use super::paths::VodkaPaths;
use crate::errors::{IoContext, VodkaError};

/// Environment variable overriding the versions catalog URL.
pub const VERSIONS_URL_ENV: &str = "VODKA_VERSIONS_URL";

/// Environment variable overriding the components catalog URL.
pub const COMPONENTS_URL_ENV: &str = "VODKA_COMPONENTS_URL";

const DEFAULT_VERSIONS_URL: &str =
    "https://raw.githubusercontent.com/MVDW-Java/vodka/refactor/data/wine.json";
const DEFAULT_COMPONENTS_URL: &str =
    "https://raw.githubusercontent.com/MVDW-Java/vodka/refactor/data/components.json";

/// Contents of `config.toml`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Location of the versions catalog.
    pub versions_url: Option<String>,
    /// Location of the components catalog.
    pub components_url: Option<String>,
    /// Directory for temporary downloads.
    pub downloads_dir: Option<PathBuf>,
}

impl Config {
    /// Loads the configuration file, returning defaults if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`VodkaError::ConfigCorrupt`] if the file is not valid TOML for
    /// this schema, or an I/O error if it cannot be read.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .io_context(|| format!("Failed to read config {}", path.display()))?;
        toml::from_str(&content).map_err(|e| VodkaError::config_corrupt(path, e.to_string()))
    }

    /// Returns the versions catalog URL after applying environment overrides.
    #[must_use]
    pub fn versions_url(&self) -> String {
        resolve_url(
            VERSIONS_URL_ENV,
            self.versions_url.as_deref(),
            DEFAULT_VERSIONS_URL,
        )
    }

    /// Returns the components catalog URL after applying environment overrides.
    #[must_use]
    pub fn components_url(&self) -> String {
        resolve_url(
            COMPONENTS_URL_ENV,
            self.components_url.as_deref(),
            DEFAULT_COMPONENTS_URL,
        )
    }

    /// Applies path settings to `paths`.
    #[must_use]
    pub fn apply(&self, paths: VodkaPaths) -> VodkaPaths {
        match &self.downloads_dir {
            Some(dir) => paths.with_downloads(dir.clone()),
            None => paths,
        }
    }
}

fn resolve_url(env: &str, configured: Option<&str>, fallback: &str) -> String {
    std::env::var(env)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| {
            configured
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string)
        })
        .map_or_else(|| fallback.to_string(), |s| s.trim().to_string())
}
