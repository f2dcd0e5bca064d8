//! Catalog handling for versions and components.
//!
//! A catalog is a JSON file listing installable entries grouped by category:
//!
//! ```json
//! {
//!   "categories": [
//!     { "id": "stable", "name": "Wine Stable" },
//!     { "id": "staging", "name": "Wine Staging" }
//!   ],
//!   "versions": {
//!     "stable": [
//!       { "name": "stable-9.0", "title": "Wine 9.0", "uri": "https://.../stable-9.0.tar.gz" }
//!     ],
//!     "staging": [ ... ]
//!   }
//! }
//! ```
//!
//! Component catalogs use a `components` key instead of `versions`, and their
//! entries may carry an `installation` manifest. Any entry may carry a
//! `sha256` checksum of its artifact.
//!
//! Entries are flattened into one lookup table. Iteration order follows the
//! `categories` list, then any undeclared category ids in sorted order.
//! Name lookup is case-insensitive and the first entry in iteration order
//! wins when two categories share a name.

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use super::Result;
use super::download::Fetcher;
use crate::errors::{IoContext, VodkaError};
use crate::prefix::InstallManifest;

/// Which catalog a file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogKind {
    /// Runtime builds.
    Versions,
    /// Redistributable add-ons.
    Components,
}

impl CatalogKind {
    /// Top-level key holding the categorized entries.
    fn key(self) -> &'static str {
        match self {
            CatalogKind::Versions => "versions",
            CatalogKind::Components => "components",
        }
    }

    fn not_found(self, name: &str) -> VodkaError {
        match self {
            CatalogKind::Versions => VodkaError::version_not_found(name),
            CatalogKind::Components => VodkaError::component_not_found(name),
        }
    }
}

/// Category declaration in the catalog file.
#[derive(Debug, Clone, Deserialize)]
struct CategoryDecl {
    id: String,
    name: String,
}

/// Entry as written in the catalog file.
#[derive(Debug, Clone, Deserialize)]
struct RawEntry {
    name: String,
    #[serde(default)]
    title: Option<String>,
    uri: String,
    #[serde(default)]
    sha256: Option<String>,
    #[serde(default)]
    installation: Option<InstallManifest>,
}

type Groups = BTreeMap<String, Vec<RawEntry>>;

/// On-disk catalog shape. Exactly the key matching the catalog kind is read.
#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    categories: Vec<CategoryDecl>,
    #[serde(default)]
    versions: Option<Groups>,
    #[serde(default)]
    components: Option<Groups>,
}

/// A resolved catalog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Unique (case-insensitive) name, also the install directory name.
    pub name: String,
    /// Human-readable title.
    pub title: String,
    /// Category id.
    pub category: String,
    /// Category display name.
    pub category_name: String,
    /// Location of the source artifact.
    pub source_uri: String,
    /// Expected SHA256 of the artifact, if the catalog declares one.
    pub sha256: Option<String>,
    /// Installation manifest (components only).
    pub install_manifest: Option<InstallManifest>,
}

/// A loaded catalog.
#[derive(Debug, Clone)]
pub struct Catalog {
    kind: CatalogKind,
    entries: Vec<CatalogEntry>,
    by_name: HashMap<String, usize>,
}

impl Catalog {
    /// Loads a catalog file.
    ///
    /// # Errors
    ///
    /// Returns [`VodkaError::CatalogNotFound`] if the file does not exist and
    /// [`VodkaError::CatalogCorrupt`] if it does not have the categorized shape.
    pub fn load(path: &Path, kind: CatalogKind) -> Result<Self> {
        if !path.exists() {
            return Err(VodkaError::CatalogNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)
            .io_context(|| format!("Failed to read catalog {}", path.display()))?;
        Self::parse(path, &content, kind)
    }

    /// Loads a catalog, fetching it from `url` first when the file is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the fetch fails or the catalog cannot be parsed.
    pub fn load_or_refresh(
        path: &Path,
        kind: CatalogKind,
        url: &str,
        fetcher: &dyn Fetcher,
    ) -> Result<Self> {
        if path.exists() {
            Self::load(path, kind)
        } else {
            Self::refresh(path, kind, url, fetcher)
        }
    }

    /// Fetches the catalog from `url` and replaces the local file.
    ///
    /// The download is validated before it replaces the existing catalog, so a
    /// broken remote file never clobbers a working local one.
    ///
    /// # Errors
    ///
    /// Returns an error if the fetch fails or the fetched file cannot be parsed.
    pub fn refresh(path: &Path, kind: CatalogKind, url: &str, fetcher: &dyn Fetcher) -> Result<Self> {
        let incoming = incoming_path(path);
        tracing::info!("Refreshing catalog {} from {url}", path.display());

        fetcher.fetch(url, &incoming)?;

        let catalog = match Self::load(&incoming, kind) {
            Ok(catalog) => catalog,
            Err(e) => {
                let _ = std::fs::remove_file(&incoming);
                return Err(e);
            }
        };

        std::fs::rename(&incoming, path).io_context(|| {
            format!(
                "Failed to move {} to {}",
                incoming.display(),
                path.display()
            )
        })?;
        tracing::debug!("Catalog {} holds {} entries", path.display(), catalog.len());
        Ok(catalog)
    }

    /// Parses catalog JSON. `path` is only used in error messages.
    ///
    /// # Errors
    ///
    /// Returns [`VodkaError::CatalogCorrupt`] if the content does not match
    /// the expected shape, including a file holding the other catalog kind.
    pub fn parse(path: &Path, content: &str, kind: CatalogKind) -> Result<Self> {
        let corrupt = |message: String| VodkaError::CatalogCorrupt {
            path: path.to_path_buf(),
            message,
        };
        let file: CatalogFile =
            serde_json::from_str(content).map_err(|e| corrupt(e.to_string()))?;
        let groups = match kind {
            CatalogKind::Versions => file.versions,
            CatalogKind::Components => file.components,
        }
        .ok_or_else(|| corrupt(format!("expected '{}' key", kind.key())))?;
        Ok(Self::flatten(&file.categories, groups, kind))
    }

    fn flatten(categories: &[CategoryDecl], mut groups: Groups, kind: CatalogKind) -> Self {
        let mut order: Vec<(String, String)> = categories
            .iter()
            .map(|c| (c.id.clone(), c.name.clone()))
            .collect();
        for id in groups.keys() {
            if !order.iter().any(|(declared, _)| declared == id) {
                order.push((id.clone(), id.clone()));
            }
        }

        let mut entries = Vec::new();
        let mut by_name = HashMap::new();
        for (id, display) in order {
            let Some(group) = groups.remove(&id) else {
                continue;
            };
            for raw in group {
                by_name
                    .entry(raw.name.to_lowercase())
                    .or_insert(entries.len());
                entries.push(CatalogEntry {
                    title: raw.title.unwrap_or_else(|| raw.name.clone()),
                    name: raw.name,
                    category: id.clone(),
                    category_name: display.clone(),
                    source_uri: raw.uri,
                    sha256: raw.sha256,
                    install_manifest: raw.installation,
                });
            }
        }

        Self {
            kind,
            entries,
            by_name,
        }
    }

    /// All entries in iteration order.
    #[must_use]
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Number of entries, duplicates included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the catalog has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Finds an entry by case-insensitive name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&CatalogEntry> {
        self.by_name
            .get(&name.to_lowercase())
            .map(|&index| &self.entries[index])
    }

    /// Finds an entry by case-insensitive name.
    ///
    /// # Errors
    ///
    /// Returns [`VodkaError::EntryNotFound`] if no entry matches.
    pub fn find(&self, name: &str) -> Result<&CatalogEntry> {
        self.get(name).ok_or_else(|| self.kind.not_found(name))
    }
}

fn incoming_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(".incoming");
    path.with_file_name(name)
}
