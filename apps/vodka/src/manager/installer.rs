//! Install and uninstall orchestration.
//!
//! Every install runs the same sequence:
//!
//! ```text
//! Requested -> Downloading -> Unpacking -> Registered -> [DefaultAssigned] -> Done
//!                   \              \
//!                    +--------------+--> Cleaned (InstallFailed)
//! ```
//!
//! The archive is downloaded into the downloads directory, unpacked into a
//! `.staging-<name>` directory next to the final location and renamed into
//! place once unpacking succeeded. A failure at any step removes the
//! temporary artifact and any partial directories before the error is
//! returned.
//!
//! One `Manager` owns one managed root. Concurrent invocations against the
//! same root are not coordinated.

use std::path::Path;

use super::Result;
use super::archive::{ArchiveUnpacker, RootLayout, Unpacker};
use super::catalog::{Catalog, CatalogEntry, CatalogKind};
use super::config::Config;
use super::default_pointer::DefaultPointer;
use super::download::{Fetcher, HttpFetcher};
use super::index::InstallIndex;
use super::paths::{VodkaPaths, is_reserved_name};
use super::verify::verify_checksum;
use crate::errors::{IoContext, VodkaError};
use crate::prefix::{ComponentInstaller, PatchReport};

/// Result of [`Manager::install_version`].
#[derive(Debug)]
pub enum InstallOutcome {
    /// The version directory already existed; nothing was changed.
    AlreadyInstalled,
    /// The version was downloaded and unpacked.
    Installed {
        /// What happened to the default pointer afterwards.
        default: DefaultAssignment,
    },
}

/// Default pointer handling after a successful install.
#[derive(Debug)]
pub enum DefaultAssignment {
    /// The new version became the default.
    Assigned,
    /// Other versions were installed already; the default is unchanged.
    Skipped,
    /// The version is installed but could not be made the default.
    Failed(VodkaError),
}

/// Result of [`Manager::install_component`].
#[derive(Debug)]
pub struct ComponentOutcome {
    /// `false` if the component was already unpacked.
    pub fetched: bool,
    /// Prefix changes, when a prefix was given.
    pub applied: Option<PatchReport>,
}

/// Result of [`Manager::uninstall_version`].
#[derive(Debug, PartialEq, Eq)]
pub struct UninstallOutcome {
    /// The removed version was the default.
    pub was_default: bool,
    /// Version the default now points at, if it was moved.
    pub new_default: Option<String>,
}

/// The install engine for one managed root.
pub struct Manager {
    paths: VodkaPaths,
    config: Config,
    versions: InstallIndex,
    components: InstallIndex,
    pointer: DefaultPointer,
    fetcher: Box<dyn Fetcher>,
    unpacker: Box<dyn Unpacker>,
}

impl Manager {
    /// Opens the managed root from the environment (`VODKA_HOME` or
    /// `~/.vodka`) and its `config.toml`. `progress` controls the download
    /// progress line.
    ///
    /// # Errors
    ///
    /// Returns an error if the root cannot be determined or created, or if
    /// the configuration is corrupt.
    pub fn open(progress: bool) -> anyhow::Result<Self> {
        let paths = VodkaPaths::new()?;
        paths.ensure_directories()?;
        let config = Config::load(&paths.config_file())?;
        let paths = config.apply(paths);
        let mut fetcher = HttpFetcher::new()?;
        if !progress {
            fetcher = fetcher.quiet();
        }
        Ok(Self::new(
            paths,
            config,
            Box::new(fetcher),
            Box::new(ArchiveUnpacker),
        )?)
    }

    /// Creates a manager with explicit collaborators.
    ///
    /// # Errors
    ///
    /// Returns an error if the root cannot be created or scanned.
    pub fn new(
        paths: VodkaPaths,
        config: Config,
        fetcher: Box<dyn Fetcher>,
        unpacker: Box<dyn Unpacker>,
    ) -> Result<Self> {
        std::fs::create_dir_all(&paths.components)
            .io_context(|| format!("Failed to create directory: {}", paths.components.display()))?;
        let versions = InstallIndex::scan(&paths.root)?;
        let components = InstallIndex::scan(&paths.components)?;
        let pointer = DefaultPointer::new(&paths);
        Ok(Self {
            paths,
            config,
            versions,
            components,
            pointer,
            fetcher,
            unpacker,
        })
    }

    #[must_use]
    pub fn paths(&self) -> &VodkaPaths {
        &self.paths
    }

    /// Installed versions.
    #[must_use]
    pub fn versions(&self) -> &InstallIndex {
        &self.versions
    }

    /// Unpacked components.
    #[must_use]
    pub fn components(&self) -> &InstallIndex {
        &self.components
    }

    /// Loads the versions catalog, fetching it first if it is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be fetched or parsed.
    pub fn versions_catalog(&self) -> Result<Catalog> {
        Catalog::load_or_refresh(
            &self.paths.versions_catalog(),
            CatalogKind::Versions,
            &self.config.versions_url(),
            self.fetcher.as_ref(),
        )
    }

    /// Loads the components catalog, fetching it first if it is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be fetched or parsed.
    pub fn components_catalog(&self) -> Result<Catalog> {
        Catalog::load_or_refresh(
            &self.paths.components_catalog(),
            CatalogKind::Components,
            &self.config.components_url(),
            self.fetcher.as_ref(),
        )
    }

    /// Re-fetches the versions catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the fetch fails or the result cannot be parsed.
    pub fn refresh_versions(&self) -> Result<Catalog> {
        Catalog::refresh(
            &self.paths.versions_catalog(),
            CatalogKind::Versions,
            &self.config.versions_url(),
            self.fetcher.as_ref(),
        )
    }

    /// Re-fetches the components catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the fetch fails or the result cannot be parsed.
    pub fn refresh_components(&self) -> Result<Catalog> {
        Catalog::refresh(
            &self.paths.components_catalog(),
            CatalogKind::Components,
            &self.config.components_url(),
            self.fetcher.as_ref(),
        )
    }

    #[must_use]
    pub fn is_installed(&self, name: &str) -> bool {
        self.versions.contains(name)
    }

    #[must_use]
    pub fn is_default(&self, name: &str) -> bool {
        self.pointer.is_default(&self.versions, name)
    }

    /// Name of the current default version.
    #[must_use]
    pub fn default_version(&self) -> Option<String> {
        self.pointer.current(&self.versions)
    }

    /// Makes `name` the default version.
    ///
    /// # Errors
    ///
    /// Returns [`VodkaError::NotInstalled`] if `name` is not installed.
    pub fn set_default(&self, name: &str) -> Result<()> {
        self.pointer.set(&self.versions, name)
    }

    /// Installs a version from `catalog`.
    ///
    /// The first version installed into an empty root becomes the default.
    ///
    /// # Errors
    ///
    /// Returns [`VodkaError::EntryNotFound`] for unknown names,
    /// [`VodkaError::ReservedName`] for names the root reserves, and
    /// [`VodkaError::InstallFailed`] if download or unpack failed.
    pub fn install_version(&mut self, catalog: &Catalog, name: &str) -> Result<InstallOutcome> {
        let entry = catalog.find(name)?;
        check_name(entry)?;

        if self.versions.contains(&entry.name) {
            tracing::debug!("{} is already installed", entry.name);
            return Ok(InstallOutcome::AlreadyInstalled);
        }

        let first = self.versions.is_empty();
        let root = self.paths.root.clone();
        self.fetch_and_unpack(entry, &root, RootLayout::StripCommonRoot)?;
        self.versions.insert(&entry.name);
        tracing::info!("Registered version {}", entry.name);

        let default = if first {
            match self.pointer.set(&self.versions, &entry.name) {
                Ok(()) => DefaultAssignment::Assigned,
                Err(e) => {
                    tracing::warn!("Could not make {} the default: {e}", entry.name);
                    DefaultAssignment::Failed(e)
                }
            }
        } else {
            DefaultAssignment::Skipped
        };

        Ok(InstallOutcome::Installed { default })
    }

    /// Fetches a component if needed and, given a prefix, applies it.
    ///
    /// # Errors
    ///
    /// Returns [`VodkaError::EntryNotFound`], [`VodkaError::InstallFailed`],
    /// [`VodkaError::UnsupportedInstallType`] when a prefix is given but the
    /// entry has no usable manifest, or [`VodkaError::ComponentInstallFailed`].
    pub fn install_component(
        &mut self,
        catalog: &Catalog,
        name: &str,
        prefix: Option<&Path>,
    ) -> Result<ComponentOutcome> {
        let entry = catalog.find(name)?;
        check_name(entry)?;

        // Reject an unusable manifest before downloading anything.
        let manifest = match prefix {
            Some(_) => {
                let manifest = entry.install_manifest.as_ref().ok_or_else(|| {
                    VodkaError::UnsupportedInstallType {
                        kind: "none".to_string(),
                    }
                })?;
                manifest.validate(&entry.name)?;
                Some(manifest)
            }
            None => None,
        };

        let fetched = if self.components.contains(&entry.name) {
            tracing::debug!("Component {} is already unpacked", entry.name);
            false
        } else {
            let dir = self.paths.components.clone();
            self.fetch_and_unpack(entry, &dir, RootLayout::Verbatim)?;
            self.components.insert(&entry.name);
            tracing::info!("Registered component {}", entry.name);
            true
        };

        let applied = match (prefix, manifest) {
            (Some(prefix), Some(manifest)) => Some(ComponentInstaller::new(prefix).install(
                &entry.name,
                &self.components.path_of(&entry.name),
                manifest,
            )?),
            _ => None,
        };

        Ok(ComponentOutcome { fetched, applied })
    }

    /// Removes an installed version.
    ///
    /// If it was the default, the default moves to the highest-sorted
    /// remaining version, or is removed when none remain.
    ///
    /// # Errors
    ///
    /// Returns [`VodkaError::NotInstalled`] if `name` is not installed, or an
    /// I/O error if the directory cannot be removed.
    pub fn uninstall_version(&mut self, name: &str) -> Result<UninstallOutcome> {
        if !self.versions.contains(name) {
            return Err(VodkaError::not_installed(name));
        }

        let was_default = self.is_default(name);
        if was_default {
            self.pointer.clear()?;
        }

        let dir = self.versions.path_of(name);
        std::fs::remove_dir_all(&dir)
            .io_context(|| format!("Failed to remove {}", dir.display()))?;
        self.versions.remove(name);
        tracing::info!("Removed version {name}");

        let new_default = match self.versions.entries().iter().next_back() {
            Some(next) if was_default => {
                let next = next.clone();
                self.pointer.set(&self.versions, &next)?;
                Some(next)
            }
            _ => None,
        };

        Ok(UninstallOutcome {
            was_default,
            new_default,
        })
    }

    /// Removes an unpacked component. Prefixes it was applied to are not touched.
    ///
    /// # Errors
    ///
    /// Returns [`VodkaError::NotInstalled`] if the component is absent.
    pub fn uninstall_component(&mut self, name: &str) -> Result<()> {
        if !self.components.contains(name) {
            return Err(VodkaError::not_installed(name));
        }
        let dir = self.components.path_of(name);
        std::fs::remove_dir_all(&dir)
            .io_context(|| format!("Failed to remove {}", dir.display()))?;
        self.components.remove(name);
        tracing::info!("Removed component {name}");
        Ok(())
    }

    /// Downloads and unpacks `entry` into `parent/<name>`, cleaning up on failure.
    fn fetch_and_unpack(
        &self,
        entry: &CatalogEntry,
        parent: &Path,
        layout: RootLayout,
    ) -> Result<()> {
        let target = parent.join(&entry.name);
        let archive = self.paths.download_path(&entry.name, &entry.source_uri);
        let staging = VodkaPaths::staging_dir(parent, &entry.name);
        let target_existed = target.symlink_metadata().is_ok();

        let result = self.download_and_unpack(entry, &archive, &staging, &target, layout);

        let mut leftovers = Vec::new();
        if let Err(e) = remove_if_present(&archive) {
            tracing::warn!("{e}");
            leftovers.push(archive);
        }

        let Err(cause) = result else {
            return Ok(());
        };

        let mut partial = vec![staging];
        if !target_existed {
            partial.push(target);
        }
        for dir in partial {
            if let Err(e) = remove_if_present(&dir) {
                tracing::warn!("{e}");
                leftovers.push(dir);
            }
        }
        tracing::info!("Cleaned up failed install of {}", entry.name);

        Err(VodkaError::InstallFailed {
            name: entry.name.clone(),
            source: Box::new(cause),
            cleanup: leftovers,
        })
    }

    fn download_and_unpack(
        &self,
        entry: &CatalogEntry,
        archive: &Path,
        staging: &Path,
        target: &Path,
        layout: RootLayout,
    ) -> Result<()> {
        tracing::info!("Downloading {} from {}", entry.name, entry.source_uri);
        self.fetcher.fetch(&entry.source_uri, archive)?;

        if let Some(expected) = &entry.sha256 {
            verify_checksum(archive, expected)?;
        }

        remove_if_present(staging)?;
        tracing::info!("Unpacking {}", entry.name);
        self.unpacker.unpack(archive, staging, layout)?;

        std::fs::rename(staging, target).io_context(|| {
            format!(
                "Failed to move {} to {}",
                staging.display(),
                target.display()
            )
        })
    }
}

fn check_name(entry: &CatalogEntry) -> Result<()> {
    if is_reserved_name(&entry.name) || entry.name.contains(['/', '\\']) {
        return Err(VodkaError::ReservedName {
            name: entry.name.clone(),
        });
    }
    Ok(())
}

/// Removes a file or directory tree if it exists.
fn remove_if_present(path: &Path) -> Result<()> {
    let Ok(metadata) = path.symlink_metadata() else {
        return Ok(());
    };
    let removed = if metadata.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };
    removed.io_context(|| format!("Failed to remove {}", path.display()))
}
