//! Install engine for Wine versions and components.
//!
//! Everything under the managed root (`~/.vodka` or `$VODKA_HOME`) is owned
//! by this module: catalogs, unpacked versions, unpacked components and the
//! `default` pointer. Installed state is the directory tree itself, mirrored
//! in memory by [`index::InstallIndex`].
//!
//! ## Module Structure
//!
//! - [`paths`] - Managed root layout
//! - [`config`] - Optional `config.toml` and environment overrides
//! - [`catalog`] - Categorized version and component catalogs
//! - [`download`] - Fetch collaborator (HTTP, `file://`, local paths)
//! - [`verify`] - SHA256 checksum verification
//! - [`archive`] - Unpack collaborator (tar.gz and zip)
//! - [`index`] - In-memory installed set
//! - [`default_pointer`] - The `default` symlink
//! - [`installer`] - Install and uninstall orchestration
//! - [`status`] - Catalog entries joined with installed state
//! - [`exec`] - Running programs from an installed version

pub mod archive;
pub mod catalog;
pub mod config;
pub mod default_pointer;
pub mod download;
pub mod exec;
pub mod index;
pub mod installer;
pub mod paths;
pub mod status;
pub mod verify;

pub use catalog::{Catalog, CatalogEntry, CatalogKind};
pub use installer::{DefaultAssignment, InstallOutcome, Manager};
pub use status::EntryStatus;

/// Result type of engine operations.
pub type Result<T> = std::result::Result<T, crate::errors::VodkaError>;
