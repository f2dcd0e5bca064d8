//! Component installation manifests.
//!
//! A component catalog entry may describe how its files are applied to a
//! prefix:
//!
//! ```json
//! "installation": {
//!   "type": "dll_override",
//!   "files": {
//!     "x32": { "source": "x32/*.dll", "dlls": ["d3dx9_43.dll"] },
//!     "x64": { "source": "x64/*.dll", "dlls": ["d3dx9_43.dll"] }
//!   },
//!   "overrides": ["d3dx9_43=native"],
//!   "environment": { "DXVK_HUD": "fps" }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Component, Path};
use std::str::FromStr;

use crate::errors::VodkaError;
use crate::manager::Result;

/// Installation types the patcher knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallKind {
    /// Copy DLLs into the system directories and register overrides.
    DllOverride,
}

impl FromStr for InstallKind {
    type Err = VodkaError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "dll_override" => Ok(Self::DllOverride),
            other => Err(VodkaError::UnsupportedInstallType {
                kind: other.to_string(),
            }),
        }
    }
}

/// Target architecture of a file set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arch {
    X32,
    X64,
}

impl Arch {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Arch::X32 => "x32",
            Arch::X64 => "x64",
        }
    }
}

/// Files for one architecture.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ArchFiles {
    /// Glob relative to the unpacked component.
    pub source: String,
    /// Target file names removed before copying.
    #[serde(default)]
    pub dlls: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct FileSets {
    #[serde(default)]
    pub x32: Option<ArchFiles>,
    #[serde(default)]
    pub x64: Option<ArchFiles>,
}

/// The `installation` object of a component entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct InstallManifest {
    /// Declared installation type, e.g. `dll_override`.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub files: FileSets,
    /// `name=mode` strings.
    #[serde(default)]
    pub overrides: Vec<String>,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}

/// One parsed `name=mode` override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DllOverride {
    pub dll: String,
    pub mode: String,
}

impl InstallManifest {
    /// Parses the declared type.
    ///
    /// # Errors
    ///
    /// Returns [`VodkaError::UnsupportedInstallType`] for unknown types.
    pub fn install_kind(&self) -> Result<InstallKind> {
        self.kind.parse()
    }

    /// Declared file sets in application order.
    pub fn file_sets(&self) -> impl Iterator<Item = (Arch, &ArchFiles)> {
        [
            (Arch::X32, self.files.x32.as_ref()),
            (Arch::X64, self.files.x64.as_ref()),
        ]
        .into_iter()
        .filter_map(|(arch, files)| files.map(|f| (arch, f)))
    }

    /// Parses every override string. Each entry splits on its first `=`.
    ///
    /// # Errors
    ///
    /// Returns [`VodkaError::InvalidManifest`] naming `component` if an
    /// entry has no `=` or an empty DLL name.
    pub fn parsed_overrides(&self, component: &str) -> Result<Vec<DllOverride>> {
        self.overrides
            .iter()
            .map(|raw| {
                let (dll, mode) = raw.split_once('=').ok_or_else(|| {
                    VodkaError::invalid_manifest(
                        component,
                        format!("override '{raw}' is not of the form name=mode"),
                    )
                })?;
                let dll = dll.trim();
                if dll.is_empty() {
                    return Err(VodkaError::invalid_manifest(
                        component,
                        format!("override '{raw}' has an empty name"),
                    ));
                }
                Ok(DllOverride {
                    dll: dll.to_string(),
                    mode: mode.trim().to_string(),
                })
            })
            .collect()
    }

    /// Checks everything that can be checked before the prefix is touched.
    ///
    /// # Errors
    ///
    /// Returns [`VodkaError::UnsupportedInstallType`] or
    /// [`VodkaError::InvalidManifest`].
    pub fn validate(&self, component: &str) -> Result<InstallKind> {
        let kind = self.install_kind()?;
        self.parsed_overrides(component)?;

        for (arch, files) in self.file_sets() {
            if !is_contained(Path::new(&files.source)) {
                return Err(VodkaError::invalid_manifest(
                    component,
                    format!(
                        "{} source '{}' must stay inside the component",
                        arch.as_str(),
                        files.source
                    ),
                ));
            }
            if let Some(bad) = files.dlls.iter().find(|dll| !is_plain_file_name(dll)) {
                return Err(VodkaError::invalid_manifest(
                    component,
                    format!("{} dll '{bad}' must be a plain file name", arch.as_str()),
                ));
            }
        }
        Ok(kind)
    }
}

fn is_contained(path: &Path) -> bool {
    !path.as_os_str().is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}
