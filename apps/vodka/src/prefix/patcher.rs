//! Applies an unpacked component to a Wine prefix.
//!
//! For a `dll_override` manifest the patcher:
//!
//! 1. creates `drive_c/windows/system32` and `system64` if missing,
//! 2. per declared architecture, sets aside the stale files named in `dlls`
//!    and copies every file matching `source` into the system directory
//!    with mode `0o755`; a `source` matching no file fails the install,
//! 3. writes the overrides into `user.reg`,
//! 4. writes the environment into `system.reg`.
//!
//! The whole operation is all-or-nothing. Files written and files set aside
//! are journaled, and registry files keep their original bytes in memory
//! until the install commits. On failure the journal is unwound and both
//! registry files are restored.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use super::manifest::{Arch, ArchFiles, InstallKind, InstallManifest};
use super::registry::{DLL_OVERRIDES_SECTION, ENVIRONMENT_SECTION, Hive, RegistryFile};
use crate::errors::{IoContext, VodkaError};
use crate::manager::Result;

const BACKUP_SUFFIX: &str = ".vodka-bak";

/// Paths inside a prefix.
#[derive(Debug, Clone)]
pub struct PrefixLayout {
    pub root: PathBuf,
    pub system32: PathBuf,
    pub system64: PathBuf,
    pub user_reg: PathBuf,
    pub system_reg: PathBuf,
}

impl PrefixLayout {
    #[must_use]
    pub fn new(root: &Path) -> Self {
        let windows = root.join("drive_c").join("windows");
        Self {
            root: root.to_path_buf(),
            system32: windows.join("system32"),
            system64: windows.join("system64"),
            user_reg: root.join("user.reg"),
            system_reg: root.join("system.reg"),
        }
    }

    /// System directory receiving files for `arch`.
    #[must_use]
    pub fn system_dir(&self, arch: Arch) -> &Path {
        match arch {
            Arch::X32 => &self.system32,
            Arch::X64 => &self.system64,
        }
    }
}

/// What a successful patch changed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PatchReport {
    /// Files copied into the prefix.
    pub copied: Vec<PathBuf>,
    /// Overrides written to `user.reg`.
    pub overrides: usize,
    /// Variables written to `system.reg`.
    pub environment: usize,
}

/// Installs components into one prefix.
#[derive(Debug, Clone)]
pub struct ComponentInstaller {
    layout: PrefixLayout,
}

impl ComponentInstaller {
    #[must_use]
    pub fn new(prefix: &Path) -> Self {
        Self {
            layout: PrefixLayout::new(prefix),
        }
    }

    /// Applies the component unpacked at `component_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`VodkaError::UnsupportedInstallType`] or
    /// [`VodkaError::InvalidManifest`] before anything is touched, and
    /// [`VodkaError::ComponentInstallFailed`] if applying fails. In the
    /// latter case the prefix is restored to its previous state.
    pub fn install(
        &self,
        name: &str,
        component_dir: &Path,
        manifest: &InstallManifest,
    ) -> Result<PatchReport> {
        let InstallKind::DllOverride = manifest.validate(name)?;
        let overrides = manifest.parsed_overrides(name)?;

        let mut journal = CopyJournal::default();
        let mut registries = Vec::new();

        let result = self.apply(
            component_dir,
            manifest,
            &overrides
                .iter()
                .map(|o| (o.dll.clone(), o.mode.clone()))
                .collect::<Vec<_>>(),
            &mut journal,
            &mut registries,
        );

        match result {
            Ok(report) => {
                journal.commit();
                tracing::info!(
                    "Installed {name} into {}: {} files, {} overrides, {} variables",
                    self.layout.root.display(),
                    report.copied.len(),
                    report.overrides,
                    report.environment
                );
                Ok(report)
            }
            Err(cause) => {
                tracing::warn!("Installing {name} failed, restoring prefix: {cause}");
                for store in registries.iter().rev() {
                    store.restore();
                }
                journal.unwind();
                Err(VodkaError::component_install_failed(name, cause))
            }
        }
    }

    fn apply(
        &self,
        component_dir: &Path,
        manifest: &InstallManifest,
        overrides: &[(String, String)],
        journal: &mut CopyJournal,
        registries: &mut Vec<RegistryStore>,
    ) -> Result<PatchReport> {
        for dir in [&self.layout.system32, &self.layout.system64] {
            std::fs::create_dir_all(dir)
                .io_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }

        let mut report = PatchReport::default();
        for (arch, files) in manifest.file_sets() {
            let target_dir = self.layout.system_dir(arch);
            report
                .copied
                .extend(copy_arch_files(component_dir, files, target_dir, journal)?);
        }

        let now = unix_now();

        if !overrides.is_empty() {
            let mut store = RegistryStore::open(&self.layout.user_reg, Hive::User)?;
            store.file.set_values(DLL_OVERRIDES_SECTION, overrides, now);
            store.commit()?;
            registries.push(store);
            report.overrides = overrides.len();
            tracing::debug!("Patched {}", self.layout.user_reg.display());
        }

        if !manifest.environment.is_empty() {
            let values: Vec<(String, String)> = manifest
                .environment
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            let mut store = RegistryStore::open(&self.layout.system_reg, Hive::Machine)?;
            store.file.set_values(ENVIRONMENT_SECTION, &values, now);
            store.commit()?;
            registries.push(store);
            report.environment = values.len();
            tracing::debug!("Patched {}", self.layout.system_reg.display());
        }

        Ok(report)
    }
}

fn copy_arch_files(
    component_dir: &Path,
    files: &ArchFiles,
    target_dir: &Path,
    journal: &mut CopyJournal,
) -> Result<Vec<PathBuf>> {
    for dll in &files.dlls {
        journal.set_aside(&target_dir.join(dll))?;
    }

    let pattern = format!(
        "{}/{}",
        glob::Pattern::escape(&component_dir.to_string_lossy()),
        files.source
    );
    let matches = glob::glob(&pattern).map_err(|e| {
        VodkaError::io(
            format!("Invalid source pattern '{}'", files.source),
            std::io::Error::new(std::io::ErrorKind::InvalidInput, e.msg),
        )
    })?;

    let mut copied = Vec::new();
    for entry in matches {
        let source = entry.map_err(|e| {
            let path = e.path().display().to_string();
            VodkaError::io(format!("Failed to read {path}"), e.into())
        })?;
        if !source.is_file() {
            continue;
        }
        let Some(file_name) = source.file_name() else {
            continue;
        };
        let target = target_dir.join(file_name);
        journal.copy(&source, &target)?;
        tracing::debug!("Copied {} to {}", source.display(), target.display());
        copied.push(target);
    }

    if copied.is_empty() {
        return Err(VodkaError::io(
            format!(
                "No files in {} match '{}'",
                component_dir.display(),
                files.source
            ),
            std::io::Error::new(std::io::ErrorKind::NotFound, "source pattern matched nothing"),
        ));
    }
    Ok(copied)
}

/// First free `<name>.vodka-bak`, `<name>.vodka-bak.1`, ... next to `target`.
fn backup_path(target: &Path) -> PathBuf {
    let mut base = target.file_name().unwrap_or_default().to_os_string();
    base.push(BACKUP_SUFFIX);
    let mut candidate = target.with_file_name(&base);
    let mut n = 0u32;
    while candidate.symlink_metadata().is_ok() {
        n += 1;
        let mut name = base.clone();
        name.push(format!(".{n}"));
        candidate = target.with_file_name(name);
    }
    candidate
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

/// Journal of filesystem changes made while copying.
#[derive(Debug, Default)]
struct CopyJournal {
    created: Vec<PathBuf>,
    set_aside: Vec<(PathBuf, PathBuf)>,
}

impl CopyJournal {
    /// Moves `target` out of the way, keeping it until commit.
    ///
    /// Only files and symlinks are set aside; a directory in the way fails.
    fn set_aside(&mut self, target: &Path) -> Result<()> {
        let Ok(metadata) = target.symlink_metadata() else {
            return Ok(());
        };
        if metadata.is_dir() {
            return Err(VodkaError::io(
                format!("Refusing to replace {}", target.display()),
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "target is a directory"),
            ));
        }
        if self.created.iter().any(|p| p == target) {
            std::fs::remove_file(target)
                .io_context(|| format!("Failed to remove {}", target.display()))?;
            self.created.retain(|p| p != target);
            return Ok(());
        }

        let backup = backup_path(target);
        std::fs::rename(target, &backup)
            .io_context(|| format!("Failed to remove stale {}", target.display()))?;
        tracing::debug!("Removed stale {}", target.display());
        self.set_aside.push((target.to_path_buf(), backup));
        Ok(())
    }

    /// Copies `source` to `target` with mode `0o755`.
    fn copy(&mut self, source: &Path, target: &Path) -> Result<()> {
        self.set_aside(target)?;
        self.created.push(target.to_path_buf());
        std::fs::copy(source, target).io_context(|| {
            format!(
                "Failed to copy {} to {}",
                source.display(),
                target.display()
            )
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(target, std::fs::Permissions::from_mode(0o755))
                .io_context(|| format!("Failed to set permissions: {}", target.display()))?;
        }
        Ok(())
    }

    /// Drops the set-aside originals.
    fn commit(self) {
        for (_, backup) in self.set_aside {
            if let Err(e) = std::fs::remove_file(&backup) {
                tracing::warn!("Failed to remove {}: {e}", backup.display());
            }
        }
    }

    /// Removes copied files and puts set-aside originals back.
    fn unwind(self) {
        for path in self.created.iter().rev() {
            if path.symlink_metadata().is_ok()
                && let Err(e) = std::fs::remove_file(path)
            {
                tracing::warn!("Failed to remove {}: {e}", path.display());
            }
        }
        for (original, backup) in self.set_aside.iter().rev() {
            if let Err(e) = std::fs::rename(backup, original) {
                tracing::warn!("Failed to restore {}: {e}", original.display());
            }
        }
    }
}

/// A registry file loaded for patching, with its original bytes.
struct RegistryStore {
    path: PathBuf,
    original: Option<Vec<u8>>,
    file: RegistryFile,
}

impl RegistryStore {
    /// Loads `path`, or starts from an empty `hive` file if it is missing.
    fn open(path: &Path, hive: Hive) -> Result<Self> {
        if !path.exists() {
            return Ok(Self {
                path: path.to_path_buf(),
                original: None,
                file: RegistryFile::empty(hive),
            });
        }
        let bytes =
            std::fs::read(path).io_context(|| format!("Failed to read {}", path.display()))?;
        let content = String::from_utf8(bytes.clone()).map_err(|e| {
            VodkaError::config_corrupt(path, format!("not valid UTF-8: {e}"))
        })?;
        let file = RegistryFile::parse(path, &content)?;
        Ok(Self {
            path: path.to_path_buf(),
            original: Some(bytes),
            file,
        })
    }

    /// Writes the patched file through a temporary file and rename.
    fn commit(&self) -> Result<()> {
        write_atomic(&self.path, self.file.to_string().as_bytes())
    }

    /// Puts the original bytes back, or removes a file that did not exist.
    fn restore(&self) {
        let outcome = match &self.original {
            Some(bytes) => write_atomic(&self.path, bytes),
            None => std::fs::remove_file(&self.path)
                .io_context(|| format!("Failed to remove {}", self.path.display())),
        };
        if let Err(e) = outcome {
            tracing::warn!("Failed to restore {}: {e}", self.path.display());
        }
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".tmp");
    let temp = path.with_file_name(temp_name);

    std::fs::write(&temp, bytes).io_context(|| format!("Failed to write {}", temp.display()))?;
    std::fs::rename(&temp, path).io_context(|| {
        let _ = std::fs::remove_file(&temp);
        format!("Failed to replace {}", path.display())
    })
}
