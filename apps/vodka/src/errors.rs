//! Error types for the vodka CLI.
//!
//! This module defines the `VodkaError` enum which consolidates the error
//! kinds raised by the install engine and the prefix patcher. Engine code
//! returns these typed errors; the command layer wraps them in
//! `anyhow::Error` and decides how to present them to the user.

use std::path::PathBuf;
use thiserror::Error;

/// Consolidated error type for vodka operations.
#[derive(Debug, Error)]
pub enum VodkaError {
    /// No catalog entry matches the requested name.
    #[error("{kind} not found: {name}")]
    EntryNotFound {
        /// What was being looked up ("version" or "component").
        kind: &'static str,
        /// The requested name.
        name: String,
    },

    /// An operation requires an installed entry that is absent.
    #[error("{name} is not installed")]
    NotInstalled {
        /// The entry name.
        name: String,
    },

    /// No default version is set.
    #[error("no default version is set")]
    NoDefault,

    /// The entry name collides with a directory the manager reserves for itself.
    #[error("'{name}' is a reserved name and cannot be installed")]
    ReservedName {
        /// The rejected name.
        name: String,
    },

    /// The artifact could not be fetched.
    #[error("download failed for {uri}: {message}")]
    DownloadFailed {
        /// Source location of the artifact.
        uri: String,
        /// Description of the transport failure.
        message: String,
    },

    /// The downloaded artifact does not match the catalog checksum.
    #[error("checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// The downloaded file.
        path: PathBuf,
        /// The checksum declared by the catalog.
        expected: String,
        /// The checksum of the file on disk.
        actual: String,
    },

    /// The artifact could not be unpacked.
    #[error("failed to unpack {archive}: {message}")]
    UnpackFailed {
        /// The archive being unpacked.
        archive: PathBuf,
        /// Description of the failure.
        message: String,
    },

    /// A download or unpack step failed and the partial install was cleaned up.
    #[error("installation of {name} failed: {source}{}", cleanup_suffix(.cleanup))]
    InstallFailed {
        /// The entry being installed.
        name: String,
        /// The step failure that aborted the install.
        #[source]
        source: Box<VodkaError>,
        /// Leftovers that cleanup could not remove.
        cleanup: Vec<PathBuf>,
    },

    /// The component manifest declares an installation type the patcher does not know.
    #[error("unsupported installation type: {kind}")]
    UnsupportedInstallType {
        /// The declared type, or "none" when the entry has no manifest.
        kind: String,
    },

    /// The component manifest is malformed.
    #[error("invalid installation manifest for {name}: {message}")]
    InvalidManifest {
        /// The component name.
        name: String,
        /// What is wrong with it.
        message: String,
    },

    /// Applying a component to a prefix failed.
    #[error("failed to install component {name} into prefix: {source}")]
    ComponentInstallFailed {
        /// The component name.
        name: String,
        /// The underlying failure.
        #[source]
        source: Box<VodkaError>,
    },

    /// The catalog file does not exist.
    #[error("catalog not found: {path}")]
    CatalogNotFound {
        /// Expected catalog location.
        path: PathBuf,
    },

    /// The catalog file does not have the expected categorized shape.
    #[error("catalog {path} is corrupt: {message}")]
    CatalogCorrupt {
        /// The catalog file.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// A configuration or registry file failed to parse.
    #[error("config {path} is corrupt: {message}")]
    ConfigCorrupt {
        /// The offending file.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// Error reading or writing files.
    #[error("I/O error: {message}")]
    Io {
        /// Description of the I/O operation that failed.
        message: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Subprocess exited with non-zero code.
    ///
    /// The exit code is propagated to the parent process without printing
    /// additional error messages.
    #[error("process exited with code {code}")]
    ProcessExitCode {
        /// The exit code from the subprocess.
        code: i32,
    },
}

fn cleanup_suffix(leftovers: &[PathBuf]) -> String {
    if leftovers.is_empty() {
        return String::new();
    }
    let paths: Vec<String> = leftovers.iter().map(|p| p.display().to_string()).collect();
    format!(" (could not remove: {})", paths.join(", "))
}

impl VodkaError {
    /// Creates a new `EntryNotFound` error for a version lookup.
    #[must_use]
    pub fn version_not_found(name: impl Into<String>) -> Self {
        Self::EntryNotFound {
            kind: "version",
            name: name.into(),
        }
    }

    /// Creates a new `EntryNotFound` error for a component lookup.
    #[must_use]
    pub fn component_not_found(name: impl Into<String>) -> Self {
        Self::EntryNotFound {
            kind: "component",
            name: name.into(),
        }
    }

    /// Creates a new `NotInstalled` error.
    #[must_use]
    pub fn not_installed(name: impl Into<String>) -> Self {
        Self::NotInstalled { name: name.into() }
    }

    /// Creates a new `DownloadFailed` error.
    #[must_use]
    pub fn download_failed(uri: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DownloadFailed {
            uri: uri.into(),
            message: message.into(),
        }
    }

    /// Creates a new `UnpackFailed` error.
    #[must_use]
    pub fn unpack_failed(archive: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::UnpackFailed {
            archive: archive.into(),
            message: message.into(),
        }
    }

    /// Creates a new `InvalidManifest` error.
    #[must_use]
    pub fn invalid_manifest(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidManifest {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ComponentInstallFailed` error wrapping `source`.
    #[must_use]
    pub fn component_install_failed(name: impl Into<String>, source: VodkaError) -> Self {
        Self::ComponentInstallFailed {
            name: name.into(),
            source: Box::new(source),
        }
    }

    /// Creates a new `ConfigCorrupt` error.
    #[must_use]
    pub fn config_corrupt(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigCorrupt {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `Io` error from an I/O error with context.
    #[must_use]
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Creates a new `ProcessExitCode` error.
    #[must_use]
    pub const fn process_exit_code(code: i32) -> Self {
        Self::ProcessExitCode { code }
    }
}

/// Extension trait attaching a message to `std::io::Result` values.
pub trait IoContext<T> {
    /// Converts the I/O error into [`VodkaError::Io`] with a lazily built message.
    fn io_context<F, M>(self, message: F) -> Result<T, VodkaError>
    where
        F: FnOnce() -> M,
        M: Into<String>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn io_context<F, M>(self, message: F) -> Result<T, VodkaError>
    where
        F: FnOnce() -> M,
        M: Into<String>,
    {
        self.map_err(|source| VodkaError::io(message(), source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_not_found_displays_kind_and_name() {
        let err = VodkaError::version_not_found("staging-7.0");
        assert_eq!(err.to_string(), "version not found: staging-7.0");

        let err = VodkaError::component_not_found("dxvk");
        assert_eq!(err.to_string(), "component not found: dxvk");
    }

    #[test]
    fn not_installed_displays_name() {
        let err = VodkaError::not_installed("stable-9.0");
        assert_eq!(err.to_string(), "stable-9.0 is not installed");
    }

    #[test]
    fn install_failed_includes_cause() {
        let err = VodkaError::InstallFailed {
            name: "stable-9.0".to_string(),
            source: Box::new(VodkaError::unpack_failed("/tmp/a.tar.gz", "bad header")),
            cleanup: Vec::new(),
        };
        assert_eq!(
            err.to_string(),
            "installation of stable-9.0 failed: failed to unpack /tmp/a.tar.gz: bad header"
        );
    }

    #[test]
    fn install_failed_lists_leftovers() {
        let err = VodkaError::InstallFailed {
            name: "x".to_string(),
            source: Box::new(VodkaError::download_failed("http://x", "timeout")),
            cleanup: vec![PathBuf::from("/root/.staging-x")],
        };
        assert!(err.to_string().contains("could not remove: /root/.staging-x"));
    }

    #[test]
    fn component_install_failed_wraps_source() {
        let inner = VodkaError::io(
            "copy",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let err = VodkaError::component_install_failed("d3dx9", inner);
        assert_eq!(
            err.to_string(),
            "failed to install component d3dx9 into prefix: I/O error: copy"
        );
    }

    #[test]
    fn unsupported_install_type_displays_kind() {
        let err = VodkaError::UnsupportedInstallType {
            kind: "msi".to_string(),
        };
        assert_eq!(err.to_string(), "unsupported installation type: msi");
    }

    #[test]
    fn io_context_wraps_error() {
        let result: std::io::Result<()> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        let err = result.io_context(|| "reading catalog").unwrap_err();
        assert!(matches!(err, VodkaError::Io { .. }));
        assert_eq!(err.to_string(), "I/O error: reading catalog");
    }

    #[test]
    fn process_exit_code_displays_code() {
        let err = VodkaError::process_exit_code(42);
        assert_eq!(err.to_string(), "process exited with code 42");
    }
}
