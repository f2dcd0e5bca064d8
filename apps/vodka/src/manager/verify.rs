//! Checksum verification for downloaded artifacts.

use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use super::Result;
use crate::errors::{IoContext, VodkaError};

/// Verifies that a file matches the expected SHA256 checksum.
///
/// `expected` is compared case-insensitively.
///
/// # Errors
///
/// Returns [`VodkaError::ChecksumMismatch`] if the hashes differ, or an I/O
/// error if the file cannot be read.
pub fn verify_checksum(file_path: &Path, expected: &str) -> Result<()> {
    let actual = compute_sha256(file_path)?;
    let expected = expected.trim().to_lowercase();

    if actual != expected {
        return Err(VodkaError::ChecksumMismatch {
            path: file_path.to_path_buf(),
            expected,
            actual,
        });
    }

    tracing::debug!("Checksum verified for {}", file_path.display());
    Ok(())
}

/// Computes the SHA256 hash of a file as a lowercase hex string.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub fn compute_sha256(file_path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(file_path).io_context(|| {
        format!("Failed to open file for checksum: {}", file_path.display())
    })?;

    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = file.read(&mut buffer).io_context(|| {
            format!("Failed to read file for checksum: {}", file_path.display())
        })?;

        if bytes_read == 0 {
            break;
        }

        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}
