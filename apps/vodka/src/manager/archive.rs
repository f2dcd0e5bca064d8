//! Archive extraction for version and component artifacts.
//!
//! Wine builds ship as tar.gz and components frequently as zip. The format
//! is detected from the file's magic bytes, falling back to the extension.
//! With [`RootLayout::StripCommonRoot`], a root folder shared by every entry
//! is stripped, so `wine-9.0-amd64/bin/wine` lands at `bin/wine`. Component
//! archives are unpacked [`RootLayout::Verbatim`] because their install
//! manifests address files by their path inside the archive.

use std::io::{Read, Seek};
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, bail};
use flate2::read::GzDecoder;
use tar::Archive;

use super::Result;
use crate::errors::VodkaError;

/// How archive paths map onto the destination directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootLayout {
    /// Drop a single root folder shared by every nested entry.
    StripCommonRoot,
    /// Keep every entry at its archive path.
    Verbatim,
}

/// Unpacks an archive into a directory.
pub trait Unpacker {
    /// Extracts `archive` into `dest`, creating `dest` if needed.
    ///
    /// # Errors
    ///
    /// Returns [`VodkaError::UnpackFailed`] if the archive is unreadable or
    /// holds entries that would escape `dest`.
    fn unpack(&self, archive: &Path, dest: &Path, layout: RootLayout) -> Result<()>;
}

/// Unpacker for `.tar.gz`, `.tgz` and `.zip` archives.
#[derive(Debug, Default, Clone, Copy)]
pub struct ArchiveUnpacker;

impl Unpacker for ArchiveUnpacker {
    fn unpack(&self, archive: &Path, dest: &Path, layout: RootLayout) -> Result<()> {
        tracing::debug!(
            "Unpacking {} into {} ({layout:?})",
            archive.display(),
            dest.display()
        );
        extract_archive(archive, dest, layout)
            .map_err(|e| VodkaError::unpack_failed(archive, format!("{e:#}")))
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Format {
    TarGz,
    Zip,
}

fn detect_format(archive_path: &Path) -> anyhow::Result<Format> {
    let mut magic = [0u8; 4];
    let mut file = std::fs::File::open(archive_path)
        .with_context(|| format!("Failed to open archive: {}", archive_path.display()))?;
    let read = file
        .read(&mut magic)
        .with_context(|| format!("Failed to read archive: {}", archive_path.display()))?;

    match &magic[..read] {
        [0x1f, 0x8b, ..] => return Ok(Format::TarGz),
        [b'P', b'K', 0x03, 0x04] | [b'P', b'K', 0x05, 0x06] => return Ok(Format::Zip),
        _ => {}
    }

    let name = archive_path.to_string_lossy().to_ascii_lowercase();
    if name.ends_with(".zip") {
        Ok(Format::Zip)
    } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        Ok(Format::TarGz)
    } else {
        bail!("Unrecognized archive format: {}", archive_path.display())
    }
}

/// Extracts a ZIP or tar.gz archive into `dest_dir`.
fn extract_archive(archive_path: &Path, dest_dir: &Path, layout: RootLayout) -> anyhow::Result<()> {
    match detect_format(archive_path)? {
        Format::TarGz => extract_tar_gz(archive_path, dest_dir, layout),
        Format::Zip => extract_zip(archive_path, dest_dir, layout),
    }
}

fn reject_unsafe(entry_path: &Path) -> anyhow::Result<()> {
    if entry_path.is_absolute()
        || entry_path
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
    {
        bail!(
            "Refusing to extract path with parent directory or absolute reference: {}",
            entry_path.display()
        );
    }
    Ok(())
}

/// Drops leading `./` components.
fn normalize(entry_path: &Path) -> PathBuf {
    entry_path
        .components()
        .skip_while(|c| matches!(c, Component::CurDir))
        .collect()
}

/// Maps an entry to its output path, or `None` for the stripped root itself.
fn output_path(dest_dir: &Path, entry_path: &Path, strip: Option<&Path>) -> Option<PathBuf> {
    let relative = match strip {
        Some(prefix) => match entry_path.strip_prefix(prefix) {
            Ok(p) if p.as_os_str().is_empty() => return None,
            Ok(p) => p.to_path_buf(),
            Err(_) => entry_path.to_path_buf(),
        },
        None => entry_path.to_path_buf(),
    };
    if relative.as_os_str().is_empty() {
        return None;
    }
    Some(dest_dir.join(relative))
}

/// Returns the folder shared by every entry, if any entry is nested below it.
///
/// Flat archives (a single file at the root) are never stripped.
fn common_root_folder<I>(paths: I) -> Option<PathBuf>
where
    I: IntoIterator<Item = PathBuf>,
{
    let mut common_root: Option<PathBuf> = None;
    let mut has_nested_entries = false;

    for path in paths {
        if path.components().count() > 1 {
            has_nested_entries = true;
        }
        let Some(first) = path.components().next() else {
            continue;
        };
        let root = PathBuf::from(first.as_os_str());
        match &common_root {
            None => common_root = Some(root),
            Some(existing) if existing != &root => return None,
            Some(_) => {}
        }
    }

    if has_nested_entries { common_root } else { None }
}

fn open_tar(archive_path: &Path) -> anyhow::Result<Archive<GzDecoder<std::fs::File>>> {
    let file = std::fs::File::open(archive_path)
        .with_context(|| format!("Failed to open archive: {}", archive_path.display()))?;
    Ok(Archive::new(GzDecoder::new(file)))
}

fn tar_entry_paths(archive_path: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut archive = open_tar(archive_path)?;
    let mut paths = Vec::new();
    for entry in archive
        .entries()
        .with_context(|| format!("Failed to read tar entries: {}", archive_path.display()))?
    {
        let entry = entry
            .with_context(|| format!("Failed to read tar entry: {}", archive_path.display()))?;
        let path = entry.path().context("Failed to get entry path")?;
        paths.push(normalize(&path));
    }
    Ok(paths)
}

fn extract_tar_gz(archive_path: &Path, dest_dir: &Path, layout: RootLayout) -> anyhow::Result<()> {
    std::fs::create_dir_all(dest_dir)
        .with_context(|| format!("Failed to create directory: {}", dest_dir.display()))?;

    let strip = match layout {
        RootLayout::StripCommonRoot => common_root_folder(tar_entry_paths(archive_path)?),
        RootLayout::Verbatim => None,
    };

    let mut archive = open_tar(archive_path)?;
    archive.set_preserve_permissions(true);

    for entry in archive
        .entries()
        .with_context(|| format!("Failed to read tar entries: {}", archive_path.display()))?
    {
        let mut entry = entry
            .with_context(|| format!("Failed to read tar entry: {}", archive_path.display()))?;

        let entry_path = normalize(&entry.path().context("Failed to get entry path")?);
        reject_unsafe(&entry_path)?;

        let Some(output) = output_path(dest_dir, &entry_path, strip.as_deref()) else {
            continue;
        };

        if entry.header().entry_type().is_dir() {
            std::fs::create_dir_all(&output)
                .with_context(|| format!("Failed to create directory: {}", output.display()))?;
        } else {
            if let Some(parent) = output.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
            }
            entry
                .unpack(&output)
                .with_context(|| format!("Failed to extract: {}", output.display()))?;
        }
    }

    Ok(())
}

fn zip_entry_paths<R: Read + Seek>(archive: &mut zip::ZipArchive<R>) -> anyhow::Result<Vec<PathBuf>> {
    let mut paths = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let entry = archive
            .by_index(i)
            .with_context(|| format!("Failed to read archive entry {i}"))?;
        let path = entry
            .enclosed_name()
            .with_context(|| format!("Invalid entry path in archive: {}", entry.name()))?;
        paths.push(normalize(&path));
    }
    Ok(paths)
}

fn extract_zip(archive_path: &Path, dest_dir: &Path, layout: RootLayout) -> anyhow::Result<()> {
    let file = std::fs::File::open(archive_path)
        .with_context(|| format!("Failed to open archive: {}", archive_path.display()))?;
    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("Failed to read ZIP archive: {}", archive_path.display()))?;

    std::fs::create_dir_all(dest_dir)
        .with_context(|| format!("Failed to create directory: {}", dest_dir.display()))?;

    let strip = match layout {
        RootLayout::StripCommonRoot => common_root_folder(zip_entry_paths(&mut archive)?),
        RootLayout::Verbatim => None,
    };

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .with_context(|| format!("Failed to read archive entry {i}"))?;

        let entry_path = normalize(
            &entry
                .enclosed_name()
                .with_context(|| format!("Invalid entry path in archive: {}", entry.name()))?,
        );
        reject_unsafe(&entry_path)?;

        let Some(output) = output_path(dest_dir, &entry_path, strip.as_deref()) else {
            continue;
        };

        if entry.is_dir() {
            std::fs::create_dir_all(&output)
                .with_context(|| format!("Failed to create directory: {}", output.display()))?;
            continue;
        }

        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let mut outfile = std::fs::File::create(&output)
            .with_context(|| format!("Failed to create file: {}", output.display()))?;
        std::io::copy(&mut entry, &mut outfile)
            .with_context(|| format!("Failed to extract: {}", output.display()))?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&output, std::fs::Permissions::from_mode(mode & 0o7777))
                .with_context(|| format!("Failed to set permissions: {}", output.display()))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;
    use tar::Builder;

    fn write_tar_gz(archive_path: &Path, files: &[(&str, &[u8], u32)]) {
        let file = std::fs::File::create(archive_path).expect("Should create file");
        let encoder = GzEncoder::new(file, Compression::default());
        let mut builder = Builder::new(encoder);

        for (path, data, mode) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(*mode);
            header.set_cksum();
            builder
                .append_data(&mut header, path, *data)
                .expect("Should append file");
        }

        builder
            .into_inner()
            .expect("Should finish tar")
            .finish()
            .expect("Should finish gzip");
    }

    fn write_zip(archive_path: &Path, files: &[(&str, &[u8])]) {
        let file = std::fs::File::create(archive_path).expect("Should create file");
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        for (path, data) in files {
            zip.start_file(*path, options).expect("Should start file");
            zip.write_all(data).expect("Should write");
        }
        zip.finish().expect("Should finish");
    }

    #[test]
    fn tar_gz_strips_common_root_folder() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("wine.tar.gz");
        let dest = temp.path().join("out");
        write_tar_gz(
            &archive,
            &[
                ("wine-9.0-amd64/bin/wine", b"#!/bin/sh\n", 0o755),
                ("wine-9.0-amd64/lib/wine/ntdll.so", b"elf", 0o644),
            ],
        );

        ArchiveUnpacker
            .unpack(&archive, &dest, RootLayout::StripCommonRoot)
            .unwrap();

        assert!(dest.join("bin/wine").is_file());
        assert!(dest.join("lib/wine/ntdll.so").is_file());
        assert!(!dest.join("wine-9.0-amd64").exists());
    }

    #[cfg(unix)]
    #[test]
    fn tar_gz_preserves_executable_bit() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("wine.tar.gz");
        let dest = temp.path().join("out");
        write_tar_gz(&archive, &[("root/bin/wine", b"x", 0o755)]);

        ArchiveUnpacker
            .unpack(&archive, &dest, RootLayout::StripCommonRoot)
            .unwrap();

        let mode = std::fs::metadata(dest.join("bin/wine"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o111, 0o111);
    }

    #[test]
    fn tar_gz_flat_file_is_not_stripped() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("d3dx9.tar.gz");
        let dest = temp.path().join("out");
        write_tar_gz(&archive, &[("d3dx9_43.dll", b"MZ", 0o644)]);

        ArchiveUnpacker
            .unpack(&archive, &dest, RootLayout::StripCommonRoot)
            .unwrap();

        assert!(dest.join("d3dx9_43.dll").is_file());
    }

    #[test]
    fn tar_gz_with_dot_prefix_strips_root() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("dxvk.tar.gz");
        let dest = temp.path().join("out");
        write_tar_gz(
            &archive,
            &[
                ("./dxvk-2.3/x32/d3d9.dll", b"MZ", 0o644),
                ("./dxvk-2.3/x64/d3d9.dll", b"MZ", 0o644),
            ],
        );

        ArchiveUnpacker
            .unpack(&archive, &dest, RootLayout::StripCommonRoot)
            .unwrap();

        assert!(dest.join("x32/d3d9.dll").is_file());
        assert!(dest.join("x64/d3d9.dll").is_file());
    }

    #[test]
    fn zip_strips_common_root_folder() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("component.zip");
        let dest = temp.path().join("out");
        write_zip(
            &archive,
            &[
                ("pkg/x32/d3dx9_43.dll", b"MZ32"),
                ("pkg/x64/d3dx9_43.dll", b"MZ64"),
            ],
        );

        ArchiveUnpacker
            .unpack(&archive, &dest, RootLayout::StripCommonRoot)
            .unwrap();

        assert_eq!(std::fs::read(dest.join("x32/d3dx9_43.dll")).unwrap(), b"MZ32");
        assert_eq!(std::fs::read(dest.join("x64/d3dx9_43.dll")).unwrap(), b"MZ64");
    }

    #[test]
    fn verbatim_layout_keeps_single_root_folder() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("out");

        let tarball = temp.path().join("d3dx9.tar.gz");
        write_tar_gz(&tarball, &[("x32/d3dx9_43.dll", b"MZ", 0o644)]);
        ArchiveUnpacker
            .unpack(&tarball, &dest.join("tar"), RootLayout::Verbatim)
            .unwrap();
        assert!(dest.join("tar/x32/d3dx9_43.dll").is_file());

        let zipped = temp.path().join("d3dx9.zip");
        write_zip(&zipped, &[("pkg/x32/d3dx9_43.dll", b"MZ32")]);
        ArchiveUnpacker
            .unpack(&zipped, &dest.join("zip"), RootLayout::Verbatim)
            .unwrap();
        assert_eq!(
            std::fs::read(dest.join("zip/pkg/x32/d3dx9_43.dll")).unwrap(),
            b"MZ32"
        );
    }

    #[test]
    fn format_is_detected_from_content() {
        let temp = TempDir::new().unwrap();
        // A zip saved under the default tar.gz download name.
        let archive = temp.path().join("component.tar.gz");
        let dest = temp.path().join("out");
        write_zip(&archive, &[("a.dll", b"MZ"), ("b.dll", b"MZ")]);

        ArchiveUnpacker
            .unpack(&archive, &dest, RootLayout::StripCommonRoot)
            .unwrap();

        assert!(dest.join("a.dll").is_file());
        assert!(dest.join("b.dll").is_file());
    }

    #[test]
    fn corrupt_archive_is_unpack_failed() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("broken.tar.gz");
        std::fs::write(&archive, [0x1f, 0x8b, 0x00, 0x01, 0x02]).unwrap();

        let err = ArchiveUnpacker
            .unpack(&archive, &temp.path().join("out"), RootLayout::StripCommonRoot)
            .unwrap_err();
        assert!(matches!(err, VodkaError::UnpackFailed { .. }));
    }

    #[test]
    fn unknown_format_is_unpack_failed() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("notes.txt");
        std::fs::write(&archive, "plain text").unwrap();

        let err = ArchiveUnpacker
            .unpack(&archive, &temp.path().join("out"), RootLayout::StripCommonRoot)
            .unwrap_err();
        assert!(err.to_string().contains("Unrecognized archive format"));
    }

    #[test]
    fn reject_unsafe_paths() {
        assert!(reject_unsafe(Path::new("../etc/passwd")).is_err());
        assert!(reject_unsafe(Path::new("/etc/passwd")).is_err());
        assert!(reject_unsafe(Path::new("bin/wine")).is_ok());
    }

    #[test]
    fn common_root_requires_nesting() {
        assert_eq!(
            common_root_folder(vec![PathBuf::from("a/b"), PathBuf::from("a/c")]),
            Some(PathBuf::from("a"))
        );
        assert_eq!(common_root_folder(vec![PathBuf::from("a")]), None);
        assert_eq!(
            common_root_folder(vec![PathBuf::from("a/b"), PathBuf::from("c/d")]),
            None
        );
    }
}
