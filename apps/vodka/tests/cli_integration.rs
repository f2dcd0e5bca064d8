#![warn(clippy::pedantic)]

//! Integration tests for the vodka CLI.
//!
//! These tests spawn the compiled `vodka` binary against a managed root in a
//! temporary directory (`VODKA_HOME`) and validate its behavior through
//! stdout, stderr, exit codes and the resulting directory tree.
//!
//! ## Test Strategy
//!
//! 1. **CLI metadata**: help and version output
//! 2. **Catalog browsing**: grouping, markers, filters, JSON, refresh
//! 3. **Version lifecycle**: install, first-install default, idempotent
//!    reinstall, rollback of failed installs, default switching, uninstall
//! 4. **Execute**: program lookup in the version's `bin/`, `WINEPREFIX`,
//!    exit code propagation
//! 5. **Components**: prefix patching with unrelated registry content kept
//!
//! ## Test Infrastructure
//!
//! - Catalogs are written straight into the managed root, so nothing is
//!   fetched from the network
//! - Artifacts are tar.gz files built in the test and referenced by
//!   `file://` URIs
//! - The catalog URLs point at missing local files so an accidental
//!   refresh fails fast instead of reaching out
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p vodka
//! ```

use assert_cmd::prelude::*;
use assert_fs::TempDir;
use assert_fs::fixture::ChildPath;
use assert_fs::prelude::*;
use predicates::prelude::*;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::Command;

/// A managed root plus a directory of test artifacts.
struct Fixture {
    temp: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let fixture = Self {
            temp: TempDir::new().expect("Should create temp dir"),
        };
        fixture.root().create_dir_all().expect("Should create root");
        fixture
    }

    fn root(&self) -> ChildPath {
        self.temp.child("vodka")
    }

    fn artifact(&self, name: &str) -> ChildPath {
        self.temp.child("artifacts").child(name)
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("vodka"));
        cmd.env("VODKA_HOME", self.root().path())
            .env("VODKA_VERSIONS_URL", self.missing_url("versions.json"))
            .env("VODKA_COMPONENTS_URL", self.missing_url("components.json"))
            .env_remove("RUST_LOG")
            .env_remove("WINEPREFIX");
        cmd
    }

    fn missing_url(&self, name: &str) -> String {
        file_uri(&self.temp.path().join("missing").join(name))
    }

    /// Writes a version archive whose `bin/wine` echoes its version and arguments.
    fn version_archive(&self, name: &str) -> PathBuf {
        let script = format!(
            "#!/bin/sh\n\
             echo \"{name} $* prefix=$WINEPREFIX\"\n\
             [ \"$1\" = fail ] && exit 4\n\
             exit 0\n"
        );
        let bin = format!("wine-{name}/bin/wine");
        let lib = format!("wine-{name}/lib/wine/ntdll.so");
        let archive = self.artifact(&format!("{name}.tar.gz"));
        tar_gz(
            archive.path(),
            &[(bin.as_str(), script.as_str(), 0o755), (lib.as_str(), "elf", 0o644)],
        );
        archive.path().to_path_buf()
    }

    /// Writes the standard versions catalog with two good entries and a broken one.
    fn versions_catalog(&self) {
        let stable = self.version_archive("stable-9.0");
        let staging = self.version_archive("staging-7.0");
        let garbage = self.artifact("broken.tar.gz");
        garbage.write_str("this is not an archive").unwrap();

        let catalog = json!({
            "categories": [
                { "id": "stable", "name": "Wine Stable" },
                { "id": "staging", "name": "Wine Staging" }
            ],
            "versions": {
                "stable": [
                    { "name": "stable-9.0", "title": "Wine 9.0", "uri": file_uri(&stable) }
                ],
                "staging": [
                    { "name": "staging-7.0", "title": "Wine Staging 7.0", "uri": file_uri(&staging) },
                    { "name": "broken", "title": "Broken Build", "uri": file_uri(garbage.path()) }
                ]
            }
        });
        self.root()
            .child("versions.json")
            .write_str(&catalog.to_string())
            .unwrap();
    }

    /// Writes a components catalog with `d3dx9`, a `dll_override` component.
    fn components_catalog(&self) {
        let archive = self.artifact("d3dx9.tar.gz");
        tar_gz(
            archive.path(),
            &[
                ("x32/d3dx9_43.dll", "dll32", 0o644),
                ("x64/d3dx9_43.dll", "dll64", 0o644),
            ],
        );

        let catalog = json!({
            "categories": [{ "id": "directx", "name": "DirectX" }],
            "components": {
                "directx": [{
                    "name": "d3dx9",
                    "title": "DirectX 9 runtime",
                    "uri": file_uri(archive.path()),
                    "installation": {
                        "type": "dll_override",
                        "files": {
                            "x32": { "source": "x32/*.dll", "dlls": ["d3dx9_43.dll"] },
                            "x64": { "source": "x64/*.dll", "dlls": ["d3dx9_43.dll"] }
                        },
                        "overrides": ["d3dx9_43=native"]
                    }
                }]
            }
        });
        self.root()
            .child("components.json")
            .write_str(&catalog.to_string())
            .unwrap();
    }

    fn install(&self, name: &str) {
        self.cmd().args(["install", name]).assert().success();
    }
}

fn file_uri(path: &Path) -> String {
    format!("file://{}", path.display())
}

/// Builds a gzip-compressed tarball from `(path, content, mode)` triples.
fn tar_gz(dest: &Path, files: &[(&str, &str, u32)]) {
    std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
    let file = std::fs::File::create(dest).unwrap();
    let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (path, content, mode) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(*mode);
        builder
            .append_data(&mut header, path, content.as_bytes())
            .unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap();
}

// -- CLI metadata --

#[test]
fn help_shows_available_commands() {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("vodka"));
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("install"))
        .stdout(predicate::str::contains("component"))
        .stdout(predicate::str::contains("execute"))
        .stdout(predicate::str::contains("VODKA_HOME"));
}

#[test]
fn version_flag_shows_version() {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("vodka"));
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn component_without_subcommand_fails() {
    let fixture = Fixture::new();
    fixture.cmd().arg("component").assert().failure();
}

// -- Catalog browsing --

#[test]
fn list_groups_versions_by_category() {
    let fixture = Fixture::new();
    fixture.versions_catalog();

    fixture
        .cmd()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("Wine versions (page 1 of 1):"))
        .stdout(predicate::str::contains(
            "Wine Stable:\n  [ ] [ ] Wine 9.0 (stable-9.0)",
        ))
        .stdout(predicate::str::contains(
            "Wine Staging:\n  [ ] [ ] Broken Build (broken)\n  [ ] [ ] Wine Staging 7.0 (staging-7.0)",
        ))
        .stdout(predicate::str::contains("✓ = installed, * = default"));
}

#[test]
fn list_filter_matches_title() {
    let fixture = Fixture::new();
    fixture.versions_catalog();

    fixture
        .cmd()
        .args(["list", "--filter", "STAGING"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(staging-7.0)"))
        .stdout(predicate::str::contains("(stable-9.0)").not());
}

#[test]
fn list_installed_on_empty_root_explains_itself() {
    let fixture = Fixture::new();
    fixture.versions_catalog();

    fixture
        .cmd()
        .args(["list", "--installed"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No entries found."));
}

#[test]
fn list_page_out_of_range_fails() {
    let fixture = Fixture::new();
    fixture.versions_catalog();

    fixture
        .cmd()
        .args(["list", "--page", "5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Page 5 does not exist"));
}

#[test]
fn list_without_catalog_reports_fetch_failure() {
    let fixture = Fixture::new();

    fixture
        .cmd()
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load the versions catalog"));
}

#[test]
fn list_rejects_corrupt_catalog() {
    let fixture = Fixture::new();
    fixture
        .root()
        .child("versions.json")
        .write_str(r#"{ "versions": [1, 2, 3] }"#)
        .unwrap();

    fixture
        .cmd()
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("corrupt"));
}

#[test]
fn refresh_fetches_from_configured_url() {
    let fixture = Fixture::new();
    fixture.versions_catalog();
    let published = fixture.artifact("published.json");
    std::fs::rename(fixture.root().child("versions.json").path(), published.path()).unwrap();

    fixture
        .cmd()
        .arg("refresh")
        .env("VODKA_VERSIONS_URL", file_uri(published.path()))
        .assert()
        .success()
        .stdout(predicate::str::contains("3 versions available"));

    fixture.root().child("versions.json").assert(predicate::path::is_file());
}

#[test]
fn refresh_with_unreachable_url_keeps_old_catalog() {
    let fixture = Fixture::new();
    fixture.versions_catalog();

    fixture.cmd().arg("refresh").assert().failure();

    fixture
        .cmd()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("(stable-9.0)"));
}

// -- Version lifecycle --

#[cfg(unix)]
#[test]
fn first_install_becomes_default() {
    let fixture = Fixture::new();
    fixture.versions_catalog();

    fixture
        .cmd()
        .args(["install", "stable-9.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("stable-9.0 installed successfully."))
        .stdout(predicate::str::contains("stable-9.0 is now the default version."));

    let root = fixture.root();
    root.child("stable-9.0/bin/wine").assert(predicate::path::is_file());
    root.child("stable-9.0/lib/wine/ntdll.so").assert(predicate::path::is_file());
    root.child(".staging-stable-9.0").assert(predicate::path::missing());

    let target = std::fs::read_link(root.child("default").path()).unwrap();
    assert_eq!(target.file_name().unwrap(), "stable-9.0");

    fixture
        .cmd()
        .arg("default")
        .assert()
        .success()
        .stdout("stable-9.0\n");

    fixture
        .cmd()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("[✓] [*] Wine 9.0 (stable-9.0)"));
}

#[cfg(unix)]
#[test]
fn install_is_case_insensitive_and_idempotent() {
    let fixture = Fixture::new();
    fixture.versions_catalog();

    fixture
        .cmd()
        .args(["install", "STABLE-9.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("stable-9.0 installed successfully."));

    fixture
        .cmd()
        .args(["install", "stable-9.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("stable-9.0 is already installed."));

    let target = std::fs::read_link(fixture.root().child("default").path()).unwrap();
    assert_eq!(target.file_name().unwrap(), "stable-9.0");
}

#[cfg(unix)]
#[test]
fn second_install_keeps_existing_default() {
    let fixture = Fixture::new();
    fixture.versions_catalog();
    fixture.install("stable-9.0");

    fixture
        .cmd()
        .args(["install", "staging-7.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("vodka default staging-7.0"));

    fixture.cmd().arg("default").assert().stdout("stable-9.0\n");
}

#[cfg(unix)]
#[test]
fn relative_home_keeps_default_pointer_resolvable() {
    let fixture = Fixture::new();
    fixture.versions_catalog();

    fixture
        .cmd()
        .current_dir(fixture.temp.path())
        .env("VODKA_HOME", "vodka")
        .args(["install", "stable-9.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("stable-9.0 is now the default version."));

    let link = fixture.root().child("default");
    let resolved = std::fs::canonicalize(link.path()).expect("default pointer must resolve");
    assert_eq!(
        resolved,
        std::fs::canonicalize(fixture.root().child("stable-9.0").path()).unwrap()
    );

    fixture
        .cmd()
        .current_dir(fixture.temp.path())
        .env("VODKA_HOME", "vodka")
        .arg("default")
        .assert()
        .success()
        .stdout("stable-9.0\n");
}

#[test]
fn install_unknown_version_suggests_search() {
    let fixture = Fixture::new();
    fixture.versions_catalog();

    fixture
        .cmd()
        .args(["install", "nope-1.0"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("version not found: nope-1.0"))
        .stderr(predicate::str::contains("vodka list --filter nope-1.0"))
        .stderr(predicate::str::contains("vodka refresh"));
}

#[test]
fn failed_unpack_leaves_nothing_behind() {
    let fixture = Fixture::new();
    fixture.versions_catalog();

    fixture
        .cmd()
        .args(["install", "broken"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("installation of broken failed"));

    let root = fixture.root();
    root.child("broken").assert(predicate::path::missing());
    root.child(".staging-broken").assert(predicate::path::missing());
    root.child(".downloads/broken.tar.gz")
        .assert(predicate::path::missing());
    root.child("default").assert(predicate::path::missing());
}

#[test]
fn failed_download_leaves_nothing_behind() {
    let fixture = Fixture::new();
    let catalog = json!({
        "versions": {
            "stable": [{
                "name": "ghost",
                "title": "Ghost",
                "uri": fixture.missing_url("ghost.tar.gz")
            }]
        }
    });
    fixture
        .root()
        .child("versions.json")
        .write_str(&catalog.to_string())
        .unwrap();

    fixture
        .cmd()
        .args(["install", "ghost"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("download failed"));

    fixture.root().child("ghost").assert(predicate::path::missing());
}

#[test]
fn checksum_mismatch_aborts_install() {
    let fixture = Fixture::new();
    let archive = fixture.version_archive("stable-9.0");
    let catalog = json!({
        "versions": {
            "stable": [{
                "name": "stable-9.0",
                "title": "Wine 9.0",
                "uri": file_uri(&archive),
                "sha256": "00".repeat(32)
            }]
        }
    });
    fixture
        .root()
        .child("versions.json")
        .write_str(&catalog.to_string())
        .unwrap();

    fixture
        .cmd()
        .args(["install", "stable-9.0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("checksum mismatch"));

    fixture.root().child("stable-9.0").assert(predicate::path::missing());
}

#[cfg(unix)]
#[test]
fn default_switches_between_installed_versions() {
    let fixture = Fixture::new();
    fixture.versions_catalog();
    fixture.install("stable-9.0");
    fixture.install("staging-7.0");

    fixture
        .cmd()
        .args(["default", "Staging-7.0"])
        .assert()
        .success()
        .stdout("Default version set to staging-7.0.\n");

    fixture
        .cmd()
        .args(["default", "staging-7.0"])
        .assert()
        .success()
        .stdout("staging-7.0 is already the default.\n");

    fixture
        .cmd()
        .args(["default", "broken"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("vodka install broken"));

    fixture.cmd().arg("default").assert().stdout("staging-7.0\n");
}

#[test]
fn default_without_any_install_reports_none() {
    let fixture = Fixture::new();

    fixture
        .cmd()
        .arg("default")
        .assert()
        .success()
        .stdout(predicate::str::contains("No default version set."));
}

#[cfg(unix)]
#[test]
fn uninstall_default_moves_pointer() {
    let fixture = Fixture::new();
    fixture.versions_catalog();
    fixture.install("stable-9.0");
    fixture.install("staging-7.0");

    fixture
        .cmd()
        .args(["uninstall", "stable-9.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Default version changed to staging-7.0."));
    fixture.root().child("stable-9.0").assert(predicate::path::missing());

    fixture
        .cmd()
        .args(["uninstall", "staging-7.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Default has been cleared."));
    fixture.root().child("default").assert(predicate::path::missing());

    fixture
        .cmd()
        .args(["uninstall", "staging-7.0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("staging-7.0 is not installed"));
}

#[cfg(unix)]
#[test]
fn uninstall_resolves_catalog_name_case_insensitively() {
    let fixture = Fixture::new();
    fixture.versions_catalog();
    fixture.install("stable-9.0");

    fixture
        .cmd()
        .args(["uninstall", "STABLE-9.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("stable-9.0 uninstalled."));
    fixture.root().child("stable-9.0").assert(predicate::path::missing());

    fixture
        .cmd()
        .args(["uninstall", "staging-7.0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("staging-7.0 is not installed"));

    fixture
        .cmd()
        .args(["uninstall", "wine-99"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("wine-99 is not installed"));
}

// -- Execute --

#[cfg(unix)]
#[test]
fn execute_uses_default_version_bin() {
    let fixture = Fixture::new();
    fixture.versions_catalog();
    fixture.install("stable-9.0");

    fixture
        .cmd()
        .args(["execute", "wine", "notepad.exe"])
        .assert()
        .success()
        .stdout("stable-9.0 notepad.exe prefix=\n");
}

#[cfg(unix)]
#[test]
fn execute_with_explicit_version_and_prefix() {
    let fixture = Fixture::new();
    fixture.versions_catalog();
    fixture.install("stable-9.0");
    fixture.install("staging-7.0");

    fixture
        .cmd()
        .args(["execute", "--prefix", "/tmp/games", "staging-7.0", "wine", "--frobnicate"])
        .assert()
        .success()
        .stdout("staging-7.0 --frobnicate prefix=/tmp/games\n");
}

#[cfg(unix)]
#[test]
fn execute_propagates_exit_code() {
    let fixture = Fixture::new();
    fixture.versions_catalog();
    fixture.install("stable-9.0");

    fixture
        .cmd()
        .args(["execute", "wine", "fail"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("Error").not());
}

#[test]
fn execute_without_default_fails() {
    let fixture = Fixture::new();

    fixture
        .cmd()
        .args(["execute", "wine"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no default version is set"));
}

// -- Components --

#[cfg(unix)]
#[test]
fn component_install_patches_prefix_and_keeps_unrelated_sections() {
    let fixture = Fixture::new();
    fixture.components_catalog();

    let prefix = fixture.temp.child("prefix");
    let foo_section = "[Software\\\\Foo] 1700000000\n#time=1d9b0c2a3e4f5a6\n\"Bar\"=\"baz\"\n";
    prefix
        .child("user.reg")
        .write_str(&format!(
            "WINE REGISTRY Version 2\n;; All keys relative to \\\\User\\\\S-1-5-21\n\n{foo_section}"
        ))
        .unwrap();

    fixture
        .cmd()
        .args(["component", "install", "D3DX9", "--prefix"])
        .arg(prefix.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Component d3dx9 downloaded."))
        .stdout(predicate::str::contains("2 file(s) copied"))
        .stdout(predicate::str::contains("1 DLL override(s) registered"));

    prefix
        .child("drive_c/windows/system32/d3dx9_43.dll")
        .assert("dll32");
    prefix
        .child("drive_c/windows/system64/d3dx9_43.dll")
        .assert("dll64");

    let user_reg = std::fs::read_to_string(prefix.child("user.reg").path()).unwrap();
    assert!(user_reg.contains(foo_section));
    assert!(user_reg.contains("[Software\\\\Wine\\\\DllOverrides]"));
    assert_eq!(user_reg.matches("\"d3dx9_43\"=\"native\"").count(), 1);

    // A second run reuses the unpacked component and does not duplicate the override.
    fixture
        .cmd()
        .args(["component", "install", "d3dx9", "--prefix"])
        .arg(prefix.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("already downloaded"));
    let user_reg = std::fs::read_to_string(prefix.child("user.reg").path()).unwrap();
    assert_eq!(user_reg.matches("\"d3dx9_43\"=\"native\"").count(), 1);
}

#[test]
fn component_install_without_prefix_only_downloads() {
    let fixture = Fixture::new();
    fixture.components_catalog();

    fixture
        .cmd()
        .args(["component", "install", "d3dx9"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Pass --prefix"));

    fixture
        .root()
        .child("components/d3dx9/x32/d3dx9_43.dll")
        .assert(predicate::path::is_file());

    fixture
        .cmd()
        .args(["component", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[✓] DirectX 9 runtime (d3dx9)"));

    fixture
        .cmd()
        .args(["component", "uninstall", "d3dx9"])
        .assert()
        .success();
    fixture
        .root()
        .child("components/d3dx9")
        .assert(predicate::path::missing());
}

#[test]
fn component_unknown_suggests_component_search() {
    let fixture = Fixture::new();
    fixture.components_catalog();

    fixture
        .cmd()
        .args(["component", "install", "dxvk"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("component not found: dxvk"))
        .stderr(predicate::str::contains("vodka component list --filter dxvk"));
}

#[test]
fn component_list_json_is_machine_readable() {
    let fixture = Fixture::new();
    fixture.components_catalog();

    let output = fixture
        .cmd()
        .args(["component", "list", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let rows: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(rows[0]["name"], "d3dx9");
    assert_eq!(rows[0]["category_name"], "DirectX");
    assert_eq!(rows[0]["installed"], false);
}
