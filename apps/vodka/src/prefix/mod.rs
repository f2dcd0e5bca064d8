//! Wine prefix patching.
//!
//! Applies unpacked components to a prefix: architecture-split DLL copies
//! into `drive_c/windows/system32` / `system64`, DLL overrides in `user.reg`
//! and environment variables in `system.reg`.

pub mod manifest;
pub mod patcher;
pub mod registry;

pub use manifest::InstallManifest;
pub use patcher::{ComponentInstaller, PatchReport};
