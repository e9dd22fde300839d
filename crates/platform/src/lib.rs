//! Platform abstraction layer for the managed install agent
//!
//! Every OS facility the engine uses sits behind a trait so the orchestration
//! logic can run against fakes:
//! - Scripts, packages and disk images (`installer`, `hdiutil`)
//! - Copies and ownership (`ditto`, `chown`, `chgrp`, `chmod`, `xattr`)
//! - The OS package registry (`pkgutil`)
//! - Process listing, sleep prevention and the self-service manifest

pub mod core;
pub mod diskimage;
pub mod filesystem;
pub mod implementations;
pub mod osinstaller;
pub mod package;
pub mod power;
pub mod process;
pub mod processes;
pub mod registry;
pub mod scripts;
pub mod selfserve;

pub use core::Platform;
pub use implementations::macos::MacOSPlatform;

pub use diskimage::{DiskImageMounter, MountGuard};
pub use filesystem::FileOwnership;
pub use osinstaller::OsInstallerStager;
pub use package::{PackageInstaller, PackageOutcome};
pub use power::{SleepAssertion, SleepPreventer};
pub use processes::ProcessInspector;
pub use registry::{PackageFile, PackageInfo, PackageRegistry};
pub use scripts::ScriptRunner;
pub use selfserve::{SelfServeManifest, SelfServeSection};
