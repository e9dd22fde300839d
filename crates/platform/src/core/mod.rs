//! The collaborator bundle handed to the session and receipt database

use std::sync::Arc;

use crate::diskimage::DiskImageMounter;
use crate::filesystem::FileOwnership;
use crate::osinstaller::OsInstallerStager;
use crate::package::PackageInstaller;
use crate::power::SleepPreventer;
use crate::processes::ProcessInspector;
use crate::registry::PackageRegistry;
use crate::scripts::ScriptRunner;
use crate::selfserve::SelfServeManifest;

/// Every OS facility the engine touches, behind a trait object
///
/// Tests build one of these from fakes; production code uses
/// [`crate::MacOSPlatform::new`].
#[derive(Clone)]
pub struct Platform {
    pub scripts: Arc<dyn ScriptRunner>,
    pub packages: Arc<dyn PackageInstaller>,
    pub images: Arc<dyn DiskImageMounter>,
    pub files: Arc<dyn FileOwnership>,
    pub registry: Arc<dyn PackageRegistry>,
    pub os_installer: Arc<dyn OsInstallerStager>,
    pub processes: Arc<dyn ProcessInspector>,
    pub power: Arc<dyn SleepPreventer>,
    pub self_serve: Arc<dyn SelfServeManifest>,
}
