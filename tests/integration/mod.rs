//! Library-level integration tests.
//!
//! These drive the real executor against `sh` scripts standing in for the
//! package managers, so no system package is ever touched.

pub mod cancellation;
pub mod install_flow;

use installium::distro::FixedDistro;
use installium::escalation::{HostElevationProbe, PrivilegeEscalator};
use installium::registry::BackendDescriptorBuilder;
use installium::{
    BackendDescriptor, BackendKind, BackendRegistry, DistroFamily, Installer, PackageFormat,
};

/// A Debian row whose "package manager" is `sh -c <script> sh <path>`.
pub fn stub_descriptor(script: &str) -> BackendDescriptor {
    BackendDescriptorBuilder::default()
        .kind(BackendKind::Dpkg)
        .executable("sh")
        .args(vec![
            "-c".to_string(),
            script.to_string(),
            "sh".to_string(),
            "{path}".to_string(),
        ])
        .requires_privilege(false)
        .supported_formats([PackageFormat::Deb])
        .distro(DistroFamily::Debian)
        .build()
        .unwrap()
}

pub fn stub_installer(script: &str) -> Installer<FixedDistro, HostElevationProbe> {
    let mut registry = BackendRegistry::new();
    registry.register(stub_descriptor(script));
    Installer::new(
        registry,
        FixedDistro(DistroFamily::Debian),
        PrivilegeEscalator::new(HostElevationProbe),
    )
}

/// An empty `.deb` in a fresh temporary directory.
pub fn deb_file(name: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(name);
    std::fs::write(&path, b"").unwrap();
    (dir, path)
}
