use std::path::Path;

use crate::command::CommandSpec;
use crate::distro::DistroFamily;
use crate::format::PackageFormat;
use crate::metadata::{parse_fields, PackageInfo};
use crate::registry::BackendOptions;

use super::{Backend, BackendKind};

/// Debian's low-level package tool.
#[derive(Debug, Clone, Copy)]
pub struct Dpkg;

impl Backend for Dpkg {
    fn kind(&self) -> BackendKind {
        BackendKind::Dpkg
    }

    fn executable(&self) -> &'static str {
        "dpkg"
    }

    fn format(&self) -> PackageFormat {
        PackageFormat::Deb
    }

    fn distro(&self) -> DistroFamily {
        DistroFamily::Debian
    }

    fn leading_args(&self, _options: &BackendOptions) -> Vec<String> {
        vec!["-i".to_string()]
    }

    fn already_installed_phrases(&self) -> &'static [&'static str] {
        &["is already installed", "newer version"]
    }

    fn dependency_phrases(&self) -> &'static [&'static str] {
        &[
            "dependency problems",
            "unmet dependencies",
            "depends on",
            "is not installed",
        ]
    }

    fn info_command(&self, path: &Path) -> Option<CommandSpec> {
        Some(
            CommandSpec::new("dpkg")
                .arg("-I")
                .arg(path.to_string_lossy()),
        )
    }

    fn parse_info(&self, output: &str) -> PackageInfo {
        let fields = parse_fields(output);
        PackageInfo {
            name: fields.get("package").cloned(),
            version: fields.get("version").cloned(),
            description: fields.get("description").cloned(),
            maintainer: fields.get("maintainer").cloned(),
            // Installed-Size is given in KiB
            installed_size: fields
                .get("installed-size")
                .and_then(|v| v.parse::<u64>().ok())
                .map(|kib| kib * 1024),
        }
    }

    fn installed_version_command(&self, name: &str) -> CommandSpec {
        CommandSpec::new("dpkg").arg("-l").arg(name)
    }

    fn parse_installed_version(&self, output: &str, name: &str) -> Option<String> {
        output.lines().find_map(|line| {
            let mut parts = line.split_whitespace();
            let status = parts.next()?;
            let package = parts.next()?;
            let version = parts.next()?;
            let base = package.split(':').next().unwrap_or(package);
            (status == "ii" && base == name).then(|| version.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DPKG_INFO: &str = " new Debian package, version 2.0.
 size 2412 bytes: control archive=512 bytes.
     245 bytes,     9 lines      control
 Package: hello
 Version: 2.10-3
 Architecture: amd64
 Maintainer: Santiago Vila <sanvila@debian.org>
 Installed-Size: 280
 Depends: libc6 (>= 2.34)
 Section: devel
 Priority: optional
 Homepage: https://www.gnu.org/software/hello/
 Description: example package based on GNU hello
  The GNU hello program produces a familiar, friendly greeting.
";

    #[test]
    fn test_parse_info() {
        let info = Dpkg.parse_info(DPKG_INFO);
        assert_eq!(info.name.as_deref(), Some("hello"));
        assert_eq!(info.version.as_deref(), Some("2.10-3"));
        assert_eq!(
            info.description.as_deref(),
            Some("example package based on GNU hello")
        );
        assert_eq!(
            info.maintainer.as_deref(),
            Some("Santiago Vila <sanvila@debian.org>")
        );
        assert_eq!(info.installed_size, Some(280 * 1024));
    }

    #[test]
    fn test_parse_installed_version() {
        let output = "Desired=Unknown/Install/Remove/Purge/Hold
||/ Name           Version      Architecture Description
+++-==============-============-============-=================================
ii  hello:amd64    2.10-3       amd64        example package based on GNU hello
";
        assert_eq!(
            Dpkg.parse_installed_version(output, "hello"),
            Some("2.10-3".to_string())
        );
        assert_eq!(Dpkg.parse_installed_version(output, "hell"), None);
    }

    #[test]
    fn test_removed_package_is_not_installed() {
        let output = "rc  hello          2.10-3       amd64        example\n";
        assert_eq!(Dpkg.parse_installed_version(output, "hello"), None);
    }

    #[test]
    fn test_descriptor_template() {
        let descriptor = Dpkg.descriptor(&BackendOptions::default());
        assert_eq!(descriptor.executable, "dpkg");
        assert_eq!(descriptor.args, vec!["-i", "{path}"]);
        assert!(descriptor.requires_privilege);
    }
}
