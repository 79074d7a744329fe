use std::path::Path;

use crate::command::CommandSpec;
use crate::distro::DistroFamily;
use crate::format::PackageFormat;
use crate::metadata::{parse_fields, PackageInfo};
use crate::registry::BackendOptions;

use super::{Backend, BackendKind};

/// The RPM package manager used by Fedora and RHEL derivatives.
#[derive(Debug, Clone, Copy)]
pub struct Rpm;

impl Backend for Rpm {
    fn kind(&self) -> BackendKind {
        BackendKind::Rpm
    }

    fn executable(&self) -> &'static str {
        "rpm"
    }

    fn format(&self) -> PackageFormat {
        PackageFormat::Rpm
    }

    fn distro(&self) -> DistroFamily {
        DistroFamily::FedoraRhel
    }

    fn leading_args(&self, _options: &BackendOptions) -> Vec<String> {
        vec!["-i".to_string()]
    }

    fn already_installed_phrases(&self) -> &'static [&'static str] {
        &["is already installed", "which is newer than"]
    }

    fn dependency_phrases(&self) -> &'static [&'static str] {
        &["failed dependencies", "is needed by"]
    }

    fn info_command(&self, path: &Path) -> Option<CommandSpec> {
        Some(
            CommandSpec::new("rpm")
                .arg("-qip")
                .arg(path.to_string_lossy()),
        )
    }

    fn parse_info(&self, output: &str) -> PackageInfo {
        let fields = parse_fields(output);
        let version = match (fields.get("version"), fields.get("release")) {
            (Some(version), Some(release)) => Some(format!("{version}-{release}")),
            (Some(version), None) => Some(version.clone()),
            _ => None,
        };

        PackageInfo {
            name: fields.get("name").cloned(),
            version,
            description: fields.get("summary").cloned(),
            maintainer: fields
                .get("vendor")
                .or_else(|| fields.get("packager"))
                .cloned(),
            installed_size: fields.get("size").and_then(|v| v.parse::<u64>().ok()),
        }
    }

    fn installed_version_command(&self, name: &str) -> CommandSpec {
        CommandSpec::new("rpm").args(["-q", "--queryformat", "%{VERSION}-%{RELEASE}", name])
    }

    fn parse_installed_version(&self, output: &str, _name: &str) -> Option<String> {
        let trimmed = output.trim();
        if trimmed.is_empty() || trimmed.starts_with("package ") {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RPM_INFO: &str = "Name        : htop
Version     : 3.3.0
Release     : 1.fc40
Architecture: x86_64
Install Date: (not installed)
Group       : Unspecified
Size        : 454234
License     : GPL-2.0-only
Signature   : (none)
Source RPM  : htop-3.3.0-1.fc40.src.rpm
Build Date  : Thu 01 Feb 2024 12:00:00 PM UTC
Vendor      : Fedora Project
URL         : https://htop.dev
Summary     : Interactive process viewer
Description :
htop is an interactive text-mode process viewer for Linux.
";

    #[test]
    fn test_parse_info() {
        let info = Rpm.parse_info(RPM_INFO);
        assert_eq!(info.name.as_deref(), Some("htop"));
        assert_eq!(info.version.as_deref(), Some("3.3.0-1.fc40"));
        assert_eq!(info.description.as_deref(), Some("Interactive process viewer"));
        assert_eq!(info.maintainer.as_deref(), Some("Fedora Project"));
        assert_eq!(info.installed_size, Some(454234));
    }

    #[test]
    fn test_parse_installed_version() {
        assert_eq!(
            Rpm.parse_installed_version("3.3.0-1.fc40", "htop"),
            Some("3.3.0-1.fc40".to_string())
        );
        assert_eq!(
            Rpm.parse_installed_version("package htop is not installed\n", "htop"),
            None
        );
    }
}
