use std::path::Path;

use crate::command::CommandSpec;
use crate::distro::DistroFamily;
use crate::format::PackageFormat;
use crate::metadata::{parse_fields, parse_human_size, PackageInfo};
use crate::registry::BackendOptions;

use super::{Backend, BackendKind};

/// Arch Linux's package manager.
#[derive(Debug, Clone, Copy)]
pub struct Pacman;

impl Backend for Pacman {
    fn kind(&self) -> BackendKind {
        BackendKind::Pacman
    }

    fn executable(&self) -> &'static str {
        "pacman"
    }

    fn format(&self) -> PackageFormat {
        PackageFormat::Pacman
    }

    fn distro(&self) -> DistroFamily {
        DistroFamily::Arch
    }

    fn leading_args(&self, options: &BackendOptions) -> Vec<String> {
        let mut args = vec!["-U".to_string()];
        if options.non_interactive {
            args.push("--noconfirm".to_string());
        }
        args
    }

    fn already_installed_phrases(&self) -> &'static [&'static str] {
        &["is up to date", "already installed", "newer version"]
    }

    fn dependency_phrases(&self) -> &'static [&'static str] {
        &[
            "could not satisfy dependencies",
            "unable to satisfy dependency",
            "breaks dependency",
            "target not found",
        ]
    }

    fn info_command(&self, path: &Path) -> Option<CommandSpec> {
        Some(
            CommandSpec::new("pacman")
                .arg("-Qip")
                .arg(path.to_string_lossy()),
        )
    }

    fn parse_info(&self, output: &str) -> PackageInfo {
        let fields = parse_fields(output);
        PackageInfo {
            name: fields.get("name").cloned(),
            version: fields.get("version").cloned(),
            description: fields.get("description").cloned(),
            maintainer: fields.get("packager").cloned(),
            installed_size: fields
                .get("installed size")
                .and_then(|v| parse_human_size(v)),
        }
    }

    fn installed_version_command(&self, name: &str) -> CommandSpec {
        CommandSpec::new("pacman").arg("-Q").arg(name)
    }

    fn parse_installed_version(&self, output: &str, name: &str) -> Option<String> {
        output.lines().find_map(|line| {
            let mut parts = line.split_whitespace();
            let package = parts.next()?;
            let version = parts.next()?;
            (package == name).then(|| version.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PACMAN_INFO: &str = "Name            : ripgrep
Version         : 14.1.0-1
Description     : A search tool that combines the usability of ag with the raw speed of grep
Architecture    : x86_64
URL             : https://github.com/BurntSushi/ripgrep
Licenses        : MIT  custom
Depends On      : gcc-libs  pcre2
Installed Size  : 4.52 MiB
Packager        : Arch Packager <packager@archlinux.org>
Build Date      : Mon 08 Jan 2024 10:00:00 AM UTC
";

    #[test]
    fn test_parse_info() {
        let info = Pacman.parse_info(PACMAN_INFO);
        assert_eq!(info.name.as_deref(), Some("ripgrep"));
        assert_eq!(info.version.as_deref(), Some("14.1.0-1"));
        assert_eq!(
            info.maintainer.as_deref(),
            Some("Arch Packager <packager@archlinux.org>")
        );
        assert_eq!(
            info.installed_size,
            Some((4.52_f64 * 1_048_576.0) as u64)
        );
    }

    #[test]
    fn test_parse_installed_version() {
        assert_eq!(
            Pacman.parse_installed_version("ripgrep 14.1.0-1\n", "ripgrep"),
            Some("14.1.0-1".to_string())
        );
        assert_eq!(
            Pacman.parse_installed_version("error: package 'foo' was not found\n", "foo"),
            None
        );
    }

    #[test]
    fn test_noconfirm_follows_options() {
        let interactive = BackendOptions {
            non_interactive: false,
            ..BackendOptions::default()
        };
        assert_eq!(Pacman.leading_args(&interactive), vec!["-U"]);
        assert_eq!(
            Pacman.leading_args(&BackendOptions::default()),
            vec!["-U", "--noconfirm"]
        );
    }
}
