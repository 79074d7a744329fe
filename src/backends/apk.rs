use std::path::Path;

use crate::command::CommandSpec;
use crate::distro::DistroFamily;
use crate::format::PackageFormat;
use crate::metadata::PackageInfo;
use crate::registry::BackendOptions;

use super::{Backend, BackendKind};

/// Alpine's package manager.
#[derive(Debug, Clone, Copy)]
pub struct Apk;

impl Backend for Apk {
    fn kind(&self) -> BackendKind {
        BackendKind::Apk
    }

    fn executable(&self) -> &'static str {
        "apk"
    }

    fn format(&self) -> PackageFormat {
        PackageFormat::Apk
    }

    fn distro(&self) -> DistroFamily {
        DistroFamily::Alpine
    }

    fn leading_args(&self, options: &BackendOptions) -> Vec<String> {
        let mut args = vec!["add".to_string(), "--allow-untrusted".to_string()];
        if !options.non_interactive {
            args.push("--interactive".to_string());
        }
        args
    }

    fn already_installed_phrases(&self) -> &'static [&'static str] {
        &["already installed"]
    }

    fn dependency_phrases(&self) -> &'static [&'static str] {
        &["unsatisfiable constraints", "no such package", "breaks:"]
    }

    // apk cannot describe a local file without installing it; the file name is used instead.
    fn info_command(&self, _path: &Path) -> Option<CommandSpec> {
        None
    }

    fn parse_info(&self, _output: &str) -> PackageInfo {
        PackageInfo::default()
    }

    fn installed_version_command(&self, name: &str) -> CommandSpec {
        CommandSpec::new("apk").args(["list", "--installed", name])
    }

    fn parse_installed_version(&self, output: &str, name: &str) -> Option<String> {
        let prefix = format!("{name}-");
        output.lines().find_map(|line| {
            let token = line.split_whitespace().next()?;
            let version = token.strip_prefix(&prefix)?;
            version
                .starts_with(|c: char| c.is_ascii_digit())
                .then(|| version.to_string())
        })
    }
}
