use std::path::Path;

use crate::command::CommandSpec;
use crate::distro::DistroFamily;
use crate::format::PackageFormat;
use crate::metadata::PackageInfo;
use crate::registry::{BackendDescriptor, BackendOptions, PATH_PLACEHOLDER};

use super::BackendKind;

/// Behaviour shared by every native package manager.
///
/// Implementations are stateless; everything host-specific (non-interactive mode,
/// extra arguments) arrives through [`BackendOptions`].
pub trait Backend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Executable name looked up on `PATH`.
    fn executable(&self) -> &'static str;

    /// The package format this manager installs.
    fn format(&self) -> PackageFormat;

    /// The distribution family on which this manager is canonical.
    fn distro(&self) -> DistroFamily;

    /// Flags placed before the package path.
    fn leading_args(&self, options: &BackendOptions) -> Vec<String>;

    /// Output phrases meaning the package (or a newer one) is already present.
    fn already_installed_phrases(&self) -> &'static [&'static str];

    /// Output phrases meaning dependencies could not be satisfied.
    fn dependency_phrases(&self) -> &'static [&'static str];

    /// Read-only query printing metadata of a package file, if the manager has one.
    fn info_command(&self, path: &Path) -> Option<CommandSpec>;

    /// Parses the output of [`Backend::info_command`].
    fn parse_info(&self, output: &str) -> PackageInfo;

    /// Query printing the installed version of `name`.
    fn installed_version_command(&self, name: &str) -> CommandSpec;

    /// Parses the output of [`Backend::installed_version_command`].
    fn parse_installed_version(&self, output: &str, name: &str) -> Option<String>;

    /// Builds the registry row for this manager.
    fn descriptor(&self, options: &BackendOptions) -> BackendDescriptor {
        let mut args = self.leading_args(options);
        if let Some(extra) = options.extra_args.get(&self.kind()) {
            args.extend(extra.iter().cloned());
        }
        args.push(PATH_PLACEHOLDER.to_string());

        BackendDescriptor {
            kind: self.kind(),
            executable: self.executable().to_string(),
            args,
            requires_privilege: true,
            supported_formats: [self.format()].into_iter().collect(),
            distro: Some(self.distro()),
        }
    }
}
