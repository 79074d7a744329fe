//! Native package manager backends.
//!
//! Each supported manager is a unit type implementing [`Backend`]. The type knows
//! how its install command is shaped, which phrases in its output identify known
//! failure modes, and how to query package metadata. [`BackendKind`] is the closed
//! set of managers and hands out the matching implementation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::format::PackageFormat;

pub mod apk;
pub mod dpkg;
pub mod pacman;
pub mod rpm;
pub mod traits;

pub use traits::Backend;

/// The package managers Installium can drive.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Dpkg,
    Rpm,
    Pacman,
    Apk,
}

impl BackendKind {
    /// Registration order of the builtin table.
    pub const ALL: [BackendKind; 4] = [
        BackendKind::Dpkg,
        BackendKind::Rpm,
        BackendKind::Pacman,
        BackendKind::Apk,
    ];

    /// Returns the implementation for this manager.
    #[must_use]
    pub fn backend(&self) -> &'static dyn Backend {
        match self {
            BackendKind::Dpkg => &dpkg::Dpkg,
            BackendKind::Rpm => &rpm::Rpm,
            BackendKind::Pacman => &pacman::Pacman,
            BackendKind::Apk => &apk::Apk,
        }
    }

    /// The manager that installs `format`, if any.
    #[must_use]
    pub fn for_format(format: PackageFormat) -> Option<BackendKind> {
        BackendKind::ALL
            .into_iter()
            .find(|kind| kind.backend().format() == format)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.backend().executable())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BackendKind::ALL
            .into_iter()
            .find(|kind| kind.backend().executable().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown backend '{s}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distro::DistroFamily;

    #[test]
    fn test_kind_round_trips_through_name() {
        for kind in BackendKind::ALL {
            let parsed: BackendKind = kind.to_string().parse().unwrap();
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn test_each_backend_serves_one_format_and_distro() {
        let pairs: Vec<_> = BackendKind::ALL
            .iter()
            .map(|k| (k.backend().format(), k.backend().distro()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                (PackageFormat::Deb, DistroFamily::Debian),
                (PackageFormat::Rpm, DistroFamily::FedoraRhel),
                (PackageFormat::Pacman, DistroFamily::Arch),
                (PackageFormat::Apk, DistroFamily::Alpine),
            ]
        );
    }

    #[test]
    fn test_for_format() {
        assert_eq!(
            BackendKind::for_format(PackageFormat::Pacman),
            Some(BackendKind::Pacman)
        );
        assert_eq!(BackendKind::for_format(PackageFormat::Unknown), None);
    }

    #[test]
    fn test_unknown_backend_name() {
        assert!("zypper".parse::<BackendKind>().is_err());
    }
}
