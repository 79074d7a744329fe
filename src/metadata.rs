//! Package file metadata and installed-version queries.
//!
//! Queries are read-only and run without privilege elevation. When a manager
//! cannot describe a file (or is missing from the host) the information is
//! recovered from the file name instead.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, trace};

use crate::backends::BackendKind;
use crate::command::CommandSpec;
use crate::format::{PackageFile, PackageFormat};

const KIB: f64 = 1024.0;
const MIB: f64 = 1_048_576.0;
const GIB: f64 = 1_073_741_824.0;

/// Architecture tokens stripped from the end of package file names.
const ARCH_NAMES: &[&str] = &[
    "x86_64", "amd64", "aarch64", "arm64", "armhf", "armv7h", "i386", "i686", "noarch",
    "any", "all",
];

/// Descriptive fields of a package file. Every field is optional because no
/// manager reports all of them.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct PackageInfo {
    pub name: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    pub maintainer: Option<String>,
    /// Installed size in bytes.
    pub installed_size: Option<u64>,
}

impl PackageInfo {
    /// Fills fields missing from `self` with those of `fallback`.
    #[must_use]
    pub fn or(self, fallback: PackageInfo) -> PackageInfo {
        PackageInfo {
            name: self.name.or(fallback.name),
            version: self.version.or(fallback.version),
            description: self.description.or(fallback.description),
            maintainer: self.maintainer.or(fallback.maintainer),
            installed_size: self.installed_size.or(fallback.installed_size),
        }
    }

    pub fn size_display(&self) -> Option<String> {
        self.installed_size.map(format_size)
    }
}

/// Splits `Key: Value` lines into a map with lowercased keys. Continuation lines
/// and lines without a colon are ignored; the first non-empty value per key wins.
pub fn parse_fields(output: &str) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    for line in output.lines() {
        let Some((key, value)) = line.trim().split_once(':') else {
            continue;
        };
        let key = key.trim().to_lowercase();
        let value = value.trim();
        if key.is_empty() || value.is_empty() {
            continue;
        }
        fields.entry(key).or_insert_with(|| value.to_string());
    }
    fields
}

/// Parses sizes such as `4.52 MiB` or `280 KiB` into bytes.
pub fn parse_human_size(text: &str) -> Option<u64> {
    let mut parts = text.split_whitespace();
    let number: f64 = parts.next()?.replace(',', ".").parse().ok()?;
    if !number.is_finite() || number < 0.0 {
        return None;
    }

    let multiplier = match parts.next().unwrap_or("B") {
        "B" => 1.0,
        "KiB" | "KB" | "K" => KIB,
        "MiB" | "MB" | "M" => MIB,
        "GiB" | "GB" | "G" => GIB,
        _ => return None,
    };
    Some((number * multiplier) as u64)
}

/// Renders a byte count with binary units, e.g. `4.5 MiB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];

    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = "B";
    for next in UNITS {
        if value < KIB {
            break;
        }
        value /= KIB;
        unit = next;
    }
    format!("{value:.1} {unit}")
}

/// Recovers name and version from a package file stem.
///
/// Handles `name_version_arch` (Debian), `name-version-release.arch` (RPM),
/// `name-version-rel-arch` (pacman) and `name-version-rN` (Alpine).
pub fn from_file_name(stem: &str, format: PackageFormat) -> PackageInfo {
    if format == PackageFormat::Deb {
        let mut parts = stem.splitn(3, '_');
        let name = parts.next().filter(|s| !s.is_empty()).map(str::to_string);
        let version = parts.next().filter(|s| !s.is_empty()).map(str::to_string);
        return PackageInfo {
            name,
            version,
            ..PackageInfo::default()
        };
    }

    let segments: Vec<&str> = stem.split('-').collect();
    let split_at = segments
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, seg)| seg.starts_with(|c: char| c.is_ascii_digit()))
        .map(|(i, _)| i);

    let Some(split_at) = split_at else {
        return PackageInfo {
            name: Some(stem.to_string()).filter(|s| !s.is_empty()),
            ..PackageInfo::default()
        };
    };

    let mut rest: Vec<String> = segments[split_at..].iter().map(|s| s.to_string()).collect();
    match format {
        PackageFormat::Pacman if rest.len() > 2 => {
            if rest.last().is_some_and(|last| ARCH_NAMES.contains(&last.as_str())) {
                rest.pop();
            }
        }
        PackageFormat::Rpm => {
            if let Some(last) = rest.last_mut() {
                if let Some((release, arch)) = last.rsplit_once('.') {
                    if ARCH_NAMES.contains(&arch) {
                        *last = release.to_string();
                    }
                }
            }
        }
        _ => {}
    }

    PackageInfo {
        name: Some(segments[..split_at].join("-")),
        version: Some(rest.join("-")),
        ..PackageInfo::default()
    }
}

/// Runs a read-only query and returns its stdout when it exits successfully.
async fn query(command: &CommandSpec) -> Option<String> {
    trace!("Running query: {}", command);
    let output = Command::new(&command.program)
        .args(&command.args)
        .env("LC_ALL", "C")
        .output()
        .await;

    match output {
        Ok(output) if output.status.success() => {
            Some(String::from_utf8_lossy(&output.stdout).into_owned())
        }
        Ok(output) => {
            debug!("Query '{}' exited with {}", command, output.status);
            None
        }
        Err(e) => {
            debug!("Query '{}' could not start: {}", command, e);
            None
        }
    }
}

/// Describes a package file, preferring the manager's own metadata query and
/// falling back to the file name.
pub async fn inspect(package: &PackageFile) -> PackageInfo {
    let fallback = from_file_name(&package.stem(), package.format());
    let Some(kind) = BackendKind::for_format(package.format()) else {
        return fallback;
    };

    let backend = kind.backend();
    let Some(command) = backend.info_command(package.path()) else {
        return fallback;
    };

    match query(&command).await {
        Some(output) => backend.parse_info(&output).or(fallback),
        None => fallback,
    }
}

/// Version of `name` currently installed through `kind`, if any.
pub async fn installed_version(kind: BackendKind, name: &str) -> Option<String> {
    let backend = kind.backend();
    if which::which(backend.executable()).is_err() {
        debug!("{} not on PATH; skipping installed-version query", backend.executable());
        return None;
    }

    let output = query(&backend.installed_version_command(name)).await?;
    backend.parse_installed_version(&output, name)
}
