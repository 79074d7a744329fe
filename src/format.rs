//! Package format detection.
//!
//! Classification is driven by the file name: the terminal suffix sequence is
//! compared case-insensitively against a fixed table. Multi-part suffixes such as
//! `.pkg.tar.zst` are matched as a whole. An unrecognised name yields
//! [`PackageFormat::Unknown`], which is a normal value callers branch on.
//!
//! A magic-byte fallback ([`sniff`]) is available for files whose name carries no
//! usable suffix. It reads at most [`SNIFF_LEN`] bytes through a handle that is
//! closed before the function returns.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Number of leading bytes inspected by [`sniff`].
pub const SNIFF_LEN: u64 = 32;

const DEB_MAGIC: &[u8] = b"!<arch>\ndebian-binary";
const RPM_MAGIC: &[u8] = &[0xED, 0xAB, 0xEE, 0xDB];
const ZSTD_MAGIC: &[u8] = &[0x28, 0xB5, 0x2F, 0xFD];
const XZ_MAGIC: &[u8] = &[0xFD, b'7', b'z', b'X', b'Z', 0x00];

/// On-disk package archive conventions understood by Installium.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum PackageFormat {
    Deb,
    Rpm,
    Pacman,
    Apk,
    Unknown,
}

impl PackageFormat {
    /// All formats that map to an installer backend.
    pub const SUPPORTED: [PackageFormat; 4] = [
        PackageFormat::Deb,
        PackageFormat::Rpm,
        PackageFormat::Pacman,
        PackageFormat::Apk,
    ];

    #[must_use]
    pub fn is_known(&self) -> bool {
        !matches!(self, PackageFormat::Unknown)
    }
}

impl fmt::Display for PackageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PackageFormat::Deb => "deb",
            PackageFormat::Rpm => "rpm",
            PackageFormat::Pacman => "pacman",
            PackageFormat::Apk => "apk",
            PackageFormat::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Suffix table, longest suffixes first so multi-part names win.
const SUFFIXES: &[(&str, PackageFormat)] = &[
    (".pkg.tar.zst", PackageFormat::Pacman),
    (".pkg.tar.xz", PackageFormat::Pacman),
    (".deb", PackageFormat::Deb),
    (".rpm", PackageFormat::Rpm),
    (".apk", PackageFormat::Apk),
];

/// A package artifact on disk together with its detected format.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PackageFile {
    path: PathBuf,
    format: PackageFormat,
}

impl PackageFile {
    /// Classifies `path` by its name only.
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        let path = path.into();
        let format = detect(&path);
        PackageFile { path, format }
    }

    /// Classifies `path` by name, falling back to magic bytes when the name is
    /// not conclusive and `use_magic` is set.
    pub fn with_sniffing<P: Into<PathBuf>>(path: P, use_magic: bool) -> Self {
        let path = path.into();
        let format = detect_with_fallback(&path, use_magic);
        PackageFile { path, format }
    }

    /// The same package under another path, e.g. its canonical form. The
    /// detected format is kept since the new name may not carry the suffix.
    #[must_use]
    pub fn relocated<P: Into<PathBuf>>(&self, path: P) -> Self {
        PackageFile {
            path: path.into(),
            format: self.format,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn format(&self) -> PackageFormat {
        self.format
    }

    /// File name without the package suffix, used as a last-resort package name.
    #[must_use]
    pub fn stem(&self) -> String {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let lower = name.to_lowercase();
        for (suffix, _) in SUFFIXES {
            if lower.ends_with(suffix) && name.len() > suffix.len() {
                if let Some(stem) = name.get(..name.len() - suffix.len()) {
                    return stem.to_string();
                }
            }
        }
        name
    }
}

/// Classifies a path by its file name suffix.
#[must_use]
pub fn detect(path: &Path) -> PackageFormat {
    let Some(name) = path.file_name() else {
        return PackageFormat::Unknown;
    };
    let name = name.to_string_lossy().to_lowercase();

    let format = SUFFIXES
        .iter()
        .find(|(suffix, _)| name.len() > suffix.len() && name.ends_with(suffix))
        .map(|(_, format)| *format)
        .unwrap_or(PackageFormat::Unknown);

    trace!("Detected {} for {}", format, path.display());
    format
}

/// Name-based detection with an optional magic-byte fallback.
#[must_use]
pub fn detect_with_fallback(path: &Path, use_magic: bool) -> PackageFormat {
    let format = detect(path);
    if format.is_known() || !use_magic {
        return format;
    }

    match sniff(path) {
        Ok(sniffed) => {
            debug!("Magic bytes of {} suggest {}", path.display(), sniffed);
            sniffed
        }
        Err(e) => {
            debug!("Could not sniff {}: {}", path.display(), e);
            PackageFormat::Unknown
        }
    }
}

/// Reads the leading bytes of `path` and classifies them.
///
/// gzip streams are not mapped to APK because plain tarballs share that header.
pub fn sniff(path: &Path) -> std::io::Result<PackageFormat> {
    let mut head = Vec::with_capacity(SNIFF_LEN as usize);
    {
        let file = File::open(path)?;
        file.take(SNIFF_LEN).read_to_end(&mut head)?;
    }
    Ok(classify_magic(&head))
}

fn classify_magic(head: &[u8]) -> PackageFormat {
    if head.starts_with(DEB_MAGIC) {
        PackageFormat::Deb
    } else if head.starts_with(RPM_MAGIC) {
        PackageFormat::Rpm
    } else if head.starts_with(ZSTD_MAGIC) || head.starts_with(XZ_MAGIC) {
        PackageFormat::Pacman
    } else {
        PackageFormat::Unknown
    }
}
