//! Host distribution resolution.
//!
//! The distribution family decides which native package manager is canonical on
//! the host. It is resolved from the os-release identification file, falling back
//! to the presence of package manager executables on `PATH`. Missing files are not
//! errors; they only move resolution on to the next candidate.
//!
//! The resolved value is cached process-wide by [`resolve_distro`]. Tests and
//! callers with a known answer inject a [`ResolveDistro`] implementation instead of
//! touching the shared cache.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

/// Identification files, in priority order.
pub const OS_RELEASE_PATHS: [&str; 2] = ["/etc/os-release", "/usr/lib/os-release"];

/// Executables probed when no identification file matches, in priority order.
const EXECUTABLE_FALLBACKS: [(&str, DistroFamily); 4] = [
    ("pacman", DistroFamily::Arch),
    ("dpkg", DistroFamily::Debian),
    ("apk", DistroFamily::Alpine),
    ("rpm", DistroFamily::FedoraRhel),
];

/// Broad Linux distribution lineage.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "kebab-case")]
pub enum DistroFamily {
    Debian,
    Arch,
    #[serde(alias = "fedora", alias = "rhel")]
    FedoraRhel,
    Alpine,
    Unknown,
}

impl DistroFamily {
    pub const ALL: [DistroFamily; 5] = [
        DistroFamily::Debian,
        DistroFamily::Arch,
        DistroFamily::FedoraRhel,
        DistroFamily::Alpine,
        DistroFamily::Unknown,
    ];

    /// Maps an os-release `ID` (or one `ID_LIKE` token) to a family.
    #[must_use]
    pub fn from_os_id(id: &str) -> Option<Self> {
        match id {
            "debian" | "ubuntu" | "linuxmint" | "pop" | "elementary" | "raspbian" | "kali"
            | "zorin" | "deepin" => Some(DistroFamily::Debian),
            "arch" | "archarm" | "manjaro" | "endeavouros" | "garuda" | "artix" | "cachyos"
            | "instantos" => Some(DistroFamily::Arch),
            "fedora" | "rhel" | "centos" | "rocky" | "almalinux" | "ol" | "amzn" | "nobara" => {
                Some(DistroFamily::FedoraRhel)
            }
            "alpine" | "postmarketos" => Some(DistroFamily::Alpine),
            _ => None,
        }
    }
}

impl fmt::Display for DistroFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DistroFamily::Debian => "debian",
            DistroFamily::Arch => "arch",
            DistroFamily::FedoraRhel => "fedora-rhel",
            DistroFamily::Alpine => "alpine",
            DistroFamily::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

impl FromStr for DistroFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "debian" => Ok(DistroFamily::Debian),
            "arch" => Ok(DistroFamily::Arch),
            "fedora-rhel" | "fedora" | "rhel" => Ok(DistroFamily::FedoraRhel),
            "alpine" => Ok(DistroFamily::Alpine),
            "unknown" => Ok(DistroFamily::Unknown),
            other => Err(format!(
                "unknown distribution family '{other}' (expected debian, arch, fedora-rhel, alpine)"
            )),
        }
    }
}

/// Access to the host facts used for resolution.
#[cfg_attr(test, mockall::automock)]
pub trait DistroProbe: Send + Sync {
    /// Contents of the first readable identification file.
    fn read_os_release(&self) -> Option<String>;

    /// Whether `name` resolves to an executable on `PATH`.
    fn has_executable(&self, name: &str) -> bool;
}

/// Probe backed by the real filesystem and `PATH`.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostProbe;

impl DistroProbe for HostProbe {
    fn read_os_release(&self) -> Option<String> {
        OS_RELEASE_PATHS.iter().find_map(|path| {
            match std::fs::read_to_string(path) {
                Ok(content) => Some(content),
                Err(e) => {
                    trace!("Skipping {}: {}", path, e);
                    None
                }
            }
        })
    }

    fn has_executable(&self, name: &str) -> bool {
        which::which(name).is_ok()
    }
}

/// Parses os-release content, checking `ID` before every `ID_LIKE` token.
#[must_use]
pub fn parse_os_release(content: &str) -> Option<DistroFamily> {
    let mut id = String::new();
    let mut id_like = String::new();

    for line in content.lines() {
        let line = line.trim();
        if let Some(val) = line.strip_prefix("ID=") {
            id = unquote(val).to_lowercase();
        } else if let Some(val) = line.strip_prefix("ID_LIKE=") {
            id_like = unquote(val).to_lowercase();
        }
    }

    DistroFamily::from_os_id(&id).or_else(|| {
        id_like
            .split_whitespace()
            .find_map(DistroFamily::from_os_id)
    })
}

fn unquote(val: &str) -> &str {
    val.trim().trim_matches('"').trim_matches('\'')
}

/// Runs the full resolution order against `probe` without caching.
pub fn detect_with<P: DistroProbe + ?Sized>(probe: &P) -> DistroFamily {
    if let Some(family) = probe.read_os_release().as_deref().and_then(parse_os_release) {
        debug!("Resolved {} from os-release", family);
        return family;
    }

    for (executable, family) in EXECUTABLE_FALLBACKS {
        if probe.has_executable(executable) {
            debug!("Resolved {} from presence of {}", family, executable);
            return family;
        }
    }

    info!("Could not determine distribution family");
    DistroFamily::Unknown
}

/// Anything that can answer "which distribution family is this host".
pub trait ResolveDistro: Send + Sync {
    fn resolve(&self) -> DistroFamily;
}

impl<T: ResolveDistro + ?Sized> ResolveDistro for Arc<T> {
    fn resolve(&self) -> DistroFamily {
        (**self).resolve()
    }
}

impl<T: ResolveDistro + ?Sized> ResolveDistro for Box<T> {
    fn resolve(&self) -> DistroFamily {
        (**self).resolve()
    }
}

/// Caching resolver. The first call probes the host; later calls reuse the answer
/// until [`DistroResolver::refresh`] is called.
pub struct DistroResolver<P: DistroProbe> {
    probe: P,
    cache: Cache<(), DistroFamily>,
}

impl<P: DistroProbe> DistroResolver<P> {
    pub fn new(probe: P) -> Self {
        Self {
            probe,
            cache: Cache::new(1),
        }
    }

    /// Drops the cached answer and probes again.
    pub fn refresh(&self) -> DistroFamily {
        debug!("Refreshing cached distribution family");
        self.cache.invalidate(&());
        self.resolve()
    }
}

impl<P: DistroProbe> ResolveDistro for DistroResolver<P> {
    fn resolve(&self) -> DistroFamily {
        self.cache.get_with((), || detect_with(&self.probe))
    }
}

/// Resolver that always answers with a fixed family.
#[derive(Debug, Clone, Copy)]
pub struct FixedDistro(pub DistroFamily);

impl ResolveDistro for FixedDistro {
    fn resolve(&self) -> DistroFamily {
        self.0
    }
}

/// Resolver backed by the process-wide host cache.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostDistro;

impl ResolveDistro for HostDistro {
    fn resolve(&self) -> DistroFamily {
        resolve_distro()
    }
}

static HOST_RESOLVER: OnceLock<DistroResolver<HostProbe>> = OnceLock::new();

fn host_resolver() -> &'static DistroResolver<HostProbe> {
    HOST_RESOLVER.get_or_init(|| DistroResolver::new(HostProbe))
}

/// Distribution family of the running host, resolved once per process.
pub fn resolve_distro() -> DistroFamily {
    host_resolver().resolve()
}

/// Re-probes the host and replaces the process-wide cached answer.
pub fn refresh_distro() -> DistroFamily {
    host_resolver().refresh()
}
