//! Backend registry: maps (format, distro) to an installer descriptor.
//!
//! The builtin table has one row per supported manager:
//!
//! | Format | Distro      | Executable | Arguments                         |
//! |--------|-------------|------------|-----------------------------------|
//! | deb    | debian      | dpkg       | `-i {path}`                       |
//! | rpm    | fedora-rhel | rpm        | `-i {path}`                       |
//! | pacman | arch        | pacman     | `-U [--noconfirm] {path}`         |
//! | apk    | alpine      | apk        | `add --allow-untrusted {path}`    |
//!
//! A lookup that finds nothing is an ordinary answer (a `.deb` on an Alpine host),
//! not an internal error.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::OnceLock;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::backends::{Backend, BackendKind};
use crate::command::CommandSpec;
use crate::distro::DistroFamily;
use crate::errors::{InstalliumError, Result};
use crate::format::PackageFormat;

/// Argument template token replaced by the package path.
pub const PATH_PLACEHOLDER: &str = "{path}";

/// Host policy applied when building descriptors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendOptions {
    /// Pass the manager's "don't ask" flag where one exists.
    pub non_interactive: bool,
    /// Extra arguments per backend, inserted before the package path.
    pub extra_args: BTreeMap<BackendKind, Vec<String>>,
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            non_interactive: true,
            extra_args: BTreeMap::new(),
        }
    }
}

/// An installer backend row. Immutable once registered.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Builder)]
#[builder(setter(into))]
pub struct BackendDescriptor {
    /// Which manager implementation classifies this backend's output.
    pub kind: BackendKind,
    /// The program to execute, looked up on `PATH`.
    pub executable: String,
    /// Argument template; [`PATH_PLACEHOLDER`] marks the package path.
    pub args: Vec<String>,
    #[builder(default = "true")]
    pub requires_privilege: bool,
    pub supported_formats: BTreeSet<PackageFormat>,
    /// Distribution the row is restricted to. `None` matches any host.
    #[builder(default)]
    pub distro: Option<DistroFamily>,
}

impl BackendDescriptor {
    #[must_use]
    pub fn supports(&self, format: PackageFormat) -> bool {
        self.supported_formats.contains(&format)
    }

    /// Whether this row may serve `format` on a `distro` host.
    #[must_use]
    pub fn matches(&self, format: PackageFormat, distro: DistroFamily) -> bool {
        self.supports(format) && self.distro.map_or(true, |d| d == distro)
    }

    /// The manager implementation behind this row.
    #[must_use]
    pub fn backend(&self) -> &'static dyn Backend {
        self.kind.backend()
    }

    /// Expands the argument template for `path`. A template without a placeholder
    /// gets the path appended.
    #[must_use]
    pub fn command_for(&self, path: &Path) -> CommandSpec {
        let path = path.to_string_lossy().into_owned();
        let mut substituted = false;
        let args: Vec<String> = self
            .args
            .iter()
            .map(|arg| {
                if arg == PATH_PLACEHOLDER {
                    substituted = true;
                    path.clone()
                } else {
                    arg.clone()
                }
            })
            .collect();

        let command = CommandSpec::new(self.executable.clone()).args(args);
        if substituted {
            command
        } else {
            command.arg(path)
        }
    }

    /// Human-readable template, e.g. `dpkg -i {path}`.
    #[must_use]
    pub fn template(&self) -> String {
        let mut out = self.executable.clone();
        for arg in &self.args {
            out.push(' ');
            out.push_str(arg);
        }
        out
    }
}

/// Ordered set of backend rows. Registration order breaks ties.
#[derive(Debug, Clone, Default)]
pub struct BackendRegistry {
    rows: Vec<BackendDescriptor>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The builtin table shaped by `options`.
    pub fn builtin(options: &BackendOptions) -> Self {
        let rows = BackendKind::ALL
            .iter()
            .map(|kind| kind.backend().descriptor(options))
            .collect();
        Self { rows }
    }

    pub fn register(&mut self, descriptor: BackendDescriptor) {
        debug!("Registering backend {}", descriptor.template());
        self.rows.push(descriptor);
    }

    #[must_use]
    pub fn rows(&self) -> &[BackendDescriptor] {
        &self.rows
    }

    /// Selects the backend for `format` on a `distro` host.
    ///
    /// Rows restricted to `distro` win over unrestricted rows; within a tier the
    /// first registered row wins.
    #[must_use]
    pub fn find_backend(
        &self,
        format: PackageFormat,
        distro: DistroFamily,
    ) -> Option<&BackendDescriptor> {
        if !format.is_known() {
            return None;
        }

        let mut candidates = self.rows.iter().filter(|row| row.matches(format, distro));
        let found = candidates
            .clone()
            .find(|row| row.distro == Some(distro))
            .or_else(|| candidates.find(|row| row.distro.is_none()));

        trace!(
            "Lookup ({}, {}) -> {:?}",
            format,
            distro,
            found.map(|row| &row.executable)
        );
        found
    }

    /// Rejects tables where two rows of the same specificity claim one
    /// (format, distro) pair.
    pub fn validate(&self) -> Result<()> {
        for (i, first) in self.rows.iter().enumerate() {
            for second in &self.rows[i + 1..] {
                if first.distro != second.distro {
                    continue;
                }
                if let Some(format) = first
                    .supported_formats
                    .intersection(&second.supported_formats)
                    .next()
                {
                    let scope = first
                        .distro
                        .map_or_else(|| "any distro".to_string(), |d| d.to_string());
                    return Err(InstalliumError::registry_conflict(format!(
                        "'{}' and '{}' both claim {} packages on {}",
                        first.template(),
                        second.template(),
                        format,
                        scope
                    )));
                }
            }
        }
        Ok(())
    }
}

static DEFAULT_REGISTRY: OnceLock<BackendRegistry> = OnceLock::new();

/// Looks up `format` on a `distro` host in the builtin table with default options.
pub fn find_backend(
    format: PackageFormat,
    distro: DistroFamily,
) -> Option<&'static BackendDescriptor> {
    DEFAULT_REGISTRY
        .get_or_init(|| BackendRegistry::builtin(&BackendOptions::default()))
        .find_backend(format, distro)
}
