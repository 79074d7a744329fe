//! Error types for Installium.
//!
//! Every step of the detection-and-dispatch pipeline reports failure through
//! [`InstalliumError`]. The installer converts these into
//! [`InstallOutcome`](crate::reporter::InstallOutcome) values at its boundary so that
//! callers always receive data rather than a crash.

use std::path::PathBuf;

use thiserror::Error;

use crate::distro::DistroFamily;
use crate::format::PackageFormat;

/// The main error type for Installium operations.
#[derive(Debug, Error)]
pub enum InstalliumError {
    /// The file name does not carry a supported package suffix.
    #[error("Unsupported package type: {}", .path.display())]
    UnknownFormat { path: PathBuf },

    /// The format is valid but no registered backend serves it on this host.
    #[error("No installer backend for {format} packages on {distro} hosts")]
    BackendNotFound {
        format: PackageFormat,
        distro: DistroFamily,
    },

    /// The package path does not point at a readable file.
    #[error("Package file not found: {}", .path.display())]
    PackageMissing { path: PathBuf },

    /// The backend needs root and no elevation mechanism is usable.
    #[error("No privilege elevation mechanism available (tried: {tried})")]
    ElevationUnavailable { tried: String },

    /// The child process could not be started.
    #[error("Failed to start {program}: {reason}")]
    ProcessSpawn { program: String, reason: String },

    /// The package manager ran and exited unsuccessfully.
    #[error("{program} exited with status {code}")]
    BackendReported { program: String, code: i32 },

    /// Two registry rows claim the same (format, distro) pair.
    #[error("Backend registry conflict: {0}")]
    RegistryConflict(String),

    /// Configuration loading or validation errors
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),

    /// File I/O operation failures
    #[error("I/O operation failed: {0}")]
    Io(#[from] std::io::Error),

    /// Background task failures
    #[error("Task join error: {0}")]
    Join(String),
}

/// A type alias for Results that use InstalliumError.
pub type Result<T> = std::result::Result<T, InstalliumError>;

impl InstalliumError {
    /// Creates a new ProcessSpawn error with context.
    pub fn spawn<S1, S2>(program: S1, reason: S2) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        InstalliumError::ProcessSpawn {
            program: program.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new RegistryConflict error with context.
    pub fn registry_conflict<S: Into<String>>(msg: S) -> Self {
        InstalliumError::RegistryConflict(msg.into())
    }

    /// Returns true if the user can fix this without touching the package itself,
    /// e.g. by installing a missing tool or granting privileges.
    pub fn is_host_problem(&self) -> bool {
        matches!(
            self,
            InstalliumError::BackendNotFound { .. }
                | InstalliumError::ElevationUnavailable { .. }
                | InstalliumError::ProcessSpawn { .. }
        )
    }

    /// Returns the error category as a string for logging.
    pub fn category(&self) -> &'static str {
        match self {
            InstalliumError::UnknownFormat { .. } => "unknown_format",
            InstalliumError::BackendNotFound { .. } => "backend_not_found",
            InstalliumError::PackageMissing { .. } => "package_missing",
            InstalliumError::ElevationUnavailable { .. } => "elevation_unavailable",
            InstalliumError::ProcessSpawn { .. } => "process_spawn",
            InstalliumError::BackendReported { .. } => "backend_reported",
            InstalliumError::RegistryConflict(_) => "registry_conflict",
            InstalliumError::Config(_) => "config",
            InstalliumError::Io(_) => "io",
            InstalliumError::Join(_) => "join",
        }
    }
}

impl From<config::ConfigError> for InstalliumError {
    fn from(err: config::ConfigError) -> Self {
        InstalliumError::Config(anyhow::Error::from(err))
    }
}

impl From<tokio::task::JoinError> for InstalliumError {
    fn from(err: tokio::task::JoinError) -> Self {
        InstalliumError::Join(err.to_string())
    }
}
