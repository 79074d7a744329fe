//! Installium - install a package file with the host's native package manager
//!
//! Given a `.deb`, `.rpm`, `.pkg.tar.zst`/`.pkg.tar.xz` or `.apk` file, Installium
//! works out the host distribution, picks the matching package manager, wraps the
//! call with a privilege elevation tool, runs it while streaming its output and
//! turns the result into a structured [`InstallOutcome`]. It does not resolve
//! dependencies or keep a package database; the native tools do that.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use installium::{HostInstaller, InstalliumConfig};
//! use std::path::Path;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = InstalliumConfig::load(None)?;
//! let installer = HostInstaller::from_config(&config, None)?;
//!
//! let outcome = installer
//!     .install(
//!         Path::new("/tmp/ripgrep-14.1.0-1-x86_64.pkg.tar.zst"),
//!         |line| println!("{line}"),
//!         CancellationToken::new(),
//!     )
//!     .await;
//! println!("{}: {}", outcome.status, outcome.message);
//! # Ok(())
//! # }
//! ```
//!
//! # Pipeline
//!
//! - [`detect`]: file name to [`PackageFormat`]
//! - [`resolve_distro`]: host to [`DistroFamily`], cached per process
//! - [`find_backend`]: (format, distro) to a [`BackendDescriptor`]
//! - [`escalation::PrivilegeEscalator`]: pkexec, sudo or doas
//! - [`run_install`]: run the job and classify its output
//!
//! # Error Handling
//!
//! Fallible steps return [`Result<T>`] with [`InstalliumError`]. The pipeline
//! entry points never return errors: [`Installer::install`] converts them into an
//! [`InstallOutcome`] whose [`OutcomeStatus`] tells the caller what happened.

pub mod backends;
pub mod command;
pub mod commands;
pub mod configuration;
pub mod distro;
pub mod errors;
pub mod escalation;
pub mod executor;
pub mod format;
pub mod installer;
pub mod metadata;
pub mod output;
pub mod registry;
pub mod reporter;
pub mod version;

// Re-export commonly used types
pub use backends::{Backend, BackendKind};
pub use command::CommandSpec;
pub use configuration::InstalliumConfig;
pub use distro::{refresh_distro, resolve_distro, DistroFamily};
pub use errors::{InstalliumError, Result};
pub use executor::{InstallExecutor, InstallJob, JobState};
pub use format::{detect, PackageFile, PackageFormat};
pub use installer::{run_install, HostInstaller, InstallPlan, Installer};
pub use registry::{find_backend, BackendDescriptor, BackendRegistry};
pub use reporter::{InstallOutcome, OutcomeStatus};
