//! The install pipeline: path -> format -> distro -> backend -> escalation ->
//! execution -> outcome.
//!
//! Every step before execution validates and returns an error instead of acting,
//! so a bad input never spawns a process. [`Installer::install`] converts those
//! errors into [`InstallOutcome`] values; callers always get data back.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::command::CommandSpec;
use crate::configuration::InstalliumConfig;
use crate::distro::{DistroFamily, FixedDistro, HostDistro, ResolveDistro};
use crate::errors::{InstalliumError, Result};
use crate::escalation::{ElevationProbe, HostElevationProbe, PrivilegeEscalator};
use crate::executor::{InstallExecutor, InstallJob};
use crate::format::{PackageFile, PackageFormat};
use crate::metadata::{self, PackageInfo};
use crate::registry::{BackendDescriptor, BackendRegistry};
use crate::reporter::{InstallOutcome, ResultReporter};
use crate::version::VersionRelation;

/// Everything decided about an install before anything runs.
#[derive(Serialize, Clone, Debug)]
pub struct InstallPlan {
    pub package: PackageFile,
    pub descriptor: BackendDescriptor,
    pub distro: DistroFamily,
    /// The escalated command that will run.
    pub command: CommandSpec,
}

impl InstallPlan {
    pub fn into_job(self) -> InstallJob {
        InstallJob::new(self.package, self.descriptor, self.command)
    }
}

/// What `installium info` shows about a package file.
#[derive(Serialize, Clone, Debug)]
pub struct PackageReport {
    pub package: PackageFile,
    pub info: PackageInfo,
    pub distro: DistroFamily,
    /// Backend that would install the file on this host.
    pub backend: Option<String>,
    pub compatible: bool,
    pub installed_version: Option<String>,
    pub relation: Option<VersionRelation>,
}

pub struct Installer<D: ResolveDistro, E: ElevationProbe> {
    registry: BackendRegistry,
    resolver: D,
    escalator: PrivilegeEscalator<E>,
    executor: InstallExecutor,
    reporter: ResultReporter,
    sniff_magic: bool,
}

/// Installer wired to the real host.
pub type HostInstaller = Installer<Box<dyn ResolveDistro>, HostElevationProbe>;

impl HostInstaller {
    /// Builds an installer from configuration. `distro` overrides both host
    /// detection and the configured override.
    pub fn from_config(config: &InstalliumConfig, distro: Option<DistroFamily>) -> Result<Self> {
        let registry = BackendRegistry::builtin(&config.backend_options()?);
        registry.validate()?;

        let resolver: Box<dyn ResolveDistro> = match distro.or(config.distro_override) {
            Some(family) => {
                debug!("Using fixed distribution family {}", family);
                Box::new(FixedDistro(family))
            }
            None => Box::new(HostDistro),
        };
        let escalator =
            PrivilegeEscalator::new(HostElevationProbe).with_preferred(config.preferred_elevation);

        Ok(Installer::new(registry, resolver, escalator)
            .with_executor(InstallExecutor::new(config.grace_period()))
            .with_reporter(ResultReporter::new(config.output_tail_lines))
            .with_magic_sniffing(config.sniff_magic))
    }
}

impl<D: ResolveDistro, E: ElevationProbe> Installer<D, E> {
    pub fn new(registry: BackendRegistry, resolver: D, escalator: PrivilegeEscalator<E>) -> Self {
        Self {
            registry,
            resolver,
            escalator,
            executor: InstallExecutor::default(),
            reporter: ResultReporter::default(),
            sniff_magic: false,
        }
    }

    #[must_use]
    pub fn with_executor(mut self, executor: InstallExecutor) -> Self {
        self.executor = executor;
        self
    }

    #[must_use]
    pub fn with_reporter(mut self, reporter: ResultReporter) -> Self {
        self.reporter = reporter;
        self
    }

    #[must_use]
    pub fn with_magic_sniffing(mut self, enabled: bool) -> Self {
        self.sniff_magic = enabled;
        self
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    pub fn escalator(&self) -> &PrivilegeEscalator<E> {
        &self.escalator
    }

    pub fn distro(&self) -> DistroFamily {
        self.resolver.resolve()
    }

    pub fn package(&self, path: &Path) -> PackageFile {
        PackageFile::with_sniffing(path, self.sniff_magic)
    }

    /// Resolves everything needed to install `path` without running anything.
    pub fn plan(&self, path: &Path) -> Result<InstallPlan> {
        let package = self.package(path);
        if package.format() == PackageFormat::Unknown {
            return Err(InstalliumError::UnknownFormat {
                path: path.to_path_buf(),
            });
        }

        let distro = self.resolver.resolve();
        let descriptor = self
            .registry
            .find_backend(package.format(), distro)
            .cloned()
            .ok_or(InstalliumError::BackendNotFound {
                format: package.format(),
                distro,
            })?;

        if !path.is_file() {
            return Err(InstalliumError::PackageMissing {
                path: path.to_path_buf(),
            });
        }

        // pkexec runs the command from root's home, so the path must not be relative
        let package = package.relocated(path.canonicalize()?);
        let command = descriptor.command_for(package.path());
        let command = self
            .escalator
            .escalate(&command, descriptor.requires_privilege)?;
        debug!("Planned {} for {}", command, path.display());

        Ok(InstallPlan {
            package,
            descriptor,
            distro,
            command,
        })
    }

    /// Runs a plan and reports the result.
    pub async fn execute<F>(&self, plan: InstallPlan, on_line: F, cancel: CancellationToken) -> InstallOutcome
    where
        F: FnMut(&str) + Send,
    {
        let job = self.executor.run(plan.into_job(), on_line, cancel).await;
        self.reporter.report(job)
    }

    /// The whole pipeline for one package file.
    pub async fn install<F>(&self, path: &Path, on_line: F, cancel: CancellationToken) -> InstallOutcome
    where
        F: FnMut(&str) + Send,
    {
        match self.plan(path) {
            Ok(plan) => {
                info!(
                    "Installing {} with {}",
                    path.display(),
                    plan.descriptor.executable
                );
                self.execute(plan, on_line, cancel).await
            }
            Err(e) => {
                warn!("Not installing {}: {} ({})", path.display(), e, e.category());
                InstallOutcome::from_error(&e)
            }
        }
    }

    /// Runs [`Installer::install`] on a tokio task so the caller stays responsive.
    pub fn spawn_install<F>(
        self: Arc<Self>,
        path: PathBuf,
        on_line: F,
        cancel: CancellationToken,
    ) -> JoinHandle<InstallOutcome>
    where
        F: FnMut(&str) + Send + 'static,
        D: 'static,
        E: 'static,
    {
        tokio::spawn(async move { self.install(&path, on_line, cancel).await })
    }

    /// Metadata, compatibility and installed-version relation for `path`.
    pub async fn describe(&self, path: &Path) -> Result<PackageReport> {
        let package = self.package(path);
        if package.format() == PackageFormat::Unknown {
            return Err(InstalliumError::UnknownFormat {
                path: path.to_path_buf(),
            });
        }
        if !path.is_file() {
            return Err(InstalliumError::PackageMissing {
                path: path.to_path_buf(),
            });
        }

        let distro = self.resolver.resolve();
        let descriptor = self.registry.find_backend(package.format(), distro);
        let info = metadata::inspect(&package).await;

        let installed_version = match (descriptor, info.name.as_deref()) {
            (Some(descriptor), Some(name)) => metadata::installed_version(descriptor.kind, name).await,
            _ => None,
        };
        let relation = match (info.version.as_deref(), installed_version.as_deref()) {
            (Some(candidate), Some(installed)) => Some(VersionRelation::between(candidate, installed)),
            _ => None,
        };

        Ok(PackageReport {
            backend: descriptor.map(|d| d.executable.clone()),
            compatible: descriptor.is_some(),
            package,
            info,
            distro,
            installed_version,
            relation,
        })
    }
}

/// Runs an already-built job with default executor and reporter settings.
pub async fn run_install<F>(job: InstallJob, on_line: F, cancel: CancellationToken) -> InstallOutcome
where
    F: FnMut(&str) + Send,
{
    let job = InstallExecutor::default().run(job, on_line, cancel).await;
    ResultReporter::default().report(job)
}
