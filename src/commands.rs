//! Command implementations for the Installium CLI.
//!
//! - [`install_command`]: plan, confirm, run and report one package install
//! - [`info_command`]: package metadata, compatibility and installed version
//! - [`backends_command`]: the backend registry and which tools are present
//! - [`doctor_command`]: host diagnosis (distribution, elevation, backends)
//!
//! Every handler returns the process exit code; only unexpected failures
//! (terminal I/O, JSON encoding) surface as errors.

use std::io::IsTerminal;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use dialoguer::{theme::ColorfulTheme, Confirm};
use serde::Serialize;
use tabular::{Row, Table};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::distro::{DistroFamily, ResolveDistro};
use crate::errors::InstalliumError;
use crate::escalation::{ElevationMechanism, ElevationProbe};
use crate::installer::{Installer, PackageReport};
use crate::output;
use crate::registry::{BackendDescriptor, BackendRegistry};
use crate::reporter::{InstallOutcome, OutcomeStatus};


/// Exit code for a malformed command line (`EX_USAGE`).
pub const EXIT_USAGE: i32 = 64;
/// Exit code for unexpected failures such as terminal I/O (`EX_SOFTWARE`).
pub const EXIT_INTERNAL: i32 = 70;
/// Exit code for unreadable or invalid configuration (`EX_CONFIG`).
pub const EXIT_CONFIG: i32 = 78;

/// Flags that shape `installium <PACKAGE>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstallOptions {
    /// Print the plan without running anything.
    pub dry_run: bool,
    /// Skip the confirmation prompt.
    pub assume_yes: bool,
    /// Print the outcome as JSON instead of colored text.
    pub json: bool,
    /// Exit with the package manager's own code for failures it reported.
    pub passthrough_exit_code: bool,
}

fn emit_outcome(outcome: &InstallOutcome, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
    } else {
        output::render_outcome(outcome);
    }
    Ok(())
}

fn confirm(prompt: &str) -> anyhow::Result<bool> {
    Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(true)
        .interact()
        .context("Failed to read confirmation")
}

/// Installs the package at `path`.
pub async fn install_command<D, E>(
    installer: Arc<Installer<D, E>>,
    path: &Path,
    options: InstallOptions,
) -> anyhow::Result<i32>
where
    D: ResolveDistro + 'static,
    E: ElevationProbe + 'static,
{
    let plan = match installer.plan(path) {
        Ok(plan) => plan,
        Err(e) => {
            debug!("Planning failed: {}", e.category());
            let outcome = InstallOutcome::from_error(&e);
            emit_outcome(&outcome, options.json)?;
            if e.is_host_problem() && !options.json {
                output::info("Run `installium doctor` to check this host");
            }
            return Ok(outcome.exit_code(options.passthrough_exit_code));
        }
    };

    if options.dry_run {
        if options.json {
            println!("{}", serde_json::to_string_pretty(&plan)?);
        } else {
            output::info(&format!(
                "Would install {} ({} on {}) with:",
                output::package_name(&path.display().to_string()),
                plan.package.format(),
                plan.distro
            ));
            println!("  {}", plan.command);
        }
        return Ok(0);
    }

    let interactive = !options.assume_yes && !options.json && std::io::stdin().is_terminal();
    if interactive {
        let prompt = format!(
            "Install {} using {}?",
            path.display(),
            plan.descriptor.executable
        );
        if !confirm(&prompt)? {
            output::warning("Installation aborted");
            return Ok(OutcomeStatus::Cancelled.exit_code());
        }
    }

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    if !options.json {
        output::info(&format!("Running {}", plan.command.to_string().bold()));
    }
    let quiet = options.json;
    let runner = Arc::clone(&installer);
    let outcome = tokio::spawn(async move {
        runner
            .execute(
                plan,
                move |line: &str| {
                    if !quiet {
                        output::output_line(line);
                    }
                },
                cancel,
            )
            .await
    })
    .await
    .unwrap_or_else(|e| InstallOutcome::from_error(&InstalliumError::from(e)));
    interrupt.abort();

    emit_outcome(&outcome, options.json)?;
    Ok(outcome.exit_code(options.passthrough_exit_code))
}

fn print_report(report: &PackageReport) {
    let missing = || "unknown".dimmed().to_string();
    let info = &report.info;

    let mut table = Table::new("{:<}  {:<}");
    let mut field = |label: &str, value: String| {
        table.add_row(Row::new().with_cell(label.bold()).with_cell(value));
    };
    field("Name", info.name.clone().map_or_else(missing, |n| output::package_name(&n)));
    field("Version", info.version.clone().unwrap_or_else(missing));
    field("Description", info.description.clone().unwrap_or_else(missing));
    field("Maintainer", info.maintainer.clone().unwrap_or_else(missing));
    field("Size", info.size_display().unwrap_or_else(missing));
    field("Format", report.package.format().to_string());
    field("Host", report.distro.to_string());
    field(
        "Backend",
        report
            .backend
            .as_deref()
            .map_or_else(|| "none".red().to_string(), output::backend_name),
    );
    if let Some(installed) = &report.installed_version {
        let relation = report
            .relation
            .map(|r| format!(" ({r})"))
            .unwrap_or_default();
        field("Installed", format!("{installed}{relation}"));
    }
    print!("{table}");

    if !report.compatible {
        output::warning(&format!(
            "{} packages cannot be installed on {} hosts",
            report.package.format(),
            report.distro
        ));
    }
}

/// Shows what is known about the package at `path`.
pub async fn info_command<D, E>(installer: &Installer<D, E>, path: &Path, json: bool) -> anyhow::Result<i32>
where
    D: ResolveDistro,
    E: ElevationProbe,
{
    match installer.describe(path).await {
        Ok(report) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
            Ok(0)
        }
        Err(e) => {
            let outcome = InstallOutcome::from_error(&e);
            emit_outcome(&outcome, json)?;
            Ok(outcome.status.exit_code())
        }
    }
}

/// One registry row with host availability, as shown by `backends` and `doctor`.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct BackendRow {
    pub formats: Vec<String>,
    pub distro: Option<DistroFamily>,
    pub executable: String,
    pub template: String,
    pub requires_privilege: bool,
    pub available: bool,
}

impl BackendRow {
    fn new<F: Fn(&str) -> bool>(descriptor: &BackendDescriptor, has_executable: &F) -> Self {
        Self {
            formats: descriptor
                .supported_formats
                .iter()
                .map(ToString::to_string)
                .collect(),
            distro: descriptor.distro,
            executable: descriptor.executable.clone(),
            template: descriptor.template(),
            requires_privilege: descriptor.requires_privilege,
            available: has_executable(descriptor.executable.as_str()),
        }
    }
}

/// Registry rows annotated with whether their executable is present.
pub fn backend_rows<F: Fn(&str) -> bool>(registry: &BackendRegistry, has_executable: F) -> Vec<BackendRow> {
    registry
        .rows()
        .iter()
        .map(|descriptor| BackendRow::new(descriptor, &has_executable))
        .collect()
}

fn print_backend_table(rows: &[BackendRow]) {
    let mut table = Table::new("{:<}  {:<}  {:<}  {:<}");
    table.add_row(
        Row::new()
            .with_cell("FORMAT".bold())
            .with_cell("DISTRO".bold())
            .with_cell("COMMAND".bold())
            .with_cell("AVAILABLE".bold()),
    );
    for row in rows {
        let available = if row.available {
            "✓".green()
        } else {
            "✗".red()
        };
        table.add_row(
            Row::new()
                .with_cell(row.formats.join(","))
                .with_cell(row.distro.map_or_else(|| "any".to_string(), |d| d.to_string()))
                .with_cell(row.template.as_str())
                .with_cell(available),
        );
    }
    print!("{table}");
}

/// Lists the registry.
pub fn backends_command<D, E>(installer: &Installer<D, E>, json: bool) -> anyhow::Result<i32>
where
    D: ResolveDistro,
    E: ElevationProbe,
{
    let probe = installer.escalator().probe();
    let rows = backend_rows(installer.registry(), |name| probe.has_executable(name));

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        print_backend_table(&rows);
    }
    Ok(0)
}

/// Host diagnosis.
#[derive(Serialize, Clone, Debug)]
pub struct DoctorReport {
    pub distro: DistroFamily,
    pub running_as_root: bool,
    pub display_session: bool,
    pub elevation: Option<ElevationMechanism>,
    pub backends: Vec<BackendRow>,
    /// Executable of the backend canonical for this host, if any.
    pub host_backend: Option<String>,
    pub problems: Vec<String>,
}

impl DoctorReport {
    pub fn healthy(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Collects everything `doctor` reports.
pub fn diagnose<D, E>(installer: &Installer<D, E>) -> DoctorReport
where
    D: ResolveDistro,
    E: ElevationProbe,
{
    let escalator = installer.escalator();
    let probe = escalator.probe();
    let distro = installer.distro();
    let running_as_root = probe.is_privileged();
    let elevation = escalator.available_mechanism();
    let backends = backend_rows(installer.registry(), |name| probe.has_executable(name));

    let host_row = backends.iter().find(|row| row.distro == Some(distro));
    let mut problems = Vec::new();

    if distro == DistroFamily::Unknown {
        problems.push("Could not determine the distribution family".to_string());
    }
    match host_row {
        None if distro != DistroFamily::Unknown => {
            problems.push(format!("No backend is registered for {distro} hosts"));
        }
        Some(row) if !row.available => {
            problems.push(format!("{} is not installed or not on PATH", row.executable));
        }
        _ => {}
    }
    if !running_as_root && elevation.is_none() {
        problems.push("No privilege elevation tool found (install pkexec, sudo or doas)".to_string());
    }

    DoctorReport {
        distro,
        running_as_root,
        display_session: probe.has_display_session(),
        elevation,
        host_backend: host_row.map(|row| row.executable.clone()),
        backends,
        problems,
    }
}

/// Checks that this host can install packages. Exits 1 when problems are found.
pub fn doctor_command<D, E>(installer: &Installer<D, E>, json: bool) -> anyhow::Result<i32>
where
    D: ResolveDistro,
    E: ElevationProbe,
{
    let report = diagnose(installer);
    let code = if report.healthy() { 0 } else { 1 };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(code);
    }

    output::info(&format!("Distribution family: {}", report.distro.to_string().bold()));
    if report.running_as_root {
        output::info("Running as root; no elevation needed");
    } else if let Some(mechanism) = report.elevation {
        output::success(&format!("Privilege elevation via {}", mechanism));
    }
    if !report.display_session {
        output::info("No graphical session; pkexec will not be used");
    }
    if let Some(backend) = &report.host_backend {
        output::info(&format!("Host backend: {}", output::backend_name(backend)));
    }
    println!();
    print_backend_table(&report.backends);
    println!();

    if report.healthy() {
        output::success("Ready to install packages");
    } else {
        for problem in &report.problems {
            output::error(problem);
        }
    }
    Ok(code)
}
