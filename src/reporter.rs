//! Turns finished jobs and pipeline errors into [`InstallOutcome`] values.
//!
//! Classification order for a job that ran: exit 0, then the backend's
//! already-installed phrases, then its dependency phrases, then generic
//! permission phrases, and finally `unknown-failure`. Phrase matching is
//! case-insensitive and best-effort.

use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::errors::InstalliumError;
use crate::executor::{InstallJob, JobFailure};

/// Default number of trailing output lines attached to a failure.
pub const DEFAULT_TAIL_LINES: usize = 5;

/// Phrases any backend (or the elevation tool in front of it) prints when it
/// lacks root or the user dismissed the authentication prompt.
const PERMISSION_PHRASES: &[&str] = &[
    "permission denied",
    "are you root",
    "unless you are root",
    "requires superuser privilege",
    "not authorized",
    "request dismissed",
    "authentication failed",
    "incorrect password attempt",
];

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum OutcomeStatus {
    Success,
    AlreadyInstalled,
    MissingDependency,
    PermissionDenied,
    UnknownFormat,
    BackendNotFound,
    PackageMissing,
    SpawnFailure,
    Cancelled,
    UnknownFailure,
}

impl OutcomeStatus {
    /// Process exit code the CLI uses for this status.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            OutcomeStatus::Success => 0,
            OutcomeStatus::UnknownFormat | OutcomeStatus::PackageMissing => 1,
            OutcomeStatus::BackendNotFound => 2,
            OutcomeStatus::PermissionDenied => 3,
            OutcomeStatus::AlreadyInstalled
            | OutcomeStatus::MissingDependency
            | OutcomeStatus::SpawnFailure
            | OutcomeStatus::UnknownFailure => 4,
            OutcomeStatus::Cancelled => 130,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, OutcomeStatus::Success)
    }

    /// True when the package manager itself produced the verdict.
    #[must_use]
    pub fn is_backend_verdict(&self) -> bool {
        matches!(
            self,
            OutcomeStatus::AlreadyInstalled
                | OutcomeStatus::MissingDependency
                | OutcomeStatus::PermissionDenied
                | OutcomeStatus::UnknownFailure
        )
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OutcomeStatus::Success => "success",
            OutcomeStatus::AlreadyInstalled => "already-installed",
            OutcomeStatus::MissingDependency => "missing-dependency",
            OutcomeStatus::PermissionDenied => "permission-denied",
            OutcomeStatus::UnknownFormat => "unknown-format",
            OutcomeStatus::BackendNotFound => "backend-not-found",
            OutcomeStatus::PackageMissing => "package-missing",
            OutcomeStatus::SpawnFailure => "spawn-failure",
            OutcomeStatus::Cancelled => "cancelled",
            OutcomeStatus::UnknownFailure => "unknown-failure",
        };
        f.write_str(s)
    }
}

/// Final, immutable result of an install attempt.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct InstallOutcome {
    pub status: OutcomeStatus,
    pub message: String,
    /// Exit code of the package manager, when one ran to completion.
    pub raw_exit_code: Option<i32>,
    /// Last lines of captured output, for diagnostics.
    pub output_tail: Vec<String>,
}

impl InstallOutcome {
    fn new(status: OutcomeStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            raw_exit_code: None,
            output_tail: Vec::new(),
        }
    }

    /// Converts a pipeline error raised before or instead of running a job.
    pub fn from_error(err: &InstalliumError) -> Self {
        let status = match err {
            InstalliumError::UnknownFormat { .. } => OutcomeStatus::UnknownFormat,
            InstalliumError::BackendNotFound { .. } => OutcomeStatus::BackendNotFound,
            InstalliumError::PackageMissing { .. } => OutcomeStatus::PackageMissing,
            InstalliumError::ElevationUnavailable { .. } => OutcomeStatus::PermissionDenied,
            InstalliumError::ProcessSpawn { .. } => OutcomeStatus::SpawnFailure,
            InstalliumError::BackendReported { .. }
            | InstalliumError::RegistryConflict(_)
            | InstalliumError::Config(_)
            | InstalliumError::Io(_)
            | InstalliumError::Join(_) => OutcomeStatus::UnknownFailure,
        };
        let mut outcome = InstallOutcome::new(status, err.to_string());
        if let InstalliumError::BackendReported { code, .. } = err {
            outcome.raw_exit_code = Some(*code);
        }
        outcome
    }

    /// Exit code for the CLI. With `passthrough`, failures the package manager
    /// reported return its own exit code.
    #[must_use]
    pub fn exit_code(&self, passthrough: bool) -> i32 {
        match self.raw_exit_code {
            Some(code) if passthrough && self.status.is_backend_verdict() => code,
            _ => self.status.exit_code(),
        }
    }
}

fn contains_any(haystack: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|phrase| haystack.contains(phrase))
}

fn first_line_with<'a>(lines: &'a [String], phrases: &[&str]) -> Option<&'a str> {
    lines
        .iter()
        .find(|line| contains_any(&line.to_lowercase(), phrases))
        .map(String::as_str)
}

#[derive(Debug, Clone)]
pub struct ResultReporter {
    tail_lines: usize,
}

impl Default for ResultReporter {
    fn default() -> Self {
        Self::new(DEFAULT_TAIL_LINES)
    }
}

impl ResultReporter {
    pub fn new(tail_lines: usize) -> Self {
        Self { tail_lines }
    }

    fn tail(&self, job: &InstallJob) -> Vec<String> {
        let skip = job.captured_output.len().saturating_sub(self.tail_lines);
        job.captured_output[skip..].to_vec()
    }

    /// Classifies a terminal job. Consumes it: the job is discarded once reported.
    pub fn report(&self, job: InstallJob) -> InstallOutcome {
        let program = job.backend.executable.clone();
        let mut outcome = self.classify(&job, &program);
        outcome.raw_exit_code = job.exit_code;
        outcome.output_tail = self.tail(&job);
        debug!(
            "Job for {} classified as {}",
            job.package.path().display(),
            outcome.status
        );
        outcome
    }

    fn classify(&self, job: &InstallJob, program: &str) -> InstallOutcome {
        match &job.failure {
            Some(JobFailure::Cancelled) => {
                return InstallOutcome::new(OutcomeStatus::Cancelled, "Installation cancelled");
            }
            Some(JobFailure::Spawn(reason)) => {
                let err = InstalliumError::spawn(&job.command.program, reason.as_str());
                let mut outcome = InstallOutcome::from_error(&err);
                outcome.message = format!(
                    "{}. Make sure {} is installed and on PATH.",
                    outcome.message, program
                );
                return outcome;
            }
            Some(JobFailure::StillRunning) => {
                let pid = job.pid.map_or_else(String::new, |pid| format!(" (pid {pid})"));
                return InstallOutcome::new(
                    OutcomeStatus::UnknownFailure,
                    format!("Cancelled, but {program}{pid} could not be stopped and may still be running"),
                );
            }
            None => {}
        }

        if job.exit_code == Some(0) {
            return InstallOutcome::new(OutcomeStatus::Success, "Package installed successfully");
        }

        let backend = job.backend.backend();
        let lines = &job.captured_output;

        if let Some(line) = first_line_with(lines, backend.already_installed_phrases()) {
            return InstallOutcome::new(
                OutcomeStatus::AlreadyInstalled,
                format!("Package is already installed: {}", line.trim()),
            );
        }
        if let Some(line) = first_line_with(lines, backend.dependency_phrases()) {
            return InstallOutcome::new(
                OutcomeStatus::MissingDependency,
                format!("Missing dependencies: {}", line.trim()),
            );
        }
        if let Some(line) = first_line_with(lines, PERMISSION_PHRASES) {
            return InstallOutcome::new(
                OutcomeStatus::PermissionDenied,
                format!("Permission denied: {}", line.trim()),
            );
        }

        match job.exit_code {
            Some(code) => InstallOutcome::from_error(&InstalliumError::BackendReported {
                program: program.to_string(),
                code,
            }),
            None => InstallOutcome::new(
                OutcomeStatus::UnknownFailure,
                format!("{program} exited with an unknown status"),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::BackendKind;
    use crate::executor::JobState;
    use crate::format::PackageFile;
    use crate::registry::BackendOptions;
    use rstest::rstest;
    use std::path::PathBuf;

    fn finished_job(kind: BackendKind, exit_code: Option<i32>, output: &[&str]) -> InstallJob {
        let descriptor = kind.backend().descriptor(&BackendOptions::default());
        let command = descriptor.command_for(std::path::Path::new("/tmp/pkg"));
        let mut job = InstallJob::new(PackageFile::new("/tmp/pkg"), descriptor, command);
        job.state = if exit_code == Some(0) {
            JobState::Succeeded
        } else {
            JobState::Failed
        };
        job.exit_code = exit_code;
        job.captured_output = output.iter().map(|s| s.to_string()).collect();
        job
    }

    #[rstest]
    #[case(BackendKind::Dpkg, 0, "Setting up hello (2.10-3) ...", OutcomeStatus::Success)]
    #[case(BackendKind::Dpkg, 1, "dpkg: warning: downgrading hello from 2.10-3 to 2.10-2; a newer version is installed", OutcomeStatus::AlreadyInstalled)]
    #[case(BackendKind::Dpkg, 1, "dpkg: dependency problems prevent configuration of hello:", OutcomeStatus::MissingDependency)]
    #[case(BackendKind::Rpm, 1, "package htop-3.3.0-1.fc40.x86_64 is already installed", OutcomeStatus::AlreadyInstalled)]
    #[case(BackendKind::Rpm, 1, "error: Failed dependencies:", OutcomeStatus::MissingDependency)]
    #[case(BackendKind::Pacman, 1, "warning: ripgrep-14.1.0-1 is up to date -- reinstalling", OutcomeStatus::AlreadyInstalled)]
    #[case(BackendKind::Pacman, 1, "error: could not satisfy dependencies:", OutcomeStatus::MissingDependency)]
    #[case(BackendKind::Pacman, 1, "error: you cannot perform this operation unless you are root.", OutcomeStatus::PermissionDenied)]
    #[case(BackendKind::Apk, 1, "ERROR: unsatisfiable constraints:", OutcomeStatus::MissingDependency)]
    #[case(BackendKind::Apk, 126, "Error executing command as another user: Request dismissed", OutcomeStatus::PermissionDenied)]
    #[case(BackendKind::Apk, 2, "ERROR: something unexpected", OutcomeStatus::UnknownFailure)]
    fn test_classification(
        #[case] kind: BackendKind,
        #[case] code: i32,
        #[case] line: &str,
        #[case] expected: OutcomeStatus,
    ) {
        let outcome = ResultReporter::default().report(finished_job(kind, Some(code), &[line]));
        assert_eq!(outcome.status, expected);
        assert_eq!(outcome.raw_exit_code, Some(code));
    }

    #[test]
    fn test_already_installed_checked_before_dependencies() {
        let job = finished_job(
            BackendKind::Dpkg,
            Some(1),
            &["hello depends on libc6", "hello is already installed"],
        );
        assert_eq!(
            ResultReporter::default().report(job).status,
            OutcomeStatus::AlreadyInstalled
        );
    }

    #[test]
    fn test_unknown_failure_keeps_tail() {
        let output: Vec<String> = (1..=8).map(|i| format!("line {i}")).collect();
        let refs: Vec<&str> = output.iter().map(String::as_str).collect();
        let outcome = ResultReporter::default().report(finished_job(BackendKind::Rpm, Some(7), &refs));

        assert_eq!(outcome.status, OutcomeStatus::UnknownFailure);
        assert_eq!(outcome.message, "rpm exited with status 7");
        assert_eq!(outcome.output_tail, vec!["line 4", "line 5", "line 6", "line 7", "line 8"]);
    }

    #[test]
    fn test_cancelled_and_spawn_failures_are_distinct() {
        let mut cancelled = finished_job(BackendKind::Dpkg, Some(143), &["is already installed"]);
        cancelled.failure = Some(JobFailure::Cancelled);
        assert_eq!(
            ResultReporter::default().report(cancelled).status,
            OutcomeStatus::Cancelled
        );

        let mut missing = finished_job(BackendKind::Dpkg, None, &[]);
        missing.failure = Some(JobFailure::Spawn("No such file or directory".to_string()));
        let outcome = ResultReporter::default().report(missing);
        assert_eq!(outcome.status, OutcomeStatus::SpawnFailure);
        assert!(outcome.message.starts_with("Failed to start "));
        assert!(outcome.message.contains("Make sure dpkg is installed"));
    }

    #[test]
    fn test_unstopped_child_is_not_reported_as_cancelled() {
        let mut job = finished_job(BackendKind::Pacman, None, &["(1/1) installing ripgrep"]);
        job.pid = Some(4242);
        job.failure = Some(JobFailure::StillRunning);

        let outcome = ResultReporter::default().report(job);
        assert_eq!(outcome.status, OutcomeStatus::UnknownFailure);
        assert!(outcome.message.contains("pacman (pid 4242)"));
        assert!(outcome.message.contains("may still be running"));
        assert_eq!(outcome.exit_code(true), 4);
    }

    #[test]
    fn test_task_failure_becomes_unknown_failure() {
        let err = InstalliumError::Join("task panicked".to_string());
        let outcome = InstallOutcome::from_error(&err);
        assert_eq!(outcome.status, OutcomeStatus::UnknownFailure);
        assert!(outcome.message.contains("task panicked"));
        assert_eq!(outcome.exit_code(true), 4);
    }

    #[test]
    fn test_from_error() {
        let outcome = InstallOutcome::from_error(&InstalliumError::UnknownFormat {
            path: PathBuf::from("notes.txt"),
        });
        assert_eq!(outcome.status, OutcomeStatus::UnknownFormat);
        assert_eq!(outcome.exit_code(false), 1);
        assert_eq!(outcome.raw_exit_code, None);
    }

    #[test]
    fn test_passthrough_exit_code() {
        let outcome = ResultReporter::default().report(finished_job(BackendKind::Apk, Some(99), &["boom"]));
        assert_eq!(outcome.exit_code(false), 4);
        assert_eq!(outcome.exit_code(true), 99);

        let success = ResultReporter::default().report(finished_job(BackendKind::Apk, Some(0), &[]));
        assert_eq!(success.exit_code(true), 0);
    }

    #[test]
    fn test_status_serializes_kebab_case() {
        let json = serde_json::to_string(&OutcomeStatus::MissingDependency).unwrap();
        assert_eq!(json, "\"missing-dependency\"");
    }
}
