//! Install job execution.
//!
//! [`InstallExecutor::run`] drives a job through `Pending -> Running ->
//! {Succeeded, Failed}`. The child's stdout and stderr share one pipe so lines
//! reach the observer in the order the child wrote them. Cancellation sends
//! SIGTERM, waits for the grace period, then SIGKILL, then waits once more. A
//! child that survives both is reported as [`JobFailure::StillRunning`].

use std::fmt;
use std::os::unix::process::ExitStatusExt;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use nix::fcntl::OFlag;
use nix::sys::signal::{kill, Signal};
use nix::unistd::{pipe2, Pid};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::unix::pipe::Receiver;
use tokio::process::{Child, Command};
use tokio::time::error::Elapsed;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::command::CommandSpec;
use crate::format::PackageFile;
use crate::registry::BackendDescriptor;

/// Default wait between SIGTERM and SIGKILL.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobState {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }
}

/// Why a job failed without a package-manager verdict.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum JobFailure {
    /// The process could not be started.
    Spawn(String),
    /// The caller cancelled the job and the process is gone.
    Cancelled,
    /// Cancellation was requested but neither signal stopped the process,
    /// typically because it runs as root under pkexec.
    StillRunning,
}

/// One install attempt. Mutated only by the executor.
#[derive(Serialize, Clone, Debug)]
pub struct InstallJob {
    pub package: PackageFile,
    pub backend: BackendDescriptor,
    /// The final (possibly escalated) command.
    pub command: CommandSpec,
    pub state: JobState,
    pub history: Vec<JobState>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub pid: Option<u32>,
    pub exit_code: Option<i32>,
    pub captured_output: Vec<String>,
    pub failure: Option<JobFailure>,
}

impl InstallJob {
    pub fn new(package: PackageFile, backend: BackendDescriptor, command: CommandSpec) -> Self {
        Self {
            package,
            backend,
            command,
            state: JobState::Pending,
            history: vec![JobState::Pending],
            started_at: None,
            finished_at: None,
            pid: None,
            exit_code: None,
            captured_output: Vec::new(),
            failure: None,
        }
    }

    fn transition(&mut self, next: JobState) {
        debug!("Job {:?} -> {:?}", self.state, next);
        self.state = next;
        self.history.push(next);
    }

    fn start(&mut self, pid: Option<u32>) {
        self.pid = pid;
        self.started_at = Some(Utc::now());
        self.transition(JobState::Running);
    }

    fn finish(&mut self, exit_code: Option<i32>, failure: Option<JobFailure>) {
        if self.state.is_terminal() {
            warn!("Job already finished as {:?}", self.state);
            return;
        }
        self.exit_code = exit_code;
        self.finished_at = Some(Utc::now());
        let next = if exit_code == Some(0) && failure.is_none() {
            JobState::Succeeded
        } else {
            JobState::Failed
        };
        self.failure = failure;
        self.transition(next);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.failure == Some(JobFailure::Cancelled)
    }

    /// Wall-clock run time once the job has finished.
    pub fn duration(&self) -> Option<chrono::Duration> {
        Some(self.finished_at? - self.started_at?)
    }
}

/// Exit code of a finished process; death by signal maps to `128 + signal`.
fn exit_code_of(status: ExitStatus) -> Option<i32> {
    status.code().or_else(|| status.signal().map(|sig| 128 + sig))
}

/// Strips the line terminator and decodes lossily.
fn decode_line(raw: &[u8]) -> String {
    let trimmed = raw
        .strip_suffix(b"\n")
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
        .unwrap_or(raw);
    String::from_utf8_lossy(trimmed).into_owned()
}

/// Sends signals to a running child.
#[cfg_attr(test, mockall::automock)]
pub trait SignalChild: Send + Sync {
    fn signal(&self, pid: i32, signal: Signal) -> nix::Result<()>;
}

/// Signals through `kill(2)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostSignaller;

impl SignalChild for HostSignaller {
    fn signal(&self, pid: i32, signal: Signal) -> nix::Result<()> {
        kill(Pid::from_raw(pid), signal)
    }
}

/// How a cancelled child ended.
enum Stopped {
    Reaped(Option<i32>),
    Unconfirmed,
}

#[derive(Clone)]
pub struct InstallExecutor {
    grace_period: Duration,
    signaller: Arc<dyn SignalChild>,
}

impl fmt::Debug for InstallExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstallExecutor")
            .field("grace_period", &self.grace_period)
            .finish_non_exhaustive()
    }
}

impl Default for InstallExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_GRACE_PERIOD)
    }
}

impl InstallExecutor {
    pub fn new(grace_period: Duration) -> Self {
        Self {
            grace_period,
            signaller: Arc::new(HostSignaller),
        }
    }

    /// Replaces how SIGTERM and SIGKILL are delivered.
    pub fn with_signaller<S: SignalChild + 'static>(mut self, signaller: S) -> Self {
        self.signaller = Arc::new(signaller);
        self
    }

    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    fn spawn(&self, command: &CommandSpec) -> std::io::Result<(Child, Receiver)> {
        // Close-on-exec keeps the pipe out of the child; dup2 onto fds 1 and 2 clears it there
        let (reader, writer) = pipe2(OFlag::O_CLOEXEC).map_err(std::io::Error::from)?;
        let stderr = writer.try_clone()?;

        let mut process = Command::new(&command.program);
        process
            .args(&command.args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::from(writer))
            .stderr(Stdio::from(stderr))
            .kill_on_drop(true);

        let child = process.spawn()?;
        // Our copies of the write end must close or the reader never sees EOF
        drop(process);

        let receiver = Receiver::from_owned_fd(reader)?;
        Ok((child, receiver))
    }

    /// Runs `job` to completion, delivering each output line to `on_line`.
    ///
    /// Never returns early with an error: spawn problems and cancellation are
    /// recorded on the returned job.
    pub async fn run<F>(&self, mut job: InstallJob, mut on_line: F, cancel: CancellationToken) -> InstallJob
    where
        F: FnMut(&str) + Send,
    {
        if job.state != JobState::Pending {
            warn!("Refusing to run a job in state {:?}", job.state);
            return job;
        }
        if cancel.is_cancelled() {
            job.finish(None, Some(JobFailure::Cancelled));
            return job;
        }

        info!("Running: {}", job.command);
        let (mut child, receiver) = match self.spawn(&job.command) {
            Ok(spawned) => spawned,
            Err(e) => {
                warn!("Failed to start {}: {}", job.command.program, e);
                job.finish(None, Some(JobFailure::Spawn(e.to_string())));
                return job;
            }
        };
        job.start(child.id());

        let mut reader = BufReader::new(receiver);
        let mut buf = Vec::new();
        let mut cancelled = false;
        loop {
            buf.clear();
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
                read = reader.read_until(b'\n', &mut buf) => match read {
                    Ok(0) => break,
                    Ok(_) => {
                        let line = decode_line(&buf);
                        on_line(&line);
                        job.captured_output.push(line);
                    }
                    Err(e) => {
                        warn!("Stopped reading output of {}: {}", job.command.program, e);
                        break;
                    }
                },
            }
        }

        let status = if cancelled {
            None
        } else {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                status = child.wait() => Some(status),
            }
        };

        match status {
            Some(Ok(status)) => {
                let code = exit_code_of(status);
                debug!("{} exited with {:?}", job.command.program, code);
                job.finish(code, None);
            }
            Some(Err(e)) => {
                warn!("Lost track of {}: {}", job.command.program, e);
                job.finish(None, None);
            }
            None => {
                info!("Cancelling {}", job.command.program);
                match self.terminate(&mut child).await {
                    Stopped::Reaped(code) => job.finish(code, Some(JobFailure::Cancelled)),
                    Stopped::Unconfirmed => job.finish(None, Some(JobFailure::StillRunning)),
                }
            }
        }
        job
    }

    /// SIGTERM, then SIGKILL after the grace period. Every wait is bounded by
    /// the grace period.
    async fn terminate(&self, child: &mut Child) -> Stopped {
        let Some(pid) = child.id().and_then(|id| i32::try_from(id).ok()) else {
            // Already reaped
            return Stopped::Reaped(child.wait().await.ok().and_then(exit_code_of));
        };

        if let Err(e) = self.signaller.signal(pid, Signal::SIGTERM) {
            debug!("SIGTERM to {} failed: {}", pid, e);
        }
        if let Ok(code) = self.wait_for_exit(child).await {
            return Stopped::Reaped(code);
        }

        warn!(
            "Child {} did not exit within {:?} of SIGTERM; killing",
            pid, self.grace_period
        );
        if let Err(e) = self.signaller.signal(pid, Signal::SIGKILL) {
            warn!("SIGKILL to {} failed: {}", pid, e);
        }
        match self.wait_for_exit(child).await {
            Ok(code) => Stopped::Reaped(code),
            Err(_) => {
                warn!("Child {} is still running; giving up on it", pid);
                Stopped::Unconfirmed
            }
        }
    }

    async fn wait_for_exit(&self, child: &mut Child) -> Result<Option<i32>, Elapsed> {
        let status = timeout(self.grace_period, child.wait()).await?;
        Ok(status
            .map_err(|e| warn!("Waiting for cancelled child failed: {}", e))
            .ok()
            .and_then(exit_code_of))
    }
}
