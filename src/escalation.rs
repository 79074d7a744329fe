//! Privilege escalation for backend commands.
//!
//! A command that needs root is wrapped with the first usable elevation tool:
//! `pkexec` when a graphical session can host the polkit agent, then `sudo`,
//! then `doas`. When nothing is usable the job fails here, before any process
//! is spawned.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::command::CommandSpec;
use crate::errors::{InstalliumError, Result};

/// Supported elevation tools.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ElevationMechanism {
    Pkexec,
    Sudo,
    Doas,
}

impl ElevationMechanism {
    /// Preference order when nothing is configured.
    pub const DEFAULT_ORDER: [ElevationMechanism; 3] = [
        ElevationMechanism::Pkexec,
        ElevationMechanism::Sudo,
        ElevationMechanism::Doas,
    ];

    #[must_use]
    pub fn executable(&self) -> &'static str {
        match self {
            ElevationMechanism::Pkexec => "pkexec",
            ElevationMechanism::Sudo => "sudo",
            ElevationMechanism::Doas => "doas",
        }
    }

    /// pkexec prompts through a polkit agent, which needs a display.
    #[must_use]
    pub fn needs_display(&self) -> bool {
        matches!(self, ElevationMechanism::Pkexec)
    }

    fn wrapper(&self) -> CommandSpec {
        match self {
            ElevationMechanism::Pkexec => CommandSpec::new("pkexec"),
            ElevationMechanism::Sudo => CommandSpec::new("sudo").arg("--"),
            ElevationMechanism::Doas => CommandSpec::new("doas").arg("--"),
        }
    }
}

impl fmt::Display for ElevationMechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.executable())
    }
}

impl FromStr for ElevationMechanism {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        ElevationMechanism::DEFAULT_ORDER
            .into_iter()
            .find(|m| m.executable().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown elevation mechanism '{s}'"))
    }
}

/// Host facts the escalator depends on.
#[cfg_attr(test, mockall::automock)]
pub trait ElevationProbe: Send + Sync {
    /// True when the current process already runs as root.
    fn is_privileged(&self) -> bool;

    /// True when an X11 or Wayland session is reachable.
    fn has_display_session(&self) -> bool;

    fn has_executable(&self, name: &str) -> bool;
}

/// Probe backed by the real process and environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostElevationProbe;

impl ElevationProbe for HostElevationProbe {
    fn is_privileged(&self) -> bool {
        nix::unistd::geteuid().is_root()
    }

    fn has_display_session(&self) -> bool {
        ["DISPLAY", "WAYLAND_DISPLAY"]
            .iter()
            .any(|var| std::env::var_os(var).is_some_and(|v| !v.is_empty()))
    }

    fn has_executable(&self, name: &str) -> bool {
        which::which(name).is_ok()
    }
}

pub struct PrivilegeEscalator<E: ElevationProbe> {
    probe: E,
    preferred: Option<ElevationMechanism>,
}

impl<E: ElevationProbe> PrivilegeEscalator<E> {
    pub fn new(probe: E) -> Self {
        Self {
            probe,
            preferred: None,
        }
    }

    /// Tries `preferred` before the default order.
    #[must_use]
    pub fn with_preferred(mut self, preferred: Option<ElevationMechanism>) -> Self {
        self.preferred = preferred;
        self
    }

    pub fn probe(&self) -> &E {
        &self.probe
    }

    fn candidates(&self) -> Vec<ElevationMechanism> {
        let mut order: Vec<ElevationMechanism> = self.preferred.into_iter().collect();
        for mechanism in ElevationMechanism::DEFAULT_ORDER {
            if !order.contains(&mechanism) {
                order.push(mechanism);
            }
        }
        order
    }

    fn is_usable(&self, mechanism: ElevationMechanism) -> bool {
        if mechanism.needs_display() && !self.probe.has_display_session() {
            return false;
        }
        self.probe.has_executable(mechanism.executable())
    }

    /// First usable mechanism in preference order.
    pub fn available_mechanism(&self) -> Option<ElevationMechanism> {
        self.candidates()
            .into_iter()
            .find(|&mechanism| self.is_usable(mechanism))
    }

    /// Wraps `command` for elevated execution when `requires_privilege` is set.
    ///
    /// Returns the command untouched if no privilege is needed or the process is
    /// already root, and [`InstalliumError::ElevationUnavailable`] if no
    /// mechanism can be used.
    pub fn escalate(&self, command: &CommandSpec, requires_privilege: bool) -> Result<CommandSpec> {
        if !requires_privilege {
            return Ok(command.clone());
        }
        if self.probe.is_privileged() {
            debug!("Already running as root; not escalating");
            return Ok(command.clone());
        }

        match self.available_mechanism() {
            Some(mechanism) => {
                info!("Escalating '{}' with {}", command.program, mechanism);
                Ok(command.wrapped_in(&mechanism.wrapper()))
            }
            None => {
                let tried = self
                    .candidates()
                    .iter()
                    .map(ElevationMechanism::executable)
                    .collect::<Vec<_>>()
                    .join(", ");
                Err(InstalliumError::ElevationUnavailable { tried })
            }
        }
    }
}
