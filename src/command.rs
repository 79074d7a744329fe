//! Program-plus-arguments command model.
//!
//! Commands are never passed through a shell. [`CommandSpec`] keeps the program
//! and its arguments separate so the package path reaches the backend as a single
//! argv entry; the shell-quoted [`Display`](std::fmt::Display) form is only for
//! logs and `--dry-run` output.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};
use shell_escape::escape;

/// A fully formed command: executable followed by its argument list.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new<S: Into<String>>(program: S) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    #[must_use]
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Returns a new command that runs `self` through `wrapper`, e.g. `sudo --`.
    #[must_use]
    pub fn wrapped_in(&self, wrapper: &CommandSpec) -> CommandSpec {
        let mut args = wrapper.args.clone();
        args.push(self.program.clone());
        args.extend(self.args.iter().cloned());
        CommandSpec {
            program: wrapper.program.clone(),
            args,
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", escape(Cow::Borrowed(self.program.as_str())))?;
        for arg in &self.args {
            write!(f, " {}", escape(Cow::Borrowed(arg.as_str())))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_quotes_arguments() {
        let cmd = CommandSpec::new("dpkg").arg("-i").arg("/tmp/my app.deb");
        assert_eq!(cmd.to_string(), "dpkg -i '/tmp/my app.deb'");
    }

    #[test]
    fn test_display_neutralises_metacharacters() {
        let cmd = CommandSpec::new("rpm").args(["-i", "x.rpm; rm -rf /"]);
        let shown = cmd.to_string();
        assert!(shown.contains("'x.rpm; rm -rf /'"));
    }

    #[test]
    fn test_wrapped_in() {
        let cmd = CommandSpec::new("pacman").args(["-U", "/tmp/a.pkg.tar.zst"]);
        let wrapped = cmd.wrapped_in(&CommandSpec::new("sudo").arg("--"));
        assert_eq!(wrapped.program, "sudo");
        assert_eq!(wrapped.args, vec!["--", "pacman", "-U", "/tmp/a.pkg.tar.zst"]);
    }
}
