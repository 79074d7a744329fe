//! Output formatting utilities for the Installium CLI.
//!
//! Colored message helpers plus the renderer for [`InstallOutcome`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use installium::output::{success, error, warning, info};
//!
//! success("Package installed successfully");
//! error("Failed to install package");
//! warning("pkexec needs a graphical session");
//! info("Detected an Arch Linux host");
//! ```

use colored::{ColoredString, Colorize};

use crate::reporter::{InstallOutcome, OutcomeStatus};

/// Print a success message in green with a checkmark
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print an error message in red with an X mark, to stderr
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a warning message in yellow with a warning sign
pub fn warning(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an info message in blue with an info icon
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Format a package name with emphasis
///
/// ```rust
/// use installium::output::package_name;
///
/// let formatted = package_name("ripgrep");
/// assert!(formatted.contains("ripgrep"));
/// ```
pub fn package_name(name: &str) -> String {
    name.cyan().to_string()
}

/// Format a backend executable name with emphasis
pub fn backend_name(name: &str) -> String {
    name.magenta().to_string()
}

/// Dimmed line of child process output, as streamed during an install.
pub fn output_line(line: &str) {
    println!("  {}", line.dimmed());
}

/// Colored label for an outcome status.
pub fn status_label(status: OutcomeStatus) -> ColoredString {
    let label = status.to_string();
    match status {
        OutcomeStatus::Success => label.green().bold(),
        OutcomeStatus::AlreadyInstalled => label.yellow().bold(),
        OutcomeStatus::Cancelled => label.yellow(),
        _ => label.red().bold(),
    }
}

/// Human rendering of a finished install.
pub fn render_outcome(outcome: &InstallOutcome) {
    match outcome.status {
        OutcomeStatus::Success => success(&outcome.message),
        OutcomeStatus::AlreadyInstalled | OutcomeStatus::Cancelled => warning(&outcome.message),
        _ => error(&outcome.message),
    }

    if outcome.status.is_success() {
        return;
    }
    eprintln!("  {} {}", "status:".dimmed(), status_label(outcome.status));
    if let Some(code) = outcome.raw_exit_code {
        eprintln!("  {} {}", "exit code:".dimmed(), code);
    }
    if !outcome.output_tail.is_empty() && outcome.status != OutcomeStatus::Cancelled {
        eprintln!("  {}", "last output:".dimmed());
        for line in &outcome.output_tail {
            eprintln!("    {line}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_name_format() {
        assert!(package_name("ripgrep").contains("ripgrep"));
    }

    #[test]
    fn test_status_label_text() {
        colored::control::set_override(false);
        assert_eq!(
            status_label(OutcomeStatus::MissingDependency).to_string(),
            "missing-dependency"
        );
        colored::control::unset_override();
    }
}
