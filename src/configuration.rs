//! User configuration.
//!
//! Sources are layered, later ones winning:
//!
//! 1. built-in defaults
//! 2. `$XDG_CONFIG_HOME/installium/config.toml` (usually `~/.config/installium`)
//! 3. a file passed with `--config`
//! 4. `INSTALLIUM_*` environment variables, e.g. `INSTALLIUM_SNIFF_MAGIC=true` or
//!    `INSTALLIUM_EXTRA_ARGS__PACMAN="--needed"`
//!
//! ```toml
//! non_interactive = true
//! preferred_elevation = "sudo"
//! grace_period_secs = 10
//!
//! [extra_args]
//! dpkg = "--force-confold"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use validator::Validate;

use crate::backends::BackendKind;
use crate::distro::DistroFamily;
use crate::escalation::ElevationMechanism;
use crate::registry::BackendOptions;

pub const ENV_PREFIX: &str = "INSTALLIUM";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Validate)]
#[serde(default)]
pub struct InstalliumConfig {
    /// Pass `--noconfirm` to pacman and keep apk non-interactive.
    pub non_interactive: bool,
    /// Inspect magic bytes when the file name has no known suffix.
    pub sniff_magic: bool,
    /// Elevation tool tried before the default order.
    pub preferred_elevation: Option<ElevationMechanism>,
    /// Skip host detection and treat the host as this family.
    pub distro_override: Option<DistroFamily>,
    /// Seconds between SIGTERM and SIGKILL when an install is cancelled.
    #[validate(range(min = 1, max = 600, message = "grace_period_secs must be between 1 and 600"))]
    pub grace_period_secs: u64,
    /// Output lines attached to failure reports.
    #[validate(range(min = 1, max = 200, message = "output_tail_lines must be between 1 and 200"))]
    pub output_tail_lines: usize,
    /// Extra arguments per backend (`dpkg`, `rpm`, `pacman`, `apk`), shell-word split.
    pub extra_args: BTreeMap<String, String>,
}

impl Default for InstalliumConfig {
    fn default() -> Self {
        Self {
            non_interactive: true,
            sniff_magic: false,
            preferred_elevation: None,
            distro_override: None,
            grace_period_secs: 5,
            output_tail_lines: 5,
            extra_args: BTreeMap::new(),
        }
    }
}

impl InstalliumConfig {
    /// Location of the per-user configuration file.
    pub fn default_path() -> Option<PathBuf> {
        BaseDirs::new().map(|dirs| dirs.config_dir().join("installium").join("config.toml"))
    }

    /// Loads every layer. `explicit` must exist when given; the per-user file
    /// is optional.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = Self::default_path() {
            debug!("Looking for user config at {}", path.display());
            builder = builder.add_source(File::from(path).required(false));
        }
        if let Some(path) = explicit {
            info!("Loading config from {}", path.display());
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        Self::from_builder(builder)
    }

    /// Parses a TOML document on top of the defaults.
    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        Self::from_builder(Config::builder().add_source(File::from_str(contents, FileFormat::Toml)))
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> anyhow::Result<Self> {
        let config: InstalliumConfig = builder
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Failed to parse configuration")?;

        config
            .validate()
            .context("Configuration validation failed")?;
        // Surface bad extra_args now rather than at install time
        config.backend_options()?;

        Ok(config)
    }

    /// Registry options derived from this configuration.
    pub fn backend_options(&self) -> anyhow::Result<BackendOptions> {
        let mut extra_args = BTreeMap::new();
        for (name, raw) in &self.extra_args {
            let kind: BackendKind = name
                .parse()
                .map_err(|e: String| anyhow!(e))
                .with_context(|| format!("Invalid key extra_args.{name}"))?;
            let args = shlex::split(raw)
                .ok_or_else(|| anyhow!("Unbalanced quoting in extra_args.{name}: {raw}"))?;
            extra_args.insert(kind, args);
        }

        Ok(BackendOptions {
            non_interactive: self.non_interactive,
            extra_args,
        })
    }

    pub fn grace_period(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.grace_period_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = InstalliumConfig::from_toml_str("").unwrap();
        assert_eq!(config, InstalliumConfig::default());
        assert!(config.non_interactive);
        assert_eq!(config.grace_period(), std::time::Duration::from_secs(5));
    }

    #[test]
    fn test_overrides_from_toml() {
        let config = InstalliumConfig::from_toml_str(
            r#"
non_interactive = false
sniff_magic = true
preferred_elevation = "doas"
distro_override = "fedora"
output_tail_lines = 20
"#,
        )
        .unwrap();

        assert!(!config.non_interactive);
        assert!(config.sniff_magic);
        assert_eq!(config.preferred_elevation, Some(ElevationMechanism::Doas));
        assert_eq!(config.distro_override, Some(DistroFamily::FedoraRhel));
        assert_eq!(config.output_tail_lines, 20);
        assert_eq!(config.grace_period_secs, 5);
    }

    #[test]
    fn test_out_of_range_grace_period_is_rejected() {
        let err = InstalliumConfig::from_toml_str("grace_period_secs = 0").unwrap_err();
        assert!(format!("{err:#}").contains("grace_period_secs"));
    }

    #[test]
    fn test_extra_args_are_shell_split() {
        let config = InstalliumConfig::from_toml_str(
            r#"
[extra_args]
pacman = "--needed --overwrite '/usr/lib/foo bar'"
"#,
        )
        .unwrap();

        let options = config.backend_options().unwrap();
        assert_eq!(
            options.extra_args.get(&BackendKind::Pacman),
            Some(&vec![
                "--needed".to_string(),
                "--overwrite".to_string(),
                "/usr/lib/foo bar".to_string()
            ])
        );
    }

    #[test]
    fn test_unknown_backend_in_extra_args() {
        let err = InstalliumConfig::from_toml_str("[extra_args]\nzypper = \"-n\"").unwrap_err();
        assert!(format!("{err:#}").contains("extra_args.zypper"));
    }

    #[test]
    fn test_unbalanced_quotes_in_extra_args() {
        assert!(InstalliumConfig::from_toml_str("[extra_args]\ndpkg = \"'oops\"").is_err());
    }

    #[test]
    fn test_explicit_file_is_loaded() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "output_tail_lines = 42").unwrap();

        let config = InstalliumConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.output_tail_lines, 42);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(InstalliumConfig::load(Some(&missing)).is_err());
    }
}
