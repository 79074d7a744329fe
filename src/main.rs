use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use tracing::{debug, trace, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use installium::commands::{self, InstallOptions, EXIT_CONFIG, EXIT_INTERNAL, EXIT_USAGE};
use installium::{DistroFamily, HostInstaller, InstalliumConfig};

/// Install a package file with the native package manager of this Linux host.
#[derive(Parser)]
#[clap(
    author,
    version = clap::crate_version!(),
    max_term_width = 100,
    about,
    args_conflicts_with_subcommands = true
)]
struct Cli {
    #[clap(subcommand)]
    command: Option<Commands>,

    /// Package file to install (.deb, .rpm, .pkg.tar.zst, .pkg.tar.xz, .apk)
    package: Option<PathBuf>,

    /// Increase logging level (-v: info, -vv: debug, -vvv: trace)
    #[clap(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Path to a configuration file (TOML)
    #[clap(short, long, global = true)]
    config: Option<PathBuf>,

    /// Treat the host as this distribution family instead of detecting it
    #[clap(long, global = true, value_parser = clap::value_parser!(DistroFamily))]
    distro: Option<DistroFamily>,

    /// Print the command that would run without running it
    #[clap(long)]
    dry_run: bool,

    /// Do not ask for confirmation
    #[clap(short = 'y', long)]
    yes: bool,

    /// Print results as JSON
    #[clap(long, global = true)]
    json: bool,

    /// Let the package manager ask its own questions (no --noconfirm)
    #[clap(long)]
    interactive: bool,

    /// Exit with the package manager's exit code when it reports a failure
    #[clap(long)]
    passthrough_exit_code: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show metadata of a package file and whether it fits this host
    Info {
        /// Package file to inspect
        package: PathBuf,
    },
    /// List the installer backends and whether they are present
    Backends,
    /// Check that this host can install packages
    Doctor,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

fn init_tracing(verbose: u8) -> anyhow::Result<()> {
    let log_level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let env_filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env_lossy();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

fn setup_failed(err: anyhow::Error) -> i32 {
    eprintln!("error: {err:#}");
    EXIT_CONFIG
}

async fn run() -> anyhow::Result<i32> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        // clap would exit with 2, which means "no backend" here
        Err(err) if err.use_stderr() => {
            err.print()?;
            return Ok(EXIT_USAGE);
        }
        Err(err) => err.exit(),
    };

    if let Some(Commands::Completions { shell }) = &cli.command {
        let mut cmd = Cli::command();
        generate(*shell, &mut cmd, "installium", &mut std::io::stdout());
        return Ok(0);
    }

    init_tracing(cli.verbose)?;
    debug!("Argument parsing complete.");

    let mut config = match InstalliumConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => return Ok(setup_failed(e)),
    };
    if cli.interactive {
        config.non_interactive = false;
    }
    trace!("{:?}", config);

    let installer = match HostInstaller::from_config(&config, cli.distro) {
        Ok(installer) => installer,
        Err(e) => {
            let err = anyhow::Error::new(e).context("Failed to set up the installer");
            return Ok(setup_failed(err));
        }
    };

    match &cli.command {
        Some(Commands::Info { package }) => commands::info_command(&installer, package, cli.json).await,
        Some(Commands::Backends) => commands::backends_command(&installer, cli.json),
        Some(Commands::Doctor) => commands::doctor_command(&installer, cli.json),
        Some(Commands::Completions { .. }) => {
            unreachable!("Completions should be handled before this point")
        }
        None => match &cli.package {
            Some(package) => {
                let options = InstallOptions {
                    dry_run: cli.dry_run,
                    assume_yes: cli.yes,
                    json: cli.json,
                    passthrough_exit_code: cli.passthrough_exit_code,
                };
                commands::install_command(Arc::new(installer), package, options).await
            }
            None => {
                Cli::command().print_help()?;
                Ok(0)
            }
        },
    }
}

#[tokio::main]
async fn main() {
    match run().await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(EXIT_INTERNAL);
        }
    }
}
