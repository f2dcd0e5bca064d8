#![warn(clippy::pedantic)]

//! # vodka
//!
//! A manager for Wine versions and components. Versions are unpacked under
//! the managed root (`~/.vodka`, or `$VODKA_HOME`), one of them is the
//! default, and components can be applied to Wine prefixes.
//!
//! ## Subcommands
//!
//! - `install` - Install a Wine version from the catalog
//! - `uninstall` - Remove an installed version
//! - `default` - Show or set the default version
//! - `list` - Browse the versions catalog
//! - `refresh` - Re-fetch the versions catalog
//! - `component` - Install, list, refresh and remove components
//! - `execute` - Run a program with an installed version
//!
//! ## Examples
//!
//! ```bash
//! vodka refresh
//! vodka install stable-9.0
//! vodka component install d3dx9 --prefix ~/.wine
//! vodka execute wine winecfg
//! ```

mod commands;
mod errors;
mod manager;
mod prefix;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{component, default, execute, install, list, refresh, uninstall};
use errors::VodkaError;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Wine version and component manager.
#[derive(Parser)]
#[command(
    name = "vodka",
    author,
    version,
    about = "Wine version and component manager",
    after_help = "\
ENVIRONMENT VARIABLES:
    VODKA_HOME              Managed root (default: ~/.vodka)
    VODKA_VERSIONS_URL      Versions catalog URL
    VODKA_COMPONENTS_URL    Components catalog URL
    RUST_LOG                Log filter (default: vodka=warn)"
)]
pub struct Cli {
    /// Enable debug logging on stderr.
    #[clap(long, global = true, action = clap::ArgAction::SetTrue)]
    pub debug: bool,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands for the vodka CLI.
#[derive(Subcommand)]
pub enum Commands {
    /// Install a Wine version.
    ///
    /// Downloads and unpacks a version from the versions catalog. The first
    /// version installed becomes the default.
    Install(install::InstallArgs),

    /// Uninstall a Wine version.
    Uninstall(uninstall::UninstallArgs),

    /// Show or set the default Wine version.
    Default(default::DefaultArgs),

    /// List versions from the catalog.
    ///
    /// Entries are grouped by category and marked when installed or default.
    List(list::ListArgs),

    /// Re-fetch the versions catalog.
    Refresh,

    /// Manage components.
    Component(component::ComponentArgs),

    /// Run a program with an installed Wine version.
    ///
    /// The version's bin directory is prepended to PATH. The first argument
    /// selects the version when it names an installed one; otherwise the
    /// default version is used.
    Execute(execute::ExecuteArgs),
}

/// Initializes the tracing subscriber.
///
/// `--debug` forces `vodka=debug`; otherwise `RUST_LOG` applies, falling
/// back to `vodka=warn`. Logs go to stderr.
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("vodka=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vodka=warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    if let Err(e) = run(cli) {
        let exit_code = handle_error(&e);
        std::process::exit(exit_code);
    }
}

/// Handles an error and returns the appropriate exit code.
///
/// For `ProcessExitCode` errors, returns the embedded exit code without
/// printing an error message (the child already printed its output).
/// For all other errors, prints the error and returns exit code 1.
fn handle_error(e: &anyhow::Error) -> i32 {
    if let Some(VodkaError::ProcessExitCode { code }) = e.downcast_ref::<VodkaError>() {
        return *code;
    }
    eprintln!("Error: {e:?}");
    1
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Install(args) => install::execute(&args),
        Commands::Uninstall(args) => uninstall::execute(&args),
        Commands::Default(args) => default::execute(&args),
        Commands::List(args) => list::execute(&args),
        Commands::Refresh => refresh::execute(),
        Commands::Component(args) => component::execute(&args),
        Commands::Execute(args) => execute::execute(&args),
    }
}
