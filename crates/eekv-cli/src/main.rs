//! eekv command-line interface.
//!
//! Manages a JSON document replicated across EEPROM devices.
//!
//! # Quick Start
//!
//! ```bash
//! # Describe the devices once
//! cat > /etc/eekv/eekv.toml <<EOF
//! [[devices]]
//! path = "/sys/bus/i2c/devices/0-0050/eeprom"
//! block_size = 128
//! total_size = 8192
//! EOF
//!
//! # Start with an empty store, then use it
//! eekv clear --yes
//! eekv set serial A-1042
//! eekv read serial
//! ```
//!
//! # Exit Status
//!
//! 0 on success, 2 when a key is not present, 3 when every device failed
//! checksum verification, 1 for anything else.

mod commands;
mod style;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use eekv::{SetOptions, StoreError};
use tracing_subscriber::EnvFilter;

use commands::GlobalOptions;

/// eekv - manages JSON-encoded non-volatile data stored in EEPROMs.
#[derive(Parser)]
#[command(name = "eekv")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Config file (TOML, or a `PATH BLOCK_SIZE TOTAL_SIZE` device table).
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Suppress all output except values that were asked for.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,

    /// When no device passes verification, start over with an empty store.
    #[arg(long, global = true)]
    reset_if_corrupt: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read the value stored under a key.
    Read {
        /// Key to read.
        key: String,
    },

    /// Set a key to a value on every device.
    Set {
        /// Key to set.
        key: String,

        /// Value to store.
        value: String,

        /// Fail if the key is not already present.
        #[arg(short = 'n', long)]
        no_create: bool,

        /// Fill the devices with zeros before writing (slow).
        #[arg(short = 'z', long)]
        zero: bool,
    },

    /// Remove a key from every device.
    Remove {
        /// Key to remove.
        key: String,
    },

    /// List every key.
    List,

    /// Erase all data from every device.
    Clear {
        /// Skip the confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },

    /// Verify device integrity and repair devices that disagree.
    Verify,

    /// Show device geometry and trailer state.
    Info {
        /// Output format.
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Configuration commands.
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Generate shell completions.
    Completions {
        /// Target shell.
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Show version information.
    Version,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the merged configuration.
    Show {
        /// Output format.
        #[arg(long, value_enum, default_value_t = ConfigFormat::Text)]
        format: ConfigFormat,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ConfigFormat {
    Text,
    Json,
    Toml,
}

fn init_logging(quiet: bool, verbose: u8) {
    let default = match (quiet, verbose) {
        (true, _) => "off",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let options = GlobalOptions {
        config: cli.config,
        reset_if_corrupt: cli.reset_if_corrupt,
    };

    match cli.command {
        Commands::Read { key } => commands::kv::read(&options, &key),
        Commands::Set {
            key,
            value,
            no_create,
            zero,
        } => commands::kv::set(
            &options,
            &key,
            &value,
            SetOptions {
                no_create,
                zero_fill: zero,
            },
        ),
        Commands::Remove { key } => commands::kv::remove(&options, &key),
        Commands::List => commands::kv::list(&options),
        Commands::Clear { yes } => commands::clear::run(&options, yes),
        Commands::Verify => commands::verify::run(&options),
        Commands::Info { format } => commands::info::run(&options, format),
        Commands::Config(cmd) => match cmd {
            ConfigCommands::Show { format } => commands::config::show(&options, format),
        },
        Commands::Completions { shell } => {
            commands::completions::run(shell);
            Ok(())
        }
        Commands::Version => {
            commands::version::run();
            Ok(())
        }
    }
}

/// Maps an error to the documented exit status.
fn exit_code(error: &anyhow::Error) -> ExitCode {
    match error.chain().find_map(|e| e.downcast_ref::<StoreError>()) {
        Some(StoreError::KeyNotFound(_)) => ExitCode::from(2),
        Some(StoreError::NoGoodReplica) => ExitCode::from(3),
        _ => ExitCode::FAILURE,
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    style::set_no_color(cli.no_color || std::env::var_os("NO_COLOR").is_some());
    style::set_quiet(cli.quiet);
    init_logging(cli.quiet, cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            style::print_error(&format!("{e:#}"));
            exit_code(&e)
        }
    }
}
