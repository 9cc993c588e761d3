//! NETCONF interface configuration CLI (ncif)

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use ncif::commands::{ApplyCommand, GetCommand, OutputFormat};
use ncif::context::CliContext;
use ncif_session::askpass_response;

/// Exit code when the device rejected the change and it was discarded
const EXIT_DISCARDED: i32 = 2;

#[derive(Parser)]
#[command(name = "ncif")]
#[command(about = "NETCONF interface configuration CLI")]
#[command(long_about = "
NETCONF interface configuration CLI

Reads interface descriptions and IPv4 addresses from a device's running
configuration and applies desired state through the candidate datastore
with lock, validate and commit or discard.

Settings come from --config and NCIF_* environment variables
(NCIF_HOST, NCIF_USERNAME, NCIF_PASSWORD, NCIF_FILTER_FILE, ...).

Examples:
  ncif get                                 # Read with the configured filter
  ncif get --filter filter.xml -f json     # Read with a specific filter
  ncif apply --state desired.yaml          # Apply desired state
  ncif apply --dry-run                     # Print the edit-config payload
")]
struct Cli {
    /// Settings file (yaml, toml or json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short = 'V', long, global = true)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read interfaces from the running datastore
    Get {
        /// Subtree filter file (overrides the filter_file setting)
        #[arg(long)]
        filter: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Apply desired interface state
    Apply {
        /// Desired state file (overrides the state_file setting)
        #[arg(short, long)]
        state: Option<PathBuf>,

        /// Print the encoded payload without connecting
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // ssh runs this binary as SSH_ASKPASS when a password is configured
    if let Some(secret) = askpass_response() {
        println!("{}", secret);
        std::process::exit(0);
    }

    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let result = match CliContext::bootstrap(cli.config.as_deref()) {
        Ok(context) => match cli.command {
            Commands::Get { filter, format } => GetCommand::new(context)
                .execute(filter.as_deref(), format)
                .await
                .map(|()| true),
            Commands::Apply { state, dry_run } => {
                ApplyCommand::new(context)
                    .execute(state.as_deref(), dry_run)
                    .await
            }
        },
        Err(e) => Err(e),
    };

    // Handle errors with appropriate exit codes
    match result {
        Ok(true) => {
            if !cli.quiet {
                log::info!("Command completed successfully");
            }
            std::process::exit(0);
        }
        Ok(false) => std::process::exit(EXIT_DISCARDED),
        Err(e) => {
            if !cli.quiet {
                eprintln!("Error: {}", e);

                // Print error chain if in verbose mode
                if cli.verbose || cli.debug {
                    for cause in e.chain().skip(1) {
                        eprintln!("  Caused by: {}", cause);
                    }
                }
            }
            std::process::exit(1);
        }
    }
}
