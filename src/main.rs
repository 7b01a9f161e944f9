/*!
 * dsx CLI - Command Line Interface
 *
 * Drives dataspace transactions and credential requests against one provider.
 */

use clap::{Parser, Subcommand, ValueEnum};
use dsx::{
    commands::{self, GlobalOverrides},
    config::LogLevel,
    error::EXIT_FAILURE,
    logging,
    output::OutputWriter,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dsx")]
#[command(
    version,
    about = "Dataspace transaction driver: catalog, negotiation, transfer and data access",
    long_about = None
)]
struct Cli {
    /// Path to config file (defaults apply when absent)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output results as JSON Lines (one JSON object per line)
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose logging (equivalent to --log-level=debug)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Path to a JSON log file (default: stderr)
    #[arg(long, value_name = "FILE", global = true)]
    log: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, value_enum, global = true)]
    log_level: Option<LogLevelArg>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one transaction: prerequisites, catalog, negotiation, transfer, data access
    E2e {
        /// Asset to negotiate for (default from config)
        #[arg(long)]
        asset_id: Option<String>,

        /// Skip the prerequisite gate
        #[arg(long)]
        skip_prerequisites: bool,
    },

    /// Request verifiable credentials from the issuer through the identity hub
    RequestCredentials {
        /// Credential type to request (repeatable; default: all configured)
        #[arg(long = "type", value_name = "TYPE")]
        types: Vec<String>,

        /// Succeed even when issuance could not be observed
        #[arg(long)]
        allow_indeterminate: bool,
    },

    /// Run the prerequisite checks without starting a transaction
    Check,

    /// Wait until every provider component answers its health check
    WaitHealthy {
        /// Attempts per component (default from config)
        #[arg(long)]
        max_attempts: Option<u32>,

        /// Seconds between attempts (default from config)
        #[arg(long, value_name = "SECS")]
        interval: Option<u64>,
    },

    /// Print the resolved configuration with secrets masked
    Config,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevelArg> for LogLevel {
    fn from(arg: LogLevelArg) -> Self {
        match arg {
            LogLevelArg::Error => LogLevel::Error,
            LogLevelArg::Warn => LogLevel::Warn,
            LogLevelArg::Info => LogLevel::Info,
            LogLevelArg::Debug => LogLevel::Debug,
            LogLevelArg::Trace => LogLevel::Trace,
        }
    }
}

fn main() {
    let code = match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            EXIT_FAILURE
        }
    };
    std::process::exit(code);
}

fn run() -> anyhow::Result<i32> {
    let cli = Cli::parse();
    let out = OutputWriter::new(cli.json);

    let overrides = GlobalOverrides {
        log_level: cli.log_level.map(Into::into),
        log_file: cli.log.clone(),
        verbose: cli.verbose,
    };
    let config = commands::load_config(cli.config.as_deref(), &overrides)?;

    if let Err(e) = logging::init_logging(&config) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    let code = match cli.command {
        Commands::E2e {
            asset_id,
            skip_prerequisites,
        } => {
            let http = commands::http_client(&config)?;
            commands::e2e::run(&config, http, asset_id, skip_prerequisites, &out)?
        }
        Commands::RequestCredentials {
            types,
            allow_indeterminate,
        } => {
            let http = commands::http_client(&config)?;
            commands::credentials::run(&config, http, &types, allow_indeterminate, &out)?
        }
        Commands::Check => {
            let http = commands::http_client(&config)?;
            commands::check::run(&config, http, &out)?
        }
        Commands::WaitHealthy {
            max_attempts,
            interval,
        } => {
            let http = commands::http_client(&config)?;
            commands::health::run(&config, http, max_attempts, interval, &out)?
        }
        Commands::Config => commands::show_config::run(&config, &out)?,
    };
    Ok(code)
}
