//! protogen CLI - Dissector generator
//!
//! Commands:
//! - `protogen generate` - Generate Spicy sources from a schema directory
//! - `protogen watch` - Generate for every schema directory or archive dropped into a folder

use clap::{Parser, Subcommand};
use protogen_core::LogLevel;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc;
use std::time::Duration;

mod generate;
mod watch;

#[derive(Parser)]
#[command(name = "protogen")]
#[command(author, version, about = "Generate Zeek Spicy dissectors from JSON protocol schemas", long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error, off); RUST_LOG narrows it further
    #[arg(long, global = true, default_value = "info")]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate sources for one schema directory
    Generate {
        /// Directory holding config.json (or default/config.json) and the scope directories
        input: PathBuf,

        /// Directory receiving the generated files
        output: PathBuf,

        /// Explicit path to config.json
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Watch a directory and generate for every new schema directory or zip archive
    Watch {
        /// Directory to watch
        input: PathBuf,

        /// Root receiving one sub-directory of generated files per arrival
        output: PathBuf,

        /// Polling interval in milliseconds
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,

        /// How long an arrival must stay unchanged before it is processed
        #[arg(long, default_value_t = 2000)]
        debounce_ms: u64,

        /// Directory archives are extracted into (default: <tmp>/protogen-staging)
        #[arg(long)]
        staging: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    protogen_logging::init_logging(cli.log_level);

    match cli.command {
        Commands::Generate {
            input,
            output,
            config,
        } => generate::run(&input, &output, config.as_deref()),
        Commands::Watch {
            input,
            output,
            interval_ms,
            debounce_ms,
            staging,
        } => {
            let options = watch::WatchOptions {
                input,
                output,
                interval: Duration::from_millis(interval_ms),
                debounce: Duration::from_millis(debounce_ms),
                staging: staging.unwrap_or_else(|| std::env::temp_dir().join("protogen-staging")),
            };
            // The sender stays alive for the life of the process, so the loop runs until killed
            let (_stop, stop_rx) = mpsc::channel();
            match watch::run(&options, &stop_rx) {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    eprintln!("error[watch]: {e:#}");
                    ExitCode::from(3)
                }
            }
        }
    }
}
