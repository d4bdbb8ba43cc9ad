#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

mod commands;
mod logging;

use clap::Parser;
use miette::Result;
use pipepack_core::Config;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pipepack")]
#[command(author, version, about = "Build a source tree into browser-ready ES modules", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH", env = "PIPEPACK_CWD")]
    cwd: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print version information
    Version,

    /// Transform sources into the output directory
    Build {
        /// Hand the output to the configured bundler
        #[arg(long, overrides_with = "no_bundle")]
        bundle: bool,

        /// Skip the bundle stage even if the config enables it
        #[arg(long, overrides_with = "bundle")]
        no_bundle: bool,

        /// Config file (default: pipepack.config.json, then package.json "pipepack")
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Output directory, relative to the working directory
        #[arg(long, value_name = "DIR")]
        out: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Determine working directory
    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    let config = Config::new(cwd)
        .with_verbosity(cli.verbose)
        .with_json_logs(cli.json);

    logging::init(config.verbosity, config.json_logs);

    match cli.command {
        Some(Commands::Version) | None => commands::version::run(),
        Some(Commands::Build {
            bundle,
            no_bundle,
            config: config_path,
            out,
        }) => {
            let action = commands::build::BuildAction {
                cwd: config.cwd.clone(),
                config_path,
                out,
                bundle: match (bundle, no_bundle) {
                    (true, _) => Some(true),
                    (_, true) => Some(false),
                    _ => None,
                },
            };
            let span = tracing::info_span!("build", cmd = "build", cwd = %config.cwd.display());
            let _guard = span.enter();
            commands::build::run(action, config.json_logs)
        }
    }
}
