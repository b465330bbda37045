mod cli;
mod commands;
mod config;
mod error;
mod input;
mod options;
mod output;
mod pipelines;
mod plugins;
mod terminal;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::cli::{AnalyzeCommand, CliArgs, Command};
use crate::commands::Outcome;
use crate::error::{CliError, EXIT_FAILURE};
use crate::plugins::Plugins;
use crate::terminal::Terminal;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    // Logs go to stderr; stdout carries conversion output.
    let default_level = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let terminal = Terminal::new();
    let plugins = Plugins::builtin();

    match run(&args, &plugins, &terminal).await {
        Ok(Outcome::Success) => ExitCode::SUCCESS,
        Ok(Outcome::Failure) => ExitCode::from(EXIT_FAILURE),
        Err(e) => {
            let code = e
                .chain()
                .find_map(|cause| cause.downcast_ref::<CliError>())
                .map_or(EXIT_FAILURE, CliError::exit_code);
            let message = if args.verbose {
                format!("{:?}", e)
            } else {
                format!("{:#}", e)
            };
            if terminal.print_error(&message).is_err() {
                eprintln!("Error: {}", message);
            }
            debug!(exit_code = code, "command failed");
            ExitCode::from(code)
        }
    }
}

async fn run(args: &CliArgs, plugins: &Plugins, terminal: &Terminal) -> Result<Outcome> {
    match &args.command {
        Command::Convert(convert) => commands::convert::run(convert, plugins, terminal),
        Command::Check(check) => commands::check::run(check, plugins, terminal),
        Command::List { what } => {
            commands::list::run(what, plugins, terminal)?;
            Ok(Outcome::Success)
        }
        Command::Analyze { what } => {
            match what {
                AnalyzeCommand::Attack(attack) => commands::analyze::attack::run(attack)?,
                AnalyzeCommand::Fields(fields) => commands::analyze::fields::run(fields, plugins)?,
                AnalyzeCommand::Logsource(logsource) => commands::analyze::logsource::run(logsource)?,
            }
            Ok(Outcome::Success)
        }
        Command::Version(version) => {
            commands::version::run(version, terminal).await?;
            Ok(Outcome::Success)
        }
    }
}
