use clap::{CommandFactory, Parser, Subcommand, error::ErrorKind};
use exchrates::core::config::AppConfig;
use exchrates::core::log::init_logging;
use std::process::ExitCode;
use tracing::debug;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for exchrates::AppCommand {
    fn from(cmd: Commands) -> exchrates::AppCommand {
        match cmd {
            Commands::Fetch => exchrates::AppCommand::Fetch,
            Commands::Server => exchrates::AppCommand::Server,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the rate feed once and store it
    Fetch,
    /// Serve latest and historical rates over HTTP
    Server,
}

fn print_usage() {
    // Nothing useful left to do if stdout is gone.
    let _ = Cli::command().print_help();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(e) => {
            println!("{}", e.render());
            print_usage();
            return ExitCode::FAILURE;
        }
    };

    let Some(command) = cli.command else {
        println!("No command provided.");
        print_usage();
        return ExitCode::FAILURE;
    };

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(cli.verbose, &config.log_file) {
        eprintln!("{e:#}");
        return ExitCode::FAILURE;
    }
    debug!("Loaded config: {config:?}");

    match exchrates::run_command(command.into(), &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "Application failed");
            ExitCode::FAILURE
        }
    }
}
