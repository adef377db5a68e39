use std::process::ExitCode;

use clap::Parser;
use plexctl::cli::{self, Cli};
use plexctl::config::EnvConfig;
use plexctl::logging::init_logging;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let env = EnvConfig::from_env();
    init_logging(cli.debug || env.debug);

    match cli::run(cli, env).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("Error: {}", cli::error_report(&error));
            ExitCode::FAILURE
        }
    }
}
