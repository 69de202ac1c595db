mod cli;
mod commands;
mod error;
mod output;
mod supervisor;
mod telemetry;

use std::process::ExitCode;

use clap::Parser;

use crate::cli::Cli;
use crate::error::CliError;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(error.exit_code())
        }
    }
}

async fn run() -> Result<ExitCode, CliError> {
    let cli = Cli::parse();
    telemetry::init_tracing(&cli.log_filter);

    if let Some(value) = commands::run(&cli).await? {
        output::render(&value, cli.pretty)?;
    }

    Ok(ExitCode::SUCCESS)
}
