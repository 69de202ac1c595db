mod backup;
mod health;
mod once;
mod rates;
mod run;

use std::collections::BTreeMap;

use ratefeed_core::RatefeedConfig;
use serde_json::Value;

use crate::cli::{Cli, Command};
use crate::error::CliError;

/// Dispatch a parsed command. `Some(value)` is printed as JSON.
pub async fn run(cli: &Cli) -> Result<Option<Value>, CliError> {
    let config = load_config(cli)?;

    match &cli.command {
        Command::Run(args) => run::run(config, args).await.map(|()| None),
        Command::Once(args) => once::run(config, args).await.map(Some),
        Command::Rates(args) => rates::run(config, args).await.map(Some),
        Command::Health(args) => health::run(config, args).await.map(Some),
        Command::Backup(args) => backup::run(config, args).await.map(Some),
    }
}

fn load_config(cli: &Cli) -> Result<RatefeedConfig, CliError> {
    let mut overrides = BTreeMap::new();
    if let Some(home) = &cli.home {
        overrides.insert("RATEFEED_HOME", home.to_string_lossy().into_owned());
    }
    Ok(RatefeedConfig::from_env_with(&overrides)?)
}

/// Run blocking warehouse work off the async runtime.
async fn blocking<T, F>(work: F) -> Result<T, CliError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, CliError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|err| CliError::Command(format!("blocking task failed: {err}")))?
}
