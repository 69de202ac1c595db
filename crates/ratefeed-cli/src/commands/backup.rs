use ratefeed_core::{RatefeedConfig, Warehouse};
use serde_json::{json, Value};

use crate::cli::BackupArgs;
use crate::error::CliError;

pub async fn run(config: RatefeedConfig, args: &BackupArgs) -> Result<Value, CliError> {
    let backup_dir = args.dir.clone().unwrap_or_else(|| config.backup_dir.clone());

    let path = super::blocking(move || {
        let warehouse = Warehouse::open(config.warehouse_config())?;
        Ok(warehouse.backup(&backup_dir)?)
    })
    .await?;

    Ok(json!({ "backup": path.display().to_string() }))
}
