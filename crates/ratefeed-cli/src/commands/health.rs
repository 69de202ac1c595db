use ratefeed_core::{RatefeedConfig, Warehouse};
use serde_json::{json, Value};

use crate::cli::HealthArgs;
use crate::error::CliError;

pub async fn run(config: RatefeedConfig, args: &HealthArgs) -> Result<Value, CliError> {
    let limit = args.limit;

    let (feeds, spreads) = super::blocking(move || {
        let warehouse = Warehouse::open(config.warehouse_config())?;
        Ok((warehouse.feed_health()?, warehouse.order_book_spreads(limit)?))
    })
    .await?;

    Ok(json!({ "feeds": feeds, "order_book_spread": spreads }))
}
