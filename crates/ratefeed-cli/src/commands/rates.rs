use ratefeed_core::{FeedId, RatefeedConfig, Warehouse};
use serde_json::{json, Value};

use crate::cli::RatesArgs;
use crate::error::CliError;

pub async fn run(config: RatefeedConfig, args: &RatesArgs) -> Result<Value, CliError> {
    let feed = FeedId::from(args.feed);
    let limit = args.limit;

    let rows = super::blocking(move || {
        let warehouse = Warehouse::open(config.warehouse_config())?;
        let rows = match feed {
            FeedId::Converter => serde_json::to_value(warehouse.recent_converter_rates(limit)?)?,
            FeedId::OrderBook => serde_json::to_value(warehouse.recent_order_book_rates(limit)?)?,
            FeedId::Portal => serde_json::to_value(warehouse.recent_portal_rates(limit)?)?,
        };
        Ok(rows)
    })
    .await?;

    Ok(json!({ "feed": feed.as_str(), "rows": rows }))
}
