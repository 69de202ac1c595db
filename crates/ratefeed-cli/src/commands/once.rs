use std::sync::Arc;

use ratefeed_core::{
    build_poller, FeedId, MemorySink, RateSink, RatefeedConfig, ReqwestHttpClient, Warehouse,
};
use serde_json::Value;

use crate::cli::OnceArgs;
use crate::error::CliError;

pub async fn run(config: RatefeedConfig, args: &OnceArgs) -> Result<Value, CliError> {
    let feed = FeedId::from(args.feed);
    let sink: Arc<dyn RateSink> = if args.persist {
        let warehouse_config = config.warehouse_config();
        let warehouse =
            super::blocking(move || Ok(Warehouse::open(warehouse_config)?)).await?;
        Arc::new(warehouse)
    } else {
        Arc::new(MemorySink::new())
    };

    let mut poller = build_poller(&config, feed, Arc::new(ReqwestHttpClient::new()), sink)?;
    let report = poller.run_once().await?;
    Ok(serde_json::to_value(report)?)
}
