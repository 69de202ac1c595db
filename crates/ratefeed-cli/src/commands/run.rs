use std::sync::Arc;

use ratefeed_core::{FeedId, RatefeedConfig, ReqwestHttpClient, Warehouse};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::supervisor::Supervisor;

pub async fn run(config: RatefeedConfig, args: &RunArgs) -> Result<(), CliError> {
    let mut feeds: Vec<FeedId> = args.feeds.iter().copied().map(FeedId::from).collect();
    if feeds.is_empty() {
        feeds = FeedId::ALL.to_vec();
    }
    feeds.sort();
    feeds.dedup();

    let warehouse_config = config.warehouse_config();
    let warehouse = super::blocking(move || Ok(Warehouse::open(warehouse_config)?)).await?;

    Supervisor::new(config, Arc::new(ReqwestHttpClient::new()), warehouse)
        .with_backups(!args.no_backup)
        .run(feeds)
        .await
}
