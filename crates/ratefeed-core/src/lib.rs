//! # Ratefeed Core
//!
//! Rate derivation and resilience engine for the ratefeed poller.
//!
//! ## Overview
//!
//! Three feeds are polled independently:
//!
//! - **converter**: a JSON mid-market converter API quoted in USD
//! - **order_book**: an exchange page whose embedded book is priced for a
//!   fixed target notional
//! - **portal**: finance portal HTML pages scraped for RUB rates
//!
//! Each cycle flows one way:
//!
//! ```text
//! HttpClient ──▶ extract / weighted_price ──▶ ResilientFetch ──▶ RateAggregator ──▶ RateSink
//!                                                 │
//!                                        FRESH / STALE / MISSING
//! ```
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`domain`] | Depth levels, labels, outcomes, batches |
//! | [`extract`] | Plausibility-bounded number extraction |
//! | [`pricer`] | Volume-weighted execution price |
//! | [`retry`] | Retry policy and backoff windows |
//! | [`resilient`] | Bounded retries with last-known-value fallback |
//! | [`sources`] | Converter, order-book and portal sources |
//! | [`aggregator`] | One cycle over a feed's sources |
//! | [`polling`] | Per-feed loop with cooldown |
//! | [`sink`] | Persistence boundary |
//! | [`config`] | Environment configuration |
//! | [`feeds`] | Poller construction |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use ratefeed_core::{build_poller, FeedId, RatefeedConfig, ReqwestHttpClient, Warehouse};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RatefeedConfig::from_env()?;
//!     let warehouse = Warehouse::open(config.warehouse_config())?;
//!     let mut poller = build_poller(
//!         &config,
//!         FeedId::Portal,
//!         Arc::new(ReqwestHttpClient::new()),
//!         Arc::new(warehouse),
//!     )?;
//!
//!     let report = poller.run_once().await?;
//!     println!("{} persisted={}", report.batch.status(), report.persisted);
//!     Ok(())
//! }
//! ```

pub mod aggregator;
pub mod config;
pub mod domain;
pub mod error;
pub mod extract;
pub mod feeds;
pub mod http_client;
pub mod polling;
pub mod pricer;
pub mod resilient;
pub mod retry;
pub mod sink;
pub mod sources;

pub use aggregator::RateAggregator;
pub use config::RatefeedConfig;
pub use domain::{
    Batch, BatchStatus, DepthLevel, DepthSide, FeedId, FetchOutcome, OrderBook, Origin,
    OriginCounts, RateLabel, RateSample, TargetNotional, UtcDateTime,
};
pub use error::{CoreError, FetchError, ValidationError};
pub use extract::{extract, PlausibilityBounds};
pub use feeds::{build_poller, build_sources};
pub use http_client::{
    HeaderProfile, HttpAuth, HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse,
    ReqwestHttpClient, ScriptedHttpClient,
};
pub use polling::{Cadence, CycleReport, PollStats, Poller, PollerSettings};
pub use pricer::weighted_price;
pub use resilient::{ResilientFetch, SourceMemory};
pub use retry::{Backoff, RetryPolicy};
pub use sink::{MemorySink, RateSink, SinkError};
pub use sources::{
    ConverterSettings, ConverterSource, OrderBookSettings, OrderBookSource, PortalPair,
    PortalSource, RateSource,
};

// Warehouse (re-exported from ratefeed-warehouse)
pub use ratefeed_warehouse::{
    ConverterRateRecord, FeedHealth, OrderBookRateRecord, OrderBookSpread, PortalRateRecord,
    Warehouse, WarehouseConfig, WarehouseError, MAX_READ_ROWS,
};
