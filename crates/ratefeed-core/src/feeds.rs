//! Wiring of configured sources into pollers.

use std::sync::Arc;

use crate::aggregator::RateAggregator;
use crate::config::RatefeedConfig;
use crate::domain::FeedId;
use crate::http_client::{HeaderProfile, HttpClient};
use crate::polling::Poller;
use crate::sink::RateSink;
use crate::sources::{ConverterSource, OrderBookSource, PortalSource, RateSource};
use crate::ValidationError;

/// The source set polled for `feed`.
pub fn build_sources(
    config: &RatefeedConfig,
    feed: FeedId,
    http: Arc<dyn HttpClient>,
) -> Vec<Box<dyn RateSource>> {
    match feed {
        FeedId::Converter => vec![Box::new(ConverterSource::new(
            http,
            config.converter.clone(),
            HeaderProfile::default(),
            config.retry,
        ))],
        FeedId::OrderBook => vec![Box::new(OrderBookSource::new(
            http,
            config.order_book.clone(),
            HeaderProfile::default()
                .with_header(
                    "accept",
                    "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
                )
                .with_header("accept-language", "ru-RU,ru;q=0.9,en-US;q=0.8,en;q=0.7"),
            config.retry,
        ))],
        FeedId::Portal => vec![Box::new(PortalSource::new(
            http,
            config.portal_pairs.clone(),
            HeaderProfile::browser().with_header("referer", config.portal_referer.as_str()),
            config.retry,
            config.http_timeout_ms,
        ))],
    }
}

/// A ready-to-run poller for `feed` with fresh, empty memory.
pub fn build_poller(
    config: &RatefeedConfig,
    feed: FeedId,
    http: Arc<dyn HttpClient>,
    sink: Arc<dyn RateSink>,
) -> Result<Poller, ValidationError> {
    let aggregator = RateAggregator::new(feed, build_sources(config, feed, http))?;
    Ok(Poller::new(aggregator, sink, config.poller_settings(feed)))
}
