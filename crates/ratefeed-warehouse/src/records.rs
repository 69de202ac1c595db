//! Row shapes written by the polling feeds and read back from the views.
//!
//! Timestamps are UTC strings in `YYYY-MM-DD HH:MM:SS` form so they cast
//! cleanly to `TIMESTAMP`. Rates are optional: a PARTIAL batch leaves the
//! unresolved columns NULL.

use serde::Serialize;

/// One converter API batch (USD-based mid-market rates).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConverterRateRecord {
    pub cycle_id: String,
    pub taken_at: String,
    pub usd_eur: Option<f64>,
    pub eur_usd: Option<f64>,
    pub usd_gbp: Option<f64>,
    pub usd_cny: Option<f64>,
    pub usd_krw: Option<f64>,
    pub status: String,
}

/// One order-book batch: weighted execution prices for a fixed notional.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderBookRateRecord {
    pub cycle_id: String,
    pub taken_at: String,
    pub ask_weighted_price: Option<f64>,
    pub bid_weighted_price: Option<f64>,
    pub target_amount: f64,
    pub status: String,
}

/// One finance-portal batch of scraped RUB rates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortalRateRecord {
    pub cycle_id: String,
    pub taken_at: String,
    pub usd_rub: Option<f64>,
    pub eur_rub: Option<f64>,
    pub status: String,
}

/// Audit row written in the same transaction as every rate record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestLogEntry {
    pub feed: String,
    pub fresh_count: u32,
    pub stale_count: u32,
    pub missing_count: u32,
    pub latency_ms: u64,
}

/// One `vw_feed_health` row: batch counts and degraded values per feed and status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedHealth {
    pub feed: String,
    pub status: String,
    pub batches: i64,
    pub stale_values: i64,
    pub missing_values: i64,
    pub avg_latency_ms: Option<f64>,
    pub last_seen: Option<String>,
}

/// One `vw_order_book_spread` row. Spread columns are NULL when a side is missing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderBookSpread {
    pub taken_at: String,
    pub target_amount: f64,
    pub ask: Option<f64>,
    pub bid: Option<f64>,
    pub spread: Option<f64>,
    pub spread_pct: Option<f64>,
}
