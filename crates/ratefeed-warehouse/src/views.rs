//! Analytical views over the rate tables.

use ::duckdb::Connection;

/// Create the reporting views.
///
/// - `vw_feed_health`: batch counts, degraded values, and latency per feed and status
/// - `vw_order_book_spread`: absolute and relative ask/bid spread per order-book cycle
///
/// # Errors
/// Returns an error if the view creation SQL fails to execute.
pub fn create_views(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch(
        r"
CREATE OR REPLACE VIEW vw_feed_health AS
SELECT
    feed,
    status,
    COUNT(*) AS batches,
    SUM(stale_count)::BIGINT AS stale_values,
    SUM(missing_count)::BIGINT AS missing_values,
    AVG(latency_ms)::DOUBLE AS avg_latency_ms,
    CAST(MAX(timestamp) AS VARCHAR) AS last_seen
FROM ingest_log
GROUP BY feed, status;

CREATE OR REPLACE VIEW vw_order_book_spread AS
SELECT
    CAST(taken_at AS VARCHAR) AS taken_at,
    target_amount,
    ask_weighted_price AS ask,
    bid_weighted_price AS bid,
    (ask_weighted_price - bid_weighted_price)::DOUBLE AS spread,
    CASE
        WHEN ask_weighted_price IS NULL OR bid_weighted_price IS NULL THEN NULL
        WHEN bid_weighted_price = 0 THEN NULL
        ELSE ((ask_weighted_price - bid_weighted_price) / bid_weighted_price)::DOUBLE
    END AS spread_pct
FROM order_book_rates;
",
    )?;

    Ok(())
}
