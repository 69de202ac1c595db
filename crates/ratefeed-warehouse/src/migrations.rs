use ::duckdb::Connection;

struct Migration {
    version: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "0001_rate_tables",
        sql: r#"
CREATE TABLE IF NOT EXISTS converter_rates (
    cycle_id TEXT PRIMARY KEY,
    taken_at TIMESTAMP NOT NULL,
    usd_eur DOUBLE,
    eur_usd DOUBLE,
    usd_gbp DOUBLE,
    usd_cny DOUBLE,
    usd_krw DOUBLE,
    status TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS order_book_rates (
    cycle_id TEXT PRIMARY KEY,
    taken_at TIMESTAMP NOT NULL,
    ask_weighted_price DOUBLE,
    bid_weighted_price DOUBLE,
    target_amount DOUBLE NOT NULL,
    status TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS portal_rates (
    cycle_id TEXT PRIMARY KEY,
    taken_at TIMESTAMP NOT NULL,
    usd_rub DOUBLE,
    eur_rub DOUBLE,
    status TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS ingest_log (
    cycle_id TEXT NOT NULL,
    feed TEXT NOT NULL,
    status TEXT NOT NULL,
    fresh_count INTEGER NOT NULL,
    stale_count INTEGER NOT NULL,
    missing_count INTEGER NOT NULL,
    latency_ms BIGINT,
    timestamp TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    },
    Migration {
        version: "0002_indexes",
        sql: r#"
CREATE INDEX IF NOT EXISTS idx_converter_rates_taken_at ON converter_rates(taken_at);
CREATE INDEX IF NOT EXISTS idx_order_book_rates_taken_at ON order_book_rates(taken_at);
CREATE INDEX IF NOT EXISTS idx_portal_rates_taken_at ON portal_rates(taken_at);
CREATE INDEX IF NOT EXISTS idx_ingest_log_feed_ts ON ingest_log(feed, timestamp);
"#,
    },
];

/// Apply every migration not yet recorded in `schema_migrations`.
pub fn apply_migrations(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    )?;

    for migration in MIGRATIONS {
        let applied: i64 = connection.query_row(
            "SELECT COUNT(*) FROM schema_migrations WHERE version = ?",
            [migration.version],
            |row| row.get(0),
        )?;
        if applied > 0 {
            continue;
        }

        connection.execute_batch(migration.sql)?;
        connection.execute(
            "INSERT INTO schema_migrations (version) VALUES (?)",
            [migration.version],
        )?;
    }

    Ok(())
}

/// Versions known to this build, in application order.
pub fn known_versions() -> impl Iterator<Item = &'static str> {
    MIGRATIONS.iter().map(|migration| migration.version)
}
