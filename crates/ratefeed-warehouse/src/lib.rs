//! # Ratefeed Warehouse
//!
//! DuckDB-backed storage for polled exchange rates.
//!
//! ## Overview
//!
//! Every polling feed persists one row per cycle into its own table, together
//! with an `ingest_log` audit row written in the same transaction. Stored
//! rates are read back as typed records, newest first, and the analytic views
//! as typed rows. Point-in-time backups use `EXPORT DATABASE`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ratefeed_warehouse::Warehouse;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let warehouse = Warehouse::open_default()?;
//!     for health in warehouse.feed_health()? {
//!         println!("{} {}: {} batches", health.feed, health.status, health.batches);
//!     }
//!     for row in warehouse.recent_portal_rates(5)? {
//!         println!("{} USD/RUB={:?}", row.taken_at, row.usd_rub);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Tables
//!
//! | Table | Description |
//! |-------|-------------|
//! | `converter_rates` | USD-based mid-market rates from the converter API |
//! | `order_book_rates` | Weighted ask/bid execution prices for a target notional |
//! | `portal_rates` | RUB rates scraped from the finance portal |
//! | `ingest_log` | One audit row per persisted batch |
//! | `schema_migrations` | Applied migration versions |

pub mod migrations;
pub mod pool;
pub mod records;
pub mod views;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use ::duckdb::{Connection, Row, ToSql};
use thiserror::Error;
use time::macros::format_description;
use time::OffsetDateTime;

pub use pool::{ConnectionPool, PooledConnection};
pub use records::{
    ConverterRateRecord, FeedHealth, IngestLogEntry, OrderBookRateRecord, OrderBookSpread,
    PortalRateRecord,
};

/// Upper bound on rows returned by a single read.
pub const MAX_READ_ROWS: usize = 10_000;

/// Errors that can occur during warehouse operations.
#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("row limit must be between 1 and {max}, got {limit}")]
    InvalidLimit { limit: usize, max: usize },

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("backup target already exists: {}", .0.display())]
    BackupExists(PathBuf),

    #[error(transparent)]
    Timestamp(#[from] time::error::Format),
}

/// Location and pool sizing of the warehouse database.
#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    /// Root directory for ratefeed data.
    pub home: PathBuf,
    /// Path to the `DuckDB` database file.
    pub db_path: PathBuf,
    /// Maximum number of idle connections kept by the pool.
    pub max_pool_size: usize,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        let home = resolve_ratefeed_home();
        let db_path = home.join("rates.duckdb");
        Self {
            home,
            db_path,
            max_pool_size: 4,
        }
    }
}

/// Rate storage handle. Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct Warehouse {
    config: WarehouseConfig,
    pool: ConnectionPool,
}

impl Warehouse {
    pub fn open_default() -> Result<Self, WarehouseError> {
        Self::open(WarehouseConfig::default())
    }

    /// Open (creating if needed) the database and apply migrations and views.
    pub fn open(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        if let Some(parent) = config.db_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let pool = ConnectionPool::new(config.db_path.clone(), config.max_pool_size);
        let warehouse = Self { config, pool };
        warehouse.initialize()?;
        Ok(warehouse)
    }

    pub fn initialize(&self) -> Result<(), WarehouseError> {
        let connection = self.pool.acquire()?;
        migrations::apply_migrations(&connection)?;
        views::create_views(&connection)?;
        Ok(())
    }

    pub fn db_path(&self) -> &Path {
        self.pool.db_path()
    }

    pub fn home(&self) -> &Path {
        &self.config.home
    }

    /// Persist one converter batch and its audit row.
    pub fn ingest_converter_rates(
        &self,
        record: &ConverterRateRecord,
        log: &IngestLogEntry,
    ) -> Result<(), WarehouseError> {
        validate_common(&record.cycle_id, &record.status)?;
        let params: [&dyn ToSql; 8] = [
            &record.cycle_id,
            &record.taken_at,
            &record.usd_eur,
            &record.eur_usd,
            &record.usd_gbp,
            &record.usd_cny,
            &record.usd_krw,
            &record.status,
        ];
        self.ingest_row(
            "INSERT INTO converter_rates \
             (cycle_id, taken_at, usd_eur, eur_usd, usd_gbp, usd_cny, usd_krw, status) \
             VALUES (?, CAST(? AS TIMESTAMP), ?, ?, ?, ?, ?, ?)",
            params.as_slice(),
            &record.cycle_id,
            &record.status,
            log,
        )
    }

    /// Persist one order-book batch and its audit row.
    pub fn ingest_order_book_rates(
        &self,
        record: &OrderBookRateRecord,
        log: &IngestLogEntry,
    ) -> Result<(), WarehouseError> {
        validate_common(&record.cycle_id, &record.status)?;
        if !record.target_amount.is_finite() || record.target_amount <= 0.0 {
            return Err(WarehouseError::InvalidRecord(format!(
                "target_amount must be positive, got {}",
                record.target_amount
            )));
        }
        let params: [&dyn ToSql; 6] = [
            &record.cycle_id,
            &record.taken_at,
            &record.ask_weighted_price,
            &record.bid_weighted_price,
            &record.target_amount,
            &record.status,
        ];
        self.ingest_row(
            "INSERT INTO order_book_rates \
             (cycle_id, taken_at, ask_weighted_price, bid_weighted_price, target_amount, status) \
             VALUES (?, CAST(? AS TIMESTAMP), ?, ?, ?, ?)",
            params.as_slice(),
            &record.cycle_id,
            &record.status,
            log,
        )
    }

    /// Persist one portal batch and its audit row.
    pub fn ingest_portal_rates(
        &self,
        record: &PortalRateRecord,
        log: &IngestLogEntry,
    ) -> Result<(), WarehouseError> {
        validate_common(&record.cycle_id, &record.status)?;
        let params: [&dyn ToSql; 5] = [
            &record.cycle_id,
            &record.taken_at,
            &record.usd_rub,
            &record.eur_rub,
            &record.status,
        ];
        self.ingest_row(
            "INSERT INTO portal_rates (cycle_id, taken_at, usd_rub, eur_rub, status) \
             VALUES (?, CAST(? AS TIMESTAMP), ?, ?, ?)",
            params.as_slice(),
            &record.cycle_id,
            &record.status,
            log,
        )
    }

    /// Latest converter batches, newest first.
    pub fn recent_converter_rates(
        &self,
        limit: usize,
    ) -> Result<Vec<ConverterRateRecord>, WarehouseError> {
        let sql = recent_rows_sql(
            "cycle_id, CAST(taken_at AS VARCHAR), usd_eur, eur_usd, usd_gbp, usd_cny, usd_krw, status",
            "converter_rates",
            limit,
        )?;
        self.read_rows(&sql, |row| {
            Ok(ConverterRateRecord {
                cycle_id: row.get(0)?,
                taken_at: row.get(1)?,
                usd_eur: row.get(2)?,
                eur_usd: row.get(3)?,
                usd_gbp: row.get(4)?,
                usd_cny: row.get(5)?,
                usd_krw: row.get(6)?,
                status: row.get(7)?,
            })
        })
    }

    /// Latest order-book batches, newest first.
    pub fn recent_order_book_rates(
        &self,
        limit: usize,
    ) -> Result<Vec<OrderBookRateRecord>, WarehouseError> {
        let sql = recent_rows_sql(
            "cycle_id, CAST(taken_at AS VARCHAR), ask_weighted_price, bid_weighted_price, target_amount, status",
            "order_book_rates",
            limit,
        )?;
        self.read_rows(&sql, |row| {
            Ok(OrderBookRateRecord {
                cycle_id: row.get(0)?,
                taken_at: row.get(1)?,
                ask_weighted_price: row.get(2)?,
                bid_weighted_price: row.get(3)?,
                target_amount: row.get(4)?,
                status: row.get(5)?,
            })
        })
    }

    /// Latest portal batches, newest first.
    pub fn recent_portal_rates(&self, limit: usize) -> Result<Vec<PortalRateRecord>, WarehouseError> {
        let sql = recent_rows_sql(
            "cycle_id, CAST(taken_at AS VARCHAR), usd_rub, eur_rub, status",
            "portal_rates",
            limit,
        )?;
        self.read_rows(&sql, |row| {
            Ok(PortalRateRecord {
                cycle_id: row.get(0)?,
                taken_at: row.get(1)?,
                usd_rub: row.get(2)?,
                eur_rub: row.get(3)?,
                status: row.get(4)?,
            })
        })
    }

    /// `vw_feed_health`, ordered by feed and status.
    pub fn feed_health(&self) -> Result<Vec<FeedHealth>, WarehouseError> {
        self.read_rows(
            "SELECT feed, status, batches, stale_values, missing_values, avg_latency_ms, last_seen \
             FROM vw_feed_health ORDER BY feed, status",
            |row| {
                Ok(FeedHealth {
                    feed: row.get(0)?,
                    status: row.get(1)?,
                    batches: row.get(2)?,
                    stale_values: row.get(3)?,
                    missing_values: row.get(4)?,
                    avg_latency_ms: row.get(5)?,
                    last_seen: row.get(6)?,
                })
            },
        )
    }

    /// Latest `vw_order_book_spread` rows, newest first.
    pub fn order_book_spreads(&self, limit: usize) -> Result<Vec<OrderBookSpread>, WarehouseError> {
        let limit = checked_limit(limit)?;
        let sql = format!(
            "SELECT taken_at, target_amount, ask, bid, spread, spread_pct \
             FROM vw_order_book_spread ORDER BY taken_at DESC LIMIT {limit}"
        );
        self.read_rows(&sql, |row| {
            Ok(OrderBookSpread {
                taken_at: row.get(0)?,
                target_amount: row.get(1)?,
                ask: row.get(2)?,
                bid: row.get(3)?,
                spread: row.get(4)?,
                spread_pct: row.get(5)?,
            })
        })
    }

    /// Versions recorded in `schema_migrations`, oldest first.
    pub fn applied_migrations(&self) -> Result<Vec<String>, WarehouseError> {
        self.read_rows(
            "SELECT version FROM schema_migrations ORDER BY version",
            |row| row.get(0),
        )
    }

    /// Export the whole database into a fresh timestamped directory under `backup_dir`.
    pub fn backup(&self, backup_dir: &Path) -> Result<PathBuf, WarehouseError> {
        let stamp = backup_stamp(OffsetDateTime::now_utc())?;
        self.backup_as(backup_dir, &stamp)
    }

    /// Same as [`Warehouse::backup`] with a caller-chosen stamp.
    pub fn backup_as(&self, backup_dir: &Path, stamp: &str) -> Result<PathBuf, WarehouseError> {
        fs::create_dir_all(backup_dir)?;
        let target = backup_dir.join(format!("rates_backup_{stamp}"));
        if target.exists() {
            return Err(WarehouseError::BackupExists(target));
        }

        let connection = self.pool.acquire()?;
        connection.execute_batch("CHECKPOINT")?;
        let sql = format!(
            "EXPORT DATABASE '{}'",
            escape_sql_string(&path_to_sql(&target))
        );
        connection.execute_batch(&sql)?;
        Ok(target)
    }

    fn read_rows<T, F>(&self, sql: &str, map: F) -> Result<Vec<T>, WarehouseError>
    where
        F: FnMut(&Row<'_>) -> Result<T, ::duckdb::Error>,
    {
        let connection = self.pool.acquire()?;
        let mut statement = connection.prepare(sql)?;
        let rows = statement
            .query_map([] as [&dyn ToSql; 0], map)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn ingest_row(
        &self,
        insert_sql: &str,
        params: &[&dyn ToSql],
        cycle_id: &str,
        status: &str,
        log: &IngestLogEntry,
    ) -> Result<(), WarehouseError> {
        let connection = self.pool.acquire()?;
        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<(), WarehouseError> {
            connection.execute(insert_sql, params)?;

            let cycle_id = cycle_id.to_string();
            let status = status.to_string();
            let fresh = i64::from(log.fresh_count);
            let stale = i64::from(log.stale_count);
            let missing = i64::from(log.missing_count);
            let latency_ms = i64::try_from(log.latency_ms).unwrap_or(i64::MAX);
            let params: [&dyn ToSql; 7] = [
                &cycle_id,
                &log.feed,
                &status,
                &fresh,
                &stale,
                &missing,
                &latency_ms,
            ];
            connection.execute(
                "INSERT INTO ingest_log \
                 (cycle_id, feed, status, fresh_count, stale_count, missing_count, latency_ms, timestamp) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)",
                params.as_slice(),
            )?;
            Ok(())
        })();

        finalize_transaction(&connection, result)
    }
}

/// Directory-name stamp used for backups, e.g. `20261019_000012`.
pub fn backup_stamp(at: OffsetDateTime) -> Result<String, WarehouseError> {
    let format = format_description!("[year][month][day]_[hour][minute][second]");
    Ok(at.format(&format)?)
}

fn checked_limit(limit: usize) -> Result<usize, WarehouseError> {
    if limit == 0 || limit > MAX_READ_ROWS {
        return Err(WarehouseError::InvalidLimit {
            limit,
            max: MAX_READ_ROWS,
        });
    }
    Ok(limit)
}

fn recent_rows_sql(columns: &str, table: &str, limit: usize) -> Result<String, WarehouseError> {
    let limit = checked_limit(limit)?;
    Ok(format!(
        "SELECT {columns} FROM {table} ORDER BY taken_at DESC, cycle_id DESC LIMIT {limit}"
    ))
}

fn validate_common(cycle_id: &str, status: &str) -> Result<(), WarehouseError> {
    if cycle_id.trim().is_empty() {
        return Err(WarehouseError::InvalidRecord(String::from(
            "cycle_id must not be empty",
        )));
    }
    if !matches!(status, "OK" | "PARTIAL") {
        return Err(WarehouseError::InvalidRecord(format!(
            "status '{status}' cannot be persisted"
        )));
    }
    Ok(())
}

fn finalize_transaction<T>(
    connection: &Connection,
    result: Result<T, WarehouseError>,
) -> Result<T, WarehouseError> {
    match result {
        Ok(value) => {
            connection.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(error) => {
            let _ = connection.execute_batch("ROLLBACK");
            Err(error)
        }
    }
}

fn resolve_ratefeed_home() -> PathBuf {
    if let Some(path) = env::var_os("RATEFEED_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".ratefeed");
    }

    PathBuf::from(".ratefeed")
}

fn path_to_sql(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Only used for paths we build ourselves; values always go through parameters.
fn escape_sql_string(value: &str) -> String {
    value.replace('\'', "''")
}
