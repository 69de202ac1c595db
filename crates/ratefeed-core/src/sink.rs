//! Persistence boundary for finished batches.

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use ratefeed_warehouse::{
    ConverterRateRecord, IngestLogEntry, OrderBookRateRecord, PortalRateRecord, Warehouse,
    WarehouseError,
};
use thiserror::Error;

use crate::domain::{Batch, BatchStatus, FeedId, RateLabel};

/// Why a batch could not be persisted.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error(transparent)]
    Warehouse(#[from] WarehouseError),

    #[error("FAILED batches are never persisted (feed '{feed}')")]
    FailedBatch { feed: FeedId },

    #[error("order-book batch {cycle_id} carries no target notional")]
    MissingNotional { cycle_id: String },

    #[error("persistence task aborted: {0}")]
    Task(String),
}

/// Accepts batches that passed the persistence rules.
pub trait RateSink: Send + Sync {
    fn persist<'a>(
        &'a self,
        batch: &'a Batch,
        latency_ms: u64,
    ) -> Pin<Box<dyn Future<Output = Result<(), SinkError>> + Send + 'a>>;
}

impl RateSink for Warehouse {
    fn persist<'a>(
        &'a self,
        batch: &'a Batch,
        latency_ms: u64,
    ) -> Pin<Box<dyn Future<Output = Result<(), SinkError>> + Send + 'a>> {
        Box::pin(async move {
            let row = WarehouseRow::from_batch(batch)?;
            let log = ingest_log_entry(batch, latency_ms);
            let warehouse = self.clone();

            tokio::task::spawn_blocking(move || -> Result<(), WarehouseError> {
                match row {
                    WarehouseRow::Converter(record) => {
                        warehouse.ingest_converter_rates(&record, &log)
                    }
                    WarehouseRow::OrderBook(record) => {
                        warehouse.ingest_order_book_rates(&record, &log)
                    }
                    WarehouseRow::Portal(record) => warehouse.ingest_portal_rates(&record, &log),
                }
            })
            .await
            .map_err(|err| SinkError::Task(err.to_string()))??;

            Ok(())
        })
    }
}

/// Keeps persisted batches in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    batches: Mutex<Vec<Batch>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> Vec<Batch> {
        self.batches
            .lock()
            .expect("memory sink mutex poisoned")
            .clone()
    }
}

impl RateSink for MemorySink {
    fn persist<'a>(
        &'a self,
        batch: &'a Batch,
        _latency_ms: u64,
    ) -> Pin<Box<dyn Future<Output = Result<(), SinkError>> + Send + 'a>> {
        Box::pin(async move {
            ensure_persistable(batch)?;
            self.batches
                .lock()
                .expect("memory sink mutex poisoned")
                .push(batch.clone());
            Ok(())
        })
    }
}

enum WarehouseRow {
    Converter(ConverterRateRecord),
    OrderBook(OrderBookRateRecord),
    Portal(PortalRateRecord),
}

impl WarehouseRow {
    fn from_batch(batch: &Batch) -> Result<Self, SinkError> {
        ensure_persistable(batch)?;
        let cycle_id = batch.cycle_id().to_string();
        let taken_at = batch.taken_at().format_sql();
        let status = batch.status().as_str().to_owned();

        Ok(match batch.feed() {
            FeedId::Converter => Self::Converter(ConverterRateRecord {
                cycle_id,
                taken_at,
                usd_eur: batch.value(RateLabel::UsdEur),
                eur_usd: batch.value(RateLabel::EurUsd),
                usd_gbp: batch.value(RateLabel::UsdGbp),
                usd_cny: batch.value(RateLabel::UsdCny),
                usd_krw: batch.value(RateLabel::UsdKrw),
                status,
            }),
            FeedId::OrderBook => {
                let notional = batch
                    .notional()
                    .ok_or_else(|| SinkError::MissingNotional {
                        cycle_id: cycle_id.clone(),
                    })?;
                Self::OrderBook(OrderBookRateRecord {
                    cycle_id,
                    taken_at,
                    ask_weighted_price: batch.value(RateLabel::Ask),
                    bid_weighted_price: batch.value(RateLabel::Bid),
                    target_amount: notional.value(),
                    status,
                })
            }
            FeedId::Portal => Self::Portal(PortalRateRecord {
                cycle_id,
                taken_at,
                usd_rub: batch.value(RateLabel::UsdRub),
                eur_rub: batch.value(RateLabel::EurRub),
                status,
            }),
        })
    }
}

fn ensure_persistable(batch: &Batch) -> Result<(), SinkError> {
    if batch.status() == BatchStatus::Failed {
        return Err(SinkError::FailedBatch { feed: batch.feed() });
    }
    Ok(())
}

fn ingest_log_entry(batch: &Batch, latency_ms: u64) -> IngestLogEntry {
    let counts = batch.counts();
    let count = |value: usize| u32::try_from(value).unwrap_or(u32::MAX);
    IngestLogEntry {
        feed: batch.feed().as_str().to_owned(),
        fresh_count: count(counts.fresh),
        stale_count: count(counts.stale),
        missing_count: count(counts.missing),
        latency_ms,
    }
}
