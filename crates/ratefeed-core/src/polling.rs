//! Per-feed polling loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{error, info};

use crate::aggregator::RateAggregator;
use crate::domain::{Batch, BatchStatus, FeedId};
use crate::retry::uniform_between;
use crate::sink::RateSink;
use crate::{CoreError, ValidationError};

/// Sleep window between two cycles of one feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    min: Duration,
    max: Duration,
}

impl Cadence {
    pub fn new(min: Duration, max: Duration) -> Result<Self, ValidationError> {
        if min.is_zero() || min > max {
            return Err(ValidationError::InvalidDelayWindow {
                min: min.as_secs_f64(),
                max: max.as_secs_f64(),
            });
        }
        Ok(Self { min, max })
    }

    /// Zero-width window; only useful in tests.
    pub const fn immediate() -> Self {
        Self {
            min: Duration::ZERO,
            max: Duration::ZERO,
        }
    }

    pub const fn min(&self) -> Duration {
        self.min
    }

    pub const fn max(&self) -> Duration {
        self.max
    }

    pub fn next_delay(&self) -> Duration {
        uniform_between(self.min, self.max)
    }
}

/// Loop behaviour of one poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerSettings {
    pub cadence: Cadence,
    /// Pause after a cycle ended in an error.
    pub cooldown: Duration,
    /// Whether PARTIAL batches are handed to the sink.
    pub persist_partial: bool,
}

/// What happened in one cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub batch: Batch,
    pub persisted: bool,
    pub latency_ms: u64,
}

/// Totals of a bounded run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollStats {
    pub cycles: u64,
    pub persisted: u64,
    pub errors: u64,
}

/// Aggregate → persist → sleep, for one feed.
pub struct Poller {
    aggregator: RateAggregator,
    sink: Arc<dyn RateSink>,
    settings: PollerSettings,
}

impl Poller {
    pub fn new(aggregator: RateAggregator, sink: Arc<dyn RateSink>, settings: PollerSettings) -> Self {
        Self {
            aggregator,
            sink,
            settings,
        }
    }

    pub const fn feed(&self) -> FeedId {
        self.aggregator.feed()
    }

    pub const fn settings(&self) -> &PollerSettings {
        &self.settings
    }

    /// Run one cycle and persist its batch when eligible.
    ///
    /// FAILED batches are never persisted; PARTIAL ones only when
    /// `persist_partial` is set. A sink failure is logged and reported as
    /// `persisted == false`; it does not fail the cycle.
    pub async fn run_once(&mut self) -> Result<CycleReport, CoreError> {
        let started = Instant::now();
        let batch = self.aggregator.run_cycle().await?;
        let latency_ms = started.elapsed().as_millis().min(u128::from(u64::MAX)) as u64;

        let eligible = match batch.status() {
            BatchStatus::Ok => true,
            BatchStatus::Partial => self.settings.persist_partial,
            BatchStatus::Failed => false,
        };

        let mut persisted = false;
        if eligible {
            match self.sink.persist(&batch, latency_ms).await {
                Ok(()) => persisted = true,
                Err(err) => error!(
                    target: "ratefeed::poller",
                    feed = %self.feed(),
                    cycle_id = %batch.cycle_id(),
                    error = %err,
                    "failed to persist batch"
                ),
            }
        } else {
            info!(
                target: "ratefeed::poller",
                feed = %self.feed(),
                status = %batch.status(),
                "batch not persisted"
            );
        }

        Ok(CycleReport {
            batch,
            persisted,
            latency_ms,
        })
    }

    /// Poll forever. Errors escaping a cycle are logged and followed by the
    /// cooldown instead of the usual sleep.
    pub async fn run(&mut self) {
        loop {
            self.step().await;
        }
    }

    /// Poll `cycles` times, sleeping between cycles exactly like [`Poller::run`].
    pub async fn run_cycles(&mut self, cycles: u64) -> PollStats {
        let mut stats = PollStats::default();
        for _ in 0..cycles {
            stats.cycles += 1;
            match self.step().await {
                Some(true) => stats.persisted += 1,
                Some(false) => {}
                None => stats.errors += 1,
            }
        }
        stats
    }

    /// One cycle plus the following sleep. `None` when the cycle errored.
    async fn step(&mut self) -> Option<bool> {
        match self.run_once().await {
            Ok(report) => {
                let delay = self.settings.cadence.next_delay();
                info!(
                    target: "ratefeed::poller",
                    feed = %self.feed(),
                    next_in_ms = delay.as_millis() as u64,
                    "sleeping until next cycle"
                );
                tokio::time::sleep(delay).await;
                Some(report.persisted)
            }
            Err(err) => {
                error!(
                    target: "ratefeed::poller",
                    feed = %self.feed(),
                    error = %err,
                    cooldown_secs = self.settings.cooldown.as_secs(),
                    "cycle failed, cooling down"
                );
                tokio::time::sleep(self.settings.cooldown).await;
                None
            }
        }
    }
}
