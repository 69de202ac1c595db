//! One polling cycle over a fixed set of sources.

use std::collections::{BTreeMap, BTreeSet};

use tracing::info;

use crate::domain::{Batch, FeedId, FetchOutcome, RateLabel, TargetNotional, UtcDateTime};
use crate::sources::RateSource;
use crate::{CoreError, ValidationError};

/// Drives the sources of one feed and folds their outcomes into a [`Batch`].
pub struct RateAggregator {
    feed: FeedId,
    sources: Vec<Box<dyn RateSource>>,
    declared: BTreeSet<RateLabel>,
}

impl RateAggregator {
    /// Every source must belong to `feed`, declare only labels of `feed`, and
    /// no label may be declared twice. At least one label is required.
    pub fn new(feed: FeedId, sources: Vec<Box<dyn RateSource>>) -> Result<Self, ValidationError> {
        let mut declared = BTreeSet::new();
        for source in &sources {
            if source.feed() != feed {
                return Err(ValidationError::MismatchedSource {
                    feed: feed.to_string(),
                    source_feed: source.feed().to_string(),
                });
            }
            for label in source.labels() {
                ensure_owned(feed, label)?;
                if !declared.insert(label) {
                    return Err(ValidationError::DuplicateLabel {
                        label: label.to_string(),
                    });
                }
            }
        }

        if declared.is_empty() {
            return Err(ValidationError::EmptyLabelSet {
                feed: feed.to_string(),
            });
        }

        Ok(Self {
            feed,
            sources,
            declared,
        })
    }

    pub const fn feed(&self) -> FeedId {
        self.feed
    }

    pub fn labels(&self) -> impl Iterator<Item = RateLabel> + '_ {
        self.declared.iter().copied()
    }

    /// Collect every source once and derive the batch status.
    ///
    /// Outcomes for undeclared labels, repeated labels, or non-positive
    /// values are contract violations and abort the cycle. A declared label
    /// no source reported counts as missing.
    pub async fn run_cycle(&mut self) -> Result<Batch, CoreError> {
        let taken_at = UtcDateTime::now();
        let mut outcomes = BTreeMap::new();
        let mut notional: Option<TargetNotional> = None;

        for source in &mut self.sources {
            notional = notional.or(source.notional());
            for (label, outcome) in source.collect().await {
                if !self.declared.contains(&label) {
                    return Err(ValidationError::UnexpectedLabel {
                        feed: self.feed.to_string(),
                        label: label.to_string(),
                    }
                    .into());
                }
                validate_value(label, &outcome)?;
                if outcomes.insert(label, outcome).is_some() {
                    return Err(ValidationError::DuplicateLabel {
                        label: label.to_string(),
                    }
                    .into());
                }
            }
        }

        for label in &self.declared {
            outcomes.entry(*label).or_insert_with(FetchOutcome::missing);
        }

        let batch = Batch::new(self.feed, taken_at, outcomes).with_notional(notional);
        let counts = batch.counts();
        info!(
            target: "ratefeed::aggregator",
            feed = %self.feed,
            cycle_id = %batch.cycle_id(),
            status = %batch.status(),
            fresh = counts.fresh,
            stale = counts.stale,
            missing = counts.missing,
            "cycle complete"
        );
        Ok(batch)
    }
}

fn ensure_owned(feed: FeedId, label: RateLabel) -> Result<(), ValidationError> {
    if feed.labels().contains(&label) {
        Ok(())
    } else {
        Err(ValidationError::UnexpectedLabel {
            feed: feed.to_string(),
            label: label.to_string(),
        })
    }
}

fn validate_value(label: RateLabel, outcome: &FetchOutcome) -> Result<(), ValidationError> {
    match outcome.value {
        Some(value) if !value.is_finite() || value <= 0.0 => Err(ValidationError::ImplausibleRate {
            label: label.to_string(),
            value,
        }),
        _ => Ok(()),
    }
}
