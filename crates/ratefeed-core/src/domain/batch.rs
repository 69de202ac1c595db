use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::Serialize;
use uuid::Uuid;

use super::{FeedId, RateLabel, TargetNotional, UtcDateTime};

/// Where a reported value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Origin {
    /// Obtained during this cycle.
    Fresh,
    /// Remembered from an earlier cycle after this cycle's attempts ran out.
    Stale,
    /// Nothing available.
    Missing,
}

/// Result of fetching one label.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FetchOutcome {
    pub value: Option<f64>,
    pub origin: Origin,
}

impl FetchOutcome {
    pub const fn fresh(value: f64) -> Self {
        Self {
            value: Some(value),
            origin: Origin::Fresh,
        }
    }

    pub const fn stale(value: f64) -> Self {
        Self {
            value: Some(value),
            origin: Origin::Stale,
        }
    }

    pub const fn missing() -> Self {
        Self {
            value: None,
            origin: Origin::Missing,
        }
    }

    /// Fresh when the sample carries a value, missing otherwise.
    pub fn from_sample(sample: &RateSample) -> Self {
        sample.value.map_or_else(Self::missing, Self::fresh)
    }

    pub const fn is_missing(&self) -> bool {
        self.value.is_none()
    }
}

/// One derived value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RateSample {
    pub label: RateLabel,
    pub value: Option<f64>,
    pub timestamp: UtcDateTime,
}

impl RateSample {
    pub fn new(label: RateLabel, value: Option<f64>, timestamp: UtcDateTime) -> Self {
        Self {
            label,
            value,
            timestamp,
        }
    }
}

/// Aggregate confidence of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    Ok,
    Partial,
    Failed,
}

impl BatchStatus {
    pub const fn from_counts(missing: usize, total: usize) -> Self {
        if missing == total {
            Self::Failed
        } else if missing > 0 {
            Self::Partial
        } else {
            Self::Ok
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Partial => "PARTIAL",
            Self::Failed => "FAILED",
        }
    }
}

impl Display for BatchStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Number of outcomes per origin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OriginCounts {
    pub fresh: usize,
    pub stale: usize,
    pub missing: usize,
}

impl OriginCounts {
    pub const fn total(self) -> usize {
        self.fresh + self.stale + self.missing
    }
}

/// Everything one polling cycle of one feed produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Batch {
    feed: FeedId,
    cycle_id: Uuid,
    taken_at: UtcDateTime,
    status: BatchStatus,
    outcomes: BTreeMap<RateLabel, FetchOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    notional: Option<TargetNotional>,
}

impl Batch {
    /// Build a batch and derive its status from the outcomes.
    pub fn new(
        feed: FeedId,
        taken_at: UtcDateTime,
        outcomes: BTreeMap<RateLabel, FetchOutcome>,
    ) -> Self {
        let missing = outcomes.values().filter(|outcome| outcome.is_missing()).count();
        let status = BatchStatus::from_counts(missing, outcomes.len());
        Self {
            feed,
            cycle_id: Uuid::new_v4(),
            taken_at,
            status,
            outcomes,
            notional: None,
        }
    }

    /// Attach the notional the values were priced for.
    pub fn with_notional(mut self, notional: Option<TargetNotional>) -> Self {
        self.notional = notional;
        self
    }

    pub const fn feed(&self) -> FeedId {
        self.feed
    }

    pub const fn cycle_id(&self) -> Uuid {
        self.cycle_id
    }

    pub const fn taken_at(&self) -> UtcDateTime {
        self.taken_at
    }

    pub const fn status(&self) -> BatchStatus {
        self.status
    }

    pub const fn notional(&self) -> Option<TargetNotional> {
        self.notional
    }

    pub fn outcomes(&self) -> &BTreeMap<RateLabel, FetchOutcome> {
        &self.outcomes
    }

    pub fn outcome(&self, label: RateLabel) -> Option<&FetchOutcome> {
        self.outcomes.get(&label)
    }

    /// Value for `label`, absent when missing or not part of the batch.
    pub fn value(&self, label: RateLabel) -> Option<f64> {
        self.outcomes.get(&label).and_then(|outcome| outcome.value)
    }

    pub fn counts(&self) -> OriginCounts {
        let mut counts = OriginCounts::default();
        for outcome in self.outcomes.values() {
            match outcome.origin {
                Origin::Fresh => counts.fresh += 1,
                Origin::Stale => counts.stale += 1,
                Origin::Missing => counts.missing += 1,
            }
        }
        counts
    }

    /// The batch flattened into samples stamped with the cycle time.
    pub fn samples(&self) -> Vec<RateSample> {
        self.outcomes
            .iter()
            .map(|(label, outcome)| RateSample::new(*label, outcome.value, self.taken_at))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(outcomes: &[(RateLabel, FetchOutcome)]) -> Batch {
        Batch::new(
            FeedId::Portal,
            UtcDateTime::parse("2026-10-19T09:00:00Z").expect("timestamp"),
            outcomes.iter().copied().collect(),
        )
    }

    #[test]
    fn stale_values_do_not_degrade_status() {
        let batch = batch(&[
            (RateLabel::UsdRub, FetchOutcome::fresh(81.2)),
            (RateLabel::EurRub, FetchOutcome::stale(94.1)),
        ]);
        assert_eq!(batch.status(), BatchStatus::Ok);
        assert_eq!(
            batch.counts(),
            OriginCounts {
                fresh: 1,
                stale: 1,
                missing: 0
            }
        );
    }

    #[test]
    fn one_missing_value_is_partial() {
        let batch = batch(&[
            (RateLabel::UsdRub, FetchOutcome::fresh(81.2)),
            (RateLabel::EurRub, FetchOutcome::missing()),
        ]);
        assert_eq!(batch.status(), BatchStatus::Partial);
        assert_eq!(batch.value(RateLabel::EurRub), None);
    }

    #[test]
    fn status_follows_missing_share() {
        assert_eq!(BatchStatus::from_counts(0, 3), BatchStatus::Ok);
        assert_eq!(BatchStatus::from_counts(1, 3), BatchStatus::Partial);
        assert_eq!(BatchStatus::from_counts(2, 3), BatchStatus::Partial);
        assert_eq!(BatchStatus::from_counts(3, 3), BatchStatus::Failed);
    }

    #[test]
    fn empty_batch_is_failed() {
        assert_eq!(batch(&[]).status(), BatchStatus::Failed);
    }

    #[test]
    fn serializes_labels_and_status_as_strings() {
        let batch = batch(&[(RateLabel::UsdRub, FetchOutcome::fresh(81.2))]);
        let json = serde_json::to_value(&batch).expect("serialize");
        assert_eq!(json["status"], "OK");
        assert_eq!(json["outcomes"]["USD/RUB"]["origin"], "FRESH");
    }
}
