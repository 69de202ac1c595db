//! Bounded retries with last-known-value fallback.

use std::collections::BTreeMap;
use std::future::Future;

use tracing::{debug, error, warn};

use crate::domain::{FetchOutcome, RateLabel};
use crate::retry::RetryPolicy;
use crate::FetchError;

/// Last successfully fetched value per label.
///
/// Lives as long as its poller, is never persisted and starts empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceMemory {
    values: BTreeMap<RateLabel, f64>,
}

impl SourceMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, label: RateLabel) -> Option<f64> {
        self.values.get(&label).copied()
    }

    pub fn remember(&mut self, label: RateLabel, value: f64) {
        self.values.insert(label, value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Run `attempt` until it succeeds or the policy runs out.
///
/// Attempts are numbered from 1. Every failure is logged and followed by a
/// backoff sleep unless it was the last attempt. Memory is not involved.
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, what: &str, mut attempt: F) -> Option<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    for n in 1..=policy.max_attempts {
        match attempt(n).await {
            Ok(value) => return Some(value),
            Err(err) => {
                warn!(
                    target: "ratefeed::fetch",
                    what,
                    attempt = n,
                    max_attempts = policy.max_attempts,
                    error = %err,
                    "fetch attempt failed"
                );
            }
        }

        if policy.has_next(n) {
            let delay = policy.backoff.delay();
            debug!(target: "ratefeed::fetch", what, delay_ms = delay.as_millis() as u64, "backing off");
            tokio::time::sleep(delay).await;
        }
    }

    None
}

/// Retry wrapper owning one source's memory.
#[derive(Debug, Clone, Default)]
pub struct ResilientFetch {
    policy: RetryPolicy,
    memory: SourceMemory,
}

impl ResilientFetch {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            memory: SourceMemory::new(),
        }
    }

    pub fn with_memory(policy: RetryPolicy, memory: SourceMemory) -> Self {
        Self { policy, memory }
    }

    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub const fn memory(&self) -> &SourceMemory {
        &self.memory
    }

    /// Fetch one label.
    ///
    /// FRESH on the first successful attempt, otherwise STALE with the
    /// remembered value, otherwise MISSING.
    pub async fn fetch<F, Fut>(&mut self, label: RateLabel, attempt: F) -> FetchOutcome
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<f64, FetchError>>,
    {
        match retry(&self.policy, label.as_str(), attempt).await {
            Some(value) => self.record(label, value),
            None => self.recall(label),
        }
    }

    /// Store a value obtained this cycle and report it as FRESH.
    pub fn record(&mut self, label: RateLabel, value: f64) -> FetchOutcome {
        self.memory.remember(label, value);
        FetchOutcome::fresh(value)
    }

    /// Outcome for a label whose attempts are exhausted.
    pub fn recall(&self, label: RateLabel) -> FetchOutcome {
        match self.memory.get(label) {
            Some(value) => {
                warn!(
                    target: "ratefeed::fetch",
                    label = %label,
                    value,
                    "attempts exhausted, using previous value"
                );
                FetchOutcome::stale(value)
            }
            None => {
                error!(
                    target: "ratefeed::fetch",
                    label = %label,
                    max_attempts = self.policy.max_attempts,
                    "attempts exhausted, no previous value"
                );
                FetchOutcome::missing()
            }
        }
    }
}
