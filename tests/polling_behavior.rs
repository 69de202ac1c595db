//! Behavior tests for whole polling cycles: batch status derivation and the
//! persistence rules applied by the poller, and how it recovers from errors.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ratefeed_core::sources::Collected;
use ratefeed_core::{
    build_poller, Batch, BatchStatus, Cadence, CoreError, FeedId, FetchOutcome, HeaderProfile,
    HttpError, HttpResponse, MemorySink, Origin, PlausibilityBounds, Poller, PollerSettings,
    PortalPair, PortalSource, RateAggregator, RateLabel, RateSink, RateSource, RatefeedConfig,
    RetryPolicy, ScriptedHttpClient, SinkError, ValidationError,
};

const ORDER_BOOK_PAGE: &str = r#"<script>window.gon = {"exchangers":{"usdtrub":{
  "ask":[{"price":95.1,"volume":20000,"amount":1902000},{"price":95.2,"volume":50000,"amount":4760000}],
  "bid":[{"price":94.9,"volume":10000,"amount":949000}]
}}};</script>"#;

fn failure() -> Result<HttpResponse, HttpError> {
    Err(HttpError::new("timed out"))
}

fn page(value: &str) -> Result<HttpResponse, HttpError> {
    Ok(HttpResponse::ok(format!(r#"<span data-test="last">{value}</span>"#)))
}

fn portal_pairs() -> Vec<PortalPair> {
    vec![
        PortalPair {
            label: RateLabel::UsdRub,
            url: String::from("https://portal.test/usd-rub"),
            bounds: PlausibilityBounds::new(50.0, 200.0).expect("bounds"),
            invert: false,
        },
        PortalPair {
            label: RateLabel::EurRub,
            url: String::from("https://portal.test/eur-rub"),
            bounds: PlausibilityBounds::new(50.0, 220.0).expect("bounds"),
            invert: false,
        },
    ]
}

fn settings(persist_partial: bool) -> PollerSettings {
    PollerSettings {
        cadence: Cadence::immediate(),
        cooldown: Duration::ZERO,
        persist_partial,
    }
}

fn portal_poller(http: Arc<ScriptedHttpClient>, sink: Arc<MemorySink>, persist_partial: bool) -> Poller {
    let source: Box<dyn RateSource> = Box::new(PortalSource::new(
        http,
        portal_pairs(),
        HeaderProfile::browser(),
        RetryPolicy::instant(),
        1_000,
    ));
    let aggregator = RateAggregator::new(FeedId::Portal, vec![source]).expect("valid aggregator");
    Poller::new(aggregator, sink, settings(persist_partial))
}

/// Reports a NaN rate, which the aggregator refuses.
struct NonFiniteSource;

impl RateSource for NonFiniteSource {
    fn feed(&self) -> FeedId {
        FeedId::Portal
    }

    fn labels(&self) -> Vec<RateLabel> {
        vec![RateLabel::UsdRub]
    }

    fn collect<'a>(&'a mut self) -> Pin<Box<dyn Future<Output = Collected> + Send + 'a>> {
        Box::pin(async move { vec![(RateLabel::UsdRub, FetchOutcome::fresh(f64::NAN))] })
    }
}

/// Refuses every batch as if the disk were full.
#[derive(Default)]
struct FailingSink {
    calls: AtomicUsize,
}

impl RateSink for FailingSink {
    fn persist<'a>(
        &'a self,
        _batch: &'a Batch,
        _latency_ms: u64,
    ) -> Pin<Box<dyn Future<Output = Result<(), SinkError>> + Send + 'a>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Err(SinkError::Task(String::from("disk full"))) })
    }
}

// =============================================================================
// Batch status
// =============================================================================

#[tokio::test]
async fn all_fresh_values_make_an_ok_batch_that_is_persisted() {
    // Given: Both portal pages answer
    let http = Arc::new(ScriptedHttpClient::new([page("92.10"), page("99,85")]));
    let sink = Arc::new(MemorySink::new());
    let mut poller = portal_poller(http, sink.clone(), true);

    // When: One cycle runs
    let report = poller.run_once().await.expect("cycle");

    // Then: The batch is OK and lands in the sink
    assert_eq!(report.batch.status(), BatchStatus::Ok);
    assert!(report.persisted);
    assert_eq!(report.batch.value(RateLabel::EurRub), Some(99.85));

    let stored = sink.batches();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].cycle_id(), report.batch.cycle_id());
}

#[tokio::test]
async fn one_missing_value_makes_a_partial_batch() {
    let http = Arc::new(ScriptedHttpClient::new([
        page("92.10"),
        failure(),
        failure(),
        failure(),
    ]));
    let sink = Arc::new(MemorySink::new());
    let mut poller = portal_poller(http, sink.clone(), true);

    let report = poller.run_once().await.expect("cycle");

    assert_eq!(report.batch.status(), BatchStatus::Partial);
    assert_eq!(report.batch.value(RateLabel::EurRub), None);
    assert!(report.persisted);
    assert_eq!(sink.batches().len(), 1);
}

#[tokio::test]
async fn failed_batch_is_never_persisted() {
    let http = Arc::new(ScriptedHttpClient::new(std::iter::repeat_with(failure).take(6)));
    let sink = Arc::new(MemorySink::new());
    let mut poller = portal_poller(http, sink.clone(), true);

    let report = poller.run_once().await.expect("cycle");

    assert_eq!(report.batch.status(), BatchStatus::Failed);
    assert!(!report.persisted);
    assert!(sink.batches().is_empty());
}

#[tokio::test]
async fn stale_values_keep_the_batch_ok() {
    let http = Arc::new(ScriptedHttpClient::new([page("92.10"), page("99.85")]));
    let sink = Arc::new(MemorySink::new());
    let mut poller = portal_poller(http.clone(), sink.clone(), true);

    poller.run_once().await.expect("first cycle");
    for _ in 0..6 {
        http.push(failure());
    }
    let report = poller.run_once().await.expect("second cycle");

    assert_eq!(report.batch.status(), BatchStatus::Ok);
    let counts = report.batch.counts();
    assert_eq!((counts.fresh, counts.stale, counts.missing), (0, 2, 0));
    assert_eq!(
        report.batch.outcome(RateLabel::UsdRub).map(|outcome| outcome.origin),
        Some(Origin::Stale)
    );
    assert_eq!(sink.batches().len(), 2);
}

#[tokio::test]
async fn partial_batches_are_withheld_when_configured() {
    let http = Arc::new(ScriptedHttpClient::new([
        page("92.10"),
        failure(),
        failure(),
        failure(),
    ]));
    let sink = Arc::new(MemorySink::new());
    let mut poller = portal_poller(http, sink.clone(), false);

    let report = poller.run_once().await.expect("cycle");

    assert_eq!(report.batch.status(), BatchStatus::Partial);
    assert!(!report.persisted);
    assert!(sink.batches().is_empty());
}

// =============================================================================
// Order-book feed from configuration
// =============================================================================

#[tokio::test]
async fn order_book_partial_is_skipped_by_default() {
    // Given: Default configuration and a book too shallow on the bid side
    let config = RatefeedConfig::from_lookup(|_| None).expect("default config");
    let http = Arc::new(ScriptedHttpClient::new([Ok(HttpResponse::ok(ORDER_BOOK_PAGE))]));
    let sink = Arc::new(MemorySink::new());
    let mut poller = build_poller(&config, FeedId::OrderBook, http, sink.clone()).expect("poller");

    // When: One cycle runs
    let report = poller.run_once().await.expect("cycle");

    // Then: The ask is priced, the bid is missing and nothing is stored
    assert_eq!(report.batch.status(), BatchStatus::Partial);
    assert!(report.batch.value(RateLabel::Ask).is_some());
    assert_eq!(report.batch.value(RateLabel::Bid), None);
    assert_eq!(report.batch.notional().map(|target| target.value()), Some(30_000.0));
    assert!(!report.persisted);
    assert!(sink.batches().is_empty());
}

#[tokio::test]
async fn order_book_partial_is_kept_when_enabled() {
    let config = RatefeedConfig::from_lookup(|key| match key {
        "ORDER_BOOK_PERSIST_PARTIAL" => Some(String::from("true")),
        _ => None,
    })
    .expect("config");
    let http = Arc::new(ScriptedHttpClient::new([Ok(HttpResponse::ok(ORDER_BOOK_PAGE))]));
    let sink = Arc::new(MemorySink::new());
    let mut poller = build_poller(&config, FeedId::OrderBook, http, sink.clone()).expect("poller");

    let report = poller.run_once().await.expect("cycle");

    assert!(report.persisted);
    assert_eq!(sink.batches().len(), 1);
}

// =============================================================================
// Loop
// =============================================================================

#[tokio::test]
async fn loop_runs_cycles_back_to_back_and_counts_them() {
    let http = Arc::new(ScriptedHttpClient::new([
        page("92.10"),
        page("99.85"),
        page("92.20"),
        page("99.80"),
        page("92.30"),
        page("99.75"),
    ]));
    let sink = Arc::new(MemorySink::new());
    let mut poller = portal_poller(http, sink.clone(), true);

    let stats = poller.run_cycles(3).await;

    assert_eq!((stats.cycles, stats.persisted, stats.errors), (3, 3, 0));
    let values: Vec<_> = sink
        .batches()
        .iter()
        .map(|batch| batch.value(RateLabel::UsdRub))
        .collect();
    assert_eq!(values, vec![Some(92.1), Some(92.2), Some(92.3)]);
}

// =============================================================================
// Error handling
// =============================================================================

#[tokio::test]
async fn sink_failure_is_reported_without_failing_the_cycle() {
    // Given: Healthy pages but a sink that refuses every write
    let http = Arc::new(ScriptedHttpClient::new([
        page("92.10"),
        page("99.85"),
        page("92.20"),
        page("99.80"),
        page("92.30"),
        page("99.75"),
    ]));
    let sink = Arc::new(FailingSink::default());
    let source: Box<dyn RateSource> = Box::new(PortalSource::new(
        http,
        portal_pairs(),
        HeaderProfile::browser(),
        RetryPolicy::instant(),
        1_000,
    ));
    let aggregator = RateAggregator::new(FeedId::Portal, vec![source]).expect("valid aggregator");
    let mut poller = Poller::new(aggregator, sink.clone(), settings(true));

    // When: One cycle runs on its own, then two more through the loop
    let report = poller.run_once().await.expect("cycle still succeeds");
    let stats = poller.run_cycles(2).await;

    // Then: Every OK batch was offered, none counts as persisted, none as an error
    assert_eq!(report.batch.status(), BatchStatus::Ok);
    assert!(!report.persisted);
    assert_eq!((stats.cycles, stats.persisted, stats.errors), (2, 0, 0));
    assert_eq!(sink.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn failing_cycles_are_counted_and_followed_by_the_cooldown() {
    // Given: A source reporting a non-finite rate and a one-minute cooldown
    let sink = Arc::new(MemorySink::new());
    let source: Box<dyn RateSource> = Box::new(NonFiniteSource);
    let aggregator = RateAggregator::new(FeedId::Portal, vec![source]).expect("valid aggregator");
    let mut poller = Poller::new(
        aggregator,
        sink.clone(),
        PollerSettings {
            cadence: Cadence::new(Duration::from_secs(45), Duration::from_secs(60))
                .expect("cadence"),
            cooldown: Duration::from_secs(60),
            persist_partial: true,
        },
    );

    // When: A single cycle runs
    let err = poller.run_once().await.expect_err("non-finite rate");

    // Then: The cycle fails validation
    assert!(matches!(
        err,
        CoreError::Validation(ValidationError::ImplausibleRate { .. })
    ));

    // When: Two cycles run through the loop
    let started = tokio::time::Instant::now();
    let stats = poller.run_cycles(2).await;

    // Then: Both count as errors and each is followed by the cooldown, not the cadence
    assert_eq!((stats.cycles, stats.persisted, stats.errors), (2, 0, 2));
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(120) && elapsed < Duration::from_secs(121));
    assert!(sink.batches().is_empty());
}

#[test]
fn cadence_rejects_reversed_window() {
    assert!(matches!(
        Cadence::new(Duration::from_secs(60), Duration::from_secs(45)),
        Err(ValidationError::InvalidDelayWindow { .. })
    ));
    assert!(Cadence::new(Duration::ZERO, Duration::from_secs(1)).is_err());
}
