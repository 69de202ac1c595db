//! Feed tasks, crash recovery and the backup timer behind `ratefeed run`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use ratefeed_core::retry::uniform_between;
use ratefeed_core::{
    build_poller, FeedId, HttpClient, Poller, RateSink, RatefeedConfig, Warehouse,
};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::error::CliError;

const PORTAL_WARMUP_MIN: Duration = Duration::from_secs(5);
const PORTAL_WARMUP_MAX: Duration = Duration::from_secs(15);

/// Owns one task per feed plus the backup timer until Ctrl-C.
pub struct Supervisor {
    config: Arc<RatefeedConfig>,
    http: Arc<dyn HttpClient>,
    warehouse: Warehouse,
    backups: bool,
}

impl Supervisor {
    pub fn new(config: RatefeedConfig, http: Arc<dyn HttpClient>, warehouse: Warehouse) -> Self {
        Self {
            config: Arc::new(config),
            http,
            warehouse,
            backups: true,
        }
    }

    pub fn with_backups(mut self, enabled: bool) -> Self {
        self.backups = enabled;
        self
    }

    pub async fn run(self, feeds: Vec<FeedId>) -> Result<(), CliError> {
        let sink: Arc<dyn RateSink> = Arc::new(self.warehouse.clone());
        let mut tasks: JoinSet<Result<(), CliError>> = JoinSet::new();

        // Configuration errors surface here instead of inside a task.
        let pollers = build_pollers(&self.config, &feeds, &self.http, &sink)?;
        for (feed, poller) in pollers {
            tasks.spawn(supervise_feed(
                Arc::clone(&self.config),
                feed,
                poller,
                Arc::clone(&self.http),
                Arc::clone(&sink),
            ));
        }

        if self.backups {
            tasks.spawn(backup_timer(
                self.warehouse.clone(),
                self.config.backup_dir.clone(),
                self.config.backup_period,
            ));
        }

        info!(
            target: "ratefeed::supervisor",
            tasks = tasks.len(),
            db_path = %self.warehouse.db_path().display(),
            "ratefeed started"
        );

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                signal = &mut shutdown => {
                    signal?;
                    info!(target: "ratefeed::supervisor", "interrupt received, shutting down");
                    tasks.shutdown().await;
                    return Ok(());
                }
                joined = tasks.join_next() => match joined {
                    Some(Ok(Ok(()))) => {}
                    Some(Ok(Err(err))) => {
                        tasks.shutdown().await;
                        return Err(err);
                    }
                    Some(Err(err)) => {
                        error!(target: "ratefeed::supervisor", error = %err, "supervisor task aborted");
                    }
                    None => return Ok(()),
                },
            }
        }
    }
}

/// One poller per feed, or the first configuration error.
fn build_pollers(
    config: &RatefeedConfig,
    feeds: &[FeedId],
    http: &Arc<dyn HttpClient>,
    sink: &Arc<dyn RateSink>,
) -> Result<Vec<(FeedId, Poller)>, CliError> {
    feeds
        .iter()
        .map(|&feed| -> Result<_, CliError> {
            let poller = build_poller(config, feed, Arc::clone(http), Arc::clone(sink))?;
            Ok((feed, poller))
        })
        .collect()
}

/// Delay before the first cycle of `feed`. The portal starts late so its
/// requests do not line up with the other feeds.
fn warmup(feed: FeedId) -> Duration {
    match feed {
        FeedId::Portal => uniform_between(PORTAL_WARMUP_MIN, PORTAL_WARMUP_MAX),
        FeedId::Converter | FeedId::OrderBook => Duration::ZERO,
    }
}

/// Run `feed` forever, starting with `first` and rebuilding the poller (and
/// its memory) after a panic.
async fn supervise_feed(
    config: Arc<RatefeedConfig>,
    feed: FeedId,
    first: Poller,
    http: Arc<dyn HttpClient>,
    sink: Arc<dyn RateSink>,
) -> Result<(), CliError> {
    let delay = warmup(feed);
    if !delay.is_zero() {
        info!(target: "ratefeed::supervisor", %feed, delay_secs = delay.as_secs_f64(), "delaying first cycle");
        tokio::time::sleep(delay).await;
    }

    let mut first = Some(first);
    loop {
        let mut poller = match first.take() {
            Some(poller) => poller,
            None => build_poller(&config, feed, Arc::clone(&http), Arc::clone(&sink))?,
        };
        info!(target: "ratefeed::supervisor", %feed, "feed started");

        match tokio::spawn(async move { poller.run().await }).await {
            Ok(()) => warn!(target: "ratefeed::supervisor", %feed, "poller stopped unexpectedly"),
            Err(err) if err.is_panic() => error!(
                target: "ratefeed::supervisor",
                %feed,
                cooldown_secs = config.error_cooldown.as_secs_f64(),
                "poller panicked, restarting after cooldown"
            ),
            Err(err) => {
                return Err(CliError::Command(format!("{feed} poller cancelled: {err}")));
            }
        }

        tokio::time::sleep(config.error_cooldown).await;
    }
}

/// Back up the warehouse at every multiple of `period` since the Unix epoch.
async fn backup_timer(
    warehouse: Warehouse,
    backup_dir: PathBuf,
    period: Duration,
) -> Result<(), CliError> {
    let period_secs = period.as_secs().max(1);

    loop {
        let delay = delay_until_next(unix_now(), period_secs);
        tokio::time::sleep(delay).await;

        let warehouse = warehouse.clone();
        let dir = backup_dir.clone();
        match tokio::task::spawn_blocking(move || warehouse.backup(&dir)).await {
            Ok(Ok(path)) => info!(
                target: "ratefeed::backup",
                path = %path.display(),
                "database backup written"
            ),
            Ok(Err(err)) => error!(target: "ratefeed::backup", error = %err, "database backup failed"),
            Err(err) => error!(target: "ratefeed::backup", error = %err, "backup task aborted"),
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs())
}

/// Time from `now_secs` to the next boundary strictly after it. Always in
/// `(0, period_secs]`, so a timer that wakes on a boundary waits a full period.
pub fn delay_until_next(now_secs: u64, period_secs: u64) -> Duration {
    let period_secs = period_secs.max(1);
    Duration::from_secs(period_secs - now_secs % period_secs)
}
