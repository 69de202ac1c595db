use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::info;

use super::{ensure_success, Collected, RateSource};
use crate::domain::{FeedId, RateLabel};
use crate::extract::{extract, PlausibilityBounds};
use crate::http_client::{HeaderProfile, HttpClient, HttpRequest};
use crate::resilient::ResilientFetch;
use crate::retry::RetryPolicy;
use crate::FetchError;

/// One scraped portal page and how to read its rate.
#[derive(Debug, Clone, PartialEq)]
pub struct PortalPair {
    pub label: RateLabel,
    pub url: String,
    pub bounds: PlausibilityBounds,
    pub invert: bool,
}

/// Finance portal HTML scraper. Each pair is its own page and is retried and
/// remembered on its own.
pub struct PortalSource {
    http: Arc<dyn HttpClient>,
    pairs: Vec<PortalPair>,
    profile: HeaderProfile,
    fetch: ResilientFetch,
    timeout_ms: u64,
}

impl PortalSource {
    pub fn new(
        http: Arc<dyn HttpClient>,
        pairs: Vec<PortalPair>,
        profile: HeaderProfile,
        policy: RetryPolicy,
        timeout_ms: u64,
    ) -> Self {
        Self {
            http,
            pairs,
            profile,
            fetch: ResilientFetch::new(policy),
            timeout_ms,
        }
    }

    pub fn resilient(&self) -> &ResilientFetch {
        &self.fetch
    }

    async fn collect_pairs(&mut self) -> Collected {
        let Self {
            http,
            pairs,
            profile,
            fetch,
            timeout_ms,
        } = self;
        let (http, profile, timeout_ms) = (&*http, &*profile, *timeout_ms);

        let mut collected = Vec::with_capacity(pairs.len());
        for pair in pairs.iter() {
            let outcome = fetch
                .fetch(pair.label, |_| {
                    let request = HttpRequest::get(pair.url.as_str())
                        .with_profile(profile, fastrand::u64(..))
                        .with_timeout_ms(timeout_ms);
                    let http = Arc::clone(http);
                    async move {
                        let response = http.execute(request).await?;
                        let body = ensure_success(response)?;
                        extract(&body, pair.bounds, pair.invert)?.ok_or_else(|| {
                            FetchError::Extraction {
                                label: pair.label.to_string(),
                            }
                        })
                    }
                })
                .await;

            if let Some(value) = outcome.value {
                info!(target: "ratefeed::portal", label = %pair.label, value, origin = ?outcome.origin, "rate");
            }
            collected.push((pair.label, outcome));
        }
        collected
    }
}

impl RateSource for PortalSource {
    fn feed(&self) -> FeedId {
        FeedId::Portal
    }

    fn labels(&self) -> Vec<RateLabel> {
        self.pairs.iter().map(|pair| pair.label).collect()
    }

    fn collect<'a>(&'a mut self) -> Pin<Box<dyn Future<Output = Collected> + Send + 'a>> {
        Box::pin(self.collect_pairs())
    }
}
