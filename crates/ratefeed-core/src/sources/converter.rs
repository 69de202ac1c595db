use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, warn};

use super::{ensure_success, Collected, RateSource};
use crate::domain::{FeedId, FetchOutcome, RateLabel};
use crate::extract::{invert_rate, round_rate};
use crate::http_client::{HeaderProfile, HttpAuth, HttpClient, HttpRequest};
use crate::resilient::{retry, ResilientFetch};
use crate::retry::RetryPolicy;
use crate::FetchError;

/// Where and how to call the converter API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConverterSettings {
    pub url: String,
    pub auth: HttpAuth,
    pub timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
struct ConverterResponse {
    rates: BTreeMap<String, f64>,
}

/// USD-based converter API. The response is fetched as a unit; labels the
/// response lacks fall back to memory individually.
pub struct ConverterSource {
    http: Arc<dyn HttpClient>,
    settings: ConverterSettings,
    profile: HeaderProfile,
    fetch: ResilientFetch,
}

impl ConverterSource {
    pub fn new(
        http: Arc<dyn HttpClient>,
        settings: ConverterSettings,
        profile: HeaderProfile,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            http,
            settings,
            profile,
            fetch: ResilientFetch::new(policy),
        }
    }

    pub fn resilient(&self) -> &ResilientFetch {
        &self.fetch
    }

    async fn collect_rates(&mut self) -> Collected {
        let policy = *self.fetch.policy();
        let http = Arc::clone(&self.http);
        let settings = &self.settings;
        let profile = &self.profile;

        let rates = retry(&policy, FeedId::Converter.as_str(), |_| {
            let request = HttpRequest::get(settings.url.as_str())
                .with_profile(profile, fastrand::u64(..))
                .with_header("accept", "application/json")
                .with_auth(&settings.auth)
                .with_timeout_ms(settings.timeout_ms);
            let http = Arc::clone(&http);
            async move {
                let response = http.execute(request).await?;
                decode_converter_rates(&ensure_success(response)?)
            }
        })
        .await
        .unwrap_or_default();

        FeedId::Converter
            .labels()
            .iter()
            .map(|label| {
                let outcome = match rates.get(label) {
                    Some(value) => {
                        info!(target: "ratefeed::converter", label = %label, value, "rate");
                        self.fetch.record(*label, *value)
                    }
                    None => self.fetch.recall(*label),
                };
                (*label, outcome)
            })
            .collect()
    }
}

impl RateSource for ConverterSource {
    fn feed(&self) -> FeedId {
        FeedId::Converter
    }

    fn labels(&self) -> Vec<RateLabel> {
        FeedId::Converter.labels().to_vec()
    }

    fn collect<'a>(&'a mut self) -> Pin<Box<dyn Future<Output = Collected> + Send + 'a>> {
        Box::pin(self.collect_rates())
    }
}

/// Derive the converter labels from a `{"rates": {...}}` body quoted in USD.
///
/// Currencies the body lacks, or quotes that are not positive, are left out.
/// A body yielding no label at all is a decode failure.
pub fn decode_converter_rates(body: &str) -> Result<BTreeMap<RateLabel, f64>, FetchError> {
    let response: ConverterResponse =
        serde_json::from_str(body).map_err(|err| FetchError::Decode(err.to_string()))?;
    let quote = |currency: &str| {
        response
            .rates
            .get(currency)
            .copied()
            .filter(|value| value.is_finite() && *value > 0.0)
    };

    let mut derived = BTreeMap::new();
    if let Some(eur) = quote("EUR") {
        derived.insert(RateLabel::UsdEur, round_rate(eur));
        match invert_rate(eur) {
            Ok(inverted) => {
                derived.insert(RateLabel::EurUsd, round_rate(inverted));
            }
            Err(err) => warn!(target: "ratefeed::converter", error = %err, "EUR quote not invertible"),
        }
    }
    for (label, currency) in [
        (RateLabel::UsdGbp, "GBP"),
        (RateLabel::UsdCny, "CNY"),
        (RateLabel::UsdKrw, "KRW"),
    ] {
        if let Some(value) = quote(currency) {
            derived.insert(label, round_rate(value));
        }
    }

    if derived.is_empty() {
        return Err(FetchError::Decode(String::from(
            "response carries none of EUR, GBP, CNY, KRW",
        )));
    }
    Ok(derived)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_all_five_labels() {
        let body = r#"{"timestamp":1760864400000,"rates":{"USD":1,"EUR":0.8,"GBP":0.75,"CNY":7.1234567,"KRW":1380.5}}"#;
        let rates = decode_converter_rates(body).expect("decode");

        assert_eq!(rates.get(&RateLabel::UsdEur), Some(&0.8));
        assert_eq!(rates.get(&RateLabel::EurUsd), Some(&1.25));
        assert_eq!(rates.get(&RateLabel::UsdGbp), Some(&0.75));
        assert_eq!(rates.get(&RateLabel::UsdCny), Some(&7.123457));
        assert_eq!(rates.get(&RateLabel::UsdKrw), Some(&1380.5));
    }

    #[test]
    fn missing_currency_drops_only_its_label() {
        let rates = decode_converter_rates(r#"{"rates":{"EUR":0.8,"GBP":0.75}}"#).expect("decode");
        assert_eq!(rates.len(), 3);
        assert!(!rates.contains_key(&RateLabel::UsdKrw));
    }

    #[test]
    fn body_without_known_currencies_is_a_decode_error() {
        let err = decode_converter_rates(r#"{"rates":{"JPY":150.0}}"#).expect_err("must fail");
        assert!(matches!(err, FetchError::Decode(_)));

        let err = decode_converter_rates("<html>blocked</html>").expect_err("must fail");
        assert!(matches!(err, FetchError::Decode(_)));
    }
}
