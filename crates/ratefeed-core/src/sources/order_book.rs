use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use super::{ensure_success, Collected, RateSource};
use crate::domain::{
    DepthLevel, DepthSide, FeedId, FetchOutcome, OrderBook, RateLabel, RateSample, TargetNotional,
    UtcDateTime,
};
use crate::http_client::{HeaderProfile, HttpClient, HttpRequest};
use crate::pricer::weighted_price;
use crate::resilient::retry;
use crate::retry::RetryPolicy;
use crate::FetchError;

static SCRIPT_BODY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b[^>]*>(.*?)</script>").expect("script pattern is valid")
});

/// Exchange page and the market whose book is priced.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBookSettings {
    pub url: String,
    /// Key under `exchangers` in the embedded data, e.g. `usdtrub`.
    pub market: String,
    pub target: TargetNotional,
    pub timeout_ms: u64,
}

/// Exchange order book priced for a fixed target notional.
///
/// The page is fetched once per cycle and retried as a unit. Sides are not
/// remembered between cycles: a side that cannot be priced is MISSING.
pub struct OrderBookSource {
    http: Arc<dyn HttpClient>,
    settings: OrderBookSettings,
    profile: HeaderProfile,
    policy: RetryPolicy,
}

impl OrderBookSource {
    pub fn new(
        http: Arc<dyn HttpClient>,
        settings: OrderBookSettings,
        profile: HeaderProfile,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            http,
            settings,
            profile,
            policy,
        }
    }

    async fn collect_prices(&self) -> Collected {
        let settings = &self.settings;
        let profile = &self.profile;

        let book = retry(&self.policy, FeedId::OrderBook.as_str(), |_| {
            let request = HttpRequest::get(settings.url.as_str())
                .with_profile(profile, fastrand::u64(..))
                .with_timeout_ms(settings.timeout_ms);
            let http = Arc::clone(&self.http);
            async move {
                let response = http.execute(request).await?;
                decode_order_book(&ensure_success(response)?, &settings.market)
            }
        })
        .await;

        let Some(book) = book else {
            return vec![
                (RateLabel::Ask, FetchOutcome::missing()),
                (RateLabel::Bid, FetchOutcome::missing()),
            ];
        };

        let taken_at = UtcDateTime::now();
        [(RateLabel::Ask, &book.asks), (RateLabel::Bid, &book.bids)]
            .into_iter()
            .map(|(label, side)| {
                let sample = RateSample::new(label, weighted_price(side, settings.target), taken_at);
                match sample.value {
                    Some(value) => info!(
                        target: "ratefeed::order_book",
                        side = %label,
                        value,
                        target_amount = settings.target.value(),
                        "weighted price"
                    ),
                    None => warn!(
                        target: "ratefeed::order_book",
                        side = %label,
                        available = side.total_base_volume(),
                        target_amount = settings.target.value(),
                        "not enough volume in book"
                    ),
                }
                (label, FetchOutcome::from_sample(&sample))
            })
            .collect()
    }
}

impl RateSource for OrderBookSource {
    fn feed(&self) -> FeedId {
        FeedId::OrderBook
    }

    fn labels(&self) -> Vec<RateLabel> {
        FeedId::OrderBook.labels().to_vec()
    }

    fn notional(&self) -> Option<TargetNotional> {
        Some(self.settings.target)
    }

    fn collect<'a>(&'a mut self) -> Pin<Box<dyn Future<Output = Collected> + Send + 'a>> {
        Box::pin(self.collect_prices())
    }
}

#[derive(Debug, Deserialize)]
struct RawLevel {
    price: Quantity,
    volume: Quantity,
    amount: Quantity,
}

/// Exchanges send numbers either as JSON numbers or as decimal strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Quantity {
    Number(f64),
    Text(String),
}

impl Quantity {
    fn value(&self, field: &str) -> Result<f64, FetchError> {
        match self {
            Self::Number(value) => Ok(*value),
            Self::Text(text) => text
                .trim()
                .parse()
                .map_err(|_| FetchError::Decode(format!("{field} '{text}' is not a number"))),
        }
    }
}

/// Locate the `window.gon = {...};` script of an exchange page and decode the
/// ask and bid sides of `exchangers.<market>`.
///
/// A side the market entry lacks decodes as empty.
pub fn decode_order_book(html: &str, market: &str) -> Result<OrderBook, FetchError> {
    let gon = SCRIPT_BODY
        .captures_iter(html)
        .filter_map(|captures| captures.get(1))
        .find_map(|script| gon_payload(script.as_str()))
        .ok_or_else(|| FetchError::Decode(String::from("unable to find order book data")))?;

    let data: Value = serde_json::Deserializer::from_str(gon)
        .into_iter::<Value>()
        .next()
        .ok_or_else(|| FetchError::Decode(String::from("empty window.gon assignment")))?
        .map_err(|err| FetchError::Decode(err.to_string()))?;

    let exchanger = data
        .get("exchangers")
        .and_then(|exchangers| exchangers.get(market))
        .ok_or_else(|| FetchError::Decode(format!("market '{market}' not present in page")))?;

    Ok(OrderBook {
        asks: decode_side(exchanger.get("ask"))?,
        bids: decode_side(exchanger.get("bid"))?,
    })
}

fn gon_payload(script: &str) -> Option<&str> {
    let start = script.find("window.gon")?;
    let rest = &script[start + "window.gon".len()..];
    let rest = rest.trim_start().strip_prefix('=')?;
    Some(rest.trim())
}

fn decode_side(levels: Option<&Value>) -> Result<DepthSide, FetchError> {
    let Some(levels) = levels else {
        return Ok(DepthSide::default());
    };
    let raw: Vec<RawLevel> =
        Vec::deserialize(levels).map_err(|err| FetchError::Decode(err.to_string()))?;

    raw.iter()
        .map(|level| {
            DepthLevel::new(
                level.price.value("price")?,
                level.volume.value("volume")?,
                level.amount.value("amount")?,
            )
            .map_err(|err| FetchError::Decode(err.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><head>
<script src="/assets/app.js"></script>
<script>
window.gon = {"locale":"ru","exchangers":{"usdtrub":{
  "ask":[{"price":"95.10","volume":"20000.0","amount":"1902000.0"},{"price":"95.20","volume":"50000.0","amount":"4760000.0"}],
  "bid":[{"price":94.9,"volume":10000,"amount":949000}]
}}};
</script></head><body></body></html>"#;

    #[test]
    fn decodes_string_and_number_levels() {
        let book = decode_order_book(PAGE, "usdtrub").expect("decode");

        assert_eq!(book.asks.levels().len(), 2);
        assert_eq!(book.asks.levels()[1].price(), 95.2);
        assert_eq!(book.bids.levels()[0].quote_amount(), 949_000.0);
    }

    #[test]
    fn unknown_market_is_a_decode_error() {
        let err = decode_order_book(PAGE, "btcrub").expect_err("must fail");
        assert!(matches!(err, FetchError::Decode(_)));
    }

    #[test]
    fn page_without_gon_is_a_decode_error() {
        let err = decode_order_book("<html><script>var x = 1;</script></html>", "usdtrub")
            .expect_err("must fail");
        assert!(matches!(err, FetchError::Decode(_)));
    }

    #[test]
    fn missing_side_decodes_as_empty() {
        let page = r#"<script>window.gon = {"exchangers":{"usdtrub":{"ask":[]}}};</script>"#;
        let book = decode_order_book(page, "usdtrub").expect("decode");
        assert!(book.asks.is_empty());
        assert!(book.bids.is_empty());
    }
}
