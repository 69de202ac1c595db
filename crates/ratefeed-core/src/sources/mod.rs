//! Feed-specific fetching and decoding.
//!
//! | Source | Feed | Upstream |
//! |--------|------|----------|
//! | [`ConverterSource`] | `converter` | JSON mid-market converter API |
//! | [`OrderBookSource`] | `order_book` | exchange page embedding its book as `window.gon` |
//! | [`PortalSource`] | `portal` | finance portal HTML, one page per pair |

mod converter;
mod order_book;
mod portal;

use std::future::Future;
use std::pin::Pin;

pub use converter::{decode_converter_rates, ConverterSettings, ConverterSource};
pub use order_book::{decode_order_book, OrderBookSettings, OrderBookSource};
pub use portal::{PortalPair, PortalSource};

use crate::domain::{FeedId, FetchOutcome, RateLabel, TargetNotional};
use crate::http_client::HttpResponse;
use crate::FetchError;

/// Outcomes of one collection pass, in reporting order.
pub type Collected = Vec<(RateLabel, FetchOutcome)>;

/// One feed's way of turning upstream responses into per-label outcomes.
///
/// A source owns its retry memory, so collection takes `&mut self`.
pub trait RateSource: Send {
    fn feed(&self) -> FeedId;

    /// Labels one collection pass reports.
    fn labels(&self) -> Vec<RateLabel>;

    /// Notional the reported prices refer to, for sources that price a book.
    fn notional(&self) -> Option<TargetNotional> {
        None
    }

    fn collect<'a>(&'a mut self) -> Pin<Box<dyn Future<Output = Collected> + Send + 'a>>;
}

pub(crate) fn ensure_success(response: HttpResponse) -> Result<String, FetchError> {
    if !response.is_success() {
        return Err(FetchError::Status {
            status: response.status,
        });
    }
    Ok(response.body)
}
