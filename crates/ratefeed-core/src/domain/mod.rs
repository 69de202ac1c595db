//! # Domain Models
//!
//! Strongly-typed values flowing from a raw response to a persisted batch.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`DepthLevel`] | One order-book rung (price, base volume, quote amount) |
//! | [`DepthSide`] | Levels of one side in execution priority |
//! | [`OrderBook`] | Ask and bid sides from a single fetch |
//! | [`TargetNotional`] | Validated quantity a weighted price is computed for |
//! | [`RateLabel`] | Closed set of produced rates |
//! | [`FeedId`] | Independently polled unit |
//! | [`RateSample`] | One derived value with its timestamp |
//! | [`FetchOutcome`] | Value plus FRESH/STALE/MISSING origin |
//! | [`Batch`] | Outcomes of one cycle with an OK/PARTIAL/FAILED status |
//! | [`UtcDateTime`] | UTC timestamp |
//!
//! Constructors validate their invariants and return [`crate::ValidationError`].

mod batch;
mod book;
mod label;
mod timestamp;

pub use batch::{Batch, BatchStatus, FetchOutcome, Origin, OriginCounts, RateSample};
pub use book::{DepthLevel, DepthSide, OrderBook, TargetNotional};
pub use label::{FeedId, RateLabel};
pub use timestamp::UtcDateTime;
