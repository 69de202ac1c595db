use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Every rate the system can produce.
///
/// Serialized with its display string, e.g. `"1 USD = EUR"` or `"ASK"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum RateLabel {
    UsdEur,
    EurUsd,
    UsdGbp,
    UsdCny,
    UsdKrw,
    UsdRub,
    EurRub,
    Ask,
    Bid,
}

impl RateLabel {
    pub const ALL: [Self; 9] = [
        Self::UsdEur,
        Self::EurUsd,
        Self::UsdGbp,
        Self::UsdCny,
        Self::UsdKrw,
        Self::UsdRub,
        Self::EurRub,
        Self::Ask,
        Self::Bid,
    ];

    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        Self::ALL
            .into_iter()
            .find(|label| label.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ValidationError::InvalidLabel {
                value: input.to_owned(),
            })
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UsdEur => "1 USD = EUR",
            Self::EurUsd => "1 EUR = USD",
            Self::UsdGbp => "1 USD = GBP",
            Self::UsdCny => "1 USD = CNY",
            Self::UsdKrw => "1 USD = KRW",
            Self::UsdRub => "USD/RUB",
            Self::EurRub => "EUR/RUB",
            Self::Ask => "ASK",
            Self::Bid => "BID",
        }
    }

    /// Warehouse column holding this rate.
    pub const fn column(self) -> &'static str {
        match self {
            Self::UsdEur => "usd_eur",
            Self::EurUsd => "eur_usd",
            Self::UsdGbp => "usd_gbp",
            Self::UsdCny => "usd_cny",
            Self::UsdKrw => "usd_krw",
            Self::UsdRub => "usd_rub",
            Self::EurRub => "eur_rub",
            Self::Ask => "ask_weighted_price",
            Self::Bid => "bid_weighted_price",
        }
    }
}

impl Display for RateLabel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<RateLabel> for &'static str {
    fn from(value: RateLabel) -> Self {
        value.as_str()
    }
}

impl TryFrom<String> for RateLabel {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

/// Independently polled unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedId {
    Converter,
    OrderBook,
    Portal,
}

impl FeedId {
    pub const ALL: [Self; 3] = [Self::Converter, Self::OrderBook, Self::Portal];

    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        match input.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "converter" => Ok(Self::Converter),
            "order_book" => Ok(Self::OrderBook),
            "portal" => Ok(Self::Portal),
            _ => Err(ValidationError::InvalidFeed {
                value: input.to_owned(),
            }),
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Converter => "converter",
            Self::OrderBook => "order_book",
            Self::Portal => "portal",
        }
    }

    /// Labels the feed may report, i.e. the columns of its table.
    pub const fn labels(self) -> &'static [RateLabel] {
        match self {
            Self::Converter => &[
                RateLabel::UsdEur,
                RateLabel::EurUsd,
                RateLabel::UsdGbp,
                RateLabel::UsdCny,
                RateLabel::UsdKrw,
            ],
            Self::OrderBook => &[RateLabel::Ask, RateLabel::Bid],
            Self::Portal => &[RateLabel::UsdRub, RateLabel::EurRub],
        }
    }
}

impl Display for FeedId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
