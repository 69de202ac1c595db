use thiserror::Error;

use crate::http_client::HttpError;

/// Validation and contract errors exposed by `ratefeed-core`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("plausibility bounds must be finite with 0 <= lower < upper, got ({lower}, {upper})")]
    InvalidBounds { lower: f64, upper: f64 },
    #[error("target notional must be finite and greater than zero, got {value}")]
    NonPositiveTarget { value: f64 },

    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be non-negative")]
    NegativeValue { field: &'static str },
    #[error("depth level price must be greater than zero")]
    NonPositivePrice,

    #[error("invalid feed '{value}', expected one of converter, order_book, portal")]
    InvalidFeed { value: String },
    #[error("invalid rate label '{value}'")]
    InvalidLabel { value: String },
    #[error("label '{label}' is not produced by feed '{feed}'")]
    UnexpectedLabel { feed: String, label: String },
    #[error("label '{label}' appears more than once in a cycle")]
    DuplicateLabel { label: String },
    #[error("rate '{label}' must be finite and greater than zero, got {value}")]
    ImplausibleRate { label: String, value: f64 },
    #[error("feed '{feed}' has no labels configured")]
    EmptyLabelSet { feed: String },
    #[error("source for feed '{source_feed}' cannot be aggregated into feed '{feed}'")]
    MismatchedSource { feed: String, source_feed: String },

    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },

    #[error("delay window must satisfy 0 < min <= max, got min={min}s max={max}s")]
    InvalidDelayWindow { min: f64, max: f64 },
    #[error("setting '{key}' must not be empty")]
    EmptySetting { key: &'static str },
    #[error("setting '{key}' has invalid value '{value}'")]
    InvalidSetting { key: &'static str, value: String },
    #[error("invalid .env file: {reason}")]
    InvalidEnvFile { reason: String },
}

/// Top-level error type for core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Why a single fetch attempt produced no value.
///
/// Every variant counts as one failed attempt; callers never branch on the kind.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FetchError {
    #[error("transport failure: {0}")]
    Transport(#[from] HttpError),

    #[error("upstream returned HTTP {status}")]
    Status { status: u16 },

    #[error("response could not be decoded: {0}")]
    Decode(String),

    #[error("no plausible value for '{label}'")]
    Extraction { label: String },

    #[error("cannot invert a zero rate")]
    DivisionByZero,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_errors_surface_the_validation_failure() {
        let err = CoreError::from(ValidationError::ImplausibleRate {
            label: String::from("USD/RUB"),
            value: -1.0,
        });

        let CoreError::Validation(inner) = &err;
        assert!(matches!(inner, ValidationError::ImplausibleRate { .. }));
        assert_eq!(
            err.to_string(),
            "rate 'USD/RUB' must be finite and greater than zero, got -1"
        );
    }
}
