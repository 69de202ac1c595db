//! Pulls one plausible rate out of a raw page or API body.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::{FetchError, ValidationError};

static LAST_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""last"\s*:\s*(\d+(?:\.\d+)?)"#).expect("last-field pattern is valid")
});

static SPAN_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<span\b[^>]*>(.*?)</span>").expect("span pattern is valid")
});

/// Text wrapped only in inline tags, as in `<b><i>81.2</i></b>`.
static WRAPPED_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^\s*(?:<[a-z][^>]*>\s*)*([^<]*?)\s*(?:</[a-z][^>]*>\s*)*$")
        .expect("wrapped-text pattern is valid")
});

static DECIMAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,5}[.,]\d{1,6}$").expect("decimal pattern is valid"));

const RATE_SCALE: f64 = 1_000_000.0;

/// Exclusive sanity window for one label.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlausibilityBounds {
    lower: f64,
    upper: f64,
}

impl PlausibilityBounds {
    pub fn new(lower: f64, upper: f64) -> Result<Self, ValidationError> {
        if !lower.is_finite() || !upper.is_finite() || lower < 0.0 || lower >= upper {
            return Err(ValidationError::InvalidBounds { lower, upper });
        }
        Ok(Self { lower, upper })
    }

    pub const fn lower(&self) -> f64 {
        self.lower
    }

    pub const fn upper(&self) -> f64 {
        self.upper
    }

    /// Strictly inside; both edges are rejected.
    pub fn contains(&self, value: f64) -> bool {
        self.lower < value && value < self.upper
    }
}

/// Find the rate in `raw`.
///
/// The machine-readable `"last": <number>` field wins when it is in bounds.
/// Otherwise the first `<span>` whose whole text is a decimal number inside
/// the bounds is used. The text may sit inside a chain of single inline tags
/// (`<span><b>81.2</b></span>`) but not next to other markup. `,` is accepted as decimal separator. With `invert`
/// the reciprocal is returned. Results are rounded to 6 fractional digits.
///
/// `Ok(None)` means nothing plausible was found.
pub fn extract(
    raw: &str,
    bounds: PlausibilityBounds,
    invert: bool,
) -> Result<Option<f64>, FetchError> {
    let Some(value) = find_candidate(raw, bounds) else {
        return Ok(None);
    };

    let value = if invert { invert_rate(value)? } else { value };
    Ok(Some(round_rate(value)))
}

/// `1 / value`, refusing zero.
pub fn invert_rate(value: f64) -> Result<f64, FetchError> {
    if value == 0.0 {
        return Err(FetchError::DivisionByZero);
    }
    Ok(1.0 / value)
}

/// Round to 6 fractional digits.
pub fn round_rate(value: f64) -> f64 {
    (value * RATE_SCALE).round() / RATE_SCALE
}

fn find_candidate(raw: &str, bounds: PlausibilityBounds) -> Option<f64> {
    let from_field = LAST_FIELD
        .captures(raw)
        .and_then(|captures| captures.get(1))
        .and_then(|value| value.as_str().parse::<f64>().ok())
        .filter(|value| bounds.contains(*value));
    if from_field.is_some() {
        return from_field;
    }

    SPAN_TEXT
        .captures_iter(raw)
        .filter_map(|captures| captures.get(1))
        .filter_map(|inner| sole_text(inner.as_str()))
        .filter(|text| DECIMAL.is_match(text))
        .filter_map(|text| text.replace(',', ".").parse::<f64>().ok())
        .find(|value| bounds.contains(*value))
}

fn sole_text(inner: &str) -> Option<&str> {
    WRAPPED_TEXT
        .captures(inner)
        .and_then(|captures| captures.get(1))
        .map(|text| text.as_str().trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds() -> PlausibilityBounds {
        PlausibilityBounds::new(50.0, 200.0).expect("bounds")
    }

    #[test]
    fn prefers_last_field() {
        let raw = r#"<script>{"pair":"USD/RUB","last": 81.4567}</script><span>99.1</span>"#;
        assert_eq!(extract(raw, bounds(), false), Ok(Some(81.4567)));
    }

    #[test]
    fn falls_back_to_spans_when_field_is_out_of_bounds() {
        let raw = r#"{"last":1.02}<span class="ad">12.5</span><span> 81,25 </span><span>90.1</span>"#;
        assert_eq!(extract(raw, bounds(), false), Ok(Some(81.25)));
    }

    #[test]
    fn reads_text_through_single_inline_wrappers() {
        let raw = "<span><b>81.2</b></span>";
        assert_eq!(extract(raw, bounds(), false), Ok(Some(81.2)));

        let raw = r#"<span class="value"><b> <i>92,15</i> </b></span>"#;
        assert_eq!(extract(raw, bounds(), false), Ok(Some(92.15)));
    }

    #[test]
    fn ignores_spans_with_mixed_markup_or_non_decimal_text() {
        let raw = "<span>81.2 <b>RUB</b></span><span>81</span><span>+0.35%</span>";
        assert_eq!(extract(raw, bounds(), false), Ok(None));
    }

    #[test]
    fn inverts_and_rounds() {
        let raw = r#""last":80.0"#;
        assert_eq!(extract(raw, bounds(), true), Ok(Some(0.0125)));

        let raw = r#""last":81.123456789"#;
        assert_eq!(extract(raw, bounds(), false), Ok(Some(81.123457)));
    }

    #[test]
    fn zero_cannot_be_inverted() {
        assert_eq!(invert_rate(0.0), Err(FetchError::DivisionByZero));
    }

    #[test]
    fn bounds_must_be_ordered() {
        assert!(PlausibilityBounds::new(200.0, 50.0).is_err());
        assert!(PlausibilityBounds::new(-1.0, 50.0).is_err());
        assert!(PlausibilityBounds::new(50.0, f64::INFINITY).is_err());
    }
}
