use serde::Serialize;

use crate::ValidationError;

/// One order-book rung.
///
/// `quote_amount` is the cost of the whole rung as stated by the exchange; it
/// should equal `price * base_volume` but is not re-checked.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DepthLevel {
    price: f64,
    base_volume: f64,
    quote_amount: f64,
}

impl DepthLevel {
    pub fn new(price: f64, base_volume: f64, quote_amount: f64) -> Result<Self, ValidationError> {
        if !price.is_finite() {
            return Err(ValidationError::NonFiniteValue { field: "price" });
        }
        if price <= 0.0 {
            return Err(ValidationError::NonPositivePrice);
        }
        validate_non_negative("base_volume", base_volume)?;
        validate_non_negative("quote_amount", quote_amount)?;

        Ok(Self {
            price,
            base_volume,
            quote_amount,
        })
    }

    pub const fn price(&self) -> f64 {
        self.price
    }

    pub const fn base_volume(&self) -> f64 {
        self.base_volume
    }

    pub const fn quote_amount(&self) -> f64 {
        self.quote_amount
    }
}

/// Levels of one book side in execution priority, best price first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DepthSide(Vec<DepthLevel>);

impl DepthSide {
    pub fn new(levels: Vec<DepthLevel>) -> Self {
        Self(levels)
    }

    pub fn levels(&self) -> &[DepthLevel] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn total_base_volume(&self) -> f64 {
        self.0.iter().map(DepthLevel::base_volume).sum()
    }
}

impl FromIterator<DepthLevel> for DepthSide {
    fn from_iter<I: IntoIterator<Item = DepthLevel>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Both sides of a book decoded from a single fetch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OrderBook {
    pub asks: DepthSide,
    pub bids: DepthSide,
}

/// Quantity of base asset a weighted price is computed for.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct TargetNotional(f64);

impl TargetNotional {
    pub fn new(value: f64) -> Result<Self, ValidationError> {
        if !value.is_finite() || value <= 0.0 {
            return Err(ValidationError::NonPositiveTarget { value });
        }
        Ok(Self(value))
    }

    pub const fn value(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for TargetNotional {
    type Error = ValidationError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

fn validate_non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    if value < 0.0 {
        return Err(ValidationError::NegativeValue { field });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_price() {
        let err = DepthLevel::new(0.0, 1.0, 0.0).expect_err("must fail");
        assert_eq!(err, ValidationError::NonPositivePrice);
    }

    #[test]
    fn rejects_negative_volume() {
        let err = DepthLevel::new(95.0, -1.0, 0.0).expect_err("must fail");
        assert_eq!(
            err,
            ValidationError::NegativeValue {
                field: "base_volume"
            }
        );
    }

    #[test]
    fn target_must_be_positive() {
        assert!(TargetNotional::new(0.0).is_err());
        assert!(TargetNotional::new(f64::NAN).is_err());
        assert_eq!(TargetNotional::new(30_000.0).map(TargetNotional::value), Ok(30_000.0));
    }
}
