//! Volume-weighted execution price over one side of a book.

use crate::domain::{DepthSide, TargetNotional};

/// Average price paid to fill exactly `target` units of base asset.
///
/// Levels are consumed in the given order. Whole levels contribute their
/// stated quote amount; the first level that would overshoot contributes the
/// remaining quantity at its price and ends the sweep. Returns `None` when the
/// side holds less than `target` in total.
pub fn weighted_price(side: &DepthSide, target: TargetNotional) -> Option<f64> {
    let target = target.value();
    let mut accumulated = 0.0_f64;
    let mut total_quote = 0.0_f64;

    for level in side.levels() {
        if accumulated + level.base_volume() <= target {
            total_quote += level.quote_amount();
            accumulated += level.base_volume();
        } else {
            let remaining = target - accumulated;
            total_quote += remaining * level.price();
            accumulated = target;
            break;
        }
    }

    if accumulated < target {
        return None;
    }

    Some(total_quote / target)
}
