//! Behavior tests for rate derivation: order-book pricing and plausibility-bounded
//! extraction.

use ratefeed_core::{
    extract, weighted_price, DepthLevel, DepthSide, FetchError, PlausibilityBounds,
    TargetNotional, ValidationError,
};

fn side(levels: &[(f64, f64, f64)]) -> DepthSide {
    levels
        .iter()
        .map(|(price, volume, amount)| {
            DepthLevel::new(*price, *volume, *amount).expect("valid depth level")
        })
        .collect()
}

fn target(value: f64) -> TargetNotional {
    TargetNotional::new(value).expect("valid target")
}

fn bounds(lower: f64, upper: f64) -> PlausibilityBounds {
    PlausibilityBounds::new(lower, upper).expect("valid bounds")
}

// =============================================================================
// Weighted execution price
// =============================================================================

#[test]
fn sweeping_one_and_a_half_levels_averages_over_the_target() {
    // Given: Two ask levels of 10 000 units each
    let asks = side(&[(100.0, 10_000.0, 1_000_000.0), (101.0, 10_000.0, 1_010_000.0)]);

    // When: 15 000 units are priced
    let price = weighted_price(&asks, target(15_000.0)).expect("book is deep enough");

    // Then: The whole first level and half of the second are paid for
    assert!((price - 100.333_333).abs() < 1e-6, "got {price}");
}

#[test]
fn scaling_prices_scales_the_result() {
    let base = side(&[(95.1, 20_000.0, 1_902_000.0), (95.2, 50_000.0, 4_760_000.0)]);
    let doubled = side(&[(190.2, 20_000.0, 3_804_000.0), (190.4, 50_000.0, 9_520_000.0)]);

    let base_price = weighted_price(&base, target(30_000.0)).expect("price");
    let doubled_price = weighted_price(&doubled, target(30_000.0)).expect("price");

    assert!((doubled_price - 2.0 * base_price).abs() < 1e-9);
}

#[test]
fn result_stays_within_the_consumed_price_range() {
    let asks = side(&[(95.0, 1_000.0, 95_000.0), (96.0, 1_000.0, 96_000.0), (99.0, 5_000.0, 495_000.0)]);

    let price = weighted_price(&asks, target(2_500.0)).expect("price");

    assert!(price >= 95.0 && price <= 99.0, "got {price}");
}

#[test]
fn shallow_book_has_no_price() {
    let bids = side(&[(94.9, 10_000.0, 949_000.0)]);

    assert_eq!(weighted_price(&bids, target(30_000.0)), None);
    assert_eq!(weighted_price(&DepthSide::default(), target(1.0)), None);
}

#[test]
fn book_exactly_as_deep_as_the_target_is_priced() {
    let asks = side(&[(100.0, 10_000.0, 1_000_000.0), (102.0, 5_000.0, 510_000.0)]);

    let price = weighted_price(&asks, target(15_000.0)).expect("exact fill");

    assert!((price - 1_510_000.0 / 15_000.0).abs() < 1e-9);
}

#[test]
fn non_positive_target_is_rejected() {
    assert!(matches!(
        TargetNotional::new(0.0),
        Err(ValidationError::NonPositiveTarget { .. })
    ));
    assert!(TargetNotional::new(-5.0).is_err());
    assert!(TargetNotional::new(f64::NAN).is_err());
}

// =============================================================================
// Plausibility-bounded extraction
// =============================================================================

#[test]
fn values_on_either_bound_are_rejected() {
    let window = bounds(50.0, 200.0);

    assert_eq!(extract("<span>50.00</span>", window, false), Ok(None));
    assert_eq!(extract("<span>200.0</span>", window, false), Ok(None));
    assert_eq!(extract("<span>50.01</span>", window, false), Ok(Some(50.01)));
}

#[test]
fn decimal_comma_is_accepted() {
    let page = r#"<div><span class="change">-0,35</span><span data-test="instrument-price-last">92,4512</span></div>"#;

    assert_eq!(extract(page, bounds(50.0, 200.0), false), Ok(Some(92.4512)));
}

#[test]
fn inverted_rate_is_rounded_to_six_digits() {
    let value = extract(r#"{"last":3.0}"#, bounds(1.0, 10.0), true)
        .expect("extraction")
        .expect("value in bounds");

    assert_eq!(value, 0.333_333);
}

#[test]
fn extraction_is_repeatable() {
    let page = r#"<span>12.1</span>{"last": 81.7}<span>83.9</span>"#;
    let window = bounds(50.0, 200.0);

    let first = extract(page, window, false);
    let second = extract(page, window, false);

    assert_eq!(first, Ok(Some(81.7)));
    assert_eq!(first, second);
}

#[test]
fn page_without_plausible_number_yields_nothing() {
    let page = "<html><span>Access denied</span><span>1.5</span></html>";

    assert_eq!(extract(page, bounds(50.0, 200.0), false), Ok(None));
    assert!(!matches!(
        extract(page, bounds(50.0, 200.0), true),
        Err(FetchError::DivisionByZero)
    ));
}

#[test]
fn inverted_or_empty_windows_are_rejected() {
    assert!(PlausibilityBounds::new(200.0, 50.0).is_err());
    assert!(PlausibilityBounds::new(50.0, 50.0).is_err());
    assert!(PlausibilityBounds::new(-1.0, 50.0).is_err());
}
