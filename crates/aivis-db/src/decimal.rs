//! Conversions between the `f64` scores used in computation and the
//! `NUMERIC` columns they are stored in.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Convert `value` to a [`Decimal`] rounded to `scale` places. Non-finite
/// input becomes zero.
#[must_use]
pub fn to_decimal(value: f64, scale: u32) -> Decimal {
    Decimal::from_f64_retain(value)
        .unwrap_or_default()
        .round_dp(scale)
}

#[must_use]
pub fn from_decimal(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}
