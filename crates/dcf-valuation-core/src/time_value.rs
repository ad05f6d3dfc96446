use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;

use crate::error::{overflow, ValuationError};
use crate::types::{Money, Rate, Years};
use crate::ValuationResult;

/// Discount factor `1 / (1 + rate)^periods`.
pub fn discount_factor(rate: Rate, periods: Years) -> ValuationResult<Rate> {
    present_value(Decimal::ONE, rate, periods)
}

/// Present value of a single amount received `periods` years from now.
pub fn present_value(future_value: Money, rate: Rate, periods: Years) -> ValuationResult<Money> {
    if rate <= dec!(-1) {
        return Err(ValuationError::InvalidInput {
            field: "rate".into(),
            reason: "Discount rate must be greater than -100%".into(),
        });
    }
    if periods < Decimal::ZERO {
        return Err(ValuationError::InvalidInput {
            field: "periods".into(),
            reason: "Number of periods must be non-negative".into(),
        });
    }
    if rate.is_zero() || periods.is_zero() {
        return Ok(future_value);
    }
    let base = Decimal::ONE
        .checked_add(rate)
        .ok_or_else(|| overflow("compounding factor"))?;
    discount(future_value, base, periods)
}

/// `value / base^periods` for `base > 0`.
///
/// When `base^periods` is not representable the exponent is halved and the
/// value is discounted in two steps, so only a present value that is itself
/// out of range is an error.
fn discount(value: Decimal, base: Decimal, periods: Decimal) -> ValuationResult<Decimal> {
    if value.is_zero() {
        return Ok(Decimal::ZERO);
    }
    match base.checked_powd(periods) {
        Some(growth) if !growth.is_zero() => value
            .checked_div(growth)
            .ok_or_else(|| overflow("present value")),
        // base^p lies between base and 1 here
        _ if periods <= Decimal::ONE => Err(overflow("compounding factor")),
        _ => {
            let half = if periods >= dec!(2) {
                (periods / dec!(2)).floor()
            } else {
                periods / dec!(2)
            };
            let partial = discount(value, base, half)?;
            discount(partial, base, periods - half)
        }
    }
}
