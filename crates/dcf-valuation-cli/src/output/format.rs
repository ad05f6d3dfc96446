use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const BILLION: Decimal = dec!(1000000000);
const MILLION: Decimal = dec!(1000000);

/// Monetary amount scaled to billions, e.g. `$102.58B`.
pub fn money_bn(value: Decimal, symbol: &str) -> String {
    signed(value, |v| format!("{symbol}{:.2}B", (v / BILLION).round_dp(2)))
}

/// Per-share amount, e.g. `$199.90`.
pub fn per_share(value: Decimal, symbol: &str) -> String {
    signed(value, |v| format!("{symbol}{:.2}", v.round_dp(2)))
}

/// Share count in millions, e.g. `467.46M`.
pub fn shares_mm(value: Decimal) -> String {
    format!("{:.2}M", (value / MILLION).round_dp(2))
}

/// Decimal rate as a percentage, e.g. `0.075` -> `7.50%`.
pub fn pct(rate: Decimal) -> String {
    format!("{:.2}%", (rate * dec!(100)).round_dp(2))
}

/// A value already expressed in percent, e.g. `-9.77%`.
pub fn pct_points(value: Decimal) -> String {
    format!("{:.2}%", value.round_dp(2))
}

fn signed(value: Decimal, render: impl Fn(Decimal) -> String) -> String {
    if value.is_sign_negative() && !value.is_zero() {
        format!("-{}", render(value.abs()))
    } else {
        render(value)
    }
}
