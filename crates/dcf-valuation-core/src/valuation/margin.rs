use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{overflow, ValuationError};
use crate::types::Money;
use crate::ValuationResult;

/// Margin (in percent) beyond which a mispricing counts as significant.
const SIGNIFICANT_MARGIN_PCT: Decimal = dec!(15);

/// Coarse verdict: undervalued only when the margin is strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Undervalued,
    Overvalued,
}

/// Four-band narrative classification of the margin of safety.
///
/// Bands are `> 15`, `(0, 15]`, `(-15, 0]` and `<= -15`. The thresholds are
/// deliberately asymmetric: `15` is slight, `-15` is significant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValuationBand {
    SignificantlyUndervalued,
    SlightlyUndervalued,
    SlightlyOvervalued,
    SignificantlyOvervalued,
}

/// Margin of safety of the current price against intrinsic value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarginOfSafety {
    /// `(intrinsic - price) / intrinsic * 100`
    pub margin_pct: Decimal,
    pub verdict: Verdict,
    pub band: ValuationBand,
}

impl Verdict {
    pub fn from_margin(margin_pct: Decimal) -> Self {
        if margin_pct > Decimal::ZERO {
            Verdict::Undervalued
        } else {
            Verdict::Overvalued
        }
    }
}

impl ValuationBand {
    pub fn from_margin(margin_pct: Decimal) -> Self {
        if margin_pct > SIGNIFICANT_MARGIN_PCT {
            ValuationBand::SignificantlyUndervalued
        } else if margin_pct > Decimal::ZERO {
            ValuationBand::SlightlyUndervalued
        } else if margin_pct > -SIGNIFICANT_MARGIN_PCT {
            ValuationBand::SlightlyOvervalued
        } else {
            ValuationBand::SignificantlyOvervalued
        }
    }

    /// One-line narrative conclusion for the report.
    pub fn conclusion(&self) -> &'static str {
        match self {
            ValuationBand::SignificantlyUndervalued => {
                "The stock appears significantly undervalued based on this DCF analysis."
            }
            ValuationBand::SlightlyUndervalued => {
                "The stock appears slightly undervalued based on this DCF analysis."
            }
            ValuationBand::SlightlyOvervalued => {
                "The stock appears slightly overvalued based on this DCF analysis."
            }
            ValuationBand::SignificantlyOvervalued => {
                "The stock appears significantly overvalued based on this DCF analysis."
            }
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Undervalued => write!(f, "Undervalued"),
            Verdict::Overvalued => write!(f, "Overvalued"),
        }
    }
}

impl fmt::Display for ValuationBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ValuationBand::SignificantlyUndervalued => "significantly undervalued",
            ValuationBand::SlightlyUndervalued => "slightly undervalued",
            ValuationBand::SlightlyOvervalued => "slightly overvalued",
            ValuationBand::SignificantlyOvervalued => "significantly overvalued",
        };
        f.write_str(label)
    }
}

impl MarginOfSafety {
    /// Classify a precomputed margin percentage.
    pub fn from_margin(margin_pct: Decimal) -> Self {
        MarginOfSafety {
            margin_pct,
            verdict: Verdict::from_margin(margin_pct),
            band: ValuationBand::from_margin(margin_pct),
        }
    }
}

/// Compare intrinsic value per share with the current market price.
pub fn margin_of_safety(
    intrinsic_value_per_share: Money,
    current_price: Money,
) -> ValuationResult<MarginOfSafety> {
    if intrinsic_value_per_share.is_zero() {
        return Err(ValuationError::DivisionByZero {
            context: "margin of safety (intrinsic value per share is zero)".into(),
        });
    }
    let margin_pct = intrinsic_value_per_share
        .checked_sub(current_price)
        .and_then(|gap| gap.checked_div(intrinsic_value_per_share))
        .and_then(|ratio| ratio.checked_mul(dec!(100)))
        .ok_or_else(|| overflow("margin of safety"))?;
    Ok(MarginOfSafety::from_margin(margin_pct))
}
