use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::{overflow, ValuationError};
use crate::time_value::{discount_factor, present_value};
use crate::types::{with_metadata, ComputationOutput, Money, Multiple, Rate};
use crate::ValuationResult;

use super::margin::{margin_of_safety, MarginOfSafety};

/// Terminal value share of enterprise value above which a warning is raised.
const TERMINAL_VALUE_WARNING_PCT: Decimal = dec!(0.75);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Trailing financial fundamentals of the company being valued.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fundamentals {
    /// Equity market capitalisation
    pub market_cap: Money,
    /// Market enterprise value (market cap + net debt)
    pub enterprise_value: Money,
    /// Trailing twelve-month revenue
    pub revenue: Money,
    /// Trailing twelve-month EBITDA
    pub ebitda: Money,
    /// Diluted shares outstanding
    pub shares_outstanding: Decimal,
    /// Fraction of EBITDA assumed to convert into free cash flow, in (0, 1]
    pub fcf_conversion: Rate,
}

/// Model assumptions for the two-stage DCF.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assumptions {
    /// Discount rate applied to every forecast cash flow
    pub wacc: Rate,
    /// FCF growth rate for each explicit forecast year, in order
    pub forecast_growth_rates: Vec<Rate>,
    /// Perpetuity growth rate after the forecast horizon
    pub terminal_growth_rate: Rate,
    /// Explicit forecast horizon; must equal the number of growth rates when given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forecast_years: Option<u32>,
}

/// A single explicit forecast year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastYear {
    pub year: u32,
    pub growth_rate: Rate,
    pub fcf: Money,
    pub discount_factor: Rate,
    pub pv_fcf: Money,
}

/// Explicit-period projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastProjection {
    pub years: Vec<ForecastYear>,
    /// Sum of present values across the forecast period
    pub total_pv: Money,
    /// FCF of the last forecast year, the base of the terminal value
    pub final_fcf: Money,
}

/// Gordon growth terminal value and its present value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalValue {
    pub value: Money,
    /// Discounted from the end of the forecast horizon
    pub present_value: Money,
    pub terminal_growth_rate: Rate,
    pub discount_rate: Rate,
}

/// Steps from forecast to per-share value under one set of assumptions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityValuation {
    pub forecast: ForecastProjection,
    pub terminal: TerminalValue,
    /// PV(forecast) + PV(terminal)
    pub enterprise_value: Money,
    /// Enterprise value less net debt
    pub equity_value: Money,
    pub intrinsic_value_per_share: Money,
}

/// Output of the primary valuation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValuationOutput {
    pub current_price: Money,
    pub net_debt: Money,
    pub fcf_ttm: Money,
    pub ebitda_margin: Rate,
    pub forecast: Vec<ForecastYear>,
    pub pv_of_forecast: Money,
    pub terminal_value: Money,
    pub pv_of_terminal: Money,
    pub enterprise_value: Money,
    pub equity_value: Money,
    pub intrinsic_value_per_share: Money,
    pub margin_of_safety: MarginOfSafety,
    /// PV(terminal) as a fraction of enterprise value
    pub terminal_value_pct: Rate,
    /// Terminal value over final-year EBITDA
    pub implied_exit_multiple: Multiple,
    pub wacc_used: Rate,
    pub terminal_growth_used: Rate,
}

impl Fundamentals {
    pub fn net_debt(&self) -> ValuationResult<Money> {
        self.enterprise_value
            .checked_sub(self.market_cap)
            .ok_or_else(|| overflow("net debt"))
    }

    pub fn fcf_ttm(&self) -> ValuationResult<Money> {
        self.ebitda
            .checked_mul(self.fcf_conversion)
            .ok_or_else(|| overflow("trailing free cash flow"))
    }

    pub fn current_price(&self) -> ValuationResult<Money> {
        self.validate()?;
        self.market_cap
            .checked_div(self.shares_outstanding)
            .ok_or_else(|| overflow("current price"))
    }

    pub fn ebitda_margin(&self) -> ValuationResult<Rate> {
        self.validate()?;
        self.ebitda
            .checked_div(self.revenue)
            .ok_or_else(|| overflow("EBITDA margin"))
    }

    pub fn validate(&self) -> ValuationResult<()> {
        if self.shares_outstanding <= Decimal::ZERO {
            return Err(ValuationError::InvalidInput {
                field: "shares_outstanding".into(),
                reason: "Shares outstanding must be positive".into(),
            });
        }
        if self.revenue <= Decimal::ZERO {
            return Err(ValuationError::InvalidInput {
                field: "revenue".into(),
                reason: "Revenue must be positive".into(),
            });
        }
        if self.fcf_conversion <= Decimal::ZERO || self.fcf_conversion > Decimal::ONE {
            return Err(ValuationError::InvalidInput {
                field: "fcf_conversion".into(),
                reason: "FCF conversion must be in (0, 1]".into(),
            });
        }
        Ok(())
    }
}

impl Assumptions {
    /// Same forecast schedule with a different discount rate and terminal growth.
    pub fn with_rates(&self, wacc: Rate, terminal_growth_rate: Rate) -> Self {
        Assumptions {
            wacc,
            terminal_growth_rate,
            ..self.clone()
        }
    }

    /// Number of explicit forecast years.
    pub fn horizon(&self) -> ValuationResult<u32> {
        let n = u32::try_from(self.forecast_growth_rates.len()).map_err(|_| {
            ValuationError::InvalidInput {
                field: "forecast_growth_rates".into(),
                reason: "Forecast schedule is longer than u32::MAX years".into(),
            }
        })?;
        if n == 0 {
            return Err(ValuationError::InvalidInput {
                field: "forecast_growth_rates".into(),
                reason: "At least one forecast year is required".into(),
            });
        }
        match self.forecast_years {
            Some(years) if years != n => Err(ValuationError::InvalidInput {
                field: "forecast_years".into(),
                reason: format!("Horizon of {years} years does not match {n} growth rates"),
            }),
            _ => Ok(n),
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Compound the FCF base through the growth schedule and discount each year.
pub fn project_forecast(
    fcf_base: Money,
    growth_rates: &[Rate],
    discount_rate: Rate,
) -> ValuationResult<ForecastProjection> {
    if growth_rates.is_empty() {
        return Err(ValuationError::InvalidInput {
            field: "forecast_growth_rates".into(),
            reason: "At least one forecast year is required".into(),
        });
    }

    let mut years = Vec::with_capacity(growth_rates.len());
    let mut fcf = fcf_base;
    let mut total_pv = Decimal::ZERO;

    for (idx, &growth_rate) in growth_rates.iter().enumerate() {
        let year = u32::try_from(idx + 1).map_err(|_| ValuationError::InvalidInput {
            field: "forecast_growth_rates".into(),
            reason: "Forecast schedule is longer than u32::MAX years".into(),
        })?;
        let period = Decimal::from(year);
        fcf = Decimal::ONE
            .checked_add(growth_rate)
            .and_then(|factor| fcf.checked_mul(factor))
            .ok_or_else(|| overflow("forecast free cash flow"))?;
        let pv_fcf = present_value(fcf, discount_rate, period)?;
        total_pv = total_pv
            .checked_add(pv_fcf)
            .ok_or_else(|| overflow("sum of forecast present values"))?;

        log::debug!("forecast year {year}: growth={growth_rate} fcf={fcf} pv={pv_fcf}");

        years.push(ForecastYear {
            year,
            growth_rate,
            fcf,
            discount_factor: discount_factor(discount_rate, period)?,
            pv_fcf,
        });
    }

    Ok(ForecastProjection {
        years,
        total_pv,
        final_fcf: fcf,
    })
}

/// Gordon growth terminal value: `final_fcf * (1 + g) / (r - g)`, discounted
/// back `forecast_years` periods.
pub fn terminal_value(
    final_fcf: Money,
    terminal_growth_rate: Rate,
    discount_rate: Rate,
    forecast_years: u32,
) -> ValuationResult<TerminalValue> {
    if discount_rate <= terminal_growth_rate {
        return Err(ValuationError::DegenerateAssumption {
            discount_rate,
            terminal_growth: terminal_growth_rate,
        });
    }

    let value = discount_rate
        .checked_sub(terminal_growth_rate)
        .and_then(|spread| {
            Decimal::ONE
                .checked_add(terminal_growth_rate)
                .and_then(|factor| final_fcf.checked_mul(factor))
                .and_then(|next_fcf| next_fcf.checked_div(spread))
        })
        .ok_or_else(|| overflow("terminal value"))?;
    let pv = present_value(value, discount_rate, Decimal::from(forecast_years))?;

    Ok(TerminalValue {
        value,
        present_value: pv,
        terminal_growth_rate,
        discount_rate,
    })
}

/// Forecast, terminal value and equity bridge under one set of assumptions.
///
/// The primary valuation and every sensitivity cell go through this function,
/// so only `wacc` and `terminal_growth_rate` differ between them.
pub fn value_equity(
    fundamentals: &Fundamentals,
    assumptions: &Assumptions,
) -> ValuationResult<EquityValuation> {
    fundamentals.validate()?;
    let n_years = assumptions.horizon()?;

    let forecast = project_forecast(
        fundamentals.fcf_ttm()?,
        &assumptions.forecast_growth_rates,
        assumptions.wacc,
    )?;
    let terminal = terminal_value(
        forecast.final_fcf,
        assumptions.terminal_growth_rate,
        assumptions.wacc,
        n_years,
    )?;

    let enterprise_value = forecast
        .total_pv
        .checked_add(terminal.present_value)
        .ok_or_else(|| overflow("enterprise value"))?;
    let equity_value = enterprise_value
        .checked_sub(fundamentals.net_debt()?)
        .ok_or_else(|| overflow("equity value"))?;
    let intrinsic_value_per_share = equity_value
        .checked_div(fundamentals.shares_outstanding)
        .ok_or_else(|| overflow("intrinsic value per share"))?;

    Ok(EquityValuation {
        forecast,
        terminal,
        enterprise_value,
        equity_value,
        intrinsic_value_per_share,
    })
}

/// Run the primary DCF valuation and compare it with the market price.
pub fn valuate(
    fundamentals: &Fundamentals,
    assumptions: &Assumptions,
) -> ValuationResult<ComputationOutput<ValuationOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let current_price = fundamentals.current_price()?;
    let ebitda_margin = fundamentals.ebitda_margin()?;
    let net_debt = fundamentals.net_debt()?;
    let fcf_ttm = fundamentals.fcf_ttm()?;

    let EquityValuation {
        forecast,
        terminal,
        enterprise_value,
        equity_value,
        intrinsic_value_per_share,
    } = value_equity(fundamentals, assumptions)?;

    let margin = margin_of_safety(intrinsic_value_per_share, current_price)?;

    // --- Diagnostics ---
    if let Some(rate) = assumptions
        .forecast_growth_rates
        .iter()
        .find(|&&g| g >= assumptions.wacc)
    {
        warnings.push(format!(
            "Forecast growth rate ({rate}) is at or above WACC ({}); near-term cash flows are not shrinking in present-value terms",
            assumptions.wacc
        ));
    }

    let terminal_value_pct = if enterprise_value.is_zero() {
        Decimal::ZERO
    } else {
        terminal
            .present_value
            .checked_div(enterprise_value)
            .ok_or_else(|| overflow("terminal value share"))?
    };
    if terminal_value_pct > TERMINAL_VALUE_WARNING_PCT {
        warnings.push(format!(
            "Terminal value represents {:.1}% of enterprise value; consider extending the explicit forecast period",
            terminal_value_pct.saturating_mul(dec!(100))
        ));
    }

    if equity_value < Decimal::ZERO {
        warnings.push(format!(
            "Net debt ({net_debt}) exceeds the DCF enterprise value; equity value is negative"
        ));
    }

    // fcf_conversion is validated positive, so final-year EBITDA is well defined
    let implied_exit_multiple = forecast
        .final_fcf
        .checked_div(fundamentals.fcf_conversion)
        .and_then(|final_ebitda| {
            if final_ebitda.is_zero() {
                Some(Decimal::ZERO)
            } else {
                terminal.value.checked_div(final_ebitda)
            }
        })
        .ok_or_else(|| overflow("implied exit multiple"))?;

    for w in &warnings {
        log::warn!("{w}");
    }

    let output = ValuationOutput {
        current_price,
        net_debt,
        fcf_ttm,
        ebitda_margin,
        forecast: forecast.years,
        pv_of_forecast: forecast.total_pv,
        terminal_value: terminal.value,
        pv_of_terminal: terminal.present_value,
        enterprise_value,
        equity_value,
        intrinsic_value_per_share,
        margin_of_safety: margin,
        terminal_value_pct,
        implied_exit_multiple,
        wacc_used: assumptions.wacc,
        terminal_growth_used: assumptions.terminal_growth_rate,
    };

    let elapsed = start.elapsed().as_micros() as u64;

    Ok(with_metadata(
        "2-Stage FCF DCF (Gordon growth terminal value)",
        assumptions,
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
