use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::types::{Currency, Rate};
use crate::ValuationResult;

use super::dcf::{Assumptions, Fundamentals};

/// Additive shifts applied to the base discount rate and terminal growth
/// rate when building the sensitivity grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityOffsets {
    /// Column shifts applied to WACC, in display order
    #[serde(default = "default_offsets")]
    pub discount_rate_offsets: Vec<Rate>,
    /// Row shifts applied to terminal growth, in display order
    #[serde(default = "default_offsets")]
    pub terminal_growth_offsets: Vec<Rate>,
}

impl Default for SensitivityOffsets {
    fn default() -> Self {
        SensitivityOffsets {
            discount_rate_offsets: default_offsets(),
            terminal_growth_offsets: default_offsets(),
        }
    }
}

fn default_offsets() -> Vec<Rate> {
    vec![dec!(-0.01), dec!(-0.005), Decimal::ZERO, dec!(0.005), dec!(0.01)]
}

/// Complete input document for one valuation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValuationInput {
    /// Display name of the company
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    /// Reporting currency
    #[serde(default)]
    pub currency: Currency,
    /// Date the fundamentals were taken
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub as_of: Option<NaiveDate>,
    pub fundamentals: Fundamentals,
    pub assumptions: Assumptions,
    #[serde(default)]
    pub sensitivity: SensitivityOffsets,
}

impl ValuationInput {
    /// Deserialise an input document from an already parsed JSON value.
    pub fn from_value(value: serde_json::Value) -> ValuationResult<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Built-in reference configuration used when no input is supplied.
    pub fn reference() -> Self {
        ValuationInput {
            company: None,
            currency: Currency::USD,
            as_of: None,
            fundamentals: Fundamentals {
                market_cap: dec!(102580000000),
                enterprise_value: dec!(144530000000),
                revenue: dec!(10130000000),
                ebitda: dec!(6640000000),
                shares_outstanding: dec!(467460000),
                fcf_conversion: dec!(0.73),
            },
            assumptions: Assumptions {
                wacc: dec!(0.075),
                forecast_growth_rates: vec![
                    dec!(0.085),
                    dec!(0.08),
                    dec!(0.075),
                    dec!(0.07),
                    dec!(0.065),
                ],
                terminal_growth_rate: dec!(0.03),
                forecast_years: Some(5),
            },
            sensitivity: SensitivityOffsets::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_input() {
        let input = ValuationInput::reference();
        assert_eq!(input.assumptions.horizon().unwrap(), 5);
        assert_eq!(input.fundamentals.net_debt().unwrap(), dec!(41950000000));
        assert_eq!(input.sensitivity.discount_rate_offsets.len(), 5);
        assert_eq!(input.sensitivity.terminal_growth_offsets.len(), 5);
    }

    #[test]
    fn test_deserialize_minimal_json() {
        let json = serde_json::json!({
            "fundamentals": {
                "market_cap": "1000",
                "enterprise_value": "1200",
                "revenue": "500",
                "ebitda": "150",
                "shares_outstanding": "10",
                "fcf_conversion": "0.7"
            },
            "assumptions": {
                "wacc": "0.09",
                "forecast_growth_rates": ["0.05", "0.04"],
                "terminal_growth_rate": "0.02"
            }
        });
        let input: ValuationInput = serde_json::from_value(json).unwrap();
        assert_eq!(input.currency, Currency::USD);
        assert!(input.company.is_none());
        assert!(input.as_of.is_none());
        assert!(input.assumptions.forecast_years.is_none());
        assert_eq!(input.sensitivity, SensitivityOffsets::default());
        assert_eq!(input.fundamentals.fcf_conversion, dec!(0.7));
    }

    #[test]
    fn test_from_value_reports_serialization_error() {
        let err = ValuationInput::from_value(serde_json::json!({ "fundamentals": {} })).unwrap_err();
        assert!(matches!(err, crate::ValuationError::SerializationError(_)));
    }

    #[test]
    fn test_deserialize_custom_offsets_and_date() {
        let json = serde_json::json!({
            "company": "Example Co",
            "currency": "EUR",
            "as_of": "2024-06-30",
            "fundamentals": {
                "market_cap": "1000",
                "enterprise_value": "1200",
                "revenue": "500",
                "ebitda": "150",
                "shares_outstanding": "10",
                "fcf_conversion": "0.7"
            },
            "assumptions": {
                "wacc": "0.09",
                "forecast_growth_rates": ["0.05"],
                "terminal_growth_rate": "0.02"
            },
            "sensitivity": {
                "discount_rate_offsets": ["0.01", "-0.01"]
            }
        });
        let input: ValuationInput = serde_json::from_value(json).unwrap();
        assert_eq!(input.company.as_deref(), Some("Example Co"));
        assert_eq!(input.currency, Currency::EUR);
        assert_eq!(input.as_of, NaiveDate::from_ymd_opt(2024, 6, 30));
        assert_eq!(
            input.sensitivity.discount_rate_offsets,
            vec![dec!(0.01), dec!(-0.01)]
        );
        assert_eq!(input.sensitivity.terminal_growth_offsets.len(), 5);
    }
}
