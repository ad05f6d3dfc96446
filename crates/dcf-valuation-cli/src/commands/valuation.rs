use clap::Args;
use rust_decimal::Decimal;

use dcf_valuation_core::scenarios::sensitivity::{self, SensitivityGrid};
use dcf_valuation_core::valuation::dcf::{self, ValuationOutput};
use dcf_valuation_core::valuation::input::ValuationInput;
use dcf_valuation_core::ComputationOutput;

use crate::input;
use crate::output::report;

/// Arguments shared by the report and sensitivity commands
#[derive(Args, Default)]
#[command(allow_hyphen_values = true)]
pub struct ValuationArgs {
    /// Path to a JSON or YAML valuation input (defaults to the reference company)
    #[arg(long)]
    pub input: Option<String>,

    /// Override the discount rate (e.g. 0.08 for 8%)
    #[arg(long)]
    pub wacc: Option<Decimal>,

    /// Override the terminal growth rate (e.g. 0.025 for 2.5%)
    #[arg(long)]
    pub terminal_growth: Option<Decimal>,
}

/// Everything the full report prints, computed before any output.
pub struct ValuationReport {
    pub input: ValuationInput,
    pub valuation: ComputationOutput<ValuationOutput>,
    pub sensitivity: ComputationOutput<SensitivityGrid>,
}

/// Resolve the input document: `--input` file, then piped stdin, then the
/// built-in reference configuration. Rate overrides are applied last.
pub fn load_input(args: &ValuationArgs) -> Result<ValuationInput, Box<dyn std::error::Error>> {
    let mut valuation_input: ValuationInput = if let Some(ref path) = args.input {
        input::file::read_input(path)?
    } else if let Some(piped) = input::stdin::read_piped_input()? {
        piped
    } else {
        log::info!("no input supplied; using the reference configuration");
        ValuationInput::reference()
    };

    apply_overrides(&mut valuation_input, args);
    Ok(valuation_input)
}

fn apply_overrides(valuation_input: &mut ValuationInput, args: &ValuationArgs) {
    if let Some(wacc) = args.wacc {
        valuation_input.assumptions.wacc = wacc;
    }
    if let Some(g) = args.terminal_growth {
        valuation_input.assumptions.terminal_growth_rate = g;
    }
}

/// Run the primary valuation and the sensitivity grid for one input.
pub fn build_report(
    valuation_input: ValuationInput,
) -> Result<ValuationReport, Box<dyn std::error::Error>> {
    let valuation = dcf::valuate(&valuation_input.fundamentals, &valuation_input.assumptions)?;
    let sensitivity = run_grid(&valuation_input)?;
    Ok(ValuationReport {
        input: valuation_input,
        valuation,
        sensitivity,
    })
}

fn run_grid(
    valuation_input: &ValuationInput,
) -> Result<ComputationOutput<SensitivityGrid>, Box<dyn std::error::Error>> {
    Ok(sensitivity::sensitivity_grid(
        &valuation_input.fundamentals,
        &valuation_input.assumptions,
        &valuation_input.sensitivity.discount_rate_offsets,
        &valuation_input.sensitivity.terminal_growth_offsets,
    )?)
}

pub fn run_report(args: ValuationArgs) -> Result<String, Box<dyn std::error::Error>> {
    let valuation_input = load_input(&args)?;
    let full = build_report(valuation_input)?;
    Ok(report::render_report(&full))
}

pub fn run_sensitivity(args: ValuationArgs) -> Result<String, Box<dyn std::error::Error>> {
    let valuation_input = load_input(&args)?;
    let grid = run_grid(&valuation_input)?;
    Ok(report::render_sensitivity(&valuation_input, &grid))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::fs;
    use tempfile::TempDir;

    const JSON_INPUT: &str = r#"{
        "company": "Json Co",
        "fundamentals": {
            "market_cap": "1000",
            "enterprise_value": "1250",
            "revenue": "400",
            "ebitda": "120",
            "shares_outstanding": "50",
            "fcf_conversion": "0.7"
        },
        "assumptions": {
            "wacc": "0.09",
            "forecast_growth_rates": ["0.06", "0.05", "0.04"],
            "terminal_growth_rate": "0.02"
        }
    }"#;

    const YAML_INPUT: &str = r#"
company: Yaml Co
fundamentals:
  market_cap: "1000"
  enterprise_value: "1250"
  revenue: "400"
  ebitda: "120"
  shares_outstanding: "50"
  fcf_conversion: "0.7"
assumptions:
  wacc: "0.095"
  forecast_growth_rates: ["0.06", "0.05"]
  terminal_growth_rate: "0.025"
"#;

    fn write_file(tmp: &TempDir, name: &str, contents: &str) -> String {
        let path = tmp.path().join(name);
        fs::write(&path, contents).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_load_json_file() {
        let tmp = TempDir::new().unwrap();
        let args = ValuationArgs {
            input: Some(write_file(&tmp, "company.json", JSON_INPUT)),
            ..Default::default()
        };
        let loaded = load_input(&args).unwrap();
        assert_eq!(loaded.company.as_deref(), Some("Json Co"));
        assert_eq!(loaded.assumptions.wacc, dec!(0.09));
        assert_eq!(loaded.assumptions.forecast_growth_rates.len(), 3);
    }

    #[test]
    fn test_load_yaml_file_with_wacc_override() {
        let tmp = TempDir::new().unwrap();
        let args = ValuationArgs {
            input: Some(write_file(&tmp, "company.yaml", YAML_INPUT)),
            wacc: Some(dec!(0.11)),
            terminal_growth: None,
        };
        let loaded = load_input(&args).unwrap();
        assert_eq!(loaded.company.as_deref(), Some("Yaml Co"));
        assert_eq!(loaded.assumptions.wacc, dec!(0.11));
        assert_eq!(loaded.assumptions.terminal_growth_rate, dec!(0.025));
        assert_eq!(loaded.fundamentals.enterprise_value, dec!(1250));
    }

    #[test]
    fn test_malformed_file_names_the_path() {
        let tmp = TempDir::new().unwrap();
        let path = write_file(&tmp, "broken.json", "{ not json");
        let args = ValuationArgs {
            input: Some(path),
            ..Default::default()
        };
        let err = load_input(&args).unwrap_err();
        assert!(err.to_string().contains("broken.json"));
    }

    #[test]
    fn test_extreme_override_is_an_error_not_a_crash() {
        let mut valuation_input = ValuationInput::reference();
        let args = ValuationArgs {
            input: None,
            wacc: Some(dec!(0.0300000000000000000000000001)),
            terminal_growth: Some(dec!(0.03)),
        };
        apply_overrides(&mut valuation_input, &args);
        let err = build_report(valuation_input).err().unwrap();
        assert!(err.to_string().contains("overflow"));
    }

    #[test]
    fn test_overrides_replace_rates_only() {
        let mut valuation_input = ValuationInput::reference();
        let args = ValuationArgs {
            input: None,
            wacc: Some(dec!(0.09)),
            terminal_growth: Some(dec!(0.02)),
        };
        apply_overrides(&mut valuation_input, &args);
        assert_eq!(valuation_input.assumptions.wacc, dec!(0.09));
        assert_eq!(valuation_input.assumptions.terminal_growth_rate, dec!(0.02));
        assert_eq!(valuation_input.assumptions.forecast_growth_rates.len(), 5);
    }

    #[test]
    fn test_no_overrides_keeps_input() {
        let mut valuation_input = ValuationInput::reference();
        apply_overrides(&mut valuation_input, &ValuationArgs::default());
        assert_eq!(valuation_input.assumptions.wacc, dec!(0.075));
        assert_eq!(valuation_input.assumptions.terminal_growth_rate, dec!(0.03));
    }

    #[test]
    fn test_build_report_for_reference() {
        let full = build_report(ValuationInput::reference()).unwrap();
        let (r, c) = full.sensitivity.result.base_case_position.unwrap();
        assert_eq!(
            full.sensitivity.result.matrix[r][c],
            full.valuation.result.intrinsic_value_per_share
        );
    }

    #[test]
    fn test_degenerate_override_fails_before_rendering() {
        let mut valuation_input = ValuationInput::reference();
        valuation_input.assumptions.terminal_growth_rate = dec!(0.08);
        let err = build_report(valuation_input).err().unwrap();
        assert!(err.to_string().contains("Degenerate assumption"));
    }
}
