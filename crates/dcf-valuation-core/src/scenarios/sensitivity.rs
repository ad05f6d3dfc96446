use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::{overflow, ValuationError};
use crate::types::*;
use crate::valuation::dcf::{value_equity, Assumptions, Fundamentals};
use crate::ValuationResult;

/// Intrinsic value per share across terminal growth (rows) and discount
/// rate (columns) variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityGrid {
    /// Row labels: absolute terminal growth rates, in offset order
    pub terminal_growth_rates: Vec<Rate>,
    /// Column labels: absolute discount rates, in offset order
    pub discount_rates: Vec<Rate>,
    /// Matrix[i][j] = value per share at terminal_growth_rates[i], discount_rates[j]
    pub matrix: Vec<Vec<Money>>,
    /// Cell where both offsets are zero, if the grid contains one
    pub base_case_position: Option<(usize, usize)>,
}

/// Evaluate `eval_fn(row_value, col_value)` over every cell of a 2-way grid.
///
/// Cells are independent. The first failing cell aborts the whole grid.
pub fn evaluate_grid<F>(
    row_values: &[Decimal],
    col_values: &[Decimal],
    eval_fn: F,
) -> ValuationResult<Vec<Vec<Decimal>>>
where
    F: Fn(Decimal, Decimal) -> ValuationResult<Decimal>,
{
    let mut matrix = Vec::with_capacity(row_values.len());
    for &row in row_values {
        let mut cells = Vec::with_capacity(col_values.len());
        for &col in col_values {
            cells.push(eval_fn(row, col)?);
        }
        matrix.push(cells);
    }
    Ok(matrix)
}

fn zero_index(offsets: &[Rate]) -> Option<usize> {
    offsets.iter().position(|o| o.is_zero())
}

fn require_offsets(field: &str, offsets: &[Rate]) -> ValuationResult<()> {
    if offsets.is_empty() {
        return Err(ValuationError::InvalidInput {
            field: field.into(),
            reason: "At least one offset is required".into(),
        });
    }
    Ok(())
}

fn shifted(base: Rate, offsets: &[Rate]) -> ValuationResult<Vec<Rate>> {
    offsets
        .iter()
        .map(|&o| {
            base.checked_add(o)
                .ok_or_else(|| overflow("sensitivity rate offset"))
        })
        .collect()
}

/// Recompute intrinsic value per share for every (terminal growth offset,
/// discount rate offset) pair.
///
/// Only WACC and terminal growth move; the forecast schedule and FCF base
/// are those of `base`. Rows and columns follow the order of the offsets.
pub fn sensitivity_grid(
    fundamentals: &Fundamentals,
    base: &Assumptions,
    discount_rate_offsets: &[Rate],
    growth_rate_offsets: &[Rate],
) -> ValuationResult<ComputationOutput<SensitivityGrid>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    require_offsets("discount_rate_offsets", discount_rate_offsets)?;
    require_offsets("terminal_growth_offsets", growth_rate_offsets)?;

    let terminal_growth_rates = shifted(base.terminal_growth_rate, growth_rate_offsets)?;
    let discount_rates = shifted(base.wacc, discount_rate_offsets)?;

    let matrix = evaluate_grid(&terminal_growth_rates, &discount_rates, |growth, wacc| {
        let cell = value_equity(fundamentals, &base.with_rates(wacc, growth))?;
        log::debug!(
            "sensitivity cell g={growth} wacc={wacc}: {}",
            cell.intrinsic_value_per_share
        );
        Ok(cell.intrinsic_value_per_share)
    })?;

    let base_case_position =
        zero_index(growth_rate_offsets).zip(zero_index(discount_rate_offsets));
    if base_case_position.is_none() {
        warnings.push("Offsets contain no zero entry; the base case is not on the grid".into());
    }
    for w in &warnings {
        log::warn!("{w}");
    }

    let output = SensitivityGrid {
        terminal_growth_rates,
        discount_rates,
        matrix,
        base_case_position,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "2-Way Sensitivity: Terminal Growth x WACC",
        &serde_json::json!({
            "wacc": base.wacc,
            "terminal_growth_rate": base.terminal_growth_rate,
            "discount_rate_offsets": discount_rate_offsets,
            "terminal_growth_offsets": growth_rate_offsets,
        }),
        warnings,
        elapsed,
        output,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::valuation::dcf::valuate;
    use rust_decimal_macros::dec;

    fn sample_fundamentals() -> Fundamentals {
        Fundamentals {
            market_cap: dec!(5000),
            enterprise_value: dec!(6000),
            revenue: dec!(2000),
            ebitda: dec!(600),
            shares_outstanding: dec!(100),
            fcf_conversion: dec!(0.75),
        }
    }

    fn sample_assumptions() -> Assumptions {
        Assumptions {
            wacc: dec!(0.09),
            forecast_growth_rates: vec![dec!(0.06), dec!(0.05), dec!(0.04)],
            terminal_growth_rate: dec!(0.025),
            forecast_years: None,
        }
    }

    fn offsets() -> Vec<Rate> {
        vec![dec!(-0.01), dec!(-0.005), dec!(0), dec!(0.005), dec!(0.01)]
    }

    #[test]
    fn test_evaluate_grid() {
        // Simple model: output = 1000 / (v1 - v2)
        let rows = [dec!(0.08), dec!(0.09), dec!(0.10)];
        let cols = [dec!(0.01), dec!(0.02)];
        let matrix = evaluate_grid(&rows, &cols, |a, b| {
            let spread = a - b;
            if spread.is_zero() {
                return Err(ValuationError::DivisionByZero {
                    context: "test model".into(),
                });
            }
            Ok(dec!(1000) / spread)
        })
        .unwrap();

        assert_eq!(matrix.len(), 3);
        assert_eq!(matrix[0].len(), 2);
        assert_eq!(matrix[0][0], dec!(1000) / dec!(0.07));
        for i in 0..matrix.len() - 1 {
            assert!(matrix[i][0] > matrix[i + 1][0]);
        }
    }

    #[test]
    fn test_evaluate_grid_fails_fast() {
        let result = evaluate_grid(&[dec!(1), dec!(2)], &[dec!(1)], |a, b| {
            if a == b {
                Err(ValuationError::DivisionByZero {
                    context: "test model".into(),
                })
            } else {
                Ok(a - b)
            }
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_grid_shape_and_labels() {
        let out = sensitivity_grid(
            &sample_fundamentals(),
            &sample_assumptions(),
            &offsets(),
            &offsets(),
        )
        .unwrap();
        let grid = &out.result;

        assert_eq!(grid.matrix.len(), 5);
        assert!(grid.matrix.iter().all(|row| row.len() == 5));
        assert_eq!(grid.discount_rates[0], dec!(0.08));
        assert_eq!(grid.discount_rates[4], dec!(0.10));
        assert_eq!(grid.terminal_growth_rates[0], dec!(0.015));
        assert_eq!(grid.terminal_growth_rates[4], dec!(0.035));
        assert_eq!(grid.base_case_position, Some((2, 2)));
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_grid_monotonic() {
        let out = sensitivity_grid(
            &sample_fundamentals(),
            &sample_assumptions(),
            &offsets(),
            &offsets(),
        )
        .unwrap();
        let m = &out.result.matrix;

        // Higher terminal growth => higher value (fixed WACC)
        for j in 0..5 {
            for i in 0..4 {
                assert!(m[i][j] < m[i + 1][j]);
            }
        }
        // Higher WACC => lower value (fixed growth)
        for row in m {
            for j in 0..4 {
                assert!(row[j] > row[j + 1]);
            }
        }
    }

    #[test]
    fn test_base_cell_matches_primary_valuation() {
        let f = sample_fundamentals();
        let a = sample_assumptions();
        let primary = valuate(&f, &a).unwrap();
        let out = sensitivity_grid(&f, &a, &offsets(), &offsets()).unwrap();
        let (r, c) = out.result.base_case_position.unwrap();
        let diff = out.result.matrix[r][c] - primary.result.intrinsic_value_per_share;
        assert!(diff.abs() < dec!(0.0000001));
    }

    #[test]
    fn test_unsorted_offsets_keep_order() {
        let f = sample_fundamentals();
        let a = sample_assumptions();
        let discount = [dec!(0.01), dec!(0), dec!(-0.01)];
        let growth = [dec!(0.005), dec!(-0.005)];
        let out = sensitivity_grid(&f, &a, &discount, &growth).unwrap();
        let grid = &out.result;

        assert_eq!(
            grid.discount_rates,
            vec![dec!(0.10), dec!(0.09), dec!(0.08)]
        );
        assert_eq!(grid.terminal_growth_rates, vec![dec!(0.030), dec!(0.020)]);
        assert_eq!(grid.matrix.len(), 2);
        assert_eq!(grid.matrix[0].len(), 3);
        // Descending discount rates => ascending values along each row
        assert!(grid.matrix[0][0] < grid.matrix[0][2]);
        // First row has the higher growth
        assert!(grid.matrix[0][1] > grid.matrix[1][1]);
        assert_eq!(grid.base_case_position, None);
        assert_eq!(out.warnings.len(), 1);
    }

    #[test]
    fn test_degenerate_cell_fails_grid() {
        let f = sample_fundamentals();
        let a = sample_assumptions();
        // 0.025 + 0.06 = 0.085 >= 0.09 - 0.01 = 0.08
        let result = sensitivity_grid(&f, &a, &[dec!(-0.01)], &[dec!(0.06)]);
        assert!(matches!(
            result,
            Err(ValuationError::DegenerateAssumption { .. })
        ));
    }

    #[test]
    fn test_empty_offsets_rejected() {
        let f = sample_fundamentals();
        let a = sample_assumptions();
        assert!(matches!(
            sensitivity_grid(&f, &a, &[], &offsets()),
            Err(ValuationError::InvalidInput { .. })
        ));
        assert!(sensitivity_grid(&f, &a, &offsets(), &[]).is_err());
    }

    #[test]
    fn test_grid_does_not_touch_base_assumptions() {
        let f = sample_fundamentals();
        let a = sample_assumptions();
        let _ = sensitivity_grid(&f, &a, &offsets(), &offsets()).unwrap();
        assert_eq!(a.wacc, dec!(0.09));
        assert_eq!(a.terminal_growth_rate, dec!(0.025));
    }
}
