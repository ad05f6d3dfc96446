use colored::Colorize;
use std::fmt::Write;
use tabled::{builder::Builder, Table};

use dcf_valuation_core::scenarios::sensitivity::SensitivityGrid;
use dcf_valuation_core::valuation::input::ValuationInput;
use dcf_valuation_core::valuation::margin::Verdict;
use dcf_valuation_core::ComputationOutput;

use super::format::{money_bn, pct, pct_points, per_share, shares_mm};
use crate::commands::valuation::ValuationReport;

fn section(out: &mut String, title: &str) {
    let _ = writeln!(out, "\n{}", title.bold());
}

fn heading(input: &ValuationInput) -> String {
    let name = input.company.as_deref().unwrap_or("Reference company");
    match input.as_of {
        Some(date) => format!("DCF Valuation: {name} (as of {date})"),
        None => format!("DCF Valuation: {name}"),
    }
}

fn field_table(rows: Vec<(&str, String)>) -> Table {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in rows {
        builder.push_record([key.to_string(), val]);
    }
    Table::from(builder)
}

/// Render the full human-readable valuation report.
pub fn render_report(report: &ValuationReport) -> String {
    let input = &report.input;
    let f = &input.fundamentals;
    let a = &input.assumptions;
    let v = &report.valuation.result;
    let sym = input.currency.symbol();
    let mut out = String::new();

    let _ = writeln!(out, "{}", heading(input).bold().underline());

    // --- Inputs ---
    section(&mut out, "Inputs");
    let inputs = field_table(vec![
        ("Current price", per_share(v.current_price, &sym)),
        ("Market cap", money_bn(f.market_cap, &sym)),
        ("Enterprise value", money_bn(f.enterprise_value, &sym)),
        ("Revenue (TTM)", money_bn(f.revenue, &sym)),
        ("EBITDA (TTM)", money_bn(f.ebitda, &sym)),
        ("EBITDA margin", pct(v.ebitda_margin)),
        ("FCF (TTM)", money_bn(v.fcf_ttm, &sym)),
        ("Net debt", money_bn(v.net_debt, &sym)),
        ("Shares outstanding", shares_mm(f.shares_outstanding)),
        ("WACC", pct(a.wacc)),
        ("Terminal growth", pct(a.terminal_growth_rate)),
    ]);
    let _ = writeln!(out, "{inputs}");

    // --- Forecast ---
    section(&mut out, "Free cash flow forecast");
    let mut builder = Builder::default();
    builder.push_record(["Year", "Growth", "FCF", "PV"]);
    for year in &v.forecast {
        builder.push_record([
            year.year.to_string(),
            pct(year.growth_rate),
            money_bn(year.fcf, &sym),
            money_bn(year.pv_fcf, &sym),
        ]);
    }
    let _ = writeln!(out, "{}", Table::from(builder));
    let _ = writeln!(
        out,
        "PV of forecast cash flows: {}",
        money_bn(v.pv_of_forecast, &sym)
    );

    // --- Terminal value ---
    section(&mut out, "Terminal value");
    let _ = writeln!(out, "Terminal value: {}", money_bn(v.terminal_value, &sym));
    let _ = writeln!(
        out,
        "PV of terminal value: {} ({} of enterprise value)",
        money_bn(v.pv_of_terminal, &sym),
        pct(v.terminal_value_pct)
    );
    let _ = writeln!(
        out,
        "Implied EV/EBITDA exit multiple: {:.1}x",
        v.implied_exit_multiple.round_dp(1)
    );

    // --- Summary ---
    section(&mut out, "Valuation summary");
    let summary = field_table(vec![
        ("Enterprise value (DCF)", money_bn(v.enterprise_value, &sym)),
        ("Less: net debt", money_bn(v.net_debt, &sym)),
        ("Equity value", money_bn(v.equity_value, &sym)),
        (
            "Intrinsic value per share",
            per_share(v.intrinsic_value_per_share, &sym),
        ),
        ("Current price", per_share(v.current_price, &sym)),
    ]);
    let _ = writeln!(out, "{summary}");

    let mos = &v.margin_of_safety;
    let verdict = match mos.verdict {
        Verdict::Undervalued => mos.verdict.to_string().green().bold(),
        Verdict::Overvalued => mos.verdict.to_string().red().bold(),
    };
    let _ = writeln!(
        out,
        "Margin of safety: {} ({verdict})",
        pct_points(mos.margin_pct)
    );

    // --- Sensitivity ---
    section(&mut out, "Sensitivity: intrinsic value per share");
    let _ = writeln!(out, "{}", sensitivity_table(&report.sensitivity.result, &sym));

    // --- Conclusion ---
    section(&mut out, "Conclusion");
    let _ = writeln!(out, "{}", mos.band.conclusion());

    write_footer(&mut out, &report.valuation, &report.sensitivity);
    out
}

/// Render only the sensitivity grid.
pub fn render_sensitivity(
    input: &ValuationInput,
    grid: &ComputationOutput<SensitivityGrid>,
) -> String {
    let sym = input.currency.symbol();
    let mut out = String::new();
    let _ = writeln!(out, "{}", heading(input).bold().underline());
    section(&mut out, "Sensitivity: intrinsic value per share");
    let _ = writeln!(out, "{}", sensitivity_table(&grid.result, &sym));
    if !grid.warnings.is_empty() {
        let _ = writeln!(out, "\nWarnings:");
        for w in &grid.warnings {
            let _ = writeln!(out, "  - {w}");
        }
    }
    let _ = writeln!(out, "\nMethodology: {}", grid.methodology);
    out
}

/// Growth rows by WACC columns; the base case cell is bracketed.
fn sensitivity_table(grid: &SensitivityGrid, sym: &str) -> Table {
    let mut builder = Builder::default();
    let mut header = vec!["g \\ WACC".to_string()];
    header.extend(grid.discount_rates.iter().map(|r| pct(*r)));
    builder.push_record(header);

    for (i, (growth, row)) in grid
        .terminal_growth_rates
        .iter()
        .zip(grid.matrix.iter())
        .enumerate()
    {
        let mut record = vec![pct(*growth)];
        for (j, value) in row.iter().enumerate() {
            let cell = per_share(*value, sym);
            if grid.base_case_position == Some((i, j)) {
                record.push(format!("[{cell}]"));
            } else {
                record.push(cell);
            }
        }
        builder.push_record(record);
    }
    Table::from(builder)
}

fn write_footer<A, B>(out: &mut String, valuation: &ComputationOutput<A>, grid: &ComputationOutput<B>)
where
    A: serde::Serialize,
    B: serde::Serialize,
{
    let warnings: Vec<&String> = valuation.warnings.iter().chain(grid.warnings.iter()).collect();
    if !warnings.is_empty() {
        let _ = writeln!(out, "\nWarnings:");
        for w in warnings {
            let _ = writeln!(out, "  - {w}");
        }
    }
    let _ = writeln!(out, "\nMethodology: {}", valuation.methodology);
}
