mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::process;

use commands::valuation::ValuationArgs;

/// Single-company discounted cash flow valuation
#[derive(Parser)]
#[command(
    name = "dcf",
    version,
    about = "Single-company discounted cash flow valuation",
    long_about = "Values a company from its trailing fundamentals with a two-stage \
                  free-cash-flow DCF and a Gordon growth terminal value, then reports \
                  intrinsic value per share, margin of safety and a WACC x terminal \
                  growth sensitivity grid. Runs the built-in reference company when \
                  no input is supplied."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the full valuation report
    Report(ValuationArgs),
    /// Print only the WACC x terminal growth sensitivity grid
    Sensitivity(ValuationArgs),
    /// Print version information
    Version,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result: Result<String, Box<dyn std::error::Error>> = match cli.command {
        Commands::Report(args) => commands::valuation::run_report(args),
        Commands::Sensitivity(args) => commands::valuation::run_sensitivity(args),
        Commands::Version => {
            println!("dcf {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(rendered) => {
            print!("{rendered}");
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
