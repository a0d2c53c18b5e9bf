//! Result tables and reports.
//!
//! Renders the per-offset numeric tables, the cross-sectional summary,
//! and the batch error report for terminal display, and serializes
//! results to JSON. Purely presentational; every number comes straight
//! from the result types.

use crate::error::Result;
use crate::multiple::{CarDistribution, EventError, MultipleEventResult};
use crate::single::SingleEventResult;
use colored::Colorize;
use serde::Serialize;
use tabled::{builder::Builder, settings::Style};

/// Per-offset table for a single event: AR, CAR, variances, t-stat,
/// p-value. The CAR column carries significance asterisks.
pub fn single_results_table(result: &SingleEventResult) -> String {
    let mut builder = Builder::new();
    builder.push_record([
        "T", "AR", "Var AR", "CAR", "Var CAR", "T-stat", "P-value",
    ]);

    for (i, offset) in result.offsets.iter().enumerate() {
        builder.push_record([
            offset.to_string(),
            format!("{:.4}", result.ar[i]),
            format!("{:.6}", result.var_ar[i]),
            format!("{:.4} {}", result.car[i], result.significance[i].marks()),
            format!("{:.6}", result.var_car[i]),
            format!("{:.2}", result.t_stat[i]),
            format!("{:.3}", result.p_value[i]),
        ]);
    }

    builder.build().with(Style::rounded()).to_string()
}

/// Per-offset table for a batch: AAR, CAAR, variances, t-stat, p-value.
/// The CAAR column carries significance asterisks.
pub fn multiple_results_table(result: &MultipleEventResult) -> String {
    let mut builder = Builder::new();
    builder.push_record([
        "T", "AAR", "Var AAR", "CAAR", "Var CAAR", "T-stat", "P-value",
    ]);

    for (i, offset) in result.offsets.iter().enumerate() {
        builder.push_record([
            offset.to_string(),
            format!("{:.4}", result.aar[i]),
            format!("{:.6}", result.var_aar[i]),
            format!("{:.4} {}", result.caar[i], result.significance[i].marks()),
            format!("{:.6}", result.var_caar[i]),
            format!("{:.2}", result.t_stat[i]),
            format!("{:.3}", result.p_value[i]),
        ]);
    }

    builder.build().with(Style::rounded()).to_string()
}

/// Per-offset CAR distribution table.
pub fn distribution_table(rows: &[CarDistribution]) -> String {
    let mut builder = Builder::new();
    builder.push_record([
        "T", "Mean", "Variance", "Kurtosis", "Min", "Q25", "Median", "Q75", "Max",
    ]);

    for row in rows {
        builder.push_record([
            row.offset.to_string(),
            format!("{:.4}", row.mean),
            format!("{:.6}", row.variance),
            format!("{:.3}", row.kurtosis),
            format!("{:.4}", row.min),
            format!("{:.4}", row.quantile_25),
            format!("{:.4}", row.median),
            format!("{:.4}", row.quantile_75),
            format!("{:.4}", row.max),
        ]);
    }

    builder.build().with(Style::rounded()).to_string()
}

/// Textual report of every event excluded from aggregation.
pub fn error_report(errors: &[EventError]) -> String {
    if errors.is_empty() {
        return "No errors.".to_string();
    }

    let mut builder = Builder::new();
    builder.push_record(["#", "Error", "Ticker", "Date", "Description"]);
    for error in errors {
        builder.push_record([
            error.index.to_string(),
            error.kind.to_string(),
            error.security_ticker.clone(),
            error
                .event_date
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string()),
            error.message.clone(),
        ]);
    }

    let count = if errors.len() == 1 {
        "1 event was".to_string()
    } else {
        format!("{} events were", errors.len())
    };
    format!(
        "{} excluded from aggregation; the other events are unaffected.\n{}",
        count,
        builder.build().with(Style::rounded())
    )
}

/// Print a batch summary to stdout.
pub fn print_summary(result: &MultipleEventResult) {
    println!();
    println!("{}", "═".repeat(60).blue());
    println!("{}", " EVENT STUDY RESULTS ".bold().blue());
    println!("{}", "═".repeat(60).blue());
    println!();

    println!("{}", "Sample".bold().underline());
    println!("  Events:          {:>8}", result.surviving() + result.errors.len());
    println!("  Surviving:       {:>8}", result.surviving());
    println!("  Excluded:        {:>8}", result.errors.len());
    println!(
        "  Event window:    {:>8}",
        format!(
            "[{}, {}]",
            result.offsets.first().copied().unwrap_or(0),
            result.offsets.last().copied().unwrap_or(0)
        )
    );
    println!();

    let last = result.offsets.len() - 1;
    println!("{}", "Full-window CAAR".bold().underline());
    println!(
        "  CAAR:            {:>8.4} {}",
        result.caar[last],
        result.significance[last].marks()
    );
    println!("  T-stat:          {:>8.2}", result.t_stat[last]);
    println!("  P-value:         {:>8.3}", result.p_value[last]);
    println!();
    println!("{}", multiple_results_table(result));
    if !result.errors.is_empty() {
        println!("{}", error_report(&result.errors).yellow());
    }
    println!("{}", "═".repeat(60).blue());
}

/// Serialize any result type to pretty JSON.
pub fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}
