use crate::grid::PriceGrid;
use crate::model::{Bound, RankedCandidate};
use anyhow::{anyhow, Result};
use comfy_table::{presets::UTF8_BORDERS_ONLY, Cell, Table};
use csv::Writer;
use std::fs::File;
use std::path::Path;
use tracing::info;

pub fn print_table(candidates: &[RankedCandidate], limit: usize) -> Result<()> {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec![
        "#",
        "Strategy",
        "Strikes",
        "Qty",
        "Cost ($)",
        "Max Profit ($)",
        "Max Loss ($)",
        "Breakeven",
        "Avg Return",
        "P(profit)",
        "Score",
    ]);

    for (rank, candidate) in candidates.iter().take(limit).enumerate() {
        let definition = &candidate.definition;
        let result = &candidate.result;
        table.add_row(vec![
            Cell::new(rank + 1),
            Cell::new(definition.kind().to_string()),
            Cell::new(format_strikes(&definition.strikes())),
            Cell::new(definition.quantity),
            Cell::new(format_money(result.cost)),
            Cell::new(format_bound(result.max_profit)),
            Cell::new(format_bound(result.max_loss)),
            Cell::new(result.breakeven.to_string()),
            Cell::new(format_ratio(result.avg_return)),
            Cell::new(format_ratio(result.profit_probability)),
            Cell::new(format_ratio(candidate.score)),
        ]);
    }

    println!("{}", table);
    Ok(())
}

pub fn export_csv<P: AsRef<Path>>(candidates: &[RankedCandidate], path: P) -> Result<()> {
    let path = path.as_ref();
    let mut writer = Writer::from_writer(File::create(path)?);
    writer.write_record([
        "rank",
        "strategy",
        "strikes",
        "quantity",
        "fees",
        "cost",
        "max_profit",
        "max_loss",
        "breakeven",
        "avg_return",
        "profit_probability",
        "score",
    ])?;
    for (rank, candidate) in candidates.iter().enumerate() {
        let definition = &candidate.definition;
        let result = &candidate.result;
        writer.write_record([
            (rank + 1).to_string(),
            definition.kind().to_string(),
            format_strikes(&definition.strikes()),
            definition.quantity.to_string(),
            definition.fees.to_string(),
            result.cost.to_string(),
            result.max_profit.to_string(),
            result.max_loss.to_string(),
            result
                .breakeven
                .points()
                .iter()
                .map(|p| p.to_string())
                .collect::<Vec<_>>()
                .join("/"),
            optional(result.avg_return),
            optional(result.profit_probability),
            optional(candidate.score),
        ])?;
    }
    writer.flush()?;
    info!(target: "export.csv", path = %path.display(), rows = candidates.len(), "wrote candidates to disk");
    Ok(())
}

/// Price and PnL columns, thinned to at most `rows` evenly spaced lines.
pub fn print_curve(grid: &PriceGrid, pnl: &[f64], rows: usize) -> Result<()> {
    if grid.len() != pnl.len() {
        return Err(anyhow!(
            "curve has {} points for a {} point grid",
            pnl.len(),
            grid.len()
        ));
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Price", "PnL ($)"]);
    let stride = (grid.len() + rows.max(1) - 1) / rows.max(1);
    for (price, value) in grid.iter().zip(pnl).step_by(stride.max(1)) {
        table.add_row(vec![Cell::new(format!("{price:.2}")), Cell::new(format_money(*value))]);
    }
    println!("{}", table);
    Ok(())
}

pub fn export_curve<P: AsRef<Path>>(grid: &PriceGrid, pnl: &[f64], path: P) -> Result<()> {
    let path = path.as_ref();
    let mut writer = Writer::from_writer(File::create(path)?);
    writer.write_record(["price", "pnl"])?;
    for (price, value) in grid.iter().zip(pnl) {
        writer.write_record([price.to_string(), value.to_string()])?;
    }
    writer.flush()?;
    info!(target: "export.csv", path = %path.display(), rows = pnl.len(), "wrote curve to disk");
    Ok(())
}

fn format_strikes(strikes: &[f64]) -> String {
    strikes
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join("/")
}

fn format_money(value: f64) -> String {
    format!("{value:.2}")
}

fn format_bound(bound: Bound) -> String {
    match bound {
        Bound::Finite(value) => format_money(value),
        Bound::Unbounded => "unbounded".to_string(),
    }
}

fn format_ratio(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.4}"))
}

fn optional(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}
