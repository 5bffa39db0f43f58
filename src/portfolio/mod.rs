use crate::grid::PriceGrid;
use crate::model::{EvaluationResult, StockPosition, StrategyDefinition, StrategyError};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use tracing::{debug, info};

/// A book of strategies and loose stock holdings, as read from a portfolio file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PortfolioFile {
    #[serde(default)]
    pub strategies: Vec<StrategyDefinition>,
    #[serde(default)]
    pub positions: Vec<StockPosition>,
}

impl PortfolioFile {
    pub fn from_json_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("opening {path:?}"))?;
        let book: PortfolioFile = serde_json::from_reader(file)
            .with_context(|| format!("parsing portfolio json {path:?}"))?;
        info!(
            target: "portfolio",
            strategies = book.strategies.len(),
            positions = book.positions.len(),
            "loaded portfolio"
        );
        Ok(book)
    }
}

/// Elementwise sum of every strategy curve plus `(p - cost_basis) * shares` for each
/// stock position. Nothing to add yields a flat zero curve.
pub fn aggregate(
    results: &[EvaluationResult],
    positions: &[StockPosition],
    grid: &PriceGrid,
) -> Result<Vec<f64>, StrategyError> {
    let mut total = vec![0.0; grid.len()];
    for result in results {
        if result.pnl.len() != grid.len() {
            return Err(StrategyError::GridMismatch {
                expected: grid.len(),
                found: result.pnl.len(),
            });
        }
        for (acc, value) in total.iter_mut().zip(&result.pnl) {
            *acc += value;
        }
    }
    for position in positions {
        let shares = position.shares as f64;
        for (acc, price) in total.iter_mut().zip(grid.iter()) {
            *acc += (price - position.cost_basis) * shares;
        }
    }
    debug!(
        target: "portfolio",
        strategies = results.len(),
        positions = positions.len(),
        points = total.len(),
        "aggregated curve"
    );
    Ok(total)
}

/// Prices where the curve crosses zero, linearly interpolated between grid points.
/// A grid point sitting exactly on zero is reported once, at the start of a flat run.
pub fn crossings(grid: &PriceGrid, pnl: &[f64]) -> Vec<f64> {
    let n = grid.len().min(pnl.len());
    let mut points = Vec::new();
    for i in 0..n {
        if pnl[i] == 0.0 {
            if i == 0 || pnl[i - 1] != 0.0 {
                points.push(grid[i]);
            }
            continue;
        }
        if i + 1 < n && pnl[i + 1] != 0.0 && pnl[i].signum() != pnl[i + 1].signum() {
            let t = -pnl[i] / (pnl[i + 1] - pnl[i]);
            points.push(grid[i] + (grid[i + 1] - grid[i]) * t);
        }
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn interpolates_between_grid_points() {
        let grid = PriceGrid::linspace(90.0, 110.0, 3).unwrap();
        let points = crossings(&grid, &[-100.0, 100.0, 300.0]);
        assert_eq!(points.len(), 1);
        assert_approx_eq!(points[0], 95.0);
    }

    #[test]
    fn exact_zero_counted_once() {
        let grid = PriceGrid::linspace(1.0, 5.0, 5).unwrap();
        let points = crossings(&grid, &[-1.0, 0.0, 0.0, 2.0, -2.0]);
        assert_eq!(points.len(), 2);
        assert_approx_eq!(points[0], 2.0);
        assert_approx_eq!(points[1], 4.5);
    }

    #[test]
    fn short_stock_slopes_down() {
        let grid = PriceGrid::linspace(90.0, 110.0, 3).unwrap();
        let curve = aggregate(
            &[],
            &[StockPosition {
                cost_basis: 100.0,
                shares: -10,
            }],
            &grid,
        )
        .unwrap();
        assert_eq!(curve, vec![100.0, 0.0, -100.0]);
    }
}
