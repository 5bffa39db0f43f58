//! Terminal payoff of a strategy over a price grid, and the statistics derived from
//! the curve. Everything here is evaluated at expiration: intrinsic value only, no
//! time value.

use crate::grid::PriceGrid;
use crate::model::{
    Bound, Breakeven, EvaluationResult, Instrument, Leg, StrategyDefinition, StrategyError,
    StrategyShape,
};
use statrs::distribution::{ContinuousCDF, Normal};

pub const DEFAULT_MULTIPLIER: f64 = 100.0;

/// Costs at or below this magnitude are treated as zero when computing returns.
const COST_EPSILON: f64 = 1e-9;

/// Trading days per year used to scale implied volatility to the holding period.
const TRADING_DAYS: f64 = 252.0;

pub trait ProbabilityModel: Send + Sync {
    /// Probability that the strategy finishes with `pnl > 0`, or `None` when the
    /// model cannot say.
    fn profit_probability(&self, grid: &PriceGrid, pnl: &[f64]) -> Option<f64>;
}

/// Every grid point carries the same weight.
#[derive(Debug, Clone, Copy, Default)]
pub struct GridFraction;

impl ProbabilityModel for GridFraction {
    fn profit_probability(&self, _grid: &PriceGrid, pnl: &[f64]) -> Option<f64> {
        if pnl.is_empty() {
            return None;
        }
        let winners = pnl.iter().filter(|p| **p > 0.0).count();
        Some(winners as f64 / pnl.len() as f64)
    }
}

/// Terminal price drawn from a normal distribution around the spot. Each grid point
/// owns the mass between the midpoints to its neighbours; the outermost points also
/// own the tails.
#[derive(Debug, Clone, Copy)]
pub struct NormalTerminal {
    normal: Normal,
}

impl NormalTerminal {
    pub fn new(mean: f64, std_dev: f64) -> Option<Self> {
        if !mean.is_finite() || !std_dev.is_finite() || std_dev <= 0.0 {
            return None;
        }
        Normal::new(mean, std_dev).ok().map(|normal| Self { normal })
    }

    /// `sigma = spot * iv * sqrt(days / 252)`.
    pub fn from_implied_vol(spot: f64, implied_vol: f64, days: f64) -> Option<Self> {
        let std_dev = spot * implied_vol * (days / TRADING_DAYS).sqrt();
        Self::new(spot, std_dev)
    }
}

impl ProbabilityModel for NormalTerminal {
    fn profit_probability(&self, grid: &PriceGrid, pnl: &[f64]) -> Option<f64> {
        if pnl.len() != grid.len() || grid.is_empty() {
            return None;
        }
        let last = grid.len() - 1;
        let mass: f64 = (0..grid.len())
            .filter(|&i| pnl[i] > 0.0)
            .map(|i| {
                let lower = if i == 0 {
                    0.0
                } else {
                    self.normal.cdf((grid[i - 1] + grid[i]) / 2.0)
                };
                let upper = if i == last {
                    1.0
                } else {
                    self.normal.cdf((grid[i] + grid[i + 1]) / 2.0)
                };
                upper - lower
            })
            .sum();
        Some(mass.clamp(0.0, 1.0))
    }
}

pub struct PayoffModel {
    multiplier: f64,
    probability: Box<dyn ProbabilityModel>,
}

impl Default for PayoffModel {
    fn default() -> Self {
        Self::new(DEFAULT_MULTIPLIER)
    }
}

impl PayoffModel {
    pub fn new(multiplier: f64) -> Self {
        Self {
            multiplier,
            probability: Box::new(GridFraction),
        }
    }

    pub fn with_probability(mut self, model: Box<dyn ProbabilityModel>) -> Self {
        self.probability = model;
        self
    }

    pub fn evaluate(
        &self,
        definition: &StrategyDefinition,
        grid: &PriceGrid,
    ) -> Result<EvaluationResult, StrategyError> {
        evaluate_with(definition, grid, self.multiplier, self.probability.as_ref())
    }
}

/// Evaluates with the default grid-fraction profit probability.
pub fn evaluate(
    definition: &StrategyDefinition,
    grid: &PriceGrid,
    multiplier: f64,
) -> Result<EvaluationResult, StrategyError> {
    evaluate_with(definition, grid, multiplier, &GridFraction)
}

pub fn evaluate_with(
    definition: &StrategyDefinition,
    grid: &PriceGrid,
    multiplier: f64,
    probability: &dyn ProbabilityModel,
) -> Result<EvaluationResult, StrategyError> {
    if !multiplier.is_finite() || multiplier <= 0.0 {
        return Err(StrategyError::range(format!(
            "multiplier {multiplier} must be positive"
        )));
    }
    definition.validate()?;

    let legs = definition.legs();
    let pnl: Vec<f64> = grid
        .iter()
        .map(|&price| curve_value(&legs, definition.fees, price, multiplier))
        .collect();
    let cost = net_cost(&legs, definition.fees, multiplier);
    let (max_profit, max_loss, breakeven) = extremes(definition, &legs, cost, multiplier);

    let avg_return = if cost.abs() <= COST_EPSILON {
        None
    } else {
        let basis = cost.abs();
        Some(pnl.iter().map(|p| p / basis).sum::<f64>() / pnl.len() as f64)
    };
    let profit_probability = probability.profit_probability(grid, &pnl);

    Ok(EvaluationResult {
        pnl,
        cost,
        max_profit,
        max_loss,
        breakeven,
        avg_return,
        profit_probability,
    })
}

/// PnL of a single leg at expiry for an underlying price.
pub fn leg_payoff(leg: &Leg, price: f64, multiplier: f64) -> f64 {
    let quantity = f64::from(leg.quantity);
    match leg.instrument {
        Instrument::Call { strike } => {
            let intrinsic = (price - strike).max(0.0);
            leg.side.sign() * (intrinsic - leg.entry_price) * quantity * multiplier
        }
        Instrument::Put { strike } => {
            let intrinsic = (strike - price).max(0.0);
            leg.side.sign() * (intrinsic - leg.entry_price) * quantity * multiplier
        }
        Instrument::Stock => leg.side.sign() * (price - leg.entry_price) * quantity,
    }
}

fn curve_value(legs: &[Leg], fees: f64, price: f64, multiplier: f64) -> f64 {
    legs.iter()
        .map(|leg| leg_payoff(leg, price, multiplier))
        .sum::<f64>()
        - fees
}

fn net_cost(legs: &[Leg], fees: f64, multiplier: f64) -> f64 {
    legs.iter()
        .map(|leg| {
            let units = match leg.instrument {
                Instrument::Stock => f64::from(leg.quantity),
                _ => f64::from(leg.quantity) * multiplier,
            };
            leg.side.sign() * leg.entry_price * units
        })
        .sum::<f64>()
        + fees
}

/// `point` when it lies strictly inside `(lo, hi)`, where the curve actually changes
/// sign; a boundary hit means the curve only touches zero along a flat piece.
fn inside(point: f64, lo: f64, hi: f64) -> Option<f64> {
    (point > lo && point < hi).then_some(point)
}

fn breakeven(lower: Option<f64>, upper: Option<f64>) -> Breakeven {
    match (lower, upper) {
        (Some(lo), Some(hi)) => Breakeven::Pair(lo, hi),
        (Some(point), None) | (None, Some(point)) => Breakeven::Single(point),
        (None, None) => Breakeven::None,
    }
}

/// Closed-form max profit, max loss (as a positive amount) and breakevens per kind.
fn extremes(
    definition: &StrategyDefinition,
    legs: &[Leg],
    cost: f64,
    multiplier: f64,
) -> (Bound, Bound, Breakeven) {
    let m = f64::from(definition.quantity) * multiplier;
    match &definition.shape {
        StrategyShape::SellPut { short_put } => {
            let credit = -cost;
            let k = short_put.strike;
            (
                Bound::Finite(credit),
                Bound::Finite((k * m - credit).max(0.0)),
                breakeven(inside(k - credit / m, 0.0, k), None),
            )
        }
        StrategyShape::SellCall { short_call } => {
            let credit = -cost;
            let k = short_call.strike;
            (
                Bound::Finite(credit),
                Bound::Unbounded,
                breakeven(None, inside(k + credit / m, k, f64::INFINITY)),
            )
        }
        StrategyShape::BullCallSpread {
            long_call,
            short_call,
        } => {
            let (lo, hi) = (long_call.strike, short_call.strike);
            (
                Bound::Finite((hi - lo) * m - cost),
                Bound::Finite(cost.max(0.0)),
                breakeven(inside(lo + cost / m, lo, hi), None),
            )
        }
        StrategyShape::BearPutSpread { long_put, short_put } => {
            let (lo, hi) = (short_put.strike, long_put.strike);
            (
                Bound::Finite((hi - lo) * m - cost),
                Bound::Finite(cost.max(0.0)),
                breakeven(inside(hi - cost / m, lo, hi), None),
            )
        }
        StrategyShape::Straddle { call, .. } => {
            let k = call.strike;
            (
                Bound::Unbounded,
                Bound::Finite(cost.max(0.0)),
                breakeven(
                    inside(k - cost / m, 0.0, k),
                    inside(k + cost / m, k, f64::INFINITY),
                ),
            )
        }
        StrategyShape::IronCondor {
            long_put,
            short_put,
            short_call,
            long_call,
        } => {
            let credit = -cost;
            let wing = (short_put.strike - long_put.strike).max(long_call.strike - short_call.strike);
            // Each wing crosses zero only when the credit is positive and narrower
            // than that wing.
            (
                Bound::Finite(credit),
                Bound::Finite((wing * m - credit).max(0.0)),
                breakeven(
                    inside(short_put.strike - credit / m, long_put.strike, short_put.strike),
                    inside(short_call.strike + credit / m, short_call.strike, long_call.strike),
                ),
            )
        }
        StrategyShape::CoveredCall { stock, short_call } => {
            let shares = f64::from(stock.shares);
            let k = short_call.strike;
            let value_at = |price: f64| curve_value(legs, definition.fees, price, multiplier);
            let at_strike = value_at(k);
            // Past the strike the slope is `shares - m`.
            let slope = shares - m;
            let max_profit = if slope > 0.0 {
                Bound::Unbounded
            } else {
                Bound::Finite(at_strike)
            };
            let max_loss = if slope < 0.0 {
                Bound::Unbounded
            } else {
                Bound::Finite((-value_at(0.0)).max(0.0))
            };
            let option_credit = short_call.premium * m - definition.fees;
            let rising = inside(stock.cost_basis - option_credit / shares, 0.0, k);
            let beyond = if slope == 0.0 {
                None
            } else {
                inside(k - at_strike / slope, k, f64::INFINITY)
            };
            (max_profit, max_loss, breakeven(rising, beyond))
        }
    }
}
