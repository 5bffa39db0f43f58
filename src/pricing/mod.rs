use crate::chain::OptionQuote;
use crate::model::{Side, StrategyError};

/// Resolves the touch price a leg would execute at, plus a flat per-leg fee.
#[derive(Debug, Clone, Copy, Default)]
pub struct LegPricer {
    per_leg_fee: f64,
}

impl LegPricer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fee(per_leg_fee: f64) -> Self {
        Self { per_leg_fee }
    }

    /// Buys lift the ask, sells hit the bid. An unquoted side is an error; the other
    /// side is never used as a stand-in.
    pub fn resolve(&self, quote: &OptionQuote, side: Side) -> Result<f64, StrategyError> {
        let price = match side {
            Side::Buy => quote.ask(),
            Side::Sell => quote.bid(),
        };
        price.ok_or(StrategyError::MissingQuote {
            strike: quote.strike,
            side,
        })
    }

    /// Total fees for a combination of `legs` option legs.
    pub fn fees_for(&self, legs: usize) -> f64 {
        self.per_leg_fee * legs as f64
    }
}
