use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum OptionKind {
    Call,
    Put,
}

impl Display for OptionKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OptionKind::Call => write!(f, "C"),
            OptionKind::Put => write!(f, "P"),
        }
    }
}

impl FromStr for OptionKind {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "C" | "CALL" | "CALLS" => Ok(OptionKind::Call),
            "P" | "PUT" | "PUTS" => Ok(OptionKind::Put),
            other => Err(ParseKindError::UnknownOptionKind(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// +1 for positions that pay the premium, -1 for those that collect it.
    pub fn sign(self) -> f64 {
        match self {
            Side::Buy => 1.0,
            Side::Sell => -1.0,
        }
    }
}

impl Display for Side {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Instrument {
    Call { strike: f64 },
    Put { strike: f64 },
    Stock,
}

impl Instrument {
    pub fn option(kind: OptionKind, strike: f64) -> Self {
        match kind {
            OptionKind::Call => Instrument::Call { strike },
            OptionKind::Put => Instrument::Put { strike },
        }
    }

    pub fn strike(&self) -> Option<f64> {
        match self {
            Instrument::Call { strike } | Instrument::Put { strike } => Some(*strike),
            Instrument::Stock => None,
        }
    }

    pub fn option_kind(&self) -> Option<OptionKind> {
        match self {
            Instrument::Call { .. } => Some(OptionKind::Call),
            Instrument::Put { .. } => Some(OptionKind::Put),
            Instrument::Stock => None,
        }
    }
}

impl Display for Instrument {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Instrument::Call { strike } => write!(f, "{strike}C"),
            Instrument::Put { strike } => write!(f, "{strike}P"),
            Instrument::Stock => write!(f, "STK"),
        }
    }
}

/// One atomic position of a strategy. Option quantity is in contracts, stock
/// quantity in shares; `entry_price` is per share.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Leg {
    pub instrument: Instrument,
    pub side: Side,
    pub quantity: u32,
    pub entry_price: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct OptionLeg {
    pub strike: f64,
    pub premium: f64,
}

impl OptionLeg {
    pub fn new(strike: f64, premium: f64) -> Self {
        Self { strike, premium }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct StockLeg {
    pub cost_basis: f64,
    pub shares: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StrategyKind {
    SellPut,
    SellCall,
    BullCallSpread,
    BearPutSpread,
    Straddle,
    IronCondor,
    CoveredCall,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 7] = [
        StrategyKind::SellPut,
        StrategyKind::SellCall,
        StrategyKind::BullCallSpread,
        StrategyKind::BearPutSpread,
        StrategyKind::Straddle,
        StrategyKind::IronCondor,
        StrategyKind::CoveredCall,
    ];

    pub fn leg_count(self) -> usize {
        match self {
            StrategyKind::SellPut | StrategyKind::SellCall => 1,
            StrategyKind::BullCallSpread
            | StrategyKind::BearPutSpread
            | StrategyKind::Straddle
            | StrategyKind::CoveredCall => 2,
            StrategyKind::IronCondor => 4,
        }
    }
}

impl Display for StrategyKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyKind::SellPut => write!(f, "sell-put"),
            StrategyKind::SellCall => write!(f, "sell-call"),
            StrategyKind::BullCallSpread => write!(f, "bull-call"),
            StrategyKind::BearPutSpread => write!(f, "bear-put"),
            StrategyKind::Straddle => write!(f, "straddle"),
            StrategyKind::IronCondor => write!(f, "iron-condor"),
            StrategyKind::CoveredCall => write!(f, "covered-call"),
        }
    }
}

impl FromStr for StrategyKind {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        match normalized.as_str() {
            "sell-put" | "short-put" => Ok(StrategyKind::SellPut),
            "sell-call" | "short-call" => Ok(StrategyKind::SellCall),
            "bull-call" | "bull-call-spread" | "bullcall" => Ok(StrategyKind::BullCallSpread),
            "bear-put" | "bear-put-spread" | "bearput" => Ok(StrategyKind::BearPutSpread),
            "straddle" | "long-straddle" => Ok(StrategyKind::Straddle),
            "iron-condor" | "condor" | "ironcondor" => Ok(StrategyKind::IronCondor),
            "covered-call" | "covered" | "coveredcall" => Ok(StrategyKind::CoveredCall),
            _ => Err(ParseKindError::UnknownStrategy(s.to_string())),
        }
    }
}

/// Leg shape per strategy kind. Each variant carries exactly the legs it needs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyShape {
    SellPut {
        short_put: OptionLeg,
    },
    SellCall {
        short_call: OptionLeg,
    },
    BullCallSpread {
        long_call: OptionLeg,
        short_call: OptionLeg,
    },
    BearPutSpread {
        long_put: OptionLeg,
        short_put: OptionLeg,
    },
    Straddle {
        call: OptionLeg,
        put: OptionLeg,
    },
    IronCondor {
        long_put: OptionLeg,
        short_put: OptionLeg,
        short_call: OptionLeg,
        long_call: OptionLeg,
    },
    CoveredCall {
        stock: StockLeg,
        short_call: OptionLeg,
    },
}

impl StrategyShape {
    pub fn kind(&self) -> StrategyKind {
        match self {
            StrategyShape::SellPut { .. } => StrategyKind::SellPut,
            StrategyShape::SellCall { .. } => StrategyKind::SellCall,
            StrategyShape::BullCallSpread { .. } => StrategyKind::BullCallSpread,
            StrategyShape::BearPutSpread { .. } => StrategyKind::BearPutSpread,
            StrategyShape::Straddle { .. } => StrategyKind::Straddle,
            StrategyShape::IronCondor { .. } => StrategyKind::IronCondor,
            StrategyShape::CoveredCall { .. } => StrategyKind::CoveredCall,
        }
    }
}

fn default_quantity() -> u32 {
    1
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct StrategyDefinition {
    #[serde(flatten)]
    pub shape: StrategyShape,
    /// Contracts per option leg.
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    /// Total transaction cost in currency, already summed over legs.
    #[serde(default)]
    pub fees: f64,
}

impl StrategyDefinition {
    pub fn new(shape: StrategyShape, quantity: u32) -> Self {
        Self {
            shape,
            quantity,
            fees: 0.0,
        }
    }

    pub fn with_fees(mut self, fees: f64) -> Self {
        self.fees = fees;
        self
    }

    pub fn kind(&self) -> StrategyKind {
        self.shape.kind()
    }

    /// Legs in canonical order: puts before calls, lower strikes first, stock first.
    pub fn legs(&self) -> Vec<Leg> {
        let q = self.quantity;
        let opt = |kind: OptionKind, side: Side, leg: &OptionLeg| Leg {
            instrument: Instrument::option(kind, leg.strike),
            side,
            quantity: q,
            entry_price: leg.premium,
        };
        match &self.shape {
            StrategyShape::SellPut { short_put } => vec![opt(OptionKind::Put, Side::Sell, short_put)],
            StrategyShape::SellCall { short_call } => {
                vec![opt(OptionKind::Call, Side::Sell, short_call)]
            }
            StrategyShape::BullCallSpread {
                long_call,
                short_call,
            } => vec![
                opt(OptionKind::Call, Side::Buy, long_call),
                opt(OptionKind::Call, Side::Sell, short_call),
            ],
            StrategyShape::BearPutSpread { long_put, short_put } => vec![
                opt(OptionKind::Put, Side::Buy, long_put),
                opt(OptionKind::Put, Side::Sell, short_put),
            ],
            StrategyShape::Straddle { call, put } => vec![
                opt(OptionKind::Call, Side::Buy, call),
                opt(OptionKind::Put, Side::Buy, put),
            ],
            StrategyShape::IronCondor {
                long_put,
                short_put,
                short_call,
                long_call,
            } => vec![
                opt(OptionKind::Put, Side::Buy, long_put),
                opt(OptionKind::Put, Side::Sell, short_put),
                opt(OptionKind::Call, Side::Sell, short_call),
                opt(OptionKind::Call, Side::Buy, long_call),
            ],
            StrategyShape::CoveredCall { stock, short_call } => vec![
                Leg {
                    instrument: Instrument::Stock,
                    side: Side::Buy,
                    quantity: stock.shares,
                    entry_price: stock.cost_basis,
                },
                opt(OptionKind::Call, Side::Sell, short_call),
            ],
        }
    }

    /// Builds a definition from a generic leg list, in the order `legs()` produces.
    pub fn from_legs(kind: StrategyKind, legs: &[Leg]) -> Result<Self, StrategyError> {
        if legs.len() != kind.leg_count() {
            return Err(StrategyError::structure(
                kind,
                format!("expected {} legs, found {}", kind.leg_count(), legs.len()),
            ));
        }
        let option_at = |idx: usize, option_kind: OptionKind, side: Side| {
            let leg = &legs[idx];
            match (leg.instrument.option_kind(), leg.instrument.strike()) {
                (Some(found), Some(strike)) if found == option_kind && leg.side == side => {
                    Ok(OptionLeg::new(strike, leg.entry_price))
                }
                _ => Err(StrategyError::structure(
                    kind,
                    format!(
                        "leg {idx} must be {side} {option_kind}, found {} {}",
                        leg.side, leg.instrument
                    ),
                )),
            }
        };

        let shape = match kind {
            StrategyKind::SellPut => StrategyShape::SellPut {
                short_put: option_at(0, OptionKind::Put, Side::Sell)?,
            },
            StrategyKind::SellCall => StrategyShape::SellCall {
                short_call: option_at(0, OptionKind::Call, Side::Sell)?,
            },
            StrategyKind::BullCallSpread => StrategyShape::BullCallSpread {
                long_call: option_at(0, OptionKind::Call, Side::Buy)?,
                short_call: option_at(1, OptionKind::Call, Side::Sell)?,
            },
            StrategyKind::BearPutSpread => StrategyShape::BearPutSpread {
                long_put: option_at(0, OptionKind::Put, Side::Buy)?,
                short_put: option_at(1, OptionKind::Put, Side::Sell)?,
            },
            StrategyKind::Straddle => StrategyShape::Straddle {
                call: option_at(0, OptionKind::Call, Side::Buy)?,
                put: option_at(1, OptionKind::Put, Side::Buy)?,
            },
            StrategyKind::IronCondor => StrategyShape::IronCondor {
                long_put: option_at(0, OptionKind::Put, Side::Buy)?,
                short_put: option_at(1, OptionKind::Put, Side::Sell)?,
                short_call: option_at(2, OptionKind::Call, Side::Sell)?,
                long_call: option_at(3, OptionKind::Call, Side::Buy)?,
            },
            StrategyKind::CoveredCall => {
                let stock = &legs[0];
                if stock.instrument != Instrument::Stock || stock.side != Side::Buy {
                    return Err(StrategyError::structure(
                        kind,
                        "leg 0 must be a long stock position",
                    ));
                }
                StrategyShape::CoveredCall {
                    stock: StockLeg {
                        cost_basis: stock.entry_price,
                        shares: stock.quantity,
                    },
                    short_call: option_at(1, OptionKind::Call, Side::Sell)?,
                }
            }
        };

        let mut option_quantities = legs
            .iter()
            .filter(|leg| leg.instrument != Instrument::Stock)
            .map(|leg| leg.quantity);
        let quantity = option_quantities
            .next()
            .ok_or_else(|| StrategyError::structure(kind, "needs at least one option leg"))?;
        if option_quantities.any(|q| q != quantity) {
            return Err(StrategyError::structure(
                kind,
                "option legs must share one contract quantity",
            ));
        }

        let definition = Self::new(shape, quantity);
        definition.validate()?;
        Ok(definition)
    }

    pub fn option_legs(&self) -> Vec<&OptionLeg> {
        match &self.shape {
            StrategyShape::SellPut { short_put } => vec![short_put],
            StrategyShape::SellCall { short_call } => vec![short_call],
            StrategyShape::BullCallSpread {
                long_call,
                short_call,
            } => vec![long_call, short_call],
            StrategyShape::BearPutSpread { long_put, short_put } => vec![long_put, short_put],
            StrategyShape::Straddle { call, put } => vec![call, put],
            StrategyShape::IronCondor {
                long_put,
                short_put,
                short_call,
                long_call,
            } => vec![long_put, short_put, short_call, long_call],
            StrategyShape::CoveredCall { short_call, .. } => vec![short_call],
        }
    }

    pub fn strikes(&self) -> Vec<f64> {
        self.option_legs().iter().map(|leg| leg.strike).collect()
    }

    /// Checks the strike-ordering contract of the kind.
    pub fn validate(&self) -> Result<(), StrategyError> {
        let kind = self.kind();
        if self.quantity == 0 {
            return Err(StrategyError::structure(kind, "quantity must be at least one"));
        }
        if !self.fees.is_finite() || self.fees < 0.0 {
            return Err(StrategyError::structure(kind, "fees must be finite and non-negative"));
        }
        for leg in self.option_legs() {
            if !leg.strike.is_finite() || leg.strike <= 0.0 {
                return Err(StrategyError::structure(
                    kind,
                    format!("strike {} must be positive", leg.strike),
                ));
            }
            if !leg.premium.is_finite() || leg.premium < 0.0 {
                return Err(StrategyError::structure(
                    kind,
                    format!("premium {} at strike {} must be non-negative", leg.premium, leg.strike),
                ));
            }
        }

        match &self.shape {
            StrategyShape::BullCallSpread {
                long_call,
                short_call,
            } if long_call.strike >= short_call.strike => Err(StrategyError::structure(
                kind,
                format!(
                    "buy strike {} must be below sell strike {}",
                    long_call.strike, short_call.strike
                ),
            )),
            StrategyShape::BearPutSpread { long_put, short_put }
                if long_put.strike <= short_put.strike =>
            {
                Err(StrategyError::structure(
                    kind,
                    format!(
                        "buy strike {} must be above sell strike {}",
                        long_put.strike, short_put.strike
                    ),
                ))
            }
            StrategyShape::Straddle { call, put } if call.strike != put.strike => {
                Err(StrategyError::structure(
                    kind,
                    format!("call strike {} and put strike {} differ", call.strike, put.strike),
                ))
            }
            StrategyShape::IronCondor {
                long_put,
                short_put,
                short_call,
                long_call,
            } if !(long_put.strike < short_put.strike
                && short_put.strike < short_call.strike
                && short_call.strike < long_call.strike) =>
            {
                Err(StrategyError::structure(
                    kind,
                    format!(
                        "strikes {}/{}/{}/{} are not strictly increasing",
                        long_put.strike, short_put.strike, short_call.strike, long_call.strike
                    ),
                ))
            }
            StrategyShape::CoveredCall { stock, .. }
                if !stock.cost_basis.is_finite() || stock.cost_basis <= 0.0 || stock.shares == 0 =>
            {
                Err(StrategyError::structure(
                    kind,
                    "stock leg needs a positive cost basis and share count",
                ))
            }
            _ => Ok(()),
        }
    }

    /// Short human label, e.g. `bull-call 100/110`.
    pub fn describe(&self) -> String {
        let strikes = self
            .strikes()
            .iter()
            .map(|s| format!("{s}"))
            .collect::<Vec<_>>()
            .join("/");
        format!("{} {}", self.kind(), strikes)
    }
}

/// A stock holding outside any strategy. Negative shares mean a short position.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct StockPosition {
    pub cost_basis: f64,
    pub shares: i64,
}

/// Profit or loss extreme. `Unbounded` is never represented by a large finite value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum Bound {
    Finite(f64),
    Unbounded,
}

impl Bound {
    pub fn finite(self) -> Option<f64> {
        match self {
            Bound::Finite(value) => Some(value),
            Bound::Unbounded => None,
        }
    }
}

impl Display for Bound {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Bound::Finite(value) => write!(f, "{value:.2}"),
            Bound::Unbounded => write!(f, "unbounded"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum Breakeven {
    None,
    Single(f64),
    Pair(f64, f64),
}

impl Breakeven {
    pub fn points(&self) -> Vec<f64> {
        match *self {
            Breakeven::None => Vec::new(),
            Breakeven::Single(p) => vec![p],
            Breakeven::Pair(lo, hi) => vec![lo, hi],
        }
    }
}

impl Display for Breakeven {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Breakeven::None => write!(f, "-"),
            Breakeven::Single(p) => write!(f, "{p:.2}"),
            Breakeven::Pair(lo, hi) => write!(f, "{lo:.2}/{hi:.2}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationResult {
    pub pnl: Vec<f64>,
    /// Positive for a net debit, negative for a net credit. Fees included.
    pub cost: f64,
    pub max_profit: Bound,
    pub max_loss: Bound,
    pub breakeven: Breakeven,
    pub avg_return: Option<f64>,
    pub profit_probability: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankedCandidate {
    pub definition: StrategyDefinition,
    pub result: EvaluationResult,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum StrategyError {
    #[error("invalid range: {0}")]
    InvalidRange(String),
    #[error("missing {side} quote at strike {strike}")]
    MissingQuote { strike: f64, side: Side },
    #[error("invalid {kind} structure: {reason}")]
    InvalidStructure { kind: StrategyKind, reason: String },
    #[error("grid mismatch: expected {expected} points, found {found}")]
    GridMismatch { expected: usize, found: usize },
}

impl StrategyError {
    pub fn structure(kind: StrategyKind, reason: impl Into<String>) -> Self {
        StrategyError::InvalidStructure {
            kind,
            reason: reason.into(),
        }
    }

    pub fn range(reason: impl Into<String>) -> Self {
        StrategyError::InvalidRange(reason.into())
    }
}

#[derive(Debug, Error)]
pub enum ParseKindError {
    #[error("unknown strategy kind: {0}")]
    UnknownStrategy(String),
    #[error("unknown option kind: {0}")]
    UnknownOptionKind(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("bull-call", StrategyKind::BullCallSpread)]
    #[case("Bear_Put_Spread", StrategyKind::BearPutSpread)]
    #[case("iron condor", StrategyKind::IronCondor)]
    #[case("covered", StrategyKind::CoveredCall)]
    fn parses_strategy_aliases(#[case] input: &str, #[case] expected: StrategyKind) {
        assert_eq!(input.parse::<StrategyKind>().expect("kind"), expected);
    }

    #[test]
    fn legs_round_trip_through_from_legs() {
        let condor = StrategyDefinition::new(
            StrategyShape::IronCondor {
                long_put: OptionLeg::new(90.0, 0.5),
                short_put: OptionLeg::new(95.0, 1.5),
                short_call: OptionLeg::new(105.0, 1.5),
                long_call: OptionLeg::new(110.0, 0.5),
            },
            2,
        );
        let rebuilt =
            StrategyDefinition::from_legs(StrategyKind::IronCondor, &condor.legs()).expect("rebuild");
        assert_eq!(rebuilt, condor);
    }

    #[test]
    fn from_legs_rejects_wrong_side() {
        let legs = vec![
            Leg {
                instrument: Instrument::Call { strike: 100.0 },
                side: Side::Sell,
                quantity: 1,
                entry_price: 3.0,
            },
            Leg {
                instrument: Instrument::Call { strike: 110.0 },
                side: Side::Sell,
                quantity: 1,
                entry_price: 1.0,
            },
        ];
        let err = StrategyDefinition::from_legs(StrategyKind::BullCallSpread, &legs).unwrap_err();
        assert!(matches!(err, StrategyError::InvalidStructure { .. }));
    }

    #[test]
    fn from_legs_rejects_stock_only_covered_call() {
        let stock = Leg {
            instrument: Instrument::Stock,
            side: Side::Buy,
            quantity: 100,
            entry_price: 100.0,
        };
        let err = StrategyDefinition::from_legs(StrategyKind::CoveredCall, &[stock, stock])
            .unwrap_err();
        assert!(matches!(
            err,
            StrategyError::InvalidStructure {
                kind: StrategyKind::CoveredCall,
                ..
            }
        ));
    }

    #[test]
    fn serde_shape_is_tagged_by_kind() {
        let definition = StrategyDefinition::new(
            StrategyShape::SellPut {
                short_put: OptionLeg::new(95.0, 1.2),
            },
            1,
        );
        let value = serde_json::to_value(definition).expect("json");
        assert_eq!(value["kind"], "sell_put");
        let back: StrategyDefinition = serde_json::from_value(value).expect("parse");
        assert_eq!(back, definition);
    }
}
