use crate::chain::{ExpiryChain, OptionQuote};
use crate::model::{
    OptionKind, OptionLeg, Side, StockLeg, StrategyDefinition, StrategyKind, StrategyShape,
};
use crate::payoff::DEFAULT_MULTIPLIER;
use crate::pricing::LegPricer;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct EnumeratorSettings {
    /// Ceiling on the currency paid to open a debit strategy.
    pub budget: f64,
    pub multiplier: f64,
    pub quantity: u32,
    pub pricer: LegPricer,
}

impl Default for EnumeratorSettings {
    fn default() -> Self {
        Self {
            budget: 500.0,
            multiplier: DEFAULT_MULTIPLIER,
            quantity: 1,
            pricer: LegPricer::new(),
        }
    }
}

impl EnumeratorSettings {
    fn contracts(&self) -> f64 {
        f64::from(self.quantity) * self.multiplier
    }

    fn within_budget(&self, debit: f64) -> bool {
        debit > 0.0 && debit <= self.budget
    }

    fn definition(&self, shape: StrategyShape, option_legs: usize) -> StrategyDefinition {
        StrategyDefinition::new(shape, self.quantity).with_fees(self.pricer.fees_for(option_legs))
    }
}

/// Generates candidate strategies of one kind from a single expiry.
///
/// Candidates with an unquoted leg or outside the budget are skipped, never reported
/// as errors. Generation is lazy and restartable: every call to [`enumerate`] walks
/// the chain from the start, so callers can `take(n)` without paying for the full
/// cross product. Strike windows are the caller's job (see
/// [`ExpiryChain::within_strikes`]).
///
/// [`enumerate`]: StrategyEnumerator::enumerate
pub struct StrategyEnumerator<'a> {
    chain: &'a ExpiryChain,
    spot: f64,
    settings: EnumeratorSettings,
}

pub type Candidates<'a> = Box<dyn Iterator<Item = StrategyDefinition> + 'a>;

impl<'a> StrategyEnumerator<'a> {
    pub fn new(chain: &'a ExpiryChain, spot: f64, settings: EnumeratorSettings) -> Self {
        Self {
            chain,
            spot,
            settings,
        }
    }

    pub fn enumerate(&self, kind: StrategyKind) -> Candidates<'a> {
        debug!(
            target: "enumerate",
            kind = %kind,
            calls = self.chain.calls.len(),
            puts = self.chain.puts.len(),
            budget = self.settings.budget,
            "enumerating candidates"
        );
        let candidates: Candidates<'a> = match kind {
            StrategyKind::SellPut => self.single_sells(OptionKind::Put),
            StrategyKind::SellCall => self.single_sells(OptionKind::Call),
            StrategyKind::BullCallSpread => self.bull_call_spreads(),
            StrategyKind::BearPutSpread => self.bear_put_spreads(),
            StrategyKind::Straddle => self.straddles(),
            StrategyKind::IronCondor => self.iron_condors(),
            StrategyKind::CoveredCall => self.covered_calls(),
        };
        Box::new(candidates.filter(|definition| definition.validate().is_ok()))
    }

    fn single_sells(&self, option_kind: OptionKind) -> Candidates<'a> {
        let s = self.settings;
        Box::new(
            self.chain
                .quotes(option_kind)
                .iter()
                .filter_map(move |quote| {
                    let bid = s.pricer.resolve(quote, Side::Sell).ok()?;
                    if bid <= 0.0 || bid * s.contracts() > s.budget {
                        return None;
                    }
                    let leg = OptionLeg::new(quote.strike, bid);
                    let shape = match option_kind {
                        OptionKind::Put => StrategyShape::SellPut { short_put: leg },
                        OptionKind::Call => StrategyShape::SellCall { short_call: leg },
                    };
                    Some(s.definition(shape, 1))
                }),
        )
    }

    fn bull_call_spreads(&self) -> Candidates<'a> {
        let s = self.settings;
        let calls = self.chain.quotes(OptionKind::Call);
        Box::new(calls.iter().flat_map(move |low| {
            calls
                .iter()
                .filter(move |high| low.strike < high.strike)
                .filter_map(move |high| {
                    let long = s.pricer.resolve(low, Side::Buy).ok()?;
                    let short = s.pricer.resolve(high, Side::Sell).ok()?;
                    let debit = (long - short) * s.contracts() + s.pricer.fees_for(2);
                    if !s.within_budget(debit) {
                        return None;
                    }
                    Some(s.definition(
                        StrategyShape::BullCallSpread {
                            long_call: OptionLeg::new(low.strike, long),
                            short_call: OptionLeg::new(high.strike, short),
                        },
                        2,
                    ))
                })
        }))
    }

    fn bear_put_spreads(&self) -> Candidates<'a> {
        let s = self.settings;
        let puts = self.chain.quotes(OptionKind::Put);
        Box::new(puts.iter().flat_map(move |low| {
            puts.iter()
                .filter(move |high| low.strike < high.strike)
                .filter_map(move |high| {
                    let long = s.pricer.resolve(high, Side::Buy).ok()?;
                    let short = s.pricer.resolve(low, Side::Sell).ok()?;
                    let debit = (long - short) * s.contracts() + s.pricer.fees_for(2);
                    if !s.within_budget(debit) {
                        return None;
                    }
                    Some(s.definition(
                        StrategyShape::BearPutSpread {
                            long_put: OptionLeg::new(high.strike, long),
                            short_put: OptionLeg::new(low.strike, short),
                        },
                        2,
                    ))
                })
        }))
    }

    fn straddles(&self) -> Candidates<'a> {
        let s = self.settings;
        let chain = self.chain;
        Box::new(chain.calls.iter().filter_map(move |call_quote| {
            let put_quote = chain.find(OptionKind::Put, call_quote.strike)?;
            let call = s.pricer.resolve(call_quote, Side::Buy).ok()?;
            let put = s.pricer.resolve(put_quote, Side::Buy).ok()?;
            let debit = (call + put) * s.contracts() + s.pricer.fees_for(2);
            if !s.within_budget(debit) {
                return None;
            }
            Some(s.definition(
                StrategyShape::Straddle {
                    call: OptionLeg::new(call_quote.strike, call),
                    put: OptionLeg::new(put_quote.strike, put),
                },
                2,
            ))
        }))
    }

    /// Put pairs crossed with call pairs, `long put < short put < short call < long
    /// call`. Credit strategy, so no budget filter.
    fn iron_condors(&self) -> Candidates<'a> {
        let s = self.settings;
        let puts = self.chain.quotes(OptionKind::Put);
        let calls = self.chain.quotes(OptionKind::Call);
        let with_ask = |rows: &'a [OptionQuote]| rows.iter().filter(|q| q.ask().is_some());
        let with_bid = |rows: &'a [OptionQuote]| rows.iter().filter(|q| q.bid().is_some());

        Box::new(with_ask(puts).flat_map(move |long_put| {
            with_bid(puts)
                .filter(move |short_put| long_put.strike < short_put.strike)
                .flat_map(move |short_put| {
                    with_bid(calls)
                        .filter(move |short_call| short_put.strike < short_call.strike)
                        .flat_map(move |short_call| {
                            with_ask(calls)
                                .filter(move |long_call| short_call.strike < long_call.strike)
                                .filter_map(move |long_call| {
                                    let leg = |quote: &OptionQuote, side: Side| {
                                        s.pricer
                                            .resolve(quote, side)
                                            .ok()
                                            .map(|price| OptionLeg::new(quote.strike, price))
                                    };
                                    Some(s.definition(
                                        StrategyShape::IronCondor {
                                            long_put: leg(long_put, Side::Buy)?,
                                            short_put: leg(short_put, Side::Sell)?,
                                            short_call: leg(short_call, Side::Sell)?,
                                            long_call: leg(long_call, Side::Buy)?,
                                        },
                                        4,
                                    ))
                                })
                        })
                })
        }))
    }

    /// Stock bought at spot, one short call per contract of stock.
    fn covered_calls(&self) -> Candidates<'a> {
        let s = self.settings;
        let spot = self.spot;
        if !spot.is_finite() || spot <= 0.0 {
            return Box::new(std::iter::empty());
        }
        let shares = s.contracts().round() as u32;
        Box::new(
            self.chain
                .quotes(OptionKind::Call)
                .iter()
                .filter_map(move |quote| {
                    let premium = s.pricer.resolve(quote, Side::Sell).ok()?;
                    let debit =
                        spot * f64::from(shares) - premium * s.contracts() + s.pricer.fees_for(1);
                    if !s.within_budget(debit) {
                        return None;
                    }
                    Some(s.definition(
                        StrategyShape::CoveredCall {
                            stock: StockLeg {
                                cost_basis: spot,
                                shares,
                            },
                            short_call: OptionLeg::new(quote.strike, premium),
                        },
                        1,
                    ))
                }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> ExpiryChain {
        ExpiryChain::new(
            vec![
                OptionQuote::new(95.0, Some(6.0), Some(6.4)),
                OptionQuote::new(100.0, Some(3.0), Some(3.2)),
                OptionQuote::new(105.0, Some(1.2), Some(1.4)),
            ],
            vec![
                OptionQuote::new(95.0, Some(1.0), Some(1.2)),
                OptionQuote::new(100.0, Some(2.8), Some(3.0)),
            ],
        )
    }

    #[test]
    fn enumeration_restarts_from_the_beginning() {
        let chain = chain();
        let settings = EnumeratorSettings {
            budget: 1_000.0,
            ..EnumeratorSettings::default()
        };
        let enumerator = StrategyEnumerator::new(&chain, 100.0, settings);
        let first: Vec<_> = enumerator.enumerate(StrategyKind::BullCallSpread).collect();
        let second: Vec<_> = enumerator.enumerate(StrategyKind::BullCallSpread).collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn straddle_pairs_matching_strikes_only() {
        let chain = chain();
        let settings = EnumeratorSettings {
            budget: 700.0,
            ..EnumeratorSettings::default()
        };
        let straddles: Vec<_> = StrategyEnumerator::new(&chain, 100.0, settings)
            .enumerate(StrategyKind::Straddle)
            .collect();
        assert_eq!(straddles.len(), 1);
        assert_eq!(straddles[0].strikes(), vec![100.0, 100.0]);
    }
}
