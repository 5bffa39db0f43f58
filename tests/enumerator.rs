use optstrat::chain::{ExpiryChain, OptionQuote};
use optstrat::enumerate::{EnumeratorSettings, StrategyEnumerator};
use optstrat::grid::PriceGrid;
use optstrat::model::{Instrument, OptionKind, Side, StrategyKind, StrategyShape};
use optstrat::payoff::evaluate;
use optstrat::pricing::LegPricer;
use proptest::prelude::*;
use rstest::rstest;

fn quote(strike: f64, bid: f64, ask: f64) -> OptionQuote {
    OptionQuote::new(strike, Some(bid), Some(ask))
}

fn chain() -> ExpiryChain {
    ExpiryChain::new(
        vec![
            quote(90.0, 10.5, 11.0),
            quote(95.0, 6.2, 6.6),
            quote(100.0, 3.0, 3.3),
            quote(105.0, 1.1, 1.3),
            OptionQuote::new(110.0, None, Some(0.4)),
        ],
        vec![
            OptionQuote::new(90.0, Some(0.3), None),
            quote(95.0, 1.0, 1.2),
            quote(100.0, 2.8, 3.1),
            quote(105.0, 5.9, 6.3),
            quote(110.0, 10.2, 10.8),
        ],
    )
}

/// Strikes 80..=120, all two-sided except the 80 put, which has no ask.
fn wide_chain() -> ExpiryChain {
    let strikes = (0..9).map(|i| 80.0 + 5.0 * f64::from(i));
    let calls = strikes
        .clone()
        .map(|k: f64| {
            let bid = (100.0 - k).max(0.0) + 1.0;
            quote(k, bid, bid + 0.2)
        })
        .collect();
    let puts = strikes
        .map(|k: f64| {
            let bid = (k - 100.0).max(0.0) + 1.0;
            if k == 80.0 {
                OptionQuote::new(k, Some(bid), None)
            } else {
                quote(k, bid, bid + 0.2)
            }
        })
        .collect();
    ExpiryChain::new(calls, puts)
}

fn settings(budget: f64) -> EnumeratorSettings {
    EnumeratorSettings {
        budget,
        ..EnumeratorSettings::default()
    }
}

#[test]
fn bull_spreads_buy_the_lower_strike() {
    let chain = chain();
    let spreads: Vec<_> = StrategyEnumerator::new(&chain, 100.0, settings(10_000.0))
        .enumerate(StrategyKind::BullCallSpread)
        .collect();
    assert!(!spreads.is_empty());
    for spread in &spreads {
        match spread.shape {
            StrategyShape::BullCallSpread {
                long_call,
                short_call,
            } => assert!(long_call.strike < short_call.strike),
            other => panic!("unexpected shape {other:?}"),
        }
    }
    // 110 has no bid, so it can never be the short leg.
    assert!(spreads.iter().all(|s| !s.strikes().contains(&110.0)));
}

#[test]
fn bear_spreads_buy_the_higher_strike() {
    let chain = chain();
    let spreads: Vec<_> = StrategyEnumerator::new(&chain, 100.0, settings(10_000.0))
        .enumerate(StrategyKind::BearPutSpread)
        .collect();
    assert!(!spreads.is_empty());
    for spread in &spreads {
        match spread.shape {
            StrategyShape::BearPutSpread { long_put, short_put } => {
                assert!(long_put.strike > short_put.strike)
            }
            other => panic!("unexpected shape {other:?}"),
        }
    }
}

#[rstest]
#[case(StrategyKind::SellPut, 100.0, 2)]
#[case(StrategyKind::SellPut, 1_000.0, 4)]
#[case(StrategyKind::SellCall, 350.0, 2)]
fn single_sells_respect_credit_ceiling(
    #[case] kind: StrategyKind,
    #[case] budget: f64,
    #[case] expected: usize,
) {
    let chain = chain();
    let count = StrategyEnumerator::new(&chain, 100.0, settings(budget))
        .enumerate(kind)
        .count();
    assert_eq!(count, expected);
}

#[test]
fn iron_condors_need_four_increasing_quoted_strikes() {
    let chain = wide_chain();
    let condors: Vec<_> = StrategyEnumerator::new(&chain, 100.0, settings(1.0))
        .enumerate(StrategyKind::IronCondor)
        .collect();
    assert!(!condors.is_empty());
    for condor in &condors {
        let strikes = condor.strikes();
        assert!(strikes.windows(2).all(|w| w[0] < w[1]), "{strikes:?}");
    }
    assert!(condors.iter().all(|c| c.strikes()[0] != 80.0));
}

#[test]
fn covered_calls_buy_stock_at_spot() {
    let chain = chain();
    let none: Vec<_> = StrategyEnumerator::new(&chain, 100.0, settings(500.0))
        .enumerate(StrategyKind::CoveredCall)
        .collect();
    assert!(none.is_empty());

    let calls: Vec<_> = StrategyEnumerator::new(&chain, 100.0, settings(20_000.0))
        .enumerate(StrategyKind::CoveredCall)
        .collect();
    assert_eq!(calls.len(), 4);
    for call in &calls {
        match call.shape {
            StrategyShape::CoveredCall { stock, .. } => {
                assert_eq!(stock.cost_basis, 100.0);
                assert_eq!(stock.shares, 100);
            }
            other => panic!("unexpected shape {other:?}"),
        }
    }
}

#[test]
fn fees_are_carried_on_definitions() {
    let chain = chain();
    let settings = EnumeratorSettings {
        budget: 10_000.0,
        pricer: LegPricer::with_fee(0.65),
        ..EnumeratorSettings::default()
    };
    let enumerator = StrategyEnumerator::new(&chain, 100.0, settings);
    let condor = enumerator
        .enumerate(StrategyKind::IronCondor)
        .next()
        .expect("condor");
    assert!((condor.fees - 2.6).abs() < 1e-12);
    let put = enumerator
        .enumerate(StrategyKind::SellPut)
        .next()
        .expect("put");
    assert!((put.fees - 0.65).abs() < 1e-12);
}

#[test]
fn take_stops_early() {
    let chain = wide_chain();
    let enumerator = StrategyEnumerator::new(&chain, 100.0, settings(1.0));
    let total = enumerator.enumerate(StrategyKind::IronCondor).count();
    let capped = enumerator.enumerate(StrategyKind::IronCondor).take(2).count();
    assert!(total > 2);
    assert_eq!(capped, 2);
}

fn side_strategy() -> impl Strategy<Value = Option<f64>> {
    prop_oneof![
        1 => Just(None::<f64>),
        1 => Just(Some(f64::NAN)),
        6 => (0.05f64..15.0).prop_map(Some),
    ]
}

fn rows() -> impl Strategy<Value = Vec<OptionQuote>> {
    prop::collection::vec((side_strategy(), side_strategy()), 1..7).prop_map(|sides| {
        sides
            .into_iter()
            .enumerate()
            .map(|(i, (bid, ask))| OptionQuote::new(85.0 + 5.0 * i as f64, bid, ask))
            .collect()
    })
}

proptest! {
    #[test]
    fn candidates_only_use_quoted_touch_prices(
        calls in rows(),
        puts in rows(),
        budget in 50.0f64..2_000.0,
    ) {
        let chain = ExpiryChain::new(calls, puts);
        let settings = settings(budget);
        let enumerator = StrategyEnumerator::new(&chain, 100.0, settings);
        let grid = PriceGrid::linspace(60.0, 140.0, 33).unwrap();

        for kind in StrategyKind::ALL {
            for definition in enumerator.enumerate(kind) {
                for leg in definition.legs() {
                    let (option_kind, strike) = match leg.instrument {
                        Instrument::Call { strike } => (OptionKind::Call, strike),
                        Instrument::Put { strike } => (OptionKind::Put, strike),
                        Instrument::Stock => continue,
                    };
                    let quote = chain.find(option_kind, strike).unwrap();
                    let touch = match leg.side {
                        Side::Buy => quote.ask(),
                        Side::Sell => quote.bid(),
                    };
                    prop_assert_eq!(touch, Some(leg.entry_price));
                }

                let result = evaluate(&definition, &grid, settings.multiplier).unwrap();
                match kind {
                    StrategyKind::BullCallSpread
                    | StrategyKind::BearPutSpread
                    | StrategyKind::Straddle
                    | StrategyKind::CoveredCall => {
                        prop_assert!(result.cost > 0.0);
                        prop_assert!(result.cost <= budget + 1e-6);
                    }
                    StrategyKind::SellPut | StrategyKind::SellCall => {
                        prop_assert!(result.cost < 0.0);
                        prop_assert!(-result.cost <= budget + 1e-6);
                    }
                    StrategyKind::IronCondor => {}
                }
            }
        }
    }
}
