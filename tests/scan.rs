use optstrat::chain::{ChainSnapshot, ExpiryChain, OptionQuote};
use optstrat::config::{AppConfig, GridSpec, ProbabilitySpec};
use optstrat::model::StrategyKind;
use optstrat::rank::{MissingScorePolicy, RankKey};
use optstrat::scan::StrategyScanner;
use std::io::Write;

fn chain() -> ExpiryChain {
    let strikes = [90.0, 95.0, 100.0, 105.0, 110.0];
    let calls = strikes
        .iter()
        .map(|&k: &f64| {
            let bid = (100.0 - k).max(0.0) + 1.5;
            OptionQuote::new(k, Some(bid), Some(bid + 0.3))
        })
        .collect();
    let puts = strikes
        .iter()
        .map(|&k: &f64| {
            let bid = (k - 100.0).max(0.0) + 1.5;
            OptionQuote::new(k, Some(bid), Some(bid + 0.3))
        })
        .collect();
    ExpiryChain::new(calls, puts)
}

fn config() -> AppConfig {
    AppConfig {
        budget: 1_000.0,
        grid: GridSpec::Stepped {
            min: 80.0,
            max: 120.0,
            step: 1.0,
        },
        ..AppConfig::default()
    }
}

#[test]
fn ranked_output_is_sorted_by_score() {
    let config = config();
    let report = StrategyScanner::new(&config)
        .scan(&chain(), 100.0)
        .expect("scan");

    assert!(!report.ranked.is_empty());
    assert_eq!(report.counts.len(), StrategyKind::ALL.len());
    assert_eq!(report.grid.len(), 41);
    let scores: Vec<_> = report.ranked.iter().map(|c| c.score).collect();
    let defined = scores.iter().take_while(|s| s.is_some()).count();
    assert!(scores[defined..].iter().all(|s| s.is_none()));
    for pair in scores[..defined].windows(2) {
        assert!(pair[0] >= pair[1], "{pair:?}");
    }
    let evaluated: usize = report.counts.iter().map(|c| c.evaluated).sum();
    assert_eq!(evaluated, report.ranked.len());
}

#[test]
fn candidate_cap_applies_per_kind() {
    let config = AppConfig {
        strategies: vec![StrategyKind::IronCondor, StrategyKind::SellPut],
        max_candidates: 1,
        ..config()
    };
    let report = StrategyScanner::new(&config)
        .scan(&chain(), 100.0)
        .expect("scan");
    assert!(report.counts.iter().all(|c| c.enumerated <= 1));
    assert_eq!(report.ranked.len(), 2);
}

#[test]
fn strike_window_narrows_the_chain() {
    let config = AppConfig {
        strategies: vec![StrategyKind::SellPut],
        min_strike: Some(95.0),
        max_strike: Some(100.0),
        ..config()
    };
    let report = StrategyScanner::new(&config)
        .scan(&chain(), 100.0)
        .expect("scan");
    let mut strikes: Vec<f64> = report
        .ranked
        .iter()
        .map(|c| c.definition.strikes()[0])
        .collect();
    strikes.sort_by(f64::total_cmp);
    assert_eq!(strikes, vec![95.0, 100.0]);
}

#[test]
fn excluded_scores_are_dropped() {
    let config = AppConfig {
        strategies: vec![StrategyKind::SellCall, StrategyKind::BullCallSpread],
        rank_key: RankKey::RewardRisk,
        missing_score: MissingScorePolicy::Exclude,
        ..config()
    };
    let report = StrategyScanner::new(&config)
        .scan(&chain(), 100.0)
        .expect("scan");
    assert!(!report.ranked.is_empty());
    assert!(report
        .ranked
        .iter()
        .all(|c| c.definition.kind() == StrategyKind::BullCallSpread && c.score.is_some()));
}

#[test]
fn normal_probability_is_used_when_configured() {
    let config = AppConfig {
        strategies: vec![StrategyKind::Straddle],
        probability: ProbabilitySpec::Normal {
            iv: 0.3,
            days: 30.0,
        },
        ..config()
    };
    let report = StrategyScanner::new(&config)
        .scan(&chain(), 100.0)
        .expect("scan");
    for candidate in &report.ranked {
        let p = candidate.result.profit_probability.expect("probability");
        assert!((0.0..=1.0).contains(&p));
    }
}

#[test]
fn bad_spot_and_grid_are_errors() {
    let config = config();
    assert!(StrategyScanner::new(&config).scan(&chain(), 0.0).is_err());

    let config = AppConfig {
        grid: GridSpec::Around {
            width: 1.5,
            points: 50,
        },
        ..config
    };
    assert!(StrategyScanner::new(&config).scan(&chain(), 100.0).is_err());
}

#[test]
fn scans_a_json_snapshot_end_to_end() {
    let mut snapshot = ChainSnapshot::new("TEST", Some(100.0));
    let expiry = chrono::NaiveDate::from_ymd_opt(2025, 3, 21).expect("date");
    snapshot.insert(expiry, chain());

    let mut file = tempfile::Builder::new()
        .suffix(".json")
        .tempfile()
        .expect("temp");
    file.write_all(serde_json::to_string(&snapshot).expect("json").as_bytes())
        .expect("write");
    file.flush().expect("flush");

    let loaded = ChainSnapshot::load(file.path()).expect("load");
    let (date, expiry_chain) = loaded.expiry(None).expect("expiry");
    assert_eq!(date, expiry);
    let spot = loaded.underlying_price.expect("spot");

    let config = config();
    let report = StrategyScanner::new(&config)
        .scan(expiry_chain, spot)
        .expect("scan");
    assert!(report.enumerated() > 0);
}
