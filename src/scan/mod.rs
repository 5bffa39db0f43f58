use crate::chain::ExpiryChain;
use crate::config::AppConfig;
use crate::enumerate::StrategyEnumerator;
use crate::grid::PriceGrid;
use crate::model::{RankedCandidate, StrategyDefinition, StrategyKind};
use crate::payoff::PayoffModel;
use crate::rank::Ranker;
use anyhow::{anyhow, Result};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct KindCounts {
    pub kind: StrategyKind,
    pub enumerated: usize,
    pub evaluated: usize,
    pub failed: usize,
}

#[derive(Debug, Clone)]
pub struct ScanReport {
    pub spot: f64,
    pub grid: PriceGrid,
    pub ranked: Vec<RankedCandidate>,
    pub counts: Vec<KindCounts>,
}

impl ScanReport {
    pub fn enumerated(&self) -> usize {
        self.counts.iter().map(|c| c.enumerated).sum()
    }
}

/// Runs enumeration, evaluation and ranking over one expiry.
pub struct StrategyScanner<'a> {
    config: &'a AppConfig,
}

impl<'a> StrategyScanner<'a> {
    pub fn new(config: &'a AppConfig) -> Self {
        Self { config }
    }

    pub fn scan(&self, chain: &ExpiryChain, spot: f64) -> Result<ScanReport> {
        if !spot.is_finite() || spot <= 0.0 {
            return Err(anyhow!("spot {spot} must be positive"));
        }
        let grid = self.config.grid.build(spot)?;
        let model = PayoffModel::new(self.config.multiplier)
            .with_probability(self.config.probability.model(spot)?);

        let narrowed;
        let chain = match (self.config.min_strike, self.config.max_strike) {
            (None, None) => chain,
            (lo, hi) => {
                narrowed = chain.within_strikes(
                    lo.unwrap_or(f64::NEG_INFINITY),
                    hi.unwrap_or(f64::INFINITY),
                );
                &narrowed
            }
        };
        let enumerator = StrategyEnumerator::new(chain, spot, self.config.enumerator_settings());

        let mut evaluated = Vec::new();
        let mut counts = Vec::with_capacity(self.config.strategies.len());
        for &kind in &self.config.strategies {
            let candidates: Vec<StrategyDefinition> = enumerator
                .enumerate(kind)
                .take(self.config.max_candidates)
                .collect();
            let enumerated = candidates.len();

            let outcomes: Vec<_> = candidates
                .into_par_iter()
                .map(|definition| {
                    let result = model.evaluate(&definition, &grid);
                    (definition, result)
                })
                .collect();

            let mut failed = 0;
            for (definition, outcome) in outcomes {
                match outcome {
                    Ok(result) => evaluated.push((definition, result)),
                    Err(err) => {
                        failed += 1;
                        warn!(
                            target: "scan.kind",
                            strategy = %definition.describe(),
                            error = %err,
                            "evaluation failed"
                        );
                    }
                }
            }

            info!(
                target: "scan.kind",
                kind = %kind,
                enumerated,
                failed,
                capped = enumerated == self.config.max_candidates,
                "evaluated candidates"
            );
            counts.push(KindCounts {
                kind,
                enumerated,
                evaluated: enumerated - failed,
                failed,
            });
        }

        let ranked = Ranker::new(self.config.rank_key, self.config.missing_score).rank(evaluated);
        info!(
            target: "scan",
            spot,
            grid_points = grid.len(),
            ranked = ranked.len(),
            rank_by = %self.config.rank_key,
            "scan complete"
        );
        Ok(ScanReport {
            spot,
            grid,
            ranked,
            counts,
        })
    }
}
