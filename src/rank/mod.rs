use crate::model::{EvaluationResult, RankedCandidate, StrategyDefinition};
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use tracing::debug;

const COST_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CompositeWeights {
    pub return_weight: f64,
    pub profit_weight: f64,
    /// Currency amount that normalises max profit into the same range as the return.
    pub profit_scale: f64,
}

impl Default for CompositeWeights {
    fn default() -> Self {
        Self {
            return_weight: 0.6,
            profit_weight: 0.4,
            profit_scale: 100.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub enum RankKey {
    #[default]
    AvgReturn,
    ProfitProbability,
    /// Max profit over max loss; undefined when either side is unbounded.
    RewardRisk,
    /// `return_weight * max_profit / |cost| + profit_weight * max_profit / profit_scale`.
    Composite(CompositeWeights),
}

impl RankKey {
    /// Score of a result under this key. Non-finite values come back as `None`.
    pub fn score(&self, result: &EvaluationResult) -> Option<f64> {
        let raw = match self {
            RankKey::AvgReturn => result.avg_return,
            RankKey::ProfitProbability => result.profit_probability,
            RankKey::RewardRisk => {
                let profit = result.max_profit.finite()?;
                let loss = result.max_loss.finite().filter(|l| *l > COST_EPSILON)?;
                Some(profit / loss)
            }
            RankKey::Composite(weights) => {
                let profit = result.max_profit.finite()?;
                if result.cost.abs() <= COST_EPSILON || weights.profit_scale == 0.0 {
                    return None;
                }
                let rate = profit / result.cost.abs();
                Some(
                    weights.return_weight * rate
                        + weights.profit_weight * profit / weights.profit_scale,
                )
            }
        };
        raw.filter(|v| v.is_finite())
    }
}

impl Display for RankKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RankKey::AvgReturn => write!(f, "avg-return"),
            RankKey::ProfitProbability => write!(f, "probability"),
            RankKey::RewardRisk => write!(f, "reward-risk"),
            RankKey::Composite(_) => write!(f, "composite"),
        }
    }
}

impl FromStr for RankKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "avg-return" | "return" | "avg_return" => Ok(RankKey::AvgReturn),
            "probability" | "pop" | "profit-probability" => Ok(RankKey::ProfitProbability),
            "reward-risk" | "rr" => Ok(RankKey::RewardRisk),
            "composite" | "score" => Ok(RankKey::Composite(CompositeWeights::default())),
            other => Err(anyhow::anyhow!("unknown rank key: {other}")),
        }
    }
}

/// What happens to candidates whose score is undefined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum MissingScorePolicy {
    #[default]
    SortLast,
    Exclude,
}

impl FromStr for MissingScorePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "last" | "sort-last" => Ok(MissingScorePolicy::SortLast),
            "exclude" | "drop" => Ok(MissingScorePolicy::Exclude),
            other => Err(anyhow::anyhow!("unknown missing-score policy: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Ranker {
    key: RankKey,
    policy: MissingScorePolicy,
}

impl Ranker {
    pub fn new(key: RankKey, policy: MissingScorePolicy) -> Self {
        Self { key, policy }
    }

    /// Score descending, then profit probability descending, then cheaper first.
    /// Undefined values always order after defined ones.
    pub fn rank(
        &self,
        evaluated: Vec<(StrategyDefinition, EvaluationResult)>,
    ) -> Vec<RankedCandidate> {
        let total = evaluated.len();
        let mut ranked: Vec<RankedCandidate> = evaluated
            .into_iter()
            .map(|(definition, result)| RankedCandidate {
                score: self.key.score(&result),
                definition,
                result,
            })
            .filter(|candidate| {
                candidate.score.is_some() || self.policy == MissingScorePolicy::SortLast
            })
            .collect();
        ranked.sort_by(compare);
        debug!(
            target: "rank",
            key = %self.key,
            total,
            kept = ranked.len(),
            "ranked candidates"
        );
        ranked
    }
}

fn compare(a: &RankedCandidate, b: &RankedCandidate) -> Ordering {
    descending(a.score, b.score)
        .then_with(|| descending(a.result.profit_probability, b.result.profit_probability))
        .then_with(|| a.result.cost.total_cmp(&b.result.cost))
}

fn descending(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
