use crate::model::StrategyError;
use serde::Serialize;
use std::ops::Deref;

/// Strictly increasing set of hypothetical underlying prices at expiry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceGrid {
    prices: Vec<f64>,
}

impl PriceGrid {
    /// `min, min + step, ...` up to and including the first value `>= max`.
    pub fn stepped(min: f64, max: f64, step: f64) -> Result<Self, StrategyError> {
        if !min.is_finite() || !max.is_finite() || !step.is_finite() {
            return Err(StrategyError::range("grid bounds must be finite"));
        }
        if min >= max {
            return Err(StrategyError::range(format!(
                "min {min} must be below max {max}"
            )));
        }
        if step <= 0.0 {
            return Err(StrategyError::range(format!("step {step} must be positive")));
        }

        // Index-based so the last point does not drift with repeated addition.
        let mut prices: Vec<f64> = Vec::new();
        let mut i = 0u32;
        loop {
            let price = min + f64::from(i) * step;
            if prices.last().is_some_and(|prev| price <= *prev) {
                return Err(StrategyError::range(format!(
                    "step {step} is below the float resolution at {price}"
                )));
            }
            prices.push(price);
            if price >= max {
                break;
            }
            i = i
                .checked_add(1)
                .ok_or_else(|| StrategyError::range(format!("step {step} yields too many points")))?;
        }
        Ok(Self { prices })
    }

    /// `count` evenly spaced points with both ends included.
    pub fn linspace(lo: f64, hi: f64, count: usize) -> Result<Self, StrategyError> {
        if !lo.is_finite() || !hi.is_finite() {
            return Err(StrategyError::range("grid bounds must be finite"));
        }
        if lo >= hi {
            return Err(StrategyError::range(format!("low {lo} must be below high {hi}")));
        }
        if count < 2 {
            return Err(StrategyError::range(format!(
                "count {count} must be at least 2"
            )));
        }
        let span = hi - lo;
        let last = (count - 1) as f64;
        let prices = (0..count)
            .map(|i| {
                if i == count - 1 {
                    hi
                } else {
                    lo + span * (i as f64 / last)
                }
            })
            .collect();
        Ok(Self { prices })
    }

    /// Linspace over `[spot * (1 - width), spot * (1 + width)]`.
    pub fn around(spot: f64, width: f64, count: usize) -> Result<Self, StrategyError> {
        if !spot.is_finite() || spot <= 0.0 {
            return Err(StrategyError::range(format!("spot {spot} must be positive")));
        }
        if !(width > 0.0 && width < 1.0) {
            return Err(StrategyError::range(format!(
                "width {width} must lie strictly between 0 and 1"
            )));
        }
        Self::linspace(spot * (1.0 - width), spot * (1.0 + width), count)
    }

    pub fn prices(&self) -> &[f64] {
        &self.prices
    }

    pub fn first(&self) -> f64 {
        self.prices[0]
    }

    pub fn last(&self) -> f64 {
        self.prices[self.prices.len() - 1]
    }
}

impl Deref for PriceGrid {
    type Target = [f64];

    fn deref(&self) -> &Self::Target {
        &self.prices
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[test]
    fn stepped_includes_upper_bound_when_step_misses_it() {
        let grid = PriceGrid::stepped(90.0, 95.0, 2.0).expect("grid");
        assert_eq!(grid.prices(), &[90.0, 92.0, 94.0, 96.0]);
    }

    #[test]
    fn linspace_hits_both_ends() {
        let grid = PriceGrid::linspace(70.0, 130.0, 200).expect("grid");
        assert_eq!(grid.len(), 200);
        assert_eq!(grid.first(), 70.0);
        assert_eq!(grid.last(), 130.0);
    }

    #[rstest]
    #[case(100.0, 100.0, 1.0)]
    #[case(110.0, 100.0, 1.0)]
    #[case(90.0, 100.0, 0.0)]
    #[case(90.0, 100.0, -2.0)]
    #[case(f64::NAN, 100.0, 1.0)]
    #[case(1e16, 1e16 + 8.0, 1.0)]
    fn stepped_rejects_bad_ranges(#[case] min: f64, #[case] max: f64, #[case] step: f64) {
        assert!(matches!(
            PriceGrid::stepped(min, max, step),
            Err(StrategyError::InvalidRange(_))
        ));
    }

    #[rstest]
    #[case(1)]
    #[case(0)]
    fn linspace_rejects_short_counts(#[case] count: usize) {
        assert!(PriceGrid::linspace(1.0, 2.0, count).is_err());
    }

    #[test]
    fn around_rejects_non_positive_spot() {
        assert!(PriceGrid::around(0.0, 0.3, 200).is_err());
        assert!(PriceGrid::around(100.0, 1.5, 200).is_err());
    }

    proptest! {
        #[test]
        fn stepped_grid_is_strictly_increasing(
            min in -500.0f64..500.0,
            span in 0.01f64..300.0,
            step in 0.05f64..25.0,
        ) {
            let max = min + span;
            let grid = PriceGrid::stepped(min, max, step).unwrap();
            prop_assert_eq!(grid.first(), min);
            prop_assert!(grid.last() >= max);
            prop_assert!(grid.windows(2).all(|w| w[0] < w[1]));
        }

        #[test]
        fn linspace_grid_is_strictly_increasing(
            lo in 1.0f64..500.0,
            span in 0.5f64..300.0,
            count in 2usize..400,
        ) {
            let grid = PriceGrid::linspace(lo, lo + span, count).unwrap();
            prop_assert_eq!(grid.len(), count);
            prop_assert!(grid.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
