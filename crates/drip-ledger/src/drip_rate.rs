//! # Drip Rate Calculation
//!
//! Turns a priced resource footprint and a fee schedule into a per-second cost.
//!
//! ```text
//! subnet cost  = Σ_k unit_price[k] * usage[k]
//! compute cost = Σ subnet cost
//! drip rate    = compute cost * (100000 + r1 + s + t1 + u + v - w) / 100000 + r2 + t2
//! ```
//!
//! The referral percent `u` is included only if the referral has not expired
//! when the rate is fixed. A fixed rate is never re-evaluated on its own.

use drip_core::{Amount, FeeSchedule, SubnetId, Timestamp};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Usage and unit prices of one subnet
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubnetPricing {
    pub subnet: SubnetId,
    /// Aggregated usage vector of the account on this subnet
    pub usage: Vec<u128>,
    /// Price per unit of each resource kind, per second
    pub unit_prices: Vec<u128>,
}

/// Result of a drip rate computation
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateQuote {
    /// Compute cost per second of each active subnet
    pub subnet_costs: IndexMap<SubnetId, Amount>,

    /// Sum of subnet costs
    pub compute_cost_per_sec: Amount,

    /// Compute cost inflated by percentage fees plus flat fees
    pub drip_rate: Amount,

    /// Time the rate was fixed (decides referral inclusion)
    pub fixed_at: Timestamp,
}

impl RateQuote {
    /// Quote for an empty footprint; flat fees stop with the last app
    pub fn idle(at: Timestamp) -> Self {
        Self {
            subnet_costs: IndexMap::new(),
            compute_cost_per_sec: 0,
            drip_rate: 0,
            fixed_at: at,
        }
    }

    /// Balance needed to keep this rate running for `secs` seconds
    pub fn funding_for(&self, secs: u64) -> Amount {
        self.drip_rate.saturating_mul(secs as u128)
    }
}

/// Drip rate calculator seam
///
/// Implementations must be pure: the same inputs always produce the same quote.
pub trait RateCalculator: Send + Sync {
    /// Compute cost per second of one subnet
    fn subnet_compute_cost(&self, usage: &[u128], unit_prices: &[u128]) -> Amount;

    /// Full quote for a priced footprint
    fn quote(&self, pricing: &[SubnetPricing], fees: &FeeSchedule, at: Timestamp) -> RateQuote {
        if pricing.is_empty() {
            return RateQuote::idle(at);
        }

        let mut subnet_costs = IndexMap::with_capacity(pricing.len());
        let mut compute_cost_per_sec: Amount = 0;

        for entry in pricing {
            let cost = self.subnet_compute_cost(&entry.usage, &entry.unit_prices);
            compute_cost_per_sec = compute_cost_per_sec.saturating_add(cost);
            *subnet_costs.entry(entry.subnet).or_insert(0) += cost;
        }

        RateQuote {
            subnet_costs,
            compute_cost_per_sec,
            drip_rate: fees.drip_rate(compute_cost_per_sec, at),
            fixed_at: at,
        }
    }
}

/// Price-times-usage calculator
///
/// Resource kinds present on only one side (usage or prices) contribute zero.
#[derive(Clone, Copy, Debug, Default)]
pub struct StandardRateCalculator;

impl RateCalculator for StandardRateCalculator {
    fn subnet_compute_cost(&self, usage: &[u128], unit_prices: &[u128]) -> Amount {
        usage
            .iter()
            .zip(unit_prices)
            .fold(0u128, |acc, (quantity, price)| {
                acc.saturating_add(quantity.saturating_mul(*price))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drip_core::FeePair;

    fn pricing(subnet: u64, usage: Vec<u128>, prices: Vec<u128>) -> SubnetPricing {
        SubnetPricing {
            subnet: SubnetId(subnet),
            usage,
            unit_prices: prices,
        }
    }

    #[test]
    fn test_subnet_cost() {
        let calc = StandardRateCalculator;
        assert_eq!(calc.subnet_compute_cost(&[2, 3], &[10, 100]), 320);
    }

    #[test]
    fn test_mismatched_lengths_zero_fill() {
        let calc = StandardRateCalculator;
        assert_eq!(calc.subnet_compute_cost(&[2, 3, 7], &[10]), 20);
        assert_eq!(calc.subnet_compute_cost(&[2], &[10, 50, 50]), 20);
        assert_eq!(calc.subnet_compute_cost(&[], &[10]), 0);
    }

    #[test]
    fn test_quote_without_fees() {
        let calc = StandardRateCalculator;
        let quote = calc.quote(
            &[pricing(1, vec![1, 2], vec![10, 20]), pricing(2, vec![5], vec![3])],
            &FeeSchedule::default(),
            0,
        );

        assert_eq!(quote.subnet_costs[&SubnetId(1)], 50);
        assert_eq!(quote.subnet_costs[&SubnetId(2)], 15);
        assert_eq!(quote.compute_cost_per_sec, 65);
        assert_eq!(quote.drip_rate, 65);
    }

    #[test]
    fn test_quote_with_fees_floors() {
        let calc = StandardRateCalculator;
        let fees = FeeSchedule {
            license: FeePair::new(1_000, 2),
            support: FeePair::new(500, 1),
            dao_percent: 5_000,
            ..Default::default()
        };
        let quote = calc.quote(&[pricing(1, vec![3], vec![11])], &fees, 0);
        // 33 * 106500 / 100000 = 35.145 -> 35, + 3 flat
        assert_eq!(quote.drip_rate, 38);
    }

    #[test]
    fn test_referral_fixed_at_quote_time() {
        let calc = StandardRateCalculator;
        let fees = FeeSchedule {
            referral_percent: 10_000,
            referral_expiry: Some(50),
            ..Default::default()
        };
        let input = [pricing(1, vec![100], vec![1])];

        assert_eq!(calc.quote(&input, &fees, 49).drip_rate, 110);
        assert_eq!(calc.quote(&input, &fees, 50).drip_rate, 100);
    }

    #[test]
    fn test_quote_is_pure() {
        let calc = StandardRateCalculator;
        let fees = FeeSchedule {
            dao_percent: 3_333,
            ..Default::default()
        };
        let input = [pricing(1, vec![7, 9], vec![13, 17])];
        assert_eq!(calc.quote(&input, &fees, 5), calc.quote(&input, &fees, 5));
    }

    #[test]
    fn test_empty_footprint_is_idle() {
        let calc = StandardRateCalculator;
        let fees = FeeSchedule {
            license: FeePair::new(0, 10),
            ..Default::default()
        };
        let quote = calc.quote(&[], &fees, 0);
        assert_eq!(quote.drip_rate, 0);
        assert_eq!(quote.funding_for(60), 0);
    }

    #[test]
    fn test_flat_fees_apply_with_zero_priced_usage() {
        let calc = StandardRateCalculator;
        let fees = FeeSchedule {
            license: FeePair::new(0, 10),
            ..Default::default()
        };
        let quote = calc.quote(&[pricing(1, vec![4], vec![0])], &fees, 0);
        assert_eq!(quote.drip_rate, 10);
        assert_eq!(quote.funding_for(60), 600);
    }
}
