//! # Revenue Distribution
//!
//! Splits settled cost into stakeholder shares.
//!
//! ## Waterfall
//!
//! | Step | Component | Amount |
//! |------|-----------|--------|
//! | 1 | License | C * r1 / 100000 + r2 * Δ |
//! | 2 | DAO | C * s / 100000 |
//! | 3 | Support | C * t1 / 100000 + t2 * Δ |
//! | 4 | Referral | C * u / 100000, prorated to the pre-expiry part of Δ |
//! | 5 | Platform | C * (v - w) / 100000 |
//! | 6 | Compute | remainder, split across subnets |
//!
//! Each step is capped by what earlier steps left, so the components always
//! sum to exactly `C`. Floor remainders and any forfeited referral share land
//! in the compute remainder.

use crate::balance::PendingRevenue;
use drip_core::{mul_div, percent_of, Amount, FeeSchedule, SubnetId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Shares of one distributed window
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevenueSplit {
    /// Settled amount being distributed (C)
    pub settled: Amount,

    /// Window length in seconds (Δ)
    pub duration: u64,

    pub license: Amount,
    pub dao: Amount,
    pub support: Amount,
    pub referral: Amount,
    pub platform: Amount,

    /// Compute remainder per subnet
    pub subnet_shares: IndexMap<SubnetId, Amount>,

    /// Compute remainder with no subnet attribution (flat-fee-only windows)
    pub unattributed: Amount,
}

impl RevenueSplit {
    /// License + DAO + support + referral + platform
    pub fn fee_total(&self) -> Amount {
        self.license + self.dao + self.support + self.referral + self.platform
    }

    /// Compute remainder, attributed or not
    pub fn compute_total(&self) -> Amount {
        self.subnet_shares.values().sum::<Amount>() + self.unattributed
    }

    pub fn total(&self) -> Amount {
        self.fee_total() + self.compute_total()
    }
}

/// Revenue distributor seam
pub trait RevenueDistributor: Send + Sync {
    /// Split a pending window; the parts must sum to `pending.amount`
    fn split(&self, pending: &PendingRevenue, fees: &FeeSchedule) -> RevenueSplit;
}

/// Fixed-order fee waterfall
#[derive(Clone, Copy, Debug, Default)]
pub struct WaterfallDistributor;

fn take(left: &mut Amount, want: Amount) -> Amount {
    let taken = want.min(*left);
    *left -= taken;
    taken
}

/// Split `amount` by weight, last entry absorbing the floor remainder
pub fn split_by_weight<K: Copy + std::hash::Hash + Eq>(
    amount: Amount,
    weights: &IndexMap<K, Amount>,
) -> Option<IndexMap<K, Amount>> {
    let total: Amount = weights.values().sum();
    if total == 0 {
        return None;
    }

    let mut left = amount;
    let last = weights.iter().rposition(|(_, w)| *w > 0)?;
    let shares = weights
        .iter()
        .enumerate()
        .filter(|(_, (_, w))| **w > 0)
        .map(|(i, (key, weight))| {
            let share = if i == last {
                left
            } else {
                mul_div(amount, *weight, total)
            };
            left -= share;
            (*key, share)
        })
        .collect();
    Some(shares)
}

impl RevenueDistributor for WaterfallDistributor {
    fn split(&self, pending: &PendingRevenue, fees: &FeeSchedule) -> RevenueSplit {
        let settled = pending.amount;
        let duration = pending.duration();
        let mut left = settled;

        let license = take(&mut left, fees.license.charge(settled, duration));
        let dao = take(&mut left, percent_of(settled, fees.dao_percent));
        let support = take(&mut left, fees.support.charge(settled, duration));

        let referral_full = percent_of(settled, fees.referral_percent);
        let referral_secs = fees.referral_seconds(pending.window_start, pending.window_end);
        let referral_due = if duration == 0 {
            if fees.referral_active(pending.window_end) {
                referral_full
            } else {
                0
            }
        } else {
            mul_div(referral_full, referral_secs as u128, duration as u128)
        };
        let referral = take(&mut left, referral_due);

        let platform = take(&mut left, percent_of(settled, fees.platform_net_percent()));

        let (subnet_shares, unattributed) = match split_by_weight(left, &pending.by_subnet) {
            Some(shares) => (shares, 0),
            None => (IndexMap::new(), left),
        };

        RevenueSplit {
            settled,
            duration,
            license,
            dao,
            support,
            referral,
            platform,
            subnet_shares,
            unattributed,
        }
    }
}
