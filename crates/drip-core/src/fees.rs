//! # Fee Schedule
//!
//! Per-account fee selections and the fixed point helpers used to compose them.
//!
//! ## Fee Components
//!
//! | Component | Percent | Flat per second | Recipient |
//! |-----------|---------|-----------------|-----------|
//! | License | r1 | r2 | licensor |
//! | DAO | s | - | global DAO |
//! | Support | t1 | t2 | support provider |
//! | Referral | u (until expiry) | - | referrer |
//! | Platform | v - w | - | platform |
//!
//! Percentages are parts-per-100000. Every division floors.

use crate::types::{Amount, Timestamp};
use serde::{Deserialize, Serialize};

/// Denominator of every percentage (100000 = 100%)
pub const PERCENT_DENOMINATOR: u128 = 100_000;

/// `amount * percent / 100000`, floored
pub fn percent_of(amount: Amount, percent: u32) -> Amount {
    amount.saturating_mul(percent as u128) / PERCENT_DENOMINATOR
}

/// `amount * numerator / denominator`, floored; zero for a zero denominator
///
/// Falls back to a split computation when the product overflows `u128`.
pub fn mul_div(amount: Amount, numerator: Amount, denominator: Amount) -> Amount {
    if denominator == 0 {
        return 0;
    }
    match amount.checked_mul(numerator) {
        Some(product) => product / denominator,
        None => (amount / denominator)
            .saturating_mul(numerator)
            .saturating_add((amount % denominator).saturating_mul(numerator) / denominator),
    }
}

/// Percentage plus flat per-second fee
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeePair {
    /// Parts-per-100000 of settled cost
    pub percent: u32,
    /// Flat amount per second
    pub flat_per_sec: Amount,
}

impl FeePair {
    pub const fn new(percent: u32, flat_per_sec: Amount) -> Self {
        Self {
            percent,
            flat_per_sec,
        }
    }

    /// Percent share of `amount` plus the flat fee over `elapsed` seconds
    pub fn charge(&self, amount: Amount, elapsed: u64) -> Amount {
        percent_of(amount, self.percent).saturating_add(self.flat_per_sec.saturating_mul(elapsed as u128))
    }
}

/// Fee selections fixed on an account
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    /// License fee (r1, r2)
    pub license: FeePair,

    /// Support fee (t1, t2)
    pub support: FeePair,

    /// Referral percent (u)
    pub referral_percent: u32,

    /// Referral stops earning at this timestamp
    pub referral_expiry: Option<Timestamp>,

    /// Platform percent (v)
    pub platform_percent: u32,

    /// Platform discount percent (w)
    pub discount_percent: u32,

    /// Global DAO percent (s)
    pub dao_percent: u32,
}

impl FeeSchedule {
    /// Platform percent net of discount (v - w, never negative)
    pub fn platform_net_percent(&self) -> u32 {
        self.platform_percent.saturating_sub(self.discount_percent)
    }

    /// Whether the referral still earns at `at`
    pub fn referral_active(&self, at: Timestamp) -> bool {
        self.referral_expiry.map_or(false, |expiry| at < expiry)
    }

    /// Referral percent if active at `at`, zero otherwise
    pub fn effective_referral_percent(&self, at: Timestamp) -> u32 {
        if self.referral_active(at) {
            self.referral_percent
        } else {
            0
        }
    }

    /// `100000 + r1 + s + t1 + u_or_0 + (v - w)`
    pub fn rate_multiplier(&self, at: Timestamp) -> u128 {
        PERCENT_DENOMINATOR
            + self.license.percent as u128
            + self.dao_percent as u128
            + self.support.percent as u128
            + self.effective_referral_percent(at) as u128
            + self.platform_net_percent() as u128
    }

    /// `r2 + t2`
    pub fn flat_per_sec(&self) -> Amount {
        self.license
            .flat_per_sec
            .saturating_add(self.support.flat_per_sec)
    }

    /// Drip rate for a compute cost per second, fixed at `at`
    pub fn drip_rate(&self, compute_cost_per_sec: Amount, at: Timestamp) -> Amount {
        compute_cost_per_sec.saturating_mul(self.rate_multiplier(at)) / PERCENT_DENOMINATOR
            + self.flat_per_sec()
    }

    /// Seconds of the window `[start, end)` that fall before the referral expiry
    pub fn referral_seconds(&self, start: Timestamp, end: Timestamp) -> u64 {
        match self.referral_expiry {
            Some(expiry) if expiry > start => expiry.min(end).saturating_sub(start),
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule() -> FeeSchedule {
        FeeSchedule {
            license: FeePair::new(1_000, 10),
            support: FeePair::new(2_000, 5),
            referral_percent: 3_000,
            referral_expiry: Some(100),
            platform_percent: 4_000,
            discount_percent: 1_000,
            dao_percent: 5_000,
        }
    }

    #[test]
    fn test_percent_of_floors() {
        assert_eq!(percent_of(1_000, 5_000), 50);
        assert_eq!(percent_of(19, 5_000), 0);
        assert_eq!(percent_of(39, 5_000), 1);
    }

    #[test]
    fn test_mul_div() {
        assert_eq!(mul_div(10, 3, 4), 7);
        assert_eq!(mul_div(10, 3, 0), 0);
        assert_eq!(mul_div(u128::MAX, 2, 4), u128::MAX / 2);
    }

    #[test]
    fn test_rate_multiplier_with_referral() {
        let fees = schedule();
        assert_eq!(fees.rate_multiplier(0), 100_000 + 1_000 + 5_000 + 2_000 + 3_000 + 3_000);
        assert_eq!(fees.rate_multiplier(100), 100_000 + 1_000 + 5_000 + 2_000 + 3_000);
    }

    #[test]
    fn test_drip_rate_formula() {
        let fees = schedule();
        // 1000 * 114000 / 100000 + 15
        assert_eq!(fees.drip_rate(1_000, 0), 1_140 + 15);
        assert_eq!(fees.drip_rate(0, 0), 15);
    }

    #[test]
    fn test_discount_never_negative() {
        let fees = FeeSchedule {
            platform_percent: 1_000,
            discount_percent: 5_000,
            ..Default::default()
        };
        assert_eq!(fees.platform_net_percent(), 0);
    }

    #[test]
    fn test_referral_seconds() {
        let fees = schedule();
        assert_eq!(fees.referral_seconds(0, 50), 50);
        assert_eq!(fees.referral_seconds(80, 120), 20);
        assert_eq!(fees.referral_seconds(100, 120), 0);

        let none = FeeSchedule::default();
        assert_eq!(none.referral_seconds(0, 50), 0);
    }

    #[test]
    fn test_fee_pair_charge() {
        let pair = FeePair::new(10_000, 3);
        assert_eq!(pair.charge(1_000, 4), 100 + 12);
    }
}
