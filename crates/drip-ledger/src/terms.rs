//! # Fee Terms Registry
//!
//! Fee terms published by licensors, support providers, referrers and
//! platforms. A subscription can only select registered addresses; its
//! `FeeSchedule` is copied from here at subscription time.
//!
//! | Role | Terms |
//! |------|-------|
//! | Licensor | percent + flat per second |
//! | Support provider | default percent + flat per second |
//! | Referrer | percent + referral duration |
//! | Platform | percent + discount |

use drip_core::{Address, FeePair, FeeSchedule, LedgerError, Result, Timestamp};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Referrer terms
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralTerms {
    pub percent: u32,
    /// Seconds after subscription during which the referral earns
    pub duration_secs: u64,
}

/// Platform terms
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformTerms {
    pub percent: u32,
    /// Discount granted to subscribers, subtracted from `percent`
    pub discount: u32,
}

/// Addresses a subscription selects its fees from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSelection {
    pub license: Address,
    pub support: Address,
    pub referrer: Address,
    pub platform: Address,
}

/// Admin-maintained fee terms
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FeeTermsRegistry {
    licenses: IndexMap<Address, FeePair>,
    supports: IndexMap<Address, FeePair>,
    referrers: IndexMap<Address, ReferralTerms>,
    platforms: IndexMap<Address, PlatformTerms>,
}

impl FeeTermsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_license(&mut self, licensor: Address, fee: FeePair) {
        self.licenses.insert(licensor, fee);
    }

    pub fn register_support(&mut self, provider: Address, fee: FeePair) {
        self.supports.insert(provider, fee);
    }

    pub fn register_referrer(&mut self, referrer: Address, terms: ReferralTerms) {
        self.referrers.insert(referrer, terms);
    }

    pub fn register_platform(&mut self, platform: Address, terms: PlatformTerms) {
        self.platforms.insert(platform, terms);
    }

    pub fn license(&self, licensor: &Address) -> Result<FeePair> {
        self.licenses
            .get(licensor)
            .copied()
            .ok_or(LedgerError::UnregisteredLicense(*licensor))
    }

    pub fn support(&self, provider: &Address) -> Result<FeePair> {
        self.supports
            .get(provider)
            .copied()
            .ok_or(LedgerError::UnregisteredSupport(*provider))
    }

    pub fn referrer(&self, referrer: &Address) -> Result<ReferralTerms> {
        self.referrers
            .get(referrer)
            .copied()
            .ok_or(LedgerError::UnregisteredReferrer(*referrer))
    }

    pub fn platform(&self, platform: &Address) -> Result<PlatformTerms> {
        self.platforms
            .get(platform)
            .copied()
            .ok_or(LedgerError::UnregisteredPlatform(*platform))
    }

    /// Build the fee schedule for a selection fixed at `now`
    ///
    /// Fails on the first unregistered address; nothing is recorded.
    pub fn schedule_for(
        &self,
        selection: &FeeSelection,
        dao_percent: u32,
        now: Timestamp,
    ) -> Result<FeeSchedule> {
        let license = self.license(&selection.license)?;
        let support = self.support(&selection.support)?;
        let referral = self.referrer(&selection.referrer)?;
        let platform = self.platform(&selection.platform)?;

        Ok(FeeSchedule {
            license,
            support,
            referral_percent: referral.percent,
            referral_expiry: Some(now.saturating_add(referral.duration_secs)),
            platform_percent: platform.percent,
            discount_percent: platform.discount,
            dao_percent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selection() -> FeeSelection {
        FeeSelection {
            license: Address::from_label("licensor"),
            support: Address::from_label("support"),
            referrer: Address::from_label("referrer"),
            platform: Address::from_label("platform"),
        }
    }

    fn registry() -> FeeTermsRegistry {
        let s = selection();
        let mut registry = FeeTermsRegistry::new();
        registry.register_license(s.license, FeePair::new(1_000, 10));
        registry.register_support(s.support, FeePair::new(2_000, 0));
        registry.register_referrer(s.referrer, ReferralTerms { percent: 3_000, duration_secs: 100 });
        registry.register_platform(s.platform, PlatformTerms { percent: 4_000, discount: 1_000 });
        registry
    }

    #[test]
    fn test_schedule_for_selection() {
        let schedule = registry().schedule_for(&selection(), 5_000, 50).unwrap();

        assert_eq!(schedule.license, FeePair::new(1_000, 10));
        assert_eq!(schedule.referral_expiry, Some(150));
        assert_eq!(schedule.platform_net_percent(), 3_000);
        assert_eq!(schedule.dao_percent, 5_000);
    }

    #[test]
    fn test_unregistered_support_rejected() {
        let mut s = selection();
        s.support = Address::from_label("stranger");

        let err = registry().schedule_for(&s, 5_000, 0).unwrap_err();
        assert_eq!(err, LedgerError::UnregisteredSupport(s.support));
    }

    #[test]
    fn test_unregistered_referrer_rejected() {
        let mut s = selection();
        s.referrer = Address::from_label("stranger");
        assert!(matches!(
            registry().schedule_for(&s, 0, 0),
            Err(LedgerError::UnregisteredReferrer(_))
        ));
    }
}
