//! # Resource Footprint
//!
//! Per-account resource usage, grouped by subnet and app.
//!
//! Each app declares a resource quantity vector and a multiplier vector. The
//! subnet-level usage vector that prices are applied to is the sum over apps
//! of `resources[k] * multipliers[k]`. A resource index beyond an app's
//! multiplier vector contributes zero.

use drip_core::{AppId, LedgerError, LimitsConfig, Result, SubnetId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Resource usage of one app
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppUsage {
    /// Resource quantities, indexed by resource kind
    pub resources: Vec<u128>,
    /// Per-resource multipliers (replicas, tiers)
    pub multipliers: Vec<u128>,
}

impl AppUsage {
    pub fn new(resources: Vec<u128>, multipliers: Vec<u128>) -> Self {
        Self {
            resources,
            multipliers,
        }
    }

    /// `resources[k] * multipliers[k]`, zero when either side is missing
    pub fn weighted(&self, k: usize) -> u128 {
        match (self.resources.get(k), self.multipliers.get(k)) {
            (Some(quantity), Some(multiplier)) => quantity.saturating_mul(*multiplier),
            _ => 0,
        }
    }
}

/// Apps of one account on one subnet
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetUsage {
    apps: IndexMap<AppId, AppUsage>,
}

impl SubnetUsage {
    pub fn apps(&self) -> impl Iterator<Item = (&AppId, &AppUsage)> {
        self.apps.iter()
    }

    pub fn app(&self, app: AppId) -> Option<&AppUsage> {
        self.apps.get(&app)
    }

    pub fn app_count(&self) -> usize {
        self.apps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }

    /// Subnet-level usage vector summed over apps
    pub fn aggregate(&self) -> Vec<u128> {
        let width = self
            .apps
            .values()
            .map(|usage| usage.resources.len())
            .max()
            .unwrap_or(0);

        (0..width)
            .map(|k| {
                self.apps
                    .values()
                    .fold(0u128, |acc, usage| acc.saturating_add(usage.weighted(k)))
            })
            .collect()
    }
}

/// All subnets an account consumes, in activation order
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Footprint {
    subnets: IndexMap<SubnetId, SubnetUsage>,
}

impl Footprint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subnets(&self) -> impl Iterator<Item = (&SubnetId, &SubnetUsage)> {
        self.subnets.iter()
    }

    pub fn subnet(&self, subnet: SubnetId) -> Option<&SubnetUsage> {
        self.subnets.get(&subnet)
    }

    pub fn subnet_count(&self) -> usize {
        self.subnets.len()
    }

    pub fn app_count(&self) -> usize {
        self.subnets.values().map(SubnetUsage::app_count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.subnets.is_empty()
    }

    /// Add a new app, activating its subnet if needed
    pub fn add_app(
        &mut self,
        subnet: SubnetId,
        app: AppId,
        usage: AppUsage,
        limits: &LimitsConfig,
    ) -> Result<()> {
        if let Some(existing) = self.subnets.get(&subnet) {
            if existing.apps.contains_key(&app) {
                return Err(LedgerError::AppExists { subnet, app });
            }
        } else if self.subnets.len() >= limits.max_subnets_per_account {
            return Err(LedgerError::TooManySubnets {
                max: limits.max_subnets_per_account,
            });
        }

        if self.app_count() >= limits.max_apps_per_account {
            return Err(LedgerError::TooManyApps {
                max: limits.max_apps_per_account,
            });
        }

        self.subnets.entry(subnet).or_default().apps.insert(app, usage);
        Ok(())
    }

    /// Replace the usage of an existing app, returning the previous usage
    pub fn update_app(&mut self, subnet: SubnetId, app: AppId, usage: AppUsage) -> Result<AppUsage> {
        let slot = self
            .subnets
            .get_mut(&subnet)
            .and_then(|s| s.apps.get_mut(&app))
            .ok_or(LedgerError::AppNotFound { subnet, app })?;
        Ok(std::mem::replace(slot, usage))
    }

    /// Remove an app; the subnet is deactivated once it has no apps left
    pub fn remove_app(&mut self, subnet: SubnetId, app: AppId) -> Result<AppUsage> {
        let usage = self
            .subnets
            .get_mut(&subnet)
            .and_then(|s| s.apps.shift_remove(&app))
            .ok_or(LedgerError::AppNotFound { subnet, app })?;

        if self.subnets.get(&subnet).map_or(false, SubnetUsage::is_empty) {
            self.subnets.shift_remove(&subnet);
        }
        Ok(usage)
    }

    /// Deactivate a subnet and all of its apps
    pub fn remove_subnet(&mut self, subnet: SubnetId) -> Result<SubnetUsage> {
        self.subnets
            .shift_remove(&subnet)
            .ok_or(LedgerError::SubnetNotActive(subnet))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(subnets: usize, apps: usize) -> LimitsConfig {
        LimitsConfig {
            max_subnets_per_account: subnets,
            max_apps_per_account: apps,
        }
    }

    #[test]
    fn test_aggregate_sums_weighted_apps() {
        let mut footprint = Footprint::new();
        let l = limits(4, 8);
        footprint
            .add_app(SubnetId(1), AppId(1), AppUsage::new(vec![2, 3], vec![1, 2]), &l)
            .unwrap();
        footprint
            .add_app(SubnetId(1), AppId(2), AppUsage::new(vec![1, 1, 5], vec![3, 1, 1]), &l)
            .unwrap();

        let usage = footprint.subnet(SubnetId(1)).unwrap().aggregate();
        assert_eq!(usage, vec![2 + 3, 6 + 1, 5]);
    }

    #[test]
    fn test_short_multiplier_vector_contributes_zero() {
        let usage = AppUsage::new(vec![4, 4, 4], vec![2]);
        assert_eq!(usage.weighted(0), 8);
        assert_eq!(usage.weighted(1), 0);
        assert_eq!(usage.weighted(2), 0);
    }

    #[test]
    fn test_subnet_limit() {
        let mut footprint = Footprint::new();
        let l = limits(1, 8);
        footprint
            .add_app(SubnetId(1), AppId(1), AppUsage::default(), &l)
            .unwrap();
        // same subnet is fine
        footprint
            .add_app(SubnetId(1), AppId(2), AppUsage::default(), &l)
            .unwrap();

        let err = footprint
            .add_app(SubnetId(2), AppId(3), AppUsage::default(), &l)
            .unwrap_err();
        assert_eq!(err, LedgerError::TooManySubnets { max: 1 });
        assert_eq!(footprint.subnet_count(), 1);
    }

    #[test]
    fn test_app_limit() {
        let mut footprint = Footprint::new();
        let l = limits(4, 2);
        footprint.add_app(SubnetId(1), AppId(1), AppUsage::default(), &l).unwrap();
        footprint.add_app(SubnetId(2), AppId(2), AppUsage::default(), &l).unwrap();

        let err = footprint
            .add_app(SubnetId(3), AppId(3), AppUsage::default(), &l)
            .unwrap_err();
        assert_eq!(err, LedgerError::TooManyApps { max: 2 });
        assert_eq!(footprint.subnet_count(), 2);
    }

    #[test]
    fn test_duplicate_app_rejected() {
        let mut footprint = Footprint::new();
        let l = limits(4, 8);
        footprint.add_app(SubnetId(1), AppId(1), AppUsage::default(), &l).unwrap();
        let err = footprint
            .add_app(SubnetId(1), AppId(1), AppUsage::default(), &l)
            .unwrap_err();
        assert!(matches!(err, LedgerError::AppExists { .. }));
    }

    #[test]
    fn test_remove_last_app_deactivates_subnet() {
        let mut footprint = Footprint::new();
        let l = limits(4, 8);
        footprint.add_app(SubnetId(1), AppId(1), AppUsage::default(), &l).unwrap();
        footprint.remove_app(SubnetId(1), AppId(1)).unwrap();

        assert!(footprint.is_empty());
        assert!(matches!(
            footprint.remove_app(SubnetId(1), AppId(1)),
            Err(LedgerError::AppNotFound { .. })
        ));
    }

    #[test]
    fn test_update_app() {
        let mut footprint = Footprint::new();
        let l = limits(4, 8);
        footprint
            .add_app(SubnetId(1), AppId(1), AppUsage::new(vec![1], vec![1]), &l)
            .unwrap();
        let previous = footprint
            .update_app(SubnetId(1), AppId(1), AppUsage::new(vec![9], vec![1]))
            .unwrap();

        assert_eq!(previous.resources, vec![1]);
        assert_eq!(footprint.subnet(SubnetId(1)).unwrap().aggregate(), vec![9]);
    }
}
