//! # Subnet Revenue Splitter
//!
//! Holds each subnet's accrued compute share until it is assigned to the
//! subnet's cluster operators.
//!
//! ```text
//! operator share = subnet pending * operator weight / Σ weights
//! ```
//!
//! Weights are read when `assign` runs, not when revenue accrues. Operators
//! with weight 0 (delisted) take no part in the split. Floor dust stays
//! pending for the next assignment.

use drip_core::{mul_div, Address, Amount, SubnetId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Outcome of one assignment
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub subnet: SubnetId,

    /// Operator shares credited, in registry order
    pub shares: Vec<(Address, Amount)>,

    /// Left pending after the split
    pub dust: Amount,
}

impl Assignment {
    pub fn assigned(&self) -> Amount {
        self.shares.iter().map(|(_, share)| *share).sum()
    }
}

/// Per-subnet compute revenue awaiting assignment
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetRevenueSplitter {
    pending: IndexMap<SubnetId, Amount>,
}

impl SubnetRevenueSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subnet's compute share
    pub fn accrue(&mut self, subnet: SubnetId, amount: Amount) {
        if amount == 0 {
            return;
        }
        let slot = self.pending.entry(subnet).or_insert(0);
        *slot = slot.saturating_add(amount);
    }

    /// Unassigned revenue of a subnet
    pub fn pending(&self, subnet: SubnetId) -> Amount {
        self.pending.get(&subnet).copied().unwrap_or(0)
    }

    pub fn total_pending(&self) -> Amount {
        self.pending.values().sum()
    }

    /// Split a subnet's pending revenue over the given operator weights
    ///
    /// With no positive weight nothing is assigned and the revenue stays
    /// pending.
    pub fn assign(&mut self, subnet: SubnetId, weights: &[(Address, u128)]) -> Assignment {
        let pending = self.pending(subnet);
        let total_weight: u128 = weights.iter().map(|(_, w)| *w).sum();

        if pending == 0 || total_weight == 0 {
            return Assignment {
                subnet,
                shares: Vec::new(),
                dust: pending,
            };
        }

        let shares: Vec<(Address, Amount)> = weights
            .iter()
            .filter(|(_, weight)| *weight > 0)
            .map(|(operator, weight)| (*operator, mul_div(pending, *weight, total_weight)))
            .filter(|(_, share)| *share > 0)
            .collect();

        let assigned: Amount = shares.iter().map(|(_, share)| *share).sum();
        let dust = pending - assigned;
        if dust == 0 {
            self.pending.shift_remove(&subnet);
        } else {
            self.pending.insert(subnet, dust);
        }

        Assignment {
            subnet,
            shares,
            dust,
        }
    }
}
