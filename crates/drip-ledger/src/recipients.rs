//! Pull-payable recipient balances
//!
//! Distribution only credits this map. Tokens leave when a recipient pulls
//! its balance, so a recipient that cannot receive never blocks distribution.

use drip_core::{Address, Amount};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Owed amount per stakeholder address
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientBalances {
    owed: IndexMap<Address, Amount>,
}

impl RecipientBalances {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn credit(&mut self, recipient: Address, amount: Amount) {
        if amount == 0 {
            return;
        }
        let slot = self.owed.entry(recipient).or_insert(0);
        *slot = slot.saturating_add(amount);
    }

    pub fn balance_of(&self, recipient: &Address) -> Amount {
        self.owed.get(recipient).copied().unwrap_or(0)
    }

    /// Remove and return everything owed to `recipient` (zero if nothing)
    pub fn take(&mut self, recipient: &Address) -> Amount {
        self.owed.shift_remove(recipient).unwrap_or(0)
    }

    pub fn total_owed(&self) -> Amount {
        self.owed.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Address, &Amount)> {
        self.owed.iter()
    }
}
