//! # External Collaborators
//!
//! The ledger talks to three collaborators it does not own:
//!
//! | Trait | Role |
//! |-------|------|
//! | `TokenVault` | moves the fungible asset in and out of the ledger |
//! | `AccessControl` | answers capability checks on accounts |
//! | `SubnetRegistry` | publishes unit prices and cluster weights per subnet |
//!
//! The in-memory implementations share their state behind an `Arc<RwLock>`,
//! so a caller can keep a clone to list clusters or mint tokens while the
//! ledger holds another.

use drip_core::{AccountId, Address, Amount, Capability, LedgerError, Result, SubnetId};
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::sync::Arc;

/// Fungible asset movements
pub trait TokenVault: Send + Sync {
    /// Pull `amount` from `payer` into the ledger
    fn transfer_in(&self, payer: &Address, amount: Amount) -> Result<()>;

    /// Push `amount` held by the ledger to `recipient`
    fn transfer_out(&self, recipient: &Address, amount: Amount) -> Result<()>;
}

/// Account ownership and capability checks
pub trait AccessControl: Send + Sync {
    fn is_authorized(&self, caller: &Address, account: AccountId, capability: Capability) -> bool;
}

/// Subnet prices and cluster operator weights
pub trait SubnetRegistry: Send + Sync {
    /// Current per-unit price vector of a subnet
    fn unit_prices(&self, subnet: SubnetId) -> Result<Vec<u128>>;

    /// Current (operator, weight) pairs; delisted operators report weight 0
    fn cluster_weights(&self, subnet: SubnetId) -> Result<Vec<(Address, u128)>>;
}

// === Token vault ===

#[derive(Debug, Default)]
struct VaultState {
    wallets: IndexMap<Address, Amount>,
    held: Amount,
}

/// In-memory token vault
#[derive(Clone, Debug, Default)]
pub struct MemoryVault {
    state: Arc<RwLock<VaultState>>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit a wallet out of thin air
    pub fn mint(&self, owner: Address, amount: Amount) {
        let mut state = self.state.write();
        let wallet = state.wallets.entry(owner).or_insert(0);
        *wallet = wallet.saturating_add(amount);
    }

    pub fn balance_of(&self, owner: &Address) -> Amount {
        self.state.read().wallets.get(owner).copied().unwrap_or(0)
    }

    /// Amount currently held by the ledger
    pub fn held(&self) -> Amount {
        self.state.read().held
    }
}

impl TokenVault for MemoryVault {
    fn transfer_in(&self, payer: &Address, amount: Amount) -> Result<()> {
        let mut state = self.state.write();
        let available = state.wallets.get(payer).copied().unwrap_or(0);
        if available < amount {
            return Err(LedgerError::Token(format!(
                "{} holds {}, needs {}",
                payer, available, amount
            )));
        }
        state.wallets.insert(*payer, available - amount);
        state.held = state.held.saturating_add(amount);
        Ok(())
    }

    fn transfer_out(&self, recipient: &Address, amount: Amount) -> Result<()> {
        let mut state = self.state.write();
        if state.held < amount {
            return Err(LedgerError::Token(format!(
                "vault holds {}, cannot pay {}",
                state.held, amount
            )));
        }
        state.held -= amount;
        let wallet = state.wallets.entry(*recipient).or_insert(0);
        *wallet = wallet.saturating_add(amount);
        Ok(())
    }
}

// === Access control ===

#[derive(Debug, Default)]
struct AccountAcl {
    owner: Option<Address>,
    grants: IndexMap<Address, Vec<Capability>>,
}

/// In-memory ownership table; owners hold every capability
#[derive(Clone, Debug, Default)]
pub struct OwnershipTable {
    accounts: Arc<RwLock<IndexMap<AccountId, AccountAcl>>>,
}

impl OwnershipTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_owner(&self, account: AccountId, owner: Address) {
        self.accounts.write().entry(account).or_default().owner = Some(owner);
    }

    pub fn owner_of(&self, account: AccountId) -> Option<Address> {
        self.accounts.read().get(&account).and_then(|acl| acl.owner)
    }

    pub fn grant(&self, account: AccountId, grantee: Address, capability: Capability) {
        let mut accounts = self.accounts.write();
        let caps = accounts
            .entry(account)
            .or_default()
            .grants
            .entry(grantee)
            .or_default();
        if !caps.contains(&capability) {
            caps.push(capability);
        }
    }

    pub fn revoke(&self, account: AccountId, grantee: &Address, capability: Capability) {
        if let Some(caps) = self
            .accounts
            .write()
            .get_mut(&account)
            .and_then(|acl| acl.grants.get_mut(grantee))
        {
            caps.retain(|c| *c != capability);
        }
    }
}

impl AccessControl for OwnershipTable {
    fn is_authorized(&self, caller: &Address, account: AccountId, capability: Capability) -> bool {
        let accounts = self.accounts.read();
        let Some(acl) = accounts.get(&account) else {
            return false;
        };
        acl.owner.as_ref() == Some(caller)
            || acl
                .grants
                .get(caller)
                .map_or(false, |caps| caps.contains(&capability))
    }
}

// === Subnet registry ===

#[derive(Clone, Copy, Debug)]
struct ClusterEntry {
    weight: u128,
    listed: bool,
}

#[derive(Debug, Default)]
struct SubnetEntry {
    unit_prices: Vec<u128>,
    clusters: IndexMap<Address, ClusterEntry>,
}

/// In-memory subnet and cluster registry
#[derive(Clone, Debug, Default)]
pub struct MemorySubnetRegistry {
    subnets: Arc<RwLock<IndexMap<SubnetId, SubnetEntry>>>,
}

impl MemorySubnetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or reprice a subnet
    pub fn set_prices(&self, subnet: SubnetId, unit_prices: Vec<u128>) {
        self.subnets.write().entry(subnet).or_default().unit_prices = unit_prices;
    }

    pub fn contains(&self, subnet: SubnetId) -> bool {
        self.subnets.read().contains_key(&subnet)
    }

    /// List a cluster operator with a weight (or update its weight)
    pub fn list_cluster(&self, subnet: SubnetId, operator: Address, weight: u128) -> Result<()> {
        let mut subnets = self.subnets.write();
        let entry = subnets
            .get_mut(&subnet)
            .ok_or(LedgerError::UnknownSubnet(subnet))?;
        entry
            .clusters
            .insert(operator, ClusterEntry { weight, listed: true });
        Ok(())
    }

    /// Delist an operator; its weight reads as 0 until re-listed
    pub fn delist_cluster(&self, subnet: SubnetId, operator: &Address) -> Result<()> {
        self.set_listed(subnet, operator, false)
    }

    /// Restore a delisted operator at its previous weight
    pub fn relist_cluster(&self, subnet: SubnetId, operator: &Address) -> Result<()> {
        self.set_listed(subnet, operator, true)
    }

    fn set_listed(&self, subnet: SubnetId, operator: &Address, listed: bool) -> Result<()> {
        let mut subnets = self.subnets.write();
        let cluster = subnets
            .get_mut(&subnet)
            .ok_or(LedgerError::UnknownSubnet(subnet))?
            .clusters
            .get_mut(operator)
            .ok_or(LedgerError::UnknownCluster {
                subnet,
                operator: *operator,
            })?;
        cluster.listed = listed;
        Ok(())
    }
}

impl SubnetRegistry for MemorySubnetRegistry {
    fn unit_prices(&self, subnet: SubnetId) -> Result<Vec<u128>> {
        self.subnets
            .read()
            .get(&subnet)
            .map(|entry| entry.unit_prices.clone())
            .ok_or(LedgerError::UnknownSubnet(subnet))
    }

    fn cluster_weights(&self, subnet: SubnetId) -> Result<Vec<(Address, u128)>> {
        let subnets = self.subnets.read();
        let entry = subnets.get(&subnet).ok_or(LedgerError::UnknownSubnet(subnet))?;
        Ok(entry
            .clusters
            .iter()
            .map(|(operator, cluster)| (*operator, if cluster.listed { cluster.weight } else { 0 }))
            .collect())
    }
}
