//! Ledger change records
//!
//! Every successful state change appends one or more events. Failed
//! operations append nothing.

use crate::distribution::RevenueSplit;
use drip_core::{AccountId, Address, Amount, AppId, FeePair, SubnetId, Timestamp};
use serde::{Deserialize, Serialize};

/// Emitted ledger event
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LedgerEvent {
    /// Account created
    Subscribed {
        account: AccountId,
        at: Timestamp,
    },

    /// Elapsed cost moved from balance tiers into pending revenue
    Settled {
        account: AccountId,
        from: Timestamp,
        to: Timestamp,
        charged: Amount,
        insolvent: bool,
    },

    /// Pending revenue split into recipient balances
    Distributed {
        account: AccountId,
        split: RevenueSplit,
    },

    /// New drip rate stored
    DripRateChanged {
        account: AccountId,
        previous: Amount,
        current: Amount,
        at: Timestamp,
    },

    /// Footprint mutation
    AppAdded {
        account: AccountId,
        subnet: SubnetId,
        app: AppId,
    },

    AppUpdated {
        account: AccountId,
        subnet: SubnetId,
        app: AppId,
    },

    AppRemoved {
        account: AccountId,
        subnet: SubnetId,
        app: AppId,
    },

    SubnetRemoved {
        account: AccountId,
        subnet: SubnetId,
    },

    /// Funds entered a tier
    CreditDeposited {
        account: AccountId,
        depositor: Address,
        amount: Amount,
        expiry: Timestamp,
        seq: u64,
    },

    ExternalDeposited {
        account: AccountId,
        payer: Address,
        amount: Amount,
    },

    OwnerDeposited {
        account: AccountId,
        payer: Address,
        amount: Amount,
    },

    /// Funds left a tier
    CreditWithdrawn {
        account: AccountId,
        depositor: Address,
        amount: Amount,
    },

    OwnerWithdrawn {
        account: AccountId,
        recipient: Address,
        amount: Amount,
    },

    /// Subnet compute revenue credited to cluster operators
    RevenueAssigned {
        subnet: SubnetId,
        assigned: Amount,
        dust: Amount,
    },

    /// Recipient pulled its balance
    RevenueReceived {
        recipient: Address,
        amount: Amount,
    },

    /// Support fee workflow
    SupportFeeProposed {
        account: AccountId,
        provider: Address,
        fee: FeePair,
    },

    SupportFeeApproved {
        account: AccountId,
        fee: FeePair,
    },

    SupportFeeApplied {
        account: AccountId,
        previous: FeePair,
        current: FeePair,
    },

    /// Support provider workflow
    SupportChangeRequested {
        account: AccountId,
        new_provider: Address,
    },

    SupportChangeApplied {
        account: AccountId,
        previous: Address,
        current: Address,
    },

    SupportChangeCancelled {
        account: AccountId,
    },

    /// Admin replaced a pluggable component
    ComponentReplaced {
        component: String,
    },
}

impl LedgerEvent {
    /// Account the event belongs to, if any
    pub fn account(&self) -> Option<AccountId> {
        match self {
            Self::Subscribed { account, .. }
            | Self::Settled { account, .. }
            | Self::Distributed { account, .. }
            | Self::DripRateChanged { account, .. }
            | Self::AppAdded { account, .. }
            | Self::AppUpdated { account, .. }
            | Self::AppRemoved { account, .. }
            | Self::SubnetRemoved { account, .. }
            | Self::CreditDeposited { account, .. }
            | Self::ExternalDeposited { account, .. }
            | Self::OwnerDeposited { account, .. }
            | Self::CreditWithdrawn { account, .. }
            | Self::OwnerWithdrawn { account, .. }
            | Self::SupportFeeProposed { account, .. }
            | Self::SupportFeeApproved { account, .. }
            | Self::SupportFeeApplied { account, .. }
            | Self::SupportChangeRequested { account, .. }
            | Self::SupportChangeApplied { account, .. }
            | Self::SupportChangeCancelled { account } => Some(*account),
            Self::RevenueAssigned { .. }
            | Self::RevenueReceived { .. }
            | Self::ComponentReplaced { .. } => None,
        }
    }
}
