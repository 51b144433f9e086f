//! # Support Agreement
//!
//! Two-phase changes to an account's support fee and support provider.
//!
//! ```text
//!  fee change:       propose ──► approve ──(notice)──► apply
//!                   (provider)  (holder)              (anyone)
//!
//!  provider change:  request ──(notice)──► apply
//!                   (holder, after cooldown since the last change)
//! ```
//!
//! A provider cannot raise its fee without the holder's approval, and an
//! approved fee only starts after the notice period. Applying a provider
//! change drops any fee proposal from the outgoing provider.

use drip_core::{Address, FeePair, LedgerError, Result, SupportConfig, Timestamp};
use serde::{Deserialize, Serialize};

/// Fee proposed by the current provider
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeProposal {
    pub fee: FeePair,
    pub proposed_at: Timestamp,
    /// Set once the account holder approves
    pub approved_at: Option<Timestamp>,
}

/// Provider change requested by the account holder
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderChange {
    pub new_provider: Address,
    /// Registered default fee of the new provider
    pub new_fee: FeePair,
    pub requested_at: Timestamp,
}

/// Support state of one account
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportAgreement {
    provider: Address,
    fee: FeePair,
    proposal: Option<FeeProposal>,
    change: Option<ProviderChange>,
    /// Time of the last applied provider change
    last_changed_at: Option<Timestamp>,
}

impl SupportAgreement {
    pub fn new(provider: Address, fee: FeePair) -> Self {
        Self {
            provider,
            fee,
            proposal: None,
            change: None,
            last_changed_at: None,
        }
    }

    pub fn provider(&self) -> Address {
        self.provider
    }

    pub fn fee(&self) -> FeePair {
        self.fee
    }

    pub fn proposal(&self) -> Option<&FeeProposal> {
        self.proposal.as_ref()
    }

    pub fn pending_change(&self) -> Option<&ProviderChange> {
        self.change.as_ref()
    }

    /// Current provider proposes a new fee, replacing any earlier proposal
    pub fn propose_fee(&mut self, caller: &Address, fee: FeePair, now: Timestamp) -> Result<()> {
        if *caller != self.provider {
            return Err(LedgerError::NotSupportProvider(*caller));
        }
        self.proposal = Some(FeeProposal {
            fee,
            proposed_at: now,
            approved_at: None,
        });
        Ok(())
    }

    /// Holder approves the pending proposal; the notice period starts now
    pub fn approve_fee(&mut self, now: Timestamp) -> Result<FeePair> {
        let proposal = self.proposal.as_mut().ok_or(LedgerError::NoPendingRequest)?;
        proposal.approved_at = Some(now);
        Ok(proposal.fee)
    }

    /// Check that the approved fee may take effect at `now`
    pub fn check_fee_ready(&self, now: Timestamp, config: &SupportConfig) -> Result<FeePair> {
        let proposal = self.proposal.as_ref().ok_or(LedgerError::NoPendingRequest)?;
        let approved_at = proposal.approved_at.ok_or(LedgerError::NotApproved)?;
        let ends_at = approved_at.saturating_add(config.notice_period_secs);
        if now < ends_at {
            return Err(LedgerError::NoticeNotOver { ends_at, now });
        }
        Ok(proposal.fee)
    }

    /// Make the approved fee current, returning the previous fee
    pub fn apply_fee(&mut self, now: Timestamp, config: &SupportConfig) -> Result<FeePair> {
        let fee = self.check_fee_ready(now, config)?;
        self.proposal = None;
        Ok(std::mem::replace(&mut self.fee, fee))
    }

    /// Holder asks to switch provider; allowed once the cooldown has run out
    pub fn request_change(
        &mut self,
        new_provider: Address,
        new_fee: FeePair,
        now: Timestamp,
        config: &SupportConfig,
    ) -> Result<()> {
        if let Some(last) = self.last_changed_at {
            let ends_at = last.saturating_add(config.cooldown_period_secs);
            if now < ends_at {
                return Err(LedgerError::CooldownNotOver { ends_at, now });
            }
        }
        self.change = Some(ProviderChange {
            new_provider,
            new_fee,
            requested_at: now,
        });
        Ok(())
    }

    /// Check that the requested change may take effect at `now`
    pub fn check_change_ready(&self, now: Timestamp, config: &SupportConfig) -> Result<ProviderChange> {
        let change = self.change.ok_or(LedgerError::NoPendingRequest)?;
        let ends_at = change.requested_at.saturating_add(config.notice_period_secs);
        if now < ends_at {
            return Err(LedgerError::NoticeNotOver { ends_at, now });
        }
        Ok(change)
    }

    /// Switch to the requested provider, returning the outgoing one
    pub fn apply_change(&mut self, now: Timestamp, config: &SupportConfig) -> Result<Address> {
        let change = self.check_change_ready(now, config)?;
        let previous = std::mem::replace(&mut self.provider, change.new_provider);
        self.fee = change.new_fee;
        self.change = None;
        self.proposal = None;
        self.last_changed_at = Some(now);
        Ok(previous)
    }

    /// Drop a pending provider request
    pub fn cancel_change(&mut self) -> Result<ProviderChange> {
        self.change.take().ok_or(LedgerError::NoPendingRequest)
    }
}
