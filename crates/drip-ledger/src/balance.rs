//! # Balance Ledger
//!
//! Authoritative three-tier balance of one account, settled lazily.
//!
//! ## Depletion Order
//!
//! | Order | Tier | Funded by | Leaves by |
//! |-------|------|-----------|-----------|
//! | 1 | Credit | anyone, with expiry | FIFO depletion, depositor withdrawal |
//! | 2 | External | anyone | depletion only |
//! | 3 | Owner | account holder | depletion, holder withdrawal |
//!
//! Settlement charges `drip_rate * elapsed`, clipped at what the tiers hold.
//! Debt never accrues: an insolvent account simply stops paying. Whatever is
//! charged moves into the pending revenue accumulator, attributed to subnets
//! in proportion to their compute cost at the rate in force.

use crate::credit_queue::CreditQueue;
use crate::distribution::split_by_weight;
use crate::drip_rate::RateQuote;
use drip_core::{Address, Amount, BalanceTier, LedgerError, Result, SubnetId, Timestamp};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Snapshot of the three tiers
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceTiers {
    pub credit: Amount,
    pub external: Amount,
    pub owner: Amount,
}

impl BalanceTiers {
    pub fn total(&self) -> Amount {
        self.credit
            .saturating_add(self.external)
            .saturating_add(self.owner)
    }

    pub fn get(&self, tier: BalanceTier) -> Amount {
        match tier {
            BalanceTier::Credit => self.credit,
            BalanceTier::External => self.external,
            BalanceTier::Owner => self.owner,
        }
    }
}

/// What one settlement call charged
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementReceipt {
    /// Previous settlement time
    pub from: Timestamp,
    /// New settlement time
    pub to: Timestamp,
    /// Drip rate in force over the interval
    pub drip_rate: Amount,
    /// `drip_rate * (to - from)`
    pub requested: Amount,
    pub from_credit: Amount,
    pub from_external: Amount,
    pub from_owner: Amount,
}

impl SettlementReceipt {
    /// Amount actually deducted
    pub fn charged(&self) -> Amount {
        self.from_credit + self.from_external + self.from_owner
    }

    pub fn elapsed(&self) -> u64 {
        self.to - self.from
    }

    /// Tiers ran dry before the requested cost was covered
    pub fn insolvent(&self) -> bool {
        self.charged() < self.requested
    }
}

/// Settled cost not yet distributed to recipients
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRevenue {
    /// Settled amount awaiting distribution
    pub amount: Amount,

    /// Start of the settlement window it covers
    pub window_start: Timestamp,

    /// End of the settlement window it covers
    pub window_end: Timestamp,

    /// Portion of `amount` attributed to each subnet
    pub by_subnet: IndexMap<SubnetId, Amount>,
}

impl PendingRevenue {
    fn starting_at(at: Timestamp) -> Self {
        Self {
            window_start: at,
            window_end: at,
            ..Default::default()
        }
    }

    /// Window length in seconds
    pub fn duration(&self) -> u64 {
        self.window_end.saturating_sub(self.window_start)
    }

    pub fn is_empty(&self) -> bool {
        self.amount == 0 && self.duration() == 0
    }
}

/// Three-tier balance of one account
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountLedger {
    /// Tier 1
    credit: CreditQueue,

    /// Tier 2
    external: Amount,

    /// Tier 3
    owner: Amount,

    /// Cost per second currently charged
    drip_rate: Amount,

    /// Compute cost per second of each subnet at the current rate
    subnet_rates: IndexMap<SubnetId, Amount>,

    /// Last settlement time
    last_settled: Timestamp,

    /// Settled but undistributed cost
    pending: PendingRevenue,

    /// Lifetime amount settled
    total_settled: Amount,

    /// Lifetime amount handed to distribution
    total_distributed: Amount,
}

impl AccountLedger {
    /// Create an empty ledger whose clock starts at `now`
    pub fn new(now: Timestamp) -> Self {
        Self {
            last_settled: now,
            pending: PendingRevenue::starting_at(now),
            ..Default::default()
        }
    }

    pub fn tiers(&self) -> BalanceTiers {
        BalanceTiers {
            credit: self.credit.total(),
            external: self.external,
            owner: self.owner,
        }
    }

    pub fn credit(&self) -> &CreditQueue {
        &self.credit
    }

    pub fn drip_rate(&self) -> Amount {
        self.drip_rate
    }

    pub fn subnet_rates(&self) -> &IndexMap<SubnetId, Amount> {
        &self.subnet_rates
    }

    pub fn last_settled(&self) -> Timestamp {
        self.last_settled
    }

    pub fn pending(&self) -> &PendingRevenue {
        &self.pending
    }

    pub fn total_settled(&self) -> Amount {
        self.total_settled
    }

    pub fn total_distributed(&self) -> Amount {
        self.total_distributed
    }

    /// Advance the clock to `now`, depleting tiers in order
    ///
    /// Calling twice at the same `now` settles nothing the second time. A
    /// `now` earlier than the last settlement is treated the same way.
    pub fn settle(&mut self, now: Timestamp) -> SettlementReceipt {
        let from = self.last_settled;
        if now <= from {
            return SettlementReceipt {
                from,
                to: from,
                drip_rate: self.drip_rate,
                ..Default::default()
            };
        }

        let elapsed = now - from;
        let requested = self.drip_rate.saturating_mul(elapsed as u128);

        let from_credit = self.credit.settle(requested);
        let mut left = requested - from_credit;

        let from_external = left.min(self.external);
        self.external -= from_external;
        left -= from_external;

        let from_owner = left.min(self.owner);
        self.owner -= from_owner;

        let receipt = SettlementReceipt {
            from,
            to: now,
            drip_rate: self.drip_rate,
            requested,
            from_credit,
            from_external,
            from_owner,
        };

        let charged = receipt.charged();
        self.attribute(charged);
        self.pending.amount += charged;
        self.pending.window_end = now;
        self.total_settled += charged;
        self.last_settled = now;

        receipt
    }

    /// Split a charged amount across subnets by compute cost; the last subnet
    /// with a nonzero cost takes the remainder
    fn attribute(&mut self, charged: Amount) {
        if charged == 0 {
            return;
        }
        if let Some(shares) = split_by_weight(charged, &self.subnet_rates) {
            for (subnet, share) in shares {
                *self.pending.by_subnet.entry(subnet).or_insert(0) += share;
            }
        }
    }

    /// Store a new rate; the ledger must already be settled up to `now`
    pub fn change_drip_rate(&mut self, quote: &RateQuote, now: Timestamp) -> Result<Amount> {
        if self.last_settled != now {
            return Err(LedgerError::UnsettledRateChange {
                last_settled: self.last_settled,
                now,
            });
        }

        let previous = self.drip_rate;
        self.drip_rate = quote.drip_rate;
        self.subnet_rates = quote.subnet_costs.clone();
        Ok(previous)
    }

    /// Hand the accumulator to distribution and start a new window
    pub fn take_pending(&mut self) -> PendingRevenue {
        let next = PendingRevenue::starting_at(self.last_settled);
        let pending = std::mem::replace(&mut self.pending, next);
        self.total_distributed += pending.amount;
        pending
    }

    /// Append a credit deposit
    pub fn deposit_credit(&mut self, depositor: Address, amount: Amount, expiry: Timestamp) -> u64 {
        self.credit.deposit(depositor, amount, expiry)
    }

    /// Return a depositor's expired, undepleted credit
    pub fn withdraw_credit(&mut self, depositor: &Address, now: Timestamp) -> Result<Amount> {
        self.credit.withdraw(depositor, now)
    }

    /// Add to the external or owner tier
    pub fn add_balance(&mut self, tier: BalanceTier, amount: Amount) -> Result<()> {
        match tier {
            BalanceTier::External => self.external = self.external.saturating_add(amount),
            BalanceTier::Owner => self.owner = self.owner.saturating_add(amount),
            BalanceTier::Credit => return Err(LedgerError::UnsupportedTierOperation(tier)),
        }
        Ok(())
    }

    /// Remove from the owner tier; no borrowing across tiers
    pub fn withdraw_balance(&mut self, tier: BalanceTier, amount: Amount) -> Result<()> {
        match tier {
            BalanceTier::Owner => {
                if amount > self.owner {
                    return Err(LedgerError::InsufficientBalance {
                        tier,
                        requested: amount,
                        available: self.owner,
                    });
                }
                self.owner -= amount;
                Ok(())
            }
            BalanceTier::Credit | BalanceTier::External => {
                Err(LedgerError::UnsupportedTierOperation(tier))
            }
        }
    }

    /// Tiers as they would be after settling at `now`
    pub fn projected(&self, now: Timestamp) -> BalanceTiers {
        let mut copy = self.clone();
        copy.settle(now);
        copy.tiers()
    }

    /// Time at which the projected balance runs out at the current rate
    pub fn funded_until(&self, now: Timestamp) -> Option<Timestamp> {
        if self.drip_rate == 0 {
            return None;
        }
        let start = now.max(self.last_settled);
        let total = self.projected(start).total();
        let secs = (total / self.drip_rate).min(u64::MAX as u128) as u64;
        Some(start.saturating_add(secs))
    }
}
