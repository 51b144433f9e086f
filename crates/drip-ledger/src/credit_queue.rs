//! # Credit Queue
//!
//! FIFO sub-ledger of independent credit deposits on one account.
//!
//! ```text
//!   head
//!    │
//!    ▼
//! ┌──────┬──────┬──────┬──────┐
//! │ D1 0 │ D2 30│ D3 80│ D4 10│   remaining per deposit, insertion order
//! └──────┴──────┴──────┴──────┘
//!   depleted ─►  settlement always drains from the head
//! ```
//!
//! Depletion ignores who owns a deposit and when it expires. A depositor can
//! take back only the undepleted remainder of its own deposits, and only once
//! their expiry has passed.

use drip_core::{Address, Amount, LedgerError, Result, Timestamp};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// Deposit lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DepositState {
    /// Untouched by settlement
    Active,
    /// Settlement consumed part of it
    PartiallyDepleted,
    /// Settlement consumed all of it (terminal)
    Depleted,
    /// Depositor took the remainder back (terminal)
    Withdrawn,
}

impl DepositState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Depleted | Self::Withdrawn)
    }
}

/// One credit deposit
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditDeposit {
    /// Insertion order, unique within the queue
    pub seq: u64,

    /// Who deposited (and may withdraw)
    pub depositor: Address,

    /// Amount originally deposited
    pub amount: Amount,

    /// Undepleted remainder
    pub remaining: Amount,

    /// Earliest time the depositor may withdraw
    pub expiry: Timestamp,

    /// Lifecycle state
    pub state: DepositState,
}

impl CreditDeposit {
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expiry <= now
    }
}

/// FIFO credit sub-ledger
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditQueue {
    /// Deposits in insertion order; entries before `head` are terminal
    deposits: Vec<CreditDeposit>,

    /// First deposit that may still hold funds
    head: usize,

    /// Sum of `remaining` over all deposits
    total: Amount,

    /// Next insertion sequence number
    next_seq: u64,

    /// Everyone who ever deposited, including after compaction
    #[serde(default)]
    depositors: IndexSet<Address>,
}

impl CreditQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current undepleted credit
    pub fn total(&self) -> Amount {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Deposits that may still hold funds, oldest first
    pub fn deposits(&self) -> &[CreditDeposit] {
        &self.deposits[self.head..]
    }

    /// Append a deposit at the tail, returning its sequence number
    pub fn deposit(&mut self, depositor: Address, amount: Amount, expiry: Timestamp) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.depositors.insert(depositor);
        self.deposits.push(CreditDeposit {
            seq,
            depositor,
            amount,
            remaining: amount,
            expiry,
            state: DepositState::Active,
        });
        self.total = self.total.saturating_add(amount);
        seq
    }

    /// Drain `cost` head-first, returning what was actually deducted
    pub fn settle(&mut self, cost: Amount) -> Amount {
        let mut left = cost.min(self.total);
        let deducted = left;

        while left > 0 && self.head < self.deposits.len() {
            let deposit = &mut self.deposits[self.head];
            let take = left.min(deposit.remaining);
            deposit.remaining -= take;
            left -= take;

            if deposit.remaining == 0 {
                if deposit.state != DepositState::Withdrawn {
                    deposit.state = DepositState::Depleted;
                }
                self.head += 1;
            } else if take > 0 {
                deposit.state = DepositState::PartiallyDepleted;
            }
        }

        self.total -= deducted;
        self.compact();
        deducted
    }

    /// Undepleted credit `depositor` could withdraw at `now`
    pub fn withdrawable(&self, depositor: &Address, now: Timestamp) -> Amount {
        let own: Amount = self
            .deposits()
            .iter()
            .filter(|d| d.depositor == *depositor && d.remaining > 0 && d.is_expired(now))
            .map(|d| d.remaining)
            .sum();
        own.min(self.total)
    }

    /// Take back every expired, undepleted deposit of `depositor`
    pub fn withdraw(&mut self, depositor: &Address, now: Timestamp) -> Result<Amount> {
        let mut earliest_unexpired: Option<Timestamp> = None;
        let mut has_funds = false;

        for deposit in self.deposits() {
            if deposit.depositor != *depositor || deposit.remaining == 0 {
                continue;
            }
            has_funds = true;
            if !deposit.is_expired(now) {
                earliest_unexpired =
                    Some(earliest_unexpired.map_or(deposit.expiry, |e| e.min(deposit.expiry)));
            }
        }

        if !has_funds {
            // Settlement may have consumed everything a depositor put in
            return Err(if self.depositors.contains(depositor) {
                LedgerError::NoWithdrawableCredit(*depositor)
            } else {
                LedgerError::NotDepositor(*depositor)
            });
        }

        let amount = self.withdrawable(depositor, now);
        if amount == 0 {
            return Err(LedgerError::NotYetExpired {
                expiry: earliest_unexpired.unwrap_or(now),
                now,
            });
        }

        let head = self.head;
        for deposit in self.deposits[head..].iter_mut() {
            if deposit.depositor == *depositor && deposit.remaining > 0 && deposit.is_expired(now) {
                deposit.remaining = 0;
                deposit.state = DepositState::Withdrawn;
            }
        }
        self.total -= amount;
        self.advance_head();
        self.compact();
        Ok(amount)
    }

    /// Skip leading deposits that hold nothing
    fn advance_head(&mut self) {
        while self.head < self.deposits.len() && self.deposits[self.head].remaining == 0 {
            self.head += 1;
        }
    }

    /// Drop terminal prefix once it dominates the queue
    fn compact(&mut self) {
        if self.head > 32 && self.head * 2 > self.deposits.len() {
            self.deposits.drain(..self.head);
            self.head = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drip_core::ErrorKind;

    fn alice() -> Address {
        Address::from_label("alice")
    }

    fn bob() -> Address {
        Address::from_label("bob")
    }

    #[test]
    fn test_fifo_depletion_ignores_expiry_order() {
        let mut queue = CreditQueue::new();
        queue.deposit(alice(), 100, 1_000); // later expiry, inserted first
        queue.deposit(bob(), 50, 10);

        assert_eq!(queue.settle(120), 120);
        assert_eq!(queue.total(), 30);

        let remaining: Vec<_> = queue.deposits().iter().map(|d| (d.depositor, d.remaining)).collect();
        assert_eq!(remaining, vec![(bob(), 30)]);
        assert_eq!(queue.deposits()[0].state, DepositState::PartiallyDepleted);
    }

    #[test]
    fn test_settle_caps_at_total() {
        let mut queue = CreditQueue::new();
        queue.deposit(alice(), 40, 0);
        assert_eq!(queue.settle(100), 40);
        assert!(queue.is_empty());
        assert_eq!(queue.settle(10), 0);
    }

    #[test]
    fn test_withdraw_before_expiry_rejected() {
        let mut queue = CreditQueue::new();
        queue.deposit(alice(), 100, 50);

        let err = queue.withdraw(&alice(), 49).unwrap_err();
        assert_eq!(err, LedgerError::NotYetExpired { expiry: 50, now: 49 });
        assert_eq!(queue.total(), 100);
    }

    #[test]
    fn test_withdraw_returns_undepleted_remainder() {
        let mut queue = CreditQueue::new();
        queue.deposit(alice(), 100, 10);
        queue.deposit(bob(), 50, 10);
        queue.settle(120);

        assert_eq!(
            queue.withdraw(&alice(), 10).unwrap_err(),
            LedgerError::NoWithdrawableCredit(alice())
        );
        assert_eq!(queue.withdraw(&bob(), 10).unwrap(), 30);
        assert_eq!(queue.total(), 0);

        // Withdrawn is terminal
        assert!(queue.withdraw(&bob(), 10).is_err());
    }

    #[test]
    fn test_depleted_depositor_gets_balance_error() {
        let mut queue = CreditQueue::new();
        for _ in 0..40 {
            queue.deposit(alice(), 5, 10);
        }
        queue.settle(200);
        assert!(queue.deposits().is_empty());

        let err = queue.withdraw(&alice(), 20).unwrap_err();
        assert_eq!(err, LedgerError::NoWithdrawableCredit(alice()));
        assert_eq!(err.kind(), ErrorKind::Balance);
        assert_eq!(queue.withdrawable(&alice(), 20), 0);

        let err = queue.withdraw(&bob(), 20).unwrap_err();
        assert_eq!(err, LedgerError::NotDepositor(bob()));
        assert_eq!(err.kind(), ErrorKind::Authorization);
    }

    #[test]
    fn test_withdraw_from_middle_of_queue() {
        let mut queue = CreditQueue::new();
        queue.deposit(alice(), 100, 100);
        queue.deposit(bob(), 50, 10);
        queue.deposit(alice(), 70, 100);

        assert_eq!(queue.withdraw(&bob(), 10).unwrap(), 50);
        assert_eq!(queue.total(), 170);

        // Bob's slot is skipped by depletion
        assert_eq!(queue.settle(120), 120);
        assert_eq!(queue.total(), 50);
        assert_eq!(queue.deposits().last().unwrap().remaining, 50);
    }

    #[test]
    fn test_withdraw_takes_only_expired_deposits() {
        let mut queue = CreditQueue::new();
        queue.deposit(alice(), 10, 5);
        queue.deposit(alice(), 20, 50);

        assert_eq!(queue.withdrawable(&alice(), 5), 10);
        assert_eq!(queue.withdraw(&alice(), 5).unwrap(), 10);
        assert_eq!(queue.total(), 20);
        assert_eq!(
            queue.withdraw(&alice(), 6).unwrap_err(),
            LedgerError::NotYetExpired { expiry: 50, now: 6 }
        );
    }

    #[test]
    fn test_withdrawable_never_exceeds_total() {
        let mut queue = CreditQueue::new();
        queue.deposit(alice(), 100, 0);
        queue.deposit(bob(), 100, 0);
        queue.settle(150);

        let sum = queue.withdrawable(&alice(), 0) + queue.withdrawable(&bob(), 0);
        assert!(sum <= queue.total());
        assert_eq!(sum, 50);
    }

    #[test]
    fn test_compaction_keeps_sequence_numbers() {
        let mut queue = CreditQueue::new();
        for _ in 0..100 {
            queue.deposit(alice(), 1, 0);
        }
        queue.settle(80);

        assert_eq!(queue.total(), 20);
        assert_eq!(queue.deposits().len(), 20);
        assert_eq!(queue.deposits()[0].seq, 80);
        assert_eq!(queue.deposit(bob(), 5, 0), 100);
    }
}
