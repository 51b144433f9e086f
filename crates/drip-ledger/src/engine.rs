//! # Drip Ledger Engine
//!
//! Single entry point for every ledger operation. Accounts live in an arena
//! keyed by `AccountId`; each one carries its fee schedule, footprint,
//! support agreement and three-tier balance.
//!
//! ## Operation Pipeline
//!
//! ```text
//!  ┌───────┐   ┌────────────┐   ┌────────┐   ┌─────────┐   ┌──────────┐   ┌────────┐
//!  │ stage │──►│ settle     │──►│ mutate │──►│ reprice │──►│ transfer │──►│ commit │
//!  │ clone │   │ distribute │   │        │   │         │   │ tokens   │   │        │
//!  └───────┘   └────────────┘   └────────┘   └─────────┘   └──────────┘   └────────┘
//! ```
//!
//! Every step up to the token transfer works on a staged copy of the
//! account. Any failure drops the copy, so a failed call leaves no trace:
//! no balance change, no recipient credit, no event. Settlement always runs
//! at the old rate before a new one is stored.

use crate::balance::{AccountLedger, BalanceTiers, SettlementReceipt};
use crate::distribution::{RevenueDistributor, RevenueSplit, WaterfallDistributor};
use crate::drip_rate::{RateCalculator, RateQuote, StandardRateCalculator, SubnetPricing};
use crate::events::LedgerEvent;
use crate::footprint::{AppUsage, Footprint};
use crate::interfaces::{AccessControl, SubnetRegistry, TokenVault};
use crate::recipients::RecipientBalances;
use crate::subnet_split::{Assignment, SubnetRevenueSplitter};
use crate::support::SupportAgreement;
use crate::terms::{FeeSelection, FeeTermsRegistry, PlatformTerms, ReferralTerms};
use drip_core::{
    AccountId, Address, Amount, AppId, BalanceTier, Capability, FeePair, FeeSchedule,
    LedgerConfig, LedgerError, Result, SubnetId, Timestamp,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// One subscribed account
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Subscription {
    account: AccountId,
    selection: FeeSelection,
    fees: FeeSchedule,
    support: SupportAgreement,
    footprint: Footprint,
    ledger: AccountLedger,
    subscribed_at: Timestamp,
}

impl Subscription {
    pub fn account(&self) -> AccountId {
        self.account
    }

    /// Addresses selected at subscription time
    pub fn selection(&self) -> &FeeSelection {
        &self.selection
    }

    pub fn fees(&self) -> &FeeSchedule {
        &self.fees
    }

    pub fn support(&self) -> &SupportAgreement {
        &self.support
    }

    pub fn footprint(&self) -> &Footprint {
        &self.footprint
    }

    pub fn ledger(&self) -> &AccountLedger {
        &self.ledger
    }

    pub fn subscribed_at(&self) -> Timestamp {
        self.subscribed_at
    }

    fn payees(&self) -> Payees {
        Payees {
            license: self.selection.license,
            support: self.support.provider(),
            referrer: self.selection.referrer,
            platform: self.selection.platform,
        }
    }
}

/// Quote plus the funding it requires
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Estimate {
    pub quote: RateQuote,

    /// Balance needed to run the quoted rate for `min_funded_secs`
    pub required_funding: Amount,

    /// Projected total balance at the estimate time (0 for a bare footprint)
    pub available: Amount,
}

impl Estimate {
    pub fn is_fundable(&self) -> bool {
        self.available >= self.required_funding
    }
}

/// Fee recipients of one distribution
#[derive(Clone, Copy, Debug)]
struct Payees {
    license: Address,
    support: Address,
    referrer: Address,
    platform: Address,
}

/// Working copy of an account for one operation
struct Staged {
    sub: Subscription,
    receipt: SettlementReceipt,
    split: Option<(RevenueSplit, Payees)>,
    events: Vec<LedgerEvent>,
}

/// Metering & settlement ledger
pub struct DripLedger {
    config: LedgerConfig,

    /// Authority allowed to register terms and swap components
    admin: Address,

    /// Global DAO recipient
    dao: Address,

    terms: FeeTermsRegistry,
    accounts: IndexMap<AccountId, Subscription>,
    splitter: SubnetRevenueSplitter,
    recipients: RecipientBalances,
    events: Vec<LedgerEvent>,

    calculator: Box<dyn RateCalculator>,
    distributor: Box<dyn RevenueDistributor>,

    token: Box<dyn TokenVault>,
    access: Box<dyn AccessControl>,
    subnets: Box<dyn SubnetRegistry>,
}

impl DripLedger {
    /// Create a ledger with the standard calculator and waterfall distributor
    pub fn new(
        config: LedgerConfig,
        admin: Address,
        token: Box<dyn TokenVault>,
        access: Box<dyn AccessControl>,
        subnets: Box<dyn SubnetRegistry>,
    ) -> Result<Self> {
        config.validate()?;
        let dao = config.treasury.dao_address()?;

        info!("Drip ledger initialized: admin={}, dao={}", admin, dao);

        Ok(Self {
            config,
            admin,
            dao,
            terms: FeeTermsRegistry::new(),
            accounts: IndexMap::new(),
            splitter: SubnetRevenueSplitter::new(),
            recipients: RecipientBalances::new(),
            events: Vec::new(),
            calculator: Box::new(StandardRateCalculator),
            distributor: Box::new(WaterfallDistributor),
            token,
            access,
            subnets,
        })
    }

    // === Admin ===

    fn require_admin(&self, caller: &Address) -> Result<()> {
        if *caller != self.admin {
            return Err(LedgerError::NotAdmin(*caller));
        }
        Ok(())
    }

    /// Replace the drip rate calculator; existing rates stay until their next change
    pub fn set_rate_calculator(
        &mut self,
        caller: &Address,
        calculator: Box<dyn RateCalculator>,
    ) -> Result<()> {
        self.require_admin(caller)?;
        self.calculator = calculator;
        info!("Rate calculator replaced by {}", caller);
        self.events.push(LedgerEvent::ComponentReplaced {
            component: "rate_calculator".to_string(),
        });
        Ok(())
    }

    /// Replace the revenue distributor
    pub fn set_distributor(
        &mut self,
        caller: &Address,
        distributor: Box<dyn RevenueDistributor>,
    ) -> Result<()> {
        self.require_admin(caller)?;
        self.distributor = distributor;
        info!("Revenue distributor replaced by {}", caller);
        self.events.push(LedgerEvent::ComponentReplaced {
            component: "distributor".to_string(),
        });
        Ok(())
    }

    pub fn register_license(&mut self, caller: &Address, licensor: Address, fee: FeePair) -> Result<()> {
        self.require_admin(caller)?;
        self.terms.register_license(licensor, fee);
        Ok(())
    }

    pub fn register_support(&mut self, caller: &Address, provider: Address, fee: FeePair) -> Result<()> {
        self.require_admin(caller)?;
        self.terms.register_support(provider, fee);
        Ok(())
    }

    pub fn register_referrer(
        &mut self,
        caller: &Address,
        referrer: Address,
        terms: ReferralTerms,
    ) -> Result<()> {
        self.require_admin(caller)?;
        self.terms.register_referrer(referrer, terms);
        Ok(())
    }

    pub fn register_platform(
        &mut self,
        caller: &Address,
        platform: Address,
        terms: PlatformTerms,
    ) -> Result<()> {
        self.require_admin(caller)?;
        self.terms.register_platform(platform, terms);
        Ok(())
    }

    // === Staging ===

    fn authorize(&self, caller: &Address, account: AccountId, capability: Capability) -> Result<()> {
        if self.access.is_authorized(caller, account, capability) {
            Ok(())
        } else {
            Err(LedgerError::Unauthorized {
                caller: *caller,
                account,
                capability,
            })
        }
    }

    /// Copy an account and settle it to `now`, optionally distributing
    fn stage(&self, account: AccountId, now: Timestamp, distribute: bool) -> Result<Staged> {
        let mut sub = self
            .accounts
            .get(&account)
            .cloned()
            .ok_or(LedgerError::AccountNotFound(account))?;
        let mut events = Vec::new();

        let receipt = sub.ledger.settle(now);
        if receipt.elapsed() > 0 {
            if receipt.insolvent() {
                warn!(
                    "Account {} insolvent: charged {} of {} over [{}, {})",
                    account,
                    receipt.charged(),
                    receipt.requested,
                    receipt.from,
                    receipt.to
                );
            } else {
                debug!(
                    "Settled {}: {} over [{}, {})",
                    account,
                    receipt.charged(),
                    receipt.from,
                    receipt.to
                );
            }
            events.push(LedgerEvent::Settled {
                account,
                from: receipt.from,
                to: receipt.to,
                charged: receipt.charged(),
                insolvent: receipt.insolvent(),
            });
        }

        let split = if distribute {
            self.split_pending(&mut sub, &mut events)?
        } else {
            None
        };

        Ok(Staged {
            sub,
            receipt,
            split,
            events,
        })
    }

    fn split_pending(
        &self,
        sub: &mut Subscription,
        events: &mut Vec<LedgerEvent>,
    ) -> Result<Option<(RevenueSplit, Payees)>> {
        if sub.ledger.pending().is_empty() {
            return Ok(None);
        }

        let pending = sub.ledger.take_pending();
        if pending.amount == 0 {
            return Ok(None);
        }

        let split = self.distributor.split(&pending, &sub.fees);
        if split.total() != pending.amount {
            return Err(LedgerError::Config(format!(
                "distributor split {} of {} settled",
                split.total(),
                pending.amount
            )));
        }

        debug!(
            "Distributed {} of {}: fees={}, compute={}",
            split.settled,
            sub.account,
            split.fee_total(),
            split.compute_total()
        );
        events.push(LedgerEvent::Distributed {
            account: sub.account,
            split: split.clone(),
        });
        Ok(Some((split, sub.payees())))
    }

    fn quote_for(&self, footprint: &Footprint, fees: &FeeSchedule, now: Timestamp) -> Result<RateQuote> {
        let pricing = footprint
            .subnets()
            .map(|(subnet, usage)| {
                Ok(SubnetPricing {
                    subnet: *subnet,
                    usage: usage.aggregate(),
                    unit_prices: self.subnets.unit_prices(*subnet)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(self.calculator.quote(&pricing, fees, now))
    }

    fn required_funding(&self, quote: &RateQuote) -> Amount {
        quote.funding_for(self.config.funding.min_funded_secs)
    }

    /// Recompute and store the staged account's rate
    ///
    /// A rate increase must be covered for `min_funded_secs` when `check_funding` is set.
    fn reprice(&self, staged: &mut Staged, now: Timestamp, check_funding: bool) -> Result<RateQuote> {
        let quote = self.quote_for(&staged.sub.footprint, &staged.sub.fees, now)?;
        let previous = staged.sub.ledger.drip_rate();

        if check_funding && quote.drip_rate > previous {
            let required = self.required_funding(&quote);
            let available = staged.sub.ledger.tiers().total();
            if available < required {
                return Err(LedgerError::InsufficientFunding {
                    required,
                    available,
                });
            }
        }

        staged.sub.ledger.change_drip_rate(&quote, now)?;
        if previous != quote.drip_rate {
            info!(
                "Drip rate of {} changed: {} -> {}",
                staged.sub.account, previous, quote.drip_rate
            );
            staged.events.push(LedgerEvent::DripRateChanged {
                account: staged.sub.account,
                previous,
                current: quote.drip_rate,
                at: now,
            });
        }
        Ok(quote)
    }

    fn commit(&mut self, staged: Staged) {
        let Staged {
            sub, split, events, ..
        } = staged;

        if let Some((split, payees)) = split {
            self.recipients.credit(payees.license, split.license);
            self.recipients.credit(self.dao, split.dao + split.unattributed);
            self.recipients.credit(payees.support, split.support);
            self.recipients.credit(payees.referrer, split.referral);
            self.recipients.credit(payees.platform, split.platform);
            for (subnet, share) in &split.subnet_shares {
                self.splitter.accrue(*subnet, *share);
            }
        }

        self.events.extend(events);
        self.accounts.insert(sub.account, sub);
    }

    // === Subscription & footprint ===

    /// Create an account with the fees of the selected, registered parties
    pub fn subscribe(
        &mut self,
        caller: &Address,
        account: AccountId,
        selection: FeeSelection,
        now: Timestamp,
    ) -> Result<()> {
        self.authorize(caller, account, Capability::Deploy)?;
        if self.accounts.contains_key(&account) {
            return Err(LedgerError::AlreadySubscribed(account));
        }

        let fees = self
            .terms
            .schedule_for(&selection, self.config.treasury.dao_percent, now)?;

        let sub = Subscription {
            account,
            selection,
            support: SupportAgreement::new(selection.support, fees.support),
            fees,
            footprint: Footprint::new(),
            ledger: AccountLedger::new(now),
            subscribed_at: now,
        };

        info!("Account {} subscribed at {}", account, now);
        self.events.push(LedgerEvent::Subscribed { account, at: now });
        self.accounts.insert(account, sub);
        Ok(())
    }

    /// Deploy an app, returning the new rate quote
    pub fn add_app(
        &mut self,
        caller: &Address,
        account: AccountId,
        subnet: SubnetId,
        app: AppId,
        usage: AppUsage,
        now: Timestamp,
    ) -> Result<RateQuote> {
        self.authorize(caller, account, Capability::Deploy)?;
        let mut staged = self.stage(account, now, true)?;

        staged
            .sub
            .footprint
            .add_app(subnet, app, usage, &self.config.limits)?;
        let quote = self.reprice(&mut staged, now, true)?;

        staged.events.push(LedgerEvent::AppAdded {
            account,
            subnet,
            app,
        });
        self.commit(staged);
        Ok(quote)
    }

    /// Change an app's resource usage
    pub fn update_app(
        &mut self,
        caller: &Address,
        account: AccountId,
        subnet: SubnetId,
        app: AppId,
        usage: AppUsage,
        now: Timestamp,
    ) -> Result<RateQuote> {
        self.authorize(caller, account, Capability::Deploy)?;
        let mut staged = self.stage(account, now, true)?;

        staged.sub.footprint.update_app(subnet, app, usage)?;
        let quote = self.reprice(&mut staged, now, true)?;

        staged.events.push(LedgerEvent::AppUpdated {
            account,
            subnet,
            app,
        });
        self.commit(staged);
        Ok(quote)
    }

    pub fn remove_app(
        &mut self,
        caller: &Address,
        account: AccountId,
        subnet: SubnetId,
        app: AppId,
        now: Timestamp,
    ) -> Result<RateQuote> {
        self.authorize(caller, account, Capability::Deploy)?;
        let mut staged = self.stage(account, now, true)?;

        staged.sub.footprint.remove_app(subnet, app)?;
        let quote = self.reprice(&mut staged, now, true)?;

        staged.events.push(LedgerEvent::AppRemoved {
            account,
            subnet,
            app,
        });
        self.commit(staged);
        Ok(quote)
    }

    /// Drop every app of the account on one subnet
    pub fn remove_subnet(
        &mut self,
        caller: &Address,
        account: AccountId,
        subnet: SubnetId,
        now: Timestamp,
    ) -> Result<RateQuote> {
        self.authorize(caller, account, Capability::Deploy)?;
        let mut staged = self.stage(account, now, true)?;

        staged.sub.footprint.remove_subnet(subnet)?;
        let quote = self.reprice(&mut staged, now, true)?;

        staged
            .events
            .push(LedgerEvent::SubnetRemoved { account, subnet });
        self.commit(staged);
        Ok(quote)
    }

    // === Estimation ===

    /// Quote a footprint under a fee schedule without touching any account
    pub fn estimate(&self, footprint: &Footprint, fees: &FeeSchedule, now: Timestamp) -> Result<Estimate> {
        let quote = self.quote_for(footprint, fees, now)?;
        Ok(Estimate {
            required_funding: self.required_funding(&quote),
            available: 0,
            quote,
        })
    }

    /// Quote the rate `add_app` or `update_app` would store for this usage
    pub fn estimate_app_change(
        &self,
        account: AccountId,
        subnet: SubnetId,
        app: AppId,
        usage: AppUsage,
        now: Timestamp,
    ) -> Result<Estimate> {
        let sub = self.subscription(account)?;
        let mut footprint = sub.footprint.clone();

        let exists = footprint
            .subnet(subnet)
            .and_then(|usage| usage.app(app))
            .is_some();
        if exists {
            footprint.update_app(subnet, app, usage)?;
        } else {
            footprint.add_app(subnet, app, usage, &self.config.limits)?;
        }

        let quote = self.quote_for(&footprint, &sub.fees, now)?;
        Ok(Estimate {
            required_funding: self.required_funding(&quote),
            available: sub.ledger.projected(now).total(),
            quote,
        })
    }

    // === Settlement & distribution ===

    /// Charge elapsed cost into the pending accumulator
    pub fn settle(&mut self, account: AccountId, now: Timestamp) -> Result<SettlementReceipt> {
        let staged = self.stage(account, now, false)?;
        let receipt = staged.receipt;
        self.commit(staged);
        Ok(receipt)
    }

    /// Settle, then split the accumulator into recipient balances
    pub fn distribute(&mut self, account: AccountId, now: Timestamp) -> Result<RevenueSplit> {
        let staged = self.stage(account, now, true)?;
        let split = staged
            .split
            .as_ref()
            .map(|(split, _)| split.clone())
            .unwrap_or_default();
        self.commit(staged);
        Ok(split)
    }

    /// Credit a subnet's pending compute revenue to its weighted operators
    pub fn assign_revenues(&mut self, subnet: SubnetId) -> Result<Assignment> {
        let weights = self.subnets.cluster_weights(subnet)?;
        let assignment = self.splitter.assign(subnet, &weights);

        for (operator, share) in &assignment.shares {
            self.recipients.credit(*operator, *share);
        }

        if assignment.assigned() > 0 {
            debug!(
                "Assigned {} of {} to {} operators, dust {}",
                assignment.assigned(),
                subnet,
                assignment.shares.len(),
                assignment.dust
            );
            self.events.push(LedgerEvent::RevenueAssigned {
                subnet,
                assigned: assignment.assigned(),
                dust: assignment.dust,
            });
        }
        Ok(assignment)
    }

    /// Pay out everything owed to `recipient`; zero when nothing is owed
    pub fn receive_revenue(&mut self, recipient: &Address) -> Result<Amount> {
        let owed = self.recipients.balance_of(recipient);
        if owed == 0 {
            return Ok(0);
        }

        self.token.transfer_out(recipient, owed)?;
        self.recipients.take(recipient);

        debug!("Paid {} to {}", owed, recipient);
        self.events.push(LedgerEvent::RevenueReceived {
            recipient: *recipient,
            amount: owed,
        });
        Ok(owed)
    }

    // === Deposits & withdrawals ===

    /// Append a credit deposit returnable to `caller` after `expiry`
    pub fn deposit_credit(
        &mut self,
        caller: &Address,
        account: AccountId,
        amount: Amount,
        expiry: Timestamp,
        now: Timestamp,
    ) -> Result<u64> {
        if amount == 0 {
            return Err(LedgerError::ZeroAmount);
        }
        let mut staged = self.stage(account, now, true)?;

        let seq = staged.sub.ledger.deposit_credit(*caller, amount, expiry);
        staged.events.push(LedgerEvent::CreditDeposited {
            account,
            depositor: *caller,
            amount,
            expiry,
            seq,
        });

        self.token.transfer_in(caller, amount)?;
        self.commit(staged);
        Ok(seq)
    }

    /// Third party deposit with no return rights
    pub fn deposit_external(
        &mut self,
        caller: &Address,
        account: AccountId,
        amount: Amount,
        now: Timestamp,
    ) -> Result<()> {
        self.deposit_tier(caller, account, BalanceTier::External, amount, now)
    }

    /// Account holder deposit
    pub fn deposit_owner(
        &mut self,
        caller: &Address,
        account: AccountId,
        amount: Amount,
        now: Timestamp,
    ) -> Result<()> {
        self.authorize(caller, account, Capability::BillingManage)?;
        self.deposit_tier(caller, account, BalanceTier::Owner, amount, now)
    }

    fn deposit_tier(
        &mut self,
        caller: &Address,
        account: AccountId,
        tier: BalanceTier,
        amount: Amount,
        now: Timestamp,
    ) -> Result<()> {
        if amount == 0 {
            return Err(LedgerError::ZeroAmount);
        }
        let mut staged = self.stage(account, now, true)?;

        staged.sub.ledger.add_balance(tier, amount)?;
        staged.events.push(match tier {
            BalanceTier::Owner => LedgerEvent::OwnerDeposited {
                account,
                payer: *caller,
                amount,
            },
            _ => LedgerEvent::ExternalDeposited {
                account,
                payer: *caller,
                amount,
            },
        });

        self.token.transfer_in(caller, amount)?;
        self.commit(staged);
        Ok(())
    }

    /// Return the caller's expired, undepleted credit deposits
    pub fn withdraw_credit(&mut self, caller: &Address, account: AccountId, now: Timestamp) -> Result<Amount> {
        let mut staged = self.stage(account, now, true)?;

        let amount = staged.sub.ledger.withdraw_credit(caller, now)?;
        staged.events.push(LedgerEvent::CreditWithdrawn {
            account,
            depositor: *caller,
            amount,
        });

        self.token.transfer_out(caller, amount)?;
        self.commit(staged);
        Ok(amount)
    }

    /// Withdraw from the owner tier to the caller
    pub fn withdraw_owner(
        &mut self,
        caller: &Address,
        account: AccountId,
        amount: Amount,
        now: Timestamp,
    ) -> Result<()> {
        self.authorize(caller, account, Capability::BillingManage)?;
        if amount == 0 {
            return Err(LedgerError::ZeroAmount);
        }
        let mut staged = self.stage(account, now, true)?;

        staged.sub.ledger.withdraw_balance(BalanceTier::Owner, amount)?;
        staged.events.push(LedgerEvent::OwnerWithdrawn {
            account,
            recipient: *caller,
            amount,
        });

        self.token.transfer_out(caller, amount)?;
        self.commit(staged);
        Ok(())
    }

    // === Support ===

    fn account_mut(&mut self, account: AccountId) -> Result<&mut Subscription> {
        self.accounts
            .get_mut(&account)
            .ok_or(LedgerError::AccountNotFound(account))
    }

    /// Current support provider proposes a new fee
    pub fn propose_support_fee(
        &mut self,
        caller: &Address,
        account: AccountId,
        fee: FeePair,
        now: Timestamp,
    ) -> Result<()> {
        self.account_mut(account)?.support.propose_fee(caller, fee, now)?;
        self.events.push(LedgerEvent::SupportFeeProposed {
            account,
            provider: *caller,
            fee,
        });
        Ok(())
    }

    /// Account holder approves the proposed fee
    pub fn approve_support_fee(&mut self, caller: &Address, account: AccountId, now: Timestamp) -> Result<FeePair> {
        self.authorize(caller, account, Capability::BillingManage)?;
        let fee = self.account_mut(account)?.support.approve_fee(now)?;
        self.events.push(LedgerEvent::SupportFeeApproved { account, fee });
        Ok(fee)
    }

    /// Put an approved fee into effect once the notice period is over
    pub fn apply_support_fee(&mut self, account: AccountId, now: Timestamp) -> Result<FeePair> {
        let mut staged = self.stage(account, now, true)?;

        let previous = staged.sub.support.apply_fee(now, &self.config.support)?;
        let current = staged.sub.support.fee();
        staged.sub.fees.support = current;
        self.reprice(&mut staged, now, false)?;

        info!("Support fee of {} applied: {:?} -> {:?}", account, previous, current);
        staged.events.push(LedgerEvent::SupportFeeApplied {
            account,
            previous,
            current,
        });
        self.commit(staged);
        Ok(previous)
    }

    /// Account holder asks to switch to another registered provider
    pub fn request_support_change(
        &mut self,
        caller: &Address,
        account: AccountId,
        new_provider: Address,
        now: Timestamp,
    ) -> Result<()> {
        self.authorize(caller, account, Capability::BillingManage)?;
        let fee = self.terms.support(&new_provider)?;

        let sub = self
            .accounts
            .get_mut(&account)
            .ok_or(LedgerError::AccountNotFound(account))?;
        sub.support
            .request_change(new_provider, fee, now, &self.config.support)?;

        info!("Support change requested for {}: {}", account, new_provider);
        self.events.push(LedgerEvent::SupportChangeRequested {
            account,
            new_provider,
        });
        Ok(())
    }

    /// Switch provider once the notice period is over, returning the outgoing one
    pub fn apply_support_change(&mut self, account: AccountId, now: Timestamp) -> Result<Address> {
        let mut staged = self.stage(account, now, true)?;

        let previous = staged.sub.support.apply_change(now, &self.config.support)?;
        let current = staged.sub.support.provider();
        staged.sub.fees.support = staged.sub.support.fee();
        self.reprice(&mut staged, now, false)?;

        info!("Support provider of {} changed: {} -> {}", account, previous, current);
        staged.events.push(LedgerEvent::SupportChangeApplied {
            account,
            previous,
            current,
        });
        self.commit(staged);
        Ok(previous)
    }

    pub fn cancel_support_change(&mut self, caller: &Address, account: AccountId) -> Result<()> {
        self.authorize(caller, account, Capability::BillingManage)?;
        self.account_mut(account)?.support.cancel_change()?;
        self.events
            .push(LedgerEvent::SupportChangeCancelled { account });
        Ok(())
    }

    // === Queries ===

    pub fn subscription(&self, account: AccountId) -> Result<&Subscription> {
        self.accounts
            .get(&account)
            .ok_or(LedgerError::AccountNotFound(account))
    }

    pub fn accounts(&self) -> impl Iterator<Item = &Subscription> {
        self.accounts.values()
    }

    /// Tiers as they would stand after settling at `now`
    pub fn balance(&self, account: AccountId, now: Timestamp) -> Result<BalanceTiers> {
        Ok(self.subscription(account)?.ledger.projected(now))
    }

    /// When the projected balance runs out at the current rate
    pub fn funded_until(&self, account: AccountId, now: Timestamp) -> Result<Option<Timestamp>> {
        Ok(self.subscription(account)?.ledger.funded_until(now))
    }

    /// Credit `depositor` could withdraw at `now`, after projected depletion
    pub fn withdrawable_credit(&self, account: AccountId, depositor: &Address, now: Timestamp) -> Result<Amount> {
        let mut ledger = self.subscription(account)?.ledger.clone();
        ledger.settle(now);
        Ok(ledger.credit().withdrawable(depositor, now))
    }

    pub fn drip_rate(&self, account: AccountId) -> Result<Amount> {
        Ok(self.subscription(account)?.ledger.drip_rate())
    }

    /// Amount owed to a recipient
    pub fn owed(&self, recipient: &Address) -> Amount {
        self.recipients.balance_of(recipient)
    }

    pub fn recipients(&self) -> &RecipientBalances {
        &self.recipients
    }

    /// Compute revenue of a subnet awaiting assignment
    pub fn subnet_pending(&self, subnet: SubnetId) -> Amount {
        self.splitter.pending(subnet)
    }

    /// Everything the ledger owes as of each account's last settlement
    ///
    /// Matches the tokens the vault holds for the ledger.
    pub fn total_liabilities(&self) -> Amount {
        let accounts: Amount = self
            .accounts
            .values()
            .map(|sub| sub.ledger.tiers().total() + sub.ledger.pending().amount)
            .sum();
        accounts + self.splitter.total_pending() + self.recipients.total_owed()
    }

    pub fn terms(&self) -> &FeeTermsRegistry {
        &self.terms
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn admin(&self) -> Address {
        self.admin
    }

    pub fn dao_address(&self) -> Address {
        self.dao
    }

    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    /// Return and clear the event log
    pub fn drain_events(&mut self) -> Vec<LedgerEvent> {
        std::mem::take(&mut self.events)
    }
}
