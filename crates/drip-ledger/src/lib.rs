//! # Drip Ledger - Metering & Settlement
//!
//! Per-second drip billing for accounts that run apps on compute subnets.
//!
//! ## Key Features
//!
//! - **Drip rates**: compute cost from priced resource footprints, inflated by fees
//! - **Three-tier balances**: credit (FIFO, per-depositor expiry), external, owner
//! - **Lazy settlement**: cost accrues only when an operation touches the account
//! - **Revenue waterfall**: license, DAO, support, referral, platform, then compute
//! - **Pull payments**: recipients and cluster operators withdraw what they are owed
//!
//! ## Money Flow
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────────┐
//! │  deposits ──► [credit │ external │ owner] ──settle──► pending revenue  │
//! │                                                          │             │
//! │                                           distribute ◄───┘             │
//! │                                               │                        │
//! │        ┌──────────┬──────┬─────────┬──────────┼──────────┐             │
//! │        ▼          ▼      ▼         ▼          ▼          ▼             │
//! │     license      DAO  support  referral  platform   subnet share       │
//! │        │          │      │         │          │          │ assign      │
//! │        └──────────┴──────┴─────────┴──────────┴──► recipient balances  │
//! │                                                          │ receive     │
//! │                                                          ▼             │
//! │                                                     token vault        │
//! └────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Tokens Held
//!
//! At any time the vault holds exactly what the ledger owes:
//!
//! | Liability | Where |
//! |-----------|-------|
//! | Unsettled balances | account tiers |
//! | Settled, undistributed | pending revenue |
//! | Unassigned compute share | subnet splitter |
//! | Unpaid stakeholder revenue | recipient balances |

pub mod balance;
pub mod credit_queue;
pub mod distribution;
pub mod drip_rate;
pub mod engine;
pub mod events;
pub mod footprint;
pub mod interfaces;
pub mod recipients;
pub mod subnet_split;
pub mod support;
pub mod terms;

// Re-exports
pub use balance::{AccountLedger, BalanceTiers, PendingRevenue, SettlementReceipt};
pub use credit_queue::{CreditDeposit, CreditQueue, DepositState};
pub use distribution::{RevenueDistributor, RevenueSplit, WaterfallDistributor};
pub use drip_rate::{RateCalculator, RateQuote, StandardRateCalculator, SubnetPricing};
pub use engine::{DripLedger, Estimate, Subscription};
pub use events::LedgerEvent;
pub use footprint::{AppUsage, Footprint, SubnetUsage};
pub use interfaces::{
    AccessControl, MemorySubnetRegistry, MemoryVault, OwnershipTable, SubnetRegistry, TokenVault,
};
pub use recipients::RecipientBalances;
pub use subnet_split::{Assignment, SubnetRevenueSplitter};
pub use support::{FeeProposal, ProviderChange, SupportAgreement};
pub use terms::{FeeSelection, FeeTermsRegistry, PlatformTerms, ReferralTerms};
