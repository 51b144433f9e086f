//! # Drip Core
//!
//! Shared vocabulary for the metering & settlement ledger.
//!
//! This crate provides the building blocks the ledger is written in:
//! - `AccountId`, `SubnetId`, `AppId`, `Address` - identifiers
//! - `FeeSchedule` - per-account fee selections and the parts-per-100000 arithmetic
//! - `LedgerError` - the error taxonomy shared by every ledger operation
//! - `LedgerConfig` - limits, support timing, treasury and funding settings
//!
//! ## Fixed point
//!
//! All percentages are integers in parts-per-100000, so `5_000` is 5%.
//! Every division floors.
//!
//! ```text
//!   drip rate = compute * (100000 + r1 + s + t1 + u + v - w) / 100000 + r2 + t2
//! ```

pub mod config;
pub mod error;
pub mod fees;
pub mod types;

pub use config::*;
pub use error::*;
pub use fees::*;
pub use types::*;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::LedgerConfig;
    pub use crate::error::{ErrorKind, LedgerError, Result};
    pub use crate::fees::{FeePair, FeeSchedule, PERCENT_DENOMINATOR};
    pub use crate::types::*;
}
