//! Error types for drip ledger operations

use crate::types::{AccountId, Address, Amount, AppId, BalanceTier, Capability, SubnetId, Timestamp};
use thiserror::Error;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Broad category of a failure
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Caller lacks the capability or identity the operation requires
    Authorization,
    /// An expiry, notice or cooldown has not elapsed yet
    Timing,
    /// A bounded collection would overflow
    Capacity,
    /// An address, subnet or setting was never registered or is malformed
    InvalidConfiguration,
    /// Not enough funds for the requested movement
    Balance,
    /// The referenced record does not exist
    NotFound,
    /// Failure inside an external collaborator
    External,
}

/// Errors that can occur in drip ledger operations
///
/// Every failing operation leaves ledger state untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    // === Authorization ===
    /// Caller lacks a capability on the account
    #[error("{caller} lacks {capability} on {account}")]
    Unauthorized {
        caller: Address,
        account: AccountId,
        capability: Capability,
    },

    /// Caller is not the ledger admin authority
    #[error("{0} is not the ledger admin")]
    NotAdmin(Address),

    /// Caller never deposited credit on the account
    #[error("{0} never deposited credit on this account")]
    NotDepositor(Address),

    /// Caller is not the account's current support provider
    #[error("{0} is not the support provider of this account")]
    NotSupportProvider(Address),

    // === Timing ===
    /// Credit deposit expiry has not passed yet
    #[error("credit deposit not yet expired: expires at {expiry}, now {now}")]
    NotYetExpired { expiry: Timestamp, now: Timestamp },

    /// Support change notice period still running
    #[error("notice period not over: ends at {ends_at}, now {now}")]
    NoticeNotOver { ends_at: Timestamp, now: Timestamp },

    /// Support provider cooldown still running
    #[error("cooldown not over: ends at {ends_at}, now {now}")]
    CooldownNotOver { ends_at: Timestamp, now: Timestamp },

    // === Capacity ===
    /// Too many active subnets on the account
    #[error("account already uses the maximum of {max} subnets")]
    TooManySubnets { max: usize },

    /// Too many apps on the account
    #[error("account already runs the maximum of {max} apps")]
    TooManyApps { max: usize },

    // === Invalid configuration ===
    /// Support address never registered
    #[error("support provider {0} is not registered")]
    UnregisteredSupport(Address),

    /// Referral address never registered
    #[error("referrer {0} is not registered")]
    UnregisteredReferrer(Address),

    /// License address never registered
    #[error("licensor {0} is not registered")]
    UnregisteredLicense(Address),

    /// Platform address never registered
    #[error("platform {0} is not registered")]
    UnregisteredPlatform(Address),

    /// Subnet unknown to the subnet registry
    #[error("unknown subnet: {0}")]
    UnknownSubnet(SubnetId),

    /// Malformed address in configuration
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Invalid or unreadable configuration
    #[error("configuration error: {0}")]
    Config(String),

    // === Balance ===
    /// Tier holds less than requested
    #[error("insufficient {tier} balance: requested {requested}, available {available}")]
    InsufficientBalance {
        tier: BalanceTier,
        requested: Amount,
        available: Amount,
    },

    /// Total balance cannot fund the new drip rate for the minimum period
    #[error("insufficient funding: required {required}, available {available}")]
    InsufficientFunding { required: Amount, available: Amount },

    /// Deposits and withdrawals of zero are rejected
    #[error("amount must be greater than zero")]
    ZeroAmount,

    /// The tier does not support this movement (external funds never return)
    #[error("operation not supported on {0} balance")]
    UnsupportedTierOperation(BalanceTier),

    /// Every credit the caller deposited has been consumed by settlement
    #[error("{0} has no undepleted credit left to withdraw")]
    NoWithdrawableCredit(Address),

    // === Lookup ===
    /// Account was never subscribed
    #[error("account not found: {0}")]
    AccountNotFound(AccountId),

    /// Account already subscribed
    #[error("account already subscribed: {0}")]
    AlreadySubscribed(AccountId),

    /// App not present on the subnet
    #[error("{app} not found on {subnet}")]
    AppNotFound { subnet: SubnetId, app: AppId },

    /// App already present on the subnet
    #[error("{app} already deployed on {subnet}")]
    AppExists { subnet: SubnetId, app: AppId },

    /// Subnet not part of the account footprint
    #[error("{0} is not active on this account")]
    SubnetNotActive(SubnetId),

    /// Operator has no cluster listed on the subnet
    #[error("operator {operator} has no cluster on {subnet}")]
    UnknownCluster { subnet: SubnetId, operator: Address },

    /// No support fee proposal or provider change pending
    #[error("no pending support request")]
    NoPendingRequest,

    /// Support fee proposal exists but the account holder has not approved it
    #[error("support fee proposal not approved")]
    NotApproved,

    // === Ordering ===
    /// Drip rate change attempted before settling up to the change time
    #[error("drip rate change at {now} but account settled only up to {last_settled}")]
    UnsettledRateChange { last_settled: Timestamp, now: Timestamp },

    // === External ===
    /// Token collaborator rejected a transfer
    #[error("token transfer failed: {0}")]
    Token(String),
}

impl LedgerError {
    /// Stable numeric error code
    pub fn code(&self) -> u32 {
        match self {
            Self::Unauthorized { .. } => 1001,
            Self::NotAdmin(_) => 1002,
            Self::NotDepositor(_) => 1003,
            Self::NotSupportProvider(_) => 1004,
            Self::NotYetExpired { .. } => 2001,
            Self::NoticeNotOver { .. } => 2002,
            Self::CooldownNotOver { .. } => 2003,
            Self::TooManySubnets { .. } => 3001,
            Self::TooManyApps { .. } => 3002,
            Self::UnregisteredSupport(_) => 4001,
            Self::UnregisteredReferrer(_) => 4002,
            Self::UnregisteredLicense(_) => 4003,
            Self::UnregisteredPlatform(_) => 4004,
            Self::UnknownSubnet(_) => 4005,
            Self::InvalidAddress(_) | Self::Config(_) => 4006,
            Self::InsufficientBalance { .. } => 5001,
            Self::InsufficientFunding { .. } => 5002,
            Self::ZeroAmount => 5003,
            Self::UnsupportedTierOperation(_) => 5004,
            Self::NoWithdrawableCredit(_) => 5005,
            Self::Token(_) => 7001,
            _ => 6000,
        }
    }

    /// Category of the failure
    pub fn kind(&self) -> ErrorKind {
        match self.code() / 1000 {
            1 => ErrorKind::Authorization,
            2 => ErrorKind::Timing,
            3 => ErrorKind::Capacity,
            4 => ErrorKind::InvalidConfiguration,
            5 => ErrorKind::Balance,
            7 => ErrorKind::External,
            _ => match self {
                Self::UnsettledRateChange { .. } => ErrorKind::InvalidConfiguration,
                _ => ErrorKind::NotFound,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = LedgerError::NotYetExpired { expiry: 10, now: 5 };
        assert_eq!(err.code(), 2001);
        assert_eq!(err.kind(), ErrorKind::Timing);

        let err = LedgerError::TooManySubnets { max: 255 };
        assert_eq!(err.kind(), ErrorKind::Capacity);
    }

    #[test]
    fn test_timing_errors_are_distinct() {
        let expired = LedgerError::NotYetExpired { expiry: 10, now: 5 };
        let notice = LedgerError::NoticeNotOver { ends_at: 10, now: 5 };
        let cooldown = LedgerError::CooldownNotOver { ends_at: 10, now: 5 };
        assert_ne!(expired.code(), notice.code());
        assert_ne!(notice.code(), cooldown.code());
        assert!(format!("{}", notice).contains("notice"));
        assert!(format!("{}", cooldown).contains("cooldown"));
    }

    #[test]
    fn test_lookup_errors() {
        assert_eq!(LedgerError::AccountNotFound(AccountId(1)).kind(), ErrorKind::NotFound);
        assert_eq!(
            LedgerError::UnregisteredSupport(Address::ZERO).kind(),
            ErrorKind::InvalidConfiguration
        );

        let err = LedgerError::UnknownCluster {
            subnet: SubnetId(1),
            operator: Address::ZERO,
        };
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(format!("{}", err).contains("has no cluster"));
    }

    #[test]
    fn test_depleted_credit_is_a_balance_error() {
        let err = LedgerError::NoWithdrawableCredit(Address::ZERO);
        assert_eq!(err.code(), 5005);
        assert_eq!(err.kind(), ErrorKind::Balance);
        assert_eq!(LedgerError::NotDepositor(Address::ZERO).kind(), ErrorKind::Authorization);
    }
}
