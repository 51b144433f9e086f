//! Core type definitions for the drip ledger
//!
//! Identifiers are plain newtypes so that an account id can never be passed
//! where a subnet id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Seconds since the Unix epoch, as seen by the settlement clock
pub type Timestamp = u64;

/// Token amount in the smallest unit
pub type Amount = u128;

/// Address - identity of a caller, depositor or revenue recipient
///
/// Serialized as a 64 character hex string.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address {
    bytes: [u8; 32],
}

impl Address {
    /// Create an address from raw bytes
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    /// Derive a stable address from a human readable label using BLAKE3
    pub fn from_label(label: &str) -> Self {
        let hash = blake3::hash(label.as_bytes());
        Self {
            bytes: *hash.as_bytes(),
        }
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Parse from a 64 character hex string (optional `0x` prefix)
    pub fn from_hex(s: &str) -> Result<Self, AddressParseError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let raw = hex::decode(s).map_err(|_| AddressParseError(s.to_string()))?;
        let bytes: [u8; 32] = raw
            .try_into()
            .map_err(|_| AddressParseError(s.to_string()))?;
        Ok(Self { bytes })
    }

    /// Zero address
    pub const ZERO: Self = Self { bytes: [0u8; 32] };
}

/// Error returned when an address string is not 32 bytes of hex
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid address: {0}")]
pub struct AddressParseError(pub String);

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl TryFrom<String> for Address {
    type Error = AddressParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_hex()
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", &self.to_hex()[..12])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..12])
    }
}

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            pub fn get(&self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

numeric_id!(
    /// AccountId - opaque subscriber account key (the identifying token id)
    AccountId,
    "Account"
);

numeric_id!(
    /// SubnetId - compute subnet key in the subnet registry
    SubnetId,
    "Subnet"
);

numeric_id!(
    /// AppId - application key within an account
    AppId,
    "App"
);

/// Capability a caller may hold on an account
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// View account state
    Read,
    /// Subscribe and mutate the app footprint
    Deploy,
    /// Grant and revoke capabilities for others
    AccessManage,
    /// Move owner funds and approve billing changes
    BillingManage,
}

impl Capability {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Deploy => "deploy",
            Self::AccessManage => "access-manage",
            Self::BillingManage => "billing-manage",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Balance tier, in depletion order
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceTier {
    /// FIFO credit deposits, returnable to each depositor after its expiry
    Credit,
    /// Third party deposits with no return rights
    External,
    /// Account holder funds
    Owner,
}

impl BalanceTier {
    /// All tiers in depletion order
    pub const DEPLETION_ORDER: [BalanceTier; 3] = [Self::Credit, Self::External, Self::Owner];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Credit => "credit",
            Self::External => "external",
            Self::Owner => "owner",
        }
    }
}

impl fmt::Display for BalanceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
