//! Ledger configuration types

use crate::error::{LedgerError, Result};
use crate::fees::PERCENT_DENOMINATOR;
use crate::types::Address;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Hard ceiling on active subnets per account
pub const MAX_SUBNETS_CEILING: usize = 255;

/// Complete ledger configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Collection bounds
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Support fee and provider change timing
    #[serde(default)]
    pub support: SupportConfig,

    /// Global DAO recipient and rate
    #[serde(default)]
    pub treasury: TreasuryConfig,

    /// Funding requirement on footprint changes
    #[serde(default)]
    pub funding: FundingConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl LedgerConfig {
    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| LedgerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file, then apply `DRIP__SECTION__KEY` environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()).required(false))
            .add_source(
                config::Environment::with_prefix("DRIP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| LedgerError::Config(e.to_string()))?;

        let config: Self = settings
            .try_deserialize()
            .map_err(|e| LedgerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| LedgerError::Config(e.to_string()))
    }

    /// Reject settings the ledger cannot honor
    pub fn validate(&self) -> Result<()> {
        if self.limits.max_subnets_per_account == 0
            || self.limits.max_subnets_per_account > MAX_SUBNETS_CEILING
        {
            return Err(LedgerError::Config(format!(
                "max_subnets_per_account must be within 1..={}",
                MAX_SUBNETS_CEILING
            )));
        }
        if self.limits.max_apps_per_account == 0 {
            return Err(LedgerError::Config("max_apps_per_account must be positive".into()));
        }
        if self.treasury.dao_percent as u128 > PERCENT_DENOMINATOR {
            return Err(LedgerError::Config(format!(
                "dao_percent {} exceeds {}",
                self.treasury.dao_percent, PERCENT_DENOMINATOR
            )));
        }
        self.treasury.dao_address()?;
        Ok(())
    }
}

/// Collection bounds
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum active subnets per account (at most 255)
    #[serde(default = "default_max_subnets")]
    pub max_subnets_per_account: usize,

    /// Maximum apps per account across all subnets
    #[serde(default = "default_max_apps")]
    pub max_apps_per_account: usize,
}

fn default_max_subnets() -> usize {
    MAX_SUBNETS_CEILING
}

fn default_max_apps() -> usize {
    1024
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_subnets_per_account: default_max_subnets(),
            max_apps_per_account: default_max_apps(),
        }
    }
}

/// Support change timing
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SupportConfig {
    /// Delay between approval/request and apply
    #[serde(default = "default_notice_period")]
    pub notice_period_secs: u64,

    /// Minimum time between support provider changes
    #[serde(default = "default_cooldown_period")]
    pub cooldown_period_secs: u64,
}

fn default_notice_period() -> u64 {
    24 * 3600 // 1 day
}

fn default_cooldown_period() -> u64 {
    30 * 24 * 3600 // 30 days
}

impl Default for SupportConfig {
    fn default() -> Self {
        Self {
            notice_period_secs: default_notice_period(),
            cooldown_period_secs: default_cooldown_period(),
        }
    }
}

/// Global DAO settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TreasuryConfig {
    /// DAO recipient address (hex)
    #[serde(default = "default_dao_address")]
    pub dao_address: String,

    /// DAO rate in parts-per-100000 (s)
    #[serde(default = "default_dao_percent")]
    pub dao_percent: u32,
}

fn default_dao_address() -> String {
    Address::from_label("drip-dao").to_hex()
}

fn default_dao_percent() -> u32 {
    5_000 // 5%
}

impl TreasuryConfig {
    /// Parsed DAO address
    pub fn dao_address(&self) -> Result<Address> {
        Address::from_hex(&self.dao_address).map_err(|e| LedgerError::InvalidAddress(e.0))
    }
}

impl Default for TreasuryConfig {
    fn default() -> Self {
        Self {
            dao_address: default_dao_address(),
            dao_percent: default_dao_percent(),
        }
    }
}

/// Funding requirement on subscribe and footprint changes
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FundingConfig {
    /// Seconds the total balance must cover at the new drip rate (0 disables)
    #[serde(default)]
    pub min_funded_secs: u64,
}

/// Logging configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format ("text" or "json")
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}
