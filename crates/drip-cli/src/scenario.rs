//! # Scripted Scenarios
//!
//! A scenario is a TOML document describing a market (subnets, clusters and
//! fee terms), the accounts subscribing to it and a timeline of actions. Every
//! party is named by a label; its address is `Address::from_label(label)`.
//!
//! ```toml
//! name = "documented timeline"
//! start = "2024-01-01T00:00:00Z"
//!
//! [[subnets]]
//! id = 1
//! prices = [86]
//!
//! [[terms.licenses]]
//! name = "licensor"
//! flat_per_sec = 10
//!
//! [[accounts]]
//! id = 1
//! owner = "owner"
//! license = "licensor"
//! support = "support"
//! referrer = "referrer"
//! platform = "platform"
//!
//! [[steps]]
//! at = 12
//! action = "distribute"
//! account = 1
//! ```
//!
//! Steps run in file order. A step scheduled before the current clock runs at
//! the current clock. A failing step is recorded and the replay continues.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use drip_core::{
    AccountId, Address, Amount, AppId, Capability, FeePair, LedgerConfig, SubnetId, Timestamp,
};
use drip_ledger::{
    AppUsage, BalanceTiers, DripLedger, Estimate, FeeSelection, Footprint, LedgerEvent,
    MemorySubnetRegistry, MemoryVault, OwnershipTable, PlatformTerms, ReferralTerms,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};

/// Scenario document
#[derive(Clone, Debug, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: String,

    /// Wall-clock time of second 0 (RFC 3339), only used for display
    #[serde(default)]
    pub start: Option<String>,

    /// Label of the ledger admin that registers fee terms
    #[serde(default = "default_admin")]
    pub admin: String,

    /// Time of the final report (defaults to the last step)
    #[serde(default)]
    pub report_at: Option<Timestamp>,

    #[serde(default)]
    pub subnets: Vec<SubnetEntry>,

    #[serde(default)]
    pub clusters: Vec<ClusterEntry>,

    #[serde(default)]
    pub terms: TermsSection,

    /// Tokens minted to wallets before the replay
    #[serde(default)]
    pub funds: Vec<FundEntry>,

    #[serde(default)]
    pub accounts: Vec<AccountEntry>,

    #[serde(default)]
    pub steps: Vec<Step>,
}

fn default_admin() -> String {
    "admin".to_string()
}

#[derive(Clone, Debug, Deserialize)]
pub struct SubnetEntry {
    pub id: u64,
    /// Unit price per resource kind, per second
    pub prices: Vec<u64>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ClusterEntry {
    pub subnet: u64,
    pub operator: String,
    pub weight: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct FundEntry {
    pub holder: String,
    pub amount: u64,
}

/// Fee terms registered by the admin before any account subscribes
#[derive(Clone, Debug, Default, Deserialize)]
pub struct TermsSection {
    #[serde(default)]
    pub licenses: Vec<FeeTermEntry>,
    #[serde(default)]
    pub supports: Vec<FeeTermEntry>,
    #[serde(default)]
    pub referrers: Vec<ReferrerEntry>,
    #[serde(default)]
    pub platforms: Vec<PlatformEntry>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct FeeTermEntry {
    pub name: String,
    #[serde(default)]
    pub percent: u32,
    #[serde(default)]
    pub flat_per_sec: u64,
}

impl FeeTermEntry {
    fn fee(&self) -> FeePair {
        FeePair::new(self.percent, self.flat_per_sec as Amount)
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ReferrerEntry {
    pub name: String,
    #[serde(default)]
    pub percent: u32,
    #[serde(default)]
    pub duration_secs: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PlatformEntry {
    pub name: String,
    #[serde(default)]
    pub percent: u32,
    #[serde(default)]
    pub discount: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AccountEntry {
    pub id: u64,
    pub owner: String,
    pub license: String,
    pub support: String,
    pub referrer: String,
    pub platform: String,
    #[serde(default)]
    pub subscribed_at: Timestamp,
    /// Apps deployed right after subscribing
    #[serde(default)]
    pub apps: Vec<AppEntry>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppEntry {
    pub subnet: u64,
    pub app: u64,
    pub resources: Vec<u64>,
    pub multipliers: Vec<u64>,
}

impl AppEntry {
    fn usage(&self) -> AppUsage {
        AppUsage::new(widen(&self.resources), widen(&self.multipliers))
    }
}

fn widen(values: &[u64]) -> Vec<u128> {
    values.iter().map(|v| *v as u128).collect()
}

/// One timed action
#[derive(Clone, Debug, Deserialize)]
pub struct Step {
    pub at: Timestamp,
    #[serde(flatten)]
    pub action: Action,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    DepositCredit {
        caller: String,
        account: u64,
        amount: u64,
        expiry: Timestamp,
    },
    DepositExternal {
        caller: String,
        account: u64,
        amount: u64,
    },
    DepositOwner {
        caller: String,
        account: u64,
        amount: u64,
    },
    WithdrawCredit {
        caller: String,
        account: u64,
    },
    WithdrawOwner {
        caller: String,
        account: u64,
        amount: u64,
    },
    AddApp {
        caller: String,
        account: u64,
        subnet: u64,
        app: u64,
        resources: Vec<u64>,
        multipliers: Vec<u64>,
    },
    UpdateApp {
        caller: String,
        account: u64,
        subnet: u64,
        app: u64,
        resources: Vec<u64>,
        multipliers: Vec<u64>,
    },
    RemoveApp {
        caller: String,
        account: u64,
        subnet: u64,
        app: u64,
    },
    RemoveSubnet {
        caller: String,
        account: u64,
        subnet: u64,
    },
    Settle {
        account: u64,
    },
    Distribute {
        account: u64,
    },
    AssignRevenues {
        subnet: u64,
    },
    ReceiveRevenue {
        recipient: String,
    },
    ListCluster {
        subnet: u64,
        operator: String,
        weight: u64,
    },
    DelistCluster {
        subnet: u64,
        operator: String,
    },
    RelistCluster {
        subnet: u64,
        operator: String,
    },
    SetPrices {
        subnet: u64,
        prices: Vec<u64>,
    },
    Grant {
        account: u64,
        grantee: String,
        capability: Capability,
    },
    Revoke {
        account: u64,
        grantee: String,
        capability: Capability,
    },
    ProposeSupportFee {
        caller: String,
        account: u64,
        #[serde(default)]
        percent: u32,
        #[serde(default)]
        flat_per_sec: u64,
    },
    ApproveSupportFee {
        caller: String,
        account: u64,
    },
    ApplySupportFee {
        account: u64,
    },
    RequestSupportChange {
        caller: String,
        account: u64,
        provider: String,
    },
    ApplySupportChange {
        account: u64,
    },
    CancelSupportChange {
        caller: String,
        account: u64,
    },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Self::DepositCredit { .. } => "deposit_credit",
            Self::DepositExternal { .. } => "deposit_external",
            Self::DepositOwner { .. } => "deposit_owner",
            Self::WithdrawCredit { .. } => "withdraw_credit",
            Self::WithdrawOwner { .. } => "withdraw_owner",
            Self::AddApp { .. } => "add_app",
            Self::UpdateApp { .. } => "update_app",
            Self::RemoveApp { .. } => "remove_app",
            Self::RemoveSubnet { .. } => "remove_subnet",
            Self::Settle { .. } => "settle",
            Self::Distribute { .. } => "distribute",
            Self::AssignRevenues { .. } => "assign_revenues",
            Self::ReceiveRevenue { .. } => "receive_revenue",
            Self::ListCluster { .. } => "list_cluster",
            Self::DelistCluster { .. } => "delist_cluster",
            Self::RelistCluster { .. } => "relist_cluster",
            Self::SetPrices { .. } => "set_prices",
            Self::Grant { .. } => "grant",
            Self::Revoke { .. } => "revoke",
            Self::ProposeSupportFee { .. } => "propose_support_fee",
            Self::ApproveSupportFee { .. } => "approve_support_fee",
            Self::ApplySupportFee { .. } => "apply_support_fee",
            Self::RequestSupportChange { .. } => "request_support_change",
            Self::ApplySupportChange { .. } => "apply_support_change",
            Self::CancelSupportChange { .. } => "cancel_support_change",
        }
    }
}

impl Scenario {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("invalid scenario")
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read scenario {:?}", path))?;
        Self::from_toml_str(&content)
    }

    /// Parsed `start`, if any
    pub fn start_time(&self) -> Result<Option<DateTime<Utc>>> {
        self.start
            .as_deref()
            .map(|s| {
                DateTime::parse_from_rfc3339(s)
                    .map(|t| t.with_timezone(&Utc))
                    .with_context(|| format!("invalid start time {:?}", s))
            })
            .transpose()
    }

    fn last_step_at(&self) -> Timestamp {
        self.steps.iter().map(|s| s.at).max().unwrap_or(0)
    }
}

/// Render a ledger timestamp relative to the scenario start
pub fn clock_label(start: Option<DateTime<Utc>>, at: Timestamp) -> String {
    match start {
        Some(start) => (start + Duration::seconds(at as i64)).to_rfc3339(),
        None => format!("t+{}s", at),
    }
}

/// Result of one step
#[derive(Clone, Debug, Serialize)]
pub struct StepOutcome {
    pub at: Timestamp,
    pub action: &'static str,
    pub ok: bool,
    pub detail: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct AccountReport {
    pub account: AccountId,
    pub drip_rate: Amount,
    pub balance: BalanceTiers,
    pub funded_until: Option<Timestamp>,
    pub total_settled: Amount,
    pub apps: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct RecipientReport {
    pub name: String,
    pub address: Address,
    pub owed: Amount,
    pub wallet: Amount,
}

#[derive(Clone, Debug, Serialize)]
pub struct SubnetReport {
    pub subnet: SubnetId,
    pub pending: Amount,
}

/// Ledger state after a replay
#[derive(Clone, Debug, Serialize)]
pub struct Report {
    pub scenario: String,
    pub at: Timestamp,
    pub clock: String,
    pub outcomes: Vec<StepOutcome>,
    pub accounts: Vec<AccountReport>,
    pub recipients: Vec<RecipientReport>,
    pub subnets: Vec<SubnetReport>,
    pub vault_held: Amount,
    pub liabilities: Amount,
    pub events: Vec<LedgerEvent>,
}

impl Report {
    pub fn failed_steps(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.ok).count()
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Scenario: {}", self.scenario)?;
        writeln!(f, "Report at: {} ({})", self.clock, self.at)?;
        writeln!(f)?;

        writeln!(f, "Steps:")?;
        for outcome in &self.outcomes {
            let mark = if outcome.ok { "ok " } else { "ERR" };
            writeln!(
                f,
                "  [{}] t={:<6} {:<24} {}",
                mark, outcome.at, outcome.action, outcome.detail
            )?;
        }
        writeln!(f)?;

        writeln!(f, "Accounts:")?;
        for account in &self.accounts {
            let funded = match account.funded_until {
                Some(t) => t.to_string(),
                None => "-".to_string(),
            };
            writeln!(
                f,
                "  {}  rate {}/s  credit {}  external {}  owner {}  funded until {}  settled {}",
                account.account,
                account.drip_rate,
                account.balance.credit,
                account.balance.external,
                account.balance.owner,
                funded,
                account.total_settled
            )?;
        }
        writeln!(f)?;

        writeln!(f, "Recipients:")?;
        for recipient in &self.recipients {
            writeln!(
                f,
                "  {:<12} owed {:<10} wallet {}",
                recipient.name, recipient.owed, recipient.wallet
            )?;
        }
        for subnet in &self.subnets {
            writeln!(f, "  {} pending {}", subnet.subnet, subnet.pending)?;
        }
        writeln!(f)?;

        writeln!(f, "Vault held: {}  liabilities: {}", self.vault_held, self.liabilities)?;
        writeln!(f, "Events: {}", self.events.len())?;
        for event in &self.events {
            writeln!(f, "  {:?}", event)?;
        }
        Ok(())
    }
}

/// Drip rate quote of one scenario account's initial apps
#[derive(Clone, Debug, Serialize)]
pub struct AccountEstimate {
    pub account: AccountId,
    pub apps: usize,
    pub estimate: Estimate,
}

/// In-memory ledger wired to shared collaborators
pub struct Simulation {
    ledger: DripLedger,
    vault: MemoryVault,
    acl: OwnershipTable,
    registry: MemorySubnetRegistry,
    admin: Address,
    /// Labels of every address seen, in first-seen order
    names: IndexMap<Address, String>,
    now: Timestamp,
}

impl Simulation {
    /// Build the market: subnets, clusters, fee terms and wallets
    pub fn new(scenario: &Scenario, config: LedgerConfig) -> Result<Self> {
        let vault = MemoryVault::new();
        let acl = OwnershipTable::new();
        let registry = MemorySubnetRegistry::new();
        let admin = Address::from_label(&scenario.admin);

        let ledger = DripLedger::new(
            config,
            admin,
            Box::new(vault.clone()),
            Box::new(acl.clone()),
            Box::new(registry.clone()),
        )
        .context("failed to create ledger")?;

        let mut names = IndexMap::new();
        names.insert(ledger.dao_address(), "dao".to_string());

        let mut sim = Self {
            ledger,
            vault,
            acl,
            registry,
            admin,
            names,
            now: 0,
        };
        sim.label(&scenario.admin);
        sim.setup(scenario)?;
        Ok(sim)
    }

    fn label(&mut self, name: &str) -> Address {
        let address = Address::from_label(name);
        self.names
            .entry(address)
            .or_insert_with(|| name.to_string());
        address
    }

    pub fn name_of(&self, address: &Address) -> String {
        self.names
            .get(address)
            .cloned()
            .unwrap_or_else(|| address.to_string())
    }

    pub fn ledger(&self) -> &DripLedger {
        &self.ledger
    }

    fn setup(&mut self, scenario: &Scenario) -> Result<()> {
        for subnet in &scenario.subnets {
            self.registry
                .set_prices(SubnetId(subnet.id), widen(&subnet.prices));
        }

        for cluster in &scenario.clusters {
            let operator = self.label(&cluster.operator);
            self.registry
                .list_cluster(SubnetId(cluster.subnet), operator, cluster.weight as u128)
                .with_context(|| {
                    format!(
                        "cannot list cluster {} on subnet {}",
                        cluster.operator, cluster.subnet
                    )
                })?;
        }

        let admin = self.admin;
        for term in &scenario.terms.licenses {
            let licensor = self.label(&term.name);
            self.ledger.register_license(&admin, licensor, term.fee())?;
        }
        for term in &scenario.terms.supports {
            let provider = self.label(&term.name);
            self.ledger.register_support(&admin, provider, term.fee())?;
        }
        for term in &scenario.terms.referrers {
            let referrer = self.label(&term.name);
            let terms = ReferralTerms {
                percent: term.percent,
                duration_secs: term.duration_secs,
            };
            self.ledger.register_referrer(&admin, referrer, terms)?;
        }
        for term in &scenario.terms.platforms {
            let platform = self.label(&term.name);
            let terms = PlatformTerms {
                percent: term.percent,
                discount: term.discount,
            };
            self.ledger.register_platform(&admin, platform, terms)?;
        }

        for fund in &scenario.funds {
            let holder = self.label(&fund.holder);
            self.vault.mint(holder, fund.amount as Amount);
        }

        debug!(
            "Market ready: {} subnets, {} clusters, {} wallets",
            scenario.subnets.len(),
            scenario.clusters.len(),
            scenario.funds.len()
        );
        Ok(())
    }

    fn selection(&mut self, entry: &AccountEntry) -> FeeSelection {
        FeeSelection {
            license: self.label(&entry.license),
            support: self.label(&entry.support),
            referrer: self.label(&entry.referrer),
            platform: self.label(&entry.platform),
        }
    }

    /// Subscribe every scenario account and deploy its initial apps
    pub fn open_accounts(&mut self, scenario: &Scenario) -> Result<()> {
        for entry in &scenario.accounts {
            let account = AccountId(entry.id);
            let owner = self.label(&entry.owner);
            self.acl.set_owner(account, owner);

            let selection = self.selection(entry);
            self.ledger
                .subscribe(&owner, account, selection, entry.subscribed_at)
                .with_context(|| format!("cannot subscribe {}", account))?;

            for app in &entry.apps {
                self.ledger
                    .add_app(
                        &owner,
                        account,
                        SubnetId(app.subnet),
                        AppId(app.app),
                        app.usage(),
                        entry.subscribed_at,
                    )
                    .with_context(|| format!("cannot deploy app {} on {}", app.app, account))?;
            }
            self.now = self.now.max(entry.subscribed_at);
        }
        Ok(())
    }

    /// Quote each account's initial apps without subscribing anything
    pub fn estimates(&mut self, scenario: &Scenario) -> Result<Vec<AccountEstimate>> {
        let dao_percent = self.ledger.config().treasury.dao_percent;
        let limits = self.ledger.config().limits.clone();

        let mut estimates = Vec::with_capacity(scenario.accounts.len());
        for entry in &scenario.accounts {
            let selection = self.selection(entry);
            let fees = self
                .ledger
                .terms()
                .schedule_for(&selection, dao_percent, entry.subscribed_at)
                .with_context(|| format!("cannot resolve fees of account {}", entry.id))?;

            let mut footprint = Footprint::new();
            for app in &entry.apps {
                footprint.add_app(SubnetId(app.subnet), AppId(app.app), app.usage(), &limits)?;
            }

            let estimate = self.ledger.estimate(&footprint, &fees, entry.subscribed_at)?;
            estimates.push(AccountEstimate {
                account: AccountId(entry.id),
                apps: footprint.app_count(),
                estimate,
            });
        }
        Ok(estimates)
    }

    /// Replay steps in order; failures are recorded, not fatal
    pub fn run(&mut self, steps: &[Step]) -> Vec<StepOutcome> {
        let mut outcomes = Vec::with_capacity(steps.len());
        for step in steps {
            if step.at < self.now {
                warn!(
                    "Step {} scheduled at {} runs at clock {}",
                    step.action.name(),
                    step.at,
                    self.now
                );
            }
            let at = step.at.max(self.now);
            self.now = at;

            let outcome = match self.apply(&step.action, at) {
                Ok(detail) => {
                    debug!("{} at {}: {}", step.action.name(), at, detail);
                    StepOutcome {
                        at,
                        action: step.action.name(),
                        ok: true,
                        detail,
                    }
                }
                Err(e) => {
                    warn!("{} at {} failed: {}", step.action.name(), at, e);
                    StepOutcome {
                        at,
                        action: step.action.name(),
                        ok: false,
                        detail: format!("error {}: {}", e.code(), e),
                    }
                }
            };
            outcomes.push(outcome);
        }

        let failed = outcomes.iter().filter(|o| !o.ok).count();
        info!("Replayed {} steps, {} failed", outcomes.len(), failed);
        outcomes
    }

    fn apply(&mut self, action: &Action, at: Timestamp) -> drip_core::Result<String> {
        match action {
            Action::DepositCredit {
                caller,
                account,
                amount,
                expiry,
            } => {
                let caller = self.label(caller);
                let seq = self.ledger.deposit_credit(
                    &caller,
                    AccountId(*account),
                    *amount as Amount,
                    *expiry,
                    at,
                )?;
                Ok(format!("credit #{} of {} until {}", seq, amount, expiry))
            }
            Action::DepositExternal {
                caller,
                account,
                amount,
            } => {
                let caller = self.label(caller);
                self.ledger
                    .deposit_external(&caller, AccountId(*account), *amount as Amount, at)?;
                Ok(format!("external {}", amount))
            }
            Action::DepositOwner {
                caller,
                account,
                amount,
            } => {
                let caller = self.label(caller);
                self.ledger
                    .deposit_owner(&caller, AccountId(*account), *amount as Amount, at)?;
                Ok(format!("owner {}", amount))
            }
            Action::WithdrawCredit { caller, account } => {
                let caller = self.label(caller);
                let amount = self
                    .ledger
                    .withdraw_credit(&caller, AccountId(*account), at)?;
                Ok(format!("returned {}", amount))
            }
            Action::WithdrawOwner {
                caller,
                account,
                amount,
            } => {
                let caller = self.label(caller);
                self.ledger
                    .withdraw_owner(&caller, AccountId(*account), *amount as Amount, at)?;
                Ok(format!("withdrew {}", amount))
            }
            Action::AddApp {
                caller,
                account,
                subnet,
                app,
                resources,
                multipliers,
            } => {
                let caller = self.label(caller);
                let usage = AppUsage::new(widen(resources), widen(multipliers));
                let quote = self.ledger.add_app(
                    &caller,
                    AccountId(*account),
                    SubnetId(*subnet),
                    AppId(*app),
                    usage,
                    at,
                )?;
                Ok(format!("drip rate {}/s", quote.drip_rate))
            }
            Action::UpdateApp {
                caller,
                account,
                subnet,
                app,
                resources,
                multipliers,
            } => {
                let caller = self.label(caller);
                let usage = AppUsage::new(widen(resources), widen(multipliers));
                let quote = self.ledger.update_app(
                    &caller,
                    AccountId(*account),
                    SubnetId(*subnet),
                    AppId(*app),
                    usage,
                    at,
                )?;
                Ok(format!("drip rate {}/s", quote.drip_rate))
            }
            Action::RemoveApp {
                caller,
                account,
                subnet,
                app,
            } => {
                let caller = self.label(caller);
                let quote = self.ledger.remove_app(
                    &caller,
                    AccountId(*account),
                    SubnetId(*subnet),
                    AppId(*app),
                    at,
                )?;
                Ok(format!("drip rate {}/s", quote.drip_rate))
            }
            Action::RemoveSubnet {
                caller,
                account,
                subnet,
            } => {
                let caller = self.label(caller);
                let quote = self.ledger.remove_subnet(
                    &caller,
                    AccountId(*account),
                    SubnetId(*subnet),
                    at,
                )?;
                Ok(format!("drip rate {}/s", quote.drip_rate))
            }
            Action::Settle { account } => {
                let receipt = self.ledger.settle(AccountId(*account), at)?;
                let suffix = if receipt.insolvent() { ", insolvent" } else { "" };
                Ok(format!(
                    "charged {} over {}s{}",
                    receipt.charged(),
                    receipt.elapsed(),
                    suffix
                ))
            }
            Action::Distribute { account } => {
                let split = self.ledger.distribute(AccountId(*account), at)?;
                Ok(format!(
                    "{} split: license {} dao {} support {} referral {} platform {} compute {}",
                    split.settled,
                    split.license,
                    split.dao,
                    split.support,
                    split.referral,
                    split.platform,
                    split.compute_total()
                ))
            }
            Action::AssignRevenues { subnet } => {
                let assignment = self.ledger.assign_revenues(SubnetId(*subnet))?;
                Ok(format!(
                    "assigned {} to {} operators, dust {}",
                    assignment.assigned(),
                    assignment.shares.len(),
                    assignment.dust
                ))
            }
            Action::ReceiveRevenue { recipient } => {
                let recipient = self.label(recipient);
                let amount = self.ledger.receive_revenue(&recipient)?;
                Ok(format!("paid {}", amount))
            }
            Action::ListCluster {
                subnet,
                operator,
                weight,
            } => {
                let operator = self.label(operator);
                self.registry
                    .list_cluster(SubnetId(*subnet), operator, *weight as u128)?;
                Ok(format!("weight {}", weight))
            }
            Action::DelistCluster { subnet, operator } => {
                let operator = self.label(operator);
                self.registry.delist_cluster(SubnetId(*subnet), &operator)?;
                Ok("delisted".to_string())
            }
            Action::RelistCluster { subnet, operator } => {
                let operator = self.label(operator);
                self.registry.relist_cluster(SubnetId(*subnet), &operator)?;
                Ok("relisted".to_string())
            }
            Action::SetPrices { subnet, prices } => {
                self.registry.set_prices(SubnetId(*subnet), widen(prices));
                Ok(format!("prices {:?}", prices))
            }
            Action::Grant {
                account,
                grantee,
                capability,
            } => {
                let grantee = self.label(grantee);
                self.acl.grant(AccountId(*account), grantee, *capability);
                Ok(format!("granted {}", capability))
            }
            Action::Revoke {
                account,
                grantee,
                capability,
            } => {
                let grantee = self.label(grantee);
                self.acl.revoke(AccountId(*account), &grantee, *capability);
                Ok(format!("revoked {}", capability))
            }
            Action::ProposeSupportFee {
                caller,
                account,
                percent,
                flat_per_sec,
            } => {
                let caller = self.label(caller);
                let fee = FeePair::new(*percent, *flat_per_sec as Amount);
                self.ledger
                    .propose_support_fee(&caller, AccountId(*account), fee, at)?;
                Ok(format!("proposed {:?}", fee))
            }
            Action::ApproveSupportFee { caller, account } => {
                let caller = self.label(caller);
                let fee = self
                    .ledger
                    .approve_support_fee(&caller, AccountId(*account), at)?;
                Ok(format!("approved {:?}", fee))
            }
            Action::ApplySupportFee { account } => {
                let previous = self.ledger.apply_support_fee(AccountId(*account), at)?;
                let rate = self.ledger.drip_rate(AccountId(*account))?;
                Ok(format!("replaced {:?}, drip rate {}/s", previous, rate))
            }
            Action::RequestSupportChange {
                caller,
                account,
                provider,
            } => {
                let caller = self.label(caller);
                let provider_address = self.label(provider);
                self.ledger.request_support_change(
                    &caller,
                    AccountId(*account),
                    provider_address,
                    at,
                )?;
                Ok(format!("requested {}", provider))
            }
            Action::ApplySupportChange { account } => {
                let previous = self.ledger.apply_support_change(AccountId(*account), at)?;
                Ok(format!("replaced {}", self.name_of(&previous)))
            }
            Action::CancelSupportChange { caller, account } => {
                let caller = self.label(caller);
                self.ledger
                    .cancel_support_change(&caller, AccountId(*account))?;
                Ok("cancelled".to_string())
            }
        }
    }

    /// Snapshot the ledger and drain its events
    pub fn report(&mut self, scenario: &Scenario, outcomes: Vec<StepOutcome>) -> Result<Report> {
        let at = scenario
            .report_at
            .unwrap_or_else(|| scenario.last_step_at())
            .max(self.now);
        let clock = clock_label(scenario.start_time()?, at);

        let mut accounts = Vec::new();
        for sub in self.ledger.accounts() {
            let account = sub.account();
            accounts.push(AccountReport {
                account,
                drip_rate: sub.ledger().drip_rate(),
                balance: self.ledger.balance(account, at)?,
                funded_until: self.ledger.funded_until(account, at)?,
                total_settled: sub.ledger().total_settled(),
                apps: sub.footprint().app_count(),
            });
        }

        let recipients = self
            .names
            .iter()
            .map(|(address, name)| RecipientReport {
                name: name.clone(),
                address: *address,
                owed: self.ledger.owed(address),
                wallet: self.vault.balance_of(address),
            })
            .filter(|r| r.owed > 0 || r.wallet > 0)
            .collect();

        let subnets = scenario
            .subnets
            .iter()
            .map(|s| SubnetReport {
                subnet: SubnetId(s.id),
                pending: self.ledger.subnet_pending(SubnetId(s.id)),
            })
            .collect();

        Ok(Report {
            scenario: scenario.name.clone(),
            at,
            clock,
            outcomes,
            accounts,
            recipients,
            subnets,
            vault_held: self.vault.held(),
            liabilities: self.ledger.total_liabilities(),
            events: self.ledger.drain_events(),
        })
    }
}
