//! Property-based tests for ledger invariants.
//!
//! Properties tested:
//! 1. Conservation: balance before - settled == balance after
//! 2. Tier ordering: credit, then external, then owner
//! 3. FIFO credit depletion by insertion order
//! 4. Distribution components sum exactly to the settled amount
//! 5. Settlement idempotency
//! 6. Rate changes never re-price the interval before the change
//! 7. Vault holdings always equal ledger liabilities

use drip_core::{AccountId, Address, Amount, AppId, BalanceTier, FeePair, FeeSchedule, LedgerConfig, SubnetId};
use drip_ledger::{
    AccountLedger, AppUsage, CreditQueue, DripLedger, FeeSelection, MemorySubnetRegistry,
    MemoryVault, OwnershipTable, PendingRevenue, PlatformTerms, RateQuote, ReferralTerms,
    RevenueDistributor, WaterfallDistributor,
};
use proptest::prelude::*;

fn quote(rate: Amount) -> RateQuote {
    RateQuote {
        subnet_costs: [(SubnetId(1), rate)].into_iter().collect(),
        compute_cost_per_sec: rate,
        drip_rate: rate,
        fixed_at: 0,
    }
}

fn funded(credit: Amount, external: Amount, owner: Amount, rate: Amount) -> AccountLedger {
    let mut ledger = AccountLedger::new(0);
    if credit > 0 {
        ledger.deposit_credit(Address::from_label("sponsor"), credit, 0);
    }
    ledger.add_balance(BalanceTier::External, external).unwrap();
    ledger.add_balance(BalanceTier::Owner, owner).unwrap();
    ledger.change_drip_rate(&quote(rate), 0).unwrap();
    ledger
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn settlement_conserves_balance(
        credit in 0..10_000u128,
        external in 0..10_000u128,
        owner in 0..10_000u128,
        rate in 0..1_000u128,
        elapsed in 0..100u64,
    ) {
        let mut ledger = funded(credit, external, owner, rate);
        let before = ledger.tiers().total();

        let receipt = ledger.settle(elapsed);
        let expected = (rate * elapsed as u128).min(before);

        prop_assert_eq!(receipt.charged(), expected);
        prop_assert_eq!(before - expected, ledger.tiers().total());
        prop_assert_eq!(ledger.pending().amount, expected);
    }

    #[test]
    fn depletion_follows_tier_order(
        credit in 0..10_000u128,
        external in 0..10_000u128,
        owner in 0..10_000u128,
        rate in 1..1_000u128,
        elapsed in 1..100u64,
    ) {
        let mut ledger = funded(credit, external, owner, rate);
        let cost = rate * elapsed as u128;
        ledger.settle(elapsed);
        let tiers = ledger.tiers();

        if cost <= credit {
            prop_assert_eq!(tiers.credit, credit - cost);
            prop_assert_eq!(tiers.external, external);
            prop_assert_eq!(tiers.owner, owner);
        } else if cost <= credit + external {
            prop_assert_eq!(tiers.credit, 0);
            prop_assert_eq!(tiers.external, credit + external - cost);
            prop_assert_eq!(tiers.owner, owner);
        } else {
            prop_assert_eq!(tiers.credit, 0);
            prop_assert_eq!(tiers.external, 0);
            prop_assert_eq!(tiers.owner, (credit + external + owner).saturating_sub(cost));
        }
    }

    #[test]
    fn credit_depletes_in_insertion_order(
        amounts in prop::collection::vec(1..500u128, 1..10),
        expiries in prop::collection::vec(0..1_000u64, 10),
        cost in 0..5_000u128,
    ) {
        let mut queue = CreditQueue::new();
        for (i, amount) in amounts.iter().enumerate() {
            queue.deposit(Address::from_label(&format!("d{}", i)), *amount, expiries[i]);
        }
        queue.settle(cost);

        let mut left = cost;
        let mut expected = Vec::new();
        for amount in &amounts {
            let take = left.min(*amount);
            left -= take;
            expected.push(amount - take);
        }

        let mut remaining: Vec<Amount> = queue.deposits().iter().map(|d| d.remaining).collect();
        // Fully depleted deposits have left the live part of the queue
        let dropped = amounts.len() - remaining.len();
        let mut padded = vec![0; dropped];
        padded.append(&mut remaining);

        prop_assert_eq!(padded, expected);
    }

    #[test]
    fn distribution_sums_exactly(
        amount in 0..1_000_000u128,
        start in 0..1_000u64,
        duration in 0..1_000u64,
        license in (0..30_000u32, 0..100u128),
        support in (0..30_000u32, 0..100u128),
        referral in 0..30_000u32,
        expiry in 0..3_000u64,
        platform in (0..30_000u32, 0..30_000u32),
        dao in 0..30_000u32,
        weights in prop::collection::vec(0..1_000u128, 0..5),
    ) {
        let fees = FeeSchedule {
            license: FeePair::new(license.0, license.1),
            support: FeePair::new(support.0, support.1),
            referral_percent: referral,
            referral_expiry: Some(expiry),
            platform_percent: platform.0,
            discount_percent: platform.1,
            dao_percent: dao,
        };
        let pending = PendingRevenue {
            amount,
            window_start: start,
            window_end: start + duration,
            by_subnet: weights
                .iter()
                .enumerate()
                .map(|(i, w)| (SubnetId(i as u64), *w))
                .collect(),
        };

        let split = WaterfallDistributor.split(&pending, &fees);
        prop_assert_eq!(split.total(), amount);
        if start >= expiry {
            prop_assert_eq!(split.referral, 0);
        }
    }

    #[test]
    fn settlement_is_idempotent(
        owner in 0..100_000u128,
        rate in 0..1_000u128,
        now in 0..100u64,
    ) {
        let mut ledger = funded(0, 0, owner, rate);
        ledger.settle(now);
        let once = ledger.clone();
        let receipt = ledger.settle(now);

        prop_assert_eq!(receipt.charged(), 0);
        prop_assert_eq!(ledger, once);
    }

    #[test]
    fn rate_change_charges_each_interval_at_its_rate(
        r1 in 0..1_000u128,
        r2 in 0..1_000u128,
        change_at in 0..100u64,
        delta in 0..100u64,
    ) {
        let mut ledger = funded(0, 0, 1_000_000_000, r1);
        ledger.settle(change_at);
        ledger.change_drip_rate(&quote(r2), change_at).unwrap();
        ledger.settle(change_at + delta);

        let expected = r1 * change_at as u128 + r2 * delta as u128;
        prop_assert_eq!(ledger.total_settled(), expected);
    }
}

#[derive(Clone, Debug)]
enum Op {
    Credit(Amount, u64),
    External(Amount),
    Owner(Amount),
    AddApp(u64, u128),
    RemoveApp(u64),
    Distribute,
    Assign,
    Receive(usize),
    WithdrawCredit,
    WithdrawOwner(Amount),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1..1_000u128, 0..50u64).prop_map(|(a, e)| Op::Credit(a, e)),
        (1..1_000u128).prop_map(Op::External),
        (1..1_000u128).prop_map(Op::Owner),
        (0..4u64, 1..5u128).prop_map(|(app, units)| Op::AddApp(app, units)),
        (0..4u64).prop_map(Op::RemoveApp),
        Just(Op::Distribute),
        Just(Op::Assign),
        (0..6usize).prop_map(Op::Receive),
        Just(Op::WithdrawCredit),
        (1..500u128).prop_map(Op::WithdrawOwner),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn vault_holds_exactly_the_liabilities(ops in prop::collection::vec((op_strategy(), 0..5u64), 1..40)) {
        let vault = MemoryVault::new();
        let acl = OwnershipTable::new();
        let registry = MemorySubnetRegistry::new();
        let admin = Address::from_label("admin");
        let owner = Address::from_label("owner");
        let sponsor = Address::from_label("sponsor");
        let account = AccountId(1);

        registry.set_prices(SubnetId(1), vec![7]);
        registry.list_cluster(SubnetId(1), Address::from_label("op-a"), 3).unwrap();
        registry.list_cluster(SubnetId(1), Address::from_label("op-b"), 4).unwrap();
        acl.set_owner(account, owner);
        vault.mint(owner, 1_000_000);
        vault.mint(sponsor, 1_000_000);

        let selection = FeeSelection {
            license: Address::from_label("licensor"),
            support: Address::from_label("support"),
            referrer: Address::from_label("referrer"),
            platform: Address::from_label("platform"),
        };
        let mut ledger = DripLedger::new(
            LedgerConfig::default(),
            admin,
            Box::new(vault.clone()),
            Box::new(acl),
            Box::new(registry),
        ).unwrap();
        ledger.register_license(&admin, selection.license, FeePair::new(1_000, 1)).unwrap();
        ledger.register_support(&admin, selection.support, FeePair::new(2_000, 0)).unwrap();
        ledger.register_referrer(&admin, selection.referrer, ReferralTerms { percent: 3_000, duration_secs: 20 }).unwrap();
        ledger.register_platform(&admin, selection.platform, PlatformTerms { percent: 4_000, discount: 1_000 }).unwrap();
        ledger.subscribe(&owner, account, selection, 0).unwrap();

        let payees = [
            Address::from_label("licensor"),
            Address::from_label("support"),
            Address::from_label("referrer"),
            Address::from_label("platform"),
            Address::from_label("op-a"),
            ledger.dao_address(),
        ];

        let mut now = 0u64;
        for (op, step) in ops {
            now += step;
            // Individual operations may fail; failures must leave no trace
            let _ = match op {
                Op::Credit(amount, expiry) => ledger.deposit_credit(&sponsor, account, amount, now + expiry, now).map(|_| ()),
                Op::External(amount) => ledger.deposit_external(&sponsor, account, amount, now),
                Op::Owner(amount) => ledger.deposit_owner(&owner, account, amount, now),
                Op::AddApp(app, units) => ledger
                    .add_app(&owner, account, SubnetId(1), AppId(app), AppUsage::new(vec![units], vec![1]), now)
                    .map(|_| ()),
                Op::RemoveApp(app) => ledger.remove_app(&owner, account, SubnetId(1), AppId(app), now).map(|_| ()),
                Op::Distribute => ledger.distribute(account, now).map(|_| ()),
                Op::Assign => ledger.assign_revenues(SubnetId(1)).map(|_| ()),
                Op::Receive(i) => ledger.receive_revenue(&payees[i]).map(|_| ()),
                Op::WithdrawCredit => ledger.withdraw_credit(&sponsor, account, now).map(|_| ()),
                Op::WithdrawOwner(amount) => ledger.withdraw_owner(&owner, account, amount, now),
            };
            prop_assert_eq!(vault.held(), ledger.total_liabilities());
        }

        let total_out: Amount = payees.iter().map(|p| vault.balance_of(p)).sum::<Amount>()
            + vault.balance_of(&owner)
            + vault.balance_of(&sponsor)
            + vault.balance_of(&Address::from_label("op-b"));
        prop_assert_eq!(total_out + vault.held(), 2_000_000);
    }
}
