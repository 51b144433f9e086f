//! Integration tests for the drip ledger
//!
//! These tests drive `DripLedger` through its public entry points with the
//! in-memory collaborators and check balances, recipient shares and events.

use drip_core::{AccountId, Address, AppId, FeePair, LedgerConfig, SubnetId};
use drip_ledger::{
    AppUsage, BalanceTiers, DripLedger, FeeSelection, LedgerEvent, MemorySubnetRegistry,
    MemoryVault, OwnershipTable, PlatformTerms, ReferralTerms,
};

struct Harness {
    ledger: DripLedger,
    vault: MemoryVault,
    acl: OwnershipTable,
    registry: MemorySubnetRegistry,
}

fn addr(label: &str) -> Address {
    Address::from_label(label)
}

fn admin() -> Address {
    addr("admin")
}

fn owner() -> Address {
    addr("owner")
}

fn selection() -> FeeSelection {
    FeeSelection {
        license: addr("licensor"),
        support: addr("support"),
        referrer: addr("referrer"),
        platform: addr("platform"),
    }
}

fn harness(license: FeePair, referral: ReferralTerms) -> Harness {
    let vault = MemoryVault::new();
    let acl = OwnershipTable::new();
    let registry = MemorySubnetRegistry::new();
    vault.mint(owner(), 10_000_000);
    vault.mint(addr("sponsor"), 10_000_000);

    let mut ledger = DripLedger::new(
        LedgerConfig::default(),
        admin(),
        Box::new(vault.clone()),
        Box::new(acl.clone()),
        Box::new(registry.clone()),
    )
    .unwrap();

    let s = selection();
    ledger.register_license(&admin(), s.license, license).unwrap();
    ledger.register_support(&admin(), s.support, FeePair::default()).unwrap();
    ledger.register_referrer(&admin(), s.referrer, referral).unwrap();
    ledger
        .register_platform(&admin(), s.platform, PlatformTerms::default())
        .unwrap();

    Harness {
        ledger,
        vault,
        acl,
        registry,
    }
}

fn open_account(h: &mut Harness, account: AccountId, now: u64) {
    h.acl.set_owner(account, owner());
    h.ledger.subscribe(&owner(), account, selection(), now).unwrap();
}

mod settlement_scenarios {
    use super::*;

    #[test]
    fn test_documented_timeline() {
        let mut h = harness(FeePair::new(0, 10), ReferralTerms::default());
        h.registry.set_prices(SubnetId(1), vec![86]);
        open_account(&mut h, AccountId(1), 0);

        let account = AccountId(1);
        h.ledger.deposit_credit(&addr("sponsor"), account, 500, 10, 0).unwrap();
        h.ledger.deposit_external(&addr("sponsor"), account, 300, 0).unwrap();
        h.ledger.deposit_owner(&owner(), account, 1_000, 0).unwrap();
        h.ledger
            .add_app(&owner(), account, SubnetId(1), AppId(1), AppUsage::new(vec![1], vec![1]), 0)
            .unwrap();
        assert_eq!(h.ledger.drip_rate(account).unwrap(), 100);
        assert_eq!(h.ledger.funded_until(account, 0).unwrap(), Some(18));

        h.ledger.settle(account, 4).unwrap();
        assert_eq!(
            h.ledger.balance(account, 4).unwrap(),
            BalanceTiers { credit: 100, external: 300, owner: 1_000 }
        );

        let split = h.ledger.distribute(account, 12).unwrap();
        assert_eq!(
            h.ledger.balance(account, 12).unwrap(),
            BalanceTiers { credit: 0, external: 0, owner: 600 }
        );
        assert_eq!(split.settled, 1_200);
        assert_eq!((split.license, split.dao), (120, 60));
        assert_eq!(split.total(), 1_200);

        let events = h.ledger.drain_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, LedgerEvent::Distributed { split, .. } if split.settled == 1_200)));
        assert!(h.ledger.events().is_empty());
    }

    #[test]
    fn test_insolvent_account_accrues_no_debt() {
        let mut h = harness(FeePair::default(), ReferralTerms::default());
        h.registry.set_prices(SubnetId(1), vec![100]);
        open_account(&mut h, AccountId(1), 0);

        let account = AccountId(1);
        h.ledger.deposit_owner(&owner(), account, 50, 0).unwrap();
        h.ledger
            .add_app(&owner(), account, SubnetId(1), AppId(1), AppUsage::new(vec![1], vec![1]), 0)
            .unwrap();

        let receipt = h.ledger.settle(account, 10).unwrap();
        assert!(receipt.insolvent());
        assert_eq!(receipt.charged(), 50);
        assert!(h
            .ledger
            .events()
            .iter()
            .any(|e| matches!(e, LedgerEvent::Settled { insolvent: true, .. })));

        h.ledger.deposit_owner(&owner(), account, 500, 10).unwrap();
        assert_eq!(h.ledger.balance(account, 10).unwrap().owner, 500);
        assert_eq!(h.vault.held(), h.ledger.total_liabilities());
    }

    #[test]
    fn test_accounts_are_isolated() {
        let mut h = harness(FeePair::default(), ReferralTerms::default());
        h.registry.set_prices(SubnetId(1), vec![10]);
        open_account(&mut h, AccountId(1), 0);
        open_account(&mut h, AccountId(2), 0);

        for account in [AccountId(1), AccountId(2)] {
            h.ledger.deposit_owner(&owner(), account, 10_000, 0).unwrap();
            h.ledger
                .add_app(&owner(), account, SubnetId(1), AppId(1), AppUsage::new(vec![1], vec![1]), 0)
                .unwrap();
        }

        h.ledger.settle(AccountId(1), 50).unwrap();
        let second = h.ledger.subscription(AccountId(2)).unwrap();
        assert_eq!(second.ledger().last_settled(), 0);
        assert_eq!(second.ledger().tiers().owner, 10_000);
    }
}

mod revenue_scenarios {
    use super::*;

    #[test]
    fn test_referral_prorated_across_expiry() {
        let referral = ReferralTerms {
            percent: 10_000,
            duration_secs: 10,
        };
        let mut h = harness(FeePair::default(), referral);
        h.registry.set_prices(SubnetId(1), vec![100]);
        open_account(&mut h, AccountId(1), 0);

        let account = AccountId(1);
        h.ledger.deposit_owner(&owner(), account, 1_000_000, 0).unwrap();
        let quote = h
            .ledger
            .add_app(&owner(), account, SubnetId(1), AppId(1), AppUsage::new(vec![1], vec![1]), 0)
            .unwrap();
        // 100 * (1 + 5% DAO + 10% referral)
        assert_eq!(quote.drip_rate, 115);

        let split = h.ledger.distribute(account, 20).unwrap();
        assert_eq!(split.settled, 2_300);
        // 10% of 2300, only the first 10 of 20 seconds
        assert_eq!(split.referral, 115);
        assert_eq!(split.dao, 115);
        assert_eq!(h.ledger.owed(&addr("referrer")), 115);

        // Re-fixing the rate after expiry drops the referral component
        let quote = h
            .ledger
            .update_app(&owner(), account, SubnetId(1), AppId(1), AppUsage::new(vec![1], vec![1]), 20)
            .unwrap();
        assert_eq!(quote.drip_rate, 105);
    }

    #[test]
    fn test_delisted_operator_keeps_assigned_share() {
        let mut h = harness(FeePair::default(), ReferralTerms::default());
        h.registry.set_prices(SubnetId(1), vec![100]);
        h.registry.list_cluster(SubnetId(1), addr("op-a"), 1).unwrap();
        h.registry.list_cluster(SubnetId(1), addr("op-b"), 1).unwrap();
        open_account(&mut h, AccountId(1), 0);

        let account = AccountId(1);
        h.ledger.deposit_owner(&owner(), account, 1_000_000, 0).unwrap();
        h.ledger
            .add_app(&owner(), account, SubnetId(1), AppId(1), AppUsage::new(vec![1], vec![1]), 0)
            .unwrap();

        // 105 per second; 840 settled, 42 to the DAO
        h.ledger.distribute(account, 8).unwrap();
        assert_eq!(h.ledger.subnet_pending(SubnetId(1)), 798);
        h.ledger.assign_revenues(SubnetId(1)).unwrap();
        assert_eq!(h.ledger.owed(&addr("op-a")), 399);
        assert_eq!(h.ledger.owed(&addr("op-b")), 399);

        h.registry.delist_cluster(SubnetId(1), &addr("op-b")).unwrap();
        h.ledger.distribute(account, 16).unwrap();
        h.ledger.assign_revenues(SubnetId(1)).unwrap();
        assert_eq!(h.ledger.owed(&addr("op-a")), 399 + 798);
        assert_eq!(h.ledger.owed(&addr("op-b")), 399);

        assert_eq!(h.ledger.receive_revenue(&addr("op-b")).unwrap(), 399);
        assert_eq!(h.vault.balance_of(&addr("op-b")), 399);
        assert_eq!(h.vault.held(), h.ledger.total_liabilities());
    }

    #[test]
    fn test_flat_fee_only_residual_goes_to_dao() {
        let mut h = harness(FeePair::new(0, 3), ReferralTerms::default());
        h.registry.set_prices(SubnetId(1), vec![0]);
        open_account(&mut h, AccountId(1), 0);

        let account = AccountId(1);
        h.ledger.deposit_owner(&owner(), account, 1_000, 0).unwrap();
        let quote = h
            .ledger
            .add_app(&owner(), account, SubnetId(1), AppId(1), AppUsage::new(vec![1], vec![1]), 0)
            .unwrap();
        assert_eq!(quote.drip_rate, 3);

        let split = h.ledger.distribute(account, 10).unwrap();
        assert_eq!(split.license, 30);
        assert_eq!(split.compute_total(), 0);
        assert_eq!(h.ledger.subnet_pending(SubnetId(1)), 0);
    }
}
