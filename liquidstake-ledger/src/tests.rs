use super::*;
use liquidstake_types::ledger::{BankLedger, StakingLedger};
use pretty_assertions::assert_eq;

const ALICE: Address = [1u8; 32];

fn d(s: &str) -> Dec {
    s.parse().unwrap()
}

fn ledger_with(validators: &[&str]) -> InMemoryLedger {
    let mut ledger = InMemoryLedger::default();
    for v in validators {
        ledger.add_validator(*v, 1_000_000).unwrap();
    }
    ledger.mint_to(&ALICE, DEFAULT_BOND_DENOM, 10_000_000).unwrap();
    ledger
}

#[test]
fn delegate_issues_shares_at_unit_price() {
    let mut ledger = ledger_with(&["val0"]);
    let id = ValidatorId::from("val0");
    let shares = ledger.delegate(&ALICE, &id, 5_000).unwrap();

    assert_eq!(shares, d("5000"));
    assert_eq!(ledger.balance(&ALICE, DEFAULT_BOND_DENOM), 9_995_000);
    let v = ledger.validator(&id).unwrap();
    assert_eq!(v.tokens, 1_005_000);
    assert_eq!(ledger.delegation(&ALICE, &id).unwrap().shares, d("5000"));
}

#[test]
fn slashing_lowers_share_value_not_shares() {
    let mut ledger = ledger_with(&["val0"]);
    let id = ValidatorId::from("val0");
    ledger.delegate(&ALICE, &id, 1_000_000).unwrap();

    let burned = ledger.slash(&id, d("0.05")).unwrap();
    assert_eq!(burned, 100_000);

    let del = ledger.delegation(&ALICE, &id).unwrap();
    assert_eq!(del.shares, d("1000000"));
    assert_eq!(ledger.shares_value(&id, del.shares).unwrap(), d("950000"));
    assert_eq!(ledger.supply(DEFAULT_BOND_DENOM), 10_900_000);
}

#[test]
fn undelegate_matures_after_unbonding_time() {
    let mut ledger = ledger_with(&["val0"]);
    let id = ValidatorId::from("val0");
    ledger.delegate(&ALICE, &id, 4_000).unwrap();

    let bob = [2u8; 32];
    let (completion, amount) = ledger.undelegate(&ALICE, &id, d("4000"), &bob).unwrap();
    assert_eq!(amount, 4_000);
    assert_eq!(completion, DEFAULT_UNBONDING_TIME);
    assert!(ledger.delegation(&ALICE, &id).is_none());
    assert_eq!(ledger.unbonding_balance(&bob), 4_000);

    ledger.advance_time(DEFAULT_UNBONDING_TIME - 1).unwrap();
    assert_eq!(ledger.balance(&bob, DEFAULT_BOND_DENOM), 0);
    ledger.advance_time(1).unwrap();
    assert_eq!(ledger.balance(&bob, DEFAULT_BOND_DENOM), 4_000);
    assert_eq!(ledger.unbonding_balance(&bob), 0);
}

#[test]
fn validate_unbond_amount_rejects_more_than_held() {
    let mut ledger = ledger_with(&["val0"]);
    let id = ValidatorId::from("val0");
    ledger.delegate(&ALICE, &id, 1_000).unwrap();

    assert_eq!(ledger.validate_unbond_amount(&ALICE, &id, 400).unwrap(), d("400"));
    assert_eq!(
        ledger.validate_unbond_amount(&ALICE, &id, 1_001),
        Err(LedgerError::InsufficientShares(id.clone()))
    );
}

#[test]
fn redelegation_blocks_transitive_hops_and_caps_entries() {
    let mut ledger = ledger_with(&["val0", "val1", "val2"]);
    let (v0, v1, v2) = (ValidatorId::from("val0"), ValidatorId::from("val1"), ValidatorId::from("val2"));
    ledger.delegate(&ALICE, &v0, 100_000).unwrap();

    ledger.begin_redelegation(&ALICE, &v0, &v1, d("10")).unwrap();
    assert_eq!(
        ledger.begin_redelegation(&ALICE, &v1, &v2, d("5")),
        Err(LedgerError::TransitiveRedelegation(v1.clone()))
    );
    assert_eq!(
        ledger.begin_redelegation(&ALICE, &v0, &v0, d("5")),
        Err(LedgerError::SelfRedelegation)
    );

    for _ in 1..7 {
        ledger.begin_redelegation(&ALICE, &v0, &v1, d("10")).unwrap();
    }
    assert!(matches!(
        ledger.begin_redelegation(&ALICE, &v0, &v1, d("10")),
        Err(LedgerError::MaxRedelegationEntries { .. })
    ));
    assert_eq!(ledger.redelegations_in_progress(&ALICE).len(), 7);

    ledger.advance_time(DEFAULT_UNBONDING_TIME).unwrap();
    assert!(ledger.redelegations_in_progress(&ALICE).is_empty());
    ledger.begin_redelegation(&ALICE, &v1, &v2, d("5")).unwrap();
}

#[test]
fn redelegation_from_unbonded_validator_completes_immediately() {
    let mut ledger = ledger_with(&["val0", "val1"]);
    let (v0, v1) = (ValidatorId::from("val0"), ValidatorId::from("val1"));
    ledger.delegate(&ALICE, &v0, 1_000).unwrap();
    ledger.set_status(&v0, BondStatus::Unbonded).unwrap();

    let completion = ledger.begin_redelegation(&ALICE, &v0, &v1, d("1000")).unwrap();
    assert_eq!(completion, ledger.now());
    assert!(ledger.redelegations_in_progress(&ALICE).is_empty());
    assert_eq!(ledger.delegation(&ALICE, &v1).unwrap().shares, d("1000"));
}

#[test]
fn rewards_are_withdrawn_when_delegation_changes() {
    let mut ledger = ledger_with(&["val0"]);
    let id = ValidatorId::from("val0");
    ledger.delegate(&ALICE, &id, 1_000_000).unwrap();

    // half of the validator's shares belong to ALICE
    ledger.accrue_rewards(&id, 301).unwrap();
    assert_eq!(ledger.pending_rewards(&ALICE, &id), d("150.5"));

    let before = ledger.balance(&ALICE, DEFAULT_BOND_DENOM);
    ledger.delegate(&ALICE, &id, 1_000).unwrap();
    assert_eq!(ledger.balance(&ALICE, DEFAULT_BOND_DENOM), before - 1_000 + 150);
    assert_eq!(ledger.pending_rewards(&ALICE, &id), Dec::ZERO);
}

#[test]
fn tombstone_jails_and_marks_validator() {
    let mut ledger = ledger_with(&["val0"]);
    let id = ValidatorId::from("val0");
    ledger.tombstone(&id, d("0.05")).unwrap();

    let v = ledger.validator(&id).unwrap();
    assert!(v.jailed && v.tombstoned);
    assert_eq!(v.status, BondStatus::Unbonding);
    assert!(!v.accepts_stake());

    ledger.unjail(&id).unwrap();
    assert!(ledger.validator(&id).unwrap().jailed);
}

#[test]
fn bank_rejects_overdraft() {
    let mut ledger = ledger_with(&[]);
    let bob = [2u8; 32];
    assert_eq!(
        ledger.send(&bob, &ALICE, DEFAULT_BOND_DENOM, 1),
        Err(LedgerError::InsufficientFunds { have: 0, need: 1 })
    );
    ledger.send(&ALICE, &bob, DEFAULT_BOND_DENOM, 10).unwrap();
    ledger.burn(&bob, DEFAULT_BOND_DENOM, 10).unwrap();
    assert_eq!(ledger.supply(DEFAULT_BOND_DENOM), 9_999_990);
}
