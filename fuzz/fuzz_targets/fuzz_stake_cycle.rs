#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use liquidstake_execution::{get_snapshot, run_rebalance_cycle, stake_in, stake_out, update_validator_weights, ExecutionContext};
use liquidstake_ledger::{InMemoryLedger, DEFAULT_BOND_DENOM};
use liquidstake_types::dec::Dec;
use liquidstake_types::ledger::BankLedger;
use liquidstake_types::state::PoolState;
use liquidstake_types::validator::{ValidatorId, WeightEntry};

const VALIDATORS: [&str; 4] = ["val0", "val1", "val2", "val3"];

#[derive(Arbitrary, Debug)]
enum Op {
    StakeIn { who: u8, amount: u32 },
    StakeOut { who: u8, amount: u32 },
    Weights { weights: [u8; 4] },
    Rewards { validator: u8, amount: u32 },
    Slash { validator: u8, permille: u8 },
    Jail { validator: u8 },
    Unjail { validator: u8 },
    Cycle,
    Advance { seconds: u32 },
}

fuzz_target!(|ops: Vec<Op>| {
    let mut ledger = InMemoryLedger::default();
    for v in VALIDATORS {
        ledger.add_validator(v, 1_000_000).unwrap();
    }
    let stakers = [[1u8; 32], [2u8; 32], [3u8; 32]];
    for s in &stakers {
        ledger.mint(s, DEFAULT_BOND_DENOM, 10_000_000).unwrap();
    }
    let mut state = PoolState::default();
    let val = |i: u8| ValidatorId::from(VALIDATORS[i as usize % VALIDATORS.len()]);

    for (height, op) in ops.into_iter().take(64).enumerate() {
        let mut ctx = ExecutionContext {
            state: &mut state,
            ledger: &mut ledger,
            height: height as u64,
            timestamp: 0,
        };
        let root = ctx.state.root_hash();
        let result = match op {
            Op::StakeIn { who, amount } => {
                stake_in(&mut ctx, &stakers[who as usize % 3], amount as u128).map(|_| ())
            }
            Op::StakeOut { who, amount } => {
                stake_out(&mut ctx, &stakers[who as usize % 3], amount as u128).map(|_| ())
            }
            Op::Weights { weights } => {
                let entries = VALIDATORS
                    .iter()
                    .zip(weights)
                    .filter(|(_, w)| *w > 0)
                    .map(|(v, w)| WeightEntry::new(*v, w as u128))
                    .collect();
                update_validator_weights(&mut ctx, entries)
            }
            Op::Rewards { validator, amount } => {
                let _ = ctx.ledger.accrue_rewards(&val(validator), amount as u128);
                Ok(())
            }
            Op::Slash { validator, permille } => {
                let fraction = Dec::from_raw(permille as u128 * 1_000_000_000_000_000 / 4);
                let _ = ctx.ledger.slash(&val(validator), fraction);
                Ok(())
            }
            Op::Jail { validator } => {
                let _ = ctx.ledger.jail(&val(validator));
                Ok(())
            }
            Op::Unjail { validator } => {
                let _ = ctx.ledger.unjail(&val(validator));
                Ok(())
            }
            Op::Cycle => run_rebalance_cycle(&mut ctx).map(|_| ()),
            Op::Advance { seconds } => {
                let _ = ctx.ledger.advance_time(seconds as u64);
                Ok(())
            }
        };
        if result.is_err() {
            assert_eq!(ctx.state.root_hash(), root);
        }

        // Receipt tokens only exist in stakers' hands.
        let denom = ctx.state.params.liquid_bond_denom.clone();
        let held: u128 = stakers.iter().map(|s| ctx.ledger.balance(s, &denom)).sum();
        assert_eq!(ctx.ledger.supply(&denom), held);

        let nas = get_snapshot(&ctx).unwrap();
        if nas.receipt_total_supply == 0 {
            assert_eq!(nas.mint_rate, Dec::ONE);
        }
    }
});
