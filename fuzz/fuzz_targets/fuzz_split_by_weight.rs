#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use liquidstake_execution::planner::{split_by_current_weight, split_by_weight};
use liquidstake_types::dec::Dec;
use liquidstake_types::validator::{LiquidValidatorState, ValidatorId, ValidatorStatus};

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    amount: u64,
    validators: Vec<(u16, u64)>,
}

fuzz_target!(|data: FuzzInput| {
    let vals: Vec<LiquidValidatorState> = data
        .validators
        .iter()
        .take(32)
        .enumerate()
        .map(|(i, (weight, liquid))| LiquidValidatorState {
            operator: ValidatorId::new((i as u32).to_be_bytes().to_vec()),
            weight: *weight as u128,
            status: ValidatorStatus::Active,
            del_shares: Dec::ZERO,
            liquid_tokens: *liquid as u128,
        })
        .collect();
    let amount = data.amount as u128;

    let (outputs, crumb) = split_by_weight(&vals, amount).unwrap();
    assert_eq!(outputs.iter().sum::<u128>() + crumb, amount);
    if vals.iter().any(|v| v.weight > 0) {
        assert!(crumb < vals.len() as u128);
    }
    for (v, out) in vals.iter().zip(&outputs) {
        if v.weight == 0 {
            assert_eq!(*out, 0);
        }
    }

    let (outputs, crumb) = split_by_current_weight(&vals, amount).unwrap();
    assert_eq!(outputs.iter().sum::<u128>() + crumb, amount);
});
