#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use liquidstake_execution::planner::plan_top_ups;
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

    let top_ups = plan_top_ups(&vals, amount).unwrap();
    let total: u128 = top_ups.iter().map(|t| t.amount).sum();
    if vals.iter().any(|v| v.weight > 0) {
        assert_eq!(total, amount);
    } else {
        assert!(top_ups.is_empty());
    }

    // Positive, weighted and in input order.
    let mut cursor = 0;
    for t in &top_ups {
        assert!(t.amount > 0);
        let idx = vals[cursor..]
            .iter()
            .position(|v| v.operator == t.validator)
            .expect("top-up out of order")
            + cursor;
        assert!(vals[idx].weight > 0);
        cursor = idx + 1;
    }
});
