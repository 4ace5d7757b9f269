//! Pure stake-splitting functions.
//!
//! Every split walks the validators in the order given by the caller and
//! truncates each share on its own, so the output depends on that order. The
//! truncation remainder ("crumb") is returned to the caller instead of being
//! spread around.

use liquidstake_types::dec::{Dec, MathError};
use liquidstake_types::validator::{LiquidValidatorState, ValidatorId};
use liquidstake_types::Amount;
use serde::{Deserialize, Serialize};

type Result<T> = std::result::Result<T, MathError>;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TopUp {
    pub validator: ValidatorId,
    pub amount: Amount,
}

/// Splits `amount` proportionally to effective weight, each share being
/// `floor(amount * weight / total_weight)`.
///
/// With no positive weight nothing is assigned and the whole amount comes
/// back as crumb.
pub fn split_by_weight(vals: &[LiquidValidatorState], amount: Amount) -> Result<(Vec<Amount>, Amount)> {
    let total_weight = vals.iter().try_fold(0u128, |acc, v| {
        acc.checked_add(v.weight).ok_or(MathError::AdditionOverflow)
    })?;
    if total_weight == 0 {
        return Ok((vec![0; vals.len()], amount));
    }
    let mut outputs = Vec::with_capacity(vals.len());
    let mut assigned: Amount = 0;
    for v in vals {
        let out = amount
            .checked_mul(v.weight)
            .ok_or(MathError::MultiplicationOverflow)?
            / total_weight;
        assigned += out;
        outputs.push(out);
    }
    Ok((outputs, amount - assigned))
}

/// Splits `amount` proportionally to current liquid tokens, truncating every
/// share to an integer.
pub fn split_by_current_weight(vals: &[LiquidValidatorState], amount: Amount) -> Result<(Vec<Amount>, Amount)> {
    let (outputs, _) = split_by_current_weight_dec(vals, Dec::from_int(amount)?)?;
    let outputs: Vec<Amount> = outputs.into_iter().map(Dec::truncate_int).collect();
    let assigned: Amount = outputs.iter().sum();
    Ok((outputs, amount - assigned))
}

/// Fixed-point variant of [`split_by_current_weight`]; `Σ outputs + crumb`
/// equals `amount` to the last decimal.
pub fn split_by_current_weight_dec(vals: &[LiquidValidatorState], amount: Dec) -> Result<(Vec<Dec>, Dec)> {
    let total_liquid: Amount = vals.iter().map(|v| v.liquid_tokens).sum();
    if total_liquid == 0 {
        return Ok((vec![Dec::ZERO; vals.len()], amount));
    }
    let share_per_token = amount.quo_truncate(Dec::from_int(total_liquid)?)?;
    let mut outputs = Vec::with_capacity(vals.len());
    let mut assigned = Dec::ZERO;
    for v in vals {
        let out = share_per_token.mul_truncate(Dec::from_int(v.liquid_tokens)?)?;
        assigned = assigned.checked_add(out)?;
        outputs.push(out);
    }
    Ok((outputs, amount.checked_sub(assigned)?))
}

/// Distributes `amount` so that under-allocated validators are filled toward
/// their weighted level first.
///
/// Validators already above the level the new total implies are dropped and
/// the level is recomputed over the rest, at most once per validator. The
/// survivors receive `target - current`; the split crumb goes to the first
/// survivor. The whole `amount` is always handed out when any weight is
/// positive. Zero top-ups are omitted and the result keeps input order.
pub fn plan_top_ups(vals: &[LiquidValidatorState], amount: Amount) -> Result<Vec<TopUp>> {
    let mut included: Vec<&LiquidValidatorState> = vals.iter().filter(|v| v.weight > 0).collect();
    if amount == 0 || included.is_empty() {
        return Ok(Vec::new());
    }

    for _ in 0..=vals.len() {
        let current: Amount = included.iter().map(|v| v.liquid_tokens).sum();
        let level = current.checked_add(amount).ok_or(MathError::AdditionOverflow)?;
        let (targets, crumb) = split_included(&included, level)?;

        let keep: Vec<bool> = included
            .iter()
            .zip(&targets)
            .map(|(v, target)| v.liquid_tokens <= *target)
            .collect();
        if keep.iter().all(|k| *k) {
            let mut top_ups: Vec<TopUp> = included
                .iter()
                .zip(&targets)
                .map(|(v, target)| TopUp {
                    validator: v.operator.clone(),
                    amount: target - v.liquid_tokens,
                })
                .collect();
            top_ups[0].amount += crumb;
            top_ups.retain(|t| t.amount > 0);
            return Ok(top_ups);
        }
        if !keep.iter().any(|k| *k) {
            break;
        }
        let mut flags = keep.into_iter();
        included.retain(|_| flags.next().unwrap_or(false));
    }

    // Rounding left no validator at or below its level: fall back to a
    // plain weighted split of the new stake.
    let (outputs, crumb) = split_included(&included, amount)?;
    let mut top_ups: Vec<TopUp> = included
        .iter()
        .zip(outputs)
        .map(|(v, out)| TopUp {
            validator: v.operator.clone(),
            amount: out,
        })
        .collect();
    top_ups[0].amount += crumb;
    top_ups.retain(|t| t.amount > 0);
    Ok(top_ups)
}

fn split_included(included: &[&LiquidValidatorState], amount: Amount) -> Result<(Vec<Amount>, Amount)> {
    let owned: Vec<LiquidValidatorState> = included.iter().map(|v| (*v).clone()).collect();
    split_by_weight(&owned, amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use liquidstake_types::validator::ValidatorStatus;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use test_case::test_case;

    fn vals(liquid: &[Amount], weights: &[u128]) -> Vec<LiquidValidatorState> {
        liquid
            .iter()
            .zip(weights)
            .enumerate()
            .map(|(i, (l, w))| LiquidValidatorState {
                operator: ValidatorId::from(["a", "b", "c", "d", "e"][i]),
                weight: *w,
                status: ValidatorStatus::Active,
                del_shares: Dec::from_int(*l).unwrap(),
                liquid_tokens: *l,
            })
            .collect()
    }

    fn d(s: &str) -> Dec {
        s.parse().unwrap()
    }

    #[test_case(&[2_000_000, 2_000_000, 1_000_000], &[1, 1, 1], 10_000_000, &[3_333_333, 3_333_333, 3_333_333], 1 ; "equal weights")]
    #[test_case(&[1_000_000, 1_000_000, 1_000_000], &[2, 2, 1], 10_000_000, &[4_000_000, 4_000_000, 2_000_000], 0 ; "uneven weights")]
    #[test_case(&[3, 2, 1], &[1, 1, 1], 10, &[3, 3, 3], 1 ; "small amount")]
    fn split_by_weight_fixtures(liquid: &[Amount], weights: &[u128], amount: Amount, expected: &[Amount], crumb: Amount) {
        let (outputs, got_crumb) = split_by_weight(&vals(liquid, weights), amount).unwrap();
        assert_eq!(outputs, expected.to_vec());
        assert_eq!(got_crumb, crumb);
    }

    #[test_case(&[2_000_000, 2_000_000, 1_000_000], 10_000_000, &[4_000_000, 4_000_000, 2_000_000], 0 ; "follows current tokens")]
    #[test_case(&[1_000_000, 1_000_000, 1_000_000], 10_000_000, &[3_333_333, 3_333_333, 3_333_333], 1 ; "ignores weights")]
    #[test_case(&[3, 2, 1], 10, &[4, 3, 1], 2 ; "small amount")]
    #[test_case(&[10_000_000, 2_000_000, 3_000_001], 10_000_000, &[6_666_666, 1_333_333, 2_000_000], 1 ; "odd total")]
    fn split_by_current_weight_fixtures(liquid: &[Amount], amount: Amount, expected: &[Amount], crumb: Amount) {
        let (outputs, got_crumb) = split_by_current_weight(&vals(liquid, &[2, 2, 1]), amount).unwrap();
        assert_eq!(outputs, expected.to_vec());
        assert_eq!(got_crumb, crumb);
    }

    #[test_case(&[2_000_000, 2_000_000, 1_000_000], "10000000", &["4000000", "4000000", "2000000"], "0" ; "exact")]
    #[test_case(&[1_000_000, 1_000_000, 1_000_000], "10000000", &["3333333.333333333333", "3333333.333333333333", "3333333.333333333333"], "0.000000000001" ; "repeating")]
    #[test_case(&[3, 2, 1], "10", &["4.999999999999999998", "3.333333333333333332", "1.666666666666666666"], "0.000000000000000004" ; "small amount")]
    #[test_case(&[10_000_000, 2_000_000, 3_000_001], "10000000", &["6666666.22222225185", "1333333.24444445037", "2000000.533333297777225185"], "0.000000000002774815" ; "odd total")]
    fn split_by_current_weight_dec_fixtures(liquid: &[Amount], amount: &str, expected: &[&str], crumb: &str) {
        let (outputs, got_crumb) = split_by_current_weight_dec(&vals(liquid, &[1, 1, 1]), d(amount)).unwrap();
        let expected: Vec<Dec> = expected.iter().map(|s| d(s)).collect();
        assert_eq!(outputs, expected);
        assert_eq!(got_crumb, d(crumb));
    }

    #[test_case(&[2_000_000, 2_000_000, 1_000_000], 10_000_000, &[("a", 3_000_000), ("b", 3_000_000), ("c", 4_000_000)] ; "levels all three")]
    #[test_case(&[3, 2, 1], 10, &[("a", 3), ("b", 3), ("c", 4)] ; "crumb to first")]
    #[test_case(&[8, 7, 4], 10, &[("a", 3), ("b", 2), ("c", 5)] ; "near level")]
    #[test_case(&[10, 5, 1], 10, &[("b", 3), ("c", 7)] ; "skips the largest")]
    #[test_case(&[10, 3, 1], 10, &[("b", 4), ("c", 6)] ; "equalizes the rest")]
    #[test_case(&[10, 3, 2], 10, &[("b", 5), ("c", 5)] ; "crumb to first survivor")]
    #[test_case(&[10, 2, 3], 10, &[("b", 6), ("c", 4)] ; "lower first")]
    #[test_case(&[10_000_000, 2_000_000, 3_000_001], 10_000_000, &[("b", 5_500_001), ("c", 4_499_999)] ; "large amounts")]
    fn plan_top_ups_fixtures(liquid: &[Amount], amount: Amount, expected: &[(&str, Amount)]) {
        let top_ups = plan_top_ups(&vals(liquid, &[1, 1, 1]), amount).unwrap();
        let expected: Vec<TopUp> = expected
            .iter()
            .map(|(v, a)| TopUp {
                validator: ValidatorId::from(*v),
                amount: *a,
            })
            .collect();
        assert_eq!(top_ups, expected);
    }

    #[test]
    fn zero_weight_split_returns_everything_as_crumb() {
        let (outputs, crumb) = split_by_weight(&vals(&[1, 2], &[0, 0]), 77).unwrap();
        assert_eq!(outputs, vec![0, 0]);
        assert_eq!(crumb, 77);
        assert!(plan_top_ups(&vals(&[1, 2], &[0, 0]), 77).unwrap().is_empty());
    }

    #[test]
    fn overflowing_total_weight_is_an_error() {
        let states = vals(&[0, 0], &[u128::MAX, 1]);
        assert_eq!(split_by_weight(&states, 10_000), Err(MathError::AdditionOverflow));
        assert_eq!(plan_top_ups(&states, 10_000), Err(MathError::AdditionOverflow));
    }

    #[test]
    fn plan_top_ups_skips_zero_weight_validators() {
        let top_ups = plan_top_ups(&vals(&[0, 0, 0], &[1, 0, 1]), 11).unwrap();
        assert_eq!(
            top_ups,
            vec![
                TopUp { validator: ValidatorId::from("a"), amount: 6 },
                TopUp { validator: ValidatorId::from("c"), amount: 5 },
            ]
        );
    }

    proptest! {
        #[test]
        fn split_by_weight_conserves_amount(
            weights in prop::collection::vec(1u128..1_000, 1..5),
            amount in 0u128..1_000_000_000_000,
        ) {
            let liquid = vec![0; weights.len()];
            let (outputs, crumb) = split_by_weight(&vals(&liquid, &weights), amount).unwrap();
            prop_assert_eq!(outputs.iter().sum::<u128>() + crumb, amount);
            prop_assert!(crumb < weights.len() as u128);
        }

        #[test]
        fn plan_top_ups_hands_out_everything(
            liquid in prop::collection::vec(0u128..1_000_000_000, 1..5),
            amount in 1u128..1_000_000_000,
        ) {
            let weights: Vec<u128> = liquid.iter().enumerate().map(|(i, _)| 1 + i as u128 % 3).collect();
            let top_ups = plan_top_ups(&vals(&liquid, &weights), amount).unwrap();
            prop_assert_eq!(top_ups.iter().map(|t| t.amount).sum::<u128>(), amount);
        }

        #[test]
        fn current_weight_dec_split_is_exact(
            liquid in prop::collection::vec(1u128..1_000_000_000, 1..5),
            amount in 0u128..1_000_000_000,
        ) {
            let weights = vec![1; liquid.len()];
            let total = Dec::from_int(amount).unwrap();
            let (outputs, crumb) = split_by_current_weight_dec(&vals(&liquid, &weights), total).unwrap();
            let mut sum = crumb;
            for out in outputs {
                sum = sum.checked_add(out).unwrap();
            }
            prop_assert_eq!(sum, total);
        }
    }
}
