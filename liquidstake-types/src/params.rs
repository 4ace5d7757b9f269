use crate::dec::Dec;
use crate::validator::{ValidatorId, WeightEntry};
use crate::Amount;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

pub const DEFAULT_LIQUID_BOND_DENOM: &str = "bstake";
pub const DEFAULT_MIN_LIQUID_STAKING_AMOUNT: Amount = 1_000;
pub const DEFAULT_MAX_REDELEGATION_ENTRIES: u32 = 7;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParamsError {
    #[error("validator id must not be empty")]
    EmptyValidatorId,
    #[error("validator {0} is listed more than once")]
    DuplicateValidator(ValidatorId),
    #[error("unstake fee rate {0} must be below 1")]
    FeeRateTooLarge(Dec),
    #[error("liquid bond denom must not be empty")]
    EmptyDenom,
    #[error("sum of validator weights overflows")]
    WeightOverflow,
}

/// Pool configuration. Mutated only by explicit configuration updates.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Params {
    pub liquid_bond_denom: String,
    /// Allow-list in configuration order; the order is part of the
    /// allocation contract.
    pub whitelisted_validators: Vec<WeightEntry>,
    pub unstake_fee_rate: Dec,
    pub min_liquid_staking_amount: Amount,
    /// Fraction of total liquid tokens below which the first rebalancing move
    /// is skipped.
    pub rebalancing_trigger: Dec,
    /// Fraction of total liquid tokens idle balance plus rewards must exceed
    /// before rewards are withdrawn and re-staked.
    pub reward_trigger: Dec,
    pub max_redelegation_entries: u32,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            liquid_bond_denom: DEFAULT_LIQUID_BOND_DENOM.to_string(),
            whitelisted_validators: Vec::new(),
            unstake_fee_rate: Dec::ZERO,
            min_liquid_staking_amount: DEFAULT_MIN_LIQUID_STAKING_AMOUNT,
            rebalancing_trigger: Dec::ZERO,
            // 0.001
            reward_trigger: Dec::from_raw(1_000_000_000_000_000),
            max_redelegation_entries: DEFAULT_MAX_REDELEGATION_ENTRIES,
        }
    }
}

impl Params {
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.liquid_bond_denom.is_empty() {
            return Err(ParamsError::EmptyDenom);
        }
        if self.unstake_fee_rate >= Dec::ONE {
            return Err(ParamsError::FeeRateTooLarge(self.unstake_fee_rate));
        }
        validate_weight_entries(&self.whitelisted_validators)
    }

    pub fn configured_weight(&self, id: &ValidatorId) -> u128 {
        self.whitelisted_validators
            .iter()
            .find(|e| &e.validator == id)
            .map(|e| e.target_weight)
            .unwrap_or(0)
    }
}

pub fn validate_weight_entries(entries: &[WeightEntry]) -> Result<(), ParamsError> {
    let mut seen = BTreeSet::new();
    let mut total: u128 = 0;
    for entry in entries {
        if entry.validator.is_empty() {
            return Err(ParamsError::EmptyValidatorId);
        }
        if !seen.insert(&entry.validator) {
            return Err(ParamsError::DuplicateValidator(entry.validator.clone()));
        }
        total = total
            .checked_add(entry.target_weight)
            .ok_or(ParamsError::WeightOverflow)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(Params::default().validate().is_ok());
    }

    #[test]
    fn duplicate_entries_are_rejected() {
        let entries = vec![WeightEntry::new("a", 1), WeightEntry::new("a", 2)];
        assert_eq!(
            validate_weight_entries(&entries),
            Err(ParamsError::DuplicateValidator(ValidatorId::from("a")))
        );
    }

    #[test]
    fn empty_id_is_rejected() {
        let entries = vec![WeightEntry::new(ValidatorId::new(Vec::new()), 1)];
        assert_eq!(validate_weight_entries(&entries), Err(ParamsError::EmptyValidatorId));
    }

    #[test]
    fn overflowing_weight_sum_is_rejected() {
        let entries = vec![WeightEntry::new("a", u128::MAX), WeightEntry::new("b", 1)];
        assert_eq!(validate_weight_entries(&entries), Err(ParamsError::WeightOverflow));
        let entries = vec![WeightEntry::new("a", u128::MAX - 1), WeightEntry::new("b", 1)];
        assert!(validate_weight_entries(&entries).is_ok());
    }

    #[test]
    fn full_fee_is_rejected() {
        let params = Params {
            unstake_fee_rate: Dec::ONE,
            ..Default::default()
        };
        assert!(matches!(params.validate(), Err(ParamsError::FeeRateTooLarge(_))));
    }
}
