use crate::dec::Dec;
use crate::Amount;
use serde::{Deserialize, Serialize};
use std::fmt;

pub type Weight = u128;

/// Operator address of a validator, as raw bytes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ValidatorId(pub Vec<u8>);

impl ValidatorId {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for ValidatorId {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl fmt::Display for ValidatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

/// One allow-listed validator and the weight it should carry.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct WeightEntry {
    pub validator: ValidatorId,
    pub target_weight: Weight,
}

impl WeightEntry {
    pub fn new(validator: impl Into<ValidatorId>, target_weight: Weight) -> Self {
        Self {
            validator: validator.into(),
            target_weight,
        }
    }
}

/// Directory record for a validator the pool tracks.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LiquidValidator {
    pub operator: ValidatorId,
    /// Configured weight; zero once the validator leaves the allow-list.
    pub weight: Weight,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidatorStatus {
    /// Not tracked, or tracked with no weight and no delegation left.
    Unspecified,
    /// Weighted, bonded, not jailed or tombstoned. Receives new stake.
    Active,
    /// Effective weight is zero but delegated shares still need to drain.
    Inactive,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BondStatus {
    Unbonded,
    Unbonding,
    Bonded,
}

/// Live view of a validator as reported by the staking ledger.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ValidatorInfo {
    pub operator: ValidatorId,
    pub status: BondStatus,
    pub jailed: bool,
    pub tombstoned: bool,
    pub tokens: Amount,
    pub delegator_shares: Dec,
}

impl ValidatorInfo {
    pub fn accepts_stake(&self) -> bool {
        self.status == BondStatus::Bonded && !self.jailed && !self.tombstoned
    }
}

/// Derived, never stored: directory entry combined with ledger state.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LiquidValidatorState {
    pub operator: ValidatorId,
    /// Effective weight. Always zero unless `status` is `Active`.
    pub weight: Weight,
    pub status: ValidatorStatus,
    pub del_shares: Dec,
    pub liquid_tokens: Amount,
}

impl LiquidValidatorState {
    pub fn unspecified(operator: ValidatorId) -> Self {
        Self {
            operator,
            weight: 0,
            status: ValidatorStatus::Unspecified,
            del_shares: Dec::ZERO,
            liquid_tokens: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ValidatorStatus::Active
    }
}

/// The one place a validator's status is decided.
///
/// A jailed, tombstoned, unbonded or missing validator never keeps weight, no
/// matter what the allow-list says.
pub fn derive_status(
    configured_weight: Weight,
    ledger: Option<&ValidatorInfo>,
    del_shares: Dec,
) -> ValidatorStatus {
    let eligible = match ledger {
        Some(info) => info.accepts_stake(),
        None => false,
    };
    match (configured_weight > 0 && eligible, del_shares.is_positive()) {
        (true, _) => ValidatorStatus::Active,
        (false, true) => ValidatorStatus::Inactive,
        (false, false) => ValidatorStatus::Unspecified,
    }
}

pub fn effective_weight(status: ValidatorStatus, configured_weight: Weight) -> Weight {
    match status {
        ValidatorStatus::Active => configured_weight,
        ValidatorStatus::Inactive | ValidatorStatus::Unspecified => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(status: BondStatus, jailed: bool, tombstoned: bool) -> ValidatorInfo {
        ValidatorInfo {
            operator: ValidatorId::from("val"),
            status,
            jailed,
            tombstoned,
            tokens: 1_000_000,
            delegator_shares: Dec::from_int(1_000_000).unwrap(),
        }
    }

    #[test]
    fn weighted_bonded_validator_is_active() {
        let v = info(BondStatus::Bonded, false, false);
        assert_eq!(derive_status(10, Some(&v), Dec::ZERO), ValidatorStatus::Active);
    }

    #[test]
    fn tombstoned_validator_with_shares_is_inactive() {
        let v = info(BondStatus::Unbonding, true, true);
        let shares = Dec::from_int(5).unwrap();
        assert_eq!(derive_status(10, Some(&v), shares), ValidatorStatus::Inactive);
        assert_eq!(effective_weight(ValidatorStatus::Inactive, 10), 0);
    }

    #[test]
    fn jailed_without_shares_is_unspecified() {
        let v = info(BondStatus::Bonded, true, false);
        assert_eq!(derive_status(10, Some(&v), Dec::ZERO), ValidatorStatus::Unspecified);
        assert_eq!(derive_status(0, None, Dec::ZERO), ValidatorStatus::Unspecified);
    }

    #[test]
    fn display_is_hex() {
        assert_eq!(ValidatorId::from("ab").to_string(), "6162");
    }
}
