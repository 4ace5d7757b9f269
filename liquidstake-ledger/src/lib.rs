//! Deterministic in-memory staking and bank ledger.
//!
//! Stands in for the chain's staking module in tests and in the simulation
//! runner. Share math follows the usual delegator-shares model: a validator
//! issues shares at `delegator_shares / tokens`, and slashing lowers `tokens`
//! without touching shares. Pending rewards are withdrawn to the delegator
//! whenever its delegation changes.

mod bank;
mod staking;

#[cfg(test)]
mod tests;

use liquidstake_types::dec::Dec;
use liquidstake_types::ledger::{Address, LedgerError, RedelegationEntry, Timestamp};
use liquidstake_types::validator::{BondStatus, ValidatorId, ValidatorInfo};
use liquidstake_types::Amount;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

pub const DEFAULT_BOND_DENOM: &str = "stake";
/// Three weeks.
pub const DEFAULT_UNBONDING_TIME: u64 = 21 * 24 * 60 * 60;

const BONDED_POOL_SEED: &[u8] = b"liquidstake-ledger/bonded-pool";
const DISTRIBUTION_SEED: &[u8] = b"liquidstake-ledger/distribution";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UnbondingEntry {
    pub recipient: Address,
    pub validator: ValidatorId,
    pub balance: Amount,
    pub completion_time: Timestamp,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct InMemoryLedger {
    pub(crate) bond_denom: String,
    pub(crate) now: Timestamp,
    pub(crate) unbonding_time: u64,
    pub(crate) max_redelegation_entries: u32,
    pub(crate) balances: BTreeMap<Address, BTreeMap<String, Amount>>,
    pub(crate) supply: BTreeMap<String, Amount>,
    pub(crate) validators: BTreeMap<ValidatorId, ValidatorInfo>,
    pub(crate) delegations: BTreeMap<(Address, ValidatorId), Dec>,
    pub(crate) rewards: BTreeMap<(Address, ValidatorId), Dec>,
    pub(crate) unbondings: Vec<UnbondingEntry>,
    pub(crate) redelegations: Vec<RedelegationEntry>,
    /// Sub-unit reward dust dropped on withdrawal.
    pub(crate) community_pool: Dec,
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new(DEFAULT_BOND_DENOM, 0)
    }
}

impl InMemoryLedger {
    pub fn new(bond_denom: &str, now: Timestamp) -> Self {
        Self {
            bond_denom: bond_denom.to_string(),
            now,
            unbonding_time: DEFAULT_UNBONDING_TIME,
            max_redelegation_entries: 7,
            balances: BTreeMap::new(),
            supply: BTreeMap::new(),
            validators: BTreeMap::new(),
            delegations: BTreeMap::new(),
            rewards: BTreeMap::new(),
            unbondings: Vec::new(),
            redelegations: Vec::new(),
            community_pool: Dec::ZERO,
        }
    }

    pub fn with_unbonding_time(mut self, seconds: u64) -> Self {
        self.unbonding_time = seconds;
        self
    }

    pub fn now(&self) -> Timestamp {
        self.now
    }

    pub fn unbonding_time(&self) -> u64 {
        self.unbonding_time
    }

    pub fn bonded_pool() -> Address {
        *blake3::hash(BONDED_POOL_SEED).as_bytes()
    }

    /// Creates a bonded validator. A positive `self_bond` is minted and
    /// delegated from the operator's own account.
    pub fn add_validator(&mut self, id: impl Into<ValidatorId>, self_bond: Amount) -> Result<(), LedgerError> {
        let id = id.into();
        self.validators.insert(
            id.clone(),
            ValidatorInfo {
                operator: id.clone(),
                status: BondStatus::Bonded,
                jailed: false,
                tombstoned: false,
                tokens: 0,
                delegator_shares: Dec::ZERO,
            },
        );
        if self_bond > 0 {
            let operator = Self::operator_account(&id);
            let denom = self.bond_denom.clone();
            self.mint_to(&operator, &denom, self_bond)?;
            self.add_delegation(&operator, &id, self_bond)?;
        }
        Ok(())
    }

    /// Holds accrued, not yet withdrawn rewards.
    pub fn distribution_account() -> Address {
        *blake3::hash(DISTRIBUTION_SEED).as_bytes()
    }

    pub fn operator_account(id: &ValidatorId) -> Address {
        *blake3::hash(id.as_bytes()).as_bytes()
    }

    pub fn set_status(&mut self, id: &ValidatorId, status: BondStatus) -> Result<(), LedgerError> {
        self.validator_entry(id)?.status = status;
        Ok(())
    }

    pub fn jail(&mut self, id: &ValidatorId) -> Result<(), LedgerError> {
        let v = self.validator_entry(id)?;
        v.jailed = true;
        v.status = BondStatus::Unbonding;
        Ok(())
    }

    pub fn unjail(&mut self, id: &ValidatorId) -> Result<(), LedgerError> {
        let v = self.validator_entry(id)?;
        if !v.tombstoned {
            v.jailed = false;
            v.status = BondStatus::Bonded;
        }
        Ok(())
    }

    /// Burns `fraction` of the validator's bonded tokens. Returns the burned
    /// amount.
    pub fn slash(&mut self, id: &ValidatorId, fraction: Dec) -> Result<Amount, LedgerError> {
        let v = self.validator_entry(id)?;
        let burned = Dec::from_int(v.tokens)?.mul_truncate(fraction)?.truncate_int();
        let burned = burned.min(v.tokens);
        v.tokens -= burned;
        let pool = Self::bonded_pool();
        let denom = self.bond_denom.clone();
        self.burn_from(&pool, &denom, burned)?;
        debug!(validator = %id, burned, "slashed validator");
        Ok(burned)
    }

    /// Double-sign handling: slash, jail and permanently tombstone.
    pub fn tombstone(&mut self, id: &ValidatorId, slash_fraction: Dec) -> Result<Amount, LedgerError> {
        let burned = self.slash(id, slash_fraction)?;
        self.jail(id)?;
        self.validator_entry(id)?.tombstoned = true;
        Ok(burned)
    }

    /// Distributes `amount` of freshly minted rewards across the validator's
    /// delegators by share.
    pub fn accrue_rewards(&mut self, id: &ValidatorId, amount: Amount) -> Result<(), LedgerError> {
        let total_shares = self.validator_ref(id)?.delegator_shares;
        if total_shares.is_zero() || amount == 0 {
            return Ok(());
        }
        let total = Dec::from_int(amount)?;
        let holders: Vec<(Address, Dec)> = self
            .delegations
            .iter()
            .filter(|((_, v), _)| v == id)
            .map(|((owner, _), shares)| (*owner, *shares))
            .collect();
        for (owner, shares) in holders {
            let part = total.mul_truncate(shares)?.quo_truncate(total_shares)?;
            let entry = self.rewards.entry((owner, id.clone())).or_default();
            *entry = entry.checked_add(part)?;
        }
        let denom = self.bond_denom.clone();
        self.mint_to(&Self::distribution_account(), &denom, amount)
    }

    /// Moves the clock forward and pays out every matured unbonding entry.
    pub fn advance_time(&mut self, seconds: u64) -> Result<(), LedgerError> {
        self.now = self.now.saturating_add(seconds);
        let now = self.now;
        let (matured, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.unbondings)
            .into_iter()
            .partition(|e| e.completion_time <= now);
        self.unbondings = pending;
        let pool = Self::bonded_pool();
        let denom = self.bond_denom.clone();
        for entry in matured {
            self.transfer(&pool, &entry.recipient, &denom, entry.balance)?;
            debug!(validator = %entry.validator, amount = entry.balance, "unbonding matured");
        }
        self.redelegations.retain(|e| e.completion_time > now);
        Ok(())
    }

    pub fn unbonding_entries(&self, recipient: &Address) -> Vec<UnbondingEntry> {
        self.unbondings
            .iter()
            .filter(|e| &e.recipient == recipient)
            .cloned()
            .collect()
    }

    pub(crate) fn validator_ref(&self, id: &ValidatorId) -> Result<&ValidatorInfo, LedgerError> {
        self.validators
            .get(id)
            .ok_or_else(|| LedgerError::ValidatorNotFound(id.clone()))
    }

    pub(crate) fn validator_entry(&mut self, id: &ValidatorId) -> Result<&mut ValidatorInfo, LedgerError> {
        self.validators
            .get_mut(id)
            .ok_or_else(|| LedgerError::ValidatorNotFound(id.clone()))
    }
}
