//! Capability interface to the staking and bank ledgers.
//!
//! The pool never touches delegation bookkeeping or share prices itself; it
//! only calls these traits and trusts their answers. `Clone` on the combined
//! [`Ledger`] is the cache branch: operations run against a clone and the
//! clone replaces the live copy only when everything succeeded.

use crate::dec::{Dec, MathError};
use crate::validator::{ValidatorId, ValidatorInfo};
use crate::Amount;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Address = [u8; 32];
pub type Timestamp = u64;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("validator {0} not found")]
    ValidatorNotFound(ValidatorId),
    #[error("no delegation to validator {0}")]
    DelegationNotFound(ValidatorId),
    #[error("delegation to {0} holds fewer shares than requested")]
    InsufficientShares(ValidatorId),
    #[error("insufficient funds: have {have}, need {need}")]
    InsufficientFunds { have: Amount, need: Amount },
    #[error("redelegation from {0} is still maturing")]
    TransitiveRedelegation(ValidatorId),
    #[error("too many redelegation entries from {src} to {dst}")]
    MaxRedelegationEntries { src: ValidatorId, dst: ValidatorId },
    #[error("cannot redelegate to the same validator")]
    SelfRedelegation,
    #[error("amount must be positive")]
    ZeroAmount,
    #[error("validator {0} is not accepting delegations")]
    ValidatorNotBonded(ValidatorId),
    #[error(transparent)]
    Math(#[from] MathError),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Delegation {
    pub delegator: Address,
    pub validator: ValidatorId,
    pub shares: Dec,
}

/// One maturing redelegation entry.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RedelegationEntry {
    pub delegator: Address,
    pub src_validator: ValidatorId,
    pub dst_validator: ValidatorId,
    pub shares_dst: Dec,
    pub initial_balance: Amount,
    pub completion_time: Timestamp,
}

pub trait StakingLedger {
    fn bond_denom(&self) -> &str;

    fn validator(&self, id: &ValidatorId) -> Option<ValidatorInfo>;

    fn delegation(&self, owner: &Address, id: &ValidatorId) -> Option<Delegation>;

    /// All delegations of `owner`, ordered by validator id.
    fn delegations(&self, owner: &Address) -> Vec<Delegation>;

    /// Base-asset value of `shares` at the validator's current share price,
    /// truncated.
    fn shares_value(&self, id: &ValidatorId, shares: Dec) -> Result<Dec, LedgerError>;

    /// Bonds `amount` from `owner`'s bank balance. Returns the issued shares.
    fn delegate(&mut self, owner: &Address, id: &ValidatorId, amount: Amount)
        -> Result<Dec, LedgerError>;

    /// Shares that unbonding `amount` tokens would remove, capped at the
    /// delegation's shares.
    fn validate_unbond_amount(
        &self,
        owner: &Address,
        id: &ValidatorId,
        amount: Amount,
    ) -> Result<Dec, LedgerError>;

    /// Removes `shares` from `owner` and starts an unbonding entry paying out
    /// to `recipient`. Returns the completion time and the unbonding amount.
    fn undelegate(
        &mut self,
        owner: &Address,
        id: &ValidatorId,
        shares: Dec,
        recipient: &Address,
    ) -> Result<(Timestamp, Amount), LedgerError>;

    fn begin_redelegation(
        &mut self,
        owner: &Address,
        src: &ValidatorId,
        dst: &ValidatorId,
        shares: Dec,
    ) -> Result<Timestamp, LedgerError>;

    fn redelegations_in_progress(&self, owner: &Address) -> Vec<RedelegationEntry>;

    /// Sum of immature unbonding entries paying out to `owner`.
    fn unbonding_balance(&self, owner: &Address) -> Amount;

    fn pending_rewards(&self, owner: &Address, id: &ValidatorId) -> Dec;

    /// Moves the truncated pending rewards into `owner`'s bank balance.
    fn withdraw_rewards(&mut self, owner: &Address, id: &ValidatorId) -> Result<Amount, LedgerError>;
}

pub trait BankLedger {
    fn balance(&self, account: &Address, denom: &str) -> Amount;

    fn supply(&self, denom: &str) -> Amount;

    fn send(&mut self, from: &Address, to: &Address, denom: &str, amount: Amount)
        -> Result<(), LedgerError>;

    fn mint(&mut self, to: &Address, denom: &str, amount: Amount) -> Result<(), LedgerError>;

    fn burn(&mut self, from: &Address, denom: &str, amount: Amount) -> Result<(), LedgerError>;
}

pub trait Ledger: StakingLedger + BankLedger + Clone {}

impl<T: StakingLedger + BankLedger + Clone> Ledger for T {}
