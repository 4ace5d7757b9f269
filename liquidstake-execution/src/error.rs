use liquidstake_types::params::ParamsError;
use liquidstake_types::{Amount, LedgerError, MathError, ValidatorId};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StakingError {
    #[error("no active validator can receive stake")]
    NoEligibleValidators,
    #[error("idle balance {available} cannot cover payout {requested}")]
    InsufficientIdleBalance { available: Amount, requested: Amount },
    #[error("redelegation {src} -> {dst} deferred: {reason}")]
    RedelegationConstraintViolated {
        src: ValidatorId,
        dst: ValidatorId,
        reason: &'static str,
    },
    #[error("validator {0} still holds delegated shares")]
    ValidatorRemovalBlocked(ValidatorId),
    #[error("invalid weight configuration: {0}")]
    InvalidWeightConfiguration(#[from] ParamsError),
    #[error("stake amount {amount} is below the minimum {minimum}")]
    BelowMinimumStake { amount: Amount, minimum: Amount },
    #[error("deposit is too small to mint any receipt token")]
    ZeroMintAmount,
    #[error("unstake amount releases nothing")]
    ZeroUnstakeAmount,
    #[error("insufficient balance: have {have}, need {need}")]
    InsufficientBalance { have: Amount, need: Amount },
    #[error("receipt tokens are outstanding but the pool holds no value")]
    InsolventPool,
    #[error("ledger: {0}")]
    Ledger(#[from] LedgerError),
    #[error("math: {0}")]
    Math(#[from] MathError),
}

pub type Result<T> = std::result::Result<T, StakingError>;
