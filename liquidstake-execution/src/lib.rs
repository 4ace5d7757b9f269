pub mod accountant;
pub mod directory;
pub mod error;
pub mod planner;
pub mod rebalance;
pub mod staking;


use liquidstake_types::ledger::{Address, Ledger};
use liquidstake_types::params::{validate_weight_entries, Params};
use liquidstake_types::state::{proxy_account, NetAmountState, PoolState, Redelegation};
use liquidstake_types::validator::{LiquidValidatorState, ValidatorId, WeightEntry};
use liquidstake_types::Amount;
use tracing::info;

pub use error::{Result, StakingError};
pub use staking::{Staked, Unstaked};

/// Everything an operation may read or write. Built per invocation by the
/// caller; nothing here outlives it.
pub struct ExecutionContext<'a, L: Ledger> {
    pub state: &'a mut PoolState,
    pub ledger: &'a mut L,
    pub height: u64,
    pub timestamp: u64,
}

impl<'a, L: Ledger> ExecutionContext<'a, L> {
    pub fn proxy(&self) -> Address {
        proxy_account()
    }

    pub fn bond_denom(&self) -> String {
        self.ledger.bond_denom().to_string()
    }

    pub fn liquid_bond_denom(&self) -> String {
        self.state.params.liquid_bond_denom.clone()
    }

    /// Runs `f` on a copy of the pool state and ledger, and keeps the copy
    /// only if `f` succeeds.
    pub fn cached<T, E>(
        &mut self,
        f: impl FnOnce(&mut ExecutionContext<'_, L>) -> std::result::Result<T, E>,
    ) -> std::result::Result<T, E> {
        let mut state = self.state.clone();
        let mut ledger = self.ledger.clone();
        let result = {
            let mut branch = ExecutionContext {
                state: &mut state,
                ledger: &mut ledger,
                height: self.height,
                timestamp: self.timestamp,
            };
            f(&mut branch)
        };
        if result.is_ok() {
            *self.state = state;
            *self.ledger = ledger;
        }
        result
    }
}

/// Replaces the allow-list. Malformed lists are rejected before anything
/// changes.
pub fn update_validator_weights<L: Ledger>(
    ctx: &mut ExecutionContext<'_, L>,
    entries: Vec<WeightEntry>,
) -> Result<()> {
    validate_weight_entries(&entries)?;
    info!(height = ctx.height, validators = entries.len(), "updating validator weights");
    ctx.state.params.whitelisted_validators = entries;
    directory::sync(ctx)
}

pub fn update_params<L: Ledger>(ctx: &mut ExecutionContext<'_, L>, params: Params) -> Result<()> {
    params.validate()?;
    ctx.state.params = params;
    directory::sync(ctx)
}

pub fn run_rebalance_cycle<L: Ledger>(ctx: &mut ExecutionContext<'_, L>) -> Result<Vec<Redelegation>> {
    rebalance::run_cycle(ctx)
}

pub fn stake_in<L: Ledger>(ctx: &mut ExecutionContext<'_, L>, depositor: &Address, amount: Amount) -> Result<Staked> {
    staking::stake_in(ctx, depositor, amount)
}

pub fn stake_out<L: Ledger>(
    ctx: &mut ExecutionContext<'_, L>,
    holder: &Address,
    receipt_amount: Amount,
) -> Result<Unstaked> {
    staking::stake_out(ctx, holder, receipt_amount)
}

pub fn get_snapshot<L: Ledger>(ctx: &ExecutionContext<'_, L>) -> Result<NetAmountState> {
    accountant::net_amount_state(ctx)
}

pub fn list_validator_states<L: Ledger>(ctx: &ExecutionContext<'_, L>) -> Result<Vec<LiquidValidatorState>> {
    directory::states(ctx)
}

pub fn get_validator_state<L: Ledger>(ctx: &ExecutionContext<'_, L>, id: &ValidatorId) -> Result<LiquidValidatorState> {
    directory::derive_state(ctx, id)
}
