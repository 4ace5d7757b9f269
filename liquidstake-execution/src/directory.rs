//! Tracked validators and their derived state.
//!
//! The directory only stores `(operator, configured weight)`. Status, shares
//! and token value are read from the ledger every time a state is derived.

use crate::error::{Result, StakingError};
use crate::ExecutionContext;
use liquidstake_types::dec::Dec;
use liquidstake_types::ledger::Ledger;
use liquidstake_types::state::PoolState;
use liquidstake_types::validator::{
    derive_status, effective_weight, LiquidValidator, LiquidValidatorState, ValidatorId, ValidatorStatus, Weight,
};
use liquidstake_types::Amount;
use tracing::{debug, info};

/// Sets the configured weight, tracking the validator if it is new. New
/// entries go to the end so the directory keeps first-reference order.
pub fn upsert(state: &mut PoolState, id: &ValidatorId, weight: Weight) {
    match state.validator_mut(id) {
        Some(lv) => lv.weight = weight,
        None => state.liquid_validators.push(LiquidValidator {
            operator: id.clone(),
            weight,
        }),
    }
}

pub fn derive_state<L: Ledger>(ctx: &ExecutionContext<'_, L>, id: &ValidatorId) -> Result<LiquidValidatorState> {
    let configured = match ctx.state.validator(id) {
        Some(lv) => lv.weight,
        None => return Ok(LiquidValidatorState::unspecified(id.clone())),
    };
    let info = ctx.ledger.validator(id);
    let del_shares = ctx
        .ledger
        .delegation(&ctx.proxy(), id)
        .map(|d| d.shares)
        .unwrap_or(Dec::ZERO);
    let liquid_tokens = match &info {
        Some(_) if del_shares.is_positive() => ctx.ledger.shares_value(id, del_shares)?.truncate_int(),
        _ => 0,
    };
    let status = derive_status(configured, info.as_ref(), del_shares);
    Ok(LiquidValidatorState {
        operator: id.clone(),
        weight: effective_weight(status, configured),
        status,
        del_shares,
        liquid_tokens,
    })
}

/// Derived state of every tracked validator, in directory order.
pub fn states<L: Ledger>(ctx: &ExecutionContext<'_, L>) -> Result<Vec<LiquidValidatorState>> {
    ctx.state
        .liquid_validators
        .iter()
        .map(|lv| derive_state(ctx, &lv.operator))
        .collect()
}

pub fn active_states<L: Ledger>(ctx: &ExecutionContext<'_, L>) -> Result<Vec<LiquidValidatorState>> {
    Ok(states(ctx)?.into_iter().filter(|s| s.is_active()).collect())
}

pub fn total_liquid_tokens(states: &[LiquidValidatorState]) -> Amount {
    states.iter().map(|s| s.liquid_tokens).sum()
}

/// Drops a validator from the directory. Refused while the pool still
/// holds shares of it.
pub fn remove<L: Ledger>(ctx: &mut ExecutionContext<'_, L>, id: &ValidatorId) -> Result<()> {
    let state = derive_state(ctx, id)?;
    if state.del_shares.is_positive() {
        return Err(StakingError::ValidatorRemovalBlocked(id.clone()));
    }
    ctx.state.liquid_validators.retain(|lv| &lv.operator != id);
    info!(validator = %id, "removed liquid validator");
    Ok(())
}

/// Brings the directory in line with the allow-list and the ledger.
///
/// Allow-listed validators are upserted, tracked ones missing from the list
/// drop to weight zero, and delegations of the pool to untracked validators
/// are adopted with weight zero so they get drained.
pub fn sync<L: Ledger>(ctx: &mut ExecutionContext<'_, L>) -> Result<()> {
    let entries = ctx.state.params.whitelisted_validators.clone();
    for entry in &entries {
        upsert(ctx.state, &entry.validator, entry.target_weight);
    }
    for lv in ctx.state.liquid_validators.iter_mut() {
        if !entries.iter().any(|e| e.validator == lv.operator) {
            lv.weight = 0;
        }
    }
    for delegation in ctx.ledger.delegations(&ctx.proxy()) {
        if delegation.shares.is_positive() && ctx.state.validator(&delegation.validator).is_none() {
            debug!(validator = %delegation.validator, "adopting untracked delegation");
            upsert(ctx.state, &delegation.validator, 0);
        }
    }
    Ok(())
}

/// Removes every tracked validator whose derived status is `Unspecified`.
pub fn prune<L: Ledger>(ctx: &mut ExecutionContext<'_, L>) -> Result<Vec<ValidatorId>> {
    let mut removed = Vec::new();
    for state in states(ctx)? {
        match state.status {
            ValidatorStatus::Unspecified => {
                remove(ctx, &state.operator)?;
                removed.push(state.operator);
            }
            ValidatorStatus::Active | ValidatorStatus::Inactive => {}
        }
    }
    Ok(removed)
}
