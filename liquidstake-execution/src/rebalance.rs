//! Reconciles live delegations with the weighted target split.

use crate::accountant::delegation_totals;
use crate::directory;
use crate::error::{Result, StakingError};
use crate::planner::{plan_top_ups, split_by_weight};
use crate::ExecutionContext;
use liquidstake_types::dec::Dec;
use liquidstake_types::ledger::{Ledger, LedgerError};
use liquidstake_types::state::Redelegation;
use liquidstake_types::validator::{LiquidValidatorState, ValidatorId};
use liquidstake_types::Amount;
use tracing::{debug, info, warn};

/// One step of the rebalancing walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Move {
    pub src: usize,
    pub dst: usize,
    pub amount: Amount,
    /// The source has no target and the move empties it.
    pub last: bool,
}

/// Runs one full cycle: sync the directory, move stake toward the targets
/// (or unbond everything when nobody is active), prune empty validators and
/// re-stake rewards. Returns the redelegations that were issued.
pub fn run_cycle<L: Ledger>(ctx: &mut ExecutionContext<'_, L>) -> Result<Vec<Redelegation>> {
    ctx.cached(|ctx| -> Result<Vec<Redelegation>> {
        directory::sync(ctx)?;
        let states = directory::states(ctx)?;

        let redelegations = if states.iter().any(LiquidValidatorState::is_active) {
            rebalance(ctx, &states)?
        } else {
            unbond_all(ctx, &states)?;
            Vec::new()
        };

        let removed = directory::prune(ctx)?;
        restake_rewards(ctx)?;

        info!(
            height = ctx.height,
            redelegations = redelegations.len(),
            removed = removed.len(),
            "rebalance cycle finished"
        );
        Ok(redelegations)
    })
}

/// Weighted targets over the total tracked tokens. The split crumb lands on
/// the first validator with a positive target.
pub fn targets(states: &[LiquidValidatorState]) -> Result<Vec<Amount>> {
    let total = directory::total_liquid_tokens(states);
    let (mut targets, crumb) = split_by_weight(states, total)?;
    if crumb > 0 {
        if let Some(first) = targets.iter_mut().find(|t| **t > 0) {
            *first += crumb;
        }
    }
    Ok(targets)
}

/// Picks the most over-allocated validator as source and the most
/// under-allocated as destination. Ties go to the earlier validator.
pub(crate) fn min_max_gap(targets: &[Amount], liquid: &[Amount]) -> Option<Move> {
    let mut max_gap: Amount = 0;
    let mut min_gap: Amount = 0;
    let mut src = None;
    let mut dst = None;
    for (i, (target, current)) in targets.iter().zip(liquid).enumerate() {
        if current > target && current - target > max_gap {
            max_gap = current - target;
            src = Some(i);
        }
        if target > current && target - current > min_gap {
            min_gap = target - current;
            dst = Some(i);
        }
    }
    let (src, dst) = (src?, dst?);
    let amount = max_gap.min(min_gap);
    Some(Move {
        src,
        dst,
        amount,
        last: targets[src] == 0 && liquid[src] == amount,
    })
}

fn rebalance<L: Ledger>(ctx: &mut ExecutionContext<'_, L>, states: &[LiquidValidatorState]) -> Result<Vec<Redelegation>> {
    let targets = targets(states)?;
    let total = directory::total_liquid_tokens(states);
    let trigger = ctx.state.params.rebalancing_trigger.mul_truncate(Dec::from_int(total)?)?;
    let mut liquid: Vec<Amount> = states.iter().map(|s| s.liquid_tokens).collect();
    let mut issued = Vec::new();

    for i in 0..states.len() {
        let step = match min_max_gap(&targets, &liquid) {
            Some(step) if step.amount > 0 => step,
            _ => break,
        };
        if i == 0 && Dec::from_int(step.amount)? < trigger {
            debug!(needed = step.amount, "imbalance below rebalancing trigger");
            break;
        }
        let (src, dst) = (&states[step.src].operator, &states[step.dst].operator);
        // A skipped move still closes its gap so the pair is not retried
        // within this cycle.
        let moved = match try_redelegate(ctx, src, dst, step.amount, step.last) {
            Ok(red) => {
                let moved = red.amount;
                issued.push(red);
                moved
            }
            Err(err @ StakingError::RedelegationConstraintViolated { .. }) | Err(err @ StakingError::Ledger(_)) => {
                warn!(src = %src, dst = %dst, amount = step.amount, error = %err, "redelegation skipped");
                step.amount
            }
            Err(err) => return Err(err),
        };
        liquid[step.dst] += moved;
        liquid[step.src] = liquid[step.src].saturating_sub(moved);
    }
    Ok(issued)
}

/// Refuses a move the ledger would reject under the one-hop rule.
fn check_hop_constraint<L: Ledger>(ctx: &ExecutionContext<'_, L>, src: &ValidatorId, dst: &ValidatorId) -> Result<()> {
    let in_flight = ctx.ledger.redelegations_in_progress(&ctx.proxy());
    if in_flight.iter().any(|e| &e.dst_validator == src) {
        return Err(StakingError::RedelegationConstraintViolated {
            src: src.clone(),
            dst: dst.clone(),
            reason: "source is still receiving a redelegation",
        });
    }
    let same_pair = in_flight
        .iter()
        .filter(|e| &e.src_validator == src && &e.dst_validator == dst)
        .count();
    if same_pair >= ctx.state.params.max_redelegation_entries as usize {
        return Err(StakingError::RedelegationConstraintViolated {
            src: src.clone(),
            dst: dst.clone(),
            reason: "too many entries in flight",
        });
    }
    Ok(())
}

fn try_redelegate<L: Ledger>(
    ctx: &mut ExecutionContext<'_, L>,
    src: &ValidatorId,
    dst: &ValidatorId,
    amount: Amount,
    last: bool,
) -> Result<Redelegation> {
    check_hop_constraint(ctx, src, dst)?;
    ctx.cached(|ctx| -> Result<Redelegation> {
        let proxy = ctx.proxy();
        let held = ctx
            .ledger
            .delegation(&proxy, src)
            .map(|d| d.shares)
            .ok_or_else(|| LedgerError::DelegationNotFound(src.clone()))?;
        // Drain only when the ledger holds no more than the planned amount;
        // an earlier skipped move may have left extra tokens behind.
        let drain = last && ctx.ledger.shares_value(src, held)?.truncate_int() <= amount;
        let shares = if drain {
            held
        } else {
            ctx.ledger.validate_unbond_amount(&proxy, src, amount)?
        };
        let moved = ctx.ledger.shares_value(src, shares)?.truncate_int();
        let completion_time = ctx.ledger.begin_redelegation(&proxy, src, dst, shares)?;
        debug!(src = %src, dst = %dst, amount = moved, last = drain, "redelegated");
        Ok(Redelegation {
            delegator: proxy,
            src_validator: src.clone(),
            dst_validator: dst.clone(),
            amount: moved,
            last: drain,
            completion_time,
        })
    })
}

/// With no active validator left, every tracked delegation is unbonded back
/// to the pool account.
fn unbond_all<L: Ledger>(ctx: &mut ExecutionContext<'_, L>, states: &[LiquidValidatorState]) -> Result<()> {
    let proxy = ctx.proxy();
    for state in states.iter().filter(|s| s.del_shares.is_positive()) {
        let outcome = ctx.cached(|ctx| ctx.ledger.undelegate(&proxy, &state.operator, state.del_shares, &proxy));
        match outcome {
            Ok((completion_time, amount)) => {
                info!(validator = %state.operator, amount, completion_time, "unbonded to pool account");
            }
            Err(err) => {
                warn!(validator = %state.operator, error = %err, "unbonding failed");
            }
        }
    }
    Ok(())
}

/// Withdraws pending rewards and delegates the pool account's idle balance
/// once it exceeds `reward_trigger` of the delegated tokens.
fn restake_rewards<L: Ledger>(ctx: &mut ExecutionContext<'_, L>) -> Result<Amount> {
    let active = directory::active_states(ctx)?;
    if active.is_empty() {
        return Ok(0);
    }
    let totals = delegation_totals(ctx)?;
    let proxy = ctx.proxy();
    let bond_denom = ctx.bond_denom();
    let balance = ctx.ledger.balance(&proxy, &bond_denom);
    let threshold = ctx
        .state
        .params
        .reward_trigger
        .mul_truncate(Dec::from_int(totals.liquid_tokens)?)?;
    if Dec::from_int(balance)?.checked_add(totals.rewards)? <= threshold {
        return Ok(0);
    }

    let outcome = ctx.cached(|ctx| -> Result<Amount> {
        for delegation in ctx.ledger.delegations(&proxy) {
            ctx.ledger.withdraw_rewards(&proxy, &delegation.validator)?;
        }
        let idle = ctx.ledger.balance(&proxy, &bond_denom);
        for top_up in plan_top_ups(&active, idle)? {
            ctx.ledger.delegate(&proxy, &top_up.validator, top_up.amount)?;
        }
        Ok(idle)
    });
    match outcome {
        Ok(restaked) => {
            info!(restaked, "rewards re-staked");
            Ok(restaked)
        }
        Err(err @ StakingError::Ledger(_)) => {
            warn!(error = %err, "reward re-staking failed");
            Ok(0)
        }
        Err(err) => Err(err),
    }
}
