use crate::accountant::{deduct_fee_rate, native_to_receipt, net_amount_state, receipt_to_native};
use crate::directory;
use crate::error::{Result, StakingError};
use crate::planner::{split_by_current_weight_dec, split_by_weight};
use crate::ExecutionContext;
use liquidstake_types::dec::Dec;
use liquidstake_types::ledger::{Address, Ledger, Timestamp};
use liquidstake_types::validator::ValidatorId;
use liquidstake_types::Amount;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Staked {
    pub new_shares: Dec,
    pub minted: Amount,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UnbondingRequest {
    pub validator: ValidatorId,
    pub shares: Dec,
    pub amount: Amount,
    pub completion_time: Timestamp,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Unstaked {
    /// Base asset released to the holder, now or at `completion_time`.
    pub released: Amount,
    /// `None` when paid straight from the idle balance.
    pub completion_time: Option<Timestamp>,
    pub entries: Vec<UnbondingRequest>,
}

/// Deposits `amount` of the bond denom and mints receipt tokens at the rate
/// observed before the deposit lands.
pub fn stake_in<L: Ledger>(ctx: &mut ExecutionContext<'_, L>, depositor: &Address, amount: Amount) -> Result<Staked> {
    ctx.cached(|ctx| -> Result<Staked> {
        let minimum = ctx.state.params.min_liquid_staking_amount;
        if amount < minimum {
            return Err(StakingError::BelowMinimumStake { amount, minimum });
        }
        let active = directory::active_states(ctx)?;
        if active.is_empty() {
            return Err(StakingError::NoEligibleValidators);
        }
        let bond_denom = ctx.bond_denom();
        let have = ctx.ledger.balance(depositor, &bond_denom);
        if have < amount {
            return Err(StakingError::InsufficientBalance { have, need: amount });
        }

        let nas = net_amount_state(ctx)?;
        let minted = if nas.receipt_total_supply == 0 {
            amount
        } else {
            native_to_receipt(amount, nas.receipt_total_supply, nas.net_amount)?
        };
        if minted == 0 {
            return Err(StakingError::ZeroMintAmount);
        }

        let proxy = ctx.proxy();
        let liquid_denom = ctx.liquid_bond_denom();
        ctx.ledger.send(depositor, &proxy, &bond_denom, amount)?;
        ctx.ledger.mint(depositor, &liquid_denom, minted)?;

        let (mut outputs, crumb) = split_by_weight(&active, amount)?;
        outputs[0] += crumb;
        let mut new_shares = Dec::ZERO;
        for (val, out) in active.iter().zip(outputs) {
            if out == 0 {
                continue;
            }
            let shares = ctx.ledger.delegate(&proxy, &val.operator, out)?;
            new_shares = new_shares.checked_add(shares)?;
        }

        info!(height = ctx.height, amount, minted, %new_shares, "liquid staked");
        Ok(Staked { new_shares, minted })
    })
}

/// Burns `receipt_amount` and releases its share of the pool.
///
/// With nothing delegated the payout comes from the idle balance at once.
/// Otherwise the release is unbonded from every tracked validator in
/// proportion to its current tokens, with the holder as recipient; the
/// sub-unit remainder stays in the pool.
pub fn stake_out<L: Ledger>(
    ctx: &mut ExecutionContext<'_, L>,
    holder: &Address,
    receipt_amount: Amount,
) -> Result<Unstaked> {
    ctx.cached(|ctx| -> Result<Unstaked> {
        let liquid_denom = ctx.liquid_bond_denom();
        let have = ctx.ledger.balance(holder, &liquid_denom);
        if have < receipt_amount {
            return Err(StakingError::InsufficientBalance {
                have,
                need: receipt_amount,
            });
        }
        if receipt_amount == 0 {
            return Err(StakingError::ZeroUnstakeAmount);
        }

        let nas = net_amount_state(ctx)?;
        let release = receipt_to_native(receipt_amount, nas.receipt_total_supply, nas.net_amount)?;
        let release = deduct_fee_rate(release, ctx.state.params.unstake_fee_rate)?;
        let release_int = release.truncate_int();
        if release_int == 0 {
            return Err(StakingError::ZeroUnstakeAmount);
        }
        ctx.ledger.burn(holder, &liquid_denom, receipt_amount)?;

        let proxy = ctx.proxy();
        let bond_denom = ctx.bond_denom();
        if nas.proxy_acc_balance >= release_int {
            ctx.ledger.send(&proxy, holder, &bond_denom, release_int)?;
            info!(height = ctx.height, receipt_amount, released = release_int, "liquid unstaked from idle balance");
            return Ok(Unstaked {
                released: release_int,
                completion_time: None,
                entries: Vec::new(),
            });
        }

        let states = directory::states(ctx)?;
        let total_liquid = directory::total_liquid_tokens(&states);
        // Whatever exceeds the delegated tokens is paid out of the idle balance.
        let from_idle = release_int.saturating_sub(total_liquid);
        if total_liquid == 0 || from_idle > nas.proxy_acc_balance {
            return Err(StakingError::InsufficientIdleBalance {
                available: nas.proxy_acc_balance,
                requested: if total_liquid == 0 { release_int } else { from_idle },
            });
        }
        let to_unbond = if from_idle > 0 {
            Dec::from_int(total_liquid)?
        } else {
            release
        };

        let (portions, _crumb) = split_by_current_weight_dec(&states, to_unbond)?;
        let mut entries = Vec::new();
        for (val, portion) in states.iter().zip(portions) {
            let amount = portion.truncate_int();
            if amount == 0 {
                continue;
            }
            let shares = ctx.ledger.validate_unbond_amount(&proxy, &val.operator, amount)?;
            if !shares.is_positive() {
                continue;
            }
            let (completion_time, unbonded) = ctx.ledger.undelegate(&proxy, &val.operator, shares, holder)?;
            entries.push(UnbondingRequest {
                validator: val.operator.clone(),
                shares,
                amount: unbonded,
                completion_time,
            });
        }
        if entries.is_empty() {
            return Err(StakingError::ZeroUnstakeAmount);
        }
        if from_idle > 0 {
            ctx.ledger.send(&proxy, holder, &bond_denom, from_idle)?;
        }

        let released: Amount = entries.iter().map(|e| e.amount).sum::<Amount>() + from_idle;
        let completion_time = entries.iter().map(|e| e.completion_time).max();
        info!(height = ctx.height, receipt_amount, released, "liquid unstaked");
        Ok(Unstaked {
            released,
            completion_time,
            entries,
        })
    })
}
