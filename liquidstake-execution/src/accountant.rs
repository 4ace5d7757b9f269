//! Pool valuation and receipt-token pricing.
//!
//! Nothing here is cached: every call reads the ledger again.

use crate::error::{Result, StakingError};
use crate::ExecutionContext;
use liquidstake_types::dec::Dec;
use liquidstake_types::ledger::Ledger;
use liquidstake_types::state::NetAmountState;
use liquidstake_types::Amount;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DelegationTotals {
    pub rewards: Dec,
    pub del_shares: Dec,
    pub liquid_tokens: Amount,
}

/// Sums pending rewards, shares and token value over every delegation the
/// pool account holds.
pub fn delegation_totals<L: Ledger>(ctx: &ExecutionContext<'_, L>) -> Result<DelegationTotals> {
    let proxy = ctx.proxy();
    let mut totals = DelegationTotals::default();
    for delegation in ctx.ledger.delegations(&proxy) {
        let rewards = ctx.ledger.pending_rewards(&proxy, &delegation.validator);
        let value = ctx.ledger.shares_value(&delegation.validator, delegation.shares)?;
        totals.rewards = totals.rewards.checked_add(rewards)?;
        totals.del_shares = totals.del_shares.checked_add(delegation.shares)?;
        totals.liquid_tokens += value.truncate_int();
    }
    Ok(totals)
}

pub fn net_amount_state<L: Ledger>(ctx: &ExecutionContext<'_, L>) -> Result<NetAmountState> {
    let proxy = ctx.proxy();
    let totals = delegation_totals(ctx)?;
    let receipt_total_supply = ctx.ledger.supply(&ctx.state.params.liquid_bond_denom);
    let proxy_acc_balance = ctx.ledger.balance(&proxy, ctx.ledger.bond_denom());
    let total_unbonding_balance = ctx.ledger.unbonding_balance(&proxy);

    let held = proxy_acc_balance + totals.liquid_tokens + total_unbonding_balance;
    let net_amount = Dec::from_int(held)?.checked_add(totals.rewards)?;
    let (mint_rate, exchange_rate) = rates(receipt_total_supply, net_amount)?;

    Ok(NetAmountState {
        mint_rate,
        exchange_rate,
        receipt_total_supply,
        total_del_shares: totals.del_shares,
        total_liquid_tokens: totals.liquid_tokens,
        total_remaining_rewards: totals.rewards,
        total_unbonding_balance,
        proxy_acc_balance,
        net_amount,
    })
}

/// `(supply / net, net / supply)`. One-to-one before anything is minted,
/// zero when outstanding tokens are backed by nothing.
pub fn rates(supply: Amount, net_amount: Dec) -> Result<(Dec, Dec)> {
    if supply == 0 {
        return Ok((Dec::ONE, Dec::ONE));
    }
    if net_amount.is_zero() {
        return Ok((Dec::ZERO, Dec::ZERO));
    }
    let supply = Dec::from_int(supply)?;
    Ok((supply.quo_truncate(net_amount)?, net_amount.quo_truncate(supply)?))
}

/// Receipt tokens minted for a deposit of `amount`.
pub fn native_to_receipt(amount: Amount, supply: Amount, net_amount: Dec) -> Result<Amount> {
    let backing = net_amount.truncate_dec();
    if backing.is_zero() {
        return Err(StakingError::InsolventPool);
    }
    Ok(Dec::from_int(supply)?
        .mul_truncate(Dec::from_int(amount)?)?
        .quo_truncate(backing)?
        .truncate_int())
}

/// Base asset owed for `amount` receipt tokens, before fees.
pub fn receipt_to_native(amount: Amount, supply: Amount, net_amount: Dec) -> Result<Dec> {
    Ok(Dec::from_int(amount)?
        .mul_truncate(net_amount)?
        .quo(Dec::from_int(supply)?)?
        .truncate_dec())
}

pub fn deduct_fee_rate(amount: Dec, fee_rate: Dec) -> Result<Dec> {
    Ok(amount.mul_truncate(Dec::ONE.checked_sub(fee_rate)?)?.truncate_dec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn d(s: &str) -> Dec {
        s.parse().unwrap()
    }

    #[test]
    fn rates_start_at_one() {
        assert_eq!(rates(0, Dec::ZERO).unwrap(), (Dec::ONE, Dec::ONE));
        assert_eq!(rates(100, d("100")).unwrap(), (Dec::ONE, Dec::ONE));
    }

    #[test]
    fn rewards_raise_the_exchange_rate() {
        let (mint, exchange) = rates(1_000, d("1100")).unwrap();
        assert_eq!(exchange, d("1.1"));
        assert_eq!(mint, d("0.909090909090909090"));
    }

    #[test]
    fn slashing_pushes_the_mint_rate_over_one() {
        let (mint, exchange) = rates(49_998, d("46310")).unwrap();
        assert!(mint > Dec::ONE);
        assert!(exchange < Dec::ONE);
    }

    #[test_case(1_000, 1_000, "1100", 909 ; "after rewards")]
    #[test_case(1_000, 1_000, "1000", 1_000 ; "at par")]
    #[test_case(7, 3, "3.9", 7 ; "fractional net is truncated")]
    fn native_to_receipt_rounds_down(amount: Amount, supply: Amount, net: &str, expected: Amount) {
        assert_eq!(native_to_receipt(amount, supply, d(net)).unwrap(), expected);
    }

    #[test]
    fn native_to_receipt_needs_backing() {
        assert_eq!(
            native_to_receipt(10, 10, d("0.5")),
            Err(StakingError::InsolventPool)
        );
    }

    #[test]
    fn receipt_to_native_and_fee() {
        let owed = receipt_to_native(1_000, 3_000, d("3100.5")).unwrap();
        assert_eq!(owed, d("1033"));
        assert_eq!(deduct_fee_rate(owed, d("0.001")).unwrap(), d("1031"));
        assert_eq!(deduct_fee_rate(owed, Dec::ZERO).unwrap(), owed);
    }
}
