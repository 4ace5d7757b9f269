use crate::{InMemoryLedger, UnbondingEntry};
use liquidstake_types::dec::Dec;
use liquidstake_types::ledger::{
    Address, Delegation, LedgerError, RedelegationEntry, StakingLedger, Timestamp,
};
use liquidstake_types::validator::{BondStatus, ValidatorId, ValidatorInfo};
use liquidstake_types::Amount;
use tracing::debug;

fn shares_from_tokens(v: &ValidatorInfo, amount: Amount) -> Result<Dec, LedgerError> {
    if v.delegator_shares.is_zero() {
        return Ok(Dec::from_int(amount)?);
    }
    if v.tokens == 0 {
        return Err(LedgerError::ValidatorNotBonded(v.operator.clone()));
    }
    Ok(v
        .delegator_shares
        .mul_truncate(Dec::from_int(amount)?)?
        .quo_truncate(Dec::from_int(v.tokens)?)?)
}

fn tokens_from_shares_truncated(v: &ValidatorInfo, shares: Dec) -> Result<Dec, LedgerError> {
    if v.delegator_shares.is_zero() {
        return Ok(Dec::ZERO);
    }
    Ok(shares
        .mul_truncate(Dec::from_int(v.tokens)?)?
        .quo_truncate(v.delegator_shares)?)
}

/// Tokens released when `shares` leave the validator. The last shares out
/// take every remaining token.
fn tokens_for_removal(v: &ValidatorInfo, shares: Dec) -> Result<Amount, LedgerError> {
    let remaining = v
        .delegator_shares
        .checked_sub(shares)
        .map_err(|_| LedgerError::InsufficientShares(v.operator.clone()))?;
    if remaining.is_zero() {
        return Ok(v.tokens);
    }
    let issued = shares
        .mul_truncate(Dec::from_int(v.tokens)?)?
        .quo(v.delegator_shares)?
        .truncate_int();
    Ok(issued.min(v.tokens))
}

impl InMemoryLedger {
    /// Issues shares for tokens that already sit in the bonded pool.
    fn issue_shares(&mut self, owner: &Address, id: &ValidatorId, amount: Amount) -> Result<Dec, LedgerError> {
        let v = self.validator_entry(id)?;
        let shares = shares_from_tokens(v, amount)?;
        v.tokens += amount;
        v.delegator_shares = v.delegator_shares.checked_add(shares)?;
        let entry = self.delegations.entry((*owner, id.clone())).or_default();
        *entry = entry.checked_add(shares)?;
        Ok(shares)
    }

    pub(crate) fn add_delegation(&mut self, owner: &Address, id: &ValidatorId, amount: Amount) -> Result<Dec, LedgerError> {
        if amount == 0 {
            return Err(LedgerError::ZeroAmount);
        }
        shares_from_tokens(self.validator_ref(id)?, amount)?;
        let denom = self.bond_denom.clone();
        self.transfer(owner, &Self::bonded_pool(), &denom, amount)?;
        self.issue_shares(owner, id, amount)
    }

    /// Removes `shares` from the delegation and the validator. The tokens stay
    /// in the bonded pool.
    fn remove_shares(&mut self, owner: &Address, id: &ValidatorId, shares: Dec) -> Result<Amount, LedgerError> {
        let key = (*owner, id.clone());
        let held = self
            .delegations
            .get(&key)
            .copied()
            .ok_or_else(|| LedgerError::DelegationNotFound(id.clone()))?;
        if held < shares {
            return Err(LedgerError::InsufficientShares(id.clone()));
        }
        let tokens = tokens_for_removal(self.validator_ref(id)?, shares)?;

        let left = held.checked_sub(shares)?;
        if left.is_zero() {
            self.delegations.remove(&key);
        } else {
            self.delegations.insert(key, left);
        }
        let v = self.validator_entry(id)?;
        v.delegator_shares = v.delegator_shares.checked_sub(shares)?;
        v.tokens -= tokens;
        Ok(tokens)
    }

    fn withdraw_for(&mut self, owner: &Address, id: &ValidatorId) -> Result<Amount, LedgerError> {
        let pending = match self.rewards.remove(&(*owner, id.clone())) {
            Some(pending) => pending,
            None => return Ok(0),
        };
        let paid = pending.truncate_int();
        self.community_pool = self.community_pool.checked_add(pending.checked_sub(pending.truncate_dec())?)?;
        if paid > 0 {
            let denom = self.bond_denom.clone();
            self.transfer(&Self::distribution_account(), owner, &denom, paid)?;
        }
        Ok(paid)
    }

    fn completion_time_for(&self, id: &ValidatorId) -> Result<Timestamp, LedgerError> {
        Ok(match self.validator_ref(id)?.status {
            BondStatus::Unbonded => self.now,
            BondStatus::Bonded | BondStatus::Unbonding => self.now + self.unbonding_time,
        })
    }
}

impl StakingLedger for InMemoryLedger {
    fn bond_denom(&self) -> &str {
        &self.bond_denom
    }

    fn validator(&self, id: &ValidatorId) -> Option<ValidatorInfo> {
        self.validators.get(id).cloned()
    }

    fn delegation(&self, owner: &Address, id: &ValidatorId) -> Option<Delegation> {
        self.delegations
            .get(&(*owner, id.clone()))
            .map(|shares| Delegation {
                delegator: *owner,
                validator: id.clone(),
                shares: *shares,
            })
    }

    fn delegations(&self, owner: &Address) -> Vec<Delegation> {
        self.delegations
            .iter()
            .filter(|((delegator, _), _)| delegator == owner)
            .map(|((delegator, validator), shares)| Delegation {
                delegator: *delegator,
                validator: validator.clone(),
                shares: *shares,
            })
            .collect()
    }

    fn shares_value(&self, id: &ValidatorId, shares: Dec) -> Result<Dec, LedgerError> {
        tokens_from_shares_truncated(self.validator_ref(id)?, shares)
    }

    fn delegate(&mut self, owner: &Address, id: &ValidatorId, amount: Amount) -> Result<Dec, LedgerError> {
        self.withdraw_for(owner, id)?;
        let shares = self.add_delegation(owner, id, amount)?;
        debug!(validator = %id, amount, %shares, "delegated");
        Ok(shares)
    }

    fn validate_unbond_amount(&self, owner: &Address, id: &ValidatorId, amount: Amount) -> Result<Dec, LedgerError> {
        let v = self.validator_ref(id)?;
        let held = self
            .delegations
            .get(&(*owner, id.clone()))
            .copied()
            .ok_or_else(|| LedgerError::DelegationNotFound(id.clone()))?;
        if v.tokens == 0 {
            return Err(LedgerError::InsufficientShares(id.clone()));
        }
        let shares = shares_from_tokens(v, amount)?;
        if shares > held {
            return Err(LedgerError::InsufficientShares(id.clone()));
        }
        Ok(shares)
    }

    fn undelegate(
        &mut self,
        owner: &Address,
        id: &ValidatorId,
        shares: Dec,
        recipient: &Address,
    ) -> Result<(Timestamp, Amount), LedgerError> {
        if shares.is_zero() {
            return Err(LedgerError::ZeroAmount);
        }
        let completion_time = self.completion_time_for(id)?;
        self.withdraw_for(owner, id)?;
        let tokens = self.remove_shares(owner, id, shares)?;
        if tokens > 0 {
            self.unbondings.push(UnbondingEntry {
                recipient: *recipient,
                validator: id.clone(),
                balance: tokens,
                completion_time,
            });
        }
        debug!(validator = %id, tokens, completion_time, "undelegated");
        Ok((completion_time, tokens))
    }

    fn begin_redelegation(
        &mut self,
        owner: &Address,
        src: &ValidatorId,
        dst: &ValidatorId,
        shares: Dec,
    ) -> Result<Timestamp, LedgerError> {
        if src == dst {
            return Err(LedgerError::SelfRedelegation);
        }
        self.validator_ref(dst)?;
        let now = self.now;
        let in_flight = self
            .redelegations
            .iter()
            .filter(|e| &e.delegator == owner && e.completion_time > now);
        let mut same_pair = 0u32;
        for entry in in_flight {
            if &entry.dst_validator == src {
                return Err(LedgerError::TransitiveRedelegation(src.clone()));
            }
            if &entry.src_validator == src && &entry.dst_validator == dst {
                same_pair += 1;
            }
        }
        if same_pair >= self.max_redelegation_entries {
            return Err(LedgerError::MaxRedelegationEntries {
                src: src.clone(),
                dst: dst.clone(),
            });
        }
        if tokens_for_removal(self.validator_ref(src)?, shares)? == 0 {
            return Err(LedgerError::ZeroAmount);
        }

        let completion_time = self.completion_time_for(src)?;
        self.withdraw_for(owner, src)?;
        self.withdraw_for(owner, dst)?;
        let tokens = self.remove_shares(owner, src, shares)?;
        let shares_dst = self.issue_shares(owner, dst, tokens)?;
        if completion_time > now {
            self.redelegations.push(RedelegationEntry {
                delegator: *owner,
                src_validator: src.clone(),
                dst_validator: dst.clone(),
                shares_dst,
                initial_balance: tokens,
                completion_time,
            });
        }
        debug!(src = %src, dst = %dst, tokens, "redelegation started");
        Ok(completion_time)
    }

    fn redelegations_in_progress(&self, owner: &Address) -> Vec<RedelegationEntry> {
        self.redelegations
            .iter()
            .filter(|e| &e.delegator == owner && e.completion_time > self.now)
            .cloned()
            .collect()
    }

    fn unbonding_balance(&self, owner: &Address) -> Amount {
        self.unbondings
            .iter()
            .filter(|e| &e.recipient == owner)
            .map(|e| e.balance)
            .sum()
    }

    fn pending_rewards(&self, owner: &Address, id: &ValidatorId) -> Dec {
        self.rewards
            .get(&(*owner, id.clone()))
            .copied()
            .unwrap_or_default()
    }

    fn withdraw_rewards(&mut self, owner: &Address, id: &ValidatorId) -> Result<Amount, LedgerError> {
        if !self.delegations.contains_key(&(*owner, id.clone())) {
            return Err(LedgerError::DelegationNotFound(id.clone()));
        }
        self.withdraw_for(owner, id)
    }
}
