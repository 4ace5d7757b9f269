use crate::dec::Dec;
use crate::ledger::{Address, Timestamp};
use crate::params::Params;
use crate::validator::{LiquidValidator, ValidatorId};
use crate::Amount;
use serde::{Deserialize, Serialize};

const PROXY_ACCOUNT_SEED: &[u8] = b"liquidstake/proxy-account";

/// Module account that holds every pooled delegation.
pub fn proxy_account() -> Address {
    *blake3::hash(PROXY_ACCOUNT_SEED).as_bytes()
}

/// Everything the pool owns outside the ledger: configuration and the
/// validator directory in first-reference order.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolState {
    pub params: Params,
    pub liquid_validators: Vec<LiquidValidator>,
}

impl PoolState {
    pub fn new(params: Params) -> Self {
        Self {
            params,
            liquid_validators: Vec::new(),
        }
    }

    pub fn validator(&self, id: &ValidatorId) -> Option<&LiquidValidator> {
        self.liquid_validators.iter().find(|v| &v.operator == id)
    }

    pub fn validator_mut(&mut self, id: &ValidatorId) -> Option<&mut LiquidValidator> {
        self.liquid_validators.iter_mut().find(|v| &v.operator == id)
    }

    /// Replicas that applied the same operations produce the same root.
    pub fn root_hash(&self) -> [u8; 32] {
        let encoded = bincode::serialize(self).unwrap_or_default();
        *blake3::hash(&encoded).as_bytes()
    }
}

/// Pool-wide valuation, recomputed on every read.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct NetAmountState {
    /// Receipt tokens per unit of base asset.
    pub mint_rate: Dec,
    /// Base asset per receipt token.
    pub exchange_rate: Dec,
    pub receipt_total_supply: Amount,
    pub total_del_shares: Dec,
    pub total_liquid_tokens: Amount,
    pub total_remaining_rewards: Dec,
    pub total_unbonding_balance: Amount,
    pub proxy_acc_balance: Amount,
    pub net_amount: Dec,
}

impl NetAmountState {
    pub fn is_empty(&self) -> bool {
        self.receipt_total_supply == 0
            && self.total_del_shares.is_zero()
            && self.total_liquid_tokens == 0
            && self.total_remaining_rewards.is_zero()
            && self.total_unbonding_balance == 0
            && self.proxy_acc_balance == 0
            && self.net_amount.is_zero()
    }
}

/// A redelegation the rebalancer actually issued.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Redelegation {
    pub delegator: Address,
    pub src_validator: ValidatorId,
    pub dst_validator: ValidatorId,
    pub amount: Amount,
    /// Drained every remaining share of the source.
    pub last: bool,
    pub completion_time: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::WeightEntry;

    #[test]
    fn root_hash_tracks_directory_changes() {
        let mut a = PoolState::default();
        let b = PoolState::default();
        assert_eq!(a.root_hash(), b.root_hash());

        a.params.whitelisted_validators.push(WeightEntry::new("val0", 1));
        a.liquid_validators.push(LiquidValidator {
            operator: ValidatorId::from("val0"),
            weight: 1,
        });
        assert_ne!(a.root_hash(), b.root_hash());
    }

    #[test]
    fn proxy_account_is_stable() {
        assert_eq!(proxy_account(), proxy_account());
        assert_ne!(proxy_account(), [0u8; 32]);
    }

    #[test]
    fn default_snapshot_is_empty() {
        assert!(NetAmountState::default().is_empty());
    }
}
