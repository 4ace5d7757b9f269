use crate::keys::{
    liquid_validator_key, operator_from_key, pool_state_height_key, LIQUID_VALIDATOR_PREFIX, POOL_STATE_KEY,
};
use anyhow::{anyhow, Result};
use liquidstake_types::state::PoolState;
use liquidstake_types::validator::{LiquidValidator, ValidatorId};
use std::collections::BTreeMap;
use std::sync::RwLock;

#[cfg(feature = "rocksdb")]
use rocksdb::{Options, DB};

enum Backend {
    Memory(RwLock<BTreeMap<Vec<u8>, Vec<u8>>>),
    #[cfg(feature = "rocksdb")]
    Rocks(DB),
}

pub struct Storage {
    backend: Backend,
}

impl Storage {
    #[cfg(feature = "rocksdb")]
    pub fn new(path: &str) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, path).map_err(|e| anyhow!("Failed to open DB: {}", e))?;
        Ok(Self {
            backend: Backend::Rocks(db),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            backend: Backend::Memory(RwLock::new(BTreeMap::new())),
        }
    }

    fn put(&self, key: &[u8], value: Vec<u8>) -> Result<()> {
        match &self.backend {
            Backend::Memory(map) => {
                map.write()
                    .map_err(|_| anyhow!("storage lock poisoned"))?
                    .insert(key.to_vec(), value);
            }
            #[cfg(feature = "rocksdb")]
            Backend::Rocks(db) => db.put(key, value).map_err(|e| anyhow!("DB write error: {}", e))?,
        }
        Ok(())
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match &self.backend {
            Backend::Memory(map) => Ok(map
                .read()
                .map_err(|_| anyhow!("storage lock poisoned"))?
                .get(key)
                .cloned()),
            #[cfg(feature = "rocksdb")]
            Backend::Rocks(db) => db.get(key).map_err(|e| anyhow!("DB read error: {}", e)),
        }
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        match &self.backend {
            Backend::Memory(map) => {
                map.write()
                    .map_err(|_| anyhow!("storage lock poisoned"))?
                    .remove(key);
            }
            #[cfg(feature = "rocksdb")]
            Backend::Rocks(db) => db.delete(key).map_err(|e| anyhow!("DB delete error: {}", e))?,
        }
        Ok(())
    }

    /// Every `(key, value)` whose key starts with `prefix`, in key order.
    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        match &self.backend {
            Backend::Memory(map) => Ok(map
                .read()
                .map_err(|_| anyhow!("storage lock poisoned"))?
                .range(prefix.to_vec()..)
                .take_while(|(k, _)| k.starts_with(prefix))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()),
            #[cfg(feature = "rocksdb")]
            Backend::Rocks(db) => {
                let mut out = Vec::new();
                for item in db.prefix_iterator(prefix) {
                    let (k, v) = item.map_err(|e| anyhow!("DB scan error: {}", e))?;
                    if !k.starts_with(prefix) {
                        break;
                    }
                    out.push((k.to_vec(), v.to_vec()));
                }
                Ok(out)
            }
        }
    }

    pub fn save_state(&self, state: &PoolState) -> Result<()> {
        let encoded = bincode::serialize(state).map_err(|e| anyhow!("Serialization error: {}", e))?;
        self.put(POOL_STATE_KEY, encoded)
    }

    pub fn load_state(&self) -> Result<PoolState> {
        match self.get(POOL_STATE_KEY)? {
            Some(value) => bincode::deserialize(&value).map_err(|e| anyhow!("Deserialization error: {}", e)),
            None => Ok(PoolState::default()),
        }
    }

    /// Keeps a copy of the state as of `height` next to the latest one.
    pub fn save_state_at_height(&self, height: u64, state: &PoolState) -> Result<()> {
        let encoded = bincode::serialize(state).map_err(|e| anyhow!("Serialization error: {}", e))?;
        self.put(pool_state_height_key(height).as_bytes(), encoded.clone())?;
        self.put(POOL_STATE_KEY, encoded)
    }

    pub fn load_state_by_height(&self, height: u64) -> Result<Option<PoolState>> {
        match self.get(pool_state_height_key(height).as_bytes())? {
            Some(v) => Ok(Some(bincode::deserialize(&v)?)),
            None => Ok(None),
        }
    }

    pub fn save_liquid_validator(&self, validator: &LiquidValidator) -> Result<()> {
        let key = liquid_validator_key(&validator.operator)?;
        let encoded = bincode::serialize(validator)?;
        self.put(&key, encoded)
    }

    pub fn load_liquid_validator(&self, operator: &ValidatorId) -> Result<Option<LiquidValidator>> {
        match self.get(&liquid_validator_key(operator)?)? {
            Some(v) => Ok(Some(bincode::deserialize(&v)?)),
            None => Ok(None),
        }
    }

    pub fn delete_liquid_validator(&self, operator: &ValidatorId) -> Result<()> {
        self.delete(&liquid_validator_key(operator)?)
    }

    /// All stored liquid validators in key order.
    pub fn load_liquid_validators(&self) -> Result<Vec<LiquidValidator>> {
        self.scan_prefix(&[LIQUID_VALIDATOR_PREFIX])?
            .into_iter()
            .map(|(k, v)| {
                let validator: LiquidValidator = bincode::deserialize(&v)?;
                let operator = operator_from_key(&k)?;
                if validator.operator != operator {
                    return Err(anyhow!("record under {} belongs to {}", operator, validator.operator));
                }
                Ok(validator)
            })
            .collect()
    }

    /// Replaces the stored directory with `state.liquid_validators` and saves
    /// the state itself.
    pub fn commit_pool(&self, state: &PoolState) -> Result<()> {
        for stale in self.load_liquid_validators()? {
            if state.validator(&stale.operator).is_none() {
                self.delete_liquid_validator(&stale.operator)?;
            }
        }
        for validator in &state.liquid_validators {
            self.save_liquid_validator(validator)?;
        }
        self.save_state(state)
    }
}
