use anyhow::{bail, Result};
use liquidstake_types::validator::ValidatorId;

/// Prefix of every liquid validator record.
pub const LIQUID_VALIDATOR_PREFIX: u8 = 0xc0;

pub const POOL_STATE_KEY: &[u8] = b"pool_state";

/// `0xc0 | len(operator) | operator`.
pub fn liquid_validator_key(operator: &ValidatorId) -> Result<Vec<u8>> {
    let bytes = operator.as_bytes();
    if bytes.is_empty() || bytes.len() > u8::MAX as usize {
        bail!("validator address of {} bytes cannot be length-prefixed", bytes.len());
    }
    let mut key = Vec::with_capacity(bytes.len() + 2);
    key.push(LIQUID_VALIDATOR_PREFIX);
    key.push(bytes.len() as u8);
    key.extend_from_slice(bytes);
    Ok(key)
}

/// Inverse of [`liquid_validator_key`].
pub fn operator_from_key(key: &[u8]) -> Result<ValidatorId> {
    match key {
        [LIQUID_VALIDATOR_PREFIX, len, rest @ ..] if *len as usize == rest.len() && !rest.is_empty() => {
            Ok(ValidatorId::new(rest))
        }
        _ => bail!("malformed liquid validator key {}", hex::encode(key)),
    }
}

pub fn pool_state_height_key(height: u64) -> String {
    format!("pool_state_{}", height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case("a59a9760570ef1808f36bfc4365ae271545abff1" ; "20 byte account")]
    #[test_case("37a28232feaf6f050d65c006195ad6f5678139219c2cc88f02dc12fdebb2a36d" ; "32 byte module account")]
    fn key_is_length_prefixed(addr: &str) {
        let operator = ValidatorId::new(hex::decode(addr).unwrap());
        let key = liquid_validator_key(&operator).unwrap();
        let expected = format!("c0{:02x}{}", addr.len() / 2, addr);
        assert_eq!(hex::encode(&key), expected);
        assert_eq!(operator_from_key(&key).unwrap(), operator);
    }

    #[test]
    fn oversized_and_empty_addresses_are_rejected() {
        assert!(liquid_validator_key(&ValidatorId::new(vec![1u8; 256])).is_err());
        assert!(liquid_validator_key(&ValidatorId::new(Vec::new())).is_err());
    }

    #[test]
    fn truncated_key_is_rejected() {
        assert!(operator_from_key(&[0xc0, 0x14, 0xa5]).is_err());
        assert!(operator_from_key(b"pool_state").is_err());
    }
}
