//! Converts alloy-core `DynSolValue` → `AbiValue`.

use alloy_core::dyn_abi::DynSolValue;
use alloy_primitives::U256;

use crate::item::AbiParam;
use crate::value::AbiValue;

/// Convert a decoded `DynSolValue` into an `AbiValue`.
///
/// Integers that fit in 128 bits stay numeric whatever their declared width,
/// wider ones fall back to decimal strings.
pub fn normalize(val: DynSolValue) -> AbiValue {
    match val {
        DynSolValue::Bool(b) => AbiValue::Bool(b),

        DynSolValue::Int(i, _bits) => match i128::try_from(i) {
            Ok(v) => AbiValue::Int(v),
            Err(_) => AbiValue::BigInt(i.to_string()),
        },

        DynSolValue::Uint(u, _bits) => match u128::try_from(u) {
            Ok(v) => AbiValue::Uint(v),
            Err(_) => AbiValue::BigUint(u.to_string()),
        },

        DynSolValue::FixedBytes(word, size) => AbiValue::Bytes(word[..size].to_vec()),

        DynSolValue::Bytes(b) => AbiValue::Bytes(b),

        DynSolValue::String(s) => AbiValue::Str(s),

        // EIP-55 checksum encoding
        DynSolValue::Address(a) => AbiValue::Address(a.to_checksum(None)),

        DynSolValue::Array(vals) | DynSolValue::FixedArray(vals) => {
            AbiValue::Array(vals.into_iter().map(normalize).collect())
        }

        DynSolValue::Tuple(fields) => AbiValue::Tuple(
            fields
                .into_iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), normalize(v)))
                .collect(),
        ),

        DynSolValue::Function(f) => AbiValue::Bytes(f.to_vec()),
    }
}

/// Normalize using the declared parameter so tuple fields carry their
/// component names instead of positions.
pub fn normalize_param(val: DynSolValue, param: &AbiParam) -> AbiValue {
    let Some(components) = param.components.as_deref() else {
        return normalize(val);
    };

    match val {
        DynSolValue::Tuple(fields) => AbiValue::Tuple(
            fields
                .into_iter()
                .zip(components.iter())
                .enumerate()
                .map(|(i, (v, c))| (c.key(i), normalize_param(v, c)))
                .collect(),
        ),
        // tuple[] / tuple[N]: every element shares the component layout
        DynSolValue::Array(vals) | DynSolValue::FixedArray(vals) => {
            let elem = param.array_element();
            AbiValue::Array(vals.into_iter().map(|v| normalize_param(v, &elem)).collect())
        }
        other => normalize(other),
    }
}

/// Parse a quantity such as `"0x2a"` into an `AbiValue`.
pub fn normalize_u256_hex(hex_str: &str) -> AbiValue {
    let hex = hex_str.strip_prefix("0x").unwrap_or(hex_str);
    match U256::from_str_radix(hex, 16) {
        Ok(u) => match u128::try_from(u) {
            Ok(v) => AbiValue::Uint(v),
            Err(_) => AbiValue::BigUint(u.to_string()),
        },
        Err(_) => AbiValue::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, B256};

    #[test]
    fn uint256_small_stays_numeric() {
        let v = normalize(DynSolValue::Uint(U256::from(42u64), 256));
        assert_eq!(v, AbiValue::Uint(42));
    }

    #[test]
    fn uint256_large_becomes_string() {
        let v = normalize(DynSolValue::Uint(U256::MAX, 256));
        assert!(matches!(v, AbiValue::BigUint(_)));
    }

    #[test]
    fn address_is_checksummed() {
        let addr: Address = "0xd8da6bf26964af9d7eed9e03e53415d37aa96045".parse().unwrap();
        let v = normalize(DynSolValue::Address(addr));
        assert_eq!(
            v,
            AbiValue::Address("0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045".into())
        );
    }

    #[test]
    fn fixed_bytes_truncated_to_declared_size() {
        let mut word = [0u8; 32];
        word[0] = 0xff;
        let v = normalize(DynSolValue::FixedBytes(B256::from(word), 2));
        assert_eq!(v, AbiValue::Bytes(vec![0xff, 0x00]));
    }

    #[test]
    fn hex_quantity() {
        assert_eq!(normalize_u256_hex("0x2a"), AbiValue::Uint(42));
        assert_eq!(normalize_u256_hex("zz"), AbiValue::Null);
    }
}
