//! The value model shared by the encoder and the decoders.
//!
//! Callers hand `AbiValue`s to the encoder and get `AbiValue`s back from
//! every decoder. Conversion into alloy's `DynSolValue` is driven by the
//! declared Solidity type, so a single `AbiValue::Str` can feed a `uint256`,
//! an `address`, `bytes32` or a `string` parameter.

use alloy_core::dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::{Address, B256, I256, U256};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// A contract argument or a decoded return/log value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum AbiValue {
    Uint(u128),
    /// Unsigned values wider than u128, as a decimal string
    BigUint(String),
    Int(i128),
    /// Signed values wider than i128, as a decimal string
    BigInt(String),
    Bool(bool),
    Bytes(Vec<u8>),
    Str(String),
    /// 20-byte address, 0x-prefixed
    Address(String),
    Array(Vec<AbiValue>),
    /// Tuple fields keyed by component name, or position when unnamed
    Tuple(Vec<(String, AbiValue)>),
    Null,
}

impl AbiValue {
    pub fn is_null(&self) -> bool {
        matches!(self, AbiValue::Null)
    }

    pub fn as_address(&self) -> Option<&str> {
        match self {
            AbiValue::Address(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_u128(&self) -> Option<u128> {
        match self {
            AbiValue::Uint(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AbiValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AbiValue::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Look up a tuple field by name.
    pub fn field(&self, name: &str) -> Option<&AbiValue> {
        match self {
            AbiValue::Tuple(fields) => fields.iter().find(|(k, _)| k == name).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Build a value from plain JSON, as accepted on the command line.
    ///
    /// Strings stay strings (the declared type decides how they are read),
    /// numbers become `Uint`/`Int`, arrays become `Array` and objects become
    /// `Tuple` in key order.
    pub fn from_json(v: &Value) -> AbiValue {
        match v {
            Value::Null => AbiValue::Null,
            Value::Bool(b) => AbiValue::Bool(*b),
            Value::Number(n) => {
                if let Some(u) = n.as_u64() {
                    AbiValue::Uint(u as u128)
                } else if let Some(i) = n.as_i64() {
                    AbiValue::Int(i as i128)
                } else {
                    AbiValue::Str(n.to_string())
                }
            }
            Value::String(s) => AbiValue::Str(s.clone()),
            Value::Array(items) => AbiValue::Array(items.iter().map(AbiValue::from_json).collect()),
            Value::Object(map) => AbiValue::Tuple(
                map.iter()
                    .map(|(k, v)| (k.clone(), AbiValue::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Render as plain JSON: integers wider than 53 bits and byte strings
    /// become strings, tuples become objects.
    pub fn to_json(&self) -> Value {
        match self {
            AbiValue::Uint(v) => Value::String(v.to_string()),
            AbiValue::BigUint(s) | AbiValue::BigInt(s) => Value::String(s.clone()),
            AbiValue::Int(v) => Value::String(v.to_string()),
            AbiValue::Bool(b) => Value::Bool(*b),
            AbiValue::Bytes(b) => Value::String(format!("0x{}", hex::encode(b))),
            AbiValue::Str(s) | AbiValue::Address(s) => Value::String(s.clone()),
            AbiValue::Array(items) => Value::Array(items.iter().map(AbiValue::to_json).collect()),
            AbiValue::Tuple(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            AbiValue::Null => Value::Null,
        }
    }
}

impl fmt::Display for AbiValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbiValue::Uint(v) => write!(f, "{v}"),
            AbiValue::BigUint(v) => write!(f, "{v}"),
            AbiValue::Int(v) => write!(f, "{v}"),
            AbiValue::BigInt(v) => write!(f, "{v}"),
            AbiValue::Bool(v) => write!(f, "{v}"),
            AbiValue::Bytes(b) => write!(f, "0x{}", hex::encode(b)),
            AbiValue::Str(s) => write!(f, "{s}"),
            AbiValue::Address(a) => write!(f, "{a}"),
            AbiValue::Array(v) => {
                let parts: Vec<_> = v.iter().map(|x| x.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            AbiValue::Tuple(fields) => {
                let parts: Vec<_> = fields.iter().map(|(k, v)| format!("{k}: {v}")).collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
            AbiValue::Null => write!(f, "null"),
        }
    }
}

impl From<bool> for AbiValue {
    fn from(b: bool) -> Self {
        AbiValue::Bool(b)
    }
}

impl From<u64> for AbiValue {
    fn from(v: u64) -> Self {
        AbiValue::Uint(v as u128)
    }
}

impl From<u128> for AbiValue {
    fn from(v: u128) -> Self {
        AbiValue::Uint(v)
    }
}

impl From<i64> for AbiValue {
    fn from(v: i64) -> Self {
        AbiValue::Int(v as i128)
    }
}

impl From<&str> for AbiValue {
    fn from(s: &str) -> Self {
        AbiValue::Str(s.to_string())
    }
}

impl From<String> for AbiValue {
    fn from(s: String) -> Self {
        AbiValue::Str(s)
    }
}

impl From<Vec<u8>> for AbiValue {
    fn from(b: Vec<u8>) -> Self {
        AbiValue::Bytes(b)
    }
}

/// Convert an `AbiValue` into the alloy `DynSolValue` for the given expected type.
pub fn to_dyn_value(val: &AbiValue, expected: &DynSolType) -> Result<DynSolValue, String> {
    match (val, expected) {
        (AbiValue::Bool(b), DynSolType::Bool) => Ok(DynSolValue::Bool(*b)),
        (AbiValue::Str(s), DynSolType::Bool) => match s.as_str() {
            "true" => Ok(DynSolValue::Bool(true)),
            "false" => Ok(DynSolValue::Bool(false)),
            other => Err(format!("'{other}' is not a boolean")),
        },

        (AbiValue::Uint(u), DynSolType::Uint(bits)) => {
            checked_uint(U256::from(*u), *bits)
        }
        (AbiValue::Int(i), DynSolType::Uint(bits)) => {
            let u = u128::try_from(*i).map_err(|_| format!("negative value {i} for uint{bits}"))?;
            checked_uint(U256::from(u), *bits)
        }
        (AbiValue::BigUint(s) | AbiValue::Str(s), DynSolType::Uint(bits)) => {
            let u = U256::from_str(s.trim()).map_err(|e| format!("uint parse '{s}': {e}"))?;
            checked_uint(u, *bits)
        }

        (AbiValue::Int(i), DynSolType::Int(bits)) => {
            let v = I256::try_from(*i).map_err(|e| e.to_string())?;
            Ok(DynSolValue::Int(v, *bits))
        }
        (AbiValue::Uint(u), DynSolType::Int(bits)) => {
            let i = i128::try_from(*u).map_err(|_| format!("{u} overflows int{bits}"))?;
            let v = I256::try_from(i).map_err(|e| e.to_string())?;
            Ok(DynSolValue::Int(v, *bits))
        }
        (AbiValue::BigInt(s) | AbiValue::Str(s), DynSolType::Int(bits)) => {
            let v = I256::from_str(s.trim()).map_err(|e| format!("int parse '{s}': {e}"))?;
            Ok(DynSolValue::Int(v, *bits))
        }

        (AbiValue::Address(s) | AbiValue::Str(s), DynSolType::Address) => {
            let addr = Address::from_str(s.trim()).map_err(|e| format!("address parse '{s}': {e}"))?;
            Ok(DynSolValue::Address(addr))
        }

        (AbiValue::Bytes(b), DynSolType::Bytes) => Ok(DynSolValue::Bytes(b.clone())),
        (AbiValue::Str(s), DynSolType::Bytes) => Ok(DynSolValue::Bytes(decode_hex(s)?)),

        (AbiValue::Bytes(b), DynSolType::FixedBytes(n)) => fixed_bytes(b, *n),
        (AbiValue::Str(s), DynSolType::FixedBytes(n)) => fixed_bytes(&decode_hex(s)?, *n),

        (AbiValue::Str(s), DynSolType::String) => Ok(DynSolValue::String(s.clone())),

        (AbiValue::Array(elems), DynSolType::Array(inner)) => {
            let dyn_elems: Result<Vec<_>, _> =
                elems.iter().map(|e| to_dyn_value(e, inner)).collect();
            Ok(DynSolValue::Array(dyn_elems?))
        }

        (AbiValue::Array(elems), DynSolType::FixedArray(inner, len)) => {
            if elems.len() != *len {
                return Err(format!(
                    "fixed array length mismatch: expected {len}, got {}",
                    elems.len()
                ));
            }
            let dyn_elems: Result<Vec<_>, _> =
                elems.iter().map(|e| to_dyn_value(e, inner)).collect();
            Ok(DynSolValue::FixedArray(dyn_elems?))
        }

        (AbiValue::Tuple(fields), DynSolType::Tuple(types)) => {
            if fields.len() != types.len() {
                return Err(format!(
                    "tuple length mismatch: expected {}, got {}",
                    types.len(),
                    fields.len()
                ));
            }
            let dyn_elems: Result<Vec<_>, _> = fields
                .iter()
                .zip(types.iter())
                .map(|((_, v), t)| to_dyn_value(v, t))
                .collect();
            Ok(DynSolValue::Tuple(dyn_elems?))
        }
        // Positional tuple given as an array
        (AbiValue::Array(elems), DynSolType::Tuple(types)) => {
            if elems.len() != types.len() {
                return Err(format!(
                    "tuple length mismatch: expected {}, got {}",
                    types.len(),
                    elems.len()
                ));
            }
            let dyn_elems: Result<Vec<_>, _> = elems
                .iter()
                .zip(types.iter())
                .map(|(v, t)| to_dyn_value(v, t))
                .collect();
            Ok(DynSolValue::Tuple(dyn_elems?))
        }

        (AbiValue::Null, ty) => Err(format!("missing value for {}", ty.sol_type_name())),

        _ => Err(format!(
            "cannot convert {} to {}",
            val,
            expected.sol_type_name()
        )),
    }
}

fn checked_uint(u: U256, bits: usize) -> Result<DynSolValue, String> {
    if bits < 256 && u.bit_len() > bits {
        return Err(format!("{u} overflows uint{bits}"));
    }
    Ok(DynSolValue::Uint(u, bits))
}

fn fixed_bytes(b: &[u8], n: usize) -> Result<DynSolValue, String> {
    if b.len() > n {
        return Err(format!("bytes{n}: got {} bytes", b.len()));
    }
    // left-aligned, zero padded on the right
    let mut word = [0u8; 32];
    word[..b.len()].copy_from_slice(b);
    Ok(DynSolValue::FixedBytes(B256::from(word), n))
}

/// Decode a hex string with or without the `0x` prefix.
pub fn decode_hex(s: &str) -> Result<Vec<u8>, String> {
    let stripped = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(stripped).map_err(|e| format!("invalid hex '{s}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_and_hex_strings_feed_uints() {
        let dec = to_dyn_value(&AbiValue::Str("42".into()), &DynSolType::Uint(256)).unwrap();
        let hex = to_dyn_value(&AbiValue::Str("0x2a".into()), &DynSolType::Uint(256)).unwrap();
        assert_eq!(dec, hex);
        assert_eq!(dec, DynSolValue::Uint(U256::from(42u64), 256));
    }

    #[test]
    fn uint_width_is_enforced() {
        let err = to_dyn_value(&AbiValue::Uint(256), &DynSolType::Uint(8)).unwrap_err();
        assert!(err.contains("overflows"));
    }

    #[test]
    fn negative_into_uint_fails() {
        assert!(to_dyn_value(&AbiValue::Int(-1), &DynSolType::Uint(256)).is_err());
    }

    #[test]
    fn short_fixed_bytes_are_right_padded() {
        let v = to_dyn_value(&AbiValue::Str("0xabcd".into()), &DynSolType::FixedBytes(4)).unwrap();
        match v {
            DynSolValue::FixedBytes(word, 4) => {
                assert_eq!(&word[..4], &[0xab, 0xcd, 0, 0]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn json_round_trip_of_plain_values() {
        let json = serde_json::json!(["0xabc", 7, true, {"a": 1}]);
        let v = AbiValue::from_json(&json);
        match &v {
            AbiValue::Array(items) => {
                assert_eq!(items[0], AbiValue::Str("0xabc".into()));
                assert_eq!(items[1], AbiValue::Uint(7));
                assert_eq!(items[2], AbiValue::Bool(true));
                assert_eq!(items[3].field("a"), Some(&AbiValue::Uint(1)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn tagged_serde_roundtrip() {
        let val = AbiValue::Address("0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045".into());
        let json = serde_json::to_string(&val).unwrap();
        let back: AbiValue = serde_json::from_str(&json).unwrap();
        assert_eq!(val, back);
    }
}
